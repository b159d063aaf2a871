// Bidirectional string <-> dense identifier tables.
//
// Small tables (grammeme names, property keys) are stored flat and searched
// by bisection. Large ones (words, suffixes) are stored as a byte trie in the
// most compact of UTF-8 and UTF-16LE. Both representations share one
// interface and number their strings 0..len in sorted byte order.

use std::collections::BTreeSet;

use hashbrown::HashMap;

use crate::charset::Charset;
use crate::flat::{self, FlatCursor, FlatLayout, FlatTable};
use crate::region::{SectionReader, write_pod};
use crate::trie::{self, TrieCursor, TrieLayout, TrieTable};
use crate::{Result, StoreError, corrupted};

/// Tables with at most this many strings are stored flat by default.
pub const DEFAULT_FLAT_TABLE_LIMIT: usize = 256;

const KIND_FLAT: u8 = 0;
const KIND_TRIE: u8 = 1;

/// Storage representation of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Flat,
    Trie,
    /// Flat up to the given number of strings, trie above.
    Auto(usize),
}

/// Location of a string table inside a region.
#[derive(Debug, Clone, Copy)]
pub struct StringTableLayout {
    repr: LayoutRepr,
}

#[derive(Debug, Clone, Copy)]
enum LayoutRepr {
    Flat(FlatLayout),
    Trie(TrieLayout),
}

impl StringTableLayout {
    /// Read `kind u8, charset u8, reserved u16` and the table body.
    pub fn read(reader: &mut SectionReader<'_>, data: &[u8]) -> Result<Self> {
        let kind = reader.read_u8()?;
        let charset = Charset::from_tag(reader.read_u8()?)?;
        reader.read_bytes(2)?;
        let repr = match kind {
            KIND_FLAT if charset == Charset::Utf8 => LayoutRepr::Flat(FlatLayout::read(reader, data)?),
            KIND_FLAT => {
                return Err(StoreError::illegal_state(format!(
                    "flat string table in {}",
                    charset.name()
                )));
            }
            KIND_TRIE => LayoutRepr::Trie(TrieLayout::read(reader, charset)?),
            _ => {
                return Err(StoreError::illegal_state(format!(
                    "unknown string table kind {kind}"
                )));
            }
        };
        Ok(Self { repr })
    }

    pub fn len(&self) -> usize {
        match &self.repr {
            LayoutRepr::Flat(flat) => flat.len(),
            LayoutRepr::Trie(trie) => trie.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn view<'a>(&self, data: &'a [u8]) -> StringTable<'a> {
        let repr = match &self.repr {
            LayoutRepr::Flat(flat) => TableRepr::Flat(flat.view(data)),
            LayoutRepr::Trie(trie) => TableRepr::Trie(trie.view(data)),
        };
        StringTable { repr }
    }
}

/// Read view of a string table.
///
/// Identifiers are dense in `0..len()`. For any identifier `i`,
/// `identifier(get_string(i)) == i`.
#[derive(Debug, Clone, Copy)]
pub struct StringTable<'a> {
    repr: TableRepr<'a>,
}

#[derive(Debug, Clone, Copy)]
enum TableRepr<'a> {
    Flat(FlatTable<'a>),
    Trie(TrieTable<'a>),
}

impl<'a> StringTable<'a> {
    pub fn len(&self) -> usize {
        match &self.repr {
            TableRepr::Flat(flat) => flat.len(),
            TableRepr::Trie(trie) => trie.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` if the table is stored as a trie.
    pub fn is_trie(&self) -> bool {
        matches!(self.repr, TableRepr::Trie(_))
    }

    pub fn kind(&self) -> TableKind {
        match self.repr {
            TableRepr::Flat(_) => TableKind::Flat,
            TableRepr::Trie(_) => TableKind::Trie,
        }
    }

    /// Encoding of the stored keys. Flat tables are always UTF-8.
    pub fn charset(&self) -> Charset {
        match &self.repr {
            TableRepr::Flat(_) => Charset::Utf8,
            TableRepr::Trie(trie) => trie.charset(),
        }
    }

    /// The identifier of `s`, if present.
    pub fn identifier_if_available(&self, s: &str) -> Option<u32> {
        match &self.repr {
            TableRepr::Flat(flat) => flat.identifier(s),
            TableRepr::Trie(trie) => trie.identifier(s),
        }
    }

    /// The identifier of `s`, or [`StoreError::NotFound`].
    pub fn identifier(&self, s: &str) -> Result<u32> {
        self.identifier_if_available(s)
            .ok_or_else(|| StoreError::NotFound(format!("{s:?} is not in the string table")))
    }

    pub fn contains(&self, s: &str) -> bool {
        self.identifier_if_available(s).is_some()
    }

    /// The string with identifier `id`, or `None` if `id >= len()`.
    pub fn try_get_string(&self, id: u32) -> Option<String> {
        match &self.repr {
            TableRepr::Flat(flat) => flat.get(id).map(str::to_owned),
            TableRepr::Trie(trie) => trie.get(id),
        }
    }

    /// The string with identifier `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not a valid identifier. Identifiers stored in a
    /// dictionary are always valid for the table they refer to, so an
    /// invalid one means the file is corrupted.
    pub fn get_string(&self, id: u32) -> String {
        self.try_get_string(id)
            .unwrap_or_else(|| corrupted("string identifier out of range"))
    }

    /// Cursor over the strings starting with `prefix`, in identifier order.
    pub fn cursor_with_prefix(&self, prefix: &str) -> StringCursor<'a> {
        let repr = match &self.repr {
            TableRepr::Flat(flat) => CursorRepr::Flat(flat.cursor(prefix)),
            TableRepr::Trie(trie) => CursorRepr::Trie(trie.cursor(prefix)),
        };
        StringCursor { repr }
    }

    pub fn cursor(&self) -> StringCursor<'a> {
        self.cursor_with_prefix("")
    }

    /// A cursor that yields nothing.
    pub fn exhausted_cursor(&self) -> StringCursor<'a> {
        StringCursor {
            repr: CursorRepr::Exhausted,
        }
    }

    /// Address of this table's own storage. Distinct tables never share it.
    pub(crate) fn origin(&self) -> usize {
        match &self.repr {
            TableRepr::Flat(flat) => flat.address(),
            TableRepr::Trie(trie) => trie.address(),
        }
    }

    /// Build a table over `strings`, storing it as `kind`.
    ///
    /// Duplicates are collapsed.
    pub fn build_with<I, S>(strings: I, kind: TableKind) -> Result<BuiltStringTable>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set: BTreeSet<String> = strings.into_iter().map(|s| s.as_ref().to_owned()).collect();
        let flat = match kind {
            TableKind::Flat => true,
            TableKind::Trie => false,
            TableKind::Auto(limit) => {
                set.len() <= limit && set.iter().all(|s| s.len() <= flat::MAX_STRING_BYTES)
            }
        };

        let mut bytes = Vec::new();
        let mut identifiers = HashMap::with_capacity(set.len());
        if flat {
            let (entries, blob) = flat::build(&set)?;
            bytes.extend_from_slice(&[KIND_FLAT, Charset::Utf8.tag(), 0, 0]);
            write_pod(&mut bytes, &(entries.len() as u32))?;
            write_pod(&mut bytes, &(blob.len() as u32))?;
            bytes.extend_from_slice(bytemuck::cast_slice(&entries));
            bytes.extend_from_slice(&blob);
            identifiers.extend(set.into_iter().zip(0u32..));
        } else {
            let charset = Charset::most_compact(set.iter().map(String::as_str));
            let built = trie::build(set.iter().map(String::as_str), charset);
            bytes.extend_from_slice(&[KIND_TRIE, charset.tag(), 0, 0]);
            write_pod(&mut bytes, &(built.key_nodes.len() as u32))?;
            write_pod(&mut bytes, &(built.nodes.len() as u32))?;
            bytes.extend_from_slice(bytemuck::cast_slice(&built.nodes));
            bytes.extend_from_slice(bytemuck::cast_slice(&built.key_nodes));
            identifiers.extend(built.identifiers);
        }

        let layout = StringTableLayout::read(&mut SectionReader::new(&bytes), &bytes)?;
        Ok(BuiltStringTable {
            bytes,
            layout,
            identifiers,
        })
    }

    /// Build a table over `strings` with the default representation choice.
    pub fn build<I, S>(strings: I) -> Result<BuiltStringTable>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::build_with(strings, TableKind::Auto(DEFAULT_FLAT_TABLE_LIMIT))
    }
}

/// A string table built in memory.
#[derive(Debug, Clone)]
pub struct BuiltStringTable {
    bytes: Vec<u8>,
    layout: StringTableLayout,
    identifiers: HashMap<String, u32>,
}

impl BuiltStringTable {
    pub fn view(&self) -> StringTable<'_> {
        self.layout.view(&self.bytes)
    }

    /// Identifier assigned to each input string.
    pub fn identifiers(&self) -> &HashMap<String, u32> {
        &self.identifiers
    }

    pub fn id_of(&self, s: &str) -> Option<u32> {
        self.identifiers.get(s).copied()
    }

    pub fn len(&self) -> usize {
        self.layout.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layout.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn write<W: std::io::Write + ?Sized>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_all(&self.bytes)
    }
}

/// Iterator over `(string, identifier)` pairs of a table.
#[derive(Debug, Clone)]
pub struct StringCursor<'a> {
    repr: CursorRepr<'a>,
}

#[derive(Debug, Clone)]
enum CursorRepr<'a> {
    Flat(FlatCursor<'a>),
    Trie(TrieCursor<'a>),
    Exhausted,
}

impl Iterator for StringCursor<'_> {
    type Item = (String, u32);

    fn next(&mut self) -> Option<(String, u32)> {
        match &mut self.repr {
            CursorRepr::Flat(cursor) => cursor.next(),
            CursorRepr::Trie(cursor) => cursor.next(),
            CursorRepr::Exhausted => None,
        }
    }
}
