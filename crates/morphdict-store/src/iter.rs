// Forward iteration over the words of a dictionary.

use crate::string_table::{StringCursor, StringTable};

/// Lazy iterator over the keys of a word table, in table order.
///
/// The empty string is never yielded. The iterator owns its cursor and can
/// only be moved, not cloned. Two iterators compare equal when they walk the
/// same table and stand at the same position; every exhausted iterator over
/// a table equals [`end`](Self::end).
pub struct DictionaryKeyIterator<'a> {
    table: StringTable<'a>,
    cursor: StringCursor<'a>,
    current: Option<(String, u32)>,
}

impl<'a> DictionaryKeyIterator<'a> {
    pub fn new(table: StringTable<'a>) -> Self {
        Self::with_prefix(table, "")
    }

    pub fn with_prefix(table: StringTable<'a>, prefix: &str) -> Self {
        let mut iter = Self {
            table,
            cursor: table.cursor_with_prefix(prefix),
            current: None,
        };
        iter.advance();
        iter
    }

    /// An exhausted iterator over the same table.
    pub fn end(&self) -> Self {
        Self {
            table: self.table,
            cursor: self.table.exhausted_cursor(),
            current: None,
        }
    }

    /// The word at the current position.
    pub fn current(&self) -> Option<&str> {
        self.current.as_ref().map(|(word, _)| word.as_str())
    }

    /// Identifier of the word at the current position.
    pub fn position(&self) -> Option<u32> {
        self.current.as_ref().map(|&(_, id)| id)
    }

    /// Move to the next non-empty word.
    pub fn advance(&mut self) {
        self.current = self.cursor.by_ref().find(|(word, _)| !word.is_empty());
    }

    pub fn is_end(&self) -> bool {
        self.current.is_none()
    }
}

impl Iterator for DictionaryKeyIterator<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let (word, _) = self.current.take()?;
        self.advance();
        Some(word)
    }
}

impl PartialEq for DictionaryKeyIterator<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.table.origin() == other.table.origin() && self.position() == other.position()
    }
}

impl std::fmt::Debug for DictionaryKeyIterator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DictionaryKeyIterator")
            .field("current", &self.current())
            .finish()
    }
}
