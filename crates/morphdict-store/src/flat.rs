// Flat string table: sorted UTF-8 strings in one blob.
//
// Each entry packs `offset << 8 | length`, so strings are at most 255 bytes
// and the blob at most 16 MiB. Entries are sorted by byte order; an
// identifier is the entry index. Lookup is a binary search.

use std::collections::BTreeSet;

use crate::array::{ArrayLayout, PodArray};
use crate::region::SectionReader;
use crate::{Result, StoreError, corrupted};

const LENGTH_BITS: u32 = 8;
const LENGTH_MASK: u32 = (1 << LENGTH_BITS) - 1;

/// Longest string a flat table can hold.
pub(crate) const MAX_STRING_BYTES: usize = LENGTH_MASK as usize;
const MAX_BLOB_BYTES: usize = 1 << (u32::BITS - LENGTH_BITS);

#[derive(Debug, Clone, Copy)]
pub(crate) struct FlatLayout {
    entries: ArrayLayout<u32>,
    blob: ArrayLayout<u8>,
}

impl FlatLayout {
    /// Read `count u32, blob_len u32, [u32; count], [u8; blob_len]` and
    /// check that every entry lies inside the blob, holds valid UTF-8 and
    /// sorts after its predecessor.
    pub(crate) fn read(reader: &mut SectionReader<'_>, data: &[u8]) -> Result<Self> {
        let count = reader.read_u32()? as usize;
        let blob_len = reader.read_u32()? as usize;
        let entries = reader.skip_array::<u32>(count)?;
        let blob = reader.skip_array::<u8>(blob_len)?;
        let layout = Self { entries, blob };

        let table = layout.view(data);
        let mut previous: Option<&[u8]> = None;
        for id in 0..count {
            let bytes = table.entry_bytes(id).ok_or_else(|| {
                StoreError::illegal_state(format!("flat table entry {id} outside its blob"))
            })?;
            if std::str::from_utf8(bytes).is_err() {
                return Err(StoreError::illegal_state(format!(
                    "flat table entry {id} is not UTF-8"
                )));
            }
            if previous.is_some_and(|p| p >= bytes) {
                return Err(StoreError::illegal_state(format!(
                    "flat table entry {id} out of order"
                )));
            }
            previous = Some(bytes);
        }
        Ok(layout)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn view<'a>(&self, data: &'a [u8]) -> FlatTable<'a> {
        FlatTable {
            entries: self.entries.view(data),
            blob: &data[self.blob.offset..self.blob.offset + self.blob.len()],
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct FlatTable<'a> {
    entries: PodArray<'a, u32>,
    blob: &'a [u8],
}

impl<'a> FlatTable<'a> {
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Address of the entry array, unique to this table within its region.
    pub(crate) fn address(&self) -> usize {
        self.entries.as_ptr() as usize
    }

    fn entry_bytes(&self, id: usize) -> Option<&'a [u8]> {
        let entry = self.entries.get(id)?;
        let offset = (entry >> LENGTH_BITS) as usize;
        let len = (entry & LENGTH_MASK) as usize;
        self.blob.get(offset..offset + len)
    }

    pub(crate) fn get(&self, id: u32) -> Option<&'a str> {
        let bytes = self.entry_bytes(id as usize)?;
        match std::str::from_utf8(bytes) {
            Ok(s) => Some(s),
            Err(_) => corrupted("flat table entry is not UTF-8"),
        }
    }

    /// Index of the first entry not less than `key`.
    fn lower_bound(&self, key: &[u8]) -> usize {
        self.entries.partition_point(|entry| {
            let offset = (entry >> LENGTH_BITS) as usize;
            let len = (entry & LENGTH_MASK) as usize;
            self.blob.get(offset..offset + len).is_some_and(|bytes| bytes < key)
        })
    }

    pub(crate) fn identifier(&self, key: &str) -> Option<u32> {
        let index = self.lower_bound(key.as_bytes());
        (self.entry_bytes(index)? == key.as_bytes()).then_some(index as u32)
    }

    pub(crate) fn cursor(&self, prefix: &str) -> FlatCursor<'a> {
        FlatCursor {
            table: *self,
            next: self.lower_bound(prefix.as_bytes()),
            prefix: prefix.to_owned(),
        }
    }
}

/// Iterates the entries that start with a prefix, in identifier order.
#[derive(Debug, Clone)]
pub(crate) struct FlatCursor<'a> {
    table: FlatTable<'a>,
    next: usize,
    prefix: String,
}

impl Iterator for FlatCursor<'_> {
    type Item = (String, u32);

    fn next(&mut self) -> Option<(String, u32)> {
        let id = self.next as u32;
        let s = self.table.get(id)?;
        if !s.starts_with(self.prefix.as_str()) {
            self.next = self.table.len();
            return None;
        }
        self.next += 1;
        Some((s.to_owned(), id))
    }
}

/// Encode sorted strings as `(entries, blob)`.
pub(crate) fn build(strings: &BTreeSet<String>) -> Result<(Vec<u32>, Vec<u8>)> {
    let mut entries = Vec::with_capacity(strings.len());
    let mut blob = Vec::new();
    for s in strings {
        if s.len() > MAX_STRING_BYTES {
            return Err(StoreError::invalid_input(format!(
                "string of {} bytes is too long for a flat table",
                s.len()
            )));
        }
        if blob.len() + s.len() > MAX_BLOB_BYTES {
            return Err(StoreError::invalid_input("flat table blob exceeds 16 MiB"));
        }
        entries.push(((blob.len() as u32) << LENGTH_BITS) | s.len() as u32);
        blob.extend_from_slice(s.as_bytes());
    }
    Ok((entries, blob))
}
