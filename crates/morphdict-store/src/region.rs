// Read-only byte region backing a dictionary, and a cursor for walking its
// sections in file order.

use std::fs::File;
use std::io::Write;
use std::marker::PhantomData;
use std::path::Path;

use bytemuck::Pod;
use memmap2::Mmap;

use crate::array::ArrayLayout;
use crate::{Result, StoreError};

/// The bytes of a loaded dictionary: either a read-only file mapping or an
/// owned buffer (for dictionaries built in memory).
pub enum MappedRegion {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl MappedRegion {
    /// Map `path` read-only.
    ///
    /// Files shorter than `min_len` are rejected before mapping so that
    /// truncated files report [`StoreError::TooShort`] uniformly.
    pub fn open(path: &Path, min_len: usize) -> Result<Self> {
        let io_err = |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(io_err)?;
        let len = file.metadata().map_err(io_err)?.len();
        if len < min_len as u64 {
            return Err(StoreError::TooShort {
                expected: min_len,
                actual: len as usize,
            });
        }
        // SAFETY: the mapping is read-only. Dictionary files are immutable
        // build artifacts; truncating or rewriting one while it is mapped is
        // outside the supported contract.
        let mmap = unsafe { Mmap::map(&file) }.map_err(io_err)?;
        Ok(Self::Mapped(mmap))
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Mapped(mmap) => mmap,
            Self::Owned(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self, Self::Mapped(_))
    }
}

impl std::fmt::Debug for MappedRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedRegion")
            .field("mapped", &self.is_mapped())
            .field("len", &self.len())
            .finish()
    }
}

/// Sequential reader over a byte region.
///
/// Every read is bounds-checked and fails with [`StoreError::TooShort`]
/// rather than reading past the end. Multi-byte values are read in native
/// byte order without any alignment requirement.
#[derive(Debug, Clone)]
pub struct SectionReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SectionReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Offset of the next byte to be read.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or(StoreError::TooShort {
                expected: self.pos.saturating_add(len),
                actual: self.data.len(),
            })?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    pub fn read<T: Pod>(&mut self) -> Result<T> {
        let bytes = self.read_bytes(size_of::<T>())?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.read()
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.read()
    }

    /// Skip over `len` elements of `T`, returning their location.
    pub fn skip_array<T: Pod>(&mut self, len: usize) -> Result<ArrayLayout<T>> {
        let offset = self.pos;
        let byte_len = len.checked_mul(size_of::<T>()).ok_or(StoreError::TooShort {
            expected: usize::MAX,
            actual: self.data.len(),
        })?;
        self.read_bytes(byte_len)?;
        Ok(ArrayLayout {
            offset,
            len,
            _marker: PhantomData,
        })
    }

    /// Read a `u32` element count followed by that many elements of `T`.
    pub fn read_array<T: Pod>(&mut self) -> Result<ArrayLayout<T>> {
        let len = self.read_u32()? as usize;
        self.skip_array(len)
    }
}

/// Write a Pod value in native byte order.
pub(crate) fn write_pod<T: Pod, W: Write + ?Sized>(w: &mut W, value: &T) -> std::io::Result<()> {
    w.write_all(bytemuck::bytes_of(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_reads() {
        let mut data = Vec::new();
        data.push(7u8);
        data.extend_from_slice(&0x0102_0304u32.to_ne_bytes());
        data.extend_from_slice(&(-5i64).to_ne_bytes());
        let mut reader = SectionReader::new(&data);
        assert_eq!(reader.read_u8().unwrap(), 7);
        // Unaligned u32 at offset 1.
        assert_eq!(reader.read_u32().unwrap(), 0x0102_0304);
        assert_eq!(reader.read::<i64>().unwrap(), -5);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn read_past_end() {
        let data = [1u8, 2, 3];
        let mut reader = SectionReader::new(&data);
        let err = reader.read_u32().unwrap_err();
        assert!(matches!(
            err,
            StoreError::TooShort {
                expected: 4,
                actual: 3
            }
        ));
        // A failed read does not advance.
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn counted_array() {
        let mut data = Vec::new();
        data.extend_from_slice(&2u32.to_ne_bytes());
        data.extend_from_slice(&10u64.to_ne_bytes());
        data.extend_from_slice(&20u64.to_ne_bytes());
        data.push(0xAA);
        let mut reader = SectionReader::new(&data);
        let layout = reader.read_array::<u64>().unwrap();
        assert_eq!(layout.len(), 2);
        assert_eq!(reader.read_u8().unwrap(), 0xAA);
        let view = layout.view(&data);
        assert_eq!(view.get(1), Some(20));
    }

    #[test]
    fn counted_array_truncated() {
        let mut data = Vec::new();
        data.extend_from_slice(&1000u32.to_ne_bytes());
        data.extend_from_slice(&[0u8; 16]);
        let mut reader = SectionReader::new(&data);
        assert!(reader.read_array::<u64>().is_err());
    }

    #[test]
    fn owned_region() {
        let region = MappedRegion::Owned(vec![1, 2, 3]);
        assert_eq!(region.as_bytes(), &[1, 2, 3]);
        assert!(!region.is_mapped());
    }

    #[test]
    fn open_missing_file() {
        let err = MappedRegion::open(Path::new("/nonexistent/morphdict.sdict"), 18).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }
}
