// Bit-packed unsigned integer arrays.
//
// Every element occupies the same number of bits: the bit width of the OR of
// all stored values (at least 1). Elements are laid out little-end first
// across 64-bit words and may straddle a word boundary.

use std::io::Write;

use crate::array::{ArrayLayout, PodArray};
use crate::region::{SectionReader, write_pod};
use crate::{Result, StoreError};

/// Number of bits needed to store `value`, at least 1.
#[inline]
pub fn bit_width(value: u64) -> u8 {
    (u64::BITS - value.leading_zeros()).max(1) as u8
}

#[inline]
fn mask_for(width: u8) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// Location of a packed array inside a region.
#[derive(Debug, Clone, Copy)]
pub struct PackedLayout {
    len: usize,
    width: u8,
    words: ArrayLayout<u64>,
}

impl PackedLayout {
    /// Read `len u32, width u8, reserved [u8; 3], word_count u32, [u64]`.
    pub fn read(reader: &mut SectionReader<'_>) -> Result<Self> {
        let len = reader.read_u32()? as usize;
        let width = reader.read_u8()?;
        reader.read_bytes(3)?;
        let words = reader.read_array::<u64>()?;

        if !(1..=64).contains(&width) {
            return Err(StoreError::illegal_state(format!(
                "packed array element width {width} out of range"
            )));
        }
        if (words.len() as u128) * 64 < (len as u128) * u128::from(width) {
            return Err(StoreError::illegal_state(format!(
                "packed array of {len} x {width} bits does not fit in {} words",
                words.len()
            )));
        }
        Ok(Self { len, width, words })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn width(&self) -> u8 {
        self.width
    }

    pub fn view<'a>(&self, data: &'a [u8]) -> PackedArray<'a> {
        PackedArray {
            words: self.words.view(data),
            len: self.len,
            width: self.width,
            mask: mask_for(self.width),
        }
    }
}

/// Read view of a packed array.
#[derive(Debug, Clone, Copy)]
pub struct PackedArray<'a> {
    words: PodArray<'a, u64>,
    len: usize,
    width: u8,
    mask: u64,
}

impl PackedArray<'_> {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<u64> {
        if index >= self.len {
            return None;
        }
        let width = usize::from(self.width);
        let bit = index * width;
        let word = bit / 64;
        let shift = bit % 64;
        let mut value = self.words.get(word)? >> shift;
        if shift + width > 64 {
            value |= self.words.get(word + 1)? << (64 - shift);
        }
        Some(value & self.mask)
    }
}

/// A packed array built in memory, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedBuf {
    len: usize,
    width: u8,
    words: Vec<u64>,
}

impl PackedBuf {
    pub fn pack(values: &[u64]) -> Self {
        let width = bit_width(values.iter().fold(0, |acc, v| acc | v));
        let bits = usize::from(width);
        let mut words = vec![0u64; (values.len() * bits).div_ceil(64)];
        for (i, &value) in values.iter().enumerate() {
            let bit = i * bits;
            let word = bit / 64;
            let shift = bit % 64;
            words[word] |= value << shift;
            if shift + bits > 64 {
                words[word + 1] |= value >> (64 - shift);
            }
        }
        Self {
            len: values.len(),
            width,
            words,
        }
    }

    pub fn width(&self) -> u8 {
        self.width
    }

    pub fn write<W: Write + ?Sized>(&self, w: &mut W) -> std::io::Result<()> {
        let len = u32::try_from(self.len)
            .map_err(|_| std::io::Error::other("packed array has more than u32::MAX elements"))?;
        write_pod(w, &len)?;
        w.write_all(&[self.width, 0, 0, 0])?;
        crate::array::write_array(w, &self.words)
    }
}
