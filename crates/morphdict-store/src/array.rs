// Typed views of fixed-size record arrays inside a byte region.

use std::io::Write;
use std::marker::PhantomData;

use bytemuck::Pod;

/// Location of a Pod array inside a region, recorded at load time.
///
/// Layouts hold offsets rather than borrows so that a store can own its
/// region and its layouts side by side.
#[derive(Debug, Clone, Copy)]
pub struct ArrayLayout<T> {
    pub(crate) offset: usize,
    pub(crate) len: usize,
    pub(crate) _marker: PhantomData<fn() -> T>,
}

impl<T: Pod> ArrayLayout<T> {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn byte_len(&self) -> usize {
        self.len * size_of::<T>()
    }

    /// Borrow the array from the region it was read from.
    ///
    /// # Panics
    ///
    /// Panics if `data` is not the region this layout was read from.
    pub fn view<'a>(&self, data: &'a [u8]) -> PodArray<'a, T> {
        PodArray::from_bytes(&data[self.offset..self.offset + self.byte_len()])
    }
}

/// Bounds-checked, alignment-free view of an array of `T`.
pub struct PodArray<'a, T> {
    bytes: &'a [u8],
    len: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for PodArray<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for PodArray<'_, T> {}

impl<'a, T: Pod> PodArray<'a, T> {
    /// View `bytes` as packed `T` records. Trailing bytes that do not form a
    /// full record are ignored.
    pub fn from_bytes(bytes: &'a [u8]) -> Self {
        let len = bytes.len() / size_of::<T>().max(1);
        Self {
            bytes,
            len,
            _marker: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Address of the first record in the underlying bytes.
    pub fn as_ptr(&self) -> *const u8 {
        self.bytes.as_ptr()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<T> {
        if index >= self.len {
            return None;
        }
        let size = size_of::<T>();
        let start = index * size;
        Some(bytemuck::pod_read_unaligned(&self.bytes[start..start + size]))
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + use<'a, T> {
        let this = *self;
        (0..this.len).filter_map(move |i| this.get(i))
    }

    /// Index of the first element for which `pred` is false, assuming the
    /// array is partitioned by `pred`.
    pub fn partition_point(&self, mut pred: impl FnMut(T) -> bool) -> usize {
        let (mut lo, mut hi) = (0, self.len);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match self.get(mid) {
                Some(value) if pred(value) => lo = mid + 1,
                _ => hi = mid,
            }
        }
        lo
    }
}

impl<T: Pod + std::fmt::Debug> std::fmt::Debug for PodArray<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Write a `u32` element count followed by the elements.
pub fn write_array<T: Pod, W: Write + ?Sized>(w: &mut W, items: &[T]) -> std::io::Result<()> {
    let len = u32::try_from(items.len())
        .map_err(|_| std::io::Error::other("array has more than u32::MAX elements"))?;
    w.write_all(&len.to_ne_bytes())?;
    w.write_all(bytemuck::cast_slice(items))
}
