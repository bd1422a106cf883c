use crate::{Result, Take5Error};

/// Trait abstracting read access to a mapped take5 buffer.
///
/// Reads are positional and never touch shared cursor state, so any number of
/// threads may read the same buffer at once. The trait is blanket-implemented
/// for anything that exposes its bytes through `AsRef<[u8]>`, which covers
/// `Vec<u8>`, boxed slices and `memmap2::Mmap`.
pub trait Take5Reader {
    /// The whole buffer.
    fn bytes(&self) -> &[u8];

    /// Returns `length` bytes starting at `offset`, or an error when the
    /// range cannot be satisfied in full.
    fn slice_at(&self, offset: usize, length: usize) -> Result<&[u8]> {
        let data = self.bytes();
        offset
            .checked_add(length)
            .filter(|&end| end <= data.len())
            .map(|end| &data[offset..end])
            .ok_or(Take5Error::OutOfBounds {
                offset: offset as u64,
                length: length as u64,
                size: data.len() as u64,
            })
    }

    /// Reads a fixed-size array at `offset`.
    fn array_at<const N: usize>(&self, offset: usize) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.slice_at(offset, N)?);
        Ok(out)
    }

    /// Reads a native-order `i32` at `offset`.
    fn i32_at(&self, offset: usize) -> Result<i32> {
        self.array_at(offset).map(i32::from_ne_bytes)
    }

    /// Reads a native-order `u32` at `offset`.
    fn u32_at(&self, offset: usize) -> Result<u32> {
        self.array_at(offset).map(u32::from_ne_bytes)
    }
}

impl<T: AsRef<[u8]> + ?Sized> Take5Reader for T {
    fn bytes(&self) -> &[u8] {
        self.as_ref()
    }
}
