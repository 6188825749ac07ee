//! Range-tracking byte reader.
//!
//! `ByteReader` is the only way dissectors consume bytes. Reads never fail:
//! a read past the end yields a zero value (or an empty slice), moves the
//! cursor to the end of the input and raises an error flag. The flag is
//! sticky, so every later read on that reader reports an error too. Callers
//! copy `last_range()` and `last_error()` into the attribute they build.

use std::ops::Range;

use crate::slice::Slice;

mod sealed {
    pub trait Sealed {}
}

/// Fixed-width integers the reader can decode.
pub trait ReadInt: sealed::Sealed + Copy + Default {
    const WIDTH: usize;
    fn from_be(bytes: &[u8]) -> Self;
    fn from_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_read_int {
    ($($ty:ty),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl ReadInt for $ty {
                const WIDTH: usize = std::mem::size_of::<$ty>();

                fn from_be(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    <$ty>::from_be_bytes(raw)
                }

                fn from_le(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    <$ty>::from_le_bytes(raw)
                }
            }
        )*
    };
}

impl_read_int!(u8, u16, u32, u64, i8, i16, i32, i64);

/// Cursor over a `Slice` with per-read range and error tracking.
///
/// # Examples
/// ```
/// use layershark_core::{ByteReader, Slice};
///
/// let payload = Slice::new(vec![0x60, 0x00, 0x01]);
/// let mut reader = ByteReader::new(&payload);
/// assert_eq!(reader.read_be::<u16>(), 0x6000);
/// assert_eq!(reader.last_range(), 0..2);
/// assert_eq!(reader.read_be::<u16>(), 0);
/// assert!(reader.last_error());
/// ```
#[derive(Debug, Clone)]
pub struct ByteReader {
    input: Slice,
    pos: usize,
    last_range: Range<usize>,
    failed: bool,
}

impl ByteReader {
    pub fn new(input: &Slice) -> Self {
        let start = input.offset();
        Self {
            input: input.clone(),
            pos: 0,
            last_range: start..start,
            failed: false,
        }
    }

    /// Read a big-endian integer.
    pub fn read_be<T: ReadInt>(&mut self) -> T {
        self.take(T::WIDTH)
            .map(|bytes| T::from_be(bytes.as_bytes()))
            .unwrap_or_default()
    }

    /// Read a little-endian integer.
    pub fn read_le<T: ReadInt>(&mut self) -> T {
        self.take(T::WIDTH)
            .map(|bytes| T::from_le(bytes.as_bytes()))
            .unwrap_or_default()
    }

    /// Consume the next `len` bytes; empty slice when fewer remain.
    pub fn slice(&mut self, len: usize) -> Slice {
        match self.take(len) {
            Some(bytes) => bytes,
            None => self.input.tail(),
        }
    }

    /// Consume everything left.
    pub fn remainder(&mut self) -> Slice {
        let len = self.remaining();
        self.slice(len)
    }

    /// Advance by `len` bytes without producing a value.
    pub fn skip(&mut self, len: usize) {
        let _ = self.take(len);
    }

    /// Absolute range consumed by the last read.
    pub fn last_range(&self) -> Range<usize> {
        self.last_range.clone()
    }

    /// Whether the last read (or any earlier one) ran out of bytes.
    pub fn last_error(&self) -> bool {
        self.failed
    }

    /// Cursor position relative to the start of the input.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.input.len() - self.pos
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, len: usize) -> Option<Slice> {
        let start = self.pos;
        if len > self.remaining() {
            self.pos = self.input.len();
            self.last_range = self.absolute(start..self.pos);
            self.failed = true;
            return None;
        }
        self.pos += len;
        self.last_range = self.absolute(start..self.pos);
        Some(self.input.sub(start..self.pos))
    }

    fn absolute(&self, range: Range<usize>) -> Range<usize> {
        let base = self.input.offset();
        base + range.start..base + range.end
    }
}

#[cfg(test)]
mod tests {
    use super::ByteReader;
    use crate::slice::Slice;
    use proptest::prelude::*;

    #[test]
    fn reads_big_and_little_endian() {
        let input = Slice::new(vec![0x12, 0x34, 0x56, 0x78]);
        let mut reader = ByteReader::new(&input);
        assert_eq!(reader.read_be::<u16>(), 0x1234);
        assert_eq!(reader.read_le::<u16>(), 0x7856);
        assert!(!reader.last_error());
        assert_eq!(reader.last_range(), 2..4);
        assert!(reader.is_exhausted());
    }

    #[test]
    fn ranges_are_absolute_for_sub_slices() {
        let frame = Slice::new(vec![0u8, 0, 0, 0, 0xaa, 0xbb]);
        let payload = frame.sub(4..6);
        let mut reader = ByteReader::new(&payload);
        assert_eq!(reader.read_be::<u8>(), 0xaa);
        assert_eq!(reader.last_range(), 4..5);
    }

    #[test]
    fn short_read_returns_zero_and_sticks() {
        let input = Slice::new(vec![0xff, 0xff, 0xff]);
        let mut reader = ByteReader::new(&input);
        assert_eq!(reader.read_be::<u16>(), 0xffff);
        assert_eq!(reader.read_be::<u32>(), 0);
        assert!(reader.last_error());
        assert_eq!(reader.last_range(), 2..3);
        assert_eq!(reader.position(), 3);

        assert_eq!(reader.read_be::<u8>(), 0);
        assert!(reader.last_error());
        assert_eq!(reader.last_range(), 3..3);
    }

    #[test]
    fn short_slice_is_empty() {
        let input = Slice::new(vec![1u8, 2, 3]);
        let mut reader = ByteReader::new(&input);
        let slice = reader.slice(16);
        assert!(slice.is_empty());
        assert!(reader.last_error());
        assert_eq!(reader.last_range(), 0..3);
    }

    #[test]
    fn remainder_of_clean_reader_is_not_an_error() {
        let input = Slice::new(vec![1u8, 2]);
        let mut reader = ByteReader::new(&input);
        reader.skip(2);
        let rest = reader.remainder();
        assert!(rest.is_empty());
        assert!(!reader.last_error());
    }

    #[test]
    fn signed_reads() {
        let input = Slice::new(vec![0xff, 0xfe]);
        let mut reader = ByteReader::new(&input);
        assert_eq!(reader.read_be::<i16>(), -2);
    }

    proptest! {
        #[test]
        fn short_input_flags_error_and_cursor_hits_end(data in proptest::collection::vec(any::<u8>(), 0..8)) {
            let input = Slice::new(data.clone());
            let mut reader = ByteReader::new(&input);
            let value = reader.read_be::<u64>();
            prop_assert_eq!(value, 0);
            prop_assert!(reader.last_error());
            prop_assert_eq!(reader.position(), data.len());
            prop_assert_eq!(reader.last_range(), 0..data.len());
        }
    }
}
