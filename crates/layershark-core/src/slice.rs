use std::fmt;
use std::ops::Range;

use bytes::Bytes;

/// Immutable view into a frame buffer.
///
/// Cloning is cheap: the underlying buffer is reference counted and never
/// copied. `range()` is absolute within the frame the buffer came from.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Slice {
    data: Bytes,
    offset: usize,
}

impl Slice {
    /// Wrap a whole frame buffer, starting at offset 0.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            offset: 0,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Absolute offset of the first byte.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Absolute byte range covered by this slice.
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.data.len()
    }

    /// Sub-slice by range relative to this slice, clamped to its bounds.
    pub fn sub(&self, range: Range<usize>) -> Slice {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        Self {
            data: self.data.slice(start..end),
            offset: self.offset + start,
        }
    }

    /// Empty slice positioned at the end of this one.
    pub fn tail(&self) -> Slice {
        self.sub(self.len()..self.len())
    }
}

impl From<Vec<u8>> for Slice {
    fn from(value: Vec<u8>) -> Self {
        Self::new(value)
    }
}

impl From<&'static [u8]> for Slice {
    fn from(value: &'static [u8]) -> Self {
        Self::new(Bytes::from_static(value))
    }
}

impl fmt::Debug for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Slice({:?}, {:02x?})", self.range(), self.as_bytes())
    }
}

/// Lowercase hex rendering of a byte slice.
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::{Slice, to_hex};

    #[test]
    fn sub_tracks_absolute_offset() {
        let slice = Slice::new(vec![0u8, 1, 2, 3, 4, 5]);
        let inner = slice.sub(2..5);
        assert_eq!(inner.as_bytes(), &[2, 3, 4]);
        assert_eq!(inner.range(), 2..5);
        let nested = inner.sub(1..2);
        assert_eq!(nested.range(), 3..4);
    }

    #[test]
    fn sub_clamps_out_of_range() {
        let slice = Slice::new(vec![0u8; 4]);
        let clamped = slice.sub(2..10);
        assert_eq!(clamped.range(), 2..4);
        let beyond = slice.sub(8..12);
        assert!(beyond.is_empty());
        assert_eq!(beyond.offset(), 4);
    }

    #[test]
    fn hex_rendering() {
        assert_eq!(to_hex(&[0xde, 0xad, 0x01]), "dead01");
    }
}
