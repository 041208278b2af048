//! Opaque media segment payloads.

use std::fmt;

use bytes::Bytes;

/// One independently appendable unit of encoded media data.
///
/// The payload is never inspected. Cloning a segment is cheap (reference
/// counted), but the pump always moves segments from the queue into the sink.
#[derive(Clone, PartialEq, Eq)]
pub struct Segment {
    data: Bytes,
}

impl Segment {
    /// Wraps a payload received from the segment source.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Returns payload length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the payload carries no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrows the raw payload.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the segment, yielding its payload.
    pub fn into_bytes(self) -> Bytes {
        self.data
    }
}

impl From<Bytes> for Segment {
    fn from(data: Bytes) -> Self {
        Self::new(data)
    }
}

impl From<Vec<u8>> for Segment {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<&'static [u8]> for Segment {
    fn from(data: &'static [u8]) -> Self {
        Self::new(Bytes::from_static(data))
    }
}

// Payloads can be megabytes; print the size only.
impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_exposes_payload() {
        let segment = Segment::from(vec![1u8, 2, 3]);
        assert_eq!(segment.len(), 3);
        assert!(!segment.is_empty());
        assert_eq!(segment.as_bytes(), &[1, 2, 3]);
        assert_eq!(segment.into_bytes(), Bytes::from_static(&[1, 2, 3]));
    }

    #[test]
    fn test_debug_hides_payload() {
        let segment = Segment::from(&b"moof"[..]);
        assert_eq!(format!("{segment:?}"), "Segment { len: 4 }");
    }
}
