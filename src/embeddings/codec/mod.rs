//! Byte layout for embedding vectors in storage and on the wire.
//!
//! Each component is written as the IEEE-754 bit pattern of an `f32` in
//! [`BYTE_ORDER`], four bytes per component and no header. Vector stores that
//! accept raw-bytes vector parameters read FLOAT32 blobs little-endian, so the
//! order is fixed here instead of following the host.


use crate::{RagError, Result};

/// Bytes used by one encoded component
pub const BYTES_PER_COMPONENT: usize = 4;

/// Byte order of encoded components
pub const BYTE_ORDER: ByteOrder = ByteOrder::LittleEndian;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    LittleEndian,
    BigEndian,
}

/// An embedding vector packed into its storage representation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EncodedVector(Vec<u8>);

impl EncodedVector {
    /// Wrap bytes that are already in the encoded layout
    #[inline]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[inline]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decode back into components, checking the expected dimensionality
    #[inline]
    pub fn decode(&self, dimension: usize) -> Result<Vec<f32>> {
        decode(&self.0, dimension)
    }
}

impl AsRef<[u8]> for EncodedVector {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Pack a vector into `4 * vector.len()` bytes
#[inline]
pub fn encode(vector: &[f32]) -> EncodedVector {
    let mut bytes = Vec::with_capacity(vector.len() * BYTES_PER_COMPONENT);
    for component in vector {
        let packed = match BYTE_ORDER {
            ByteOrder::LittleEndian => component.to_le_bytes(),
            ByteOrder::BigEndian => component.to_be_bytes(),
        };
        bytes.extend_from_slice(&packed);
    }
    EncodedVector(bytes)
}

/// Unpack `bytes` into exactly `dimension` components
#[inline]
pub fn decode(bytes: &[u8], dimension: usize) -> Result<Vec<f32>> {
    let expected = encoded_len(dimension);
    if bytes.len() != expected {
        return Err(RagError::LengthMismatch {
            context: "vector decode".to_string(),
            expected,
            actual: bytes.len(),
        });
    }

    Ok(bytes
        .chunks_exact(BYTES_PER_COMPONENT)
        .map(|chunk| {
            let word = [chunk[0], chunk[1], chunk[2], chunk[3]];
            match BYTE_ORDER {
                ByteOrder::LittleEndian => f32::from_le_bytes(word),
                ByteOrder::BigEndian => f32::from_be_bytes(word),
            }
        })
        .collect())
}

/// Encoded size in bytes of a vector with `dimension` components
#[inline]
pub fn encoded_len(dimension: usize) -> usize {
    dimension * BYTES_PER_COMPONENT
}
