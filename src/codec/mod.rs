//! Binary codec for checkpoint payloads
//!
//! Every value that reaches the checkpoint file goes through a [`Codec`]
//! implementation. There is one implementation per concrete type, so every
//! layout decision lives next to the type it describes.
//!
//! # Layout
//!
//! - Fixed-size scalars: raw native-endian bytes
//! - Booleans: one byte, `0` or `1`
//! - Strings and byte buffers: 8-byte native-endian length, then exactly that
//!   many raw bytes (no terminator, embedded zero bytes allowed)
//!
//! The format targets resume on the same class of machine. It is not a
//! cross-platform interchange format.
//!
//! # Failure model
//!
//! - A short write on any segment surfaces as `io::ErrorKind::WriteZero`
//! - A short read surfaces as `io::ErrorKind::UnexpectedEof`
//! - An impossible value (bad boolean, unknown enum tag, invalid UTF-8)
//!   surfaces as `io::ErrorKind::InvalidData`

mod bytes;
mod scalar;

#[cfg(test)]
pub(crate) use bytes::encoded_len;

use std::io::{self, Read, Write};

/// Size in bytes of the length prefix in front of strings and byte buffers.
pub const LENGTH_PREFIX_SIZE: usize = 8;

/// Type-directed encoding to and from a byte stream.
///
/// `encode` returns the number of bytes written; `decode` returns the value
/// and the number of bytes consumed. For every value `v`,
/// `decode(encode(v))` yields `v` and consumes exactly the bytes produced.
pub trait Codec: Sized {
    /// Writes the value to `writer`.
    fn encode<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<usize>;

    /// Reads a value from `reader`.
    fn decode<R: Read + ?Sized>(reader: &mut R) -> io::Result<(Self, usize)>;

    /// Serializes the value into a fresh buffer.
    fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.encode(&mut buf)?;
        Ok(buf)
    }
}

/// Shorthand for building an `InvalidData` error.
pub(crate) fn invalid_data(message: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.into())
}

/// Encodes a one-byte tag for a fieldless enum.
///
/// Used by enum `Codec` implementations so that tag handling stays uniform.
pub fn encode_tag<W: Write + ?Sized>(writer: &mut W, tag: u8) -> io::Result<usize> {
    tag.encode(writer)
}

/// Decodes a one-byte enum tag.
pub fn decode_tag<R: Read + ?Sized>(reader: &mut R) -> io::Result<(u8, usize)> {
    u8::decode(reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[derive(Debug, PartialEq)]
    struct Pair {
        id: u64,
        label: String,
    }

    impl Codec for Pair {
        fn encode<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<usize> {
            Ok(self.id.encode(writer)? + self.label.encode(writer)?)
        }

        fn decode<R: Read + ?Sized>(reader: &mut R) -> io::Result<(Self, usize)> {
            let (id, a) = u64::decode(reader)?;
            let (label, b) = String::decode(reader)?;
            Ok((Self { id, label }, a + b))
        }
    }

    #[test]
    fn test_composite_codec_consumes_what_it_wrote() {
        let pair = Pair {
            id: 42,
            label: "root-7".to_string(),
        };
        let bytes = pair.to_bytes().unwrap();
        assert_eq!(bytes.len(), 8 + LENGTH_PREFIX_SIZE + 6);

        let mut cursor = Cursor::new(&bytes);
        let (decoded, consumed) = Pair::decode(&mut cursor).unwrap();
        assert_eq!(decoded, pair);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn test_tag_helpers() {
        let mut buf = Vec::new();
        assert_eq!(encode_tag(&mut buf, 3).unwrap(), 1);
        let (tag, n) = decode_tag(&mut Cursor::new(&buf)).unwrap();
        assert_eq!((tag, n), (3, 1));
    }
}
