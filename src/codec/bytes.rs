//! Length-prefixed encodings for strings and byte buffers
//!
//! ```text
//! +----------------------+
//! | Length (u64, native) |
//! +----------------------+
//! | Raw bytes            | (exactly Length bytes, no terminator)
//! +----------------------+
//! ```
//!
//! Both segments are written with `write_all`, so a short write of the
//! payload is reported just like a short write of the length.

use std::io::{self, Read, Write};

use super::{invalid_data, Codec};
#[cfg(test)]
use super::LENGTH_PREFIX_SIZE;

fn encode_prefixed<W: Write + ?Sized>(writer: &mut W, data: &[u8]) -> io::Result<usize> {
    let written = (data.len() as u64).encode(writer)?;
    writer.write_all(data)?;
    Ok(written + data.len())
}

/// Reads a length prefix and then exactly that many bytes.
///
/// The buffer grows with the bytes actually present, so a garbled length
/// cannot force a huge allocation up front.
fn decode_prefixed<R: Read + ?Sized>(reader: &mut R) -> io::Result<(Vec<u8>, usize)> {
    let (length, prefix) = u64::decode(reader)?;
    if length == 0 {
        return Ok((Vec::new(), prefix));
    }

    let expected = usize::try_from(length)
        .map_err(|_| invalid_data(format!("Length prefix too large: {}", length)))?;

    let mut buf = Vec::new();
    Read::take(&mut *reader, length).read_to_end(&mut buf)?;
    if buf.len() != expected {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("Expected {} bytes, got {}", expected, buf.len()),
        ));
    }

    Ok((buf, prefix + expected))
}

impl Codec for String {
    fn encode<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<usize> {
        encode_prefixed(writer, self.as_bytes())
    }

    fn decode<R: Read + ?Sized>(reader: &mut R) -> io::Result<(Self, usize)> {
        let (buf, n) = decode_prefixed(reader)?;
        let text = String::from_utf8(buf)
            .map_err(|e| invalid_data(format!("Invalid UTF-8: {}", e)))?;
        Ok((text, n))
    }
}

impl Codec for Vec<u8> {
    fn encode<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<usize> {
        encode_prefixed(writer, self)
    }

    fn decode<R: Read + ?Sized>(reader: &mut R) -> io::Result<(Self, usize)> {
        decode_prefixed(reader)
    }
}

/// Encoded size of a length-prefixed string.
#[cfg(test)]
pub(crate) fn encoded_len(text: &str) -> usize {
    LENGTH_PREFIX_SIZE + text.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct ShortWriter {
        capacity: usize,
        written: usize,
    }

    impl Write for ShortWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = buf.len().min(self.capacity - self.written);
            self.written += n;
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_empty_string_consumes_only_length() {
        let buf = String::new().to_bytes().unwrap();
        assert_eq!(buf.len(), LENGTH_PREFIX_SIZE);

        let (text, n) = String::decode(&mut Cursor::new(&buf)).unwrap();
        assert!(text.is_empty());
        assert_eq!(n, LENGTH_PREFIX_SIZE);
    }

    #[test]
    fn test_embedded_zero_bytes_survive() {
        let original = "tree\0file\0.nwk".to_string();
        let buf = original.to_bytes().unwrap();
        assert_eq!(buf.len(), encoded_len(&original));

        let (decoded, n) = String::decode(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(decoded, original);
        assert_eq!(decoded.len(), 14);
        assert_eq!(n, buf.len());
    }

    #[test]
    fn test_no_terminator_written() {
        let buf = "ab".to_string().to_bytes().unwrap();
        assert_eq!(&buf[LENGTH_PREFIX_SIZE..], b"ab");
    }

    #[test]
    fn test_byte_buffer_any_values() {
        let original: Vec<u8> = (0..=255u8).collect();
        let buf = original.to_bytes().unwrap();
        let (decoded, n) = Vec::<u8>::decode(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(decoded, original);
        assert_eq!(n, LENGTH_PREFIX_SIZE + 256);
    }

    #[test]
    fn test_truncated_string_is_unexpected_eof() {
        let mut buf = "abcdef".to_string().to_bytes().unwrap();
        buf.truncate(buf.len() - 2);
        let err = String::decode(&mut Cursor::new(&buf)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_garbled_length_does_not_overread() {
        let mut buf = (u64::MAX / 2).to_bytes().unwrap();
        buf.extend_from_slice(b"short");
        let err = Vec::<u8>::decode(&mut Cursor::new(&buf)).unwrap_err();
        assert!(matches!(
            err.kind(),
            io::ErrorKind::UnexpectedEof | io::ErrorKind::InvalidData
        ));
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let buf = vec![0xFFu8, 0xFE].to_bytes().unwrap();
        let err = String::decode(&mut Cursor::new(&buf)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_short_payload_write_is_reported() {
        // Room for the length field but not the payload
        let mut writer = ShortWriter {
            capacity: LENGTH_PREFIX_SIZE + 2,
            written: 0,
        };
        let err = "payload".to_string().encode(&mut writer).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WriteZero);
    }
}
