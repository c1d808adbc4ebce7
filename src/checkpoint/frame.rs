//! Checksum envelope around every checkpoint payload
//!
//! Frame format:
//!
//! ```text
//! +--------------------------+
//! | Checksum (u32, native)   | CRC32 over the payload bytes
//! +--------------------------+
//! | Payload                  | Codec layout of the framed type
//! +--------------------------+
//! ```
//!
//! Each frame is verifiable on its own, so a process killed mid-write
//! leaves at most one unusable trailing frame and every earlier frame
//! stays trustworthy.

use std::io::{self, Read, Write};

use super::checksum::{compute_checksum, ChecksumReader};
use super::errors::{CheckpointError, CheckpointResult};
use crate::codec::Codec;

/// Size of the checksum field at the front of every frame.
pub const CHECKSUM_SIZE: usize = 4;

/// Outcome of reading one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameRead<T> {
    /// A verified frame and the number of bytes it occupied.
    Frame { value: T, bytes: usize },
    /// The stream ended cleanly at a frame boundary; zero bytes consumed.
    End,
}

/// Serializes `payload` and prepends its checksum.
pub fn frame_bytes<T: Codec>(payload: &T) -> CheckpointResult<Vec<u8>> {
    let mut body = Vec::new();
    payload
        .encode(&mut body)
        .map_err(|e| CheckpointError::write_failed("Failed to serialize frame payload", e))?;

    let checksum = compute_checksum(&body);
    let mut frame = Vec::with_capacity(CHECKSUM_SIZE + body.len());
    frame.extend_from_slice(&checksum.to_ne_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Writes `[checksum][payload]` and returns the total bytes written.
///
/// The frame goes out in a single `write_all`, so a short write anywhere in
/// it is reported as `CKP_WRITE_FAILED`.
pub fn encode_frame<T: Codec, W: Write + ?Sized>(
    writer: &mut W,
    payload: &T,
) -> CheckpointResult<usize> {
    let frame = frame_bytes(payload)?;
    writer
        .write_all(&frame)
        .map_err(|e| CheckpointError::write_failed("Failed to write checkpoint frame", e))?;
    Ok(frame.len())
}

/// Reads until `buf` is full or the stream ends, returning the bytes read.
fn read_up_to<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Reads and verifies one frame of type `T`.
///
/// `offset` is only used for error context.
///
/// # Returns
///
/// - `Ok(FrameRead::Frame { .. })` for a verified frame
/// - `Ok(FrameRead::End)` if no bytes remain
/// - `Err(CKP_CORRUPTION)` on checksum mismatch, torn or malformed frame;
///   no value is returned and the caller decides whether to stop
/// - `Err(CKP_READ_FAILED)` if the underlying read fails
pub fn decode_frame<T: Codec, R: Read + ?Sized>(
    reader: &mut R,
    offset: u64,
) -> CheckpointResult<FrameRead<T>> {
    let mut checksum_buf = [0u8; CHECKSUM_SIZE];
    let got = read_up_to(reader, &mut checksum_buf)
        .map_err(|e| CheckpointError::read_failed("Failed to read frame checksum", e))?;

    if got == 0 {
        return Ok(FrameRead::End);
    }
    if got < CHECKSUM_SIZE {
        return Err(CheckpointError::torn_frame_at_offset(
            offset,
            format!("Torn frame: {} of {} checksum bytes present", got, CHECKSUM_SIZE),
        ));
    }
    let stored = u32::from_ne_bytes(checksum_buf);

    let mut hashing = ChecksumReader::new(reader);
    let (value, payload_len) = match T::decode(&mut hashing) {
        Ok(decoded) => decoded,
        Err(e) => {
            return Err(match e.kind() {
                io::ErrorKind::UnexpectedEof => CheckpointError::torn_frame_at_offset(
                    offset,
                    format!("Torn frame: payload truncated after {} bytes", hashing.consumed()),
                ),
                io::ErrorKind::InvalidData => CheckpointError::corruption_at_offset(
                    offset,
                    format!("Malformed frame payload: {}", e),
                ),
                _ => CheckpointError::read_failed("Failed to read frame payload", e),
            });
        }
    };

    let computed = hashing.finalize();
    if computed != stored {
        return Err(CheckpointError::corruption_at_offset(
            offset,
            format!(
                "Checksum mismatch: computed {:08x}, stored {:08x}",
                computed, stored
            ),
        ));
    }

    Ok(FrameRead::Frame {
        value,
        bytes: CHECKSUM_SIZE + payload_len,
    })
}
