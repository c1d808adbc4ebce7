//! Result records appended as units of work complete
//!
//! ```text
//! +-------------------+
//! | Work ID (u64)     |
//! +-------------------+
//! | Payload           | (length-prefixed bytes, opaque to the log)
//! +-------------------+
//! ```

use std::io::{self, Read, Write};

use crate::codec::Codec;

/// A completed unit of work that can be checkpointed.
///
/// The work id tells a resuming run which units are already done.
pub trait WorkRecord: Codec {
    fn work_id(&self) -> u64;
}

/// Default record type: a work id plus caller-defined bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRecord {
    pub work_id: u64,
    pub payload: Vec<u8>,
}

impl ResultRecord {
    pub fn new(work_id: u64, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            work_id,
            payload: payload.into(),
        }
    }
}

impl Codec for ResultRecord {
    fn encode<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<usize> {
        Ok(self.work_id.encode(writer)? + self.payload.encode(writer)?)
    }

    fn decode<R: Read + ?Sized>(reader: &mut R) -> io::Result<(Self, usize)> {
        let (work_id, a) = u64::decode(reader)?;
        let (payload, b) = Vec::<u8>::decode(reader)?;
        Ok((Self { work_id, payload }, a + b))
    }
}

impl WorkRecord for ResultRecord {
    fn work_id(&self) -> u64 {
        self.work_id
    }
}
