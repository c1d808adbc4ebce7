//! Independent read view over an open checkpoint file
//!
//! Replay must not disturb the append handle, so it reads through
//! positioned reads with its own offset instead of seeking the shared
//! descriptor.

use std::fs::File;
use std::io::{self, Read};
use std::os::unix::fs::FileExt;

/// Sequential reader over `file` with a private position.
#[derive(Debug)]
pub struct FileCursor<'a> {
    file: &'a File,
    offset: u64,
}

impl<'a> FileCursor<'a> {
    /// Starts a cursor at `offset` bytes into `file`.
    pub fn at(file: &'a File, offset: u64) -> Self {
        Self { file, offset }
    }
}

impl Read for FileCursor<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.file.read_at(buf, self.offset)?;
        self.offset += n as u64;
        Ok(n)
    }
}
