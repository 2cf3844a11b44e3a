//! WAL Reader
//!
//! Handles reading entries from the WAL file.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::error::{Result, SplayError};

use super::entry::{EntryHeader, HEADER_SIZE, MAX_PAYLOAD_SIZE};
use super::WalEntry;

/// What the reader found at its current position
#[derive(Debug)]
pub(crate) enum NextEntry {
    /// A complete, checksummed entry
    Entry(WalEntry),
    /// Clean end of file
    Eof,
    /// A partially written entry (crash mid-append)
    Torn,
}

/// Reads entries from the WAL file
pub struct WalReader {
    reader: BufReader<File>,
    /// Offset just past the last complete entry
    position: u64,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
        })
    }

    /// Read the next entry from the WAL
    ///
    /// A torn tail reads as end of log; a checksum failure is an error.
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        match self.read_next()? {
            NextEntry::Entry(entry) => Ok(Some(entry)),
            NextEntry::Eof | NextEntry::Torn => Ok(None),
        }
    }

    /// Iterate over all valid entries
    pub fn entries(self) -> WalIterator {
        WalIterator {
            reader: self,
            done: false,
        }
    }

    /// Offset just past the last complete entry read so far
    pub(crate) fn position(&self) -> u64 {
        self.position
    }

    pub(crate) fn read_next(&mut self) -> Result<NextEntry> {
        let mut header_bytes = [0u8; HEADER_SIZE];
        let read = read_full(&mut self.reader, &mut header_bytes)?;
        if read == 0 {
            return Ok(NextEntry::Eof);
        }
        if read < HEADER_SIZE {
            return Ok(NextEntry::Torn);
        }

        let header = EntryHeader::parse(&header_bytes);
        if header.len > MAX_PAYLOAD_SIZE {
            return Err(SplayError::WalCorruption(format!(
                "implausible payload length {} at offset {}",
                header.len, self.position
            )));
        }

        let mut payload = vec![0u8; header.len as usize];
        if read_full(&mut self.reader, &mut payload)? < payload.len() {
            return Ok(NextEntry::Torn);
        }

        let entry = WalEntry::from_parts(header, &payload)?;
        self.position += (HEADER_SIZE + payload.len()) as u64;
        Ok(NextEntry::Entry(entry))
    }
}

/// Iterator over WAL entries
///
/// Yields at most one error, then stops.
pub struct WalIterator {
    reader: WalReader,
    done: bool,
}

impl Iterator for WalIterator {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Fill `buf` as far as the file allows, returning the number of bytes read
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
