//! Immutable reader over one closed (or closing) generation file.

use std::{
    fs::File,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use once_cell::sync::Lazy;
use regex::Regex;
use snafu::ResultExt;

use crate::{
    channel::{Channel, ReleaseHook},
    error::{IoSnafu, TranslogError},
    op::{self, Operation},
};

/// `translog-<N>.tlog`, or `translog-<N>.recovering` for a generation found mid-recovery.
pub const FILE_NAME_PREFIX: &str = "translog-";
pub const FILE_NAME_SUFFIX: &str = ".tlog";

static FILE_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^translog-(\d+)(\.recovering|\.tlog)?$").expect("valid regex"));

pub const HEADER_MAGIC: u32 = 0x544C_4731;
pub const HEADER_LEN: u64 = 4 + 8; // magic + generation
pub const FOOTER_MAGIC: u32 = 0x544C_4746;
pub const FOOTER_LEN: u64 = 8 + 4; // num_ops + magic

/// Extracts the generation id from a translog file name, per the `translog-(\d+)(\.recovering|\.tlog)?` pattern.
pub fn parse_generation(file_name: &str) -> Option<u64> {
    FILE_NAME_PATTERN
        .captures(file_name)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

pub fn file_name(generation: u64) -> String {
    format!("{FILE_NAME_PREFIX}{generation}{FILE_NAME_SUFFIX}")
}

/// Writes the fixed file header for a brand new generation. Called by the writer at creation.
pub fn write_header(file: &mut File, generation: u64) -> std::io::Result<()> {
    use std::io::Write;
    let mut buf = [0u8; HEADER_LEN as usize];
    buf[0..4].copy_from_slice(&HEADER_MAGIC.to_be_bytes());
    buf[4..12].copy_from_slice(&generation.to_be_bytes());
    file.write_all(&buf)
}

/// Writes the trailing footer recording how many operations this generation holds. Called by the
/// writer when it rolls (becomes immutable).
pub fn write_footer(file: &mut File, num_ops: u64) -> std::io::Result<()> {
    use std::io::Write;
    let mut buf = [0u8; FOOTER_LEN as usize];
    buf[0..8].copy_from_slice(&num_ops.to_be_bytes());
    buf[8..12].copy_from_slice(&FOOTER_MAGIC.to_be_bytes());
    file.write_all(&buf)
}

/// A closed generation file, opened for random and sequential reads.
#[derive(Clone)]
pub struct Reader {
    channel: Channel,
    /// `Some(n)` once this generation's record count is known without a full scan: either it was
    /// rolled with a footer, or a prior scan already computed it.
    total_operations: OnceLock<Option<u64>>,
    /// Byte size of the record stream, excluding header and footer.
    data_len: u64,
}

impl Reader {
    /// Opens `path` as a reader for `generation`, validating the header and detecting whether a
    /// footer (and thus a known operation count) is present.
    pub fn open(path: PathBuf, generation: u64, release: Option<ReleaseHook>) -> Result<Self, TranslogError> {
        let channel = Channel::open_read_only(path.clone(), generation, release)
            .context(IoSnafu { path: path.clone() })?;
        Self::from_channel(channel)
    }

    pub(crate) fn from_channel(channel: Channel) -> Result<Self, TranslogError> {
        let path = channel.path().to_path_buf();
        let file_size = channel.size().context(IoSnafu { path: path.clone() })?;
        if file_size < HEADER_LEN {
            return Err(TranslogError::ConstructionFailed {
                path,
                reason: "file is smaller than the translog header".to_string(),
            });
        }
        let header = channel
            .read_at(0, HEADER_LEN as usize)
            .context(IoSnafu { path: path.clone() })?;
        let magic = u32::from_be_bytes(header[0..4].try_into().unwrap());
        if magic != HEADER_MAGIC {
            return Err(TranslogError::ConstructionFailed {
                path,
                reason: "translog header magic mismatch".to_string(),
            });
        }
        let header_generation = u64::from_be_bytes(header[4..12].try_into().unwrap());
        if header_generation != channel.generation() {
            return Err(TranslogError::ConstructionFailed {
                path,
                reason: format!(
                    "file name generation {} does not match header generation {}",
                    channel.generation(),
                    header_generation
                ),
            });
        }

        let (total_operations, data_len) = if file_size >= HEADER_LEN + FOOTER_LEN {
            let footer_offset = file_size - FOOTER_LEN;
            let footer = channel
                .read_at(footer_offset, FOOTER_LEN as usize)
                .context(IoSnafu { path: path.clone() })?;
            let footer_magic = u32::from_be_bytes(footer[8..12].try_into().unwrap());
            if footer_magic == FOOTER_MAGIC {
                let num_ops = u64::from_be_bytes(footer[0..8].try_into().unwrap());
                (Some(num_ops), footer_offset - HEADER_LEN)
            } else {
                (None, file_size - HEADER_LEN)
            }
        } else {
            (None, file_size - HEADER_LEN)
        };

        let cell = OnceLock::new();
        let _ = cell.set(total_operations);
        Ok(Reader {
            channel,
            total_operations: cell,
            data_len,
        })
    }

    pub fn generation(&self) -> u64 {
        self.channel.generation()
    }

    pub fn path(&self) -> &Path {
        self.channel.path()
    }

    /// Size, in bytes, of the record stream (excluding header/footer).
    pub fn size_in_bytes(&self) -> u64 {
        self.data_len
    }

    /// `None` means the count is not known without a full scan (the generation was never
    /// finalized with a footer, e.g. a crash mid-write recovered before any roll).
    pub fn total_operations(&self) -> Option<u64> {
        *self.total_operations.get().unwrap_or(&None)
    }

    /// Random read of one record at `offset` (relative to the start of the record stream, i.e.
    /// not counting the header).
    pub fn read_at(&self, offset: u64, size: u64) -> Result<Operation, TranslogError> {
        let absolute = HEADER_LEN + offset;
        let bytes = self
            .channel
            .read_at(absolute, size as usize)
            .context(IoSnafu {
                path: self.path().to_path_buf(),
            })?;
        op::decode(&bytes).map_err(|e| TranslogError::from_codec(self.generation(), offset, e))
    }

    /// A forward, sequential iterator over every record in this generation, starting just past
    /// the header.
    pub fn channel_snapshot(&self) -> ReaderIterator {
        ReaderIterator {
            reader: self.clone(),
            // Read the remaining record stream once; generations are bounded in size, so a
            // single positioned read is simpler and no less correct than re-reading per record.
            buffer: None,
            cursor: 0,
            done: false,
        }
    }

    pub(crate) fn channel(&self) -> &Channel {
        &self.channel
    }
}

/// Forward-only iterator over the records of one [`Reader`].
///
/// Yields `Ok(op)` for each well-formed record, then either ends cleanly (the generation was
/// fully consumed) or yields one final `Err` if the tail is truncated or corrupted, after which
/// the iterator is exhausted.
pub struct ReaderIterator {
    reader: Reader,
    buffer: Option<Vec<u8>>,
    cursor: u64,
    done: bool,
}

impl ReaderIterator {
    fn ensure_buffered(&mut self) -> Result<(), TranslogError> {
        if self.buffer.is_none() {
            let remaining = self.reader.data_len - self.cursor;
            let bytes = self
                .reader
                .channel
                .read_at(HEADER_LEN + self.cursor, remaining as usize)
                .context(IoSnafu {
                    path: self.reader.path().to_path_buf(),
                })?;
            self.buffer = Some(bytes);
        }
        Ok(())
    }
}

impl Iterator for ReaderIterator {
    type Item = Result<Operation, TranslogError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Err(e) = self.ensure_buffered() {
            self.done = true;
            return Some(Err(e));
        }
        let buf = self.buffer.as_ref().expect("buffered above");
        let remaining = &buf[self.cursor as usize..];

        if remaining.is_empty() {
            self.done = true;
            return None;
        }

        match op::decode(remaining) {
            Ok(operation) => {
                let consumed = op::encoded_len(&operation);
                self.cursor += consumed as u64;
                Some(Ok(operation))
            }
            Err(e) => {
                self.done = true;
                Some(Err(TranslogError::from_codec(
                    self.reader.generation(),
                    self.cursor,
                    e,
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_generation_from_plain_and_recovering_names() {
        assert_eq!(parse_generation("translog-1.tlog"), Some(1));
        assert_eq!(parse_generation("translog-42.recovering"), Some(42));
        assert_eq!(parse_generation("translog-7"), Some(7));
        assert_eq!(parse_generation("translog.ckp"), None);
        assert_eq!(parse_generation("not-a-translog-1.tlog"), None);
    }

    #[test]
    fn file_name_round_trips_through_parser() {
        let name = file_name(123);
        assert_eq!(parse_generation(&name), Some(123));
    }
}
