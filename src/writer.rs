//! The active generation writer: the single, exclusively-owned tail of the translog.

use std::{
    fs::{File, OpenOptions},
    io::Write as _,
    os::unix::fs::FileExt,
    path::{Path, PathBuf},
};

use parking_lot::Mutex;
use snafu::ResultExt;

use crate::{
    error::{IoSnafu, TranslogError},
    op::{self, Operation},
    reader::{self, HEADER_LEN},
    Location,
};

/// How the writer flushes appended bytes through to the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterType {
    /// Every append is written through to the file immediately.
    Simple,
    /// Appends accumulate in memory and are flushed once they reach the configured buffer size.
    Buffered,
}

struct State {
    file: File,
    /// Bytes of the record stream (past the header) already passed to `write`, whether or not
    /// they have been `fsync`'d yet.
    flushed_offset: u64,
    /// Bytes `fsync`'d so far. Always `<= flushed_offset`.
    synced_offset: u64,
    /// Appended bytes not yet passed to `write`. A single record is always either wholly in this
    /// buffer or wholly flushed — flushing always drains the whole buffer, so no record ever
    /// straddles the boundary.
    buffer: Vec<u8>,
    buffer_size: usize,
    writer_type: WriterType,
    num_ops: u64,
}

impl State {
    fn written_offset(&self) -> u64 {
        self.flushed_offset + self.buffer.len() as u64
    }

    fn flush(&mut self, path: &Path) -> Result<(), TranslogError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.file
            .write_all(&self.buffer)
            .context(IoSnafu { path: path.to_path_buf() })?;
        self.flushed_offset += self.buffer.len() as u64;
        self.buffer.clear();
        Ok(())
    }

    fn sync(&mut self, path: &Path) -> Result<(), TranslogError> {
        self.flush(path)?;
        self.file.sync_all().context(IoSnafu { path: path.to_path_buf() })?;
        self.synced_offset = self.flushed_offset;
        Ok(())
    }
}

/// The currently-writable generation. Exclusively owned by the translog manager; becomes a
/// [`crate::reader::Reader`] once rolled.
pub struct Writer {
    path: PathBuf,
    generation: u64,
    state: Mutex<State>,
}

impl Writer {
    /// Creates a brand new generation file at `path`, writes its header, and returns a writer
    /// ready to accept appends.
    pub fn create(
        path: PathBuf,
        generation: u64,
        writer_type: WriterType,
        buffer_size: usize,
    ) -> Result<Self, TranslogError> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .context(IoSnafu { path: path.clone() })?;
        reader::write_header(&mut file, generation).context(IoSnafu { path: path.clone() })?;

        Ok(Writer {
            path,
            generation,
            state: Mutex::new(State {
                file,
                flushed_offset: 0,
                synced_offset: 0,
                buffer: Vec::with_capacity(buffer_size.min(1 << 20)),
                buffer_size,
                writer_type,
                num_ops: 0,
            }),
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn total_operations(&self) -> u64 {
        self.state.lock().num_ops
    }

    pub fn size_in_bytes(&self) -> u64 {
        self.state.lock().written_offset()
    }

    pub fn writer_type(&self) -> WriterType {
        self.state.lock().writer_type
    }

    pub fn buffer_size(&self) -> usize {
        self.state.lock().buffer_size
    }

    /// Appends an already-encoded record and returns its location. The record is guaranteed to
    /// be wholly written to the in-memory buffer (and flushed through, for [`WriterType::Simple`])
    /// before this returns; it is not necessarily `fsync`'d — see [`Writer::sync`].
    pub fn append(&self, encoded: &[u8]) -> Result<Location, TranslogError> {
        let mut state = self.state.lock();
        let offset = state.written_offset();
        let size = encoded.len() as u64;

        state.buffer.extend_from_slice(encoded);
        state.num_ops += 1;

        let should_flush = match state.writer_type {
            WriterType::Simple => true,
            WriterType::Buffered => state.buffer.len() >= state.buffer_size,
        };
        if should_flush {
            state.flush(&self.path)?;
        }

        Ok(Location::new(self.generation, offset, size))
    }

    /// Flushes any buffered bytes and `fsync`s the file. Idempotent.
    pub fn sync(&self) -> Result<(), TranslogError> {
        self.state.lock().sync(&self.path)
    }

    /// Syncs only if `offset` has not already been synced; returns whether a sync was performed.
    pub fn sync_up_to(&self, offset: u64) -> Result<bool, TranslogError> {
        let needs_sync = self.state.lock().synced_offset < offset;
        if needs_sync {
            self.sync()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn sync_needed(&self) -> bool {
        let state = self.state.lock();
        state.synced_offset < state.written_offset()
    }

    /// Resizes the append buffer, flushing first so no buffered bytes are lost to a smaller
    /// capacity. Also allows switching between [`WriterType::Simple`] and
    /// [`WriterType::Buffered`] at runtime.
    pub fn update_buffer(&self, writer_type: WriterType, buffer_size: usize) -> Result<(), TranslogError> {
        let mut state = self.state.lock();
        state.flush(&self.path)?;
        state.writer_type = writer_type;
        state.buffer_size = buffer_size;
        Ok(())
    }

    /// Reads one record written by this writer. The record may still be sitting in the
    /// in-memory buffer (not yet flushed to the file).
    pub fn read_at(&self, offset: u64, size: u64) -> Result<Operation, TranslogError> {
        let state = self.state.lock();
        let bytes = if offset + size <= state.flushed_offset {
            drop(state);
            self.read_flushed(offset, size)?
        } else {
            let buffer_start = (offset - state.flushed_offset) as usize;
            let buffer_end = buffer_start + size as usize;
            state.buffer[buffer_start..buffer_end].to_vec()
        };
        op::decode(&bytes).map_err(|e| TranslogError::from_codec(self.generation, offset, e))
    }

    fn read_flushed(&self, offset: u64, size: u64) -> Result<Vec<u8>, TranslogError> {
        let state = self.state.lock();
        let mut buf = vec![0u8; size as usize];
        state
            .file
            .read_at(&mut buf, HEADER_LEN + offset)
            .context(IoSnafu { path: self.path.clone() })?;
        Ok(buf)
    }

    /// A byte-for-byte copy of everything appended so far (flushed and still-buffered), used to
    /// build a point-in-time snapshot source for the active generation.
    pub fn snapshot_bytes(&self) -> Result<Vec<u8>, TranslogError> {
        let state = self.state.lock();
        let mut bytes = vec![0u8; state.flushed_offset as usize];
        if state.flushed_offset > 0 {
            state
                .file
                .read_at(&mut bytes, HEADER_LEN)
                .context(IoSnafu { path: self.path.clone() })?;
        }
        bytes.extend_from_slice(&state.buffer);
        Ok(bytes)
    }

    /// Flushes, `fsync`s, writes the trailing operation-count footer, and hands back the
    /// underlying file so the caller (the translog manager) can wrap it in a
    /// [`crate::channel::Channel`] and open it as an immutable [`crate::reader::Reader`]. The
    /// writer is consumed: once rolled, no further appends are possible.
    pub fn close_for_roll(self) -> Result<(File, u64), TranslogError> {
        let mut state = self.state.into_inner();
        state.sync(&self.path)?;
        reader::write_footer(&mut state.file, state.num_ops).context(IoSnafu {
            path: self.path.clone(),
        })?;
        state
            .file
            .sync_all()
            .context(IoSnafu { path: self.path.clone() })?;
        Ok((state.file, state.num_ops))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_writer(dir: &std::path::Path, generation: u64) -> Writer {
        let path = dir.join(reader::file_name(generation));
        Writer::create(path, generation, WriterType::Buffered, 64 * 1024).unwrap()
    }

    #[test]
    fn append_then_read_is_byte_identical() {
        let dir = tempdir::TempDir::new("translog-writer").unwrap();
        let writer = temp_writer(dir.path(), 1);
        let op = Operation::Delete(crate::op::DeleteOperation {
            uid_field: "_uid".into(),
            uid_text: "doc#a".into(),
            version: 1,
            version_type: crate::op::VersionType::Internal,
        });
        let encoded = op::encode(&op);
        let loc = writer.append(&encoded).unwrap();
        let read_back = writer.read_at(loc.offset, loc.size).unwrap();
        assert_eq!(read_back, op);
    }

    #[test]
    fn simple_writer_flushes_every_append() {
        let dir = tempdir::TempDir::new("translog-writer-simple").unwrap();
        let path = dir.path().join(reader::file_name(1));
        let writer = Writer::create(path, 1, WriterType::Simple, 64 * 1024).unwrap();
        let encoded = op::encode(&Operation::Delete(crate::op::DeleteOperation {
            uid_field: "_uid".into(),
            uid_text: "a".into(),
            version: 1,
            version_type: crate::op::VersionType::Internal,
        }));
        writer.append(&encoded).unwrap();
        assert!(!writer.sync_needed() || writer.state.lock().flushed_offset > 0);
    }

    #[test]
    fn sync_up_to_is_a_no_op_when_already_synced() {
        let dir = tempdir::TempDir::new("translog-writer-sync").unwrap();
        let writer = temp_writer(dir.path(), 1);
        let encoded = op::encode(&Operation::Delete(crate::op::DeleteOperation {
            uid_field: "_uid".into(),
            uid_text: "a".into(),
            version: 1,
            version_type: crate::op::VersionType::Internal,
        }));
        let loc = writer.append(&encoded).unwrap();
        assert!(writer.sync_up_to(loc.end_offset()).unwrap());
        assert!(!writer.sync_up_to(loc.end_offset()).unwrap());
    }

    #[test]
    fn close_for_roll_produces_a_footer_readable_by_reader() {
        let dir = tempdir::TempDir::new("translog-writer-roll").unwrap();
        let writer = temp_writer(dir.path(), 1);
        let path = writer.path().to_path_buf();
        let encoded = op::encode(&Operation::Delete(crate::op::DeleteOperation {
            uid_field: "_uid".into(),
            uid_text: "a".into(),
            version: 1,
            version_type: crate::op::VersionType::Internal,
        }));
        writer.append(&encoded).unwrap();
        let (file, num_ops) = writer.close_for_roll().unwrap();
        assert_eq!(num_ops, 1);
        drop(file);

        let reader = crate::reader::Reader::open(path, 1, None).unwrap();
        assert_eq!(reader.total_operations(), Some(1));
    }
}
