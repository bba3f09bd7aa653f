//! A frozen, forward-only view over a fixed set of generations, taken at one instant.

use std::sync::Arc;

use crate::{
    error::TranslogError,
    op::{self, Operation},
    reader::{Reader, ReaderIterator},
};

/// One generation's contribution to a [`Snapshot`]: either a closed reader shared with the rest
/// of the translog, or a byte-for-byte copy of the active generation's record stream taken at the
/// instant the snapshot was created.
pub(crate) enum SnapshotSource {
    Reader(Reader),
    Current {
        generation: u64,
        bytes: Arc<[u8]>,
        num_ops: u64,
    },
}

impl SnapshotSource {
    /// Builds the `Current` variant from a byte-for-byte copy of the active generation's record
    /// stream, taken at one instant by the caller.
    pub(crate) fn current(generation: u64, bytes: Vec<u8>, num_ops: u64) -> Self {
        SnapshotSource::Current {
            generation,
            bytes: Arc::from(bytes),
            num_ops,
        }
    }

    /// A degenerate `Current` source for a generation that could not be snapshotted (e.g. a
    /// transient I/O failure while copying its bytes); contributes nothing but its generation id.
    pub(crate) fn empty(generation: u64) -> Self {
        SnapshotSource::Current {
            generation,
            bytes: Arc::from(Vec::new()),
            num_ops: 0,
        }
    }

    pub(crate) fn generation(&self) -> u64 {
        match self {
            SnapshotSource::Reader(r) => r.generation(),
            SnapshotSource::Current { generation, .. } => *generation,
        }
    }

    fn total_operations(&self) -> Option<u64> {
        self.total_operations_hint()
    }

    fn size_in_bytes(&self) -> u64 {
        self.size_in_bytes_hint()
    }

    pub(crate) fn total_operations_hint(&self) -> Option<u64> {
        match self {
            SnapshotSource::Reader(r) => r.total_operations(),
            SnapshotSource::Current { num_ops, .. } => Some(*num_ops),
        }
    }

    pub(crate) fn size_in_bytes_hint(&self) -> u64 {
        match self {
            SnapshotSource::Reader(r) => r.size_in_bytes(),
            SnapshotSource::Current { bytes, .. } => bytes.len() as u64,
        }
    }

    fn into_iter_source(self) -> SourceIter {
        match self {
            SnapshotSource::Reader(r) => SourceIter::Reader(r.channel_snapshot()),
            SnapshotSource::Current { generation, bytes, .. } => SourceIter::Current {
                generation,
                bytes,
                cursor: 0,
            },
        }
    }
}

/// Iterates the bytes captured for the active generation the same way [`ReaderIterator`] walks a
/// closed one, so a snapshot's tail behaves identically whether it ends in a rolled generation or
/// the one still being written when the snapshot was taken.
enum SourceIter {
    Reader(ReaderIterator),
    Current {
        generation: u64,
        bytes: Arc<[u8]>,
        cursor: usize,
    },
}

impl Iterator for SourceIter {
    type Item = Result<Operation, TranslogError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            SourceIter::Reader(it) => it.next(),
            SourceIter::Current { generation, bytes, cursor } => {
                let remaining = &bytes[*cursor..];
                if remaining.is_empty() {
                    return None;
                }
                match op::decode(remaining) {
                    Ok(operation) => {
                        *cursor += op::encoded_len(&operation);
                        Some(Ok(operation))
                    }
                    Err(e) => {
                        let offset = *cursor as u64;
                        *cursor = bytes.len();
                        Some(Err(TranslogError::from_codec(*generation, offset, e)))
                    }
                }
            }
        }
    }
}

/// A once-forward iterator over a fixed, ordered set of generations: every record appended to
/// the translog up to the instant the snapshot was created, and nothing appended to the active
/// generation afterward.
///
/// A torn or corrupted tail in one generation ends the whole snapshot at that point, even if a
/// later generation in the set is itself well-formed: callers see a clean prefix followed by at
/// most one error, never a gap.
pub struct Snapshot {
    estimated_total_operations: Option<u64>,
    total_size_in_bytes: u64,
    sources: Vec<SnapshotSource>,
    current: Option<SourceIter>,
}

impl Snapshot {
    pub(crate) fn new(mut sources: Vec<SnapshotSource>) -> Self {
        sources.sort_by_key(SnapshotSource::generation);
        let estimated_total_operations = sources
            .iter()
            .try_fold(0u64, |acc, s| s.total_operations().map(|n| acc + n));
        let total_size_in_bytes = sources.iter().map(SnapshotSource::size_in_bytes).sum();
        Snapshot {
            estimated_total_operations,
            total_size_in_bytes,
            sources,
            current: None,
        }
    }

    /// Sum of every included generation's operation count, or `None` if any of them is not known
    /// without a full scan (an unfinalized generation recovered after a crash).
    pub fn estimated_total_operations(&self) -> Option<u64> {
        self.estimated_total_operations
    }

    pub fn size_in_bytes(&self) -> u64 {
        self.total_size_in_bytes
    }

    /// Releases every channel reference this snapshot holds. Safe to call more than once.
    pub fn close(&mut self) {
        self.sources.clear();
        self.current = None;
    }
}

impl Iterator for Snapshot {
    type Item = Result<Operation, TranslogError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current.is_none() {
                if self.sources.is_empty() {
                    return None;
                }
                let source = self.sources.remove(0);
                self.current = Some(source.into_iter_source());
            }
            match self.current.as_mut().expect("set above").next() {
                Some(Ok(op)) => return Some(Ok(op)),
                Some(Err(e)) => {
                    self.sources.clear();
                    self.current = None;
                    return Some(Err(e));
                }
                None => self.current = None,
            }
        }
    }
}

impl Drop for Snapshot {
    fn drop(&mut self) {
        self.close();
    }
}
