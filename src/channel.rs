//! Reference-counted handle to an on-disk generation file.
//!
//! A [`Channel`] wraps the read-only file descriptor for one generation. It is cheaply [`Clone`]
//! (an `Arc` bump) and every clone — held by a reader, a snapshot, a view, or the manager's
//! committing slot — keeps the underlying file open. When the last clone is dropped, the
//! channel's release hook runs; the manager uses that hook to delete generation files once they
//! fall below the retention watermark (see `TranslogShared::handle_channel_release`).
//!
//! The hook is installed as a plain closure holding a [`std::sync::Weak`] reference back to the
//! manager's shared state, never a strong back-pointer, so a channel outliving the manager (e.g.
//! in a detached snapshot) does not keep the manager's resources alive and does not panic when
//! the manager is long gone.

use std::{
    fs::File,
    io,
    os::unix::fs::FileExt,
    path::{Path, PathBuf},
    sync::Arc,
};

/// Invoked with `(generation, path)` exactly once, when the last reference to a channel is
/// dropped.
pub type ReleaseHook = Box<dyn Fn(u64, &Path) + Send + Sync>;

struct ChannelInner {
    file: File,
    path: PathBuf,
    generation: u64,
    release: Option<ReleaseHook>,
}

impl Drop for ChannelInner {
    fn drop(&mut self) {
        if let Some(hook) = self.release.take() {
            hook(self.generation, &self.path);
        }
    }
}

#[derive(Clone)]
pub struct Channel(Arc<ChannelInner>);

impl Channel {
    /// Wraps an already-open file as a channel for `generation`, running `release` when the last
    /// clone of the returned channel is dropped.
    pub fn new(file: File, path: PathBuf, generation: u64, release: Option<ReleaseHook>) -> Self {
        Channel(Arc::new(ChannelInner {
            file,
            path,
            generation,
            release,
        }))
    }

    /// Opens `path` read-only as a fresh channel, independent of any other open handle to the
    /// same file.
    pub fn open_read_only(
        path: PathBuf,
        generation: u64,
        release: Option<ReleaseHook>,
    ) -> io::Result<Self> {
        let file = File::open(&path)?;
        Ok(Self::new(file, path, generation, release))
    }

    pub fn generation(&self) -> u64 {
        self.0.generation
    }

    pub fn path(&self) -> &Path {
        &self.0.path
    }

    pub fn size(&self) -> io::Result<u64> {
        self.0.file.metadata().map(|m| m.len())
    }

    /// Positioned read: does not disturb any other reader's notion of "current position" since
    /// it never seeks the shared file descriptor.
    pub fn read_at(&self, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        let n = self.0.file.read_at(&mut buf, offset)?;
        if n != len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "short read at offset {offset} in {}: wanted {len} bytes, got {n}",
                    self.0.path.display()
                ),
            ));
        }
        Ok(buf)
    }

    /// How many outstanding references (readers, snapshots, views, the committing slot) exist to
    /// this generation's file, including this one.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("generation", &self.0.generation)
            .field("path", &self.0.path)
            .field("ref_count", &self.ref_count())
            .finish()
    }
}
