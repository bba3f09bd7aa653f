//! A long-lived retention handle: keeps a contiguous run of generations — including whatever is
//! current at any given moment — alive for as long as the view itself is held.

use std::sync::{Arc, Mutex as StdMutex, Weak};

use crate::{
    reader::Reader,
    snapshot::{Snapshot, SnapshotSource},
    translog::TranslogShared,
};

/// Backing storage for one view's closed-generation list, shared between the [`View`] handle
/// and the manager's outstanding-views registry so a roll can push the newly-closed generation
/// directly into it without needing the view itself to be reference-counted.
pub(crate) type ViewBacklog = Arc<StdMutex<Vec<Reader>>>;

/// Retains a run of generations so a long-running consumer (a recovery process, a remote
/// replica catching up) can read them on its own schedule, independent of the translog's normal
/// retention policy.
///
/// A view's generation list always ends at whatever generation is current right now: closed
/// generations are tracked explicitly, and the active one is read live from the manager on every
/// call. Dropping a view (or calling [`View::close`] explicitly) releases every channel
/// reference it holds and deregisters it; both are safe to do more than once.
pub struct View {
    shared: Weak<TranslogShared>,
    closed: ViewBacklog,
    id: u64,
}

impl View {
    pub(crate) fn new(shared: Weak<TranslogShared>, closed: ViewBacklog, id: u64) -> Self {
        View { shared, closed, id }
    }

    /// The oldest generation this view still keeps alive.
    pub fn min_generation(&self) -> u64 {
        let closed = self.closed.lock().unwrap();
        match closed.first() {
            Some(r) => r.generation(),
            None => self.shared.upgrade().map(|s| s.current_generation()).unwrap_or(0),
        }
    }

    /// Sum of every retained generation's operation count, or `None` if any of them is unknown
    /// without a full scan.
    pub fn total_operations(&self) -> Option<u64> {
        let closed = self.closed.lock().unwrap();
        let mut total = 0u64;
        for r in closed.iter() {
            total += r.total_operations()?;
        }
        drop(closed);
        let shared = self.shared.upgrade()?;
        total += shared.current_snapshot_source().total_operations_hint()?;
        Some(total)
    }

    pub fn size_in_bytes(&self) -> u64 {
        let closed = self.closed.lock().unwrap();
        let closed_size: u64 = closed.iter().map(Reader::size_in_bytes).sum();
        drop(closed);
        let current_size = self
            .shared
            .upgrade()
            .map(|s| s.current_snapshot_source().size_in_bytes_hint())
            .unwrap_or(0);
        closed_size + current_size
    }

    /// Builds a [`Snapshot`] over this view's current generation list: every closed generation it
    /// retains, plus a fresh, instant-in-time copy of whatever is current right now.
    pub fn snapshot(&self) -> Snapshot {
        let closed = self.closed.lock().unwrap();
        let mut sources: Vec<SnapshotSource> = closed.iter().cloned().map(SnapshotSource::Reader).collect();
        drop(closed);
        if let Some(shared) = self.shared.upgrade() {
            sources.push(shared.current_snapshot_source());
        }
        Snapshot::new(sources)
    }

    /// Releases every channel reference this view holds and deregisters it from the manager.
    /// Safe to call more than once, and safe to race with a concurrent `onNewTranslog` delivery:
    /// whichever readers land in the backlog before or after this call are dropped either way.
    pub fn close(&self) {
        let drained: Vec<Reader> = {
            let mut closed = self.closed.lock().unwrap();
            std::mem::take(&mut *closed)
        };
        if let Some(shared) = self.shared.upgrade() {
            shared.deregister_view(self.id);
        }
        // Dropped here, outside `closed`'s lock: a channel's release hook may need to take the
        // manager's own lock, and that must never happen while a view's lock is held.
        drop(drained);
    }
}

impl Drop for View {
    fn drop(&mut self) {
        self.close();
    }
}
