//! The translog manager: the orchestrator tying the writer, readers, checkpoint, snapshots, and
//! views together behind a single reader/writer lock.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, AtomicU8, Ordering},
        Arc, Mutex as StdMutex, Weak,
    },
    time::Duration,
};

use metrics::{counter, gauge};
use parking_lot::RwLock;
use snafu::{OptionExt, ResultExt};

use crate::{
    channel::{Channel, ReleaseHook},
    checkpoint::{self, Checkpoint},
    error::{ConstructionFailedSnafu, IllegalStateSnafu, InvalidLocationSnafu, IoSnafu, TranslogError},
    location::Location,
    op::{self, Operation},
    reader::{self, Reader},
    scheduler::{Scheduler, ScheduledTask},
    settings::{Durability, TranslogConfig},
    snapshot::{Snapshot, SnapshotSource},
    view::{View, ViewBacklog},
    writer::{Writer, WriterType},
};

/// How a translog directory is interpreted at [`Translog::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Wipe the directory and start a brand new generation `1`.
    Create,
    /// Scan the directory for existing generations, replay them as history, and start a fresh
    /// current generation past the highest one found.
    Recover,
    /// Strict: require a checkpoint, open exactly the generation it names, and start the next
    /// generation past it.
    Open,
}

/// A snapshot of the manager's bookkeeping, cheap to take under the read lock.
#[derive(Debug, Clone, Copy)]
pub struct TranslogStats {
    pub current_generation: u64,
    pub current_generation_operations: u64,
    pub current_generation_size_in_bytes: u64,
    pub open_generations: usize,
    pub last_committed_generation: i64,
}

struct State {
    /// `None` only while the translog is closed (after [`Translog::close`]/[`Translog::rollback`],
    /// or transiently mid-roll on the failure path of [`Translog::prepare_commit`]).
    current: Option<Writer>,
    committing: Option<Reader>,
    recovered: Vec<Reader>,
    /// Retention watermark: generations below this are no longer referenced by the manager and
    /// become deletable as their last external reference drops. `-1` means "retain everything".
    last_committed_gen: i64,
}

impl State {
    fn current(&self) -> Result<&Writer, TranslogError> {
        self.current.as_ref().context(IllegalStateSnafu {
            reason: "translog is closed",
        })
    }
}

pub(crate) struct TranslogShared {
    path: PathBuf,
    state: RwLock<State>,
    outstanding_views: StdMutex<HashMap<u64, ViewBacklog>>,
    next_view_id: AtomicU64,
    durability: AtomicU8,
    scheduled_task: StdMutex<Option<Box<dyn ScheduledTask>>>,
}

impl TranslogShared {
    fn durability(&self) -> Durability {
        Durability::from_u8(self.durability.load(Ordering::SeqCst))
    }

    /// A fresh, instant-in-time copy of the active generation's record stream, for use by
    /// [`crate::view::View`], which reads it live rather than holding a static reference.
    pub(crate) fn current_snapshot_source(&self) -> SnapshotSource {
        let state = self.state.read();
        match state.current.as_ref() {
            Some(writer) => writer_snapshot_source(writer).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to snapshot active translog generation for a view");
                SnapshotSource::empty(writer.generation())
            }),
            None => SnapshotSource::empty(0),
        }
    }

    pub(crate) fn current_generation(&self) -> u64 {
        self.state.read().current.as_ref().map(Writer::generation).unwrap_or(0)
    }

    pub(crate) fn deregister_view(&self, id: u64) {
        self.outstanding_views.lock().unwrap().remove(&id);
    }

    /// Runs when the last reference to a generation's channel is dropped. Deletes the file if
    /// it has fallen below the retention watermark; a channel above the watermark (still
    /// referenced logically, just no longer held) is left alone.
    fn handle_channel_release(&self, generation: u64, path: &Path) {
        let last_committed_gen = self.state.write().last_committed_gen;
        if last_committed_gen >= 0 && (generation as i64) < last_committed_gen {
            match fs::remove_file(path) {
                Ok(()) => {
                    tracing::debug!(generation, path = %path.display(), "deleted translog generation below retention watermark");
                    counter!("translog_generations_deleted_total").increment(1);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(generation, path = %path.display(), error = %e, "failed to delete old translog generation")
                }
            }
        }
    }
}

fn release_hook(weak: Weak<TranslogShared>) -> ReleaseHook {
    Box::new(move |generation, path: &Path| {
        if let Some(shared) = weak.upgrade() {
            shared.handle_channel_release(generation, path);
        }
    })
}

fn writer_snapshot_source(writer: &Writer) -> Result<SnapshotSource, TranslogError> {
    Ok(SnapshotSource::current(
        writer.generation(),
        writer.snapshot_bytes()?,
        writer.total_operations(),
    ))
}

/// A durable, per-shard write-ahead log.
///
/// Cloning is not supported: a `Translog` is a single logical handle over one directory. Share
/// it across threads behind an `Arc` if multiple owners are needed; every operation already
/// synchronizes internally.
pub struct Translog {
    shared: Arc<TranslogShared>,
}

impl Translog {
    /// Opens (or creates, or strictly re-opens) the translog at `config.path()`.
    ///
    /// If `scheduler` is provided and `config.durability()` is [`Durability::Async`], a
    /// background sync task is scheduled at `config.sync_interval()`; a `sync_interval` of zero
    /// disables the task (durability then behaves like per-operation sync in practice, since
    /// every caller must sync explicitly).
    pub fn open(
        config: TranslogConfig,
        mode: OpenMode,
        scheduler: Option<Arc<dyn Scheduler>>,
    ) -> Result<Translog, TranslogError> {
        let path = config.path().to_path_buf();

        // Built with placeholder state first so every channel this open touches — including
        // recovered generations — can carry a real `Weak`-backed release hook from the start.
        let shared = Arc::new(TranslogShared {
            path: path.clone(),
            state: RwLock::new(State {
                current: None,
                committing: None,
                recovered: Vec::new(),
                last_committed_gen: -1,
            }),
            outstanding_views: StdMutex::new(HashMap::new()),
            next_view_id: AtomicU64::new(1),
            durability: AtomicU8::new(config.durability().to_u8()),
            scheduled_task: StdMutex::new(None),
        });

        let weak = Arc::downgrade(&shared);
        let opened = match mode {
            OpenMode::Create => open_create(&path, &config),
            OpenMode::Recover => open_recover(&path, &config, &weak),
            OpenMode::Open => open_strict(&path, &config, &weak),
        }?;
        *shared.state.write() = opened;

        let translog = Translog { shared };
        if translog.get_durability() == Durability::Async {
            if let Some(scheduler) = scheduler {
                translog.start_background_sync(scheduler, config.sync_interval());
            }
        }
        Ok(translog)
    }

    fn start_background_sync(&self, scheduler: Arc<dyn Scheduler>, interval: Duration) {
        if interval.is_zero() {
            return;
        }
        let weak = Arc::downgrade(&self.shared);
        let task = scheduler.schedule(
            interval,
            Box::new(move || {
                let Some(shared) = weak.upgrade() else { return };
                if shared.durability() != Durability::Async {
                    return;
                }
                let needs_sync = shared
                    .state
                    .read()
                    .current
                    .as_ref()
                    .map(Writer::sync_needed)
                    .unwrap_or(false);
                if !needs_sync {
                    return;
                }
                let result = shared.state.read().current.as_ref().map(Writer::sync);
                if let Some(Err(e)) = result {
                    tracing::warn!(error = %e, "background translog sync failed");
                }
            }),
        );
        *self.shared.scheduled_task.lock().unwrap() = Some(task);
    }

    fn cancel_background_sync(&self) {
        if let Some(task) = self.shared.scheduled_task.lock().unwrap().take() {
            task.cancel();
        }
    }

    pub fn current_generation(&self) -> u64 {
        self.shared.current_generation()
    }

    pub fn total_operations(&self) -> Result<u64, TranslogError> {
        Ok(self.shared.state.read().current()?.total_operations())
    }

    pub fn size_in_bytes(&self) -> Result<u64, TranslogError> {
        Ok(self.shared.state.read().current()?.size_in_bytes())
    }

    pub fn get_durability(&self) -> Durability {
        self.shared.durability()
    }

    pub fn set_durability(&self, durability: Durability) {
        self.shared.durability.store(durability.to_u8(), Ordering::SeqCst);
    }

    /// Resizes (and, if needed, flushes) the active writer's append buffer.
    pub fn update_buffer(&self, buffer_size: usize) -> Result<(), TranslogError> {
        let state = self.shared.state.write();
        let writer = state.current()?;
        let writer_type = writer.writer_type();
        writer.update_buffer(writer_type, buffer_size)
    }

    /// Switches between [`WriterType::Simple`] and [`WriterType::Buffered`] without needing the
    /// manager's write lock: the writer serializes the change through its own internal mutex.
    pub fn set_writer_type(&self, writer_type: WriterType) -> Result<(), TranslogError> {
        let state = self.shared.state.read();
        let writer = state.current()?;
        let buffer_size = writer.buffer_size();
        writer.update_buffer(writer_type, buffer_size)
    }

    pub fn stats(&self) -> Result<TranslogStats, TranslogError> {
        let state = self.shared.state.read();
        let writer = state.current()?;
        Ok(TranslogStats {
            current_generation: writer.generation(),
            current_generation_operations: writer.total_operations(),
            current_generation_size_in_bytes: writer.size_in_bytes(),
            open_generations: state.recovered.len() + state.committing.is_some() as usize + 1,
            last_committed_generation: state.last_committed_gen,
        })
    }

    pub fn add(&self, op: Operation) -> Result<Location, TranslogError> {
        let encoded = op::encode(&op);
        let encoded_len = encoded.len() as u64;
        let state = self.shared.state.read();
        let writer = state.current()?;
        let loc = writer.append(&encoded)?;
        if self.get_durability() == Durability::Request {
            writer.sync()?;
        }
        counter!("translog_operations_written_total").increment(1);
        counter!("translog_bytes_written_total").increment(encoded_len);
        gauge!("translog_current_generation").set(loc.generation as f64);
        Ok(loc)
    }

    pub fn read(&self, loc: Location) -> Result<Operation, TranslogError> {
        let state = self.shared.state.read();
        let writer = state.current()?;
        if loc.generation == writer.generation() {
            return writer.read_at(loc.offset, loc.size);
        }
        if let Some(committing) = &state.committing {
            if loc.generation == committing.generation() {
                return committing.read_at(loc.offset, loc.size);
            }
        }
        InvalidLocationSnafu { location: loc }.fail()
    }

    pub fn sync(&self) -> Result<(), TranslogError> {
        self.shared.state.read().current()?.sync()
    }

    pub fn sync_needed(&self) -> bool {
        self.shared
            .state
            .read()
            .current
            .as_ref()
            .map(Writer::sync_needed)
            .unwrap_or(false)
    }

    /// Syncs up through `loc` if it isn't already durable. Returns `true` if a generation other
    /// than the current one was named: closed generations are always fully synced by the time
    /// they roll, so there is nothing further to do.
    pub fn ensure_synced(&self, loc: Location) -> Result<bool, TranslogError> {
        let state = self.shared.state.read();
        let writer = state.current()?;
        if loc.generation == writer.generation() {
            writer.sync_up_to(loc.end_offset())
        } else {
            Ok(true)
        }
    }

    pub fn new_snapshot(&self) -> Result<Snapshot, TranslogError> {
        let state = self.shared.state.read();
        let mut sources: Vec<SnapshotSource> =
            state.recovered.iter().cloned().map(SnapshotSource::Reader).collect();
        if let Some(committing) = &state.committing {
            sources.push(SnapshotSource::Reader(committing.clone()));
        }
        sources.push(writer_snapshot_source(state.current()?)?);
        Ok(Snapshot::new(sources))
    }

    /// Registers a new [`View`] retaining, at minimum, the committing generation (if any); the
    /// current generation is always included live, resolved fresh on every call the view makes.
    ///
    /// Snapshotting the committing reader and registering the view in `outstanding_views` happen
    /// under the same `state` read-lock guard: a concurrent `prepare_commit` only needs the write
    /// lock once this guard is released, so doing these two steps separately would let a roll
    /// land in the gap between them and never reach this view's backlog.
    pub fn new_view(&self) -> View {
        let state = self.shared.state.read();
        let closed: Vec<Reader> = state.committing.iter().cloned().collect();
        let backlog: ViewBacklog = Arc::new(StdMutex::new(closed));
        let id = self.shared.next_view_id.fetch_add(1, Ordering::SeqCst);
        self.shared
            .outstanding_views
            .lock()
            .unwrap()
            .insert(id, Arc::clone(&backlog));
        View::new(Arc::downgrade(&self.shared), backlog, id)
    }

    /// Rolls the current generation: the old one becomes the committing reader, a fresh
    /// generation is opened, and every outstanding view is notified.
    pub fn prepare_commit(&self) -> Result<(), TranslogError> {
        let mut state = self.shared.state.write();
        if state.committing.is_some() {
            return IllegalStateSnafu {
                reason: "a commit is already in progress",
            }
            .fail();
        }
        let old_writer = state.current.take().context(IllegalStateSnafu {
            reason: "translog is closed",
        })?;

        let old_generation = old_writer.generation();
        let old_path = old_writer.path().to_path_buf();
        let writer_type = old_writer.writer_type();
        let buffer_size = old_writer.buffer_size();

        // From here, a failure leaves `state.current` empty (the translog reports itself as
        // closed) rather than resurrecting the old, already-rolled writer.
        let (file, _num_ops) = old_writer.close_for_roll()?;
        let channel = Channel::new(
            file,
            old_path,
            old_generation,
            Some(release_hook(Arc::downgrade(&self.shared))),
        );
        let old_reader = Reader::from_channel(channel)?;

        let new_generation = old_generation + 1;
        let new_writer = Writer::create(
            self.shared.path.join(reader::file_name(new_generation)),
            new_generation,
            writer_type,
            buffer_size,
        )?;
        checkpoint::write(&self.shared.path, Checkpoint::new(new_generation, 0))?;

        state.current = Some(new_writer);
        state.committing = Some(old_reader.clone());

        // Pushing into each view's own lock, never re-entering `state`'s lock: safe to do while
        // still holding the write lock above.
        for backlog in self.shared.outstanding_views.lock().unwrap().values() {
            backlog.lock().unwrap().push(old_reader.clone());
        }

        tracing::info!(old_generation, new_generation, "rolled translog generation");
        Ok(())
    }

    /// Commits: ensures a committing reader exists (rolling if necessary), advances the
    /// retention watermark to the new current generation, and discards recovered and committing
    /// readers. Their channels are dropped only after this call releases the write lock, so a
    /// channel's release hook never re-enters it on the same thread.
    pub fn commit(&self) -> Result<(), TranslogError> {
        let already_committing = self.shared.state.read().committing.is_some();
        if !already_committing {
            self.prepare_commit()?;
        }

        let (last_committed_gen, recovered, committing) = {
            let mut state = self.shared.state.write();
            state.current()?.sync()?;
            let last_committed_gen = state
                .current
                .as_ref()
                .expect("current present: synced above without error")
                .generation() as i64;
            state.last_committed_gen = last_committed_gen;
            let recovered = std::mem::take(&mut state.recovered);
            let committing = state.committing.take();
            (last_committed_gen, recovered, committing)
        };

        tracing::info!(last_committed_gen, "committed translog");
        counter!("translog_commits_total").increment(1);
        drop(recovered);
        drop(committing);
        Ok(())
    }

    /// Discards the whole translog: the current generation (if uncommitted) and the committing
    /// reader, if any. Callers that want to resume construct a new [`Translog`] in
    /// [`OpenMode::Recover`].
    pub fn rollback(&self) -> Result<(), TranslogError> {
        self.cancel_background_sync();
        self.shutdown();
        tracing::info!("rolled back translog");
        Ok(())
    }

    /// Cancels background sync, makes a best-effort attempt to flush the current generation, and
    /// releases every generation this manager holds. Safe to call more than once.
    pub fn close(&self) {
        self.cancel_background_sync();
        if let Err(e) = self.sync() {
            if !matches!(e, TranslogError::IllegalState { .. }) {
                tracing::warn!(error = %e, "failed to sync translog during close");
            }
        }
        self.shutdown();
    }

    fn shutdown(&self) {
        let (writer, committing, recovered) = {
            let mut state = self.shared.state.write();
            (
                state.current.take(),
                state.committing.take(),
                std::mem::take(&mut state.recovered),
            )
        };
        drop(writer);
        drop(committing);
        drop(recovered);
    }
}

impl Drop for Translog {
    fn drop(&mut self) {
        self.cancel_background_sync();
    }
}

fn open_create(path: &Path, config: &TranslogConfig) -> Result<State, TranslogError> {
    if path.exists() {
        fs::remove_dir_all(path).context(IoSnafu { path: path.to_path_buf() })?;
    }
    fs::create_dir_all(path).context(IoSnafu { path: path.to_path_buf() })?;
    let current = Writer::create(
        path.join(reader::file_name(1)),
        1,
        config.writer_type(),
        config.buffer_size(),
    )?;
    checkpoint::write(path, Checkpoint::new(1, 0))?;
    tracing::info!(path = %path.display(), "created new translog");
    Ok(State {
        current: Some(current),
        committing: None,
        recovered: Vec::new(),
        last_committed_gen: -1,
    })
}

fn open_recover(path: &Path, config: &TranslogConfig, weak: &Weak<TranslogShared>) -> Result<State, TranslogError> {
    fs::create_dir_all(path).context(IoSnafu { path: path.to_path_buf() })?;
    let checkpoint = checkpoint::read(path)?;
    if let Some(cp) = &checkpoint {
        tracing::info!(generation = cp.generation, "translog checkpoint present, opening it first");
    }

    let mut generations: Vec<u64> = Vec::new();
    for entry in fs::read_dir(path).context(IoSnafu { path: path.to_path_buf() })? {
        let entry = entry.context(IoSnafu { path: path.to_path_buf() })?;
        if let Some(generation) = reader::parse_generation(&entry.file_name().to_string_lossy()) {
            generations.push(generation);
        }
    }
    generations.sort_unstable();
    generations.dedup();

    let mut recovered = Vec::with_capacity(generations.len());
    for generation in &generations {
        let file_path = path.join(reader::file_name(*generation));
        let reader = Reader::open(file_path, *generation, Some(release_hook(weak.clone())))?;
        tracing::debug!(generation, "recovered translog generation");
        recovered.push(reader);
    }

    let next_generation = (generations.last().copied().unwrap_or(0) + 1).max(1);
    let current = Writer::create(
        path.join(reader::file_name(next_generation)),
        next_generation,
        config.writer_type(),
        config.buffer_size(),
    )?;

    if checkpoint.is_none() {
        checkpoint::write(path, Checkpoint::new(next_generation, 0))?;
    }

    tracing::info!(next_generation, recovered = recovered.len(), "recovered translog");
    Ok(State {
        current: Some(current),
        committing: None,
        recovered,
        // Conservative default: nothing is deletable until the first commit of this process's
        // lifetime, even though some recovered generations may already have been committed by a
        // previous process.
        last_committed_gen: -1,
    })
}

fn open_strict(path: &Path, config: &TranslogConfig, weak: &Weak<TranslogShared>) -> Result<State, TranslogError> {
    let checkpoint = checkpoint::read(path)?.context(ConstructionFailedSnafu {
        path: path.to_path_buf(),
        reason: "OPEN mode requires an existing checkpoint".to_string(),
    })?;

    let file_path = path.join(reader::file_name(checkpoint.generation));
    let reader = Reader::open(file_path, checkpoint.generation, Some(release_hook(weak.clone())))?;
    tracing::info!(generation = checkpoint.generation, "opened translog strictly from checkpoint");

    let next_generation = checkpoint.generation + 1;
    let current = Writer::create(
        path.join(reader::file_name(next_generation)),
        next_generation,
        config.writer_type(),
        config.buffer_size(),
    )?;

    Ok(State {
        current: Some(current),
        committing: None,
        recovered: vec![reader],
        // Design note: OPEN plays it safe by never deleting anything until the first commit of
        // this process's lifetime, even though `reader`'s generation was previously committed.
        last_committed_gen: -1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::{DeleteOperation, IndexOperation, VersionType};

    fn index_op(id: &str, source: &[u8]) -> Operation {
        Operation::Create(IndexOperation {
            id: id.to_string(),
            doc_type: "doc".to_string(),
            source: source.to_vec(),
            routing: None,
            parent: None,
            version: 1,
            timestamp: 0,
            ttl: 0,
            version_type: VersionType::Internal,
        })
    }

    fn delete_op(text: &str) -> Operation {
        Operation::Delete(DeleteOperation {
            uid_field: "_uid".to_string(),
            uid_text: text.to_string(),
            version: 1,
            version_type: VersionType::Internal,
        })
    }

    fn config(dir: &Path) -> TranslogConfig {
        TranslogConfig::builder(dir.to_path_buf()).build().unwrap()
    }

    #[test]
    fn s1_open_empty_append_read() {
        let dir = tempdir::TempDir::new("translog-s1").unwrap();
        let translog = Translog::open(config(dir.path()), OpenMode::Create, None).unwrap();
        assert_eq!(translog.current_generation(), 1);

        let loc = translog.add(index_op("a", &[0x01, 0x02])).unwrap();
        let read_back = translog.read(loc).unwrap();
        match read_back {
            Operation::Create(index) => assert_eq!(index.source, vec![0x01, 0x02]),
            other => panic!("expected create, got {other:?}"),
        }
        assert_eq!(translog.total_operations().unwrap(), 1);
    }

    #[test]
    fn s2_commit_cycle_deletes_the_old_generation() {
        let dir = tempdir::TempDir::new("translog-s2").unwrap();
        let translog = Translog::open(config(dir.path()), OpenMode::Create, None).unwrap();
        translog.add(index_op("a", &[0x01, 0x02])).unwrap();

        translog.prepare_commit().unwrap();
        assert_eq!(translog.current_generation(), 2);

        translog.add(delete_op("a")).unwrap();
        let gen1_path = dir.path().join(reader::file_name(1));
        assert!(gen1_path.exists());

        translog.commit().unwrap();
        assert!(!gen1_path.exists());
        assert_eq!(translog.total_operations().unwrap(), 1);
    }

    #[test]
    fn s3_recovery_replays_uncommitted_operations() {
        let dir = tempdir::TempDir::new("translog-s3").unwrap();
        {
            let translog = Translog::open(config(dir.path()), OpenMode::Create, None).unwrap();
            translog.add(index_op("a", &[0x01, 0x02])).unwrap();
            translog.close();
        }

        let translog = Translog::open(config(dir.path()), OpenMode::Recover, None).unwrap();
        assert_eq!(translog.current_generation(), 2);

        let mut snapshot = translog.new_snapshot().unwrap();
        let ops: Vec<_> = (&mut snapshot).map(|r| r.unwrap()).collect();
        assert_eq!(ops.len(), 1);
        match &ops[0] {
            Operation::Create(index) => assert_eq!(index.id, "a"),
            other => panic!("expected create, got {other:?}"),
        }
    }

    #[test]
    fn s4_view_survives_prepare_commit() {
        let dir = tempdir::TempDir::new("translog-s4").unwrap();
        let translog = Translog::open(config(dir.path()), OpenMode::Create, None).unwrap();
        translog.add(index_op("a", &[0x01])).unwrap();

        let view = translog.new_view();
        translog.prepare_commit().unwrap();
        translog.add(index_op("b", &[0x02])).unwrap();

        let mut snapshot = view.snapshot();
        let ops: Vec<_> = (&mut snapshot).map(|r| r.unwrap()).collect();
        assert_eq!(ops.len(), 2);
        assert_eq!(view.min_generation(), 1);
    }

    #[test]
    fn invalid_location_is_rejected() {
        let dir = tempdir::TempDir::new("translog-invalid-loc").unwrap();
        let translog = Translog::open(config(dir.path()), OpenMode::Create, None).unwrap();
        let bogus = Location::new(99, 0, 10);
        let err = translog.read(bogus).unwrap_err();
        assert!(matches!(err, TranslogError::InvalidLocation { .. }));
    }

    #[test]
    fn double_prepare_commit_is_illegal_state() {
        let dir = tempdir::TempDir::new("translog-double-prepare").unwrap();
        let translog = Translog::open(config(dir.path()), OpenMode::Create, None).unwrap();
        translog.prepare_commit().unwrap();
        let err = translog.prepare_commit().unwrap_err();
        assert!(matches!(err, TranslogError::IllegalState { .. }));
    }
}
