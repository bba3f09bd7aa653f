//! A durable, checksummed write-ahead log for a segment-store-backed index shard.
//!
//! An `index.translog` directory holds a sequence of numbered generation files plus a small
//! checkpoint pointing at the one that should be opened on a clean restart. Every mutating
//! operation is appended as a framed, checksummed record before it is considered durable;
//! [`Translog::prepare_commit`] and [`Translog::commit`] roll and retire generations as the
//! owning index flushes its in-memory state to disk.

mod channel;
mod checkpoint;
mod error;
mod location;
mod op;
mod reader;
mod scheduler;
mod settings;
mod snapshot;
mod translog;
mod view;
mod writer;

pub use error::{CodecError, Result, TranslogError};
pub use location::Location;
pub use op::{DeleteByQueryOperation, DeleteOperation, IndexOperation, Operation, VersionType};
pub use reader::{file_name, parse_generation};
pub use scheduler::{ScheduledTask, Scheduler, ThreadScheduler};
pub use settings::{
    Durability, TranslogConfig, TranslogConfigBuilder, DEFAULT_BUFFER_SIZE, DEFAULT_SYNC_INTERVAL, KEY_DURABILITY,
    KEY_FS_BUFFER_SIZE, KEY_FS_TYPE, KEY_SYNC_INTERVAL,
};
pub use snapshot::Snapshot;
pub use translog::{OpenMode, Translog, TranslogStats};
pub use view::View;
pub use writer::WriterType;
