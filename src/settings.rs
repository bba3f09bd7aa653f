//! Typed configuration for a translog, assembled from a generic key-value settings source with
//! compile-time defaults.

use std::{path::PathBuf, time::Duration};

use snafu::ensure;

use crate::{
    error::{InvalidSettingSnafu, TranslogError},
    writer::WriterType,
};

pub const KEY_DURABILITY: &str = "index.translog.durability";
pub const KEY_FS_TYPE: &str = "index.translog.fs.type";
pub const KEY_FS_BUFFER_SIZE: &str = "index.translog.fs.buffer_size";
pub const KEY_SYNC_INTERVAL: &str = "index.translog.sync_interval";

pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(5);

/// When a record is considered durable enough to acknowledge to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Durability {
    /// `fsync` after every append.
    Request,
    /// `fsync` on a timer, via the background scheduler.
    Async,
}

impl Durability {
    pub(crate) fn to_u8(self) -> u8 {
        match self {
            Durability::Request => 0,
            Durability::Async => 1,
        }
    }

    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            1 => Durability::Async,
            _ => Durability::Request,
        }
    }
}

/// Validated configuration for one translog directory. Build through [`TranslogConfigBuilder`].
#[derive(Debug, Clone)]
pub struct TranslogConfig {
    path: PathBuf,
    durability: Durability,
    writer_type: WriterType,
    buffer_size: usize,
    sync_interval: Duration,
}

impl TranslogConfig {
    pub fn builder(path: PathBuf) -> TranslogConfigBuilder {
        TranslogConfigBuilder::new(path)
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    pub fn durability(&self) -> Durability {
        self.durability
    }

    pub fn writer_type(&self) -> WriterType {
        self.writer_type
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn sync_interval(&self) -> Duration {
        self.sync_interval
    }
}

/// Builder for [`TranslogConfig`], with the defaults from the settings table in §6: `REQUEST`
/// durability, a `BUFFERED` writer with a 64 KiB buffer, and a 5 second sync interval.
#[derive(Debug, Clone)]
pub struct TranslogConfigBuilder {
    path: PathBuf,
    durability: Durability,
    writer_type: WriterType,
    buffer_size: usize,
    sync_interval: Duration,
}

impl TranslogConfigBuilder {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            durability: Durability::Request,
            writer_type: WriterType::Buffered,
            buffer_size: DEFAULT_BUFFER_SIZE,
            sync_interval: DEFAULT_SYNC_INTERVAL,
        }
    }

    pub fn durability(mut self, durability: Durability) -> Self {
        self.durability = durability;
        self
    }

    pub fn writer_type(mut self, writer_type: WriterType) -> Self {
        self.writer_type = writer_type;
        self
    }

    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn sync_interval(mut self, sync_interval: Duration) -> Self {
        self.sync_interval = sync_interval;
        self
    }

    /// Applies one setting coming from a generic key-value source. Unrecognized keys are
    /// ignored; malformed values are logged and the builder's current (default, unless already
    /// overridden) value is kept, per the settings contract in §6.
    pub fn apply_raw(mut self, key: &str, value: &str) -> Self {
        match key {
            KEY_DURABILITY => match value.to_ascii_uppercase().as_str() {
                "REQUEST" => self.durability = Durability::Request,
                "ASYNC" => self.durability = Durability::Async,
                _ => tracing::warn!(key, value, "unrecognized durability setting, keeping default"),
            },
            KEY_FS_TYPE => match value.to_ascii_uppercase().as_str() {
                "SIMPLE" => self.writer_type = WriterType::Simple,
                "BUFFERED" => self.writer_type = WriterType::Buffered,
                _ => tracing::warn!(key, value, "unrecognized writer type, keeping default"),
            },
            KEY_FS_BUFFER_SIZE => match value.parse::<usize>() {
                Ok(n) if n > 0 => self.buffer_size = n,
                _ => tracing::warn!(key, value, "invalid buffer size, keeping default"),
            },
            KEY_SYNC_INTERVAL => match value.parse::<u64>() {
                Ok(n) => self.sync_interval = Duration::from_secs(n),
                Err(_) => tracing::warn!(key, value, "invalid sync interval, keeping default"),
            },
            other => tracing::warn!(key = other, "unrecognized translog setting, ignoring"),
        }
        self
    }

    pub fn build(self) -> Result<TranslogConfig, TranslogError> {
        ensure!(
            self.buffer_size > 0,
            InvalidSettingSnafu {
                key: KEY_FS_BUFFER_SIZE,
                reason: "buffer size must be greater than zero".to_string(),
            }
        );
        Ok(TranslogConfig {
            path: self.path,
            durability: self.durability,
            writer_type: self.writer_type,
            buffer_size: self.buffer_size,
            sync_interval: self.sync_interval,
        })
    }
}
