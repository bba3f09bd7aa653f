//! Error types for the translog.
//!
//! Every fallible, public operation returns [`TranslogError`]. Lower-level helpers (the codec,
//! the filename parser) use their own narrower error enums and get folded into the top-level
//! enum via `snafu`'s `context`/`From` machinery at the API boundary.

use std::path::PathBuf;

use snafu::Snafu;

use crate::location::Location;

/// Errors returned by the operation codec (see [`crate::op`]).
#[derive(Debug, Snafu, PartialEq, Eq, Clone)]
pub enum CodecError {
    /// The byte stream ended before the record's trailing checksum could be read.
    ///
    /// This is the expected shape of a torn write at the tail of an active generation; callers
    /// recovering a log should treat it as "stop reading here", not as corruption.
    #[snafu(display("truncated record: expected {expected} more bytes, got {actual}"))]
    Truncated { expected: usize, actual: usize },

    /// The record's checksum did not match, an operation tag was unrecognized, or a body field
    /// was malformed (negative length, invalid version-type byte, non-UTF8 string, ...).
    #[snafu(display("corrupted record: {reason}"))]
    Corrupted { reason: String },
}

/// Top-level error type for the translog.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TranslogError {
    /// A record could not be fully read because the generation's tail was torn (a crash mid
    /// write, or an intentionally truncated test fixture).
    #[snafu(display("translog generation {generation} is truncated at offset {offset}"))]
    Truncated { generation: u64, offset: u64 },

    /// A record failed its checksum, or otherwise failed to decode.
    #[snafu(display("translog generation {generation} is corrupted at offset {offset}: {reason}"))]
    Corrupted {
        generation: u64,
        offset: u64,
        reason: String,
    },

    /// `read` was called with a location naming a generation that is neither the current
    /// writer's generation nor the committing generation.
    #[snafu(display("location {location:?} does not reference the current or committing generation"))]
    InvalidLocation { location: Location },

    /// The manager was asked to do something that is invalid in its current state: preparing a
    /// commit while one is already in flight, or operating on a closed translog.
    #[snafu(display("illegal translog state: {reason}"))]
    IllegalState { reason: String },

    /// A filesystem operation failed.
    #[snafu(display("translog I/O error at {}: {source}", path.display()))]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Construction of the translog failed; any partially-opened generations have already been
    /// closed before this error is returned.
    #[snafu(display("failed to open translog at {}: {reason}", path.display()))]
    ConstructionFailed { path: PathBuf, reason: String },

    /// A configuration value was invalid.
    #[snafu(display("invalid translog setting '{key}': {reason}"))]
    InvalidSetting { key: &'static str, reason: String },
}

impl TranslogError {
    pub(crate) fn from_codec(gen: u64, offset: u64, err: CodecError) -> Self {
        match err {
            CodecError::Truncated { .. } => TranslogError::Truncated {
                generation: gen,
                offset,
            },
            CodecError::Corrupted { reason } => TranslogError::Corrupted {
                generation: gen,
                offset,
                reason,
            },
        }
    }

    /// True if this error was caused by a torn tail rather than genuine corruption.
    pub fn is_truncated(&self) -> bool {
        matches!(self, TranslogError::Truncated { .. })
    }

    /// True if this error indicates a checksum or structural failure that cannot be recovered
    /// from by simply stopping early.
    pub fn is_corrupted(&self) -> bool {
        matches!(self, TranslogError::Corrupted { .. })
    }
}

pub type Result<T, E = TranslogError> = std::result::Result<T, E>;
