//! The checkpoint file: a small pointer to the generation that should be opened on a clean
//! restart.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use snafu::ResultExt;

use crate::error::{IoSnafu, TranslogError};

pub const CHECKPOINT_FILE_NAME: &str = "translog.ckp";
const MAGIC: i32 = 0x5452_4C47; // "TRLG" shoved into four bytes.
const CHECKPOINT_VERSION: i8 = 1;
const CHECKPOINT_LEN: usize = 4 + 1 + 8 + 4;

/// The persisted contents of `translog.ckp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    pub generation: u64,
    pub num_ops: u32,
}

impl Checkpoint {
    pub fn new(generation: u64, num_ops: u32) -> Self {
        Self {
            generation,
            num_ops,
        }
    }

    fn to_bytes(self) -> [u8; CHECKPOINT_LEN] {
        let mut buf = [0u8; CHECKPOINT_LEN];
        buf[0..4].copy_from_slice(&MAGIC.to_be_bytes());
        buf[4] = CHECKPOINT_VERSION as u8;
        buf[5..13].copy_from_slice(&self.generation.to_be_bytes());
        buf[13..17].copy_from_slice(&self.num_ops.to_be_bytes());
        buf
    }

    fn from_bytes(buf: &[u8], path: &Path) -> Result<Self, TranslogError> {
        if buf.len() != CHECKPOINT_LEN {
            return Err(TranslogError::ConstructionFailed {
                path: path.to_path_buf(),
                reason: format!(
                    "checkpoint file has {} bytes, expected {}",
                    buf.len(),
                    CHECKPOINT_LEN
                ),
            });
        }
        let magic = i32::from_be_bytes(buf[0..4].try_into().unwrap());
        if magic != MAGIC {
            return Err(TranslogError::ConstructionFailed {
                path: path.to_path_buf(),
                reason: "checkpoint magic mismatch".to_string(),
            });
        }
        let generation = u64::from_be_bytes(buf[5..13].try_into().unwrap());
        let num_ops = u32::from_be_bytes(buf[13..17].try_into().unwrap());
        Ok(Checkpoint::new(generation, num_ops))
    }
}

pub fn path_in(dir: &Path) -> PathBuf {
    dir.join(CHECKPOINT_FILE_NAME)
}

/// Reads the checkpoint in `dir`, if one exists.
///
/// A missing checkpoint file is not an error: it means this directory was never committed
/// through a checkpointing path, and callers treat it as "no prior checkpoint" with a warning
/// rather than a fatal condition.
pub fn read(dir: &Path) -> Result<Option<Checkpoint>, TranslogError> {
    let path = path_in(dir);
    match fs::read(&path) {
        Ok(bytes) => Checkpoint::from_bytes(&bytes, &path).map(Some),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "no translog checkpoint found");
            Ok(None)
        }
        Err(source) => Err(TranslogError::Io { path, source }),
    }
}

/// Atomically rewrites the checkpoint file: write to a temp file in the same directory, fsync
/// it, then rename over the canonical path. Rename is atomic on the filesystems this crate
/// targets, so readers never observe a partially-written checkpoint.
pub fn write(dir: &Path, checkpoint: Checkpoint) -> Result<(), TranslogError> {
    let final_path = path_in(dir);
    let tmp_path = dir.join(format!("{CHECKPOINT_FILE_NAME}.tmp"));

    let mut file = fs::File::create(&tmp_path).context(IoSnafu {
        path: tmp_path.clone(),
    })?;
    file.write_all(&checkpoint.to_bytes()).context(IoSnafu {
        path: tmp_path.clone(),
    })?;
    file.sync_all().context(IoSnafu {
        path: tmp_path.clone(),
    })?;
    drop(file);

    fs::rename(&tmp_path, &final_path).context(IoSnafu { path: final_path })?;
    tracing::debug!(generation = checkpoint.generation, "wrote translog checkpoint");
    Ok(())
}
