use crate::model::Run;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("state file {} not found", .0.display())]
    Missing(PathBuf),
    #[error("state file {} is corrupt: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },
    #[error("{op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        source: io::Error,
    },
    #[error("encode state: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_corrupt_state(&self) -> bool {
        matches!(self, StoreError::Missing(_) | StoreError::Corrupt { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DetachedInfo {
    pub orchestrator_pid: u32,
}

pub fn write(path: &Path, run: &Run) -> Result<(), StoreError> {
    debug!(
        path = %path.display(),
        run_id = %run.run_id,
        status = %run.status,
        "writing run state"
    );
    write_json(path, run)
}

pub fn read(path: &Path) -> Result<Run, StoreError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(StoreError::Missing(path.to_path_buf()));
        }
        Err(source) => {
            return Err(StoreError::Io {
                op: "read",
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let run: Run = serde_json::from_str(&text).map_err(|e| StoreError::Corrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    run.check_consistency()
        .map_err(|reason| StoreError::Corrupt {
            path: path.to_path_buf(),
            reason,
        })?;

    Ok(run)
}

pub fn write_detached(path: &Path, info: &DetachedInfo) -> Result<(), StoreError> {
    write_json(path, info)
}

pub fn read_detached(path: &Path) -> Option<DetachedInfo> {
    let text = fs::read_to_string(path).ok()?;
    serde_json::from_str(&text).ok()
}

pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let mut buf = serde_json::to_vec_pretty(value)?;
    buf.push(b'\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let io_err = |op: &'static str, path: &Path| {
        let path = path.to_path_buf();
        move |source: io::Error| StoreError::Io { op, path, source }
    };

    let tmp = temp_path(path);
    let mut file = File::create(&tmp).map_err(io_err("create", &tmp))?;
    file.write_all(contents).map_err(io_err("write", &tmp))?;
    file.sync_all().map_err(io_err("sync", &tmp))?;
    drop(file);

    fs::rename(&tmp, path).map_err(io_err("replace", path))?;

    if let Some(parent) = path.parent()
        && let Ok(dir) = File::open(parent)
    {
        let _ = dir.sync_all();
    }
    Ok(())
}
