use regex::Regex;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use tracing::debug;

pub const STATE_FILE: &str = "state.json";
pub const MAIN_LOG: &str = "main.log";
pub const THEN_LOG: &str = "then.log";
pub const ORCHESTRATOR_LOG: &str = "orchestrator.log";
pub const DETACHED_FILE: &str = "detached.json";
pub const OWNER_FILE: &str = "owner.pid";

const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year][month][day]_[hour][minute][second]");

static LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{0,62}$").expect("valid regex"));

static RUN_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{0,62}_(\d{8}_\d{6})$").expect("valid regex")
});

#[derive(Debug, thiserror::Error)]
pub enum AllocError {
    #[error("label {0:?} must match ^[A-Za-z0-9][A-Za-z0-9._-]{{0,62}}$")]
    InvalidLabel(String),
    #[error("run directory {} already exists", .0.display())]
    Exists(PathBuf),
    #[error("format run timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
    #[error("create run directory {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDir {
    path: PathBuf,
}

impl RunDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn run_id(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn state_path(&self) -> PathBuf {
        self.path.join(STATE_FILE)
    }

    pub fn main_log(&self) -> PathBuf {
        self.path.join(MAIN_LOG)
    }

    pub fn then_log(&self) -> PathBuf {
        self.path.join(THEN_LOG)
    }

    pub fn orchestrator_log(&self) -> PathBuf {
        self.path.join(ORCHESTRATOR_LOG)
    }

    pub fn detached_path(&self) -> PathBuf {
        self.path.join(DETACHED_FILE)
    }

    pub fn owner_path(&self) -> PathBuf {
        self.path.join(OWNER_FILE)
    }

    /// Marks the calling process as the run's only driver. `Ok(false)` when another process
    /// already holds it.
    pub fn claim(&self) -> io::Result<bool> {
        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.owner_path())
        {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
            Err(err) => return Err(err),
        };
        writeln!(file, "{}", std::process::id())?;
        Ok(true)
    }
}

pub fn is_valid_label(label: &str) -> bool {
    LABEL_RE.is_match(label)
}

pub fn run_id_for(label: &str, now: OffsetDateTime) -> Result<String, AllocError> {
    if !is_valid_label(label) {
        return Err(AllocError::InvalidLabel(label.to_string()));
    }
    let stamp = now.to_offset(time::UtcOffset::UTC).format(TIMESTAMP_FORMAT)?;
    Ok(format!("{label}_{stamp}"))
}

/// Creates `<runs_root>/<label>_<timestamp>`. Never reuses or renames: an existing directory
/// with the same name is an error.
pub fn allocate(runs_root: &Path, label: &str, now: OffsetDateTime) -> Result<RunDir, AllocError> {
    let run_id = run_id_for(label, now)?;

    fs::create_dir_all(runs_root).map_err(|source| AllocError::Io {
        path: runs_root.to_path_buf(),
        source,
    })?;

    let path = runs_root.join(&run_id);
    match fs::create_dir(&path) {
        Ok(()) => {
            debug!(path = %path.display(), "allocated run directory");
            Ok(RunDir::new(path))
        }
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Err(AllocError::Exists(path)),
        Err(source) => Err(AllocError::Io { path, source }),
    }
}

pub fn timestamp_suffix(run_id: &str) -> Option<&str> {
    RUN_ID_RE
        .captures(run_id)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Run directories newest first: by timestamp suffix, then by full name. No suffix sorts oldest.
pub fn list(runs_root: &Path) -> io::Result<Vec<RunDir>> {
    let entries = match fs::read_dir(runs_root) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        names.push(name);
    }

    names.sort_by(|a, b| {
        timestamp_suffix(b)
            .cmp(&timestamp_suffix(a))
            .then_with(|| b.cmp(a))
    });

    Ok(names
        .into_iter()
        .map(|name| RunDir::new(runs_root.join(name)))
        .collect())
}

pub fn latest(runs_root: &Path) -> io::Result<Option<RunDir>> {
    Ok(list(runs_root)?.into_iter().next())
}
