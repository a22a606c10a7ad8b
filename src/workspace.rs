use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RootError {
    #[error("workspace {} is not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error("not in a git repository; pass --workspace to choose the workspace root")]
    NoRepository,
}

pub trait RootResolver {
    fn resolve(&self) -> Result<PathBuf, RootError>;
}

#[derive(Debug, Clone)]
pub struct FixedRoot(pub PathBuf);

impl RootResolver for FixedRoot {
    fn resolve(&self) -> Result<PathBuf, RootError> {
        if !self.0.is_dir() {
            return Err(RootError::NotADirectory(self.0.clone()));
        }
        self.0
            .canonicalize()
            .map_err(|_| RootError::NotADirectory(self.0.clone()))
    }
}

#[derive(Debug, Clone)]
pub struct GitRoot {
    pub start: PathBuf,
}

impl RootResolver for GitRoot {
    fn resolve(&self) -> Result<PathBuf, RootError> {
        let output = Command::new("git")
            .args(["rev-parse", "--show-toplevel"])
            .current_dir(&self.start)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .map_err(|_| RootError::NoRepository)?;

        if !output.status.success() {
            return Err(RootError::NoRepository);
        }

        let top = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if top.is_empty() {
            return Err(RootError::NoRepository);
        }
        FixedRoot(PathBuf::from(top)).resolve()
    }
}

pub fn resolver(explicit: Option<&Path>) -> Box<dyn RootResolver> {
    match explicit {
        Some(path) => Box::new(FixedRoot(path.to_path_buf())),
        None => Box::new(GitRoot {
            start: PathBuf::from("."),
        }),
    }
}
