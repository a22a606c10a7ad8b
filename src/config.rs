use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};

pub const CURRENT_VERSION: i32 = 1;
pub const DEFAULT_FILE: &str = "longrun.yml";
pub const DEFAULT_RUNS_DIR: &str = ".longrun";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub version: i32,
    pub runs_dir: String,
    pub shell: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            runs_dir: DEFAULT_RUNS_DIR.to_string(),
            shell: default_shell(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationErrors {
    pub issues: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F: Into<String>, M: Into<String>>(&mut self, field: F, message: M) {
        self.issues.push(ValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(first) = self.issues.first() {
            write!(
                f,
                "configuration validation failed: {}: {}",
                first.field, first.message
            )
        } else {
            write!(f, "configuration validation failed")
        }
    }
}

impl std::error::Error for ValidationErrors {}

impl Config {
    pub fn runs_root(&self, workspace: &Path) -> PathBuf {
        workspace.join(&self.runs_dir)
    }
}

pub fn default_shell() -> Vec<String> {
    if cfg!(target_os = "windows") {
        vec!["cmd".to_string(), "/C".to_string()]
    } else {
        vec!["/bin/sh".to_string(), "-c".to_string()]
    }
}

pub fn path_for(workspace: &Path, explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(path) => path.to_path_buf(),
        None => workspace.join(DEFAULT_FILE),
    }
}

/// Loads and validates the config. A missing file means defaults unless it was named explicitly.
pub fn load(path: &Path, explicit: bool) -> Result<Config, String> {
    if !path.exists() {
        if explicit {
            return Err(format!("config file {} not found", path.display()));
        }
        return Ok(Config::default());
    }

    let cfg = parse(path)?;
    validate(&cfg).map_err(|e| e.to_string())?;
    Ok(cfg)
}

pub fn parse(path: &Path) -> Result<Config, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("read config: {e}"))?;
    let cfg: Config = serde_yaml::from_str(&text).map_err(|e| format!("parse config yaml: {e}"))?;
    Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<(), ValidationErrors> {
    let mut issues = ValidationErrors::new();

    if cfg.version != CURRENT_VERSION {
        issues.add("version", format!("must be {CURRENT_VERSION}"));
    }

    validate_runs_dir(&mut issues, &cfg.runs_dir);

    if cfg.shell.is_empty() {
        issues.add("shell", "must name an interpreter");
    }
    for (idx, tok) in cfg.shell.iter().enumerate() {
        if tok.is_empty() {
            issues.add(format!("shell[{idx}]"), "must not be empty");
        }
    }

    if issues.has_issues() {
        Err(issues)
    } else {
        Ok(())
    }
}

fn validate_runs_dir(issues: &mut ValidationErrors, runs_dir: &str) {
    if runs_dir.trim().is_empty() {
        issues.add("runs_dir", "is required");
        return;
    }

    let path = Path::new(runs_dir);
    if path.is_absolute() {
        issues.add("runs_dir", "must be relative to the workspace root");
    }
    if path
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        issues.add("runs_dir", "must stay inside the workspace root");
    }
}
