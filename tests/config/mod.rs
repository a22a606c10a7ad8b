use longrun::config::{self, Config, DEFAULT_RUNS_DIR, load, validate};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

#[test]
fn missing_default_file_means_defaults() {
    let dir = tempdir().expect("tempdir");
    let cfg = load(&dir.path().join("longrun.yml"), false).expect("defaults");
    assert_eq!(cfg.runs_dir, DEFAULT_RUNS_DIR);
    assert!(!cfg.shell.is_empty());
    assert_eq!(
        cfg.runs_root(Path::new("/work")),
        Path::new("/work").join(".longrun")
    );
}

#[test]
fn missing_explicit_file_is_an_error() {
    let dir = tempdir().expect("tempdir");
    let err = load(&dir.path().join("custom.yml"), true).expect_err("missing");
    assert!(err.contains("not found"));
}

#[test]
fn load_reads_overrides() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("longrun.yml");
    fs::write(
        &path,
        r#"version: 1
runs_dir: state/runs
shell: ["/bin/bash", "-c"]
"#,
    )
    .expect("write config");

    let cfg = load(&path, false).expect("load");
    assert_eq!(cfg.runs_dir, "state/runs");
    assert_eq!(cfg.shell, vec!["/bin/bash", "-c"]);
}

#[test]
fn parse_rejects_unknown_keys() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("longrun.yml");
    fs::write(&path, "version: 1\nretries: 3\n").expect("write config");

    let err = config::parse(&path).expect_err("unknown key");
    assert!(err.starts_with("parse config yaml:"));
}

#[test]
fn validate_collects_every_issue() {
    let cfg = Config {
        version: 2,
        runs_dir: "../outside".to_string(),
        shell: vec![String::new()],
    };

    let err = validate(&cfg).expect_err("invalid");
    let fields: Vec<&str> = err.issues.iter().map(|i| i.field.as_str()).collect();
    assert_eq!(fields, vec!["version", "runs_dir", "shell[0]"]);
    assert!(err.to_string().starts_with("configuration validation failed: version"));
}

#[test]
fn validate_rejects_absolute_runs_dir_and_empty_shell() {
    let cfg = Config {
        runs_dir: "/tmp/runs".to_string(),
        shell: Vec::new(),
        ..Config::default()
    };

    let err = validate(&cfg).expect_err("invalid");
    assert!(err.issues.iter().any(|i| i.field == "runs_dir"));
    assert!(err.issues.iter().any(|i| i.field == "shell"));
}

#[test]
fn default_config_is_valid() {
    assert!(validate(&Config::default()).is_ok());
}

#[cfg(unix)]
#[test]
fn default_shell_is_plain_sh_and_overridable_to_login_bash() {
    assert_eq!(Config::default().shell, vec!["/bin/sh", "-c"]);

    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("longrun.yml");
    fs::write(&path, "shell: [\"bash\", \"-lc\"]\n").expect("write config");
    let cfg = load(&path, false).expect("load");
    assert_eq!(cfg.shell, vec!["bash", "-lc"]);
}
