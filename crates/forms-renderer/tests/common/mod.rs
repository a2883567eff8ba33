//! Shared helpers for renderer integration tests

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

/// Directory holding the on-disk fixtures
pub fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

/// Install a fmt subscriber once, honouring `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Write `content` to `dir/name`, creating parent directories
pub fn write_template(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}
