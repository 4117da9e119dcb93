//! Installs the global subscriber, so this binary holds a single test.

use configuration::error::ConfigError;
use configuration::{init_tracing, LogFormat, LoggingConfig};
use std::fs;

#[test]
fn file_logging_records_its_own_startup_and_installs_once() {
    // SAFETY: the only test in this binary, so no other thread reads the environment.
    unsafe { std::env::remove_var("RUST_LOG") };
    let dir = tempfile::tempdir().unwrap();
    let config = LoggingConfig {
        filter: "info".to_string(),
        format: LogFormat::Compact,
        directory: Some(dir.path().to_path_buf()),
    };

    let guard = init_tracing(&config).unwrap();
    assert!(guard.is_some());
    assert!(matches!(init_tracing(&config), Err(ConfigError::Logging(_))));
    drop(guard);

    let written: String = fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| fs::read_to_string(entry.unwrap().path()).unwrap())
        .collect();
    assert!(written.contains("Logging initialised"), "log output: {written}");
}
