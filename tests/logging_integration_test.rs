//! Integration tests for logging functionality

use sheetbridge::config::LoggingConfig;
use sheetbridge::domain::{GlobalDecision, WorkOutcome};
use sheetbridge::logging::init_logging;
use tempfile::TempDir;

#[test]
fn test_logging_config_default() {
    let config = LoggingConfig::default();
    assert!(!config.local_enabled);
    assert_eq!(config.local_rotation, "daily");
    assert_eq!(config.local_path, "/var/log/sheetbridge");
}

// The global subscriber can be installed once per process, so this is the
// only test in this binary that initializes logging.
#[test]
fn test_file_logging_creates_directory() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("logs");

    let config = LoggingConfig {
        local_enabled: true,
        local_path: log_path.to_string_lossy().to_string(),
        local_rotation: "never".to_string(),
        local_max_files: 2,
    };
    assert!(!log_path.exists());

    let guard = init_logging("debug", &config).unwrap();

    sheetbridge::log_partition_outcome!(&WorkOutcome::failure(3, "duplicate key"), 100);
    sheetbridge::log_global_decision!(0, GlobalDecision::Abort, 4, 1);
    drop(guard);

    assert!(log_path.is_dir());
    let log_file = log_path.join("sheetbridge.log");
    let contents = std::fs::read_to_string(log_file).unwrap();
    assert!(contents.contains("Logging initialized"));
}

#[test]
fn test_invalid_log_level_is_rejected() {
    let result = init_logging("verbose", &LoggingConfig::default());
    assert!(result.is_err());
}
