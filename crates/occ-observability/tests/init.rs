use std::fs;

use occ_observability::{init, LoggingConfig, ObservabilityError};

#[test]
fn test_init_installs_routes_once() {
    let dir = tempfile::tempdir().unwrap();
    let config = LoggingConfig::split_files(dir.path()).with_stderr(false);

    init(&config, "OCC_OBSERVABILITY_INIT_TEST_LOG").unwrap();
    tracing::error!(attempt = 3, "alert: update gave up");

    let errors = fs::read_to_string(dir.path().join("error.log")).unwrap();
    let entry: serde_json::Value = serde_json::from_str(errors.lines().next().unwrap()).unwrap();
    assert_eq!(entry["message"], "alert: update gave up");
    assert_eq!(entry["attempt"], 3);
    assert!(fs::read_to_string(dir.path().join("keyword.log"))
        .unwrap()
        .contains("update gave up"));

    let again = init(&LoggingConfig::default(), "OCC_OBSERVABILITY_INIT_TEST_LOG");
    assert!(matches!(again, Err(ObservabilityError::AlreadyInitialized)));
}
