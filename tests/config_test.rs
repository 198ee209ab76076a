//! Tests for configuration validation

use std::time::Duration;

use staging_dispatch::config::{FabricMode, StagingConfig};

#[test]
fn test_staging_config_defaults() {
    let cfg = StagingConfig::default();
    assert!(cfg.validate().is_ok());
    assert!(cfg.diego_staging_enabled());
    assert!(!cfg.diego_docker);
    assert_eq!(cfg.staging_timeout(), Duration::from_secs(900));
    assert_eq!(cfg.minimum_staging_memory_mb, 1024);
    assert_eq!(cfg.minimum_staging_disk_mb, 4096);
    assert_eq!(cfg.minimum_staging_file_descriptor_limit, 16384);
}

#[test]
fn test_staging_config_invalid_timeout() {
    let invalid = StagingConfig {
        timeout_in_seconds: 0,
        ..StagingConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_staging_config_invalid_minimums() {
    let no_memory = StagingConfig {
        minimum_staging_memory_mb: 0,
        ..StagingConfig::default()
    };
    assert!(no_memory.validate().is_err());

    let no_disk = StagingConfig {
        minimum_staging_disk_mb: 0,
        ..StagingConfig::default()
    };
    assert!(no_disk.validate().is_err());

    let no_fds = StagingConfig {
        minimum_staging_file_descriptor_limit: 0,
        ..StagingConfig::default()
    };
    assert!(no_fds.validate().is_err());
}

#[test]
fn test_staging_config_from_json() {
    let json = r#"{
        "diego_staging": "disabled",
        "diego_docker": true,
        "timeout_in_seconds": 120
    }"#;
    let cfg = StagingConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.diego_staging, FabricMode::Disabled);
    assert!(!cfg.diego_staging_enabled());
    assert!(cfg.diego_docker);
    assert_eq!(cfg.staging_timeout(), Duration::from_secs(120));
    // Unspecified fields keep their defaults.
    assert_eq!(cfg.minimum_staging_disk_mb, 4096);
}

#[test]
fn test_staging_config_from_json_rejects_invalid() {
    assert!(StagingConfig::from_json_str(r#"{"timeout_in_seconds": 0}"#).is_err());
    assert!(StagingConfig::from_json_str(r#"{"diego_staging": "sometimes"}"#).is_err());
    assert!(StagingConfig::from_json_str("not json").is_err());
}

// The process environment is shared by every test in this binary.
static ENV_LOCK: parking_lot::Mutex<()> = parking_lot::const_mutex(());

const STAGING_VARS: [&str; 6] = [
    "STAGING_DIEGO_STAGING",
    "STAGING_DIEGO_DOCKER",
    "STAGING_TIMEOUT_SECS",
    "STAGING_MINIMUM_MEMORY_MB",
    "STAGING_MINIMUM_DISK_MB",
    "STAGING_MINIMUM_FILE_DESCRIPTOR_LIMIT",
];

fn with_env<T>(vars: &[(&str, &str)], f: impl FnOnce() -> T) -> T {
    let _guard = ENV_LOCK.lock();
    for name in STAGING_VARS {
        std::env::remove_var(name);
    }
    for (name, value) in vars {
        std::env::set_var(name, value);
    }
    let result = f();
    for name in STAGING_VARS {
        std::env::remove_var(name);
    }
    result
}

#[test]
fn test_from_env_defaults() {
    let cfg = with_env(&[], StagingConfig::from_env).unwrap();
    assert_eq!(cfg, StagingConfig::default());
}

#[test]
fn test_from_env_overrides_every_field() {
    let cfg = with_env(
        &[
            ("STAGING_DIEGO_STAGING", "disabled"),
            ("STAGING_DIEGO_DOCKER", "true"),
            ("STAGING_TIMEOUT_SECS", " 300 "),
            ("STAGING_MINIMUM_MEMORY_MB", "2048"),
            ("STAGING_MINIMUM_DISK_MB", "8192"),
            ("STAGING_MINIMUM_FILE_DESCRIPTOR_LIMIT", "32768"),
        ],
        StagingConfig::from_env,
    )
    .unwrap();

    assert_eq!(cfg.diego_staging, FabricMode::Disabled);
    assert!(cfg.diego_docker);
    assert_eq!(cfg.staging_timeout(), Duration::from_secs(300));
    assert_eq!(cfg.minimum_staging_memory_mb, 2048);
    assert_eq!(cfg.minimum_staging_disk_mb, 8192);
    assert_eq!(cfg.minimum_staging_file_descriptor_limit, 32768);
}

#[test]
fn test_from_env_rejects_unknown_mode() {
    let err = with_env(&[("STAGING_DIEGO_STAGING", "sometimes")], StagingConfig::from_env)
        .unwrap_err();
    assert!(err.to_string().contains("STAGING_DIEGO_STAGING"));
}

#[test]
fn test_from_env_rejects_non_numeric_values() {
    let err = with_env(&[("STAGING_TIMEOUT_SECS", "soon")], StagingConfig::from_env).unwrap_err();
    assert!(err.to_string().contains("STAGING_TIMEOUT_SECS"));

    let err = with_env(
        &[("STAGING_MINIMUM_FILE_DESCRIPTOR_LIMIT", "lots")],
        StagingConfig::from_env,
    )
    .unwrap_err();
    assert!(err.to_string().contains("STAGING_MINIMUM_FILE_DESCRIPTOR_LIMIT"));

    let err = with_env(&[("STAGING_DIEGO_DOCKER", "yes")], StagingConfig::from_env).unwrap_err();
    assert!(err.to_string().contains("STAGING_DIEGO_DOCKER"));
}

#[test]
fn test_from_env_validates_result() {
    assert!(with_env(&[("STAGING_TIMEOUT_SECS", "0")], StagingConfig::from_env).is_err());
}
