//! Config Integration Tests
//!
//! A config file on disk flowing into the services built from it.

use std::collections::HashMap;
use std::io::Write;

use choreo_rca::services::evidence::EvidenceTransformer;
use choreo_rca::storage::{ConfigService, LOG_LEVEL_ENV};
use choreo_rca::AppError;
use tempfile::NamedTempFile;

fn no_env(_: &str) -> Option<String> {
    None
}

#[test]
fn test_config_file_drives_services() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"mcp_server_url": "https://gateway.internal/mcp", "anomaly_z_threshold": 1.5, "tls_skip_verify": true}}"#
    )
    .unwrap();

    let service = ConfigService::load_with_env(Some(file.path()), no_env).unwrap();
    assert_eq!(service.config_path(), Some(file.path()));

    let transformer = EvidenceTransformer::from_config(service.get_config());
    assert_eq!(transformer.analyzer().z_threshold(), 1.5);

    let gateway = service.gateway_config();
    assert_eq!(gateway.url, "https://gateway.internal/mcp");
    assert!(gateway.tls_skip_verify);
    assert_eq!(gateway.timeout_secs, 30);
}

#[test]
fn test_malformed_config_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{{not json").unwrap();
    let err = ConfigService::load_with_env(Some(file.path()), no_env).unwrap_err();
    assert!(matches!(err, AppError::Serialization(_)));
}

#[test]
fn test_invalid_threshold_in_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, r#"{{"anomaly_z_threshold": 0}}"#).unwrap();
    let env: HashMap<&str, &str> = [(LOG_LEVEL_ENV, "info")].into_iter().collect();
    let err = ConfigService::load_with_env(Some(file.path()), |key| {
        env.get(key).map(|v| v.to_string())
    })
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}
