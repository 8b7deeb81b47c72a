// Configuration unit tests
// YAML loading, environment overrides and validation

use immich_resize_proxy::config::*;
use std::collections::HashMap;
use std::io::Write;

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name| map.get(name).cloned()
}

#[test]
fn test_empty_yaml_gives_defaults() {
    let config: Config = serde_yaml::from_str("{}").expect("Failed to deserialize YAML");
    assert_eq!(config, Config::default());
    assert_eq!(config.server.port, 3000);
    assert_eq!(config.backend.url, "http://localhost:2283");
    assert_eq!(config.image.max_width, 2560);
    assert_eq!(config.image.max_height, 1440);
    assert_eq!(config.image.quality, 100);
    assert_eq!(config.image.effort, 6);
}

#[test]
fn test_can_deserialize_full_yaml_config() {
    let yaml = r#"
server:
  address: "127.0.0.1"
  port: 8080
  threads: 2
  max_upload_size: 1048576
  max_concurrent_uploads: 3
backend:
  url: "https://photos.internal:2283"
  auth_timeout: 3
  forward_timeout: 60
image:
  max_width: 1920
  max_height: 1080
  quality: 85
  effort: 4
"#;
    let config: Config = serde_yaml::from_str(yaml).expect("Failed to deserialize YAML");

    assert_eq!(config.server.listen_address(), "127.0.0.1:8080");
    assert_eq!(config.server.max_upload_size, 1_048_576);
    assert_eq!(config.server.max_concurrent_uploads, 3);
    assert_eq!(config.backend.auth_timeout, 3);
    assert_eq!(config.backend.forward_timeout, 60);
    assert_eq!(config.image.max_width, 1920);
    assert_eq!(config.image.quality, 85);
    assert!(config.validate().is_ok());
}

#[test]
fn test_yaml_substitutes_environment_variables() {
    std::env::set_var("IMMICH_RESIZE_TEST_BACKEND", "http://immich-server:2283");
    let yaml = r#"
backend:
  url: "${IMMICH_RESIZE_TEST_BACKEND}"
"#;
    let config = Config::from_yaml_with_env(yaml).unwrap();
    assert_eq!(config.backend.url, "http://immich-server:2283");
}

#[test]
fn test_yaml_rejects_unset_environment_variable() {
    let yaml = r#"
backend:
  url: "${IMMICH_RESIZE_TEST_DEFINITELY_UNSET}"
"#;
    let err = Config::from_yaml_with_env(yaml).unwrap_err();
    assert!(err.contains("IMMICH_RESIZE_TEST_DEFINITELY_UNSET"));
}

#[test]
fn test_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "image:\n  max_width: 800\n  max_height: 600").unwrap();

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.image.max_width, 800);
    assert_eq!(config.image.max_height, 600);
    assert_eq!(config.server.port, 3000);
}

#[test]
fn test_from_missing_file_fails() {
    let err = Config::from_file("/nonexistent/immich-resize-proxy.yaml").unwrap_err();
    assert!(err.starts_with("Failed to read config file"));
}

#[test]
fn test_from_env_reads_documented_variables() {
    let config = Config::from_env_with(lookup(&[
        ("IMMICH_URL", "http://immich:2283"),
        ("SIZE_W", "1920"),
        ("SIZE_H", "1080"),
        ("LISTEN_ADDRESS", "127.0.0.1"),
        ("PORT", "8080"),
    ]))
    .unwrap();

    assert_eq!(config.backend.url, "http://immich:2283");
    assert_eq!(config.image.max_width, 1920);
    assert_eq!(config.image.max_height, 1080);
    assert_eq!(config.server.listen_address(), "127.0.0.1:8080");
}

#[test]
fn test_from_env_keeps_defaults_when_unset() {
    let config = Config::from_env_with(lookup(&[])).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_from_env_rejects_non_numeric_size() {
    let err = Config::from_env_with(lookup(&[("SIZE_W", "wide")])).unwrap_err();
    assert!(err.contains("SIZE_W"));
}

#[test]
fn test_validate_rejects_bad_values() {
    let mut config = Config::default();
    config.backend.url = "ftp://immich".to_string();
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.image.max_height = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.image.quality = 101;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.image.effort = 7;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.server.max_concurrent_uploads = 0;
    assert!(config.validate().is_err());
}
