//! YAML config loading: happy path, defaults, and error messages.

use std::fs;

use rstest::rstest;
use streamgate_core::{ConfigError, ProcessorConfig};
use tempfile::TempDir;

const FULL: &str = r#"
region: eu-west-2
table_name: orders
state_machine_arns:
  - arn:aws:states:eu-west-2:000000000000:stateMachine:orders-stream-processor
models: [Order, Customer, Event]
service_name: orders
dispatch_function: orders-api
lookup_function: identity-api
max_concurrency: 5
lookup_timeout_ms: 250
endpoints:
  lambda: http://localhost:3001
  step_functions: http://localhost:8083
"#;

fn write(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("streamgate.yaml");
    fs::write(&path, contents).expect("write fixture");
    path
}

#[test]
fn full_yaml_round_trips_every_field() {
    let dir = TempDir::new().expect("tempdir");
    let config = ProcessorConfig::load_yaml_at(&write(&dir, FULL)).expect("load");

    assert_eq!(config.region, "eu-west-2");
    assert_eq!(config.state_machine_arns.len(), 1);
    assert_eq!(config.lookup_function(), "identity-api");
    assert_eq!(config.max_concurrency, 5);
    assert_eq!(config.lookup_timeout_ms, 250);
    assert_eq!(config.endpoints.lambda.as_deref(), Some("http://localhost:3001"));
    assert_eq!(
        config.endpoints.step_functions.as_deref(),
        Some("http://localhost:8083")
    );
    assert!(!config.watch_list().contains("Event"));
}

#[test]
fn optional_fields_take_defaults() {
    let dir = TempDir::new().expect("tempdir");
    let yaml = r#"
region: eu-west-2
table_name: orders
state_machine_arns: [arn:sm]
models: [Order]
service_name: orders
dispatch_function: orders-api
"#;
    let config = ProcessorConfig::load_yaml_at(&write(&dir, yaml)).expect("load");
    assert_eq!(config.max_concurrency, 20);
    assert_eq!(config.lookup_timeout_ms, 3_000);
    assert_eq!(config.lookup_function(), "orders-api");
    assert!(config.endpoints.lambda.is_none());
}

#[test]
fn missing_file_is_not_found() {
    let dir = TempDir::new().expect("tempdir");
    let err = ProcessorConfig::load_yaml_at(&dir.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::NotFound { .. }), "got: {err}");
    assert!(err.to_string().contains("absent.yaml"));
}

#[rstest]
#[case("region: [unclosed")]
#[case("unknown_key: 1\nregion: x")]
fn malformed_yaml_is_parse_error_with_path(#[case] contents: &str) {
    let dir = TempDir::new().expect("tempdir");
    let err = ProcessorConfig::load_yaml_at(&write(&dir, contents)).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("streamgate.yaml"));
}

#[rstest]
#[case("state_machine_arns: []", "DYNAMODB_STREAM_STEP_FUNCTIONS")]
#[case("models: []", "MODELS")]
#[case("service_name: ''", "SERVICE_NAME")]
#[case("max_concurrency: 0", "ROUTER_MAX_CONCURRENCY")]
fn invalid_values_name_the_setting(#[case] override_line: &str, #[case] expected: &str) {
    let dir = TempDir::new().expect("tempdir");
    let key = override_line.split(':').next().expect("key");
    let mut yaml: Vec<String> = FULL
        .lines()
        .filter(|line| !line.starts_with(key))
        .filter(|line| !line.starts_with("state_machine_arns") && !line.starts_with("  - "))
        .map(str::to_string)
        .collect();
    if key != "state_machine_arns" {
        yaml.push("state_machine_arns: [arn:sm]".to_string());
    }
    yaml.push(override_line.to_string());

    let err = ProcessorConfig::load_yaml_at(&write(&dir, &yaml.join("\n"))).unwrap_err();
    assert!(err.to_string().contains(expected), "got: {err}");
}
