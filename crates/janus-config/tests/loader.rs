//! File-based configuration loading.

use janus_config::{ConfigError, ConfigLoader, GrpcClientConfig, RawConfig};
use janus_telemetry::LogFormat;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_temp(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_load_toml_file() {
    let file = write_temp(
        ".toml",
        r#"
[service]
name = "greeter"

[server.http]
address = "127.0.0.1:18000"
timeout_ms = 250

[logging]
format = "pretty"
"#,
    );

    let config = ConfigLoader::new().with_file(file.path()).unwrap().load().unwrap();

    assert_eq!(config.service.name, "greeter");
    assert_eq!(config.server.http.address, "127.0.0.1:18000");
    assert_eq!(config.server.http.timeout_ms, 250);
    assert_eq!(config.server.grpc.address, "0.0.0.0:9000");
    assert_eq!(config.logging.format, LogFormat::Pretty);
}

#[test]
fn test_load_yaml_file() {
    let file = write_temp(
        ".yaml",
        "server:\n  grpc:\n    address: 127.0.0.1:19000\nclient:\n  grpc:\n    endpoint: 127.0.0.1:19000\n",
    );

    let config = ConfigLoader::new().with_file(file.path()).unwrap().load().unwrap();

    assert_eq!(config.server.grpc.address, "127.0.0.1:19000");
    assert_eq!(config.client.grpc.endpoint.as_deref(), Some("127.0.0.1:19000"));
}

#[test]
fn test_load_json_file() {
    let file = write_temp(".json", r#"{"client": {"http": {"request_timeout_ms": 750}}}"#);

    let config = ConfigLoader::new().with_file(file.path()).unwrap().load().unwrap();

    assert_eq!(config.client.http.request_timeout_ms, 750);
    assert_eq!(config.client.http.dial_timeout_ms, 1000);
}

#[test]
fn test_unknown_extension_rejected() {
    let file = write_temp(".ini", "a = 1");
    let result = ConfigLoader::new().with_file(file.path());
    assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
}

#[test]
fn test_unknown_field_rejected() {
    let file = write_temp(".toml", "[server.http]\nport = 8000\n");
    let result = ConfigLoader::new().with_file(file.path());
    assert!(matches!(result, Err(ConfigError::TomlError(_))));
}

#[test]
fn test_invalid_values_fail_validation() {
    let file = write_temp(".toml", "[server.grpc]\naddress = \"nowhere\"\n");
    let result = ConfigLoader::new().with_file(file.path()).unwrap().load();
    assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
}

#[test]
fn test_raw_config_scan_from_file() {
    let file = write_temp(
        ".yml",
        "client:\n  grpc:\n    timeout_ms: 100\ngreeter:\n  prefix: hello\n",
    );

    let raw = RawConfig::from_file(file.path()).unwrap();
    let grpc: GrpcClientConfig = raw.scan("client.grpc").unwrap();

    assert_eq!(grpc.timeout_ms, 100);
    assert!(grpc.insecure);
    assert_eq!(
        raw.get("greeter.prefix").and_then(|v| v.as_str()),
        Some("hello")
    );
}
