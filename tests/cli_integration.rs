//! CLI integration tests.
//!
//! These tests verify the CLI argument parsing and configuration loading.

use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

use account_broker::cli::{parse_args_from, Args};
use account_broker::config::{Config, ConfigError};

fn args(args: &[&str]) -> Vec<OsString> {
    std::iter::once("account-broker")
        .chain(args.iter().copied())
        .map(OsString::from)
        .collect()
}

fn config_file(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file
}

// ============================================================================
// CLI Argument Tests
// ============================================================================

#[test]
fn test_cli_defaults() {
    let result = parse_args_from(args(&[])).unwrap();

    assert!(result.host.is_none());
    assert!(result.port.is_none());
    assert!(!result.no_auth);
    assert!(!result.memory_store);
    assert!(result.config.is_none());
    assert!(result.api_key.is_none());
    assert!(result.remote.is_none());
}

#[test]
fn test_cli_full_options() {
    let result = parse_args_from(args(&[
        "-H",
        "0.0.0.0",
        "-p",
        "8080",
        "-k",
        "my-api-key",
        "-l",
        "debug",
        "-s",
        "/var/lib/broker",
        "-r",
        "https://auth.example.com/v1",
        "--memory-store",
    ]))
    .unwrap();

    assert_eq!(result.host.unwrap().to_string(), "0.0.0.0");
    assert_eq!(result.port, Some(8080));
    assert_eq!(result.api_key, Some("my-api-key".to_string()));
    assert_eq!(result.log_level, Some("debug".to_string()));
    assert_eq!(result.state_dir, Some(PathBuf::from("/var/lib/broker")));
    assert_eq!(result.remote.as_deref(), Some("https://auth.example.com/v1"));
    assert!(result.memory_store);
    assert!(!result.no_auth);
}

#[test]
fn test_cli_config_file() {
    let result = parse_args_from(args(&["-c", "/etc/account-broker.json"])).unwrap();

    assert_eq!(
        result.config.unwrap().to_str().unwrap(),
        "/etc/account-broker.json"
    );
}

#[test]
fn test_cli_invalid_port() {
    assert!(parse_args_from(args(&["-p", "not-a-number"])).is_err());
}

#[test]
fn test_cli_invalid_host() {
    assert!(parse_args_from(args(&["-H", "not-an-ip"])).is_err());
}

#[test]
fn test_cli_invalid_remote() {
    assert!(parse_args_from(args(&["-r", "ftp://auth.example.com"])).is_err());
}

#[test]
fn test_cli_unexpected_argument() {
    assert!(parse_args_from(args(&["serve"])).is_err());
    assert!(parse_args_from(args(&["--bogus"])).is_err());
}

#[test]
fn test_cli_help_and_version() {
    assert!(parse_args_from(args(&["--help"])).unwrap().help);
    assert!(parse_args_from(args(&["-V"])).unwrap().version);
}

// ============================================================================
// Configuration Loading Tests
// ============================================================================

#[test]
fn test_config_from_json_file() {
    let file = config_file(
        r#"{
        "server": {
            "host": "192.168.1.100",
            "port": 9000,
            "graceful_shutdown": false
        },
        "security": {
            "enabled": true,
            "api_keys": ["key1", "key2"]
        },
        "storage": {
            "state_dir": "/srv/broker",
            "keychain_service": "broker-test"
        },
        "remote": {
            "base_url": "https://auth.example.com",
            "timeout_secs": 5
        },
        "cache": {
            "refresh_interval_secs": 600
        },
        "logging": {
            "level": "debug"
        }
    }"#,
    );

    let config = Config::from_file(file.path()).unwrap();

    assert_eq!(config.server.host, "192.168.1.100");
    assert_eq!(config.server.port, 9000);
    assert!(!config.server.graceful_shutdown);
    assert!(config.security.requires_auth());
    assert_eq!(config.security.api_keys.len(), 2);
    assert_eq!(config.state_dir(), PathBuf::from("/srv/broker"));
    assert_eq!(config.registry_path(), PathBuf::from("/srv/broker/registry.json"));
    assert_eq!(config.storage.keychain_service, "broker-test");
    assert_eq!(config.remote_url().unwrap(), "https://auth.example.com");
    assert_eq!(config.remote.timeout_secs, 5);
    assert_eq!(config.refresh_interval().unwrap(), chrono::Duration::seconds(600));
    assert_eq!(config.log_filter(), "debug");
}

#[test]
fn test_config_priority_cli_over_file() {
    let file = config_file(r#"{"server": {"host": "10.0.0.1", "port": 5000}}"#);

    let args = Args {
        host: Some("192.168.1.1".parse().unwrap()),
        port: Some(8080),
        config: Some(file.path().to_path_buf()),
        ..Args::default()
    };

    let config = Config::load(&args).unwrap();

    assert_eq!(config.server.host, "192.168.1.1");
    assert_eq!(config.server.port, 8080);
}

#[test]
fn test_config_unset_cli_keeps_file_values() {
    let file = config_file(r#"{"server": {"port": 5000}, "remote": {"base_url": "http://10.0.0.2"}}"#);

    let args = Args {
        config: Some(file.path().to_path_buf()),
        ..Args::default()
    };

    let config = Config::load(&args).unwrap();

    assert_eq!(config.server.port, 5000);
    assert_eq!(config.remote_url().unwrap(), "http://10.0.0.2");
}

#[test]
fn test_config_api_key_enables_auth() {
    let args = Args {
        api_key: Some("secret-key".to_string()),
        ..Args::default()
    };

    let config = Config::load(&args).unwrap();

    assert!(config.security.requires_auth());
    assert!(config
        .security
        .api_keys
        .contains(&"secret-key".to_string()));
}

#[test]
fn test_config_no_auth_disables() {
    let file = config_file(r#"{"security": {"enabled": true, "api_keys": ["key1"]}}"#);

    let args = Args {
        config: Some(file.path().to_path_buf()),
        no_auth: true,
        ..Args::default()
    };

    let config = Config::load(&args).unwrap();

    assert!(!config.security.enabled);
    assert!(!config.security.requires_auth());
}

#[test]
fn test_config_to_server_config() {
    let args = Args {
        host: Some("0.0.0.0".parse().unwrap()),
        port: Some(8080),
        ..Args::default()
    };

    let config = Config::load(&args).unwrap();
    let server_config = config.to_server_config().unwrap();

    assert_eq!(server_config.host, "0.0.0.0");
    assert_eq!(server_config.port, 8080);
    assert!(server_config.graceful_shutdown);
}

#[test]
fn test_config_invalid_host_in_file() {
    let file = config_file(r#"{"server": {"host": "localhost-ish"}}"#);
    let config = Config::from_file(file.path()).unwrap();

    assert!(matches!(
        config.to_server_config(),
        Err(ConfigError::InvalidHost(_))
    ));
}

#[test]
fn test_config_remote_required() {
    let config = Config::default();
    assert!(matches!(config.remote_url(), Err(ConfigError::MissingRemote)));

    let file = config_file(r#"{"remote": {"base_url": "auth.example.com"}}"#);
    let config = Config::from_file(file.path()).unwrap();
    assert!(matches!(config.remote_url(), Err(ConfigError::InvalidRemote(_))));
}

#[test]
fn test_config_rejects_non_positive_interval() {
    let file = config_file(r#"{"cache": {"refresh_interval_secs": 0}}"#);
    let config = Config::from_file(file.path()).unwrap();

    assert!(matches!(
        config.refresh_interval(),
        Err(ConfigError::InvalidInterval(0))
    ));
}

#[test]
fn test_config_missing_file() {
    let args = Args {
        config: Some(PathBuf::from("/nonexistent/account-broker.json")),
        ..Args::default()
    };

    assert!(matches!(Config::load(&args), Err(ConfigError::Io(_))));
}

// ============================================================================
// Configuration Serialization Tests
// ============================================================================

#[test]
fn test_config_roundtrip() {
    let original = Config::default();
    let json = serde_json::to_string(&original).unwrap();
    let loaded: Config = serde_json::from_str(&json).unwrap();

    assert_eq!(original.server.host, loaded.server.host);
    assert_eq!(original.server.port, loaded.server.port);
    assert_eq!(
        original.storage.keychain_service,
        loaded.storage.keychain_service
    );
}

#[test]
fn test_config_partial_deserialization() {
    let config: Config = serde_json::from_str(r#"{"server": {"port": 9999}}"#).unwrap();

    assert_eq!(config.server.port, 9999);
    assert_eq!(config.server.host, "127.0.0.1");
    assert!(config.server.graceful_shutdown);
    assert!(!config.storage.memory_store);
    assert!(config.security.enabled);
    assert!(!config.security.requires_auth());
}
