use std::io::Write;

use ih_domain::config::{ClientConfig, ENV_API_KEY, ENV_BASE_URL};

#[test]
fn default_base_url_is_local_dev_server() {
    let config = ClientConfig::default();
    assert_eq!(config.base_url, "http://localhost:5173");
    assert!(config.api_key.is_none());
}

#[test]
fn default_timeouts_and_policies() {
    let config = ClientConfig::default();
    assert_eq!(config.timeout_secs, 30);
    assert!(config.auto_reconnect);
    assert_eq!(config.max_retries, 3);
    assert_eq!(config.retry_base_delay_ms, 1000);
    assert_eq!(config.reconnect_delay_ms, 3000);
    assert_eq!(config.max_reconnect_attempts, 0);
}

#[test]
fn empty_toml_equals_default() {
    let config = ClientConfig::from_toml_str("").unwrap();
    assert_eq!(config, ClientConfig::default());
}

#[test]
fn partial_toml_keeps_other_defaults() {
    let toml_str = r#"
base_url = "https://api.ihuman.dev"
api_key = "ih_live_123"
auto_reconnect = false
"#;
    let config = ClientConfig::from_toml_str(toml_str).unwrap();
    assert_eq!(config.base_url, "https://api.ihuman.dev");
    assert_eq!(config.api_key.as_deref(), Some("ih_live_123"));
    assert!(!config.auto_reconnect);
    assert_eq!(config.timeout_secs, 30);
}

#[test]
fn load_reads_file_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "timeout_secs = 5\nreconnect_delay_ms = 250").unwrap();

    let config = ClientConfig::load(file.path()).unwrap();
    assert_eq!(config.timeout_secs, 5);
    assert_eq!(config.reconnect_delay_ms, 250);
}

#[test]
fn load_missing_file_is_io_error() {
    let err = ClientConfig::load("/nonexistent/ihuman.toml").unwrap_err();
    assert!(matches!(err, ih_domain::error::Error::Io(_)));
}

#[test]
fn env_overrides_url_and_key() {
    std::env::set_var(ENV_BASE_URL, "http://staging:8080");
    std::env::set_var(ENV_API_KEY, "from-env");

    let config = ClientConfig::default().apply_env();

    std::env::remove_var(ENV_BASE_URL);
    std::env::remove_var(ENV_API_KEY);

    assert_eq!(config.base_url, "http://staging:8080");
    assert_eq!(config.api_key.as_deref(), Some("from-env"));
}
