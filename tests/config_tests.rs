// Config loading and validation tests

use docker_stats_exporter::config::{AppConfig, parse_filter_labels, parse_scrape_labels};
use docker_stats_exporter::reconciler::ReconcilerConfig;
use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

const VALID_CONFIG: &str = r#"
[server]
port = 9100
host = "127.0.0.1"
shutdown_timeout_secs = 3

[monitoring]
read_interval_ms = 500
refresh_interval_ms = 4000
refresh_tick_ms = 250

[labels]
scrape = ["com.example.team", "env"]
filter = ["monitor=true"]
"#;

#[test]
fn test_config_loads_from_str() {
    let config = AppConfig::load_from_str(VALID_CONFIG).expect("load_from_str");
    assert_eq!(config.server.port, 9100);
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.shutdown_timeout_secs, 3);
    assert_eq!(config.monitoring.read_interval_ms, 500);
    assert_eq!(config.monitoring.refresh_interval_ms, 4000);
    assert_eq!(config.monitoring.refresh_tick_ms, 250);
    assert_eq!(config.labels.scrape, vec!["com.example.team", "env"]);
    assert_eq!(config.labels.filter, vec!["monitor=true"]);
}

#[test]
fn test_empty_config_uses_defaults() {
    let config = AppConfig::load_from_str("").expect("defaults");
    assert_eq!(config.server.port, 9099);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.shutdown_timeout_secs, 5);
    assert_eq!(config.monitoring.read_interval_ms, 1000);
    assert_eq!(config.monitoring.refresh_interval_ms, 2000);
    assert_eq!(config.monitoring.refresh_tick_ms, 1000);
    assert!(config.labels.scrape.is_empty());
    assert!(config.labels.filter.is_empty());
}

#[test]
fn test_partial_section_keeps_other_defaults() {
    let config = AppConfig::load_from_str("[server]\nport = 9200\n").expect("partial");
    assert_eq!(config.server.port, 9200);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.monitoring.refresh_interval_ms, 2000);
}

#[test]
fn test_config_validation_rejects_invalid_port() {
    let bad = VALID_CONFIG.replace("port = 9100", "port = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("server.port"));
}

#[test]
fn test_config_validation_rejects_empty_host() {
    let bad = VALID_CONFIG.replace("host = \"127.0.0.1\"", "host = \"\"");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("server.host"));
}

#[test]
fn test_config_validation_rejects_zero_intervals() {
    for (field, line) in [
        ("read_interval_ms", "read_interval_ms = 500"),
        ("refresh_interval_ms", "refresh_interval_ms = 4000"),
        ("refresh_tick_ms", "refresh_tick_ms = 250"),
        ("shutdown_timeout_secs", "shutdown_timeout_secs = 3"),
    ] {
        let bad = VALID_CONFIG.replace(line, &format!("{field} = 0"));
        let err = AppConfig::load_from_str(&bad).unwrap_err();
        assert!(err.to_string().contains(field), "{field}: {err}");
    }
}

#[test]
fn test_invalid_toml_is_rejected() {
    assert!(AppConfig::load_from_str("[server\nport = 1").is_err());
    assert!(AppConfig::load_from_str("[server]\nport = \"nine\"").is_err());
}

#[test]
fn test_scrape_labels_are_comma_separated() {
    assert_eq!(
        parse_scrape_labels(" com.example.team, env ,,tier "),
        vec!["com.example.team", "env", "tier"]
    );
    assert!(parse_scrape_labels("").is_empty());
}

#[test]
fn test_filter_labels_are_space_separated() {
    assert_eq!(
        parse_filter_labels("monitor=true  env=prod\tteam"),
        vec!["monitor=true", "env=prod", "team"]
    );
    assert!(parse_filter_labels("   ").is_empty());
}

#[test]
fn test_env_overrides_file_values() {
    let env = HashMap::from([
        ("DOCKER_STATS_LABELS_SCRAPE", "tier,owner"),
        ("DOCKER_STATS_FILTER_LABELS", "a=1 b"),
        ("DOCKER_STATS_PORT", "9300"),
    ]);
    let mut config = AppConfig::load_from_str(VALID_CONFIG).unwrap();
    config.apply_env(|key| env.get(key).map(|v| v.to_string()));

    assert_eq!(config.labels.scrape, vec!["tier", "owner"]);
    assert_eq!(config.labels.filter, vec!["a=1", "b"]);
    assert_eq!(config.server.port, 9300);
    assert_eq!(config.server.host, "127.0.0.1");
}

#[test]
fn test_unset_env_leaves_config_alone() {
    let mut config = AppConfig::load_from_str(VALID_CONFIG).unwrap();
    config.apply_env(|_| None);
    assert_eq!(config.labels.scrape, vec!["com.example.team", "env"]);
    assert_eq!(config.server.port, 9100);
}

#[test]
fn test_invalid_port_env_is_ignored() {
    let mut config = AppConfig::load_from_str(VALID_CONFIG).unwrap();
    config.apply_env(|key| (key == "DOCKER_STATS_PORT").then(|| "not-a-port".to_string()));
    assert_eq!(config.server.port, 9100);
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(VALID_CONFIG.as_bytes()).unwrap();
    let config = AppConfig::load_from_file(file.path()).expect("load_from_file");
    assert_eq!(config.server.port, 9100);
    assert_eq!(config.labels.filter, vec!["monitor=true"]);
}

#[test]
fn test_missing_file_names_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    let err = AppConfig::load_from_file(&path).unwrap_err();
    assert!(err.to_string().contains("absent.toml"));
}

#[test]
fn test_reconciler_config_from_app_config() {
    let config = AppConfig::load_from_str(VALID_CONFIG).unwrap();
    let rc = ReconcilerConfig::from(&config);
    assert_eq!(rc.read_interval, Duration::from_millis(500));
    assert_eq!(rc.refresh_interval, Duration::from_millis(4000));
    assert_eq!(rc.refresh_tick, Duration::from_millis(250));
    assert_eq!(rc.filter.labels, vec!["monitor=true"]);
}
