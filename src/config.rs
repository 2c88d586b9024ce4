//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory
//! (or the file named by `VIGIL_CONFIG`), then applies the
//! `VIGIL_LOG_LEVEL` env override.
//!
//! Reporter sections are kept opaque: each `[[services.reporters]]` table is
//! re-encoded to a JSON fragment and handed to the reporter dispatcher as-is.

use std::{
    collections::{BTreeMap, HashSet},
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::error::AppError;
use crate::service::Service;

/// One monitored service and its reporter config fragments.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub name: String,
    pub host: String,
    pub port: u16,
    /// Passed through to reports as `haproxy_server_options`.
    pub server_options: String,
    pub labels: BTreeMap<String, String>,
    /// Raw JSON object per reporter, in declaration order.
    pub reporters: Vec<Vec<u8>>,
}

impl ServiceConfig {
    pub fn to_service(&self) -> Service {
        Service::new(
            self.name.clone(),
            self.host.clone(),
            self.port,
            self.server_options.clone(),
            self.labels.clone(),
        )
    }
}

/// Fully-resolved agent configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    /// Delay between two health checks of the same service.
    pub check_interval: Duration,
    /// Upper bound on a single health check.
    pub check_timeout: Duration,
    pub services: Vec<ServiceConfig>,
}

impl Config {
    pub fn service(&self, name: &str) -> Option<&ServiceConfig> {
        self.services.iter().find(|s| s.name == name)
    }
}

/// Raw TOML shape — `serde` target before resolution.
#[derive(Deserialize)]
struct RawConfig {
    #[serde(default)]
    agent: RawAgent,
    #[serde(default)]
    services: Vec<RawService>,
}

#[derive(Deserialize)]
struct RawAgent {
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default = "default_check_interval_ms")]
    check_interval_ms: u64,
    #[serde(default = "default_check_timeout_ms")]
    check_timeout_ms: u64,
}

impl Default for RawAgent {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            check_interval_ms: default_check_interval_ms(),
            check_timeout_ms: default_check_timeout_ms(),
        }
    }
}

#[derive(Deserialize)]
struct RawService {
    name: String,
    #[serde(default = "default_host")]
    host: String,
    port: u16,
    #[serde(default)]
    haproxy_server_options: String,
    #[serde(default)]
    labels: BTreeMap<String, String>,
    /// Opaque per-backend tables; only the dispatcher interprets them.
    #[serde(default)]
    reporters: Vec<toml::Table>,
}

fn default_log_level() -> String { "info".to_string() }
fn default_check_interval_ms() -> u64 { 2000 }
fn default_check_timeout_ms() -> u64 { 1000 }
fn default_host() -> String { "127.0.0.1".to_string() }

/// Load config from `VIGIL_CONFIG` or `config/default.toml`, then apply env overrides.
pub fn load() -> Result<Config, AppError> {
    let path = env::var("VIGIL_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());
    let log_level_override = env::var("VIGIL_LOG_LEVEL").ok();
    load_from(&expand_home(&path), log_level_override.as_deref())
}

/// Internal loader — accepts an explicit path and optional overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(path: &Path, log_level_override: Option<&str>) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    if parsed.agent.check_interval_ms == 0 {
        return Err(AppError::Config("check_interval_ms must be positive".into()));
    }

    let mut seen = HashSet::new();
    let mut services = Vec::with_capacity(parsed.services.len());
    for s in parsed.services {
        if !seen.insert(s.name.clone()) {
            return Err(AppError::Config(format!("duplicate service '{}'", s.name)));
        }
        if s.reporters.is_empty() {
            return Err(AppError::Config(format!("service '{}' has no reporters", s.name)));
        }
        let reporters = s
            .reporters
            .iter()
            .map(serde_json::to_vec)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                AppError::Config(format!("cannot encode reporters of service '{}': {e}", s.name))
            })?;
        services.push(ServiceConfig {
            name: s.name,
            host: s.host,
            port: s.port,
            server_options: s.haproxy_server_options,
            labels: s.labels,
            reporters,
        });
    }

    Ok(Config {
        log_level: log_level_override.unwrap_or(&parsed.agent.log_level).to_string(),
        check_interval: Duration::from_millis(parsed.agent.check_interval_ms),
        check_timeout: Duration::from_millis(parsed.agent.check_timeout_ms),
        services,
    })
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const FULL_TOML: &str = r#"
[agent]
log_level = "debug"
check_interval_ms = 500

[[services]]
name = "api"
host = "10.0.0.5"
port = 8080
haproxy_server_options = "weight 10"

[services.labels]
az = "us-east-1a"

[[services.reporters]]
type = "console"
pretty = true

[[services.reporters]]
type = "file"
path = "/tmp/api.report"
"#;

    fn write_toml(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn parse_full_config() {
        let f = write_toml(FULL_TOML);
        let cfg = load_from(f.path(), None).unwrap();
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.check_interval, Duration::from_millis(500));
        assert_eq!(cfg.check_timeout, Duration::from_millis(1000));

        let api = cfg.service("api").unwrap();
        assert_eq!(api.host, "10.0.0.5");
        assert_eq!(api.port, 8080);
        assert_eq!(api.server_options, "weight 10");
        assert_eq!(api.labels.get("az").map(String::as_str), Some("us-east-1a"));
        assert_eq!(api.reporters.len(), 2);
    }

    #[test]
    fn reporter_tables_become_json_objects() {
        let f = write_toml(FULL_TOML);
        let cfg = load_from(f.path(), None).unwrap();
        let api = cfg.service("api").unwrap();
        let first: serde_json::Value = serde_json::from_slice(&api.reporters[0]).unwrap();
        assert_eq!(first["type"], "console");
        assert_eq!(first["pretty"], true);
        let second: serde_json::Value = serde_json::from_slice(&api.reporters[1]).unwrap();
        assert_eq!(second["path"], "/tmp/api.report");
    }

    #[test]
    fn empty_config_uses_defaults() {
        let f = write_toml("");
        let cfg = load_from(f.path(), None).unwrap();
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.check_interval, Duration::from_millis(2000));
        assert!(cfg.services.is_empty());
    }

    #[test]
    fn service_without_reporters_rejected() {
        let f = write_toml("[[services]]\nname = \"api\"\nport = 80\n");
        let msg = load_from(f.path(), None).unwrap_err().to_string();
        assert!(msg.contains("no reporters"));
    }

    #[test]
    fn duplicate_service_rejected() {
        let one = "[[services]]\nname = \"api\"\nport = 80\n[[services.reporters]]\ntype = \"console\"\n";
        let f = write_toml(&format!("{one}{one}"));
        let msg = load_from(f.path(), None).unwrap_err().to_string();
        assert!(msg.contains("duplicate service 'api'"));
    }

    #[test]
    fn missing_file_errors() {
        let result = load_from(Path::new("/nonexistent/config.toml"), None);
        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("config error"));
    }

    #[test]
    fn env_log_level_override() {
        let f = write_toml(FULL_TOML);
        let cfg = load_from(f.path(), Some("trace")).unwrap();
        assert_eq!(cfg.log_level, "trace");
    }

    #[test]
    fn tilde_expands_to_home() {
        let home = dirs::home_dir().expect("home dir must exist in test env");
        let expanded = expand_home("~/.vigil");
        assert!(expanded.starts_with(&home));
        assert!(expanded.ends_with(".vigil"));
    }

    #[test]
    fn absolute_path_unchanged() {
        assert_eq!(expand_home("/absolute/path"), PathBuf::from("/absolute/path"));
    }
}
