use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tokio::fs;

// ============================================================================
// Config (root)
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Root data directory. Store and vault paths default to subdirectories.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub session: SessionLifecycleConfig,
    #[serde(default)]
    pub stores: StoresConfig,
    #[serde(default)]
    pub vault: VaultConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("environment variable '{0}' is not set")]
    MissingEnvVar(String),

    #[error("unclosed variable reference '${{' (missing '}}')")]
    UnclosedVarReference,
}

impl Config {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ConfigError::Io(e)),
        };
        let expanded = expand_env_vars(&contents)?;
        Ok(serde_yaml::from_str(&expanded)?)
    }
}

/// Resolve a path relative to the config file directory.
///
/// Absolute paths are returned as-is; relative paths are joined with the
/// config file's parent directory so behavior does not depend on the current
/// working directory.
pub fn resolve_path(config_path: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }

    let config_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    config_dir.join(path)
}

// ============================================================================
// Sections
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Bearer tokens accepted by the gateway, each mapped to a user identity.
    /// Empty list means open mode (every request runs as the `local` user).
    #[serde(default)]
    pub api_tokens: Vec<ApiTokenConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_seconds: default_request_timeout(),
            max_connections: default_max_connections(),
            api_tokens: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ApiTokenConfig {
    pub token: String,
    pub user: String,
}

#[derive(Debug, Deserialize)]
pub struct SessionLifecycleConfig {
    /// Seconds of inactivity before an active session becomes idle.
    #[serde(default = "default_idle_after")]
    pub idle_after_seconds: u64,
    /// Seconds of inactivity before an idle session is closed and evicted.
    #[serde(default = "default_close_after")]
    pub close_after_seconds: u64,
    /// Interval of the lifecycle sweep task.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

impl Default for SessionLifecycleConfig {
    fn default() -> Self {
        Self {
            idle_after_seconds: default_idle_after(),
            close_after_seconds: default_close_after(),
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StoresConfig {
    #[serde(default)]
    pub primary_dir: Option<PathBuf>,
    #[serde(default)]
    pub courses_dir: Option<PathBuf>,
    #[serde(default)]
    pub transfers_dir: Option<PathBuf>,
    #[serde(default)]
    pub sessions_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VaultConfig {
    /// Root key-encryption-key, base64 or hex encoded 32 bytes. Reference an
    /// environment variable here (`${TUTOR_NEXUS_KEK}`); never inline the
    /// material.
    #[serde(default)]
    pub kek: Option<String>,
    #[serde(default)]
    pub keys_dir: Option<PathBuf>,
}

// ============================================================================
// Default Paths
// ============================================================================

/// Default data directory (relative to config file).
pub const DEFAULT_DATA_DIR: &str = ".nexus";
/// Default sessions directory (relative to data dir).
pub const DEFAULT_SESSIONS_DIR: &str = "sessions";
/// Default key-record directory (relative to data dir).
pub const DEFAULT_KEYS_DIR: &str = "keys";
/// Default store directories (relative to data dir).
pub const DEFAULT_PRIMARY_DIR: &str = "stores/primary";
pub const DEFAULT_COURSES_DIR: &str = "stores/courses";
pub const DEFAULT_TRANSFERS_DIR: &str = "stores/transfers";

// ============================================================================
// Private Helpers (Serde Defaults)
// ============================================================================

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_connections() -> usize {
    256
}

fn default_idle_after() -> u64 {
    900
}

fn default_close_after() -> u64 {
    3600
}

fn default_sweep_interval() -> u64 {
    60
}

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand environment variables in a string.
///
/// Supports shell-compatible syntax:
/// - `${VAR}` - required variable, errors if not set
/// - `${VAR:-default}` - optional variable with default value
/// - `$$` - escaped `$` (only needed before `{` to prevent expansion)
///
/// No nested expansion; an unclosed `${` is an error.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        match chars.peek() {
            Some('$') => {
                chars.next();
                result.push('$');
            }
            Some('{') => {
                chars.next();
                result.push_str(&parse_var_reference(&mut chars)?);
            }
            _ => result.push('$'),
        }
    }

    Ok(result)
}

/// Parse a variable reference after seeing `${`.
fn parse_var_reference(
    chars: &mut std::iter::Peekable<std::str::Chars>,
) -> Result<String, ConfigError> {
    let mut var_name = String::new();
    let mut default_value: Option<String> = None;
    let mut in_default = false;
    let mut closed = false;

    while let Some(c) = chars.next() {
        if c == '}' {
            closed = true;
            break;
        }
        if !in_default && c == ':' && chars.peek() == Some(&'-') {
            chars.next();
            in_default = true;
            default_value = Some(String::new());
            continue;
        }
        if in_default {
            if let Some(d) = default_value.as_mut() {
                d.push(c);
            }
        } else {
            var_name.push(c);
        }
    }

    if !closed {
        return Err(ConfigError::UnclosedVarReference);
    }

    match std::env::var(&var_name) {
        Ok(v) => Ok(v),
        Err(_) => default_value.ok_or(ConfigError::MissingEnvVar(var_name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.session.idle_after_seconds, 900);
        assert_eq!(config.session.close_after_seconds, 3600);
        assert!(config.vault.kek.is_none());
    }

    #[test]
    fn expand_required_var() {
        std::env::set_var("NEXUS_TEST_VAR", "hello");
        let out = expand_env_vars("value: ${NEXUS_TEST_VAR}").unwrap();
        assert_eq!(out, "value: hello");
    }

    #[test]
    fn expand_missing_var_errors() {
        std::env::remove_var("NEXUS_TEST_MISSING");
        let err = expand_env_vars("value: ${NEXUS_TEST_MISSING}").unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(name) if name == "NEXUS_TEST_MISSING"));
    }

    #[test]
    fn expand_with_default() {
        std::env::remove_var("NEXUS_TEST_MISSING");
        let out = expand_env_vars("port: ${NEXUS_TEST_MISSING:-8080}").unwrap();
        assert_eq!(out, "port: 8080");
    }

    #[test]
    fn escaped_dollar() {
        let out = expand_env_vars("price: $$100 and $${literal}").unwrap();
        assert_eq!(out, "price: $100 and ${literal}");
    }

    #[test]
    fn unclosed_reference_errors() {
        let err = expand_env_vars("broken: ${VAR").unwrap_err();
        assert!(matches!(err, ConfigError::UnclosedVarReference));
    }

    #[test]
    fn parse_full_config() {
        let yaml = r#"
data_dir: /tmp/nexus
server:
  host: 127.0.0.1
  port: 9000
  api_tokens:
    - token: secret-token
      user: alice
session:
  idle_after_seconds: 10
  close_after_seconds: 20
vault:
  kek: dGVzdA==
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.api_tokens.len(), 1);
        assert_eq!(config.server.api_tokens[0].user, "alice");
        assert_eq!(config.session.idle_after_seconds, 10);
        assert_eq!(config.vault.kek.as_deref(), Some("dGVzdA=="));
    }

    #[test]
    fn resolve_relative_path() {
        let resolved = resolve_path(Path::new("/etc/nexus/nexus.yaml"), Path::new("data"));
        assert_eq!(resolved, PathBuf::from("/etc/nexus/data"));

        let absolute = resolve_path(Path::new("/etc/nexus/nexus.yaml"), Path::new("/var/data"));
        assert_eq!(absolute, PathBuf::from("/var/data"));
    }
}
