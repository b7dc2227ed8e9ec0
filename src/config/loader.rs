//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{LogFormat, ServerConfig, DEFAULT_PORT};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// An environment value that was present but could not be used.
///
/// The affected setting keeps its previous value. These are reported after
/// logging is initialised, which itself depends on the loaded config.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("ignoring {name}={value:?}: {reason}, using {fallback}")]
pub struct EnvWarning {
    pub name: &'static str,
    pub value: String,
    pub reason: &'static str,
    pub fallback: String,
}

/// A validated configuration plus any environment values that were ignored.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: ServerConfig,
    pub warnings: Vec<EnvWarning>,
}

/// Load configuration: defaults, then the optional TOML file, then the
/// process environment, then validation.
pub fn load_config(path: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    load_config_with(path, |name| std::env::var(name).ok())
}

/// Same as [`load_config`] with an explicit environment lookup.
pub fn load_config_with<F>(path: Option<&Path>, lookup: F) -> Result<LoadedConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => parse_file(path)?,
        None => ServerConfig::default(),
    };

    let warnings = apply_env_overrides(&mut config, lookup);

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(LoadedConfig { config, warnings })
}

fn parse_file(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Overlay environment values onto `config`.
pub fn apply_env_overrides<F>(config: &mut ServerConfig, lookup: F) -> Vec<EnvWarning>
where
    F: Fn(&str) -> Option<String>,
{
    let mut warnings = Vec::new();

    if let Some(raw) = lookup("PORT") {
        match parse_port(&raw) {
            Some(port) => config.server.port = port,
            None => {
                config.server.port = DEFAULT_PORT;
                warnings.push(EnvWarning {
                    name: "PORT",
                    value: raw,
                    reason: "not a positive port number",
                    fallback: DEFAULT_PORT.to_string(),
                });
            }
        }
    }

    if let Some(host) = lookup("HOST") {
        config.server.host = host.trim().to_string();
    }

    if let Some(environment) = lookup("APP_ENV") {
        config.server.environment = environment;
    }

    if let Some(url) = lookup("DATABASE_URL") {
        config.database.url = url;
    }

    override_secs(
        &lookup,
        "SHUTDOWN_TIMEOUT_SECS",
        &mut config.server.shutdown_timeout_secs,
        &mut warnings,
    );
    override_secs(
        &lookup,
        "REQUEST_TIMEOUT_SECS",
        &mut config.server.request_timeout_secs,
        &mut warnings,
    );
    override_secs(
        &lookup,
        "DATABASE_CONNECT_TIMEOUT_SECS",
        &mut config.database.connect_timeout_secs,
        &mut warnings,
    );

    if let Some(raw) = lookup("LOG_FORMAT") {
        match LogFormat::parse(&raw) {
            Some(format) => config.observability.log_format = format,
            None => warnings.push(EnvWarning {
                name: "LOG_FORMAT",
                value: raw,
                reason: "expected \"pretty\" or \"json\"",
                fallback: config.observability.log_format.to_string(),
            }),
        }
    }

    if let Some(raw) = lookup("METRICS_ENABLED") {
        match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => config.observability.metrics_enabled = true,
            "0" | "false" | "no" => config.observability.metrics_enabled = false,
            _ => warnings.push(EnvWarning {
                name: "METRICS_ENABLED",
                value: raw,
                reason: "expected a boolean",
                fallback: config.observability.metrics_enabled.to_string(),
            }),
        }
    }

    if let Some(address) = lookup("METRICS_ADDRESS") {
        config.observability.metrics_address = address;
    }

    warnings
}

/// Parse a listening port. Zero is rejected: it would bind an ephemeral port.
pub fn parse_port(raw: &str) -> Option<u16> {
    raw.trim().parse::<u16>().ok().filter(|port| *port > 0)
}

fn override_secs<F>(lookup: &F, name: &'static str, slot: &mut u64, warnings: &mut Vec<EnvWarning>)
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return;
    };
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => *slot = secs,
        _ => warnings.push(EnvWarning {
            name,
            value: raw,
            reason: "not a positive number of seconds",
            fallback: slot.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn port_unset_uses_default() {
        let loaded = load_config_with(None, env(&[])).unwrap();
        assert_eq!(loaded.config.server.port, 5000);
        assert!(loaded.warnings.is_empty());
    }

    #[test]
    fn port_from_env() {
        let loaded = load_config_with(None, env(&[("PORT", "8080")])).unwrap();
        assert_eq!(loaded.config.server.port, 8080);
    }

    #[test]
    fn unusable_port_falls_back_with_warning() {
        for raw in ["abc", "0", "-1", "70000", ""] {
            let loaded = load_config_with(None, env(&[("PORT", raw)])).unwrap();
            assert_eq!(loaded.config.server.port, DEFAULT_PORT, "PORT={raw:?}");
            assert_eq!(loaded.warnings.len(), 1);
            assert_eq!(loaded.warnings[0].name, "PORT");
        }
    }

    #[test]
    fn env_overrides_and_keeps_previous_on_bad_values() {
        let loaded = load_config_with(
            None,
            env(&[
                ("APP_ENV", "production"),
                ("DATABASE_URL", "mongodb://db.internal/app"),
                ("SHUTDOWN_TIMEOUT_SECS", "3"),
                ("REQUEST_TIMEOUT_SECS", "soon"),
                ("LOG_FORMAT", "JSON"),
                ("METRICS_ENABLED", "maybe"),
            ]),
        )
        .unwrap();

        let config = loaded.config;
        assert_eq!(config.server.environment, "production");
        assert_eq!(config.database.url, "mongodb://db.internal/app");
        assert_eq!(config.server.shutdown_timeout_secs, 3);
        assert_eq!(config.server.request_timeout_secs, 30);
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert!(!config.observability.metrics_enabled);

        let names: Vec<_> = loaded.warnings.iter().map(|w| w.name).collect();
        assert_eq!(names, vec!["REQUEST_TIMEOUT_SECS", "METRICS_ENABLED"]);
    }

    #[test]
    fn file_then_env() {
        let path = std::env::temp_dir().join(format!(
            "lifecycle-server-config-{}.toml",
            std::process::id()
        ));
        let mut file = fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[server]\nport = 7000\nenvironment = \"staging\"\n\n[database]\nurl = \"redis://cache:6379\""
        )
        .unwrap();

        let loaded = load_config_with(Some(&path), env(&[("PORT", "7100")])).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(loaded.config.server.port, 7100);
        assert_eq!(loaded.config.server.environment, "staging");
        assert_eq!(loaded.config.server.shutdown_timeout_secs, 10);
        assert_eq!(loaded.config.database.url, "redis://cache:6379");
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config_with(Some(Path::new("/nonexistent/server.toml")), env(&[]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn invalid_values_fail_validation() {
        let err = load_config_with(None, env(&[("HOST", "example.com")])).unwrap_err();
        match err {
            ConfigError::Validation(errors) => {
                assert_eq!(errors, vec![ValidationError::InvalidHost("example.com".into())])
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
