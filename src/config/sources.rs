use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "CAREERFLOW_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/careerflow.toml";
const ENV_PREFIX: &str = "CAREERFLOW";
const ENV_SEPARATOR: &str = "__";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load() -> Result<Config, ConfigError> {
    // Load .env file if it exists (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut config = load_from_sources(config_path)?;

    load_secrets(&mut config);

    Ok(config)
}

/// Load secrets from environment variables into config.
/// Secrets are never stored in TOML files, only in environment.
fn load_secrets(config: &mut Config) {
    if let Ok(key) = env::var("CAREERFLOW_TRACE_KEY") {
        config.trace.auth_key = Some(key);
    }
}

/// Load configuration from a specific path and environment.
/// Useful for testing with custom config files.
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    // Defaults come from the struct Default impls; the TOML file is optional
    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // Environment variable overrides:
    // CAREERFLOW__WORKER__WORKERS -> worker.workers
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(config.worker.workers, 4);
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[server]
bind_addr = "127.0.0.1:9000"

[server.api]
max_payload_bytes = "2MB"

[worker]
workers = 8
job_budget = "10m"

[worker.retry]
initial_delay = "2s"
max_attempts = 3

[specialists]
extractor_url = "http://extractor:8081/invoke"
analyzer_url = "http://analyzer:8082/invoke"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(config.server.api.max_payload_bytes.as_u64(), 2 * 1024 * 1024);
        assert_eq!(config.worker.workers, 8);
        assert_eq!(config.worker.job_budget.as_duration(), Duration::from_secs(600));
        assert_eq!(config.worker.retry.initial_delay.as_duration(), Duration::from_secs(2));
        assert_eq!(config.worker.retry.max_attempts, 3);
        assert_eq!(
            config.specialists.extractor_url.as_deref(),
            Some("http://extractor:8081/invoke")
        );
        assert!(config.specialists.charter_url.is_none());
    }

    #[test]
    fn test_trace_section() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(
            &config_path,
            "[trace]\nendpoint = \"http://trace-sink:3000/api/spans\"\n",
        )
        .unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(
            config.trace.endpoint.as_deref(),
            Some("http://trace-sink:3000/api/spans")
        );
        // Auth key only ever comes from the environment
        assert!(config.trace.auth_key.is_none());
    }
}
