//! Configuration Loader
//!
//! Environment-aware configuration loading. Handles YAML file discovery,
//! environment detection, overlay merging and sanitized logging.

use super::error::{ConfigResult, ConfigurationError};
use super::RankerConfig;
use config::{Config, Environment, File, FileFormat};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Base configuration file name inside the config directory
pub const BASE_CONFIG_FILE: &str = "ranker-config.yaml";

/// Prefix for environment variable overrides (`RANKER__SEARCH__MAX_RETRIES=1`)
pub const ENV_PREFIX: &str = "RANKER";

/// Loaded configuration plus the context it was loaded from
#[derive(Debug)]
pub struct ConfigManager {
    config: RankerConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment.
    /// Useful for tests that must not touch process environment variables.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let config = Self::load_and_merge_config(&config_directory, environment)?;
        config.validate()?;

        debug!(
            "Configuration loaded successfully: {}",
            serde_json::to_string_pretty(&Self::sanitize_config_for_logging(&config))
                .unwrap_or_else(|_| "[serialization error]".to_string())
        );

        info!(
            environment = environment,
            max_page = config.search.max_page,
            max_retries = config.search.max_retries,
            timeout_budget_ms = config.search.timeout_budget_ms,
            "Configuration loaded"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Load configuration, falling back to built-in defaults when no file can be used
    pub fn load_or_default() -> Arc<ConfigManager> {
        match Self::load() {
            Ok(manager) => manager,
            Err(e) => {
                warn!(error = %e, "Configuration unavailable, using built-in defaults");
                Arc::new(Self::fallback())
            }
        }
    }

    /// Wrap an already-built configuration (tests, embedding callers)
    pub fn from_config(config: RankerConfig, environment: &str) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory: Self::default_config_directory(),
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &RankerConfig {
        &self.config
    }

    /// Get the current environment
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Get the configuration directory
    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Sanitized configuration for debugging output
    pub fn debug_config(&self) -> serde_json::Value {
        Self::sanitize_config_for_logging(&self.config)
    }

    fn fallback() -> ConfigManager {
        ConfigManager {
            config: RankerConfig::default(),
            environment: Self::detect_environment(),
            config_directory: PathBuf::from("config"),
        }
    }

    fn load_and_merge_config(config_directory: &Path, environment: &str) -> ConfigResult<RankerConfig> {
        let base_path = config_directory.join(BASE_CONFIG_FILE);
        if !base_path.is_file() {
            return Err(ConfigurationError::base_file_missing(base_path));
        }

        let overlay_path = config_directory
            .join("environments")
            .join(format!("{environment}.yaml"));
        if overlay_path.is_file() {
            debug!("Applying environment overlay: {}", overlay_path.display());
        }

        let settings = Config::builder()
            .add_source(File::from(base_path).format(FileFormat::Yaml).required(true))
            .add_source(
                File::from(overlay_path)
                    .format(FileFormat::Yaml)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigurationError::source_merge(environment, e))?;

        settings
            .try_deserialize::<RankerConfig>()
            .map_err(|e| ConfigurationError::shape_mismatch(environment, e))
    }

    /// Mask values whose key looks sensitive before they reach log output
    fn sanitize_config_for_logging(config: &RankerConfig) -> serde_json::Value {
        let mut config_json = serde_json::json!(config);
        let sensitive_patterns = ["password", "secret", "token", "key", "credential"];
        Self::sanitize_json_recursive(&mut config_json, &sensitive_patterns);
        config_json
    }

    fn sanitize_json_recursive(value: &mut serde_json::Value, sensitive_patterns: &[&str]) {
        match value {
            serde_json::Value::Object(map) => {
                for (key, val) in map.iter_mut() {
                    let key_lower = key.to_lowercase();
                    let is_sensitive = sensitive_patterns
                        .iter()
                        .any(|pattern| key_lower.contains(pattern));

                    if is_sensitive {
                        *val = serde_json::Value::String("[MASKED]".to_string());
                    } else {
                        Self::sanitize_json_recursive(val, sensitive_patterns);
                    }
                }
            }
            serde_json::Value::Array(arr) => {
                for item in arr.iter_mut() {
                    Self::sanitize_json_recursive(item, sensitive_patterns);
                }
            }
            _ => {}
        }
    }

    /// Detect current environment from environment variables
    pub fn detect_environment() -> String {
        env::var("RANKER_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    fn default_config_directory() -> PathBuf {
        let possible_dirs = [PathBuf::from("config"), PathBuf::from("../config")];

        for dir in possible_dirs {
            if dir.join(BASE_CONFIG_FILE).exists() {
                debug!("Found config directory: {}", dir.display());
                return dir;
            }
        }

        PathBuf::from("config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_config(dir: &Path, base: &str, overlay: Option<(&str, &str)>) {
        fs::write(dir.join(BASE_CONFIG_FILE), base).unwrap();
        if let Some((env_name, contents)) = overlay {
            let env_dir = dir.join("environments");
            fs::create_dir_all(&env_dir).unwrap();
            fs::write(env_dir.join(format!("{env_name}.yaml")), contents).unwrap();
        }
    }

    #[test]
    fn test_missing_base_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::BaseFileMissing { .. }));
    }

    #[test]
    fn test_environment_overlay_wins() {
        let dir = tempfile::tempdir().unwrap();
        write_config(
            dir.path(),
            "search:\n  max_retries: 3\n  max_page: 10\n",
            Some(("test", "search:\n  max_retries: 1\n")),
        );

        let manager =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
                .unwrap();
        assert_eq!(manager.config().search.max_retries, 1);
        assert_eq!(manager.config().search.max_page, 10);
        assert_eq!(manager.environment(), "test");
    }

    #[test]
    fn test_overlay_for_other_environment_ignored() {
        let dir = tempfile::tempdir().unwrap();
        write_config(
            dir.path(),
            "binder:\n  max_fail_count: 4\n",
            Some(("production", "binder:\n  max_fail_count: 0\n")),
        );

        let manager =
            ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
                .unwrap();
        assert_eq!(manager.config().binder.max_fail_count, 4);
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), "circuit_breaker:\n  failure_threshold: 0\n", None);

        let err = ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidValue { .. }));
    }

    #[test]
    fn test_malformed_overlay_fails_merge() {
        let dir = tempfile::tempdir().unwrap();
        write_config(
            dir.path(),
            "search:\n  max_page: 10\n",
            Some(("test", "search: [unclosed\n")),
        );

        let err = ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::SourceMerge { ref environment, .. } if environment == "test"
        ));
    }

    #[test]
    fn test_wrongly_typed_value_is_shape_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), "search:\n  max_page: lots\n", None);

        let err = ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "test")
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_sanitize_masks_sensitive_keys() {
        let mut value = serde_json::json!({
            "proxy": { "api_token": "abcdef", "host": "10.0.0.1" }
        });
        ConfigManager::sanitize_json_recursive(&mut value, &["token"]);
        assert_eq!(value["proxy"]["api_token"], "[MASKED]");
        assert_eq!(value["proxy"]["host"], "10.0.0.1");
    }
}
