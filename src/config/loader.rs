// src/config/loader.rs
//! Layered configuration loader
//!
//! Sources are merged in order: built-in defaults, each TOML file (optional unless
//! required), then
//! `ERD__SECTION__FIELD` environment variables. The merged result is validated
//! before it is handed out.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use tracing::{debug, info};

use crate::config::{constants::paths, SystemConfig};
use crate::error::{ErdErrorBuilder, ErdResult, IntoErdError};

/// Configuration loader with file and environment layering
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config_paths: Vec<PathBuf>,
    env_prefix: String,
    files_required: bool,
}

impl ConfigLoader {
    /// Loader over the conventional `config/erd.toml` and `./erd.toml` locations
    pub fn new() -> Self {
        Self::with_paths(vec![
            PathBuf::from(paths::DEFAULT_CONFIG_FILE),
            PathBuf::from(paths::LOCAL_CONFIG_FILE),
        ])
    }

    /// Create loader with custom paths, later paths take precedence
    pub fn with_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            config_paths: paths,
            env_prefix: paths::ENV_PREFIX.to_string(),
            files_required: false,
        }
    }

    /// Loader for a single explicit file, which must exist
    pub fn with_file<P: AsRef<Path>>(path: P) -> Self {
        Self::with_paths(vec![path.as_ref().to_path_buf()]).require_files()
    }

    /// Fail the load when any configured path is missing
    pub fn require_files(mut self) -> Self {
        self.files_required = true;
        self
    }

    /// Override the environment variable prefix
    pub fn env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = prefix.to_string();
        self
    }

    /// Load, merge and validate the system configuration
    pub fn load_system_config(&self) -> ErdResult<SystemConfig> {
        let mut builder = Config::builder();

        for path in &self.config_paths {
            if path.exists() {
                debug!(path = %path.display(), "Merging configuration file");
            }
            builder = builder.add_source(
                File::from(path.as_path())
                    .format(FileFormat::Toml)
                    .required(self.files_required),
            );
        }

        builder = builder.add_source(
            Environment::with_prefix(&self.env_prefix)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: SystemConfig = builder.build()?.try_deserialize()?;
        Self::validate(&config)?;

        info!(
            method = ?config.erd.method,
            pre_s = config.epoch.pre_seconds,
            post_s = config.epoch.post_seconds,
            band_low = config.filter.low_cutoff_hz,
            band_high = config.filter.high_cutoff_hz,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Parse and validate a configuration document held in memory
    pub fn load_from_str(content: &str) -> ErdResult<SystemConfig> {
        let config: SystemConfig = toml::from_str(content)?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate a configuration file without installing it
    pub fn validate_config_file<P: AsRef<Path>>(path: P) -> ErdResult<()> {
        let content = std::fs::read_to_string(path.as_ref()).erd_err("config_loader", "read_file")?;
        Self::load_from_str(&content).map(|_| ())
    }

    /// Export a configuration to a TOML file
    pub fn export_config<P: AsRef<Path>>(config: &SystemConfig, path: P) -> ErdResult<()> {
        let content = toml::to_string_pretty(config)?;
        std::fs::write(path.as_ref(), content).erd_err("config_loader", "export_config")?;
        Ok(())
    }

    /// Paths consulted by this loader, in precedence order
    pub fn config_paths(&self) -> &[PathBuf] {
        &self.config_paths
    }

    fn validate(config: &SystemConfig) -> ErdResult<()> {
        config.validate_consistency().map_err(|errors| {
            ErdErrorBuilder::new("config_loader", "validate").configuration(errors.join("; "))
        })
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::erd::ErdMethodKind;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn toml_file(content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    #[serial]
    fn test_load_defaults_without_files() {
        let loader = ConfigLoader::with_paths(vec![PathBuf::from("/nonexistent/erd.toml")]);
        let config = loader.load_system_config().unwrap();
        assert_eq!(config, SystemConfig::default());
    }

    #[test]
    #[serial]
    fn test_missing_explicit_file_is_an_error() {
        let err = ConfigLoader::with_file("/nonexistent/erd.toml")
            .load_system_config()
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    #[serial]
    fn test_file_overrides_defaults() {
        let file = toml_file(
            r#"
[filter]
low_cutoff_hz = 10.0
high_cutoff_hz = 26.0

[erd]
method = "welch"
"#,
        );

        let config = ConfigLoader::with_file(file.path()).load_system_config().unwrap();
        assert_eq!(config.filter.low_cutoff_hz, 10.0);
        assert_eq!(config.filter.high_cutoff_hz, 26.0);
        assert_eq!(config.filter.order, 5);
        assert_eq!(config.erd.method, ErdMethodKind::Welch);
    }

    #[test]
    #[serial]
    fn test_environment_override() {
        std::env::set_var("ERDTEST__LIVE__LATENCY_TARGET_MS", "150");
        std::env::set_var("ERDTEST__ERD__METHOD", "db_correction");

        let config = ConfigLoader::with_paths(Vec::new())
            .env_prefix("ERDTEST")
            .load_system_config()
            .unwrap();

        assert_eq!(config.live.latency_target_ms, 150);
        assert_eq!(config.erd.method, ErdMethodKind::DbCorrection);

        std::env::remove_var("ERDTEST__LIVE__LATENCY_TARGET_MS");
        std::env::remove_var("ERDTEST__ERD__METHOD");
    }

    #[test]
    fn test_invalid_config_validation() {
        let file = toml_file("[filter]\nlow_cutoff_hz = 30.0\nhigh_cutoff_hz = 8.0\n");
        let err = ConfigLoader::validate_config_file(file.path()).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("cutoffs"));
    }

    #[test]
    fn test_config_export_round_trip() {
        let file = NamedTempFile::new().unwrap();
        let mut config = SystemConfig::default();
        config.erd.moving_average_window = 50;

        ConfigLoader::export_config(&config, file.path()).unwrap();
        let content = std::fs::read_to_string(file.path()).unwrap();
        assert!(content.contains("[erd]"));

        let reloaded = ConfigLoader::load_from_str(&content).unwrap();
        assert_eq!(reloaded, config);
    }
}
