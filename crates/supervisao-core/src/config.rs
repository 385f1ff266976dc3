//! Configuration management for the filing agent.
//!
//! Provides TOML-based configuration with environment variable overrides
//! and a one-shot startup validation pass.

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "supervisao.toml";

/// Markers left in the shipped config template until an operator fills them in.
const PLACEHOLDER_MARKERS: &[&str] = &["_AQUI", "URL_DA_PAGINA", "ID_DO_", "seletor_para_"];

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Target portal URLs and locators
    pub portal: PortalConfig,
    /// Browser automation settings
    pub browser: BrowserConfig,
    /// Queue consumer settings
    pub worker: WorkerConfig,
    /// Storage settings
    pub database: DatabaseConfig,
}

impl AppConfig {
    /// Load configuration from `path`, falling back to defaults if the file is missing.
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be read or is not valid TOML.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();

        if path.exists() {
            tracing::debug!("Loading config from {}", path.display());
            let contents = fs::read_to_string(path)?;
            let config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::debug!("Config file {} not found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load configuration from `path` and apply environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `SUPERVISAO_DATABASE_PATH`: Override the SQLite database path
    /// - `SUPERVISAO_HEADLESS`: Override browser headless mode (true/false)
    /// - `SUPERVISAO_MAX_CONCURRENT_REPORTS`: Override the worker pool size
    /// - `SUPERVISAO_NAVIGATION_TIMEOUT_SECS`: Override the navigation timeout
    pub fn load_with_env(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let mut config = Self::load_from(path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides from an arbitrary key lookup (the process environment in production).
    ///
    /// Values that fail to parse are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("SUPERVISAO_DATABASE_PATH") {
            tracing::debug!("Override database.path from env: {}", val);
            self.database.path = PathBuf::from(val);
        }

        if let Some(val) = lookup("SUPERVISAO_HEADLESS") {
            if let Ok(headless) = val.parse() {
                self.browser.headless = headless;
                tracing::debug!("Override browser.headless from env: {}", headless);
            }
        }

        if let Some(val) = lookup("SUPERVISAO_MAX_CONCURRENT_REPORTS") {
            if let Ok(max) = val.parse() {
                self.worker.max_concurrent_reports = max;
                tracing::debug!("Override worker.max_concurrent_reports from env: {}", max);
            }
        }

        if let Some(val) = lookup("SUPERVISAO_NAVIGATION_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                self.browser.navigation_timeout_secs = secs;
                tracing::debug!("Override browser.navigation_timeout_secs from env: {}", secs);
            }
        }
    }

    /// Validate the configuration once at startup.
    ///
    /// Rejects empty or placeholder URLs and locators, an empty field table,
    /// a zero-sized worker pool and a zero navigation timeout.
    pub fn validate(&self) -> ConfigResult<()> {
        self.portal.validate()?;

        if self.worker.max_concurrent_reports == 0 {
            return Err(invalid(
                "worker.max_concurrent_reports",
                "must be at least 1",
            ));
        }

        if self.worker.status_write_attempts == 0 {
            return Err(invalid("worker.status_write_attempts", "must be at least 1"));
        }

        if self.browser.navigation_timeout_secs == 0 {
            return Err(invalid(
                "browser.navigation_timeout_secs",
                "must be greater than zero",
            ));
        }

        if self.database.path.as_os_str().is_empty() {
            return Err(invalid("database.path", "must not be empty"));
        }

        Ok(())
    }
}

/// Target portal URLs and control locators.
///
/// `fields` maps report field keys to locators on the portal form. Radio
/// groups are addressed by a selector matching every input of the group.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Portal entry (login) page
    pub login_url: String,
    /// Form page reached after login; may equal `login_url`
    pub form_url: String,
    /// Username input on the login page
    pub user_field: String,
    /// Password input on the login page
    pub password_field: String,
    /// Login submit control
    pub login_button: String,
    /// Form save/submit control
    pub submit_button: String,
    /// Report field key to form control locator
    pub fields: BTreeMap<String, String>,
}

impl PortalConfig {
    /// Reject empty or placeholder URLs and locators.
    pub fn validate(&self) -> ConfigResult<()> {
        let required = [
            ("portal.login_url", &self.login_url),
            ("portal.user_field", &self.user_field),
            ("portal.password_field", &self.password_field),
            ("portal.login_button", &self.login_button),
            ("portal.submit_button", &self.submit_button),
        ];

        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(invalid(field, "must not be empty"));
            }
            check_placeholder(field, value)?;
        }

        if !self.form_url.trim().is_empty() {
            check_placeholder("portal.form_url", &self.form_url)?;
        }

        if self.fields.is_empty() {
            return Err(invalid("portal.fields", "at least one field mapping is required"));
        }

        for (key, locator) in &self.fields {
            let field = format!("portal.fields.{key}");
            if locator.trim().is_empty() {
                return Err(invalid(&field, "must not be empty"));
            }
            check_placeholder(&field, locator)?;
        }

        Ok(())
    }
}

/// Browser automation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    pub headless: bool,
    /// Browser window width
    pub window_width: u32,
    /// Browser window height
    pub window_height: u32,
    /// Navigation timeout in seconds
    pub navigation_timeout_secs: u64,
    /// Explicit Chrome/Chromium executable; auto-detected when unset
    pub executable: Option<PathBuf>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1366,
            window_height: 768,
            navigation_timeout_secs: 30,
            executable: None,
        }
    }
}

/// Queue consumer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Reports processed at the same time (one browser each)
    pub max_concurrent_reports: usize,
    /// Interval between pending-queue polls in milliseconds
    pub poll_interval_ms: u64,
    /// Attempts for writing a terminal status back to the queue
    pub status_write_attempts: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_reports: 1,
            poll_interval_ms: 2000,
            status_write_attempts: 3,
        }
    }
}

/// Storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("supervisao.db"),
        }
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn check_placeholder(field: &str, value: &str) -> ConfigResult<()> {
    if PLACEHOLDER_MARKERS.iter().any(|marker| value.contains(marker)) {
        return Err(invalid(
            field,
            &format!("still holds the template placeholder '{value}'"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn valid_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.portal = PortalConfig {
            login_url: "https://portal.example.gov/login".to_string(),
            form_url: "https://portal.example.gov/relatorio".to_string(),
            user_field: "input[name=\"username\"]".to_string(),
            password_field: "input[name=\"password\"]".to_string(),
            login_button: "#submit".to_string(),
            submit_button: "#salvar".to_string(),
            fields: BTreeMap::from([
                ("medico-nome".to_string(), "#nome".to_string()),
                (
                    "contato-previo".to_string(),
                    "input[name=\"contato\"]".to_string(),
                ),
            ]),
        };
        config
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.browser.headless);
        assert_eq!(config.browser.navigation_timeout_secs, 30);
        assert_eq!(config.worker.max_concurrent_reports, 1);
        assert_eq!(config.database.path, PathBuf::from("supervisao.db"));
        assert!(config.portal.fields.is_empty());
    }

    #[test]
    fn test_default_config_fails_validation() {
        let err = AppConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains("portal.login_url"));
    }

    #[test]
    fn test_valid_config_passes() {
        valid_config().validate().expect("valid config");
    }

    #[test]
    fn test_placeholder_url_rejected() {
        let mut config = valid_config();
        config.portal.login_url = "URL_DA_PAGINA_DE_LOGIN_AQUI".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("portal.login_url"));
        assert!(err.to_string().contains("placeholder"));
    }

    #[test]
    fn test_placeholder_field_locator_names_key() {
        let mut config = valid_config();
        config.portal.fields.insert(
            "medico-cpf".to_string(),
            "#seletor_para_cpf_do_medico".to_string(),
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("portal.fields.medico-cpf"));
    }

    #[test]
    fn test_empty_form_url_allowed() {
        let mut config = valid_config();
        config.portal.form_url = String::new();
        config.validate().expect("form url is optional");
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = valid_config();
        config.worker.max_concurrent_reports = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("SUPERVISAO_DATABASE_PATH", "/var/lib/supervisao/queue.db"),
            ("SUPERVISAO_HEADLESS", "false"),
            ("SUPERVISAO_MAX_CONCURRENT_REPORTS", "3"),
            ("SUPERVISAO_NAVIGATION_TIMEOUT_SECS", "not-a-number"),
        ]);

        let mut config = AppConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| (*v).to_string()));

        assert_eq!(
            config.database.path,
            PathBuf::from("/var/lib/supervisao/queue.db")
        );
        assert!(!config.browser.headless);
        assert_eq!(config.worker.max_concurrent_reports, 3);
        // Unparseable values leave the default in place
        assert_eq!(config.browser.navigation_timeout_secs, 30);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let tmp = TempDir::new().expect("create temp dir");
        let config = AppConfig::load_from(tmp.path().join("absent.toml")).expect("load defaults");
        assert!(config.portal.login_url.is_empty());
    }

    #[test]
    fn test_load_partial_file() {
        let tmp = TempDir::new().expect("create temp dir");
        let path = tmp.path().join(DEFAULT_CONFIG_FILE);
        fs::write(
            &path,
            r##"
[portal]
login_url = "https://portal.example.gov/login"
user_field = "#user"
password_field = "#pass"
login_button = "#entrar"
submit_button = "#salvar"

[portal.fields]
"medico-nome" = "#nome"
"localizacao-unidade" = 'input[name="localizacao"]'

[worker]
max_concurrent_reports = 2
"##,
        )
        .expect("write config file");

        let config = AppConfig::load_from(&path).expect("parse config");
        assert_eq!(config.portal.fields.len(), 2);
        assert_eq!(
            config.portal.fields.get("localizacao-unidade").map(String::as_str),
            Some("input[name=\"localizacao\"]")
        );
        assert_eq!(config.worker.max_concurrent_reports, 2);
        // Defaults for untouched sections
        assert!(config.browser.headless);
        assert_eq!(config.worker.poll_interval_ms, 2000);
        config.validate().expect("loaded config is valid");
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let tmp = TempDir::new().expect("create temp dir");
        let path = tmp.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, "[portal\nlogin_url = ").expect("write config file");
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_unreadable_path_is_io_error() {
        let tmp = TempDir::new().expect("create temp dir");
        // A directory exists but cannot be read as a file
        let err = AppConfig::load_from(tmp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
