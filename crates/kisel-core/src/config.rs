//! Configuration loading and typed config structures.
//!
//! The canonical configuration lives in `kisel-config.yaml`. Every field
//! has a default, so an empty file (or no file at all) is a valid
//! configuration with promotion disabled.
//!
//! Environment variables override YAML values:
//! - `KISEL_DATA_DIR` overrides `storage.data_dir`
//! - `KISEL_LOG_LEVEL` overrides `logging.level`

use std::path::{Path, PathBuf};

use serde::Deserialize;

use kisel_types::RoleId;

/// Platform limit on role name length, in characters.
pub const MAX_ROLE_NAME_LEN: usize = 100;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct KiselConfig {
    /// Where the documents live.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Voice reward behaviour.
    #[serde(default)]
    pub rewards: RewardsConfig,

    /// Prices and parameters of the purchasable items.
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Invitation fan-out parameters.
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl KiselConfig {
    /// Load configuration from a YAML file, apply environment overrides,
    /// and validate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if it is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, apply environment overrides,
    /// and validate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] or [`ConfigError::Invalid`].
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("KISEL_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Ok(level) = std::env::var("KISEL_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    /// Check ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.catalog.promotion.price == 0 || self.catalog.custom_role.price == 0 {
            return Err(ConfigError::Invalid(String::from(
                "catalog prices must be greater than zero",
            )));
        }
        let max_name_len = self.catalog.custom_role.max_name_len;
        if max_name_len == 0 || max_name_len > MAX_ROLE_NAME_LEN {
            return Err(ConfigError::Invalid(format!(
                "catalog.custom_role.max_name_len must be 1..={MAX_ROLE_NAME_LEN}, got {max_name_len}"
            )));
        }
        if self.catalog.promotion.from_role.is_some() != self.catalog.promotion.to_role.is_some() {
            return Err(ConfigError::Invalid(String::from(
                "catalog.promotion needs both from_role and to_role, or neither",
            )));
        }
        if self.notify.max_concurrent_dispatch == 0 {
            return Err(ConfigError::Invalid(String::from(
                "notify.max_concurrent_dispatch must be at least 1",
            )));
        }
        Ok(())
    }
}

/// Document locations.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StorageConfig {
    /// Directory holding all documents.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Friend document file name.
    #[serde(default = "default_friends_file")]
    pub friends_file: String,

    /// Scores document file name.
    #[serde(default = "default_scores_file")]
    pub scores_file: String,

    /// Purchases document file name.
    #[serde(default = "default_purchases_file")]
    pub purchases_file: String,
}

impl StorageConfig {
    /// Full path of the friend document.
    pub fn friends_path(&self) -> PathBuf {
        self.data_dir.join(&self.friends_file)
    }

    /// Full path of the scores document.
    pub fn scores_path(&self) -> PathBuf {
        self.data_dir.join(&self.scores_file)
    }

    /// Full path of the purchases document.
    pub fn purchases_path(&self) -> PathBuf {
        self.data_dir.join(&self.purchases_file)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            friends_file: default_friends_file(),
            scores_file: default_scores_file(),
            purchases_file: default_purchases_file(),
        }
    }
}

/// Voice reward configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RewardsConfig {
    /// Credit the minutes spent in the old channel when a user switches
    /// channels. When false the session timer just restarts.
    #[serde(default = "default_true")]
    pub credit_on_switch: bool,

    /// Number of entries returned by the leaderboard.
    #[serde(default = "default_leaderboard_size")]
    pub leaderboard_size: usize,
}

impl Default for RewardsConfig {
    fn default() -> Self {
        Self {
            credit_on_switch: true,
            leaderboard_size: default_leaderboard_size(),
        }
    }
}

/// Catalog of one-time purchases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CatalogConfig {
    /// Tier promotion.
    #[serde(default)]
    pub promotion: PromotionConfig,

    /// Custom named role.
    #[serde(default)]
    pub custom_role: CustomRoleConfig,
}

/// Tier promotion parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PromotionConfig {
    /// Price in points.
    #[serde(default = "default_promotion_price")]
    pub price: u64,

    /// Role the user must currently hold.
    #[serde(default)]
    pub from_role: Option<RoleId>,

    /// Role the user is promoted to.
    #[serde(default)]
    pub to_role: Option<RoleId>,
}

impl PromotionConfig {
    /// The `(from, to)` pair, if promotion is configured.
    pub const fn roles(&self) -> Option<(RoleId, RoleId)> {
        match (self.from_role, self.to_role) {
            (Some(from), Some(to)) => Some((from, to)),
            _ => None,
        }
    }
}

impl Default for PromotionConfig {
    fn default() -> Self {
        Self {
            price: default_promotion_price(),
            from_role: None,
            to_role: None,
        }
    }
}

/// Custom role parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CustomRoleConfig {
    /// Price in points.
    #[serde(default = "default_custom_role_price")]
    pub price: u64,

    /// Longest accepted role name, in characters.
    #[serde(default = "default_max_name_len")]
    pub max_name_len: usize,
}

impl Default for CustomRoleConfig {
    fn default() -> Self {
        Self {
            price: default_custom_role_price(),
            max_name_len: default_max_name_len(),
        }
    }
}

/// Invitation fan-out configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NotifyConfig {
    /// Upper bound on in-flight presence lookups and DMs per invitation.
    #[serde(default = "default_max_concurrent_dispatch")]
    pub max_concurrent_dispatch: usize,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            max_concurrent_dispatch: default_max_concurrent_dispatch(),
        }
    }
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_friends_file() -> String {
    String::from("friends.json")
}

fn default_scores_file() -> String {
    String::from("scores.json")
}

fn default_purchases_file() -> String {
    String::from("purchases.json")
}

const fn default_true() -> bool {
    true
}

const fn default_leaderboard_size() -> usize {
    10
}

const fn default_promotion_price() -> u64 {
    10_000
}

const fn default_custom_role_price() -> u64 {
    2_500
}

const fn default_max_name_len() -> usize {
    MAX_ROLE_NAME_LEN
}

const fn default_max_concurrent_dispatch() -> usize {
    8
}

fn default_log_level() -> String {
    String::from("info")
}
