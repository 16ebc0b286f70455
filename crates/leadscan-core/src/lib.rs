mod business;
mod config;
mod scan_config;

pub use business::{BusinessRecord, MergedBusiness, Source, WebsiteStatus};
pub use config::{load_scan_config, load_scan_config_from_env};
pub use scan_config::{ScanConfig, DEFAULT_INDUSTRIES, DEFAULT_USER_AGENTS};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown source: {0}")]
    UnknownSource(String),

    #[error("business record is missing required field `{0}`")]
    MissingField(&'static str),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("configuration validation failed: {0}")]
    Validation(String),
}
