use std::path::PathBuf;

use config::Config;
use error_stack::{report, ResultExt};
use serde::de::IntoDeserializer;
use serde::Deserialize;
use serde_path_to_error::{Deserializer as PathDeserializer, Segment, Track};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config source '{0}'")]
    Read(String),
    #[error("Failed to deserialize config field '{0}'")]
    Field(String),
    #[error("Invalid value for config field '{0}'")]
    Invalid(&'static str),
}

#[derive(Deserialize, Debug, Clone)]
pub struct AppConfig {
    pub google: GoogleConfig,
    #[serde(default)]
    pub notification: Option<NotificationConfig>,
    #[serde(default)]
    pub exports: Vec<RecordExportConfig>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct GoogleConfig {
    pub auth: AuthConfig,
    /// Pause before every remote call.
    #[serde(default = "default_request_delay_secs")]
    pub request_delay_secs: f64,
    /// Spreadsheet holding the `Users` tab checked by request authorization.
    #[serde(default)]
    pub data_library_id: Option<String>,
    #[serde(default = "default_gmail_user")]
    pub gmail_user: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum AuthConfig {
    /// Desktop OAuth client; the granted tokens are cached in `token_cache`.
    Installed {
        client_secret: PathBuf,
        token_cache: PathBuf,
    },
    ServiceAccount { key: PathBuf },
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct NotificationConfig {
    pub from: String,
    pub to: String,
    #[serde(default = "default_subject")]
    pub subject: String,
}

/// One XML-to-sheet export.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RecordExportConfig {
    pub name: String,
    pub sources: Vec<PathBuf>,
    pub spreadsheet_id: String,
    pub tab: String,
    pub columns: Vec<String>,
    /// Rows where this column is missing or holds an excluded value are dropped.
    pub key_column: String,
    #[serde(default = "default_excluded_values")]
    pub excluded_values: Vec<String>,
}

fn default_request_delay_secs() -> f64 {
    1.0
}

fn default_gmail_user() -> String {
    "me".to_owned()
}

fn default_subject() -> String {
    "sheets-relay failure".to_owned()
}

fn default_excluded_values() -> Vec<String> {
    vec!["0".to_owned()]
}

impl AppConfig {
    /// Reads the file named by `CONFIG_PATH`, `Config` (any supported
    /// extension) when unset.
    pub fn load() -> error_stack::Result<Self, ConfigError> {
        let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "Config".to_string());
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &str) -> error_stack::Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(config::File::with_name(config_path))
            .build()
            .change_context_lazy(|| ConfigError::Read(config_path.to_owned()))?;

        Self::from_config(config, config_path)
    }

    pub fn from_toml_str(toml: &str) -> error_stack::Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .change_context(ConfigError::Read("<inline>".to_owned()))?;

        Self::from_config(config, "<inline>")
    }

    fn from_config(config: Config, source_name: &str) -> error_stack::Result<Self, ConfigError> {
        let value = config
            .try_deserialize::<serde_json::Value>()
            .change_context_lazy(|| ConfigError::Read(source_name.to_owned()))?;

        let app_config = Self::from_value(value)
            .attach_printable_lazy(|| format!("Config source: {}", source_name))?;
        app_config.validate()?;
        Ok(app_config)
    }

    /// Deserializes with the path of the failing field in the error.
    pub fn from_value(value: serde_json::Value) -> error_stack::Result<Self, ConfigError> {
        let mut track = Track::new();
        let path_de = PathDeserializer::new(value.into_deserializer(), &mut track);
        match AppConfig::deserialize(path_de) {
            Ok(app_config) => Ok(app_config),
            Err(e) => {
                let path_str = track
                    .path()
                    .iter()
                    .map(|seg| match seg {
                        Segment::Seq { index } => format!("[{}]", index),
                        Segment::Map { key } => format!(".{}", key),
                        Segment::Enum { variant } => format!("::{}", variant),
                        Segment::Unknown => String::from("<?>"),
                    })
                    .collect::<String>();
                Err(report!(e)
                    .change_context(ConfigError::Field(
                        path_str.trim_start_matches('.').to_owned(),
                    ))
                    .attach_printable(
                        "Make sure all required fields are present in the configuration file",
                    ))
            }
        }
    }

    fn validate(&self) -> error_stack::Result<(), ConfigError> {
        let delay = self.google.request_delay_secs;
        if !delay.is_finite() || delay < 0.0 {
            return Err(report!(ConfigError::Invalid("google.request_delay_secs")))
                .attach_printable_lazy(|| format!("Expected a non-negative number, got {}", delay));
        }
        Ok(())
    }
}
