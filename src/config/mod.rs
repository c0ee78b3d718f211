pub mod app_config;

pub use app_config::{AppConfig, AuthConfig, ConfigError, NotificationConfig, RecordExportConfig};
