pub mod config;
pub mod view;

pub use config::{AppConfig, BridgeKind, ConfigError, config_dir};
pub use view::{HostSummary, SettingsPage};
