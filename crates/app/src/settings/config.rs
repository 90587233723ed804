use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use quill_bridge::{AgentCommand, BridgeConfig, HostKind, ProviderConfig, rig_agent};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

use crate::router::Route;

pub const CONFIG_DIRECTORY_NAME: &str = "quill";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const ENV_PREFIX: &str = "QUILL_";
/// Read when no key is configured under the `QUILL_` prefix or in the file.
pub const FALLBACK_API_KEY_ENV: &str = "OPENAI_API_KEY";

pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|path| path.join(CONFIG_DIRECTORY_NAME))
        .unwrap_or_else(|| PathBuf::from(".quill"))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BridgeKind {
    #[default]
    Rig,
    Process,
}

impl From<BridgeKind> for HostKind {
    fn from(kind: BridgeKind) -> Self {
        match kind {
            BridgeKind::Rig => HostKind::Rig,
            BridgeKind::Process => HostKind::Process,
        }
    }
}

/// Startup configuration: which agent host to run and how to reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub bridge: BridgeKind,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub preamble: Option<String>,
    /// Command line of the external agent, used when `bridge` is `process`.
    #[serde(default)]
    pub agent_command: Option<String>,
    /// Page shown when the window opens, e.g. `/settings`.
    #[serde(default = "default_start_page")]
    pub start_page: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bridge: BridgeKind::default(),
            api_key: String::new(),
            endpoint: default_endpoint(),
            model: default_model(),
            preamble: None,
            agent_command: None,
            start_page: default_start_page(),
        }
    }
}

impl AppConfig {
    pub fn default_path() -> PathBuf {
        config_dir().join(SETTINGS_FILE_NAME)
    }

    /// Defaults, then the settings file, then `QUILL_*` environment variables.
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Json::file(path))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        figment.extract::<Self>().context(ExtractSnafu {
            stage: "extract-app-config",
        })
    }

    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        let config = Self::from_figment(Self::figment(&path))?
            .with_fallback_api_key(std::env::var(FALLBACK_API_KEY_ENV).ok());

        tracing::info!(
            path = %path.display(),
            bridge = ?config.bridge,
            model = %config.model,
            has_api_key = !config.api_key.is_empty(),
            "loaded configuration"
        );
        Ok(config)
    }

    pub fn with_fallback_api_key(mut self, fallback: Option<String>) -> Self {
        if self.api_key.trim().is_empty()
            && let Some(key) = fallback.filter(|key| !key.trim().is_empty())
        {
            self.api_key = key;
        }
        self
    }

    pub fn bridge_config(&self) -> BridgeConfig {
        let mut provider = ProviderConfig::new(&self.api_key, &self.endpoint, &self.model);
        if let Some(preamble) = self.preamble.as_deref().filter(|text| !text.trim().is_empty()) {
            provider = provider.with_preamble(preamble);
        }

        BridgeConfig {
            kind: self.bridge.into(),
            provider,
            agent_command: self.agent_command.as_deref().and_then(AgentCommand::parse),
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    #[snafu(display("failed to load configuration on `{stage}`: {source}"))]
    Extract {
        stage: &'static str,
        source: figment::Error,
    },
}

fn default_start_page() -> String {
    Route::Home.path().to_string()
}

fn default_endpoint() -> String {
    rig_agent::DEFAULT_ENDPOINT.to_string()
}

fn default_model() -> String {
    rig_agent::DEFAULT_MODEL.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_json(json: &str) -> Result<AppConfig, ConfigError> {
        AppConfig::from_figment(
            Figment::from(Serialized::defaults(AppConfig::default())).merge(Json::string(json)),
        )
    }

    #[test]
    fn empty_file_keeps_defaults() {
        let config = from_json("{}").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.bridge, BridgeKind::Rig);
        assert_eq!(config.model, rig_agent::DEFAULT_MODEL);
    }

    #[test]
    fn file_values_override_defaults() {
        let config = from_json(
            r#"{"bridge": "process", "agent_command": "goose acp --stdio", "model": "gpt-4.1"}"#,
        )
        .unwrap();

        let bridge = config.bridge_config();
        assert_eq!(bridge.kind, HostKind::Process);
        assert_eq!(bridge.provider.model, "gpt-4.1");
        let command = bridge.agent_command.unwrap();
        assert_eq!(command.program, "goose");
        assert_eq!(command.args, vec!["acp", "--stdio"]);
    }

    #[test]
    fn unknown_bridge_kind_is_an_error() {
        let error = from_json(r#"{"bridge": "carrier-pigeon"}"#).unwrap_err();
        assert!(error.to_string().contains("extract-app-config"));
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let figment = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Json::file(dir.path().join(SETTINGS_FILE_NAME)));
        assert_eq!(AppConfig::from_figment(figment).unwrap(), AppConfig::default());
    }

    #[test]
    fn fallback_key_only_fills_a_blank_key() {
        let config = AppConfig::default().with_fallback_api_key(Some("sk-env".into()));
        assert_eq!(config.api_key, "sk-env");

        let config = AppConfig {
            api_key: "sk-file".into(),
            ..Default::default()
        }
        .with_fallback_api_key(Some("sk-env".into()));
        assert_eq!(config.api_key, "sk-file");

        let config = AppConfig::default().with_fallback_api_key(Some("  ".into()));
        assert!(config.api_key.is_empty());
    }

    #[test]
    fn start_page_defaults_to_home_and_accepts_any_path() {
        assert_eq!(Route::parse(&AppConfig::default().start_page), Route::Home);

        let config = from_json(r#"{"start_page": "/nowhere"}"#).unwrap();
        assert_eq!(
            Route::parse(&config.start_page),
            Route::NotFound("/nowhere".to_string())
        );
    }

    #[test]
    fn blank_preamble_is_dropped() {
        let config = AppConfig {
            preamble: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(config.bridge_config().provider.preamble, None);
    }
}
