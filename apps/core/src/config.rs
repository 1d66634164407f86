use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::api_client::Endpoint;
use crate::settings::{self, SearchSettings};

const CONFIG_FILE_NAME: &str = "config.toml";
pub const DEFAULT_USER_AGENT: &str = "wikisearch-core search provider";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to encode config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub keyword: String,
    pub default_language: String,
    pub delay_ms: u64,
    pub max_results: u16,
    pub max_chars: u16,
    pub exclude_disambiguation: bool,
    pub enable_images: bool,
    pub image_max_width: u32,
    pub image_max_height: u32,
    pub host_domain: String,
    pub api_path: String,
    pub http_timeout_secs: u64,
    pub user_agent: String,
    #[serde(skip)]
    pub config_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let search = SearchSettings::default();
        Self {
            keyword: search.keyword,
            default_language: search.default_language,
            delay_ms: search.delay.as_millis() as u64,
            max_results: search.max_results,
            max_chars: search.max_chars,
            exclude_disambiguation: search.exclude_disambiguation,
            enable_images: search.enable_images,
            image_max_width: search.image_max_width,
            image_max_height: search.image_max_height,
            host_domain: "wikipedia.org".to_string(),
            api_path: "w/api.php".to_string(),
            http_timeout_secs: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            config_path: default_config_path(),
        }
    }
}

impl Config {
    pub fn search_settings(&self) -> SearchSettings {
        SearchSettings {
            keyword: self.keyword.trim().to_string(),
            default_language: self.default_language.trim().to_ascii_lowercase(),
            delay: Duration::from_millis(self.delay_ms),
            max_results: self.max_results,
            max_chars: self.max_chars,
            exclude_disambiguation: self.exclude_disambiguation,
            enable_images: self.enable_images,
            image_max_width: self.image_max_width,
            image_max_height: self.image_max_height,
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint {
            host_domain: self.host_domain.trim().trim_matches('/').to_string(),
            api_path: self.api_path.trim().trim_start_matches('/').to_string(),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

pub fn stable_app_data_dir() -> PathBuf {
    ProjectDirs::from("org", "wikisearch", "wikisearch")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| std::env::temp_dir().join("wikisearch"))
}

pub fn default_config_path() -> PathBuf {
    ProjectDirs::from("org", "wikisearch", "wikisearch")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
        .unwrap_or_else(|| std::env::temp_dir().join("wikisearch").join(CONFIG_FILE_NAME))
}

pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    settings::validate_keyword(&cfg.keyword).map_err(ConfigError::Invalid)?;
    settings::validate_language(&cfg.default_language).map_err(ConfigError::Invalid)?;
    settings::validate_delay_ms(cfg.delay_ms).map_err(ConfigError::Invalid)?;
    settings::validate_max_chars(cfg.max_chars).map_err(ConfigError::Invalid)?;
    settings::validate_max_results(cfg.max_results).map_err(ConfigError::Invalid)?;
    settings::validate_image_size(cfg.image_max_width, cfg.image_max_height)
        .map_err(ConfigError::Invalid)?;
    settings::validate_timeout_secs(cfg.http_timeout_secs).map_err(ConfigError::Invalid)?;

    if cfg.host_domain.trim().is_empty() {
        return Err(ConfigError::Invalid("host_domain is required".into()));
    }
    if cfg.api_path.trim().is_empty() {
        return Err(ConfigError::Invalid("api_path is required".into()));
    }

    Ok(())
}

pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let config_path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);

    let mut cfg = match std::fs::read_to_string(&config_path) {
        Ok(raw) => toml::from_str::<Config>(&raw)?,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Config::default(),
        Err(error) => return Err(error.into()),
    };
    cfg.config_path = config_path;

    validate(&cfg)?;
    Ok(cfg)
}

pub fn save(cfg: &Config) -> Result<(), ConfigError> {
    validate(cfg)?;
    if let Some(parent) = cfg.config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let encoded = toml::to_string_pretty(cfg)?;
    std::fs::write(&cfg.config_path, encoded)?;
    Ok(())
}
