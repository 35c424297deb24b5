use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::error::{Result, ScraperError};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub credentials: CredentialsConfig,
    pub openai: OpenAiConfig,
    pub firebase: FirebaseConfig,
    pub timing: TimingConfig,
    pub lists: Vec<ListSpec>,
}

/// A curated list to collect from: a short tag plus the list URL.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ListSpec {
    pub tag: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CredentialsConfig {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    /// Unconditional delay before each completion call, rate-limit mitigation.
    pub request_delay_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FirebaseConfig {
    pub database_url: String,
    /// Database secret or ID token, appended as ?auth= when present.
    pub auth_token: Option<String>,
    pub collection: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimingConfig {
    /// Upper bound for presence-of-element polls, seconds.
    pub page_load_timeout_secs: u64,
    /// Settle delay applied around the scroll, milliseconds.
    pub settle_ms: u64,
    /// Single fixed-distance scroll issued per list page, pixels.
    pub scroll_distance: u32,
    pub max_tweets_per_list: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credentials: CredentialsConfig {
                username: "TWITTER-USERNAME".to_string(),
                password: "TWITTER-PASSWORD".to_string(),
            },
            openai: OpenAiConfig {
                api_key: "OPEN-AI-API-KEY".to_string(),
                model: "gpt-4.1".to_string(),
                temperature: 0.3,
                request_delay_secs: 20,
            },
            firebase: FirebaseConfig {
                database_url: "https://example-project.firebaseio.com".to_string(),
                auth_token: None,
                collection: "twitter-list-tweets".to_string(),
            },
            timing: TimingConfig {
                page_load_timeout_secs: 15,
                settle_ms: 2000,
                scroll_distance: 2000,
                max_tweets_per_list: 10,
            },
            lists: vec![
                ListSpec {
                    tag: "All".to_string(),
                    url: "https://x.com/i/lists/ID1".to_string(),
                },
                ListSpec {
                    tag: "BTC".to_string(),
                    url: "https://x.com/i/lists/ID2".to_string(),
                },
            ],
        }
    }
}

pub struct FileConfigManager {
    config_path: PathBuf,
}

impl FileConfigManager {
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub fn load_config(&self) -> Result<Config> {
        info!("Loading configuration from {:?}", self.config_path);

        // check if config file exists, create default if not
        if !self.config_path.exists() {
            warn!(
                "Configuration file not found, creating default config at {:?}",
                self.config_path
            );
            self.create_default_config()?;
        }

        let config_content = fs::read_to_string(&self.config_path)
            .map_err(|e| ScraperError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let mut config: Config = toml::from_str(&config_content)
            .map_err(|e| ScraperError::ConfigError(format!("Failed to parse TOML config: {}", e)))?;

        Self::apply_env_overrides(&mut config);
        self.validate_config(&config)?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    pub fn save_config(&self, config: &Config) -> Result<()> {
        info!("Saving configuration to {:?}", self.config_path);

        let toml_content = toml::to_string_pretty(config)
            .map_err(|e| ScraperError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        fs::write(&self.config_path, toml_content)
            .map_err(|e| ScraperError::ConfigError(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    // Secrets win from the environment so the file can hold placeholders.
    fn apply_env_overrides(config: &mut Config) {
        if let Ok(username) = std::env::var("TWITTER_USERNAME") {
            config.credentials.username = username;
        }
        if let Ok(password) = std::env::var("TWITTER_PASSWORD") {
            config.credentials.password = password;
        }
        if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
            config.openai.api_key = api_key;
        }
        if let Ok(token) = std::env::var("FIREBASE_AUTH_TOKEN") {
            config.firebase.auth_token = Some(token);
        }
    }

    pub fn validate_config(&self, config: &Config) -> Result<()> {
        debug!("Validating configuration");

        if config.lists.is_empty() {
            return Err(ScraperError::ConfigError("Lists cannot be empty".to_string()).into());
        }

        for list in &config.lists {
            if list.tag.trim().is_empty() {
                return Err(
                    ScraperError::ConfigError("List tag cannot be empty".to_string()).into(),
                );
            }
            if !list.url.starts_with("http://") && !list.url.starts_with("https://") {
                return Err(ScraperError::ConfigError(format!(
                    "List URL '{}' must start with http:// or https://",
                    list.url
                ))
                .into());
            }
        }

        if config.credentials.username.trim().is_empty() {
            return Err(ScraperError::ConfigError("Username cannot be empty".to_string()).into());
        }
        if config.credentials.password.is_empty() {
            return Err(ScraperError::ConfigError("Password cannot be empty".to_string()).into());
        }

        if config.openai.model.trim().is_empty() {
            return Err(
                ScraperError::ConfigError("OpenAI model cannot be empty".to_string()).into(),
            );
        }
        if !(0.0..=2.0).contains(&config.openai.temperature) {
            return Err(ScraperError::ConfigError(
                "temperature must be between 0.0 and 2.0".to_string(),
            )
            .into());
        }

        if !config.firebase.database_url.starts_with("http://")
            && !config.firebase.database_url.starts_with("https://")
        {
            return Err(ScraperError::ConfigError(
                "database_url must start with http:// or https://".to_string(),
            )
            .into());
        }
        if config.firebase.collection.trim().is_empty() {
            return Err(ScraperError::ConfigError(
                "Firebase collection cannot be empty".to_string(),
            )
            .into());
        }

        if config.timing.page_load_timeout_secs == 0 {
            return Err(ScraperError::ConfigError(
                "page_load_timeout_secs must be greater than 0".to_string(),
            )
            .into());
        }
        if config.timing.max_tweets_per_list == 0 || config.timing.max_tweets_per_list > 50 {
            return Err(ScraperError::ConfigError(
                "max_tweets_per_list must be between 1 and 50".to_string(),
            )
            .into());
        }

        debug!("Configuration validation passed");
        Ok(())
    }

    fn create_default_config(&self) -> Result<()> {
        let default_config = Config::default();
        let toml_content = toml::to_string_pretty(&default_config).map_err(|e| {
            ScraperError::ConfigError(format!("Failed to serialize default config: {}", e))
        })?;

        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ScraperError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        fs::write(&self.config_path, toml_content).map_err(|e| {
            ScraperError::ConfigError(format!("Failed to write default config: {}", e))
        })?;

        info!("Default configuration file created at {:?}", self.config_path);
        Ok(())
    }
}
