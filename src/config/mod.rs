//! Configuration management for Broadsheet.
//!
//! Configuration is read from `~/.config/broadsheet/config.toml` at startup.
//! If the file doesn't exist, a default configuration with comments is created.

pub mod colors;
pub mod keybindings;

pub use colors::ColorConfig;
pub use keybindings::KeybindingConfig;

use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub feed: FeedConfig,
    pub speech: SpeechConfig,
    pub cache: CacheConfig,
    pub colors: ColorConfig,
    pub keybindings: KeybindingConfig,
}

/// Remote content API settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Root of the REST namespace, e.g. `https://example.com/wp-json/wp/v2/`
    pub base_url: String,
    /// Posts requested per page
    pub page_size: u32,
    /// Value of the cache-busting parameter appended to every request
    pub version: String,
    /// Name of the cache-busting parameter
    pub version_param: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://example.com/wp-json/wp/v2/".to_string(),
            page_size: 12,
            version: "1".to_string(),
            version_param: "ver".to_string(),
            timeout_secs: 10,
            user_agent: concat!("broadsheet/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Rows from the end of the list at which the next page is requested
    pub prefetch_distance: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            prefetch_distance: 3,
        }
    }
}

/// Text-to-speech settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Program that speaks its last argument aloud
    pub command: String,
    /// Arguments placed before the spoken text
    pub args: Vec<String>,
    /// Maximum characters per spoken chunk
    pub chunk_chars: usize,
    /// Upper bound on chunks per post; the remainder becomes one final chunk
    pub max_chunks: usize,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            command: "espeak".to_string(),
            args: Vec::new(),
            chunk_chars: 600,
            max_chunks: 40,
        }
    }
}

/// Offline response cache settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Database location; defaults to `<data_dir>/broadsheet/cache.db`
    pub path: Option<PathBuf>,
    /// Copies older than this are deleted at startup; 0 keeps everything
    pub max_age_days: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
            max_age_days: 30,
        }
    }
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// If the config file exists but is invalid, returns an error.
    /// Missing fields in the config file will use default values.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit file. The file must exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.api.page_size == 0 {
            return Err(ConfigError::Invalid("api.page_size must be at least 1".into()));
        }
        if self.speech.chunk_chars == 0 {
            return Err(ConfigError::Invalid("speech.chunk_chars must be at least 1".into()));
        }
        if url::Url::parse(&self.api.base_url).is_err() {
            return Err(ConfigError::Invalid(format!(
                "api.base_url is not a valid URL: {}",
                self.api.base_url
            )));
        }
        Ok(())
    }

    /// Get the default config file path: `~/.config/broadsheet/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("broadsheet").join("config.toml"))
    }

    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    /// Generate the default config file content with comments.
    fn default_config_content() -> String {
        r##"# Broadsheet Configuration
#
# Colors can be specified as:
# - Named colors: Black, Red, Green, Yellow, Blue, Magenta, Cyan, Gray,
#   DarkGray, LightRed, LightGreen, LightYellow, LightBlue, LightMagenta,
#   LightCyan, White, Reset
# - Hex colors: "#RRGGBB" or "#RGB"
#
# Keybindings can be specified as:
# - Single characters: "a", "A", "1"
# - Special keys: Enter, Tab, BackTab, Backspace, Delete, Home, End,
#   PageUp, PageDown, Up, Down, Left, Right, Esc, Space, F1-F12
# - With modifiers: "Ctrl+c", "Shift+Tab", "Alt+Enter"

[api]
# Root of the WordPress REST namespace
base_url = "https://example.com/wp-json/wp/v2/"
page_size = 12
# Cache-busting parameter added to every request
version_param = "ver"
version = "1"
timeout_secs = 10

[feed]
# Load the next page when the selection is this close to the end
prefetch_distance = 3

[speech]
# Program that reads its last argument aloud (e.g. "espeak", "say", "spd-say")
command = "espeak"
args = []
chunk_chars = 600
max_chunks = 40

[cache]
# Keep copies of API responses for offline reading
enabled = true
# Delete copies older than this many days (0 keeps them forever)
max_age_days = 30

[colors]
active_border = "Cyan"
inactive_border = "DarkGray"
selection_bg = "Cyan"
selection_fg = "Black"
title = "White"
metadata_author = "Yellow"
metadata_date = "Yellow"
metadata_link = "Blue"
error = "LightRed"
notice = "LightYellow"
status_fg = "White"
status_bg = "DarkGray"

[keybindings]
quit = ["q", "Ctrl+c"]
move_up = ["k", "Up"]
move_down = ["j", "Down"]
next_page = ["n", "PageDown"]
prev_page = ["p", "PageUp"]
select = ["Enter"]
back = ["h", "Esc", "Backspace"]
home = ["g"]
about = ["a"]
search = ["/"]
goto = [":"]
refresh = ["R"]
speak = ["s"]
open_in_browser = ["o"]
open_embed = ["v"]
toggle_maximize = ["m"]
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_deserializes() {
        let content = Config::default_config_content();
        let config: Config = toml::from_str(&content).expect("Default config should be valid TOML");

        assert_eq!(config.api.page_size, 12);
        assert_eq!(config.speech.chunk_chars, 600);
        assert_eq!(config.colors.active_border, ratatui::style::Color::Cyan);
        assert_eq!(config.keybindings.quit, vec!["q", "Ctrl+c"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config() {
        let content = r##"
[api]
base_url = "https://news.example.org/wp-json/wp/v2/"

[colors]
active_border = "#FF0000"
"##;
        let config: Config = toml::from_str(content).expect("Partial config should work");

        assert_eq!(config.api.base_url, "https://news.example.org/wp-json/wp/v2/");
        assert_eq!(config.api.page_size, 12);
        assert_eq!(
            config.colors.active_border,
            ratatui::style::Color::Rgb(255, 0, 0)
        );
        assert_eq!(config.feed.prefetch_distance, 3);
    }

    #[test]
    fn test_empty_config() {
        let config: Config = toml::from_str("").expect("Empty config should work");
        assert_eq!(config.api.version_param, "ver");
        assert!(config.cache.enabled);
        assert_eq!(config.speech.command, "espeak");
    }

    #[test]
    fn test_load_from_rejects_zero_page_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[api]\npage_size = 0\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_load_from_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[api\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_create_default_config_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broadsheet").join("config.toml");
        Config::create_default_config(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.api.page_size, 12);
    }
}
