use bgloop::LoopConfig;
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const PROJECT: &str = env!("CARGO_PKG_NAME");

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub background_loop: LoopConfig,
    pub demo: DemoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub actions: usize,
    pub duration_ms: u64,
    pub stop_timeout_ms: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            actions: 10,
            duration_ms: 2000,
            stop_timeout_ms: 5000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            background_loop: LoopConfig::default().with_name("bgloop-demo"),
            demo: DemoConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration: explicit path, then the user config dir, then `./bgloop.yml`, then defaults
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let file_name = format!("{}.yml", PROJECT);
        let user_config = dirs::config_dir().map(|dir| dir.join(PROJECT).join(&file_name));
        Ok(Self::load_first(user_config.into_iter().chain([PathBuf::from(&file_name)])))
    }

    /// First existing candidate that parses; unreadable ones are skipped with a warning
    fn load_first(candidates: impl IntoIterator<Item = PathBuf>) -> Self {
        for candidate in candidates.into_iter().filter(|path| path.exists()) {
            match Self::load_from_file(&candidate) {
                Ok(config) => return config,
                Err(e) => log::warn!("Failed to load config from {}: {}", candidate.display(), e),
            }
        }

        log::info!("No config file found, using defaults");
        Self::default()
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Render as YAML for display
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config")
    }
}
