use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::MacroError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub env_name: String,
    /// Milliseconds to wait after every action.
    #[serde(default)]
    pub pause_ms: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Named macros, validated before they are stored.
    #[serde(default)]
    pub macros: BTreeMap<String, String>,
}

fn default_log_level() -> String {
    String::from("info")
}

fn env_name() -> String {
    env::var("AMC_ENV").unwrap_or_else(|_| String::from("default"))
}

impl Default for Config {
    fn default() -> Self {
        Config {
            env_name: env_name(),
            pause_ms: 0,
            log_level: default_log_level(),
            macros: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Loads the current environment's config, falling back to defaults when
    /// no file exists yet. Environment overrides are applied last.
    pub fn load() -> Result<Self, MacroError> {
        let config_path = Self::get_config_path();
        let mut config = if config_path.exists() {
            Self::load_from(&config_path)?
        } else {
            debug!(path = %config_path.display(), "no config file, using defaults");
            Config::default()
        };
        config.apply_overrides(|key| env::var(key).ok())?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self, MacroError> {
        let contents = fs::read_to_string(path)?;
        serde_json::from_str(&contents)
            .map_err(|e| MacroError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn save(&self) -> Result<(), MacroError> {
        self.save_to(&Self::get_config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), MacroError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), MacroError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(pause) = lookup("AMC_PAUSE_MS") {
            self.pause_ms = pause
                .trim()
                .parse()
                .map_err(|_| MacroError::Config(format!("AMC_PAUSE_MS is not a number: {}", pause)))?;
        }
        if let Some(level) = lookup("AMC_LOG") {
            self.log_level = level;
        }
        Ok(())
    }

    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }

    pub fn get_macro(&self, name: &str) -> Option<&str> {
        self.macros.get(name).map(String::as_str)
    }

    /// Stores a named macro after checking that it parses.
    pub fn add_macro(&mut self, name: &str, source: &str) -> Result<(), MacroError> {
        crate::parse(source)?;
        self.macros.insert(name.to_string(), source.to_string());
        Ok(())
    }

    pub fn remove_macro(&mut self, name: &str) -> Option<String> {
        self.macros.remove(name)
    }

    pub fn get_config_dir() -> PathBuf {
        if let Ok(custom_dir) = env::var("AMC_CONFIG_DIR") {
            return PathBuf::from(custom_dir);
        }
        let home = if cfg!(windows) {
            env::var("USERPROFILE")
        } else {
            env::var("HOME")
        };
        PathBuf::from(home.unwrap_or_else(|_| String::from(".")))
            .join(".automacro")
            .join(env_name())
    }

    pub fn get_config_path() -> PathBuf {
        Self::get_config_dir().join("config.json")
    }
}
