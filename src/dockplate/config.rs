use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "config.json";
pub const DEFAULT_FALLBACK_IMAGE: &str = "python:3.11-slim";

fn default_fallback_base_image() -> String {
    DEFAULT_FALLBACK_IMAGE.to_string()
}

// User level settings, stored at ~/.dockplate/config.json.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    // Pins `{base_image}` regardless of the local Python version.
    #[serde(default)]
    pub base_image: Option<String>,
    #[serde(default = "default_fallback_base_image")]
    pub fallback_base_image: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_image: None,
            fallback_base_image: default_fallback_base_image(),
        }
    }
}

pub fn config_root() -> Result<PathBuf> {
    let home = home::home_dir().ok_or_else(|| anyhow!("Could not determine the home directory."))?;
    Ok(home.join(".dockplate"))
}

impl Config {
    // A missing or unreadable file yields the defaults.
    pub fn load(config_root: &Path) -> Self {
        let config_f = config_root.join(CONFIG_FILE);
        if !config_f.exists() {
            debug!("No config at {}, using defaults", config_f.display());
            return Self::default();
        }
        let parsed = std::fs::read_to_string(&config_f)
            .map_err(anyhow::Error::from)
            .and_then(|raw| Ok(serde_json::from_str::<Config>(&raw)?));
        match parsed {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring unreadable config {}: {}", config_f.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self, config_root: &Path) -> Result<()> {
        if !config_root.exists() {
            std::fs::create_dir_all(config_root)?;
        }
        let config_json = serde_json::to_string_pretty(&self)?;
        std::fs::write(config_root.join(CONFIG_FILE), config_json)?;
        Ok(())
    }

    pub fn set(&mut self, key: &str, value: Option<String>) -> Result<()> {
        match key {
            "default" => {
                self.base_image = None;
            }
            "base_image" => {
                let value = value.ok_or_else(|| anyhow!("base_image needs a value."))?;
                self.base_image = Some(value);
            }
            "fallback_base_image" => {
                let value = value.ok_or_else(|| anyhow!("fallback_base_image needs a value."))?;
                self.fallback_base_image = value;
            }
            _ => {
                return Err(anyhow!(
                    "Unknown config key: {}. Supported keys: default, base_image, fallback_base_image",
                    key
                ));
            }
        }
        Ok(())
    }
}
