use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::types::ViewState;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub map: MapConfig,
    pub draw: DrawConfig,
    pub popup: PopupConfig,
    pub session: SessionConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct MapConfig {
    /// Token for the basemap service. Empty means the page runs without one.
    pub access_token: String,
    pub style: String,
    pub initial_view: ViewState,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            style: "mapbox://styles/mapbox/streets-v9".to_string(),
            initial_view: ViewState::default(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct DrawConfig {
    pub position: String,
    pub default_mode: String,
    pub display_controls_default: bool,
    pub controls: DrawControls,
}

impl Default for DrawConfig {
    fn default() -> Self {
        Self {
            position: "top-left".to_string(),
            default_mode: "draw_polygon".to_string(),
            display_controls_default: false,
            controls: DrawControls::default(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct DrawControls {
    pub polygon: bool,
    pub trash: bool,
}

impl Default for DrawControls {
    fn default() -> Self {
        Self {
            polygon: true,
            trash: true,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct PopupConfig {
    pub title: String,
    pub initial: String,
    pub default_open: bool,
}

impl Default for PopupConfig {
    fn default() -> Self {
        Self {
            title: "IO Sidekick".to_string(),
            initial: "What can I help you with?".to_string(),
            default_open: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SessionConfig {
    pub background_color: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            background_color: "#ADD8E6".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            static_dir: Some(PathBuf::from(".")),
        }
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }

    /// Loads `path` if one was given, otherwise falls back to the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::default()),
        }
    }
}
