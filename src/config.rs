use crate::types::{MergeStrategy, NameMatching};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::fs;
use anyhow::{Context, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    #[serde(default)]
    pub merge: MergeConfig,
    #[serde(default)]
    pub scene: SceneConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    pub geometry: PathBuf, // .geojson / .json / .shp
    #[serde(default = "default_name_property")]
    pub name_property: String,
    pub region_metadata: Option<PathBuf>, // built-in table when absent
    pub points: Option<PathBuf>,          // built-in points when absent
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MergeConfig {
    #[serde(default)]
    pub strategy: MergeStrategy,
    #[serde(default)]
    pub matching: NameMatching,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TooltipStyle {
    #[default]
    Classes,
    Inline,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SceneConfig {
    pub title: String,
    pub geo_layer: bool,
    pub marker_size: u32,
    pub marker_color: String,
    pub area_color: String, // Hex code
    pub hover_color: String,
    pub tooltip_style: TooltipStyle,
    pub width: u32,
    pub height: u32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            title: "World Map with Points".to_string(),
            geo_layer: true,
            marker_size: 12,
            marker_color: "red".to_string(),
            area_color: "#d1e6fa".to_string(),
            hover_color: "#a4d8f0".to_string(),
            tooltip_style: TooltipStyle::Classes,
            width: 1200,
            height: 600,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 3000 }
    }
}

fn default_name_property() -> String {
    "name".to_string()
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)
            .with_context(|| "Failed to parse TOML configuration")?;
        Ok(config)
    }
}
