use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub content: ContentConfig,
    #[serde(default)]
    pub index: IndexConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContentConfig {
    /// JSON snapshot of the published content tree.
    pub snapshot: PathBuf,
    /// Only index projects below this node.
    #[serde(default)]
    pub root_id: Option<i64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_type")]
    pub index_type: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            index_type: default_index_type(),
        }
    }
}

fn default_index_type() -> String {
    "project".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.index.index_type.trim().is_empty() {
        anyhow::bail!("index.index_type must not be empty");
    }

    if config.content.snapshot.as_os_str().is_empty() {
        anyhow::bail!("content.snapshot must be set");
    }

    Ok(config)
}
