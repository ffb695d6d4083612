//! `VoxConfig` loading: TOML file, overridable by the `VOX_CONFIG` env var
//! and by CLI flags, following the XDG-style resolution chain the teacher's
//! own CLI config module uses.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const ENV_CONFIG_PATH: &str = "VOX_CONFIG";
const ENV_DATABASE_URL: &str = "VOX_DATABASE_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SessionSection {
    pub inactivity_timeout_secs: i64,
    pub ended_retention_secs: i64,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            inactivity_timeout_secs: 120,
            ended_retention_secs: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TaskSection {
    pub idempotency_window_secs: i64,
    pub event_history_max: usize,
    pub task_timeout_secs: u64,
    pub runtime_enabled: bool,
}

impl Default for TaskSection {
    fn default() -> Self {
        Self {
            idempotency_window_secs: 10,
            event_history_max: 512,
            task_timeout_secs: 60,
            runtime_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StoreSection {
    /// When absent, `vox-cli` runs with no persistence at all.
    pub database_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct VoxConfig {
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub task: TaskSection,
    #[serde(default)]
    pub store: StoreSection,
}

pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("vox");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("vox")
}

pub fn config_path(override_path: Option<&Path>) -> PathBuf {
    if let Some(p) = override_path {
        return p.to_path_buf();
    }
    if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
        return PathBuf::from(env_path);
    }
    config_dir().join("config.toml")
}

pub fn load_config(override_path: Option<&Path>) -> Result<VoxConfig> {
    let path = config_path(override_path);
    if !path.exists() {
        return Ok(VoxConfig::default());
    }
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    let mut config: VoxConfig =
        toml::from_str(&raw).with_context(|| format!("parsing config file {}", path.display()))?;

    if let Ok(url) = std::env::var(ENV_DATABASE_URL) {
        config.store.database_url = Some(url);
    }

    Ok(config)
}

pub fn save_config(config: &VoxConfig, override_path: Option<&Path>) -> Result<()> {
    let path = config_path(override_path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {}", parent.display()))?;
    }
    let raw = toml::to_string_pretty(config).context("serializing config")?;
    std::fs::write(&path, raw).with_context(|| format!("writing config file {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.session.inactivity_timeout_secs, 120);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = VoxConfig::default();
        config.task.task_timeout_secs = 45;
        save_config(&config, Some(&path)).unwrap();

        let loaded = load_config(Some(&path)).unwrap();
        assert_eq!(loaded.task.task_timeout_secs, 45);
    }
}
