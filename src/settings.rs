use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

pub const BASE_URL_KEY: &str = "OPENAI_BASE_URL";
pub const API_KEY_KEY: &str = "OPENAI_API_KEY";
pub const MODEL_KEY: &str = "OPENAI_MODEL";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ModelSettings {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self { base_url: DEFAULT_BASE_URL.into(), api_key: None, model: DEFAULT_MODEL.into() }
    }
}

/// One configuration source, keyed by the same names the host uses for secrets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsLayer {
    values: HashMap<String, String>,
}

impl SettingsLayer {
    pub fn from_map(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    pub fn from_env() -> Self {
        let values = [BASE_URL_KEY, API_KEY_KEY, MODEL_KEY]
            .into_iter()
            .filter_map(|k| std::env::var(k).ok().map(|v| (k.to_string(), v)))
            .collect();
        Self { values }
    }

    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).filter(|v| !v.trim().is_empty()).cloned()
    }
}

/// Input secrets win over the process environment, which wins over fixed defaults.
pub fn resolve_model_settings(secrets: &SettingsLayer, env: &SettingsLayer) -> ModelSettings {
    let defaults = ModelSettings::default();
    ModelSettings {
        base_url: secrets
            .get(BASE_URL_KEY)
            .or_else(|| env.get(BASE_URL_KEY))
            .unwrap_or(defaults.base_url),
        api_key: secrets.get(API_KEY_KEY).or_else(|| env.get(API_KEY_KEY)),
        model: secrets
            .get(MODEL_KEY)
            .or_else(|| env.get(MODEL_KEY))
            .unwrap_or(defaults.model),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerPaths {
    pub ipc_input_dir: PathBuf,
    pub close_sentinel: PathBuf,
    pub ipc_messages_dir: PathBuf,
    pub group_dir: PathBuf,
    pub global_dir: PathBuf,
    pub history_file: PathBuf,
    pub staging_file: PathBuf,
    pub poll_interval: Duration,
}

impl RunnerPaths {
    /// Lays every path out under one root.
    #[cfg(test)]
    pub fn rooted_at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            ipc_input_dir: root.join("ipc/input"),
            close_sentinel: root.join("ipc/input/_close"),
            ipc_messages_dir: root.join("ipc/messages"),
            group_dir: root.join("group"),
            global_dir: root.join("global"),
            history_file: root.join("group/conversations/history.jsonl"),
            staging_file: root.join("input.json"),
            poll_interval: Duration::from_millis(10),
        }
    }
}
