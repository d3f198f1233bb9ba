use std::{collections::HashMap, fs, path::Path, time::Duration};

use anyhow::{bail, Context};
use serde::Deserialize;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const SETTINGS_FILE: &str = "taskclient.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSettings {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl ClientSettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Defaults, then `taskclient.toml` in the working directory, then environment.
pub fn load_settings() -> ClientSettings {
    let mut settings = ClientSettings::default();
    apply_file_overrides(&mut settings, Path::new(SETTINGS_FILE));
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    settings
}

pub fn apply_file_overrides(settings: &mut ClientSettings, path: &Path) {
    let Ok(raw) = fs::read_to_string(path) else {
        return;
    };
    match toml::from_str::<HashMap<String, toml::Value>>(&raw) {
        Ok(file_cfg) => {
            if let Some(v) = file_cfg.get("base_url").and_then(|v| v.as_str()) {
                settings.base_url = v.to_string();
            }
            if let Some(v) = file_cfg.get("timeout_ms").and_then(|v| v.as_integer()) {
                if let Ok(timeout_ms) = u64::try_from(v) {
                    settings.timeout_ms = timeout_ms;
                }
            }
        }
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "ignoring unreadable settings file"
            );
        }
    }
}

pub fn apply_env_overrides<F>(settings: &mut ClientSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("TASKS_API_URL") {
        settings.base_url = v;
    }
    if let Some(v) = lookup("APP__API_URL") {
        settings.base_url = v;
    }

    for key in ["TASKS_API_TIMEOUT_MS", "APP__API_TIMEOUT_MS"] {
        if let Some(v) = lookup(key) {
            match v.trim().parse::<u64>() {
                Ok(parsed) => settings.timeout_ms = parsed,
                Err(_) => tracing::warn!(key, value = %v, "ignoring non-numeric timeout override"),
            }
        }
    }
}

pub fn normalize_base_url(raw_base_url: &str) -> anyhow::Result<String> {
    let raw_base_url = raw_base_url.trim();
    if raw_base_url.is_empty() {
        return Ok(DEFAULT_BASE_URL.to_string());
    }

    let parsed = Url::parse(raw_base_url)
        .with_context(|| format!("invalid task service url '{raw_base_url}'"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!(
            "unsupported scheme '{}' in task service url '{raw_base_url}'",
            parsed.scheme()
        );
    }

    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
