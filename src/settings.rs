use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

use crate::{
    quiz::{AiConfig, AiProvider},
    tracker::TrackingConfig,
};

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const BASE_URL_ENV: &str = "OPENAI_BASE_URL";
pub const TICK_MS_ENV: &str = "SOCRATIC_TICK_MS";

/// AI provider settings as written by the user; unset fields fall back to the
/// environment and then to provider defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct AiSettings {
    pub provider: AiProvider,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
}

impl AiSettings {
    /// Changes provider. Base URL and model go back to the new provider's
    /// defaults; the key is kept for when OpenAI is selected again.
    pub fn switch_provider(&mut self, provider: AiProvider) {
        if provider == self.provider {
            return;
        }
        self.provider = provider;
        self.base_url = None;
        self.model = None;
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct UserSettings {
    tracking: TrackingConfig,
    ai: AiSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let mut data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring unreadable settings at {}: {err}", path.display());
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        if let Err(err) = data.tracking.validate() {
            warn!("Ignoring invalid tracking settings at {}: {err}", path.display());
            data.tracking = TrackingConfig::default();
        }

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn tracking(&self) -> TrackingConfig {
        self.read().tracking.clone()
    }

    /// Tracking config with the tick override from the environment applied.
    pub fn effective_tracking(&self) -> TrackingConfig {
        let mut config = self.tracking();
        if let Some(tick_ms) = std::env::var(TICK_MS_ENV)
            .ok()
            .and_then(|value| value.trim().parse::<u64>().ok())
        {
            config.tick_interval_ms = tick_ms;
        }
        config
    }

    pub fn ai(&self) -> AiSettings {
        self.read().ai.clone()
    }

    /// Provider config for the generator, with environment fallbacks.
    pub fn effective_ai(&self) -> AiConfig {
        let ai = self.ai();
        AiConfig::build(
            ai.provider,
            ai.api_key.or_else(|| std::env::var(API_KEY_ENV).ok()),
            ai.base_url.or_else(|| std::env::var(BASE_URL_ENV).ok()),
            ai.model,
        )
    }

    pub fn update_tracking(&self, tracking: TrackingConfig) -> Result<()> {
        tracking.validate().context("Invalid tracking settings")?;
        let mut guard = self.write();
        guard.tracking = tracking;
        self.persist(&guard)
    }

    pub fn update_ai(&self, ai: AiSettings) -> Result<()> {
        let mut guard = self.write();
        guard.ai = ai;
        self.persist(&guard)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, UserSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, UserSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_corrupt_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        assert_eq!(store.tracking(), TrackingConfig::default());

        let corrupt = dir.path().join("corrupt.json");
        fs::write(&corrupt, "{ not json").unwrap();
        let store = SettingsStore::new(corrupt).unwrap();
        assert_eq!(store.ai(), AiSettings::default());
    }

    #[test]
    fn updates_persist_across_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();

        let tracking = TrackingConfig {
            max_checks_per_session: 5,
            ..TrackingConfig::default()
        };
        store.update_tracking(tracking.clone()).unwrap();
        store
            .update_ai(AiSettings {
                provider: AiProvider::Ollama,
                model: Some("mistral".into()),
                ..AiSettings::default()
            })
            .unwrap();

        let reloaded = SettingsStore::new(path).unwrap();
        assert_eq!(reloaded.tracking(), tracking);
        let ai = reloaded.effective_ai();
        assert_eq!(ai.provider, AiProvider::Ollama);
        assert_eq!(ai.model, "mistral");
        assert_eq!(ai.api_key, None);
    }

    #[test]
    fn invalid_tracking_falls_back_on_load_and_is_rejected_on_update() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{"tracking": {"readingRateWpm": 0, "slackFactor": 2.0}, "ai": {"provider": "ollama"}}"#,
        )
        .unwrap();

        let store = SettingsStore::new(path.clone()).unwrap();
        assert_eq!(store.tracking(), TrackingConfig::default());
        assert_eq!(store.ai().provider, AiProvider::Ollama);

        let bad = TrackingConfig {
            slack_factor: -1.0,
            ..TrackingConfig::default()
        };
        assert!(store.update_tracking(bad).is_err());
        assert_eq!(store.tracking(), TrackingConfig::default());
        // nothing was persisted by the rejected update
        assert!(fs::read_to_string(&path).unwrap().contains("\"readingRateWpm\": 0"));
    }

    #[test]
    fn switching_provider_resets_endpoint_but_keeps_key() {
        let mut ai = AiSettings {
            provider: AiProvider::OpenAi,
            api_key: Some("sk-test".into()),
            base_url: Some("https://proxy.local/v1".into()),
            model: Some("gpt-custom".into()),
        };

        ai.switch_provider(AiProvider::OpenAi);
        assert_eq!(ai.model.as_deref(), Some("gpt-custom"));

        ai.switch_provider(AiProvider::Ollama);
        assert_eq!(ai.base_url, None);
        assert_eq!(ai.model, None);
        assert_eq!(ai.api_key.as_deref(), Some("sk-test"));

        ai.switch_provider(AiProvider::OpenAi);
        let config = AiConfig::build(ai.provider, ai.api_key, ai.base_url, ai.model);
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.base_url, crate::quiz::openai::DEFAULT_OPENAI_URL);
    }
}
