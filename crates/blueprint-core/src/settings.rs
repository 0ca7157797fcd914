use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::{blueprint_dir, diagrams_dir, Error, Result};

/// How long conversation state is retained.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Eviction {
    #[default]
    Unbounded,
    /// Keep at most this many conversations, dropping the least recently used.
    #[serde(alias = "max_conversations")]
    MaxConversations(usize),
    /// Drop conversations untouched for this many seconds.
    #[serde(alias = "idle_secs")]
    IdleSecs(u64),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub provider: String,
    #[serde(default, alias = "api_key")]
    pub api_key: String,
    #[serde(default)]
    pub model: String,
    /// Base URL for azure or other OpenAI-compatible gateways
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Skip TLS certificate verification for the model endpoint
    #[serde(default, alias = "accept_invalid_certs")]
    pub accept_invalid_certs: bool,
    #[serde(default, alias = "patterns_path", skip_serializing_if = "Option::is_none")]
    pub patterns_path: Option<PathBuf>,
    #[serde(default, alias = "output_dir", skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub eviction: Eviction,
}

fn default_temperature() -> f32 {
    0.1
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: String::new(),
            api_key: String::new(),
            model: String::new(),
            endpoint: None,
            temperature: default_temperature(),
            accept_invalid_certs: false,
            patterns_path: None,
            output_dir: None,
            eviction: Eviction::default(),
        }
    }
}

impl Settings {
    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::Configuration(format!("invalid settings {}: {e}", path.display())))
    }

    /// Apply `BLUEPRINT_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup. Empty values are ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(v) = get("BLUEPRINT_PROVIDER") {
            self.provider = v;
        }
        if let Some(v) = get("BLUEPRINT_API_KEY") {
            self.api_key = v;
        }
        if let Some(v) = get("BLUEPRINT_MODEL") {
            self.model = v;
        }
        if let Some(v) = get("BLUEPRINT_ENDPOINT") {
            self.endpoint = Some(v);
        }
        self
    }

    pub fn ai_configured(&self) -> bool {
        !self.provider.is_empty()
            && !self.model.is_empty()
            && (self.provider == "ollama" || !self.api_key.is_empty())
    }

    /// Fail with a configuration error when the model cannot be called.
    pub fn require_credentials(&self) -> Result<()> {
        if self.provider.is_empty() || self.model.is_empty() {
            return Err(Error::Configuration(
                "no model provider configured (set provider and model)".to_string(),
            ));
        }
        if !self.ai_configured() {
            return Err(Error::Configuration(format!(
                "missing API key for provider '{}'",
                self.provider
            )));
        }
        Ok(())
    }

    pub fn resolved_output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(diagrams_dir)
    }
}

pub fn settings_path() -> PathBuf {
    blueprint_dir().join("settings.json")
}

/// Read settings from `~/.blueprint/settings.json`, falling back to defaults
/// when the file is missing or unreadable.
pub fn read_settings() -> Settings {
    let path = settings_path();
    if !path.exists() {
        return Settings::default();
    }
    match Settings::load_from(&path) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable settings");
            Settings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_when_fields_missing() {
        let s: Settings = serde_json::from_str(r#"{"provider":"openai"}"#).unwrap();
        assert_eq!(s.provider, "openai");
        assert_eq!(s.temperature, 0.1);
        assert!(!s.accept_invalid_certs);
        assert_eq!(s.eviction, Eviction::Unbounded);
    }

    #[test]
    fn eviction_forms_parse() {
        let s: Settings = serde_json::from_str(r#"{"eviction":{"maxConversations":50}}"#).unwrap();
        assert_eq!(s.eviction, Eviction::MaxConversations(50));
        let s: Settings = serde_json::from_str(r#"{"eviction":{"idleSecs":600}}"#).unwrap();
        assert_eq!(s.eviction, Eviction::IdleSecs(600));
        let s: Settings = serde_json::from_str(r#"{"eviction":"unbounded"}"#).unwrap();
        assert_eq!(s.eviction, Eviction::Unbounded);
    }

    #[test]
    fn overrides_replace_non_empty_values() {
        let env: HashMap<&str, &str> = [
            ("BLUEPRINT_PROVIDER", "azure"),
            ("BLUEPRINT_API_KEY", "secret"),
            ("BLUEPRINT_MODEL", ""),
        ]
        .into_iter()
        .collect();
        let s = Settings {
            model: "gpt-4o".into(),
            ..Settings::default()
        }
        .with_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(s.provider, "azure");
        assert_eq!(s.api_key, "secret");
        assert_eq!(s.model, "gpt-4o");
        assert!(s.endpoint.is_none());
    }

    #[test]
    fn credentials_required_except_for_ollama() {
        let mut s = Settings {
            provider: "openai".into(),
            model: "gpt-4o".into(),
            ..Settings::default()
        };
        assert!(matches!(s.require_credentials(), Err(Error::Configuration(_))));

        s.api_key = "k".into();
        assert!(s.require_credentials().is_ok());

        let local = Settings {
            provider: "ollama".into(),
            model: "llama3".into(),
            ..Settings::default()
        };
        assert!(local.ai_configured());

        assert!(matches!(
            Settings::default().require_credentials(),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"provider":"ollama","model":"llama3","acceptInvalidCerts":true}"#)
            .unwrap();
        let s = Settings::load_from(&path).unwrap();
        assert!(s.accept_invalid_certs);
        assert_eq!(s.model, "llama3");
    }

    #[test]
    fn snake_case_keys_are_accepted() {
        let s: Settings = serde_json::from_str(
            r#"{"provider":"openai","api_key":"k","model":"gpt-4o",
                "accept_invalid_certs":true,"patterns_path":"/tmp/p.json",
                "output_dir":"/tmp/out","eviction":{"max_conversations":5}}"#,
        )
        .unwrap();
        assert_eq!(s.api_key, "k");
        assert!(s.ai_configured());
        assert!(s.accept_invalid_certs);
        assert_eq!(s.patterns_path, Some(PathBuf::from("/tmp/p.json")));
        assert_eq!(s.resolved_output_dir(), PathBuf::from("/tmp/out"));
        assert_eq!(s.eviction, Eviction::MaxConversations(5));

        let s: Settings = serde_json::from_str(r#"{"eviction":{"idle_secs":30}}"#).unwrap();
        assert_eq!(s.eviction, Eviction::IdleSecs(30));
    }
}
