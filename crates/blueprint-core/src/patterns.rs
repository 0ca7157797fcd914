use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{Error, Result};

const BUILTIN_PATTERNS: &str = include_str!("../data/patterns.json");

/// A named reference architecture offered to the model as context.
/// Pattern files may carry full plan bodies; only these three fields are kept.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, schemars::JsonSchema)]
pub struct ReferencePattern {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Read-only set of reference patterns, loaded once at startup.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct PatternLibrary {
    #[serde(default)]
    patterns: Vec<ReferencePattern>,
}

impl PatternLibrary {
    pub fn new(patterns: Vec<ReferencePattern>) -> Self {
        Self { patterns }
    }

    /// The library bundled with the crate.
    pub fn builtin() -> Self {
        // The bundled file is covered by tests, so a parse failure here means
        // a broken build rather than bad user input.
        Self::from_json(BUILTIN_PATTERNS).unwrap_or_default()
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| Error::Configuration(format!("invalid pattern library: {e}")))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!(
                "cannot read pattern library {}: {e}",
                path.display()
            ))
        })?;
        let library = Self::from_json(&raw)?;
        tracing::info!(
            path = %path.display(),
            count = library.patterns.len(),
            "loaded pattern library"
        );
        Ok(library)
    }

    /// Load from `path` when given, otherwise use the bundled library.
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::builtin()),
        }
    }

    pub fn patterns(&self) -> &[ReferencePattern] {
        &self.patterns
    }

    pub fn get(&self, id: &str) -> Option<&ReferencePattern> {
        self.patterns.iter().find(|p| p.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Pretty JSON array of `{id, name, description}` for prompt embedding.
    pub fn to_prompt_json(&self) -> String {
        serde_json::to_string_pretty(&self.patterns).unwrap_or_else(|_| "[]".to_string())
    }
}
