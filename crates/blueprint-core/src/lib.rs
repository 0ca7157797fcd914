pub mod error;
pub mod patterns;
pub mod rules;
pub mod settings;

pub use error::{Error, Result};
pub use patterns::{PatternLibrary, ReferencePattern};
pub use settings::{read_settings, Eviction, Settings};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Summary used when the model leaves the field out or empty.
pub const DEFAULT_SUMMARY: &str = "No summary provided.";

/// Pattern id used when the model does not name one.
pub const UNKNOWN_PATTERN: &str = "unknown";

// --- Types ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, schemars::JsonSchema)]
pub struct Component {
    /// Identifier-safe id (letters, digits, underscore), unique within a plan
    pub id: String,
    /// Display name
    pub label: String,
    /// Free-form category, e.g. "web", "app", "db", "cache", "queue"
    #[serde(rename = "type")]
    pub component_type: String,
}

impl Component {
    pub fn new(id: &str, label: &str, component_type: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            component_type: component_type.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, schemars::JsonSchema)]
pub struct Connection {
    /// Source component id
    pub from: String,
    /// Target component id
    pub to: String,
    /// Protocol or purpose, may be empty
    #[serde(default)]
    pub label: String,
}

impl Connection {
    pub fn new(from: &str, to: &str, label: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            label: label.to_string(),
        }
    }
}

/// A complete architecture description. Plans are values: a refinement turn
/// produces a new plan and never edits an earlier one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, schemars::JsonSchema)]
pub struct ArchitecturePlan {
    /// HTML narrative with fixed sections
    #[serde(default = "default_summary")]
    pub summary: String,
    /// Reference pattern id, "custom", or "unknown"
    #[serde(default = "default_pattern_id")]
    pub pattern_id: String,
    #[serde(default)]
    pub components: Vec<Component>,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

fn default_summary() -> String {
    DEFAULT_SUMMARY.to_string()
}

fn default_pattern_id() -> String {
    UNKNOWN_PATTERN.to_string()
}

impl Default for ArchitecturePlan {
    fn default() -> Self {
        Self {
            summary: default_summary(),
            pattern_id: default_pattern_id(),
            components: Vec::new(),
            connections: Vec::new(),
        }
    }
}

// --- Identifiers ---

/// Map an arbitrary id onto the identifier-safe alphabet. Every disallowed
/// character becomes an underscore. Returns None for blank input.
pub fn sanitize_identifier(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(
        trimmed
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect(),
    )
}

// --- Storage ---

/// Resolve the global data directory (~/.blueprint/).
pub fn blueprint_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".blueprint")
}

/// Default directory for rendered diagrams.
pub fn diagrams_dir() -> PathBuf {
    blueprint_dir().join("diagrams")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_defaults_fill_missing_keys() {
        let plan: ArchitecturePlan = serde_json::from_str("{}").unwrap();
        assert_eq!(plan.summary, DEFAULT_SUMMARY);
        assert_eq!(plan.pattern_id, UNKNOWN_PATTERN);
        assert!(plan.components.is_empty());
        assert!(plan.connections.is_empty());
    }

    #[test]
    fn plan_serializes_with_wire_key_names() {
        let plan = ArchitecturePlan {
            summary: "s".into(),
            pattern_id: "custom".into(),
            components: vec![Component::new("web", "Web", "web")],
            connections: vec![Connection::new("web", "web", "")],
        };
        let val = serde_json::to_value(&plan).unwrap();
        assert_eq!(val["components"][0]["type"], "web");
        assert_eq!(val["connections"][0]["from"], "web");
        assert_eq!(val["connections"][0]["to"], "web");
        assert_eq!(val["pattern_id"], "custom");
    }

    #[test]
    fn identifier_sanitizing() {
        assert_eq!(sanitize_identifier("api_gw2").as_deref(), Some("api_gw2"));
        assert_eq!(sanitize_identifier(" api-gw.v2 ").as_deref(), Some("api_gw_v2"));
        assert_eq!(sanitize_identifier("   "), None);
    }
}
