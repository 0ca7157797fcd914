use blueprint_agent::Mode;
use blueprint_core::{ArchitecturePlan, Component, Connection, Error};
use blueprint_diagram::Diagram;
use rmcp::schemars;
use serde::{Deserialize, Serialize};

/// Prefix marking every turn after the first in the combined requirements.
pub const REFINEMENT_MARKER: &str = "Refinement request:";

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ChatRequest {
    /// Latest user message
    #[serde(default)]
    pub message: Option<String>,
    /// Earlier messages of this conversation, oldest first
    #[serde(default)]
    pub history: Option<Vec<String>>,
    /// Stable id for this conversation. Defaults to one id per server session.
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub conversation_id: String,
    pub mode: Mode,
    pub summary: String,
    pub pattern_id: String,
    pub components: Vec<Component>,
    pub connections: Vec<Connection>,
    pub image_url: String,
    pub image_path: String,
    pub dot: String,
}

impl ChatResponse {
    pub fn new(conversation_id: String, mode: Mode, plan: ArchitecturePlan, diagram: Diagram) -> Self {
        Self {
            conversation_id,
            mode,
            summary: plan.summary,
            pattern_id: plan.pattern_id,
            components: plan.components,
            connections: plan.connections,
            image_url: diagram.artifact.url,
            image_path: diagram.artifact.path.display().to_string(),
            dot: diagram.dot,
        }
    }
}

/// Combine earlier messages and the latest one into the full requirements
/// text. The first history entry is kept as-is; every later entry, and the
/// latest message when anything precedes it, is marked as a refinement.
/// Blank entries are skipped.
pub fn compose_requirements(message: &str, history: &[String]) -> Result<String, Error> {
    let message = message.trim();
    if message.is_empty() && history.is_empty() {
        return Err(Error::ClientInputInvalid("Message is required.".to_string()));
    }

    let mut parts: Vec<String> = Vec::with_capacity(history.len() + 1);
    for (idx, msg) in history.iter().enumerate() {
        let msg = msg.trim();
        if msg.is_empty() {
            continue;
        }
        if idx == 0 {
            parts.push(msg.to_string());
        } else {
            parts.push(format!("{REFINEMENT_MARKER} {msg}"));
        }
    }

    if !message.is_empty() {
        if parts.is_empty() {
            parts.push(message.to_string());
        } else {
            parts.push(format!("{REFINEMENT_MARKER} {message}"));
        }
    }

    let text = parts.join("\n\n");
    if text.trim().is_empty() {
        return Err(Error::ClientInputInvalid(
            "Message and history contain no text.".to_string(),
        ));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn first_message_is_verbatim() {
        assert_eq!(compose_requirements("  A blog  ", &[]).unwrap(), "A blog");
    }

    #[test]
    fn later_turns_are_marked_as_refinements() {
        let text = compose_requirements("add a CDN", &strings(&["A blog", "add comments"])).unwrap();
        assert_eq!(
            text,
            "A blog\n\nRefinement request: add comments\n\nRefinement request: add a CDN"
        );
    }

    #[test]
    fn history_without_message_is_accepted() {
        let text = compose_requirements("", &strings(&["A blog", " ", "add search"])).unwrap();
        assert_eq!(text, "A blog\n\nRefinement request: add search");
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(
            compose_requirements("   ", &[]),
            Err(Error::ClientInputInvalid(_))
        ));
        assert!(matches!(
            compose_requirements("", &strings(&["", "  "])),
            Err(Error::ClientInputInvalid(_))
        ));
    }
}
