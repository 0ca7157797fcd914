use blueprint_core::rules::{OUTPUT_RULES, REFINEMENT_RULES, SUMMARY_RULES};
use blueprint_core::{ArchitecturePlan, PatternLibrary};

/// What gets sent to the generative capability for one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionPayload {
    pub system: String,
    pub user: String,
    /// The baseline plan embedded in `user`, if any
    pub baseline: Option<ArchitecturePlan>,
}

impl InstructionPayload {
    /// The single instruction string the capability accepts.
    pub fn to_prompt(&self) -> String {
        format!("{}\n\n{}", self.system, self.user)
    }

    pub fn is_refinement(&self) -> bool {
        self.baseline.is_some()
    }
}

pub fn system_prompt() -> String {
    format!(
        "You are an Architecture Design Assistant for IT systems. \
Your job is to take high-level requirements and propose a system architecture.\n\n\
You have access to a small library of architecture patterns. \
Each pattern has an id, name, and description. Use them as reusable reference designs.\n\n\
{OUTPUT_RULES}\n\n\
IMPORTANT: {SUMMARY_RULES}\n\n\
{REFINEMENT_RULES}\n"
    )
}

pub fn user_message(
    requirement_text: &str,
    baseline: Option<&ArchitecturePlan>,
    library: &PatternLibrary,
) -> String {
    let mut out = String::with_capacity(4096);

    out.push_str("Here are the available architecture patterns:\n");
    out.push_str(&library.to_prompt_json());

    match baseline {
        Some(plan) => {
            let plan_json =
                serde_json::to_string_pretty(plan).unwrap_or_else(|_| "{}".to_string());
            out.push_str(
                "\n\nHere is the PREVIOUS architecture plan JSON. \
This is your authoritative baseline. REFINE this plan instead of redesigning from scratch:\n",
            );
            out.push_str(&plan_json);
            out.push_str("\n\nThe previous pattern_id was \"");
            out.push_str(&plan.pattern_id);
            out.push_str(
                "\". Keep it unless the new requirements explicitly conflict with it. \
Keep existing component ids and labels, and prefer additive edits over renames or deletions.",
            );
            out.push_str(
                "\n\nThe user has provided NEW requirements / refinements. \
Update the existing architecture minimally to satisfy them:\n",
            );
        }
        None => {
            out.push_str(
                "\n\nDesign the architecture from scratch. \
The FULL set of user requirements (including any refinements) is:\n",
            );
        }
    }
    out.push_str(requirement_text);

    out
}

/// Build the payload for one turn. Pure: no I/O, no state.
pub fn compose(
    requirement_text: &str,
    baseline: Option<&ArchitecturePlan>,
    library: &PatternLibrary,
) -> InstructionPayload {
    InstructionPayload {
        system: system_prompt(),
        user: user_message(requirement_text, baseline, library),
        baseline: baseline.cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blueprint_core::{Component, Connection, ReferencePattern};

    fn library() -> PatternLibrary {
        PatternLibrary::new(vec![ReferencePattern {
            id: "event_driven".into(),
            name: "Event-Driven".into(),
            description: "Producers publish events".into(),
        }])
    }

    fn baseline() -> ArchitecturePlan {
        ArchitecturePlan {
            summary: "<h3>Overview</h3>".into(),
            pattern_id: "event_driven".into(),
            components: vec![
                Component::new("orders", "Order Service", "service"),
                Component::new("bus", "Event Bus", "queue"),
            ],
            connections: vec![Connection::new("orders", "bus", "publish")],
        }
    }

    #[test]
    fn fresh_payload_has_rules_patterns_and_requirements() {
        let payload = compose("A ticketing system", None, &library());
        let prompt = payload.to_prompt();

        assert!(!payload.is_refinement());
        assert!(prompt.contains("\"event_driven\""));
        assert!(prompt.contains("Producers publish events"));
        assert!(prompt.contains("4-12 components"));
        assert!(prompt.contains("<h3>Scalability & Reliability</h3>"));
        assert!(prompt.contains("40-60%"));
        assert!(prompt.contains("Design the architecture from scratch"));
        assert!(prompt.ends_with("A ticketing system"));
        assert!(!prompt.contains("PREVIOUS architecture plan"));
    }

    #[test]
    fn refinement_payload_embeds_baseline_verbatim() {
        let plan = baseline();
        let payload = compose("Refinement request: add a cache", Some(&plan), &library());

        assert!(payload.is_refinement());
        assert_eq!(payload.baseline.as_ref(), Some(&plan));
        let pretty = serde_json::to_string_pretty(&plan).unwrap();
        assert!(payload.user.contains(&pretty));
        assert!(payload.user.contains("authoritative baseline"));
        assert!(payload.user.contains("The previous pattern_id was \"event_driven\""));
        assert!(payload.user.contains("prefer additive edits"));
        assert!(!payload.user.contains("from scratch."));
        assert!(payload.user.ends_with("Refinement request: add a cache"));
    }

    #[test]
    fn compose_is_deterministic() {
        let plan = baseline();
        let a = compose("req", Some(&plan), &library());
        let b = compose("req", Some(&plan), &library());
        assert_eq!(a, b);
    }
}
