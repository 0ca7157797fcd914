pub mod engine;
pub mod parse;
pub mod prompt;
pub mod store;

use std::sync::Arc;

use blueprint_core::{ArchitecturePlan, Eviction, PatternLibrary, Result};
use serde::Serialize;

pub use engine::{generator_from_settings, Generator, LlmGenerator, OpenAiCompatGenerator, Unconfigured};
pub use parse::{fallback_plan, parse_plan, validate, MalformedModelOutput, FALLBACK_PATTERN};
pub use prompt::{compose, InstructionPayload};
pub use store::{Checkout, ConversationState, ConversationStore, Mode};

/// Outcome of one successful turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    pub plan: ArchitecturePlan,
    pub mode: Mode,
    /// Set when the model output was unreadable and the fallback plan was used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovered: Option<String>,
}

/// Copy of a conversation's history, safe to hand to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationSnapshot {
    pub conversation_id: String,
    pub mode: Mode,
    pub requirements: Vec<String>,
    pub plans: Vec<ArchitecturePlan>,
}

/// Owns per-conversation state and runs design/refinement turns against a
/// generative capability.
pub struct RefinementEngine {
    generator: Arc<dyn Generator>,
    patterns: Arc<PatternLibrary>,
    store: ConversationStore,
}

impl RefinementEngine {
    pub fn new(
        generator: Arc<dyn Generator>,
        patterns: Arc<PatternLibrary>,
        eviction: Eviction,
    ) -> Self {
        Self {
            generator,
            patterns,
            store: ConversationStore::new(eviction),
        }
    }

    pub fn patterns(&self) -> &PatternLibrary {
        &self.patterns
    }

    /// Run one turn for `conversation_id`.
    ///
    /// The first turn of a conversation designs from scratch; later turns
    /// refine the last plan. Turns on the same conversation are serialized.
    /// If the model can't be reached the turn fails and the conversation is
    /// left as it was.
    pub async fn refine(&self, conversation_id: &str, requirement_text: &str) -> Result<Turn> {
        let checkout = self.store.checkout(conversation_id);
        let mut state = checkout.lock().await;

        let mode = state.mode();
        let payload = prompt::compose(requirement_text, state.baseline(), &self.patterns);
        let instruction = payload.to_prompt();

        tracing::info!(
            conversation_id = %conversation_id,
            mode = ?mode,
            generator = %self.generator.describe(),
            prompt_chars = instruction.len(),
            "requesting architecture plan"
        );
        tracing::trace!(prompt = %instruction, "full prompt");

        let raw = self.generator.generate(&instruction).await.map_err(|e| {
            tracing::error!(conversation_id = %conversation_id, error = %e, "turn failed");
            e
        })?;
        tracing::debug!(output_chars = raw.len(), "received model output");
        tracing::trace!(output = %raw, "raw model output");

        let (plan, recovered) = match parse::parse_plan(&raw) {
            Ok(plan) => (plan, None),
            Err(e) => {
                tracing::warn!(
                    conversation_id = %conversation_id,
                    error = %e,
                    "model output unreadable, using fallback plan"
                );
                let reason = e.to_string();
                (parse::fallback_plan(&reason), Some(reason))
            }
        };

        state.commit(requirement_text.to_string(), plan.clone());
        tracing::info!(
            conversation_id = %conversation_id,
            pattern_id = %plan.pattern_id,
            components = plan.components.len(),
            connections = plan.connections.len(),
            turns = state.plans().len(),
            "committed plan"
        );

        Ok(Turn {
            plan,
            mode,
            recovered,
        })
    }

    pub async fn history(&self, conversation_id: &str) -> Option<ConversationSnapshot> {
        let state = self.store.get(conversation_id)?;
        let state = state.lock().await;
        Some(ConversationSnapshot {
            conversation_id: conversation_id.to_string(),
            mode: state.mode(),
            requirements: state.requirements().to_vec(),
            plans: state.plans().to_vec(),
        })
    }

    pub async fn current_plan(&self, conversation_id: &str) -> Option<ArchitecturePlan> {
        let state = self.store.get(conversation_id)?;
        let state = state.lock().await;
        state.baseline().cloned()
    }

    /// Forget a conversation. Returns false if it didn't exist.
    pub fn reset(&self, conversation_id: &str) -> bool {
        self.store.remove(conversation_id)
    }
}
