mod chat;

use std::path::Path;
use std::sync::Arc;

use blueprint_agent::{generator_from_settings, Generator, RefinementEngine, Unconfigured};
use blueprint_core::{Error, PatternLibrary, Settings};
use blueprint_diagram::{GraphRenderer, GraphvizRenderer, Synthesizer};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use chat::{compose_requirements, ChatRequest, ChatResponse};

// --- Request types ---

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct ConversationRequest {
    /// Conversation to inspect. Defaults to this server session's conversation.
    #[serde(default)]
    conversation_id: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct RenderPlanRequest {
    /// An architecture plan as JSON: {summary, pattern_id, components: [{id, label, type}], connections: [{from, to, label}]}. Malformed input is repaired the same way model output is.
    data: String,
}

// --- Server ---

#[derive(Clone)]
pub struct BlueprintServer {
    tool_router: ToolRouter<Self>,
    engine: Arc<RefinementEngine>,
    synthesizer: Arc<Synthesizer>,
    /// Conversation used when the caller doesn't send one
    session_id: String,
}

#[tool_router]
impl BlueprintServer {
    pub fn new(engine: Arc<RefinementEngine>, synthesizer: Arc<Synthesizer>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            engine,
            synthesizer,
            session_id: format!("session-{}", uuid::Uuid::new_v4().simple()),
        }
    }

    /// Wire up the engine and synthesizer from settings. A missing model
    /// configuration is reported on first use; a broken pattern file is fatal.
    pub fn from_settings(settings: &Settings) -> Result<Self, Error> {
        let patterns = PatternLibrary::load_or_builtin(settings.patterns_path.as_deref())?;

        let generator: Arc<dyn Generator> = match generator_from_settings(settings) {
            Ok(g) => {
                tracing::info!(generator = %g.describe(), "model configured");
                g
            }
            Err(e) => {
                tracing::warn!(error = %e, "model not configured; architecture_chat will fail until it is");
                Arc::new(Unconfigured::new(e.to_string()))
            }
        };

        let engine = RefinementEngine::new(generator, Arc::new(patterns), settings.eviction);
        let synthesizer = Synthesizer::new(default_renderer(), settings.resolved_output_dir());
        Ok(Self::new(Arc::new(engine), Arc::new(synthesizer)))
    }

    fn conversation_or_session(&self, id: Option<String>) -> String {
        id.map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.session_id.clone())
    }

    #[tool(
        description = "Design or refine a software architecture from natural-language requirements. The first call in a conversation designs from scratch; later calls with the same conversation_id refine the previous plan, keeping component ids stable. Returns {conversation_id, mode, summary (HTML), pattern_id, components: [{id, label, type}], connections: [{from, to, label}], image_url, image_path, dot}."
    )]
    async fn architecture_chat(
        &self,
        Parameters(req): Parameters<ChatRequest>,
    ) -> Result<CallToolResult, McpError> {
        let message = req.message.unwrap_or_default();
        let history = req.history.unwrap_or_default();

        let requirements = match compose_requirements(&message, &history) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "rejected chat request");
                return Ok(error_result(&e));
            }
        };
        let conversation_id = self.conversation_or_session(req.conversation_id);

        let turn = match self.engine.refine(&conversation_id, &requirements).await {
            Ok(turn) => turn,
            Err(e) => return Ok(error_result(&e)),
        };

        let diagram = match self.synthesizer.render(&turn.plan).await {
            Ok(d) => d,
            Err(e) => {
                tracing::error!(conversation_id = %conversation_id, error = %e, "diagram rendering failed");
                return Ok(error_result(&e));
            }
        };

        Ok(json_result(&ChatResponse::new(
            conversation_id,
            turn.mode,
            turn.plan,
            diagram,
        )))
    }

    #[tool(description = "List the reference architecture patterns offered to the model (id, name, description)")]
    fn list_patterns(&self) -> Result<CallToolResult, McpError> {
        Ok(json_result(&self.engine.patterns().patterns()))
    }

    #[tool(description = "Get the rules every generated architecture plan must follow")]
    fn get_rules(&self) -> Result<CallToolResult, McpError> {
        Ok(CallToolResult::success(vec![Content::text(
            blueprint_core::rules::all_rules(),
        )]))
    }

    #[tool(
        description = "Get the history of a conversation: every requirements text submitted and every plan produced, oldest first. The last plan is the baseline for the next turn."
    )]
    async fn get_conversation(
        &self,
        Parameters(req): Parameters<ConversationRequest>,
    ) -> Result<CallToolResult, McpError> {
        let id = self.conversation_or_session(req.conversation_id);
        match self.engine.history(&id).await {
            Some(snapshot) => Ok(json_result(&snapshot)),
            None => Ok(error_result(&Error::ClientInputInvalid(format!(
                "Conversation '{}' not found",
                id
            )))),
        }
    }

    #[tool(description = "Forget a conversation so the next architecture_chat call designs from scratch")]
    fn reset_conversation(
        &self,
        Parameters(req): Parameters<ConversationRequest>,
    ) -> Result<CallToolResult, McpError> {
        let id = self.conversation_or_session(req.conversation_id);
        let text = if self.engine.reset(&id) {
            format!("Conversation '{}' reset", id)
        } else {
            format!("Conversation '{}' had no history", id)
        };
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    #[tool(
        description = "Render an architecture plan to a diagram without calling the model. Returns {plan, image_url, image_path, dot}. Use this after hand-editing a plan."
    )]
    async fn render_plan(
        &self,
        Parameters(req): Parameters<RenderPlanRequest>,
    ) -> Result<CallToolResult, McpError> {
        let plan = blueprint_agent::validate(&req.data);
        match self.synthesizer.render(&plan).await {
            Ok(diagram) => Ok(json_result(&serde_json::json!({
                "plan": plan,
                "image_url": diagram.artifact.url,
                "image_path": diagram.artifact.path,
                "dot": diagram.dot,
            }))),
            Err(e) => Ok(error_result(&e)),
        }
    }
}

const INSTRUCTIONS: &str = r#"Blueprint turns natural-language requirements into a software architecture (components, connections, HTML summary) and a Graphviz diagram.

## Workflow
1. Call `architecture_chat` with the user's requirements as `message`. Pass a `conversation_id` you keep for the whole conversation.
2. For follow-ups, call `architecture_chat` again with the new request as `message` and the earlier messages as `history`. The previous plan is refined, not replaced: component ids stay stable and changes are additive where possible.
3. Use `get_conversation` to see every plan produced so far, and `reset_conversation` to start over.
4. To adjust a plan by hand, edit the JSON and pass it to `render_plan`.

## Errors
Tool errors carry a JSON payload {error, kind, status}. kind is one of: client_input_invalid (400), upstream_unavailable (502, the model could not be reached), configuration (500), render_failed (500).
If the model answers with something unreadable, a fixed three-tier fallback plan (pattern_id "fallback_three_tier") is returned instead of an error."#;

#[tool_handler]
impl ServerHandler for BlueprintServer {
    fn get_info(&self) -> ServerInfo {
        let instructions = format!(
            "{}\n\n## Plan Rules\n{}",
            INSTRUCTIONS,
            blueprint_core::rules::all_rules()
        );
        ServerInfo {
            instructions: Some(instructions.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// --- Helpers ---

fn error_result(e: &Error) -> CallToolResult {
    CallToolResult::error(vec![Content::text(e.to_payload().to_string())])
}

fn json_result<T: Serialize + ?Sized>(val: &T) -> CallToolResult {
    match serde_json::to_string_pretty(val) {
        Ok(json) => CallToolResult::success(vec![Content::text(json)]),
        Err(e) => CallToolResult::error(vec![Content::text(format!("Serialization error: {}", e))]),
    }
}

fn default_renderer() -> Arc<dyn GraphRenderer> {
    match GraphvizRenderer::locate() {
        Ok(r) => Arc::new(r),
        Err(e) => {
            // Keep serving plans; rendering reports the problem per call.
            tracing::warn!(error = %e, "Graphviz not found, diagrams will fail to render");
            Arc::new(GraphvizRenderer::with_binary("dot", "svg"))
        }
    }
}

fn init_tracing() {
    // stdout carries the MCP protocol, so logs go to stderr.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

/// `blueprint-mcp render [plan.json]`: render a plan file (or stdin) and
/// print the DOT source to stdout.
async fn render_command(settings: &Settings, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let raw = match path {
        Some(p) => std::fs::read_to_string(p)?,
        None => std::io::read_to_string(std::io::stdin())?,
    };
    let plan = blueprint_agent::validate(&raw);
    let synthesizer = Synthesizer::new(default_renderer(), settings.resolved_output_dir());
    let diagram = synthesizer.render(&plan).await?;
    println!("{}", diagram.dot);
    eprintln!("Wrote {}", diagram.artifact.path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let settings = blueprint_core::read_settings().with_env_overrides();

    let args: Vec<String> = std::env::args().collect();
    if args.get(1).map(String::as_str) == Some("render") {
        return render_command(&settings, args.get(2).map(Path::new)).await;
    }

    let service = BlueprintServer::from_settings(&settings)?
        .serve(rmcp::transport::io::stdio())
        .await
        .inspect_err(|e| tracing::error!(error = %e, "MCP server error"))?;
    service.waiting().await?;
    Ok(())
}
