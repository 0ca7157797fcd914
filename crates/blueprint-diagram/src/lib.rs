pub mod dot;
pub mod graph;
pub mod render;

use std::path::PathBuf;
use std::sync::Arc;

use blueprint_core::{ArchitecturePlan, Result};
use serde::Serialize;

pub use dot::to_dot;
pub use graph::{synthesize, Cluster, DiagramGraph, GraphEdge, GraphNode, Group};
pub use render::{GraphRenderer, GraphvizRenderer};

/// URL prefix under which rendered diagrams are served.
pub const DIAGRAM_URL_PREFIX: &str = "/diagrams";

/// Where a rendered image ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagramArtifact {
    pub id: String,
    pub path: PathBuf,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagram {
    pub artifact: DiagramArtifact,
    pub dot: String,
    pub graph: DiagramGraph,
}

/// Maps plans to rendered diagrams. Holds no state between calls apart from
/// the output location; every call gets a fresh artifact id.
pub struct Synthesizer {
    renderer: Arc<dyn GraphRenderer>,
    output_dir: PathBuf,
}

impl Synthesizer {
    pub fn new(renderer: Arc<dyn GraphRenderer>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            renderer,
            output_dir: output_dir.into(),
        }
    }

    /// Lay out `plan`, serialize it, and render an image with a unique name.
    pub async fn render(&self, plan: &ArchitecturePlan) -> Result<Diagram> {
        let graph = synthesize(plan);
        let dot = to_dot(&graph);

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let id = uuid::Uuid::new_v4().simple().to_string();
        let filename = format!("arch_{id}.{}", self.renderer.format());
        let path = self.output_dir.join(&filename);

        self.renderer.render(&dot, &path).await?;
        tracing::info!(
            path = %path.display(),
            nodes = graph.node_count(),
            edges = graph.edges.len(),
            "rendered diagram"
        );

        Ok(Diagram {
            artifact: DiagramArtifact {
                id,
                path,
                url: format!("{DIAGRAM_URL_PREFIX}/{filename}"),
            },
            dot,
            graph,
        })
    }
}
