use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use blueprint_core::{Error, Result};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Turns DOT text into an image file.
#[async_trait]
pub trait GraphRenderer: Send + Sync {
    async fn render(&self, dot: &str, path: &Path) -> Result<()>;

    /// File extension of the produced image, e.g. "svg".
    fn format(&self) -> &str;
}

/// Renders through the Graphviz `dot` executable.
pub struct GraphvizRenderer {
    binary: PathBuf,
    format: String,
}

impl GraphvizRenderer {
    /// Find `dot` on PATH and render SVG.
    pub fn locate() -> Result<Self> {
        let binary = which::which("dot")
            .map_err(|e| Error::Render(format!("Graphviz `dot` not found in PATH: {e}")))?;
        Ok(Self::with_binary(binary, "svg"))
    }

    pub fn with_binary(binary: impl Into<PathBuf>, format: &str) -> Self {
        Self {
            binary: binary.into(),
            format: format.to_string(),
        }
    }
}

#[async_trait]
impl GraphRenderer for GraphvizRenderer {
    async fn render(&self, dot: &str, path: &Path) -> Result<()> {
        let mut child = Command::new(&self.binary)
            .arg(format!("-T{}", self.format))
            .arg("-o")
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Render(format!("spawn {}: {e}", self.binary.display())))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(dot.as_bytes())
                .await
                .map_err(|e| Error::Render(format!("write DOT to renderer: {e}")))?;
            // Dropping stdin closes the pipe so `dot` sees EOF.
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| Error::Render(format!("wait for renderer: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Render(format!(
                "dot exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }

    fn format(&self) -> &str {
        &self.format
    }
}
