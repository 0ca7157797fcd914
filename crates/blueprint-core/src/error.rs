/// Errors that can reach a caller. Malformed model output is not listed here:
/// it is repaired inside the validator and never surfaces.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("generative capability unavailable: {0}")]
    GenerativeCapabilityUnavailable(String),

    #[error("invalid input: {0}")]
    ClientInputInvalid(String),

    #[error("diagram rendering failed: {0}")]
    Render(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Stable machine-readable kind for error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Configuration(_) => "configuration",
            Error::GenerativeCapabilityUnavailable(_) => "upstream_unavailable",
            Error::ClientInputInvalid(_) => "client_input_invalid",
            Error::Render(_) => "render_failed",
            Error::Io(_) | Error::Json(_) => "internal",
        }
    }

    /// HTTP-style status a transport should report.
    pub fn status(&self) -> u16 {
        match self {
            Error::ClientInputInvalid(_) => 400,
            Error::GenerativeCapabilityUnavailable(_) => 502,
            _ => 500,
        }
    }

    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "error": self.to_string(),
            "kind": self.kind(),
            "status": self.status(),
        })
    }
}
