//! Body transformers.

mod json;

pub use json::{transform, JsonTransformer};

use crate::config::TransformConfig;

/// Errors raised while rewriting a body.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Outcome of running a reply body through the rewriter.
#[derive(Debug)]
pub enum BodyRewrite {
    /// The body was JSON and has been rewritten
    Transformed(String),
    /// Rewriting is disabled or the content type is not JSON
    Skipped,
    /// The content type claimed JSON but the body did not parse
    Failed(TransformError),
}

impl BodyRewrite {
    /// Rewrite `body` if `content_type` marks it as JSON.
    pub fn apply(
        config: &TransformConfig,
        transformer: &JsonTransformer,
        content_type: Option<&str>,
        body: &str,
    ) -> Self {
        if !config.settings.rewrite_json || !config.is_json_content_type(content_type) {
            return Self::Skipped;
        }
        match transformer.transform_text(body) {
            Ok(text) => Self::Transformed(text),
            Err(e) => Self::Failed(e),
        }
    }

    /// The rewritten text, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Transformed(text) => Some(text),
            _ => None,
        }
    }
}
