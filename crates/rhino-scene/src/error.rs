//! Error and skip taxonomy shared by the pipeline, the materializer and the
//! scene puller.

use std::path::PathBuf;
use thiserror::Error;

/// Failures that abort a whole pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Unparseable artifact, or a document that is not a JSON array.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("source artifact not found: {}", .0.display())]
    MissingArtifact(PathBuf),

    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::MalformedInput(err.to_string())
    }
}

/// Why a single primitive produced no scene node. Not an error: the rest of
/// the batch is unaffected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SkipReason {
    #[error("record has no kind tag")]
    MissingKind,

    #[error("unrecognized primitive kind `{0}`")]
    UnrecognizedKind(String),

    #[error("invalid {kind} record: {message}")]
    Invalid { kind: &'static str, message: String },

    #[error("{kind} is missing required field `{field}`")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },

    #[error("curve has no points")]
    EmptyCurve,
}

/// Failures reported by a target canvas.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CanvasError {
    #[error("font \"{family} {style}\" could not be loaded: {reason}")]
    FontLoad {
        family: String,
        style: String,
        reason: String,
    },

    #[error("failed to create {kind} node `{name}`: {reason}")]
    TargetCreation {
        kind: &'static str,
        name: String,
        reason: String,
    },

    #[error("node {0} does not exist")]
    NodeNotFound(u64),
}

/// Failures while pulling a scene document from the sync server.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server response error: {0}")]
    Status(u16),

    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}
