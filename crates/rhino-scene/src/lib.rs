//! rhino-scene: Translate Rhino/Grasshopper JSON exports into Figma scene nodes
//!
//! This crate provides:
//! - Decoding of the exporter's loosely typed primitive list (curves, frames, texts)
//! - Normalization, Y-up to Y-down placement and polyline path building
//! - Assembly of the Figma-ready document served to the plugin
//! - Idempotent materialization of that document into a canvas
//!
//! Source units are passed through unscaled; one Rhino unit becomes one
//! Figma pixel.

pub mod assemble;
pub mod error;
pub mod materialize;
pub mod normalize;
pub mod path;
pub mod plugin;
pub mod primitive;
pub mod scene;
pub mod transform;

pub use assemble::{assemble, Assembly, Skipped};
pub use error::{CanvasError, PipelineError, SkipReason, SourceError};
pub use materialize::{materialize, Canvas, MaterializeReport, MemoryCanvas};
pub use plugin::{HttpSceneSource, PluginEvent, PluginMessage, SceneSource, Session};
pub use primitive::{BatchSummary, RawPrimitive};
pub use scene::{SceneDocument, SceneNode};

use std::path::Path;

/// Run the pipeline on the artifact text.
pub fn convert(json: &str) -> Result<Assembly, PipelineError> {
    let records = primitive::parse_batch(json)?;
    Ok(assemble(&records))
}

/// Read the artifact, distinguishing a missing file from other I/O failures.
pub fn read_artifact(path: &Path) -> Result<String, PipelineError> {
    std::fs::read_to_string(path).map_err(|source| match source.kind() {
        std::io::ErrorKind::NotFound => PipelineError::MissingArtifact(path.to_path_buf()),
        _ => PipelineError::Io {
            path: path.to_path_buf(),
            source,
        },
    })
}

/// Read and convert an artifact into the pull-interface document.
pub fn convert_file(path: &Path) -> Result<SceneDocument, PipelineError> {
    let json = read_artifact(path)?;
    Ok(convert(&json)?.into_document(chrono::Utc::now()))
}
