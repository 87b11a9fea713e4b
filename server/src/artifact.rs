//! Access to the watched export file
//!
//! The exporter may be halfway through rewriting the file when we read it;
//! that surfaces as `MalformedInput`, never as a panic.

use rhino_scene::{convert, primitive, Assembly, PipelineError};
use serde_json::Value;
use std::path::Path;
use tracing::info;

/// Create the artifact with an empty batch if it does not exist yet.
pub fn ensure_exists(path: &Path) -> Result<bool, PipelineError> {
    if path.exists() {
        return Ok(false);
    }
    let io_err = |source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(io_err)?;
    }
    std::fs::write(path, "[]").map_err(io_err)?;
    info!("Created empty export at {:?}", path);
    Ok(true)
}

pub async fn read(path: &Path) -> Result<String, PipelineError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => PipelineError::MissingArtifact(path.to_path_buf()),
            _ => PipelineError::Io {
                path: path.to_path_buf(),
                source,
            },
        })
}

/// The artifact as parsed JSON, unmodified.
pub async fn read_raw(path: &Path) -> Result<Value, PipelineError> {
    let json = read(path).await?;
    Ok(serde_json::from_str(&json)?)
}

/// Run the full pipeline on the current artifact.
pub async fn load(path: &Path) -> Result<(primitive::BatchSummary, Assembly), PipelineError> {
    let json = read(path).await?;
    let records = primitive::parse_batch(&json)?;
    let summary = primitive::BatchSummary::of(&records);
    Ok((summary, rhino_scene::assemble(&records)))
}

/// Convert without the batch summary.
pub async fn load_assembly(path: &Path) -> Result<Assembly, PipelineError> {
    convert(&read(path).await?)
}
