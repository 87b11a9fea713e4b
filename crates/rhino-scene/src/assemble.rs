//! Batch assembly: records in, positioned scene nodes out

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use crate::error::SkipReason;
use crate::normalize::{normalize, Curve, Frame, Primitive, Text};
use crate::path::{build_path, should_close};
use crate::primitive::decode;
use crate::scene::{
    FrameNode, NodeKind, SceneDocument, SceneNode, TextNode, VectorNode, VectorPath,
};
use crate::transform::VerticalFlip;

/// A record that produced no node, with its batch position
#[derive(Debug, Clone, PartialEq)]
pub struct Skipped {
    pub index: usize,
    pub reason: SkipReason,
}

/// Result of one pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct Assembly {
    /// Frames first, then curves and texts, each in batch order
    pub nodes: Vec<SceneNode>,
    pub skipped: Vec<Skipped>,
    pub global_max_y: f64,
}

impl Assembly {
    pub fn into_document(self, last_updated: DateTime<Utc>) -> SceneDocument {
        SceneDocument::new(self.nodes, last_updated)
    }
}

/// Decode and normalize one record.
pub fn prepare(record: &Value) -> Result<Primitive, SkipReason> {
    normalize(decode(record)?)
}

pub fn assemble(records: &[Value]) -> Assembly {
    let mut prepared = Vec::with_capacity(records.len());
    let mut skipped = Vec::new();

    for (index, record) in records.iter().enumerate() {
        match prepare(record) {
            Ok(primitive) => prepared.push((index, primitive)),
            Err(reason) => {
                debug!("Skipping primitive {}: {}", index, reason);
                skipped.push(Skipped { index, reason });
            }
        }
    }

    let flip = VerticalFlip::from_batch(prepared.iter().map(|(_, p)| p));

    let (frames, others): (Vec<_>, Vec<_>) = prepared
        .iter()
        .partition(|(_, p)| matches!(p, Primitive::Frame(_)));

    let nodes = frames
        .into_iter()
        .chain(others)
        .map(|(index, primitive)| build_node(*index, primitive, &flip))
        .collect();

    Assembly {
        nodes,
        skipped,
        global_max_y: flip.global_max_y,
    }
}

pub fn build_node(index: usize, primitive: &Primitive, flip: &VerticalFlip) -> SceneNode {
    match primitive {
        Primitive::Curve(curve) => curve_node(index, curve, flip),
        Primitive::Frame(frame) => frame_node(index, frame, flip),
        Primitive::Text(text) => text_node(index, text, flip),
    }
}

fn curve_node(index: usize, curve: &Curve, flip: &VerticalFlip) -> SceneNode {
    let placed = flip.place_curve(curve);
    let close = should_close(&placed.local_points, curve.closed);

    SceneNode {
        id: format!("curve-{}", index),
        name: format!("Curve {}", index + 1),
        x: placed.placement.x,
        y: placed.placement.y,
        kind: NodeKind::Vector(VectorNode {
            width: placed.width,
            height: placed.height,
            stroke_color: curve.stroke_color,
            stroke_weight: curve.stroke_width,
            path: VectorPath::nonzero(build_path(&placed.local_points, close)),
            parent_frame_id: curve.parent_frame_id.clone(),
        }),
    }
}

fn frame_node(index: usize, frame: &Frame, flip: &VerticalFlip) -> SceneNode {
    let placement = flip.place_frame(frame);

    SceneNode {
        id: frame
            .id
            .clone()
            .unwrap_or_else(|| format!("frame-{}", index)),
        name: frame
            .name
            .clone()
            .unwrap_or_else(|| format!("Frame {}", index + 1)),
        x: placement.x,
        y: placement.y,
        kind: NodeKind::Frame(FrameNode {
            width: frame.width,
            height: frame.height,
        }),
    }
}

fn text_node(index: usize, text: &Text, flip: &VerticalFlip) -> SceneNode {
    let placement = flip.place_text(text);

    SceneNode {
        id: format!("text-{}", index),
        name: format!("Text {}", index + 1),
        x: placement.x,
        y: placement.y,
        kind: NodeKind::Text(TextNode {
            text: text.text.clone(),
            font: text.font.clone(),
            font_size: text.font_size,
            fill_color: text.fill,
            parent_frame_id: text.parent_frame_id.clone(),
        }),
    }
}
