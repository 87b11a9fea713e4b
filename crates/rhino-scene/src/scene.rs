//! Figma-ready scene descriptors served to the plugin

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Only winding rule the pipeline emits
pub const WINDING_RULE: &str = "NONZERO";

/// RGB color with channels in 0..=1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Color {
    pub const BLACK: Color = Color { r: 0.0, g: 0.0, b: 0.0 };
    pub const WHITE: Color = Color { r: 1.0, g: 1.0, b: 1.0 };

    /// Build from 0..=255 channels, clamping out-of-range values.
    pub fn from_rgb255(r: f64, g: f64, b: f64) -> Self {
        let channel = |v: f64| if v.is_finite() { v.clamp(0.0, 255.0) / 255.0 } else { 0.0 };
        Color {
            r: channel(r),
            g: channel(g),
            b: channel(b),
        }
    }

    /// Parse `#RRGGBB` (the leading `#` is optional).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok().map(f64::from);
        Some(Color::from_rgb255(channel(0)?, channel(2)?, channel(4)?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FontName {
    pub family: String,
    pub style: String,
}

impl Default for FontName {
    fn default() -> Self {
        Self {
            family: "Inter".to_string(),
            style: "Regular".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorPath {
    pub winding_rule: String,
    pub data: String,
}

impl VectorPath {
    pub fn nonzero(data: String) -> Self {
        Self {
            winding_rule: WINDING_RULE.to_string(),
            data,
        }
    }
}

/// One node descriptor. `x`/`y` are the top-left corner in page space
/// (Y down).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneNode {
    pub id: String,
    pub name: String,
    pub x: f64,
    pub y: f64,
    #[serde(flatten)]
    pub kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum NodeKind {
    Vector(VectorNode),
    Frame(FrameNode),
    Text(TextNode),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorNode {
    pub width: f64,
    pub height: f64,
    pub stroke_color: Color,
    pub stroke_weight: f64,
    pub path: VectorPath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_frame_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameNode {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextNode {
    pub text: String,
    pub font: FontName,
    pub font_size: f64,
    pub fill_color: Color,
    #[serde(default)]
    pub parent_frame_id: Option<String>,
}

impl SceneNode {
    /// Figma node type name
    pub fn type_name(&self) -> &'static str {
        match self.kind {
            NodeKind::Vector(_) => "VECTOR",
            NodeKind::Frame(_) => "FRAME",
            NodeKind::Text(_) => "TEXT",
        }
    }

    pub fn parent_frame_id(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Vector(v) => v.parent_frame_id.as_deref(),
            NodeKind::Text(t) => t.parent_frame_id.as_deref(),
            NodeKind::Frame(_) => None,
        }
    }

    pub fn is_frame(&self) -> bool {
        matches!(self.kind, NodeKind::Frame(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneMetadata {
    pub total_shapes: usize,
    pub last_updated: DateTime<Utc>,
}

/// Body of the pull interface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDocument {
    pub shapes: Vec<SceneNode>,
    pub metadata: SceneMetadata,
}

impl SceneDocument {
    pub fn new(shapes: Vec<SceneNode>, last_updated: DateTime<Utc>) -> Self {
        let total_shapes = shapes.len();
        Self {
            shapes,
            metadata: SceneMetadata {
                total_shapes,
                last_updated,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_color_normalization() {
        assert_eq!(Color::from_rgb255(255.0, 0.0, 51.0), Color { r: 1.0, g: 0.0, b: 0.2 });
        assert_eq!(Color::from_rgb255(300.0, -5.0, f64::NAN), Color { r: 1.0, g: 0.0, b: 0.0 });
    }

    #[test]
    fn test_hex_color() {
        assert_eq!(Color::from_hex("#000000"), Some(Color::BLACK));
        assert_eq!(Color::from_hex("ffffff"), Some(Color::WHITE));
        assert_eq!(Color::from_hex("#ff0000").map(|c| c.r), Some(1.0));
        assert_eq!(Color::from_hex("#fff"), None);
        assert_eq!(Color::from_hex("#gg0000"), None);
    }

    #[test]
    fn test_vector_node_wire_format() {
        let node = SceneNode {
            id: "curve-0".into(),
            name: "Curve 1".into(),
            x: 1.0,
            y: 2.0,
            kind: NodeKind::Vector(VectorNode {
                width: 10.0,
                height: 5.0,
                stroke_color: Color::BLACK,
                stroke_weight: 0.5,
                path: VectorPath::nonzero("M 0 0 L 10 5".into()),
                parent_frame_id: None,
            }),
        };

        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "curve-0",
                "name": "Curve 1",
                "x": 1.0,
                "y": 2.0,
                "type": "VECTOR",
                "width": 10.0,
                "height": 5.0,
                "strokeColor": {"r": 0.0, "g": 0.0, "b": 0.0},
                "strokeWeight": 0.5,
                "path": {"windingRule": "NONZERO", "data": "M 0 0 L 10 5"}
            })
        );

        let back: SceneNode = serde_json::from_value(value).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn test_text_node_keeps_null_parent() {
        let value = json!({
            "id": "text-2", "name": "Text 3", "x": 0, "y": 4, "type": "TEXT",
            "text": "A-01", "font": {"family": "Inter", "style": "Bold"},
            "fontSize": 12, "fillColor": {"r": 0, "g": 0, "b": 0},
            "parentFrameId": null
        });
        let node: SceneNode = serde_json::from_value(value).unwrap();
        assert_eq!(node.type_name(), "TEXT");
        assert_eq!(node.parent_frame_id(), None);
        assert_eq!(serde_json::to_value(&node).unwrap()["parentFrameId"], json!(null));
    }
}
