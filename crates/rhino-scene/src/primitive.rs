//! Wire records matching the Rhino/Grasshopper JSON export
//!
//! The exporter writes a flat JSON array. Each element carries its kind under
//! `type` (older exports use `kind`); everything else is loosely typed, so
//! elements are decoded one at a time and a bad element never poisons the
//! batch.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::{PipelineError, SkipReason};

/// The three primitive kinds the exporter emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    Curve,
    Frame,
    Text,
}

impl PrimitiveKind {
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "curve" => Some(PrimitiveKind::Curve),
            "frame" => Some(PrimitiveKind::Frame),
            "text" => Some(PrimitiveKind::Text),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PrimitiveKind::Curve => "curve",
            PrimitiveKind::Frame => "frame",
            PrimitiveKind::Text => "text",
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A 2D point written as `[x, y]`. Extra coordinates (a `z` from 3D
/// exports) are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "[f64; 2]")]
pub struct RawPoint {
    pub x: f64,
    pub y: f64,
}

impl TryFrom<Vec<f64>> for RawPoint {
    type Error = String;

    fn try_from(coords: Vec<f64>) -> Result<Self, Self::Error> {
        match coords.as_slice() {
            [x, y, ..] => Ok(RawPoint { x: *x, y: *y }),
            _ => Err(format!("point needs at least 2 coordinates, got {}", coords.len())),
        }
    }
}

impl From<RawPoint> for [f64; 2] {
    fn from(p: RawPoint) -> Self {
        [p.x, p.y]
    }
}

/// Nested style block written by the Grasshopper exporter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurveStyle {
    /// `#RRGGBB`
    #[serde(default)]
    pub stroke: Option<String>,
    #[serde(default)]
    pub stroke_width: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurveRecord {
    pub points: Vec<RawPoint>,
    #[serde(default)]
    pub closed: Option<bool>,
    #[serde(default)]
    pub stroke_width: Option<f64>,
    #[serde(default)]
    pub style: Option<CurveStyle>,
    #[serde(default)]
    pub parent_frame_id: Option<String>,
}

impl CurveRecord {
    /// Top-level `strokeWidth` wins over the nested style block.
    pub fn stroke_width(&self) -> Option<f64> {
        self.stroke_width
            .or_else(|| self.style.as_ref().and_then(|s| s.stroke_width))
    }

    pub fn stroke(&self) -> Option<&str> {
        self.style.as_ref().and_then(|s| s.stroke.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FontRecord {
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
}

/// Channels in 0..=255
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ColorRecord {
    #[serde(default)]
    pub r: Option<f64>,
    #[serde(default)]
    pub g: Option<f64>,
    #[serde(default)]
    pub b: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRecord {
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub font: Option<FontRecord>,
    #[serde(default)]
    pub font_size: Option<f64>,
    #[serde(default)]
    pub color: Option<ColorRecord>,
    #[serde(default)]
    pub parent_frame_id: Option<String>,
}

/// One decoded export record
#[derive(Debug, Clone)]
pub enum RawPrimitive {
    Curve(CurveRecord),
    Frame(FrameRecord),
    Text(TextRecord),
}

impl RawPrimitive {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            RawPrimitive::Curve(_) => PrimitiveKind::Curve,
            RawPrimitive::Frame(_) => PrimitiveKind::Frame,
            RawPrimitive::Text(_) => PrimitiveKind::Text,
        }
    }
}

/// Read the kind tag of a record, `type` first, then `kind`.
pub fn kind_tag(value: &Value) -> Option<&str> {
    value
        .get("type")
        .and_then(Value::as_str)
        .or_else(|| value.get("kind").and_then(Value::as_str))
}

/// Parse the artifact text into its list of records. Anything but a JSON
/// array is malformed.
pub fn parse_batch(json: &str) -> Result<Vec<Value>, PipelineError> {
    match serde_json::from_str::<Value>(json)? {
        Value::Array(records) => Ok(records),
        other => Err(PipelineError::MalformedInput(format!(
            "expected a JSON array of primitives, found {}",
            json_type_name(&other)
        ))),
    }
}

/// Decode one record into a typed primitive.
pub fn decode(value: &Value) -> Result<RawPrimitive, SkipReason> {
    let tag = kind_tag(value).ok_or(SkipReason::MissingKind)?;
    let kind = PrimitiveKind::parse(tag)
        .ok_or_else(|| SkipReason::UnrecognizedKind(tag.to_string()))?;

    let invalid = |err: serde_json::Error| SkipReason::Invalid {
        kind: kind.as_str(),
        message: err.to_string(),
    };

    match kind {
        PrimitiveKind::Curve => CurveRecord::deserialize(value)
            .map(RawPrimitive::Curve)
            .map_err(invalid),
        PrimitiveKind::Frame => FrameRecord::deserialize(value)
            .map(RawPrimitive::Frame)
            .map_err(invalid),
        PrimitiveKind::Text => TextRecord::deserialize(value)
            .map(RawPrimitive::Text)
            .map_err(invalid),
    }
}

/// Shape of a batch, logged whenever the artifact changes
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    pub len: usize,
    pub first_kind: Option<String>,
    pub first_points: usize,
}

impl BatchSummary {
    pub fn of(records: &[Value]) -> Self {
        let first = records.first();
        Self {
            len: records.len(),
            first_kind: first.and_then(kind_tag).map(str::to_string),
            first_points: first
                .and_then(|v| v.get("points"))
                .and_then(Value::as_array)
                .map_or(0, Vec::len),
        }
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} primitives", self.len)?;
        if let Some(kind) = &self.first_kind {
            write!(f, ", first: {} ({} points)", kind, self.first_points)?;
        }
        Ok(())
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_exporter_curve() {
        let value = json!({
            "type": "curve",
            "points": [[0.0, 0.0], [10.0, 0.0, 3.0]],
            "closed": false,
            "style": {"stroke": "#ff0000", "strokeWidth": 2.0},
            "parentFrameId": "frame_0"
        });

        let RawPrimitive::Curve(curve) = decode(&value).unwrap() else {
            panic!("Expected Curve");
        };
        assert_eq!(curve.points.len(), 2);
        assert_eq!(curve.points[1], RawPoint { x: 10.0, y: 0.0 });
        assert_eq!(curve.stroke_width(), Some(2.0));
        assert_eq!(curve.stroke(), Some("#ff0000"));
        assert_eq!(curve.parent_frame_id.as_deref(), Some("frame_0"));
    }

    #[test]
    fn test_kind_key_is_accepted() {
        let value = json!({"kind": "frame", "x": 1, "y": 2, "width": 3, "height": 4});
        let prim = decode(&value).unwrap();
        assert_eq!(prim.kind(), PrimitiveKind::Frame);
    }

    #[test]
    fn test_top_level_stroke_width_wins() {
        let value = json!({
            "type": "curve",
            "points": [[0, 0]],
            "strokeWidth": 1.5,
            "style": {"strokeWidth": 4.0}
        });
        let RawPrimitive::Curve(curve) = decode(&value).unwrap() else {
            panic!("Expected Curve");
        };
        assert_eq!(curve.stroke_width(), Some(1.5));
    }

    #[test]
    fn test_skip_reasons() {
        assert_eq!(decode(&json!({"points": []})).unwrap_err(), SkipReason::MissingKind);
        assert_eq!(
            decode(&json!({"type": "hatch"})).unwrap_err(),
            SkipReason::UnrecognizedKind("hatch".into())
        );
        assert!(matches!(
            decode(&json!({"type": "curve"})).unwrap_err(),
            SkipReason::Invalid { kind: "curve", .. }
        ));
        assert!(matches!(
            decode(&json!({"type": "curve", "points": [[1.0]]})).unwrap_err(),
            SkipReason::Invalid { kind: "curve", .. }
        ));
        assert_eq!(decode(&json!(42)).unwrap_err(), SkipReason::MissingKind);
    }

    #[test]
    fn test_parse_batch_rejects_non_array() {
        assert!(parse_batch("[]").unwrap().is_empty());
        assert!(matches!(
            parse_batch(r#"{"type": "curve"}"#),
            Err(PipelineError::MalformedInput(msg)) if msg.contains("an object")
        ));
        // A half-written file from a concurrent export
        assert!(matches!(
            parse_batch(r#"[{"type": "curve", "points": [[0,"#),
            Err(PipelineError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_batch_summary() {
        let records = vec![
            json!({"type": "curve", "points": [[0, 0], [1, 1], [2, 2]]}),
            json!({"type": "text", "x": 0, "y": 0}),
        ];
        let summary = BatchSummary::of(&records);
        assert_eq!(summary.len, 2);
        assert_eq!(summary.first_kind.as_deref(), Some("curve"));
        assert_eq!(summary.first_points, 3);
        assert_eq!(summary.to_string(), "2 primitives, first: curve (3 points)");
        assert_eq!(BatchSummary::of(&[]).to_string(), "0 primitives");
    }
}
