//! Canonical local-space geometry with defaults applied
//!
//! Everything downstream works on these types; no `Option` numbers survive
//! past this point.

use nalgebra::Point2;

use crate::error::SkipReason;
use crate::primitive::{CurveRecord, FrameRecord, RawPrimitive, TextRecord};
use crate::scene::{Color, FontName};

pub const DEFAULT_STROKE_WIDTH: f64 = 0.5;
pub const DEFAULT_FONT_SIZE: f64 = 12.0;

/// Axis-aligned bounding box in source units (Y up)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Point2<f64>,
    pub max: Point2<f64>,
}

impl Bounds {
    pub fn from_points(points: &[Point2<f64>]) -> Option<Self> {
        let first = *points.first()?;
        let mut bounds = Bounds { min: first, max: first };
        for p in &points[1..] {
            bounds.min.x = bounds.min.x.min(p.x);
            bounds.min.y = bounds.min.y.min(p.y);
            bounds.max.x = bounds.max.x.max(p.x);
            bounds.max.y = bounds.max.y.max(p.y);
        }
        Some(bounds)
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    pub points: Vec<Point2<f64>>,
    pub bounds: Bounds,
    /// Explicit `closed` flag from the export; inferred closure happens in
    /// the path builder.
    pub closed: bool,
    pub stroke_width: f64,
    pub stroke_color: Color,
    pub parent_frame_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub id: Option<String>,
    pub name: Option<String>,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Text {
    pub x: f64,
    pub y: f64,
    pub text: String,
    pub font: FontName,
    pub font_size: f64,
    pub fill: Color,
    pub parent_frame_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Curve(Curve),
    Frame(Frame),
    Text(Text),
}

pub fn normalize(raw: RawPrimitive) -> Result<Primitive, SkipReason> {
    match raw {
        RawPrimitive::Curve(record) => normalize_curve(record).map(Primitive::Curve),
        RawPrimitive::Frame(record) => Ok(Primitive::Frame(normalize_frame(record))),
        RawPrimitive::Text(record) => normalize_text(record).map(Primitive::Text),
    }
}

pub fn normalize_curve(record: CurveRecord) -> Result<Curve, SkipReason> {
    let stroke_width = stroke_width(record.stroke_width());
    let stroke_color = record.stroke().and_then(Color::from_hex).unwrap_or(Color::BLACK);

    let points: Vec<Point2<f64>> = record
        .points
        .iter()
        .map(|p| Point2::new(p.x, p.y))
        .collect();
    if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return Err(SkipReason::Invalid {
            kind: "curve",
            message: "non-finite point coordinate".to_string(),
        });
    }
    let bounds = Bounds::from_points(&points).ok_or(SkipReason::EmptyCurve)?;

    Ok(Curve {
        points,
        bounds,
        closed: record.closed.unwrap_or(false),
        stroke_width,
        stroke_color,
        parent_frame_id: non_empty(record.parent_frame_id),
    })
}

pub fn normalize_frame(record: FrameRecord) -> Frame {
    let number = |v: Option<f64>| v.filter(|n| n.is_finite()).unwrap_or(0.0);
    Frame {
        id: non_empty(record.id),
        name: non_empty(record.name),
        x: number(record.x),
        y: number(record.y),
        width: number(record.width),
        height: number(record.height),
    }
}

pub fn normalize_text(record: TextRecord) -> Result<Text, SkipReason> {
    let position = |v: Option<f64>, field: &'static str| {
        v.filter(|n| n.is_finite())
            .ok_or(SkipReason::MissingField { kind: "text", field })
    };
    let x = position(record.x, "x")?;
    let y = position(record.y, "y")?;

    let defaults = FontName::default();
    let font = record.font.unwrap_or_default();
    let font = FontName {
        family: non_empty(font.family).unwrap_or(defaults.family),
        style: non_empty(font.style).unwrap_or(defaults.style),
    };

    let fill = record
        .color
        .map(|c| Color::from_rgb255(c.r.unwrap_or(0.0), c.g.unwrap_or(0.0), c.b.unwrap_or(0.0)))
        .unwrap_or(Color::BLACK);

    Ok(Text {
        x,
        y,
        text: record.text.unwrap_or_default(),
        font,
        font_size: record
            .font_size
            .filter(|s| s.is_finite() && *s > 0.0)
            .unwrap_or(DEFAULT_FONT_SIZE),
        fill,
        parent_frame_id: non_empty(record.parent_frame_id),
    })
}

/// Missing, negative or non-finite widths fall back to the default.
pub fn stroke_width(value: Option<f64>) -> f64 {
    match value {
        Some(w) if w.is_finite() && w >= 0.0 => w,
        _ => DEFAULT_STROKE_WIDTH,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::{decode, ColorRecord, FontRecord};
    use serde_json::json;

    fn curve(value: serde_json::Value) -> Result<Curve, SkipReason> {
        match normalize(decode(&value)?)? {
            Primitive::Curve(c) => Ok(c),
            other => panic!("Expected Curve, got {:?}", other),
        }
    }

    #[test]
    fn test_curve_defaults() {
        let c = curve(json!({"type": "curve", "points": [[0, 0], [10, 0], [10, 10]]})).unwrap();
        assert_eq!(c.stroke_width, DEFAULT_STROKE_WIDTH);
        assert_eq!(c.stroke_color, Color::BLACK);
        assert!(!c.closed);
        assert_eq!(c.bounds.width(), 10.0);
        assert_eq!(c.bounds.height(), 10.0);
        assert_eq!(c.parent_frame_id, None);
    }

    #[test]
    fn test_stroke_width_fallbacks() {
        assert_eq!(stroke_width(None), 0.5);
        assert_eq!(stroke_width(Some(f64::NAN)), 0.5);
        assert_eq!(stroke_width(Some(f64::INFINITY)), 0.5);
        assert_eq!(stroke_width(Some(-1.0)), 0.5);
        assert_eq!(stroke_width(Some(0.0)), 0.0);
        assert_eq!(stroke_width(Some(2.0)), 2.0);
    }

    #[test]
    fn test_degenerate_curve_has_zero_size() {
        let c = curve(json!({"type": "curve", "points": [[3.5, -2.0]]})).unwrap();
        assert_eq!(c.bounds.width(), 0.0);
        assert_eq!(c.bounds.height(), 0.0);
        assert_eq!(c.bounds.min, Point2::new(3.5, -2.0));
    }

    #[test]
    fn test_empty_curve_is_skipped() {
        assert_eq!(
            curve(json!({"type": "curve", "points": []})).unwrap_err(),
            SkipReason::EmptyCurve
        );
    }

    #[test]
    fn test_stroke_color_from_style() {
        let c = curve(json!({
            "type": "curve",
            "points": [[0, 0], [1, 1]],
            "style": {"stroke": "#0000ff", "strokeWidth": 1}
        }))
        .unwrap();
        assert_eq!(c.stroke_color, Color { r: 0.0, g: 0.0, b: 1.0 });
        assert_eq!(c.stroke_width, 1.0);
    }

    #[test]
    fn test_frame_defaults() {
        let frame = normalize_frame(FrameRecord {
            id: Some("  ".into()),
            ..Default::default()
        });
        assert_eq!(frame.id, None);
        assert_eq!((frame.x, frame.y, frame.width, frame.height), (0.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn test_text_defaults_and_clamping() {
        let text = normalize_text(TextRecord {
            x: Some(1.0),
            y: Some(2.0),
            font: Some(FontRecord {
                family: None,
                style: Some("Bold".into()),
            }),
            color: Some(ColorRecord {
                r: Some(510.0),
                g: Some(-3.0),
                b: None,
            }),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(text.font.family, "Inter");
        assert_eq!(text.font.style, "Bold");
        assert_eq!(text.font_size, DEFAULT_FONT_SIZE);
        assert_eq!(text.fill, Color { r: 1.0, g: 0.0, b: 0.0 });
        assert_eq!(text.text, "");
    }

    #[test]
    fn test_text_without_position_is_skipped() {
        let err = normalize_text(TextRecord {
            x: Some(1.0),
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(err, SkipReason::MissingField { kind: "text", field: "y" });
    }
}
