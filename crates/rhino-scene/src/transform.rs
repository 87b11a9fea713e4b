//! Rhino (Y up) to Figma (Y down, top-left origin) placement
//!
//! Shapes are flipped twice: each curve's path is mirrored inside its own
//! bounding box, and every placement is mirrored about one batch-wide
//! reference (`global_max_y`). Using a single reference keeps the relative
//! layout of the whole drawing intact.

use nalgebra::Point2;

use crate::normalize::{Curve, Frame, Primitive, Text};

/// Top-left corner in page space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
}

/// Curve placement plus its path points in local, flipped coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct CurvePlacement {
    pub placement: Placement,
    pub width: f64,
    pub height: f64,
    pub local_points: Vec<Point2<f64>>,
}

/// The batch-wide vertical flip
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerticalFlip {
    pub global_max_y: f64,
}

impl VerticalFlip {
    /// Largest Y over every curve point, frame edge and text anchor, or 0
    /// for an empty batch.
    pub fn from_batch<'a>(primitives: impl IntoIterator<Item = &'a Primitive>) -> Self {
        let mut max: Option<f64> = None;
        let mut visit = |y: f64| max = Some(max.map_or(y, |m: f64| m.max(y)));

        for primitive in primitives {
            match primitive {
                Primitive::Curve(curve) => curve.points.iter().for_each(|p| visit(p.y)),
                Primitive::Frame(frame) => {
                    visit(frame.y);
                    visit(frame.y + frame.height);
                }
                Primitive::Text(text) => visit(text.y),
            }
        }

        Self {
            global_max_y: max.unwrap_or(0.0),
        }
    }

    pub fn place_curve(&self, curve: &Curve) -> CurvePlacement {
        let bounds = &curve.bounds;
        CurvePlacement {
            placement: Placement {
                x: bounds.min.x,
                y: self.global_max_y - bounds.max.y,
            },
            width: bounds.width(),
            height: bounds.height(),
            local_points: local_points(curve),
        }
    }

    pub fn place_frame(&self, frame: &Frame) -> Placement {
        Placement {
            x: frame.x,
            y: self.global_max_y - (frame.y + frame.height),
        }
    }

    pub fn place_text(&self, text: &Text) -> Placement {
        Placement {
            x: text.x,
            y: self.global_max_y - text.y,
        }
    }
}

/// Points relative to the curve's box, mirrored vertically inside it.
pub fn local_points(curve: &Curve) -> Vec<Point2<f64>> {
    let Curve { bounds, .. } = curve;
    curve
        .points
        .iter()
        .map(|p| Point2::new(p.x - bounds.min.x, bounds.max.y - p.y))
        .collect()
}
