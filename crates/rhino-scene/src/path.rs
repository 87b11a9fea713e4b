//! Polyline path strings in the SVG-style grammar Figma accepts for
//! `vectorPaths`: `M x y L x y ... Z`, tokens separated by single spaces.

use nalgebra::Point2;
use std::fmt;

/// Endpoints closer than this (source units) are treated as the same point.
pub const CLOSE_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathCommand {
    MoveTo(Point2<f64>),
    LineTo(Point2<f64>),
    Close,
}

impl fmt::Display for PathCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathCommand::MoveTo(p) => write!(f, "M {} {}", p.x, p.y),
            PathCommand::LineTo(p) => write!(f, "L {} {}", p.x, p.y),
            PathCommand::Close => f.write_str("Z"),
        }
    }
}

/// Closed if the export says so, or if a multi-point curve ends where it
/// started (within [`CLOSE_TOLERANCE`]).
pub fn should_close(points: &[Point2<f64>], explicit: bool) -> bool {
    if explicit {
        return true;
    }
    match points {
        [first, .., last] => nalgebra::distance(first, last) < CLOSE_TOLERANCE,
        _ => false,
    }
}

pub fn commands(points: &[Point2<f64>], close: bool) -> Vec<PathCommand> {
    let mut cmds = Vec::with_capacity(points.len() + 1);
    let mut iter = points.iter();
    if let Some(first) = iter.next() {
        cmds.push(PathCommand::MoveTo(*first));
        cmds.extend(iter.map(|p| PathCommand::LineTo(*p)));
        if close {
            cmds.push(PathCommand::Close);
        }
    }
    cmds
}

pub fn build_path(points: &[Point2<f64>], close: bool) -> String {
    commands(points, close)
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(raw: &[(f64, f64)]) -> Vec<Point2<f64>> {
        raw.iter().map(|&(x, y)| Point2::new(x, y)).collect()
    }

    #[test]
    fn test_open_polyline() {
        let points = pts(&[(0.0, 0.0), (10.0, 0.0), (10.0, 5.5)]);
        assert_eq!(build_path(&points, false), "M 0 0 L 10 0 L 10 5.5");
    }

    #[test]
    fn test_closed_polyline() {
        let points = pts(&[(0.0, 10.0), (10.0, 10.0), (10.0, 0.0), (0.0, 10.0)]);
        let close = should_close(&points, false);
        assert!(close);
        assert_eq!(build_path(&points, close), "M 0 10 L 10 10 L 10 0 L 0 10 Z");
    }

    #[test]
    fn test_command_counts() {
        for n in 1..6 {
            let points: Vec<_> = (0..n).map(|i| Point2::new(i as f64, (i * i) as f64)).collect();
            for close in [false, true] {
                let path = build_path(&points, close);
                let tokens: Vec<&str> = path.split(' ').collect();
                assert_eq!(tokens[0], "M");
                assert_eq!(tokens.iter().filter(|t| **t == "M").count(), 1);
                assert_eq!(tokens.iter().filter(|t| **t == "L").count(), n - 1);
                assert_eq!(path.ends_with('Z'), close, "path {:?}", path);
            }
        }
    }

    #[test]
    fn test_closure_inference_tolerance() {
        let near = pts(&[(0.0, 0.0), (5.0, 5.0), (0.005, 0.0)]);
        assert!(should_close(&near, false));

        let far = pts(&[(0.0, 0.0), (5.0, 5.0), (0.01, 0.0)]);
        assert!(!should_close(&far, false));
        assert!(should_close(&far, true));
    }

    #[test]
    fn test_single_point_never_infers_closure() {
        let single = pts(&[(1.0, 1.0)]);
        assert!(!should_close(&single, false));
        assert_eq!(build_path(&single, false), "M 1 1");
        assert_eq!(build_path(&single, true), "M 1 1 Z");
        assert_eq!(build_path(&[], true), "");
    }
}
