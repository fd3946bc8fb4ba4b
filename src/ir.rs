use crate::graph::{BarStyle, LineStyle, PointStyle};

// =============================================================================
// Scene: everything a backend needs to draw one chart
// =============================================================================

/// A fully laid-out chart in pixel coordinates.
///
/// Chart layouts produce a scene from aggregated rows; the backend executes
/// it blindly. Scenes are rebuilt from scratch on every update.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub width: f64,
    pub height: f64,
    pub title: Title,
    pub axes: Vec<Axis>,
    pub commands: Vec<DrawCommand>,
    pub hit_regions: Vec<HitRegion>,
}

impl Scene {
    pub fn new(width: f64, height: f64, title: Title) -> Self {
        Self {
            width,
            height,
            title,
            axes: Vec::new(),
            commands: Vec::new(),
            hit_regions: Vec::new(),
        }
    }

    /// Topmost hover region under the pointer (later regions draw on top).
    pub fn hit(&self, x: f64, y: f64) -> Option<&HitRegion> {
        self.hit_regions.iter().rev().find(|r| r.shape.contains(x, y))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Title {
    pub text: String,
    pub font_size: f64,
    /// Anchor point; the text is centered on it.
    pub x: f64,
    pub y: f64,
}

// =============================================================================
// Axes
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Horizontal axis, ticks and labels below the line.
    Bottom,
    /// Vertical axis, ticks and labels left of the line.
    Left,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    pub orientation: Orientation,
    /// y of a bottom axis, x of a left axis.
    pub offset: f64,
    /// Pixel extent of the axis line along its direction.
    pub extent: (f64, f64),
    pub ticks: Vec<Tick>,
    /// Draw tick labels rotated so long category names fit.
    pub rotate_labels: bool,
    /// Heading drawn above a vertical axis (parallel coordinates).
    pub heading: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub position: f64,
    pub label: String,
}

// =============================================================================
// Marks
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAnchor {
    Start,
    Middle,
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    DrawRect {
        // Top-Left, Bottom-Right
        tl: (f64, f64),
        br: (f64, f64),
        style: BarStyle,
    },
    DrawPath {
        points: Vec<(f64, f64)>,
        style: LineStyle,
    },
    DrawCircle {
        center: (f64, f64),
        radius: f64,
        style: PointStyle,
    },
    DrawText {
        text: String,
        pos: (f64, f64),
        size: f64,
        anchor: TextAnchor,
        vertical: bool,
    },
}

// =============================================================================
// Hover regions
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum HitShape {
    Rect { tl: (f64, f64), br: (f64, f64) },
    Circle { center: (f64, f64), radius: f64 },
    Polyline { points: Vec<(f64, f64)>, tolerance: f64 },
}

impl HitShape {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        match self {
            HitShape::Rect { tl, br } => {
                let (x0, x1) = (tl.0.min(br.0), tl.0.max(br.0));
                let (y0, y1) = (tl.1.min(br.1), tl.1.max(br.1));
                x >= x0 && x <= x1 && y >= y0 && y <= y1
            }
            HitShape::Circle { center, radius } => {
                (x - center.0).hypot(y - center.1) <= *radius
            }
            HitShape::Polyline { points, tolerance } => points
                .windows(2)
                .any(|seg| distance_to_segment((x, y), seg[0], seg[1]) <= *tolerance),
        }
    }
}

fn distance_to_segment(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq == 0.0 {
        0.0
    } else {
        (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len_sq).clamp(0.0, 1.0)
    };
    let (cx, cy) = (a.0 + t * dx, a.1 + t * dy);
    (p.0 - cx).hypot(p.1 - cy)
}

/// An element that shows detail text when the pointer is over it.
#[derive(Debug, Clone, PartialEq)]
pub struct HitRegion {
    pub shape: HitShape,
    /// One entry per tooltip line.
    pub detail: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(shape: HitShape, label: &str) -> HitRegion {
        HitRegion {
            shape,
            detail: vec![label.to_string()],
        }
    }

    #[test]
    fn test_hit_shapes() {
        let rect = HitShape::Rect { tl: (10.0, 10.0), br: (20.0, 30.0) };
        assert!(rect.contains(15.0, 20.0));
        assert!(!rect.contains(25.0, 20.0));

        let circle = HitShape::Circle { center: (0.0, 0.0), radius: 4.0 };
        assert!(circle.contains(3.0, 0.0));
        assert!(!circle.contains(3.0, 3.0));

        let line = HitShape::Polyline {
            points: vec![(0.0, 0.0), (100.0, 0.0), (100.0, 100.0)],
            tolerance: 3.0,
        };
        assert!(line.contains(50.0, 2.0));
        assert!(line.contains(102.0, 50.0));
        assert!(!line.contains(50.0, 50.0));
    }

    #[test]
    fn test_scene_hit_prefers_topmost() {
        let title = Title { text: String::new(), font_size: 16.0, x: 0.0, y: 0.0 };
        let mut scene = Scene::new(100.0, 100.0, title);
        scene.hit_regions.push(region(HitShape::Rect { tl: (0.0, 0.0), br: (50.0, 50.0) }, "below"));
        scene.hit_regions.push(region(HitShape::Circle { center: (25.0, 25.0), radius: 5.0 }, "above"));

        assert_eq!(scene.hit(25.0, 25.0).unwrap().detail, vec!["above"]);
        assert_eq!(scene.hit(5.0, 5.0).unwrap().detail, vec!["below"]);
        assert!(scene.hit(90.0, 90.0).is_none());
    }
}
