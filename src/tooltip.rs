//! Hover detail for a rendered scene.

use crate::graph::BarStyle;
use crate::ir::{DrawCommand, Scene, TextAnchor};

/// Offset of the tooltip box from the pointer.
pub const OFFSET: (f64, f64) = (10.0, -30.0);

const PADDING: f64 = 8.0;
const LINE_HEIGHT: f64 = 14.0;
const TEXT_SIZE: f64 = 11.0;
const CHAR_WIDTH: f64 = 6.5;

/// Pointer-driven tooltip: hidden until the pointer enters a hover region.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tooltip {
    lines: Vec<String>,
    position: Option<(f64, f64)>,
}

impl Tooltip {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pointer entered the scene at `(x, y)`. Shows the topmost region's
    /// detail, or hides the tooltip when nothing is under the pointer.
    pub fn pointer_over(&mut self, scene: &Scene, x: f64, y: f64) -> bool {
        match scene.hit(x, y) {
            Some(region) => {
                self.lines = region.detail.clone();
                self.position = Some(anchor(x, y));
                true
            }
            None => {
                self.pointer_out();
                false
            }
        }
    }

    /// Follow the pointer while visible.
    pub fn pointer_move(&mut self, x: f64, y: f64) {
        if self.position.is_some() {
            self.position = Some(anchor(x, y));
        }
    }

    pub fn pointer_out(&mut self) {
        self.lines.clear();
        self.position = None;
    }

    pub fn is_visible(&self) -> bool {
        self.position.is_some()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Top-left corner of the box, when visible.
    pub fn position(&self) -> Option<(f64, f64)> {
        self.position
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Draw the tooltip box on top of `scene`.
    pub fn overlay(&self, scene: &mut Scene) {
        let Some((x, y)) = self.position else { return };

        let longest = self.lines.iter().map(|l| l.chars().count()).max().unwrap_or(0) as f64;
        let width = longest * CHAR_WIDTH + PADDING * 2.0;
        let height = self.lines.len() as f64 * LINE_HEIGHT + PADDING * 2.0;

        scene.commands.push(DrawCommand::DrawRect {
            tl: (x, y),
            br: (x + width, y + height),
            style: BarStyle {
                color: Some("#dddddd".to_string()),
                alpha: Some(0.9),
            },
        });
        for (i, line) in self.lines.iter().enumerate() {
            scene.commands.push(DrawCommand::DrawText {
                text: line.clone(),
                pos: (x + PADDING, y + PADDING + LINE_HEIGHT * (i as f64 + 0.5)),
                size: TEXT_SIZE,
                anchor: TextAnchor::Start,
                vertical: false,
            });
        }
    }
}

fn anchor(x: f64, y: f64) -> (f64, f64) {
    (x + OFFSET.0, y + OFFSET.1)
}
