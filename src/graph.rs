use anyhow::{bail, Context, Result};
use image::ImageEncoder;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::{FontDesc, FontFamily, FontStyle, FontTransform};
use tracing::{debug, warn};

use crate::ir::{Axis, DrawCommand, Orientation, Scene, TextAnchor, Title};
use crate::{OutputFormat, RenderOptions};

/// Style configuration for line marks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineStyle {
    pub color: Option<String>,
    pub width: Option<f64>,
    pub alpha: Option<f64>,
}

/// Style configuration for point markers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointStyle {
    pub color: Option<String>,
    pub alpha: Option<f64>,
}

/// Style configuration for bar marks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BarStyle {
    pub color: Option<String>,
    pub alpha: Option<f64>,
}

const TICK_SIZE: f64 = 6.0;
const TICK_LABEL_SIZE: f64 = 10.0;

/// Largest output edge in pixels.
pub const MAX_DIMENSION: u32 = 16_384;

/// Draw a scene and encode it in the requested format.
pub fn render_scene(scene: &Scene, options: &RenderOptions) -> Result<Vec<u8>> {
    if !options.scale.is_finite() {
        bail!("scale factor {} is not finite", options.scale);
    }
    let scale = if options.scale > 0.0 { options.scale } else { 1.0 };
    let width = pixel_extent(scene.width * scale)?;
    let height = pixel_extent(scene.height * scale)?;
    debug!(width, height, title = %scene.title.text, "rendering scene");

    match options.format {
        OutputFormat::Png => render_png(scene, width, height, scale),
        OutputFormat::Svg => render_svg(scene, width, height, scale),
    }
}

fn pixel_extent(length: f64) -> Result<u32> {
    let pixels = length.round().max(1.0);
    if pixels.is_nan() || pixels > f64::from(MAX_DIMENSION) {
        bail!("image edge of {} pixels exceeds the {} pixel limit", pixels, MAX_DIMENSION);
    }
    Ok(pixels as u32)
}

fn render_png(scene: &Scene, width: u32, height: u32, scale: f64) -> Result<Vec<u8>> {
    let len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(3))
        .context("PNG buffer size overflows")?;
    let mut buffer = vec![0u8; len];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        Painter { root: &root, scale }.paint(scene)?;
        root.present().context("Failed to present drawing")?;
    }

    let mut png_bytes = Vec::new();
    {
        let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
        encoder
            .write_image(&buffer, width, height, image::ColorType::Rgb8)
            .context("Failed to encode PNG")?;
    }

    Ok(png_bytes)
}

fn render_svg(scene: &Scene, width: u32, height: u32, scale: f64) -> Result<Vec<u8>> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();
        Painter { root: &root, scale }.paint(scene)?;
        root.present().context("Failed to present drawing")?;
    }
    Ok(svg.into_bytes())
}

/// Executes scene commands on a plotters drawing area.
struct Painter<'a, DB: DrawingBackend> {
    root: &'a DrawingArea<DB, Shift>,
    scale: f64,
}

impl<'a, DB> Painter<'a, DB>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    fn px(&self, (x, y): (f64, f64)) -> (i32, i32) {
        ((x * self.scale).round() as i32, (y * self.scale).round() as i32)
    }

    fn len(&self, v: f64) -> f64 {
        v * self.scale
    }

    fn paint(&self, scene: &Scene) -> Result<()> {
        // every update is a full clear-and-redraw
        self.root.fill(&WHITE).context("Failed to fill background")?;

        for command in &scene.commands {
            self.command(command)?;
        }
        for axis in &scene.axes {
            self.axis(axis)?;
        }
        self.title(&scene.title);
        Ok(())
    }

    fn command(&self, command: &DrawCommand) -> Result<()> {
        match command {
            DrawCommand::DrawRect { tl, br, style } => {
                let color = parse_color(&style.color).mix(style.alpha.unwrap_or(1.0));
                self.root
                    .draw(&Rectangle::new([self.px(*tl), self.px(*br)], color.filled()))
                    .context("Failed to draw bar")?;
            }
            DrawCommand::DrawPath { points, style } => {
                let color = parse_color(&style.color).mix(style.alpha.unwrap_or(1.0));
                let width = self.len(style.width.unwrap_or(1.0)).round().max(1.0) as u32;
                let points: Vec<(i32, i32)> = points.iter().map(|&p| self.px(p)).collect();
                self.root
                    .draw(&PathElement::new(points, color.stroke_width(width)))
                    .context("Failed to draw path")?;
            }
            DrawCommand::DrawCircle { center, radius, style } => {
                let color = parse_color(&style.color).mix(style.alpha.unwrap_or(1.0));
                let radius = self.len(*radius).round() as i32;
                self.root
                    .draw(&Circle::new(self.px(*center), radius, color.filled()))
                    .context("Failed to draw marker")?;
            }
            DrawCommand::DrawText { text, pos, size, anchor, vertical } => {
                self.text(text, *pos, *size, *anchor, *vertical, false);
            }
        }
        Ok(())
    }

    fn axis(&self, axis: &Axis) -> Result<()> {
        let line = BLACK.stroke_width(1);
        let (a, b) = axis.extent;
        match axis.orientation {
            Orientation::Bottom => {
                let y = axis.offset;
                self.root
                    .draw(&PathElement::new(vec![self.px((a, y)), self.px((b, y))], line))
                    .context("Failed to draw axis")?;
                for tick in &axis.ticks {
                    self.root
                        .draw(&PathElement::new(
                            vec![self.px((tick.position, y)), self.px((tick.position, y + TICK_SIZE))],
                            line,
                        ))
                        .context("Failed to draw tick")?;
                    let anchor = if axis.rotate_labels { TextAnchor::End } else { TextAnchor::Middle };
                    self.text(&tick.label, (tick.position, y + TICK_SIZE + 3.0), TICK_LABEL_SIZE, anchor, axis.rotate_labels, false);
                }
            }
            Orientation::Left => {
                let x = axis.offset;
                self.root
                    .draw(&PathElement::new(vec![self.px((x, a)), self.px((x, b))], line))
                    .context("Failed to draw axis")?;
                for tick in &axis.ticks {
                    self.root
                        .draw(&PathElement::new(
                            vec![self.px((x - TICK_SIZE, tick.position)), self.px((x, tick.position))],
                            line,
                        ))
                        .context("Failed to draw tick")?;
                    self.text(&tick.label, (x - TICK_SIZE - 3.0, tick.position), TICK_LABEL_SIZE, TextAnchor::End, false, false);
                }
                if let Some(heading) = &axis.heading {
                    self.text(heading, (x, a.min(b) - 10.0), 12.0, TextAnchor::Middle, false, false);
                }
            }
        }
        Ok(())
    }

    fn title(&self, title: &Title) {
        if title.text.is_empty() {
            return;
        }
        self.text(&title.text, (title.x, title.y), title.font_size, TextAnchor::Middle, false, true);
    }

    /// Text needs a system font; without one the geometry is still drawn.
    fn text(&self, text: &str, pos: (f64, f64), size: f64, anchor: TextAnchor, vertical: bool, bold: bool) {
        let style = if bold { FontStyle::Bold } else { FontStyle::Normal };
        let mut font = FontDesc::new(FontFamily::SansSerif, self.len(size), style);
        if vertical {
            font = font.transform(FontTransform::Rotate270);
        }
        let h = match anchor {
            TextAnchor::Start => HPos::Left,
            TextAnchor::Middle => HPos::Center,
            TextAnchor::End => HPos::Right,
        };
        let text_style = TextStyle::from(font).color(&BLACK).pos(Pos::new(h, VPos::Center));

        if let Err(e) = self.root.draw(&Text::new(text.to_string(), self.px(pos), text_style)) {
            warn!("Skipping text '{}': {}", text, e);
        }
    }
}

/// Parse color string to RGBColor
pub fn parse_color(color_str: &Option<String>) -> RGBColor {
    match color_str.as_deref() {
        Some("steelblue") => RGBColor(70, 130, 180),
        Some("red") => RED,
        Some("green") => GREEN,
        Some("blue") => BLUE,
        Some("black") => BLACK,
        Some("gray") | Some("grey") => RGBColor(128, 128, 128),
        Some("white") => WHITE,
        Some(hex) if hex.len() == 7 && hex.starts_with('#') => parse_hex(&hex[1..]).unwrap_or(STEELBLUE),
        _ => STEELBLUE, // default
    }
}

const STEELBLUE: RGBColor = RGBColor(70, 130, 180);

fn parse_hex(hex: &str) -> Option<RGBColor> {
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    Some(RGBColor(channel(0)?, channel(2)?, channel(4)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{HitRegion, HitShape, Tick};

    fn sample_scene() -> Scene {
        let title = Title { text: "Sample".to_string(), font_size: 16.0, x: 100.0, y: 10.0 };
        let mut scene = Scene::new(200.0, 120.0, title);
        scene.axes.push(Axis {
            orientation: Orientation::Left,
            offset: 30.0,
            extent: (100.0, 20.0),
            ticks: vec![Tick { position: 100.0, label: "0".to_string() }],
            rotate_labels: false,
            heading: None,
        });
        scene.commands.push(DrawCommand::DrawRect {
            tl: (40.0, 40.0),
            br: (60.0, 100.0),
            style: BarStyle { color: Some("steelblue".to_string()), alpha: None },
        });
        scene.commands.push(DrawCommand::DrawPath {
            points: vec![(40.0, 90.0), (160.0, 30.0)],
            style: LineStyle { color: Some("red".to_string()), width: Some(2.0), alpha: Some(0.5) },
        });
        scene.commands.push(DrawCommand::DrawCircle {
            center: (160.0, 30.0),
            radius: 4.0,
            style: PointStyle::default(),
        });
        scene.hit_regions.push(HitRegion {
            shape: HitShape::Rect { tl: (40.0, 40.0), br: (60.0, 100.0) },
            detail: vec!["x".to_string()],
        });
        scene
    }

    #[test]
    fn test_render_png_magic() {
        let bytes = render_scene(&sample_scene(), &RenderOptions::default()).unwrap();
        assert!(bytes.len() > 8);
        assert_eq!(&bytes[0..8], &[137, 80, 78, 71, 13, 10, 26, 10]);
    }

    #[test]
    fn test_render_svg_contains_shapes() {
        let options = RenderOptions { format: OutputFormat::Svg, scale: 2.0 };
        let bytes = render_scene(&sample_scene(), &options).unwrap();
        let svg = String::from_utf8(bytes).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("width=\"400\""));
        assert!(svg.contains("<rect"));
        assert!(svg.contains("<circle"));
    }

    #[test]
    fn test_oversized_scale_is_an_error() {
        for format in [OutputFormat::Png, OutputFormat::Svg] {
            let huge = RenderOptions { format, scale: 100.0 };
            assert!(render_scene(&sample_scene(), &huge).is_err());
        }
        let infinite = RenderOptions { format: OutputFormat::Png, scale: f64::INFINITY };
        assert!(render_scene(&sample_scene(), &infinite).is_err());
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color(&Some("steelblue".to_string())), RGBColor(70, 130, 180));
        assert_eq!(parse_color(&Some("#ff0080".to_string())), RGBColor(255, 0, 128));
        assert_eq!(parse_color(&Some("#zz0080".to_string())), STEELBLUE);
        assert_eq!(parse_color(&None), STEELBLUE);
    }
}
