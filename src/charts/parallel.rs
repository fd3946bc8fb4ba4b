//! Parallel-coordinates plot over year, odometer, MMR and selling price.

use crate::aggregate::{DimensionTuple, Granularity};
use crate::filter::FilterSelection;
use crate::graph::LineStyle;
use crate::ir::{DrawCommand, HitRegion, HitShape, Scene, Title};
use crate::scale::{LinearScale, PointScale};

use super::{defined_segments, format_value, join_words, left_axis, region_suffix, selected, title_font_size, Margin};

pub const WIDTH: f64 = 700.0;
pub const HEIGHT: f64 = 400.0;
pub const MARGIN: Margin = Margin {
    top: 30.0,
    right: 30.0,
    bottom: 30.0,
    left: 50.0,
};
const TITLE_THRESHOLD: usize = 48;
const HOVER_TOLERANCE: f64 = 3.0;
/// Faintest stroke, so poor-condition vehicles stay visible.
pub const MIN_OPACITY: f64 = 0.05;

/// Plotted dimensions, left to right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Year,
    Odometer,
    Mmr,
    SellingPrice,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [
        Dimension::Year,
        Dimension::Odometer,
        Dimension::Mmr,
        Dimension::SellingPrice,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Dimension::Year => "year",
            Dimension::Odometer => "odometer",
            Dimension::Mmr => "mmr",
            Dimension::SellingPrice => "sellingprice",
        }
    }

    /// Axis heading: the key with its first letter capitalized.
    pub fn heading(&self) -> String {
        let key = self.key();
        let mut chars = key.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    pub fn value(&self, tuple: &DimensionTuple) -> f64 {
        match self {
            Dimension::Year => tuple.year,
            Dimension::Odometer => tuple.odometer,
            Dimension::Mmr => tuple.mmr,
            Dimension::SellingPrice => tuple.selling_price,
        }
    }
}

fn granularity_label(granularity: Granularity) -> &'static str {
    match granularity {
        Granularity::Make => "Make",
        Granularity::BodyType => "Body Type",
        Granularity::Vehicle => "Vehicle",
    }
}

pub fn title(granularity: Granularity, selection: &FilterSelection) -> String {
    let scope = join_words([selected(&selection.make), selected(&selection.body)]);
    let scope = if scope.is_empty() {
        scope
    } else {
        format!(" ({})", scope)
    };
    format!(
        "Vehicle Dimensions by {}{}{}",
        granularity_label(granularity),
        scope,
        region_suffix(&selection.state)
    )
}

/// Stroke opacity from vehicle condition on a 0-5 scale.
pub fn opacity(condition: f64) -> f64 {
    if condition.is_finite() {
        (condition / 5.0).clamp(MIN_OPACITY, 1.0)
    } else {
        MIN_OPACITY
    }
}

pub fn detail(tuple: &DimensionTuple, granularity: Granularity) -> Vec<String> {
    let key = match granularity {
        Granularity::Make => "Make",
        Granularity::BodyType => "Body Type",
        Granularity::Vehicle => "VIN",
    };
    let mut lines = vec![format!("{}: {}", key, tuple.label)];
    if tuple.count > 1 {
        lines.push(format!("Vehicles: {}", tuple.count));
    }
    lines.extend([
        format!("Condition: {}", format_value(tuple.condition)),
        format!("Year: {}", format_value(tuple.year)),
        format!("Odometer: {}", format_value(tuple.odometer)),
        format!("MMR: {}", format_value(tuple.mmr)),
        format!("Sale Price: {}", format_value(tuple.selling_price)),
    ]);
    lines
}

pub fn layout(tuples: &[DimensionTuple], granularity: Granularity, selection: &FilterSelection) -> Scene {
    let text = title(granularity, selection);
    let title = Title {
        font_size: title_font_size(&text, TITLE_THRESHOLD),
        text,
        x: WIDTH / 2.0,
        y: MARGIN.top / 2.0 - 4.0,
    };
    let mut scene = Scene::new(WIDTH, HEIGHT, title);

    let x = PointScale::new(
        Dimension::ALL.iter().map(|d| d.key().to_string()).collect(),
        (MARGIN.left, WIDTH - MARGIN.right),
    );
    let y_range = (HEIGHT - MARGIN.bottom, MARGIN.top);
    let y_scales: Vec<LinearScale> = Dimension::ALL
        .iter()
        .map(|d| LinearScale::from_extent(tuples.iter().map(|t| d.value(t)), y_range))
        .collect();

    for tuple in tuples {
        let points = Dimension::ALL.iter().zip(&y_scales).enumerate().map(|(i, (d, y))| {
            let v = d.value(tuple);
            v.is_finite().then(|| (x.position_at(i), y.map(v)))
        });
        let segments = defined_segments(points);
        let alpha = opacity(tuple.condition);

        for segment in segments {
            scene.commands.push(DrawCommand::DrawPath {
                points: segment.clone(),
                style: LineStyle {
                    color: Some("red".to_string()),
                    width: Some(1.0),
                    alpha: Some(alpha),
                },
            });
            scene.hit_regions.push(HitRegion {
                shape: HitShape::Polyline {
                    points: segment,
                    tolerance: HOVER_TOLERANCE,
                },
                detail: detail(tuple, granularity),
            });
        }
    }

    for (i, (dimension, y)) in Dimension::ALL.iter().zip(&y_scales).enumerate() {
        scene
            .axes
            .push(left_axis(y, 10, x.position_at(i), Some(dimension.heading())));
    }

    scene
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::ALL;

    fn tuple(label: &str, year: f64, odometer: f64, price: f64, condition: f64) -> DimensionTuple {
        DimensionTuple {
            label: label.to_string(),
            make: "BMW".to_string(),
            body: "SUV".to_string(),
            year,
            odometer,
            mmr: price,
            selling_price: price,
            condition,
            count: 1,
        }
    }

    #[test]
    fn test_opacity_clamped() {
        assert_eq!(opacity(2.5), 0.5);
        assert_eq!(opacity(45.0), 1.0);
        assert_eq!(opacity(0.0), MIN_OPACITY);
        assert_eq!(opacity(f64::NAN), MIN_OPACITY);
    }

    #[test]
    fn test_titles() {
        assert_eq!(
            title(Granularity::Make, &FilterSelection::default()),
            "Vehicle Dimensions by Make"
        );
        assert_eq!(
            title(Granularity::BodyType, &FilterSelection::new("BMW", ALL, "CA")),
            "Vehicle Dimensions by Body Type (BMW) in CA"
        );
        assert_eq!(
            title(Granularity::Vehicle, &FilterSelection::new("BMW", "SUV", ALL)),
            "Vehicle Dimensions by Vehicle (BMW SUV)"
        );
    }

    #[test]
    fn test_headings() {
        let headings: Vec<String> = Dimension::ALL.iter().map(|d| d.heading()).collect();
        assert_eq!(headings, vec!["Year", "Odometer", "Mmr", "Sellingprice"]);
    }

    #[test]
    fn test_layout_polylines() {
        let tuples = vec![
            tuple("A", 2010.0, 50000.0, 10000.0, 2.5),
            tuple("B", 2014.0, 10000.0, 30000.0, 5.0),
        ];
        let scene = layout(&tuples, Granularity::Vehicle, &FilterSelection::new("BMW", "SUV", ALL));
        assert_eq!(scene.axes.len(), 4);
        assert_eq!(scene.axes[0].heading.as_deref(), Some("Year"));

        let paths: Vec<(&Vec<(f64, f64)>, &LineStyle)> = scene
            .commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::DrawPath { points, style } => Some((points, style)),
                _ => None,
            })
            .collect();
        assert_eq!(paths.len(), 2);
        // A has the lowest year (bottom) and the highest odometer (top)
        let (x0, y0) = paths[0].0[0];
        assert!((x0 - 50.0).abs() < 1e-9);
        assert_eq!(y0, 370.0);
        assert_eq!(paths[0].0[1].1, 30.0);
        assert_eq!(paths[0].1.alpha, Some(0.5));
        let (x3, y3) = paths[1].0[3];
        assert!((x3 - 670.0).abs() < 1e-9);
        assert_eq!(y3, 30.0);
    }

    #[test]
    fn test_nan_breaks_polyline() {
        let tuples = vec![
            tuple("A", 2010.0, f64::NAN, 10000.0, 3.0),
            tuple("B", 2012.0, 20000.0, 20000.0, 3.0),
        ];
        let scene = layout(&tuples, Granularity::Make, &FilterSelection::default());
        let paths = scene
            .commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::DrawPath { .. }))
            .count();
        // year alone, then mmr..sellingprice, then B whole
        assert_eq!(paths, 3);
    }

    #[test]
    fn test_hover_detail() {
        let tuples = vec![tuple("1HGCM82633A004352", 2014.0, 12000.0, 25500.5, 4.0)];
        let scene = layout(&tuples, Granularity::Vehicle, &FilterSelection::new("BMW", "SUV", ALL));
        // single tuple: every axis maps the value to its midpoint
        let hit = scene.hit(300.0, 200.0).unwrap();
        assert_eq!(
            hit.detail,
            vec![
                "VIN: 1HGCM82633A004352",
                "Condition: 4",
                "Year: 2014",
                "Odometer: 12000",
                "MMR: 25500.50",
                "Sale Price: 25500.50",
            ]
        );
    }

    #[test]
    fn test_empty_tuples_draw_axes() {
        let scene = layout(&[], Granularity::Make, &FilterSelection::default());
        assert!(scene.commands.is_empty());
        assert_eq!(scene.axes.len(), 4);
    }
}
