//! Monthly average sale price line chart.

use crate::aggregate::MonthlyTrend;
use crate::filter::FilterSelection;
use crate::graph::{LineStyle, PointStyle};
use crate::ir::{DrawCommand, HitRegion, HitShape, Scene, Title};
use crate::scale::{extent, BandScale, LinearScale};

use super::{axis_label, bottom_band_axis, defined_segments, format_price, left_axis, region_suffix, selected, title_font_size, Margin};

pub const WIDTH: f64 = 500.0;
pub const HEIGHT: f64 = 400.0;
pub const MARGIN: Margin = Margin {
    top: 40.0,
    right: 30.0,
    bottom: 70.0,
    left: 70.0,
};
const Y_TICKS: usize = 6;
const MARKER_RADIUS: f64 = 4.0;
const TITLE_THRESHOLD: usize = 40;

pub fn title(selection: &FilterSelection) -> String {
    let subject = match (selected(&selection.make), selected(&selection.body)) {
        (None, None) => "All Cars".to_string(),
        (None, Some(body)) => format!("All {}", body),
        (Some(make), None) => format!("{} Cars", make),
        (Some(make), Some(body)) => format!("{} {}", make, body),
    };
    format!(
        "Monthly Average Sale Price Trend of {}{}",
        subject,
        region_suffix(&selection.state)
    )
}

pub fn detail(row: &MonthlyTrend) -> Vec<String> {
    vec![
        format!("Month: {}", row.month),
        format!("Sales: {}", row.sales_count),
        format!("Avg Price: {}", format_price(row.avg_price)),
        format!("Price Std Dev: {}", format_price(row.std_dev)),
    ]
}

pub fn layout(rows: &[MonthlyTrend], selection: &FilterSelection) -> Scene {
    let text = title(selection);
    let title = Title {
        font_size: title_font_size(&text, TITLE_THRESHOLD),
        text,
        x: WIDTH / 2.0,
        y: MARGIN.top / 2.0,
    };
    let mut scene = Scene::new(WIDTH, HEIGHT, title);
    let baseline = HEIGHT - MARGIN.bottom;

    let x = BandScale::new(
        rows.iter().map(|r| r.month.clone()).collect(),
        (MARGIN.left, WIDTH - MARGIN.right),
    );
    let max_avg = extent(rows.iter().map(|r| r.avg_price))
        .map(|(_, hi)| hi.max(0.0))
        .unwrap_or(0.0);
    let y = LinearScale::new((0.0, max_avg), (baseline, MARGIN.top)).nice(10);

    let points: Vec<Option<(f64, f64)>> = rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let cx = x.position_at(i) + x.bandwidth() / 2.0;
            row.avg_price.is_finite().then(|| (cx, y.map(row.avg_price)))
        })
        .collect();

    for segment in defined_segments(points.iter().copied()) {
        scene.commands.push(DrawCommand::DrawPath {
            points: segment,
            style: LineStyle {
                color: Some("steelblue".to_string()),
                width: Some(2.0),
                alpha: None,
            },
        });
    }

    for (row, point) in rows.iter().zip(&points) {
        let Some(center) = *point else { continue };
        scene.commands.push(DrawCommand::DrawCircle {
            center,
            radius: MARKER_RADIUS,
            style: PointStyle {
                color: Some("steelblue".to_string()),
                alpha: None,
            },
        });
        scene.hit_regions.push(HitRegion {
            shape: HitShape::Circle {
                center,
                radius: MARKER_RADIUS,
            },
            detail: detail(row),
        });
    }

    scene.axes.push(bottom_band_axis(&x, baseline, true));
    scene.axes.push(left_axis(&y, Y_TICKS, MARGIN.left, None));
    scene.commands.push(axis_label("Month", (WIDTH / 2.0, HEIGHT - 10.0), false));
    scene.commands.push(axis_label("Average Sale Price", (20.0, HEIGHT / 2.0), true));

    scene
}
