//! Ranked bar chart of the top models by sales count.

use crate::aggregate::{ModelSales, TOP_MODELS};
use crate::filter::FilterSelection;
use crate::graph::BarStyle;
use crate::ir::{DrawCommand, HitRegion, HitShape, Scene, Title};
use crate::scale::{BandScale, LinearScale};

use super::{axis_label, bottom_band_axis, format_price, join_words, left_axis, region_suffix, selected, title_font_size, Margin};

pub const WIDTH: f64 = 500.0;
const PLOT_HEIGHT: f64 = 400.0;
const BAND_PADDING: f64 = 0.1;
const TITLE_THRESHOLD: usize = 36;
/// Approximate pixel width of one tick-label character.
const CHAR_WIDTH: f64 = 6.0;

/// Bottom margin grows with the longest model label, capped at 100.
pub fn margin(rows: &[ModelSales]) -> Margin {
    let longest = rows.iter().map(|r| r.model.chars().count()).max().unwrap_or(0);
    Margin {
        top: 40.0,
        right: 30.0,
        bottom: (60.0 + longest as f64 * CHAR_WIDTH).min(100.0),
        left: 80.0,
    }
}

pub fn title(selection: &FilterSelection) -> String {
    let head = join_words([
        Some("Top"),
        selected(&selection.make),
        selected(&selection.body),
        Some("Models by Sales Count"),
    ]);
    format!("{}{} (Max {})", head, region_suffix(&selection.state), TOP_MODELS)
}

/// Tooltip lines for one bar.
pub fn detail(row: &ModelSales) -> Vec<String> {
    vec![
        format!("Make: {}", row.make),
        format!("Model: {}", row.model),
        format!("Body Type: {}", row.body),
        format!("Sales: {}", row.count),
        format!("Avg Price: {}", format_price(row.avg_price)),
    ]
}

pub fn layout(rows: &[ModelSales], selection: &FilterSelection) -> Scene {
    let margin = margin(rows);
    let height = PLOT_HEIGHT + margin.bottom;
    let baseline = height - margin.bottom;

    let text = title(selection);
    let title = Title {
        font_size: title_font_size(&text, TITLE_THRESHOLD),
        text,
        x: WIDTH / 2.0,
        y: margin.top / 2.0,
    };
    let mut scene = Scene::new(WIDTH, height, title);

    let x = BandScale::padded(
        rows.iter().map(|r| r.model.clone()).collect(),
        (margin.left, WIDTH - margin.right),
        BAND_PADDING,
    );
    let max_count = rows.iter().map(|r| r.count).max().unwrap_or(0) as f64;
    let y = LinearScale::new((0.0, max_count), (baseline, margin.top)).nice(10);

    for (i, row) in rows.iter().enumerate() {
        let x0 = x.position_at(i);
        let tl = (x0, y.map(row.count as f64));
        let br = (x0 + x.bandwidth(), y.map(0.0));
        scene.commands.push(DrawCommand::DrawRect {
            tl,
            br,
            style: BarStyle {
                color: Some("steelblue".to_string()),
                alpha: None,
            },
        });
        scene.hit_regions.push(HitRegion {
            shape: HitShape::Rect { tl, br },
            detail: detail(row),
        });

        // the rotated tick label under the bar shows the same detail
        let center = x0 + x.bandwidth() / 2.0;
        let label_len = row.model.chars().count() as f64 * CHAR_WIDTH;
        scene.hit_regions.push(HitRegion {
            shape: HitShape::Rect {
                tl: (center - CHAR_WIDTH, baseline + 6.0),
                br: (center + CHAR_WIDTH, baseline + 9.0 + label_len),
            },
            detail: detail(row),
        });
    }

    scene.axes.push(bottom_band_axis(&x, baseline, true));
    scene.axes.push(left_axis(&y, 10, margin.left, None));
    scene.commands.push(axis_label("Car Models", (WIDTH / 2.0, height - 30.0), false));
    scene.commands.push(axis_label("Number of Sales", (20.0, height / 2.0), true));

    scene
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::ALL;

    fn row(model: &str, count: usize) -> ModelSales {
        ModelSales {
            model: model.to_string(),
            make: "BMW".to_string(),
            body: "SUV".to_string(),
            count,
            avg_price: 31000.0,
        }
    }

    #[test]
    fn test_title_variants() {
        assert_eq!(title(&FilterSelection::default()), "Top Models by Sales Count (Max 10)");
        assert_eq!(
            title(&FilterSelection::new("BMW", "SUV", "CA")),
            "Top BMW SUV Models by Sales Count in CA (Max 10)"
        );
        assert_eq!(
            title(&FilterSelection::new(ALL, "SEDAN", ALL)),
            "Top SEDAN Models by Sales Count (Max 10)"
        );
    }

    #[test]
    fn test_margin_tracks_label_length() {
        assert_eq!(margin(&[row("X5", 1)]).bottom, 72.0);
        assert_eq!(margin(&[row("GRAND CHEROKEE", 1)]).bottom, 100.0);
        assert_eq!(margin(&[]).bottom, 60.0);
    }

    #[test]
    fn test_layout_bars() {
        let rows = vec![row("X5", 4), row("X3", 2)];
        let scene = layout(&rows, &FilterSelection::default());

        assert_eq!(scene.width, 500.0);
        assert_eq!(scene.height, 472.0);
        assert_eq!(scene.title.font_size, 16.0);

        let bars: Vec<_> = scene
            .commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::DrawRect { tl, br, .. } => Some((*tl, *br)),
                _ => None,
            })
            .collect();
        assert_eq!(bars.len(), 2);
        // tallest bar reaches the top margin, half-height bar sits halfway
        assert_eq!(bars[0].0 .1, 40.0);
        assert_eq!(bars[0].1 .1, 400.0);
        assert_eq!(bars[1].0 .1, 220.0);
        assert!(bars[0].0 .0 > 80.0);
        assert!(bars[1].1 .0 < 470.0);
    }

    #[test]
    fn test_hover_covers_bars_and_labels() {
        let rows = vec![row("X5", 2)];
        let scene = layout(&rows, &FilterSelection::default());
        assert_eq!(scene.hit_regions.len(), 2);

        let (cx, _) = match &scene.hit_regions[0].shape {
            HitShape::Rect { tl, br } => ((tl.0 + br.0) / 2.0, 0.0),
            other => panic!("unexpected shape {:?}", other),
        };
        let over_bar = scene.hit(cx, 200.0).unwrap();
        assert_eq!(
            over_bar.detail,
            vec!["Make: BMW", "Model: X5", "Body Type: SUV", "Sales: 2", "Avg Price: $31000.00"]
        );
        let over_label = scene.hit(cx, 415.0).unwrap();
        assert_eq!(over_label.detail, over_bar.detail);
    }

    #[test]
    fn test_empty_rows_render_axes_only() {
        let scene = layout(&[], &FilterSelection::default());
        assert!(scene.hit_regions.is_empty());
        assert_eq!(scene.axes.len(), 2);
        assert!(scene.axes[0].ticks.is_empty());
    }
}
