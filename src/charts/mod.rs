//! Chart layouts: aggregated rows in, [`Scene`]s out.
//!
//! Each chart module owns its canvas geometry and title rules. Shared pieces
//! (axis construction, tick formatting, title assembly) live here.

pub mod bar;
pub mod parallel;
pub mod trend;

use std::fmt;
use std::str::FromStr;

use crate::aggregate::Aggregates;
use crate::error::DashboardError;
use crate::filter::is_all;
use crate::ir::{Axis, DrawCommand, Orientation, Scene, TextAnchor, Tick};
use crate::scale::{BandScale, LinearScale};

/// The three coordinated views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChartKind {
    Bar,
    Trend,
    Parallel,
}

impl ChartKind {
    pub const ALL: [ChartKind; 3] = [ChartKind::Bar, ChartKind::Trend, ChartKind::Parallel];

    /// File stem used when a chart is written to disk.
    pub fn file_stem(&self) -> &'static str {
        match self {
            ChartKind::Bar => "bar",
            ChartKind::Trend => "trend",
            ChartKind::Parallel => "parallel",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_stem())
    }
}

impl FromStr for ChartKind {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bar" => Ok(ChartKind::Bar),
            "trend" | "line" => Ok(ChartKind::Trend),
            "parallel" | "pcp" => Ok(ChartKind::Parallel),
            _ => Err(DashboardError::UnknownChart(s.to_string())),
        }
    }
}

/// Lay out one chart from a precomputed aggregation bundle.
pub fn build(kind: ChartKind, aggregates: &Aggregates) -> Scene {
    match kind {
        ChartKind::Bar => bar::layout(&aggregates.models, &aggregates.selection),
        ChartKind::Trend => trend::layout(&aggregates.trend, &aggregates.selection),
        ChartKind::Parallel => parallel::layout(&aggregates.dimensions, aggregates.granularity, &aggregates.selection),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margin {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

const AXIS_LABEL_SIZE: f64 = 14.0;

// =============================================================================
// Titles
// =============================================================================

/// The selected value, or `None` for the `ALL` sentinel.
pub(crate) fn selected(value: &str) -> Option<&str> {
    if is_all(value) {
        None
    } else {
        Some(value)
    }
}

/// Join the non-empty parts with single spaces.
pub(crate) fn join_words<'a>(parts: impl IntoIterator<Item = Option<&'a str>>) -> String {
    parts
        .into_iter()
        .flatten()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Region suffix appended to every title when a state is selected.
pub(crate) fn region_suffix(state: &str) -> String {
    selected(state).map(|s| format!(" in {}", s)).unwrap_or_default()
}

/// Long titles drop to the small font.
pub(crate) fn title_font_size(title: &str, threshold: usize) -> f64 {
    if title.chars().count() > threshold {
        12.0
    } else {
        16.0
    }
}

// =============================================================================
// Number formatting
// =============================================================================

/// Group an already-rounded decimal string's integer digits by thousands.
fn group_thousands(digits: &str) -> String {
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (digits, None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    match frac_part {
        Some(f) => format!("{}.{}", grouped, f),
        None => grouped,
    }
}

/// Tick label with just enough decimals for `step`, grouped by thousands.
pub(crate) fn format_tick(value: f64, step: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let decimals = if step > 0.0 && step < 1.0 {
        // tolerance absorbs steps like 0.09999999999999998 from tick differences
        (-step.log10() - 1e-6).ceil().max(0.0) as usize
    } else {
        0
    };
    let text = format!("{:.*}", decimals, value.abs());
    let sign = if value < 0.0 && text.chars().any(|c| c != '0' && c != '.') { "-" } else { "" };
    format!("{}{}", sign, group_thousands(&text))
}

/// Currency with two decimals, no grouping: `$31000.00`.
pub fn format_price(value: f64) -> String {
    format!("${:.2}", value)
}

/// Whole numbers without decimals, everything else with two.
pub fn format_value(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.0}", value)
    } else if value.is_finite() {
        format!("{:.2}", value)
    } else {
        value.to_string()
    }
}

// =============================================================================
// Axes and labels
// =============================================================================

/// Vertical axis with formatted round ticks.
pub(crate) fn left_axis(scale: &LinearScale, count: usize, x: f64, heading: Option<String>) -> Axis {
    let values = scale.ticks(count);
    let step = match values.as_slice() {
        [a, b, ..] => b - a,
        _ => 1.0,
    };
    Axis {
        orientation: Orientation::Left,
        offset: x,
        extent: scale.range,
        ticks: values
            .iter()
            .map(|&v| Tick {
                position: scale.map(v),
                label: format_tick(v, step),
            })
            .collect(),
        rotate_labels: false,
        heading,
    }
}

/// Horizontal axis with one tick per band, at the band center.
pub(crate) fn bottom_band_axis(scale: &BandScale, y: f64, rotate_labels: bool) -> Axis {
    Axis {
        orientation: Orientation::Bottom,
        offset: y,
        extent: scale.range,
        ticks: scale
            .categories
            .iter()
            .enumerate()
            .map(|(i, c)| Tick {
                position: scale.position_at(i) + scale.bandwidth() / 2.0,
                label: c.clone(),
            })
            .collect(),
        rotate_labels,
        heading: None,
    }
}

pub(crate) fn axis_label(text: &str, pos: (f64, f64), vertical: bool) -> DrawCommand {
    DrawCommand::DrawText {
        text: text.to_string(),
        pos,
        size: AXIS_LABEL_SIZE,
        anchor: TextAnchor::Middle,
        vertical,
    }
}

/// Split a polyline wherever a point is undefined.
pub(crate) fn defined_segments(points: impl IntoIterator<Item = Option<(f64, f64)>>) -> Vec<Vec<(f64, f64)>> {
    let mut segments = Vec::new();
    let mut current = Vec::new();
    for point in points {
        match point {
            Some(p) => current.push(p),
            None if !current.is_empty() => segments.push(std::mem::take(&mut current)),
            None => {}
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}
