//! Coordinate scales used by the chart layouts.
//!
//! Semantics follow the usual visualization conventions: a linear scale maps
//! a numeric domain onto a pixel range and can be "niced" to round bounds; a
//! band scale divides a pixel range into equal slots for categories; a point
//! scale is a band scale with zero-width bands.

/// Continuous domain -> pixel range mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearScale {
    pub domain: (f64, f64),
    pub range: (f64, f64),
}

impl LinearScale {
    pub fn new(domain: (f64, f64), range: (f64, f64)) -> Self {
        Self { domain, range }
    }

    /// Scale over the finite extent of `values`; `(0, 0)` when none are finite.
    pub fn from_extent(values: impl IntoIterator<Item = f64>, range: (f64, f64)) -> Self {
        Self::new(extent(values).unwrap_or((0.0, 0.0)), range)
    }

    pub fn map(&self, value: f64) -> f64 {
        let (d0, d1) = self.domain;
        let (r0, r1) = self.range;
        let span = d1 - d0;
        // degenerate domains map everything to the middle of the range
        let t = if span == 0.0 { 0.5 } else { (value - d0) / span };
        r0 + t * (r1 - r0)
    }

    /// Extend the domain to round values for roughly `count` ticks.
    pub fn nice(mut self, count: usize) -> Self {
        let (mut start, mut stop) = self.domain;
        let reversed = stop < start;
        if reversed {
            std::mem::swap(&mut start, &mut stop);
        }

        let mut previous = None;
        for _ in 0..10 {
            let step = tick_increment(start, stop, count as f64);
            if Some(step) == previous {
                break;
            }
            if step > 0.0 {
                start = (start / step).floor() * step;
                stop = (stop / step).ceil() * step;
            } else if step < 0.0 {
                start = (start * step).ceil() / step;
                stop = (stop * step).floor() / step;
            } else {
                break;
            }
            previous = Some(step);
        }

        self.domain = if reversed { (stop, start) } else { (start, stop) };
        self
    }

    /// Round tick values spanning the domain.
    pub fn ticks(&self, count: usize) -> Vec<f64> {
        let (d0, d1) = self.domain;
        let (start, stop) = if d1 < d0 { (d1, d0) } else { (d0, d1) };
        if count == 0 || !start.is_finite() || !stop.is_finite() {
            return Vec::new();
        }
        if start == stop {
            return vec![start];
        }

        let step = tick_increment(start, stop, count as f64);
        if step == 0.0 || !step.is_finite() {
            return Vec::new();
        }

        let mut ticks = Vec::new();
        if step > 0.0 {
            let i0 = (start / step).ceil() as i64;
            let i1 = (stop / step).floor() as i64;
            for i in i0..=i1 {
                ticks.push(i as f64 * step);
            }
        } else {
            let inv = -step;
            let i0 = (start * inv).ceil() as i64;
            let i1 = (stop * inv).floor() as i64;
            for i in i0..=i1 {
                ticks.push(i as f64 / inv);
            }
        }
        ticks
    }
}

/// Tick step for `count` ticks over `[start, stop]`.
///
/// Positive results are the step itself; negative results encode `-1/step`
/// so sub-unit steps stay exact.
fn tick_increment(start: f64, stop: f64, count: f64) -> f64 {
    let e10 = 50f64.sqrt();
    let e5 = 10f64.sqrt();
    let e2 = 2f64.sqrt();

    let step = (stop - start) / count.max(0.0);
    if step <= 0.0 || !step.is_finite() {
        return 0.0;
    }
    let power = step.log10().floor();
    let error = step / 10f64.powf(power);
    let factor = if error >= e10 {
        10.0
    } else if error >= e5 {
        5.0
    } else if error >= e2 {
        2.0
    } else {
        1.0
    };

    if power >= 0.0 {
        factor * 10f64.powf(power)
    } else {
        -(10f64.powf(-power)) / factor
    }
}

/// Minimum and maximum of the finite values, if any.
pub fn extent(values: impl IntoIterator<Item = f64>) -> Option<(f64, f64)> {
    values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Ordinal categories -> equal-width pixel bands.
#[derive(Debug, Clone, PartialEq)]
pub struct BandScale {
    pub categories: Vec<String>,
    pub range: (f64, f64),
    pub padding_inner: f64,
    pub padding_outer: f64,
    step: f64,
    start: f64,
}

impl BandScale {
    pub fn new(categories: Vec<String>, range: (f64, f64)) -> Self {
        Self::with_padding(categories, range, 0.0, 0.0)
    }

    /// Same padding on the inside and outside of the bands.
    pub fn padded(categories: Vec<String>, range: (f64, f64), padding: f64) -> Self {
        Self::with_padding(categories, range, padding, padding)
    }

    pub fn with_padding(categories: Vec<String>, range: (f64, f64), padding_inner: f64, padding_outer: f64) -> Self {
        let n = categories.len() as f64;
        let (r0, r1) = range;
        let (lo, hi) = if r1 < r0 { (r1, r0) } else { (r0, r1) };

        let step = (hi - lo) / (n - padding_inner + padding_outer * 2.0).max(1.0);
        let start = lo + (hi - lo - step * (n - padding_inner)) * 0.5;

        Self {
            categories,
            range,
            padding_inner,
            padding_outer,
            step,
            start,
        }
    }

    /// Start of the band for `category`.
    pub fn position(&self, category: &str) -> Option<f64> {
        self.index_of(category).map(|i| self.position_at(i))
    }

    pub fn position_at(&self, index: usize) -> f64 {
        self.start + self.step * index as f64
    }

    pub fn index_of(&self, category: &str) -> Option<usize> {
        self.categories.iter().position(|c| c == category)
    }

    pub fn bandwidth(&self) -> f64 {
        self.step * (1.0 - self.padding_inner)
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    /// Center of the band for `category`.
    pub fn center(&self, category: &str) -> Option<f64> {
        self.position(category).map(|p| p + self.bandwidth() / 2.0)
    }
}

/// Ordinal categories -> evenly spaced points.
#[derive(Debug, Clone, PartialEq)]
pub struct PointScale {
    band: BandScale,
}

impl PointScale {
    pub fn new(categories: Vec<String>, range: (f64, f64)) -> Self {
        Self {
            band: BandScale::with_padding(categories, range, 1.0, 0.0),
        }
    }

    pub fn position(&self, category: &str) -> Option<f64> {
        self.band.position(category)
    }

    pub fn position_at(&self, index: usize) -> f64 {
        self.band.position_at(index)
    }

    pub fn categories(&self) -> &[String] {
        &self.band.categories
    }
}
