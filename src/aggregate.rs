//! Aggregation engine.
//!
//! Pure transforms from `(records, selection)` to the rows each chart draws.
//! Nothing here keeps state between calls.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::HashMap;

use crate::data::Record;
use crate::filter::{is_all, FilterSelection};

/// Maximum number of models in the ranked aggregation.
pub const TOP_MODELS: usize = 10;

/// One bar of the ranked model chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSales {
    pub model: String,
    pub make: String,
    pub body: String,
    pub count: usize,
    pub avg_price: f64,
}

/// One month of the price trend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyTrend {
    /// `YYYY-MM`
    pub month: String,
    pub avg_price: f64,
    pub sales_count: usize,
    pub std_dev: f64,
}

/// How finely the dimension aggregation groups records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Granularity {
    Make,
    BodyType,
    Vehicle,
}

impl Granularity {
    pub fn for_selection(selection: &FilterSelection) -> Self {
        if is_all(&selection.make) {
            Granularity::Make
        } else if is_all(&selection.body) {
            Granularity::BodyType
        } else {
            Granularity::Vehicle
        }
    }
}

/// One polyline of the parallel-coordinates plot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DimensionTuple {
    /// Group key: a make, a body type, or a VIN.
    pub label: String,
    pub make: String,
    pub body: String,
    pub year: f64,
    pub odometer: f64,
    pub mmr: f64,
    pub selling_price: f64,
    pub condition: f64,
    /// Records collapsed into this tuple.
    pub count: usize,
}

/// All three chart datasets for one selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregates {
    pub selection: FilterSelection,
    pub models: Vec<ModelSales>,
    pub trend: Vec<MonthlyTrend>,
    pub granularity: Granularity,
    pub dimensions: Vec<DimensionTuple>,
}

impl Aggregates {
    pub fn compute(records: &[Record], selection: &FilterSelection) -> Self {
        Self {
            selection: selection.clone(),
            models: ranked_models(records, selection),
            trend: monthly_trend(records, selection),
            granularity: Granularity::for_selection(selection),
            dimensions: dimensions(records, selection),
        }
    }
}

fn filtered<'a>(records: &'a [Record], selection: &'a FilterSelection) -> impl Iterator<Item = &'a Record> + 'a {
    records.iter().filter(move |r| selection.matches(r))
}

/// Group records by key, preserving first-appearance order of keys.
fn group_by<'a, F>(records: impl Iterator<Item = &'a Record>, key: F) -> Vec<(String, Vec<&'a Record>)>
where
    F: Fn(&Record) -> &str,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<&'a Record>)> = Vec::new();

    for record in records {
        let k = key(record);
        match index.get(k) {
            Some(&idx) => groups[idx].1.push(record),
            None => {
                index.insert(k.to_string(), groups.len());
                groups.push((k.to_string(), vec![record]));
            }
        }
    }

    groups
}

// =============================================================================
// Statistics
// =============================================================================

/// Arithmetic mean; 0 for an empty slice. NaN inputs propagate.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator); 0 below two values.
pub fn sample_std_dev(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1) as f64;
    variance.sqrt()
}

fn mean_of(group: &[&Record], field: fn(&Record) -> f64) -> f64 {
    let values: Vec<f64> = group.iter().map(|r| field(r)).collect();
    mean(&values)
}

// =============================================================================
// (a) Ranked models
// =============================================================================

/// Top models by sales count for the selection.
pub fn ranked_models(records: &[Record], selection: &FilterSelection) -> Vec<ModelSales> {
    let mut rows: Vec<ModelSales> = group_by(filtered(records, selection), |r| &r.model)
        .into_iter()
        .map(|(model, group)| ModelSales {
            make: group[0].make.clone(),
            body: group[0].body.clone(),
            count: group.len(),
            avg_price: mean_of(&group, |r| r.selling_price),
            model,
        })
        .collect();

    // stable: ties keep first-appearance order
    rows.sort_by(|a, b| b.count.cmp(&a.count));
    rows.truncate(TOP_MODELS);
    rows
}

// =============================================================================
// (b) Monthly trend
// =============================================================================

/// Average price per month, gap-filled to a contiguous month range.
pub fn monthly_trend(records: &[Record], selection: &FilterSelection) -> Vec<MonthlyTrend> {
    let mut observed: Vec<MonthlyTrend> = group_by(filtered(records, selection), |r| r.sale_month())
        .into_iter()
        .map(|(month, group)| {
            let prices: Vec<f64> = group.iter().map(|r| r.selling_price).collect();
            MonthlyTrend {
                month,
                avg_price: mean(&prices),
                sales_count: prices.len(),
                std_dev: sample_std_dev(&prices),
            }
        })
        .collect();

    // YYYY-MM sorts chronologically as text
    observed.sort_by(|a, b| a.month.cmp(&b.month));
    fill_missing_months(observed)
}

fn fill_missing_months(observed: Vec<MonthlyTrend>) -> Vec<MonthlyTrend> {
    let (Some(first), Some(last)) = (observed.first(), observed.last()) else {
        return observed;
    };
    let (Some(start), Some(end)) = (parse_month(&first.month), parse_month(&last.month)) else {
        return observed;
    };

    let mut by_month: HashMap<String, MonthlyTrend> =
        observed.into_iter().map(|m| (m.month.clone(), m)).collect();

    let mut filled = Vec::new();
    let mut current = start;
    while current <= end {
        let key = current.format("%Y-%m").to_string();
        let entry = by_month.remove(&key).unwrap_or_else(|| MonthlyTrend {
            month: key,
            avg_price: 0.0,
            sales_count: 0,
            std_dev: 0.0,
        });
        filled.push(entry);
        current = next_month(current);
    }
    filled
}

fn parse_month(month: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{}-01", month), "%Y-%m-%d").ok()
}

fn next_month(day: NaiveDate) -> NaiveDate {
    let (year, month) = if day.month() == 12 {
        (day.year() + 1, 1)
    } else {
        (day.year(), day.month() + 1)
    };
    // day 1 of a valid month always exists
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MAX)
}

// =============================================================================
// (c) Dimensions
// =============================================================================

/// Tuples for the parallel-coordinates plot at the selection's granularity.
pub fn dimensions(records: &[Record], selection: &FilterSelection) -> Vec<DimensionTuple> {
    let rows = filtered(records, selection);

    match Granularity::for_selection(selection) {
        Granularity::Make => group_by(rows, |r| &r.make)
            .into_iter()
            .map(|(make, group)| collapse(make.clone(), make, group[0].body.clone(), &group))
            .collect(),
        Granularity::BodyType => group_by(rows, |r| &r.body)
            .into_iter()
            .map(|(body, group)| collapse(body.clone(), group[0].make.clone(), body, &group))
            .collect(),
        Granularity::Vehicle => rows
            .map(|r| DimensionTuple {
                label: r.vin.clone(),
                make: r.make.clone(),
                body: r.body.clone(),
                year: r.year,
                odometer: r.odometer,
                mmr: r.mmr,
                selling_price: r.selling_price,
                condition: r.condition,
                count: 1,
            })
            .collect(),
    }
}

fn collapse(label: String, make: String, body: String, group: &[&Record]) -> DimensionTuple {
    DimensionTuple {
        label,
        make,
        body,
        year: mean_of(group, |r| r.year),
        odometer: mean_of(group, |r| r.odometer),
        mmr: mean_of(group, |r| r.mmr),
        selling_price: mean_of(group, |r| r.selling_price),
        condition: mean_of(group, |r| r.condition),
        count: group.len(),
    }
}
