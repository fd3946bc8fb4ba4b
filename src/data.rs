//! Record loading.
//!
//! Reads the car-sales CSV into normalized [`Record`]s. Rows with a missing
//! field, an unparseable sale date, or a sale date outside the dashboard
//! window are dropped here and never reach the rest of the pipeline.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, error, info};

use crate::error::DashboardError;

/// First sale day kept by the loader (inclusive).
pub const WINDOW_START: &str = "2014-11-01";
/// Last sale day kept by the loader (inclusive).
pub const WINDOW_END: &str = "2015-08-31";

/// Columns every input file must carry, in canonical order.
pub const REQUIRED_COLUMNS: [&str; 16] = [
    "year",
    "make",
    "model",
    "trim",
    "body",
    "transmission",
    "vin",
    "state",
    "condition",
    "odometer",
    "color",
    "interior",
    "seller",
    "mmr",
    "sellingprice",
    "saledate",
];

/// One normalized sale transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub year: f64,
    pub make: String,
    pub model: String,
    pub trim: String,
    pub body: String,
    pub transmission: String,
    pub vin: String,
    pub state: String,
    pub condition: f64,
    pub odometer: f64,
    pub color: String,
    pub interior: String,
    pub seller: String,
    pub mmr: f64,
    pub selling_price: f64,
    /// Canonical `YYYY-MM-DD` sale day.
    pub sale_date: String,
}

impl Record {
    /// `YYYY-MM` bucket of the sale date.
    pub fn sale_month(&self) -> &str {
        self.sale_date.get(..7).unwrap_or(&self.sale_date)
    }
}

/// How text in numeric columns is coerced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum NumericPolicy {
    /// Unparseable numbers become NaN and the row is kept.
    #[serde(rename = "permissive")]
    #[default]
    Permissive,
    /// Unparseable numbers reject the row.
    #[serde(rename = "strict")]
    Strict,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    pub numeric: NumericPolicy,
}

/// Outcome of parsing one CSV source.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub records: Vec<Record>,
    pub rows_read: usize,
    pub rows_rejected: usize,
}

/// Load records from a CSV file.
///
/// Never fails: an unreadable or malformed source is logged and yields an
/// empty record set.
pub fn load_records(path: &Path, options: LoadOptions) -> Vec<Record> {
    let result = File::open(path)
        .with_context(|| format!("Failed to open data source {}", path.display()))
        .and_then(|file| parse_records(file, options));

    match result {
        Ok(report) => {
            info!(
                source = %path.display(),
                kept = report.records.len(),
                read = report.rows_read,
                rejected = report.rows_rejected,
                "loaded sale records"
            );
            report.records
        }
        Err(e) => {
            error!(source = %path.display(), "Error loading CSV data: {:#}", e);
            Vec::new()
        }
    }
}

/// Parse and validate records from any CSV reader.
pub fn parse_records<R: Read>(reader: R, options: LoadOptions) -> Result<LoadReport> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .byte_headers()
        .context("Failed to read CSV header")?
        .iter()
        .map(|h| String::from_utf8_lossy(h).trim().to_string())
        .collect();
    let columns = ColumnMap::resolve(&headers)?;

    let mut report = LoadReport::default();
    for (row_idx, result) in reader.byte_records().enumerate() {
        // +2: 1-indexed plus the header row
        let line = row_idx + 2;
        let bytes = result.with_context(|| format!("Failed to parse CSV line {}", line))?;
        // non-UTF-8 text (Latin-1 seller names) is decoded with replacement characters
        let row = csv::StringRecord::from_byte_record_lossy(bytes);
        report.rows_read += 1;

        match normalize_row(&row, &columns, options) {
            Some(record) => report.records.push(record),
            None => {
                debug!(line, "dropping invalid row");
                report.rows_rejected += 1;
            }
        }
    }

    Ok(report)
}

/// Positions of the required columns within the header row.
struct ColumnMap {
    indices: [usize; 16],
}

impl ColumnMap {
    fn resolve(headers: &[String]) -> Result<Self> {
        let mut indices = [0usize; 16];
        for (slot, name) in indices.iter_mut().zip(REQUIRED_COLUMNS) {
            *slot = headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
                .ok_or_else(|| DashboardError::MissingColumn(name.to_string()))?;
        }
        Ok(Self { indices })
    }

    /// Trimmed, non-empty value of a required column.
    fn field<'r>(&self, row: &'r csv::StringRecord, column: usize) -> Option<&'r str> {
        row.get(self.indices[column])
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

fn normalize_row(row: &csv::StringRecord, columns: &ColumnMap, options: LoadOptions) -> Option<Record> {
    let mut fields = [""; 16];
    for (i, slot) in fields.iter_mut().enumerate() {
        *slot = columns.field(row, i)?;
    }
    let [year, make, model, trim, body, transmission, vin, state, condition, odometer, color, interior, seller, mmr, selling_price, sale_date] =
        fields;

    let day = parse_sale_day(sale_date)?;
    let sale_date = day.format("%Y-%m-%d").to_string();
    if !in_sale_window(&sale_date) {
        return None;
    }

    let number = |text: &str| coerce_number(text, options.numeric);

    Some(Record {
        year: number(year)?,
        make: make.to_uppercase(),
        model: model.to_uppercase(),
        trim: trim.to_string(),
        body: body.to_uppercase(),
        transmission: transmission.to_string(),
        vin: vin.to_string(),
        state: state.to_uppercase(),
        condition: number(condition)?,
        odometer: number(odometer)?,
        color: color.to_string(),
        interior: interior.to_string(),
        seller: seller.to_string(),
        mmr: number(mmr)?,
        selling_price: number(selling_price)?,
        sale_date,
    })
}

/// Whether a canonical `YYYY-MM-DD` day lies inside the dashboard window.
pub fn in_sale_window(day: &str) -> bool {
    day >= WINDOW_START && day <= WINDOW_END
}

fn coerce_number(text: &str, policy: NumericPolicy) -> Option<f64> {
    match (text.parse::<f64>(), policy) {
        (Ok(v), _) => Some(v),
        (Err(_), NumericPolicy::Permissive) => Some(f64::NAN),
        (Err(_), NumericPolicy::Strict) => None,
    }
}

/// Parse a sale date into its calendar day.
///
/// Date-times carrying an offset resolve to the day in that offset, which is
/// the seller's local day in the source data.
pub fn parse_sale_day(raw: &str) -> Option<NaiveDate> {
    let text = raw.trim();
    // "Tue Dec 16 2014 12:30:00 GMT-0800 (PST)"
    let without_zone_name = match text.find(" (") {
        Some(idx) => &text[..idx],
        None => text,
    };

    if let Ok(dt) = DateTime::parse_from_str(without_zone_name, "%a %b %d %Y %H:%M:%S GMT%z") {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt.date());
        }
    }
    for format in ["%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(day) = NaiveDate::parse_from_str(text, format) {
            return Some(day);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "year,make,model,trim,body,transmission,vin,state,condition,odometer,color,interior,seller,mmr,sellingprice,saledate";

    fn csv_with(rows: &[&str]) -> String {
        let mut out = String::from(HEADER);
        for row in rows {
            out.push('\n');
            out.push_str(row);
        }
        out.push('\n');
        out
    }

    fn parse(rows: &[&str]) -> LoadReport {
        parse_records(csv_with(rows).as_bytes(), LoadOptions::default()).unwrap()
    }

    #[test]
    fn test_normalizes_case_and_date() {
        let report = parse(&[
            "2014,bmw,x5,xDrive35i,suv,automatic,5uxkr0c58e0000001,ca,4.5,12000,black,black,bmw financial,31000,30000,Thu Jan 15 2015 04:30:00 GMT-0800 (PST)",
        ]);
        assert_eq!(report.records.len(), 1);
        let rec = &report.records[0];
        assert_eq!(rec.make, "BMW");
        assert_eq!(rec.model, "X5");
        assert_eq!(rec.body, "SUV");
        assert_eq!(rec.state, "CA");
        assert_eq!(rec.trim, "xDrive35i");
        assert_eq!(rec.sale_date, "2015-01-15");
        assert_eq!(rec.sale_month(), "2015-01");
        assert_eq!(rec.selling_price, 30000.0);
    }

    #[test]
    fn test_drops_row_with_empty_field() {
        let report = parse(&[
            "2014,Kia,Sorento,LX,SUV,automatic,vin1,ca,5,,white,black,kia motors,20500,21500,2015-01-10",
            "2014,Kia,Sorento,LX,SUV,automatic,vin2,ca,5,16639,white,black,kia motors,20500,21500,2015-01-10",
        ]);
        assert_eq!(report.rows_read, 2);
        assert_eq!(report.rows_rejected, 1);
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].vin, "vin2");
    }

    #[test]
    fn test_window_is_inclusive() {
        let report = parse(&[
            "2014,Ford,F-150,XL,Pickup,automatic,a,tx,3,100,red,gray,dealer,1,1,2014-10-31",
            "2014,Ford,F-150,XL,Pickup,automatic,b,tx,3,100,red,gray,dealer,1,1,2014-11-01",
            "2014,Ford,F-150,XL,Pickup,automatic,c,tx,3,100,red,gray,dealer,1,1,2015-08-31",
            "2014,Ford,F-150,XL,Pickup,automatic,d,tx,3,100,red,gray,dealer,1,1,2015-09-01",
        ]);
        let vins: Vec<&str> = report.records.iter().map(|r| r.vin.as_str()).collect();
        assert_eq!(vins, vec!["b", "c"]);
    }

    #[test]
    fn test_offset_date_uses_written_day() {
        // 23:30 Pacific on Oct 31 is already Nov 1 in UTC, but stays outside the window
        let day = parse_sale_day("Fri Oct 31 2014 23:30:00 GMT-0800 (PST)").unwrap();
        assert_eq!(day.format("%Y-%m-%d").to_string(), "2014-10-31");
        assert!(parse_sale_day("2015-02-03T10:00:00+09:00").is_some());
        assert!(parse_sale_day("02/03/2015").is_some());
        assert!(parse_sale_day("not a date").is_none());
    }

    #[test]
    fn test_permissive_numbers_become_nan() {
        let report = parse(&[
            "2013,Nissan,Altima,S,Sedan,automatic,v,fl,n/a,5000,blue,beige,dealer,9000,9500,2015-03-02",
        ]);
        assert_eq!(report.records.len(), 1);
        assert!(report.records[0].condition.is_nan());
    }

    #[test]
    fn test_strict_numbers_reject_row() {
        let csv = csv_with(&[
            "2013,Nissan,Altima,S,Sedan,automatic,v,fl,n/a,5000,blue,beige,dealer,9000,9500,2015-03-02",
        ]);
        let options = LoadOptions { numeric: NumericPolicy::Strict };
        let report = parse_records(csv.as_bytes(), options).unwrap();
        assert!(report.records.is_empty());
        assert_eq!(report.rows_rejected, 1);
    }

    #[test]
    fn test_missing_column_is_structural_failure() {
        let csv = "year,make\n2014,BMW\n";
        let err = parse_records(csv.as_bytes(), LoadOptions::default()).unwrap_err();
        assert!(err.to_string().contains("model"));
    }

    #[test]
    fn test_load_records_unreachable_source_is_empty() {
        let records = load_records(Path::new("/nonexistent/car_prices.csv"), LoadOptions::default());
        assert!(records.is_empty());
    }

    #[test]
    fn test_header_order_and_case_are_free() {
        let csv = "SaleDate,SellingPrice,MMR,Seller,Interior,Color,Odometer,Condition,State,VIN,Transmission,Body,Trim,Model,Make,Year,extra\n\
                   2015-05-05,100,90,s,black,red,10,2,ny,v,manual,coupe,base,mustang,ford,2012,x\n";
        let report = parse_records(csv.as_bytes(), LoadOptions::default()).unwrap();
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].model, "MUSTANG");
        assert_eq!(report.records[0].year, 2012.0);
    }

    #[test]
    fn test_latin1_row_is_decoded_lossily() {
        let mut csv = csv_with(&[
            "2014,Kia,Sorento,LX,SUV,automatic,vin1,ca,5,16639,white,black,kia motors,20500,21500,2015-01-10",
        ])
        .into_bytes();
        // "se\xf1or autos" in Latin-1
        csv.extend_from_slice(b"2014,Kia,Rio,LX,Sedan,automatic,vin2,ca,4,9000,red,black,se\xf1or autos,9000,9100,2015-02-10\n");

        let report = parse_records(csv.as_slice(), LoadOptions::default()).unwrap();
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records[1].seller, "se\u{FFFD}or autos");
    }
}
