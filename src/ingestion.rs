use crate::error::{PurchaseReportError, Result};
use crate::schema::{ColumnMapping, PurchaseRecord};
use calamine::{open_workbook_auto, Data, Reader};
use chrono::{NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord, Trim};
use log::{debug, info, warn};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// Worksheet name of the purchase export.
pub const DEFAULT_SHEET: &str = "Sheet0";

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"];
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// What happened while reading the input file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    pub rows_read: usize,
    /// Entry-date cells that were blank.
    pub missing_dates: usize,
    /// Entry-date cells that held something other than a recognizable date.
    pub invalid_dates: usize,
}

/// The loaded purchase records. Built once, then only read.
///
/// Cloning is cheap and every clone sees the same records, so independent
/// report computations can each hold their own handle.
#[derive(Debug, Clone)]
pub struct Dataset {
    records: Arc<[PurchaseRecord]>,
    load_report: LoadReport,
}

impl Dataset {
    pub fn new(records: Vec<PurchaseRecord>) -> Self {
        let load_report = LoadReport {
            rows_read: records.len(),
            missing_dates: records.iter().filter(|r| r.entry_date.is_none()).count(),
            invalid_dates: 0,
        };
        Self {
            records: records.into(),
            load_report,
        }
    }

    pub fn from_csv_path(path: impl AsRef<Path>, columns: &ColumnMapping) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading purchase records from {}", path.display());
        let file = File::open(path)?;
        Self::from_csv_reader(file, columns)
    }

    /// Reads CSV text with a header row. The delimiter (`,` or `;`) is taken
    /// from the header line.
    pub fn from_csv_reader<R: Read>(mut reader: R, columns: &ColumnMapping) -> Result<Self> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;

        let delimiter = detect_delimiter(&text);
        let mut csv_reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(Trim::All)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
        let mut loader = RowLoader::new(ColumnLayout::resolve(&headers, columns)?);

        for row in csv_reader.records() {
            let row = row?;
            let line = row
                .position()
                .map_or(loader.rows_read() + 2, |p| p.line() as usize);
            loader.push(&text_cells(&row), line)?;
        }

        Ok(loader.finish())
    }

    /// Reads one worksheet of an `.xlsx`/`.xls`/`.ods` workbook; the first
    /// row holds the headers.
    ///
    /// Numeric and date cells are taken as typed values, so the decimal
    /// separator only applies to amounts stored as text.
    pub fn from_xlsx_path(
        path: impl AsRef<Path>,
        sheet: &str,
        columns: &ColumnMapping,
    ) -> Result<Self> {
        let path = path.as_ref();
        info!(
            "Loading purchase records from {} (sheet '{}')",
            path.display(),
            sheet
        );

        let mut workbook = open_workbook_auto(path)?;
        if !workbook.sheet_names().iter().any(|name| name == sheet) {
            return Err(PurchaseReportError::MissingSheet(sheet.to_string()));
        }
        let range = workbook.worksheet_range(sheet)?;

        // spreadsheet line of the header row, 1-based
        let header_line = range.start().map_or(1, |(row, _)| row as usize + 1);
        let mut rows = range.rows();
        let headers: Vec<String> = rows
            .next()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .unwrap_or_default();
        let mut loader = RowLoader::new(ColumnLayout::resolve(&headers, columns)?);

        for (offset, row) in rows.enumerate() {
            let cells: Vec<RawCell> = row.iter().map(RawCell::from_data).collect();
            loader.push(&cells, header_line + 1 + offset)?;
        }

        Ok(loader.finish())
    }

    pub fn records(&self) -> &[PurchaseRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn load_report(&self) -> &LoadReport {
        &self.load_report
    }
}

static EMPTY_CELL: RawCell = RawCell::Empty;

/// One input cell: text from CSV, or a typed spreadsheet value.
#[derive(Debug, Clone, PartialEq)]
enum RawCell {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl RawCell {
    fn from_data(data: &Data) -> Self {
        match data {
            Data::Empty => RawCell::Empty,
            Data::Float(f) => RawCell::Number(*f),
            Data::Int(i) => RawCell::Number(*i as f64),
            Data::DateTime(dt) => match dt.as_datetime() {
                Some(datetime) => RawCell::Date(datetime.date()),
                None => RawCell::Number(dt.as_f64()),
            },
            Data::String(s) => RawCell::text(s),
            other => RawCell::text(&other.to_string()),
        }
    }

    fn text(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() {
            RawCell::Empty
        } else {
            RawCell::Text(value.to_string())
        }
    }

    fn as_text(&self) -> Option<String> {
        match self {
            RawCell::Empty => None,
            RawCell::Text(s) => Some(s.clone()),
            RawCell::Number(n) => Some(number_text(*n)),
            RawCell::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
        }
    }
}

impl fmt::Display for RawCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_text().unwrap_or_default())
    }
}

/// Whole numbers print without a fraction, so a numeric supplier code 10
/// reads as "10".
fn number_text(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

fn text_cells(row: &StringRecord) -> Vec<RawCell> {
    row.iter().map(RawCell::text).collect()
}

enum DateStatus {
    Parsed,
    Missing,
    Invalid,
}

struct ColumnLayout<'m> {
    columns: &'m ColumnMapping,
    supplier_id: usize,
    legal_name: usize,
    store: usize,
    year: usize,
    month: usize,
    status: usize,
    amount: usize,
    entry_date: usize,
}

impl<'m> ColumnLayout<'m> {
    fn resolve(headers: &[String], columns: &'m ColumnMapping) -> Result<Self> {
        columns.validate()?;

        let find = |name: &str| -> Result<usize> {
            headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}').trim() == name)
                .ok_or_else(|| PurchaseReportError::MissingColumn(name.to_string()))
        };

        let layout = Self {
            columns,
            supplier_id: find(&columns.supplier_id)?,
            legal_name: find(&columns.legal_name)?,
            store: find(&columns.store)?,
            year: find(&columns.year)?,
            month: find(&columns.month)?,
            status: find(&columns.status)?,
            amount: find(&columns.amount)?,
            entry_date: find(&columns.entry_date)?,
        };
        debug!("Resolved input columns from header: {:?}", headers);
        Ok(layout)
    }

    fn parse_row(&self, cells: &[RawCell], line: usize) -> Result<(PurchaseRecord, DateStatus)> {
        let cell = |idx: usize| cells.get(idx).unwrap_or(&EMPTY_CELL);
        let invalid = |column: &str, value: &RawCell| PurchaseReportError::InvalidValue {
            row: line,
            column: column.to_string(),
            value: value.to_string(),
        };

        let raw_year = cell(self.year);
        let year = match raw_year {
            RawCell::Text(s) => parse_year(s),
            RawCell::Number(n) => whole_year(*n),
            _ => None,
        }
        .ok_or_else(|| invalid(&self.columns.year, raw_year))?;

        let raw_amount = cell(self.amount);
        let amount = match raw_amount {
            RawCell::Text(s) => parse_amount(s, self.columns.decimal_separator),
            RawCell::Number(n) => Decimal::from_f64(*n),
            _ => None,
        }
        .ok_or_else(|| invalid(&self.columns.amount, raw_amount))?;

        let (entry_date, date_status) = match cell(self.entry_date) {
            RawCell::Empty => (None, DateStatus::Missing),
            RawCell::Date(date) => (Some(*date), DateStatus::Parsed),
            other => match other.as_text().as_deref().and_then(parse_entry_date) {
                Some(date) => (Some(date), DateStatus::Parsed),
                None => {
                    debug!("Line {}: unparseable entry date '{}'", line, other);
                    (None, DateStatus::Invalid)
                }
            },
        };

        let record = PurchaseRecord {
            supplier_id: cell(self.supplier_id).as_text(),
            legal_name: cell(self.legal_name).as_text(),
            store: cell(self.store).as_text(),
            year,
            month: cell(self.month).as_text().unwrap_or_default(),
            status: cell(self.status).as_text().unwrap_or_default(),
            amount,
            entry_date,
        };

        Ok((record, date_status))
    }
}

/// Accumulates parsed rows and the load report for either input format.
struct RowLoader<'m> {
    layout: ColumnLayout<'m>,
    records: Vec<PurchaseRecord>,
    load_report: LoadReport,
}

impl<'m> RowLoader<'m> {
    fn new(layout: ColumnLayout<'m>) -> Self {
        Self {
            layout,
            records: Vec::new(),
            load_report: LoadReport::default(),
        }
    }

    fn rows_read(&self) -> usize {
        self.records.len()
    }

    fn push(&mut self, cells: &[RawCell], line: usize) -> Result<()> {
        let (record, date_status) = self.layout.parse_row(cells, line)?;
        match date_status {
            DateStatus::Parsed => {}
            DateStatus::Missing => self.load_report.missing_dates += 1,
            DateStatus::Invalid => self.load_report.invalid_dates += 1,
        }
        self.records.push(record);
        Ok(())
    }

    fn finish(self) -> Dataset {
        let mut load_report = self.load_report;
        load_report.rows_read = self.records.len();

        info!(
            "Loaded {} purchase records ({} missing and {} unparseable entry dates)",
            load_report.rows_read, load_report.missing_dates, load_report.invalid_dates
        );
        if load_report.invalid_dates > 0 {
            warn!(
                "{} entry dates could not be parsed and were loaded as missing",
                load_report.invalid_dates
            );
        }

        Dataset {
            records: self.records.into(),
            load_report,
        }
    }
}

fn detect_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or("");
    if header.matches(';').count() > header.matches(',').count() {
        b';'
    } else {
        b','
    }
}

fn whole_year(value: f64) -> Option<i32> {
    if value.fract() == 0.0 {
        i32::try_from(value as i64).ok()
    } else {
        None
    }
}

/// Accepts "2023" and spreadsheet-style "2023.0".
pub fn parse_year(raw: &str) -> Option<i32> {
    let raw = raw.trim();
    if let Ok(year) = raw.parse::<i32>() {
        return Some(year);
    }
    let value = Decimal::from_str(raw).ok()?;
    if value.fract().is_zero() {
        value.to_i32()
    } else {
        None
    }
}

/// Parses a monetary amount written with `decimal_separator` (`.` or `,`).
///
/// An optional `R$` prefix and a leading minus sign are accepted. The other
/// separator may only group thousands: every group after the first must have
/// exactly three digits. Anything else is rejected rather than reinterpreted,
/// so `"1.000"` is one thousand under `,` and one under `.`.
pub fn parse_amount(raw: &str, decimal_separator: char) -> Option<Decimal> {
    let grouping = if decimal_separator == ',' { '.' } else { ',' };
    let cleaned: String = raw
        .trim()
        .trim_start_matches("R$")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let (negative, unsigned) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.as_str()),
    };

    let (integer, fraction) = match unsigned.split_once(decimal_separator) {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (unsigned, None),
    };

    let groups: Vec<&str> = integer.split(grouping).collect();
    let all_digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    if !groups.iter().all(|g| all_digits(*g)) {
        return None;
    }
    if groups.len() > 1 && (groups[0].len() > 3 || groups[1..].iter().any(|g| g.len() != 3)) {
        return None;
    }

    let mut normalized = String::new();
    if negative {
        normalized.push('-');
    }
    normalized.push_str(&groups.concat());
    if let Some(fraction) = fraction {
        if !all_digits(fraction) {
            return None;
        }
        normalized.push('.');
        normalized.push_str(fraction);
    }

    Decimal::from_str(&normalized).ok()
}

/// Parses an entry date in ISO or day-first form, with or without a time part.
pub fn parse_entry_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
}
