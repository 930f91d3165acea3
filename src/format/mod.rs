use std::io::Write;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use colored::Colorize;
use indicatif::ProgressBar;
use regex::Regex;
use thiserror::Error;

use crate::dom::{Document, Element};

pub const NUMBER_ATTR: &str = "data-number";
pub const DATE_ATTR: &str = "data-date";

const SAME_CELL_BREAK: &str = r#"<br style="mso-data-placement:same-cell;"/>"#;
const TOP_ALIGNED_CELL: &str = r#"<td style="vertical-align: top;""#;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("no table with id '{id}'")]
    MissingTable { id: String },

    #[error("failed to write to clipboard: {source}")]
    Clipboard {
        #[source]
        source: std::io::Error,
    },
}

/// Destination for copied markup. The CLI writes to stdout or a file;
/// tests keep the text in memory.
pub trait Clipboard {
    fn write_text(&mut self, text: &str) -> std::io::Result<()>;
}

pub struct WriterClipboard<W: Write> {
    inner: W,
}

impl<W: Write> WriterClipboard<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Clipboard for WriterClipboard<W> {
    fn write_text(&mut self, text: &str) -> std::io::Result<()> {
        self.inner.write_all(text.as_bytes())?;
        self.inner.flush()
    }
}

fn float_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[+-]?(?:Infinity|(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][+-]?[0-9]+)?)")
            .expect("static float regex")
    })
}

/// Longest-numeric-prefix parse: `"12.5px"` is 12.5, `"abc"` is NaN.
pub fn parse_float(value: &str) -> f64 {
    let trimmed = value.trim_start();
    let Some(m) = float_prefix().find(trimmed) else {
        return f64::NAN;
    };
    let text = m.as_str();
    match text {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ => text.parse::<f64>().unwrap_or(f64::NAN),
    }
}

/// Half-up rounding that keeps the sign of negative values rounding to zero.
pub fn round_half_up(x: f64) -> f64 {
    if !x.is_finite() {
        return x;
    }
    let floor = x.floor();
    let rounded = if x - floor >= 0.5 { floor + 1.0 } else { floor };
    if rounded == 0.0 && x.is_sign_negative() {
        -0.0
    } else {
        rounded
    }
}

/// Group an unsigned digit string the Indian way: `1234567` -> `12,34,567`.
pub fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }
    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups: Vec<&str> = Vec::new();
    let mut end = head.len();
    while end > 0 {
        let start = end.saturating_sub(2);
        groups.push(&head[start..end]);
        end = start;
    }
    groups.reverse();
    format!("{},{}", groups.join(","), tail)
}

/// Round to the nearest integer and render with Indian digit grouping.
pub fn format_amount(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    let rounded = round_half_up(value);
    if rounded.is_infinite() {
        return if rounded > 0.0 { "∞" } else { "-∞" }.to_string();
    }
    let digits = format!("{:.0}", rounded.abs());
    let grouped = group_indian(&digits);
    if rounded.is_sign_negative() {
        format!("-{grouped}")
    } else {
        grouped
    }
}

pub fn format_number(value: &str) -> String {
    format_amount(parse_float(value))
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(d) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt.date());
        }
    }
    for fmt in ["%Y/%m/%d", "%B %d, %Y", "%b %d, %Y", "%d %B %Y", "%d %b %Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(value, fmt) {
            return Some(d);
        }
    }
    if value.len() == 7 {
        if let Ok(d) = NaiveDate::parse_from_str(&format!("{value}-01"), "%Y-%m-%d") {
            return Some(d);
        }
    }
    None
}

/// `"2023-03-15"` -> `"Date: 15/03/2023"`. Dates are read and shown in UTC.
pub fn format_date(value: &str) -> String {
    match parse_date(value) {
        Some(d) => format!("Date: {}", d.format("%d/%m/%Y")),
        None => "Date: Invalid Date".to_string(),
    }
}

fn format_cell(cell: &mut Element) {
    if let Some(raw) = cell.attr(NUMBER_ATTR).map(str::to_string) {
        cell.set_text(format_number(&raw));
    }
    if let Some(raw) = cell.attr(DATE_ATTR).map(str::to_string) {
        cell.set_text(format_date(&raw));
    }
}

/// Rewrite every `data-number` / `data-date` cell under each row from the
/// raw value held in that attribute.
pub fn format_table(rows: &mut [Element]) {
    for row in rows.iter_mut() {
        row.for_each_descendant_mut(&mut format_cell);
    }
}

/// Table markup shaped for pasting into a spreadsheet: newlines stay inside
/// the cell and cells are top-aligned.
pub fn spreadsheet_markup(table_html: &str) -> String {
    table_html
        .replace('\n', SAME_CELL_BREAK)
        .replace("<td", TOP_ALIGNED_CELL)
}

pub fn copy_table_as_csv<C>(
    doc: &Document,
    table_id: &str,
    clipboard: &mut C,
    pb: &ProgressBar,
) -> Result<(), FormatError>
where
    C: Clipboard + ?Sized,
{
    let table = doc
        .get_element_by_id(table_id)
        .map_err(|_| FormatError::MissingTable {
            id: table_id.to_string(),
        })?;
    let markup = spreadsheet_markup(&table.outer_html());
    match clipboard.write_text(&markup) {
        Ok(()) => {
            pb.println(format!("{} copied table {}", "success".bold().green(), table_id));
            Ok(())
        }
        Err(e) => {
            pb.println(format!("{} {}", "error".bold().red(), e));
            Err(FormatError::Clipboard { source: e })
        }
    }
}
