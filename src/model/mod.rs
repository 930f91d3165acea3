use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// A scalar the backend sends either as a string or as a number
/// (`Strike` is both, depending on which endpoint produced it).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Label {
    Text(String),
    Number(serde_json::Number),
}

impl Default for Label {
    fn default() -> Self {
        Label::Text(String::new())
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Text(s) => f.write_str(s),
            // whole floats print without the trailing ".0", like the table cells
            Label::Number(n) => match n.as_f64() {
                Some(v) if n.is_f64() => write!(f, "{v}"),
                _ => write!(f, "{n}"),
            },
        }
    }
}

impl From<&str> for Label {
    fn from(value: &str) -> Self {
        Label::Text(value.to_string())
    }
}

impl From<f64> for Label {
    fn from(value: f64) -> Self {
        if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
            return Label::Number(serde_json::Number::from(value as i64));
        }
        serde_json::Number::from_f64(value)
            .map(Label::Number)
            .unwrap_or_else(|| Label::Text(value.to_string()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Call,
    Put,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Call, Side::Put];

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Call => "CE",
            Side::Put => "PE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "CE" | "CALL" => Some(Side::Call),
            "PE" | "PUT" => Some(Side::Put),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptionRecord {
    #[serde(rename = "StrkPric")]
    pub strike_price: f64,
    #[serde(rename = "EODOIChng")]
    pub eod_oi_change: f64,
    #[serde(rename = "isSelectedRecord", default)]
    pub is_selected: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpiryGroup {
    #[serde(rename = "Strike", default)]
    pub strike: Label,
    #[serde(rename = "Date", default)]
    pub date: String,
    #[serde(rename = "CE", default)]
    pub calls: Vec<OptionRecord>,
    #[serde(rename = "PE", default)]
    pub puts: Vec<OptionRecord>,
}

impl ExpiryGroup {
    pub fn records(&self, side: Side) -> &[OptionRecord] {
        match side {
            Side::Call => &self.calls,
            Side::Put => &self.puts,
        }
    }

    pub fn records_mut(&mut self, side: Side) -> &mut Vec<OptionRecord> {
        match side {
            Side::Call => &mut self.calls,
            Side::Put => &mut self.puts,
        }
    }
}

/// Expiry key -> group. Iteration order is the map's key order and every
/// operation in this crate keeps it.
pub type OptionsChain = BTreeMap<String, ExpiryGroup>;

/// Same shape as [`OptionsChain`], only selected records left.
pub type SelectionResult = OptionsChain;

/// Page-wide data set: the summary rows shown on the page plus the
/// option chain the user picks records from.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PageState {
    #[serde(default)]
    pub rows: Vec<serde_json::Value>,
    #[serde(default)]
    pub toprecords: OptionsChain,
}

impl PageState {
    pub fn new(rows: Vec<serde_json::Value>, toprecords: OptionsChain) -> Self {
        Self { rows, toprecords }
    }

    /// Flip one record's selection; `None` when the expiry or index is unknown.
    pub fn toggle_record(&mut self, expiry: &str, side: Side, index: usize) -> Option<bool> {
        let record = self
            .toprecords
            .get_mut(expiry)?
            .records_mut(side)
            .get_mut(index)?;
        record.is_selected = !record.is_selected;
        Some(record.is_selected)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SaveRequest {
    pub rows: Vec<serde_json::Value>,
    pub toprecords: SelectionResult,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SaveResponse {
    pub message: String,
}

/// `GET /get-data/{strike}` answers with either a domain message or a chain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DetailResponse {
    Message { message: String },
    Chain(OptionsChain),
}
