use std::cmp::Ordering;
use std::io::Read;

use chrono::NaiveDate;
use itertools::Itertools;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::controller::home::DEFAULT_WEEKLY_DISABLED_TICKER;
use crate::model::{ExpiryGroup, Label, OptionRecord, OptionsChain, PageState, Side};
use crate::select;

pub const INDEX_OPTION: &str = "IDO";
pub const WEEKLY_KEY: &str = "XpryDt1";
pub const MONTHLY_KEY: &str = "XpryDt2";
pub const DEFAULT_TOP_N: usize = 10;
/// The one ticker whose page always carries both expiries.
pub const WEEKLY_REQUIRED_TICKER: &str = "NIFTY";

const EXPIRY_LABEL_FORMAT: &str = "%d/%m/%y";
const CANDIDATE_DELIMITERS: [u8; 4] = [b',', b'\t', b';', b'|'];
const REQUIRED_COLUMNS: [&str; 3] = ["TckrSymb", "FinInstrmTp", "XpryDt"];

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("failed to read bhavcopy: {source}")]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse bhavcopy: {source}")]
    Csv {
        #[source]
        source: csv::Error,
    },

    #[error("empty file provided")]
    Empty,

    #[error("bhavcopy has no '{name}' column")]
    MissingColumn { name: String },

    #[error("both weekly and monthly expiry dates are required for {ticker}")]
    MissingWeeklyExpiry { ticker: String },

    #[error("invalid date '{value}', expected YYYY-MM-DD")]
    InvalidDate { value: String },
}

/// One row of the exchange's end-of-day derivatives report. Only the
/// columns used here are read, the rest are ignored.
#[derive(Clone, Debug, Deserialize)]
pub struct BhavRecord {
    #[serde(rename = "TckrSymb")]
    pub ticker: String,
    #[serde(rename = "FinInstrmTp")]
    pub instrument_type: String,
    #[serde(rename = "XpryDt")]
    pub expiry: String,
    #[serde(rename = "OptnTp", default)]
    pub option_type: String,
    #[serde(rename = "StrkPric", default, deserialize_with = "csv::invalid_option")]
    pub strike_price: Option<f64>,
    #[serde(rename = "OpnIntrst", default, deserialize_with = "csv::invalid_option")]
    pub open_interest: Option<f64>,
    #[serde(
        rename = "ChngInOpnIntrst",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    pub open_interest_change: Option<f64>,
    #[serde(rename = "ClsPric", default, deserialize_with = "csv::invalid_option")]
    pub close_price: Option<f64>,
}

impl BhavRecord {
    pub fn strike(&self) -> f64 {
        self.strike_price.unwrap_or(0.0)
    }

    pub fn side(&self) -> Option<Side> {
        Side::parse(&self.option_type)
    }

    /// Open interest valued at the close.
    pub fn eod_oi(&self) -> f64 {
        self.open_interest.unwrap_or(0.0) * self.close_price.unwrap_or(0.0)
    }

    pub fn eod_oi_change(&self) -> f64 {
        self.open_interest_change.unwrap_or(0.0) * self.close_price.unwrap_or(0.0)
    }

    pub fn expiry_date(&self) -> Option<NaiveDate> {
        parse_expiry(&self.expiry)
    }
}

#[derive(Clone, Debug)]
pub struct SummaryRequest {
    pub ticker: String,
    pub strike: f64,
    pub weekly_expiry: Option<NaiveDate>,
    pub monthly_expiry: NaiveDate,
    pub file_date: Option<String>,
    pub top_n: usize,
    pub weekly_disabled_ticker: String,
}

impl SummaryRequest {
    pub fn new(ticker: &str, strike: f64, monthly_expiry: NaiveDate) -> Self {
        Self {
            ticker: ticker.to_string(),
            strike,
            weekly_expiry: None,
            monthly_expiry,
            file_date: None,
            top_n: DEFAULT_TOP_N,
            weekly_disabled_ticker: DEFAULT_WEEKLY_DISABLED_TICKER.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    #[serde(rename = "Expiry")]
    pub expiry: String,
    #[serde(rename = "TckrSymb")]
    pub ticker: String,
    #[serde(rename = "FileDt")]
    pub file_date: Option<String>,
    #[serde(rename = "Expiry_Date")]
    pub expiry_date: String,
    #[serde(rename = "Strike")]
    pub strike: Label,
    #[serde(rename = "EOD_CE_OI_Sum")]
    pub ce_oi: f64,
    #[serde(rename = "EOD_CE_OI_Change_Sum")]
    pub ce_oi_change: f64,
    #[serde(rename = "ITM_EOD_CE_OI_Sum")]
    pub itm_ce_oi: f64,
    #[serde(rename = "ITM_EOD_CE_OI_Change_Sum")]
    pub itm_ce_oi_change: f64,
    #[serde(rename = "EOD_PE_OI_Sum")]
    pub pe_oi: f64,
    #[serde(rename = "EOD_PE_OI_Change_Sum")]
    pub pe_oi_change: f64,
    #[serde(rename = "ITM_EOD_PE_OI_Sum")]
    pub itm_pe_oi: f64,
    #[serde(rename = "ITM_EOD_PE_OI_Change_Sum")]
    pub itm_pe_oi_change: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Summary {
    pub rows: Vec<SummaryRow>,
    pub toprecords: OptionsChain,
}

impl Summary {
    pub fn into_page_state(self) -> PageState {
        let rows = self
            .rows
            .iter()
            .filter_map(|r| serde_json::to_value(r).ok())
            .collect();
        PageState::new(rows, self.toprecords)
    }
}

pub fn parse_request_date(value: &str) -> Result<NaiveDate, SummaryError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| SummaryError::InvalidDate {
        value: value.to_string(),
    })
}

/// Expiry column as found in the report: `25/01/24`, `25/01/2024`,
/// `2024-01-25` or `25-Jan-2024`.
pub fn parse_expiry(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    ["%d/%m/%y", "%d/%m/%Y", "%Y-%m-%d", "%d-%b-%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

/// Pick the delimiter from the header line, falling back to `,`.
pub fn detect_delimiter(sample: &str) -> u8 {
    let header = sample.lines().next().unwrap_or("");
    CANDIDATE_DELIMITERS
        .iter()
        .rev()
        .map(|d| (*d, header.bytes().filter(|b| b == d).count()))
        .filter(|(_, count)| *count > 0)
        .max_by_key(|(_, count)| *count)
        .map(|(d, _)| d)
        .unwrap_or(b',')
}

pub fn read_bhavcopy<R: Read>(mut reader: R) -> Result<Vec<BhavRecord>, SummaryError> {
    let mut content = String::new();
    reader
        .read_to_string(&mut content)
        .map_err(|e| SummaryError::Io { source: e })?;
    if content.trim().is_empty() {
        return Err(SummaryError::Empty);
    }
    let delimiter = detect_delimiter(&content);
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(content.as_bytes());
    let headers = csv_reader
        .headers()
        .map_err(|e| SummaryError::Csv { source: e })?;
    if let Some(name) = REQUIRED_COLUMNS
        .iter()
        .find(|name| !headers.iter().any(|h| h == **name))
    {
        return Err(SummaryError::MissingColumn {
            name: name.to_string(),
        });
    }
    csv_reader
        .deserialize::<BhavRecord>()
        .map(|r| r.map_err(|e| SummaryError::Csv { source: e }))
        .collect()
}

fn top_records(rows: &[&BhavRecord], side: Side, top_n: usize) -> Vec<OptionRecord> {
    rows.iter()
        .filter(|r| r.side() == Some(side))
        .sorted_by(|a, b| {
            b.eod_oi_change()
                .partial_cmp(&a.eod_oi_change())
                .unwrap_or(Ordering::Equal)
        })
        .take(top_n)
        .map(|r| OptionRecord {
            strike_price: r.strike(),
            eod_oi_change: r.eod_oi_change(),
            is_selected: false,
        })
        .collect()
}

fn side_sum<F>(rows: &[&BhavRecord], side: Side, include: F, value: fn(&BhavRecord) -> f64) -> f64
where
    F: Fn(f64) -> bool,
{
    rows.iter()
        .filter(|r| r.side() == Some(side) && include(r.strike()))
        .map(|r| value(r))
        .sum()
}

fn summary_row(
    request: &SummaryRequest,
    ticker: &str,
    expiry: &str,
    expiry_label: &str,
    rows: &[&BhavRecord],
) -> SummaryRow {
    let strike = request.strike;
    let any = |_: f64| true;
    let itm_call = |s: f64| s <= strike;
    let itm_put = |s: f64| s >= strike;

    SummaryRow {
        expiry: expiry.to_string(),
        ticker: ticker.to_string(),
        file_date: request.file_date.clone(),
        expiry_date: expiry_label.to_string(),
        strike: Label::from(strike),
        ce_oi: side_sum(rows, Side::Call, any, BhavRecord::eod_oi),
        ce_oi_change: side_sum(rows, Side::Call, any, BhavRecord::eod_oi_change),
        itm_ce_oi: side_sum(rows, Side::Call, itm_call, BhavRecord::eod_oi),
        itm_ce_oi_change: side_sum(rows, Side::Call, itm_call, BhavRecord::eod_oi_change),
        pe_oi: side_sum(rows, Side::Put, any, BhavRecord::eod_oi),
        pe_oi_change: side_sum(rows, Side::Put, any, BhavRecord::eod_oi_change),
        itm_pe_oi: side_sum(rows, Side::Put, itm_put, BhavRecord::eod_oi),
        itm_pe_oi_change: side_sum(rows, Side::Put, itm_put, BhavRecord::eod_oi_change),
    }
}

/// Build the page data set for one ticker: top records per expiry and side
/// (pre-selected out of the money), plus the per-expiry summary rows.
/// The weekly group only exists when a weekly date is given; NIFTY must
/// give one.
pub fn summarize(records: &[BhavRecord], request: &SummaryRequest) -> Result<Summary, SummaryError> {
    let ticker = request.ticker.trim().to_uppercase();
    let weekly = match request.weekly_expiry {
        _ if ticker == request.weekly_disabled_ticker => None,
        None if ticker == WEEKLY_REQUIRED_TICKER => {
            return Err(SummaryError::MissingWeeklyExpiry { ticker });
        }
        date => date,
    };

    let mut expiries: Vec<(&str, &str, NaiveDate)> = Vec::new();
    if let Some(date) = weekly {
        expiries.push((WEEKLY_KEY, "Weekly", date));
    }
    expiries.push((MONTHLY_KEY, "Monthly", request.monthly_expiry));

    let instruments: Vec<&BhavRecord> = records
        .iter()
        .filter(|r| r.instrument_type.trim() == INDEX_OPTION && r.ticker.trim() == ticker)
        .collect();

    let mut rows = Vec::new();
    let mut toprecords = OptionsChain::new();
    for (key, expiry, date) in expiries {
        let at_expiry: Vec<&BhavRecord> = instruments
            .iter()
            .copied()
            .filter(|r| r.expiry_date() == Some(date))
            .collect();
        let label = date.format(EXPIRY_LABEL_FORMAT).to_string();

        let mut calls = top_records(&at_expiry, Side::Call, request.top_n);
        select::set_is_selected(&mut calls, request.strike, select::below_strike);
        let mut puts = top_records(&at_expiry, Side::Put, request.top_n);
        select::set_is_selected(&mut puts, request.strike, select::above_strike);

        toprecords.insert(
            key.to_string(),
            ExpiryGroup {
                strike: Label::from(request.strike),
                date: label.clone(),
                calls,
                puts,
            },
        );
        rows.push(summary_row(request, &ticker, expiry, &label, &at_expiry));
    }

    Ok(Summary { rows, toprecords })
}
