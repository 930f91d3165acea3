use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use indicatif::ProgressBar;
use serde_json::json;

use crate::client::{Backend, ClientError};
use crate::controller::history::{DETAIL_CLASS, LOAD_FAILED};
use crate::controller::home::{LABEL_SAVE, LABEL_SAVED, SAVE_FAILED_ALERT};
use crate::controller::{
    ControllerError, DetailOutcome, HistoryController, HistoryOptions, HomeController,
    HomeOptions, SaveOutcome, Ui,
};
use crate::dom::{Document, Element};
use crate::format::{Clipboard, FormatError, WriterClipboard};
use crate::model::{
    DetailResponse, ExpiryGroup, Label, OptionRecord, OptionsChain, PageState, SaveRequest,
    SaveResponse, Side,
};
use crate::summary::{SummaryError, SummaryRequest};

#[derive(Clone)]
enum Reply {
    Message(String),
    Chain(OptionsChain),
    Fail(u16),
}

struct FakeBackend {
    save: Reply,
    detail: Reply,
    saved: Arc<Mutex<Vec<SaveRequest>>>,
    fetched: Arc<Mutex<Vec<String>>>,
}

impl FakeBackend {
    fn new(save: Reply, detail: Reply) -> Self {
        Self {
            save,
            detail,
            saved: Arc::new(Mutex::new(Vec::new())),
            fetched: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

fn failure(status: u16) -> ClientError {
    ClientError::Status {
        url: "http://backend.test".to_string(),
        status,
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn save_eod_summary(&self, request: &SaveRequest) -> Result<SaveResponse, ClientError> {
        self.saved.lock().unwrap().push(request.clone());
        match &self.save {
            Reply::Message(message) => Ok(SaveResponse {
                message: message.clone(),
            }),
            Reply::Fail(status) => Err(failure(*status)),
            Reply::Chain(_) => Err(failure(500)),
        }
    }

    async fn get_data(&self, strike: &str) -> Result<DetailResponse, ClientError> {
        self.fetched.lock().unwrap().push(strike.to_string());
        match &self.detail {
            Reply::Message(message) => Ok(DetailResponse::Message {
                message: message.clone(),
            }),
            Reply::Chain(chain) => Ok(DetailResponse::Chain(chain.clone())),
            Reply::Fail(status) => Err(failure(*status)),
        }
    }
}

#[derive(Default)]
struct RecordingUi {
    alerts: Vec<String>,
    navigations: Vec<String>,
}

impl Ui for RecordingUi {
    fn alert(&mut self, message: &str) {
        self.alerts.push(message.to_string());
    }

    fn navigate(&mut self, url: &str) {
        self.navigations.push(url.to_string());
    }
}

struct BrokenClipboard;

impl Clipboard for BrokenClipboard {
    fn write_text(&mut self, _text: &str) -> std::io::Result<()> {
        Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "clipboard denied",
        ))
    }
}

fn record(strike: f64, change: f64, selected: bool) -> OptionRecord {
    OptionRecord {
        strike_price: strike,
        eod_oi_change: change,
        is_selected: selected,
    }
}

fn sample_chain() -> OptionsChain {
    let mut chain = OptionsChain::new();
    chain.insert(
        "XpryDt1".to_string(),
        ExpiryGroup {
            strike: Label::from(19500.0),
            date: "25/01/24".to_string(),
            calls: vec![record(19400.0, 1234567.8, true), record(19300.0, 50.0, false)],
            puts: vec![],
        },
    );
    chain.insert(
        "XpryDt2".to_string(),
        ExpiryGroup {
            strike: Label::from("19500"),
            date: "29/02/24".to_string(),
            calls: vec![record(19200.0, 10.0, false)],
            puts: vec![record(19700.0, 20.0, true), record(19800.0, 5.0, false)],
        },
    );
    chain
}

fn home_doc(ticker: &str) -> Document {
    Document::new(
        Element::new("body")
            .with_child(
                Element::new("select")
                    .with_attr("id", "TckrSymb")
                    .with_attr("value", ticker),
            )
            .with_child(
                Element::new("input")
                    .with_attr("id", "XpryDt1")
                    .with_attr("value", "2024-01-25"),
            )
            .with_child(
                Element::new("button")
                    .with_attr("id", "save")
                    .with_text(LABEL_SAVE),
            ),
    )
}

fn history_doc(strike: &str) -> Document {
    Document::new(
        Element::new("body").with_child(
            Element::new("table").with_child(
                Element::new("tbody").with_child(
                    Element::new("tr")
                        .with_attr("data-strike", strike)
                        .with_child(Element::new("td").with_text(strike))
                        .with_child(
                            Element::new("td").with_child(
                                Element::new("button")
                                    .with_attr("id", "view")
                                    .with_text("View"),
                            ),
                        ),
                ),
            ),
        ),
    )
}

fn detail_cells(doc: &Document) -> usize {
    let mut out = Vec::new();
    doc.body
        .find_all(&|e: &Element| e.has_class(DETAIL_CLASS), &mut out);
    out.len()
}

// formatting

#[test]
fn format_number_groups_indian_style() {
    assert_eq!(crate::format::format_number("1234567.8"), "12,34,568");
    assert_eq!(crate::format::format_number("100000"), "1,00,000");
    assert_eq!(crate::format::format_number("999"), "999");
    assert_eq!(crate::format::format_number("-1234.5"), "-1,234");
    assert_eq!(crate::format::format_number("  12.5px"), "13");
}

#[test]
fn format_number_edge_values() {
    assert_eq!(crate::format::format_number("abc"), "NaN");
    assert_eq!(crate::format::format_number(""), "NaN");
    assert_eq!(crate::format::format_number("-0.4"), "-0");
    assert_eq!(crate::format::format_number("Infinity"), "∞");
    assert_eq!(crate::format::format_number("-Infinity"), "-∞");
    assert_eq!(crate::format::format_number("2.5"), "3");
    assert_eq!(crate::format::format_number("-2.5"), "-2");
}

#[test]
fn format_date_renders_british_order() {
    assert_eq!(crate::format::format_date("2023-03-15"), "Date: 15/03/2023");
    assert_eq!(
        crate::format::format_date("2023-03-15T23:30:00-02:00"),
        "Date: 16/03/2023"
    );
    assert_eq!(
        crate::format::format_date("2023-03-15 10:00:00"),
        "Date: 15/03/2023"
    );
}

#[test]
fn format_date_accepts_slashed_and_month_name_layouts() {
    for raw in ["2023/03/15", "March 15, 2023", "Mar 15, 2023", "15 Mar 2023", "15 March 2023"] {
        assert_eq!(crate::format::format_date(raw), "Date: 15/03/2023", "{raw}");
    }
}

#[test]
fn format_date_rejects_garbage() {
    assert_eq!(crate::format::format_date("not a date"), "Date: Invalid Date");
    assert_eq!(crate::format::format_date(""), "Date: Invalid Date");
    assert_eq!(crate::format::format_date("2023-13-45"), "Date: Invalid Date");
}

#[test]
fn format_table_rewrites_tagged_cells_only() {
    let mut rows = vec![Element::new("tr")
        .with_child(
            Element::new("td")
                .with_attr("data-number", "1234567.8")
                .with_text("1234567.8"),
        )
        .with_child(
            Element::new("td")
                .with_attr("data-date", "2023-03-15")
                .with_text("2023-03-15"),
        )
        .with_child(Element::new("td").with_text("1234567.8"))];
    crate::format::format_table(&mut rows);
    let texts: Vec<String> = rows[0].child_elements().map(|c| c.text_content()).collect();
    assert_eq!(texts, vec!["12,34,568", "Date: 15/03/2023", "1234567.8"]);
}

#[test]
fn copy_table_writes_spreadsheet_markup() {
    let doc = Document::new(
        Element::new("body").with_child(
            Element::new("table").with_attr("id", "t1").with_child(
                Element::new("tr").with_child(Element::new("td").with_text("a\nb")),
            ),
        ),
    );
    let mut clipboard = WriterClipboard::new(Vec::new());
    crate::format::copy_table_as_csv(&doc, "t1", &mut clipboard, &ProgressBar::hidden()).unwrap();
    let text = String::from_utf8(clipboard.into_inner()).unwrap();
    assert_eq!(
        text,
        r#"<table id="t1"><tr><td style="vertical-align: top;">a<br style="mso-data-placement:same-cell;"/>b</td></tr></table>"#
    );
}

#[test]
fn copy_table_reports_missing_table_and_clipboard_failure() {
    let doc = Document::new(
        Element::new("body").with_child(Element::new("table").with_attr("id", "t1")),
    );
    let pb = ProgressBar::hidden();
    let mut clipboard = WriterClipboard::new(Vec::new());
    assert!(matches!(
        crate::format::copy_table_as_csv(&doc, "nope", &mut clipboard, &pb),
        Err(FormatError::MissingTable { .. })
    ));
    assert!(matches!(
        crate::format::copy_table_as_csv(&doc, "t1", &mut BrokenClipboard, &pb),
        Err(FormatError::Clipboard { .. })
    ));
}

// rendering

#[test]
fn generate_tables_emits_ce_then_pe_per_expiry() {
    let tables = crate::render::generate_tables(&sample_chain());
    assert!(tables.has_class("strikes"));
    let ids: Vec<&str> = tables
        .child_elements()
        .filter_map(|t| t.attr("id"))
        .collect();
    assert_eq!(
        ids,
        vec!["XpryDt1-CE", "XpryDt1-PE", "XpryDt2-CE", "XpryDt2-PE"]
    );
}

#[test]
fn generate_tables_renders_caption_rows_and_empty_side() {
    let tables = crate::render::generate_tables(&sample_chain());
    let ce = tables.find_by_id("XpryDt1-CE").unwrap();
    let caption = ce.find(&|e: &Element| e.tag() == "caption").unwrap();
    assert_eq!(caption.text_content(), "CE Strikes on 25/01/24 for 19500");
    assert!(caption
        .inner_html()
        .contains("<strong>25/01/24</strong> for <b>19500</b>"));
    let html = ce.outer_html();
    assert!(html.contains("<th>Strike</th><th>EOD OI Change</th>"));
    assert!(html.contains("<td>19400</td><td>12,34,568</td>"));

    let pe = tables.find_by_id("XpryDt1-PE").unwrap();
    assert!(pe
        .outer_html()
        .contains(r#"<td colspan="2">No Records Found</td>"#));
}

#[test]
fn generate_tables_keeps_record_order_beside_empty_side() {
    let mut chain = OptionsChain::new();
    chain.insert(
        "XpryDt1".to_string(),
        ExpiryGroup {
            strike: Label::from("19500"),
            date: "25/01/24".to_string(),
            calls: vec![],
            puts: vec![record(19800.0, 5.0, false), record(19600.0, 50.0, true)],
        },
    );
    let tables = crate::render::generate_tables(&chain);
    let ce = tables.find_by_id("XpryDt1-CE").unwrap();
    let mut ce_rows = Vec::new();
    ce.find_all(&|e: &Element| e.tag() == "tr", &mut ce_rows);
    // header row plus the single empty-state row
    assert_eq!(ce_rows.len(), 2);
    assert_eq!(ce_rows[1].text_content(), "No Records Found");

    let pe = tables.find_by_id("XpryDt1-PE").unwrap();
    let mut pe_rows = Vec::new();
    pe.find_all(&|e: &Element| e.tag() == "tr", &mut pe_rows);
    let strikes: Vec<String> = pe_rows[1..]
        .iter()
        .filter_map(|r| r.child_elements().next().map(|c| c.text_content()))
        .collect();
    assert_eq!(strikes, vec!["19800", "19600"]);
}

#[test]
fn generate_tables_escapes_record_text() {
    let mut chain = OptionsChain::new();
    chain.insert(
        "k".to_string(),
        ExpiryGroup {
            strike: Label::from("<b>x</b>"),
            date: "<script>alert(1)</script>".to_string(),
            calls: vec![],
            puts: vec![],
        },
    );
    let html = crate::render::generate_tables(&chain).outer_html();
    assert!(!html.contains("<script>"));
    assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
    assert!(html.contains("<b>&lt;b&gt;x&lt;/b&gt;</b>"));
}

#[test]
fn generate_tables_prints_whole_float_strike_like_the_rows() {
    let chain: OptionsChain = serde_json::from_value(json!({
        "CE-2024-01-25": {
            "Strike": 19500.0,
            "Date": "25/01/24",
            "CE": [{"StrkPric": 19500.0, "EODOIChng": 1200.0}],
            "PE": []
        }
    }))
    .unwrap();
    let html = crate::render::generate_tables(&chain).outer_html();
    assert!(html.contains("for <b>19500</b></caption>"));
    assert!(html.contains("<tr><td>19500</td><td>1,200</td></tr>"));
    assert!(!html.contains("19500.0"));

    let fractional: Label = serde_json::from_value(json!(19500.5)).unwrap();
    assert_eq!(fractional.to_string(), "19500.5");
    let integer: Label = serde_json::from_value(json!(19500)).unwrap();
    assert_eq!(integer.to_string(), "19500");
}

#[test]
fn generate_tables_on_empty_chain_is_empty_container() {
    let tables = crate::render::generate_tables(&OptionsChain::new());
    assert_eq!(tables.outer_html(), r#"<div class="strikes"></div>"#);
}

#[test]
fn summary_table_formats_numbers_and_file_date() {
    let csv = bhavcopy();
    let records = crate::summary::read_bhavcopy(csv.as_bytes()).unwrap();
    let mut request = nifty_request();
    request.file_date = Some("2024-01-25".to_string());
    let summary = crate::summary::summarize(&records, &request).unwrap();
    let table = crate::render::summary_table(&summary.rows);
    assert_eq!(table.attr("id"), Some("summary"));
    let html = table.outer_html();
    assert!(html.contains(r#"<tr data-strike="19500">"#));
    assert!(html.contains("Date: 25/01/2024"));
    assert!(html.contains(r#"<td data-number="280.0">280</td>"#));
}

// selection

#[test]
fn extract_keeps_keys_and_only_selected_records() {
    let chain = sample_chain();
    let selected = crate::select::extract_is_selected_records(&chain);
    assert_eq!(
        selected.keys().collect::<Vec<_>>(),
        chain.keys().collect::<Vec<_>>()
    );
    let weekly = &selected["XpryDt1"];
    assert_eq!(weekly.calls, vec![record(19400.0, 1234567.8, true)]);
    assert!(weekly.puts.is_empty());
    assert_eq!(weekly.date, "25/01/24");
    let monthly = &selected["XpryDt2"];
    assert!(monthly.calls.is_empty());
    assert_eq!(monthly.puts, vec![record(19700.0, 20.0, true)]);
    assert_eq!(monthly.strike, Label::from("19500"));
}

#[test]
fn extract_is_idempotent() {
    let once = crate::select::extract_is_selected_records(&sample_chain());
    let twice = crate::select::extract_is_selected_records(&once);
    assert_eq!(once, twice);
}

#[test]
fn extract_of_fully_selected_chain_is_identity() {
    let mut chain = sample_chain();
    for group in chain.values_mut() {
        for side in Side::ALL {
            for r in group.records_mut(side).iter_mut() {
                r.is_selected = true;
            }
        }
    }
    assert_eq!(crate::select::extract_is_selected_records(&chain), chain);
}

#[test]
fn set_is_selected_marks_by_strike() {
    let mut calls = vec![record(19400.0, 0.0, false), record(19500.0, 0.0, true)];
    crate::select::set_is_selected(&mut calls, 19500.0, crate::select::below_strike);
    assert_eq!(
        calls.iter().map(|r| r.is_selected).collect::<Vec<_>>(),
        vec![true, false]
    );
    let mut puts = vec![record(19500.0, 0.0, true), record(19600.0, 0.0, false)];
    crate::select::set_is_selected(&mut puts, 19500.0, crate::select::above_strike);
    assert_eq!(
        puts.iter().map(|r| r.is_selected).collect::<Vec<_>>(),
        vec![false, true]
    );
}

#[test]
fn toggle_record_flips_and_reports_out_of_range() {
    let mut state = PageState::new(Vec::new(), sample_chain());
    assert_eq!(state.toggle_record("XpryDt1", Side::Call, 1), Some(true));
    assert_eq!(state.toggle_record("XpryDt1", Side::Call, 1), Some(false));
    assert_eq!(state.toggle_record("XpryDt1", Side::Put, 0), None);
    assert_eq!(state.toggle_record("XpryDt9", Side::Call, 0), None);
}

// model

#[test]
fn chain_payload_defaults_missing_selection_flag() {
    let chain: OptionsChain = serde_json::from_value(json!({
        "XpryDt1": {
            "Strike": "19500",
            "Date": "25/01/24",
            "CE": [{ "StrkPric": 19400, "EODOIChng": 12.5 }],
            "PE": []
        }
    }))
    .unwrap();
    let group = &chain["XpryDt1"];
    assert_eq!(group.strike, Label::from("19500"));
    assert_eq!(group.calls, vec![record(19400.0, 12.5, false)]);
}

#[test]
fn detail_response_distinguishes_message_and_chain() {
    let message: DetailResponse = serde_json::from_str(r#"{"message":"No data"}"#).unwrap();
    assert_eq!(
        message,
        DetailResponse::Message {
            message: "No data".to_string()
        }
    );
    let chain: DetailResponse =
        serde_json::from_str(r#"{"XpryDt1":{"Strike":19500,"Date":"d","CE":[],"PE":[]}}"#)
            .unwrap();
    assert!(matches!(chain, DetailResponse::Chain(c) if c.contains_key("XpryDt1")));
}

// client

#[test]
fn decode_detail_follows_message_then_status() {
    let url = reqwest::Url::parse("http://backend.test/get-data/19500").unwrap();
    assert!(matches!(
        crate::client::decode_detail(&url, 404, r#"{"message":"No data"}"#),
        Ok(DetailResponse::Message { .. })
    ));
    assert!(matches!(
        crate::client::decode_detail(&url, 200, r#"{"XpryDt1":{"CE":[],"PE":[]}}"#),
        Ok(DetailResponse::Chain(_))
    ));
    assert!(matches!(
        crate::client::decode_detail(&url, 500, r#"{"XpryDt1":{"CE":[],"PE":[]}}"#),
        Err(ClientError::Status { status: 500, .. })
    ));
    assert!(matches!(
        crate::client::decode_detail(&url, 502, "<html>bad gateway</html>"),
        Err(ClientError::Status { status: 502, .. })
    ));
    assert!(matches!(
        crate::client::decode_detail(&url, 200, "not json"),
        Err(ClientError::Decode { .. })
    ));
}

#[test]
fn endpoint_url_escapes_strike_segment() {
    let base = reqwest::Url::parse("http://127.0.0.1:5000").unwrap();
    let url = crate::client::endpoint_url(&base, "/get-data", Some("19 500/x")).unwrap();
    assert_eq!(url.as_str(), "http://127.0.0.1:5000/get-data/19%20500%2Fx");

    let nested = reqwest::Url::parse("http://backend.test/api/").unwrap();
    let url = crate::client::endpoint_url(&nested, "/saveeodsummary", None).unwrap();
    assert_eq!(url.as_str(), "http://backend.test/api/saveeodsummary");
}

#[test]
fn http_backend_rejects_bad_base_url_and_header() {
    let mut options = crate::client::ClientOptions {
        base_url: "not a url".to_string(),
        ..Default::default()
    };
    assert!(matches!(
        crate::client::HttpBackend::new(&options),
        Err(ClientError::InvalidUrl { .. })
    ));
    options.base_url = "mailto:someone@example.com".to_string();
    assert!(matches!(
        crate::client::HttpBackend::new(&options),
        Err(ClientError::InvalidUrl { .. })
    ));
    options.base_url = "http://127.0.0.1:5000".to_string();
    options.header = Some("missing-colon".to_string());
    assert!(matches!(
        crate::client::HttpBackend::new(&options),
        Err(ClientError::InvalidHeader { .. })
    ));
}

#[test]
fn http_backend_builds_endpoint_urls() {
    let backend =
        crate::client::HttpBackend::new(&crate::client::ClientOptions::default()).unwrap();
    assert_eq!(
        backend.save_url().unwrap().as_str(),
        "http://127.0.0.1:5000/saveeodsummary"
    );
    assert_eq!(
        backend.detail_url("19500").unwrap().as_str(),
        "http://127.0.0.1:5000/get-data/19500"
    );
}

fn request_complete(raw: &[u8]) -> bool {
    let text = String::from_utf8_lossy(raw);
    let end = match text.find("\r\n\r\n") {
        Some(end) => end,
        None => return false,
    };
    let length = text[..end]
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    raw.len() >= end + 4 + length
}

/// One-shot HTTP server: answers the first request with `status` and
/// `body`, then hands back the raw request it saw.
async fn serve_once(
    status: &'static str,
    body: &'static str,
) -> (String, tokio::task::JoinHandle<String>) {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        while !request_complete(&request) {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = socket.shutdown().await;
        String::from_utf8_lossy(&request).into_owned()
    });
    (base, handle)
}

fn wire_backend(base: &str) -> crate::client::HttpBackend {
    crate::client::HttpBackend::new(&crate::client::ClientOptions {
        base_url: base.to_string(),
        ..Default::default()
    })
    .unwrap()
}

fn empty_save() -> SaveRequest {
    SaveRequest {
        rows: vec![json!({"Expiry": "Weekly"})],
        toprecords: OptionsChain::new(),
    }
}

#[tokio::test]
async fn http_save_posts_json_and_reads_message() {
    let (base, server) = serve_once("200 OK", r#"{"message":"ok"}"#).await;
    let response = wire_backend(&base)
        .save_eod_summary(&empty_save())
        .await
        .unwrap();
    assert_eq!(response.message, "ok");

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /saveeodsummary HTTP/1.1"));
    assert!(request.contains(r#""Expiry":"Weekly""#));
}

#[tokio::test]
async fn http_save_fails_on_non_2xx_even_with_message() {
    let (base, server) =
        serve_once("400 Bad Request", r#"{"message":"Failed to save data!"}"#).await;
    let err = wire_backend(&base)
        .save_eod_summary(&empty_save())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Status { status: 400, .. }));
    server.await.unwrap();
}

#[tokio::test]
async fn http_save_fails_on_malformed_json() {
    let (base, server) = serve_once("200 OK", "<html>saved</html>").await;
    let err = wire_backend(&base)
        .save_eod_summary(&empty_save())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Decode { .. }));
    server.await.unwrap();
}

#[tokio::test]
async fn http_get_data_decodes_chain_from_escaped_path() {
    let (base, server) = serve_once(
        "200 OK",
        r#"{"CE-2024-01-25":{"Strike":"19500","Date":"25/01/24","CE":[{"StrkPric":19500,"EODOIChng":1200}],"PE":[]}}"#,
    )
    .await;
    let response = wire_backend(&base).get_data("19 500").await.unwrap();
    match response {
        DetailResponse::Chain(chain) => {
            assert_eq!(chain["CE-2024-01-25"].calls, vec![record(19500.0, 1200.0, false)]);
        }
        other => panic!("expected chain, got {other:?}"),
    }
    let request = server.await.unwrap();
    assert!(request.starts_with("GET /get-data/19%20500 HTTP/1.1"));
}

#[tokio::test]
async fn http_get_data_status_rules() {
    let (base, server) = serve_once("404 Not Found", r#"{"message":"No data found"}"#).await;
    assert_eq!(
        wire_backend(&base).get_data("19500").await.unwrap(),
        DetailResponse::Message {
            message: "No data found".to_string()
        }
    );
    server.await.unwrap();

    let (base, server) = serve_once("500 Internal Server Error", "oops").await;
    assert!(matches!(
        wire_backend(&base).get_data("19500").await,
        Err(ClientError::Status { status: 500, .. })
    ));
    server.await.unwrap();

    let (base, server) = serve_once("200 OK", "oops").await;
    assert!(matches!(
        wire_backend(&base).get_data("19500").await,
        Err(ClientError::Decode { .. })
    ));
    server.await.unwrap();
}

// home controller

#[test]
fn home_init_disables_weekly_field_for_banknifty() {
    let controller = HomeController::new(
        FakeBackend::new(Reply::Fail(500), Reply::Fail(500)),
        RecordingUi::default(),
        PageState::default(),
        HomeOptions::default(),
        ProgressBar::hidden(),
    );
    let mut doc = home_doc("BANKNIFTY");
    controller.init(&mut doc).unwrap();
    let weekly = doc.get_element_by_id("XpryDt1").unwrap();
    assert!(weekly.is_disabled());
    assert_eq!(weekly.value(), "");

    doc.get_element_by_id_mut("TckrSymb").unwrap().set_value("NIFTY");
    doc.get_element_by_id_mut("XpryDt1")
        .unwrap()
        .set_value("2024-01-25");
    controller.on_ticker_change(&mut doc).unwrap();
    let weekly = doc.get_element_by_id("XpryDt1").unwrap();
    assert!(!weekly.is_disabled());
    assert_eq!(weekly.value(), "");
}

#[test]
fn home_init_requires_page_controls() {
    let controller = HomeController::new(
        FakeBackend::new(Reply::Fail(500), Reply::Fail(500)),
        RecordingUi::default(),
        PageState::default(),
        HomeOptions::default(),
        ProgressBar::hidden(),
    );
    let mut doc = Document::default();
    assert!(matches!(
        controller.init(&mut doc),
        Err(ControllerError::Dom(_))
    ));
}

#[tokio::test]
async fn save_posts_empty_state_and_marks_saved() {
    let backend = FakeBackend::new(Reply::Message("Saved 0 rows".to_string()), Reply::Fail(500));
    let saved = backend.saved.clone();
    let mut controller = HomeController::new(
        backend,
        RecordingUi::default(),
        PageState::default(),
        HomeOptions::default(),
        ProgressBar::hidden(),
    );
    let mut doc = home_doc("NIFTY");

    let outcome = controller.save_eod_summary(&mut doc, "save").await.unwrap();
    assert_eq!(
        outcome,
        SaveOutcome::Saved {
            message: "Saved 0 rows".to_string()
        }
    );
    assert_eq!(controller.ui().alerts, vec!["Saved 0 rows".to_string()]);
    let trigger = doc.get_element_by_id("save").unwrap();
    assert_eq!(trigger.text_content(), LABEL_SAVED);
    assert!(trigger.is_disabled());

    let requests = saved.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        serde_json::to_value(&requests[0]).unwrap(),
        json!({ "rows": [], "toprecords": {} })
    );
}

#[tokio::test]
async fn save_sends_rows_and_selected_records_only() {
    let backend = FakeBackend::new(Reply::Message("ok".to_string()), Reply::Fail(500));
    let saved = backend.saved.clone();
    let rows = vec![json!({ "Expiry": "Weekly", "Strike": 19500 })];
    let mut controller = HomeController::new(
        backend,
        RecordingUi::default(),
        PageState::new(rows.clone(), sample_chain()),
        HomeOptions::default(),
        ProgressBar::hidden(),
    );
    assert_eq!(
        controller.toggle_record("XpryDt2", Side::Put, 1),
        Some(true)
    );
    let mut doc = home_doc("NIFTY");
    controller.save_eod_summary(&mut doc, "save").await.unwrap();

    let requests = saved.lock().unwrap();
    assert_eq!(requests[0].rows, rows);
    let monthly = &requests[0].toprecords["XpryDt2"];
    assert_eq!(
        monthly.puts,
        vec![record(19700.0, 20.0, true), record(19800.0, 5.0, true)]
    );
    assert!(monthly.calls.is_empty());
    // the page's own chain keeps unselected records
    assert_eq!(controller.state().toprecords["XpryDt2"].calls.len(), 1);
}

#[tokio::test]
async fn save_failure_restores_trigger_and_alerts() {
    let mut controller = HomeController::new(
        FakeBackend::new(Reply::Fail(500), Reply::Fail(500)),
        RecordingUi::default(),
        PageState::default(),
        HomeOptions::default(),
        ProgressBar::hidden(),
    );
    let mut doc = home_doc("NIFTY");

    let result = controller.save_eod_summary(&mut doc, "save").await;
    assert!(matches!(result, Err(ControllerError::Save { .. })));
    assert_eq!(controller.ui().alerts, vec![SAVE_FAILED_ALERT.to_string()]);
    let trigger = doc.get_element_by_id("save").unwrap();
    assert_eq!(trigger.text_content(), LABEL_SAVE);
    assert!(!trigger.is_disabled());
}

#[tokio::test]
async fn save_is_ignored_while_trigger_disabled() {
    let backend = FakeBackend::new(Reply::Message("ok".to_string()), Reply::Fail(500));
    let saved = backend.saved.clone();
    let mut controller = HomeController::new(
        backend,
        RecordingUi::default(),
        PageState::default(),
        HomeOptions::default(),
        ProgressBar::hidden(),
    );
    let mut doc = home_doc("NIFTY");
    doc.get_element_by_id_mut("save").unwrap().set_disabled(true);

    let outcome = controller.save_eod_summary(&mut doc, "save").await.unwrap();
    assert_eq!(outcome, SaveOutcome::Busy);
    assert!(saved.lock().unwrap().is_empty());
    assert!(controller.ui().alerts.is_empty());
}

#[tokio::test]
async fn save_with_missing_trigger_is_an_error() {
    let mut controller = HomeController::new(
        FakeBackend::new(Reply::Message("ok".to_string()), Reply::Fail(500)),
        RecordingUi::default(),
        PageState::default(),
        HomeOptions::default(),
        ProgressBar::hidden(),
    );
    let mut doc = home_doc("NIFTY");
    assert!(matches!(
        controller.save_eod_summary(&mut doc, "missing").await,
        Err(ControllerError::Dom(_))
    ));
}

// history controller

#[tokio::test]
async fn fetch_renders_detail_tables_into_row() {
    let mut chain = OptionsChain::new();
    chain.insert(
        "XpryDt1".to_string(),
        ExpiryGroup {
            strike: Label::from(19500.0),
            date: "25/01/24".to_string(),
            calls: vec![record(19400.0, 1000.0, true)],
            puts: vec![],
        },
    );
    let backend = FakeBackend::new(Reply::Fail(500), Reply::Chain(chain));
    let fetched = backend.fetched.clone();
    let mut controller = HistoryController::new(
        backend,
        RecordingUi::default(),
        HistoryOptions::default(),
        ProgressBar::hidden(),
    );
    let mut doc = history_doc("19500");

    let outcome = controller
        .fetch_options_data(&mut doc, "view", "19500")
        .await
        .unwrap();
    assert_eq!(outcome, DetailOutcome::Rendered { expiries: 1 });
    assert_eq!(*fetched.lock().unwrap(), vec!["19500".to_string()]);

    let row = doc.query_row_by_strike_mut("19500").unwrap();
    let cell = row
        .find(&|e: &Element| e.has_class(DETAIL_CLASS))
        .unwrap();
    assert_eq!(cell.attr("colspan"), Some("11"));
    let mut tables = Vec::new();
    cell.find_all(&|e: &Element| e.tag() == "table", &mut tables);
    assert_eq!(tables.len(), 2);
    assert!(tables[1].outer_html().contains("No Records Found"));
    assert_eq!(
        doc.get_element_by_id("view").unwrap().text_content(),
        "View"
    );
}

#[tokio::test]
async fn fetch_renders_backend_payload_for_strike_19500() {
    let chain: OptionsChain = serde_json::from_value(json!({
        "CE-2024-01-25": {
            "Strike": "19500",
            "Date": "2024-01-25",
            "CE": [{ "StrkPric": 19500, "EODOIChng": 1200 }],
            "PE": []
        }
    }))
    .unwrap();
    let mut controller = HistoryController::new(
        FakeBackend::new(Reply::Fail(500), Reply::Chain(chain)),
        RecordingUi::default(),
        HistoryOptions::default(),
        ProgressBar::hidden(),
    );
    let mut doc = history_doc("19500");
    controller
        .fetch_options_data(&mut doc, "view", "19500")
        .await
        .unwrap();

    let ce = doc.get_element_by_id("CE-2024-01-25-CE").unwrap();
    assert!(ce.outer_html().contains("<td>19500</td><td>1,200</td>"));
    let pe = doc.get_element_by_id("CE-2024-01-25-PE").unwrap();
    assert!(pe
        .outer_html()
        .contains(r#"<tbody><tr><td colspan="2">No Records Found</td></tr></tbody>"#));
}

#[tokio::test]
async fn fetch_shows_backend_message() {
    let mut controller = HistoryController::new(
        FakeBackend::new(Reply::Fail(500), Reply::Message("No data found".to_string())),
        RecordingUi::default(),
        HistoryOptions::default(),
        ProgressBar::hidden(),
    );
    let mut doc = history_doc("19500");

    let outcome = controller
        .fetch_options_data(&mut doc, "view", "19500")
        .await
        .unwrap();
    assert_eq!(outcome, DetailOutcome::Message("No data found".to_string()));
    assert!(doc
        .to_html()
        .contains(r#"<td class="strike-detail" colspan="11"><i>No data found</i></td>"#));
}

#[tokio::test]
async fn fetch_twice_reuses_detail_cell() {
    let mut controller = HistoryController::new(
        FakeBackend::new(Reply::Fail(500), Reply::Chain(sample_chain())),
        RecordingUi::default(),
        HistoryOptions {
            detail_colspan: 4,
            ..Default::default()
        },
        ProgressBar::hidden(),
    );
    let mut doc = history_doc("19500");
    controller
        .fetch_options_data(&mut doc, "view", "19500")
        .await
        .unwrap();
    controller
        .fetch_options_data(&mut doc, "view", "19500")
        .await
        .unwrap();
    assert_eq!(detail_cells(&doc), 1);
    assert!(doc.to_html().contains(r#"colspan="4""#));
}

#[tokio::test]
async fn fetch_failure_marks_cell_and_restores_button() {
    let mut controller = HistoryController::new(
        FakeBackend::new(Reply::Fail(500), Reply::Fail(503)),
        RecordingUi::default(),
        HistoryOptions::default(),
        ProgressBar::hidden(),
    );
    let mut doc = history_doc("19500");

    let result = controller.fetch_options_data(&mut doc, "view", "19500").await;
    assert!(matches!(result, Err(ControllerError::Detail { ref strike, .. }) if strike == "19500"));
    let row = doc.query_row_by_strike_mut("19500").unwrap();
    let cell = row
        .find(&|e: &Element| e.has_class(DETAIL_CLASS))
        .unwrap();
    assert_eq!(cell.text_content(), LOAD_FAILED);
    assert_eq!(
        doc.get_element_by_id("view").unwrap().text_content(),
        "View"
    );
}

#[tokio::test]
async fn fetch_for_unknown_strike_is_an_error() {
    let backend = FakeBackend::new(Reply::Fail(500), Reply::Chain(sample_chain()));
    let fetched = backend.fetched.clone();
    let mut controller = HistoryController::new(
        backend,
        RecordingUi::default(),
        HistoryOptions::default(),
        ProgressBar::hidden(),
    );
    let mut doc = history_doc("19500");
    assert!(matches!(
        controller.fetch_options_data(&mut doc, "view", "20000").await,
        Err(ControllerError::Dom(_))
    ));
    assert!(fetched.lock().unwrap().is_empty());
}

#[test]
fn update_query_param_replaces_ticker_and_navigates() {
    let mut controller = HistoryController::new(
        FakeBackend::new(Reply::Fail(500), Reply::Fail(500)),
        RecordingUi::default(),
        HistoryOptions::default(),
        ProgressBar::hidden(),
    );
    let target = controller
        .update_query_param("http://host.test/history?TckrSymb=NIFTY&page=2", "BANKNIFTY")
        .unwrap();
    assert_eq!(target, "http://host.test/history?TckrSymb=BANKNIFTY&page=2");

    let appended = controller
        .update_query_param("http://host.test/history", "NIFTY")
        .unwrap();
    assert_eq!(appended, "http://host.test/history?TckrSymb=NIFTY");
    assert_eq!(controller.ui().navigations, vec![target, appended]);

    assert!(matches!(
        controller.update_query_param("/relative", "NIFTY"),
        Err(ControllerError::InvalidPageUrl { .. })
    ));
}

#[test]
fn set_query_param_drops_duplicate_occurrences() {
    let mut url =
        reqwest::Url::parse("http://host.test/h?TckrSymb=A&x=1&TckrSymb=B").unwrap();
    crate::controller::history::set_query_param(&mut url, "TckrSymb", "C");
    assert_eq!(url.query(), Some("TckrSymb=C&x=1"));
}

// bhavcopy summary

fn bhavcopy() -> String {
    [
        "TckrSymb,FinInstrmTp,XpryDt,OptnTp,StrkPric,OpnIntrst,ChngInOpnIntrst,ClsPric",
        "NIFTY,IDO,25/01/24,CE,19400,100,10,2",
        "NIFTY,IDO,25/01/24,CE,19500,50,30,1",
        "NIFTY,IDO,25/01/24,CE,19600,10,-5,3",
        "NIFTY,IDO,25/01/24,PE,19400,20,4,5",
        "NIFTY,IDO,25/01/24,PE,19600,40,10,2.5",
        "NIFTY,IDF,25/01/24,,,500,50,21000",
        "BANKNIFTY,IDO,25/01/24,CE,45000,10,10,10",
        "NIFTY,IDO,01/02/24,CE,19400,999,999,999",
    ]
    .join("\n")
}

fn nifty_request() -> SummaryRequest {
    let date = crate::summary::parse_request_date("2024-01-25").unwrap();
    let mut request = SummaryRequest::new("nifty", 19500.0, date);
    request.weekly_expiry = Some(date);
    request
}

#[test]
fn summarize_picks_top_records_and_preselects_otm() {
    let records = crate::summary::read_bhavcopy(bhavcopy().as_bytes()).unwrap();
    assert_eq!(records.len(), 8);
    let summary = crate::summary::summarize(&records, &nifty_request()).unwrap();

    assert_eq!(
        summary.toprecords.keys().collect::<Vec<_>>(),
        vec!["XpryDt1", "XpryDt2"]
    );
    let weekly = &summary.toprecords["XpryDt1"];
    assert_eq!(weekly.date, "25/01/24");
    assert_eq!(weekly.strike, Label::from(19500.0));
    assert_eq!(
        weekly.calls,
        vec![
            record(19500.0, 30.0, false),
            record(19400.0, 20.0, true),
            record(19600.0, -15.0, false),
        ]
    );
    assert_eq!(
        weekly.puts,
        vec![record(19600.0, 25.0, true), record(19400.0, 20.0, false)]
    );
}

#[test]
fn summarize_computes_expiry_sums() {
    let records = crate::summary::read_bhavcopy(bhavcopy().as_bytes()).unwrap();
    let summary = crate::summary::summarize(&records, &nifty_request()).unwrap();
    assert_eq!(summary.rows.len(), 2);
    let row = &summary.rows[0];
    assert_eq!(row.expiry, "Weekly");
    assert_eq!(row.ticker, "NIFTY");
    assert_eq!(row.expiry_date, "25/01/24");
    assert_eq!(row.ce_oi, 280.0);
    assert_eq!(row.ce_oi_change, 35.0);
    assert_eq!(row.itm_ce_oi, 250.0);
    assert_eq!(row.itm_ce_oi_change, 50.0);
    assert_eq!(row.pe_oi, 200.0);
    assert_eq!(row.pe_oi_change, 45.0);
    assert_eq!(row.itm_pe_oi, 100.0);
    assert_eq!(row.itm_pe_oi_change, 25.0);
    assert_eq!(summary.rows[1].expiry, "Monthly");
}

#[test]
fn summarize_respects_top_n() {
    let records = crate::summary::read_bhavcopy(bhavcopy().as_bytes()).unwrap();
    let mut request = nifty_request();
    request.top_n = 1;
    let summary = crate::summary::summarize(&records, &request).unwrap();
    let weekly = &summary.toprecords["XpryDt1"];
    assert_eq!(weekly.calls.len(), 1);
    assert_eq!(weekly.puts.len(), 1);
}

#[test]
fn summarize_weekly_expiry_rules() {
    let records = crate::summary::read_bhavcopy(bhavcopy().as_bytes()).unwrap();
    let date = crate::summary::parse_request_date("2024-01-25").unwrap();

    let request = SummaryRequest::new("NIFTY", 19500.0, date);
    assert!(matches!(
        crate::summary::summarize(&records, &request),
        Err(SummaryError::MissingWeeklyExpiry { .. })
    ));

    let request = SummaryRequest::new("FINNIFTY", 21000.0, date);
    let summary = crate::summary::summarize(&records, &request).unwrap();
    assert_eq!(
        summary.toprecords.keys().collect::<Vec<_>>(),
        vec!["XpryDt2"]
    );
    assert_eq!(summary.rows[0].expiry, "Monthly");

    let mut request = SummaryRequest::new("BANKNIFTY", 45000.0, date);
    request.weekly_expiry = Some(date);
    let summary = crate::summary::summarize(&records, &request).unwrap();
    assert_eq!(
        summary.toprecords.keys().collect::<Vec<_>>(),
        vec!["XpryDt2"]
    );
    assert_eq!(summary.rows.len(), 1);
    assert_eq!(summary.toprecords["XpryDt2"].calls.len(), 1);
}

#[test]
fn summary_into_page_state_keeps_wire_names() {
    let records = crate::summary::read_bhavcopy(bhavcopy().as_bytes()).unwrap();
    let state = crate::summary::summarize(&records, &nifty_request())
        .unwrap()
        .into_page_state();
    assert_eq!(state.rows.len(), 2);
    assert_eq!(state.rows[0]["TckrSymb"], json!("NIFTY"));
    assert_eq!(state.rows[0]["EOD_CE_OI_Sum"], json!(280.0));
    assert_eq!(state.rows[0]["Strike"], json!(19500));
}

#[test]
fn read_bhavcopy_sniffs_delimiter_and_rejects_empty() {
    let csv = bhavcopy().replace(',', ";");
    let records = crate::summary::read_bhavcopy(csv.as_bytes()).unwrap();
    assert_eq!(records[0].ticker, "NIFTY");
    assert_eq!(records[0].side(), Some(Side::Call));
    assert_eq!(records[5].strike_price, None);

    assert!(matches!(
        crate::summary::read_bhavcopy("  \n".as_bytes()),
        Err(SummaryError::Empty)
    ));
}

#[test]
fn read_bhavcopy_names_missing_column() {
    let csv = "TckrSymb,XpryDt,OptnTp,StrkPric\nNIFTY,25/01/24,CE,19500";
    match crate::summary::read_bhavcopy(csv.as_bytes()) {
        Err(SummaryError::MissingColumn { name }) => assert_eq!(name, "FinInstrmTp"),
        other => panic!("expected missing column, got {other:?}"),
    }
}

#[test]
fn expiry_column_accepts_common_layouts() {
    let expected = chrono::NaiveDate::from_ymd_opt(2024, 1, 25);
    for raw in ["25/01/24", "25/01/2024", "2024-01-25", "25-Jan-2024"] {
        assert_eq!(crate::summary::parse_expiry(raw), expected, "{raw}");
    }
    assert_eq!(crate::summary::parse_expiry("soon"), None);
}

// config and output

#[test]
fn config_accepts_legacy_detail_path_key() {
    let cfg = crate::config::parse_config("get_data_path: /detail\n", "test").unwrap();
    assert_eq!(cfg.detail_path.as_deref(), Some("/detail"));
    assert!(crate::config::parse_config("timeout: soon\n", "test").is_err());
}

#[test]
fn config_file_roundtrip_and_missing_file_rules() {
    let dir = std::env::temp_dir().join(format!("eodsummary-test-{}", std::process::id()));
    let path = dir.join("config.yml");
    let _ = std::fs::remove_dir_all(&dir);

    assert!(crate::config::load_config(&path, true).is_ok());
    assert!(crate::config::load_config(&path, false).is_err());

    crate::config::ensure_default_config_file(&path).unwrap();
    let cfg = crate::config::load_config(&path, false).unwrap();
    assert_eq!(cfg.base_url.as_deref(), Some("http://127.0.0.1:5000"));
    assert_eq!(cfg.weekly_disabled_ticker.as_deref(), Some("BANKNIFTY"));
    assert_eq!(cfg.top_n, Some(10));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn output_format_resolution() {
    use crate::output::{resolve_format, OutputFormat};
    assert_eq!(
        resolve_format(Some("HTML"), Some("x.json"), OutputFormat::Json).unwrap(),
        OutputFormat::Html
    );
    assert_eq!(
        resolve_format(None, Some("out.htm"), OutputFormat::Json).unwrap(),
        OutputFormat::Html
    );
    assert_eq!(
        resolve_format(None, None, OutputFormat::Json).unwrap(),
        OutputFormat::Json
    );
    assert!(resolve_format(Some("xml"), None, OutputFormat::Json).is_err());
}
