use std::time::Duration;

use clap::{error::ErrorKind, CommandFactory, Parser};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::cli::args::{
    CliArgs, Command, CopyArgs, FetchArgs, FormatArgs, OutputArgs, RenderArgs, SaveArgs,
    SelectArgs, SummarizeArgs, TickerUrlArgs, ToggleArgs,
};
use crate::cli::validation;
use crate::client::{ClientOptions, HttpBackend};
use crate::config::{self, ConfigFile};
use crate::controller::history::DETAIL_CLASS;
use crate::controller::home::{LABEL_SAVE, TICKER_ID, WEEKLY_EXPIRY_ID};
use crate::controller::{
    DetailOutcome, HistoryController, HistoryOptions, HomeController, HomeOptions, SaveOutcome,
    Ui,
};
use crate::dom::{Document, Element};
use crate::format::{self, Clipboard, WriterClipboard};
use crate::model::{OptionsChain, PageState};
use crate::output::{self, OutputFormat};
use crate::summary::{self, SummaryRequest, SummaryRow, DEFAULT_TOP_N};

const SAVE_BUTTON_ID: &str = "save-eod-summary";

fn format_kv_line(label: &str, value: &str) {
    eprintln!(":: {:<10}: {}", label, value);
}

/// Alerts go to stderr around the spinner; navigation prints the target URL.
struct ConsoleUi {
    pb: ProgressBar,
}

impl Ui for ConsoleUi {
    fn alert(&mut self, message: &str) {
        self.pb
            .suspend(|| eprintln!("{} {}", "::".bold().cyan(), message.bold()));
    }

    fn navigate(&mut self, url: &str) {
        self.pb.suspend(|| println!("{url}"));
    }
}

#[derive(Clone, Debug)]
struct RunConfig {
    client: ClientOptions,
    home: HomeOptions,
    history: HistoryOptions,
    top_n: usize,
    no_color: bool,
    verbose: u8,
    command: Command,
}

fn build_run_config(args: CliArgs, cfg: ConfigFile) -> Result<RunConfig, String> {
    validation::validate(&args)?;

    let defaults = ClientOptions::default();
    let client = ClientOptions {
        base_url: args
            .base_url
            .or(cfg.base_url)
            .unwrap_or(defaults.base_url),
        save_path: cfg.save_path.unwrap_or(defaults.save_path),
        detail_path: cfg.detail_path.unwrap_or(defaults.detail_path),
        timeout_seconds: args
            .timeout
            .or(cfg.timeout)
            .unwrap_or(defaults.timeout_seconds),
        proxy: args.proxy.or(cfg.proxy).filter(|p| !p.trim().is_empty()),
        header: args.header.or(cfg.header).filter(|h| !h.trim().is_empty()),
    };
    if client.timeout_seconds == 0 {
        return Err("invalid timeout, expected positive integer".to_string());
    }

    let mut home = HomeOptions::default();
    if let Some(ticker) = cfg.weekly_disabled_ticker {
        home.weekly_disabled_ticker = crate::utils::parse_ticker(&ticker)
            .map_err(|e| format!("invalid weekly_disabled_ticker '{ticker}': {e}"))?;
    }

    let mut history = HistoryOptions::default();
    if let Some(param) = cfg.ticker_param.filter(|p| !p.trim().is_empty()) {
        history.ticker_param = param;
    }
    if let Some(colspan) = cfg.detail_colspan {
        if colspan == 0 {
            return Err("invalid detail_colspan, expected positive integer".to_string());
        }
        history.detail_colspan = colspan;
    }

    let top_n = cfg.top_n.unwrap_or(DEFAULT_TOP_N);
    if top_n == 0 {
        return Err("invalid top_n, expected positive integer".to_string());
    }

    Ok(RunConfig {
        client,
        home,
        history,
        top_n,
        no_color: args.no_color || cfg.no_color.unwrap_or(false),
        verbose: args.verbose,
        command: args.command,
    })
}

fn spinner(message: &str) -> Result<ProgressBar, String> {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_style(
        ProgressStyle::with_template(":: {spinner} {msg} :: Duration: [{elapsed_precise}]")
            .map_err(|e| format!("failed to build progress bar style: {e}"))?,
    );
    pb.set_message(message.to_string());
    Ok(pb)
}

fn console() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb
}

fn print_backend(run: &RunConfig) {
    if run.verbose == 0 {
        return;
    }
    format_kv_line("Backend", &run.client.base_url);
    format_kv_line("Timeout", &format!("{}s", run.client.timeout_seconds));
    if let Some(proxy) = run.client.proxy.as_deref() {
        format_kv_line("Proxy", proxy);
    }
    if run.verbose > 1 {
        if let Some(header) = run.client.header.as_deref() {
            format_kv_line("Header", header);
        }
    }
}

/// A page state file, or a bare option chain (then with no summary rows).
fn read_state(path: &str) -> Result<PageState, String> {
    let value: serde_json::Value = crate::utils::read_json_file(std::path::Path::new(path))?;
    let is_state = value
        .as_object()
        .map(|o| o.contains_key("toprecords") || o.contains_key("rows"))
        .unwrap_or(false);
    if is_state {
        return serde_json::from_value::<PageState>(value)
            .map_err(|e| format!("invalid page state '{path}': {e}"));
    }
    let chain = serde_json::from_value::<OptionsChain>(value)
        .map_err(|e| format!("invalid option chain '{path}': {e}"))?;
    Ok(PageState::new(Vec::new(), chain))
}

fn summary_rows(state: &PageState) -> Vec<SummaryRow> {
    state
        .rows
        .iter()
        .filter_map(|row| serde_json::from_value::<SummaryRow>(row.clone()).ok())
        .collect()
}

fn page_fragment(rows: &[SummaryRow], chain: &OptionsChain) -> Element {
    let mut page = Element::new("div").with_class("page");
    if !rows.is_empty() {
        page.append(crate::render::summary_table(rows));
    }
    page.append(crate::render::generate_tables(chain));
    page
}

fn home_document(ticker: &str) -> Document {
    Document::new(
        Element::new("body")
            .with_child(
                Element::new("select")
                    .with_attr("id", TICKER_ID)
                    .with_attr("value", ticker),
            )
            .with_child(Element::new("input").with_attr("id", WEEKLY_EXPIRY_ID))
            .with_child(
                Element::new("button")
                    .with_attr("id", SAVE_BUTTON_ID)
                    .with_text(LABEL_SAVE),
            ),
    )
}

fn detail_button_id(strike: &str) -> String {
    format!("show-{strike}")
}

fn history_document(strike: &str) -> Document {
    let row = Element::new("tr")
        .with_attr("data-strike", strike)
        .with_child(Element::new("td").with_text(strike))
        .with_child(
            Element::new("td").with_child(
                Element::new("button")
                    .with_attr("id", detail_button_id(strike))
                    .with_text("Show"),
            ),
        );
    Document::new(
        Element::new("body").with_child(
            Element::new("table")
                .with_class("summary-table")
                .with_child(Element::new("tbody").with_child(row)),
        ),
    )
}

fn html_or_json(out: &OutputArgs, markup: Element, json: serde_json::Value) -> Result<(), String> {
    let format = output::resolve_format(
        out.output_format.as_deref(),
        out.output.as_deref(),
        OutputFormat::Html,
    )?;
    let bytes = match format {
        OutputFormat::Html => output::render_html(&markup),
        OutputFormat::Json => output::render_json(&json),
    };
    output::write_output(out.output.as_deref(), &bytes)
}

fn run_summarize(run: &RunConfig, cmd: &SummarizeArgs) -> Result<(), String> {
    let file = std::fs::File::open(&cmd.file)
        .map_err(|e| format!("failed to open bhavcopy '{}': {e}", cmd.file))?;
    let records = summary::read_bhavcopy(file).map_err(|e| format!("{}: {e}", cmd.file))?;

    let ticker = crate::utils::parse_ticker(&cmd.ticker)?;
    let strike = crate::utils::parse_strike(&cmd.strike)?;
    let monthly = summary::parse_request_date(&cmd.monthly).map_err(|e| e.to_string())?;
    let weekly = cmd
        .weekly
        .as_deref()
        .map(summary::parse_request_date)
        .transpose()
        .map_err(|e| e.to_string())?;

    let mut request = SummaryRequest::new(&ticker, strike, monthly);
    request.weekly_expiry = weekly;
    request.file_date = cmd.file_date.clone();
    request.top_n = cmd.top_n.unwrap_or(run.top_n);
    request.weekly_disabled_ticker = run.home.weekly_disabled_ticker.clone();

    let summary = summary::summarize(&records, &request).map_err(|e| e.to_string())?;
    if run.verbose > 0 {
        format_kv_line("Records", &records.len().to_string());
        format_kv_line("Expiries", &summary.toprecords.len().to_string());
    }

    let format = output::resolve_format(
        cmd.out.output_format.as_deref(),
        cmd.out.output.as_deref(),
        OutputFormat::Json,
    )?;
    let bytes = match format {
        OutputFormat::Html => output::render_html(&page_fragment(&summary.rows, &summary.toprecords)),
        OutputFormat::Json => output::render_json(&summary.into_page_state()),
    };
    output::write_output(cmd.out.output.as_deref(), &bytes)
}

fn run_render(cmd: &RenderArgs) -> Result<(), String> {
    let state = read_state(&cmd.input)?;
    let markup = page_fragment(&summary_rows(&state), &state.toprecords);
    let json = serde_json::json!({ "html": markup.outer_html() });
    html_or_json(&cmd.out, markup, json)
}

fn run_select(cmd: &SelectArgs) -> Result<(), String> {
    let state = read_state(&cmd.input)?;
    let selection = crate::select::extract_is_selected_records(&state.toprecords);
    let format = output::resolve_format(
        cmd.out.output_format.as_deref(),
        cmd.out.output.as_deref(),
        OutputFormat::Json,
    )?;
    let bytes = match format {
        OutputFormat::Html => output::render_html(&crate::render::generate_tables(&selection)),
        OutputFormat::Json => output::render_json(&selection),
    };
    output::write_output(cmd.out.output.as_deref(), &bytes)
}

fn run_toggle(run: &RunConfig, cmd: &ToggleArgs) -> Result<(), String> {
    let mut state = read_state(&cmd.input)?;
    for raw in cmd.records.iter() {
        let (expiry, side, index) = crate::utils::parse_toggle_spec(raw)?;
        let selected = state
            .toggle_record(&expiry, side, index)
            .ok_or_else(|| format!("no record at '{raw}'"))?;
        if run.verbose > 0 {
            format_kv_line(raw, if selected { "selected" } else { "unselected" });
        }
    }
    let format = output::resolve_format(
        cmd.out.output_format.as_deref(),
        cmd.out.output.as_deref(),
        OutputFormat::Json,
    )?;
    let bytes = match format {
        OutputFormat::Html => output::render_html(&page_fragment(
            &summary_rows(&state),
            &state.toprecords,
        )),
        OutputFormat::Json => output::render_json(&state),
    };
    output::write_output(cmd.out.output.as_deref(), &bytes)
}

async fn run_save(run: &RunConfig, cmd: &SaveArgs) -> Result<(), String> {
    let state = read_state(&cmd.input)?;
    let ticker = match cmd.ticker.as_deref() {
        Some(raw) => crate::utils::parse_ticker(raw)?,
        None => summary_rows(&state)
            .first()
            .map(|r| r.ticker.clone())
            .unwrap_or_default(),
    };
    let backend = HttpBackend::new(&run.client).map_err(|e| e.to_string())?;
    if run.verbose > 0 {
        if let Ok(url) = backend.save_url() {
            format_kv_line("Save", url.as_str());
        }
    }

    let pb = spinner("Saving")?;
    let ui = ConsoleUi { pb: pb.clone() };
    let mut doc = home_document(&ticker);
    let mut controller = HomeController::new(backend, ui, state, run.home.clone(), pb.clone());
    controller.init(&mut doc).map_err(|e| e.to_string())?;
    let outcome = controller.save_eod_summary(&mut doc, SAVE_BUTTON_ID).await;
    pb.finish_and_clear();

    match outcome.map_err(|e| e.to_string())? {
        SaveOutcome::Saved { message } => {
            if run.verbose > 1 {
                format_kv_line("Page", &doc.to_html());
            }
            println!("{message}");
            Ok(())
        }
        SaveOutcome::Busy => Err("a save is already in progress".to_string()),
    }
}

async fn run_fetch(run: &RunConfig, cmd: &FetchArgs) -> Result<(), String> {
    let strike = cmd.strike.trim().to_string();
    let backend = HttpBackend::new(&run.client).map_err(|e| e.to_string())?;
    if run.verbose > 0 {
        if let Ok(url) = backend.detail_url(&strike) {
            format_kv_line("Detail", url.as_str());
        }
    }

    let pb = spinner("Loading")?;
    let ui = ConsoleUi { pb: pb.clone() };
    let mut doc = history_document(&strike);
    let mut controller = HistoryController::new(backend, ui, run.history.clone(), pb.clone());
    let outcome = controller
        .fetch_options_data(&mut doc, &detail_button_id(&strike), &strike)
        .await;
    pb.finish_and_clear();

    let outcome = outcome.map_err(|e| e.to_string())?;
    if let DetailOutcome::Message(message) = &outcome {
        eprintln!("{} {}", "::".bold().cyan(), message.bold());
    }

    let row = doc
        .query_row_by_strike_mut(&strike)
        .map_err(|e| e.to_string())?;
    let cell = row
        .find(&|e: &Element| e.has_class(DETAIL_CLASS))
        .cloned()
        .ok_or_else(|| format!("no detail rendered for strike {strike}"))?;
    let json = serde_json::json!({ "strike": strike, "html": cell.inner_html() });
    html_or_json(&cmd.out, cell, json)
}

fn run_copy(cmd: &CopyArgs) -> Result<(), String> {
    let state = read_state(&cmd.input)?;
    let doc = Document::new(
        Element::new("body").with_child(page_fragment(&summary_rows(&state), &state.toprecords)),
    );
    let mut clipboard: Box<dyn Clipboard> = match cmd.output.as_deref() {
        Some(path) => {
            let file = std::fs::File::create(path)
                .map_err(|e| format!("failed to create clipboard file '{path}': {e}"))?;
            Box::new(WriterClipboard::new(file))
        }
        None => Box::new(WriterClipboard::new(std::io::stdout())),
    };
    let pb = console();
    format::copy_table_as_csv(&doc, &cmd.table, clipboard.as_mut(), &pb)
        .map_err(|e| e.to_string())
}

fn run_format(cmd: &FormatArgs) -> Result<(), String> {
    let formatted = if cmd.date {
        format::format_date(&cmd.value)
    } else {
        format::format_number(&cmd.value)
    };
    println!("{formatted}");
    Ok(())
}

fn run_ticker_url(run: &RunConfig, cmd: &TickerUrlArgs) -> Result<(), String> {
    let ticker = crate::utils::parse_ticker(&cmd.ticker)?;
    let backend = HttpBackend::new(&run.client).map_err(|e| e.to_string())?;
    let pb = console();
    let ui = ConsoleUi { pb: pb.clone() };
    let mut controller = HistoryController::new(backend, ui, run.history.clone(), pb);
    controller
        .update_query_param(&cmd.url, &ticker)
        .map(|_| ())
        .map_err(|e| e.to_string())
}

fn run_config_init(path: Option<&str>) -> Result<(), String> {
    let path = match path {
        Some(p) => config::expand_tilde(p),
        None => config::default_config_path()
            .ok_or_else(|| "could not determine home directory".to_string())?,
    };
    let existed = path.exists();
    config::ensure_default_config_file(&path)?;
    if existed {
        eprintln!("{} {}", "exists".bold().yellow(), path.display());
    } else {
        eprintln!("{} {}", "created".bold().green(), path.display());
    }
    Ok(())
}

fn block_on<F>(future: F) -> Result<(), String>
where
    F: std::future::Future<Output = Result<(), String>>,
{
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to build runtime: {e}"))?;
    rt.block_on(future)
}

fn dispatch(run: RunConfig) -> Result<(), String> {
    if run.no_color {
        colored::control::set_override(false);
    }
    match &run.command {
        Command::Summarize(cmd) => run_summarize(&run, cmd),
        Command::Render(cmd) => run_render(cmd),
        Command::Select(cmd) => run_select(cmd),
        Command::Toggle(cmd) => run_toggle(&run, cmd),
        Command::Save(cmd) => {
            print_backend(&run);
            block_on(run_save(&run, cmd))
        }
        Command::Fetch(cmd) => {
            print_backend(&run);
            block_on(run_fetch(&run, cmd))
        }
        Command::Copy(cmd) => run_copy(cmd),
        Command::Format(cmd) => run_format(cmd),
        Command::TickerUrl(cmd) => run_ticker_url(&run, cmd),
        Command::ConfigInit(cmd) => run_config_init(cmd.path.as_deref()),
    }
}

pub fn run_cli() -> Result<(), String> {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp => {
                print!("{e}");
                return Ok(());
            }
            ErrorKind::DisplayVersion => {
                let cmd = CliArgs::command();
                print!("{}", cmd.render_version());
                return Ok(());
            }
            _ => return Err(e.to_string()),
        },
    };

    let cfg = match args.config.as_deref() {
        Some(raw) => config::load_config(&config::expand_tilde(raw), false)?,
        None => match config::default_config_path() {
            Some(path) => config::load_config(&path, true)?,
            None => ConfigFile::default(),
        },
    };

    let run = build_run_config(args, cfg)?;
    dispatch(run)
}
