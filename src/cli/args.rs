use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "eodsummary",
    version,
    about = "end-of-day option-chain summary client",
    long_about = "eodsummary builds the end-of-day option-chain summary from a bhavcopy, renders the strike tables, and syncs selections with the summary backend.\n\nExamples:\n  eodsummary summarize -f bhav.csv -k NIFTY -s 19500 --weekly 2024-01-25 --monthly 2024-01-25 -o state.json\n  eodsummary select -i state.json\n  eodsummary save -i state.json --base-url http://127.0.0.1:5000\n  eodsummary fetch 19500 -o detail.html\n\nTip: Use --config to persist backend settings and keep CLI invocations short.",
    arg_required_else_help = true
)]
pub struct CliArgs {
    #[arg(
        short = 'v',
        long = "vb",
        visible_alias = "verbose",
        action = ArgAction::Count,
        global = true,
        help_heading = "Output",
        help = "Increase verbosity (-v, -vv)."
    )]
    pub verbose: u8,

    #[arg(
        short = 'n',
        long = "nc",
        visible_alias = "no-color",
        global = true,
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,

    #[arg(
        short = 'C',
        long = "cfg",
        visible_alias = "config",
        value_name = "FILE",
        global = true,
        help_heading = "Input",
        help = "Path to config file (defaults to ~/.eodsummary/config.yml)."
    )]
    pub config: Option<String>,

    #[arg(
        short = 'b',
        long = "bu",
        visible_alias = "base-url",
        value_name = "URL",
        global = true,
        help_heading = "HTTP",
        help = "Backend base URL (e.g. http://127.0.0.1:5000)."
    )]
    pub base_url: Option<String>,

    #[arg(
        short = 'T',
        long = "to",
        visible_alias = "timeout",
        value_name = "SECONDS",
        global = true,
        help_heading = "HTTP",
        help = "Per-request timeout in seconds."
    )]
    pub timeout: Option<usize>,

    #[arg(
        short = 'p',
        long = "px",
        visible_alias = "proxy",
        value_name = "URL",
        global = true,
        help_heading = "HTTP",
        help = "HTTP proxy URL (e.g. http://127.0.0.1:8080)."
    )]
    pub proxy: Option<String>,

    #[arg(
        short = 'H',
        long = "hdr",
        visible_alias = "header",
        value_name = "HEADER",
        global = true,
        help_heading = "HTTP",
        help = "Add a header to all requests (format: 'Key: Value')."
    )]
    pub header: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Build the page data set (summary rows + top records) from a bhavcopy.
    Summarize(SummarizeArgs),
    /// Render the option tables (and summary table, for a page state) as HTML.
    Render(RenderArgs),
    /// Reduce a page state or chain to its selected records.
    Select(SelectArgs),
    /// Flip the selection of individual records in a page state.
    Toggle(ToggleArgs),
    /// Post the selected records to the backend.
    Save(SaveArgs),
    /// Load the per-strike detail tables from the backend.
    Fetch(FetchArgs),
    /// Copy one rendered table in spreadsheet-friendly markup.
    Copy(CopyArgs),
    /// Format a raw value the way the summary table shows it.
    Format(FormatArgs),
    /// Print the history page URL for another ticker.
    #[command(name = "ticker-url")]
    TickerUrl(TickerUrlArgs),
    /// Write the default config file if it does not exist yet.
    #[command(name = "config-init")]
    ConfigInit(ConfigInitArgs),
}

#[derive(Args, Debug, Clone)]
pub struct OutputArgs {
    #[arg(
        short = 'o',
        long = "out",
        visible_alias = "output",
        value_name = "FILE",
        help_heading = "Output",
        help = "Write results to a file (stdout when omitted)."
    )]
    pub output: Option<String>,

    #[arg(
        short = 'A',
        long = "of",
        visible_alias = "output-format",
        value_name = "FORMAT",
        help_heading = "Output",
        help = "Output format (json or html)."
    )]
    pub output_format: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct SummarizeArgs {
    #[arg(
        short = 'f',
        long = "fl",
        visible_alias = "file",
        value_name = "FILE",
        help_heading = "Input",
        help = "Bhavcopy CSV file."
    )]
    pub file: String,

    #[arg(
        short = 'k',
        long = "tk",
        visible_alias = "ticker",
        value_name = "SYMBOL",
        help_heading = "Input",
        help = "Ticker symbol (e.g. NIFTY)."
    )]
    pub ticker: String,

    #[arg(
        short = 's',
        long = "st",
        visible_alias = "strike",
        value_name = "PRICE",
        help_heading = "Input",
        help = "Reference strike price."
    )]
    pub strike: String,

    #[arg(
        long = "wk",
        visible_alias = "weekly",
        value_name = "YYYY-MM-DD",
        help_heading = "Input",
        help = "Weekly expiry date (ignored for the weekly-disabled ticker)."
    )]
    pub weekly: Option<String>,

    #[arg(
        long = "mo",
        visible_alias = "monthly",
        value_name = "YYYY-MM-DD",
        help_heading = "Input",
        help = "Monthly expiry date."
    )]
    pub monthly: String,

    #[arg(
        long = "fd",
        visible_alias = "file-date",
        value_name = "DATE",
        help_heading = "Input",
        help = "Report date carried into the summary rows."
    )]
    pub file_date: Option<String>,

    #[arg(
        long = "top",
        visible_alias = "top-n",
        value_name = "N",
        help_heading = "Input",
        help = "Records kept per expiry and side."
    )]
    pub top_n: Option<usize>,

    #[command(flatten)]
    pub out: OutputArgs,
}

#[derive(Args, Debug, Clone)]
pub struct RenderArgs {
    #[arg(
        short = 'i',
        long = "if",
        visible_alias = "input",
        value_name = "FILE",
        help_heading = "Input",
        help = "Page state or option chain JSON."
    )]
    pub input: String,

    #[command(flatten)]
    pub out: OutputArgs,
}

#[derive(Args, Debug, Clone)]
pub struct SelectArgs {
    #[arg(
        short = 'i',
        long = "if",
        visible_alias = "input",
        value_name = "FILE",
        help_heading = "Input",
        help = "Page state or option chain JSON."
    )]
    pub input: String,

    #[command(flatten)]
    pub out: OutputArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ToggleArgs {
    #[arg(
        short = 'i',
        long = "if",
        visible_alias = "input",
        value_name = "FILE",
        help_heading = "Input",
        help = "Page state JSON."
    )]
    pub input: String,

    #[arg(
        short = 'r',
        long = "rec",
        visible_alias = "record",
        value_name = "EXPIRY:SIDE:INDEX",
        action = ArgAction::Append,
        required = true,
        help_heading = "Input",
        help = "Record to flip (repeatable, e.g. XpryDt1:CE:0)."
    )]
    pub records: Vec<String>,

    #[command(flatten)]
    pub out: OutputArgs,
}

#[derive(Args, Debug, Clone)]
pub struct SaveArgs {
    #[arg(
        short = 'i',
        long = "if",
        visible_alias = "input",
        value_name = "FILE",
        help_heading = "Input",
        help = "Page state JSON."
    )]
    pub input: String,

    #[arg(
        short = 'k',
        long = "tk",
        visible_alias = "ticker",
        value_name = "SYMBOL",
        help_heading = "Input",
        help = "Ticker shown on the page (drives the weekly expiry field)."
    )]
    pub ticker: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct FetchArgs {
    #[arg(value_name = "STRIKE", help = "Strike whose detail to load.")]
    pub strike: String,

    #[command(flatten)]
    pub out: OutputArgs,
}

#[derive(Args, Debug, Clone)]
pub struct CopyArgs {
    #[arg(
        short = 'i',
        long = "if",
        visible_alias = "input",
        value_name = "FILE",
        help_heading = "Input",
        help = "Page state or option chain JSON."
    )]
    pub input: String,

    #[arg(
        short = 't',
        long = "tbl",
        visible_alias = "table",
        value_name = "ID",
        help_heading = "Input",
        help = "Table id (e.g. XpryDt1-CE, or summary)."
    )]
    pub table: String,

    #[arg(
        short = 'o',
        long = "out",
        visible_alias = "output",
        value_name = "FILE",
        help_heading = "Output",
        help = "Clipboard file (stdout when omitted)."
    )]
    pub output: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct FormatArgs {
    #[arg(value_name = "VALUE", help = "Raw value to format.")]
    pub value: String,

    #[arg(
        short = 'd',
        long = "dt",
        visible_alias = "date",
        help_heading = "Input",
        help = "Format as a date instead of a number."
    )]
    pub date: bool,
}

#[derive(Args, Debug, Clone)]
pub struct TickerUrlArgs {
    #[arg(
        short = 'u',
        long = "u",
        visible_alias = "url",
        value_name = "URL",
        help_heading = "Input",
        help = "Current history page URL."
    )]
    pub url: String,

    #[arg(
        short = 'k',
        long = "tk",
        visible_alias = "ticker",
        value_name = "SYMBOL",
        help_heading = "Input",
        help = "Ticker to switch to."
    )]
    pub ticker: String,
}

#[derive(Args, Debug, Clone)]
pub struct ConfigInitArgs {
    #[arg(
        long = "pth",
        visible_alias = "path",
        value_name = "FILE",
        help_heading = "Output",
        help = "Where to write the config (defaults to ~/.eodsummary/config.yml)."
    )]
    pub path: Option<String>,
}
