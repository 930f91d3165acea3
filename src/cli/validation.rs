use crate::cli::args::{CliArgs, Command};

pub fn validate(args: &CliArgs) -> Result<(), String> {
    if let Some(timeout) = args.timeout {
        if timeout == 0 {
            return Err("invalid timeout, expected positive integer".to_string());
        }
    }
    if let Some(raw) = args.header.as_deref() {
        crate::client::parse_header(raw).map_err(|e| format!("invalid --header '{raw}': {e}"))?;
    }
    if let Some(raw) = args.base_url.as_deref() {
        reqwest::Url::parse(raw).map_err(|e| format!("invalid --base-url '{raw}': {e}"))?;
    }

    match &args.command {
        Command::Summarize(cmd) => {
            crate::utils::parse_ticker(&cmd.ticker)
                .map_err(|e| format!("invalid --ticker '{}': {e}", cmd.ticker))?;
            crate::utils::parse_strike(&cmd.strike)
                .map_err(|e| format!("invalid --strike '{}': {e}", cmd.strike))?;
            crate::summary::parse_request_date(&cmd.monthly)
                .map_err(|e| format!("invalid --monthly: {e}"))?;
            if let Some(raw) = cmd.weekly.as_deref() {
                crate::summary::parse_request_date(raw)
                    .map_err(|e| format!("invalid --weekly: {e}"))?;
            }
            if cmd.top_n == Some(0) {
                return Err("invalid top-n, expected positive integer".to_string());
            }
        }
        Command::Toggle(cmd) => {
            for raw in cmd.records.iter() {
                crate::utils::parse_toggle_spec(raw)
                    .map_err(|e| format!("invalid --record '{raw}': {e}"))?;
            }
        }
        Command::Save(cmd) => {
            if let Some(raw) = cmd.ticker.as_deref() {
                crate::utils::parse_ticker(raw)
                    .map_err(|e| format!("invalid --ticker '{raw}': {e}"))?;
            }
        }
        Command::Fetch(cmd) => {
            if cmd.strike.trim().is_empty() {
                return Err("strike is empty".to_string());
            }
        }
        Command::TickerUrl(cmd) => {
            reqwest::Url::parse(&cmd.url).map_err(|e| format!("invalid --url '{}': {e}", cmd.url))?;
            crate::utils::parse_ticker(&cmd.ticker)
                .map_err(|e| format!("invalid --ticker '{}': {e}", cmd.ticker))?;
        }
        _ => {}
    }

    let out = match &args.command {
        Command::Summarize(cmd) => Some(&cmd.out),
        Command::Render(cmd) => Some(&cmd.out),
        Command::Select(cmd) => Some(&cmd.out),
        Command::Toggle(cmd) => Some(&cmd.out),
        Command::Fetch(cmd) => Some(&cmd.out),
        _ => None,
    };
    if let Some(raw) = out.and_then(|o| o.output_format.as_deref()) {
        crate::output::OutputFormat::parse(raw)
            .ok_or_else(|| format!("invalid --output-format '{raw}', expected json or html"))?;
    }
    Ok(())
}
