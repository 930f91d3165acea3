use std::io::Write;

use serde::Serialize;

use crate::dom::Element;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Html,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "html" | "htm" => Some(Self::Html),
            _ => None,
        }
    }
}

pub fn infer_format_from_path(path: &str) -> Option<OutputFormat> {
    let lower = path.trim().to_lowercase();
    if lower.ends_with(".json") {
        return Some(OutputFormat::Json);
    }
    if lower.ends_with(".html") || lower.ends_with(".htm") {
        return Some(OutputFormat::Html);
    }
    None
}

/// Explicit format wins, then the output file's extension, then `fallback`.
pub fn resolve_format(
    explicit: Option<&str>,
    path: Option<&str>,
    fallback: OutputFormat,
) -> Result<OutputFormat, String> {
    if let Some(raw) = explicit {
        return OutputFormat::parse(raw)
            .ok_or_else(|| format!("invalid output format '{raw}', expected json or html"));
    }
    Ok(path.and_then(infer_format_from_path).unwrap_or(fallback))
}

pub fn render_json<T: Serialize>(value: &T) -> Vec<u8> {
    let mut out = serde_json::to_vec_pretty(value).unwrap_or_else(|_| b"{}".to_vec());
    out.push(b'\n');
    out
}

pub fn render_html(element: &Element) -> Vec<u8> {
    let mut out = element.outer_html().into_bytes();
    out.push(b'\n');
    out
}

/// Write to `path`, or stdout when no path is given.
pub fn write_output(path: Option<&str>, bytes: &[u8]) -> Result<(), String> {
    match path {
        Some(path) => std::fs::write(path, bytes)
            .map_err(|e| format!("failed to write output file '{path}': {e}")),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(bytes)
                .and_then(|_| stdout.flush())
                .map_err(|e| format!("failed to write output: {e}"))
        }
    }
}
