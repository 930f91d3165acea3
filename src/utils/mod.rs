use std::path::Path;

use serde::de::DeserializeOwned;

use crate::model::Side;

pub fn parse_strike(value: &str) -> Result<f64, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("strike is empty".to_string());
    }
    let strike: f64 = trimmed
        .parse()
        .map_err(|_| format!("invalid strike '{trimmed}'"))?;
    if !strike.is_finite() || strike < 0.0 {
        return Err(format!("invalid strike '{trimmed}'"));
    }
    Ok(strike)
}

pub fn parse_ticker(value: &str) -> Result<String, String> {
    let ticker = value.trim().to_uppercase();
    if ticker.is_empty() {
        return Err("ticker is empty".to_string());
    }
    if !ticker
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '&')
    {
        return Err(format!("invalid ticker '{value}'"));
    }
    Ok(ticker)
}

/// `EXPIRY:SIDE:INDEX`, e.g. `XpryDt1:CE:0`.
pub fn parse_toggle_spec(value: &str) -> Result<(String, Side, usize), String> {
    let parts: Vec<&str> = value.trim().split(':').collect();
    if parts.len() != 3 {
        return Err("expected format EXPIRY:SIDE:INDEX".to_string());
    }
    let expiry = parts[0].trim();
    if expiry.is_empty() {
        return Err("expiry key is empty".to_string());
    }
    let side = Side::parse(parts[1]).ok_or_else(|| format!("invalid side '{}'", parts[1]))?;
    let index: usize = parts[2]
        .trim()
        .parse()
        .map_err(|_| format!("invalid index '{}'", parts[2]))?;
    Ok((expiry.to_string(), side, index))
}

pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T, String> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read '{}': {e}", path.display()))?;
    serde_json::from_str(&contents)
        .map_err(|e| format!("failed to parse '{}': {e}", path.display()))
}
