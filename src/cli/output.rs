//! CLI Output Formatting.
//!
//! Renders command reports as styled text or JSON.

use console::style;
use serde::{Deserialize, Serialize};

use super::config::ConfigError;
use crate::utils::math::pow10;

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT FORMAT
// ═══════════════════════════════════════════════════════════════════════════════

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON format
    Json,
    /// Pretty JSON format
    JsonPretty,
}

impl OutputFormat {
    /// Format name
    pub fn name(&self) -> &'static str {
        match self {
            OutputFormat::Text => "text",
            OutputFormat::Json => "json",
            OutputFormat::JsonPretty => "json-pretty",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Ok(OutputFormat::JsonPretty),
            _ => Err(ConfigError::Validation(format!("Unknown format: {}", s))),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REPORT
// ═══════════════════════════════════════════════════════════════════════════════

/// A titled list of labelled values, plus the structured payload for JSON
///
/// The payload is serialized up front: amounts are `u128`, which
/// `serde_json::Value` cannot hold past `u64::MAX`.
#[derive(Debug, Clone)]
pub struct Report {
    title: String,
    rows: Vec<(String, String)>,
    json: String,
    json_pretty: String,
}

impl Report {
    /// Create a report carrying `data` as its JSON form
    pub fn new<T: Serialize>(title: impl Into<String>, data: &T) -> Result<Self, ConfigError> {
        let json =
            serde_json::to_string(data).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        let json_pretty = serde_json::to_string_pretty(data)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;
        Ok(Self {
            title: title.into(),
            rows: Vec::new(),
            json,
            json_pretty,
        })
    }

    /// Add a text row
    pub fn row(mut self, label: impl Into<String>, value: impl ToString) -> Self {
        self.rows.push((label.into(), value.to_string()));
        self
    }

    /// Title
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Text rows
    pub fn rows(&self) -> &[(String, String)] {
        &self.rows
    }

    /// Render in `format`
    pub fn render(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Text => {
                let width = self.rows.iter().map(|(l, _)| l.len()).max().unwrap_or(0);
                let mut out = format!("{} {}\n", style("→").cyan(), style(&self.title).bold());
                for (label, value) in &self.rows {
                    out.push_str(&format!(
                        "  {:<width$}  {}\n",
                        label,
                        style(value).green(),
                        width = width
                    ));
                }
                out
            }
            OutputFormat::Json => self.json.clone(),
            OutputFormat::JsonPretty => self.json_pretty.clone(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FORMATTING HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Format a fixed-point amount with `decimals` decimals, trimming zeros
///
/// Scales beyond `u128` render the raw integer.
pub fn format_units(amount: u128, decimals: u8) -> String {
    let scale = match pow10(decimals) {
        Ok(scale) if decimals > 0 => scale,
        _ => return amount.to_string(),
    };
    let whole = amount / scale;
    let frac = amount % scale;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{:0width$}", frac, width = decimals as usize);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

/// Format unix seconds as RFC 3339 (UTC)
pub fn format_timestamp(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|secs| chrono::DateTime::<chrono::Utc>::from_timestamp(secs, 0))
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| secs.to_string())
}

/// Format a bps health factor as a ratio
pub fn format_health_factor(bps: u64) -> String {
    if bps == u64::MAX {
        return "∞".into();
    }
    format!("{}.{:04}", bps / 10_000, bps % 10_000)
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
