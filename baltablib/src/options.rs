//! Input options for building balance tables.
//!
//! This module contains the configuration types that control what the
//! table builder computes and how numbers are printed.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::BalanceError;

/// Default numeric format directive.
pub const DEFAULT_FMT: &str = "%.3f";

/// Reserved column name carrying cluster identifiers.
pub const DEFAULT_CLUSTER_COLUMN: &str = "clusters";

/// Reserved column name carrying block (stratum) identifiers.
pub const DEFAULT_BLOCK_COLUMN: &str = "blocks";

/// A parsed printf-like numeric format directive.
///
/// Supported directives: `%.Nf` (fixed), `%.Ne` (scientific), `%d`
/// (rounded integer). `%f` and `%e` without precision use 6 digits; `%s`
/// selects the default format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NumberFormat {
    /// Fixed number of decimals
    Fixed(usize),
    /// Scientific notation with a fixed number of mantissa decimals
    Scientific(usize),
    /// Rounded to the nearest integer
    Integer,
}

impl Default for NumberFormat {
    fn default() -> Self {
        NumberFormat::Fixed(3)
    }
}

impl FromStr for NumberFormat {
    type Err = BalanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BalanceError::InvalidFormat(s.to_string());
        let directive = s.trim().strip_prefix('%').ok_or_else(invalid)?;

        match directive {
            "d" | "i" => return Ok(NumberFormat::Integer),
            "s" => return Ok(NumberFormat::default()),
            _ => {}
        }

        let split = directive.char_indices().last().map_or(0, |(i, _)| i);
        let (body, kind) = directive.split_at(split);
        let precision = match body {
            "" => 6,
            _ => body
                .strip_prefix('.')
                .and_then(|p| p.parse::<usize>().ok())
                .ok_or_else(invalid)?,
        };

        match kind {
            "f" => Ok(NumberFormat::Fixed(precision)),
            "e" => Ok(NumberFormat::Scientific(precision)),
            _ => Err(invalid()),
        }
    }
}

impl NumberFormat {
    /// Format a value. Non-finite values render as an empty cell.
    pub fn format(&self, value: f64) -> String {
        if !value.is_finite() {
            return String::new();
        }
        match self {
            NumberFormat::Fixed(digits) => normalize_zero(format!("{:.*}", digits, value)),
            NumberFormat::Integer => normalize_zero(format!("{:.0}", value)),
            NumberFormat::Scientific(digits) => format_scientific(value, *digits),
        }
    }
}

/// Rounding can leave a "-0.000"; print it unsigned.
fn normalize_zero(s: String) -> String {
    match s.strip_prefix('-') {
        Some(rest) if rest.chars().all(|c| c == '0' || c == '.') => rest.to_string(),
        _ => s,
    }
}

/// Format in C style: mantissa, `e`, sign, at least two exponent digits.
fn format_scientific(value: f64, digits: usize) -> String {
    let raw = format!("{:.*e}", digits, value);
    match raw.split_once('e') {
        Some((mantissa, exponent)) => {
            let exp: i32 = exponent.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exp.abs())
        }
        None => raw,
    }
}

/// Precision statistic printed next to the difference in means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DiffStatistic {
    /// Standard error of the difference
    #[default]
    StdError,
    /// Two-sided p-value of the difference being zero
    PValue,
}

impl DiffStatistic {
    /// Column header used for the precision column
    pub fn label(&self) -> &'static str {
        match self {
            DiffStatistic::StdError => "Std. Error",
            DiffStatistic::PValue => "p",
        }
    }
}

impl FromStr for DiffStatistic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "std.error" | "std_error" | "stderr" | "se" => Ok(DiffStatistic::StdError),
            "p.value" | "p_value" | "pvalue" | "p" => Ok(DiffStatistic::PValue),
            _ => Err(format!("Unknown difference statistic: {}", s)),
        }
    }
}

/// Options for building a balance table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceOptions {
    /// Format applied to every numeric cell except percentages
    pub fmt: NumberFormat,
    /// Compute difference in means (only honored with exactly two groups)
    pub dinm: bool,
    /// Precision statistic shown next to the difference in means
    pub dinm_statistic: DiffStatistic,
    /// Reserved column holding cluster identifiers
    pub cluster_column: String,
    /// Reserved column holding block identifiers
    pub block_column: String,
    /// Optional table title
    pub title: Option<String>,
    /// Notes printed below the table
    pub notes: Vec<String>,
}

impl Default for BalanceOptions {
    fn default() -> Self {
        Self {
            fmt: NumberFormat::default(),
            dinm: true,
            dinm_statistic: DiffStatistic::default(),
            cluster_column: DEFAULT_CLUSTER_COLUMN.to_string(),
            block_column: DEFAULT_BLOCK_COLUMN.to_string(),
            title: None,
            notes: Vec::new(),
        }
    }
}

impl BalanceOptions {
    /// Create new default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the numeric format.
    pub fn fmt(mut self, fmt: NumberFormat) -> Self {
        self.fmt = fmt;
        self
    }

    /// Enable or disable the difference-in-means columns.
    pub fn dinm(mut self, enabled: bool) -> Self {
        self.dinm = enabled;
        self
    }

    /// Choose the precision statistic for the difference in means.
    pub fn dinm_statistic(mut self, statistic: DiffStatistic) -> Self {
        self.dinm_statistic = statistic;
        self
    }

    /// Rename the reserved cluster column.
    pub fn cluster_column(mut self, name: impl Into<String>) -> Self {
        self.cluster_column = name.into();
        self
    }

    /// Rename the reserved block column.
    pub fn block_column(mut self, name: impl Into<String>) -> Self {
        self.block_column = name.into();
        self
    }

    /// Set the table title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Append a note.
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}
