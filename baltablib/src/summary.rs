//! Per-group descriptive statistics.
//!
//! The summarizer turns each source column into a block of long-form
//! [`StatisticRow`]s with one formatted cell per group:
//!
//! - numeric/boolean columns: a `Mean` row and a `StdDev` row
//! - categorical columns: a `Count` row and a `Percent` row per level

use serde::{Deserialize, Serialize};

use crate::dataset::{Column, Dataset};
use crate::error::BalanceError;
use crate::grouping::{check_level_ceiling, Grouping};
use crate::options::NumberFormat;
use crate::Result;

/// Percentages are always printed with one decimal.
const PERCENT_FORMAT: NumberFormat = NumberFormat::Fixed(1);

/// Kind of statistic carried by a row or column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatisticKind {
    Mean,
    StdDev,
    Count,
    Percent,
    DiffInMeans,
    StdError,
    PValue,
}

impl StatisticKind {
    /// Header label for the statistic.
    pub fn label(&self) -> &'static str {
        match self {
            StatisticKind::Mean => "Mean",
            StatisticKind::StdDev => "Std. Dev.",
            StatisticKind::Count => "N",
            StatisticKind::Percent => "%",
            StatisticKind::DiffInMeans => "Diff. in Means",
            StatisticKind::StdError => "Std. Error",
            StatisticKind::PValue => "p",
        }
    }
}

/// One long-form statistic row: a (column, level, statistic) triple with one
/// formatted cell per group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticRow {
    /// Source column name
    pub column: String,
    /// Level label for categorical rows
    pub level: Option<String>,
    /// Statistic computed in this row
    pub kind: StatisticKind,
    /// One formatted cell per group, in group order
    pub cells: Vec<String>,
}

/// Whether a block summarizes a numeric-like or a categorical column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    Numeric,
    Categorical,
}

/// All statistic rows computed for one source column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryBlock {
    pub column: String,
    pub kind: BlockKind,
    pub rows: Vec<StatisticRow>,
}

impl SummaryBlock {
    /// Levels of a categorical block, in row order.
    pub fn levels(&self) -> Vec<&str> {
        let mut levels: Vec<&str> = Vec::new();
        for row in &self.rows {
            if let Some(level) = row.level.as_deref() {
                if levels.last() != Some(&level) {
                    levels.push(level);
                }
            }
        }
        levels
    }

    /// Find the row for a statistic (and level, for categorical blocks).
    pub fn row(&self, kind: StatisticKind, level: Option<&str>) -> Option<&StatisticRow> {
        self.rows
            .iter()
            .find(|r| r.kind == kind && r.level.as_deref() == level)
    }
}

/// Computes per-group statistics for the columns of a dataset.
#[derive(Debug, Clone, Copy)]
pub struct GroupSummarizer<'a> {
    grouping: &'a Grouping,
    fmt: NumberFormat,
}

impl<'a> GroupSummarizer<'a> {
    pub fn new(grouping: &'a Grouping, fmt: NumberFormat) -> Self {
        Self { grouping, fmt }
    }

    /// Summarize the named columns, one block per column in the given order.
    pub fn summarize(&self, dataset: &Dataset, columns: &[&str]) -> Result<Vec<SummaryBlock>> {
        columns
            .iter()
            .map(|name| {
                let column = dataset.column(name).ok_or_else(|| {
                    BalanceError::InvalidDataset(format!("column '{}' not found", name))
                })?;
                self.summarize_column(column)
            })
            .collect()
    }

    /// Summarize a single column.
    pub fn summarize_column(&self, column: &Column) -> Result<SummaryBlock> {
        match column.numeric_values() {
            Some(values) => Ok(self.numeric_block(&column.name, &values)),
            None => self.categorical_block(column),
        }
    }

    fn numeric_block(&self, name: &str, values: &[Option<f64>]) -> SummaryBlock {
        let mut means = Vec::with_capacity(self.grouping.len());
        let mut sds = Vec::with_capacity(self.grouping.len());

        for group in &self.grouping.groups {
            let observed: Vec<f64> = group.rows.iter().filter_map(|&r| values[r]).collect();
            means.push(mean(&observed).map_or_else(String::new, |m| self.fmt.format(m)));
            sds.push(std_dev(&observed).map_or_else(String::new, |s| self.fmt.format(s)));
        }

        SummaryBlock {
            column: name.to_string(),
            kind: BlockKind::Numeric,
            rows: vec![
                StatisticRow {
                    column: name.to_string(),
                    level: None,
                    kind: StatisticKind::Mean,
                    cells: means,
                },
                StatisticRow {
                    column: name.to_string(),
                    level: None,
                    kind: StatisticKind::StdDev,
                    cells: sds,
                },
            ],
        }
    }

    fn categorical_block(&self, column: &Column) -> Result<SummaryBlock> {
        let (levels, codes) = column.level_codes();
        check_level_ceiling(&column.name, levels.len())?;

        let mut rows = Vec::with_capacity(levels.len() * 2);
        for (level_index, level) in levels.iter().enumerate() {
            let mut counts = Vec::with_capacity(self.grouping.len());
            let mut percents = Vec::with_capacity(self.grouping.len());

            for group in &self.grouping.groups {
                let count = group
                    .rows
                    .iter()
                    .filter(|&&r| codes[r] == Some(level_index))
                    .count();
                counts.push(count.to_string());
                percents.push(if group.size() == 0 {
                    String::new()
                } else {
                    PERCENT_FORMAT.format(count as f64 / group.size() as f64 * 100.0)
                });
            }

            rows.push(StatisticRow {
                column: column.name.clone(),
                level: Some(level.clone()),
                kind: StatisticKind::Count,
                cells: counts,
            });
            rows.push(StatisticRow {
                column: column.name.clone(),
                level: Some(level.clone()),
                kind: StatisticKind::Percent,
                cells: percents,
            });
        }

        Ok(SummaryBlock {
            column: column.name.clone(),
            kind: BlockKind::Categorical,
            rows,
        })
    }
}

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample variance (n - 1 denominator), `None` with fewer than two values.
pub fn variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some(ss / (values.len() - 1) as f64)
}

/// Sample standard deviation.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    variance(values).map(f64::sqrt)
}
