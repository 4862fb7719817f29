//! Typed in-memory datasets.
//!
//! A [`Dataset`] is an ordered list of named, equally long columns. Each
//! column is numeric, boolean or categorical; missing cells are `None`.
//! Datasets can be built programmatically or loaded from CSV, in which case
//! column types are inferred from the cell contents.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::BalanceError;
use crate::Result;

/// Cell values treated as missing when loading CSV.
const MISSING_TOKENS: [&str; 2] = ["", "NA"];

/// Storage of a single column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnData {
    /// Real-valued observations
    Numeric(Vec<Option<f64>>),
    /// Logical observations, summarized as 0/1
    Boolean(Vec<Option<bool>>),
    /// Labelled observations: declared levels plus a per-row level index
    Categorical {
        levels: Vec<String>,
        codes: Vec<Option<usize>>,
    },
}

/// Coarse column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    Numeric,
    Boolean,
    Categorical,
}

/// A named column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    /// Numeric column.
    pub fn numeric(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Numeric(values),
        }
    }

    /// Boolean column.
    pub fn boolean(name: impl Into<String>, values: Vec<Option<bool>>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Boolean(values),
        }
    }

    /// Categorical column with levels in order of first appearance.
    pub fn categorical<S: AsRef<str>>(name: impl Into<String>, values: &[Option<S>]) -> Self {
        let mut levels: Vec<String> = Vec::new();
        let codes = values
            .iter()
            .map(|v| {
                v.as_ref().map(|s| {
                    let s = s.as_ref();
                    match levels.iter().position(|l| l == s) {
                        Some(i) => i,
                        None => {
                            levels.push(s.to_string());
                            levels.len() - 1
                        }
                    }
                })
            })
            .collect();
        Self {
            name: name.into(),
            data: ColumnData::Categorical { levels, codes },
        }
    }

    /// Categorical column with explicitly declared levels.
    ///
    /// Declared levels that never occur are kept (they summarize as zero
    /// counts). A value outside the declared levels is an error.
    pub fn categorical_with_levels<S: AsRef<str>>(
        name: impl Into<String>,
        levels: Vec<String>,
        values: &[Option<S>],
    ) -> Result<Self> {
        let name = name.into();
        let codes = values
            .iter()
            .map(|v| match v {
                None => Ok(None),
                Some(s) => levels
                    .iter()
                    .position(|l| l == s.as_ref())
                    .map(Some)
                    .ok_or_else(|| {
                        BalanceError::InvalidDataset(format!(
                            "value '{}' of column '{}' is not a declared level",
                            s.as_ref(),
                            name
                        ))
                    }),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            name,
            data: ColumnData::Categorical { levels, codes },
        })
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        match &self.data {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Boolean(v) => v.len(),
            ColumnData::Categorical { codes, .. } => codes.len(),
        }
    }

    /// Whether the column has no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Coarse type of the column.
    pub fn kind(&self) -> ColumnKind {
        match &self.data {
            ColumnData::Numeric(_) => ColumnKind::Numeric,
            ColumnData::Boolean(_) => ColumnKind::Boolean,
            ColumnData::Categorical { .. } => ColumnKind::Categorical,
        }
    }

    /// Numeric and boolean columns are summarized with mean/std. dev.
    pub fn is_numeric_like(&self) -> bool {
        !matches!(self.kind(), ColumnKind::Categorical)
    }

    /// Values as numbers (booleans become 0/1). `None` for categorical columns.
    pub fn numeric_values(&self) -> Option<Vec<Option<f64>>> {
        match &self.data {
            ColumnData::Numeric(v) => Some(v.clone()),
            ColumnData::Boolean(v) => Some(
                v.iter()
                    .map(|b| b.map(|b| if b { 1.0 } else { 0.0 }))
                    .collect(),
            ),
            ColumnData::Categorical { .. } => None,
        }
    }

    /// Ordered levels and the per-row level index, for any column type.
    ///
    /// Categorical columns keep their declared level order. Numeric columns
    /// use the ascending distinct values, booleans `false` before `true`;
    /// only values that occur become levels.
    pub fn level_codes(&self) -> (Vec<String>, Vec<Option<usize>>) {
        match &self.data {
            ColumnData::Categorical { levels, codes } => (levels.clone(), codes.clone()),
            ColumnData::Boolean(values) => {
                let present: Vec<bool> = [false, true]
                    .into_iter()
                    .filter(|b| values.contains(&Some(*b)))
                    .collect();
                let levels = present.iter().map(|b| b.to_string()).collect();
                let codes = values
                    .iter()
                    .map(|v| v.and_then(|b| present.iter().position(|p| *p == b)))
                    .collect();
                (levels, codes)
            }
            ColumnData::Numeric(values) => {
                let mut distinct: Vec<f64> = values.iter().flatten().copied().collect();
                distinct.sort_by(|a, b| a.total_cmp(b));
                distinct.dedup_by(|a, b| a.total_cmp(b).is_eq());
                let levels = distinct.iter().map(|v| v.to_string()).collect();
                let codes = values
                    .iter()
                    .map(|v| {
                        v.and_then(|x| distinct.binary_search_by(|d| d.total_cmp(&x)).ok())
                    })
                    .collect();
                (levels, codes)
            }
        }
    }

    /// Ordered distinct non-missing values as labels.
    pub fn distinct_levels(&self) -> Vec<String> {
        self.level_codes().0
    }

    /// Number of distinct levels as seen by [`Column::level_codes`].
    pub fn level_count(&self) -> usize {
        self.distinct_levels().len()
    }
}

/// An ordered collection of equally long, uniquely named columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    columns: Vec<Column>,
    nrows: usize,
}

impl Dataset {
    /// Build a dataset, validating column lengths and names.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let nrows = columns.first().map(|c| c.len()).unwrap_or(0);
        let mut seen = HashSet::new();
        for column in &columns {
            if column.len() != nrows {
                return Err(BalanceError::InvalidDataset(format!(
                    "column '{}' has {} rows, expected {}",
                    column.name,
                    column.len(),
                    nrows
                )));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(BalanceError::InvalidDataset(format!(
                    "duplicate column name '{}'",
                    column.name
                )));
            }
        }
        Ok(Self { columns, nrows })
    }

    /// Load a dataset from CSV with a header row.
    ///
    /// A column is boolean when every non-missing cell is `true`/`false`
    /// (any case), numeric when every non-missing cell parses as a float,
    /// and categorical otherwise. Empty cells and `NA` are missing.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let names: Vec<String> = csv_reader.headers()?.iter().map(String::from).collect();
        let mut raw: Vec<Vec<Option<String>>> = vec![Vec::new(); names.len()];

        for record in csv_reader.records() {
            let record = record?;
            for (i, cell) in record.iter().enumerate() {
                let value = if MISSING_TOKENS.contains(&cell) {
                    None
                } else {
                    Some(cell.to_string())
                };
                raw[i].push(value);
            }
        }

        let columns = names
            .into_iter()
            .zip(raw)
            .map(|(name, cells)| infer_column(name, &cells))
            .collect();
        Self::new(columns)
    }

    /// Load a dataset from a CSV file.
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_csv_reader(std::io::BufReader::new(file))
    }

    /// Number of rows.
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Columns in dataset order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Column names in dataset order.
    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn infer_column(name: String, cells: &[Option<String>]) -> Column {
    let present = || cells.iter().flatten();

    if present().next().is_some() && present().all(|s| parse_bool(s).is_some()) {
        let values = cells
            .iter()
            .map(|c| c.as_deref().and_then(parse_bool))
            .collect();
        return Column::boolean(name, values);
    }

    if present().all(|s| s.parse::<f64>().is_ok()) {
        let values = cells
            .iter()
            .map(|c| c.as_deref().and_then(|s| s.parse::<f64>().ok()))
            .collect();
        return Column::numeric(name, values);
    }

    Column::categorical(name, cells)
}
