//! Table-ready data structures.
//!
//! This module provides [`TableBody`], a presentation-ready grid of
//! formatted string cells together with its [`TableMetadata`]: the flat
//! header fallback, horizontal rule positions, header span levels, row
//! provenance, alignment, title and notes.
//!
//! The data flow is:
//! 1. Statistics (per-group summary rows, differences)
//! 2. TableBody (formatted strings plus metadata)
//! 3. Augmentation (extra rows, columns, header levels)
//! 4. Output dispatch (backend + format)
//!
//! Metadata travels explicitly with the grid; every transformation takes a
//! body and returns a body with both updated together.

use serde::{Deserialize, Serialize};

use crate::error::BalanceError;
use crate::Result;

/// Statistic group marker for rows injected into model-summary bodies.
pub const MANUAL_PART: &str = "manual";

/// One outer header cell covering `width` adjacent columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderSpan {
    /// Label, empty for a blank span
    pub label: String,
    /// Number of columns covered
    pub width: usize,
}

impl HeaderSpan {
    pub fn new(label: impl Into<String>, width: usize) -> Self {
        Self {
            label: label.into(),
            width,
        }
    }

    /// A span without a label.
    pub fn blank(width: usize) -> Self {
        Self::new("", width)
    }

    pub fn is_blank(&self) -> bool {
        self.label.trim().is_empty()
    }
}

/// Horizontal alignment of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

impl Align {
    /// Single-letter code (`l`, `c`, `r`) used by tabular specifications.
    pub fn code(&self) -> char {
        match self {
            Align::Left => 'l',
            Align::Center => 'c',
            Align::Right => 'r',
        }
    }
}

/// Where a body row came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowOrigin {
    /// Summary of a source variable (and level, for categorical variables)
    Variable { name: String, level: Option<String> },
    /// Row of a model summary: statistic group, term and statistic name
    Model {
        part: String,
        term: String,
        statistic: String,
    },
    /// Row injected into a body without model provenance
    Manual,
}

/// Structural metadata carried alongside the cell grid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetadata {
    /// Single-level header used by backends that cannot draw spans
    pub flat_header: Vec<String>,
    /// Row indices after which a horizontal rule is drawn (sorted)
    pub hrules: Vec<usize>,
    /// Header span levels, outermost first
    pub spans: Vec<Vec<HeaderSpan>>,
    /// Provenance of each row
    pub origins: Vec<RowOrigin>,
    /// Alignment of each column
    pub align: Vec<Align>,
    /// Optional caption
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Notes printed below the table
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

/// A grid of formatted cells with its metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableBody {
    /// Inner (lowest level) column names
    pub columns: Vec<String>,
    /// Data rows, each with exactly `columns.len()` cells
    pub rows: Vec<Vec<String>>,
    /// Header, rule and provenance metadata
    pub meta: TableMetadata,
}

impl TableBody {
    /// Empty body with the given column names.
    ///
    /// The flat header defaults to the column names; the first column is
    /// left aligned and the rest right aligned.
    pub fn new(columns: Vec<String>) -> Self {
        let align = (0..columns.len())
            .map(|i| if i == 0 { Align::Left } else { Align::Right })
            .collect();
        Self {
            meta: TableMetadata {
                flat_header: columns.clone(),
                align,
                ..TableMetadata::default()
            },
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row. The cell count must match the column count.
    pub fn push_row(&mut self, cells: Vec<String>, origin: RowOrigin) -> Result<()> {
        if cells.len() != self.ncols() {
            return Err(BalanceError::AugmentationShape(format!(
                "row has {} cells, table has {} columns",
                cells.len(),
                self.ncols()
            )));
        }
        self.rows.push(cells);
        self.meta.origins.push(origin);
        Ok(())
    }

    /// Draw a horizontal rule after the given row.
    pub fn add_rule_after(&mut self, row: usize) {
        if let Err(pos) = self.meta.hrules.binary_search(&row) {
            self.meta.hrules.insert(pos, row);
        }
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    pub fn nrows(&self) -> usize {
        self.rows.len()
    }

    /// Whether any header span level is present.
    pub fn has_spans(&self) -> bool {
        !self.meta.spans.is_empty()
    }

    /// Whether rows carry model-summary provenance.
    pub fn has_model_provenance(&self) -> bool {
        self.meta
            .origins
            .iter()
            .any(|o| matches!(o, RowOrigin::Model { .. }))
    }

    /// Whether a horizontal rule follows the given row.
    pub fn has_rule_after(&self, row: usize) -> bool {
        self.meta.hrules.binary_search(&row).is_ok()
    }

    /// Replace column names with the flat header and drop span levels.
    pub fn flatten_header(mut self) -> Self {
        if self.meta.flat_header.len() == self.columns.len() {
            self.columns = self.meta.flat_header.clone();
        }
        self.meta.spans.clear();
        self
    }

    /// Start column of each span in a level.
    pub fn span_starts(level: &[HeaderSpan]) -> Vec<usize> {
        level
            .iter()
            .scan(0, |start, span| {
                let this = *start;
                *start += span.width;
                Some(this)
            })
            .collect()
    }

    /// Check the structural invariants between grid and metadata.
    pub fn validate(&self) -> Result<()> {
        let ncols = self.ncols();
        let shape = |msg: String| Err(BalanceError::AugmentationShape(msg));

        if let Some((i, row)) = self.rows.iter().enumerate().find(|(_, r)| r.len() != ncols) {
            return shape(format!(
                "row {} has {} cells, table has {} columns",
                i,
                row.len(),
                ncols
            ));
        }
        if self.meta.flat_header.len() != ncols {
            return shape(format!(
                "flat header has {} entries, table has {} columns",
                self.meta.flat_header.len(),
                ncols
            ));
        }
        if self.meta.align.len() != ncols {
            return shape(format!(
                "alignment has {} entries, table has {} columns",
                self.meta.align.len(),
                ncols
            ));
        }
        if self.meta.origins.len() != self.nrows() {
            return shape(format!(
                "provenance has {} entries, table has {} rows",
                self.meta.origins.len(),
                self.nrows()
            ));
        }
        for (depth, level) in self.meta.spans.iter().enumerate() {
            let width: usize = level.iter().map(|s| s.width).sum();
            if width != ncols || level.iter().any(|s| s.width == 0) {
                return shape(format!(
                    "header level {} covers {} columns, table has {}",
                    depth, width, ncols
                ));
            }
        }
        if let Some(rule) = self.meta.hrules.iter().find(|r| **r >= self.nrows()) {
            return shape(format!(
                "rule after row {} but table has {} rows",
                rule,
                self.nrows()
            ));
        }
        Ok(())
    }
}
