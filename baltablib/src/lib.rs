//! # baltablib
//!
//! Balance tables for grouped data: per-group descriptive statistics,
//! differences in means with cluster- and block-aware standard errors, and
//! rendering to text, HTML, LaTeX, Markdown and RTF.
//!
//! ## Overview
//!
//! A balance table compares the columns of a dataset across the groups of
//! one grouping column, typically treatment and control. For every other
//! column it reports:
//!
//! - **Numeric and boolean columns**: mean and standard deviation per group
//! - **Categorical columns**: count and percentage of each level per group
//! - **Difference in means**: second group minus first, with its standard
//!   error or p-value, when exactly two groups exist
//!
//! Columns named `clusters` and `blocks` are not summarized; they switch the
//! difference estimator to cluster-robust and block-weighted variants.
//!
//! ## Pipeline
//!
//! 1. [`Dataset`]: typed columns, loaded from CSV or built in code
//! 2. [`summarize_balance`]: grouping, per-group statistics, differences
//! 3. [`TableBody`]: formatted cells plus header spans, rules, provenance
//! 4. [`augment`]: optional extra rows, columns and header levels
//! 5. [`output`]: destination resolution, rendering, file writing
//!
//! ## Example
//!
//! ```rust
//! use baltablib::output::{OutputDispatcher, Settings};
//! use baltablib::{build_balance_table, BalanceOptions, Column, Dataset, GroupSelector};
//!
//! let data = Dataset::new(vec![
//!     Column::numeric("treat", vec![Some(0.0), Some(0.0), Some(1.0), Some(1.0)]),
//!     Column::numeric("age", vec![Some(30.0), Some(34.0), Some(41.0), Some(45.0)]),
//! ])
//! .unwrap();
//!
//! let selector = GroupSelector::parse("~ treat").unwrap();
//! let table = build_balance_table(&data, &selector, &BalanceOptions::default()).unwrap();
//! assert_eq!(table.nrows(), 1);
//!
//! let latex = OutputDispatcher::new(Settings::default())
//!     .dispatch(table, "latex")
//!     .unwrap()
//!     .unwrap();
//! assert!(latex.as_text().unwrap().contains("\\toprule"));
//! ```

pub mod augment;
pub mod balance;
pub mod dataset;
pub mod difference;
pub mod error;
pub mod grouping;
pub mod options;
pub mod output;
pub mod summary;
pub mod table;

pub use augment::{add_columns, add_header, add_rows, ExtraColumns, ExtraRows, Value};
pub use balance::{build_balance_table, summarize_balance, BalanceSummary};
pub use dataset::{Column, ColumnData, ColumnKind, Dataset};
pub use difference::{Arm, Difference, DifferenceEstimator};
pub use error::BalanceError;
pub use grouping::{check_level_ceiling, Group, GroupSelector, Grouping, LEVEL_CEILING};
pub use options::{BalanceOptions, DiffStatistic, NumberFormat};
pub use summary::{BlockKind, GroupSummarizer, StatisticKind, StatisticRow, SummaryBlock};
pub use table::{Align, HeaderSpan, RowOrigin, TableBody, TableMetadata, MANUAL_PART};

/// Result type for baltablib operations
pub type Result<T> = std::result::Result<T, BalanceError>;
