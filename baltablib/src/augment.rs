//! Post-hoc table augmentation.
//!
//! Extra columns, extra rows and extra header levels are merged into an
//! existing [`TableBody`], updating the cell grid and its metadata together.
//! Augmentation only inserts: existing rows and columns keep their contents
//! and relative order.
//!
//! Positions are final 0-based indices. Item `k` of an augmentation is
//! inserted at `positions[k]` after items `0..k` have been inserted; items
//! without a position are appended.

use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::BalanceError;
use crate::options::NumberFormat;
use crate::table::{Align, HeaderSpan, RowOrigin, TableBody, MANUAL_PART};
use crate::Result;

/// A raw cell supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Number(f64),
    Text(String),
    Missing,
}

impl Value {
    /// Parse a text cell: empty is missing, numbers become numbers.
    pub fn parse(cell: &str) -> Self {
        let trimmed = cell.trim();
        if trimmed.is_empty() {
            Value::Missing
        } else if let Ok(n) = trimmed.parse::<f64>() {
            Value::Number(n)
        } else {
            Value::Text(cell.to_string())
        }
    }

    /// Numbers are formatted with `fmt`, text is used as is.
    pub fn render(&self, fmt: &NumberFormat) -> String {
        match self {
            Value::Number(n) => fmt.format(*n),
            Value::Text(s) => s.clone(),
            Value::Missing => String::new(),
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Number(_))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<Option<f64>> for Value {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Value::Missing, Value::Number)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

/// Columns to insert into a table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtraColumns {
    /// Column name and values, top to bottom
    pub columns: Vec<(String, Vec<Value>)>,
    /// Optional insertion index per column
    pub positions: Option<Vec<usize>>,
}

impl ExtraColumns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column.
    pub fn column(mut self, name: impl Into<String>, values: Vec<Value>) -> Self {
        self.columns.push((name.into(), values));
        self
    }

    /// Set insertion positions.
    pub fn positions(mut self, positions: Vec<usize>) -> Self {
        self.positions = Some(positions);
        self
    }

    /// Read columns from CSV; the header row names the columns.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(reader);
        let names: Vec<String> = csv_reader.headers()?.iter().map(String::from).collect();
        let mut values: Vec<Vec<Value>> = vec![Vec::new(); names.len()];
        for record in csv_reader.records() {
            for (i, cell) in record?.iter().enumerate() {
                values[i].push(Value::parse(cell));
            }
        }
        Ok(Self {
            columns: names.into_iter().zip(values).collect(),
            positions: None,
        })
    }

    /// Read columns from a CSV file.
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_csv_reader(std::io::BufReader::new(file))
    }
}

/// Rows to insert into a table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtraRows {
    /// Row cells, left to right
    pub rows: Vec<Vec<Value>>,
    /// Optional insertion index per row
    pub positions: Option<Vec<usize>>,
}

impl ExtraRows {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a row.
    pub fn row(mut self, cells: Vec<Value>) -> Self {
        self.rows.push(cells);
        self
    }

    /// Set insertion positions.
    pub fn positions(mut self, positions: Vec<usize>) -> Self {
        self.positions = Some(positions);
        self
    }

    /// Read rows from headerless CSV.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        let mut rows = Vec::new();
        for record in csv_reader.records() {
            rows.push(record?.iter().map(Value::parse).collect());
        }
        Ok(Self {
            rows,
            positions: None,
        })
    }

    /// Read rows from a headerless CSV file.
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_csv_reader(std::io::BufReader::new(file))
    }
}

/// Resolve the final insertion index of each item.
fn resolve_positions(
    positions: Option<&[usize]>,
    count: usize,
    start_len: usize,
    what: &str,
) -> Result<Vec<usize>> {
    let positions = positions.unwrap_or(&[]);
    if positions.len() > count {
        return Err(BalanceError::AugmentationShape(format!(
            "{} positions given for {} {}",
            positions.len(),
            count,
            what
        )));
    }

    let mut len = start_len;
    let mut resolved = Vec::with_capacity(count);
    for k in 0..count {
        let p = positions.get(k).copied().unwrap_or(len);
        if p > len {
            return Err(BalanceError::AugmentationShape(format!(
                "position {} is past the end of a table with {} {}",
                p, len, what
            )));
        }
        resolved.push(p);
        len += 1;
    }
    Ok(resolved)
}

/// Insert extra columns.
pub fn add_columns(
    mut body: TableBody,
    extra: &ExtraColumns,
    fmt: &NumberFormat,
) -> Result<TableBody> {
    if extra.columns.is_empty() {
        return Ok(body);
    }

    let nrows = body.nrows();
    for (name, values) in &extra.columns {
        if values.len() > nrows {
            return Err(BalanceError::AugmentationShape(format!(
                "column '{}' has {} values, table has {} rows",
                name,
                values.len(),
                nrows
            )));
        }
        if values.is_empty() && nrows > 0 {
            return Err(BalanceError::AugmentationShape(format!(
                "column '{}' is empty",
                name
            )));
        }
    }

    let positions = resolve_positions(
        extra.positions.as_deref(),
        extra.columns.len(),
        body.ncols(),
        "columns",
    )?;

    // Consecutive positions form one run and get a single blank span.
    let mut run: Option<(usize, usize)> = None;
    for ((name, values), &p) in extra.columns.iter().zip(&positions) {
        let mut cells: Vec<String> = values.iter().map(|v| v.render(fmt)).collect();
        cells.resize(nrows, String::new());
        let numeric = values.iter().all(|v| !matches!(v, Value::Text(_)));

        body.columns.insert(p, name.clone());
        body.meta.flat_header.insert(p, name.clone());
        body.meta
            .align
            .insert(p, if numeric { Align::Right } else { Align::Left });
        for (row, cell) in body.rows.iter_mut().zip(cells) {
            row.insert(p, cell);
        }

        run = match run {
            Some((start, width)) if start + width == p => Some((start, width + 1)),
            Some((start, width)) => {
                insert_span_columns(&mut body.meta.spans, start, width);
                Some((p, 1))
            }
            None => Some((p, 1)),
        };
    }
    if let Some((start, width)) = run {
        insert_span_columns(&mut body.meta.spans, start, width);
    }

    log::debug!("inserted {} columns at {:?}", extra.columns.len(), positions);
    Ok(body)
}

/// Make room for `width` new columns at `at` in every span level.
///
/// Strictly inside a span the span is widened. At a boundary an adjacent
/// blank span absorbs the columns, otherwise a new blank span is inserted.
fn insert_span_columns(levels: &mut [Vec<HeaderSpan>], at: usize, width: usize) {
    for level in levels.iter_mut() {
        let starts = TableBody::span_starts(level);
        let inside = starts
            .iter()
            .zip(level.iter())
            .position(|(&s, span)| s < at && at < s + span.width);
        if let Some(i) = inside {
            level[i].width += width;
            continue;
        }

        let next = starts.iter().position(|&s| s >= at).unwrap_or(level.len());
        if next > 0 && level[next - 1].is_blank() {
            level[next - 1].width += width;
        } else if next < level.len() && level[next].is_blank() {
            level[next].width += width;
        } else {
            level.insert(next, HeaderSpan::blank(width));
        }
    }
}

/// Insert extra rows.
pub fn add_rows(mut body: TableBody, extra: &ExtraRows, fmt: &NumberFormat) -> Result<TableBody> {
    if extra.rows.is_empty() {
        return Ok(body);
    }

    let ncols = body.ncols();
    if let Some((i, row)) = extra.rows.iter().enumerate().find(|(_, r)| r.len() != ncols) {
        return Err(BalanceError::AugmentationShape(format!(
            "extra row {} has {} cells, table has {} columns",
            i,
            row.len(),
            ncols
        )));
    }

    let positions = resolve_positions(
        extra.positions.as_deref(),
        extra.rows.len(),
        body.nrows(),
        "rows",
    )?;
    let model = body.has_model_provenance();

    for (row, &p) in extra.rows.iter().zip(&positions) {
        let cells: Vec<String> = row.iter().map(|v| v.render(fmt)).collect();
        let origin = if model {
            RowOrigin::Model {
                part: MANUAL_PART.to_string(),
                term: cells.first().cloned().unwrap_or_default(),
                statistic: String::new(),
            }
        } else {
            RowOrigin::Manual
        };

        body.rows.insert(p, cells);
        body.meta.origins.insert(p, origin);
        for rule in body.meta.hrules.iter_mut() {
            if *rule >= p {
                *rule += 1;
            }
        }
    }

    log::debug!("inserted {} rows at {:?}", extra.rows.len(), positions);
    Ok(body)
}

/// Add a new outermost header level.
///
/// The span widths must cover every column exactly once.
pub fn add_header(mut body: TableBody, spans: Vec<HeaderSpan>) -> Result<TableBody> {
    let width: usize = spans.iter().map(|s| s.width).sum();
    if width != body.ncols() || spans.iter().any(|s| s.width == 0) {
        return Err(BalanceError::AugmentationShape(format!(
            "header spans cover {} columns, table has {}",
            width,
            body.ncols()
        )));
    }
    body.meta.spans.insert(0, spans);
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `| label | A Mean | A SD | B Mean | B SD |` with one span level and
    /// a rule after the first of three rows.
    fn body() -> TableBody {
        let mut body = TableBody::new(
            ["", "Mean", "SD", "Mean", "SD"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        body.meta.flat_header = ["", "A / Mean", "A / SD", "B / Mean", "B / SD"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        body.meta.spans = vec![vec![
            HeaderSpan::blank(1),
            HeaderSpan::new("A", 2),
            HeaderSpan::new("B", 2),
        ]];
        for label in ["x", "y", "z"] {
            body.push_row(
                vec![label.into(), "1".into(), "2".into(), "3".into(), "4".into()],
                RowOrigin::Variable {
                    name: label.into(),
                    level: None,
                },
            )
            .unwrap();
        }
        body.add_rule_after(0);
        body
    }

    fn fmt() -> NumberFormat {
        NumberFormat::Fixed(2)
    }

    #[test]
    fn test_zero_augmentation_is_identity() {
        let original = body();
        let same = add_columns(original.clone(), &ExtraColumns::new(), &fmt()).unwrap();
        let same = add_rows(same, &ExtraRows::new(), &fmt()).unwrap();
        assert_eq!(same, original);
    }

    #[test]
    fn test_append_columns_pads_and_formats() {
        let extra = ExtraColumns::new()
            .column("Extra", vec![Value::from(1.5), Value::from("text")])
            .column("More", vec![Value::from(2.0)]);
        let table = add_columns(body(), &extra, &fmt()).unwrap();

        assert_eq!(table.ncols(), 7);
        assert_eq!(table.columns[5], "Extra");
        assert_eq!(table.rows[0][5], "1.50");
        assert_eq!(table.rows[1][5], "text");
        assert_eq!(table.rows[2][5], "");
        assert_eq!(table.rows[0][6], "2.00");
        assert_eq!(table.meta.flat_header[6], "More");
        assert_eq!(table.meta.align[5], Align::Left);
        assert_eq!(table.meta.align[6], Align::Right);
        // one synthetic blank span for the two appended columns
        assert_eq!(table.meta.spans[0].last().unwrap(), &HeaderSpan::blank(2));
        assert!(table.validate().is_ok());
    }

    #[test]
    fn test_insert_column_at_boundary_and_inside_span() {
        let extra = ExtraColumns::new()
            .column("First", vec![Value::from("a")])
            .column("Inside", vec![Value::from("b")])
            .positions(vec![1, 3]);
        let table = add_columns(body(), &extra, &fmt()).unwrap();

        assert_eq!(
            table.columns,
            vec!["", "First", "Mean", "Inside", "SD", "Mean", "SD"]
        );
        // the label column's blank span absorbs "First"
        assert_eq!(
            table.meta.spans[0],
            vec![
                HeaderSpan::blank(2),
                HeaderSpan::new("A", 3),
                HeaderSpan::new("B", 2),
            ]
        );
        // original cells keep their relative order
        assert_eq!(table.rows[0], vec!["x", "a", "1", "b", "2", "3", "4"]);
        assert!(table.validate().is_ok());
    }

    #[test]
    fn test_column_shape_errors() {
        let too_long = ExtraColumns::new().column("c", vec![Value::from(1.0); 4]);
        assert!(matches!(
            add_columns(body(), &too_long, &fmt()),
            Err(BalanceError::AugmentationShape(_))
        ));

        let empty = ExtraColumns::new().column("c", vec![]);
        assert!(matches!(
            add_columns(body(), &empty, &fmt()),
            Err(BalanceError::AugmentationShape(_))
        ));

        let past_end = ExtraColumns::new()
            .column("c", vec![Value::from(1.0)])
            .positions(vec![9]);
        assert!(matches!(
            add_columns(body(), &past_end, &fmt()),
            Err(BalanceError::AugmentationShape(_))
        ));
    }

    #[test]
    fn test_insert_rows_shifts_rules_and_keeps_order() {
        let extra = ExtraRows::new()
            .row(vec![
                Value::from("Observations"),
                Value::from(10.0),
                Value::Missing,
                Value::from(12.0),
                Value::Missing,
            ])
            .row(vec![
                Value::from("Last"),
                Value::from("a"),
                Value::from("b"),
                Value::from("c"),
                Value::from("d"),
            ])
            .positions(vec![0]);
        let table = add_rows(body(), &extra, &fmt()).unwrap();

        let labels: Vec<&str> = table.rows.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(labels, vec!["Observations", "x", "y", "z", "Last"]);
        assert_eq!(table.rows[0][1], "10.00");
        assert_eq!(table.rows[0][2], "");
        // rule after "x" moved with it
        assert_eq!(table.meta.hrules, vec![1]);
        assert_eq!(table.meta.origins[0], RowOrigin::Manual);
        assert!(table.validate().is_ok());
    }

    #[test]
    fn test_row_width_mismatch_is_error() {
        let extra = ExtraRows::new().row(vec![Value::from("short")]);
        match add_rows(body(), &extra, &fmt()) {
            Err(BalanceError::AugmentationShape(msg)) => assert!(msg.contains("5 columns")),
            other => panic!("expected AugmentationShape, got {:?}", other),
        }
    }

    #[test]
    fn test_rows_in_model_body_are_tagged() {
        let mut table = TableBody::new(vec!["".into(), "Model 1".into()]);
        table
            .push_row(
                vec!["x".into(), "0.5".into()],
                RowOrigin::Model {
                    part: "estimates".into(),
                    term: "x".into(),
                    statistic: "estimate".into(),
                },
            )
            .unwrap();
        let extra = ExtraRows::new().row(vec![Value::from("FE"), Value::from("Yes")]);
        let table = add_rows(table, &extra, &fmt()).unwrap();
        assert_eq!(
            table.meta.origins[1],
            RowOrigin::Model {
                part: MANUAL_PART.to_string(),
                term: "FE".to_string(),
                statistic: String::new(),
            }
        );
    }

    #[test]
    fn test_add_header_level() {
        let spans = vec![HeaderSpan::blank(1), HeaderSpan::new("Groups", 4)];
        let table = add_header(body(), spans.clone()).unwrap();
        assert_eq!(table.meta.spans.len(), 2);
        assert_eq!(table.meta.spans[0], spans);

        let bad = add_header(body(), vec![HeaderSpan::new("Too narrow", 2)]);
        assert!(matches!(bad, Err(BalanceError::AugmentationShape(_))));
    }

    #[test]
    fn test_extra_tables_from_csv() {
        let cols = ExtraColumns::from_csv_reader("Note,Score\nyes,1.25\nno,\n".as_bytes()).unwrap();
        assert_eq!(cols.columns.len(), 2);
        assert_eq!(cols.columns[0].1, vec![Value::from("yes"), Value::from("no")]);
        assert_eq!(cols.columns[1].1, vec![Value::Number(1.25), Value::Missing]);

        let rows = ExtraRows::from_csv_reader("N,18,,14,\n".as_bytes()).unwrap();
        assert_eq!(rows.rows.len(), 1);
        assert_eq!(rows.rows[0].len(), 5);
        assert!(rows.rows[0][1].is_number());
    }
}
