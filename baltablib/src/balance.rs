//! Balance table assembly.
//!
//! This is the main entry point of the library. It:
//! 1. Resolves the grouping selector and partitions the rows
//! 2. Validates level ceilings for the grouping and categorical columns
//! 3. Summarizes every remaining column per group
//! 4. Estimates differences in means when exactly two groups exist
//! 5. Assembles the [`TableBody`] with spans, flat header, rules and
//!    provenance
//!
//! Numeric blocks come first, then categorical blocks, each in dataset
//! column order.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::difference::{Difference, DifferenceEstimator};
use crate::grouping::{check_level_ceiling, GroupSelector, Grouping};
use crate::options::BalanceOptions;
use crate::summary::{BlockKind, GroupSummarizer, StatisticKind, StatisticRow, SummaryBlock};
use crate::table::{HeaderSpan, RowOrigin, TableBody};
use crate::Result;

const NUMERIC_KINDS: [StatisticKind; 2] = [StatisticKind::Mean, StatisticKind::StdDev];
const CATEGORICAL_KINDS: [StatisticKind; 2] = [StatisticKind::Count, StatisticKind::Percent];

/// Long-form result of the balance computation, before table assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSummary {
    /// Row partition by the grouping column
    pub grouping: Grouping,
    /// Numeric blocks followed by categorical blocks
    pub blocks: Vec<SummaryBlock>,
    /// Difference per numeric column (`None` when undefined); empty when
    /// differences are not computed
    pub differences: Vec<(String, Option<Difference>)>,
}

impl BalanceSummary {
    /// All long-form statistic rows in block order.
    pub fn statistic_rows(&self) -> impl Iterator<Item = &StatisticRow> {
        self.blocks.iter().flat_map(|b| b.rows.iter())
    }

    fn difference_for(&self, column: &str) -> Option<&Difference> {
        self.differences
            .iter()
            .find(|(name, _)| name == column)
            .and_then(|(_, d)| d.as_ref())
    }

    /// Assemble the wide table body.
    ///
    /// `with_differences` adds the two trailing difference columns; cells
    /// stay blank for columns without an estimate.
    pub fn to_table(&self, options: &BalanceOptions, with_differences: bool) -> Result<TableBody> {
        // Blocks without rows (all-missing categorical columns) add no columns.
        let has_rows = |kind: BlockKind| {
            self.blocks
                .iter()
                .any(|b| b.kind == kind && !b.rows.is_empty())
        };
        let has_numeric = has_rows(BlockKind::Numeric);
        let has_categorical = has_rows(BlockKind::Categorical);

        let mut kinds: Vec<StatisticKind> = Vec::new();
        if has_numeric {
            kinds.extend(NUMERIC_KINDS);
        }
        if has_categorical {
            kinds.extend(CATEGORICAL_KINDS);
        }

        let precision_label = options.dinm_statistic.label();
        let groups = &self.grouping.groups;

        let mut columns = vec![String::new()];
        let mut flat_header = vec![String::new()];
        let mut spans = vec![HeaderSpan::blank(1)];
        for group in groups {
            let label = group.label();
            for kind in &kinds {
                columns.push(kind.label().to_string());
                flat_header.push(format!("{} / {}", label, kind.label()));
            }
            if !kinds.is_empty() {
                spans.push(HeaderSpan::new(label, kinds.len()));
            }
        }
        if with_differences {
            for name in [StatisticKind::DiffInMeans.label(), precision_label] {
                columns.push(name.to_string());
                flat_header.push(name.to_string());
            }
            spans.push(HeaderSpan::blank(2));
        }

        let mut body = TableBody::new(columns);
        body.meta.flat_header = flat_header;
        body.meta.spans = vec![spans];
        body.meta.title = options.title.clone();
        body.meta.notes = options.notes.clone();

        let blank_diff = || vec![String::new(), String::new()];

        for block in &self.blocks {
            match block.kind {
                BlockKind::Numeric => {
                    let mut cells = vec![block.column.clone()];
                    for g in 0..groups.len() {
                        for kind in &kinds {
                            cells.push(
                                block
                                    .row(*kind, None)
                                    .map(|r| r.cells[g].clone())
                                    .unwrap_or_default(),
                            );
                        }
                    }
                    if with_differences {
                        cells.extend(match self.difference_for(&block.column) {
                            Some(diff) => vec![
                                options.fmt.format(diff.estimate),
                                diff.precision(options.dinm_statistic)
                                    .map(|v| options.fmt.format(v))
                                    .unwrap_or_default(),
                            ],
                            None => blank_diff(),
                        });
                    }
                    body.push_row(cells, origin(&block.column, None))?;
                }
                BlockKind::Categorical => {
                    let levels = block.levels();
                    if levels.is_empty() {
                        debug!("'{}' has no observed levels; no rows added", block.column);
                        continue;
                    }
                    if body.nrows() > 0 {
                        body.add_rule_after(body.nrows() - 1);
                    }
                    for level in levels {
                        let mut cells = vec![format!("{}: {}", block.column, level)];
                        for g in 0..groups.len() {
                            for kind in &kinds {
                                cells.push(
                                    block
                                        .row(*kind, Some(level))
                                        .map(|r| r.cells[g].clone())
                                        .unwrap_or_default(),
                                );
                            }
                        }
                        if with_differences {
                            cells.extend(blank_diff());
                        }
                        body.push_row(cells, origin(&block.column, Some(level)))?;
                    }
                }
            }
        }

        debug!(
            "assembled balance table: {} rows x {} columns",
            body.nrows(),
            body.ncols()
        );
        Ok(body)
    }
}

fn origin(column: &str, level: Option<&str>) -> RowOrigin {
    RowOrigin::Variable {
        name: column.to_string(),
        level: level.map(String::from),
    }
}

/// Compute the long-form balance statistics.
pub fn summarize_balance(
    dataset: &Dataset,
    selector: &GroupSelector,
    options: &BalanceOptions,
) -> Result<BalanceSummary> {
    let group_column = selector.resolve(dataset)?;
    let grouping = Grouping::from_column(group_column)?;
    debug!(
        "grouping by '{}' into {} groups",
        grouping.column,
        grouping.len()
    );

    let reserved = [
        selector.name(),
        options.cluster_column.as_str(),
        options.block_column.as_str(),
    ];
    let summarized: Vec<_> = dataset
        .columns()
        .iter()
        .filter(|c| !reserved.contains(&c.name.as_str()))
        .collect();

    for column in summarized.iter().filter(|c| !c.is_numeric_like()) {
        check_level_ceiling(&column.name, column.level_count())?;
    }

    let numeric: Vec<&str> = summarized
        .iter()
        .filter(|c| c.is_numeric_like())
        .map(|c| c.name.as_str())
        .collect();
    let categorical: Vec<&str> = summarized
        .iter()
        .filter(|c| !c.is_numeric_like())
        .map(|c| c.name.as_str())
        .collect();
    debug!(
        "summarizing {} numeric and {} categorical columns",
        numeric.len(),
        categorical.len()
    );

    let summarizer = GroupSummarizer::new(&grouping, options.fmt);
    let mut blocks = summarizer.summarize(dataset, &numeric)?;
    blocks.extend(summarizer.summarize(dataset, &categorical)?);

    let differences = if options.dinm {
        estimate_differences(dataset, &grouping, &numeric, options)?
    } else {
        Vec::new()
    };

    Ok(BalanceSummary {
        grouping,
        blocks,
        differences,
    })
}

fn estimate_differences(
    dataset: &Dataset,
    grouping: &Grouping,
    numeric: &[&str],
    options: &BalanceOptions,
) -> Result<Vec<(String, Option<Difference>)>> {
    let Some(mut estimator) = DifferenceEstimator::from_grouping(grouping) else {
        info!(
            "difference in means needs exactly two groups, '{}' has {}; skipping",
            grouping.column,
            grouping.len()
        );
        return Ok(Vec::new());
    };

    if let Some(clusters) = dataset.column(&options.cluster_column) {
        debug!("using '{}' as cluster identifiers", clusters.name);
        estimator = estimator.with_clusters(clusters);
    }
    if let Some(blocks) = dataset.column(&options.block_column) {
        debug!("using '{}' as block identifiers", blocks.name);
        estimator = estimator.with_blocks(blocks);
    }

    let mut differences = Vec::with_capacity(numeric.len());
    for name in numeric {
        let values = dataset
            .column(name)
            .and_then(|c| c.numeric_values())
            .unwrap_or_default();
        let estimate = match estimator.estimate(name, &values) {
            Ok(diff) => Some(diff),
            Err(err) if err.is_soft() => {
                warn!("{}", err);
                None
            }
            Err(err) => return Err(err),
        };
        differences.push((name.to_string(), estimate));
    }
    Ok(differences)
}

/// Build a balance table in one call.
///
/// # Example
///
/// ```rust
/// use baltablib::{build_balance_table, BalanceOptions, Column, Dataset, GroupSelector};
///
/// let data = Dataset::new(vec![
///     Column::numeric("treat", vec![Some(0.0), Some(0.0), Some(1.0), Some(1.0)]),
///     Column::numeric("age", vec![Some(20.0), Some(30.0), Some(40.0), Some(50.0)]),
/// ])
/// .unwrap();
///
/// let selector = GroupSelector::parse("~ treat").unwrap();
/// let table = build_balance_table(&data, &selector, &BalanceOptions::new()).unwrap();
///
/// assert_eq!(table.nrows(), 1);
/// assert_eq!(table.rows[0][1], "25.000");
/// ```
pub fn build_balance_table(
    dataset: &Dataset,
    selector: &GroupSelector,
    options: &BalanceOptions,
) -> Result<TableBody> {
    let summary = summarize_balance(dataset, selector, options)?;
    let with_differences = options.dinm && summary.grouping.len() == 2;
    summary.to_table(options, with_differences)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Column;
    use crate::error::BalanceError;
    use crate::options::DiffStatistic;

    fn selector() -> GroupSelector {
        GroupSelector::parse("~ treat").unwrap()
    }

    /// 18 control and 14 treated rows.
    fn trial() -> Dataset {
        let treat: Vec<Option<f64>> = (0..32).map(|i| Some(if i < 18 { 0.0 } else { 1.0 })).collect();
        let score: Vec<Option<f64>> = (0..32).map(|i| Some((i % 7) as f64 + if i < 18 { 0.0 } else { 1.5 })).collect();
        Dataset::new(vec![
            Column::numeric("treat", treat),
            Column::numeric("score", score),
        ])
        .unwrap()
    }

    #[test]
    fn test_single_numeric_column_scenario() {
        let table = build_balance_table(&trial(), &selector(), &BalanceOptions::new()).unwrap();

        assert_eq!(table.nrows(), 1);
        assert_eq!(
            table.columns,
            vec!["", "Mean", "Std. Dev.", "Mean", "Std. Dev.", "Diff. in Means", "Std. Error"]
        );
        let spans = &table.meta.spans[0];
        assert_eq!(spans[1], HeaderSpan::new("0 (N=18)", 2));
        assert_eq!(spans[2], HeaderSpan::new("1 (N=14)", 2));
        assert_eq!(spans[3], HeaderSpan::blank(2));
        assert_eq!(table.meta.flat_header[1], "0 (N=18) / Mean");
        assert_eq!(table.rows[0][0], "score");
        assert!(!table.rows[0][5].is_empty());
        assert!(!table.rows[0][6].is_empty());
        assert!(table.validate().is_ok());
    }

    #[test]
    fn test_categorical_scenario_row_counts() {
        let treat: Vec<Option<f64>> = (0..9).map(|i| Some((i % 2) as f64)).collect();
        let color: Vec<Option<&str>> = ["red", "green", "blue", "red", "red", "green", "blue", "blue", "red"]
            .into_iter()
            .map(Some)
            .collect();
        let data = Dataset::new(vec![
            Column::numeric("treat", treat),
            Column::categorical("color", &color),
        ])
        .unwrap();

        let summary = summarize_balance(&data, &selector(), &BalanceOptions::new()).unwrap();
        // 3 levels x (count, percent)
        assert_eq!(summary.statistic_rows().count(), 6);

        // Percent rows divided back out give each group's size
        for (g, group) in summary.grouping.groups.iter().enumerate() {
            let total: usize = summary
                .statistic_rows()
                .filter(|r| r.kind == StatisticKind::Count)
                .map(|r| r.cells[g].parse::<usize>().unwrap())
                .sum();
            assert_eq!(total, group.size());
            let pct: f64 = summary
                .statistic_rows()
                .filter(|r| r.kind == StatisticKind::Percent)
                .map(|r| r.cells[g].parse::<f64>().unwrap())
                .sum();
            assert!((pct - 100.0).abs() < 0.2);
        }

        let table = summary.to_table(&BalanceOptions::new(), true).unwrap();
        assert_eq!(table.nrows(), 3);
        assert_eq!(table.columns[1], "N");
        assert_eq!(table.columns[2], "%");
        assert_eq!(table.rows[0][0], "color: red");
        // Categorical rows never get a difference
        assert!(table.rows.iter().all(|r| r[5].is_empty() && r[6].is_empty()));
    }

    #[test]
    fn test_row_count_formula() {
        let treat: Vec<Option<f64>> = (0..6).map(|i| Some((i % 2) as f64)).collect();
        let data = Dataset::new(vec![
            Column::numeric("treat", treat),
            Column::numeric("a", (0..6).map(|i| Some(i as f64)).collect()),
            Column::categorical("c", &[Some("x"), Some("y"), Some("x"), Some("z"), Some("y"), Some("x")]),
            Column::boolean("b", vec![Some(true), Some(false), None, Some(true), Some(true), Some(false)]),
            Column::categorical("d", &[Some("u"), Some("v"), Some("u"), Some("u"), Some("v"), Some("v")]),
        ])
        .unwrap();

        let summary = summarize_balance(&data, &selector(), &BalanceOptions::new()).unwrap();
        // 2 numeric columns, 3 + 2 categorical levels
        assert_eq!(summary.statistic_rows().count(), 2 * 2 + 2 * 5);

        let table = build_balance_table(&data, &selector(), &BalanceOptions::new()).unwrap();
        // numeric first, in dataset order, then categorical
        let labels: Vec<&str> = table.rows.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(labels, vec!["a", "b", "c: x", "c: y", "c: z", "d: u", "d: v"]);
        // 4 statistic kinds per group, 2 groups, plus label and two differences
        assert_eq!(table.ncols(), 1 + 4 * 2 + 2);
        // rules after the numeric block and between categorical blocks
        assert_eq!(table.meta.hrules, vec![1, 4]);
        // numeric rows leave the categorical statistics blank
        assert!(table.rows[0][3].is_empty() && table.rows[0][4].is_empty());
        assert!(table.validate().is_ok());
    }

    #[test]
    fn test_more_than_two_groups_disables_difference() {
        let data = Dataset::new(vec![
            Column::categorical("treat", &[Some("a"), Some("b"), Some("c"), Some("a")]),
            Column::numeric("x", vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)]),
        ])
        .unwrap();
        let table = build_balance_table(&data, &selector(), &BalanceOptions::new()).unwrap();
        assert_eq!(table.ncols(), 1 + 2 * 3);
        assert!(!table.columns.iter().any(|c| c == "Diff. in Means"));
    }

    #[test]
    fn test_dinm_disabled_and_p_value_label() {
        let no_diff = build_balance_table(&trial(), &selector(), &BalanceOptions::new().dinm(false)).unwrap();
        assert_eq!(no_diff.ncols(), 5);

        let with_p = build_balance_table(
            &trial(),
            &selector(),
            &BalanceOptions::new().dinm_statistic(DiffStatistic::PValue),
        )
        .unwrap();
        assert_eq!(with_p.columns.last().unwrap(), "p");
        let p: f64 = with_p.rows[0][6].parse().unwrap();
        assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    fn test_undefined_difference_leaves_blank_cells() {
        let data = Dataset::new(vec![
            Column::numeric("treat", vec![Some(0.0), Some(0.0), Some(1.0), Some(1.0)]),
            Column::numeric("x", vec![Some(1.0), Some(2.0), None, None]),
            Column::numeric("y", vec![Some(1.0), Some(2.0), Some(3.0), Some(5.0)]),
        ])
        .unwrap();
        let table = build_balance_table(&data, &selector(), &BalanceOptions::new()).unwrap();
        assert_eq!(table.rows[0][5], "");
        assert_eq!(table.rows[0][6], "");
        assert_eq!(table.rows[1][5], "2.500");
    }

    #[test]
    fn test_reserved_columns_are_not_summarized() {
        let data = Dataset::new(vec![
            Column::numeric("treat", vec![Some(0.0), Some(0.0), Some(1.0), Some(1.0)]),
            Column::numeric("x", vec![Some(1.0), Some(2.0), Some(3.0), Some(5.0)]),
            Column::categorical("clusters", &[Some("a"), Some("b"), Some("c"), Some("d")]),
            Column::categorical("blocks", &[Some("p"), Some("p"), Some("p"), Some("p")]),
        ])
        .unwrap();
        let table = build_balance_table(&data, &selector(), &BalanceOptions::new()).unwrap();
        assert_eq!(table.nrows(), 1);
        assert_eq!(table.rows[0][0], "x");
    }

    #[test]
    fn test_all_missing_categorical_adds_nothing() {
        let empty: Vec<Option<&str>> = vec![None; 4];
        let data = Dataset::new(vec![
            Column::numeric("treat", vec![Some(0.0), Some(0.0), Some(1.0), Some(1.0)]),
            Column::numeric("x", vec![Some(1.0), Some(2.0), Some(3.0), Some(5.0)]),
            Column::categorical("empty", &empty),
        ])
        .unwrap();
        let table = build_balance_table(&data, &selector(), &BalanceOptions::new()).unwrap();

        assert_eq!(table.nrows(), 1);
        assert_eq!(
            table.columns,
            vec!["", "Mean", "Std. Dev.", "Mean", "Std. Dev.", "Diff. in Means", "Std. Error"]
        );
        assert!(table.meta.hrules.is_empty());
        assert!(table.validate().is_ok());
    }

    /// Two arms of four rows; cluster labels pair up rows within each arm.
    fn clustered(cluster_name: &str) -> Dataset {
        Dataset::new(vec![
            Column::numeric("treat", [0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0].map(Some).to_vec()),
            Column::numeric("x", [1.0, 2.0, 3.0, 4.0, 2.0, 4.0, 6.0, 8.0].map(Some).to_vec()),
            Column::categorical(
                cluster_name,
                &["a", "a", "b", "b", "c", "c", "d", "d"].map(Some),
            ),
        ])
        .unwrap()
    }

    fn difference_cells(table: &TableBody) -> (&str, &str) {
        let row = &table.rows[0];
        (row[row.len() - 2].as_str(), row[row.len() - 1].as_str())
    }

    #[test]
    fn test_clusters_column_switches_standard_error() {
        let data = clustered("clusters");
        let clustered_table = build_balance_table(&data, &selector(), &BalanceOptions::new()).unwrap();
        // CR1 with 4 clusters
        assert_eq!(difference_cells(&clustered_table), ("2.500", "1.972"));

        let without = Dataset::new(data.columns()[..2].to_vec()).unwrap();
        let welch_table = build_balance_table(&without, &selector(), &BalanceOptions::new()).unwrap();
        assert_eq!(difference_cells(&welch_table), ("2.500", "1.443"));
    }

    #[test]
    fn test_renamed_cluster_column() {
        let data = clustered("school");

        // by default 'school' is just another categorical column
        let default_table = build_balance_table(&data, &selector(), &BalanceOptions::new()).unwrap();
        assert_eq!(difference_cells(&default_table), ("2.500", "1.443"));
        assert!(default_table.rows.iter().any(|r| r[0] == "school: a"));

        let options = BalanceOptions::new().cluster_column("school");
        let table = build_balance_table(&data, &selector(), &options).unwrap();
        assert_eq!(table.nrows(), 1);
        assert_eq!(difference_cells(&table), ("2.500", "1.972"));
    }

    #[test]
    fn test_blocks_column_weights_estimate() {
        // block p: 2 vs 2 rows, difference 4; block q: 2 vs 3 rows, difference 11
        let data = Dataset::new(vec![
            Column::numeric(
                "treat",
                [0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0].map(Some).to_vec(),
            ),
            Column::numeric(
                "x",
                [1.0, 3.0, 5.0, 7.0, 10.0, 12.0, 20.0, 22.0, 24.0].map(Some).to_vec(),
            ),
            Column::categorical(
                "blocks",
                &["p", "p", "p", "p", "q", "q", "q", "q", "q"].map(Some),
            ),
        ])
        .unwrap();
        let table = build_balance_table(&data, &selector(), &BalanceOptions::new()).unwrap();

        // 4/9 * 4 + 5/9 * 11, not the pooled 9.100
        assert_eq!(difference_cells(&table), ("7.889", "1.056"));
        assert_eq!(table.nrows(), 1);
    }

    #[test]
    fn test_invalid_grouping_stops_early() {
        let result = build_balance_table(&trial(), &GroupSelector::column("arm").unwrap(), &BalanceOptions::new());
        assert!(matches!(result, Err(BalanceError::InvalidGrouping(_))));
    }

    #[test]
    fn test_identifier_grouping_rejected() {
        let ids: Vec<Option<f64>> = (0..100).map(|i| Some(i as f64)).collect();
        let data = Dataset::new(vec![
            Column::numeric("id", ids.clone()),
            Column::numeric("x", ids),
        ])
        .unwrap();
        let result = build_balance_table(&data, &GroupSelector::parse("~ id").unwrap(), &BalanceOptions::new());
        assert!(matches!(result, Err(BalanceError::TooManyLevels { ref column, .. }) if column == "id"));
    }

    #[test]
    fn test_degenerate_single_group() {
        let data = Dataset::new(vec![
            Column::numeric("treat", vec![Some(1.0), Some(1.0)]),
            Column::numeric("x", vec![Some(1.0), Some(3.0)]),
        ])
        .unwrap();
        let table = build_balance_table(&data, &selector(), &BalanceOptions::new()).unwrap();
        assert_eq!(table.columns, vec!["", "Mean", "Std. Dev."]);
        assert_eq!(table.rows[0], vec!["x", "2.000", "1.414"]);
        assert!(table.validate().is_ok());
    }

    #[test]
    fn test_no_summarizable_columns() {
        let data = Dataset::new(vec![Column::numeric("treat", vec![Some(0.0), Some(1.0)])]).unwrap();
        let table = build_balance_table(&data, &selector(), &BalanceOptions::new()).unwrap();
        assert_eq!(table.nrows(), 0);
        assert!(table.validate().is_ok());
    }

    #[test]
    fn test_title_and_notes_carried() {
        let options = BalanceOptions::new().title("Balance").note("Means by arm");
        let table = build_balance_table(&trial(), &selector(), &options).unwrap();
        assert_eq!(table.meta.title.as_deref(), Some("Balance"));
        assert_eq!(table.meta.notes, vec!["Means by arm"]);
    }
}
