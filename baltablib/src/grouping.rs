//! Grouping selectors and row partitions.
//!
//! A [`GroupSelector`] names the single categorical-like column that splits
//! the dataset into groups. It can be written as a one-sided formula
//! (`~ treat`) for convenience, but is validated into a plain column name at
//! construction time. [`Grouping`] is the resolved partition of rows.

use serde::{Deserialize, Serialize};

use crate::dataset::{Column, Dataset};
use crate::error::BalanceError;
use crate::Result;

/// Maximum number of distinct levels for grouping and categorical columns.
pub const LEVEL_CEILING: usize = 50;

/// Typed selector for the grouping column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSelector {
    column: String,
}

impl GroupSelector {
    /// Select a column by name.
    pub fn column(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(BalanceError::InvalidGrouping(
                "grouping column name is empty".to_string(),
            ));
        }
        Ok(Self { column: name })
    }

    /// Parse a one-sided formula naming exactly one variable, e.g. `~ treat`
    /// or `` ~ `treatment arm` ``.
    pub fn parse(formula: &str) -> Result<Self> {
        let invalid = |why: &str| {
            BalanceError::InvalidGrouping(format!("'{}': {}", formula.trim(), why))
        };

        let (lhs, rhs) = formula
            .split_once('~')
            .ok_or_else(|| invalid("expected a one-sided formula such as '~ treat'"))?;
        if !lhs.trim().is_empty() {
            return Err(invalid("the formula must be one-sided"));
        }

        let rhs = rhs.trim();
        if rhs.is_empty() {
            return Err(invalid("no grouping variable given"));
        }

        if let Some(quoted) = rhs.strip_prefix('`') {
            return match quoted.strip_suffix('`') {
                Some(name) if !name.is_empty() && !name.contains('`') => Self::column(name),
                _ => Err(invalid("unterminated quoted variable name")),
            };
        }

        let is_identifier = rhs
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '.')
            && !rhs.starts_with(|c: char| c.is_ascii_digit())
            && rhs != ".";
        if !is_identifier {
            return Err(invalid("expected exactly one grouping variable"));
        }

        Self::column(rhs)
    }

    /// Name of the selected column.
    pub fn name(&self) -> &str {
        &self.column
    }

    /// Look the column up in a dataset.
    pub fn resolve<'a>(&self, dataset: &'a Dataset) -> Result<&'a Column> {
        dataset.column(&self.column).ok_or_else(|| {
            BalanceError::InvalidGrouping(format!(
                "column '{}' not found in dataset",
                self.column
            ))
        })
    }
}

/// One level of the grouping variable and the rows it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Level label
    pub value: String,
    /// Dataset row indices belonging to the group
    pub rows: Vec<usize>,
}

impl Group {
    /// Number of rows in the group.
    pub fn size(&self) -> usize {
        self.rows.len()
    }

    /// Display label, e.g. `"1 (N=18)"`.
    pub fn label(&self) -> String {
        format!("{} (N={})", self.value, self.size())
    }
}

/// The dataset rows partitioned by the grouping column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grouping {
    /// Name of the grouping column
    pub column: String,
    /// Groups in level order
    pub groups: Vec<Group>,
    /// Per-row group index (`None` when the grouping value is missing)
    pub membership: Vec<Option<usize>>,
}

impl Grouping {
    /// Partition the rows of a column, enforcing the level ceiling.
    pub fn from_column(column: &Column) -> Result<Self> {
        let (levels, codes) = column.level_codes();
        check_level_ceiling(&column.name, levels.len())?;

        let mut groups: Vec<Group> = levels
            .into_iter()
            .map(|value| Group {
                value,
                rows: Vec::new(),
            })
            .collect();
        for (row, code) in codes.iter().enumerate() {
            if let Some(g) = code {
                groups[*g].rows.push(row);
            }
        }

        let dropped = codes.iter().filter(|c| c.is_none()).count();
        if dropped > 0 {
            log::debug!(
                "dropping {} rows with missing grouping value in '{}'",
                dropped,
                column.name
            );
        }

        Ok(Self {
            column: column.name.clone(),
            groups,
            membership: codes,
        })
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether there are no groups at all.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Fail with `TooManyLevels` when a column has more levels than allowed.
pub fn check_level_ceiling(column: &str, levels: usize) -> Result<()> {
    if levels > LEVEL_CEILING {
        return Err(BalanceError::TooManyLevels {
            column: column.to_string(),
            levels,
            ceiling: LEVEL_CEILING,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_one_sided_formula() {
        assert_eq!(GroupSelector::parse("~ treat").unwrap().name(), "treat");
        assert_eq!(GroupSelector::parse("~treat").unwrap().name(), "treat");
        assert_eq!(GroupSelector::parse("  ~ arm.id ").unwrap().name(), "arm.id");
        assert_eq!(
            GroupSelector::parse("~ `treatment arm`").unwrap().name(),
            "treatment arm"
        );
    }

    #[test]
    fn test_parse_rejects_invalid_formulas() {
        for formula in [
            "treat",
            "y ~ treat",
            "~",
            "~ a + b",
            "~ a * b",
            "~ .",
            "~ 1",
            "~ `open",
            "~ f(x)",
        ] {
            let result = GroupSelector::parse(formula);
            assert!(
                matches!(result, Err(BalanceError::InvalidGrouping(_))),
                "expected rejection of {:?}",
                formula
            );
        }
    }

    #[test]
    fn test_resolve_missing_column() {
        let data = Dataset::new(vec![Column::numeric("x", vec![Some(1.0)])]).unwrap();
        let selector = GroupSelector::column("treat").unwrap();
        let err = selector.resolve(&data).unwrap_err();
        assert!(err.to_string().contains("treat"));
    }

    #[test]
    fn test_grouping_partitions_rows() {
        let col = Column::numeric("treat", vec![Some(1.0), Some(0.0), None, Some(1.0)]);
        let grouping = Grouping::from_column(&col).unwrap();
        assert_eq!(grouping.len(), 2);
        assert_eq!(grouping.groups[0].value, "0");
        assert_eq!(grouping.groups[0].rows, vec![1]);
        assert_eq!(grouping.groups[1].rows, vec![0, 3]);
        assert_eq!(grouping.groups[1].label(), "1 (N=2)");
        assert_eq!(grouping.membership[2], None);
    }

    #[test]
    fn test_grouping_level_ceiling() {
        let ids: Vec<Option<f64>> = (0..100).map(|i| Some(i as f64)).collect();
        let col = Column::numeric("id", ids);
        match Grouping::from_column(&col) {
            Err(BalanceError::TooManyLevels {
                column,
                levels,
                ceiling,
            }) => {
                assert_eq!(column, "id");
                assert_eq!(levels, 100);
                assert_eq!(ceiling, LEVEL_CEILING);
            }
            other => panic!("expected TooManyLevels, got {:?}", other),
        }
    }
}
