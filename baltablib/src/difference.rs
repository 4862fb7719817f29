//! Difference in means between exactly two groups.
//!
//! The estimate is always `mean(second group) - mean(first group)`.
//! Precision depends on the design:
//!
//! - **simple**: Welch standard error with Welch-Satterthwaite degrees of
//!   freedom
//! - **clustered**: CR1 cluster-robust standard error of the slope in
//!   `y ~ 1 + treated`, with `G - 1` degrees of freedom
//! - **blocked**: block-size weighted average of within-block differences;
//!   the variance is the weighted sum of within-block variances (clustered
//!   within blocks when clusters are also given), with `N - 2B` degrees of
//!   freedom

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::dataset::Column;
use crate::error::BalanceError;
use crate::grouping::Grouping;
use crate::options::DiffStatistic;
use crate::summary::{mean, variance};
use crate::Result;

/// Which of the two compared groups a row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Arm {
    /// First group (reference)
    Control,
    /// Second group
    Treated,
}

/// A difference-in-means estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Difference {
    /// Point estimate (second group minus first group)
    pub estimate: f64,
    /// Standard error, when the variance is identified
    pub std_error: Option<f64>,
    /// Degrees of freedom of the reference t distribution
    pub df: Option<f64>,
}

impl Difference {
    /// Two-sided p-value for a zero difference.
    pub fn p_value(&self) -> Option<f64> {
        let se = self.std_error.filter(|se| *se > 0.0)?;
        let df = self.df.filter(|df| df.is_finite() && *df > 0.0)?;
        let t = (self.estimate / se).abs();
        let dist = StudentsT::new(0.0, 1.0, df).ok()?;
        Some(2.0 * (1.0 - dist.cdf(t)))
    }

    /// The requested precision statistic.
    pub fn precision(&self, statistic: DiffStatistic) -> Option<f64> {
        match statistic {
            DiffStatistic::StdError => self.std_error,
            DiffStatistic::PValue => self.p_value(),
        }
    }
}

/// Labelled identifiers (clusters or blocks) per dataset row.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Partition {
    labels: Vec<String>,
    codes: Vec<Option<usize>>,
}

impl Partition {
    fn from_column(column: &Column) -> Self {
        let (labels, codes) = column.level_codes();
        Self { labels, codes }
    }
}

/// A single usable observation.
#[derive(Debug, Clone, Copy)]
struct Obs {
    value: f64,
    treated: bool,
    cluster: usize,
    block: usize,
}

/// Estimates differences in means for a fixed two-group design.
#[derive(Debug, Clone)]
pub struct DifferenceEstimator {
    arms: Vec<Option<Arm>>,
    clusters: Option<Partition>,
    blocks: Option<Partition>,
}

impl DifferenceEstimator {
    /// Estimator over explicit per-row arm assignments.
    pub fn new(arms: Vec<Option<Arm>>) -> Self {
        Self {
            arms,
            clusters: None,
            blocks: None,
        }
    }

    /// Estimator for a grouping with exactly two groups; `None` otherwise.
    pub fn from_grouping(grouping: &Grouping) -> Option<Self> {
        if grouping.len() != 2 {
            return None;
        }
        let arms = grouping
            .membership
            .iter()
            .map(|m| {
                m.map(|g| if g == 0 { Arm::Control } else { Arm::Treated })
            })
            .collect();
        Some(Self::new(arms))
    }

    /// Account for within-cluster correlation using the given column.
    pub fn with_clusters(mut self, column: &Column) -> Self {
        self.clusters = Some(Partition::from_column(column));
        self
    }

    /// Estimate within blocks of the given column.
    pub fn with_blocks(mut self, column: &Column) -> Self {
        self.blocks = Some(Partition::from_column(column));
        self
    }

    /// Whether a cluster column is in use.
    pub fn is_clustered(&self) -> bool {
        self.clusters.is_some()
    }

    /// Whether a block column is in use.
    pub fn is_blocked(&self) -> bool {
        self.blocks.is_some()
    }

    /// Estimate the difference in means for one numeric column.
    ///
    /// Rows with a missing value, arm, cluster or block are skipped. Returns
    /// `UndefinedDifference` when either group (or either group within a
    /// block) has no usable observations.
    pub fn estimate(&self, column: &str, values: &[Option<f64>]) -> Result<Difference> {
        let observations = self.observations(values);

        match &self.blocks {
            None => self.estimate_within(column, &observations),
            Some(blocks) => {
                let total = observations.len() as f64;
                let mut estimate = 0.0;
                let mut variance = Some(0.0);
                let mut used_blocks = 0usize;

                for (b, label) in blocks.labels.iter().enumerate() {
                    let in_block: Vec<Obs> =
                        observations.iter().copied().filter(|o| o.block == b).collect();
                    if in_block.is_empty() {
                        continue;
                    }
                    let within = self.estimate_within(column, &in_block).map_err(|_| {
                        BalanceError::UndefinedDifference {
                            column: column.to_string(),
                            reason: format!("block '{}' does not contain both groups", label),
                        }
                    })?;

                    let weight = in_block.len() as f64 / total;
                    estimate += weight * within.estimate;
                    variance = match (variance, within.std_error) {
                        (Some(v), Some(se)) => Some(v + weight * weight * se * se),
                        _ => None,
                    };
                    used_blocks += 1;
                }

                if used_blocks == 0 {
                    return Err(undefined(column, "no observations in any block"));
                }

                let df = total - 2.0 * used_blocks as f64;
                Ok(Difference {
                    estimate,
                    std_error: variance.map(f64::sqrt),
                    df: (df > 0.0).then_some(df),
                })
            }
        }
    }

    fn observations(&self, values: &[Option<f64>]) -> Vec<Obs> {
        let code = |partition: &Option<Partition>, row: usize| -> Option<usize> {
            match partition {
                None => Some(0),
                Some(p) => p.codes.get(row).copied().flatten(),
            }
        };

        values
            .iter()
            .enumerate()
            .filter_map(|(row, value)| {
                let value = (*value)?;
                let arm = self.arms.get(row).copied().flatten()?;
                Some(Obs {
                    value,
                    treated: arm == Arm::Treated,
                    cluster: code(&self.clusters, row)?,
                    block: code(&self.blocks, row)?,
                })
            })
            .collect()
    }

    /// Unblocked estimate over a set of observations.
    fn estimate_within(&self, column: &str, observations: &[Obs]) -> Result<Difference> {
        let treated: Vec<f64> = observations
            .iter()
            .filter(|o| o.treated)
            .map(|o| o.value)
            .collect();
        let control: Vec<f64> = observations
            .iter()
            .filter(|o| !o.treated)
            .map(|o| o.value)
            .collect();

        let (Some(mean_t), Some(mean_c)) = (mean(&treated), mean(&control)) else {
            return Err(undefined(column, "one of the groups has no observations"));
        };
        let estimate = mean_t - mean_c;

        let (std_error, df) = if self.clusters.is_some() {
            cluster_robust(observations, mean_t, mean_c)
        } else {
            welch(&treated, &control)
        };

        Ok(Difference {
            estimate,
            std_error,
            df,
        })
    }
}

fn undefined(column: &str, reason: &str) -> BalanceError {
    BalanceError::UndefinedDifference {
        column: column.to_string(),
        reason: reason.to_string(),
    }
}

/// Welch standard error and Welch-Satterthwaite degrees of freedom.
fn welch(treated: &[f64], control: &[f64]) -> (Option<f64>, Option<f64>) {
    let (Some(var_t), Some(var_c)) = (variance(treated), variance(control)) else {
        return (None, None);
    };
    let a = var_t / treated.len() as f64;
    let b = var_c / control.len() as f64;
    let se = (a + b).sqrt();

    let denominator =
        a * a / (treated.len() - 1) as f64 + b * b / (control.len() - 1) as f64;
    let df = (denominator > 0.0).then(|| (a + b).powi(2) / denominator);
    (Some(se), df)
}

/// CR1 cluster-robust standard error of the treatment coefficient.
///
/// For `y ~ 1 + D` the sandwich reduces to
/// `c * sum_g (S1_g / N1 - S0_g / N0)^2`, where `S1_g` and `S0_g` are the
/// residual sums of treated and control rows in cluster `g` and
/// `c = G / (G - 1) * (N - 1) / (N - 2)`.
fn cluster_robust(observations: &[Obs], mean_t: f64, mean_c: f64) -> (Option<f64>, Option<f64>) {
    let n = observations.len() as f64;
    let n1 = observations.iter().filter(|o| o.treated).count() as f64;
    let n0 = n - n1;

    let mut scores: Vec<(usize, f64)> = Vec::new();
    for o in observations {
        let score = if o.treated {
            (o.value - mean_t) / n1
        } else {
            -(o.value - mean_c) / n0
        };
        match scores.iter_mut().find(|(c, _)| *c == o.cluster) {
            Some((_, total)) => *total += score,
            None => scores.push((o.cluster, score)),
        }
    }

    let g = scores.len() as f64;
    if g < 2.0 || n <= 2.0 {
        return (None, None);
    }

    let correction = g / (g - 1.0) * (n - 1.0) / (n - 2.0);
    let meat: f64 = scores.iter().map(|(_, s)| s * s).sum();
    (Some((correction * meat).sqrt()), Some(g - 1.0))
}
