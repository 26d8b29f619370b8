//! Seeded train/validation/test partitioning

use crate::error::{ChurnError, Result};
use crate::utils::frame::{numeric_values, take_rows};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

const PROPORTION_TOLERANCE: f64 = 1e-6;

/// Split proportions, as fractions of the whole dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SplitConfig {
    pub test_size: f64,
    pub val_size: f64,
    /// Preserve the label ratio in every subset
    pub stratify: bool,
}

impl Default for SplitConfig {
    fn default() -> Self {
        // 64 / 16 / 20
        Self {
            test_size: 0.2,
            val_size: 0.16,
            stratify: true,
        }
    }
}

impl SplitConfig {
    /// Build from three explicit proportions that must sum to 1
    pub fn from_proportions(train: f64, val: f64, test: f64) -> Result<Self> {
        let sum = train + val + test;
        if (sum - 1.0).abs() > PROPORTION_TOLERANCE {
            return Err(ChurnError::Config(format!(
                "split proportions must sum to 1.0, got {}",
                sum
            )));
        }
        let config = Self {
            test_size: test,
            val_size: val,
            stratify: true,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_stratify(mut self, stratify: bool) -> Self {
        self.stratify = stratify;
        self
    }

    pub fn train_size(&self) -> f64 {
        1.0 - self.test_size - self.val_size
    }

    pub fn validate(&self) -> Result<()> {
        for (name, p) in [
            ("test_size", self.test_size),
            ("val_size", self.val_size),
            ("train_size", self.train_size()),
        ] {
            if !(p > 0.0 && p < 1.0) {
                return Err(ChurnError::Config(format!(
                    "{} must be in (0, 1), got {}",
                    name, p
                )));
            }
        }
        Ok(())
    }
}

/// Source row positions assigned to each subset, ascending
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub val: Vec<usize>,
    pub test: Vec<usize>,
}

impl SplitIndices {
    pub fn total(&self) -> usize {
        self.train.len() + self.val.len() + self.test.len()
    }
}

/// The three partitions of a dataset
#[derive(Debug, Clone)]
pub struct DataSplit {
    pub train: DataFrame,
    pub val: DataFrame,
    pub test: DataFrame,
    pub indices: SplitIndices,
}

/// Deterministic splitter for a fixed seed
#[derive(Debug, Clone)]
pub struct Splitter {
    config: SplitConfig,
    seed: u64,
}

impl Splitter {
    pub fn new(config: SplitConfig, seed: u64) -> Self {
        Self { config, seed }
    }

    /// Partition `df`, stratifying on `target` when enabled
    pub fn split(&self, df: &DataFrame, target: &str) -> Result<DataSplit> {
        let labels = if self.config.stratify {
            let labels = numeric_values(df, target)?
                .into_iter()
                .enumerate()
                .map(|(row, v)| {
                    v.map(|x| x as i64).ok_or_else(|| {
                        ChurnError::DataIntegrity(format!(
                            "label '{}' is missing at row {}",
                            target, row
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Some(labels)
        } else {
            None
        };

        let indices = self.split_indices(df.height(), labels.as_deref())?;
        info!(
            train = indices.train.len(),
            val = indices.val.len(),
            test = indices.test.len(),
            stratify = self.config.stratify,
            seed = self.seed,
            "Split dataset"
        );

        Ok(DataSplit {
            train: take_rows(df, &indices.train)?,
            val: take_rows(df, &indices.val)?,
            test: take_rows(df, &indices.test)?,
            indices,
        })
    }

    /// Assign `n` rows to subsets. `labels`, when given, has length `n`.
    pub fn split_indices(&self, n: usize, labels: Option<&[i64]>) -> Result<SplitIndices> {
        self.config.validate()?;
        if n == 0 {
            return Err(ChurnError::DataIntegrity("cannot split an empty dataset".to_string()));
        }

        let n_test = (n as f64 * self.config.test_size).round() as usize;
        let n_val = (n as f64 * self.config.val_size).round() as usize;
        if n_test + n_val > n {
            return Err(ChurnError::Config(format!(
                "{} rows are too few for the requested proportions",
                n
            )));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        let groups: Vec<Vec<usize>> = match labels.filter(|_| self.config.stratify) {
            None => vec![(0..n).collect()],
            Some(labels) => {
                if labels.len() != n {
                    return Err(ChurnError::Shape {
                        expected: n.to_string(),
                        actual: labels.len().to_string(),
                    });
                }
                let mut classes: Vec<i64> = labels.to_vec();
                classes.sort_unstable();
                classes.dedup();
                classes
                    .iter()
                    .map(|c| (0..n).filter(|&i| labels[i] == *c).collect())
                    .collect()
            }
        };

        let sizes: Vec<usize> = groups.iter().map(Vec::len).collect();
        let test_quota = largest_remainder(&sizes, self.config.test_size, n_test, &sizes);
        let remaining: Vec<usize> = sizes.iter().zip(&test_quota).map(|(s, t)| s - t).collect();
        let val_quota = largest_remainder(&sizes, self.config.val_size, n_val, &remaining);

        let mut indices = SplitIndices {
            train: Vec::with_capacity(n - n_test - n_val),
            val: Vec::with_capacity(n_val),
            test: Vec::with_capacity(n_test),
        };
        for ((mut group, n_test_c), n_val_c) in groups.into_iter().zip(test_quota).zip(val_quota) {
            group.shuffle(&mut rng);
            indices.test.extend_from_slice(&group[..n_test_c]);
            indices.val.extend_from_slice(&group[n_test_c..n_test_c + n_val_c]);
            indices.train.extend_from_slice(&group[n_test_c + n_val_c..]);
        }

        indices.train.sort_unstable();
        indices.val.sort_unstable();
        indices.test.sort_unstable();
        Ok(indices)
    }
}

/// Distribute `total` across groups proportionally to `sizes * fraction`,
/// handing leftover units to the largest fractional parts first and never
/// exceeding `caps`.
fn largest_remainder(sizes: &[usize], fraction: f64, total: usize, caps: &[usize]) -> Vec<usize> {
    let shares: Vec<f64> = sizes.iter().map(|&s| s as f64 * fraction).collect();
    let mut quota: Vec<usize> = shares
        .iter()
        .zip(caps)
        .map(|(share, &cap)| (share.floor() as usize).min(cap))
        .collect();

    let mut order: Vec<usize> = (0..sizes.len()).collect();
    order.sort_by(|&a, &b| {
        let ra = shares[a] - shares[a].floor();
        let rb = shares[b] - shares[b].floor();
        rb.total_cmp(&ra).then(a.cmp(&b))
    });

    let mut assigned: usize = quota.iter().sum();
    while assigned < total {
        let before = assigned;
        for &g in &order {
            if assigned == total {
                break;
            }
            if quota[g] < caps[g] {
                quota[g] += 1;
                assigned += 1;
            }
        }
        if assigned == before {
            break;
        }
    }
    quota
}
