//! Binary classification metrics

use crate::error::{ChurnError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Metrics for one evaluated subset (class 1 = churn)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Area under the ROC curve; `None` when only one class is present
    pub auc: Option<f64>,
    pub n_samples: usize,
}

impl ClassificationMetrics {
    /// Compute metrics from labels, hard predictions and class-1 probabilities
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>, y_prob: &Array1<f64>) -> Result<Self> {
        let n = y_true.len();
        if y_pred.len() != n || y_prob.len() != n {
            return Err(ChurnError::Shape {
                expected: format!("{} predictions", n),
                actual: format!("{} labels, {} probabilities", y_pred.len(), y_prob.len()),
            });
        }
        if n == 0 {
            return Err(ChurnError::DataIntegrity("cannot evaluate zero rows".to_string()));
        }

        let (tp, fp, tn, fn_) = confusion_counts(y_true, y_pred);
        let accuracy = (tp + tn) as f64 / n as f64;
        // Zero-division resolves to 0, as in the usual convention
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Ok(Self {
            accuracy,
            precision,
            recall,
            f1,
            auc: roc_auc(y_true, y_prob),
            n_samples: n,
        })
    }

    /// Flat `(prefix_name, value)` pairs for tracking
    pub fn to_prefixed(&self, prefix: &str) -> Vec<(String, f64)> {
        let mut out = vec![
            (format!("{}_accuracy", prefix), self.accuracy),
            (format!("{}_precision", prefix), self.precision),
            (format!("{}_recall", prefix), self.recall),
            (format!("{}_f1", prefix), self.f1),
        ];
        if let Some(auc) = self.auc {
            out.push((format!("{}_auc", prefix), auc));
        }
        out
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn confusion_counts(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> (usize, usize, usize, usize) {
    let mut tp = 0;
    let mut fp = 0;
    let mut tn = 0;
    let mut fn_ = 0;

    for (t, p) in y_true.iter().zip(y_pred.iter()) {
        match (*t > 0.5, *p > 0.5) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (false, false) => tn += 1,
            (true, false) => fn_ += 1,
        }
    }

    (tp, fp, tn, fn_)
}

/// Rank-based AUC (Mann-Whitney U) with averaged ranks for tied scores
pub fn roc_auc(y_true: &Array1<f64>, y_prob: &Array1<f64>) -> Option<f64> {
    let n_pos = y_true.iter().filter(|&&t| t > 0.5).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..y_prob.len()).collect();
    order.sort_by(|&a, &b| y_prob[a].total_cmp(&y_prob[b]));

    let mut pos_rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && y_prob[order[end + 1]] == y_prob[order[start]] {
            end += 1;
        }
        // 1-based ranks start+1 ..= end+1
        let avg_rank = (start + end) as f64 / 2.0 + 1.0;
        for &i in &order[start..=end] {
            if y_true[i] > 0.5 {
                pos_rank_sum += avg_rank;
            }
        }
        start = end + 1;
    }

    let n_pos_f = n_pos as f64;
    let u = pos_rank_sum - n_pos_f * (n_pos_f + 1.0) / 2.0;
    Some(u / (n_pos_f * n_neg as f64))
}
