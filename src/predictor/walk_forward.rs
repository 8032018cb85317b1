use std::ops::Range;

use super::gbm::{GbmParams, GradientBoostedClassifier, GradientBoostedRegressor};

/// Rows per fold below which an extra fold is not worth it.
pub const ROWS_PER_FOLD: usize = 50;
pub const MIN_FOLDS: usize = 2;

/// Expanding-window fold: train on everything before `test`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldSplit {
    pub train: Range<usize>,
    pub test: Range<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CvDiagnostics {
    pub n_folds: usize,
    pub rmse: Option<f64>,
    /// Mean AUC over folds whose test labels had both classes.
    pub auc: Option<f64>,
    pub auc_folds: usize,
}

pub fn fold_count(n_train: usize, max_cv_folds: usize) -> usize {
    max_cv_folds.min((n_train / ROWS_PER_FOLD).max(MIN_FOLDS))
}

/// Ordered folds with equal-size test blocks at the tail of `0..n`. The
/// remainder of `n / (n_folds + 1)` goes to the first training window.
pub fn expanding_window_splits(n: usize, n_folds: usize) -> Vec<FoldSplit> {
    if n_folds == 0 || n < n_folds + 1 {
        return Vec::new();
    }
    let test_size = n / (n_folds + 1);
    (0..n_folds)
        .map(|j| {
            let test_start = n - (n_folds - j) * test_size;
            FoldSplit {
                train: 0..test_start,
                test: test_start..test_start + test_size,
            }
        })
        .collect()
}

/// Area under the ROC curve from rank sums, ties sharing their mean rank.
/// `None` when `labels` holds a single class.
pub fn roc_auc(labels: &[bool], scores: &[f64]) -> Option<f64> {
    let n = labels.len().min(scores.len());
    let n_pos = labels[..n].iter().filter(|&&l| l).count();
    let n_neg = n - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut pos_rank_sum = 0.0;
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // ranks are 1-based; the tie block i..=j shares the mean
        let mean_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            if labels[idx] {
                pos_rank_sum += mean_rank;
            }
        }
        i = j + 1;
    }

    let u = pos_rank_sum - (n_pos * (n_pos + 1)) as f64 / 2.0;
    Some(u / (n_pos * n_neg) as f64)
}

pub fn rmse(actual: &[f64], predicted: &[f64]) -> Option<f64> {
    let n = actual.len().min(predicted.len());
    if n == 0 {
        return None;
    }
    let sse: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    Some((sse / n as f64).sqrt())
}

/// Refits both models on each fold's training window and scores the
/// following test block.
pub fn cross_validate<R: AsRef<[f64]>>(
    x: &[R],
    y: &[f64],
    labels: &[bool],
    n_folds: usize,
    params: &GbmParams,
) -> CvDiagnostics {
    let splits = expanding_window_splits(x.len().min(y.len()), n_folds);
    let mut rmses = Vec::with_capacity(splits.len());
    let mut aucs = Vec::with_capacity(splits.len());

    for split in &splits {
        let x_train = &x[split.train.clone()];
        let x_test = &x[split.test.clone()];

        let reg = GradientBoostedRegressor::fit(x_train, &y[split.train.clone()], params);
        let preds: Vec<f64> = x_test.iter().map(|r| reg.predict(r.as_ref())).collect();
        if let Some(v) = rmse(&y[split.test.clone()], &preds) {
            rmses.push(v);
        }

        let cls = GradientBoostedClassifier::fit(x_train, &labels[split.train.clone()], params);
        if cls.is_degenerate() {
            continue;
        }
        let probs: Vec<f64> = x_test.iter().map(|r| cls.predict_proba(r.as_ref())).collect();
        if let Some(v) = roc_auc(&labels[split.test.clone()], &probs) {
            aucs.push(v);
        }
    }

    CvDiagnostics {
        n_folds: splits.len(),
        rmse: mean(&rmses),
        auc: mean(&aucs),
        auc_folds: aucs.len(),
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}
