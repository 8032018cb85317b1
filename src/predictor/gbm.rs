//! Gradient-boosted regression trees over histogram-binned features.
//!
//! Both models share one tree grower fitting Newton steps on per-sample
//! gradients and hessians: squared error for the regressor, logistic loss for
//! the up/down classifier. Fitting is deterministic: no subsampling and ties
//! between candidate splits go to the first one found.

use crate::config::ForecastConfig;

const MIN_HESSIAN_TO_SPLIT: f64 = 1e-3;
const MIN_SPLIT_GAIN: f64 = 1e-12;
const MAX_BINS_CAP: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GbmParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    pub min_samples_leaf: usize,
    pub max_bins: usize,
}

impl From<&ForecastConfig> for GbmParams {
    fn from(cfg: &ForecastConfig) -> Self {
        Self {
            n_trees: cfg.n_trees,
            max_depth: cfg.max_depth,
            learning_rate: cfg.learning_rate,
            min_samples_leaf: cfg.min_samples_leaf.max(1),
            max_bins: cfg.max_bins.clamp(2, MAX_BINS_CAP),
        }
    }
}

impl Default for GbmParams {
    fn default() -> Self {
        Self::from(&ForecastConfig::default())
    }
}

/// Split candidates per feature, learned from the training matrix.
#[derive(Debug, Clone)]
struct FeatureBins {
    thresholds: Vec<Vec<f64>>,
}

impl FeatureBins {
    fn fit<R: AsRef<[f64]>>(x: &[R], max_bins: usize) -> Self {
        let n_features = x.first().map(|r| r.as_ref().len()).unwrap_or(0);
        let thresholds = (0..n_features)
            .map(|f| {
                let mut values: Vec<f64> = x
                    .iter()
                    .map(|r| r.as_ref()[f])
                    .filter(|v| v.is_finite())
                    .collect();
                candidate_thresholds(&mut values, max_bins)
            })
            .collect();
        Self { thresholds }
    }

    /// Column-major bin indices. Bin `b` holds values in
    /// `(thresholds[b - 1], thresholds[b]]`.
    fn bin_matrix<R: AsRef<[f64]>>(&self, x: &[R]) -> Vec<Vec<u16>> {
        self.thresholds
            .iter()
            .enumerate()
            .map(|(f, thresholds)| {
                x.iter()
                    .map(|r| thresholds.partition_point(|&t| t < r.as_ref()[f]) as u16)
                    .collect()
            })
            .collect()
    }
}

fn candidate_thresholds(values: &mut Vec<f64>, max_bins: usize) -> Vec<f64> {
    values.sort_by(|a, b| a.total_cmp(b));
    values.dedup();
    if values.len() < 2 {
        return Vec::new();
    }
    if values.len() <= max_bins {
        return values
            .windows(2)
            .map(|w| w[0] + (w[1] - w[0]) / 2.0)
            .collect();
    }
    let mut out: Vec<f64> = Vec::with_capacity(max_bins - 1);
    for k in 1..max_bins {
        let i = k * values.len() / max_bins;
        let t = values[i - 1] + (values[i] - values[i - 1]) / 2.0;
        if out.last().map_or(true, |&last| t > last) {
            out.push(t);
        }
    }
    out
}

#[derive(Debug, Clone)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone)]
struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    fn predict(&self, x: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                Node::Leaf(v) => return v,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let v = x.get(feature).copied().unwrap_or(0.0);
                    idx = if v <= threshold { left } else { right };
                }
            }
        }
    }

    #[cfg(test)]
    fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf(_)))
            .count()
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    bin: usize,
    gain: f64,
}

struct TreeGrower<'a> {
    binned: &'a [Vec<u16>],
    bins: &'a FeatureBins,
    grad: &'a [f64],
    hess: &'a [f64],
    params: &'a GbmParams,
    nodes: Vec<Node>,
}

impl<'a> TreeGrower<'a> {
    fn new(
        binned: &'a [Vec<u16>],
        bins: &'a FeatureBins,
        grad: &'a [f64],
        hess: &'a [f64],
        params: &'a GbmParams,
    ) -> Self {
        Self {
            binned,
            bins,
            grad,
            hess,
            params,
            nodes: Vec::new(),
        }
    }

    fn grow(mut self, indices: Vec<usize>) -> RegressionTree {
        self.build(indices, 0);
        RegressionTree { nodes: self.nodes }
    }

    fn build(&mut self, indices: Vec<usize>, depth: usize) -> usize {
        let (g, h) = indices
            .iter()
            .fold((0.0, 0.0), |(g, h), &i| (g + self.grad[i], h + self.hess[i]));
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf(leaf_value(g, h)));

        let min_leaf = self.params.min_samples_leaf.max(1);
        if depth >= self.params.max_depth
            || indices.len() < 2 * min_leaf
            || h < MIN_HESSIAN_TO_SPLIT
        {
            return id;
        }
        let Some(split) = self.best_split(&indices, g, h) else {
            return id;
        };

        let column = &self.binned[split.feature];
        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| column[i] as usize <= split.bin);
        let left_id = self.build(left, depth + 1);
        let right_id = self.build(right, depth + 1);
        self.nodes[id] = Node::Split {
            feature: split.feature,
            threshold: self.bins.thresholds[split.feature][split.bin],
            left: left_id,
            right: right_id,
        };
        id
    }

    fn best_split(&self, indices: &[usize], g_total: f64, h_total: f64) -> Option<SplitCandidate> {
        let min_leaf = self.params.min_samples_leaf.max(1);
        let parent = split_score(g_total, h_total);
        let mut best: Option<SplitCandidate> = None;

        for (feature, thresholds) in self.bins.thresholds.iter().enumerate() {
            if thresholds.is_empty() {
                continue;
            }
            let column = &self.binned[feature];
            let mut hist = vec![(0.0f64, 0.0f64, 0usize); thresholds.len() + 1];
            for &i in indices {
                let slot = &mut hist[column[i] as usize];
                slot.0 += self.grad[i];
                slot.1 += self.hess[i];
                slot.2 += 1;
            }

            let (mut gl, mut hl, mut nl) = (0.0, 0.0, 0usize);
            for (bin, &(gb, hb, nb)) in hist.iter().enumerate().take(thresholds.len()) {
                gl += gb;
                hl += hb;
                nl += nb;
                let nr = indices.len() - nl;
                if nl < min_leaf {
                    continue;
                }
                if nr < min_leaf {
                    break;
                }
                let gr = g_total - gl;
                let hr = h_total - hl;
                if hl < MIN_HESSIAN_TO_SPLIT || hr < MIN_HESSIAN_TO_SPLIT {
                    continue;
                }
                let gain = split_score(gl, hl) + split_score(gr, hr) - parent;
                if gain > MIN_SPLIT_GAIN && best.map_or(true, |b| gain > b.gain) {
                    best = Some(SplitCandidate { feature, bin, gain });
                }
            }
        }
        best
    }
}

fn split_score(g: f64, h: f64) -> f64 {
    if h <= 1e-12 {
        0.0
    } else {
        g * g / h
    }
}

fn leaf_value(g: f64, h: f64) -> f64 {
    if h <= 1e-12 {
        0.0
    } else {
        -g / h
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Least-squares boosting.
#[derive(Debug, Clone)]
pub struct GradientBoostedRegressor {
    base: f64,
    learning_rate: f64,
    trees: Vec<RegressionTree>,
}

impl GradientBoostedRegressor {
    pub fn fit<R: AsRef<[f64]>>(x: &[R], y: &[f64], params: &GbmParams) -> Self {
        let n = x.len().min(y.len());
        if n == 0 {
            return Self {
                base: 0.0,
                learning_rate: params.learning_rate,
                trees: Vec::new(),
            };
        }
        let x = &x[..n];
        let y = &y[..n];
        let base = y.iter().sum::<f64>() / n as f64;

        let bins = FeatureBins::fit(x, params.max_bins);
        let binned = bins.bin_matrix(x);
        let hess = vec![1.0; n];
        let mut grad = vec![0.0; n];
        let mut pred = vec![base; n];
        let mut trees = Vec::with_capacity(params.n_trees);

        for _ in 0..params.n_trees {
            for i in 0..n {
                grad[i] = pred[i] - y[i];
            }
            let tree = TreeGrower::new(&binned, &bins, &grad, &hess, params).grow((0..n).collect());
            for (i, row) in x.iter().enumerate() {
                pred[i] += params.learning_rate * tree.predict(row.as_ref());
            }
            trees.push(tree);
        }

        Self {
            base,
            learning_rate: params.learning_rate,
            trees,
        }
    }

    pub fn predict(&self, x: &[f64]) -> f64 {
        self.base
            + self.learning_rate * self.trees.iter().map(|t| t.predict(x)).sum::<f64>()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

/// Logistic-loss boosting for `P(up)`. A single-class training set yields a
/// constant model returning the class prior.
#[derive(Debug, Clone)]
pub struct GradientBoostedClassifier {
    base_log_odds: f64,
    learning_rate: f64,
    trees: Vec<RegressionTree>,
    constant: Option<f64>,
}

impl GradientBoostedClassifier {
    pub fn fit<R: AsRef<[f64]>>(x: &[R], labels: &[bool], params: &GbmParams) -> Self {
        let n = x.len().min(labels.len());
        let positives = labels[..n].iter().filter(|&&l| l).count();
        let constant = if n == 0 {
            Some(0.5)
        } else if positives == 0 {
            Some(0.0)
        } else if positives == n {
            Some(1.0)
        } else {
            None
        };
        if constant.is_some() {
            return Self {
                base_log_odds: 0.0,
                learning_rate: params.learning_rate,
                trees: Vec::new(),
                constant,
            };
        }

        let x = &x[..n];
        let y: Vec<f64> = labels[..n].iter().map(|&l| if l { 1.0 } else { 0.0 }).collect();
        let prior = positives as f64 / n as f64;
        let base_log_odds = (prior / (1.0 - prior)).ln();

        let bins = FeatureBins::fit(x, params.max_bins);
        let binned = bins.bin_matrix(x);
        let mut raw = vec![base_log_odds; n];
        let mut grad = vec![0.0; n];
        let mut hess = vec![0.0; n];
        let mut trees = Vec::with_capacity(params.n_trees);

        for _ in 0..params.n_trees {
            for i in 0..n {
                let p = sigmoid(raw[i]);
                grad[i] = p - y[i];
                hess[i] = p * (1.0 - p);
            }
            let tree = TreeGrower::new(&binned, &bins, &grad, &hess, params).grow((0..n).collect());
            for (i, row) in x.iter().enumerate() {
                raw[i] += params.learning_rate * tree.predict(row.as_ref());
            }
            trees.push(tree);
        }

        Self {
            base_log_odds,
            learning_rate: params.learning_rate,
            trees,
            constant: None,
        }
    }

    /// True when the training labels were a single class.
    pub fn is_degenerate(&self) -> bool {
        self.constant.is_some()
    }

    pub fn predict_proba(&self, x: &[f64]) -> f64 {
        if let Some(p) = self.constant {
            return p;
        }
        let raw = self.base_log_odds
            + self.learning_rate * self.trees.iter().map(|t| t.predict(x)).sum::<f64>();
        sigmoid(raw)
    }
}
