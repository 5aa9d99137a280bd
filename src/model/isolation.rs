//! Isolation forest over daily attendance features.
//!
//! Points that are easy to isolate by random axis-aligned splits end up on short paths.
//! The score `s(x) = 2^(-E[h(x)] / c(psi))` approaches 1 for outliers and sits near or below
//! 0.5 for ordinary points. The decision threshold is fixed at training time as the
//! `1 - contamination` quantile of training scores.

use crate::config::AnomalyConfig;
use crate::error::ModelError;
use ndarray::{ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Minimum number of training rows.
pub const MIN_TRAINING_SAMPLES: usize = 10;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Average path length of an unsuccessful BST search among `n` points.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct IsolationTree {
    root: Node,
}

impl IsolationTree {
    fn grow(x: &ArrayView2<'_, f64>, rows: Vec<usize>, max_depth: usize, rng: &mut StdRng) -> Self {
        Self {
            root: Self::grow_node(x, rows, 0, max_depth, rng),
        }
    }

    fn grow_node(
        x: &ArrayView2<'_, f64>,
        rows: Vec<usize>,
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> Node {
        if depth >= max_depth || rows.len() <= 1 {
            return Node::Leaf { size: rows.len() };
        }

        // Only features that still vary inside this node can split it
        let ranges: Vec<(usize, f64, f64)> = (0..x.ncols())
            .filter_map(|f| {
                let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| {
                    let v = x[[r, f]];
                    (lo.min(v), hi.max(v))
                });
                (lo < hi).then_some((f, lo, hi))
            })
            .collect();
        if ranges.is_empty() {
            return Node::Leaf { size: rows.len() };
        }

        let (feature, lo, hi) = ranges[rng.gen_range(0..ranges.len())];
        let threshold = rng.gen_range(lo..hi);
        let (left, right): (Vec<usize>, Vec<usize>) =
            rows.into_iter().partition(|&r| x[[r, feature]] < threshold);

        Node::Split {
            feature,
            threshold,
            left: Box::new(Self::grow_node(x, left, depth + 1, max_depth, rng)),
            right: Box::new(Self::grow_node(x, right, depth + 1, max_depth, rng)),
        }
    }

    fn path_length(&self, point: &ArrayView1<'_, f64>) -> f64 {
        let mut node = &self.root;
        let mut depth = 0.0;
        loop {
            match node {
                Node::Leaf { size } => return depth + average_path_length(*size),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if point[*feature] < *threshold { left } else { right };
                    depth += 1.0;
                }
            }
        }
    }
}

/// Trained isolation forest together with its decision threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyModel {
    trees: Vec<IsolationTree>,
    n_features: usize,
    /// Rows drawn per tree; normalizes path lengths
    sample_size: usize,
    contamination: f64,
    /// Scores strictly above this are anomalies
    threshold: f64,
    seed: u64,
}

impl AnomalyModel {
    /// Fit on `x` (`n x d`, already validated). Needs at least [`MIN_TRAINING_SAMPLES`] rows.
    pub fn train(x: ArrayView2<'_, f64>, params: &AnomalyConfig) -> Result<Self, ModelError> {
        if !(params.contamination > 0.0 && params.contamination < 1.0) {
            return Err(ModelError::InvalidParameter {
                name: "contamination",
                reason: format!("{} is outside (0, 1)", params.contamination),
            });
        }
        if params.n_trees == 0 || params.max_samples < 2 {
            return Err(ModelError::InvalidParameter {
                name: "n_trees/max_samples",
                reason: "need at least one tree and two samples per tree".to_string(),
            });
        }
        let n = x.nrows();
        if n < MIN_TRAINING_SAMPLES {
            return Err(ModelError::InsufficientData {
                required: MIN_TRAINING_SAMPLES,
                found: n,
            });
        }

        let sample_size = params.max_samples.min(n);
        let max_depth = (sample_size as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(params.seed);
        let trees = (0..params.n_trees)
            .map(|_| {
                let rows = index::sample(&mut rng, n, sample_size).into_vec();
                IsolationTree::grow(&x, rows, max_depth, &mut rng)
            })
            .collect();

        let mut model = Self {
            trees,
            n_features: x.ncols(),
            sample_size,
            contamination: params.contamination,
            threshold: f64::INFINITY,
            seed: params.seed,
        };
        let mut scores = model.raw_scores(&x);
        scores.sort_by(|a, b| a.total_cmp(b));
        model.threshold = quantile(&scores, 1.0 - params.contamination);
        Ok(model)
    }

    fn raw_scores(&self, x: &ArrayView2<'_, f64>) -> Vec<f64> {
        let norm = average_path_length(self.sample_size);
        x.axis_iter(Axis(0))
            .map(|row| {
                let mean_depth = self.trees.iter().map(|t| t.path_length(&row)).sum::<f64>()
                    / self.trees.len() as f64;
                2f64.powf(-mean_depth / norm)
            })
            .collect()
    }

    fn check_width(&self, x: &ArrayView2<'_, f64>) -> Result<(), ModelError> {
        if x.ncols() != self.n_features {
            return Err(ModelError::DimensionMismatch {
                expected: self.n_features,
                found: x.ncols(),
            });
        }
        Ok(())
    }

    /// Anomaly score per row in (0, 1]; higher is more anomalous.
    pub fn score(&self, x: ArrayView2<'_, f64>) -> Result<Vec<f64>, ModelError> {
        self.check_width(&x)?;
        Ok(self.raw_scores(&x))
    }

    /// `true` for rows whose score crosses the training threshold.
    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Vec<bool>, ModelError> {
        Ok(self
            .score(x)?
            .into_iter()
            .map(|s| s > self.threshold)
            .collect())
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn contamination(&self) -> f64 {
        self.contamination
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

/// Linear-interpolated quantile of ascending `sorted`.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::INFINITY;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}
