//! K-means with k-means++ seeding and multiple restarts.

use crate::config::ClusteringConfig;
use crate::error::ModelError;
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

fn squared_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Index and squared distance of the nearest centroid; lowest index wins ties.
fn nearest(point: ArrayView1<'_, f64>, centroids: &Array2<f64>) -> (usize, f64) {
    centroids
        .axis_iter(Axis(0))
        .enumerate()
        .map(|(k, c)| (k, squared_distance(point, c)))
        .fold((0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KMeans {
    /// `k` rows of standardized coordinates
    pub centroids: Vec<Vec<f64>>,
    /// Sum of squared distances of training points to their centroid
    pub inertia: f64,
    pub n_iter: usize,
}

/// Result of one Lloyd run.
struct Run {
    centroids: Array2<f64>,
    inertia: f64,
    n_iter: usize,
}

impl KMeans {
    /// Fit `k` centroids, keeping the best of `params.n_init` seeded restarts.
    pub fn fit(x: ArrayView2<'_, f64>, k: usize, params: &ClusteringConfig) -> Result<Self, ModelError> {
        if k == 0 || params.n_init == 0 || params.max_iter == 0 {
            return Err(ModelError::InvalidParameter {
                name: "k/n_init/max_iter",
                reason: "must all be positive".to_string(),
            });
        }
        if x.nrows() < k {
            return Err(ModelError::InsufficientData {
                required: k,
                found: x.nrows(),
            });
        }

        let mean_variance = x.var_axis(Axis(0), 0.0).mean().unwrap_or(0.0);
        let tol = params.tol * mean_variance;
        let mut rng = StdRng::seed_from_u64(params.seed);

        let mut best: Option<Run> = None;
        for restart in 0..params.n_init {
            let run = lloyd(x, seed_centroids(x, k, &mut rng), params.max_iter, tol);
            tracing::debug!(restart, inertia = run.inertia, n_iter = run.n_iter, "k-means restart");
            if best.as_ref().map_or(true, |b| run.inertia < b.inertia) {
                best = Some(run);
            }
        }
        let best = best.ok_or(ModelError::InvalidParameter {
            name: "n_init",
            reason: "no restart completed".to_string(),
        })?;

        Ok(Self {
            centroids: best
                .centroids
                .axis_iter(Axis(0))
                .map(|c| c.to_vec())
                .collect(),
            inertia: best.inertia,
            n_iter: best.n_iter,
        })
    }

    pub fn k(&self) -> usize {
        self.centroids.len()
    }

    fn centroid_matrix(&self) -> Result<Array2<f64>, ModelError> {
        let d = self.centroids.first().map_or(0, Vec::len);
        let flat: Vec<f64> = self.centroids.iter().flatten().copied().collect();
        Array2::from_shape_vec((self.centroids.len(), d), flat).map_err(|_| {
            ModelError::DimensionMismatch {
                expected: d,
                found: 0,
            }
        })
    }

    /// Nearest-centroid index for each row.
    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Vec<usize>, ModelError> {
        let centroids = self.centroid_matrix()?;
        if x.ncols() != centroids.ncols() {
            return Err(ModelError::DimensionMismatch {
                expected: centroids.ncols(),
                found: x.ncols(),
            });
        }
        Ok(x.axis_iter(Axis(0))
            .map(|row| nearest(row, &centroids).0)
            .collect())
    }
}

/// k-means++: first centroid uniform, then each next one drawn proportionally to its
/// squared distance from the nearest centroid chosen so far.
fn seed_centroids(x: ArrayView2<'_, f64>, k: usize, rng: &mut StdRng) -> Array2<f64> {
    let n = x.nrows();
    let mut centroids = Array2::zeros((k, x.ncols()));
    centroids.row_mut(0).assign(&x.row(rng.gen_range(0..n)));

    let mut d2: Vec<f64> = x
        .axis_iter(Axis(0))
        .map(|p| squared_distance(p, centroids.row(0)))
        .collect();
    for c in 1..k {
        let pick = match WeightedIndex::new(&d2) {
            Ok(dist) => dist.sample(rng),
            // Every point coincides with a centroid already
            Err(_) => rng.gen_range(0..n),
        };
        centroids.row_mut(c).assign(&x.row(pick));
        for (i, p) in x.axis_iter(Axis(0)).enumerate() {
            d2[i] = d2[i].min(squared_distance(p, centroids.row(c)));
        }
    }
    centroids
}

fn lloyd(x: ArrayView2<'_, f64>, mut centroids: Array2<f64>, max_iter: usize, tol: f64) -> Run {
    let (n, d) = x.dim();
    let k = centroids.nrows();
    let mut labels = vec![0usize; n];
    let mut n_iter = 0;

    for iter in 1..=max_iter {
        n_iter = iter;
        let mut dists = vec![0.0; n];
        for (i, p) in x.axis_iter(Axis(0)).enumerate() {
            let (label, dist) = nearest(p, &centroids);
            labels[i] = label;
            dists[i] = dist;
        }

        let mut sums = Array2::<f64>::zeros((k, d));
        let mut counts = vec![0usize; k];
        for (i, p) in x.axis_iter(Axis(0)).enumerate() {
            let mut row = sums.row_mut(labels[i]);
            row += &p;
            counts[labels[i]] += 1;
        }

        let mut updated = Array2::<f64>::zeros((k, d));
        for c in 0..k {
            if counts[c] > 0 {
                updated.row_mut(c).assign(&(&sums.row(c) / counts[c] as f64));
            } else {
                // Re-seed an empty cluster with the point farthest from its centroid
                let far = dists
                    .iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
                    .0;
                dists[far] = 0.0;
                updated.row_mut(c).assign(&x.row(far));
            }
        }

        let shift: f64 = (&updated - &centroids).iter().map(|v| v * v).sum();
        centroids = updated;
        if shift <= tol {
            break;
        }
    }

    let inertia = x
        .axis_iter(Axis(0))
        .map(|p| nearest(p, &centroids).1)
        .sum();
    Run {
        centroids,
        inertia,
        n_iter,
    }
}
