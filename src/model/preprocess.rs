//! Training-set statistics applied ahead of clustering: mean imputation, then standardization.
//! Both are fitted once and persisted; inference reuses them verbatim.

use crate::error::ModelError;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Replaces missing values with the per-feature training mean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeanImputer {
    pub means: Vec<f64>,
}

impl MeanImputer {
    /// Fails if some feature has no observed value at all.
    pub fn fit<const D: usize>(
        rows: &[[Option<f64>; D]],
        names: &[&'static str],
    ) -> Result<Self, ModelError> {
        let means = (0..D)
            .map(|f| {
                let observed: Vec<f64> = rows.iter().filter_map(|r| r[f]).collect();
                if observed.is_empty() {
                    return Err(ModelError::MalformedFeature {
                        id: "training set".to_string(),
                        field: names.get(f).copied().unwrap_or("unknown"),
                        value: "no observed values".to_string(),
                    });
                }
                Ok(observed.iter().sum::<f64>() / observed.len() as f64)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { means })
    }

    pub fn transform<const D: usize>(
        &self,
        rows: &[[Option<f64>; D]],
    ) -> Result<Array2<f64>, ModelError> {
        if self.means.len() != D {
            return Err(ModelError::DimensionMismatch {
                expected: self.means.len(),
                found: D,
            });
        }
        Ok(Array2::from_shape_fn((rows.len(), D), |(i, f)| {
            rows[i][f].unwrap_or(self.means[f])
        }))
    }
}

/// Zero-mean, unit-variance scaling with population statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    /// Population standard deviation; 1.0 for constant features
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(x: ArrayView2<'_, f64>) -> Result<Self, ModelError> {
        let mean: Array1<f64> = x.mean_axis(Axis(0)).ok_or(ModelError::InsufficientData {
            required: 1,
            found: 0,
        })?;
        let std = x.std_axis(Axis(0), 0.0);
        let scale = std
            .iter()
            .map(|&s| if s > f64::EPSILON { s } else { 1.0 })
            .collect();
        Ok(Self {
            mean: mean.to_vec(),
            scale,
        })
    }

    pub fn transform(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>, ModelError> {
        if x.ncols() != self.mean.len() {
            return Err(ModelError::DimensionMismatch {
                expected: self.mean.len(),
                found: x.ncols(),
            });
        }
        let mut out = x.to_owned();
        for (f, mut col) in out.axis_iter_mut(Axis(1)).enumerate() {
            col.mapv_inplace(|v| (v - self.mean[f]) / self.scale[f]);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    const NAMES: [&str; 2] = ["a", "b"];

    #[test]
    fn imputes_training_mean() {
        let rows = [[Some(1.0), None], [Some(3.0), Some(4.0)], [None, Some(8.0)]];
        let imp = MeanImputer::fit(&rows, &NAMES).unwrap();
        assert_eq!(imp.means, vec![2.0, 6.0]);
        let x = imp.transform(&rows).unwrap();
        assert_eq!(x, array![[1.0, 6.0], [3.0, 4.0], [2.0, 8.0]]);
    }

    #[test]
    fn imputer_keeps_training_statistics() {
        let imp = MeanImputer::fit(&[[Some(1.0), Some(1.0)], [Some(3.0), Some(3.0)]], &NAMES)
            .unwrap();
        // New data with a very different mean still gets the training value
        let x = imp.transform(&[[None, Some(100.0)], [Some(50.0), None]]).unwrap();
        assert_eq!(x, array![[2.0, 100.0], [50.0, 2.0]]);
    }

    #[test]
    fn all_missing_feature_fails() {
        let rows = [[Some(1.0), None], [Some(2.0), None]];
        assert!(MeanImputer::fit(&rows, &NAMES).is_err());
    }

    #[test]
    fn scaler_standardizes_and_handles_constant_columns() {
        let x = array![[1.0, 5.0], [3.0, 5.0], [5.0, 5.0]];
        let scaler = StandardScaler::fit(x.view()).unwrap();
        assert_relative_eq!(scaler.mean[0], 3.0);
        assert_relative_eq!(scaler.scale[0], (8.0f64 / 3.0).sqrt());
        assert_eq!(scaler.scale[1], 1.0);

        let z = scaler.transform(x.view()).unwrap();
        let col_mean = z.column(0).mean().unwrap();
        assert_relative_eq!(col_mean, 0.0, epsilon = 1e-12);
        assert_relative_eq!(z.column(0).std(0.0), 1.0, epsilon = 1e-12);
        assert!(z.column(1).iter().all(|v| *v == 0.0));
    }
}
