//! Employee clustering: mean imputation → standardization → k-means (k = 3).

use super::kmeans::KMeans;
use super::preprocess::{MeanImputer, StandardScaler};
use crate::config::ClusteringConfig;
use crate::error::ModelError;
use crate::features::{employee_rows, EmployeeAggregateFeatureVector, EMPLOYEE_SCHEMA};

pub const N_CLUSTERS: usize = 3;

/// Positional labels: cluster index `i` is reported as `CLUSTER_LABELS[i]`.
/// K-means does not guarantee index order across retrains, so the meaning of an index can
/// drift; labels are kept positional for compatibility with existing consumers.
pub const CLUSTER_LABELS: [&str; N_CLUSTERS] = [
    "disciplined/punctual",
    "flexible/hardworking",
    "at-risk (frequent lateness)",
];

pub fn cluster_label(cluster: usize) -> &'static str {
    CLUSTER_LABELS.get(cluster).copied().unwrap_or("unknown")
}

/// The three fitted stages. Each stage is persisted as its own artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusteringPipeline {
    pub imputer: MeanImputer,
    pub scaler: StandardScaler,
    pub model: KMeans,
}

impl ClusteringPipeline {
    pub fn train(
        features: &[EmployeeAggregateFeatureVector],
        params: &ClusteringConfig,
    ) -> Result<Self, ModelError> {
        if features.len() < N_CLUSTERS {
            return Err(ModelError::InsufficientData {
                required: N_CLUSTERS,
                found: features.len(),
            });
        }
        let rows = employee_rows(features)?;
        let missing = rows.iter().flatten().filter(|v| v.is_none()).count();
        tracing::info!(rows = rows.len(), missing, "fitting imputer");

        let imputer = MeanImputer::fit(&rows, EMPLOYEE_SCHEMA.names)?;
        let filled = imputer.transform(&rows)?;
        let scaler = StandardScaler::fit(filled.view())?;
        let scaled = scaler.transform(filled.view())?;
        let model = KMeans::fit(scaled.view(), N_CLUSTERS, params)?;
        tracing::info!(inertia = model.inertia, n_iter = model.n_iter, "k-means fitted");

        Ok(Self {
            imputer,
            scaler,
            model,
        })
    }

    /// Cluster index per employee, using the persisted imputer and scaler unchanged.
    pub fn predict(&self, features: &[EmployeeAggregateFeatureVector]) -> Result<Vec<usize>, ModelError> {
        let rows = employee_rows(features)?;
        let filled = self.imputer.transform(&rows)?;
        let scaled = self.scaler.transform(filled.view())?;
        self.model.predict(scaled.view())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn employee(id: &str, hour: Option<f64>, duration: Option<f64>, lates: u32) -> EmployeeAggregateFeatureVector {
        EmployeeAggregateFeatureVector {
            user_id: id.into(),
            full_name: format!("Employee {id}"),
            avg_checkin_hour: hour,
            avg_work_duration: duration,
            total_lates: lates,
        }
    }

    fn population() -> Vec<EmployeeAggregateFeatureVector> {
        vec![
            employee("a1", Some(7.2), Some(8.0), 0),
            employee("a2", Some(7.4), Some(8.1), 1),
            employee("a3", Some(7.3), None, 0),
            employee("b1", Some(9.5), Some(10.5), 2),
            employee("b2", Some(9.7), Some(10.2), 3),
            employee("b3", Some(9.6), Some(10.8), 2),
            employee("c1", Some(8.9), Some(5.0), 25),
            employee("c2", None, Some(5.5), 28),
            employee("c3", Some(9.0), Some(4.8), 30),
        ]
    }

    #[test]
    fn groups_similar_employees() {
        let pop = population();
        let pipeline = ClusteringPipeline::train(&pop, &ClusteringConfig::default()).unwrap();
        let labels = pipeline.predict(&pop).unwrap();
        assert!(labels.iter().all(|c| *c < N_CLUSTERS));
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[0], labels[2]);
        assert_eq!(labels[3], labels[5]);
        assert_eq!(labels[6], labels[7]);
        assert_eq!(labels[6], labels[8]);
        assert_ne!(labels[0], labels[3]);
        assert_ne!(labels[0], labels[6]);
        assert_ne!(labels[3], labels[6]);
    }

    #[test]
    fn training_is_reproducible() {
        let pop = population();
        let a = ClusteringPipeline::train(&pop, &ClusteringConfig::default()).unwrap();
        let b = ClusteringPipeline::train(&pop, &ClusteringConfig::default()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.predict(&pop).unwrap(), b.predict(&pop).unwrap());
    }

    #[test]
    fn needs_three_employees() {
        let pop = &population()[..2];
        assert!(matches!(
            ClusteringPipeline::train(pop, &ClusteringConfig::default()),
            Err(ModelError::InsufficientData { required: 3, found: 2 })
        ));
    }

    #[test]
    fn labels_are_positional() {
        assert_eq!(cluster_label(0), "disciplined/punctual");
        assert_eq!(cluster_label(1), "flexible/hardworking");
        assert_eq!(cluster_label(2), "at-risk (frequent lateness)");
    }
}
