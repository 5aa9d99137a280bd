use super::deadline::run_with_timeout;
use crate::config::{AnomalyConfig, ClusteringConfig, TimeoutsConfig};
use crate::error::{ModelError, ServiceError};
use crate::features::{daily_matrix, FeatureExtractor};
use crate::model::{AnomalyModel, ClusteringPipeline, N_CLUSTERS};
use crate::source::{AttendanceEntry, AttendanceSource};
use crate::storage::ArtifactStore;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct AnomalyTrainingReport {
    pub samples: usize,
    /// Training days above the fitted threshold
    pub flagged: usize,
    pub threshold: f64,
    pub path: PathBuf,
}

impl fmt::Display for AnomalyTrainingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Anomaly detection model trained on {} days ({} flagged, threshold {:.4}) and saved to {}.",
            self.samples,
            self.flagged,
            self.threshold,
            self.path.display()
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusteringTrainingReport {
    pub employees: usize,
    pub cluster_sizes: [usize; N_CLUSTERS],
    pub inertia: f64,
    pub fit_id: Uuid,
    pub dir: PathBuf,
}

impl fmt::Display for ClusteringTrainingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Clustering model trained on {} employees (cluster sizes {:?}, inertia {:.3}) and saved to {}.",
            self.employees,
            self.cluster_sizes,
            self.inertia,
            self.dir.display()
        )
    }
}

/// Fits models from the full history and replaces the persisted artifacts.
/// Nothing is written unless fitting succeeds.
pub struct TrainingServices {
    source: Arc<dyn AttendanceSource>,
    store: ArtifactStore,
    extractor: FeatureExtractor,
    anomaly: AnomalyConfig,
    clustering: ClusteringConfig,
    timeouts: TimeoutsConfig,
}

impl TrainingServices {
    pub fn new(
        source: Arc<dyn AttendanceSource>,
        store: ArtifactStore,
        extractor: FeatureExtractor,
        anomaly: AnomalyConfig,
        clustering: ClusteringConfig,
        timeouts: TimeoutsConfig,
    ) -> Self {
        Self {
            source,
            store,
            extractor,
            anomaly,
            clustering,
            timeouts,
        }
    }

    fn fetch_all(&self) -> Result<Vec<AttendanceEntry>, ServiceError> {
        let source = Arc::clone(&self.source);
        run_with_timeout("fetch attendance history", self.timeouts.data_source(), move || {
            source.all_entries().map_err(ServiceError::from)
        })
    }

    pub fn train_anomaly_model(&self) -> Result<AnomalyTrainingReport, ServiceError> {
        info!("starting anomaly detection model training");
        let entries = self.fetch_all()?;
        let daily = self.extractor.daily_for_training(&entries);
        info!(
            rows = entries.len(),
            samples = daily.len(),
            employee_type = %self.extractor.config().training_employee_type,
            "training features extracted"
        );

        let x = daily_matrix(&daily)?;
        let model = AnomalyModel::train(x.view(), &self.anomaly).inspect_err(|e| {
            if let ModelError::InsufficientData { .. } = e {
                warn!(error = %e, "not enough records for anomaly detection; artifact left untouched");
            }
        })?;
        let flagged = model.predict(x.view())?.into_iter().filter(|f| *f).count();
        let path = self.store.save_anomaly_model(&model)?;

        Ok(AnomalyTrainingReport {
            samples: daily.len(),
            flagged,
            threshold: model.threshold(),
            path,
        })
    }

    pub fn train_clustering_model(&self) -> Result<ClusteringTrainingReport, ServiceError> {
        info!("starting clustering model training");
        let entries = self.fetch_all()?;
        let employees = self.extractor.employee_aggregates(&entries);
        info!(
            rows = entries.len(),
            employees = employees.len(),
            role = %self.extractor.config().clustering_role,
            "employee features extracted"
        );

        let pipeline = ClusteringPipeline::train(&employees, &self.clustering).inspect_err(|e| {
            if let ModelError::InsufficientData { .. } = e {
                warn!(error = %e, "not enough employees for clustering; artifacts left untouched");
            }
        })?;
        let mut cluster_sizes = [0usize; N_CLUSTERS];
        for c in pipeline.predict(&employees)? {
            cluster_sizes[c] += 1;
        }
        let fit_id = self.store.save_clustering(&pipeline)?;

        Ok(ClusteringTrainingReport {
            employees: employees.len(),
            cluster_sizes,
            inertia: pipeline.model.inertia,
            fit_id,
            dir: self.store.dir(),
        })
    }
}
