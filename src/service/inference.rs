use super::deadline::run_with_timeout;
use super::{AnomalyResult, ClusterResult};
use crate::config::TimeoutsConfig;
use crate::error::{ServiceError, SourceError};
use crate::explain::ExplanationEngine;
use crate::features::{daily_matrix, FeatureExtractor};
use crate::model::{cluster_label, AnomalyModel, ClusteringPipeline};
use crate::source::{AttendanceEntry, AttendanceSource};
use crate::storage::ArtifactStore;
use std::sync::Arc;
use tracing::info;

/// Read-only inference over the latest persisted artifacts.
pub struct InferenceServices {
    source: Arc<dyn AttendanceSource>,
    store: ArtifactStore,
    extractor: FeatureExtractor,
    explainer: ExplanationEngine,
    timeouts: TimeoutsConfig,
}

impl InferenceServices {
    pub fn new(
        source: Arc<dyn AttendanceSource>,
        store: ArtifactStore,
        extractor: FeatureExtractor,
        timeouts: TimeoutsConfig,
    ) -> Self {
        Self {
            source,
            store,
            extractor,
            explainer: ExplanationEngine::default(),
            timeouts,
        }
    }

    fn fetch<F>(&self, operation: &'static str, query: F) -> Result<Vec<AttendanceEntry>, ServiceError>
    where
        F: FnOnce(&dyn AttendanceSource) -> Result<Vec<AttendanceEntry>, SourceError> + Send + 'static,
    {
        let source = Arc::clone(&self.source);
        run_with_timeout(operation, self.timeouts.data_source(), move || {
            query(source.as_ref()).map_err(ServiceError::from)
        })
    }

    fn load_anomaly_model(&self) -> Result<AnomalyModel, ServiceError> {
        let store = self.store.clone();
        run_with_timeout("load anomaly model", self.timeouts.model_load(), move || {
            store.load_anomaly_model().map_err(ServiceError::from)
        })
    }

    fn load_clustering(&self) -> Result<ClusteringPipeline, ServiceError> {
        let store = self.store.clone();
        run_with_timeout("load clustering model", self.timeouts.model_load(), move || {
            store.load_clustering().map_err(ServiceError::from)
        })
    }

    /// Flag unusual days among the complete records of `date` and explain each flag.
    /// A day without complete records yields an empty list, not an error.
    pub fn detect_anomalies(&self, date: &str) -> Result<Vec<AnomalyResult>, ServiceError> {
        let model = self.load_anomaly_model()?;

        let key = date.to_string();
        let entries = self.fetch("fetch daily attendance", move |s| s.entries_for_date(&key))?;
        let daily = self.extractor.daily(&entries);
        info!(date, rows = entries.len(), complete = daily.len(), "daily features extracted");
        if daily.is_empty() {
            return Ok(Vec::new());
        }

        let x = daily_matrix(&daily)?;
        let flags = model.predict(x.view())?;
        let results: Vec<AnomalyResult> = daily
            .iter()
            .zip(flags)
            .filter(|(_, flagged)| *flagged)
            .map(|(v, _)| AnomalyResult {
                record_id: v.record_id.clone(),
                user_id: v.user_id.clone(),
                full_name: v.full_name.clone(),
                date: v.date.clone(),
                explanation: self.explainer.explain(v),
            })
            .collect();
        info!(date, anomalies = results.len(), "anomaly detection complete");
        Ok(results)
    }

    /// Assign every qualifying employee to a cluster.
    /// Unlike anomaly detection, an empty population is an error.
    pub fn predict_clusters(&self) -> Result<Vec<ClusterResult>, ServiceError> {
        let pipeline = self.load_clustering()?;

        let entries = self.fetch("fetch attendance history", |s| s.all_entries())?;
        let employees = self.extractor.employee_aggregates(&entries);
        info!(rows = entries.len(), employees = employees.len(), "employee features extracted");
        if employees.is_empty() {
            return Err(ServiceError::EmptyResultSet);
        }

        let clusters = pipeline.predict(&employees)?;
        Ok(employees
            .into_iter()
            .zip(clusters)
            .map(|(e, cluster)| ClusterResult {
                user_id: e.user_id,
                full_name: e.full_name,
                cluster,
                cluster_label: cluster_label(cluster).to_string(),
            })
            .collect())
    }
}
