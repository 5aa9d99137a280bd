//! Batch entry points: anomaly detection, clustering, and the matching training jobs.
//! Each call is one synchronous job: fetch everything, run the numeric pipeline, return.

mod deadline;
mod inference;
mod training;

pub use deadline::run_with_timeout;
pub use inference::InferenceServices;
pub use training::{AnomalyTrainingReport, ClusteringTrainingReport, TrainingServices};

use serde::{Deserialize, Serialize};

/// A flagged attendance day with its explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyResult {
    pub record_id: String,
    pub user_id: String,
    #[serde(rename = "fullName")]
    pub full_name: String,
    pub date: String,
    pub explanation: String,
}

/// Cluster assignment for one employee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterResult {
    pub user_id: String,
    #[serde(rename = "fullName")]
    pub full_name: String,
    pub cluster: usize,
    pub cluster_label: String,
}
