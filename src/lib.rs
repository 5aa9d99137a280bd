//! Attendance insight: anomalous-day detection and employee behavior clustering.
//!
//! Modular structure:
//! - [`source`]: Attendance data providers (SQLite, in-memory) and a synthetic seeder
//! - [`features`]: Daily and per-employee feature extraction
//! - [`model`]: Isolation forest and imputation/scaling/k-means clustering
//! - [`explain`]: Rule-based explanations for flagged days
//! - [`storage`]: Versioned, checksummed artifact files
//! - [`service`]: Batch training and inference entry points
//! - [`logging`]: Structured logging and JSON payload output

pub mod config;
pub mod error;
pub mod explain;
pub mod features;
pub mod logging;
pub mod model;
pub mod service;
pub mod source;
pub mod storage;

pub use config::AppConfig;
pub use error::{ArtifactError, ModelError, ServiceError, SourceError};
pub use explain::ExplanationEngine;
pub use features::{DailyFeatureVector, EmployeeAggregateFeatureVector, FeatureExtractor};
pub use logging::StructuredLogger;
pub use model::{AnomalyModel, ClusteringPipeline};
pub use service::{AnomalyResult, ClusterResult, InferenceServices, TrainingServices};
pub use source::{AttendanceSource, MemorySource, SqliteSource};
pub use storage::ArtifactStore;
