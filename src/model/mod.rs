//! Unsupervised models: isolation forest for anomalous days, k-means for employee groups.

mod clustering;
mod isolation;
mod kmeans;
mod preprocess;

pub use clustering::{cluster_label, ClusteringPipeline, CLUSTER_LABELS, N_CLUSTERS};
pub use isolation::{AnomalyModel, MIN_TRAINING_SAMPLES};
pub use kmeans::KMeans;
pub use preprocess::{MeanImputer, StandardScaler};
