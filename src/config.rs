//! Runtime configuration. Loaded from a JSON file; every section falls back to defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Attendance data source
    pub data: DataConfig,
    /// Where trained artifacts live
    pub artifacts: ArtifactsConfig,
    /// Feature extraction parameters
    pub features: FeaturesConfig,
    /// Isolation forest hyperparameters
    pub anomaly: AnomalyConfig,
    /// K-means hyperparameters
    pub clustering: ClusteringConfig,
    /// Deadlines around data access and model loading
    pub timeouts: TimeoutsConfig,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// SQLite database holding `users` and `attendances`
    pub database_path: PathBuf,
    /// How long SQLite waits on a locked database (ms)
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    pub dir: PathBuf,
    /// Subdirectory name; bump when the feature schema changes
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    /// Offset applied to timestamps before taking hour/minute (default +03:30)
    pub utc_offset_minutes: i32,
    /// Only users of this employee type feed anomaly training
    pub training_employee_type: String,
    /// Only users holding this role are clustered
    pub clustering_role: String,
    /// Attendance status value counted as a late arrival
    pub late_status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    /// Expected fraction of anomalous days in the training set, in (0, 1)
    pub contamination: f64,
    pub n_trees: usize,
    /// Rows drawn per tree (capped at the training set size)
    pub max_samples: usize,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    /// Independent k-means restarts; the lowest-inertia run is kept
    pub n_init: usize,
    pub max_iter: usize,
    /// Convergence tolerance relative to the mean feature variance
    pub tol: f64,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutsConfig {
    pub data_source_secs: u64,
    pub model_load_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("attendance.db"),
            busy_timeout_ms: 5_000,
        }
    }
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("models"),
            version: crate::features::SCHEMA_VERSION.to_string(),
        }
    }
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 210,
            training_employee_type: "administrative".to_string(),
            clustering_role: "employee".to_string(),
            late_status: "late".to_string(),
        }
    }
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            contamination: 0.01,
            n_trees: 100,
            max_samples: 256,
            seed: 42,
        }
    }
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            n_init: 10,
            max_iter: 300,
            tol: 1e-4,
            seed: 42,
        }
    }
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            data_source_secs: 30,
            model_load_secs: 10,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl TimeoutsConfig {
    pub fn data_source(&self) -> Duration {
        Duration::from_secs(self.data_source_secs)
    }

    pub fn model_load(&self) -> Duration {
        Duration::from_secs(self.model_load_secs)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl AppConfig {
    /// Load from JSON file if present; otherwise return default.
    /// A file that exists but does not parse is an error rather than a silent fallback.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
