//! Versioned, checksummed artifact files under `<base_dir>/<version>/`.
//!
//! Every file is a JSON envelope carrying the artifact kind, the feature schema it was fitted
//! on, a fit id shared by artifacts trained together, and the SHA-256 of the raw payload.
//! Files are written to a temporary sibling, synced, then renamed over the target, so a
//! reader sees either the previous artifact or the new one.

use crate::error::ArtifactError;
use crate::features::{FeatureSchema, DAILY_SCHEMA, EMPLOYEE_SCHEMA};
use crate::model::{AnomalyModel, ClusteringPipeline, KMeans, MeanImputer, StandardScaler};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    AnomalyModel,
    ClusterModel,
    ClusterScaler,
    ClusterImputer,
}

impl ArtifactKind {
    pub const ALL: [Self; 4] = [
        Self::AnomalyModel,
        Self::ClusterModel,
        Self::ClusterScaler,
        Self::ClusterImputer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AnomalyModel => "anomaly_model",
            Self::ClusterModel => "cluster_model",
            Self::ClusterScaler => "cluster_scaler",
            Self::ClusterImputer => "cluster_imputer",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            Self::AnomalyModel => "attendance_anomaly_model.json",
            Self::ClusterModel => "employee_clustering_model.json",
            Self::ClusterScaler => "employee_clustering_scaler.json",
            Self::ClusterImputer => "employee_clustering_imputer.json",
        }
    }

    pub fn schema(&self) -> FeatureSchema {
        match self {
            Self::AnomalyModel => DAILY_SCHEMA,
            _ => EMPLOYEE_SCHEMA,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    kind: String,
    schema: String,
    fit_id: Uuid,
    created_at: DateTime<Utc>,
    sha256: String,
    payload: Box<RawValue>,
}

/// A loaded artifact with its provenance.
#[derive(Debug, Clone)]
pub struct Stored<T> {
    pub value: T,
    pub fit_id: Uuid,
    pub created_at: DateTime<Utc>,
}

fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn io_error(path: &Path, source: std::io::Error) -> ArtifactError {
    if source.kind() == std::io::ErrorKind::NotFound {
        ArtifactError::NotFound {
            path: path.to_path_buf(),
        }
    } else {
        ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    base_dir: PathBuf,
    version: String,
}

impl ArtifactStore {
    pub fn new(base_dir: impl Into<PathBuf>, version: impl Into<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
            version: version.into(),
        }
    }

    pub fn dir(&self) -> PathBuf {
        self.base_dir.join(&self.version)
    }

    pub fn path(&self, kind: ArtifactKind) -> PathBuf {
        self.dir().join(kind.file_name())
    }

    pub fn exists(&self, kind: ArtifactKind) -> bool {
        self.path(kind).is_file()
    }

    /// Serialize `value` and atomically replace the artifact of `kind`.
    pub fn save<T: Serialize>(
        &self,
        kind: ArtifactKind,
        value: &T,
        fit_id: Uuid,
    ) -> Result<PathBuf, ArtifactError> {
        let payload = RawValue::from_string(serde_json::to_string(value)?)?;
        let envelope = Envelope {
            kind: kind.as_str().to_string(),
            schema: kind.schema().fingerprint(),
            fit_id,
            created_at: Utc::now(),
            sha256: sha256_hex(payload.get().as_bytes()),
            payload,
        };
        let bytes = serde_json::to_vec(&envelope)?;

        let dir = self.dir();
        fs::create_dir_all(&dir).map_err(|e| io_error(&dir, e))?;
        let target = self.path(kind);
        let tmp = dir.join(format!(".{}.{}.tmp", kind.file_name(), Uuid::new_v4()));

        let written = (|| -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
            fs::rename(&tmp, &target)
        })();
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(io_error(&target, e));
        }

        tracing::info!(kind = kind.as_str(), path = %target.display(), %fit_id, "artifact written");
        Ok(target)
    }

    /// Read, verify and deserialize the artifact of `kind`.
    pub fn load<T: DeserializeOwned>(&self, kind: ArtifactKind) -> Result<Stored<T>, ArtifactError> {
        let path = self.path(kind);
        let bytes = fs::read(&path).map_err(|e| io_error(&path, e))?;
        let envelope: Envelope = serde_json::from_slice(&bytes)?;

        if envelope.kind != kind.as_str() {
            return Err(ArtifactError::WrongKind {
                path,
                expected: kind.as_str(),
                found: envelope.kind,
            });
        }
        let expected = kind.schema().fingerprint();
        if envelope.schema != expected {
            return Err(ArtifactError::SchemaMismatch {
                path,
                expected,
                found: envelope.schema,
            });
        }
        if sha256_hex(envelope.payload.get().as_bytes()) != envelope.sha256 {
            return Err(ArtifactError::Checksum { path });
        }

        Ok(Stored {
            value: serde_json::from_str(envelope.payload.get())?,
            fit_id: envelope.fit_id,
            created_at: envelope.created_at,
        })
    }

    pub fn save_anomaly_model(&self, model: &AnomalyModel) -> Result<PathBuf, ArtifactError> {
        self.save(ArtifactKind::AnomalyModel, model, Uuid::new_v4())
    }

    pub fn load_anomaly_model(&self) -> Result<AnomalyModel, ArtifactError> {
        self.load(ArtifactKind::AnomalyModel).map(|s| s.value)
    }

    /// Persist the three clustering stages under one fit id. Returns that id.
    pub fn save_clustering(&self, pipeline: &ClusteringPipeline) -> Result<Uuid, ArtifactError> {
        let fit_id = Uuid::new_v4();
        self.save(ArtifactKind::ClusterImputer, &pipeline.imputer, fit_id)?;
        self.save(ArtifactKind::ClusterScaler, &pipeline.scaler, fit_id)?;
        self.save(ArtifactKind::ClusterModel, &pipeline.model, fit_id)?;
        Ok(fit_id)
    }

    /// Load model, scaler and imputer; they must come from the same training run.
    pub fn load_clustering(&self) -> Result<ClusteringPipeline, ArtifactError> {
        let model: Stored<KMeans> = self.load(ArtifactKind::ClusterModel)?;
        let scaler: Stored<StandardScaler> = self.load(ArtifactKind::ClusterScaler)?;
        let imputer: Stored<MeanImputer> = self.load(ArtifactKind::ClusterImputer)?;
        if model.fit_id != scaler.fit_id || model.fit_id != imputer.fit_id {
            return Err(ArtifactError::InconsistentSet);
        }
        Ok(ClusteringPipeline {
            imputer: imputer.value,
            scaler: scaler.value,
            model: model.value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClusteringConfig;
    use crate::features::EmployeeAggregateFeatureVector;

    fn pipeline() -> ClusteringPipeline {
        let pop: Vec<EmployeeAggregateFeatureVector> = (0..6)
            .map(|i| EmployeeAggregateFeatureVector {
                user_id: format!("u{i}"),
                full_name: format!("Employee {i}"),
                avg_checkin_hour: Some(7.0 + i as f64 * 0.4),
                avg_work_duration: Some(8.0 - i as f64 * 0.3),
                total_lates: i * 3,
            })
            .collect();
        ClusteringPipeline::train(&pop, &ClusteringConfig::default()).unwrap()
    }

    #[test]
    fn clustering_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), "v1");
        let p = pipeline();
        store.save_clustering(&p).unwrap();
        assert_eq!(store.load_clustering().unwrap(), p);
        for kind in [
            ArtifactKind::ClusterModel,
            ArtifactKind::ClusterScaler,
            ArtifactKind::ClusterImputer,
        ] {
            assert!(store.exists(kind));
        }
        assert!(!store.exists(ArtifactKind::AnomalyModel));
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), "v1");
        assert!(matches!(
            store.load_anomaly_model(),
            Err(ArtifactError::NotFound { .. })
        ));
    }

    #[test]
    fn tampered_payload_fails_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), "v1");
        store.save_clustering(&pipeline()).unwrap();
        let path = store.path(ArtifactKind::ClusterImputer);
        let text = fs::read_to_string(&path).unwrap();
        let tampered = text.replacen("\"means\":[", "\"means\":[1.5,", 1);
        assert_ne!(text, tampered);
        fs::write(&path, tampered).unwrap();
        assert!(matches!(
            store.load_clustering(),
            Err(ArtifactError::Checksum { .. })
        ));
    }

    #[test]
    fn mixed_training_runs_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), "v1");
        let p = pipeline();
        store.save_clustering(&p).unwrap();
        store
            .save(ArtifactKind::ClusterScaler, &p.scaler, Uuid::new_v4())
            .unwrap();
        assert!(matches!(
            store.load_clustering(),
            Err(ArtifactError::InconsistentSet)
        ));
    }

    #[test]
    fn kind_is_checked() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), "v1");
        let p = pipeline();
        store.save_clustering(&p).unwrap();
        fs::copy(
            store.path(ArtifactKind::ClusterScaler),
            store.path(ArtifactKind::AnomalyModel),
        )
        .unwrap();
        assert!(matches!(
            store.load_anomaly_model(),
            Err(ArtifactError::WrongKind { .. })
        ));
    }

    #[test]
    fn versions_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        ArtifactStore::new(dir.path(), "v1")
            .save_clustering(&pipeline())
            .unwrap();
        let other = ArtifactStore::new(dir.path(), "v2");
        assert!(matches!(
            other.load_clustering(),
            Err(ArtifactError::NotFound { .. })
        ));
    }

    #[test]
    fn no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), "v1");
        store.save_clustering(&pipeline()).unwrap();
        store.save_clustering(&pipeline()).unwrap();
        let names: Vec<String> = fs::read_dir(store.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 3);
        assert!(names.iter().all(|n| !n.ends_with(".tmp")));
    }
}
