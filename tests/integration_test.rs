//! Integration test: seed data, train both models, run both inference services.

use attendance_insight::{
    config::{AnomalyConfig, AppConfig, ClusteringConfig, FeaturesConfig, TimeoutsConfig},
    error::{ArtifactError, ServiceError},
    features::FeatureExtractor,
    model::CLUSTER_LABELS,
    service::{InferenceServices, TrainingServices},
    source::{
        AttendanceRecord, AttendanceSource, MemorySource, SeedConfig, SqliteSource,
        SyntheticDataset, UserProfile,
    },
    storage::{ArtifactKind, ArtifactStore},
};
use chrono::{NaiveDate, TimeZone, Utc};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn seed_config() -> SeedConfig {
    SeedConfig {
        officers: 2,
        staff: 30,
        faculty: 5,
        days: 20,
        end_date: NaiveDate::from_ymd_opt(2024, 7, 22).unwrap(),
        seed: 11,
        utc_offset_minutes: 210,
        late_status: "late".into(),
        employee_type: "administrative".into(),
        employee_role: "employee".into(),
    }
}

fn extractor() -> FeatureExtractor {
    FeatureExtractor::new(FeaturesConfig::default()).unwrap()
}

fn services(
    source: Arc<dyn AttendanceSource>,
    store: &ArtifactStore,
) -> (TrainingServices, InferenceServices) {
    let training = TrainingServices::new(
        Arc::clone(&source),
        store.clone(),
        extractor(),
        AnomalyConfig::default(),
        ClusteringConfig::default(),
        TimeoutsConfig::default(),
    );
    let inference = InferenceServices::new(source, store.clone(), extractor(), TimeoutsConfig::default());
    (training, inference)
}

fn seeded_source() -> Arc<dyn AttendanceSource> {
    let ds = SyntheticDataset::generate(&seed_config());
    Arc::new(MemorySource::new(ds.users, ds.records))
}

#[test]
fn config_load_default() {
    let c = AppConfig::load(Path::new("nonexistent.json")).unwrap();
    assert_eq!(c.anomaly.contamination, 0.01);
    assert_eq!(c.clustering.n_init, 10);
    assert_eq!(c.artifacts.version, "v1");
}

#[test]
fn train_then_infer_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path(), "v1");
    let (training, inference) = services(seeded_source(), &store);

    let anomaly = training.train_anomaly_model().unwrap();
    assert!(anomaly.samples >= 10);
    let clusters = training.train_clustering_model().unwrap();
    assert_eq!(clusters.employees, 30);
    assert_eq!(clusters.cluster_sizes.iter().sum::<usize>(), 30);
    for kind in ArtifactKind::ALL {
        assert!(store.exists(kind), "{kind:?} missing");
    }

    let flagged = inference.detect_anomalies("2024-07-22").unwrap();
    for r in &flagged {
        assert_eq!(r.date, "2024-07-22");
        assert!(!r.explanation.is_empty());
    }

    let assigned = inference.predict_clusters().unwrap();
    assert_eq!(assigned.len(), 30);
    for r in &assigned {
        assert!(r.cluster < 3);
        assert_eq!(r.cluster_label, CLUSTER_LABELS[r.cluster]);
    }
}

#[test]
fn cluster_inference_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path(), "v1");
    let (training, inference) = services(seeded_source(), &store);
    training.train_clustering_model().unwrap();

    let first = inference.predict_clusters().unwrap();
    let second = inference.predict_clusters().unwrap();
    assert_eq!(first, second);
}

#[test]
fn clustering_training_is_reproducible_across_runs() {
    let a_dir = tempfile::tempdir().unwrap();
    let b_dir = tempfile::tempdir().unwrap();
    let a_store = ArtifactStore::new(a_dir.path(), "v1");
    let b_store = ArtifactStore::new(b_dir.path(), "v1");
    let (a_train, a_infer) = services(seeded_source(), &a_store);
    let (b_train, b_infer) = services(seeded_source(), &b_store);
    a_train.train_clustering_model().unwrap();
    b_train.train_clustering_model().unwrap();

    assert_eq!(a_store.load_clustering().unwrap(), b_store.load_clustering().unwrap());
    assert_eq!(a_infer.predict_clusters().unwrap(), b_infer.predict_clusters().unwrap());
}

#[test]
fn empty_day_is_success_not_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path(), "v1");
    let (training, inference) = services(seeded_source(), &store);
    training.train_anomaly_model().unwrap();

    let result = inference.detect_anomalies("1999-01-01").unwrap();
    assert!(result.is_empty());
}

#[test]
fn empty_population_is_an_error_for_clustering() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path(), "v1");
    let (training, _) = services(seeded_source(), &store);
    training.train_clustering_model().unwrap();

    // Same artifacts, but nobody holds the clustering role any more
    let (_, inference) = services(Arc::new(MemorySource::default()), &store);
    let err = inference.predict_clusters().unwrap_err();
    assert!(matches!(err, ServiceError::EmptyResultSet));
    assert_eq!(err.kind(), "empty_result_set");
    assert!(!err.is_transport());
}

#[test]
fn missing_artifacts_give_structured_errors() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path(), "v1");
    let (_, inference) = services(seeded_source(), &store);

    let err = inference.detect_anomalies("2024-07-22").unwrap_err();
    assert_eq!(err.kind(), "artifact_not_found");
    let err = inference.predict_clusters().unwrap_err();
    assert_eq!(err.kind(), "artifact_not_found");
}

#[test]
fn missing_scaler_alone_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path(), "v1");
    let (training, inference) = services(seeded_source(), &store);
    training.train_clustering_model().unwrap();
    std::fs::remove_file(store.path(ArtifactKind::ClusterScaler)).unwrap();

    let err = inference.predict_clusters().unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Artifact(ArtifactError::NotFound { .. })
    ));
}

#[test]
fn insufficient_data_keeps_previous_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path(), "v1");
    let (training, _) = services(seeded_source(), &store);
    training.train_anomaly_model().unwrap();
    let before = std::fs::read(store.path(ArtifactKind::AnomalyModel)).unwrap();

    let user = UserProfile {
        user_id: "u1".into(),
        full_name: "Only One".into(),
        employee_type: "administrative".into(),
        roles: vec!["employee".into()],
    };
    let check_in = Utc.with_ymd_and_hms(2024, 7, 22, 4, 30, 0).unwrap();
    let records: Vec<AttendanceRecord> = (0..5)
        .map(|i| AttendanceRecord {
            record_id: format!("r{i}"),
            user_id: "u1".into(),
            date: format!("2024-07-{:02}", 10 + i),
            check_in: Some(check_in),
            check_out: Some(check_in + chrono::Duration::hours(8)),
            status: "present".into(),
        })
        .collect();
    let (sparse_training, _) = services(Arc::new(MemorySource::new(vec![user], records)), &store);

    let err = sparse_training.train_anomaly_model().unwrap_err();
    assert_eq!(err.kind(), "insufficient_data");
    let err = sparse_training.train_clustering_model().unwrap_err();
    assert_eq!(err.kind(), "insufficient_data");
    assert_eq!(std::fs::read(store.path(ArtifactKind::AnomalyModel)).unwrap(), before);
    assert!(!store.exists(ArtifactKind::ClusterModel));
}

#[test]
fn malformed_day_is_rejected_before_scoring() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path(), "v1");
    let (training, _) = services(seeded_source(), &store);
    training.train_anomaly_model().unwrap();

    let user = UserProfile {
        user_id: "u1".into(),
        full_name: "Backwards Clock".into(),
        employee_type: "administrative".into(),
        roles: vec!["employee".into()],
    };
    let check_in = Utc.with_ymd_and_hms(2024, 7, 22, 4, 30, 0).unwrap();
    let record = AttendanceRecord {
        record_id: "r1".into(),
        user_id: "u1".into(),
        date: "2024-07-22".into(),
        check_in: Some(check_in),
        check_out: Some(check_in - chrono::Duration::hours(1)),
        status: "present".into(),
    };
    let (_, inference) = services(Arc::new(MemorySource::new(vec![user], vec![record])), &store);
    let err = inference.detect_anomalies("2024-07-22").unwrap_err();
    assert_eq!(err.kind(), "malformed_feature");
}

#[test]
fn schema_mismatch_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path(), "v1");
    let (training, inference) = services(seeded_source(), &store);
    training.train_anomaly_model().unwrap();

    let path = store.path(ArtifactKind::AnomalyModel);
    let text = std::fs::read_to_string(&path).unwrap();
    let stale = text.replacen("\"schema\":\"v1:", "\"schema\":\"v0:", 1);
    assert_ne!(text, stale);
    std::fs::write(&path, stale).unwrap();

    let err = inference.detect_anomalies("2024-07-22").unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Artifact(ArtifactError::SchemaMismatch { .. })
    ));
}

#[test]
fn sqlite_source_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let db = SqliteSource::new(dir.path().join("attendance.db"), Duration::from_secs(1));
    let ds = SyntheticDataset::generate(&seed_config());
    db.write_dataset(&ds.users, &ds.records).unwrap();

    let store = ArtifactStore::new(dir.path().join("models"), "v1");
    let (training, inference) = services(Arc::new(db), &store);
    training.train_anomaly_model().unwrap();
    training.train_clustering_model().unwrap();
    assert!(inference.detect_anomalies("2024-07-20").is_ok());
    assert_eq!(inference.predict_clusters().unwrap().len(), 30);
}

#[test]
fn unreachable_database_is_a_transport_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path().join("models"), "v1");
    let (training, _) = services(seeded_source(), &store);
    training.train_clustering_model().unwrap();

    let db = SqliteSource::new(dir.path().join("missing.db"), Duration::from_secs(1));
    let (_, inference) = services(Arc::new(db), &store);
    let err = inference.predict_clusters().unwrap_err();
    assert_eq!(err.kind(), "connectivity");
    assert!(err.is_transport());
}
