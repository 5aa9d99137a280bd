//! attendance-insight entrypoint. Every inference command prints exactly one JSON document on
//! stdout: a result list or `{"error", "kind"}`. Logical failures exit 0; data-source,
//! timeout and I/O failures exit 2 so callers can tell them from an empty result.

use attendance_insight::{
    config::AppConfig,
    error::ServiceError,
    features::FeatureExtractor,
    logging::{ErrorPayload, StructuredLogger},
    service::{InferenceServices, TrainingServices},
    source::{AttendanceSource, SeedConfig, SqliteSource, SyntheticDataset},
    storage::ArtifactStore,
};
use chrono::{FixedOffset, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

const EXIT_CONFIG: u8 = 1;
const EXIT_TRANSPORT: u8 = 2;

#[derive(Parser)]
#[command(name = "attendance-insight")]
#[command(about = "Attendance anomaly detection and employee clustering", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON config file (default: $ATTENDANCE_INSIGHT_CONFIG, then config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Flag anomalous attendance days for one date key
    DetectAnomalies {
        /// Date key, matched verbatim against stored records
        date: Option<String>,
    },

    /// Assign every employee to a behavior cluster
    PredictClusters,

    /// Train the anomaly model from the full attendance history
    TrainAnomaly,

    /// Train the clustering imputer, scaler and model
    TrainClusters,

    /// Write a synthetic dataset into the attendance database
    Seed {
        #[arg(long, default_value_t = 10)]
        officers: usize,

        #[arg(long, default_value_t = 250)]
        staff: usize,

        #[arg(long, default_value_t = 50)]
        faculty: usize,

        #[arg(long, default_value_t = 90)]
        days: u32,

        /// Last generated day (default: today at the configured offset)
        #[arg(long)]
        end_date: Option<NaiveDate>,

        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

fn emit(payload: &impl Serialize, code: ExitCode) -> ExitCode {
    match StructuredLogger::emit_json(payload, &mut std::io::stdout().lock()) {
        Ok(()) => code,
        Err(e) => {
            error!(error = %e, "cannot write payload");
            ExitCode::from(EXIT_TRANSPORT)
        }
    }
}

fn emit_error(err: &ServiceError) -> ExitCode {
    error!(kind = err.kind(), error = %err, "request failed");
    let message = err.to_string();
    let code = if err.is_transport() {
        ExitCode::from(EXIT_TRANSPORT)
    } else {
        ExitCode::SUCCESS
    };
    emit(
        &ErrorPayload {
            error: &message,
            kind: err.kind(),
        },
        code,
    )
}

fn respond<T: Serialize>(result: Result<T, ServiceError>) -> ExitCode {
    match result {
        Ok(value) => emit(&value, ExitCode::SUCCESS),
        Err(e) => emit_error(&e),
    }
}

fn report_training<T: std::fmt::Display>(result: Result<T, ServiceError>) -> ExitCode {
    match result {
        Ok(report) => {
            println!("{report}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(kind = e.kind(), error = %e, "training aborted");
            println!("Training aborted: {e}");
            if e.is_transport() {
                ExitCode::from(EXIT_TRANSPORT)
            } else {
                ExitCode::from(EXIT_CONFIG)
            }
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .or_else(|| std::env::var("ATTENDANCE_INSIGHT_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("config.json"));
    let config = match AppConfig::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            let message = e.to_string();
            emit(
                &ErrorPayload {
                    error: &message,
                    kind: "config",
                },
                ExitCode::from(EXIT_CONFIG),
            );
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    StructuredLogger::init(config.log.json, &config.log.level);
    info!(config = %config_path.display(), artifacts = ?config.artifacts.dir, "attendance-insight starting");

    let extractor = match FeatureExtractor::new(config.features.clone()) {
        Ok(x) => x,
        Err(e) => return emit_error(&ServiceError::from(e)),
    };
    let sqlite = SqliteSource::new(
        &config.data.database_path,
        Duration::from_millis(config.data.busy_timeout_ms),
    );
    let store = ArtifactStore::new(&config.artifacts.dir, &config.artifacts.version);

    if let Commands::Seed {
        officers,
        staff,
        faculty,
        days,
        end_date,
        seed,
    } = cli.command
    {
        let end_date = end_date.unwrap_or_else(|| {
            FixedOffset::east_opt(config.features.utc_offset_minutes * 60)
                .map(|tz| Utc::now().with_timezone(&tz).date_naive())
                .unwrap_or_else(|| Utc::now().date_naive())
        });
        let dataset = SyntheticDataset::generate(&SeedConfig {
            officers,
            staff,
            faculty,
            days,
            end_date,
            seed,
            utc_offset_minutes: config.features.utc_offset_minutes,
            late_status: config.features.late_status.clone(),
            employee_type: config.features.training_employee_type.clone(),
            employee_role: config.features.clustering_role.clone(),
        });
        return match sqlite.write_dataset(&dataset.users, &dataset.records) {
            Ok(()) => {
                println!(
                    "{} users and {} attendance records written to {}.",
                    dataset.users.len(),
                    dataset.records.len(),
                    sqlite.path().display()
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!(error = %e, "seeding failed");
                ExitCode::from(EXIT_TRANSPORT)
            }
        };
    }

    let source: Arc<dyn AttendanceSource> = Arc::new(sqlite);
    match cli.command {
        Commands::DetectAnomalies { date } => {
            let services = InferenceServices::new(source, store, extractor, config.timeouts);
            match date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
                Some(date) => respond(services.detect_anomalies(date)),
                None => emit_error(&ServiceError::MissingArgument("date")),
            }
        }
        Commands::PredictClusters => {
            let services = InferenceServices::new(source, store, extractor, config.timeouts);
            respond(services.predict_clusters())
        }
        Commands::TrainAnomaly => {
            let services = TrainingServices::new(
                source,
                store,
                extractor,
                config.anomaly,
                config.clustering,
                config.timeouts,
            );
            report_training(services.train_anomaly_model())
        }
        Commands::TrainClusters => {
            let services = TrainingServices::new(
                source,
                store,
                extractor,
                config.anomaly,
                config.clustering,
                config.timeouts,
            );
            report_training(services.train_clustering_model())
        }
        Commands::Seed { .. } => ExitCode::SUCCESS,
    }
}
