//! Log setup and the single JSON document each entry point prints.
//! Logs go to stderr; stdout is reserved for the result payload.

use serde::Serialize;
use std::io::Write;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Error document printed in place of a result list.
#[derive(Debug, Serialize)]
pub struct ErrorPayload<'a> {
    pub error: &'a str,
    pub kind: &'a str,
}

pub struct StructuredLogger;

impl StructuredLogger {
    /// Install the global subscriber; level from RUST_LOG or `default_level`.
    /// Safe to call more than once: later calls are ignored.
    pub fn init(json: bool, default_level: &str) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
        if json {
            let fmt = tracing_subscriber::fmt::layer()
                .json()
                .with_span_events(FmtSpan::NONE)
                .with_writer(std::io::stderr);
            let _ = tracing_subscriber::registry().with(filter).with(fmt).try_init();
        } else {
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .try_init();
        }
    }

    /// Write `payload` as one JSON line.
    pub fn emit_json(payload: &impl Serialize, w: &mut impl Write) -> std::io::Result<()> {
        let line = serde_json::to_string(payload)?;
        writeln!(w, "{line}")
    }
}
