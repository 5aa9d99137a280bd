//! Deterministic explanations for days flagged by the anomaly model.

mod engine;

pub use engine::{ExplanationEngine, Rule, FALLBACK, RULES, SEPARATOR};
