//! Rule table turning the raw features of a flagged day into a readable reason.

use crate::features::DailyFeatureVector;

pub const SEPARATOR: &str = "; ";
pub const FALLBACK: &str = "unusual combination of check-in time and work duration";

/// One explanation rule: a predicate over the raw features and the text it contributes.
#[derive(Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub applies: fn(&DailyFeatureVector) -> bool,
    pub describe: fn(&DailyFeatureVector) -> String,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule").field("name", &self.name).finish()
    }
}

fn hour(v: &DailyFeatureVector) -> f64 {
    f64::from(v.checkin_hour)
}

/// Evaluated in order; every matching rule contributes.
pub const RULES: &[Rule] = &[
    Rule {
        name: "very_late_checkin",
        applies: |v| v.checkin_hour >= 12,
        describe: |v| format!("very late check-in (hour {})", v.checkin_hour),
    },
    Rule {
        name: "very_short_duration",
        applies: |v| v.work_duration_hours < 2.0,
        describe: |v| format!("very short work duration (~{:.1}h)", v.work_duration_hours),
    },
    Rule {
        name: "very_long_duration",
        applies: |v| v.work_duration_hours > 10.0,
        describe: |v| format!("very long work duration (~{:.1}h)", v.work_duration_hours),
    },
    Rule {
        name: "long_presence_short_work",
        applies: |v| {
            let d = v.work_duration_hours;
            hour(v) < 9.0 && hour(v) + d > 16.0 && d > 2.0 && d < 6.0
        },
        describe: |v| {
            format!(
                "long presence but short effective work (~{:.1}h)",
                v.work_duration_hours
            )
        },
    },
    Rule {
        name: "late_start_early_end",
        applies: |v| (10..12).contains(&v.checkin_hour) && v.work_duration_hours < 4.0,
        describe: |_| "late start and early end".to_string(),
    },
];

/// Stateless evaluator over a rule table.
#[derive(Debug, Clone, Copy)]
pub struct ExplanationEngine {
    rules: &'static [Rule],
}

impl Default for ExplanationEngine {
    fn default() -> Self {
        Self { rules: RULES }
    }
}

impl ExplanationEngine {
    pub fn new(rules: &'static [Rule]) -> Self {
        Self { rules }
    }

    /// Names of the rules matching `vector`, in table order.
    pub fn matching(&self, vector: &DailyFeatureVector) -> Vec<&'static str> {
        self.rules
            .iter()
            .filter(|r| (r.applies)(vector))
            .map(|r| r.name)
            .collect()
    }

    pub fn explain(&self, vector: &DailyFeatureVector) -> String {
        let parts: Vec<String> = self
            .rules
            .iter()
            .filter(|r| (r.applies)(vector))
            .map(|r| (r.describe)(vector))
            .collect();
        if parts.is_empty() {
            FALLBACK.to_string()
        } else {
            parts.join(SEPARATOR)
        }
    }
}
