//! Boolean-criteria scoring engine (§4.6).
//!
//! A scoring preset maps `dimension.criterion` paths to weights. Given a
//! flat or nested map of booleans, the engine sums the weights of the
//! criteria that evaluated `true`, clamps to `[0, 1]`, and compares the
//! total against the preset's thresholds to produce a verdict.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Approved,
    NeedsImprovement,
    Rejected,
}

/// Thresholds a preset's total score is compared against: `>= approved`
/// is [`Verdict::Approved`], `>= needs_improvement` is
/// [`Verdict::NeedsImprovement`], anything below is [`Verdict::Rejected`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thresholds {
    pub approved: f64,
    pub needs_improvement: f64,
}

/// A named preset: weights for each `dimension.criterion` path plus the
/// thresholds used to turn a total score into a [`Verdict`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    pub weights: HashMap<String, f64>,
    pub thresholds: Thresholds,
}

impl Preset {
    /// Validate that weights sum to 1.0 within tolerance and thresholds
    /// are ordered sensibly. Called once at startup for built-in presets
    /// and whenever a workflow supplies a custom one.
    pub fn validate(&self) -> Result<()> {
        let sum: f64 = self.weights.values().sum();
        if (sum - 1.0).abs() > 0.01 {
            return Err(CoreError::InvalidPreset {
                context: self.name.clone(),
                severity: "weights".to_string(),
                reason: format!("weights sum to {sum:.4}, expected 1.0 +/- 0.01"),
            });
        }
        if self.thresholds.approved <= self.thresholds.needs_improvement {
            return Err(CoreError::InvalidPreset {
                context: self.name.clone(),
                severity: "thresholds".to_string(),
                reason: format!(
                    "approved threshold ({}) must exceed needs_improvement ({})",
                    self.thresholds.approved, self.thresholds.needs_improvement
                ),
            });
        }
        Ok(())
    }
}

/// Result of scoring a criteria map against a [`Preset`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreResult {
    pub score: f64,
    pub verdict: Verdict,
    /// Criteria present in the preset's weights but not satisfied by the
    /// input (either missing or evaluated `false`).
    pub failing: Vec<String>,
}

/// Flatten a nested JSON object of booleans into `dimension.criterion`
/// paths, e.g. `{"clarity": {"concise": true}}` -> `["clarity.concise"]`.
pub fn flatten_criteria(value: &Value) -> HashMap<String, bool> {
    let mut out = HashMap::new();
    flatten_into(value, String::new(), &mut out);
    out
}

fn flatten_into(value: &Value, prefix: String, out: &mut HashMap<String, bool>) {
    match value {
        Value::Object(map) => {
            for (key, v) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_into(v, path, out);
            }
        }
        Value::Bool(b) => {
            if !prefix.is_empty() {
                out.insert(prefix, *b);
            }
        }
        _ => {}
    }
}

/// Score `criteria` (a nested object of booleans, as produced by
/// [`flatten_criteria`] or constructed directly) against `preset`.
pub fn score(criteria: &HashMap<String, bool>, preset: &Preset) -> ScoreResult {
    let mut total = 0.0;
    let mut failing = Vec::new();

    for (path, weight) in &preset.weights {
        match criteria.get(path) {
            Some(true) => total += weight,
            _ => failing.push(path.clone()),
        }
    }

    let clamped = total.clamp(0.0, 1.0);
    let verdict = if clamped >= preset.thresholds.approved {
        Verdict::Approved
    } else if clamped >= preset.thresholds.needs_improvement {
        Verdict::NeedsImprovement
    } else {
        Verdict::Rejected
    };

    failing.sort();
    ScoreResult {
        score: clamped,
        verdict,
        failing,
    }
}

/// Built-in presets, keyed by `"{context}/{severity}"`, mirroring the
/// default preset table shipped alongside the original scoring engine.
pub fn builtin_presets() -> HashMap<String, Preset> {
    let mut presets = HashMap::new();

    presets.insert(
        "code_review/standard".to_string(),
        Preset {
            name: "code_review/standard".to_string(),
            weights: HashMap::from([
                ("correctness.logic_sound".to_string(), 0.4),
                ("correctness.edge_cases".to_string(), 0.2),
                ("style.readable".to_string(), 0.2),
                ("style.tested".to_string(), 0.2),
            ]),
            thresholds: Thresholds {
                approved: 0.8,
                needs_improvement: 0.5,
            },
        },
    );

    presets.insert(
        "code_review/strict".to_string(),
        Preset {
            name: "code_review/strict".to_string(),
            weights: HashMap::from([
                ("correctness.logic_sound".to_string(), 0.35),
                ("correctness.edge_cases".to_string(), 0.25),
                ("correctness.no_regressions".to_string(), 0.15),
                ("style.readable".to_string(), 0.15),
                ("style.tested".to_string(), 0.10),
            ]),
            thresholds: Thresholds {
                approved: 0.9,
                needs_improvement: 0.6,
            },
        },
    );

    presets
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_preset() -> Preset {
        Preset {
            name: "test".to_string(),
            weights: HashMap::from([
                ("a.one".to_string(), 0.5),
                ("a.two".to_string(), 0.3),
                ("b.three".to_string(), 0.2),
            ]),
            thresholds: Thresholds {
                approved: 0.8,
                needs_improvement: 0.5,
            },
        }
    }

    #[test]
    fn valid_preset_passes_validation() {
        assert!(sample_preset().validate().is_ok());
    }

    #[test]
    fn preset_with_bad_weight_sum_fails_validation() {
        let mut preset = sample_preset();
        preset.weights.insert("a.one".to_string(), 10.0);
        assert!(preset.validate().is_err());
    }

    #[test]
    fn preset_with_inverted_thresholds_fails_validation() {
        let mut preset = sample_preset();
        preset.thresholds.approved = 0.4;
        preset.thresholds.needs_improvement = 0.5;
        assert!(preset.validate().is_err());
    }

    #[test]
    fn flattens_nested_boolean_object() {
        let value = json!({"a": {"one": true, "two": false}, "b": {"three": true}});
        let flat = flatten_criteria(&value);
        assert_eq!(flat.get("a.one"), Some(&true));
        assert_eq!(flat.get("a.two"), Some(&false));
        assert_eq!(flat.get("b.three"), Some(&true));
    }

    #[test]
    fn scores_and_clamps_to_approved() {
        let preset = sample_preset();
        let criteria = HashMap::from([
            ("a.one".to_string(), true),
            ("a.two".to_string(), true),
            ("b.three".to_string(), true),
        ]);
        let result = score(&criteria, &preset);
        assert_eq!(result.score, 1.0);
        assert_eq!(result.verdict, Verdict::Approved);
        assert!(result.failing.is_empty());
    }

    #[test]
    fn missing_criteria_counted_as_false_and_listed() {
        let preset = sample_preset();
        let criteria = HashMap::from([("a.one".to_string(), true)]);
        let result = score(&criteria, &preset);
        assert_eq!(result.score, 0.5);
        assert_eq!(result.verdict, Verdict::NeedsImprovement);
        assert_eq!(result.failing, vec!["a.two".to_string(), "b.three".to_string()]);
    }

    #[test]
    fn low_score_is_rejected() {
        let preset = sample_preset();
        let criteria = HashMap::new();
        let result = score(&criteria, &preset);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.verdict, Verdict::Rejected);
    }

    #[test]
    fn builtin_presets_are_all_valid() {
        for preset in builtin_presets().values() {
            assert!(preset.validate().is_ok(), "{} failed validation", preset.name);
        }
    }
}
