//! Deterministic fallback classifier
//!
//! Rule-based scoring engine that produces the same kind of verdict as the
//! reasoning-service classification task using only local computation. The
//! orchestrator substitutes it per task when one call fails, or wholesale
//! when the reasoning service is unreachable.
//!
//! The whole module is pure and synchronous: identical incident text,
//! context and threat report always yield an identical verdict. The test
//! suite leans on that directly.

pub mod heuristics;
pub mod signals;

use serde::{Deserialize, Serialize};

use crate::incident::{IncidentReport, Severity, ThreatIntelReport};
use self::signals::{MatchedSignal, SignalCategory};

/// Verdict sides. Serialized form matches the persisted analysis records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    #[serde(rename = "true-positive")]
    TruePositive,
    #[serde(rename = "false-positive")]
    FalsePositive,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::TruePositive => "true-positive",
            Classification::FalsePositive => "false-positive",
        }
    }

    /// The marker phrase the classification task contract emits in raw text.
    pub fn marker(&self) -> &'static str {
        match self {
            Classification::TruePositive => "TRUE POSITIVE",
            Classification::FalsePositive => "FALSE POSITIVE",
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Working scores accumulated during one classification. Discarded after
/// the verdict is produced.
#[derive(Debug, Clone, Default)]
pub struct ClassificationScore {
    pub true_positive_score: f64,
    pub false_positive_score: f64,
    pub matched_signals: Vec<MatchedSignal>,
}

impl ClassificationScore {
    pub fn differential(&self) -> f64 {
        self.true_positive_score - self.false_positive_score
    }
}

/// The final local verdict
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationVerdict {
    pub result: Classification,
    pub confidence: u8,
    pub explanation: String,
    pub score_differential: f64,
}

/// Differential at or above which an incident is called a true positive.
/// Hand-tuned; treat as configuration, not an invariant.
pub const DECISION_THRESHOLD: f64 = 40.0;

const CONFIDENCE_CAP: u8 = 95;
const SIGNAL_BONUS_PER_MATCH: u8 = 2;
const SIGNAL_BONUS_CAP: u8 = 10;

/// Threat-intel risk score contribution per point
const INTEL_RISK_FACTOR: f64 = 0.3;
const INTEL_MALICIOUS_BONUS: f64 = 6.0;
const INTEL_MALICIOUS_CAP: f64 = 18.0;

const NON_PRODUCTION_PENALTY: f64 = 15.0;
const PRODUCTION_BONUS: f64 = 10.0;

/// Score an incident without deciding. Exposed separately so rule tables and
/// heuristics can be exercised end-to-end in tests.
pub fn score(incident: &IncidentReport, intel: Option<&ThreatIntelReport>) -> ClassificationScore {
    let text = incident.full_log_text();
    let mut score = ClassificationScore::default();

    for signal in signals::scan(&text) {
        match signal.category {
            SignalCategory::Legitimate => score.false_positive_score += signal.weight,
            _ => score.true_positive_score += signal.weight,
        }
        score.matched_signals.push(signal);
    }

    let (behavioral, matched) = heuristics::behavioral_score(&text);
    score.true_positive_score += behavioral;
    score.matched_signals.extend(matched);

    let (temporal, matched) = heuristics::temporal_score(&text, incident.occurred_at);
    score.true_positive_score += temporal;
    score.matched_signals.extend(matched);

    let (network, matched) = heuristics::network_score(&text);
    score.true_positive_score += network;
    score.matched_signals.extend(matched);

    let (statistical, matched) = heuristics::statistical_score(&text);
    score.true_positive_score += statistical;
    score.matched_signals.extend(matched);

    if let Some(report) = intel {
        apply_intel_correlation(&mut score, report);
    }
    apply_context_adjustment(&mut score, incident);

    score.true_positive_score = score.true_positive_score.max(0.0);
    score.false_positive_score = score.false_positive_score.max(0.0);
    score
}

/// Classify an incident locally. Pure: no network, no clock reads.
pub fn classify(
    incident: &IncidentReport,
    intel: Option<&ThreatIntelReport>,
) -> ClassificationVerdict {
    let score = score(incident, intel);
    let differential = score.differential();

    let result = if differential >= DECISION_THRESHOLD {
        Classification::TruePositive
    } else {
        Classification::FalsePositive
    };
    let confidence = confidence_for(differential.abs(), score.matched_signals.len());
    let explanation = explanation_for(&score, result, confidence);

    ClassificationVerdict {
        result,
        confidence,
        explanation,
        score_differential: differential,
    }
}

fn apply_intel_correlation(score: &mut ClassificationScore, report: &ThreatIntelReport) {
    if report.risk_score > 0 {
        let bonus = f64::from(report.risk_score) * INTEL_RISK_FACTOR;
        score.true_positive_score += bonus;
        score.matched_signals.push(MatchedSignal::new(
            format!(
                "Threat intel risk score {} ({})",
                report.risk_score, report.threat_level
            ),
            bonus,
            SignalCategory::ThreatIntel,
        ));
    }

    let malicious = report.malicious_indicators().count();
    if malicious > 0 {
        let bonus = (malicious as f64 * INTEL_MALICIOUS_BONUS).min(INTEL_MALICIOUS_CAP);
        score.true_positive_score += bonus;
        score.matched_signals.push(MatchedSignal::new(
            format!("{} indicator(s) flagged malicious by threat intel", malicious),
            bonus,
            SignalCategory::ThreatIntel,
        ));
    }
}

fn apply_context_adjustment(score: &mut ClassificationScore, incident: &IncidentReport) {
    if let Some(context) = incident.system_context.as_deref() {
        let context = context.to_lowercase();
        let non_production = ["test", "sandbox", "development", "dev env", "staging", "lab", "qa"]
            .iter()
            .any(|needle| context.contains(needle));
        let production = ["production", "prod ", "domain controller", "critical", "payment"]
            .iter()
            .any(|needle| context.contains(needle));

        if non_production {
            score.true_positive_score -= NON_PRODUCTION_PENALTY;
            score.matched_signals.push(MatchedSignal::new(
                "Declared non-production environment",
                -NON_PRODUCTION_PENALTY,
                SignalCategory::Context,
            ));
        } else if production {
            score.true_positive_score += PRODUCTION_BONUS;
            score.matched_signals.push(MatchedSignal::new(
                "Production or critical-system context",
                PRODUCTION_BONUS,
                SignalCategory::Context,
            ));
        }
    }

    let severity_adjust = match incident.severity {
        Some(Severity::Critical) => 8.0,
        Some(Severity::High) => 4.0,
        Some(Severity::Low) => -4.0,
        Some(Severity::Medium) | None => 0.0,
    };
    if severity_adjust != 0.0 {
        score.true_positive_score += severity_adjust;
        score.matched_signals.push(MatchedSignal::new(
            format!(
                "Declared severity {}",
                incident.severity.map(|s| s.as_str()).unwrap_or("unknown")
            ),
            severity_adjust,
            SignalCategory::Context,
        ));
    }
}

/// Confidence bands anchored by differential magnitude, nudged by how many
/// signals agreed, capped well short of certainty.
fn confidence_for(differential_abs: f64, signal_count: usize) -> u8 {
    let base: u8 = if differential_abs > 80.0 {
        85
    } else if differential_abs > 50.0 {
        75
    } else if differential_abs > 30.0 {
        65
    } else {
        55
    };
    let bonus = (signal_count.min(u8::MAX as usize) as u8)
        .saturating_mul(SIGNAL_BONUS_PER_MATCH)
        .min(SIGNAL_BONUS_CAP);
    base.saturating_add(bonus).min(CONFIDENCE_CAP)
}

fn signal_favors(signal: &MatchedSignal, result: Classification) -> bool {
    let toward_true_positive = match signal.category {
        SignalCategory::Legitimate => false,
        SignalCategory::Context => signal.weight > 0.0,
        _ => true,
    };
    match result {
        Classification::TruePositive => toward_true_positive,
        Classification::FalsePositive => !toward_true_positive,
    }
}

fn explanation_for(score: &ClassificationScore, result: Classification, confidence: u8) -> String {
    let mut leading: Vec<&MatchedSignal> = score
        .matched_signals
        .iter()
        .filter(|s| signal_favors(s, result))
        .collect();
    leading.sort_by(|a, b| {
        b.weight
            .abs()
            .partial_cmp(&a.weight.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let leading: Vec<String> = leading
        .iter()
        .take(5)
        .map(|s| s.description.clone())
        .collect();

    let signals_text = if leading.is_empty() {
        "no recognized signals".to_string()
    } else {
        leading.join("; ")
    };

    format!(
        "Classified as {} with {}% confidence (true-positive score {:.1}, false-positive score {:.1}). Leading signals: {}.",
        result, confidence, score.true_positive_score, score.false_positive_score, signals_text
    )
}
