//! Confidence aggregation
//!
//! Deterministic reduction of the per-task records into the summary fields
//! of the `AnalysisResult`. No second reasoning pass happens here.

use std::collections::BTreeMap;

use super::{AgentRecord, Classification};

/// Neutral value when no record carries a usable confidence
pub const NEUTRAL_CONFIDENCE: u8 = 50;

/// Records must clear this bar for their findings to enter the reasoning line
pub const REASONING_CONFIDENCE_BAR: u8 = 70;

/// Findings kept in the synthesized reasoning sentence
const REASONING_MAX_FINDINGS: usize = 5;

/// Marker phrase the classification task emits for a hostile verdict.
/// Case-sensitive by contract.
pub const TRUE_POSITIVE_MARKER: &str = "TRUE POSITIVE";

pub const MIXED_RESULTS_REASONING: &str =
    "Mixed analysis results require human validation before acting on this incident.";

/// Mean of confidences over records with confidence > 0, rounded to the
/// nearest integer; neutral 50 when nothing qualifies.
pub fn overall_confidence<'a, I>(records: I) -> u8
where
    I: IntoIterator<Item = &'a AgentRecord>,
{
    let confidences: Vec<f64> = records
        .into_iter()
        .filter(|r| r.confidence > 0)
        .map(|r| f64::from(r.confidence))
        .collect();
    if confidences.is_empty() {
        return NEUTRAL_CONFIDENCE;
    }
    let mean = confidences.iter().sum::<f64>() / confidences.len() as f64;
    mean.round().clamp(0.0, 100.0) as u8
}

/// Derive the verdict from the classification record's raw text. The task
/// contract puts the marker on its own line, so a literal containment check
/// is sufficient and deterministic; a missing record reads as no marker.
pub fn final_classification(classification_record: Option<&AgentRecord>) -> Classification {
    match classification_record {
        Some(record) if record.raw_text.contains(TRUE_POSITIVE_MARKER) => {
            Classification::TruePositive
        }
        _ => Classification::FalsePositive,
    }
}

/// Synthesize the reasoning line from high-confidence findings, in task-name
/// order so the output is stable across runs.
pub fn reasoning(per_task: &BTreeMap<String, AgentRecord>) -> String {
    let findings: Vec<String> = per_task
        .values()
        .filter(|r| r.confidence > REASONING_CONFIDENCE_BAR)
        .flat_map(|r| r.display_findings())
        .take(REASONING_MAX_FINDINGS)
        .collect();

    if findings.is_empty() {
        MIXED_RESULTS_REASONING.to_string()
    } else {
        findings.join("; ")
    }
}

/// All three summary fields at once
pub fn summarize(per_task: &BTreeMap<String, AgentRecord>) -> (u8, Classification, String) {
    let confidence = overall_confidence(per_task.values());
    let classification = final_classification(per_task.get(super::tasks::CLASSIFICATION));
    let reasoning = reasoning(per_task);
    (confidence, classification, reasoning)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(agent: &str, confidence: u8, findings: &[&str]) -> AgentRecord {
        let mut r = AgentRecord::new(agent, format!("{} raw", agent));
        r.confidence = confidence;
        r.key_findings = findings.iter().map(|s| s.to_string()).collect();
        r
    }

    #[test]
    fn test_overall_confidence_mean_rounds() {
        let records = vec![record("a", 80, &[]), record("b", 75, &[])];
        // (80 + 75) / 2 = 77.5 -> 78
        assert_eq!(overall_confidence(records.iter()), 78);
    }

    #[test]
    fn test_overall_confidence_skips_zero() {
        let records = vec![record("a", 0, &[]), record("b", 60, &[])];
        assert_eq!(overall_confidence(records.iter()), 60);
    }

    #[test]
    fn test_overall_confidence_neutral_when_empty() {
        let records: Vec<AgentRecord> = vec![record("a", 0, &[])];
        assert_eq!(overall_confidence(records.iter()), NEUTRAL_CONFIDENCE);
        assert_eq!(overall_confidence(std::iter::empty()), NEUTRAL_CONFIDENCE);
    }

    #[test]
    fn test_classification_marker_is_case_sensitive() {
        let mut r = record("classification", 80, &[]);
        r.raw_text = "verdict: true positive based on evidence".to_string();
        assert_eq!(
            final_classification(Some(&r)),
            Classification::FalsePositive
        );

        r.raw_text = "TRUE POSITIVE\njustification follows".to_string();
        assert_eq!(final_classification(Some(&r)), Classification::TruePositive);
    }

    #[test]
    fn test_classification_missing_record_is_false_positive() {
        assert_eq!(final_classification(None), Classification::FalsePositive);
    }

    #[test]
    fn test_reasoning_filters_by_confidence_bar() {
        let mut per_task = BTreeMap::new();
        per_task.insert(
            "a".to_string(),
            record("a", 90, &["strong finding"]),
        );
        per_task.insert(
            "b".to_string(),
            record("b", 70, &["at-the-bar finding, excluded"]),
        );
        let line = reasoning(&per_task);
        assert!(line.contains("strong finding"));
        assert!(!line.contains("excluded"));
    }

    #[test]
    fn test_reasoning_caps_at_five_findings() {
        let mut per_task = BTreeMap::new();
        per_task.insert(
            "a".to_string(),
            record("a", 90, &["f1", "f2", "f3", "f4"]),
        );
        per_task.insert("b".to_string(), record("b", 85, &["f5", "f6"]));
        let line = reasoning(&per_task);
        assert_eq!(line.matches(';').count(), 4);
        assert!(!line.contains("f6"));
    }

    #[test]
    fn test_reasoning_mixed_sentence_when_nothing_qualifies() {
        let mut per_task = BTreeMap::new();
        per_task.insert("a".to_string(), record("a", 50, &["weak finding"]));
        assert_eq!(reasoning(&per_task), MIXED_RESULTS_REASONING);
    }

    #[test]
    fn test_reasoning_uses_placeholder_for_bare_records() {
        let mut per_task = BTreeMap::new();
        per_task.insert("entity-mapping".to_string(), record("entity-mapping", 88, &[]));
        assert_eq!(reasoning(&per_task), "entity-mapping analysis completed");
    }

    #[test]
    fn test_summarize_combines_fields() {
        let mut per_task = BTreeMap::new();
        let mut classification = record(super::super::tasks::CLASSIFICATION, 82, &["verdict"]);
        classification.raw_text = "TRUE POSITIVE\nevidence".to_string();
        per_task.insert(
            super::super::tasks::CLASSIFICATION.to_string(),
            classification,
        );
        let (confidence, verdict, line) = summarize(&per_task);
        assert_eq!(confidence, 82);
        assert_eq!(verdict, Classification::TruePositive);
        assert!(line.contains("verdict"));
    }
}
