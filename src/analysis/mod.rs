//! Analysis core: records, orchestration, parsing, aggregation
//!
//! The unit of work is one incident run: the task catalog fans out against
//! the reasoning service, each reply is parsed into an [`AgentRecord`], and
//! the aggregator folds the records into a single [`AnalysisResult`] that
//! the persistence and API layers consume.

pub mod aggregate;
pub mod client;
pub mod orchestrator;
pub mod parse;
pub mod prompts;
pub mod synthesis;
pub mod tasks;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use crate::fallback::Classification;
use crate::fallback::ClassificationVerdict;

/// Cap on findings kept per record
pub const MAX_KEY_FINDINGS: usize = 5;
/// Cap on recommendations kept per record
pub const MAX_RECOMMENDATIONS: usize = 4;

/// Confidence assigned to substituted records when a task cannot complete
pub const FALLBACK_CONFIDENCE: u8 = 50;

/// Raw text of the substituted record for a failed non-classification task
pub const UNAVAILABLE_TEXT: &str =
    "Analysis agent unavailable. Manual review of this dimension is recommended.";

/// One task's structured result. Produced once per task invocation and
/// owned by the `AnalysisResult` that aggregates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    /// Task name this record belongs to
    pub agent: String,
    /// The unparsed reply (or substituted fallback text)
    pub raw_text: String,
    /// 0-100; 0 means "no usable confidence signal"
    pub confidence: u8,
    pub key_findings: Vec<String>,
    pub recommendations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_block: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl AgentRecord {
    pub fn new(agent: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            raw_text: raw_text.into(),
            confidence: 0,
            key_findings: Vec::new(),
            recommendations: Vec::new(),
            sandbox_output: None,
            code_block: None,
            correlation_id: None,
        }
    }

    /// Substituted record for a task the reasoning service could not serve
    pub fn unavailable(agent: impl Into<String>) -> Self {
        let agent = agent.into();
        Self {
            raw_text: UNAVAILABLE_TEXT.to_string(),
            confidence: FALLBACK_CONFIDENCE,
            key_findings: vec![format!("{} agent did not respond", agent)],
            recommendations: vec!["Escalate for manual review".to_string()],
            sandbox_output: None,
            code_block: None,
            correlation_id: None,
            agent,
        }
    }

    /// Wrap a local classification verdict as the classification task's
    /// record. The raw text carries the marker phrase so downstream
    /// classification derivation works identically for live and fallback
    /// records.
    pub fn from_verdict(agent: impl Into<String>, verdict: &ClassificationVerdict) -> Self {
        Self {
            agent: agent.into(),
            raw_text: format!("{}\n{}", verdict.result.marker(), verdict.explanation),
            confidence: verdict.confidence,
            key_findings: vec![verdict.explanation.clone()],
            recommendations: vec![
                "Verdict produced by local rule engine; spot-check manually".to_string()
            ],
            sandbox_output: None,
            code_block: None,
            correlation_id: None,
        }
    }

    /// Findings for display, substituting the generic placeholder when the
    /// reply carried none.
    pub fn display_findings(&self) -> Vec<String> {
        if self.key_findings.is_empty() {
            vec![format!("{} analysis completed", self.agent)]
        } else {
            self.key_findings.clone()
        }
    }
}

/// The three free-text blocks of the composite synthesis workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisOutcome {
    /// Technical-evidence pass
    pub technical: String,
    /// Pattern/campaign pass
    pub strategic: String,
    /// Final synthesis pass (settings-aware)
    pub synthesis: String,
}

/// The complete verdict for one incident run. Immutable once built; this is
/// what persistence and the API layer receive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Exactly one entry per task-catalog member, keyed and ordered by task
    /// name regardless of completion order
    pub per_task: BTreeMap<String, AgentRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synthesis: Option<SynthesisOutcome>,
    pub overall_confidence: u8,
    pub final_classification: Classification,
    pub reasoning: String,
}

impl AnalysisResult {
    pub fn record(&self, task: &str) -> Option<&AgentRecord> {
        self.per_task.get(task)
    }

    /// Flatten into the persisted row shape: one column per task plus the
    /// summary fields.
    pub fn to_persisted(&self) -> PersistedAnalysis {
        let get = |name: &str| self.per_task.get(name).cloned();
        PersistedAnalysis {
            pattern_recognition: get(tasks::PATTERN_RECOGNITION),
            threat_intel: get(tasks::THREAT_INTEL),
            technique_mapping: get(tasks::TECHNIQUE_MAPPING),
            indicator_enrichment: get(tasks::INDICATOR_ENRICHMENT),
            classification: get(tasks::CLASSIFICATION),
            synthesis: get(tasks::SYNTHESIS),
            cross_team: get(tasks::CROSS_TEAM),
            entity_mapping: get(tasks::ENTITY_MAPPING),
            vulnerability: get(tasks::VULNERABILITY),
            network: get(tasks::NETWORK),
            behavioral: get(tasks::BEHAVIORAL),
            compliance: get(tasks::COMPLIANCE),
            technical_analysis: self.synthesis.as_ref().map(|s| s.technical.clone()),
            strategic_analysis: self.synthesis.as_ref().map(|s| s.strategic.clone()),
            synthesis_analysis: self.synthesis.as_ref().map(|s| s.synthesis.clone()),
            overall_confidence: self.overall_confidence,
            final_classification: self.final_classification,
            reasoning: self.reasoning.clone(),
        }
    }

    /// Rebuild from the persisted row shape
    pub fn from_persisted(persisted: PersistedAnalysis) -> Self {
        let mut per_task = BTreeMap::new();
        let mut insert = |name: &str, record: Option<AgentRecord>| {
            if let Some(record) = record {
                per_task.insert(name.to_string(), record);
            }
        };
        insert(tasks::PATTERN_RECOGNITION, persisted.pattern_recognition);
        insert(tasks::THREAT_INTEL, persisted.threat_intel);
        insert(tasks::TECHNIQUE_MAPPING, persisted.technique_mapping);
        insert(tasks::INDICATOR_ENRICHMENT, persisted.indicator_enrichment);
        insert(tasks::CLASSIFICATION, persisted.classification);
        insert(tasks::SYNTHESIS, persisted.synthesis);
        insert(tasks::CROSS_TEAM, persisted.cross_team);
        insert(tasks::ENTITY_MAPPING, persisted.entity_mapping);
        insert(tasks::VULNERABILITY, persisted.vulnerability);
        insert(tasks::NETWORK, persisted.network);
        insert(tasks::BEHAVIORAL, persisted.behavioral);
        insert(tasks::COMPLIANCE, persisted.compliance);

        let synthesis = match (
            persisted.technical_analysis,
            persisted.strategic_analysis,
            persisted.synthesis_analysis,
        ) {
            (Some(technical), Some(strategic), Some(synthesis)) => Some(SynthesisOutcome {
                technical,
                strategic,
                synthesis,
            }),
            _ => None,
        };

        Self {
            per_task,
            synthesis,
            overall_confidence: persisted.overall_confidence,
            final_classification: persisted.final_classification,
            reasoning: persisted.reasoning,
        }
    }
}

/// Flat storage shape handed to the persistence layer: one field per
/// top-level task plus the summary fields. Depth-gated tasks that did not
/// run are absent, not empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedAnalysis {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_recognition: Option<AgentRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threat_intel: Option<AgentRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technique_mapping: Option<AgentRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indicator_enrichment: Option<AgentRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<AgentRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synthesis: Option<AgentRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_team: Option<AgentRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_mapping: Option<AgentRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vulnerability: Option<AgentRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<AgentRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavioral: Option<AgentRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance: Option<AgentRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technical_analysis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategic_analysis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synthesis_analysis: Option<String>,
    pub overall_confidence: u8,
    pub final_classification: Classification,
    pub reasoning: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(agent: &str, confidence: u8) -> AgentRecord {
        AgentRecord {
            agent: agent.to_string(),
            raw_text: format!("{} output", agent),
            confidence,
            key_findings: vec!["finding one".to_string(), "finding two".to_string()],
            recommendations: vec!["do the thing".to_string()],
            sandbox_output: None,
            code_block: None,
            correlation_id: Some("run-1".to_string()),
        }
    }

    #[test]
    fn test_unavailable_record_shape() {
        let record = AgentRecord::unavailable("pattern-recognition");
        assert_eq!(record.confidence, FALLBACK_CONFIDENCE);
        assert_eq!(record.raw_text, UNAVAILABLE_TEXT);
        assert!(!record.key_findings.is_empty());
    }

    #[test]
    fn test_display_findings_placeholder() {
        let record = AgentRecord::new("threat-intel", "raw");
        assert_eq!(
            record.display_findings(),
            vec!["threat-intel analysis completed".to_string()]
        );
    }

    #[test]
    fn test_persisted_round_trip() {
        let mut per_task = BTreeMap::new();
        per_task.insert(
            tasks::CLASSIFICATION.to_string(),
            sample_record(tasks::CLASSIFICATION, 82),
        );
        per_task.insert(
            tasks::PATTERN_RECOGNITION.to_string(),
            sample_record(tasks::PATTERN_RECOGNITION, 74),
        );
        let result = AnalysisResult {
            per_task,
            synthesis: Some(SynthesisOutcome {
                technical: "tech".to_string(),
                strategic: "strat".to_string(),
                synthesis: "synth".to_string(),
            }),
            overall_confidence: 78,
            final_classification: Classification::TruePositive,
            reasoning: "finding one; finding two".to_string(),
        };

        let restored = AnalysisResult::from_persisted(result.to_persisted());
        assert_eq!(restored.overall_confidence, result.overall_confidence);
        assert_eq!(restored.final_classification, result.final_classification);
        assert_eq!(restored.reasoning, result.reasoning);
        assert_eq!(restored.per_task, result.per_task);
        assert_eq!(restored.synthesis, result.synthesis);
    }

    #[test]
    fn test_persisted_round_trip_through_json() {
        let mut per_task = BTreeMap::new();
        per_task.insert(
            tasks::THREAT_INTEL.to_string(),
            sample_record(tasks::THREAT_INTEL, 65),
        );
        let result = AnalysisResult {
            per_task,
            synthesis: None,
            overall_confidence: 65,
            final_classification: Classification::FalsePositive,
            reasoning: "mixed".to_string(),
        };

        let json = serde_json::to_string(&result.to_persisted()).unwrap();
        let persisted: PersistedAnalysis = serde_json::from_str(&json).unwrap();
        let restored = AnalysisResult::from_persisted(persisted);
        assert_eq!(
            restored.per_task[tasks::THREAT_INTEL].key_findings,
            result.per_task[tasks::THREAT_INTEL].key_findings
        );
        assert_eq!(restored.final_classification, Classification::FalsePositive);
    }

    #[test]
    fn test_classification_serializes_kebab_case() {
        let json = serde_json::to_string(&Classification::TruePositive).unwrap();
        assert_eq!(json, "\"true-positive\"");
    }
}
