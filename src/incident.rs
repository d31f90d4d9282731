//! Incident input records
//!
//! Everything the analysis core consumes: the report itself, the declared
//! system context, user-tunable analysis settings, and the optional
//! threat-intelligence report handed in by an upstream enrichment service.
//! All of these are read-only inputs; the core never mutates them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Declared severity of an incident, as set by the reporting system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// A security incident report awaiting triage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentReport {
    /// Short human-entered title ("Suspicious PowerShell on WS-0142")
    pub title: String,
    /// Raw log excerpt or alert body. Must be non-empty.
    pub log_text: String,
    /// Declared environment ("production web tier", "dev sandbox", ...)
    #[serde(default)]
    pub system_context: Option<String>,
    /// Supplementary logs attached after the initial report
    #[serde(default)]
    pub additional_logs: Option<String>,
    #[serde(default)]
    pub severity: Option<Severity>,
    /// When the activity occurred (not when it was reported)
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

impl IncidentReport {
    pub fn new(title: impl Into<String>, log_text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            log_text: log_text.into(),
            system_context: None,
            additional_logs: None,
            severity: None,
            occurred_at: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.system_context = Some(context.into());
        self
    }

    pub fn with_additional_logs(mut self, logs: impl Into<String>) -> Self {
        self.additional_logs = Some(logs.into());
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn with_occurred_at(mut self, at: DateTime<Utc>) -> Self {
        self.occurred_at = Some(at);
        self
    }

    /// Combined log body (primary + supplementary) used for scoring
    pub fn full_log_text(&self) -> String {
        match &self.additional_logs {
            Some(extra) if !extra.trim().is_empty() => {
                format!("{}\n{}", self.log_text, extra)
            }
            _ => self.log_text.clone(),
        }
    }
}

/// How much analysis work to spend on an incident
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisDepth {
    /// Core tasks only
    Quick,
    #[default]
    Standard,
    /// Adds vulnerability, network, behavioral and compliance passes
    Deep,
}

/// User-configurable analysis settings, passed unmodified into prompt
/// construction. The core never writes these back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSettings {
    /// Minimum confidence the user wants before auto-accepting a verdict
    pub confidence_threshold: u8,
    pub analysis_depth: AnalysisDepth,
    /// Free-text instructions appended to every prompt
    pub custom_instructions: String,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: 70,
            analysis_depth: AnalysisDepth::Standard,
            custom_instructions: String::new(),
        }
    }
}

/// One observable from a threat-intelligence lookup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatIndicator {
    /// The raw indicator (IP, domain, hash)
    pub value: String,
    /// Indicator type label ("ip", "domain", "sha256", ...)
    pub kind: String,
    #[serde(default)]
    pub malicious: bool,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
}

/// Report from an external threat-intelligence service. Consumed read-only
/// by the indicator-enrichment prompt builder and the fallback classifier's
/// correlation step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatIntelReport {
    /// Aggregate risk score 0-100 as computed by the TI service
    pub risk_score: u8,
    /// Service's own label ("benign", "suspicious", "malicious")
    pub threat_level: String,
    #[serde(default)]
    pub indicators: Vec<ThreatIndicator>,
}

impl ThreatIntelReport {
    pub fn malicious_indicators(&self) -> impl Iterator<Item = &ThreatIndicator> {
        self.indicators.iter().filter(|i| i.malicious)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_log_text_merges_additional_logs() {
        let report = IncidentReport::new("t", "line one").with_additional_logs("line two");
        assert_eq!(report.full_log_text(), "line one\nline two");
    }

    #[test]
    fn test_full_log_text_ignores_blank_additional_logs() {
        let report = IncidentReport::new("t", "line one").with_additional_logs("   ");
        assert_eq!(report.full_log_text(), "line one");
    }

    #[test]
    fn test_settings_default_depth() {
        let settings = AnalysisSettings::default();
        assert_eq!(settings.analysis_depth, AnalysisDepth::Standard);
        assert_eq!(settings.confidence_threshold, 70);
    }

    #[test]
    fn test_malicious_indicator_filter() {
        let report = ThreatIntelReport {
            risk_score: 80,
            threat_level: "malicious".to_string(),
            indicators: vec![
                ThreatIndicator {
                    value: "203.0.113.7".to_string(),
                    kind: "ip".to_string(),
                    malicious: true,
                    country: Some("ZZ".to_string()),
                    organization: None,
                },
                ThreatIndicator {
                    value: "8.8.8.8".to_string(),
                    kind: "ip".to_string(),
                    malicious: false,
                    country: None,
                    organization: Some("Google".to_string()),
                },
            ],
        };
        assert_eq!(report.malicious_indicators().count(), 1);
    }
}
