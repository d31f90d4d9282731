//! Task catalog
//!
//! The fixed set of analysis tasks and their prompt builders. Everything
//! here is a pure function of the incident, the settings and the optional
//! threat-intel report; no network access happens in this module. Adding a
//! task means adding one `TaskSpec` to the catalog and nothing else.

use std::time::Duration;

use super::client::Model;
use super::parse::truncate_content;
use super::prompts;
use crate::incident::{AnalysisDepth, AnalysisSettings, IncidentReport, ThreatIntelReport};

pub const PATTERN_RECOGNITION: &str = "pattern-recognition";
pub const THREAT_INTEL: &str = "threat-intel";
pub const TECHNIQUE_MAPPING: &str = "technique-mapping";
pub const INDICATOR_ENRICHMENT: &str = "indicator-enrichment";
pub const CLASSIFICATION: &str = "classification";
pub const SYNTHESIS: &str = "synthesis";
pub const CROSS_TEAM: &str = "cross-team";
pub const ENTITY_MAPPING: &str = "entity-mapping";
pub const VULNERABILITY: &str = "vulnerability";
pub const NETWORK: &str = "network";
pub const BEHAVIORAL: &str = "behavioral";
pub const COMPLIANCE: &str = "compliance";

/// Per-task call budget
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(30);

/// Keep prompts bounded even for very large log attachments
const MAX_LOG_CHARS: usize = 12_000;

/// Whether a catalog member is a single reasoning call or the composite
/// multi-pass synthesis workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Direct,
    Composite,
}

/// One analysis task: name, prompt recipe, model tier and call budget.
/// Catalog entries are immutable and defined once per task kind.
pub struct TaskSpec {
    pub name: &'static str,
    pub kind: TaskKind,
    pub model: Model,
    system: &'static str,
    pub timeout: Duration,
    /// Include the threat-intel report section in the prompt
    wants_intel: bool,
}

impl TaskSpec {
    fn direct(name: &'static str, system: &'static str, model: Model) -> Self {
        Self {
            name,
            kind: TaskKind::Direct,
            model,
            system,
            timeout: DEFAULT_TASK_TIMEOUT,
            wants_intel: false,
        }
    }

    fn with_intel(mut self) -> Self {
        self.wants_intel = true;
        self
    }

    /// Assemble the full prompt for a direct task. Pure; the composite
    /// synthesis task builds its own prompts in `synthesis`.
    pub fn build_prompt(
        &self,
        incident: &IncidentReport,
        settings: &AnalysisSettings,
        intel: Option<&ThreatIntelReport>,
    ) -> String {
        let mut prompt = String::new();
        prompt.push_str(self.system);
        prompt.push_str("\n\n");
        prompt.push_str(&incident_block(incident, settings));

        if self.wants_intel {
            prompt.push_str(&intel_block(intel));
        }

        prompt.push('\n');
        prompt.push_str(prompts::OUTPUT_CONTRACT);
        prompt
    }
}

fn incident_block(incident: &IncidentReport, settings: &AnalysisSettings) -> String {
    let mut block = format!(
        "INCIDENT: {}\n\nSYSTEM CONTEXT: {}\n\nANALYSIS SETTINGS:\n- confidence threshold: {}\n- analysis depth: {:?}\n",
        incident.title,
        incident.system_context.as_deref().unwrap_or("not provided"),
        settings.confidence_threshold,
        settings.analysis_depth,
    );
    if !settings.custom_instructions.trim().is_empty() {
        block.push_str(&format!(
            "- operator instructions: {}\n",
            settings.custom_instructions.trim()
        ));
    }
    if let Some(severity) = incident.severity {
        block.push_str(&format!("- declared severity: {}\n", severity.as_str()));
    }

    block.push_str(&format!(
        "\nLOG EXCERPT:\n{}\n",
        truncate_content(&incident.log_text, MAX_LOG_CHARS)
    ));
    if let Some(extra) = incident.additional_logs.as_deref() {
        if !extra.trim().is_empty() {
            block.push_str(&format!(
                "\nSUPPLEMENTARY LOGS:\n{}\n",
                truncate_content(extra, MAX_LOG_CHARS)
            ));
        }
    }
    block
}

fn intel_block(intel: Option<&ThreatIntelReport>) -> String {
    let Some(report) = intel else {
        return "\nTHREAT INTELLIGENCE: no external report available\n".to_string();
    };

    let mut block = format!(
        "\nTHREAT INTELLIGENCE REPORT:\n- risk score: {}/100\n- threat level: {}\n",
        report.risk_score, report.threat_level
    );
    for indicator in &report.indicators {
        let flag = if indicator.malicious {
            "MALICIOUS"
        } else {
            "unflagged"
        };
        let origin = match (&indicator.country, &indicator.organization) {
            (Some(country), Some(org)) => format!(" ({}, {})", country, org),
            (Some(country), None) => format!(" ({})", country),
            (None, Some(org)) => format!(" ({})", org),
            (None, None) => String::new(),
        };
        block.push_str(&format!(
            "- [{}] {} {}{}\n",
            flag, indicator.kind, indicator.value, origin
        ));
    }
    block
}

/// Instantiate the catalog for one run. Quick and Standard share the core
/// set; Deep adds the vulnerability, network, behavioral and compliance
/// passes.
pub fn catalog(depth: AnalysisDepth) -> Vec<TaskSpec> {
    let mut tasks = vec![
        TaskSpec::direct(
            PATTERN_RECOGNITION,
            prompts::PATTERN_RECOGNITION_SYSTEM,
            Model::Balanced,
        ),
        TaskSpec::direct(THREAT_INTEL, prompts::THREAT_INTEL_SYSTEM, Model::Balanced),
        TaskSpec::direct(
            TECHNIQUE_MAPPING,
            prompts::TECHNIQUE_MAPPING_SYSTEM,
            Model::Balanced,
        ),
        TaskSpec::direct(
            INDICATOR_ENRICHMENT,
            prompts::INDICATOR_ENRICHMENT_SYSTEM,
            Model::Speed,
        )
        .with_intel(),
        TaskSpec::direct(
            CLASSIFICATION,
            prompts::CLASSIFICATION_SYSTEM,
            Model::Balanced,
        ),
        TaskSpec {
            name: SYNTHESIS,
            kind: TaskKind::Composite,
            model: Model::Smart,
            system: prompts::SYNTHESIS_FINAL_SYSTEM,
            timeout: DEFAULT_TASK_TIMEOUT,
            wants_intel: false,
        },
        TaskSpec::direct(CROSS_TEAM, prompts::CROSS_TEAM_SYSTEM, Model::Speed),
        TaskSpec::direct(ENTITY_MAPPING, prompts::ENTITY_MAPPING_SYSTEM, Model::Speed),
    ];

    if depth == AnalysisDepth::Deep {
        tasks.push(
            TaskSpec::direct(VULNERABILITY, prompts::VULNERABILITY_SYSTEM, Model::Balanced)
                .with_intel(),
        );
        tasks.push(TaskSpec::direct(NETWORK, prompts::NETWORK_SYSTEM, Model::Balanced));
        tasks.push(TaskSpec::direct(
            BEHAVIORAL,
            prompts::BEHAVIORAL_SYSTEM,
            Model::Balanced,
        ));
        tasks.push(TaskSpec::direct(COMPLIANCE, prompts::COMPLIANCE_SYSTEM, Model::Speed));
    }

    tasks
}
