//! Analysis orchestrator
//!
//! Fans the task catalog out concurrently against the reasoning client and
//! always comes back with a complete `AnalysisResult`: a task that errors or
//! overruns its budget is substituted with a locally computed fallback
//! record, and an overrun of the whole batch substitutes every slot in one
//! shot. The only hard error is input with nothing to analyze.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use futures::future::join_all;
use uuid::Uuid;

use super::aggregate;
use super::client::ReasoningClient;
use super::parse;
use super::synthesis::{SynthesisWorkflow, STRATEGIC_UNAVAILABLE, SYNTHESIS_UNAVAILABLE, TECHNICAL_UNAVAILABLE};
use super::tasks::{self, TaskKind, TaskSpec};
use super::{AgentRecord, AnalysisResult, SynthesisOutcome};
use crate::fallback;
use crate::incident::{AnalysisSettings, IncidentReport, ThreatIntelReport};

/// Whole-batch budget
pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Overrides every task's own timeout when set; used mainly by tests
    pub task_timeout: Option<Duration>,
    pub batch_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            task_timeout: None,
            batch_timeout: DEFAULT_BATCH_TIMEOUT,
        }
    }
}

/// Runs incident analyses against an injected reasoning client. Holds no
/// mutable state; one instance can serve concurrent runs.
pub struct Orchestrator {
    client: Arc<dyn ReasoningClient>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(client: Arc<dyn ReasoningClient>) -> Self {
        Self::with_config(client, OrchestratorConfig::default())
    }

    pub fn with_config(client: Arc<dyn ReasoningClient>, config: OrchestratorConfig) -> Self {
        Self { client, config }
    }

    fn effective_timeout(&self, spec: &TaskSpec) -> Duration {
        self.config.task_timeout.unwrap_or(spec.timeout)
    }

    /// Analyze one incident. Returns a result with exactly one record per
    /// catalog member no matter how many reasoning calls fail; errors only
    /// on input no fallback can do anything with.
    pub async fn run(
        &self,
        incident: &IncidentReport,
        settings: &AnalysisSettings,
        intel: Option<&ThreatIntelReport>,
    ) -> anyhow::Result<AnalysisResult> {
        if incident.log_text.trim().is_empty() {
            bail!("incident log text is empty; nothing to analyze");
        }

        let run_id = Uuid::new_v4().to_string();
        let catalog = tasks::catalog(settings.analysis_depth);
        tracing::debug!(%run_id, task_count = catalog.len(), "dispatching analysis batch");

        let work = self.run_catalog(&catalog, incident, settings, intel);
        let (mut per_task, synthesis) =
            match tokio::time::timeout(self.config.batch_timeout, work).await {
                Ok(slots) => slots,
                Err(_) => {
                    tracing::warn!(
                        %run_id,
                        "batch budget exhausted, substituting fallback records for every task"
                    );
                    fallback_slots(&catalog, incident, intel)
                }
            };

        for record in per_task.values_mut() {
            record.correlation_id = Some(run_id.clone());
        }

        let (overall_confidence, final_classification, reasoning) =
            aggregate::summarize(&per_task);

        Ok(AnalysisResult {
            per_task,
            synthesis: Some(synthesis),
            overall_confidence,
            final_classification,
            reasoning,
        })
    }

    /// Dispatch every catalog member concurrently and join. Each record is
    /// written exactly once into its own slot; ordering falls out of the
    /// map's key order, not completion order.
    async fn run_catalog(
        &self,
        catalog: &[TaskSpec],
        incident: &IncidentReport,
        settings: &AnalysisSettings,
        intel: Option<&ThreatIntelReport>,
    ) -> (BTreeMap<String, AgentRecord>, SynthesisOutcome) {
        let direct_futures = catalog
            .iter()
            .filter(|spec| spec.kind == TaskKind::Direct)
            .map(|spec| self.run_direct_task(spec, incident, settings, intel));

        let synthesis_timeout = self
            .config
            .task_timeout
            .unwrap_or(tasks::DEFAULT_TASK_TIMEOUT);
        let synthesis_future = SynthesisWorkflow::new(
            self.client.as_ref(),
            incident,
            settings,
            synthesis_timeout,
        )
        .run();

        let (direct_records, outcome) = tokio::join!(join_all(direct_futures), synthesis_future);

        let mut per_task: BTreeMap<String, AgentRecord> = direct_records.into_iter().collect();
        // The composite task's slot holds the parsed final synthesis block
        // so every catalog member is represented uniformly.
        let synthesis_record = if outcome.synthesis == SYNTHESIS_UNAVAILABLE {
            AgentRecord::unavailable(tasks::SYNTHESIS)
        } else {
            parse::parse_agent_response(tasks::SYNTHESIS, &outcome.synthesis)
        };
        per_task.insert(tasks::SYNTHESIS.to_string(), synthesis_record);

        (per_task, outcome)
    }

    async fn run_direct_task(
        &self,
        spec: &TaskSpec,
        incident: &IncidentReport,
        settings: &AnalysisSettings,
        intel: Option<&ThreatIntelReport>,
    ) -> (String, AgentRecord) {
        let prompt = spec.build_prompt(incident, settings, intel);
        let call = self.client.generate(spec.model.id(), &prompt);

        let record = match tokio::time::timeout(self.effective_timeout(spec), call).await {
            Ok(Ok(text)) => parse::parse_agent_response(spec.name, &text),
            Ok(Err(err)) => {
                tracing::warn!(task = spec.name, error = %err, "task failed, substituting fallback");
                fallback_record(spec.name, incident, intel)
            }
            Err(_) => {
                tracing::warn!(task = spec.name, "task timed out, substituting fallback");
                fallback_record(spec.name, incident, intel)
            }
        };
        (spec.name.to_string(), record)
    }
}

/// Analyze without any reasoning service at all: every slot is filled by the
/// local fallback. Used when no client is configured or the caller opted out
/// of network analysis.
pub fn analyze_offline(
    incident: &IncidentReport,
    settings: &AnalysisSettings,
    intel: Option<&ThreatIntelReport>,
) -> anyhow::Result<AnalysisResult> {
    if incident.log_text.trim().is_empty() {
        bail!("incident log text is empty; nothing to analyze");
    }

    let run_id = Uuid::new_v4().to_string();
    let catalog = tasks::catalog(settings.analysis_depth);
    let (mut per_task, synthesis) = fallback_slots(&catalog, incident, intel);
    for record in per_task.values_mut() {
        record.correlation_id = Some(run_id.clone());
    }

    let (overall_confidence, final_classification, reasoning) = aggregate::summarize(&per_task);
    Ok(AnalysisResult {
        per_task,
        synthesis: Some(synthesis),
        overall_confidence,
        final_classification,
        reasoning,
    })
}

/// The substitute for one failed task: the classification slot gets a real
/// locally computed verdict, everything else gets the unavailable record.
fn fallback_record(
    name: &str,
    incident: &IncidentReport,
    intel: Option<&ThreatIntelReport>,
) -> AgentRecord {
    if name == tasks::CLASSIFICATION {
        AgentRecord::from_verdict(name, &fallback::classify(incident, intel))
    } else {
        AgentRecord::unavailable(name)
    }
}

/// Fill every catalog slot with its fallback in one shot
fn fallback_slots(
    catalog: &[TaskSpec],
    incident: &IncidentReport,
    intel: Option<&ThreatIntelReport>,
) -> (BTreeMap<String, AgentRecord>, SynthesisOutcome) {
    let per_task = catalog
        .iter()
        .map(|spec| {
            (
                spec.name.to_string(),
                fallback_record(spec.name, incident, intel),
            )
        })
        .collect();
    let synthesis = SynthesisOutcome {
        technical: TECHNICAL_UNAVAILABLE.to_string(),
        strategic: STRATEGIC_UNAVAILABLE.to_string(),
        synthesis: SYNTHESIS_UNAVAILABLE.to_string(),
    };
    (per_task, synthesis)
}
