//! Composite synthesis workflow
//!
//! The "two-analyst" task: a technical-evidence pass and a pattern/campaign
//! pass feed a final synthesis pass that reconciles them for the incident
//! owner. Modeled as an explicit state machine so partial failure has one
//! obvious answer per state: a failed early pass substitutes a placeholder
//! block and the workflow keeps going; a failed final pass substitutes a
//! manual-correlation notice. The workflow itself never errors.

use std::time::Duration;

use super::client::{Model, ReasoningClient, ReasoningError};
use super::parse::truncate_content;
use super::prompts;
use super::SynthesisOutcome;
use crate::incident::{AnalysisSettings, IncidentReport};

const MAX_LOG_CHARS: usize = 12_000;
/// Earlier passes are quoted into the final prompt; keep them bounded.
const MAX_PASS_CHARS: usize = 6_000;

pub const TECHNICAL_UNAVAILABLE: &str =
    "Technical evidence review unavailable; the raw logs require direct analyst review.";
pub const STRATEGIC_UNAVAILABLE: &str =
    "Campaign and pattern context review unavailable.";
pub const SYNTHESIS_UNAVAILABLE: &str =
    "Automated synthesis unavailable; manual correlation of the technical and strategic reviews is required.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisState {
    TechnicalPending,
    StrategicPending,
    Synthesizing,
    Done,
}

/// Drives the three passes in order. Construct, then `run()` (or `step()`
/// repeatedly in tests that care about intermediate states).
pub struct SynthesisWorkflow<'a> {
    client: &'a dyn ReasoningClient,
    incident: &'a IncidentReport,
    settings: &'a AnalysisSettings,
    call_timeout: Duration,
    state: SynthesisState,
    technical: Option<String>,
    strategic: Option<String>,
    synthesis: Option<String>,
}

impl<'a> SynthesisWorkflow<'a> {
    pub fn new(
        client: &'a dyn ReasoningClient,
        incident: &'a IncidentReport,
        settings: &'a AnalysisSettings,
        call_timeout: Duration,
    ) -> Self {
        Self {
            client,
            incident,
            settings,
            call_timeout,
            state: SynthesisState::TechnicalPending,
            technical: None,
            strategic: None,
            synthesis: None,
        }
    }

    pub fn state(&self) -> SynthesisState {
        self.state
    }

    async fn call(&self, model: Model, prompt: &str) -> Result<String, ReasoningError> {
        match tokio::time::timeout(self.call_timeout, self.client.generate(model.id(), prompt))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(ReasoningError::Timeout),
        }
    }

    fn evidence_block(&self) -> String {
        let mut block = format!(
            "INCIDENT: {}\n\nSYSTEM CONTEXT: {}\n\nLOG EXCERPT:\n{}\n",
            self.incident.title,
            self.incident
                .system_context
                .as_deref()
                .unwrap_or("not provided"),
            truncate_content(&self.incident.log_text, MAX_LOG_CHARS),
        );
        if let Some(extra) = self.incident.additional_logs.as_deref() {
            if !extra.trim().is_empty() {
                block.push_str(&format!(
                    "\nSUPPLEMENTARY LOGS:\n{}\n",
                    truncate_content(extra, MAX_LOG_CHARS)
                ));
            }
        }
        block
    }

    /// The final pass must see the analysis settings; the evidence passes
    /// only see the incident itself.
    fn final_prompt(&self, technical: &str, strategic: &str) -> String {
        format!(
            "{}\n\nANALYSIS SETTINGS:\n- confidence threshold: {}\n- analysis depth: {:?}\n- operator instructions: {}\n\nTECHNICAL REVIEW:\n{}\n\nSTRATEGIC REVIEW:\n{}\n",
            prompts::SYNTHESIS_FINAL_SYSTEM,
            self.settings.confidence_threshold,
            self.settings.analysis_depth,
            if self.settings.custom_instructions.trim().is_empty() {
                "none"
            } else {
                self.settings.custom_instructions.trim()
            },
            truncate_content(technical, MAX_PASS_CHARS),
            truncate_content(strategic, MAX_PASS_CHARS),
        )
    }

    /// Execute the pass the workflow is currently waiting on and advance.
    pub async fn step(&mut self) -> SynthesisState {
        match self.state {
            SynthesisState::TechnicalPending => {
                let prompt = format!(
                    "{}\n\n{}",
                    prompts::SYNTHESIS_TECHNICAL_SYSTEM,
                    self.evidence_block()
                );
                self.technical = Some(match self.call(Model::Balanced, &prompt).await {
                    Ok(text) => text,
                    Err(err) => {
                        tracing::warn!(error = %err, "technical synthesis pass failed");
                        TECHNICAL_UNAVAILABLE.to_string()
                    }
                });
                self.state = SynthesisState::StrategicPending;
            }
            SynthesisState::StrategicPending => {
                let prompt = format!(
                    "{}\n\n{}",
                    prompts::SYNTHESIS_STRATEGIC_SYSTEM,
                    self.evidence_block()
                );
                self.strategic = Some(match self.call(Model::Balanced, &prompt).await {
                    Ok(text) => text,
                    Err(err) => {
                        tracing::warn!(error = %err, "strategic synthesis pass failed");
                        STRATEGIC_UNAVAILABLE.to_string()
                    }
                });
                self.state = SynthesisState::Synthesizing;
            }
            SynthesisState::Synthesizing => {
                let technical = self.technical.clone().unwrap_or_default();
                let strategic = self.strategic.clone().unwrap_or_default();
                let prompt = self.final_prompt(&technical, &strategic);
                self.synthesis = Some(match self.call(Model::Smart, &prompt).await {
                    Ok(text) => text,
                    Err(err) => {
                        tracing::warn!(error = %err, "final synthesis pass failed");
                        SYNTHESIS_UNAVAILABLE.to_string()
                    }
                });
                self.state = SynthesisState::Done;
            }
            SynthesisState::Done => {}
        }
        self.state
    }

    /// Drive the workflow to completion. Always yields three blocks.
    pub async fn run(mut self) -> SynthesisOutcome {
        while self.state != SynthesisState::Done {
            self.step().await;
        }
        SynthesisOutcome {
            technical: self.technical.unwrap_or_else(|| TECHNICAL_UNAVAILABLE.to_string()),
            strategic: self.strategic.unwrap_or_else(|| STRATEGIC_UNAVAILABLE.to_string()),
            synthesis: self.synthesis.unwrap_or_else(|| SYNTHESIS_UNAVAILABLE.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Succeeds with a canned reply derived from the prompt's first line
    struct EchoClient;

    #[async_trait]
    impl ReasoningClient for EchoClient {
        async fn generate(&self, _model: &str, prompt: &str) -> Result<String, ReasoningError> {
            Ok(format!("reply to: {}", prompt.lines().next().unwrap_or("")))
        }
    }

    /// Fails only the final synthesis pass
    struct FailFinalClient;

    #[async_trait]
    impl ReasoningClient for FailFinalClient {
        async fn generate(&self, _model: &str, prompt: &str) -> Result<String, ReasoningError> {
            if prompt.contains("reconciling a technical review") {
                Err(ReasoningError::Service("final pass rejected".to_string()))
            } else {
                Ok("pass output".to_string())
            }
        }
    }

    /// Never resolves inside any sane timeout
    struct HangingClient;

    #[async_trait]
    impl ReasoningClient for HangingClient {
        async fn generate(&self, _model: &str, _prompt: &str) -> Result<String, ReasoningError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!("sleep above outlives every test timeout")
        }
    }

    fn incident() -> IncidentReport {
        IncidentReport::new("Beacon alert", "outbound connections every 60s")
    }

    #[tokio::test]
    async fn test_states_advance_in_order() {
        let incident = incident();
        let settings = AnalysisSettings::default();
        let mut workflow =
            SynthesisWorkflow::new(&EchoClient, &incident, &settings, Duration::from_secs(5));

        assert_eq!(workflow.state(), SynthesisState::TechnicalPending);
        assert_eq!(workflow.step().await, SynthesisState::StrategicPending);
        assert_eq!(workflow.step().await, SynthesisState::Synthesizing);
        assert_eq!(workflow.step().await, SynthesisState::Done);
        // Further steps are no-ops.
        assert_eq!(workflow.step().await, SynthesisState::Done);
    }

    #[tokio::test]
    async fn test_happy_path_produces_three_blocks() {
        let incident = incident();
        let settings = AnalysisSettings::default();
        let outcome =
            SynthesisWorkflow::new(&EchoClient, &incident, &settings, Duration::from_secs(5))
                .run()
                .await;
        assert!(outcome.technical.starts_with("reply to:"));
        assert!(outcome.strategic.starts_with("reply to:"));
        assert!(outcome.synthesis.starts_with("reply to:"));
    }

    #[tokio::test]
    async fn test_failed_final_pass_substitutes_notice() {
        let incident = incident();
        let settings = AnalysisSettings::default();
        let outcome =
            SynthesisWorkflow::new(&FailFinalClient, &incident, &settings, Duration::from_secs(5))
                .run()
                .await;
        assert_eq!(outcome.technical, "pass output");
        assert_eq!(outcome.strategic, "pass output");
        assert_eq!(outcome.synthesis, SYNTHESIS_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_hanging_client_yields_placeholders() {
        let incident = incident();
        let settings = AnalysisSettings::default();
        let outcome =
            SynthesisWorkflow::new(&HangingClient, &incident, &settings, Duration::from_millis(20))
                .run()
                .await;
        assert_eq!(outcome.technical, TECHNICAL_UNAVAILABLE);
        assert_eq!(outcome.strategic, STRATEGIC_UNAVAILABLE);
        assert_eq!(outcome.synthesis, SYNTHESIS_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_final_prompt_carries_settings() {
        let incident = incident();
        let settings = AnalysisSettings {
            confidence_threshold: 90,
            analysis_depth: crate::incident::AnalysisDepth::Deep,
            custom_instructions: "treat as regulated workload".to_string(),
        };
        let workflow =
            SynthesisWorkflow::new(&EchoClient, &incident, &settings, Duration::from_secs(5));
        let prompt = workflow.final_prompt("tech", "strat");
        assert!(prompt.contains("confidence threshold: 90"));
        assert!(prompt.contains("treat as regulated workload"));
        assert!(prompt.contains("TECHNICAL REVIEW:\ntech"));
    }
}
