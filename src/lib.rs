//! Arbiter library crate
//!
//! Exposes the analysis core so integration tests and embedding services
//! can run triage without going through CLI startup.

pub mod analysis;
pub mod config;
pub mod fallback;
pub mod incident;

pub use analysis::orchestrator::{analyze_offline, Orchestrator, OrchestratorConfig};
pub use analysis::{AgentRecord, AnalysisResult, Classification, PersistedAnalysis};
pub use fallback::{classify, ClassificationVerdict};
pub use incident::{AnalysisDepth, AnalysisSettings, IncidentReport, ThreatIntelReport};
