// src/lib.rs

// Import the top-level `skymarshal` module.
pub mod skymarshal;

// Re-exporting key items for easier external access.
pub use skymarshal::agents::Agent;
pub use skymarshal::arbitrator::Arbitrator;
pub use skymarshal::config::SkymarshalConfig;
pub use skymarshal::model::{AgentKind, AgentName, AgentResponse, Collation, Phase};
pub use skymarshal::orchestrator::{OrchestrationError, PhaseOrchestrator};
pub use skymarshal::report::generate_decision_report;
