//! # Stage: Model Routing
//!
//! ## Responsibility
//! Choose between the CPU-oriented and the GPU-oriented backend model for
//! each request, from live telemetry and the prompt's word count, and
//! explain the choice in a human-readable reason.
//!
//! ## Guarantees
//! - Deterministic: the same snapshot, prompt, mode and override always
//!   produce the same decision
//! - Total: every input yields a decision; there are no error paths
//! - Ordered: explicit model, then forced mode, then adaptive rules (a)–(e);
//!   the first match wins
//! - Auditable: every reason embeds the values that triggered its rule
//!
//! ## NOT Responsible For
//! - Sampling telemetry (that belongs to `telemetry`)
//! - Calling the backend (that belongs to `worker` / `orchestrator`)

pub mod config;
pub mod mode;
pub mod router;

// Re-exports for convenience
pub use config::RoutingConfig;
pub use mode::Mode;
pub use router::{Backend, ModelRouter, RoutingDecision, RoutingRule};
