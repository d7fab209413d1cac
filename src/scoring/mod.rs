//! 📊 Scoring pipeline
//!
//! Pure, synchronous stages executed in order per evaluation:
//! indicator interpolation → pillar aggregation → weight selection →
//! composite calculation → transmission multiplier. No stage performs I/O
//! or keeps state; per-entity memory lives in the momentum tracker.

pub mod composite;
pub mod indicator;
pub mod multiplier;
pub mod pillar;
pub mod weights;

pub use composite::{breach_penalty, compute};
pub use weights::{resolve_binding_constraint, select_weights, WeightProfile};
