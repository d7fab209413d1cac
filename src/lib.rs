// Absorption Engine
// Scores how much stress a market can absorb before transmission amplifies

pub mod config;
pub mod errors;
pub mod evaluator;
pub mod momentum_tracker;
pub mod report_log;
pub mod scoring;
pub mod types;

pub use config::EngineConfig;
pub use errors::EngineError;
pub use evaluator::Evaluator;
pub use momentum_tracker::MomentumTracker;
