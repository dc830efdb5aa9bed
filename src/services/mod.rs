//! Orchestration and scoring core
//!
//! Strictly layered: the supervisor wraps single analyzer calls, the
//! orchestrator fans supervised calls out per submission, the normalizer
//! and aggregator are pure functions over the outcomes, and the
//! assembler formats the result for the wire.

pub mod aggregator;
pub mod assembler;
pub mod normalizer;
pub mod orchestrator;
pub mod supervisor;
