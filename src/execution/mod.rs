//! Grouping, scheduling and parallel chunk evaluation.

pub mod cancel;
pub mod group;
pub mod system;

pub use cancel::CancellationToken;
pub use group::{ExecutionGroup, GroupId, GroupOutcome, split_chunks};
pub use system::{ExecutionOutcome, ExecutionSystem, RenderOutputs, RunStats};
