//! Reconciliation operations over backend and filesystem primitives

pub mod diff;
pub mod graph;
pub mod status;
pub mod validation;

pub use diff::{build_diff_payload, select_entries};
pub use graph::{plan_graph, reconstruct_graph, BranchLog, GraphPlan};
pub use status::{build_status_entries, classify_row, interpret, summarize};
