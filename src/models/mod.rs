//! Data models for gitstore

pub mod commit;
pub mod diff;
pub mod graph;
pub mod status;

pub use commit::*;
pub use diff::*;
pub use graph::*;
pub use status::*;
