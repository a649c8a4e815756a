//! Commit graph models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Render-ready multi-branch commit graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitGraphModel {
    /// Mermaid `gitGraph` program
    pub diagram: String,
    /// Branch name to diagram alias; no two branches share an alias
    pub branch_aliases: BTreeMap<String, String>,
    pub branch_count: usize,
    pub commit_count: usize,
    pub depth: usize,
    pub generated_at: DateTime<Utc>,
}

/// One instruction of the synthetic graph program
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "op")]
pub enum GraphInstruction {
    Commit { id: String, tag: String },
    Branch { alias: String },
    Checkout { alias: String },
    Merge { source: String, id: String, tag: String },
    Comment { text: String },
}

impl fmt::Display for GraphInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphInstruction::Commit { id, tag } => {
                write!(f, "commit id: \"{}\" tag: \"{}\"", id, tag)
            }
            GraphInstruction::Branch { alias } => write!(f, "branch {}", alias),
            GraphInstruction::Checkout { alias } => write!(f, "checkout {}", alias),
            GraphInstruction::Merge { source, id, tag } => {
                write!(f, "merge {} id: \"{}\" tag: \"{}\"", source, id, tag)
            }
            GraphInstruction::Comment { text } => write!(f, "%% {}", text),
        }
    }
}

/// Render a program as Mermaid `gitGraph` text
pub fn render_diagram(instructions: &[GraphInstruction]) -> String {
    let mut diagram = String::from("gitGraph\n");
    for instruction in instructions {
        diagram.push_str("    ");
        diagram.push_str(&instruction.to_string());
        diagram.push('\n');
    }
    diagram
}

/// Placeholder program for a repository with nothing to draw
pub fn placeholder_diagram(reason: &str) -> String {
    render_diagram(&[GraphInstruction::Comment {
        text: reason.to_string(),
    }])
}
