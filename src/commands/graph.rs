//! Commit graph reconstruction
//!
//! Turns per-branch ancestry logs into a deterministic topological order, a
//! branch owner for every commit, and a Mermaid `gitGraph` program. All
//! decisions iterate over the priority-ordered logs, never over hash maps.

use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::models::{
    placeholder_diagram, render_diagram, CommitEntry, CommitGraphModel, GraphInstruction,
};
use crate::services::backend::VcsBackend;

pub const MIN_GRAPH_DEPTH: usize = 1;
pub const MAX_GRAPH_DEPTH: usize = 500;

const EMPTY_GRAPH_NOTE: &str = "No commits to display";

/// Ancestry of one branch tip, newest first
#[derive(Debug, Clone)]
pub struct BranchLog {
    pub name: String,
    pub commits: Vec<CommitEntry>,
}

/// Everything the reconstructor decided for one set of logs
#[derive(Debug, Clone, Default)]
pub struct GraphPlan {
    /// Commit ids, parents before children
    pub order: Vec<String>,
    /// Commit id to owning branch name
    pub owners: HashMap<String, String>,
    /// Branch name to diagram alias
    pub aliases: BTreeMap<String, String>,
    pub instructions: Vec<GraphInstruction>,
}

pub fn clamp_depth(depth: usize) -> usize {
    depth.clamp(MIN_GRAPH_DEPTH, MAX_GRAPH_DEPTH)
}

/// Current branch first, then the remaining branches in listing order
pub fn prioritize_branches(current: Option<String>, listed: Vec<String>) -> Vec<String> {
    let mut ordered = Vec::with_capacity(listed.len() + 1);
    if let Some(current) = current {
        ordered.push(current);
    }
    for name in listed {
        if !ordered.contains(&name) {
            ordered.push(name);
        }
    }
    ordered
}

/// Fetch every branch log and build the render-ready graph model
pub async fn reconstruct_graph(
    backend: &dyn VcsBackend,
    depth: usize,
    config: &EngineConfig,
) -> Result<CommitGraphModel> {
    let depth = clamp_depth(depth);
    let current = backend.resolve_current_branch().await?;
    let branches = prioritize_branches(current, backend.list_branches().await?);

    let mut logs = Vec::with_capacity(branches.len());
    for name in branches {
        match backend.log(&name, depth).await {
            Ok(commits) => logs.push(BranchLog { name, commits }),
            Err(e) if e.is_not_found() => {
                tracing::warn!("Skipping branch {} in graph: {}", name, e);
            }
            Err(e) => return Err(e),
        }
    }

    let plan = plan_graph(&logs, config);
    let diagram = if plan.order.is_empty() {
        placeholder_diagram(EMPTY_GRAPH_NOTE)
    } else {
        render_diagram(&plan.instructions)
    };

    tracing::debug!(
        "Reconstructed graph: {} commits across {} branches (depth {})",
        plan.order.len(),
        plan.aliases.len(),
        depth
    );

    Ok(CommitGraphModel {
        diagram,
        branch_count: plan.aliases.len(),
        commit_count: plan.order.len(),
        branch_aliases: plan.aliases,
        depth,
        generated_at: Utc::now(),
    })
}

/// Plan the graph for logs given in priority order
pub fn plan_graph(logs: &[BranchLog], config: &EngineConfig) -> GraphPlan {
    let mut table: HashMap<&str, &CommitEntry> = HashMap::new();
    for log in logs {
        for commit in &log.commits {
            table.entry(commit.oid.as_str()).or_insert(commit);
        }
    }
    if table.is_empty() {
        return GraphPlan::default();
    }

    let owners = assign_owners(logs);
    let order = topological_order(logs, &table);

    let mut program = ProgramBuilder::new(logs, config);
    for oid in &order {
        if let Some(commit) = table.get(oid) {
            program.emit(commit, &table, &owners);
        }
    }

    GraphPlan {
        owners: order
            .iter()
            .map(|oid| {
                let owner = owner_of(&owners, oid);
                (oid.to_string(), logs[owner].name.clone())
            })
            .collect(),
        order: order.into_iter().map(str::to_string).collect(),
        aliases: program.aliases,
        instructions: program.instructions,
    }
}

/// Each commit belongs to the highest-priority branch whose log contains it
fn assign_owners(logs: &[BranchLog]) -> HashMap<&str, usize> {
    let mut owners = HashMap::new();
    for (index, log) in logs.iter().enumerate() {
        for commit in log.commits.iter().rev() {
            owners.entry(commit.oid.as_str()).or_insert(index);
        }
    }
    owners
}

/// Owner index, falling back to the priority-first branch
fn owner_of(owners: &HashMap<&str, usize>, oid: &str) -> usize {
    owners.get(oid).copied().unwrap_or(0)
}

/// Parents restricted to the collected table, in parent order
fn tracked_parents<'a>(
    commit: &'a CommitEntry,
    table: &HashMap<&str, &CommitEntry>,
) -> Vec<&'a str> {
    commit
        .parents
        .iter()
        .map(String::as_str)
        .filter(|parent| table.contains_key(parent))
        .collect()
}

/// Post-order DFS from each tip in priority order, then a sweep for the rest
fn topological_order<'a>(
    logs: &'a [BranchLog],
    table: &HashMap<&'a str, &'a CommitEntry>,
) -> Vec<&'a str> {
    let mut order = Vec::with_capacity(table.len());
    let mut visited: HashSet<&str> = HashSet::with_capacity(table.len());

    let tips = logs.iter().filter_map(|log| log.commits.first());
    let rest = logs.iter().flat_map(|log| log.commits.iter());

    for start in tips.chain(rest) {
        if visited.contains(start.oid.as_str()) {
            continue;
        }

        let mut stack: Vec<(&str, bool)> = vec![(start.oid.as_str(), false)];
        while let Some((oid, expanded)) = stack.pop() {
            if expanded {
                order.push(oid);
                continue;
            }
            if !visited.insert(oid) {
                continue;
            }
            stack.push((oid, true));

            let Some(&commit) = table.get(oid) else {
                continue;
            };
            // Reversed so the first parent is finished first
            for parent in tracked_parents(commit, table).into_iter().rev() {
                if !visited.contains(parent) {
                    stack.push((parent, false));
                }
            }
        }
    }

    order
}

/// Replace characters that break a quoted gitGraph tag and bound its length
pub fn escape_tag(message: &str, max_length: usize) -> String {
    let cleaned: String = message
        .chars()
        .map(|c| match c {
            '"' => '\'',
            c if c.is_control() => ' ',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_length {
        return cleaned.to_string();
    }
    if max_length <= 3 {
        return cleaned.chars().take(max_length).collect();
    }
    let kept: String = cleaned.chars().take(max_length.saturating_sub(3)).collect();
    format!("{}...", kept.trim_end())
}

/// Diagram-safe alias: ASCII alphanumerics and underscores, starting with a letter
pub fn sanitize_alias(name: &str) -> String {
    let alias: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    match alias.chars().next() {
        Some(first) if first.is_ascii_alphabetic() => alias,
        _ => format!("b_{}", alias),
    }
}

struct ProgramBuilder<'a> {
    logs: &'a [BranchLog],
    main_alias: String,
    tag_max_length: usize,
    aliases: BTreeMap<String, String>,
    alias_by_branch: HashMap<usize, String>,
    taken: HashSet<String>,
    created: HashSet<usize>,
    active: usize,
    instructions: Vec<GraphInstruction>,
}

impl<'a> ProgramBuilder<'a> {
    fn new(logs: &'a [BranchLog], config: &EngineConfig) -> Self {
        let main_alias = sanitize_alias(&config.main_alias);
        let mut taken = HashSet::new();
        taken.insert(main_alias.clone());

        Self {
            logs,
            main_alias,
            tag_max_length: config.tag_max_length,
            aliases: BTreeMap::new(),
            alias_by_branch: HashMap::new(),
            taken,
            // The diagram starts on the priority-first branch
            created: HashSet::from([0]),
            active: 0,
            instructions: Vec::new(),
        }
    }

    /// Alias of a branch, assigned the first time it is referenced
    fn alias(&mut self, branch: usize) -> String {
        if let Some(alias) = self.alias_by_branch.get(&branch) {
            return alias.clone();
        }

        let alias = if branch == 0 {
            self.main_alias.clone()
        } else {
            let base = sanitize_alias(&self.logs[branch].name);
            let mut candidate = base.clone();
            let mut suffix = 2;
            while self.taken.contains(&candidate) {
                candidate = format!("{}_{}", base, suffix);
                suffix += 1;
            }
            self.taken.insert(candidate.clone());
            candidate
        };

        self.alias_by_branch.insert(branch, alias.clone());
        self.aliases
            .insert(self.logs[branch].name.clone(), alias.clone());
        alias
    }

    fn checkout(&mut self, branch: usize) {
        let alias = self.alias(branch);
        self.instructions.push(GraphInstruction::Checkout { alias });
        self.active = branch;
    }

    fn emit(
        &mut self,
        commit: &CommitEntry,
        table: &HashMap<&str, &CommitEntry>,
        owners: &HashMap<&str, usize>,
    ) {
        let owner = owner_of(owners, &commit.oid);
        let parents = tracked_parents(commit, table);
        let fresh = !self.created.contains(&owner);

        if fresh {
            let root = parents
                .first()
                .map(|parent| owner_of(owners, parent))
                .unwrap_or(0);
            if self.active != root {
                self.checkout(root);
            }
            let alias = self.alias(owner);
            self.instructions.push(GraphInstruction::Branch { alias });
            self.created.insert(owner);
            self.checkout(owner);
        } else if self.active != owner {
            self.checkout(owner);
        }

        let target = self.alias(owner);
        let id = commit.short_id().to_string();
        let tag = escape_tag(&commit.message, self.tag_max_length);

        match parents.get(1) {
            Some(second) => {
                let source = owner_of(owners, second);
                if source == owner {
                    self.instructions.push(GraphInstruction::Commit { id, tag });
                    self.instructions.push(GraphInstruction::Comment {
                        text: format!(
                            "{} merges {} within {}",
                            commit.short_id(),
                            short(second),
                            target
                        ),
                    });
                } else {
                    let source = self.alias(source);
                    self.instructions
                        .push(GraphInstruction::Merge { source, id, tag });
                }

                if parents.len() > 2 {
                    let extra: Vec<&str> = parents[2..].iter().map(|p| short(p)).collect();
                    self.instructions.push(GraphInstruction::Comment {
                        text: format!(
                            "{} also merges {} (not drawn)",
                            commit.short_id(),
                            extra.join(", ")
                        ),
                    });
                }
            }
            None => self.instructions.push(GraphInstruction::Commit { id, tag }),
        }

        // A branch that already exists cannot be re-rooted, so the edge from a
        // first parent drawn on another branch is lost (e.g. the main branch
        // when truncation hands its older history to a lower-priority branch)
        if let Some(first) = parents.first() {
            let parent_owner = owner_of(owners, first);
            if !fresh && parent_owner != owner {
                let parent_alias = self.alias(parent_owner);
                self.instructions.push(GraphInstruction::Comment {
                    text: format!(
                        "{} continues from {} on {} (not drawn)",
                        commit.short_id(),
                        short(first),
                        parent_alias
                    ),
                });
            }
        }
    }
}

fn short(oid: &str) -> &str {
    let end = oid
        .char_indices()
        .nth(crate::models::SHORT_ID_LEN)
        .map(|(idx, _)| idx)
        .unwrap_or(oid.len());
    &oid[..end]
}
