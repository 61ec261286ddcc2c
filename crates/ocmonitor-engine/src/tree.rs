use chrono::{DateTime, Utc};
use ocmonitor_types::SessionRecord;
use serde::Serialize;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

/// One session with its sub-agents, children ordered by creation time.
///
/// Sub-agent chains can nest arbitrarily deep, so walking, cloning and
/// dropping a node use an explicit stack instead of recursion.
#[derive(Debug, PartialEq, Serialize)]
pub struct WorkflowNode {
    pub session: SessionRecord,
    pub children: Vec<WorkflowNode>,
}

impl WorkflowNode {
    /// This node and every descendant, depth-first, children in order
    pub fn walk(&self) -> Vec<(&WorkflowNode, usize)> {
        let mut out = Vec::new();
        let mut stack = vec![(self, 0)];
        while let Some((node, depth)) = stack.pop() {
            out.push((node, depth));
            stack.extend(node.children.iter().rev().map(|c| (c, depth + 1)));
        }
        out
    }

    /// Nesting depth below this node (0 for a leaf)
    pub fn depth(&self) -> usize {
        self.walk().into_iter().map(|(_, d)| d).max().unwrap_or(0)
    }
}

impl Clone for WorkflowNode {
    fn clone(&self) -> Self {
        assemble(self, |node| node.children.iter(), |node| node.session.clone())
    }
}

impl Drop for WorkflowNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

/// A root session plus the transitive closure of its descendants
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Workflow {
    pub root: WorkflowNode,
}

impl Workflow {
    pub fn id(&self) -> &str {
        &self.root.session.id
    }

    pub fn root_session(&self) -> &SessionRecord {
        &self.root.session
    }

    /// Every session in the workflow, root first, depth-first
    pub fn sessions(&self) -> Vec<&SessionRecord> {
        self.root.walk().into_iter().map(|(node, _)| &node.session).collect()
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.sessions().into_iter().map(|s| s.id.clone()).collect()
    }

    pub fn sub_agent_count(&self) -> usize {
        self.sessions().len().saturating_sub(1)
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions().iter().any(|s| s.id == session_id)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.root.session.created_at
    }
}

/// A parent cycle found while assembling workflows.
///
/// `ids` are the sessions on the cycle itself; `excluded` is every session
/// left out of the forest because of it (cycle members and their descendants).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleDetected {
    pub ids: Vec<String>,
    pub excluded: Vec<String>,
}

impl fmt::Display for CycleDetected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parent cycle among sessions: {}", self.ids.join(", "))
    }
}

/// Result of assembling session records
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionForest {
    /// Newest root first
    pub workflows: Vec<Workflow>,
    /// Sessions whose parent id did not resolve; each is a root in `workflows`
    pub orphans: Vec<String>,
    pub cycles: Vec<CycleDetected>,
}

impl SessionForest {
    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }

    pub fn session_count(&self) -> usize {
        self.workflows.iter().map(|w| w.sessions().len()).sum()
    }

    /// Workflow whose root has this id
    pub fn get(&self, root_id: &str) -> Option<&Workflow> {
        self.workflows.iter().find(|w| w.id() == root_id)
    }

    /// Workflow containing this session anywhere in its tree
    pub fn find_workflow(&self, session_id: &str) -> Option<&Workflow> {
        self.workflows.iter().find(|w| w.contains(session_id))
    }

    /// Most recently created root
    pub fn latest(&self) -> Option<&Workflow> {
        self.workflows.first()
    }
}

#[derive(Debug, Clone, Copy)]
enum Status {
    Rooted,
    Cyclic(usize),
}

/// Assembles flat session records into workflows.
///
/// The result depends only on the set of records, not their order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionTreeBuilder;

impl SessionTreeBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build(&self, sessions: &[SessionRecord]) -> SessionForest {
        let index = index_by_id(sessions);

        let mut orphans = Vec::new();
        let mut parent_of: HashMap<&str, &str> = HashMap::with_capacity(index.len());
        for (&id, record) in &index {
            let Some(parent) = record.parent_id.as_deref() else {
                continue;
            };
            if index.contains_key(parent) {
                parent_of.insert(id, parent);
            } else {
                tracing::warn!(session_id = id, parent_id = parent, "parent session not found, treating as root");
                orphans.push(id.to_string());
            }
        }

        let (status, cycles) = classify(&index, &parent_of);

        let mut children: HashMap<&str, Vec<&SessionRecord>> = HashMap::new();
        let mut roots: Vec<&SessionRecord> = Vec::new();
        for (&id, &record) in &index {
            if !matches!(status.get(id), Some(Status::Rooted)) {
                continue;
            }
            match parent_of.get(id) {
                Some(&parent) => children.entry(parent).or_default().push(record),
                None => roots.push(record),
            }
        }

        for kids in children.values_mut() {
            kids.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        }
        roots.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));

        let workflows = roots
            .into_iter()
            .map(|root| Workflow {
                root: assemble(
                    root,
                    |record| {
                        children
                            .get(record.id.as_str())
                            .into_iter()
                            .flatten()
                            .copied()
                    },
                    |record| record.clone(),
                ),
            })
            .collect();

        SessionForest {
            workflows,
            orphans,
            cycles,
        }
    }
}

/// One record per id. Duplicates keep the earliest record so that input order
/// never decides which one survives.
fn index_by_id(sessions: &[SessionRecord]) -> BTreeMap<&str, &SessionRecord> {
    let mut index: BTreeMap<&str, &SessionRecord> = BTreeMap::new();
    for session in sessions {
        match index.entry(session.id.as_str()) {
            Entry::Vacant(slot) => {
                slot.insert(session);
            }
            Entry::Occupied(mut slot) => {
                tracing::warn!(session_id = %session.id, "duplicate session id, keeping earliest record");
                if precedence_key(session) < precedence_key(slot.get()) {
                    slot.insert(session);
                }
            }
        }
    }
    index
}

fn precedence_key(s: &SessionRecord) -> (DateTime<Utc>, Option<&str>, Option<&str>) {
    (s.created_at, s.parent_id.as_deref(), s.project_path.as_deref())
}

/// Walk every node's ancestor chain once. A chain either ends at a root
/// (Rooted) or revisits a node already on the current path (a cycle); nodes
/// that lead into a cycle share its fate. Each node is walked at most once, so
/// the total work is bounded by the node count.
fn classify<'a>(
    index: &BTreeMap<&'a str, &'a SessionRecord>,
    parent_of: &HashMap<&'a str, &'a str>,
) -> (HashMap<&'a str, Status>, Vec<CycleDetected>) {
    let mut status: HashMap<&str, Status> = HashMap::with_capacity(index.len());
    let mut cycles: Vec<CycleDetected> = Vec::new();

    for &start in index.keys() {
        if status.contains_key(start) {
            continue;
        }

        let mut path: Vec<&str> = Vec::new();
        let mut on_path: HashSet<&str> = HashSet::new();
        let mut current = start;

        let outcome = loop {
            if let Some(&known) = status.get(current) {
                break known;
            }
            if !on_path.insert(current) {
                let from = path.iter().position(|id| *id == current).unwrap_or(0);
                let mut ids: Vec<String> = path[from..].iter().map(|id| id.to_string()).collect();
                ids.sort();
                cycles.push(CycleDetected {
                    ids,
                    excluded: Vec::new(),
                });
                break Status::Cyclic(cycles.len() - 1);
            }
            path.push(current);
            match parent_of.get(current) {
                Some(&parent) => current = parent,
                None => break Status::Rooted,
            }
        };

        for id in path {
            status.insert(id, outcome);
        }
    }

    for &id in index.keys() {
        if let Some(Status::Cyclic(idx)) = status.get(id) {
            cycles[*idx].excluded.push(id.to_string());
        }
    }
    for cycle in &cycles {
        tracing::warn!(
            ids = ?cycle.ids,
            excluded = cycle.excluded.len(),
            "parent cycle detected, excluding affected sessions"
        );
    }

    (status, cycles)
}

/// Build a node tree from any tree-shaped source without recursion. `kids`
/// yields a value's children in display order.
fn assemble<'a, T, I>(
    root: &'a T,
    kids: impl Fn(&'a T) -> I,
    session: impl Fn(&'a T) -> SessionRecord,
) -> WorkflowNode
where
    I: DoubleEndedIterator<Item = &'a T>,
{
    // Pre-order listing; each entry keeps its parent's position
    let mut order: Vec<(&'a T, usize)> = Vec::new();
    let mut pending = vec![(root, 0)];
    while let Some((item, parent)) = pending.pop() {
        let pos = order.len();
        order.push((item, parent));
        pending.extend(kids(item).rev().map(|kid| (kid, pos)));
    }

    // Descendants sit after their ancestors, so building in reverse finishes
    // every child before its parent
    let mut built: Vec<Vec<WorkflowNode>> = (0..order.len()).map(|_| Vec::new()).collect();
    for pos in (1..order.len()).rev() {
        let (item, parent) = order[pos];
        let mut children = std::mem::take(&mut built[pos]);
        children.reverse();
        built[parent].push(WorkflowNode {
            session: session(item),
            children,
        });
    }

    let mut children = built.into_iter().next().unwrap_or_default();
    children.reverse();
    WorkflowNode {
        session: session(root),
        children,
    }
}
