//! Graph-level checks and the adjacency index shared by the validator and
//! the executor.
//!
//! Node and edge arrays are the source of truth; the index below is
//! recomputed at load time rather than persisted, matching the design note
//! that loop semantics are interpreted by the dispatcher rather than by a
//! plain topological sort.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::models::{Dag, Edge, Node, NodeKind};
use crate::EngineError;

/// Read-only adjacency index over a [`Dag`].
pub struct DagIndex<'a> {
    dag: &'a Dag,
    by_id: HashMap<&'a str, &'a Node>,
    out_edges: HashMap<&'a str, Vec<&'a Edge>>,
    in_edges: HashMap<&'a str, Vec<&'a Edge>>,
}

impl<'a> DagIndex<'a> {
    /// Build the index, checking id uniqueness and edge endpoint validity.
    pub fn build(dag: &'a Dag) -> Result<Self, EngineError> {
        let mut by_id = HashMap::new();
        for node in &dag.nodes {
            if by_id.insert(node.id.as_str(), node).is_some() {
                return Err(EngineError::DuplicateNodeId(node.id.clone()));
            }
        }

        let mut out_edges: HashMap<&str, Vec<&Edge>> = HashMap::new();
        let mut in_edges: HashMap<&str, Vec<&Edge>> = HashMap::new();
        for edge in &dag.edges {
            if !by_id.contains_key(edge.source.as_str()) {
                return Err(EngineError::UnknownNodeReference {
                    node_id: edge.source.clone(),
                    side: "source",
                });
            }
            if !by_id.contains_key(edge.target.as_str()) {
                return Err(EngineError::UnknownNodeReference {
                    node_id: edge.target.clone(),
                    side: "target",
                });
            }
            out_edges.entry(edge.source.as_str()).or_default().push(edge);
            in_edges.entry(edge.target.as_str()).or_default().push(edge);
        }

        Ok(Self { dag, by_id, out_edges, in_edges })
    }

    pub fn node(&self, id: &str) -> Option<&'a Node> {
        self.by_id.get(id).copied()
    }

    pub fn out_edges(&self, id: &str) -> &[&'a Edge] {
        self.out_edges.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn in_edges(&self, id: &str) -> &[&'a Edge] {
        self.in_edges.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn in_degree(&self, id: &str) -> usize {
        self.in_edges(id).len()
    }

    pub fn triggers(&self) -> impl Iterator<Item = &'a Node> + '_ {
        self.dag
            .nodes
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::Trigger(_)))
    }

    fn is_loop(&self, id: &str) -> bool {
        matches!(
            self.by_id.get(id).map(|n| &n.kind),
            Some(NodeKind::LoopWhile(_)) | Some(NodeKind::LoopForeach(_))
        )
    }

    /// Node ids reachable by forward traversal from any trigger node.
    pub fn reachable_from_triggers(&self) -> HashSet<&'a str> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = self.triggers().map(|n| n.id.as_str()).collect();
        for id in &queue {
            visited.insert(id);
        }
        while let Some(id) = queue.pop_front() {
            for edge in self.out_edges(id) {
                if visited.insert(edge.target.as_str()) {
                    queue.push_back(edge.target.as_str());
                }
            }
        }
        visited
    }

    /// `true` iff the graph has a cycle that isn't explained by a loop
    /// node's declared back-edge (any edge whose target is a `loop_while` /
    /// `loop_foreach` node is, by construction, the only kind of back-edge
    /// the format allows — see the spec's design notes).
    pub fn has_unintended_cycle(&self) -> bool {
        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();

        for node in &self.dag.nodes {
            in_degree.entry(node.id.as_str()).or_insert(0);
            adjacency.entry(node.id.as_str()).or_default();
        }

        for edge in &self.dag.edges {
            if self.is_loop(edge.target.as_str()) {
                continue; // declared loop back-edge, excluded from the acyclic check
            }
            adjacency.entry(edge.source.as_str()).or_default().push(edge.target.as_str());
            *in_degree.entry(edge.target.as_str()).or_insert(0) += 1;
        }

        let mut queue: VecDeque<&str> = in_degree
            .iter()
            .filter(|(_, &d)| d == 0)
            .map(|(&id, _)| id)
            .collect();
        let mut visited = 0usize;

        while let Some(id) = queue.pop_front() {
            visited += 1;
            if let Some(neighbours) = adjacency.get(id) {
                for &next in neighbours {
                    let deg = in_degree.entry(next).or_insert(0);
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(next);
                    }
                }
            }
        }

        visited != self.dag.nodes.len()
    }
}

/// Full structural validation: unique ids, valid edge endpoints, at least one
/// trigger, every non-trigger node reachable from a trigger, and no
/// unintended cycles.
pub fn validate_graph(dag: &Dag) -> Result<(), EngineError> {
    let index = DagIndex::build(dag)?;

    if index.triggers().next().is_none() {
        return Err(EngineError::NoTrigger);
    }

    let reachable = index.reachable_from_triggers();
    for node in &dag.nodes {
        if !matches!(node.kind, NodeKind::Trigger(_)) && !reachable.contains(node.id.as_str()) {
            return Err(EngineError::UnreachableNode(node.id.clone()));
        }
    }

    if index.has_unintended_cycle() {
        return Err(EngineError::CycleDetected);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::*;

    fn trigger(id: &str) -> Node {
        Node {
            id: id.into(),
            kind: NodeKind::Trigger(TriggerData {
                kind: TriggerKind::ScheduleBased,
                toolkit_slug: "cron".into(),
                composio_trigger_slug: None,
                connection_id: None,
                filter: None,
                cron_expr: Some("0 * * * *".into()),
                timezone: Some("UTC".into()),
            }),
        }
    }

    fn action(id: &str) -> Node {
        Node {
            id: id.into(),
            kind: NodeKind::Action(ActionData {
                tool: "slack".into(),
                action: "send_message".into(),
                connection_id: "conn1".into(),
                input_template: serde_json::json!({}),
                output_vars: vec![],
                retry: None,
                timeout_ms: None,
            }),
        }
    }

    fn edge(id: &str, source: &str, target: &str) -> Edge {
        Edge { id: id.into(), source: source.into(), target: target.into(), when: EdgeWhen::Always, condition: None }
    }

    fn dag(nodes: Vec<Node>, edges: Vec<Edge>) -> Dag {
        Dag { workflow_id: "wf".into(), version: 1, nodes, edges, globals: Globals::default() }
    }

    #[test]
    fn linear_dag_is_valid() {
        let d = dag(
            vec![trigger("t"), action("a1"), action("a2")],
            vec![edge("e1", "t", "a1"), edge("e2", "a1", "a2")],
        );
        assert!(validate_graph(&d).is_ok());
    }

    #[test]
    fn missing_trigger_is_rejected() {
        let d = dag(vec![action("a1")], vec![]);
        assert!(matches!(validate_graph(&d), Err(EngineError::NoTrigger)));
    }

    #[test]
    fn unreachable_node_is_rejected() {
        let d = dag(vec![trigger("t"), action("a1"), action("orphan")], vec![edge("e1", "t", "a1")]);
        assert!(matches!(validate_graph(&d), Err(EngineError::UnreachableNode(id)) if id == "orphan"));
    }

    #[test]
    fn unintended_cycle_is_rejected() {
        let d = dag(
            vec![trigger("t"), action("a"), action("b")],
            vec![edge("e1", "t", "a"), edge("e2", "a", "b"), edge("e3", "b", "a")],
        );
        assert!(matches!(validate_graph(&d), Err(EngineError::CycleDetected)));
    }

    #[test]
    fn loop_back_edge_is_not_a_cycle() {
        let loop_node = Node {
            id: "loop".into(),
            kind: NodeKind::LoopWhile(LoopWhileData {
                condition: "vars.done == false".into(),
                body_start: "body".into(),
                max_iterations: 10,
            }),
        };
        let d = dag(
            vec![trigger("t"), loop_node, action("body")],
            vec![
                edge("e1", "t", "loop"),
                edge("e2", "loop", "body"),
                edge("e3", "body", "loop"), // declared back-edge
            ],
        );
        assert!(validate_graph(&d).is_ok());
    }
}
