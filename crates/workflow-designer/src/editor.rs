//! Graph mutation core
//!
//! [`GraphEditor`] owns the node and edge collections and is the only place
//! that changes them. Every operation checks the structural rules before it
//! touches anything, so a rejected operation leaves the graph exactly as it
//! was.
//!
//! # Connection rules
//!
//! - A condition node connects from `rule-<index>` handles, one per valid
//!   persisted rule.
//! - A decision node connects from handles named after its branches.
//! - Every other kind has a single output and at most one outgoing edge.

use std::collections::HashMap;

use thiserror::Error;
use uuid::Uuid;

use crate::conditions::parse_rule_handle;
use crate::config::EditorConfig;
use crate::error::{DesignerError, Result};
use crate::palette::default_node_data;
use crate::types::{
    Edge, EdgeId, FormRef, Node, NodeData, NodeKind, Position, WorkflowGraph,
};

/// Why a connection attempt was refused
///
/// Rejections are not fatal: nothing in the graph changes and the caller
/// decides how to surface it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectRejection {
    #[error("Source node '{0}' does not exist")]
    UnknownSource(String),

    #[error("Target node '{0}' does not exist")]
    UnknownTarget(String),

    #[error("Edge '{0}' does not exist")]
    UnknownEdge(String),

    #[error("Node '{node_id}' has several outputs; a source handle is required")]
    MissingHandle { node_id: String },

    #[error("Condition node '{node_id}' has no valid rule for handle '{handle}'")]
    InvalidRuleHandle { node_id: String, handle: String },

    #[error("Decision node '{node_id}' has no branch named '{handle}'")]
    UnknownBranch { node_id: String, handle: String },

    #[error("Node '{node_id}' already has an outgoing connection")]
    FanOutExceeded { node_id: String },
}

/// Hands out edge id stamps that never repeat within a session
///
/// Uses the millisecond clock, bumped forward when two edges are created
/// within the same millisecond or when a loaded graph already carries a
/// later stamp.
#[derive(Debug, Default)]
struct EdgeClock {
    last: i64,
}

impl EdgeClock {
    fn next(&mut self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        self.last = now.max(self.last + 1);
        self.last
    }

    /// Move past every stamp found in the graph's generated edge ids
    fn observe(&mut self, graph: &WorkflowGraph) {
        let latest = graph.edges.iter().filter_map(|edge| edge_stamp(&edge.id)).max();
        if let Some(latest) = latest {
            self.last = self.last.max(latest);
        }
    }
}

/// Stamp suffix of an `e-...-<stamp>` edge id
fn edge_stamp(edge_id: &str) -> Option<i64> {
    let rest = edge_id.strip_prefix("e-")?;
    let (_, stamp) = rest.rsplit_once('-')?;
    stamp.parse().ok()
}

/// Owner of a workflow graph and its structural invariants
#[derive(Debug)]
pub struct GraphEditor {
    graph: WorkflowGraph,
    config: EditorConfig,
    clock: EdgeClock,
}

impl GraphEditor {
    /// Create an editor over an existing graph
    pub fn new(graph: WorkflowGraph, config: EditorConfig) -> Self {
        let mut clock = EdgeClock::default();
        clock.observe(&graph);
        Self { graph, config, clock }
    }

    pub fn graph(&self) -> &WorkflowGraph {
        &self.graph
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Mutable access for reconciliation passes inside the crate
    pub(crate) fn graph_mut(&mut self) -> &mut WorkflowGraph {
        &mut self.graph
    }

    /// Replace the whole graph (load, undo, redo)
    pub fn replace_graph(&mut self, graph: WorkflowGraph) {
        self.clock.observe(&graph);
        self.graph = graph;
    }

    /// Drop edges whose source or target node does not exist
    ///
    /// Returns the ids of the dropped edges.
    pub fn drop_dangling_edges(&mut self) -> Vec<EdgeId> {
        let graph = &self.graph;
        let dangling: Vec<EdgeId> = graph
            .edges
            .iter()
            .filter(|edge| {
                !graph.contains_node(&edge.source)
                    || edge
                        .target
                        .as_deref()
                        .is_some_and(|target| !graph.contains_node(target))
            })
            .map(|edge| edge.id.clone())
            .collect();

        if !dangling.is_empty() {
            log::warn!("Dropping {} dangling edge(s): {:?}", dangling.len(), dangling);
            self.graph.edges.retain(|edge| !dangling.contains(&edge.id));
        }
        dangling
    }

    /// Create a node with the kind's default data near `center`
    ///
    /// Consecutive nodes are staggered so they do not stack exactly on top
    /// of each other. A decision node gets a detached edge on each of its
    /// starting branches, the same as a branch added later.
    pub fn add_node(&mut self, kind: NodeKind, center: Position, seed_form: Option<&FormRef>) -> Node {
        let step = (self.graph.nodes.len() % self.config.stagger_cycle.max(1)) as f64;
        let offset = step * self.config.node_stagger;
        let position = Position::new(center.x + offset, center.y + offset);

        let id = format!("{}-{}", kind.as_str(), Uuid::new_v4().simple());
        let node = Node::new(id, default_node_data(kind, &self.config, seed_form), position);
        log::debug!("Added {} node '{}'", kind, node.id);
        self.graph.nodes.push(node.clone());
        if let NodeData::Decision(data) = node.data() {
            for branch in &data.conditions {
                self.add_placeholder_edge(&node.id, branch);
            }
        }
        node
    }

    /// Move a node on the canvas; false if the node does not exist
    pub fn move_node(&mut self, node_id: &str, position: Position) -> bool {
        match self.graph.find_node_mut(node_id) {
            Some(node) => {
                node.position = position;
                true
            }
            None => false,
        }
    }

    /// Check that `source` may gain an edge leaving from `handle`
    ///
    /// `moving` names an edge being re-attached, which does not count
    /// against the single-output limit.
    fn check_source(
        &self,
        source: &Node,
        handle: Option<&str>,
        moving: Option<&str>,
    ) -> std::result::Result<(), ConnectRejection> {
        match source.data() {
            NodeData::Condition(data) => {
                let handle = handle.ok_or_else(|| ConnectRejection::MissingHandle {
                    node_id: source.id.clone(),
                })?;
                let valid = parse_rule_handle(handle)
                    .and_then(|index| data.condition_rules.get(index))
                    .is_some_and(|rule| rule.is_valid());
                if !valid {
                    return Err(ConnectRejection::InvalidRuleHandle {
                        node_id: source.id.clone(),
                        handle: handle.to_string(),
                    });
                }
            }
            NodeData::Decision(data) => {
                let handle = handle.ok_or_else(|| ConnectRejection::MissingHandle {
                    node_id: source.id.clone(),
                })?;
                if !data.conditions.iter().any(|branch| branch == handle) {
                    return Err(ConnectRejection::UnknownBranch {
                        node_id: source.id.clone(),
                        handle: handle.to_string(),
                    });
                }
            }
            _ => {
                let taken = self
                    .graph
                    .outgoing_edges(&source.id)
                    .any(|edge| Some(edge.id.as_str()) != moving);
                if taken {
                    return Err(ConnectRejection::FanOutExceeded {
                        node_id: source.id.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Validate a connection without creating it
    pub fn can_connect(
        &self,
        source_id: &str,
        target_id: &str,
        source_handle: Option<&str>,
    ) -> std::result::Result<(), ConnectRejection> {
        let source = self
            .graph
            .find_node(source_id)
            .ok_or_else(|| ConnectRejection::UnknownSource(source_id.to_string()))?;
        if !self.graph.contains_node(target_id) {
            return Err(ConnectRejection::UnknownTarget(target_id.to_string()));
        }
        self.check_source(source, source_handle, None)
    }

    /// Handle stored on an edge leaving `source`; single-output kinds store none
    fn stored_handle(&self, source_id: &str, handle: Option<&str>) -> Option<String> {
        let branching = self
            .graph
            .find_node(source_id)
            .is_some_and(|node| node.kind().is_branching());
        if branching {
            handle.map(str::to_string)
        } else {
            None
        }
    }

    fn new_edge(&mut self, source: &str, handle: Option<String>, target: Option<String>) -> Edge {
        let id = loop {
            let id = format!(
                "e-{}-{}-{}-{}",
                source,
                handle.as_deref().unwrap_or(""),
                target.as_deref().unwrap_or(""),
                self.clock.next()
            );
            if self.graph.find_edge(&id).is_none() {
                break id;
            }
        };
        let defaults = &self.config.edges;
        Edge {
            id,
            source: source.to_string(),
            target,
            source_handle: handle,
            edge_type: defaults.edge_type.clone(),
            animated: defaults.animated,
            style: defaults.style.clone(),
            extra: Default::default(),
        }
    }

    /// Connect two nodes
    ///
    /// A detached edge already waiting on the same handle is attached to
    /// `target_id` instead of adding a second edge. On rejection no state
    /// changes and a warning is logged.
    pub fn connect(
        &mut self,
        source_id: &str,
        target_id: &str,
        source_handle: Option<&str>,
    ) -> std::result::Result<Edge, ConnectRejection> {
        if let Err(rejection) = self.can_connect(source_id, target_id, source_handle) {
            log::warn!("Connection {} -> {} rejected: {}", source_id, target_id, rejection);
            return Err(rejection);
        }

        let handle = self.stored_handle(source_id, source_handle);
        if handle.is_some() {
            let waiting = self.graph.edges.iter_mut().find(|edge| {
                edge.source == source_id && edge.source_handle == handle && edge.is_detached()
            });
            if let Some(edge) = waiting {
                edge.target = Some(target_id.to_string());
                log::debug!("Attached detached edge '{}' to {}", edge.id, target_id);
                return Ok(edge.clone());
            }
        }

        let edge = self.new_edge(source_id, handle, Some(target_id.to_string()));
        log::debug!("Connected {} -> {} as '{}'", source_id, target_id, edge.id);
        self.graph.edges.push(edge.clone());
        Ok(edge)
    }

    /// Re-attach an existing edge to a (possibly new) handle and target
    ///
    /// The edge keeps its id and source. The same rules as [`Self::connect`]
    /// apply, except that the edge itself does not count toward the
    /// single-output limit.
    pub fn reconnect_edge(
        &mut self,
        edge_id: &str,
        source_handle: Option<&str>,
        target_id: &str,
    ) -> std::result::Result<Edge, ConnectRejection> {
        let checked = self
            .graph
            .find_edge(edge_id)
            .ok_or_else(|| ConnectRejection::UnknownEdge(edge_id.to_string()))
            .and_then(|edge| {
                let source = self
                    .graph
                    .find_node(&edge.source)
                    .ok_or_else(|| ConnectRejection::UnknownSource(edge.source.clone()))?;
                if !self.graph.contains_node(target_id) {
                    return Err(ConnectRejection::UnknownTarget(target_id.to_string()));
                }
                self.check_source(source, source_handle, Some(edge_id))?;
                Ok(edge.source.clone())
            });
        let source_id = match checked {
            Ok(source_id) => source_id,
            Err(rejection) => {
                log::warn!("Reconnecting edge '{}' rejected: {}", edge_id, rejection);
                return Err(rejection);
            }
        };

        let handle = self.stored_handle(&source_id, source_handle);
        let edge = self
            .graph
            .edges
            .iter_mut()
            .find(|edge| edge.id == edge_id)
            .ok_or_else(|| ConnectRejection::UnknownEdge(edge_id.to_string()))?;
        edge.source_handle = handle;
        edge.target = Some(target_id.to_string());
        Ok(edge.clone())
    }

    /// Add an edge with no target leaving `handle` of a branching node
    pub(crate) fn add_placeholder_edge(&mut self, source_id: &str, handle: &str) -> Edge {
        let edge = self.new_edge(source_id, Some(handle.to_string()), None);
        self.graph.edges.push(edge.clone());
        edge
    }

    /// Remove detached edges still waiting on `handle` of a node
    pub(crate) fn drop_detached(&mut self, source_id: &str, handle: &str) -> usize {
        let before = self.graph.edges.len();
        self.graph.edges.retain(|edge| {
            !(edge.source == source_id && edge.is_detached() && edge.source_handle.as_deref() == Some(handle))
        });
        before - self.graph.edges.len()
    }

    /// Shallow-merge a JSON object into a node's data
    ///
    /// Returns false (and changes nothing) if the node does not exist or the
    /// merge leaves the data unchanged.
    pub fn update_node_data(&mut self, node_id: &str, patch: serde_json::Value) -> Result<bool> {
        let Some(node) = self.graph.find_node_mut(node_id) else {
            log::debug!("Ignoring data update for missing node '{}'", node_id);
            return Ok(false);
        };
        node.data_mut().merge_patch(node_id, patch)
    }

    /// Apply a typed change to a node's data
    ///
    /// The node kind cannot change; a closure that swaps the variant is
    /// undone and reported as an error.
    pub fn modify_node<F>(&mut self, node_id: &str, change: F) -> Result<bool>
    where
        F: FnOnce(&mut NodeData),
    {
        let Some(node) = self.graph.find_node_mut(node_id) else {
            log::debug!("Ignoring change for missing node '{}'", node_id);
            return Ok(false);
        };

        let before = node.data().clone();
        change(node.data_mut());
        if node.kind() != before.kind() {
            let kind = before.kind();
            *node.data_mut() = before;
            return Err(DesignerError::invalid_patch(
                node_id,
                format!("node kind '{}' cannot change", kind),
            ));
        }
        Ok(*node.data() != before)
    }

    /// Remove a node and every edge touching it
    pub fn delete_node(&mut self, node_id: &str) -> bool {
        let before = self.graph.nodes.len();
        self.graph.nodes.retain(|node| node.id != node_id);
        if self.graph.nodes.len() == before {
            log::debug!("Ignoring delete of missing node '{}'", node_id);
            return false;
        }
        self.graph.edges.retain(|edge| !edge.touches(node_id));
        log::debug!("Deleted node '{}'", node_id);
        true
    }

    /// Remove a single edge
    pub fn delete_edge(&mut self, edge_id: &str) -> bool {
        let before = self.graph.edges.len();
        self.graph.edges.retain(|edge| edge.id != edge_id);
        self.graph.edges.len() != before
    }

    /// Rewrite or detach the edges leaving a node's handles
    ///
    /// Edges whose handle is a key of `handle_map` move to the mapped
    /// handle. Edges on any other handle lose their target but stay in the
    /// graph so they can be reconnected. Returns true if any edge changed.
    pub(crate) fn remap_handles(&mut self, node_id: &str, handle_map: &HashMap<String, String>) -> bool {
        let mut changed = false;
        for edge in self.graph.edges.iter_mut().filter(|e| e.source == node_id) {
            let Some(handle) = edge.source_handle.as_deref() else {
                continue;
            };
            match handle_map.get(handle) {
                Some(mapped) if mapped == handle => {}
                Some(mapped) => {
                    edge.source_handle = Some(mapped.clone());
                    changed = true;
                }
                None if edge.target.is_some() => {
                    edge.target = None;
                    changed = true;
                }
                None => {}
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::WorkflowBuilder;
    use crate::conditions::{rule_handle, ConditionRule, Operator};
    use crate::schema::FieldType;
    use crate::types::{ConditionData, DecisionData, FillFormData, NodeData};

    fn valid_rule() -> ConditionRule {
        ConditionRule {
            field_id: "3".to_string(),
            field_label: "Days".to_string(),
            field_type: FieldType::Number,
            operator: Operator::GreaterThan,
            value: "10".to_string(),
        }
    }

    fn editor() -> GraphEditor {
        let graph = WorkflowBuilder::new()
            .add_node("s", NodeKind::Start, (0.0, 0.0))
            .add_node("f", NodeKind::FillForm, (0.0, 100.0))
            .add_node("e", NodeKind::End, (0.0, 400.0))
            .add_node_with_data(
                "c",
                NodeData::Condition(ConditionData {
                    condition_rules: vec![valid_rule(), ConditionRule::default()],
                    ..Default::default()
                }),
                (0.0, 200.0),
            )
            .add_node_with_data(
                "d",
                NodeData::Decision(DecisionData {
                    conditions: vec!["Yes".to_string(), "No".to_string()],
                    ..Default::default()
                }),
                (0.0, 300.0),
            )
            .build();
        GraphEditor::new(graph, EditorConfig::default())
    }

    #[test]
    fn test_add_node_uses_defaults() {
        let mut editor = GraphEditor::new(WorkflowGraph::new(), EditorConfig::default());
        let first = editor.add_node(NodeKind::AssignTask, Position::new(100.0, 50.0), None);
        let second = editor.add_node(NodeKind::AssignTask, Position::new(100.0, 50.0), None);

        assert_ne!(first.id, second.id);
        assert!(first.id.starts_with("assign-task-"));
        assert_eq!(first.data().label(), "Assign Task");
        assert_eq!(first.position, Position::new(100.0, 50.0));
        assert_eq!(second.position, Position::new(124.0, 74.0));
        assert_eq!(editor.graph().nodes.len(), 2);
    }

    #[test]
    fn test_single_fan_out() {
        let mut editor = editor();
        editor.connect("s", "f", None).unwrap();
        let rejected = editor.connect("s", "e", None).unwrap_err();
        assert_eq!(rejected, ConnectRejection::FanOutExceeded { node_id: "s".to_string() });
        assert_eq!(editor.graph().outgoing_edges("s").count(), 1);
    }

    #[test]
    fn test_single_output_drops_handle() {
        let mut editor = editor();
        let edge = editor.connect("f", "c", Some("whatever")).unwrap();
        assert!(edge.source_handle.is_none());
        assert!(edge.animated);
    }

    #[test]
    fn test_condition_handles() {
        let mut editor = editor();
        assert!(editor.connect("c", "e", Some(rule_handle(0).as_str())).is_ok());
        assert!(editor.connect("c", "d", Some(rule_handle(0).as_str())).is_ok());

        let before = editor.graph().clone();
        assert!(matches!(
            editor.connect("c", "e", Some(rule_handle(1).as_str())),
            Err(ConnectRejection::InvalidRuleHandle { .. })
        ));
        assert!(matches!(
            editor.connect("c", "e", Some(rule_handle(5).as_str())),
            Err(ConnectRejection::InvalidRuleHandle { .. })
        ));
        assert!(matches!(
            editor.connect("c", "e", None),
            Err(ConnectRejection::MissingHandle { .. })
        ));
        assert_eq!(editor.graph(), &before);
    }

    #[test]
    fn test_decision_handles() {
        let mut editor = editor();
        let edge = editor.connect("d", "e", Some("Yes")).unwrap();
        assert_eq!(edge.source_handle.as_deref(), Some("Yes"));
        assert!(editor.connect("d", "s", Some("No")).is_ok());
        assert!(matches!(
            editor.connect("d", "e", Some("Maybe")),
            Err(ConnectRejection::UnknownBranch { .. })
        ));
    }

    #[test]
    fn test_parallel_edges_get_unique_ids() {
        let mut editor = editor();
        let a = editor.connect("d", "e", Some("Yes")).unwrap();
        let b = editor.connect("d", "e", Some("Yes")).unwrap();
        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("e-d-Yes-e-"));
    }

    #[test]
    fn test_new_decision_waits_on_each_branch() {
        let mut editor = GraphEditor::new(WorkflowGraph::new(), EditorConfig::default());
        let decision = editor.add_node(NodeKind::Decision, Position::new(0.0, 0.0), None);
        let end = editor.add_node(NodeKind::End, Position::new(0.0, 200.0), None);

        let handles: Vec<_> = editor
            .graph()
            .outgoing_edges(&decision.id)
            .map(|edge| (edge.source_handle.clone(), edge.is_detached()))
            .collect();
        assert_eq!(
            handles,
            vec![(Some("Yes".to_string()), true), (Some("No".to_string()), true)]
        );

        let attached = editor.connect(&decision.id, &end.id, Some("Yes")).unwrap();
        assert_eq!(attached.target.as_deref(), Some(end.id.as_str()));
        assert_eq!(editor.graph().outgoing_edges(&decision.id).count(), 2);

        let parallel = editor.connect(&decision.id, &end.id, Some("Yes")).unwrap();
        assert_ne!(parallel.id, attached.id);
        assert_eq!(editor.graph().outgoing_edges(&decision.id).count(), 3);
    }

    #[test]
    fn test_edge_ids_stay_ahead_of_loaded_stamps() {
        let far_future = "e-d-Yes-e-99999999999999";
        let mut seed = editor();
        let mut loaded = seed.connect("d", "e", Some("Yes")).unwrap();
        loaded.id = far_future.to_string();
        let mut graph = seed.graph().clone();
        graph.edges = vec![loaded];
        let mut editor = GraphEditor::new(graph, EditorConfig::default());

        let edge = editor.connect("d", "e", Some("Yes")).unwrap();
        assert_eq!(edge.id, "e-d-Yes-e-100000000000000");
        assert_eq!(edge_stamp(far_future), Some(99999999999999));
        assert_eq!(edge_stamp("edge-3"), None);
    }

    #[test]
    fn test_unknown_endpoints_rejected() {
        let mut editor = editor();
        assert_eq!(
            editor.connect("missing", "e", None),
            Err(ConnectRejection::UnknownSource("missing".to_string()))
        );
        assert_eq!(
            editor.connect("s", "missing", None),
            Err(ConnectRejection::UnknownTarget("missing".to_string()))
        );
    }

    #[test]
    fn test_delete_node_cascades() {
        let mut editor = editor();
        editor.connect("s", "f", None).unwrap();
        editor.connect("f", "c", None).unwrap();
        let kept = editor.connect("d", "e", Some("Yes")).unwrap();

        assert!(editor.delete_node("f"));
        let graph = editor.graph();
        assert!(graph.find_node("f").is_none());
        assert!(graph.edges.iter().all(|edge| !edge.touches("f")));
        assert_eq!(graph.edges, vec![kept]);
        assert_eq!(graph.nodes.len(), 4);

        assert!(!editor.delete_node("f"));
    }

    #[test]
    fn test_update_node_data() {
        let mut editor = editor();
        let changed = editor
            .update_node_data("f", serde_json::json!({"label": "Submit Leave"}))
            .unwrap();
        assert!(changed);
        let node = editor.graph().find_node("f").unwrap();
        assert_eq!(node.kind(), NodeKind::FillForm);
        assert_eq!(node.data().label(), "Submit Leave");
        assert_eq!(node.data().description(), "Request a form submission");

        assert!(!editor.update_node_data("missing", serde_json::json!({"label": "x"})).unwrap());
    }

    #[test]
    fn test_modify_node_cannot_change_kind() {
        let mut editor = editor();
        let result = editor.modify_node("f", |data| {
            *data = NodeData::FillForm(FillFormData::default());
        });
        assert!(result.unwrap());

        let result = editor.modify_node("f", |data| {
            *data = NodeData::Start(Default::default());
        });
        assert!(result.is_err());
        assert_eq!(editor.graph().find_node("f").unwrap().kind(), NodeKind::FillForm);
    }

    #[test]
    fn test_reconnect_edge() {
        let mut editor = editor();
        let edge = editor.connect("s", "f", None).unwrap();
        let moved = editor.reconnect_edge(&edge.id, None, "e").unwrap();
        assert_eq!(moved.id, edge.id);
        assert_eq!(moved.target.as_deref(), Some("e"));
        assert_eq!(editor.graph().outgoing_edges("s").count(), 1);

        assert!(matches!(
            editor.reconnect_edge("nope", None, "e"),
            Err(ConnectRejection::UnknownEdge(_))
        ));
    }

    #[test]
    fn test_remap_handles_detaches_unmapped() {
        let mut editor = editor();
        let yes = editor.connect("d", "e", Some("Yes")).unwrap();
        let no = editor.connect("d", "s", Some("No")).unwrap();

        let map = HashMap::from([("Yes".to_string(), "Approve".to_string())]);
        assert!(editor.remap_handles("d", &map));

        let graph = editor.graph();
        let yes = graph.find_edge(&yes.id).unwrap();
        let no = graph.find_edge(&no.id).unwrap();
        assert_eq!(yes.source_handle.as_deref(), Some("Approve"));
        assert_eq!(yes.target.as_deref(), Some("e"));
        assert!(no.is_detached());
    }

    #[test]
    fn test_drop_dangling_edges() {
        let mut editor = editor();
        editor.connect("s", "f", None).unwrap();
        editor.graph_mut().nodes.retain(|node| node.id != "f");
        assert_eq!(editor.drop_dangling_edges().len(), 1);
        assert!(editor.graph().edges.is_empty());
    }
}
