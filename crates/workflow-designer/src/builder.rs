//! Fluent builder for workflow graphs
//!
//! Provides a compact API for constructing graphs programmatically, for
//! example when seeding templates or writing tests. The builder does not
//! enforce connection rules; run [`crate::validation::validate_graph`] on
//! the result when that matters.

use crate::config::{EditorConfig, EdgeDefaults};
use crate::palette::default_node_data;
use crate::types::{Edge, Node, NodeData, NodeKind, Position, WorkflowGraph};

/// Fluent builder for constructing workflow graphs
///
/// # Example
///
/// ```ignore
/// let graph = WorkflowBuilder::new()
///     .add_node("start", NodeKind::Start, (0.0, 0.0))
///     .add_node("done", NodeKind::End, (0.0, 200.0))
///     .add_edge("start", None, "done")
///     .build();
/// ```
pub struct WorkflowBuilder {
    config: EditorConfig,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    edge_counter: usize,
}

impl WorkflowBuilder {
    /// Create a new builder using the default editor configuration
    pub fn new() -> Self {
        Self::with_config(EditorConfig::default())
    }

    /// Create a new builder whose default node data and edge styling follow `config`
    pub fn with_config(config: EditorConfig) -> Self {
        Self {
            config,
            nodes: Vec::new(),
            edges: Vec::new(),
            edge_counter: 0,
        }
    }

    /// Add a node with the kind's default data
    pub fn add_node(self, id: impl Into<String>, kind: NodeKind, position: (f64, f64)) -> Self {
        let data = default_node_data(kind, &self.config, None);
        self.add_node_with_data(id, data, position)
    }

    /// Add a node with explicit data
    pub fn add_node_with_data(
        mut self,
        id: impl Into<String>,
        data: NodeData,
        position: (f64, f64),
    ) -> Self {
        self.nodes
            .push(Node::new(id, data, Position::new(position.0, position.1)));
        self
    }

    /// Add an edge between two nodes (auto-generates edge ID)
    pub fn add_edge(
        mut self,
        source: impl Into<String>,
        source_handle: Option<&str>,
        target: impl Into<String>,
    ) -> Self {
        self.edge_counter += 1;
        let id = format!("edge-{}", self.edge_counter);
        self.push_edge(id, source.into(), source_handle, Some(target.into()));
        self
    }

    /// Add an edge with an explicit ID
    pub fn add_edge_with_id(
        mut self,
        edge_id: impl Into<String>,
        source: impl Into<String>,
        source_handle: Option<&str>,
        target: impl Into<String>,
    ) -> Self {
        self.push_edge(edge_id.into(), source.into(), source_handle, Some(target.into()));
        self
    }

    fn push_edge(&mut self, id: String, source: String, handle: Option<&str>, target: Option<String>) {
        let EdgeDefaults {
            edge_type,
            animated,
            style,
        } = self.config.edges.clone();
        self.edges.push(Edge {
            id,
            source,
            target,
            source_handle: handle.map(str::to_string),
            edge_type,
            animated,
            style,
            extra: Default::default(),
        });
    }

    /// Build the graph without validation
    pub fn build(self) -> WorkflowGraph {
        WorkflowGraph {
            nodes: self.nodes,
            edges: self.edges,
        }
    }
}

impl Default for WorkflowBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_assigns_edge_ids() {
        let graph = WorkflowBuilder::new()
            .add_node("s", NodeKind::Start, (0.0, 0.0))
            .add_node("d", NodeKind::Decision, (0.0, 100.0))
            .add_node("e", NodeKind::End, (0.0, 200.0))
            .add_edge("s", None, "d")
            .add_edge("d", Some("Yes"), "e")
            .add_edge_with_id("custom", "d", Some("No"), "e")
            .build();

        let ids: Vec<&str> = graph.edges.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["edge-1", "edge-2", "custom"]);
        assert_eq!(graph.edges[1].source_handle.as_deref(), Some("Yes"));
        assert_eq!(graph.find_node("d").unwrap().kind(), NodeKind::Decision);
    }
}
