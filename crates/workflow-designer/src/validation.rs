//! Whole-graph structural validation
//!
//! The editor keeps graphs valid edge by edge, but graphs also arrive from
//! storage or from [`crate::builder::WorkflowBuilder`], which do not go
//! through the connection checks. These functions report every problem
//! found (not just the first) so a host can show them all at once.

use std::collections::{HashMap, HashSet};

use crate::conditions::parse_rule_handle;
use crate::types::{NodeData, NodeKind, WorkflowGraph};

/// Validation error with location context
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Two nodes share an id
    DuplicateNodeId { node_id: String },
    /// Two edges share an id
    DuplicateEdgeId { edge_id: String },
    /// An edge references a non-existent node
    UnknownNode { edge_id: String, node_id: String },
    /// An edge leaves a handle its source node does not expose
    InvalidSourceHandle {
        edge_id: String,
        node_id: String,
        handle: Option<String>,
    },
    /// A single-output node has more than one outgoing edge
    FanOutExceeded { node_id: String, count: usize },
    /// The graph has no start node
    MissingStartNode,
    /// The graph has more than one start node
    MultipleStartNodes,
    /// The graph has no end node
    MissingEndNode,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateNodeId { node_id } => write!(f, "Duplicate node id '{}'", node_id),
            Self::DuplicateEdgeId { edge_id } => write!(f, "Duplicate edge id '{}'", edge_id),
            Self::UnknownNode { edge_id, node_id } => {
                write!(f, "Edge '{}' references unknown node '{}'", edge_id, node_id)
            }
            Self::InvalidSourceHandle {
                edge_id,
                node_id,
                handle,
            } => {
                write!(
                    f,
                    "Edge '{}' leaves node '{}' from invalid handle '{}'",
                    edge_id,
                    node_id,
                    handle.as_deref().unwrap_or("")
                )
            }
            Self::FanOutExceeded { node_id, count } => {
                write!(
                    f,
                    "Node '{}' allows one outgoing edge but has {}",
                    node_id, count
                )
            }
            Self::MissingStartNode => write!(f, "Workflow has no Start node"),
            Self::MultipleStartNodes => write!(f, "Workflow has multiple Start nodes"),
            Self::MissingEndNode => write!(f, "Workflow has no End node"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate a workflow graph
///
/// Returns all validation errors found (not just the first).
pub fn validate_graph(graph: &WorkflowGraph) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    validate_unique_ids(graph, &mut errors);
    validate_edge_references(graph, &mut errors);
    validate_source_handles(graph, &mut errors);
    validate_fan_out(graph, &mut errors);
    validate_start_end_presence(graph, &mut errors);

    errors
}

/// Structural checks only, without the start/end presence rules
///
/// Useful while a workflow is still being drawn.
pub fn validate_structure(graph: &WorkflowGraph) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    validate_unique_ids(graph, &mut errors);
    validate_edge_references(graph, &mut errors);
    validate_source_handles(graph, &mut errors);
    validate_fan_out(graph, &mut errors);

    errors
}

fn validate_unique_ids(graph: &WorkflowGraph, errors: &mut Vec<ValidationError>) {
    let mut seen = HashSet::new();
    for node in &graph.nodes {
        if !seen.insert(node.id.as_str()) {
            errors.push(ValidationError::DuplicateNodeId {
                node_id: node.id.clone(),
            });
        }
    }

    let mut seen = HashSet::new();
    for edge in &graph.edges {
        if !seen.insert(edge.id.as_str()) {
            errors.push(ValidationError::DuplicateEdgeId {
                edge_id: edge.id.clone(),
            });
        }
    }
}

/// Check that all edge source/target nodes exist; detached edges have no target
fn validate_edge_references(graph: &WorkflowGraph, errors: &mut Vec<ValidationError>) {
    let node_ids: HashSet<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();

    for edge in &graph.edges {
        if !node_ids.contains(edge.source.as_str()) {
            errors.push(ValidationError::UnknownNode {
                edge_id: edge.id.clone(),
                node_id: edge.source.clone(),
            });
        }
        if let Some(target) = edge.target.as_deref() {
            if !node_ids.contains(target) {
                errors.push(ValidationError::UnknownNode {
                    edge_id: edge.id.clone(),
                    node_id: target.to_string(),
                });
            }
        }
    }
}

/// Check that edges leaving branching nodes use a handle the node exposes
///
/// Detached edges are skipped: they connect nothing until reattached, and
/// reattaching checks the handle again.
fn validate_source_handles(graph: &WorkflowGraph, errors: &mut Vec<ValidationError>) {
    for edge in graph.edges.iter().filter(|edge| !edge.is_detached()) {
        let Some(source) = graph.find_node(&edge.source) else {
            continue;
        };
        let handle = edge.source_handle.as_deref();
        let valid = match source.data() {
            NodeData::Condition(data) => handle
                .and_then(parse_rule_handle)
                .and_then(|index| data.condition_rules.get(index))
                .is_some_and(|rule| rule.is_valid()),
            NodeData::Decision(data) => {
                handle.is_some_and(|h| data.conditions.iter().any(|branch| branch == h))
            }
            _ => true,
        };
        if !valid {
            errors.push(ValidationError::InvalidSourceHandle {
                edge_id: edge.id.clone(),
                node_id: source.id.clone(),
                handle: edge.source_handle.clone(),
            });
        }
    }
}

fn validate_fan_out(graph: &WorkflowGraph, errors: &mut Vec<ValidationError>) {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for edge in &graph.edges {
        *counts.entry(edge.source.as_str()).or_insert(0) += 1;
    }

    for node in &graph.nodes {
        if node.kind().is_branching() {
            continue;
        }
        let count = counts.get(node.id.as_str()).copied().unwrap_or(0);
        if count > 1 {
            errors.push(ValidationError::FanOutExceeded {
                node_id: node.id.clone(),
                count,
            });
        }
    }
}

fn validate_start_end_presence(graph: &WorkflowGraph, errors: &mut Vec<ValidationError>) {
    let start_count = graph
        .nodes
        .iter()
        .filter(|n| n.kind() == NodeKind::Start)
        .count();
    let end_count = graph
        .nodes
        .iter()
        .filter(|n| n.kind() == NodeKind::End)
        .count();

    if start_count == 0 {
        errors.push(ValidationError::MissingStartNode);
    } else if start_count > 1 {
        errors.push(ValidationError::MultipleStartNodes);
    }

    if end_count == 0 {
        errors.push(ValidationError::MissingEndNode);
    }
}
