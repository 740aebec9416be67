//! Dependency propagation for condition nodes
//!
//! A condition node has no form picker of its own. It inherits the form of
//! the fill-form node feeding it, and loses the binding when nothing feeds
//! it any more. Propagation runs once after every committed mutation; it
//! only writes nodes whose binding actually differs, so a second run over
//! the same graph is a no-op.

use std::collections::HashSet;

use crate::types::{FormRef, Node, NodeData, NodeId, NodeKind, RecordId, WorkflowGraph};

/// A binding change derived for one condition node
#[derive(Debug, Clone, PartialEq)]
pub enum BindingChange {
    /// Bind to the upstream fill-form node's form
    Rebind { node_id: NodeId, form: FormRef },
    /// Drop the binding; the node has no incoming edges
    Clear { node_id: NodeId },
}

impl BindingChange {
    pub fn node_id(&self) -> &str {
        match self {
            BindingChange::Rebind { node_id, .. } | BindingChange::Clear { node_id } => node_id,
        }
    }
}

/// Outcome of one propagation pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Propagation {
    /// Changes applied, in node order
    pub changes: Vec<BindingChange>,
    /// Last fill-form node in node order, regardless of connectivity
    pub latest_fill_form: Option<NodeId>,
}

impl Propagation {
    pub fn is_noop(&self) -> bool {
        self.changes.is_empty()
    }
}

/// The last fill-form node in node order
pub fn latest_fill_form(graph: &WorkflowGraph) -> Option<&Node> {
    graph
        .nodes
        .iter()
        .rev()
        .find(|node| node.kind() == NodeKind::FillForm)
}

/// Form of the latest fill-form node, used to seed new condition nodes
pub fn latest_fill_form_binding(graph: &WorkflowGraph) -> Option<&FormRef> {
    latest_fill_form(graph)
        .and_then(Node::as_fill_form)
        .and_then(|data| data.form.as_ref())
}

/// Work out which condition nodes need their binding changed
///
/// Nodes in `provisional` hold a seeded binding and have never had an
/// incoming edge; they are not cleared for lack of one.
pub fn derive_bindings(graph: &WorkflowGraph, provisional: &HashSet<NodeId>) -> Vec<BindingChange> {
    let mut changes = Vec::new();
    for node in &graph.nodes {
        let Some(condition) = node.as_condition() else {
            continue;
        };

        match graph.incoming_edges(&node.id).next() {
            Some(edge) => {
                let upstream_form = graph
                    .find_node(&edge.source)
                    .and_then(Node::as_fill_form)
                    .and_then(|data| data.form.as_ref());
                if let Some(form) = upstream_form {
                    if condition.selected_form_id.as_ref() != Some(&form.id) {
                        changes.push(BindingChange::Rebind {
                            node_id: node.id.clone(),
                            form: form.clone(),
                        });
                    }
                }
            }
            None => {
                let bound = condition.selected_form_id.is_some() || condition.selected_form.is_some();
                if bound && !provisional.contains(&node.id) {
                    changes.push(BindingChange::Clear {
                        node_id: node.id.clone(),
                    });
                }
            }
        }
    }
    changes
}

fn apply(graph: &mut WorkflowGraph, change: &BindingChange) {
    let Some(node) = graph.find_node_mut(change.node_id()) else {
        return;
    };
    let NodeData::Condition(condition) = node.data_mut() else {
        return;
    };
    match change {
        BindingChange::Rebind { form, .. } => {
            condition.selected_form_id = Some(form.id.clone());
            condition.selected_form = Some(form.clone());
        }
        BindingChange::Clear { .. } => {
            condition.selected_form_id = None;
            condition.selected_form = None;
        }
    }
}

/// Bring every condition node's binding in line with its upstream node
///
/// Existing rules are never touched, even when they refer to fields of a
/// form that is no longer bound. Provisional nodes that now have an
/// incoming edge are removed from `provisional`.
pub fn propagate(graph: &mut WorkflowGraph, provisional: &mut HashSet<NodeId>) -> Propagation {
    provisional.retain(|node_id| {
        graph.contains_node(node_id) && graph.incoming_edges(node_id).next().is_none()
    });

    let changes = derive_bindings(graph, provisional);
    for change in &changes {
        match change {
            BindingChange::Rebind { node_id, form } => {
                log::debug!("Binding condition '{}' to form '{}'", node_id, form.id)
            }
            BindingChange::Clear { node_id } => {
                log::debug!("Clearing form binding of condition '{}'", node_id)
            }
        }
        apply(graph, change);
    }

    Propagation {
        changes,
        latest_fill_form: latest_fill_form(graph).map(|node| node.id.clone()),
    }
}

/// Form id a condition node is currently bound to
pub fn bound_form_id(graph: &WorkflowGraph, node_id: &str) -> Option<RecordId> {
    graph
        .find_node(node_id)
        .and_then(Node::as_condition)
        .and_then(|data| data.selected_form_id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::WorkflowBuilder;
    use crate::conditions::{ConditionRule, Operator};
    use crate::schema::FieldType;
    use crate::types::{ConditionData, FillFormData};

    fn leave_request() -> FormRef {
        FormRef::new(7, "Leave Request")
    }

    fn fill_form(form: Option<FormRef>) -> NodeData {
        NodeData::FillForm(FillFormData {
            label: "Fill Form".to_string(),
            description: String::new(),
            form,
            ..Default::default()
        })
    }

    fn scenario() -> WorkflowGraph {
        WorkflowBuilder::new()
            .add_node("S", NodeKind::Start, (0.0, 0.0))
            .add_node_with_data("F", fill_form(Some(leave_request())), (0.0, 100.0))
            .add_node("C", NodeKind::Condition, (0.0, 200.0))
            .add_edge("S", None, "F")
            .add_edge_with_id("f-c", "F", None, "C")
            .build()
    }

    #[test]
    fn test_rebind_then_clear() {
        let mut graph = scenario();
        let mut provisional = HashSet::new();

        let result = propagate(&mut graph, &mut provisional);
        assert_eq!(result.changes.len(), 1);
        assert_eq!(result.latest_fill_form.as_deref(), Some("F"));
        let condition = graph.find_node("C").unwrap().as_condition().unwrap();
        assert_eq!(condition.selected_form_id, Some(RecordId::Number(7)));
        assert_eq!(condition.selected_form.as_ref().unwrap().title, "Leave Request");

        graph.edges.retain(|edge| edge.id != "f-c");
        propagate(&mut graph, &mut provisional);
        assert_eq!(bound_form_id(&graph, "C"), None);
        assert!(graph.find_node("C").unwrap().as_condition().unwrap().selected_form.is_none());
    }

    #[test]
    fn test_propagation_is_idempotent() {
        let mut graph = scenario();
        let mut provisional = HashSet::new();
        propagate(&mut graph, &mut provisional);
        let settled = graph.clone();

        let second = propagate(&mut graph, &mut provisional);
        assert!(second.is_noop());
        assert_eq!(graph, settled);
    }

    #[test]
    fn test_rules_preserved_across_rebinding() {
        let rule = ConditionRule {
            field_id: "3".to_string(),
            field_label: "Days".to_string(),
            field_type: FieldType::Number,
            operator: Operator::GreaterThan,
            value: "10".to_string(),
        };
        let mut graph = WorkflowBuilder::new()
            .add_node_with_data("F", fill_form(Some(FormRef::new(8, "Expense"))), (0.0, 0.0))
            .add_node_with_data(
                "C",
                NodeData::Condition(ConditionData {
                    selected_form_id: Some(RecordId::Number(7)),
                    selected_form: Some(leave_request()),
                    condition_rules: vec![rule.clone()],
                    ..Default::default()
                }),
                (0.0, 100.0),
            )
            .add_edge("F", None, "C")
            .build();

        propagate(&mut graph, &mut HashSet::new());
        let condition = graph.find_node("C").unwrap().as_condition().unwrap();
        assert_eq!(condition.selected_form_id, Some(RecordId::Number(8)));
        assert_eq!(condition.condition_rules, vec![rule]);
    }

    #[test]
    fn test_non_fill_form_upstream_leaves_binding() {
        let mut graph = WorkflowBuilder::new()
            .add_node("S", NodeKind::Start, (0.0, 0.0))
            .add_node_with_data(
                "C",
                NodeData::Condition(ConditionData {
                    selected_form_id: Some(RecordId::Number(7)),
                    selected_form: Some(leave_request()),
                    ..Default::default()
                }),
                (0.0, 100.0),
            )
            .add_edge("S", None, "C")
            .build();

        assert!(propagate(&mut graph, &mut HashSet::new()).is_noop());
        assert_eq!(bound_form_id(&graph, "C"), Some(RecordId::Number(7)));
    }

    #[test]
    fn test_unbound_fill_form_does_not_rebind() {
        let mut graph = WorkflowBuilder::new()
            .add_node_with_data("F", fill_form(None), (0.0, 0.0))
            .add_node("C", NodeKind::Condition, (0.0, 100.0))
            .add_edge("F", None, "C")
            .build();
        assert!(propagate(&mut graph, &mut HashSet::new()).is_noop());
    }

    #[test]
    fn test_provisional_seed_survives_until_connected() {
        let mut graph = WorkflowBuilder::new()
            .add_node_with_data("F", fill_form(Some(leave_request())), (0.0, 0.0))
            .add_node_with_data(
                "C",
                NodeData::Condition(ConditionData {
                    selected_form_id: Some(RecordId::Number(7)),
                    selected_form: Some(leave_request()),
                    ..Default::default()
                }),
                (0.0, 100.0),
            )
            .build();
        let mut provisional = HashSet::from(["C".to_string()]);

        assert!(propagate(&mut graph, &mut provisional).is_noop());
        assert_eq!(bound_form_id(&graph, "C"), Some(RecordId::Number(7)));

        graph = WorkflowBuilder::new()
            .add_node_with_data("F", fill_form(Some(leave_request())), (0.0, 0.0))
            .build();
        propagate(&mut graph, &mut provisional);
        assert!(provisional.is_empty());
    }

    #[test]
    fn test_latest_fill_form_ignores_connectivity() {
        let graph = WorkflowBuilder::new()
            .add_node_with_data("F1", fill_form(Some(leave_request())), (0.0, 0.0))
            .add_node_with_data("F2", fill_form(Some(FormRef::new(8, "Expense"))), (0.0, 100.0))
            .add_node("S", NodeKind::Start, (0.0, 200.0))
            .build();
        assert_eq!(latest_fill_form(&graph).unwrap().id, "F2");
        assert_eq!(latest_fill_form_binding(&graph).unwrap().title, "Expense");
    }
}
