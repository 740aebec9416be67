//! Node kind defaults and the add-node palette
//!
//! Every kind has a fixed default label and description and starts with
//! empty references. The condition entry is only offered once the graph
//! has a fill-form node to inherit a form from.

use serde::Serialize;

use crate::config::EditorConfig;
use crate::types::{
    AssignTaskData, BasicData, ChangeStatusData, ConditionData, DecisionData, FillFormData,
    FormRef, NodeData, NodeKind, WorkflowGraph,
};

/// Default label of a node kind
pub fn default_label(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Start => "Start",
        NodeKind::End => "End",
        NodeKind::AssignTask => "Assign Task",
        NodeKind::FillForm => "Fill Form",
        NodeKind::Condition => "Condition",
        NodeKind::ChangeStatus => "Change Status",
        NodeKind::Decision => "Decision",
        NodeKind::Process => "Process",
    }
}

/// Default description of a node kind
pub fn default_description(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Start => "Workflow starting point",
        NodeKind::End => "Workflow completion",
        NodeKind::AssignTask => "Assign a task to a role",
        NodeKind::FillForm => "Request a form submission",
        NodeKind::Condition => "Route based on form values",
        NodeKind::ChangeStatus => "Update the request status",
        NodeKind::Decision => "Choose between branches",
        NodeKind::Process => "Run a processing step",
    }
}

/// Fresh data for a new node of `kind`
///
/// A condition node starts bound to `seed_form` when one is given.
pub fn default_node_data(kind: NodeKind, config: &EditorConfig, seed_form: Option<&FormRef>) -> NodeData {
    let label = default_label(kind).to_string();
    let description = default_description(kind).to_string();
    match kind {
        NodeKind::Start => NodeData::Start(BasicData { label, description, ..Default::default() }),
        NodeKind::End => NodeData::End(BasicData { label, description, ..Default::default() }),
        NodeKind::Process => NodeData::Process(BasicData { label, description, ..Default::default() }),
        NodeKind::AssignTask => NodeData::AssignTask(AssignTaskData {
            label,
            description,
            ..Default::default()
        }),
        NodeKind::FillForm => NodeData::FillForm(FillFormData {
            label,
            description,
            ..Default::default()
        }),
        NodeKind::Condition => NodeData::Condition(ConditionData {
            label,
            description,
            selected_form_id: seed_form.map(|form| form.id.clone()),
            selected_form: seed_form.cloned(),
            ..Default::default()
        }),
        NodeKind::ChangeStatus => NodeData::ChangeStatus(ChangeStatusData {
            label,
            description,
            status_color: config.default_status_color.clone(),
            ..Default::default()
        }),
        NodeKind::Decision => NodeData::Decision(DecisionData {
            label,
            description,
            conditions: config.default_decision_branches.clone(),
            ..Default::default()
        }),
    }
}

/// One entry of the add-node palette
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaletteEntry {
    pub kind: NodeKind,
    pub label: &'static str,
    pub description: &'static str,
    pub enabled: bool,
}

/// The palette for the current graph
pub fn palette(graph: &WorkflowGraph) -> Vec<PaletteEntry> {
    let has_fill_form = crate::propagation::latest_fill_form(graph).is_some();
    NodeKind::ALL
        .into_iter()
        .map(|kind| PaletteEntry {
            kind,
            label: default_label(kind),
            description: default_description(kind),
            enabled: kind != NodeKind::Condition || has_fill_form,
        })
        .collect()
}
