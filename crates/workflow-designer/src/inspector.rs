//! Node inspector contract
//!
//! Which fields each node kind exposes for editing, and what happens to the
//! graph when one of them changes. Rendering is left to the host; this
//! module only validates and applies edits.
//!
//! Two edits reach beyond the node's own data:
//!
//! - Decision branches are output handles, so adding, renaming or removing
//!   a branch also adds, re-labels or detaches the edges leaving it.
//! - Committing a condition node's rule list renumbers its `rule-<index>`
//!   handles; edges follow their rule, and edges of dropped rules are
//!   detached.

use std::collections::HashMap;

use crate::conditions::{RuleDraft, RuleEditor, RuleKey};
use crate::editor::GraphEditor;
use crate::error::{DesignerError, Result};
use crate::schema::{FieldInfo, FormCatalog};
use crate::types::{FormRef, NodeData, NodeId, NodeKind, RecordId, RoleRef, WorkflowGraph};

/// A field shown in a node's inspector section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditableField {
    Label,
    Description,
    Role,
    Form,
    Rules,
    StatusLabel,
    StatusValue,
    StatusColor,
    AssignToRole,
    ShouldReassign,
    Branches,
}

impl EditableField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Label => "label",
            Self::Description => "description",
            Self::Role => "role",
            Self::Form => "form",
            Self::Rules => "conditionRules",
            Self::StatusLabel => "statusLabel",
            Self::StatusValue => "statusValue",
            Self::StatusColor => "statusColor",
            Self::AssignToRole => "assignToRole",
            Self::ShouldReassign => "shouldReassign",
            Self::Branches => "conditions",
        }
    }
}

/// Fields a node kind exposes, in display order
pub fn editable_fields(kind: NodeKind) -> &'static [EditableField] {
    use EditableField::*;
    match kind {
        NodeKind::Start | NodeKind::End | NodeKind::Process => &[Label, Description],
        NodeKind::AssignTask => &[Label, Description, Role, Form],
        NodeKind::FillForm => &[Label, Description, Form],
        NodeKind::Condition => &[Label, Description, Rules],
        NodeKind::ChangeStatus => &[
            Label,
            Description,
            StatusLabel,
            StatusValue,
            StatusColor,
            ShouldReassign,
            AssignToRole,
        ],
        NodeKind::Decision => &[Label, Description, Branches],
    }
}

/// A single inspector edit
#[derive(Debug, Clone, PartialEq)]
pub enum InspectorEdit {
    SetLabel(String),
    SetDescription(String),
    SetRole(Option<RoleRef>),
    SetForm(Option<FormRef>),
    SetStatusLabel(String),
    SetStatusValue(Option<String>),
    SetStatusColor(String),
    SetAssignToRole(Option<RoleRef>),
    /// Turning reassignment off also clears the reassignment role
    SetShouldReassign(bool),
    AddBranch(String),
    RenameBranch { index: usize, label: String },
    RemoveBranch(usize),
}

impl InspectorEdit {
    /// The field this edit writes
    pub fn field(&self) -> EditableField {
        match self {
            Self::SetLabel(_) => EditableField::Label,
            Self::SetDescription(_) => EditableField::Description,
            Self::SetRole(_) => EditableField::Role,
            Self::SetForm(_) => EditableField::Form,
            Self::SetStatusLabel(_) => EditableField::StatusLabel,
            Self::SetStatusValue(_) => EditableField::StatusValue,
            Self::SetStatusColor(_) => EditableField::StatusColor,
            Self::SetAssignToRole(_) => EditableField::AssignToRole,
            Self::SetShouldReassign(_) => EditableField::ShouldReassign,
            Self::AddBranch(_) | Self::RenameBranch { .. } | Self::RemoveBranch(_) => {
                EditableField::Branches
            }
        }
    }
}

fn set_label(data: &mut NodeData, label: String) {
    match data {
        NodeData::Start(d) | NodeData::End(d) | NodeData::Process(d) => d.label = label,
        NodeData::AssignTask(d) => d.label = label,
        NodeData::FillForm(d) => d.label = label,
        NodeData::Condition(d) => d.label = label,
        NodeData::ChangeStatus(d) => d.label = label,
        NodeData::Decision(d) => d.label = label,
    }
}

fn set_description(data: &mut NodeData, description: String) {
    match data {
        NodeData::Start(d) | NodeData::End(d) | NodeData::Process(d) => d.description = description,
        NodeData::AssignTask(d) => d.description = description,
        NodeData::FillForm(d) => d.description = description,
        NodeData::Condition(d) => d.description = description,
        NodeData::ChangeStatus(d) => d.description = description,
        NodeData::Decision(d) => d.description = description,
    }
}

/// Write a non-branch edit into node data
///
/// The caller has already checked that the kind exposes the field.
fn write_field(data: &mut NodeData, edit: InspectorEdit) {
    match (data, edit) {
        (data, InspectorEdit::SetLabel(label)) => set_label(data, label),
        (data, InspectorEdit::SetDescription(text)) => set_description(data, text),
        (NodeData::AssignTask(d), InspectorEdit::SetRole(role)) => d.role = role,
        (NodeData::AssignTask(d), InspectorEdit::SetForm(form)) => d.form = form,
        (NodeData::FillForm(d), InspectorEdit::SetForm(form)) => d.form = form,
        (NodeData::ChangeStatus(d), InspectorEdit::SetStatusLabel(label)) => d.status_label = label,
        (NodeData::ChangeStatus(d), InspectorEdit::SetStatusValue(value)) => d.status_value = value,
        (NodeData::ChangeStatus(d), InspectorEdit::SetStatusColor(color)) => d.status_color = color,
        (NodeData::ChangeStatus(d), InspectorEdit::SetAssignToRole(role)) => d.assign_to_role = role,
        (NodeData::ChangeStatus(d), InspectorEdit::SetShouldReassign(flag)) => {
            d.should_reassign = flag;
            if !flag {
                d.assign_to_role = None;
            }
        }
        (data, edit) => {
            log::debug!("Edit {:?} does not apply to {} data", edit.field(), data.kind());
        }
    }
}

fn branches(editor: &GraphEditor, node_id: &str) -> Vec<String> {
    editor
        .graph()
        .find_node(node_id)
        .and_then(|node| node.as_decision())
        .map(|data| data.conditions.clone())
        .unwrap_or_default()
}

fn write_branches(editor: &mut GraphEditor, node_id: &str, list: Vec<String>) -> Result<bool> {
    editor.modify_node(node_id, |data| {
        if let NodeData::Decision(d) = data {
            d.conditions = list;
        }
    })
}

fn edit_branches(editor: &mut GraphEditor, node_id: &str, edit: InspectorEdit) -> Result<bool> {
    let mut list = branches(editor, node_id);
    let duplicate = |list: &[String], label: &str| list.iter().any(|b| b == label);

    match edit {
        InspectorEdit::AddBranch(label) => {
            if label.is_empty() || duplicate(&list, &label) {
                return Err(DesignerError::invalid_patch(
                    node_id,
                    format!("branch label '{}' is empty or already used", label),
                ));
            }
            list.push(label.clone());
            write_branches(editor, node_id, list)?;
            editor.add_placeholder_edge(node_id, &label);
            Ok(true)
        }
        InspectorEdit::RenameBranch { index, label } => {
            let Some(old) = list.get(index).cloned() else {
                return Err(DesignerError::invalid_patch(node_id, format!("no branch at index {}", index)));
            };
            if old == label {
                return Ok(false);
            }
            if label.is_empty() || duplicate(&list, &label) {
                return Err(DesignerError::invalid_patch(
                    node_id,
                    format!("branch label '{}' is empty or already used", label),
                ));
            }
            let mut handle_map: HashMap<String, String> =
                list.iter().map(|b| (b.clone(), b.clone())).collect();
            handle_map.insert(old, label.clone());
            list[index] = label;
            write_branches(editor, node_id, list)?;
            editor.remap_handles(node_id, &handle_map);
            Ok(true)
        }
        InspectorEdit::RemoveBranch(index) => {
            if index >= list.len() {
                return Err(DesignerError::invalid_patch(node_id, format!("no branch at index {}", index)));
            }
            let removed = list.remove(index);
            let handle_map: HashMap<String, String> =
                list.iter().map(|b| (b.clone(), b.clone())).collect();
            write_branches(editor, node_id, list)?;
            editor.drop_detached(node_id, &removed);
            editor.remap_handles(node_id, &handle_map);
            log::debug!("Removed branch '{}' of decision '{}'", removed, node_id);
            Ok(true)
        }
        other => Err(DesignerError::invalid_patch(
            node_id,
            format!("{:?} is not a branch edit", other),
        )),
    }
}

/// Apply an inspector edit to a node
///
/// Returns false if the node does not exist or nothing changed. An edit to
/// a field the node's kind does not expose is an error and changes nothing.
pub fn apply_edit(editor: &mut GraphEditor, node_id: &str, edit: InspectorEdit) -> Result<bool> {
    let Some(kind) = editor.graph().find_node(node_id).map(|node| node.kind()) else {
        log::debug!("Ignoring inspector edit for missing node '{}'", node_id);
        return Ok(false);
    };

    let field = edit.field();
    if !editable_fields(kind).contains(&field) {
        return Err(DesignerError::UnsupportedEdit {
            node_id: node_id.to_string(),
            kind: kind.to_string(),
            field: field.as_str(),
        });
    }

    if field == EditableField::Branches {
        return edit_branches(editor, node_id, edit);
    }
    editor.modify_node(node_id, |data| write_field(data, edit))
}

/// Rule list editing for one condition node
///
/// Wraps a [`RuleEditor`] loaded from the node's persisted rules and bound
/// to the node's inherited form. The list always shows at least one rule.
#[derive(Debug, Clone)]
pub struct ConditionInspector {
    node_id: NodeId,
    rules: RuleEditor,
}

impl ConditionInspector {
    /// Start editing a condition node; None if the node is not a condition
    pub fn open(graph: &WorkflowGraph, node_id: &str, catalog: &FormCatalog) -> Option<Self> {
        let condition = graph.find_node(node_id)?.as_condition()?;
        let mut rules = RuleEditor::load(
            condition.selected_form_id.clone(),
            &condition.condition_rules,
            catalog,
        );
        if rules.drafts().is_empty() {
            rules.add_rule();
        }
        Some(Self {
            node_id: node_id.to_string(),
            rules,
        })
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn form_id(&self) -> Option<&RecordId> {
        self.rules.form_id()
    }

    pub fn fields(&self) -> &[FieldInfo] {
        self.rules.fields()
    }

    pub fn drafts(&self) -> &[RuleDraft] {
        self.rules.drafts()
    }

    /// Bound form whose schema is not in the catalog yet
    pub fn missing_schema(&self, catalog: &FormCatalog) -> Option<RecordId> {
        self.rules
            .form_id()
            .filter(|id| !catalog.contains(id))
            .cloned()
    }

    /// Follow the node's current binding and re-resolve fields
    ///
    /// Called after propagation may have rebound the node, or after a
    /// schema has been added to the catalog.
    pub fn refresh(&mut self, graph: &WorkflowGraph, catalog: &FormCatalog) {
        let bound = graph
            .find_node(&self.node_id)
            .and_then(|node| node.as_condition())
            .and_then(|data| data.selected_form_id.clone());
        if bound.as_ref() != self.rules.form_id() {
            self.rules.rebind(bound, catalog);
        } else {
            self.rules.refresh_fields(catalog);
        }
    }

    pub fn add_rule(&mut self) -> usize {
        self.rules.add_rule()
    }

    pub fn update_rule(&mut self, index: usize, key: RuleKey, value: &str) -> bool {
        self.rules.update_rule(index, key, value)
    }

    /// Remove a rule; removing the last one leaves a fresh empty rule
    pub fn remove_rule(&mut self, index: usize) -> bool {
        if self.rules.remove_rule(index).is_none() {
            return false;
        }
        if self.rules.drafts().is_empty() {
            self.rules.add_rule();
        }
        true
    }

    /// Persist the valid rules and move edges onto their rules' new handles
    ///
    /// Returns true if the node data or any edge changed.
    pub fn commit(&mut self, editor: &mut GraphEditor) -> Result<bool> {
        let committed = self.rules.commit();
        let rules = committed.rules;
        let data_changed = editor.modify_node(&self.node_id, |data| {
            if let NodeData::Condition(d) = data {
                d.condition_rules = rules;
            }
        })?;
        let edges_changed = editor.remap_handles(&self.node_id, &committed.handle_map);
        self.rules.mark_committed();
        Ok(data_changed || edges_changed)
    }
}
