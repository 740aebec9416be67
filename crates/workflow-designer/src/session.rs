//! Editor session context
//!
//! An [`EditorSession`] is one open designer: the graph, the viewport, the
//! current selection, and everything derived from them. Every committed
//! mutation ends in a single reconciliation step:
//!
//! 1. the dependency propagator brings condition bindings up to date,
//! 2. the change emitter tells the host if the graph differs from what it
//!    last saw,
//! 3. the new state is recorded for undo.
//!
//! Rejected or no-op operations skip all three.

use std::collections::HashSet;

use crate::conditions::RuleKey;
use crate::config::EditorConfig;
use crate::editor::{ConnectRejection, GraphEditor};
use crate::error::Result;
use crate::events::{ChangeEmitter, GraphChangeSink};
use crate::inspector::{apply_edit, ConditionInspector, InspectorEdit};
use crate::palette::{palette, PaletteEntry};
use crate::propagation::{latest_fill_form_binding, propagate, BindingChange};
use crate::providers::{
    FetchKind, FetchTicket, FetchTracker, FormListProvider, FormSchemaProvider, RoleProvider,
};
use crate::schema::{FormCatalog, FormDocument};
use crate::types::{Edge, FormRef, Node, NodeData, NodeId, NodeKind, Position, RecordId, RoleRef, WorkflowGraph};
use crate::undo::{Snapshot, UndoHistory};
use crate::validation::{validate_graph, ValidationError};

/// Keys that delete the current selection
pub const DELETE_KEYS: [&str; 2] = ["Delete", "Backspace"];

/// The visible part of the canvas
///
/// `x`/`y` is the canvas translation in screen pixels, `width`/`height` the
/// size of the canvas element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
            width: 0.0,
            height: 0.0,
        }
    }
}

impl Viewport {
    /// Centre of the visible area in graph coordinates
    pub fn center(&self) -> Position {
        let zoom = if self.zoom > 0.0 { self.zoom } else { 1.0 };
        Position::new(
            (self.width / 2.0 - self.x) / zoom,
            (self.height / 2.0 - self.y) / zoom,
        )
    }
}

/// One open workflow designer
pub struct EditorSession {
    editor: GraphEditor,
    viewport: Viewport,
    selection: Option<NodeId>,
    emitter: ChangeEmitter,
    sink: Box<dyn GraphChangeSink>,
    undo: UndoHistory,
    catalog: FormCatalog,
    /// Condition nodes holding a seeded binding that has not yet been
    /// confirmed by an incoming edge
    provisional: HashSet<NodeId>,
    fetches: FetchTracker,
    condition: Option<ConditionInspector>,
    roles: Vec<RoleRef>,
    forms: Vec<FormRef>,
}

impl EditorSession {
    /// Open a session over a stored graph
    ///
    /// Dangling edges are dropped and condition bindings reconciled. The
    /// resulting graph is what the host is assumed to have; it is never
    /// reported through `sink`.
    pub fn open(graph: WorkflowGraph, config: EditorConfig, sink: Box<dyn GraphChangeSink>) -> Self {
        let undo = UndoHistory::new(config.undo_depth);
        let mut editor = GraphEditor::new(graph, config);
        editor.drop_dangling_edges();

        let mut provisional = HashSet::new();
        let initial = propagate(editor.graph_mut(), &mut provisional);
        if !initial.is_noop() {
            log::info!("Reconciled {} condition binding(s) on open", initial.changes.len());
        }

        let mut session = Self {
            editor,
            viewport: Viewport::default(),
            selection: None,
            emitter: ChangeEmitter::new(),
            sink,
            undo,
            catalog: FormCatalog::new(),
            provisional,
            fetches: FetchTracker::new(),
            condition: None,
            roles: Vec::new(),
            forms: Vec::new(),
        };
        session.seed_catalog();
        session.emitter.prime(session.editor.graph());
        session.record_snapshot();
        session
    }

    /// Add the field snapshots stored in node data to the catalog
    fn seed_catalog(&mut self) {
        for node in &self.editor.graph().nodes {
            let form = match node.data() {
                NodeData::AssignTask(d) => d.form.as_ref(),
                NodeData::FillForm(d) => d.form.as_ref(),
                NodeData::Condition(d) => d.selected_form.as_ref(),
                _ => None,
            };
            if let Some(form) = form {
                if !self.catalog.contains(&form.id) {
                    self.catalog.insert_snapshot(form);
                }
            }
        }
    }

    /// Run the post-mutation steps; returns true if the host was notified
    fn reconcile(&mut self, record: bool) -> bool {
        let propagation = propagate(self.editor.graph_mut(), &mut self.provisional);
        for change in &propagation.changes {
            if let BindingChange::Rebind { form, .. } = change {
                if !self.catalog.contains(&form.id) {
                    self.catalog.insert_snapshot(form);
                }
            }
        }

        let graph = self.editor.graph();
        if self
            .selection
            .as_deref()
            .is_some_and(|id| !graph.contains_node(id))
        {
            self.selection = None;
            self.fetches.inspect(None);
            self.condition = None;
        }
        if let Some(inspector) = &mut self.condition {
            inspector.refresh(graph, &self.catalog);
        }

        let notified = self.emitter.observe(graph, &*self.sink);
        if notified && record {
            self.record_snapshot();
        }
        notified
    }

    fn record_snapshot(&mut self) {
        let snapshot = Snapshot::capture(self.editor.graph(), &self.provisional);
        if let Err(e) = self.undo.record(&snapshot) {
            log::warn!("Failed to record undo snapshot: {}", e);
        }
    }

    pub fn graph(&self) -> &WorkflowGraph {
        self.editor.graph()
    }

    pub fn config(&self) -> &EditorConfig {
        self.editor.config()
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn catalog(&self) -> &FormCatalog {
        &self.catalog
    }

    /// Roles loaded for the inspector
    pub fn roles(&self) -> &[RoleRef] {
        &self.roles
    }

    /// Forms loaded for the inspector
    pub fn forms(&self) -> &[FormRef] {
        &self.forms
    }

    /// The add-node palette for the current graph
    pub fn palette(&self) -> Vec<PaletteEntry> {
        palette(self.editor.graph())
    }

    /// Check the whole graph
    pub fn validate(&self) -> Vec<ValidationError> {
        validate_graph(self.editor.graph())
    }

    /// Add a node of `kind` at the centre of the viewport
    ///
    /// A new condition node starts bound to the latest fill-form node's
    /// form. That binding survives until the node gets its first incoming
    /// edge, after which the propagator owns it.
    pub fn add_node(&mut self, kind: NodeKind) -> Node {
        let seed = match kind {
            NodeKind::Condition => latest_fill_form_binding(self.editor.graph()).cloned(),
            _ => None,
        };
        let node = self
            .editor
            .add_node(kind, self.viewport.center(), seed.as_ref());
        if seed.is_some() {
            self.provisional.insert(node.id.clone());
        }
        self.reconcile(true);
        node
    }

    /// Add a node by its wire kind name
    ///
    /// An unknown name is a programming error: it panics in debug builds
    /// and is ignored otherwise.
    pub fn add_node_by_name(&mut self, kind: &str) -> Option<Node> {
        match kind.parse::<NodeKind>() {
            Ok(kind) => Some(self.add_node(kind)),
            Err(e) => {
                if cfg!(debug_assertions) {
                    panic!("{}", e);
                }
                log::error!("{}", e);
                None
            }
        }
    }

    pub fn move_node(&mut self, node_id: &str, position: Position) -> bool {
        self.editor.move_node(node_id, position) && self.reconcile(true)
    }

    pub fn connect(
        &mut self,
        source_id: &str,
        target_id: &str,
        source_handle: Option<&str>,
    ) -> std::result::Result<Edge, ConnectRejection> {
        let edge = self.editor.connect(source_id, target_id, source_handle)?;
        self.reconcile(true);
        Ok(edge)
    }

    pub fn reconnect_edge(
        &mut self,
        edge_id: &str,
        source_handle: Option<&str>,
        target_id: &str,
    ) -> std::result::Result<Edge, ConnectRejection> {
        let edge = self.editor.reconnect_edge(edge_id, source_handle, target_id)?;
        self.reconcile(true);
        Ok(edge)
    }

    /// Shallow-merge `patch` into a node's data
    pub fn update_node_data(&mut self, node_id: &str, patch: serde_json::Value) -> Result<bool> {
        let changed = self.editor.update_node_data(node_id, patch)?;
        if changed {
            self.reconcile(true);
        }
        Ok(changed)
    }

    pub fn delete_node(&mut self, node_id: &str) -> bool {
        if !self.editor.delete_node(node_id) {
            return false;
        }
        self.provisional.remove(node_id);
        self.reconcile(true);
        true
    }

    pub fn delete_edge(&mut self, edge_id: &str) -> bool {
        if !self.editor.delete_edge(edge_id) {
            log::debug!("Ignoring delete of missing edge '{}'", edge_id);
            return false;
        }
        self.reconcile(true);
        true
    }

    /// Select a node (or clear the selection with None)
    ///
    /// Selecting a condition node opens its rule editor. Selecting an
    /// unknown node clears the selection.
    pub fn select(&mut self, node_id: Option<&str>) {
        let graph = self.editor.graph();
        let selected = node_id.filter(|id| graph.contains_node(id));
        self.selection = selected.map(str::to_string);
        self.fetches.inspect(selected);
        self.condition = selected.and_then(|id| ConditionInspector::open(graph, id, &self.catalog));
    }

    pub fn selected(&self) -> Option<&Node> {
        self.selection
            .as_deref()
            .and_then(|id| self.editor.graph().find_node(id))
    }

    /// Delete the selected node; no-op without a selection
    pub fn delete_selection_by_key(&mut self) -> bool {
        match self.selection.clone() {
            Some(node_id) => self.delete_node(&node_id),
            None => false,
        }
    }

    /// Handle a key press on the canvas; true if it changed the graph
    pub fn handle_key(&mut self, key: &str) -> bool {
        if DELETE_KEYS.contains(&key) {
            self.delete_selection_by_key()
        } else {
            false
        }
    }

    /// Apply an inspector edit to the selected node
    pub fn apply_inspector_edit(&mut self, edit: InspectorEdit) -> Result<bool> {
        let Some(node_id) = self.selection.clone() else {
            log::debug!("Ignoring inspector edit without a selection");
            return Ok(false);
        };
        let changed = apply_edit(&mut self.editor, &node_id, edit)?;
        if changed {
            self.reconcile(true);
        }
        Ok(changed)
    }

    /// Rule editor of the selected condition node
    pub fn condition_inspector(&self) -> Option<&ConditionInspector> {
        self.condition.as_ref()
    }

    fn commit_conditions(&mut self) -> Result<bool> {
        let Some(inspector) = &mut self.condition else {
            return Ok(false);
        };
        let changed = inspector.commit(&mut self.editor)?;
        if changed {
            self.reconcile(true);
        }
        Ok(changed)
    }

    /// Append an empty rule to the selected condition node
    ///
    /// Returns the new rule's index in the draft list.
    pub fn add_condition_rule(&mut self) -> Option<usize> {
        self.condition.as_mut().map(|inspector| inspector.add_rule())
    }

    /// Edit a rule of the selected condition node and persist the valid rules
    pub fn update_condition_rule(&mut self, index: usize, key: RuleKey, value: &str) -> Result<bool> {
        let updated = self
            .condition
            .as_mut()
            .is_some_and(|inspector| inspector.update_rule(index, key, value));
        if !updated {
            return Ok(false);
        }
        self.commit_conditions()
    }

    /// Remove a rule of the selected condition node and persist the valid rules
    pub fn remove_condition_rule(&mut self, index: usize) -> Result<bool> {
        let removed = self
            .condition
            .as_mut()
            .is_some_and(|inspector| inspector.remove_rule(index));
        if !removed {
            return Ok(false);
        }
        self.commit_conditions()
    }

    pub fn can_undo(&self) -> bool {
        self.undo.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.undo.can_redo()
    }

    /// Restore the previous state; false when there is nothing to undo
    pub fn undo(&mut self) -> Result<bool> {
        match self.undo.undo() {
            Some(snapshot) => {
                self.restore(snapshot?);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Re-apply an undone state; false when there is nothing to redo
    pub fn redo(&mut self) -> Result<bool> {
        match self.undo.redo() {
            Some(snapshot) => {
                self.restore(snapshot?);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.provisional = snapshot.provisional_set();
        self.editor.replace_graph(snapshot.graph);
        self.reconcile(false);
        if let Some(node_id) = self.selection.clone() {
            self.select(Some(&node_id));
        }
    }

    /// Start fetching the schema of the selected condition node's form
    ///
    /// None when no condition node is selected or its schema is already
    /// known.
    pub fn begin_form_fetch(&mut self) -> Option<(FetchTicket, RecordId)> {
        let form_id = self.condition.as_ref()?.missing_schema(&self.catalog)?;
        Some((self.fetches.issue(FetchKind::FormSchema), form_id))
    }

    /// Apply a fetched form; false if the result was superseded
    ///
    /// A failed fetch leaves the form without fields.
    pub fn apply_form(&mut self, ticket: &FetchTicket, result: Result<FormDocument>) -> bool {
        if !self.fetches.accept(ticket) {
            return false;
        }
        match result {
            Ok(form) => self.catalog.insert(&form),
            Err(e) => log::warn!("Loading form schema failed, using no fields: {}", e),
        }
        if let Some(inspector) = &mut self.condition {
            inspector.refresh(self.editor.graph(), &self.catalog);
        }
        true
    }

    pub fn begin_roles_fetch(&mut self) -> FetchTicket {
        self.fetches.issue(FetchKind::Roles)
    }

    /// Apply fetched roles; false if the result was superseded
    pub fn apply_roles(&mut self, ticket: &FetchTicket, result: Result<Vec<RoleRef>>) -> bool {
        if !self.fetches.accept(ticket) {
            return false;
        }
        self.roles = result.unwrap_or_else(|e| {
            log::warn!("Loading roles failed: {}", e);
            Vec::new()
        });
        true
    }

    pub fn begin_form_list_fetch(&mut self) -> FetchTicket {
        self.fetches.issue(FetchKind::FormList)
    }

    /// Apply a fetched form list; false if the result was superseded
    pub fn apply_form_list(&mut self, ticket: &FetchTicket, result: Result<Vec<FormRef>>) -> bool {
        if !self.fetches.accept(ticket) {
            return false;
        }
        self.forms = result.unwrap_or_else(|e| {
            log::warn!("Loading forms failed: {}", e);
            Vec::new()
        });
        true
    }

    /// Fetch and apply the selected condition node's form schema
    pub async fn load_condition_form(&mut self, provider: &dyn FormSchemaProvider) -> bool {
        let Some((ticket, form_id)) = self.begin_form_fetch() else {
            return false;
        };
        let result = provider.get_form(&form_id).await;
        self.apply_form(&ticket, result)
    }

    /// Fetch and apply the assignable roles
    pub async fn load_roles(&mut self, provider: &dyn RoleProvider) -> bool {
        let ticket = self.begin_roles_fetch();
        let result = provider.list_roles().await;
        self.apply_roles(&ticket, result)
    }

    /// Fetch and apply the forms available to a workflow
    pub async fn load_forms(&mut self, provider: &dyn FormListProvider, workflow_id: &str) -> bool {
        let ticket = self.begin_form_list_fetch();
        let result = provider.list_forms_for_workflow(workflow_id).await;
        self.apply_form_list(&ticket, result)
    }
}
