//! External collaborators and the stale fetch guard
//!
//! Forms and roles live outside the designer. The inspector asks for them
//! through the provider traits below and applies the answers when they
//! arrive. Because the graph stays editable while a request is pending, an
//! answer can arrive after the user has moved on; [`FetchTracker`] tells the
//! caller which answers are still wanted.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::{DesignerError, Result};
use crate::schema::FormDocument;
use crate::types::{FormRef, NodeId, RecordId, RoleRef};

/// Source of form definitions, including their field schema
#[async_trait]
pub trait FormSchemaProvider: Send + Sync {
    /// Fetch one form; the schema may still be JSON-encoded
    async fn get_form(&self, id: &RecordId) -> Result<FormDocument>;
}

/// Source of assignable roles
#[async_trait]
pub trait RoleProvider: Send + Sync {
    async fn list_roles(&self) -> Result<Vec<RoleRef>>;
}

/// Source of the forms a workflow may use
#[async_trait]
pub trait FormListProvider: Send + Sync {
    async fn list_forms_for_workflow(&self, workflow_id: &str) -> Result<Vec<FormRef>>;
}

/// In-memory provider for all three collaborator traits
///
/// Useful for tests and for hosts that preload their directory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    forms: HashMap<RecordId, FormDocument>,
    roles: Vec<RoleRef>,
    workflow_forms: HashMap<String, Vec<RecordId>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a form
    pub fn with_form(mut self, form: FormDocument) -> Self {
        self.forms.insert(form.id.clone(), form);
        self
    }

    /// Register a role
    pub fn with_role(mut self, role: RoleRef) -> Self {
        self.roles.push(role);
        self
    }

    /// Make a registered form available to a workflow
    pub fn with_workflow_form(mut self, workflow_id: impl Into<String>, form_id: impl Into<RecordId>) -> Self {
        self.workflow_forms
            .entry(workflow_id.into())
            .or_default()
            .push(form_id.into());
        self
    }
}

#[async_trait]
impl FormSchemaProvider for InMemoryDirectory {
    async fn get_form(&self, id: &RecordId) -> Result<FormDocument> {
        self.forms
            .get(id)
            .cloned()
            .ok_or_else(|| DesignerError::provider(format!("Form '{}' not found", id)))
    }
}

#[async_trait]
impl RoleProvider for InMemoryDirectory {
    async fn list_roles(&self) -> Result<Vec<RoleRef>> {
        Ok(self.roles.clone())
    }
}

#[async_trait]
impl FormListProvider for InMemoryDirectory {
    async fn list_forms_for_workflow(&self, workflow_id: &str) -> Result<Vec<FormRef>> {
        let ids = self
            .workflow_forms
            .get(workflow_id)
            .map(Vec::as_slice)
            .unwrap_or_default();
        Ok(ids
            .iter()
            .filter_map(|id| self.forms.get(id))
            .map(|form| FormRef::new(form.id.clone(), form.title.clone()))
            .collect())
    }
}

/// What a fetch asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchKind {
    /// The schema of the form bound to the inspected node
    FormSchema,
    Roles,
    FormList,
}

/// Identifies one issued fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    kind: FetchKind,
    generation: u64,
    node_id: Option<NodeId>,
}

impl FetchTicket {
    pub fn kind(&self) -> FetchKind {
        self.kind
    }

    /// Node that was inspected when the fetch was issued
    pub fn node_id(&self) -> Option<&str> {
        self.node_id.as_deref()
    }
}

/// Tracks which fetch results are still wanted
///
/// A result is wanted when no newer fetch of the same kind has been issued
/// and the inspector still shows the node the fetch was issued for.
#[derive(Debug, Default)]
pub struct FetchTracker {
    generations: HashMap<FetchKind, u64>,
    inspected: Option<NodeId>,
}

impl FetchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the node the inspector now shows
    pub fn inspect(&mut self, node_id: Option<&str>) {
        self.inspected = node_id.map(str::to_string);
    }

    pub fn inspected(&self) -> Option<&str> {
        self.inspected.as_deref()
    }

    /// Issue a fetch, superseding any pending fetch of the same kind
    pub fn issue(&mut self, kind: FetchKind) -> FetchTicket {
        let generation = self.generations.entry(kind).or_insert(0);
        *generation += 1;
        FetchTicket {
            kind,
            generation: *generation,
            node_id: self.inspected.clone(),
        }
    }

    /// Whether the result for `ticket` should be applied
    pub fn accept(&self, ticket: &FetchTicket) -> bool {
        let current = self.generations.get(&ticket.kind).copied().unwrap_or(0);
        if current != ticket.generation {
            log::debug!(
                "Ignoring superseded {:?} result (generation {} < {})",
                ticket.kind,
                ticket.generation,
                current
            );
            return false;
        }
        if ticket.node_id != self.inspected {
            log::debug!(
                "Ignoring {:?} result for node {:?}; inspector now shows {:?}",
                ticket.kind,
                ticket.node_id,
                self.inspected
            );
            return false;
        }
        true
    }
}
