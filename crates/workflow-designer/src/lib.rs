//! Workflow Designer - graph editing core for a visual workflow designer
//!
//! This crate holds everything a visual workflow editor needs except the
//! drawing itself:
//!
//! - A closed set of node kinds with typed, serializable data
//! - Connection rules (single fan-out, per-rule and per-branch handles)
//! - A condition rule engine bound to external form schemas
//! - Propagation of form bindings from fill-form nodes to condition nodes
//! - Change notification that skips the initial state and no-op updates
//! - Compressed snapshot-based undo/redo
//!
//! # Architecture
//!
//! - `GraphEditor`: owns the nodes and edges and enforces the connection rules
//! - `EditorSession`: one open designer; runs propagation, change emission
//!   and undo recording once after every committed mutation
//! - `ConditionInspector` / `apply_edit`: the node inspector contract
//! - `FormSchemaProvider`, `RoleProvider`, `FormListProvider`: the external
//!   collaborators, with `FetchTracker` discarding superseded results
//!
//! # Example
//!
//! ```ignore
//! use workflow_designer::{EditorConfig, EditorSession, NodeKind, NullChangeSink, WorkflowGraph};
//!
//! let mut session = EditorSession::open(
//!     WorkflowGraph::new(),
//!     EditorConfig::default(),
//!     Box::new(NullChangeSink),
//! );
//! let start = session.add_node(NodeKind::Start);
//! let end = session.add_node(NodeKind::End);
//! session.connect(&start.id, &end.id, None)?;
//! ```

pub mod builder;
pub mod conditions;
pub mod config;
pub mod editor;
pub mod error;
pub mod events;
pub mod inspector;
pub mod palette;
pub mod propagation;
pub mod providers;
pub mod schema;
pub mod session;
pub mod types;
pub mod undo;
pub mod validation;

// Re-export key types
pub use builder::WorkflowBuilder;
pub use conditions::{
    commit_rules, operators_for, ConditionRule, Operator, OperatorOption, RuleEditor, RuleKey,
    RuleState,
};
pub use config::EditorConfig;
pub use editor::{ConnectRejection, GraphEditor};
pub use error::{DesignerError, Result};
pub use events::{ChangeEmitter, GraphChangeSink, NullChangeSink, SinkError, VecChangeSink};
pub use inspector::{apply_edit, editable_fields, ConditionInspector, EditableField, InspectorEdit};
pub use palette::{palette, PaletteEntry};
pub use propagation::{propagate, BindingChange, Propagation};
pub use providers::{
    FetchKind, FetchTicket, FetchTracker, FormListProvider, FormSchemaProvider, InMemoryDirectory,
    RoleProvider,
};
pub use schema::{normalize_field_options, FieldInfo, FieldOption, FieldType, FormCatalog, FormDocument};
pub use session::{EditorSession, Viewport};
pub use types::{Edge, FormRef, Node, NodeData, NodeKind, Position, RecordId, RoleRef, WorkflowGraph};
pub use undo::{Snapshot, UndoHistory};
pub use validation::{validate_graph, ValidationError};
