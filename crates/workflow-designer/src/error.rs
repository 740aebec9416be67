//! Error types for the workflow designer

use thiserror::Error;

/// Result type alias using DesignerError
pub type Result<T> = std::result::Result<T, DesignerError>;

/// Errors that can occur in the designer core
///
/// None of these end an editing session. Structural problems with a
/// connection are reported separately through [`crate::editor::ConnectRejection`].
#[derive(Debug, Error)]
pub enum DesignerError {
    /// A data patch could not be merged into a node's data
    #[error("Invalid data patch for node '{node_id}': {message}")]
    InvalidPatch { node_id: String, message: String },

    /// An inspector edit targeted a node kind that has no such field
    #[error("Node '{node_id}' of kind '{kind}' has no editable field '{field}'")]
    UnsupportedEdit {
        node_id: String,
        kind: String,
        field: &'static str,
    },

    /// A form schema could not be decoded
    #[error("Form schema decode failed: {0}")]
    SchemaDecode(String),

    /// An external collaborator (form/role provider) failed
    #[error("Provider error: {0}")]
    Provider(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Compression error
    #[error("Compression error: {0}")]
    Compression(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DesignerError {
    /// Create a provider error with a message
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    /// Create an invalid patch error for a node
    pub fn invalid_patch(node_id: &str, msg: impl Into<String>) -> Self {
        Self::InvalidPatch {
            node_id: node_id.to_string(),
            message: msg.into(),
        }
    }
}
