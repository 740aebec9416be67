//! Change notification for the persistence collaborator
//!
//! The host is told about the graph once per real change: the state the
//! session was opened with is never reported, and a mutation that leaves
//! the graph equal to the last reported one is swallowed.

use crate::types::WorkflowGraph;

/// Trait for receiving graph changes
///
/// This abstracts over the transport (callback into a UI layer, channel,
/// autosave queue) so the core can be embedded in different hosts.
pub trait GraphChangeSink: Send + Sync {
    /// Receive the full current graph
    ///
    /// Returns an error if the change could not be delivered (e.g., channel closed)
    fn on_change(&self, graph: &WorkflowGraph) -> Result<(), SinkError>;
}

/// Error when delivering a change fails
#[derive(Debug, Clone)]
pub struct SinkError {
    pub message: String,
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Change sink error: {}", self.message)
    }
}

impl std::error::Error for SinkError {}

impl SinkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn channel_closed() -> Self {
        Self::new("Channel closed")
    }
}

/// Deep-compares graphs against the last reported one
#[derive(Debug, Default)]
pub struct ChangeEmitter {
    last: Option<WorkflowGraph>,
}

impl ChangeEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember `graph` as already known to the host, without reporting it
    pub fn prime(&mut self, graph: &WorkflowGraph) {
        self.last = Some(graph.clone());
    }

    /// Whether `graph` differs from the last reported graph
    pub fn differs(&self, graph: &WorkflowGraph) -> bool {
        self.last.as_ref().is_some_and(|last| last != graph)
    }

    /// Report `graph` to `sink` if it differs from the last reported graph
    ///
    /// The first graph ever observed only primes the emitter. Returns true
    /// when the sink was invoked. A failing sink is logged; the graph still
    /// counts as reported so it is not sent twice.
    pub fn observe(&mut self, graph: &WorkflowGraph, sink: &dyn GraphChangeSink) -> bool {
        match &self.last {
            None => {
                self.prime(graph);
                false
            }
            Some(last) if last == graph => false,
            Some(_) => {
                if let Err(e) = sink.on_change(graph) {
                    log::warn!("Failed to deliver graph change: {}", e);
                }
                self.prime(graph);
                true
            }
        }
    }
}

/// A no-op sink that discards all changes
///
/// Useful for testing or when the host persists on its own schedule.
pub struct NullChangeSink;

impl GraphChangeSink for NullChangeSink {
    fn on_change(&self, _graph: &WorkflowGraph) -> Result<(), SinkError> {
        Ok(())
    }
}

/// A vector-based sink that collects every reported graph
///
/// Useful for testing to verify changes were reported correctly.
pub struct VecChangeSink {
    changes: std::sync::Mutex<Vec<WorkflowGraph>>,
}

impl VecChangeSink {
    pub fn new() -> Self {
        Self {
            changes: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Get all collected graphs
    pub fn changes(&self) -> Vec<WorkflowGraph> {
        self.changes
            .lock()
            .map(|changes| changes.clone())
            .unwrap_or_default()
    }

    /// Number of collected graphs
    pub fn len(&self) -> usize {
        self.changes.lock().map(|changes| changes.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all collected graphs
    pub fn clear(&self) {
        if let Ok(mut changes) = self.changes.lock() {
            changes.clear();
        }
    }
}

impl Default for VecChangeSink {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphChangeSink for VecChangeSink {
    fn on_change(&self, graph: &WorkflowGraph) -> Result<(), SinkError> {
        self.changes
            .lock()
            .map_err(|_| SinkError::new("sink lock poisoned"))?
            .push(graph.clone());
        Ok(())
    }
}

impl<T: GraphChangeSink + ?Sized> GraphChangeSink for std::sync::Arc<T> {
    fn on_change(&self, graph: &WorkflowGraph) -> Result<(), SinkError> {
        (**self).on_change(graph)
    }
}
