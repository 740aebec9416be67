//! Undo/redo history for an editor session
//!
//! A [`Snapshot`] is everything a session needs to come back to an earlier
//! state: the graph plus the condition nodes still waiting for their first
//! incoming edge. Snapshots are kept as zstd-compressed JSON. The history
//! holds the present state separately from the past and future lists, so
//! restoring never has to replay edits.

use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::{DesignerError, Result};
use crate::types::{NodeId, WorkflowGraph};

/// Compression level for stored snapshots
const LEVEL: i32 = 3;

/// A restorable session state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub graph: WorkflowGraph,
    /// Condition nodes whose form seed must survive propagation
    #[serde(default)]
    pub provisional: Vec<NodeId>,
}

impl Snapshot {
    pub fn capture(graph: &WorkflowGraph, provisional: &HashSet<NodeId>) -> Self {
        let mut provisional: Vec<NodeId> = provisional.iter().cloned().collect();
        provisional.sort();
        Self {
            graph: graph.clone(),
            provisional,
        }
    }

    pub fn provisional_set(&self) -> HashSet<NodeId> {
        self.provisional.iter().cloned().collect()
    }

    fn pack(&self) -> Result<Vec<u8>> {
        let json = serde_json::to_vec(self)?;
        zstd::encode_all(&json[..], LEVEL).map_err(|e| DesignerError::Compression(e.to_string()))
    }

    fn unpack(bytes: &[u8]) -> Result<Self> {
        let json = zstd::decode_all(bytes).map_err(|e| DesignerError::Compression(e.to_string()))?;
        Ok(serde_json::from_slice(&json)?)
    }
}

/// Bounded undo/redo history
///
/// `depth` counts every reachable state, the present one included.
pub struct UndoHistory {
    past: VecDeque<Vec<u8>>,
    present: Option<Vec<u8>>,
    future: Vec<Vec<u8>>,
    depth: usize,
}

impl UndoHistory {
    pub fn new(depth: usize) -> Self {
        Self {
            past: VecDeque::new(),
            present: None,
            future: Vec::new(),
            depth: depth.max(1),
        }
    }

    /// Make `snapshot` the present state and forget anything redoable
    pub fn record(&mut self, snapshot: &Snapshot) -> Result<()> {
        let packed = snapshot.pack()?;
        self.future.clear();
        if let Some(previous) = self.present.replace(packed) {
            self.past.push_back(previous);
        }
        while self.past.len() + 1 > self.depth {
            self.past.pop_front();
        }
        Ok(())
    }

    /// Step back one state; None when there is no earlier state
    pub fn undo(&mut self) -> Option<Result<Snapshot>> {
        let earlier = self.past.pop_back()?;
        let result = Snapshot::unpack(&earlier);
        if let Some(current) = self.present.replace(earlier) {
            self.future.push(current);
        }
        Some(result)
    }

    /// Step forward one state; None when nothing was undone
    pub fn redo(&mut self) -> Option<Result<Snapshot>> {
        let later = self.future.pop()?;
        let result = Snapshot::unpack(&later);
        if let Some(current) = self.present.replace(later) {
            self.past.push_back(current);
        }
        Some(result)
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    /// Number of stored states
    pub fn len(&self) -> usize {
        self.past.len() + self.future.len() + usize::from(self.present.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.present.is_none()
    }
}

impl Default for UndoHistory {
    fn default() -> Self {
        Self::new(100)
    }
}
