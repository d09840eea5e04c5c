//! Graph mutation observer.
//!
//! Every session operation records what it did here. At the end of the
//! mutation cycle the session drains the queue: structural events trigger a
//! propagation run, canvas-only events merely regenerate the artifacts.

use crate::block::{BlockId, Position};
use crate::variables::VariableId;

#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    Created(BlockId),
    Deleted(Vec<BlockId>),
    /// Connected or disconnected.
    Reconnected(BlockId),
    /// Dragged on the canvas without changing any connection. `reordered`
    /// is set when the move changed the order of the top-level blocks, which
    /// decides the binder a variable takes its type from.
    Moved {
        block: BlockId,
        to: Position,
        reordered: bool,
    },
    FieldChanged { block: BlockId, field: &'static str },
    VariableCreated(VariableId),
    VariableRenamed(VariableId),
    VariableDeleted(VariableId),
    Loaded,
    CatalogReplaced,
    /// Explicit re-validation request from the host.
    Revalidate,
}

impl GraphEvent {
    /// Whether types may have changed.
    pub fn is_structural(&self) -> bool {
        !matches!(
            self,
            GraphEvent::Moved { reordered: false, .. } | GraphEvent::VariableRenamed(_)
        )
    }
}

#[derive(Debug, Default)]
pub struct MutationObserver {
    pending: Vec<GraphEvent>,
}

impl MutationObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: GraphEvent) {
        tracing::trace!(?event, "graph event");
        self.pending.push(event);
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }

    /// Take the pending events. Returns whether any of them was structural.
    pub fn drain(&mut self) -> (Vec<GraphEvent>, bool) {
        let events = std::mem::take(&mut self.pending);
        let structural = events.iter().any(GraphEvent::is_structural);
        (events, structural)
    }
}
