//! Error types for traversal and visitor validation

use gr_ast::{NodeKind, SlotKey};
use gr_span::Span;

/// Errors raised by the traversal engine
#[derive(Debug, thiserror::Error)]
pub enum TraverseError {
    /// A non-root node was traversed without an enclosing scope
    #[error("cannot traverse a {kind} node without an enclosing scope")]
    MissingScope {
        /// Kind of the offending root
        kind: NodeKind,
    },

    /// A visitor registered hooks for the same kind twice
    #[error("visitor registers kind {kind} more than once")]
    DuplicateKind {
        /// The kind registered twice
        kind: NodeKind,
    },

    /// A visitor both handles and excludes a kind
    #[error("visitor both handles and blacklists kind {kind}")]
    BlacklistedKind {
        /// The conflicting kind
        kind: NodeKind,
    },

    /// A callback tried to replace the walk's root node
    #[error("cannot replace the traversal root")]
    ReplaceAtRoot,

    /// A callback tried to remove the walk's root node
    #[error("cannot remove the traversal root")]
    RemoveRoot,

    /// A callback replaced a single-valued slot with several nodes
    #[error("cannot replace single-valued slot `{slot}` with multiple nodes")]
    ReplaceManyInSingleSlot {
        /// The slot that cannot hold a list
        slot: SlotKey,
    },

    /// A visitor callback returned an error
    #[error("visitor callback failed: {source}")]
    Visitor {
        /// The callback's error
        #[source]
        source: anyhow::Error,
        /// Span of the node being visited, when known
        span: Option<Span>,
    },
}
