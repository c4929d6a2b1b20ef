//! Visitor sets: per-kind enter/exit hooks plus generic hooks
//!
//! Visitors are long-lived values reused across many trees, so their shape
//! is validated once, before the first walk, rather than silently
//! no-opping mid-walk. The builder makes most malformed shapes
//! unrepresentable; the two hazards it cannot rule out — a kind registered
//! twice, and a kind that is both handled and excluded — are caught by
//! [`Visitor::verify`].

use crate::engine::VisitCx;
use crate::error::TraverseError;
use gr_ast::{NodeId, NodeKind, Tree};
use rustc_hash::FxHashMap;

/// What a callback asks the engine to do next
#[derive(Debug)]
pub enum Action {
    /// Proceed normally
    Continue,
    /// Do not descend into this node's children
    Skip,
    /// End the entire current walk immediately
    Stop,
    /// Remove this node from its parent slot
    Remove,
    /// Replace this node with another node
    Replace(NodeId),
    /// Replace this node with a flattened list of nodes
    ReplaceMany(Vec<NodeId>),
}

/// A fallible visitor callback
pub type Hook<S> = Box<dyn FnMut(&mut VisitCx<'_>, &mut S) -> anyhow::Result<Action>>;

/// Predicate consulted before visiting a node
pub type SkipFn<S> = Box<dyn Fn(&Tree, NodeId, &S) -> bool>;

/// Enter/exit pair registered for one node kind
pub struct KindHooks<S> {
    /// Called before descending into the node
    pub enter: Option<Hook<S>>,
    /// Called after the node's children have been visited
    pub exit: Option<Hook<S>>,
}

/// A validated set of traversal callbacks, generic over walk state `S`
pub struct Visitor<S> {
    pub(crate) enter: Option<Hook<S>>,
    pub(crate) exit: Option<Hook<S>>,
    pub(crate) should_skip: Option<SkipFn<S>>,
    pub(crate) kinds: FxHashMap<NodeKind, KindHooks<S>>,
    pub(crate) blacklist: Vec<NodeKind>,
    pub(crate) no_scope: bool,
    duplicate: Option<NodeKind>,
    verified: bool,
}

impl<S> Visitor<S> {
    /// Creates an empty visitor
    pub fn new() -> Self {
        Self {
            enter: None,
            exit: None,
            should_skip: None,
            kinds: FxHashMap::default(),
            blacklist: Vec::new(),
            no_scope: false,
            duplicate: None,
            verified: false,
        }
    }

    /// Registers the generic enter hook, called for every node
    pub fn on_enter(
        mut self,
        hook: impl FnMut(&mut VisitCx<'_>, &mut S) -> anyhow::Result<Action> + 'static,
    ) -> Self {
        self.enter = Some(Box::new(hook));
        self
    }

    /// Registers the generic exit hook, called for every node
    pub fn on_exit(
        mut self,
        hook: impl FnMut(&mut VisitCx<'_>, &mut S) -> anyhow::Result<Action> + 'static,
    ) -> Self {
        self.exit = Some(Box::new(hook));
        self
    }

    /// Registers an enter hook for one node kind
    pub fn on_kind_enter(
        mut self,
        kind: NodeKind,
        hook: impl FnMut(&mut VisitCx<'_>, &mut S) -> anyhow::Result<Action> + 'static,
    ) -> Self {
        let hooks = self.kinds.entry(kind).or_insert_with(|| KindHooks {
            enter: None,
            exit: None,
        });
        if hooks.enter.is_some() {
            self.duplicate = Some(kind);
        }
        hooks.enter = Some(Box::new(hook));
        self
    }

    /// Registers an exit hook for one node kind
    pub fn on_kind_exit(
        mut self,
        kind: NodeKind,
        hook: impl FnMut(&mut VisitCx<'_>, &mut S) -> anyhow::Result<Action> + 'static,
    ) -> Self {
        let hooks = self.kinds.entry(kind).or_insert_with(|| KindHooks {
            enter: None,
            exit: None,
        });
        if hooks.exit.is_some() {
            self.duplicate = Some(kind);
        }
        hooks.exit = Some(Box::new(hook));
        self
    }

    /// Registers a predicate that suppresses visiting matching nodes
    pub fn skip_when(mut self, predicate: impl Fn(&Tree, NodeId, &S) -> bool + 'static) -> Self {
        self.should_skip = Some(Box::new(predicate));
        self
    }

    /// Excludes whole subtrees rooted at nodes of the given kinds
    pub fn with_blacklist(mut self, kinds: impl IntoIterator<Item = NodeKind>) -> Self {
        self.blacklist.extend(kinds);
        self
    }

    /// Marks this visitor as scope-free; the engine will neither create
    /// nor consult scopes while it walks
    pub fn without_scope(mut self) -> Self {
        self.no_scope = true;
        self
    }

    /// Validates the visitor's shape once; subsequent calls are free
    pub fn verify(&mut self) -> Result<(), TraverseError> {
        if self.verified {
            return Ok(());
        }
        if let Some(kind) = self.duplicate {
            return Err(TraverseError::DuplicateKind { kind });
        }
        for kind in self.kinds.keys() {
            if self.blacklist.contains(kind) {
                return Err(TraverseError::BlacklistedKind { kind: *kind });
            }
        }
        self.verified = true;
        Ok(())
    }
}

impl<S> Default for Visitor<S> {
    fn default() -> Self {
        Self::new()
    }
}
