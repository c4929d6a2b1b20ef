//! The traversal engine: depth-first dispatch over arena trees
//!
//! The walk is driven by the static kind-to-slot table in [`gr_ast`], so a
//! callback that rewrites a node's kind in place changes what the engine
//! descends into next. Child lists are re-read after every callback; a
//! visit never iterates a stale snapshot.
//!
//! Structural actions take effect immediately, whether they come from an
//! enter or an exit hook: replacement nodes are dispatched to the same
//! visitor before the walk moves on, and removals leave the cursor on the
//! node that slid into the vacated position.

use crate::error::TraverseError;
use crate::scope::{ScopeId, ScopeTree};
use crate::visitor::{Action, Hook, Visitor};
use gr_ast::{visitor_keys, NodeId, SlotKey, Tree};

/// Everything a callback can see and mutate at one visit
pub struct VisitCx<'walk> {
    /// The tree being walked
    pub tree: &'walk mut Tree,
    /// Scope registry for the walk
    pub scopes: &'walk mut ScopeTree,
    /// The node being visited
    pub node: NodeId,
    /// Parent node, absent at the root
    pub parent: Option<NodeId>,
    /// The parent slot holding this node
    pub slot: Option<SlotKey>,
    /// Position within a list-valued slot
    pub index: Option<usize>,
    /// Nearest enclosing (or own) scope; absent for scope-free walks
    pub scope: Option<ScopeId>,
}

/// Outcome of visiting one node, reported to the parent's cursor
enum Flow {
    /// The node is still in place; advance past it
    Normal,
    /// The node was detached; the cursor position now holds its successor
    Removed,
    /// The node was replaced by this many already-visited nodes
    Replaced(usize),
    /// A callback ended the walk
    Stopped,
}

struct Walker<'walk, S> {
    tree: &'walk mut Tree,
    scopes: &'walk mut ScopeTree,
    visitor: &'walk mut Visitor<S>,
    state: &'walk mut S,
}

/// Runs `visitor` over the subtree rooted at `root`
///
/// `parent_scope` is the scope enclosing `root`; it may be `None` only
/// when `root` introduces a scope of its own or the visitor is scope-free.
pub fn traverse<S>(
    tree: &mut Tree,
    root: NodeId,
    visitor: &mut Visitor<S>,
    state: &mut S,
    scopes: &mut ScopeTree,
    parent_scope: Option<ScopeId>,
) -> Result<(), TraverseError> {
    visitor.verify()?;
    let mut walker = Walker {
        tree,
        scopes,
        visitor,
        state,
    };
    walker.visit(root, None, None, None, parent_scope)?;
    Ok(())
}

/// Runs `visitor` over several roots in order, sharing one walk
///
/// A `Stop` from any callback ends the walk; later roots are not visited.
pub fn traverse_list<S>(
    tree: &mut Tree,
    roots: &[NodeId],
    visitor: &mut Visitor<S>,
    state: &mut S,
    scopes: &mut ScopeTree,
    parent_scope: Option<ScopeId>,
) -> Result<(), TraverseError> {
    visitor.verify()?;
    let mut walker = Walker {
        tree,
        scopes,
        visitor,
        state,
    };
    for root in roots {
        if let Flow::Stopped = walker.visit(*root, None, None, None, parent_scope)? {
            break;
        }
    }
    Ok(())
}

impl<S> Walker<'_, S> {
    fn visit(
        &mut self,
        node: NodeId,
        parent: Option<NodeId>,
        slot: Option<SlotKey>,
        index: Option<usize>,
        parent_scope: Option<ScopeId>,
    ) -> Result<Flow, TraverseError> {
        let kind = self.tree.kind(node);
        if self.visitor.blacklist.contains(&kind) {
            return Ok(Flow::Normal);
        }
        if let Some(predicate) = self.visitor.should_skip.as_ref() {
            if predicate(self.tree, node, self.state) {
                return Ok(Flow::Normal);
            }
        }

        let scope = if self.visitor.no_scope {
            None
        } else if kind.is_scope() {
            Some(self.scopes.ensure(self.tree, node, parent_scope))
        } else if parent_scope.is_some() {
            parent_scope
        } else {
            return Err(TraverseError::MissingScope { kind });
        };

        let mut skip_children = false;
        let enter = self.run_enter(node, parent, slot, index, scope)?;
        match enter {
            Action::Continue => {}
            Action::Skip => skip_children = true,
            Action::Stop => return Ok(Flow::Stopped),
            Action::Remove => {
                self.detach(node, parent, slot, index)?;
                return Ok(Flow::Removed);
            }
            Action::Replace(replacement) => {
                return self.replace(node, parent, slot, index, parent_scope, vec![replacement]);
            }
            Action::ReplaceMany(replacements) => {
                return self.replace(node, parent, slot, index, parent_scope, replacements);
            }
        }

        if !skip_children {
            if let Flow::Stopped = self.walk_children(node, scope)? {
                return Ok(Flow::Stopped);
            }
        }

        match self.run_exit(node, parent, slot, index, scope)? {
            Action::Continue | Action::Skip => Ok(Flow::Normal),
            Action::Stop => Ok(Flow::Stopped),
            Action::Remove => {
                self.detach(node, parent, slot, index)?;
                Ok(Flow::Removed)
            }
            Action::Replace(replacement) => {
                self.replace(node, parent, slot, index, parent_scope, vec![replacement])
            }
            Action::ReplaceMany(replacements) => {
                self.replace(node, parent, slot, index, parent_scope, replacements)
            }
        }
    }

    /// Enter dispatch: the generic hook, then the kind hook; the first
    /// action other than `Continue` wins
    fn run_enter(
        &mut self,
        node: NodeId,
        parent: Option<NodeId>,
        slot: Option<SlotKey>,
        index: Option<usize>,
        scope: Option<ScopeId>,
    ) -> Result<Action, TraverseError> {
        if let Some(hook) = self.visitor.enter.as_mut() {
            let action = call_hook(
                hook,
                &mut *self.tree,
                &mut *self.scopes,
                &mut *self.state,
                node,
                parent,
                slot,
                index,
                scope,
            )?;
            if !matches!(action, Action::Continue) {
                return Ok(action);
            }
        }
        let kind = self.tree.kind(node);
        if let Some(hooks) = self.visitor.kinds.get_mut(&kind) {
            if let Some(hook) = hooks.enter.as_mut() {
                return call_hook(
                    hook,
                    &mut *self.tree,
                    &mut *self.scopes,
                    &mut *self.state,
                    node,
                    parent,
                    slot,
                    index,
                    scope,
                );
            }
        }
        Ok(Action::Continue)
    }

    /// Exit dispatch: the kind hook, then the generic hook
    fn run_exit(
        &mut self,
        node: NodeId,
        parent: Option<NodeId>,
        slot: Option<SlotKey>,
        index: Option<usize>,
        scope: Option<ScopeId>,
    ) -> Result<Action, TraverseError> {
        let kind = self.tree.kind(node);
        if let Some(hooks) = self.visitor.kinds.get_mut(&kind) {
            if let Some(hook) = hooks.exit.as_mut() {
                let action = call_hook(
                    hook,
                    &mut *self.tree,
                    &mut *self.scopes,
                    &mut *self.state,
                    node,
                    parent,
                    slot,
                    index,
                    scope,
                )?;
                if !matches!(action, Action::Continue) {
                    return Ok(action);
                }
            }
        }
        if let Some(hook) = self.visitor.exit.as_mut() {
            return call_hook(
                hook,
                &mut *self.tree,
                &mut *self.scopes,
                &mut *self.state,
                node,
                parent,
                slot,
                index,
                scope,
            );
        }
        Ok(Action::Continue)
    }

    /// Descends into every populated child slot of `node`, re-reading the
    /// node's kind and each list after every child visit
    fn walk_children(
        &mut self,
        node: NodeId,
        scope: Option<ScopeId>,
    ) -> Result<Flow, TraverseError> {
        let mut key_index = 0;
        loop {
            let keys = visitor_keys(self.tree.kind(node));
            let Some(key) = keys.get(key_index).copied() else {
                return Ok(Flow::Normal);
            };
            if key.is_list() {
                let mut child_index = 0;
                loop {
                    let children = self.tree.list(node, key);
                    let Some(child) = children.get(child_index).copied() else {
                        break;
                    };
                    let flow =
                        self.visit(child, Some(node), Some(key), Some(child_index), scope)?;
                    match flow {
                        Flow::Stopped => return Ok(Flow::Stopped),
                        Flow::Removed => {}
                        Flow::Replaced(count) => child_index += count,
                        Flow::Normal => child_index += 1,
                    }
                }
            } else if let Some(child) = self.tree.single(node, key) {
                let flow = self.visit(child, Some(node), Some(key), None, scope)?;
                if let Flow::Stopped = flow {
                    return Ok(Flow::Stopped);
                }
            }
            key_index += 1;
        }
    }

    /// Applies a replacement and dispatches the replacement nodes before
    /// returning control to the parent's cursor
    fn replace(
        &mut self,
        node: NodeId,
        parent: Option<NodeId>,
        slot: Option<SlotKey>,
        index: Option<usize>,
        parent_scope: Option<ScopeId>,
        replacements: Vec<NodeId>,
    ) -> Result<Flow, TraverseError> {
        if replacements.is_empty() {
            self.detach(node, parent, slot, index)?;
            return Ok(Flow::Removed);
        }
        let count = replacements.len();
        self.attach(node, parent, slot, index, replacements)?;

        let parent = parent.ok_or(TraverseError::ReplaceAtRoot)?;
        let slot = slot.ok_or(TraverseError::ReplaceAtRoot)?;
        match index {
            Some(start) => {
                let mut cursor = start;
                let mut end = start + count;
                while cursor < end {
                    let children = self.tree.list(parent, slot);
                    let Some(child) = children.get(cursor).copied() else {
                        break;
                    };
                    let flow =
                        self.visit(child, Some(parent), Some(slot), Some(cursor), parent_scope)?;
                    match flow {
                        Flow::Stopped => return Ok(Flow::Stopped),
                        Flow::Removed => end -= 1,
                        Flow::Replaced(nested) => {
                            cursor += nested;
                            end = end + nested - 1;
                        }
                        Flow::Normal => cursor += 1,
                    }
                }
                Ok(Flow::Replaced(end - start))
            }
            None => {
                if let Some(child) = self.tree.single(parent, slot) {
                    let flow = self.visit(child, Some(parent), Some(slot), None, parent_scope)?;
                    if let Flow::Stopped = flow {
                        return Ok(Flow::Stopped);
                    }
                }
                Ok(Flow::Replaced(1))
            }
        }
    }

    /// Detaches `node` from its parent slot
    fn detach(
        &mut self,
        _node: NodeId,
        parent: Option<NodeId>,
        slot: Option<SlotKey>,
        index: Option<usize>,
    ) -> Result<(), TraverseError> {
        let parent = parent.ok_or(TraverseError::RemoveRoot)?;
        let slot = slot.ok_or(TraverseError::RemoveRoot)?;
        match index {
            Some(position) => self.tree.splice(parent, slot, position, 1, Vec::new()),
            None => self.tree.set_single(parent, slot, None),
        }
        Ok(())
    }

    /// Writes `replacements` over `node`'s position in its parent slot
    fn attach(
        &mut self,
        _node: NodeId,
        parent: Option<NodeId>,
        slot: Option<SlotKey>,
        index: Option<usize>,
        replacements: Vec<NodeId>,
    ) -> Result<(), TraverseError> {
        let parent = parent.ok_or(TraverseError::ReplaceAtRoot)?;
        let slot = slot.ok_or(TraverseError::ReplaceAtRoot)?;
        match index {
            Some(position) => self.tree.splice(parent, slot, position, 1, replacements),
            None => {
                if replacements.len() > 1 {
                    return Err(TraverseError::ReplaceManyInSingleSlot { slot });
                }
                self.tree
                    .set_single(parent, slot, replacements.first().copied());
            }
        }
        Ok(())
    }
}

#[allow(
    clippy::too_many_arguments,
    reason = "flattened visit position, assembled into the context here"
)]
fn call_hook<S>(
    hook: &mut Hook<S>,
    tree: &mut Tree,
    scopes: &mut ScopeTree,
    state: &mut S,
    node: NodeId,
    parent: Option<NodeId>,
    slot: Option<SlotKey>,
    index: Option<usize>,
    scope: Option<ScopeId>,
) -> Result<Action, TraverseError> {
    let span = tree.node(node).span;
    let mut context = VisitCx {
        tree,
        scopes,
        node,
        parent,
        slot,
        index,
        scope,
    };
    hook(&mut context, state).map_err(|source| TraverseError::Visitor { source, span })
}
