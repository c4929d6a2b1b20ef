//! Generic depth-first tree traversal with structural mutation
//!
//! This crate walks [`gr_ast`] trees, dispatching enter/exit callbacks per
//! node kind, applying structural actions (skip, stop, remove, replace)
//! returned by callbacks, and maintaining the lexical scope model as
//! scope-introducing nodes are entered. Passes are expressed as
//! [`Visitor`] values; the engine guarantees deterministic visit order
//! driven entirely by the static kind-to-slot table.

pub mod engine;
pub mod error;
pub mod scope;
pub mod visitor;

pub use engine::{traverse, traverse_list, VisitCx};
pub use error::TraverseError;
pub use scope::{Binding, BindingKind, ScopeData, ScopeId, ScopeTree, TypeTag};
pub use visitor::{Action, Hook, KindHooks, SkipFn, Visitor};

use gr_ast::{NodeId, NodeKind, Tree};

/// Strips transient metadata (spans, comments, pass marks) from every node
/// in the subtree rooted at `root`
pub fn remove_properties(tree: &mut Tree, root: NodeId) -> Result<(), TraverseError> {
    let mut visitor: Visitor<()> = Visitor::new().without_scope().on_enter(|context, ()| {
        context.tree.node_mut(context.node).clear_transient();
        Ok(Action::Continue)
    });
    let mut scopes = ScopeTree::new();
    traverse(tree, root, &mut visitor, &mut (), &mut scopes, None)
}

/// Whether the subtree rooted at `root` contains a node of kind `wanted`,
/// ignoring anything beneath a node whose kind is in `blacklist`
pub fn has_kind(tree: &Tree, root: NodeId, wanted: NodeKind, blacklist: &[NodeKind]) -> bool {
    if blacklist.contains(&tree.kind(root)) {
        return false;
    }
    if tree.kind(root) == wanted {
        return true;
    }
    for key in gr_ast::visitor_keys(tree.kind(root)) {
        if key.is_list() {
            for child in tree.list(root, *key) {
                if has_kind(tree, *child, wanted, blacklist) {
                    return true;
                }
            }
        } else if let Some(child) = tree.single(root, *key) {
            if has_kind(tree, child, wanted, blacklist) {
                return true;
            }
        }
    }
    false
}
