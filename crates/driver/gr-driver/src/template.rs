//! Named, pre-parsed code templates
//!
//! Templates are registered once as source text, parsed into their own
//! private trees, and materialized on demand: the fragment is deep-copied
//! into the target tree, stripped of transient metadata so cloned nodes
//! never carry stale spans or comments, and identifier placeholders are
//! replaced by the caller's substitution nodes.

use crate::error::Error;
use gr_ast::interface::{ParseOptions, Parser};
use gr_ast::{NodeId, NodeKind, SlotKey, Tree};
use gr_intern::Interner;
use rustc_hash::FxHashMap;

/// What a materialized template produced
pub enum TemplateResult {
    /// A single expression or statement node
    Single(NodeId),
    /// Several top-level statement nodes
    Many(Vec<NodeId>),
}

#[derive(Clone)]
struct Fragment {
    tree: Tree,
    root: NodeId,
}

/// Pre-parsed fragments keyed by name
#[derive(Clone, Default)]
pub struct TemplateRegistry {
    fragments: FxHashMap<String, Fragment>,
}

impl TemplateRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and stores a fragment under `name`
    pub fn register(
        &mut self,
        name: impl Into<String>,
        source: &str,
        parser: &dyn Parser,
        interner: &Interner,
    ) -> Result<(), Error> {
        let name = name.into();
        let mut tree = Tree::new();
        let root = parser
            .parse(&ParseOptions::default(), source, &mut tree, interner)
            .map_err(|diagnostic| Error::Configuration {
                message: format!("template `{name}` does not parse: {diagnostic}"),
            })?;
        self.fragments.insert(name, Fragment { tree, root });
        Ok(())
    }

    /// Whether a fragment named `name` exists
    pub fn contains(&self, name: &str) -> bool {
        self.fragments.contains_key(name)
    }

    /// Clones the named fragment into `target`, substituting identifier
    /// placeholders, and returns its top-level node(s)
    pub fn materialize(
        &self,
        name: &str,
        target: &mut Tree,
        substitutions: &FxHashMap<String, NodeId>,
        interner: &Interner,
    ) -> Result<TemplateResult, Error> {
        let fragment = self
            .fragments
            .get(name)
            .ok_or_else(|| Error::UnknownTemplate {
                name: name.to_owned(),
            })?;
        let imported = target.import_subtree(&fragment.tree, fragment.root);
        gr_traverse::remove_properties(target, imported).map_err(|walk_error| {
            Error::Configuration {
                message: format!("template `{name}` could not be prepared: {walk_error}"),
            }
        })?;

        let resolved: FxHashMap<gr_intern::Symbol, NodeId> = substitutions
            .iter()
            .map(|(key, node)| (interner.intern(key), *node))
            .collect();
        substitute(target, imported, &resolved);

        let body = target.list(imported, SlotKey::Body).to_vec();
        if let [only] = body[..] {
            if target.kind(only) == NodeKind::ExpressionStatement {
                if let Some(expression) = target.single(only, SlotKey::Expression) {
                    return Ok(TemplateResult::Single(expression));
                }
            }
            return Ok(TemplateResult::Single(only));
        }
        Ok(TemplateResult::Many(body))
    }
}

/// Replaces identifier children whose name matches a substitution key;
/// substituted subtrees are not re-walked, so a substitution value may
/// itself contain placeholder-like names safely
fn substitute(tree: &mut Tree, node: NodeId, resolved: &FxHashMap<gr_intern::Symbol, NodeId>) {
    for key in gr_ast::visitor_keys(tree.kind(node)) {
        if key.is_list() {
            let children = tree.list(node, *key).to_vec();
            for (position, child) in children.into_iter().enumerate() {
                if let Some(replacement) = substitution_for(tree, child, resolved) {
                    tree.splice(node, *key, position, 1, vec![replacement]);
                } else {
                    substitute(tree, child, resolved);
                }
            }
        } else if let Some(child) = tree.single(node, *key) {
            if let Some(replacement) = substitution_for(tree, child, resolved) {
                tree.set_single(node, *key, Some(replacement));
            } else {
                substitute(tree, child, resolved);
            }
        }
    }
}

fn substitution_for(
    tree: &mut Tree,
    child: NodeId,
    resolved: &FxHashMap<gr_intern::Symbol, NodeId>,
) -> Option<NodeId> {
    if tree.kind(child) != NodeKind::Identifier {
        return None;
    }
    let name = tree.node(child).name?;
    let replacement = resolved.get(&name)?;
    Some(tree.clone_subtree(*replacement))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gr_ast::Literal;
    use gr_parser::DefaultParser;

    fn registry_with(name: &str, source: &str, interner: &Interner) -> TemplateRegistry {
        let mut registry = TemplateRegistry::new();
        registry
            .register(name, source, &DefaultParser, interner)
            .expect("register");
        registry
    }

    #[test]
    fn test_single_expression_fragment() {
        let interner = Interner::new();
        let registry = registry_with("wrap", "(function (VALUE) { return VALUE; });", &interner);

        let mut target = Tree::new();
        let value = target.literal(Literal::Number(7.0), None);
        let mut subs = FxHashMap::default();
        subs.insert("VALUE".to_owned(), value);

        let result = registry
            .materialize("wrap", &mut target, &subs, &interner)
            .expect("materialize");
        let TemplateResult::Single(node) = result else {
            panic!("expected a single node");
        };
        assert_eq!(target.kind(node), NodeKind::FunctionExpression);
        // the parameter placeholder was substituted
        let param = target.list(node, SlotKey::Params)[0];
        assert_eq!(target.kind(param), NodeKind::Literal);
    }

    #[test]
    fn test_multi_statement_fragment() {
        let interner = Interner::new();
        let registry = registry_with("setup", "var a = 1;\nvar b = 2;", &interner);
        let mut target = Tree::new();
        let result = registry
            .materialize("setup", &mut target, &FxHashMap::default(), &interner)
            .expect("materialize");
        let TemplateResult::Many(nodes) = result else {
            panic!("expected a statement list");
        };
        assert_eq!(nodes.len(), 2);
    }

    #[test]
    fn test_materialized_nodes_carry_no_stale_metadata() {
        let interner = Interner::new();
        let registry = registry_with("bare", "// note\nx;", &interner);
        let mut target = Tree::new();
        let result = registry
            .materialize("bare", &mut target, &FxHashMap::default(), &interner)
            .expect("materialize");
        let TemplateResult::Single(node) = result else {
            panic!("expected a single node");
        };
        assert_eq!(target.node(node).span, None);
    }

    #[test]
    fn test_unknown_template() {
        let interner = Interner::new();
        let registry = TemplateRegistry::new();
        let mut target = Tree::new();
        let result = registry.materialize("missing", &mut target, &FxHashMap::default(), &interner);
        assert!(matches!(result, Err(Error::UnknownTemplate { name }) if name == "missing"));
    }
}
