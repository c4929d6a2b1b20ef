//! Per-compilation context threaded through visitor callbacks
//!
//! [`UnitCx`] is the walk state every pass sees: the interner, dynamic
//! key/value storage, helper-injection bookkeeping, and template access.
//! Tree and scope access come from the traversal's own visit context, so
//! this type carries only what outlives a single callback.

use crate::error::{Error, NodeError};
use crate::template::{TemplateRegistry, TemplateResult};
use gr_ast::{Literal, NodeId, SlotKey, Tree};
use gr_intern::{Interner, Symbol};
use gr_traverse::{BindingKind, ScopeId, ScopeTree};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use std::rc::Rc;

/// Caller-supplied helper generator: builds a helper's initializer
/// expression in the target tree, or declines the name
pub type HelperGenerator = Rc<dyn Fn(&str, &mut Tree) -> Option<NodeId>>;

/// Shared state for one compilation, passed to every pass callback
pub struct UnitCx {
    /// The compilation's interner
    pub interner: Interner,
    /// Originating file identifier
    pub filename: String,
    data: FxHashMap<String, serde_json::Value>,
    helpers: IndexMap<String, Symbol>,
    imports: FxHashMap<(String, String), Symbol>,
    templates: TemplateRegistry,
    helper_generator: Option<HelperGenerator>,
    helpers_namespace: Option<Symbol>,
    root_scope: Option<ScopeId>,
}

impl UnitCx {
    /// Creates the context for one compilation
    pub fn new(
        interner: Interner,
        filename: String,
        templates: TemplateRegistry,
        helper_generator: Option<HelperGenerator>,
        external_helpers: bool,
    ) -> Self {
        let helpers_namespace = external_helpers.then(|| interner.intern("helpers"));
        Self {
            interner,
            filename,
            data: FxHashMap::default(),
            helpers: IndexMap::new(),
            imports: FxHashMap::default(),
            templates,
            helper_generator,
            helpers_namespace,
            root_scope: None,
        }
    }

    /// Records the program scope once scope build completes
    pub fn set_root_scope(&mut self, scope: ScopeId) {
        self.root_scope = Some(scope);
    }

    /// The program scope
    pub fn root_scope(&self) -> Option<ScopeId> {
        self.root_scope
    }

    /// Stores a dynamic per-compilation value
    pub fn set_data(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.data.insert(key.into(), value);
    }

    /// Reads a dynamic per-compilation value
    pub fn data(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Reads a dynamic value, computing and storing it on first access
    pub fn data_or_insert_with(
        &mut self,
        key: &str,
        compute: impl FnOnce() -> serde_json::Value,
    ) -> &serde_json::Value {
        self.data.entry(key.to_owned()).or_insert_with(compute)
    }

    /// Names of the helpers injected so far, in injection order
    pub fn used_helpers(&self) -> Vec<String> {
        self.helpers.keys().cloned().collect()
    }

    /// Builds a failure tied to `node`, so the compilation's source
    /// annotation points at that node
    pub fn error_with_node(
        &self,
        tree: &Tree,
        node: NodeId,
        message: impl Into<String>,
    ) -> anyhow::Error {
        anyhow::Error::new(NodeError {
            message: message.into(),
            span: tree.node(node).span,
        })
    }

    /// Materializes a registered template into `tree`
    pub fn template(
        &self,
        tree: &mut Tree,
        name: &str,
        substitutions: &FxHashMap<String, NodeId>,
    ) -> Result<TemplateResult, Error> {
        self.templates
            .materialize(name, tree, substitutions, &self.interner)
    }

    /// Injects the named helper and returns the symbol referencing it.
    ///
    /// Idempotent: a helper already injected under `name` returns the
    /// same symbol, and its definition is materialized at most once. The
    /// initializer comes from the caller-registered generator, the shared
    /// helpers namespace when one was requested, or a registered template
    /// of the same name, in that order.
    pub fn add_helper(
        &mut self,
        tree: &mut Tree,
        scopes: &mut ScopeTree,
        name: &str,
    ) -> Result<Symbol, Error> {
        if let Some(existing) = self.helpers.get(name) {
            return Ok(*existing);
        }
        let scope = self.root_scope.ok_or_else(|| Error::Configuration {
            message: format!("helper `{name}` requested before scope build"),
        })?;

        let init = self.helper_initializer(tree, name)?;
        let uid = scopes.generate_uid(scope, name, &self.interner);
        scopes.push_declaration(tree, scope, uid, Some(init));
        self.helpers.insert(name.to_owned(), uid);
        tracing::debug!(helper = name, "injected helper");
        Ok(uid)
    }

    /// Adds `import <uid> from "<module>";` at the top of the program and
    /// returns the local symbol; idempotent per module/base pair
    pub fn add_import(
        &mut self,
        tree: &mut Tree,
        scopes: &mut ScopeTree,
        module: &str,
        base: &str,
    ) -> Result<Symbol, Error> {
        let key = (module.to_owned(), base.to_owned());
        if let Some(existing) = self.imports.get(&key) {
            return Ok(*existing);
        }
        let scope = self.root_scope.ok_or_else(|| Error::Configuration {
            message: format!("import of `{module}` requested before scope build"),
        })?;

        let uid = scopes.generate_uid(scope, base, &self.interner);
        let local = tree.identifier(uid, None);
        let specifier = tree.import_specifier(local);
        let source = tree.literal(Literal::String(module.to_owned()), None);
        let declaration = tree.import_declaration(vec![specifier], source);
        let target = scopes.scope(scope).node;
        tree.splice(target, SlotKey::Body, 0, 0, vec![declaration]);
        scopes.declare(scope, uid, BindingKind::Import, Some(specifier));
        self.imports.insert(key, uid);
        Ok(uid)
    }

    fn helper_initializer(&self, tree: &mut Tree, name: &str) -> Result<NodeId, Error> {
        if let Some(generator) = self.helper_generator.as_ref() {
            if let Some(node) = generator(name, tree) {
                return Ok(node);
            }
        }
        if let Some(namespace) = self.helpers_namespace {
            let object = tree.identifier(namespace, None);
            let property = tree.identifier(self.interner.intern(name), None);
            return Ok(tree.member(object, property));
        }
        if self.templates.contains(name) {
            let materialized =
                self.templates
                    .materialize(name, tree, &FxHashMap::default(), &self.interner)?;
            if let TemplateResult::Single(node) = materialized {
                return Ok(node);
            }
            return Err(Error::Configuration {
                message: format!("helper template `{name}` must be a single expression"),
            });
        }
        Err(Error::UnknownHelper {
            name: name.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gr_ast::NodeKind;
    use gr_parser::DefaultParser;

    fn context_with_template(interner: &Interner, name: &str, source: &str) -> UnitCx {
        let mut templates = TemplateRegistry::new();
        templates
            .register(name, source, &DefaultParser, interner)
            .expect("register");
        UnitCx::new(
            interner.clone(),
            "test.src".to_owned(),
            templates,
            None,
            false,
        )
    }

    fn empty_program(tree: &mut Tree, scopes: &mut ScopeTree) -> ScopeId {
        let program = tree.program(vec![]);
        scopes.ensure(tree, program, None)
    }

    #[test]
    fn test_add_helper_is_idempotent() {
        let interner = Interner::new();
        let mut cx = context_with_template(&interner, "iterate", "(function (x) { return x; });");
        let mut tree = Tree::new();
        let mut scopes = ScopeTree::new();
        let root = empty_program(&mut tree, &mut scopes);
        cx.set_root_scope(root);

        let first = cx.add_helper(&mut tree, &mut scopes, "iterate").expect("helper");
        let second = cx.add_helper(&mut tree, &mut scopes, "iterate").expect("helper");
        assert_eq!(first, second);

        // materialized exactly once
        let program = scopes.scope(root).node;
        assert_eq!(tree.list(program, SlotKey::Body).len(), 1);
    }

    #[test]
    fn test_unknown_helper_is_a_reference_error() {
        let interner = Interner::new();
        let mut cx = context_with_template(&interner, "iterate", "(function (x) { return x; });");
        let mut tree = Tree::new();
        let mut scopes = ScopeTree::new();
        let root = empty_program(&mut tree, &mut scopes);
        cx.set_root_scope(root);

        let result = cx.add_helper(&mut tree, &mut scopes, "doesNotExist");
        assert!(matches!(
            result,
            Err(Error::UnknownHelper { name }) if name == "doesNotExist"
        ));
    }

    #[test]
    fn test_external_helpers_namespace() {
        let interner = Interner::new();
        let mut cx = UnitCx::new(
            interner.clone(),
            "test.src".to_owned(),
            TemplateRegistry::new(),
            None,
            true,
        );
        let mut tree = Tree::new();
        let mut scopes = ScopeTree::new();
        let root = empty_program(&mut tree, &mut scopes);
        cx.set_root_scope(root);

        cx.add_helper(&mut tree, &mut scopes, "anything").expect("helper");
        let program = scopes.scope(root).node;
        let declaration = tree.list(program, SlotKey::Body)[0];
        let declarator = tree.list(declaration, SlotKey::Declarations)[0];
        let init = tree.single(declarator, SlotKey::Init).expect("init");
        assert_eq!(tree.kind(init), NodeKind::MemberExpression);
    }

    #[test]
    fn test_add_import_prepends_and_binds() {
        let interner = Interner::new();
        let mut cx = UnitCx::new(
            interner.clone(),
            "test.src".to_owned(),
            TemplateRegistry::new(),
            None,
            false,
        );
        let mut tree = Tree::new();
        let mut scopes = ScopeTree::new();
        let root = empty_program(&mut tree, &mut scopes);
        cx.set_root_scope(root);

        let first = cx
            .add_import(&mut tree, &mut scopes, "runtime", "helpers")
            .expect("import");
        let again = cx
            .add_import(&mut tree, &mut scopes, "runtime", "helpers")
            .expect("import");
        assert_eq!(first, again);

        let program = scopes.scope(root).node;
        let declaration = tree.list(program, SlotKey::Body)[0];
        assert_eq!(tree.kind(declaration), NodeKind::ImportDeclaration);
        assert!(scopes.lookup(root, first).is_some());
    }

    #[test]
    fn test_data_storage() {
        let interner = Interner::new();
        let mut cx = UnitCx::new(
            interner,
            "test.src".to_owned(),
            TemplateRegistry::new(),
            None,
            false,
        );
        cx.set_data("seen", serde_json::Value::Bool(true));
        assert_eq!(cx.data("seen"), Some(&serde_json::Value::Bool(true)));
        assert_eq!(cx.data("missing"), None);
    }
}
