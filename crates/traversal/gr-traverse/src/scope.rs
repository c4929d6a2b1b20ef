//! Lexical scope and binding tracking
//!
//! Scopes mirror scope-introducing nodes (program, functions, blocks) and
//! are created lazily the first time traversal enters one. Each scope owns
//! the bindings declared at its level; lookups walk the parent chain.
//! Looking up an undeclared name is not an error — it returns `None` and
//! the caller decides whether to treat the name as a free reference.

use gr_arena::{Arena, Idx};
use gr_ast::{Literal, NodeId, NodeKind, SlotKey, Tree};
use gr_intern::{Interner, Symbol};
use rustc_hash::{FxHashMap, FxHashSet};

/// Stable handle to a scope
pub type ScopeId = Idx<ScopeData>;

/// How a binding was introduced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// Function parameter
    Param,
    /// `var` declarator
    Local,
    /// Function declaration, visible throughout its scope
    Hoisted,
    /// Imported name
    Import,
    /// Injected by the compiler (helpers, generated imports)
    Helper,
}

/// Inferred value category of a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    /// Numeric literal initializer
    Number,
    /// String literal initializer
    String,
    /// Boolean literal initializer
    Bool,
    /// `null` initializer
    Null,
    /// Function-valued initializer
    Function,
}

/// Record of one declared identifier's usage within a scope
#[derive(Debug, Clone)]
pub struct Binding {
    /// Declared name
    pub name: Symbol,
    /// Declaration kind
    pub kind: BindingKind,
    /// Owning scope
    pub scope: ScopeId,
    /// Number of observed references; only ever increases
    pub references: u32,
    /// Whether the binding has been referenced at least once
    pub referenced: bool,
    /// True until the first observed reassignment, then false forever
    pub constant: bool,
    /// Known value category, when one could be derived
    pub type_annotation: Option<TypeTag>,
    /// Whether the annotation was inferred (as opposed to assigned)
    pub type_inferred: bool,
    /// The declarator or declaration node that introduced the binding
    pub declarator: Option<NodeId>,
}

impl Binding {
    fn new(name: Symbol, kind: BindingKind, scope: ScopeId, declarator: Option<NodeId>) -> Self {
        Self {
            name,
            kind,
            scope,
            references: 0,
            referenced: false,
            constant: true,
            type_annotation: None,
            type_inferred: false,
            declarator,
        }
    }

    /// Marks the binding referenced and bumps its count
    pub fn reference(&mut self) {
        self.referenced = true;
        self.references += 1;
    }

    /// Records a reassignment: the binding is no longer constant, and an
    /// inferred type annotation is no longer trustworthy
    pub fn reassign(&mut self) {
        self.constant = false;
        if self.type_inferred {
            self.type_annotation = None;
        }
    }

    /// Assigns an explicit type annotation
    pub fn assign_type(&mut self, tag: TypeTag) {
        self.type_annotation = Some(tag);
        self.type_inferred = false;
    }
}

/// One lexical scope: bindings plus a parent link
#[derive(Debug)]
pub struct ScopeData {
    /// The scope-introducing node
    pub node: NodeId,
    /// Enclosing scope; `None` at the root
    pub parent: Option<ScopeId>,
    bindings: FxHashMap<Symbol, Binding>,
    types_inferred: bool,
}

impl ScopeData {
    /// Borrows a binding declared directly in this scope
    pub fn binding(&self, name: Symbol) -> Option<&Binding> {
        self.bindings.get(&name)
    }

    /// Iterates the bindings declared directly in this scope
    pub fn bindings(&self) -> impl Iterator<Item = &Binding> {
        self.bindings.values()
    }
}

/// Arena of scopes for one compilation, keyed by scope-introducing node
#[derive(Debug, Default)]
pub struct ScopeTree {
    scopes: Arena<ScopeData>,
    by_node: FxHashMap<NodeId, ScopeId>,
    uids: FxHashSet<Symbol>,
}

impl ScopeTree {
    /// Creates an empty scope tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrows a scope
    pub fn scope(&self, id: ScopeId) -> &ScopeData {
        &self.scopes[id]
    }

    /// The scope already created for `node`, if any
    pub fn scope_of(&self, node: NodeId) -> Option<ScopeId> {
        self.by_node.get(&node).copied()
    }

    /// Returns the scope for a scope-introducing node, creating it (and
    /// collecting its immediate bindings) on first entry
    pub fn ensure(&mut self, tree: &Tree, node: NodeId, parent: Option<ScopeId>) -> ScopeId {
        if let Some(existing) = self.by_node.get(&node) {
            return *existing;
        }
        let id = self.scopes.alloc(ScopeData {
            node,
            parent,
            bindings: FxHashMap::default(),
            types_inferred: false,
        });
        self.by_node.insert(node, id);
        self.collect(tree, node, id);
        id
    }

    /// Declares (or overwrites) a binding directly in `scope`
    pub fn declare(
        &mut self,
        scope: ScopeId,
        name: Symbol,
        kind: BindingKind,
        declarator: Option<NodeId>,
    ) {
        self.scopes[scope]
            .bindings
            .insert(name, Binding::new(name, kind, scope, declarator));
    }

    /// Walks the parent chain for the nearest binding of `name`
    pub fn lookup(&self, scope: ScopeId, name: Symbol) -> Option<&Binding> {
        let mut current = Some(scope);
        while let Some(id) = current {
            if let Some(binding) = self.scopes[id].bindings.get(&name) {
                return Some(binding);
            }
            current = self.scopes[id].parent;
        }
        None
    }

    /// Mutable variant of [`Self::lookup`]
    pub fn lookup_mut(&mut self, scope: ScopeId, name: Symbol) -> Option<&mut Binding> {
        let owner = self.lookup(scope, name)?.scope;
        self.scopes[owner].bindings.get_mut(&name)
    }

    /// Whether `name` resolves from `scope`
    pub fn has_binding(&self, scope: ScopeId, name: Symbol) -> bool {
        self.lookup(scope, name).is_some()
    }

    /// Records a reference to `name`; returns false for unresolved names
    /// (free references are the caller's concern, not an error)
    pub fn reference(&mut self, scope: ScopeId, name: Symbol) -> bool {
        match self.lookup_mut(scope, name) {
            Some(binding) => {
                binding.reference();
                true
            }
            None => false,
        }
    }

    /// Records a reassignment of `name`; returns false for unresolved names
    pub fn reassign(&mut self, scope: ScopeId, name: Symbol) -> bool {
        match self.lookup_mut(scope, name) {
            Some(binding) => {
                binding.reassign();
                true
            }
            None => false,
        }
    }

    /// Runs type-annotation inference for `scope`: one linear pass over the
    /// scope's own binding set, the first time it is requested
    pub fn infer_types(&mut self, tree: &Tree, scope: ScopeId) {
        if self.scopes[scope].types_inferred {
            return;
        }
        self.scopes[scope].types_inferred = true;

        let names: Vec<Symbol> = self.scopes[scope].bindings.keys().copied().collect();
        for name in names {
            let declarator = self.scopes[scope].bindings[&name].declarator;
            let inferred = declarator.and_then(|decl| infer_from_declarator(tree, decl));
            if let Some(tag) = inferred {
                let binding = self.scopes[scope]
                    .bindings
                    .get_mut(&name)
                    .filter(|binding| binding.type_annotation.is_none());
                if let Some(binding) = binding {
                    binding.type_annotation = Some(tag);
                    binding.type_inferred = true;
                }
            }
        }
    }

    /// Generates an identifier guaranteed not to collide with any binding
    /// visible from `scope` or any previously generated name
    pub fn generate_uid(&mut self, scope: ScopeId, base: &str, interner: &Interner) -> Symbol {
        let mut attempt = 1u32;
        loop {
            let candidate = if attempt == 1 {
                format!("_{base}")
            } else {
                format!("_{base}{attempt}")
            };
            let sym = interner.intern(&candidate);
            if !self.uids.contains(&sym) && !self.has_binding(scope, sym) {
                self.uids.insert(sym);
                return sym;
            }
            attempt += 1;
        }
    }

    /// Inserts `var <name> = <init>;` at the top of the scope's statement
    /// list and declares the matching binding
    ///
    /// A function scope keeps its statements in its body block, so the
    /// declaration lands inside the block rather than beside it.
    pub fn push_declaration(
        &mut self,
        tree: &mut Tree,
        scope: ScopeId,
        name: Symbol,
        init: Option<NodeId>,
    ) -> NodeId {
        let holder = self.scopes[scope].node;
        let target = tree.single(holder, SlotKey::Block).unwrap_or(holder);
        let id_node = tree.identifier(name, None);
        let declarator = tree.declarator(id_node, init);
        let declaration = tree.var_declaration(vec![declarator]);
        tree.splice(target, SlotKey::Body, 0, 0, vec![declaration]);
        self.declare(scope, name, BindingKind::Helper, Some(declarator));
        declaration
    }

    fn collect(&mut self, tree: &Tree, node: NodeId, scope: ScopeId) {
        match tree.kind(node) {
            NodeKind::Program | NodeKind::BlockStatement => {
                for statement in tree.list(node, SlotKey::Body).to_vec() {
                    self.collect_statement(tree, statement, scope);
                }
            }
            NodeKind::FunctionDeclaration | NodeKind::FunctionExpression => {
                for param in tree.list(node, SlotKey::Params).to_vec() {
                    if let Some(name) = tree.node(param).name {
                        self.declare(scope, name, BindingKind::Param, Some(param));
                    }
                }
                // a named function binds its own name inside its body
                if let Some(id_node) = tree.single(node, SlotKey::Id) {
                    if let Some(name) = tree.node(id_node).name {
                        self.declare(scope, name, BindingKind::Local, Some(node));
                    }
                }
            }
            _ => {}
        }
    }

    fn collect_statement(&mut self, tree: &Tree, statement: NodeId, scope: ScopeId) {
        match tree.kind(statement) {
            NodeKind::FunctionDeclaration => {
                if let Some(id_node) = tree.single(statement, SlotKey::Id) {
                    if let Some(name) = tree.node(id_node).name {
                        self.declare(scope, name, BindingKind::Hoisted, Some(statement));
                    }
                }
            }
            NodeKind::VariableDeclaration => {
                for declarator in tree.list(statement, SlotKey::Declarations).to_vec() {
                    let id_node = tree.single(declarator, SlotKey::Id);
                    if let Some(name) = id_node.and_then(|id_node| tree.node(id_node).name) {
                        self.declare(scope, name, BindingKind::Local, Some(declarator));
                    }
                }
            }
            NodeKind::ImportDeclaration => {
                for specifier in tree.list(statement, SlotKey::Specifiers).to_vec() {
                    let local = tree.single(specifier, SlotKey::Local);
                    if let Some(name) = local.and_then(|local| tree.node(local).name) {
                        self.declare(scope, name, BindingKind::Import, Some(specifier));
                    }
                }
            }
            _ => {}
        }
    }
}

fn infer_from_declarator(tree: &Tree, declarator: NodeId) -> Option<TypeTag> {
    if tree.kind(declarator) != NodeKind::VariableDeclarator {
        return None;
    }
    let init = tree.single(declarator, SlotKey::Init)?;
    match tree.kind(init) {
        NodeKind::Literal => tree.node(init).value.as_ref().map(|value| match value {
            Literal::Number(_) => TypeTag::Number,
            Literal::String(_) => TypeTag::String,
            Literal::Bool(_) => TypeTag::Bool,
            Literal::Null => TypeTag::Null,
        }),
        NodeKind::FunctionExpression => Some(TypeTag::Function),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program_with_var(interner: &Interner, source_name: &str, init: Literal) -> (Tree, NodeId, Symbol) {
        let mut tree = Tree::new();
        let name = interner.intern(source_name);
        let id_node = tree.identifier(name, None);
        let init_node = tree.literal(init, None);
        let declarator = tree.declarator(id_node, Some(init_node));
        let declaration = tree.var_declaration(vec![declarator]);
        let program = tree.program(vec![declaration]);
        (tree, program, name)
    }

    #[test]
    fn test_collect_and_lookup() {
        let interner = Interner::new();
        let (tree, program, name) = program_with_var(&interner, "count", Literal::Number(1.0));
        let mut scopes = ScopeTree::new();
        let root = scopes.ensure(&tree, program, None);

        let binding = scopes.lookup(root, name).expect("binding for count");
        assert_eq!(binding.kind, BindingKind::Local);
        assert!(binding.constant);
        assert_eq!(binding.references, 0);
    }

    #[test]
    fn test_lookup_walks_parent_chain() {
        let interner = Interner::new();
        let (mut tree, program, name) = program_with_var(&interner, "outer", Literal::Null);
        let block = tree.block(vec![]);
        let mut scopes = ScopeTree::new();
        let root = scopes.ensure(&tree, program, None);
        let inner = scopes.ensure(&tree, block, Some(root));

        assert!(scopes.lookup(inner, name).is_some());
        assert!(scopes.lookup(inner, interner.intern("missing")).is_none());
    }

    #[test]
    fn test_reference_count_only_increases() {
        let interner = Interner::new();
        let (tree, program, name) = program_with_var(&interner, "x", Literal::Number(0.0));
        let mut scopes = ScopeTree::new();
        let root = scopes.ensure(&tree, program, None);

        assert!(scopes.reference(root, name));
        assert!(scopes.reference(root, name));
        let binding = scopes.lookup(root, name).expect("binding");
        assert_eq!(binding.references, 2);
        assert!(binding.referenced);
    }

    #[test]
    fn test_reassign_flips_constant_once_and_clears_inferred_type() {
        let interner = Interner::new();
        let (tree, program, name) = program_with_var(&interner, "x", Literal::String("s".into()));
        let mut scopes = ScopeTree::new();
        let root = scopes.ensure(&tree, program, None);
        scopes.infer_types(&tree, root);

        let binding = scopes.lookup(root, name).expect("binding");
        assert_eq!(binding.type_annotation, Some(TypeTag::String));
        assert!(binding.type_inferred);

        assert!(scopes.reassign(root, name));
        let binding = scopes.lookup(root, name).expect("binding");
        assert!(!binding.constant);
        assert_eq!(binding.type_annotation, None);

        // a second reassignment does not resurrect anything
        assert!(scopes.reassign(root, name));
        assert!(!scopes.lookup(root, name).expect("binding").constant);
    }

    #[test]
    fn test_infer_types_runs_once_per_scope() {
        let interner = Interner::new();
        let (tree, program, name) = program_with_var(&interner, "flag", Literal::Bool(true));
        let mut scopes = ScopeTree::new();
        let root = scopes.ensure(&tree, program, None);

        scopes.infer_types(&tree, root);
        scopes.reassign(root, name);
        // second call is a no-op: the destroyed annotation stays absent
        scopes.infer_types(&tree, root);
        assert_eq!(scopes.lookup(root, name).expect("binding").type_annotation, None);
    }

    #[test]
    fn test_unresolved_lookup_is_not_an_error() {
        let interner = Interner::new();
        let mut tree = Tree::new();
        let program = tree.program(vec![]);
        let mut scopes = ScopeTree::new();
        let root = scopes.ensure(&tree, program, None);

        assert!(!scopes.reference(root, interner.intern("free")));
        assert!(!scopes.reassign(root, interner.intern("free")));
    }

    #[test]
    fn test_generate_uid_avoids_collisions() {
        let interner = Interner::new();
        let (tree, program, _) = program_with_var(&interner, "_ref", Literal::Null);
        let mut scopes = ScopeTree::new();
        let root = scopes.ensure(&tree, program, None);

        let first = scopes.generate_uid(root, "ref", &interner);
        assert_eq!(interner.resolve(&first), "_ref2");
        let second = scopes.generate_uid(root, "ref", &interner);
        assert_eq!(interner.resolve(&second), "_ref3");
    }

    #[test]
    fn test_push_declaration_prepends_and_declares() {
        let interner = Interner::new();
        let (mut tree, program, _) = program_with_var(&interner, "x", Literal::Null);
        let mut scopes = ScopeTree::new();
        let root = scopes.ensure(&tree, program, None);

        let name = interner.intern("_helper");
        scopes.push_declaration(&mut tree, root, name, None);

        let body = tree.list(program, SlotKey::Body);
        assert_eq!(tree.kind(body[0]), NodeKind::VariableDeclaration);
        assert_eq!(
            scopes.lookup(root, name).expect("helper binding").kind,
            BindingKind::Helper
        );
    }

    #[test]
    fn test_push_declaration_into_function_scope_lands_in_the_block() {
        let interner = Interner::new();
        let mut tree = Tree::new();
        let fn_name = tree.identifier(interner.intern("run"), None);
        let body = tree.block(vec![]);
        let function = tree.function_declaration(fn_name, vec![], body);
        let mut scopes = ScopeTree::new();
        let scope = scopes.ensure(&tree, function, None);

        let name = interner.intern("_state");
        let declaration = scopes.push_declaration(&mut tree, scope, name, None);

        assert_eq!(tree.list(body, SlotKey::Body), &[declaration]);
        assert_eq!(
            scopes.lookup(scope, name).expect("binding").kind,
            BindingKind::Helper
        );
    }

    #[test]
    fn test_function_scope_collects_params() {
        let interner = Interner::new();
        let mut tree = Tree::new();
        let param = tree.identifier(interner.intern("arg"), None);
        let fn_name = tree.identifier(interner.intern("run"), None);
        let body = tree.block(vec![]);
        let function = tree.function_declaration(fn_name, vec![param], body);

        let mut scopes = ScopeTree::new();
        let scope = scopes.ensure(&tree, function, None);
        let binding = scopes.lookup(scope, interner.intern("arg")).expect("param");
        assert_eq!(binding.kind, BindingKind::Param);
        assert!(scopes.lookup(scope, interner.intern("run")).is_some());
    }
}
