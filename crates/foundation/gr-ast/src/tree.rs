//! Arena-backed syntax tree storage
//!
//! Every node is owned by the [`Tree`] arena and referenced through a
//! stable [`NodeId`] handle. Parent/child structure lives in named slots on
//! the parent, so replacing or splicing children never moves nodes in
//! memory and never invalidates handles held by a traversal in progress.

use crate::{NodeKind, SlotKey};
use gr_arena::{Arena, Idx};
use gr_intern::Symbol;
use gr_span::Span;
use rustc_hash::{FxHashMap, FxHashSet};

/// Stable handle to a node in a [`Tree`]
pub type NodeId = Idx<Node>;

/// A literal value carried by a `Literal` node
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Numeric literal
    Number(f64),
    /// String literal (unescaped contents)
    String(String),
    /// Boolean literal
    Bool(bool),
    /// The `null` literal
    Null,
}

/// Binary and assignment operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `=`
    Assign,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `==`
    Eq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `>`
    Gt,
}

impl Operator {
    /// Source text of the operator
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Assign => "=",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::Gt => ">",
        }
    }
}

/// Contents of one child slot
#[derive(Debug, Clone, PartialEq)]
pub enum SlotValue {
    /// A single, possibly absent child
    Single(Option<NodeId>),
    /// An ordered child list
    List(Vec<NodeId>),
}

/// One syntax tree node: a kind tag, named child slots, and metadata
#[derive(Debug, Clone)]
pub struct Node {
    /// Kind tag; may be rewritten in place by a pass
    pub kind: NodeKind,
    /// Named child slots
    slots: FxHashMap<SlotKey, SlotValue>,
    /// Identifier symbol, for `Identifier` nodes
    pub name: Option<Symbol>,
    /// Literal payload, for `Literal` nodes
    pub value: Option<Literal>,
    /// Operator, for binary/assignment nodes
    pub operator: Option<Operator>,
    /// Original source span, if the node came from parsed text
    pub span: Option<Span>,
    /// Comment text attached before the node
    pub leading_comments: Vec<String>,
    /// Transient bookkeeping marks ("already visited by pass X")
    pub marks: FxHashSet<String>,
}

impl Node {
    /// Creates a bare node of `kind` with empty slots and metadata
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            slots: FxHashMap::default(),
            name: None,
            value: None,
            operator: None,
            span: None,
            leading_comments: Vec::new(),
            marks: FxHashSet::default(),
        }
    }

    /// Whether the given pass mark is present
    pub fn has_mark(&self, mark: &str) -> bool {
        self.marks.contains(mark)
    }

    /// Records a pass mark
    pub fn add_mark(&mut self, mark: impl Into<String>) {
        self.marks.insert(mark.into());
    }

    /// Clears transient metadata: span, comments, and pass marks
    pub fn clear_transient(&mut self) {
        self.span = None;
        self.leading_comments.clear();
        self.marks.clear();
    }
}

/// The arena owning every node of one compilation
#[derive(Debug, Default, Clone)]
pub struct Tree {
    nodes: Arena<Node>,
}

impl Tree {
    /// Creates an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a node, returning its handle
    pub fn alloc(&mut self, node: Node) -> NodeId {
        self.nodes.alloc(node)
    }

    /// Borrows a node
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// Mutably borrows a node
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    /// The node's current kind tag
    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.nodes[id].kind
    }

    /// Borrows a slot's contents, if the slot is populated
    pub fn slot(&self, id: NodeId, key: SlotKey) -> Option<&SlotValue> {
        self.nodes[id].slots.get(&key)
    }

    /// The child in a single-valued slot
    pub fn single(&self, id: NodeId, key: SlotKey) -> Option<NodeId> {
        match self.nodes[id].slots.get(&key) {
            Some(SlotValue::Single(child)) => *child,
            _ => None,
        }
    }

    /// The children in a list-valued slot; empty if unpopulated
    pub fn list(&self, id: NodeId, key: SlotKey) -> &[NodeId] {
        match self.nodes[id].slots.get(&key) {
            Some(SlotValue::List(children)) => children,
            _ => &[],
        }
    }

    /// Stores a single-valued slot
    pub fn set_single(&mut self, id: NodeId, key: SlotKey, child: Option<NodeId>) {
        debug_assert!(!key.is_list(), "slot `{key}` holds a list");
        self.nodes[id].slots.insert(key, SlotValue::Single(child));
    }

    /// Stores a list-valued slot
    pub fn set_list(&mut self, id: NodeId, key: SlotKey, children: Vec<NodeId>) {
        debug_assert!(key.is_list(), "slot `{key}` holds a single node");
        self.nodes[id].slots.insert(key, SlotValue::List(children));
    }

    /// Splices a list-valued slot: removes `remove` entries at `index` and
    /// inserts `insert` in their place
    pub fn splice(&mut self, id: NodeId, key: SlotKey, index: usize, remove: usize, insert: Vec<NodeId>) {
        debug_assert!(key.is_list(), "slot `{key}` holds a single node");
        let slot = self
            .nodes[id]
            .slots
            .entry(key)
            .or_insert_with(|| SlotValue::List(Vec::new()));
        if let SlotValue::List(children) = slot {
            children.splice(index..index + remove, insert);
        }
    }

    /// Deep-clones the subtree rooted at `root` within this tree
    pub fn clone_subtree(&mut self, root: NodeId) -> NodeId {
        let mut cloned = self.nodes[root].clone();
        let old_slots = std::mem::take(&mut cloned.slots);
        for (key, value) in old_slots {
            let new_value = match value {
                SlotValue::Single(child) => {
                    SlotValue::Single(child.map(|child| self.clone_subtree(child)))
                }
                SlotValue::List(children) => SlotValue::List(
                    children
                        .into_iter()
                        .map(|child| self.clone_subtree(child))
                        .collect(),
                ),
            };
            cloned.slots.insert(key, new_value);
        }
        self.nodes.alloc(cloned)
    }

    /// Deep-copies a subtree out of another tree into this one
    pub fn import_subtree(&mut self, source: &Tree, root: NodeId) -> NodeId {
        let mut imported = source.nodes[root].clone();
        let old_slots = std::mem::take(&mut imported.slots);
        for (key, value) in old_slots {
            let new_value = match value {
                SlotValue::Single(child) => {
                    SlotValue::Single(child.map(|child| self.import_subtree(source, child)))
                }
                SlotValue::List(children) => SlotValue::List(
                    children
                        .into_iter()
                        .map(|child| self.import_subtree(source, child))
                        .collect(),
                ),
            };
            imported.slots.insert(key, new_value);
        }
        self.nodes.alloc(imported)
    }

    /// Number of allocated nodes (live and discarded)
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree holds no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // Node builders. These allocate fully-slotted nodes and are used by the
    // parser, templates, and tests.

    /// Builds an `Identifier`
    pub fn identifier(&mut self, name: Symbol, span: Option<Span>) -> NodeId {
        let mut node = Node::new(NodeKind::Identifier);
        node.name = Some(name);
        node.span = span;
        self.alloc(node)
    }

    /// Builds a `Literal`
    pub fn literal(&mut self, value: Literal, span: Option<Span>) -> NodeId {
        let mut node = Node::new(NodeKind::Literal);
        node.value = Some(value);
        node.span = span;
        self.alloc(node)
    }

    /// Builds a `Program` root
    pub fn program(&mut self, body: Vec<NodeId>) -> NodeId {
        let id = self.alloc(Node::new(NodeKind::Program));
        self.set_list(id, SlotKey::Body, body);
        id
    }

    /// Builds an `ExpressionStatement`
    pub fn expression_statement(&mut self, expression: NodeId) -> NodeId {
        let id = self.alloc(Node::new(NodeKind::ExpressionStatement));
        self.set_single(id, SlotKey::Expression, Some(expression));
        id
    }

    /// Builds a `CallExpression`
    pub fn call(&mut self, callee: NodeId, arguments: Vec<NodeId>) -> NodeId {
        let id = self.alloc(Node::new(NodeKind::CallExpression));
        self.set_single(id, SlotKey::Callee, Some(callee));
        self.set_list(id, SlotKey::Arguments, arguments);
        id
    }

    /// Builds a `MemberExpression`
    pub fn member(&mut self, object: NodeId, property: NodeId) -> NodeId {
        let id = self.alloc(Node::new(NodeKind::MemberExpression));
        self.set_single(id, SlotKey::Object, Some(object));
        self.set_single(id, SlotKey::Property, Some(property));
        id
    }

    /// Builds a `BinaryExpression`
    pub fn binary(&mut self, operator: Operator, left: NodeId, right: NodeId) -> NodeId {
        let id = self.alloc(Node::new(NodeKind::BinaryExpression));
        self.nodes[id].operator = Some(operator);
        self.set_single(id, SlotKey::Left, Some(left));
        self.set_single(id, SlotKey::Right, Some(right));
        id
    }

    /// Builds an `AssignmentExpression`
    pub fn assignment(&mut self, left: NodeId, right: NodeId) -> NodeId {
        let id = self.alloc(Node::new(NodeKind::AssignmentExpression));
        self.nodes[id].operator = Some(Operator::Assign);
        self.set_single(id, SlotKey::Left, Some(left));
        self.set_single(id, SlotKey::Right, Some(right));
        id
    }

    /// Builds a `VariableDeclaration`
    pub fn var_declaration(&mut self, declarations: Vec<NodeId>) -> NodeId {
        let id = self.alloc(Node::new(NodeKind::VariableDeclaration));
        self.set_list(id, SlotKey::Declarations, declarations);
        id
    }

    /// Builds a `VariableDeclarator`
    pub fn declarator(&mut self, id_node: NodeId, init: Option<NodeId>) -> NodeId {
        let id = self.alloc(Node::new(NodeKind::VariableDeclarator));
        self.set_single(id, SlotKey::Id, Some(id_node));
        self.set_single(id, SlotKey::Init, init);
        id
    }

    /// Builds a `FunctionDeclaration`
    pub fn function_declaration(
        &mut self,
        id_node: NodeId,
        params: Vec<NodeId>,
        body: NodeId,
    ) -> NodeId {
        let id = self.alloc(Node::new(NodeKind::FunctionDeclaration));
        self.set_single(id, SlotKey::Id, Some(id_node));
        self.set_list(id, SlotKey::Params, params);
        self.set_single(id, SlotKey::Block, Some(body));
        id
    }

    /// Builds a `FunctionExpression`
    pub fn function_expression(
        &mut self,
        id_node: Option<NodeId>,
        params: Vec<NodeId>,
        body: NodeId,
    ) -> NodeId {
        let id = self.alloc(Node::new(NodeKind::FunctionExpression));
        self.set_single(id, SlotKey::Id, id_node);
        self.set_list(id, SlotKey::Params, params);
        self.set_single(id, SlotKey::Block, Some(body));
        id
    }

    /// Builds a `BlockStatement`
    pub fn block(&mut self, body: Vec<NodeId>) -> NodeId {
        let id = self.alloc(Node::new(NodeKind::BlockStatement));
        self.set_list(id, SlotKey::Body, body);
        id
    }

    /// Builds a `ReturnStatement`
    pub fn return_statement(&mut self, argument: Option<NodeId>) -> NodeId {
        let id = self.alloc(Node::new(NodeKind::ReturnStatement));
        self.set_single(id, SlotKey::Argument, argument);
        id
    }

    /// Builds an `ImportDeclaration`
    pub fn import_declaration(&mut self, specifiers: Vec<NodeId>, source: NodeId) -> NodeId {
        let id = self.alloc(Node::new(NodeKind::ImportDeclaration));
        self.set_list(id, SlotKey::Specifiers, specifiers);
        self.set_single(id, SlotKey::Source, Some(source));
        id
    }

    /// Builds an `ImportSpecifier`
    pub fn import_specifier(&mut self, local: NodeId) -> NodeId {
        let id = self.alloc(Node::new(NodeKind::ImportSpecifier));
        self.set_single(id, SlotKey::Local, Some(local));
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gr_intern::Interner;

    #[test]
    fn test_slot_round_trip() {
        let interner = Interner::new();
        let mut tree = Tree::new();
        let callee = tree.identifier(interner.intern("a"), None);
        let arg = tree.identifier(interner.intern("b"), None);
        let call = tree.call(callee, vec![arg]);

        assert_eq!(tree.single(call, SlotKey::Callee), Some(callee));
        assert_eq!(tree.list(call, SlotKey::Arguments), &[arg]);
        assert_eq!(tree.kind(call), NodeKind::CallExpression);
    }

    #[test]
    fn test_builders_store_slots_in_their_declared_shape() {
        let interner = Interner::new();
        let mut tree = Tree::new();
        let name = tree.identifier(interner.intern("f"), None);
        let one = tree.literal(Literal::Number(1.0), None);
        let two = tree.literal(Literal::Number(2.0), None);
        let call = tree.call(name, vec![one]);
        let member = tree.member(name, name);
        let binary = tree.binary(Operator::Add, one, two);
        let assign = tree.assignment(name, one);
        let declarator = tree.declarator(name, Some(one));
        let declaration = tree.var_declaration(vec![declarator]);
        let statement = tree.expression_statement(call);
        let ret = tree.return_statement(Some(one));
        let block = tree.block(vec![ret]);
        let declared = tree.function_declaration(name, vec![name], block);
        let anonymous = tree.function_expression(None, vec![], block);
        let specifier = tree.import_specifier(name);
        let import = tree.import_declaration(vec![specifier], two);
        let program = tree.program(vec![statement]);

        for node in [
            name, one, call, member, binary, assign, declarator, declaration, statement, ret,
            block, declared, anonymous, specifier, import, program,
        ] {
            for key in crate::visitor_keys(tree.kind(node)) {
                let Some(slot) = tree.slot(node, *key) else {
                    continue;
                };
                match slot {
                    SlotValue::Single(_) => assert!(!key.is_list(), "slot `{key}`"),
                    SlotValue::List(_) => assert!(key.is_list(), "slot `{key}`"),
                }
            }
        }
    }

    #[test]
    fn test_function_block_is_reachable_through_the_slot_table() {
        let interner = Interner::new();
        let mut tree = Tree::new();
        let name = tree.identifier(interner.intern("f"), None);
        let block = tree.block(vec![]);
        let function = tree.function_declaration(name, vec![], block);

        assert_eq!(tree.single(function, SlotKey::Block), Some(block));
        assert!(crate::visitor_keys(NodeKind::FunctionDeclaration).contains(&SlotKey::Block));
    }

    #[test]
    #[should_panic(expected = "holds a single node")]
    fn test_splice_rejects_single_valued_slots() {
        let interner = Interner::new();
        let mut tree = Tree::new();
        let name = tree.identifier(interner.intern("f"), None);
        let block = tree.block(vec![]);
        let function = tree.function_expression(None, vec![], block);
        tree.splice(function, SlotKey::Block, 0, 0, vec![name]);
    }

    #[test]
    fn test_splice_list_slot() {
        let interner = Interner::new();
        let mut tree = Tree::new();
        let first = tree.identifier(interner.intern("x"), None);
        let second = tree.identifier(interner.intern("y"), None);
        let third = tree.identifier(interner.intern("z"), None);
        let call = tree.call(first, vec![first, second]);

        tree.splice(call, SlotKey::Arguments, 1, 1, vec![third, second]);
        assert_eq!(tree.list(call, SlotKey::Arguments), &[first, third, second]);
    }

    #[test]
    fn test_clone_subtree_is_deep() {
        let interner = Interner::new();
        let mut tree = Tree::new();
        let callee = tree.identifier(interner.intern("a"), None);
        let call = tree.call(callee, vec![]);

        let copy = tree.clone_subtree(call);
        assert_ne!(copy, call);
        let copied_callee = tree.single(copy, SlotKey::Callee).expect("cloned callee");
        assert_ne!(copied_callee, callee);
        assert_eq!(tree.node(copied_callee).name, tree.node(callee).name);
    }

    #[test]
    fn test_import_subtree_across_trees() {
        let interner = Interner::new();
        let mut fragment = Tree::new();
        let callee = fragment.identifier(interner.intern("helper"), None);
        let call = fragment.call(callee, vec![]);

        let mut target = Tree::new();
        let imported = target.import_subtree(&fragment, call);
        assert_eq!(target.kind(imported), NodeKind::CallExpression);
        let imported_callee = target.single(imported, SlotKey::Callee).expect("callee");
        assert_eq!(
            interner.resolve(&target.node(imported_callee).name.expect("name")),
            "helper"
        );
    }

    #[test]
    fn test_marks() {
        let mut tree = Tree::new();
        let id = tree.alloc(Node::new(NodeKind::Program));
        assert!(!tree.node(id).has_mark("rename"));
        tree.node_mut(id).add_mark("rename");
        assert!(tree.node(id).has_mark("rename"));
        tree.node_mut(id).clear_transient();
        assert!(!tree.node(id).has_mark("rename"));
    }
}
