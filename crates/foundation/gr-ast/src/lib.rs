//! Syntax tree model for the rewrite engine
//!
//! Nodes are a closed tagged variant ([`NodeKind`]) stored in an arena
//! ([`Tree`]) and connected through named child slots. The static
//! kind-to-slot table ([`visitor_keys`]) is the single source of truth for
//! traversal order; the engine resolves child slots live against a node's
//! current kind, so rewrites that change a node's kind are picked up
//! mid-walk.

use std::fmt;

pub mod interface;
pub mod tree;

pub use interface::{GenOptions, Generated, Generator, ParseDiagnostic, ParseOptions, Parser};
pub use tree::{Literal, Node, NodeId, Operator, SlotValue, Tree};

/// Closed set of syntax node kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Root of a parsed file
    Program,
    /// A name reference or declaration site
    Identifier,
    /// A literal value
    Literal,
    /// An expression in statement position
    ExpressionStatement,
    /// A call with a callee and arguments
    CallExpression,
    /// A property access on an object
    MemberExpression,
    /// A binary operation
    BinaryExpression,
    /// An assignment to an identifier or member target
    AssignmentExpression,
    /// A `var` statement holding declarators
    VariableDeclaration,
    /// One `name = init` entry of a declaration
    VariableDeclarator,
    /// A named function in statement position
    FunctionDeclaration,
    /// A function in expression position
    FunctionExpression,
    /// A braced statement list
    BlockStatement,
    /// A `return` statement
    ReturnStatement,
    /// An `import` statement
    ImportDeclaration,
    /// One imported name
    ImportSpecifier,
}

impl NodeKind {
    /// Whether entering a node of this kind introduces a new lexical scope
    pub fn is_scope(self) -> bool {
        matches!(
            self,
            Self::Program
                | Self::FunctionDeclaration
                | Self::FunctionExpression
                | Self::BlockStatement
        )
    }

    /// Whether this kind is a function
    pub fn is_function(self) -> bool {
        matches!(self, Self::FunctionDeclaration | Self::FunctionExpression)
    }

    /// Whether this kind appears in statement position
    pub fn is_statement(self) -> bool {
        matches!(
            self,
            Self::ExpressionStatement
                | Self::VariableDeclaration
                | Self::FunctionDeclaration
                | Self::BlockStatement
                | Self::ReturnStatement
                | Self::ImportDeclaration
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Program => "Program",
            Self::Identifier => "Identifier",
            Self::Literal => "Literal",
            Self::ExpressionStatement => "ExpressionStatement",
            Self::CallExpression => "CallExpression",
            Self::MemberExpression => "MemberExpression",
            Self::BinaryExpression => "BinaryExpression",
            Self::AssignmentExpression => "AssignmentExpression",
            Self::VariableDeclaration => "VariableDeclaration",
            Self::VariableDeclarator => "VariableDeclarator",
            Self::FunctionDeclaration => "FunctionDeclaration",
            Self::FunctionExpression => "FunctionExpression",
            Self::BlockStatement => "BlockStatement",
            Self::ReturnStatement => "ReturnStatement",
            Self::ImportDeclaration => "ImportDeclaration",
            Self::ImportSpecifier => "ImportSpecifier",
        };
        formatter.write_str(name)
    }
}

/// Named child slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKey {
    /// Statement list of a program or block
    Body,
    /// Wrapped expression of an expression statement
    Expression,
    /// Call target
    Callee,
    /// Call argument list
    Arguments,
    /// Member access base
    Object,
    /// Member access property
    Property,
    /// Left operand or assignment target
    Left,
    /// Right operand or assigned value
    Right,
    /// Declarator list of a `var` statement
    Declarations,
    /// Declared or function name
    Id,
    /// Declarator initializer
    Init,
    /// Function parameter list
    Params,
    /// Statement block of a function
    Block,
    /// Return argument
    Argument,
    /// Import specifier list
    Specifiers,
    /// Import source literal
    Source,
    /// Local name of an import specifier
    Local,
}

impl SlotKey {
    /// Whether this slot holds a node list rather than a single node
    pub fn is_list(self) -> bool {
        matches!(
            self,
            Self::Body | Self::Arguments | Self::Declarations | Self::Params | Self::Specifiers
        )
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Body => "body",
            Self::Expression => "expression",
            Self::Callee => "callee",
            Self::Arguments => "arguments",
            Self::Object => "object",
            Self::Property => "property",
            Self::Left => "left",
            Self::Right => "right",
            Self::Declarations => "declarations",
            Self::Id => "id",
            Self::Init => "init",
            Self::Params => "params",
            Self::Block => "block",
            Self::Argument => "argument",
            Self::Specifiers => "specifiers",
            Self::Source => "source",
            Self::Local => "local",
        };
        formatter.write_str(name)
    }
}

/// The static kind-to-child-slot table, in traversal order
pub fn visitor_keys(kind: NodeKind) -> &'static [SlotKey] {
    match kind {
        NodeKind::Program | NodeKind::BlockStatement => &[SlotKey::Body],
        NodeKind::Identifier | NodeKind::Literal => &[],
        NodeKind::ExpressionStatement => &[SlotKey::Expression],
        NodeKind::CallExpression => &[SlotKey::Callee, SlotKey::Arguments],
        NodeKind::MemberExpression => &[SlotKey::Object, SlotKey::Property],
        NodeKind::BinaryExpression | NodeKind::AssignmentExpression => {
            &[SlotKey::Left, SlotKey::Right]
        }
        NodeKind::VariableDeclaration => &[SlotKey::Declarations],
        NodeKind::VariableDeclarator => &[SlotKey::Id, SlotKey::Init],
        NodeKind::FunctionDeclaration | NodeKind::FunctionExpression => {
            &[SlotKey::Id, SlotKey::Params, SlotKey::Block]
        }
        NodeKind::ReturnStatement => &[SlotKey::Argument],
        NodeKind::ImportDeclaration => &[SlotKey::Specifiers, SlotKey::Source],
        NodeKind::ImportSpecifier => &[SlotKey::Local],
    }
}
