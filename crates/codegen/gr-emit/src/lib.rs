//! Code generation: regenerating source text from a tree
//!
//! The printer walks the tree directly (no visitor machinery) and, when a
//! coordinate map is requested, records one mapping per spanned node: the
//! position the node's text starts at in the output, paired with the
//! line/column its original span resolves to in the input text.

use gr_ast::interface::{GenOptions, Generated, Generator};
use gr_ast::{Literal, NodeId, NodeKind, SlotKey, Tree};
use gr_intern::Interner;
use gr_span::{LineCol, LineIndex, SourceMap};

/// The reference [`Generator`] implementation
#[derive(Debug, Default)]
pub struct DefaultGenerator;

impl Generator for DefaultGenerator {
    fn generate(
        &self,
        tree: &Tree,
        root: NodeId,
        options: &GenOptions,
        interner: &Interner,
        original: Option<&str>,
    ) -> Generated {
        let map = if options.source_maps {
            Some(SourceMap::new(None, options.source_file_name.clone()))
        } else {
            None
        };
        let mut printer = Printer {
            tree,
            interner,
            original_lines: original.map(LineIndex::new),
            output: String::new(),
            line: 1,
            column: 0,
            indent: 0,
            map,
        };
        printer.node(root);
        Generated {
            code: printer.output,
            map: printer.map,
        }
    }
}

struct Printer<'emit> {
    tree: &'emit Tree,
    interner: &'emit Interner,
    original_lines: Option<LineIndex>,
    output: String,
    line: u32,
    column: u32,
    indent: usize,
    map: Option<SourceMap>,
}

impl Printer<'_> {
    fn node(&mut self, id: NodeId) {
        self.comments(id);
        self.mark(id);
        match self.tree.kind(id) {
            NodeKind::Program => self.statements(id),
            NodeKind::ExpressionStatement => {
                if let Some(expression) = self.tree.single(id, SlotKey::Expression) {
                    self.node(expression);
                }
                self.push(";");
            }
            NodeKind::VariableDeclaration => {
                self.push("var ");
                let declarations = self.tree.list(id, SlotKey::Declarations);
                for (position, declarator) in declarations.to_vec().into_iter().enumerate() {
                    if position > 0 {
                        self.push(", ");
                    }
                    self.node(declarator);
                }
                self.push(";");
            }
            NodeKind::VariableDeclarator => {
                if let Some(name) = self.tree.single(id, SlotKey::Id) {
                    self.node(name);
                }
                if let Some(init) = self.tree.single(id, SlotKey::Init) {
                    self.push(" = ");
                    self.node(init);
                }
            }
            NodeKind::FunctionDeclaration | NodeKind::FunctionExpression => {
                self.push("function");
                if let Some(name) = self.tree.single(id, SlotKey::Id) {
                    self.push(" ");
                    self.node(name);
                }
                self.push("(");
                let params = self.tree.list(id, SlotKey::Params);
                for (position, param) in params.to_vec().into_iter().enumerate() {
                    if position > 0 {
                        self.push(", ");
                    }
                    self.node(param);
                }
                self.push(") ");
                if let Some(body) = self.tree.single(id, SlotKey::Block) {
                    self.node(body);
                }
            }
            NodeKind::BlockStatement => {
                self.push("{");
                if self.tree.list(id, SlotKey::Body).is_empty() {
                    self.push("}");
                } else {
                    self.newline_indented(self.indent + 1);
                    self.indent += 1;
                    self.statements(id);
                    self.indent -= 1;
                    self.newline_indented(self.indent);
                    self.push("}");
                }
            }
            NodeKind::ReturnStatement => {
                self.push("return");
                if let Some(argument) = self.tree.single(id, SlotKey::Argument) {
                    self.push(" ");
                    self.node(argument);
                }
                self.push(";");
            }
            NodeKind::ImportDeclaration => {
                self.push("import ");
                let specifiers = self.tree.list(id, SlotKey::Specifiers);
                for (position, specifier) in specifiers.to_vec().into_iter().enumerate() {
                    if position > 0 {
                        self.push(", ");
                    }
                    self.node(specifier);
                }
                self.push(" from ");
                if let Some(source) = self.tree.single(id, SlotKey::Source) {
                    self.node(source);
                }
                self.push(";");
            }
            NodeKind::ImportSpecifier => {
                if let Some(local) = self.tree.single(id, SlotKey::Local) {
                    self.node(local);
                }
            }
            NodeKind::CallExpression => {
                if let Some(callee) = self.tree.single(id, SlotKey::Callee) {
                    self.node(callee);
                }
                self.push("(");
                let arguments = self.tree.list(id, SlotKey::Arguments);
                for (position, argument) in arguments.to_vec().into_iter().enumerate() {
                    if position > 0 {
                        self.push(", ");
                    }
                    self.node(argument);
                }
                self.push(")");
            }
            NodeKind::MemberExpression => {
                if let Some(object) = self.tree.single(id, SlotKey::Object) {
                    self.node(object);
                }
                self.push(".");
                if let Some(property) = self.tree.single(id, SlotKey::Property) {
                    self.node(property);
                }
            }
            NodeKind::BinaryExpression | NodeKind::AssignmentExpression => {
                let operator = self.tree.node(id).operator;
                if let Some(left) = self.tree.single(id, SlotKey::Left) {
                    self.operand(left, id, false);
                }
                if let Some(operator) = operator {
                    self.push(" ");
                    self.push(operator.as_str());
                    self.push(" ");
                }
                if let Some(right) = self.tree.single(id, SlotKey::Right) {
                    self.operand(right, id, true);
                }
            }
            NodeKind::Identifier => {
                if let Some(name) = self.tree.node(id).name {
                    let text = self.interner.resolve(&name);
                    self.push(&text);
                }
            }
            NodeKind::Literal => {
                let text = match self.tree.node(id).value.clone() {
                    Some(Literal::Number(value)) => format_number(value),
                    Some(Literal::String(value)) => quote(&value),
                    Some(Literal::Bool(true)) => "true".to_owned(),
                    Some(Literal::Bool(false)) => "false".to_owned(),
                    Some(Literal::Null) | None => "null".to_owned(),
                };
                self.push(&text);
            }
        }
    }

    fn statements(&mut self, id: NodeId) {
        let body = self.tree.list(id, SlotKey::Body);
        for (position, statement) in body.to_vec().into_iter().enumerate() {
            if position > 0 {
                self.newline_indented(self.indent);
            }
            self.node(statement);
        }
    }

    /// Parenthesizes an operand whose own precedence would otherwise
    /// change the parse; binary operators are left-associative, so a
    /// right operand of equal precedence also needs parentheses
    fn operand(&mut self, child: NodeId, parent: NodeId, is_right: bool) {
        let needs_parens = match self.tree.kind(child) {
            NodeKind::AssignmentExpression => true,
            NodeKind::BinaryExpression => {
                let child_level = self.tree.node(child).operator.map_or(0, precedence);
                let parent_level = self.tree.node(parent).operator.map_or(0, precedence);
                child_level < parent_level || (is_right && child_level == parent_level)
            }
            _ => false,
        };
        if needs_parens {
            self.push("(");
            self.node(child);
            self.push(")");
        } else {
            self.node(child);
        }
    }

    fn comments(&mut self, id: NodeId) {
        for comment in self.tree.node(id).leading_comments.clone() {
            self.push("// ");
            self.push(&comment);
            self.newline_indented(self.indent);
        }
    }

    /// Records a mapping from the current output position to the node's
    /// original position
    fn mark(&mut self, id: NodeId) {
        let Some(map) = self.map.as_mut() else {
            return;
        };
        let Some(lines) = self.original_lines.as_ref() else {
            return;
        };
        if let Some(span) = self.tree.node(id).span {
            map.push(LineCol::new(self.line, self.column), lines.line_col(span.start));
        }
    }

    fn newline_indented(&mut self, indent: usize) {
        self.push("\n");
        for _ in 0..indent {
            self.push("    ");
        }
    }

    #[allow(
        clippy::cast_possible_truncation,
        reason = "a single character encodes to at most four bytes"
    )]
    fn push(&mut self, text: &str) {
        for ch in text.chars() {
            if ch == '\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += ch.len_utf8() as u32;
            }
        }
        self.output.push_str(text);
    }
}

fn precedence(operator: gr_ast::Operator) -> u8 {
    use gr_ast::Operator;
    match operator {
        Operator::Assign => 0,
        Operator::Eq | Operator::NotEq => 1,
        Operator::Lt | Operator::Gt => 2,
        Operator::Add | Operator::Sub => 3,
        Operator::Mul | Operator::Div => 4,
    }
}

#[allow(
    clippy::float_cmp,
    clippy::cast_possible_truncation,
    reason = "integral values below 1e15 convert exactly"
)]
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for ch in value.chars() {
        match ch {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\t' => quoted.push_str("\\t"),
            other => quoted.push(other),
        }
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;
    use gr_ast::interface::ParseOptions;
    use gr_parser::DefaultParser;
    use gr_span::Span;

    fn round_trip(source: &str) -> String {
        let interner = Interner::new();
        let mut tree = Tree::new();
        let root = gr_ast::interface::Parser::parse(
            &DefaultParser,
            &ParseOptions::default(),
            source,
            &mut tree,
            &interner,
        )
        .expect("parse");
        DefaultGenerator
            .generate(&tree, root, &GenOptions::default(), &interner, Some(source))
            .code
    }

    #[test]
    fn test_call_round_trip() {
        assert_eq!(round_trip("a(b);"), "a(b);");
    }

    #[test]
    fn test_function_layout() {
        assert_eq!(
            round_trip("function add(a, b) { return a + b; }"),
            "function add(a, b) {\n    return a + b;\n}"
        );
    }

    #[test]
    fn test_var_and_import() {
        assert_eq!(
            round_trip("var x = 1, y;\nimport map from \"iterate\";"),
            "var x = 1, y;\nimport map from \"iterate\";"
        );
    }

    #[test]
    fn test_precedence_parens_preserved() {
        assert_eq!(round_trip("x = (1 + 2) * 3;"), "x = (1 + 2) * 3;");
        assert_eq!(round_trip("x = 1 + 2 * 3;"), "x = 1 + 2 * 3;");
    }

    #[test]
    fn test_string_escaping() {
        assert_eq!(round_trip("log(\"a\\nb\");"), "log(\"a\\nb\");");
    }

    #[test]
    fn test_map_points_at_original_positions() {
        let source = "a(b);";
        let interner = Interner::new();
        let mut tree = Tree::new();
        let root = gr_ast::interface::Parser::parse(
            &DefaultParser,
            &ParseOptions::default(),
            source,
            &mut tree,
            &interner,
        )
        .expect("parse");
        let options = GenOptions {
            source_maps: true,
            source_file_name: "input.src".to_owned(),
        };
        let generated =
            DefaultGenerator.generate(&tree, root, &options, &interner, Some(source));
        let map = generated.map.expect("map");
        assert_eq!(map.sources, vec!["input.src".to_owned()]);
        // the argument identifier starts at column 2 in both texts
        let found = map.lookup(LineCol::new(1, 2)).expect("mapping");
        assert_eq!(found.original, LineCol::new(1, 2));
    }

    #[test]
    fn test_comments_are_reprinted() {
        let interner = Interner::new();
        let mut tree = Tree::new();
        let ident = tree.identifier(interner.intern("x"), Some(Span::new(0, 1)));
        let statement = tree.expression_statement(ident);
        tree.node_mut(statement)
            .leading_comments
            .push("keep me".to_owned());
        let program = tree.program(vec![statement]);

        let generated = DefaultGenerator.generate(
            &tree,
            program,
            &GenOptions::default(),
            &interner,
            None,
        );
        assert_eq!(generated.code, "// keep me\nx;");
    }
}
