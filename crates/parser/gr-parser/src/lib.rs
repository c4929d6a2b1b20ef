//! Recursive-descent parser for the reference grammar
//!
//! Produces [`gr_ast`] trees whose every node carries a kind from the
//! engine's static kind-to-slot table, a byte span, and any leading
//! comment text. The grammar is a small expression language: variable
//! declarations, function declarations and expressions, imports, returns,
//! blocks, calls, member access, assignment, and binary operators.

pub mod lexer;

use gr_ast::interface::{ParseDiagnostic, ParseOptions, Parser};
use gr_ast::{Literal, NodeId, NodeKind, Operator, Tree};
use gr_intern::Interner;
use gr_span::Span;
use lexer::{Token, TokenKind};

/// The reference [`Parser`] implementation
#[derive(Debug, Default)]
pub struct DefaultParser;

impl Parser for DefaultParser {
    fn parse(
        &self,
        _options: &ParseOptions,
        source: &str,
        tree: &mut Tree,
        interner: &Interner,
    ) -> Result<NodeId, ParseDiagnostic> {
        let tokens = lexer::tokenize(source)?;
        let mut state = State {
            source,
            tokens,
            position: 0,
            tree,
            interner,
        };
        state.program()
    }
}

struct State<'ctx> {
    source: &'ctx str,
    tokens: Vec<(Token, Vec<String>)>,
    position: usize,
    tree: &'ctx mut Tree,
    interner: &'ctx Interner,
}

impl State<'_> {
    fn program(&mut self) -> Result<NodeId, ParseDiagnostic> {
        let mut body = Vec::new();
        while self.peek().kind != TokenKind::Eof {
            body.push(self.statement()?);
        }
        let program = self.tree.program(body);
        self.tree.node_mut(program).span = Some(Span::new(0, end_index(self.source)));
        Ok(program)
    }

    fn statement(&mut self) -> Result<NodeId, ParseDiagnostic> {
        let comments = self.tokens[self.position].1.clone();
        let statement = match self.peek().kind {
            TokenKind::LeftBrace => self.block()?,
            TokenKind::Ident => match self.text(self.peek()) {
                "var" => self.var_statement()?,
                "function" => self.function_declaration()?,
                "return" => self.return_statement()?,
                "import" => self.import_statement()?,
                _ => self.expression_statement()?,
            },
            _ => self.expression_statement()?,
        };
        self.tree.node_mut(statement).leading_comments = comments;
        Ok(statement)
    }

    fn block(&mut self) -> Result<NodeId, ParseDiagnostic> {
        let open = self.expect(TokenKind::LeftBrace, "`{`")?;
        let mut body = Vec::new();
        while !matches!(self.peek().kind, TokenKind::RightBrace | TokenKind::Eof) {
            body.push(self.statement()?);
        }
        let close = self.expect(TokenKind::RightBrace, "`}`")?;
        let block = self.tree.block(body);
        self.tree.node_mut(block).span = Some(join(open.span, close.span));
        Ok(block)
    }

    fn var_statement(&mut self) -> Result<NodeId, ParseDiagnostic> {
        let keyword = self.advance();
        let mut declarations = Vec::new();
        loop {
            let name = self.identifier()?;
            let init = if self.peek().kind == TokenKind::Assign {
                self.advance();
                Some(self.assignment()?)
            } else {
                None
            };
            let declarator = self.tree.declarator(name, init);
            let start = self.span_of(name).unwrap_or(keyword.span);
            let end = init
                .and_then(|node| self.tree.node(node).span)
                .unwrap_or(start);
            self.tree.node_mut(declarator).span = Some(join(start, end));
            declarations.push(declarator);
            if self.peek().kind != TokenKind::Comma {
                break;
            }
            self.advance();
        }
        let semicolon = self.expect(TokenKind::Semicolon, "`;`")?;
        let declaration = self.tree.var_declaration(declarations);
        self.tree.node_mut(declaration).span = Some(join(keyword.span, semicolon.span));
        Ok(declaration)
    }

    fn function_declaration(&mut self) -> Result<NodeId, ParseDiagnostic> {
        let keyword = self.advance();
        let name = self.identifier()?;
        let params = self.parameter_list()?;
        let body = self.block()?;
        let function = self.tree.function_declaration(name, params, body);
        let end = self.span_of(body).unwrap_or(keyword.span);
        self.tree.node_mut(function).span = Some(join(keyword.span, end));
        Ok(function)
    }

    fn return_statement(&mut self) -> Result<NodeId, ParseDiagnostic> {
        let keyword = self.advance();
        let argument = if self.peek().kind == TokenKind::Semicolon {
            None
        } else {
            Some(self.expression()?)
        };
        let semicolon = self.expect(TokenKind::Semicolon, "`;`")?;
        let statement = self.tree.return_statement(argument);
        self.tree.node_mut(statement).span = Some(join(keyword.span, semicolon.span));
        Ok(statement)
    }

    fn import_statement(&mut self) -> Result<NodeId, ParseDiagnostic> {
        let keyword = self.advance();
        let mut specifiers = Vec::new();
        loop {
            let local = self.identifier()?;
            let specifier = self.tree.import_specifier(local);
            self.tree.node_mut(specifier).span = self.span_of(local);
            specifiers.push(specifier);
            if self.peek().kind != TokenKind::Comma {
                break;
            }
            self.advance();
        }
        let from = self.advance();
        if from.kind != TokenKind::Ident || self.text(&from) != "from" {
            return Err(unexpected(&from, "`from`"));
        }
        let source_token = self.expect(TokenKind::Str, "module name string")?;
        let text = source_token.string.clone().unwrap_or_default();
        let source = self
            .tree
            .literal(Literal::String(text), Some(source_token.span));
        let semicolon = self.expect(TokenKind::Semicolon, "`;`")?;
        let import = self.tree.import_declaration(specifiers, source);
        self.tree.node_mut(import).span = Some(join(keyword.span, semicolon.span));
        Ok(import)
    }

    fn expression_statement(&mut self) -> Result<NodeId, ParseDiagnostic> {
        let expression = self.expression()?;
        let semicolon = self.expect(TokenKind::Semicolon, "`;`")?;
        let statement = self.tree.expression_statement(expression);
        let start = self.span_of(expression).unwrap_or(semicolon.span);
        self.tree.node_mut(statement).span = Some(join(start, semicolon.span));
        Ok(statement)
    }

    fn expression(&mut self) -> Result<NodeId, ParseDiagnostic> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<NodeId, ParseDiagnostic> {
        let left = self.equality()?;
        if self.peek().kind != TokenKind::Assign {
            return Ok(left);
        }
        let operator = self.advance();
        if !matches!(
            self.tree.kind(left),
            NodeKind::Identifier | NodeKind::MemberExpression
        ) {
            return Err(ParseDiagnostic {
                message: "invalid assignment target".to_owned(),
                span: self.span_of(left).or(Some(operator.span)),
            });
        }
        let right = self.assignment()?;
        let node = self.tree.assignment(left, right);
        self.tree.node_mut(node).span = self.joined_span(left, right);
        Ok(node)
    }

    fn equality(&mut self) -> Result<NodeId, ParseDiagnostic> {
        let mut left = self.relational()?;
        loop {
            let operator = match self.peek().kind {
                TokenKind::EqEq => Operator::Eq,
                TokenKind::NotEq => Operator::NotEq,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.relational()?;
            let node = self.tree.binary(operator, left, right);
            self.tree.node_mut(node).span = self.joined_span(left, right);
            left = node;
        }
    }

    fn relational(&mut self) -> Result<NodeId, ParseDiagnostic> {
        let mut left = self.additive()?;
        loop {
            let operator = match self.peek().kind {
                TokenKind::Lt => Operator::Lt,
                TokenKind::Gt => Operator::Gt,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.additive()?;
            let node = self.tree.binary(operator, left, right);
            self.tree.node_mut(node).span = self.joined_span(left, right);
            left = node;
        }
    }

    fn additive(&mut self) -> Result<NodeId, ParseDiagnostic> {
        let mut left = self.multiplicative()?;
        loop {
            let operator = match self.peek().kind {
                TokenKind::Plus => Operator::Add,
                TokenKind::Minus => Operator::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.multiplicative()?;
            let node = self.tree.binary(operator, left, right);
            self.tree.node_mut(node).span = self.joined_span(left, right);
            left = node;
        }
    }

    fn multiplicative(&mut self) -> Result<NodeId, ParseDiagnostic> {
        let mut left = self.postfix()?;
        loop {
            let operator = match self.peek().kind {
                TokenKind::Star => Operator::Mul,
                TokenKind::Slash => Operator::Div,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.postfix()?;
            let node = self.tree.binary(operator, left, right);
            self.tree.node_mut(node).span = self.joined_span(left, right);
            left = node;
        }
    }

    fn postfix(&mut self) -> Result<NodeId, ParseDiagnostic> {
        let mut node = self.primary()?;
        loop {
            match self.peek().kind {
                TokenKind::LeftParen => {
                    self.advance();
                    let mut arguments = Vec::new();
                    while self.peek().kind != TokenKind::RightParen {
                        arguments.push(self.assignment()?);
                        if self.peek().kind != TokenKind::Comma {
                            break;
                        }
                        self.advance();
                    }
                    let close = self.expect(TokenKind::RightParen, "`)`")?;
                    let call = self.tree.call(node, arguments);
                    let start = self.span_of(node).unwrap_or(close.span);
                    self.tree.node_mut(call).span = Some(join(start, close.span));
                    node = call;
                }
                TokenKind::Dot => {
                    self.advance();
                    let property = self.identifier()?;
                    let member = self.tree.member(node, property);
                    self.tree.node_mut(member).span = self.joined_span(node, property);
                    node = member;
                }
                _ => return Ok(node),
            }
        }
    }

    fn primary(&mut self) -> Result<NodeId, ParseDiagnostic> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Number => {
                self.advance();
                let text = self.text(&token).to_owned();
                let value: f64 = text.parse().map_err(|_| ParseDiagnostic {
                    message: format!("malformed number literal `{text}`"),
                    span: Some(token.span),
                })?;
                Ok(self.tree.literal(Literal::Number(value), Some(token.span)))
            }
            TokenKind::Str => {
                self.advance();
                let text = token.string.clone().unwrap_or_default();
                Ok(self.tree.literal(Literal::String(text), Some(token.span)))
            }
            TokenKind::LeftParen => {
                self.advance();
                let inner = self.expression()?;
                self.expect(TokenKind::RightParen, "`)`")?;
                Ok(inner)
            }
            TokenKind::Ident => match self.text(&token) {
                "true" => {
                    self.advance();
                    Ok(self.tree.literal(Literal::Bool(true), Some(token.span)))
                }
                "false" => {
                    self.advance();
                    Ok(self.tree.literal(Literal::Bool(false), Some(token.span)))
                }
                "null" => {
                    self.advance();
                    Ok(self.tree.literal(Literal::Null, Some(token.span)))
                }
                "function" => self.function_expression(),
                _ => self.identifier(),
            },
            _ => Err(unexpected(&token, "an expression")),
        }
    }

    fn function_expression(&mut self) -> Result<NodeId, ParseDiagnostic> {
        let keyword = self.advance();
        let name = if self.peek().kind == TokenKind::Ident {
            Some(self.identifier()?)
        } else {
            None
        };
        let params = self.parameter_list()?;
        let body = self.block()?;
        let function = self.tree.function_expression(name, params, body);
        let end = self.span_of(body).unwrap_or(keyword.span);
        self.tree.node_mut(function).span = Some(join(keyword.span, end));
        Ok(function)
    }

    fn parameter_list(&mut self) -> Result<Vec<NodeId>, ParseDiagnostic> {
        self.expect(TokenKind::LeftParen, "`(`")?;
        let mut params = Vec::new();
        while self.peek().kind != TokenKind::RightParen {
            params.push(self.identifier()?);
            if self.peek().kind != TokenKind::Comma {
                break;
            }
            self.advance();
        }
        self.expect(TokenKind::RightParen, "`)`")?;
        Ok(params)
    }

    fn identifier(&mut self) -> Result<NodeId, ParseDiagnostic> {
        let token = self.expect(TokenKind::Ident, "an identifier")?;
        let symbol = self.interner.intern(self.text(&token));
        Ok(self.tree.identifier(symbol, Some(token.span)))
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.position].0
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.position].0.clone();
        if self.position + 1 < self.tokens.len() {
            self.position += 1;
        }
        token
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, ParseDiagnostic> {
        let token = self.peek().clone();
        if token.kind != kind {
            return Err(unexpected(&token, what));
        }
        Ok(self.advance())
    }

    fn text(&self, token: &Token) -> &str {
        &self.source[token.span.start as usize..token.span.end as usize]
    }

    fn span_of(&self, node: NodeId) -> Option<Span> {
        self.tree.node(node).span
    }

    fn joined_span(&self, left: NodeId, right: NodeId) -> Option<Span> {
        match (self.span_of(left), self.span_of(right)) {
            (Some(start), Some(end)) => Some(join(start, end)),
            (only, None) | (None, only) => only,
        }
    }
}

fn join(start: Span, end: Span) -> Span {
    Span::new(start.start, end.end)
}

fn unexpected(token: &Token, expected: &str) -> ParseDiagnostic {
    ParseDiagnostic {
        message: format!("expected {expected}, found {:?}", token.kind),
        span: Some(token.span),
    }
}

#[allow(
    clippy::cast_possible_truncation,
    reason = "byte offsets are bounded by the 4 GiB source limit spans impose"
)]
fn end_index(source: &str) -> u32 {
    source.len() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use gr_ast::SlotKey;

    fn parse(source: &str) -> (Tree, NodeId, Interner) {
        let interner = Interner::new();
        let mut tree = Tree::new();
        let root = DefaultParser
            .parse(&ParseOptions::default(), source, &mut tree, &interner)
            .expect("parse");
        (tree, root, interner)
    }

    #[test]
    fn test_call_statement() {
        let (tree, root, interner) = parse("a(b);");
        let statement = tree.list(root, SlotKey::Body)[0];
        let call = tree.single(statement, SlotKey::Expression).expect("call");
        assert_eq!(tree.kind(call), NodeKind::CallExpression);
        let callee = tree.single(call, SlotKey::Callee).expect("callee");
        assert_eq!(interner.resolve(&tree.node(callee).name.expect("name")), "a");
        assert_eq!(tree.list(call, SlotKey::Arguments).len(), 1);
    }

    #[test]
    fn test_var_declaration_with_initializers() {
        let (tree, root, _) = parse("var x = 1 + 2, y;");
        let declaration = tree.list(root, SlotKey::Body)[0];
        assert_eq!(tree.kind(declaration), NodeKind::VariableDeclaration);
        let declarators = tree.list(declaration, SlotKey::Declarations);
        assert_eq!(declarators.len(), 2);
        let init = tree.single(declarators[0], SlotKey::Init).expect("init");
        assert_eq!(tree.kind(init), NodeKind::BinaryExpression);
        assert_eq!(tree.single(declarators[1], SlotKey::Init), None);
    }

    #[test]
    fn test_function_declaration_and_return() {
        let (tree, root, _) = parse("function add(a, b) { return a + b; }");
        let function = tree.list(root, SlotKey::Body)[0];
        assert_eq!(tree.kind(function), NodeKind::FunctionDeclaration);
        assert_eq!(tree.list(function, SlotKey::Params).len(), 2);
        let body = tree.single(function, SlotKey::Block).expect("body");
        let ret = tree.list(body, SlotKey::Body)[0];
        assert_eq!(tree.kind(ret), NodeKind::ReturnStatement);
    }

    #[test]
    fn test_import_statement() {
        let (tree, root, _) = parse("import map, each from \"iterate\";");
        let import = tree.list(root, SlotKey::Body)[0];
        assert_eq!(tree.kind(import), NodeKind::ImportDeclaration);
        assert_eq!(tree.list(import, SlotKey::Specifiers).len(), 2);
        let source = tree.single(import, SlotKey::Source).expect("source");
        assert_eq!(
            tree.node(source).value,
            Some(Literal::String("iterate".to_owned()))
        );
    }

    #[test]
    fn test_member_assignment() {
        let (tree, root, _) = parse("config.debug = true;");
        let statement = tree.list(root, SlotKey::Body)[0];
        let assignment = tree.single(statement, SlotKey::Expression).expect("expr");
        assert_eq!(tree.kind(assignment), NodeKind::AssignmentExpression);
        let left = tree.single(assignment, SlotKey::Left).expect("left");
        assert_eq!(tree.kind(left), NodeKind::MemberExpression);
    }

    #[test]
    fn test_precedence() {
        // 1 + 2 * 3 parses as 1 + (2 * 3)
        let (tree, root, _) = parse("x = 1 + 2 * 3;");
        let statement = tree.list(root, SlotKey::Body)[0];
        let assignment = tree.single(statement, SlotKey::Expression).expect("expr");
        let sum = tree.single(assignment, SlotKey::Right).expect("right");
        assert_eq!(tree.node(sum).operator, Some(Operator::Add));
        let product = tree.single(sum, SlotKey::Right).expect("rhs");
        assert_eq!(tree.node(product).operator, Some(Operator::Mul));
    }

    #[test]
    fn test_invalid_assignment_target() {
        let interner = Interner::new();
        let mut tree = Tree::new();
        let result = DefaultParser.parse(&ParseOptions::default(), "1 = x;", &mut tree, &interner);
        assert!(result.is_err());
    }

    #[test]
    fn test_leading_comment_lands_on_statement() {
        let (tree, root, _) = parse("// setup\nvar x;");
        let declaration = tree.list(root, SlotKey::Body)[0];
        assert_eq!(tree.node(declaration).leading_comments, vec!["setup".to_owned()]);
    }

    #[test]
    fn test_spans_cover_source_text() {
        let (tree, root, _) = parse("a(b);");
        let statement = tree.list(root, SlotKey::Body)[0];
        let span = tree.node(statement).span.expect("span");
        assert_eq!((span.start, span.end), (0, 5));
    }
}
