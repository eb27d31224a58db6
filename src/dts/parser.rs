//! Recursive-descent parser producing the devicetree AST.
//!
//! Two surfaces: [`parse`] stops at the first error, [`parse_safe`] records
//! errors, synchronizes at `;` / `}` / EOF and keeps going, returning a
//! partial AST next to the error list. The cursor only ever moves forward
//! and every production either advances it or fails, so parsing terminates
//! on any input. Nesting is capped at [`MAX_DEPTH`].

use crate::error::{ErrorKind, LayoutError, Result};
use crate::span::Span;
use crate::{bail_at, err_at};

use super::ast::{Comment, Conditional, Node, Property, Value};
use super::lexer::{parse_number, Token, TokenKind};

pub const MAX_DEPTH: usize = 256;

/// Comments this close (in lines) to the item below them attach to it.
const COMMENT_ATTACH_LINES: usize = 5;

/// Parse a token stream, failing on the first error.
pub fn parse(tokens: &[Token]) -> Result<Vec<Node>> {
    let (nodes, mut errors) = parse_safe(tokens);
    match errors.is_empty() {
        true => Ok(nodes),
        false => Err(errors.remove(0)),
    }
}

/// Parse a token stream, collecting errors and returning the partial AST.
pub fn parse_safe(tokens: &[Token]) -> (Vec<Node>, Vec<LayoutError>) {
    let mut parser = Parser {
        tokens,
        idx: 0,
        errors: vec![],
    };
    let nodes = parser.file();
    (nodes, parser.errors)
}

struct Parser<'a> {
    tokens: &'a [Token],
    idx: usize,
    errors: Vec<LayoutError>,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &'a Token {
        self.tokens
            .get(self.idx)
            .or_else(|| self.tokens.last())
            .expect("token stream has an EOF terminator")
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn nth_kind(&self, n: usize) -> TokenKind {
        self.tokens
            .get(self.idx + n)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    fn bump(&mut self) -> &'a Token {
        let t = self.peek();
        if t.kind != TokenKind::Eof {
            self.idx += 1;
        }
        t
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<&'a Token> {
        let t = self.peek();
        if t.kind == kind {
            Ok(self.bump())
        } else {
            err_at!(
                ErrorKind::Parse,
                &t.span,
                "expected {what}, found {:?}",
                t.kind
            )
        }
    }

    fn record(&mut self, e: LayoutError) {
        self.errors.push(e);
    }

    /// Skip ahead to just past the next `;`, or to a `}` / EOF (left for the
    /// caller). The erroring production has already consumed at least one
    /// token whenever this can be entered at the same position twice.
    fn synchronize(&mut self) {
        loop {
            match self.peek_kind() {
                TokenKind::Semicolon => {
                    self.bump();
                    return;
                }
                TokenKind::RBrace | TokenKind::Eof => return,
                _ => {
                    self.bump();
                }
            }
        }
    }

    fn file(&mut self) -> Vec<Node> {
        let mut roots: Vec<Node> = vec![];
        let mut pending = Pending::default();
        loop {
            match self.peek_kind() {
                TokenKind::Eof => break,
                TokenKind::LineComment | TokenKind::BlockComment => {
                    let c = make_comment(self.bump());
                    pending.comments.push(c);
                }
                TokenKind::Preprocessor => {
                    let t = self.bump();
                    pending
                        .conditionals
                        .push(Conditional::from_line(&t.lexeme, t.span.clone()));
                }
                TokenKind::Slash if self.nth_kind(1) == TokenKind::LBrace => {
                    let header = self.bump();
                    match self.node("/", None, header.span.clone(), 0) {
                        Ok(mut n) => {
                            pending.attach_to_node(&mut n);
                            roots.push(n);
                        }
                        Err(e) => {
                            self.record(e);
                            self.synchronize();
                        }
                    }
                }
                TokenKind::Reference if self.nth_kind(1) == TokenKind::LBrace => {
                    // Node override, e.g. `&zip_xy_listener { ... };`.
                    let header = self.bump();
                    let name = format!("&{}", header.lexeme);
                    match self.node(&name, None, header.span.clone(), 0) {
                        Ok(mut n) => {
                            pending.attach_to_node(&mut n);
                            roots.push(n);
                        }
                        Err(e) => {
                            self.record(e);
                            self.synchronize();
                        }
                    }
                }
                TokenKind::Identifier if self.starts_node() => {
                    match self.labeled_node(0) {
                        Ok(mut n) => {
                            pending.attach_to_node(&mut n);
                            roots.push(n);
                        }
                        Err(e) => {
                            self.record(e);
                            self.synchronize();
                        }
                    }
                }
                TokenKind::Identifier => {
                    // A property has no meaning outside a node.
                    let t = self.peek();
                    self.record(LayoutError::at(
                        ErrorKind::Parse,
                        &t.span,
                        format!("property {:?} outside of any node", t.lexeme),
                    ));
                    self.bump();
                    self.synchronize();
                }
                _ => {
                    let t = self.peek();
                    self.record(LayoutError::at(
                        ErrorKind::Parse,
                        &t.span,
                        format!("unexpected {:?} at file scope", t.kind),
                    ));
                    self.bump();
                    self.synchronize();
                }
            }
        }
        // Preprocessor lines after the last node still belong to the file.
        if let Some(last) = roots.last_mut() {
            last.conditionals.append(&mut pending.conditionals);
        }
        roots
    }

    /// True when the upcoming identifier tokens open a node body.
    fn starts_node(&self) -> bool {
        let mut n = 1;
        if self.nth_kind(1) == TokenKind::Colon {
            // label ':' name
            if self.nth_kind(2) != TokenKind::Identifier {
                return false;
            }
            n = 3;
        }
        if self.nth_kind(n) == TokenKind::At {
            n += 2;
        }
        self.nth_kind(n) == TokenKind::LBrace
    }

    /// Parse `(label ':')? name ('@' unit)? '{' ... '}' ';'` with the first
    /// identifier at the cursor.
    fn labeled_node(&mut self, depth: usize) -> Result<Node> {
        let first = self.bump();
        let (label, name_tok) = if self.peek_kind() == TokenKind::Colon {
            self.bump();
            let name = self.expect(TokenKind::Identifier, "a node name after the label")?;
            (Some(first.lexeme.clone()), name)
        } else {
            (None, first)
        };
        self.node(&name_tok.lexeme, label, first.span.clone(), depth)
    }

    /// Parse the rest of a node once its name is known: optional unit
    /// address, body, closing `};`.
    fn node(
        &mut self,
        name: &str,
        label: Option<String>,
        header_span: Span,
        depth: usize,
    ) -> Result<Node> {
        if depth > MAX_DEPTH {
            bail_at!(
                ErrorKind::Parse,
                &header_span,
                "node nesting exceeds {MAX_DEPTH} levels"
            );
        }
        let mut node = Node::new(name, header_span.clone());
        node.label = label;
        if self.peek_kind() == TokenKind::At {
            self.bump();
            let unit = self.peek();
            match unit.kind {
                TokenKind::Identifier | TokenKind::Number => {
                    node.unit_address = Some(self.bump().lexeme.clone());
                }
                _ => {
                    bail_at!(ErrorKind::Parse, &unit.span, "expected a unit address after '@'")
                }
            }
        }
        self.expect(TokenKind::LBrace, "'{' to open the node body")?;

        let mut pending = Pending::default();
        loop {
            match self.peek_kind() {
                TokenKind::RBrace => {
                    self.bump();
                    break;
                }
                TokenKind::Eof => {
                    bail_at!(
                        ErrorKind::Parse,
                        &node.span,
                        "node {:?} is never closed",
                        node.name
                    );
                }
                TokenKind::LineComment | TokenKind::BlockComment => {
                    let c = make_comment(self.bump());
                    pending.comments.push(c);
                }
                TokenKind::Preprocessor => {
                    let t = self.bump();
                    node.conditionals
                        .push(Conditional::from_line(&t.lexeme, t.span.clone()));
                }
                TokenKind::Identifier if self.starts_node() => {
                    match self.labeled_node(depth + 1) {
                        Ok(mut child) => {
                            pending.attach_to_node(&mut child);
                            node.children.push(child);
                        }
                        Err(e) => {
                            self.record(e);
                            self.synchronize();
                        }
                    }
                }
                TokenKind::Identifier => match self.property() {
                    Ok(mut prop) => {
                        pending.attach_to_property(&mut prop);
                        self.attach_trailing_comment(&mut prop);
                        node.properties.push(prop);
                    }
                    Err(e) => {
                        self.record(e);
                        self.synchronize();
                    }
                },
                _ => {
                    let t = self.peek();
                    self.record(LayoutError::at(
                        ErrorKind::Parse,
                        &t.span,
                        format!("unexpected {:?} inside node {:?}", t.kind, node.name),
                    ));
                    self.bump();
                    self.synchronize();
                }
            }
        }
        let close = self.expect(TokenKind::Semicolon, "';' after '}'");
        match close {
            Ok(t) => node.span = node.span.cover(&t.span),
            Err(e) => self.record(e),
        }
        Ok(node)
    }

    /// Parse `name = v1, v2;` or the boolean `name;` form.
    fn property(&mut self) -> Result<Property> {
        let name_tok = self.bump();
        let mut prop = Property {
            name: name_tok.lexeme.clone(),
            value: None,
            comments: vec![],
            span: name_tok.span.clone(),
        };
        if self.peek_kind() == TokenKind::Equals {
            self.bump();
            let mut values = vec![];
            loop {
                values.push(self.value()?);
                if self.peek_kind() == TokenKind::Comma {
                    self.bump();
                    continue;
                }
                break;
            }
            prop.value = Some(match values.len() {
                1 => values.pop().expect("one value"),
                _ => Value::Array(values),
            });
        }
        let semi = self.expect(TokenKind::Semicolon, "';' after the property")?;
        prop.span = prop.span.cover(&semi.span);
        Ok(prop)
    }

    fn value(&mut self) -> Result<Value> {
        let t = self.peek();
        match t.kind {
            TokenKind::Str => {
                let t = self.bump();
                Ok(Value::String(t.lexeme.clone()))
            }
            TokenKind::Number => {
                let t = self.bump();
                match parse_number(&t.lexeme) {
                    Some(i) => Ok(Value::Integer(i)),
                    None => err_at!(ErrorKind::Parse, &t.span, "malformed number {:?}", t.lexeme),
                }
            }
            TokenKind::Reference => {
                let t = self.bump();
                Ok(Value::Reference(t.lexeme.clone()))
            }
            TokenKind::AngleOpen => self.array(),
            TokenKind::Identifier => self.ident_value(),
            TokenKind::LParen => self.raw_group(),
            _ => err_at!(
                ErrorKind::Parse,
                &t.span,
                "expected a property value, found {:?}",
                t.kind
            ),
        }
    }

    /// `< cell* >`
    fn array(&mut self) -> Result<Value> {
        self.expect(TokenKind::AngleOpen, "'<'")?;
        let mut cells = vec![];
        loop {
            let t = self.peek();
            match t.kind {
                TokenKind::AngleClose => {
                    self.bump();
                    break;
                }
                TokenKind::Eof => {
                    bail_at!(ErrorKind::Parse, &t.span, "array is never closed");
                }
                TokenKind::Number => {
                    let t = self.bump();
                    match parse_number(&t.lexeme) {
                        Some(i) => cells.push(Value::Integer(i)),
                        None => {
                            bail_at!(ErrorKind::Parse, &t.span, "malformed number {:?}", t.lexeme)
                        }
                    }
                }
                TokenKind::Reference => {
                    let t = self.bump();
                    cells.push(Value::Reference(t.lexeme.clone()));
                }
                TokenKind::Identifier => cells.push(self.ident_value()?),
                TokenKind::LParen => cells.push(self.raw_group()?),
                TokenKind::Str => {
                    let t = self.bump();
                    cells.push(Value::String(t.lexeme.clone()));
                }
                _ => {
                    bail_at!(
                        ErrorKind::Parse,
                        &t.span,
                        "unexpected {:?} inside an array",
                        t.kind
                    );
                }
            }
        }
        Ok(Value::Array(cells))
    }

    /// An identifier cell: a function call when a `(` follows, otherwise a
    /// raw cell left for define resolution.
    fn ident_value(&mut self) -> Result<Value> {
        let name_tok = self.bump();
        if self.peek_kind() != TokenKind::LParen {
            return Ok(Value::Raw(name_tok.lexeme.clone()));
        }
        self.bump();
        let mut args = vec![];
        loop {
            let t = self.peek();
            match t.kind {
                TokenKind::RParen => {
                    self.bump();
                    break;
                }
                TokenKind::Comma => {
                    self.bump();
                }
                TokenKind::Eof => {
                    bail_at!(
                        ErrorKind::Parse,
                        &name_tok.span,
                        "arguments of {:?} are never closed",
                        name_tok.lexeme
                    );
                }
                TokenKind::Number => {
                    let t = self.bump();
                    match parse_number(&t.lexeme) {
                        Some(i) => args.push(Value::Integer(i)),
                        None => {
                            bail_at!(ErrorKind::Parse, &t.span, "malformed number {:?}", t.lexeme)
                        }
                    }
                }
                TokenKind::Identifier => args.push(self.ident_value()?),
                TokenKind::Reference => {
                    let t = self.bump();
                    args.push(Value::Reference(t.lexeme.clone()));
                }
                TokenKind::LParen => args.push(self.raw_group()?),
                _ => {
                    bail_at!(
                        ErrorKind::Parse,
                        &t.span,
                        "unexpected {:?} in arguments of {:?}",
                        t.kind,
                        name_tok.lexeme
                    );
                }
            }
        }
        Ok(Value::FunctionCall {
            name: name_tok.lexeme.clone(),
            args,
        })
    }

    /// A parenthesized cell such as `(MOD_LSFT|MOD_RSFT)` is preserved as
    /// its source text; expressions are carried, not evaluated.
    fn raw_group(&mut self) -> Result<Value> {
        let open = self.expect(TokenKind::LParen, "'('")?;
        let mut depth = 1usize;
        let mut last = open;
        while depth > 0 {
            let t = self.peek();
            match t.kind {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => depth -= 1,
                TokenKind::Eof => {
                    bail_at!(ErrorKind::Parse, &open.span, "parenthesized cell is never closed");
                }
                _ => {}
            }
            last = self.bump();
        }
        let span = open.span.cover(&last.span);
        let text = span.file_content()[span.clone()].to_string();
        Ok(Value::Raw(text))
    }

    /// Attach a `// trailing` comment sitting on the property's last line.
    fn attach_trailing_comment(&mut self, prop: &mut Property) {
        if self.peek_kind() == TokenKind::LineComment
            && self.peek().span.start.line == prop.span.end.line
        {
            prop.comments.push(make_comment(self.bump()));
        }
    }
}

#[derive(Default)]
struct Pending {
    comments: Vec<Comment>,
    conditionals: Vec<Conditional>,
}

impl Pending {
    fn attach_to_node(&mut self, node: &mut Node) {
        let line = node.span.start.line;
        node.comments.extend(
            self.comments
                .drain(..)
                .filter(|c| line.saturating_sub(c.span.end.line) <= COMMENT_ATTACH_LINES),
        );
        // File-scope directives seen before this node belong to it.
        let mut conds = std::mem::take(&mut self.conditionals);
        conds.append(&mut node.conditionals);
        node.conditionals = conds;
    }

    fn attach_to_property(&mut self, prop: &mut Property) {
        let line = prop.span.start.line;
        prop.comments.extend(
            self.comments
                .drain(..)
                .filter(|c| line.saturating_sub(c.span.end.line) <= COMMENT_ATTACH_LINES),
        );
    }
}

fn make_comment(t: &Token) -> Comment {
    let is_block = t.kind == TokenKind::BlockComment;
    let text = if is_block {
        t.lexeme
            .trim_start_matches("/*")
            .trim_end_matches("*/")
            .trim()
            .to_string()
    } else {
        t.lexeme.trim_start_matches("//").trim().to_string()
    };
    Comment {
        text,
        is_block,
        span: t.span.clone(),
    }
}
