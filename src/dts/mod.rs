//! Devicetree source parsing: tokenizer, recursive-descent parser, AST and
//! the walker used by extraction.

pub mod ast;
pub mod format;
pub mod lexer;
pub mod parser;
pub mod walk;

pub use ast::{Comment, Conditional, Node, Property, Value};
pub use format::format_nodes;
pub use lexer::{lex, lex_safe, Token, TokenKind};
pub use parser::{parse, parse_safe, MAX_DEPTH};
pub use walk::{find_nodes_compatible, find_nodes_named, find_nodes_where, walk, walk_all, Visitor};

use crate::error::{LayoutError, Result};

/// Lex and parse in one step, stopping at the first error.
pub fn parse_source(source: &str, file_name: &str) -> Result<Vec<Node>> {
    parse(&lex(source, file_name)?)
}

/// Lex and parse in one step, accumulating every error.
pub fn parse_source_safe(source: &str, file_name: &str) -> (Vec<Node>, Vec<LayoutError>) {
    let (tokens, mut errors) = lex_safe(source, file_name);
    let (nodes, parse_errors) = parse_safe(&tokens);
    errors.extend(parse_errors);
    (nodes, errors)
}
