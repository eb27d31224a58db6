//! Tokenizer for devicetree source include (DTSI) text.
//!
//! The lexer is total over its input: every branch either consumes at least
//! one byte or emits EOF, so it terminates in linear time. Unknown
//! punctuation folds into the identifier catch-all the same way unusual
//! atoms do in an s-expression lexer, which keeps operator-bearing cells
//! like `(MOD_LSFT|MOD_RSFT)` lexable; the parser decides what to do with
//! them.

use std::sync::Arc;
use std::str::Bytes;

use crate::error::{ErrorKind, LayoutError, Result};
use crate::span::{Position, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Identifier,
    Number,
    Str,
    Reference,
    LBrace,
    RBrace,
    Semicolon,
    Equals,
    Comma,
    AngleOpen,
    AngleClose,
    LParen,
    RParen,
    Slash,
    Colon,
    At,
    Preprocessor,
    LineComment,
    BlockComment,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Token text. Strings hold their escape-processed content; references
    /// hold the referenced name without the `&`.
    pub lexeme: String,
    pub span: Span,
}

impl Token {
    /// 1-based line of the token start.
    pub fn line(&self) -> usize {
        self.span.start.line
    }

    /// 1-based column of the token start.
    pub fn column(&self) -> usize {
        self.span.start.column
    }
}

/// Parse a base-10 or `0x`-prefixed integer token text.
pub fn parse_number(s: &str) -> Option<i64> {
    let (neg, rest) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let value = if let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else {
        if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        rest.parse::<i64>().ok()?
    };
    Some(if neg { -value } else { value })
}

const DIRECTIVES: &[&str] = &[
    "define", "include", "if", "ifdef", "ifndef", "elif", "else", "endif", "undef", "pragma",
    "error", "warning",
];

/// A byte iterator that tracks the current line and line start so that any
/// point in the stream can be stamped with a [`Position`].
#[derive(Clone)]
struct SourceBytes<'a> {
    bytes: Bytes<'a>,
    source_length: usize,
    line: usize,
    line_beginning: usize,
}

impl<'a> SourceBytes<'a> {
    fn new(s: &'a str) -> Self {
        Self {
            bytes: s.bytes(),
            source_length: s.len(),
            line: 0,
            line_beginning: 0,
        }
    }

    fn pos(&self) -> Position {
        let absolute = self.source_length - self.bytes.len();
        Position::new(absolute, self.line + 1, absolute - self.line_beginning + 1)
    }
}

impl<'a> Iterator for SourceBytes<'a> {
    type Item = u8;

    fn next(&mut self) -> Option<Self::Item> {
        self.bytes.next().map(|b| {
            if b == b'\n' {
                self.line += 1;
                self.line_beginning = self.source_length - self.bytes.len();
            }
            b
        })
    }
}

fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'{' | b'}'
            | b';'
            | b'='
            | b','
            | b'<'
            | b'>'
            | b'('
            | b')'
            | b':'
            | b'@'
            | b'&'
            | b'"'
            | b'/'
    ) || b.is_ascii_whitespace()
}

struct Lexer<'a> {
    source: &'a str,
    bytes: SourceBytes<'a>,
    file_name: Arc<str>,
    file_content: Arc<str>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str, file_name: &str) -> Self {
        Self {
            source,
            bytes: SourceBytes::new(source),
            file_name: Arc::from(file_name),
            file_content: Arc::from(source),
        }
    }

    fn span_from(&self, start: Position) -> Span {
        Span::new(
            start,
            self.bytes.pos(),
            self.file_name.clone(),
            self.file_content.clone(),
        )
    }

    fn token(&self, kind: TokenKind, start: Position) -> Token {
        let span = self.span_from(start);
        Token {
            kind,
            lexeme: self.source[span.clone()].to_string(),
            span,
        }
    }

    fn token_with(&self, kind: TokenKind, start: Position, lexeme: String) -> Token {
        Token {
            kind,
            lexeme,
            span: self.span_from(start),
        }
    }

    fn error(&self, start: Position, msg: impl Into<String>) -> LayoutError {
        LayoutError::at(ErrorKind::Lex, &self.span_from(start), msg)
    }

    fn next_while(&mut self, f: impl Fn(u8) -> bool) {
        for b in self.bytes.clone() {
            if f(b) {
                // Iterating over a clone of this iterator - guaranteed Some.
                self.bytes.next().expect("iter lag");
            } else {
                break;
            }
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.clone().next()
    }

    fn next_token(&mut self) -> Option<Result<Token>> {
        use TokenKind::*;
        loop {
            let start = self.bytes.pos();
            let b = match self.bytes.next() {
                Some(b) => b,
                None => return None,
            };
            let kind = match b {
                b if b.is_ascii_whitespace() => continue,
                b'{' => LBrace,
                b'}' => RBrace,
                b';' => Semicolon,
                b'=' => Equals,
                b',' => Comma,
                b'<' => AngleOpen,
                b'>' => AngleClose,
                b'(' => LParen,
                b')' => RParen,
                b':' => Colon,
                b'@' => At,
                b'"' => return Some(self.string_token(start)),
                b'&' => {
                    self.next_while(|b| !is_delimiter(b));
                    let name = &self.source[self.span_from(start)][1..];
                    if name.is_empty() {
                        return Some(Err(self.error(start, "expected a name after '&'")));
                    }
                    return Some(Ok(self.token_with(Reference, start, name.to_string())));
                }
                b'/' => match self.peek() {
                    Some(b'/') => {
                        self.next_while(|b| b != b'\n');
                        LineComment
                    }
                    Some(b'*') => {
                        self.bytes.next();
                        match self.block_comment_end() {
                            Ok(()) => BlockComment,
                            Err(()) => {
                                return Some(Err(
                                    self.error(start, "unterminated block comment, expected */")
                                ))
                            }
                        }
                    }
                    _ => Slash,
                },
                b'#' => {
                    self.next_while(|b| !is_delimiter(b));
                    let word = &self.source[self.span_from(start)][1..];
                    let directive = word.split('-').next().unwrap_or("");
                    if DIRECTIVES.contains(&directive) {
                        // The rest of the line belongs to the directive.
                        self.next_while(|b| b != b'\n');
                        Preprocessor
                    } else {
                        // #binding-cells and friends: a property name.
                        Identifier
                    }
                }
                _ => {
                    self.next_while(|b| !is_delimiter(b));
                    let text = &self.source[self.span_from(start)];
                    if parse_number(text).is_some() {
                        Number
                    } else {
                        Identifier
                    }
                }
            };
            return Some(Ok(self.token(kind, start)));
        }
    }

    /// Consume bytes until `*/`. Err means EOF was hit first.
    fn block_comment_end(&mut self) -> std::result::Result<(), ()> {
        let mut prev = 0u8;
        for b in self.bytes.by_ref() {
            if prev == b'*' && b == b'/' {
                return Ok(());
            }
            prev = b;
        }
        Err(())
    }

    fn string_token(&mut self, start: Position) -> Result<Token> {
        // Collected as bytes; raw input bytes pass through untouched so
        // multi-byte UTF-8 survives, while escapes append encoded chars.
        let mut out: Vec<u8> = vec![];
        let push_char = |out: &mut Vec<u8>, c: char| {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
        };
        loop {
            let b = match self.peek() {
                None | Some(b'\n') => {
                    return Err(self.error(start, "unterminated string"));
                }
                Some(b) => b,
            };
            self.bytes.next();
            match b {
                b'"' => {
                    let text = String::from_utf8_lossy(&out).into_owned();
                    return Ok(self.token_with(TokenKind::Str, start, text));
                }
                b'\\' => {
                    let esc_start = self.bytes.pos();
                    let e = match self.bytes.next() {
                        None => return Err(self.error(start, "unterminated string")),
                        Some(e) => e,
                    };
                    match e {
                        b'n' => out.push(b'\n'),
                        b't' => out.push(b'\t'),
                        b'r' => out.push(b'\r'),
                        b'0' => out.push(b'\0'),
                        b'"' => out.push(b'"'),
                        b'\\' => out.push(b'\\'),
                        b'x' => {
                            let mut value = 0u32;
                            let mut digits = 0;
                            while digits < 2 {
                                match self.peek() {
                                    Some(h) if h.is_ascii_hexdigit() => {
                                        self.bytes.next();
                                        value = value * 16 + (h as char).to_digit(16).expect("hex");
                                        digits += 1;
                                    }
                                    _ => break,
                                }
                            }
                            if digits == 0 {
                                return Err(
                                    self.error(esc_start, "\\x escape needs hex digits")
                                );
                            }
                            push_char(&mut out, value as u8 as char);
                        }
                        b'1'..=b'7' => {
                            let mut value = u32::from(e - b'0');
                            let mut digits = 1;
                            while digits < 3 {
                                match self.peek() {
                                    Some(o @ b'0'..=b'7') => {
                                        self.bytes.next();
                                        value = value * 8 + u32::from(o - b'0');
                                        digits += 1;
                                    }
                                    _ => break,
                                }
                            }
                            push_char(&mut out, (value & 0xff) as u8 as char);
                        }
                        _ => {
                            return Err(self.error(
                                esc_start,
                                format!("invalid escape sequence \\{}", e as char),
                            ))
                        }
                    }
                }
                _ => out.push(b),
            }
        }
    }
}

fn strip_utf8_bom(s: &str) -> &str {
    match s.as_bytes().strip_prefix(&[0xef, 0xbb, 0xbf]) {
        Some(stripped) => std::str::from_utf8(stripped).expect("valid input"),
        None => s,
    }
}

/// Tokenize, stopping at the first error.
pub fn lex(source: &str, file_name: &str) -> Result<Vec<Token>> {
    let (tokens, mut errors) = lex_safe(source, file_name);
    match errors.is_empty() {
        true => Ok(tokens),
        false => Err(errors.remove(0)),
    }
}

/// Tokenize the whole input, collecting errors instead of stopping. The
/// returned stream is always terminated by an EOF token.
pub fn lex_safe(source: &str, file_name: &str) -> (Vec<Token>, Vec<LayoutError>) {
    let source = strip_utf8_bom(source);
    let mut lexer = Lexer::new(source, file_name);
    let mut tokens = vec![];
    let mut errors = vec![];
    while let Some(res) = lexer.next_token() {
        match res {
            Ok(t) => tokens.push(t),
            Err(e) => errors.push(e),
        }
    }
    let end = lexer.bytes.pos();
    tokens.push(Token {
        kind: TokenKind::Eof,
        lexeme: String::new(),
        span: Span::new(end, end, lexer.file_name.clone(), lexer.file_content.clone()),
    });
    (tokens, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex(src, "test").unwrap().iter().map(|t| t.kind).collect()
    }

    #[test]
    fn empty_input_is_just_eof() {
        let toks = lex("", "test").unwrap();
        assert_eq!(toks.len(), 1);
        assert_eq!(toks[0].kind, TokenKind::Eof);
    }

    #[test]
    fn positions_are_one_based() {
        let toks = lex("a {\n  b;\n};\n", "test").unwrap();
        for t in &toks {
            assert!(t.line() >= 1);
            assert!(t.column() >= 1);
        }
        let b = toks.iter().find(|t| t.lexeme == "b").unwrap();
        assert_eq!((b.line(), b.column()), (2, 3));
    }

    #[test]
    fn node_header_tokens() {
        use TokenKind::*;
        assert_eq!(
            kinds("hm: homerow_mods {};"),
            vec![Identifier, Colon, Identifier, LBrace, RBrace, Semicolon, Eof]
        );
    }

    #[test]
    fn reference_drops_ampersand() {
        let toks = lex("<&kp A>", "test").unwrap();
        assert_eq!(toks[1].kind, TokenKind::Reference);
        assert_eq!(toks[1].lexeme, "kp");
    }

    #[test]
    fn numbers_decimal_and_hex() {
        let toks = lex("<200 0x1F -3>", "test").unwrap();
        let nums: Vec<i64> = toks
            .iter()
            .filter(|t| t.kind == TokenKind::Number)
            .map(|t| parse_number(&t.lexeme).unwrap())
            .collect();
        assert_eq!(nums, vec![200, 31, -3]);
    }

    #[test]
    fn string_escapes() {
        let toks = lex(r#""a\tb\"c\x41\101""#, "test").unwrap();
        assert_eq!(toks[0].kind, TokenKind::Str);
        assert_eq!(toks[0].lexeme, "a\tb\"cAA");
    }

    #[test]
    fn unterminated_string_is_a_lex_error() {
        let e = lex("\"abc\n", "test").unwrap_err();
        assert_eq!(e.kind, ErrorKind::Lex);
    }

    #[test]
    fn unterminated_block_comment_is_one_error() {
        let (_, errors) = lex_safe("a; /* never closed", "test");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::Lex);
    }

    #[test]
    fn invalid_escape_is_a_lex_error() {
        assert!(lex(r#""bad \q escape""#, "test").is_err());
    }

    #[test]
    fn preprocessor_line_is_captured_verbatim() {
        let toks = lex("#define BASE 0\nx;", "test").unwrap();
        assert_eq!(toks[0].kind, TokenKind::Preprocessor);
        assert_eq!(toks[0].lexeme, "#define BASE 0");
    }

    #[test]
    fn binding_cells_is_an_identifier() {
        let toks = lex("#binding-cells = <2>;", "test").unwrap();
        assert_eq!(toks[0].kind, TokenKind::Identifier);
        assert_eq!(toks[0].lexeme, "#binding-cells");
    }

    #[test]
    fn comments_are_tokens() {
        use TokenKind::*;
        assert_eq!(
            kinds("// line\n/* block */ a;"),
            vec![LineComment, BlockComment, Identifier, Semicolon, Eof]
        );
    }

    #[test]
    fn slash_alone_is_a_token() {
        assert_eq!(kinds("/ { };")[0], TokenKind::Slash);
    }

    #[test]
    fn operator_cells_fold_into_identifiers() {
        let toks = lex("<(MOD_LSFT|MOD_RSFT)>", "test").unwrap();
        assert_eq!(toks[2].kind, TokenKind::Identifier);
        assert_eq!(toks[2].lexeme, "MOD_LSFT|MOD_RSFT");
    }

    #[test]
    fn bom_is_stripped() {
        let toks = lex("\u{feff}a;", "test").unwrap();
        assert_eq!(toks[0].lexeme, "a");
        assert_eq!(toks[0].column(), 1);
    }
}
