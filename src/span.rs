//! Source positions and spans attached to tokens, AST elements and errors.

use std::ops::Index;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    /// The position since the beginning of the source, in bytes.
    pub absolute: usize,
    /// 1-based line number.
    pub line: usize,
    /// 1-based column, counted in bytes from the beginning of the line.
    pub column: usize,
}

impl Default for Position {
    fn default() -> Self {
        Self {
            absolute: 0,
            line: 1,
            column: 1,
        }
    }
}

impl Position {
    pub fn new(absolute: usize, line: usize, column: usize) -> Self {
        assert!(line >= 1);
        assert!(column >= 1);
        Self {
            absolute,
            line,
            column,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: Position,
    pub end: Position,
    pub file_name: Arc<str>,
    pub file_content: Arc<str>,
}

impl Default for Span {
    fn default() -> Self {
        Self {
            start: Position::default(),
            end: Position::default(),
            file_name: Arc::from(""),
            file_content: Arc::from(""),
        }
    }
}

impl Span {
    pub fn new(start: Position, end: Position, file_name: Arc<str>, file_content: Arc<str>) -> Span {
        assert!(start.absolute <= end.absolute);
        assert!(start.line <= end.line);
        Span {
            start,
            end,
            file_name,
            file_content,
        }
    }

    /// The smallest span containing both `self` and `other`.
    pub fn cover(&self, other: &Span) -> Span {
        assert!(self.file_name == other.file_name);

        let start = if self.start() <= other.start() {
            self.start
        } else {
            other.start
        };
        let end = if self.end() >= other.end() {
            self.end
        } else {
            other.end
        };

        Span::new(
            start,
            end,
            self.file_name.clone(),
            self.file_content.clone(),
        )
    }

    pub fn start(&self) -> usize {
        self.start.absolute
    }

    pub fn end(&self) -> usize {
        self.end.absolute
    }

    pub fn file_name(&self) -> String {
        self.file_name.clone().to_string()
    }

    pub fn file_content(&self) -> String {
        self.file_content.clone().to_string()
    }
}

impl Index<Span> for str {
    type Output = str;
    fn index(&self, span: Span) -> &Self::Output {
        &self[span.start()..span.end()]
    }
}

impl Index<Span> for String {
    type Output = str;
    fn index(&self, span: Span) -> &Self::Output {
        &self[span.start()..span.end()]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Spanned<T> {
    pub t: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(t: T, span: Span) -> Spanned<T> {
        Spanned { t, span }
    }
}
