//! The error type shared by every stage: lexing, parsing, extraction,
//! validation, mutation and generation. Errors are data; the safe parsing
//! paths collect them in vectors instead of aborting.

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::span::{Span, Spanned};

pub type Result<T> = std::result::Result<T, LayoutError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Lex,
    Parse,
    Extract,
    Validate,
    Generate,
    InvalidBinding,
    LayerNotFound,
    LayerAlreadyExists,
    IndexOutOfRange,
    InvalidIdentifier,
    ProviderFailure,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Lex => "lex error",
            ErrorKind::Parse => "parse error",
            ErrorKind::Extract => "extraction error",
            ErrorKind::Validate => "validation error",
            ErrorKind::Generate => "generation error",
            ErrorKind::InvalidBinding => "invalid binding",
            ErrorKind::LayerNotFound => "layer not found",
            ErrorKind::LayerAlreadyExists => "layer already exists",
            ErrorKind::IndexOutOfRange => "index out of range",
            ErrorKind::InvalidIdentifier => "invalid identifier",
            ErrorKind::ProviderFailure => "provider failure",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug, Diagnostic, Clone)]
#[error("{kind}: {msg}")]
#[diagnostic()]
pub struct LayoutError {
    pub kind: ErrorKind,
    pub msg: String,
    #[label("here")]
    pub err_span: Option<SourceSpan>,
    pub span: Option<Span>,
}

impl LayoutError {
    pub fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            msg: msg.into(),
            err_span: None,
            span: None,
        }
    }

    pub fn at(kind: ErrorKind, span: &Span, msg: impl Into<String>) -> Self {
        Self {
            kind,
            msg: msg.into(),
            err_span: Some(SourceSpan::new(
                span.start().into(),
                (span.end() - span.start()).into(),
            )),
            span: Some(span.clone()),
        }
    }

    pub fn at_spanned<T>(kind: ErrorKind, spanned: &Spanned<T>, msg: impl Into<String>) -> Self {
        Self::at(kind, &spanned.span, msg)
    }

    /// 1-based line of the error, if the error carries a position.
    pub fn line(&self) -> Option<usize> {
        self.span.as_ref().map(|s| s.start.line)
    }

    /// 1-based column of the error, if the error carries a position.
    pub fn column(&self) -> Option<usize> {
        self.span.as_ref().map(|s| s.start.column)
    }

    /// A window of at most 3 source lines centered on the error line, with a
    /// caret marking the error column.
    pub fn context(&self) -> Option<String> {
        let span = self.span.as_ref()?;
        let content = &span.file_content;
        if content.is_empty() {
            return None;
        }
        let err_line = span.start.line;
        let first = err_line.saturating_sub(1).max(1);
        let last = err_line + 1;
        let mut out = String::new();
        for (idx, line) in content.lines().enumerate() {
            let lineno = idx + 1;
            if lineno < first || lineno > last {
                continue;
            }
            out.push_str(&format!("{lineno:>4} | {line}\n"));
            if lineno == err_line {
                let pad = " ".repeat(span.start.column.saturating_sub(1));
                out.push_str(&format!("     | {pad}^\n"));
            }
        }
        if out.is_empty() {
            None
        } else {
            Some(out)
        }
    }

    /// Wrap into a miette report carrying the named source, so that fancy
    /// terminal output shows the offending snippet.
    pub fn into_report(self) -> miette::Error {
        let named = self
            .span
            .as_ref()
            .map(|s| NamedSource::new(s.file_name(), s.file_content()));
        let report: miette::Error = self.into();
        match named {
            Some(src) => report.with_source_code(src),
            None => report,
        }
    }
}

impl From<anyhow::Error> for LayoutError {
    fn from(value: anyhow::Error) -> Self {
        Self::new(ErrorKind::Extract, value.to_string())
    }
}

/// Return early with a span-less error of the given kind.
#[macro_export]
macro_rules! bail {
    ($kind:expr, $fmt:expr $(,)?) => {
        return Err($crate::error::LayoutError::new($kind, format!($fmt)))
    };
    ($kind:expr, $fmt:expr, $($arg:tt)*) => {
        return Err($crate::error::LayoutError::new($kind, format!($fmt, $($arg)*)))
    };
}

/// Return early with an error anchored at a [`crate::span::Span`].
#[macro_export]
macro_rules! bail_at {
    ($kind:expr, $span:expr, $fmt:expr $(,)?) => {
        return Err($crate::error::LayoutError::at($kind, $span, format!($fmt)))
    };
    ($kind:expr, $span:expr, $fmt:expr, $($arg:tt)*) => {
        return Err($crate::error::LayoutError::at($kind, $span, format!($fmt, $($arg)*)))
    };
}

/// Like [`bail_at!`] but produces the `Err` value instead of returning.
#[macro_export]
macro_rules! err_at {
    ($kind:expr, $span:expr, $fmt:expr $(,)?) => {
        Err($crate::error::LayoutError::at($kind, $span, format!($fmt)))
    };
    ($kind:expr, $span:expr, $fmt:expr, $($arg:tt)*) => {
        Err($crate::error::LayoutError::at($kind, $span, format!($fmt, $($arg)*)))
    };
}

/// Construct a span-anchored error value without wrapping it in `Err`.
#[macro_export]
macro_rules! anyhow_at {
    ($kind:expr, $span:expr, $fmt:expr $(,)?) => {
        $crate::error::LayoutError::at($kind, $span, format!($fmt))
    };
    ($kind:expr, $span:expr, $fmt:expr, $($arg:tt)*) => {
        $crate::error::LayoutError::at($kind, $span, format!($fmt, $($arg)*))
    };
}
