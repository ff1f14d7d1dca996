//! Compiler diagnostics shared by every stage of the pipeline.
//!
//! Lexing and parsing stop at the first [`Diagnostic`]; the checker collects
//! everything it finds into a [`Diagnostics`] batch.

use crate::span::Span;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Severity {
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DiagKind {
    /// Malformed token.
    LexError,
    /// Grammar violation.
    SyntaxError,
    /// Undeclared or redeclared name.
    NameError,
    /// Incompatible types, bad call, bad switch.
    TypeError,
    /// Array literal length mismatch or statically out-of-bounds index.
    ArraySizeError,
}

impl fmt::Display for DiagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiagKind::LexError => "LexError",
            DiagKind::SyntaxError => "SyntaxError",
            DiagKind::NameError => "NameError",
            DiagKind::TypeError => "TypeError",
            DiagKind::ArraySizeError => "ArraySizeError",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("{severity}[{kind}]: {message}")]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagKind,
    pub span: Span,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagKind, span: Span, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            span,
            message: message.into(),
        }
    }

    pub fn lex(span: Span, message: impl Into<String>) -> Self {
        Self::new(DiagKind::LexError, span, message)
    }

    pub fn syntax(span: Span, message: impl Into<String>) -> Self {
        Self::new(DiagKind::SyntaxError, span, message)
    }

    pub fn name(span: Span, message: impl Into<String>) -> Self {
        Self::new(DiagKind::NameError, span, message)
    }

    pub fn type_(span: Span, message: impl Into<String>) -> Self {
        Self::new(DiagKind::TypeError, span, message)
    }

    pub fn array_size(span: Span, message: impl Into<String>) -> Self {
        Self::new(DiagKind::ArraySizeError, span, message)
    }

    /// Render as `path:line:col: error[Kind]: message`.
    pub fn render(&self, path: &str, src: &str) -> String {
        let (line, col) = line_col(src, self.span.start);
        format!("{}:{}:{}: {}", path, line, col, self)
    }
}

/// An ordered batch of diagnostics for one translation unit.
#[derive(Debug, Clone, Default, PartialEq, Error, Serialize)]
#[error("compilation failed with {} error(s)", .0.len())]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diag: Diagnostic) {
        self.0.push(diag);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.0.iter()
    }

    pub fn has_kind(&self, kind: DiagKind) -> bool {
        self.0.iter().any(|d| d.kind == kind)
    }

    pub fn render(&self, path: &str, src: &str) -> String {
        let mut out = String::new();
        for d in &self.0 {
            out.push_str(&d.render(path, src));
            out.push('\n');
        }
        out
    }
}

impl From<Diagnostic> for Diagnostics {
    fn from(d: Diagnostic) -> Self {
        Diagnostics(vec![d])
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// 1-based line and column of a byte offset. Offsets past the end clamp to
/// the end of the source.
pub fn line_col(src: &str, offset: u32) -> (usize, usize) {
    let offset = (offset as usize).min(src.len());
    let before = &src.as_bytes()[..offset];
    let line = before.iter().filter(|&&b| b == b'\n').count() + 1;
    let line_start = before
        .iter()
        .rposition(|&b| b == b'\n')
        .map(|p| p + 1)
        .unwrap_or(0);
    (line, offset - line_start + 1)
}
