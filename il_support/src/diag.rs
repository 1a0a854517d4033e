//! Diagnostics: severity, short error codes, and collecting sinks.

use std::fmt;

use crate::source_map::{SourceLoc, SourceManager};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Note,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Note => write!(f, "note"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A single diagnostic: severity, message, location, and the span length
/// (in columns) the message applies to.
#[derive(Debug, Clone, thiserror::Error)]
#[error(
    "{severity}{code_str}: {message} ({loc})",
    code_str = self.code.map(|c| format!("[{c}]")).unwrap_or_default()
)]
pub struct Diag {
    pub severity: Severity,
    pub code: Option<&'static str>,
    pub message: String,
    pub loc: SourceLoc,
    pub span_len: u32,
}

impl Diag {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code: None,
            message: message.into(),
            loc: SourceLoc::UNKNOWN,
            span_len: 1,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code: None,
            message: message.into(),
            loc: SourceLoc::UNKNOWN,
            span_len: 1,
        }
    }

    pub fn note(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Note,
            code: None,
            message: message.into(),
            loc: SourceLoc::UNKNOWN,
            span_len: 1,
        }
    }

    pub fn with_loc(mut self, loc: SourceLoc) -> Self {
        self.loc = loc;
        self
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_span(mut self, span_len: u32) -> Self {
        self.span_len = span_len.max(1);
        self
    }

    /// Renders `severity[code]: message` followed by the caret-annotated
    /// snippet, if the source manager has the referenced file registered.
    pub fn render(&self, sources: &SourceManager) -> String {
        let mut out = self.to_string();
        if let Some(snippet) = sources.render_snippet(self.loc) {
            out.push('\n');
            out.push_str(&snippet);
        }
        out
    }
}

/// Accumulates diagnostics for passes that continue past local errors.
#[derive(Debug, Default)]
pub struct DiagSink {
    diags: Vec<Diag>,
}

impl DiagSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diag: Diag) {
        self.diags.push(diag);
    }

    pub fn has_errors(&self) -> bool {
        self.diags.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn diags(&self) -> &[Diag] {
        &self.diags
    }

    pub fn into_diags(self) -> Vec<Diag> {
        self.diags
    }

    pub fn is_empty(&self) -> bool {
        self.diags.is_empty()
    }

    pub fn extend(&mut self, other: DiagSink) {
        self.diags.extend(other.diags);
    }
}
