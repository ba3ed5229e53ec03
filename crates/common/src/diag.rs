//! Diagnostics accumulation for lenient pipeline stages.
//!
//! Lenient modes collect problems instead of failing the run; strict modes
//! consult the sink at stage end and elevate any error-level entries to a
//! single consolidated failure. De-duplication and printing both use the
//! deterministic key `(filePath, start, end, subjectId, level, message)`.

use crate::span::Span;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagLevel {
    Warning,
    Error,
}

impl fmt::Display for DiagLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => f.write_str("warning"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// One accumulated problem, locatable when the stage knows where it is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: DiagLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
    /// Identifier of the thing being diagnosed (a FuncId, a call-graph
    /// node id, ...), when one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: DiagLevel::Error,
            file: None,
            span: None,
            subject: None,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: DiagLevel::Warning,
            file: None,
            span: None,
            subject: None,
            message: message.into(),
        }
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// The deterministic de-duplication and ordering key.
    fn key(&self) -> (String, u32, u32, String, DiagLevel, String) {
        (
            self.file.clone().unwrap_or_default(),
            self.span.map(|s| s.start).unwrap_or(0),
            self.span.map(|s| s.end).unwrap_or(0),
            self.subject.clone().unwrap_or_default(),
            self.level,
            self.message.clone(),
        )
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.level)?;
        if let Some(file) = &self.file {
            write!(f, "{file}")?;
            if let Some(span) = &self.span {
                write!(f, ":{span}")?;
            }
            write!(f, ": ")?;
        }
        if let Some(subject) = &self.subject {
            write!(f, "[{subject}] ")?;
        }
        f.write_str(&self.message)
    }
}

/// Accumulator with deterministic de-duplication and total print order.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    items: Vec<Diagnostic>,
    seen: BTreeSet<(String, u32, u32, String, DiagLevel, String)>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a diagnostic; duplicates (by key) are dropped.
    pub fn push(&mut self, diag: Diagnostic) {
        if self.seen.insert(diag.key()) {
            self.items.push(diag);
        }
    }

    pub fn extend(&mut self, diags: impl IntoIterator<Item = Diagnostic>) {
        for diag in diags {
            self.push(diag);
        }
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|d| d.level == DiagLevel::Error)
    }

    pub fn error_count(&self) -> usize {
        self.items.iter().filter(|d| d.level == DiagLevel::Error).count()
    }

    pub fn warning_count(&self) -> usize {
        self.items.iter().filter(|d| d.level == DiagLevel::Warning).count()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    /// Drain into canonical print order.
    pub fn into_sorted(mut self) -> Vec<Diagnostic> {
        self.items.sort_by_key(|d| d.key());
        self.items
    }
}
