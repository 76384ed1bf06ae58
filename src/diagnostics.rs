// ABOUTME: Diagnostic codes and the accumulating sink every phase writes to

use crate::span::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        write!(f, "{s}")
    }
}

/// The numbered taxonomy named in spec §4.E plus the shared scope/parse
/// codes named in §6. Kept as a thiserror enum purely so `Display` gives a
/// stable code string (`NL501`); diagnostics never propagate as `Err`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum DiagnosticCode {
    #[error("NL501")]
    DivisionByZero,
    #[error("NL502")]
    UnknownCharacterName,
    #[error("NL503")]
    UnreadableForm,
    #[error("NL504")]
    UnknownNotation,
    #[error("NL505")]
    InvalidHexCharacter,
    #[error("NL506")]
    InvalidHexEscape,
    #[error("NL507")]
    MultipleRadixFlags,
    #[error("NL508")]
    MultipleExactnessFlags,
    #[error("NL554")]
    UnexpectedDefine,
    #[error("NL556")]
    MalformedDottedList,
    #[error("NL557")]
    Expected,
    #[error("NL558")]
    Unexpected,
    #[error("NL559")]
    SyntaxError,
    #[error("unassigned-variable-used")]
    UnassignedVariableUsed,
    #[error("variable-redefined")]
    VariableRedefined,
    #[error("parameter-redefined")]
    ParameterRedefined,
    #[error("unexpected-eof")]
    UnexpectedEof,
    #[error("unexpected-token")]
    UnexpectedToken,
    #[error("expected-syntax")]
    ExpectedSyntax,
    #[error("unterminated-string-literal")]
    UnterminatedStringLiteral,
    #[error("unterminated-comment")]
    UnterminatedComment,
    #[error("expected-number")]
    ExpectedNumber,
    #[error("expected-hex-digit")]
    ExpectedHexDigit,
    #[error("unknown-escape-character")]
    UnknownEscapeCharacter,
    #[error("unknown-type-name")]
    UnknownTypeName,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    pub message: String,
    pub span: Option<Span>,
}

impl Diagnostic {
    pub fn new(code: DiagnosticCode, severity: Severity, message: impl Into<String>, span: Option<Span>) -> Self {
        Diagnostic {
            code,
            severity,
            message: message.into(),
            span,
        }
    }

    pub fn error(code: DiagnosticCode, message: impl Into<String>, span: Span) -> Self {
        Diagnostic::new(code, Severity::Error, message, Some(span))
    }

    pub fn warning(code: DiagnosticCode, message: impl Into<String>, span: Span) -> Self {
        Diagnostic::new(code, Severity::Warning, message, Some(span))
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.span {
            Some(span) => write!(f, "{} [{}] {}: {}", span, self.code, self.severity, self.message),
            None => write!(f, "[{}] {}: {}", self.code, self.severity, self.message),
        }
    }
}

/// Accumulates diagnostics in source order (§5 ordering guarantee). Phases
/// hold a `&mut DiagnosticSink` rather than returning `Result`, per spec §7.
#[derive(Debug, Default, Clone)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        log::debug!("diagnostic recorded: {diagnostic}");
        self.diagnostics.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Renders the accumulated diagnostics as a JSON array, for tooling
    /// (an LSP, a CI annotator) that wants structured output instead of
    /// the `Display` text.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_errors_ignores_warnings() {
        let mut sink = DiagnosticSink::new();
        sink.push(Diagnostic::new(DiagnosticCode::UnknownNotation, Severity::Warning, "hmm", None));
        assert!(!sink.has_errors());
        sink.push(Diagnostic::new(DiagnosticCode::SyntaxError, Severity::Error, "bad", None));
        assert!(sink.has_errors());
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn display_includes_code_and_severity() {
        let d = Diagnostic::new(DiagnosticCode::DivisionByZero, Severity::Error, "1/0", None);
        let s = format!("{d}");
        assert!(s.contains("NL501"));
        assert!(s.contains("error"));
    }

    #[test]
    fn to_json_renders_an_array_of_diagnostics() {
        let mut sink = DiagnosticSink::new();
        sink.push(Diagnostic::new(DiagnosticCode::UnassignedVariableUsed, Severity::Error, "x used before assignment", None));
        let json = sink.to_json().expect("diagnostics should serialize");
        assert!(json.starts_with('['));
        assert!(json.contains("\"UnassignedVariableUsed\""));
        assert!(json.contains("x used before assignment"));
    }
}
