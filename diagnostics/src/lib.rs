//! Diagnostics for the nu2ms converter
//!
//! A rewrite pass never fails because of something it merely could not
//! convert; it records a coded diagnostic and moves on. This crate holds the
//! diagnostic record type, the append-only sink a pass collects into, and a
//! plain-text formatter for console output.

use std::fmt;

pub use source_map::{FileId, SourceFile, SourceMap, SourcePosition, SourceSpan};

/// Severity of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Note => write!(f, "note"),
        }
    }
}

/// One diagnostic record with a stable code, message, and location
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub message: String,
    pub span: SourceSpan,
    pub notes: Vec<String>,
}

/// Append-only collection of diagnostics for one rewrite pass
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    records: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.records.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.records.extend(other.records);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.records.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.records
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    /// Count of diagnostics carrying the given code
    pub fn count_code(&self, code: &str) -> usize {
        self.records.iter().filter(|d| d.code == code).count()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Builder for one diagnostic
pub struct DiagnosticBuilder {
    severity: Severity,
    code: String,
    message: String,
    span: SourceSpan,
    notes: Vec<String>,
}

impl DiagnosticBuilder {
    pub fn new(
        severity: Severity,
        code: impl Into<String>,
        message: impl Into<String>,
        span: SourceSpan,
    ) -> Self {
        Self {
            severity,
            code: code.into(),
            message: message.into(),
            span,
            notes: vec![],
        }
    }

    pub fn warning(code: impl Into<String>, message: impl Into<String>, span: SourceSpan) -> Self {
        Self::new(Severity::Warning, code, message, span)
    }

    pub fn note(code: impl Into<String>, message: impl Into<String>, span: SourceSpan) -> Self {
        Self::new(Severity::Note, code, message, span)
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>, span: SourceSpan) -> Self {
        Self::new(Severity::Error, code, message, span)
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn build(self) -> Diagnostic {
        Diagnostic {
            severity: self.severity,
            code: self.code,
            message: self.message,
            span: self.span,
            notes: self.notes,
        }
    }
}

/// Plain-text formatter for console output
#[derive(Debug, Clone, Copy, Default)]
pub struct DiagnosticFormatter;

impl DiagnosticFormatter {
    pub fn new() -> Self {
        Self
    }

    pub fn format_all(&self, diagnostics: &Diagnostics, source_map: &SourceMap) -> String {
        let mut output = String::new();

        for diagnostic in diagnostics {
            output.push_str(&self.format(diagnostic, source_map));
        }

        output
    }

    pub fn format(&self, diagnostic: &Diagnostic, source_map: &SourceMap) -> String {
        let mut output = format!(
            "{}[{}]: {}\n",
            diagnostic.severity, diagnostic.code, diagnostic.message
        );

        if let Some(file) = source_map.get_file(diagnostic.span.file_id) {
            output.push_str(&format!(
                "  --> {}:{}:{}\n",
                file.name, diagnostic.span.start.line, diagnostic.span.start.column
            ));

            let line_num = diagnostic.span.start.line;
            if let Some(line) = file.get_line(line_num) {
                output.push_str(&format!("{} | {}\n", line_num, line));
            }
        }

        for note in &diagnostic.notes {
            output.push_str(&format!("  note: {}\n", note));
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span() -> SourceSpan {
        SourceSpan::new(
            SourcePosition::new(1, 5, 4),
            SourcePosition::new(1, 9, 8),
            FileId::new(0),
        )
    }

    #[test]
    fn builder_carries_code_and_notes() {
        let diagnostic = DiagnosticBuilder::warning("RW0001", "something odd", span())
            .with_note("was: [Foo]")
            .build();

        assert_eq!(diagnostic.severity, Severity::Warning);
        assert_eq!(diagnostic.code, "RW0001");
        assert_eq!(diagnostic.notes, vec!["was: [Foo]".to_string()]);
    }

    #[test]
    fn sink_is_append_only_and_countable() {
        let mut sink = Diagnostics::new();
        sink.push(DiagnosticBuilder::warning("RW0001", "a", span()).build());
        sink.push(DiagnosticBuilder::note("RW0002", "b", span()).build());
        sink.push(DiagnosticBuilder::warning("RW0001", "c", span()).build());

        assert_eq!(sink.len(), 3);
        assert_eq!(sink.count_code("RW0001"), 2);
        assert_eq!(sink.warnings().count(), 2);
        assert!(!sink.has_errors());
    }

    #[test]
    fn formatter_includes_location() {
        let mut map = SourceMap::new();
        let id = map.add_file("Foo.cs".to_string(), "    [Bar]\n".to_string());
        let span = map.span_from_offsets(id, 4, 9).unwrap();

        let diagnostic = DiagnosticBuilder::warning("RW0001", "unsupported", span).build();
        let text = DiagnosticFormatter::new().format(&diagnostic, &map);

        assert!(text.contains("warning[RW0001]: unsupported"));
        assert!(text.contains("Foo.cs:1:5"));
        assert!(text.contains("[Bar]"));
    }
}
