//! Span-carrying parser for the C# subset the converter rewrites.
//!
//! The pipeline is a nom-based lexer followed by a recursive-descent parser.
//! Everything outside the modeled grammar is captured as raw spans so the
//! engine can carry it through a rewrite byte for byte.

pub mod cs_ast;
pub mod cs_parser;
pub mod lexer;

pub use cs_ast::{File, Span};
pub use cs_parser::{parse_file, ParseError};

use diagnostics::{Diagnostic, DiagnosticBuilder, SourceMap, SourcePosition, SourceSpan};

/// Lower a parse error into a diagnostic against the file it came from.
pub fn parse_error_to_diagnostic(
    error: &ParseError,
    source_map: &SourceMap,
    file_id: diagnostics::FileId,
) -> Diagnostic {
    let span = source_map
        .span_from_offsets(file_id, error.span.start, error.span.end)
        .unwrap_or_else(|| {
            let origin = SourcePosition::new(1, 1, 0);
            SourceSpan::new(origin, origin, file_id)
        });
    DiagnosticBuilder::error("RW0000", format!("parse error: {}", error.message), span).build()
}
