//! Closed set of diagnostic descriptors emitted by the engine.
//!
//! Codes are stable so hosts can filter or escalate by identifier.

use diagnostics::{Diagnostic, DiagnosticBuilder, Severity, SourceSpan};

/// One descriptor from the engine's fixed vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    pub code: &'static str,
    pub severity: Severity,
}

impl Descriptor {
    /// Build a diagnostic from this descriptor with a formatted message.
    pub fn create(&self, span: SourceSpan, message: impl Into<String>) -> Diagnostic {
        DiagnosticBuilder::new(self.severity, self.code, message.into(), span).build()
    }
}

pub const UNSUPPORTED_ATTRIBUTE: Descriptor = Descriptor {
    code: "RW0001",
    severity: Severity::Warning,
};

pub const TRANSFORMED_UNSUPPORTED: Descriptor = Descriptor {
    code: "RW0002",
    severity: Severity::Warning,
};

pub const IGNORED_UNSUPPORTED_NAMED_ARGUMENT: Descriptor = Descriptor {
    code: "RW0003",
    severity: Severity::Warning,
};

pub const IGNORED_ALL_ARGUMENTS: Descriptor = Descriptor {
    code: "RW0004",
    severity: Severity::Warning,
};

pub const CONVERTED_ARGUMENT_TO_STRING: Descriptor = Descriptor {
    code: "RW0005",
    severity: Severity::Warning,
};

pub const INCOMPATIBLE_CLASS_INITIALIZE_METHOD: Descriptor = Descriptor {
    code: "RW0006",
    severity: Severity::Warning,
};

pub const INCOMPATIBLE_CLASS_CLEANUP_METHOD: Descriptor = Descriptor {
    code: "RW0007",
    severity: Severity::Warning,
};

pub const INCOMPATIBLE_TEST_INITIALIZE_METHOD: Descriptor = Descriptor {
    code: "RW0008",
    severity: Severity::Warning,
};

pub const INCOMPATIBLE_TEST_CLEANUP_METHOD: Descriptor = Descriptor {
    code: "RW0009",
    severity: Severity::Warning,
};

pub const UNSUPPORTED_ATTRIBUTE_USAGE: Descriptor = Descriptor {
    code: "RW0010",
    severity: Severity::Warning,
};

pub const UNRECOGNIZED_ASSERTION: Descriptor = Descriptor {
    code: "RW0011",
    severity: Severity::Note,
};

pub const UNSUPPORTED_ASSIGNABLE_TYPE_MATCH: Descriptor = Descriptor {
    code: "RW0012",
    severity: Severity::Warning,
};

#[cfg(test)]
mod tests {
    use super::*;
    use diagnostics::{FileId, SourcePosition};

    #[test]
    fn descriptor_builds_diagnostic_with_its_code() {
        let origin = SourcePosition::new(1, 1, 0);
        let span = SourceSpan::new(origin, origin, FileId::new(0));
        let diag = UNSUPPORTED_ATTRIBUTE.create(span, "Unsupported attribute '[Foo]'.");
        assert_eq!(diag.code, "RW0001");
        assert_eq!(diag.severity, Severity::Warning);
    }
}
