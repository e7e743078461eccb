//! Attribute rewrites, keyed on resolved identities.
//!
//! The mapping switch is closed over `NUnit.Framework.*Attribute` names.
//! The default arm re-spells any other NUnit attribute fully qualified so
//! it keeps its meaning after the using directive changes, and flags it for
//! manual handling. Attributes that do not resolve into NUnit at all are
//! never touched.

use log::trace;

use parser::cs_ast::{Attribute, AttrArg, ExprKind, MethodDecl, Span};

use crate::codegen::escape_for_literal;
use crate::diags;
use crate::engine::{EngineError, PerMethodState, Rewriter};
use crate::identity::{MemberKind, SymbolOracle, MSTEST_NAMESPACE};

const LIFECYCLE_NOTE: &str =
    "Additionally, if you are using async-await in method then return-type must be Task.";

impl<'a, O: SymbolOracle> Rewriter<'a, O> {
    pub(crate) fn rewrite_attribute(
        &mut self,
        attr: &Attribute,
        mut state: Option<&mut PerMethodState<'_>>,
    ) -> Result<(), EngineError> {
        let Some(identity) = self.oracle.resolve_attribute(attr) else {
            return Ok(());
        };
        if !identity.is_nunit() {
            return Ok(());
        }
        trace!(
            "attribute `{}` resolved to {}",
            attr.span.text(self.src),
            identity.qualified_name
        );

        match identity.qualified_name.as_str() {
            "NUnit.Framework.SetUpAttribute" => {
                self.rename_attribute(attr, "TestInitialize");
                self.check_instance_lifecycle(
                    state.as_deref(),
                    attr.span,
                    "TestInitialize",
                    diags::INCOMPATIBLE_TEST_INITIALIZE_METHOD,
                );
            }
            "NUnit.Framework.TearDownAttribute" => {
                self.rename_attribute(attr, "TestCleanup");
                self.check_instance_lifecycle(
                    state.as_deref(),
                    attr.span,
                    "TestCleanup",
                    diags::INCOMPATIBLE_TEST_CLEANUP_METHOD,
                );
            }
            "NUnit.Framework.OneTimeSetUpAttribute" => {
                self.rename_attribute(attr, "ClassInitialize");
                self.check_class_initialize(state.as_deref(), attr.span);
            }
            "NUnit.Framework.OneTimeTearDownAttribute" => {
                self.rename_attribute(attr, "ClassCleanup");
                self.check_class_cleanup(state.as_deref(), attr.span);
            }
            "NUnit.Framework.PropertyAttribute" => {
                self.rename_attribute(attr, "TestProperty");
                self.coerce_args_to_string(attr);
            }
            "NUnit.Framework.TestFixtureAttribute" => {
                self.rename_attribute(attr, "TestClass");
                self.strip_argument_list(attr, &[]);
            }
            "NUnit.Framework.TestCaseAttribute" => {
                self.rename_attribute(attr, "DataRow");
                if let Some(arg) = attr.named_arg("TestName") {
                    if let Some(name_span) = arg.name_span {
                        self.push_edit(name_span, "DisplayName".to_string());
                    }
                }
                if let Some(state) = state.as_deref_mut() {
                    state.data_row_seen = true;
                }
            }
            "NUnit.Framework.TestCaseSourceAttribute" => {
                self.rewrite_test_case_source(attr, state.as_deref())?;
            }
            "NUnit.Framework.TestAttribute" => {
                self.rename_attribute(attr, "TestMethod");
                if let Some(state) = state.as_deref_mut() {
                    state.pending_description =
                        attr.named_arg("Description").map(|arg| arg.expr.span);
                }
                self.strip_argument_list(attr, &["Description"]);
            }
            "NUnit.Framework.CategoryAttribute" => {
                self.rename_attribute(attr, "TestCategory");
            }
            "NUnit.Framework.ExplicitAttribute" => {
                self.rewrite_explicit(attr);
            }
            "NUnit.Framework.IgnoreAttribute" => {
                self.rename_attribute(attr, "Ignore");
                self.drop_named_arg(attr, "Until");
            }
            // MSTest only supports Description on methods.
            "NUnit.Framework.DescriptionAttribute" if state.is_some() => {
                self.rename_attribute(attr, "Description");
            }
            _ => {
                // Re-spell fully qualified: the unqualified name could bind
                // to an unrelated attribute once the using directive changes.
                self.report(diags::UNSUPPORTED_ATTRIBUTE.create(
                    self.span_at(attr.span),
                    format!(
                        "Unsupported attribute '[{}]'. Manual handling required.",
                        attr.span.text(self.src)
                    ),
                ));
                self.push_edit(attr.name_span, identity.qualified_name.clone());
            }
        }
        Ok(())
    }

    /// Rename the attribute unless it is already spelled that way.
    fn rename_attribute(&mut self, attr: &Attribute, new_name: &str) {
        if attr.name_span.text(self.src) != new_name {
            self.push_edit(attr.name_span, new_name.to_string());
        }
    }

    /// Remove the whole argument list. Reports `IgnoredAllArguments` when
    /// any argument other than the exempted named ones is dropped.
    fn strip_argument_list(&mut self, attr: &Attribute, exempt: &[&str]) {
        let Some(list_span) = attr.arg_list_span else {
            return;
        };
        if attr.args.is_empty() {
            return;
        }
        let dropped = attr
            .args
            .iter()
            .filter(|arg| match &arg.name {
                Some(name) => !exempt.contains(&name.as_str()),
                None => true,
            })
            .count();
        if dropped > 0 {
            self.report(diags::IGNORED_ALL_ARGUMENTS.create(
                self.span_at(attr.span),
                format!(
                    "Ignored all attribute arguments on definition '[{}]'.",
                    attr.span.text(self.src)
                ),
            ));
        }
        self.push_edit(list_span, String::new());
    }

    /// Drop one `Name = value` argument together with its separator.
    fn drop_named_arg(&mut self, attr: &Attribute, name: &str) {
        let Some(index) = attr
            .args
            .iter()
            .position(|arg| arg.name.as_deref() == Some(name))
        else {
            return;
        };

        self.report(diags::IGNORED_UNSUPPORTED_NAMED_ARGUMENT.create(
            self.span_at(attr.span),
            format!("Ignored unsupported attribute named argument '{}'.", name),
        ));

        if attr.args.len() == 1 {
            if let Some(list_span) = attr.arg_list_span {
                self.push_edit(list_span, String::new());
            }
            return;
        }
        let span = if index == 0 {
            Span::new(attr.args[0].span.start, attr.args[1].span.start)
        } else {
            Span::new(attr.args[index - 1].span.end, attr.args[index].span.end)
        };
        self.push_edit(span, String::new());
    }

    /// Re-spell every non-string argument value as a string literal.
    fn coerce_args_to_string(&mut self, attr: &Attribute) {
        for arg in &attr.args {
            if matches!(arg.expr.kind, ExprKind::Str { .. }) {
                continue;
            }
            let text = arg.expr.span.text(self.src);
            self.report(diags::CONVERTED_ARGUMENT_TO_STRING.create(
                self.span_at(attr.span),
                format!("Convert attribute argument value '{}' to System.String.", text),
            ));
            self.push_edit(arg.expr.span, format!("\"{}\"", escape_for_literal(text)));
        }
    }

    /// `[Explicit]` has no MSTest counterpart; replaced with a marked Ignore.
    fn rewrite_explicit(&mut self, attr: &Attribute) {
        let mut text = "EXPLICIT".to_string();
        if let Some(arg) = attr.positional_arg(0) {
            text.push_str(": ");
            match &arg.expr.kind {
                ExprKind::Str { value } => text.push_str(value),
                _ => text.push_str(arg.expr.span.text(self.src)),
            }
        }
        let replacement = format!("Ignore(\"{}\")", escape_for_literal(&text));
        self.report(diags::TRANSFORMED_UNSUPPORTED.create(
            self.span_at(attr.span),
            format!(
                "Transformed unsupported '[{}]' to '[{}]'.",
                attr.span.text(self.src),
                replacement
            ),
        ));
        self.push_edit(attr.span, replacement);
    }

    /// `[TestCaseSource]` supports `("Name")`, `(nameof(Name))` and
    /// `(typeof(Type), "Name")`. The source member must be a method or a
    /// property; anything else stays as written.
    fn rewrite_test_case_source(
        &mut self,
        attr: &Attribute,
        state: Option<&PerMethodState<'_>>,
    ) -> Result<(), EngineError> {
        let own_class = state.map(|s| s.class_name).unwrap_or("");

        let parsed = match attr.args.iter().filter(|a| a.name.is_none()).count() {
            1 => source_member_name(attr.positional_arg(0))
                .map(|name| (None::<String>, name)),
            2 => {
                let declared = attr.positional_arg(0).and_then(|arg| match &arg.expr.kind {
                    ExprKind::Typeof(ty) => Some(ty.text.clone()),
                    _ => None,
                });
                match (declared, source_member_name(attr.positional_arg(1))) {
                    (Some(ty), Some(name)) => Some((Some(ty), name)),
                    _ => None,
                }
            }
            _ => None,
        };

        let usage_error = |this: &Self, detail: &str| {
            diags::UNSUPPORTED_ATTRIBUTE_USAGE.create(
                this.span_at(attr.span),
                format!(
                    "The usage of the attribute '[{}]' is not supported. Manual handling required. {}",
                    attr.span.text(this.src),
                    detail
                ),
            )
        };

        let Some((declared_type, member_name)) = parsed else {
            let diagnostic = usage_error(self, "The argument shape was not recognized.");
            self.report(diagnostic);
            return Ok(());
        };

        let lookup_type = declared_type.as_deref().unwrap_or(own_class);
        let kind = self.oracle.lookup_member(lookup_type, &member_name);
        let marker = match kind {
            Some(MemberKind::Method) => None,
            Some(MemberKind::Property) => Some("DynamicDataSourceType.Property"),
            _ => {
                let diagnostic =
                    usage_error(self, "The data source must be a method or a property.");
                self.report(diagnostic);
                return Ok(());
            }
        };

        let mut args = format!("(\"{}\"", escape_for_literal(&member_name));
        // The typeof is only needed when the source lives on another type.
        if let Some(ty) = declared_type.filter(|ty| ty != own_class) {
            args.push_str(&format!(", typeof({})", ty));
        }
        if let Some(marker) = marker {
            args.push_str(", ");
            args.push_str(marker);
        }
        args.push(')');

        self.rename_attribute(attr, "DynamicData");
        if let Some(list_span) = attr.arg_list_span {
            self.push_edit(list_span, args);
        }
        Ok(())
    }

    // ---- lifecycle shape checks ------------------------------------------

    /// TestInitialize/TestCleanup: public instance method, void, no
    /// parameters. One diagnostic per violating attribute.
    fn check_instance_lifecycle(
        &mut self,
        state: Option<&PerMethodState<'_>>,
        attr_span: Span,
        role: &str,
        descriptor: diags::Descriptor,
    ) {
        let Some(method) = state.map(|s| s.method) else {
            return;
        };
        let ok = method.is_public()
            && !method.is_static()
            && method.returns_void()
            && method.params.is_empty();
        if !ok {
            self.report(descriptor.create(
                self.span_at(attr_span),
                format!(
                    "Method '{}' has wrong signature for use as {}. The method must be non-static, public, does not return a value and should not take any parameter. {}",
                    method.name, role, LIFECYCLE_NOTE
                ),
            ));
        }
    }

    /// ClassInitialize: public static void with exactly one parameter whose
    /// type resolves to MSTest's TestContext. NUnit declares a TestContext
    /// of its own, so the parameter type goes through the oracle.
    fn check_class_initialize(&mut self, state: Option<&PerMethodState<'_>>, attr_span: Span) {
        let Some(method) = state.map(|s| s.method) else {
            return;
        };
        let ok = method.is_public()
            && method.is_static()
            && method.returns_void()
            && self.has_single_test_context_param(method);
        if !ok {
            self.report(diags::INCOMPATIBLE_CLASS_INITIALIZE_METHOD.create(
                self.span_at(attr_span),
                format!(
                    "Method '{}' has wrong signature for use as ClassInitialize. The method must be static, public, does not return a value and have a parameter of type TestContext. {}",
                    method.name, LIFECYCLE_NOTE
                ),
            ));
        }
    }

    /// ClassCleanup: public static void, no parameters.
    fn check_class_cleanup(&mut self, state: Option<&PerMethodState<'_>>, attr_span: Span) {
        let Some(method) = state.map(|s| s.method) else {
            return;
        };
        let ok = method.is_public()
            && method.is_static()
            && method.returns_void()
            && method.params.is_empty();
        if !ok {
            self.report(diags::INCOMPATIBLE_CLASS_CLEANUP_METHOD.create(
                self.span_at(attr_span),
                format!(
                    "Method '{}' has wrong signature for use as ClassCleanup. The method must be static, public, does not return a value and have no parameters. {}",
                    method.name, LIFECYCLE_NOTE
                ),
            ));
        }
    }

    fn has_single_test_context_param(&self, method: &MethodDecl) -> bool {
        let [param] = method.params.as_slice() else {
            return false;
        };
        let path: Vec<String> = param.ty.text.split('.').map(str::to_string).collect();
        self.oracle
            .resolve(&path)
            .is_some_and(|identity| {
                identity.qualified_name == format!("{}.TestContext", MSTEST_NAMESPACE)
            })
    }

    // ---- per-method finalization -----------------------------------------

    /// Append the attributes accumulated for this method: `[DataTestMethod]`
    /// once after the last attribute list, and the relocated
    /// `[Description(..)]` from the Test attribute.
    pub(crate) fn finalize_method(&mut self, state: PerMethodState<'_>) {
        if !state.data_row_seen && state.pending_description.is_none() {
            return;
        }
        let Some(last_list) = state.method.attr_lists.last() else {
            return;
        };
        let indent = line_indent(self.src, last_list.span.start);
        let insert_at = Span::new(last_list.span.end, last_list.span.end);

        if state.data_row_seen {
            self.push_edit(insert_at, format!("\n{}[DataTestMethod]", indent));
        }
        if let Some(expr_span) = state.pending_description {
            let expr = self.text_with_edits(expr_span);
            self.push_edit(insert_at, format!("\n{}[Description({})]", indent, expr));
        }
    }
}

/// Name of a data-source member given as a string literal or `nameof(..)`.
fn source_member_name(arg: Option<&AttrArg>) -> Option<String> {
    match &arg?.expr.kind {
        ExprKind::Str { value } if is_identifier(value) => Some(value.clone()),
        ExprKind::Invocation { callee, args, .. } => {
            match &callee.kind {
                ExprKind::Ident(name) if name == "nameof" && args.len() == 1 => {
                    args[0].final_name().map(str::to_string)
                }
                _ => None,
            }
        }
        _ => None,
    }
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Leading whitespace of the line containing `offset`.
fn line_indent(src: &str, offset: usize) -> &str {
    let line_start = src[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let line = &src[line_start..offset];
    if line.chars().all(char::is_whitespace) {
        line
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_check() {
        assert!(is_identifier("Method"));
        assert!(is_identifier("_source2"));
        assert!(!is_identifier("2start"));
        assert!(!is_identifier("a.b"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn indent_of_attribute_line() {
        let src = "class C\n{\n    [Test]\n    void M() {}\n}\n";
        let offset = src.find("[Test]").unwrap();
        assert_eq!(line_indent(src, offset), "    ");
    }

    #[test]
    fn indent_empty_when_attribute_not_first_on_line() {
        let src = "class C { [Test] void M() {} }";
        let offset = src.find("[Test]").unwrap();
        assert_eq!(line_indent(src, offset), "");
    }
}
