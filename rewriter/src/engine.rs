//! Rewrite orchestrator.
//!
//! One pass owns one file. The AST is never mutated; the pass accumulates
//! `Edit` records and splices them over the original text at the end, so
//! untouched regions are byte-identical by construction and a discarded
//! pass leaves nothing behind. Child edits that fall inside a wholesale
//! call replacement are folded into the replacement text before the outer
//! edit is recorded, which keeps nested assertion rewrites safe.

use log::{debug, info, trace};
use thiserror::Error;

use diagnostics::{Diagnostic, Diagnostics, FileId, SourceMap, SourcePosition, SourceSpan};
use parser::cs_ast::{
    Block, Expr, ExprKind, File, LambdaBody, Member, MethodDecl, Span, Stmt,
};

use crate::codegen::{self, Relation};
use crate::diags;
use crate::identity::{SymbolIdentity, SymbolOracle, NUNIT_NAMESPACE};
use crate::matcher::{self, MatchSpec};

/// One text replacement over the original source.
#[derive(Debug, Clone, PartialEq)]
pub struct Edit {
    pub span: Span,
    pub text: String,
}

/// Outcome of one file's rewrite pass.
#[derive(Debug)]
pub struct RewriteResult {
    pub text: String,
    pub diagnostics: Diagnostics,
    pub changed: bool,
}

/// Internal engineering error. The only condition that aborts a file's
/// pass; everything recoverable is a diagnostic instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invariant violated at {line}:{column} while rewriting `{source_text}`: {message}")]
    Invariant {
        message: String,
        source_text: String,
        line: usize,
        column: usize,
    },
}

/// Per-method scratch state, constructed on method entry and consumed by
/// finalization on exit.
pub(crate) struct PerMethodState<'a> {
    pub data_row_seen: bool,
    pub pending_description: Option<Span>,
    pub method: &'a MethodDecl,
    pub class_name: &'a str,
}

impl<'a> PerMethodState<'a> {
    fn new(method: &'a MethodDecl, class_name: &'a str) -> Self {
        PerMethodState {
            data_row_seen: false,
            pending_description: None,
            method,
            class_name,
        }
    }
}

/// Rewrite one parsed file. `rewrite_asserts` gates the assertion-call
/// handling; attribute and using rewrites always run.
pub fn rewrite<O: SymbolOracle>(
    file: &File,
    src: &str,
    oracle: &O,
    source_map: &SourceMap,
    file_id: FileId,
    rewrite_asserts: bool,
) -> Result<RewriteResult, EngineError> {
    let mut pass = Rewriter {
        src,
        oracle,
        source_map,
        file_id,
        rewrite_asserts,
        edits: Vec::new(),
        diagnostics: Diagnostics::new(),
    };
    pass.run(file)
}

pub(crate) struct Rewriter<'a, O: SymbolOracle> {
    pub src: &'a str,
    pub oracle: &'a O,
    source_map: &'a SourceMap,
    file_id: FileId,
    rewrite_asserts: bool,
    edits: Vec<Edit>,
    pub diagnostics: Diagnostics,
}

impl<'a, O: SymbolOracle> Rewriter<'a, O> {
    fn run(mut self, file: &File) -> Result<RewriteResult, EngineError> {
        for using in &file.usings {
            if using.dotted() == NUNIT_NAMESPACE {
                self.push_edit(
                    using.name_span,
                    crate::identity::MSTEST_NAMESPACE.to_string(),
                );
            }
        }

        for class in &file.classes {
            for list in &class.attr_lists {
                for attr in &list.attrs {
                    self.rewrite_attribute(attr, None)?;
                }
            }
            for member in &class.members {
                match member {
                    Member::Method(method) => {
                        let mut state = PerMethodState::new(method, &class.name);
                        for list in &method.attr_lists {
                            for attr in &list.attrs {
                                self.rewrite_attribute(attr, Some(&mut state))?;
                            }
                        }
                        if let Some(body) = &method.body {
                            self.visit_block(body)?;
                        }
                        self.finalize_method(state);
                    }
                    Member::Property(_) | Member::Field(_) => {
                        for list in member.attr_lists() {
                            for attr in &list.attrs {
                                self.rewrite_attribute(attr, None)?;
                            }
                        }
                    }
                    Member::Raw(_) => {}
                }
            }
        }

        let changed = !self.edits.is_empty();
        let text = apply_edits(self.src, &mut self.edits);
        info!(
            "pass complete: {} diagnostic(s), changed={}",
            self.diagnostics.len(),
            changed
        );
        Ok(RewriteResult {
            text,
            diagnostics: self.diagnostics,
            changed,
        })
    }

    // ---- statements ------------------------------------------------------

    fn visit_block(&mut self, block: &Block) -> Result<(), EngineError> {
        for stmt in &block.stmts {
            self.visit_stmt(stmt)?;
        }
        Ok(())
    }

    fn visit_stmt(&mut self, stmt: &Stmt) -> Result<(), EngineError> {
        match stmt {
            Stmt::Expr { expr, .. } => self.visit_expr(expr),
            Stmt::Decl { inits, .. } => {
                for (_, init) in inits {
                    if let Some(expr) = init {
                        self.visit_expr(expr)?;
                    }
                }
                Ok(())
            }
            Stmt::Return { expr, .. } => {
                if let Some(expr) = expr {
                    self.visit_expr(expr)?;
                }
                Ok(())
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                self.visit_expr(cond)?;
                self.visit_stmt(then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.visit_stmt(else_branch)?;
                }
                Ok(())
            }
            Stmt::Loop { body, .. } => self.visit_stmt(body),
            Stmt::Block(block) => self.visit_block(block),
            Stmt::Raw(_) => Ok(()),
        }
    }

    // ---- expressions -----------------------------------------------------

    /// Post-order: children first, so edits inside an argument exist before
    /// the enclosing call decides whether to swallow them.
    fn visit_expr(&mut self, expr: &Expr) -> Result<(), EngineError> {
        match &expr.kind {
            ExprKind::Member { target, .. } => self.visit_expr(target)?,
            ExprKind::Invocation { callee, args, .. } => {
                self.visit_expr(callee)?;
                for arg in args {
                    self.visit_expr(arg)?;
                }
                if self.rewrite_asserts {
                    self.rewrite_invocation(expr, callee, args)?;
                }
            }
            ExprKind::Index { target, index } => {
                self.visit_expr(target)?;
                self.visit_expr(index)?;
            }
            ExprKind::New { args, .. } => {
                for arg in args {
                    self.visit_expr(arg)?;
                }
            }
            ExprKind::Lambda { body, .. } => match body {
                LambdaBody::Expr(expr) => self.visit_expr(expr)?,
                LambdaBody::Block(block) => self.visit_block(block)?,
            },
            ExprKind::Unary { expr, .. } => self.visit_expr(expr)?,
            ExprKind::Binary { left, right, .. } => {
                self.visit_expr(left)?;
                self.visit_expr(right)?;
            }
            ExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => {
                self.visit_expr(cond)?;
                self.visit_expr(then_expr)?;
                self.visit_expr(else_expr)?;
            }
            ExprKind::Paren(inner) => self.visit_expr(inner)?,
            _ => {}
        }
        Ok(())
    }

    /// Handle one invocation that may be an NUnit assertion entry point.
    fn rewrite_invocation(
        &mut self,
        call: &Expr,
        callee: &Expr,
        args: &[Expr],
    ) -> Result<(), EngineError> {
        let ExprKind::Member {
            target,
            name,
            name_span,
            type_args,
        } = &callee.kind
        else {
            return Ok(());
        };

        // Gate on identity: the receiver must resolve to NUnit's Assert.
        let Some(receiver) = self.resolve_receiver(target) else {
            return Ok(());
        };
        if receiver.qualified_name != format!("{}.Assert", NUNIT_NAMESPACE) {
            return Ok(());
        }
        debug!("assert call `{}`", call.span.text(self.src));

        match name.as_str() {
            "That" => self.rewrite_that(call, *name_span, args),
            "Null" => {
                self.push_edit(*name_span, "IsNull".to_string());
                Ok(())
            }
            "NotNull" => {
                self.push_edit(*name_span, "IsNotNull".to_string());
                Ok(())
            }
            "True" => {
                self.push_edit(*name_span, "IsTrue".to_string());
                Ok(())
            }
            "False" => {
                self.push_edit(*name_span, "IsFalse".to_string());
                Ok(())
            }
            "Less" | "LessOrEqual" | "Greater" | "GreaterOrEqual" => {
                match Relation::from_name(name) {
                    Some(relation) => self.rewrite_relational(call, relation, args),
                    None => Ok(()),
                }
            }
            "IsInstanceOf" => self.rewrite_is_instance_of(call, type_args, args),
            _ => Ok(()),
        }
    }

    /// `Assert.That(tested[, constraint[, extras…]])`.
    fn rewrite_that(
        &mut self,
        call: &Expr,
        name_span: Span,
        args: &[Expr],
    ) -> Result<(), EngineError> {
        let Some(tested) = args.first() else {
            return Err(self.invariant(call, "assertion entry call has no tested expression"));
        };

        if args.len() == 1 {
            return self.rewrite_boolean_that(name_span, tested);
        }

        let constraint = &args[1];
        match constraint.chain_root() {
            Some("Throws") if self.resolves_to_nunit(&["Throws"]) => {
                self.rewrite_throws(call, tested, constraint, &args[2..])
            }
            Some("Is") if self.resolves_to_nunit(&["Is"]) => {
                self.rewrite_is_constraint(call, tested, constraint, &args[2..])
            }
            // `Assert.That(cond, "message"…)` keeps its arguments.
            _ => self.rewrite_boolean_that(name_span, tested),
        }
    }

    /// The single-argument truth shorthand; requires oracle confirmation
    /// that the tested expression is boolean, otherwise left untouched.
    fn rewrite_boolean_that(&mut self, name_span: Span, tested: &Expr) -> Result<(), EngineError> {
        if self
            .oracle
            .type_of(tested)
            .is_some_and(|t| t.is_boolean())
        {
            self.push_edit(name_span, "IsTrue".to_string());
        } else {
            trace!(
                "non-boolean tested expression `{}` left untouched",
                tested.span.text(self.src)
            );
        }
        Ok(())
    }

    fn rewrite_throws(
        &mut self,
        call: &Expr,
        tested: &Expr,
        constraint: &Expr,
        extras: &[Expr],
    ) -> Result<(), EngineError> {
        let spec: MatchSpec = matcher::scan_throws_chain(constraint);

        if spec.is_inconclusive() {
            trace!(
                "inconclusive match chain `{}`",
                constraint.span.text(self.src)
            );
            self.report(diags::UNRECOGNIZED_ASSERTION.create(
                self.span_at(call.span),
                format!(
                    "Assertion chain '{}' was not recognized; call left unchanged.",
                    constraint.span.text(self.src)
                ),
            ));
            return Ok(());
        }

        if !spec.exact_type {
            self.report(diags::UNSUPPORTED_ASSIGNABLE_TYPE_MATCH.create(
                self.span_at(call.span),
                format!(
                    "Assignable-type matching in '{}' has no exact MSTest equivalent; call left unchanged.",
                    constraint.span.text(self.src)
                ),
            ));
            return Ok(());
        }

        let tested_text = self.text_with_edits(tested.span);
        let extra_texts: Vec<String> = extras
            .iter()
            .map(|e| self.text_with_edits(e.span))
            .collect();
        let extra_refs: Vec<&str> = extra_texts.iter().map(String::as_str).collect();

        let Some(replacement) =
            codegen::throws_assertion(&spec, &tested_text, &extra_refs, self.src)
        else {
            return Err(self.invariant(call, "conclusive match specification failed generation"));
        };
        self.replace_call(call.span, replacement);
        Ok(())
    }

    /// The `Is.…` 1:1 forms.
    fn rewrite_is_constraint(
        &mut self,
        call: &Expr,
        tested: &Expr,
        constraint: &Expr,
        extras: &[Expr],
    ) -> Result<(), EngineError> {
        // (method name, equality argument span, negated)
        let form = is_constraint_form(constraint);
        let Some((replacement_name, eq_arg, _negated)) = form else {
            trace!(
                "unrecognized Is constraint `{}` left untouched",
                constraint.span.text(self.src)
            );
            return Ok(());
        };

        let tested_text = self.text_with_edits(tested.span);
        let mut out = format!("Assert.{}(", replacement_name);
        if let Some(eq_span) = eq_arg {
            // Equality swaps to (expected, actual).
            out.push_str(&self.text_with_edits(eq_span));
            out.push_str(", ");
        }
        out.push_str(&tested_text);
        for extra in extras {
            out.push_str(", ");
            out.push_str(&self.text_with_edits(extra.span));
        }
        out.push(')');
        self.replace_call(call.span, out);
        Ok(())
    }

    fn rewrite_relational(
        &mut self,
        call: &Expr,
        relation: Relation,
        args: &[Expr],
    ) -> Result<(), EngineError> {
        if args.len() < 2 {
            return Err(self.invariant(call, "relational assertion needs two operands"));
        }
        let a = self.text_with_edits(args[0].span);
        let b = self.text_with_edits(args[1].span);
        let extra_texts: Vec<String> = args[2..]
            .iter()
            .map(|e| self.text_with_edits(e.span))
            .collect();
        let extra_refs: Vec<&str> = extra_texts.iter().map(String::as_str).collect();

        let replacement = codegen::relational_assertion(relation, &a, &b, &extra_refs);
        self.replace_call(call.span, replacement);
        Ok(())
    }

    fn rewrite_is_instance_of(
        &mut self,
        call: &Expr,
        type_args: &[parser::cs_ast::TypeRef],
        args: &[Expr],
    ) -> Result<(), EngineError> {
        let (value, type_expr, extras) = match type_args {
            // Assert.IsInstanceOf<T>(x, …)
            [ty] => {
                let Some(value) = args.first() else {
                    return Err(self.invariant(call, "type-instance assertion has no value"));
                };
                (value, format!("typeof({})", ty.text), &args[1..])
            }
            [] => {
                // Assert.IsInstanceOf(typeof(T), x, …): argument order swaps.
                let [type_of, value, rest @ ..] = args else {
                    return Ok(());
                };
                if !matches!(type_of.kind, ExprKind::Typeof(_)) {
                    return Ok(());
                }
                (value, self.text_with_edits(type_of.span), rest)
            }
            _ => return Ok(()),
        };

        let value_text = self.text_with_edits(value.span);
        let extra_texts: Vec<String> = extras
            .iter()
            .map(|e| self.text_with_edits(e.span))
            .collect();
        let extra_refs: Vec<&str> = extra_texts.iter().map(String::as_str).collect();

        let replacement = codegen::is_instance_of_type(&value_text, &type_expr, &extra_refs);
        self.replace_call(call.span, replacement);
        Ok(())
    }

    // ---- shared plumbing -------------------------------------------------

    /// Resolve the receiver chain of a call (`Assert`, `NUnit.Framework.Assert`).
    fn resolve_receiver(&self, target: &Expr) -> Option<SymbolIdentity> {
        let path = dotted_path(target)?;
        self.oracle.resolve(&path)
    }

    pub(crate) fn resolves_to_nunit(&self, path: &[&str]) -> bool {
        let owned: Vec<String> = path.iter().map(|s| s.to_string()).collect();
        self.oracle
            .resolve(&owned)
            .is_some_and(|identity| identity.is_nunit())
    }

    pub(crate) fn push_edit(&mut self, span: Span, text: String) {
        self.edits.push(Edit { span, text });
    }

    /// Replace a whole call, folding any edits already recorded inside it
    /// into the replacement so nested rewrites are not lost.
    fn replace_call(&mut self, span: Span, text: String) {
        self.edits
            .retain(|e| e.span.start < span.start || e.span.end > span.end);
        self.push_edit(span, text);
    }

    /// Source text of a span with any recorded edits inside it applied.
    pub(crate) fn text_with_edits(&self, span: Span) -> String {
        let mut inner: Vec<&Edit> = self
            .edits
            .iter()
            .filter(|e| e.span.start >= span.start && e.span.end <= span.end)
            .collect();
        inner.sort_by_key(|e| e.span.start);

        let mut out = String::new();
        let mut cursor = span.start;
        for edit in inner {
            out.push_str(&self.src[cursor..edit.span.start]);
            out.push_str(&edit.text);
            cursor = edit.span.end;
        }
        out.push_str(&self.src[cursor..span.end]);
        out
    }

    pub(crate) fn span_at(&self, span: Span) -> SourceSpan {
        self.source_map
            .span_from_offsets(self.file_id, span.start, span.end)
            .unwrap_or_else(|| {
                let origin = SourcePosition::new(1, 1, 0);
                SourceSpan::new(origin, origin, self.file_id)
            })
    }

    pub(crate) fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub(crate) fn invariant(&self, node: &Expr, message: &str) -> EngineError {
        let (line, column) = self
            .source_map
            .offset_to_line_col(self.file_id, node.span.start)
            .unwrap_or((1, 1));
        EngineError::Invariant {
            message: message.to_string(),
            source_text: node.span.text(self.src).to_string(),
            line,
            column,
        }
    }
}

/// Reduce a receiver expression to a dotted identifier path, if it is one.
fn dotted_path(expr: &Expr) -> Option<Vec<String>> {
    match &expr.kind {
        ExprKind::Ident(name) => Some(vec![name.clone()]),
        ExprKind::Member {
            target,
            name,
            type_args,
            ..
        } if type_args.is_empty() => {
            let mut path = dotted_path(target)?;
            path.push(name.clone());
            Some(path)
        }
        _ => None,
    }
}

/// Pick apart an `Is.…` constraint into a 1:1 table entry:
/// the MSTest assert name, an equality argument if any, and negation.
fn is_constraint_form(constraint: &Expr) -> Option<(&'static str, Option<Span>, bool)> {
    match &constraint.kind {
        // Is.True / Is.False / Is.Null, Is.Not.Null
        ExprKind::Member { target, name, .. } => {
            let (root_negated, on_is) = member_root(target);
            if !on_is {
                return None;
            }
            match (name.as_str(), root_negated) {
                ("True", false) => Some(("IsTrue", None, false)),
                ("False", false) => Some(("IsFalse", None, false)),
                ("Null", false) => Some(("IsNull", None, false)),
                ("Null", true) => Some(("IsNotNull", None, true)),
                _ => None,
            }
        }
        // Is.EqualTo(e) / Is.Not.EqualTo(e)
        ExprKind::Invocation { callee, args, .. } => {
            let ExprKind::Member { target, name, .. } = &callee.kind else {
                return None;
            };
            if name != "EqualTo" || args.len() != 1 {
                return None;
            }
            let (negated, on_is) = member_root(target);
            if !on_is {
                return None;
            }
            let assert_name = if negated { "AreNotEqual" } else { "AreEqual" };
            Some((assert_name, Some(args[0].span), negated))
        }
        _ => None,
    }
}

/// Is the expression `Is` or `Is.Not`? Returns (negated, recognized).
fn member_root(expr: &Expr) -> (bool, bool) {
    match &expr.kind {
        ExprKind::Ident(name) if name == "Is" => (false, true),
        ExprKind::Member { target, name, .. } if name == "Not" => {
            if matches!(&target.kind, ExprKind::Ident(root) if root == "Is") {
                (true, true)
            } else {
                (false, false)
            }
        }
        _ => (false, false),
    }
}

/// Splice edits over the original text. Edits must not overlap; the engine
/// folds nested edits away before recording an enclosing replacement.
fn apply_edits(src: &str, edits: &mut Vec<Edit>) -> String {
    edits.sort_by_key(|e| e.span.start);

    let mut out = String::with_capacity(src.len());
    let mut cursor = 0usize;
    for edit in edits.iter() {
        out.push_str(&src[cursor..edit.span.start]);
        out.push_str(&edit.text);
        cursor = edit.span.end;
    }
    out.push_str(&src[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_edits_reproduce_input() {
        let src = "using System;\npublic class T { }\n";
        let mut edits = Vec::new();
        assert_eq!(apply_edits(src, &mut edits), src);
    }

    #[test]
    fn edits_splice_in_order() {
        let src = "aa bb cc";
        let mut edits = vec![
            Edit {
                span: Span::new(6, 8),
                text: "CC".to_string(),
            },
            Edit {
                span: Span::new(0, 2),
                text: "AA".to_string(),
            },
        ];
        assert_eq!(apply_edits(src, &mut edits), "AA bb CC");
    }
}
