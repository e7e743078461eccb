//! Replacement-text generation.
//!
//! Everything here works over source text slices taken from the original
//! file, so operand spellings survive the rewrite byte for byte. The
//! functions return the full replacement call; splicing it over the old
//! call's span is the engine's job.

use crate::matcher::{MatchOp, MatchSpec, MatchTarget};

/// `Assert.ThrowsException<T>(tested[, extras…])`.
pub fn throws_exception(type_name: &str, tested: &str, extras: &[&str]) -> String {
    let mut out = format!("Assert.ThrowsException<{}>({}", type_name, tested);
    for extra in extras {
        out.push_str(", ");
        out.push_str(extra);
    }
    out.push(')');
    out
}

/// Generate the replacement for a conclusive, exact-type match chain.
/// Assignable-type specs are not generated here; the engine reports those.
pub fn throws_assertion(spec: &MatchSpec, tested: &str, extras: &[&str], src: &str) -> Option<String> {
    let type_name = spec.resolved_type_name()?;
    if !spec.exact_type {
        return None;
    }

    if spec.op == MatchOp::None {
        return Some(throws_exception(type_name, tested, extras));
    }

    let arg = spec.op_arg.map(|span| span.text(src))?;
    let mut left = throws_exception(type_name, tested, extras);
    match &spec.target {
        MatchTarget::None => {}
        MatchTarget::Message => left.push_str(".Message"),
        MatchTarget::Property(name) => {
            left.push('.');
            left.push_str(name);
        }
    }

    Some(match spec.op {
        MatchOp::Contains => format!("StringAssert.Contains({}, {})", left, arg),
        MatchOp::StartsWith => format!("StringAssert.StartsWith({}, {})", left, arg),
        MatchOp::EndsWith => format!("StringAssert.EndsWith({}, {})", left, arg),
        MatchOp::Matches => format!(
            "StringAssert.Matches({}, new System.Text.RegularExpressions.Regex({}))",
            left, arg
        ),
        MatchOp::EqualTo => format!("Assert.AreEqual({}, {})", left, arg),
        MatchOp::None => unreachable!(),
    })
}

/// Relational assertion family. The synthesized message embeds the operands'
/// source text, never their values, so side effects are not duplicated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl Relation {
    pub fn from_name(name: &str) -> Option<Relation> {
        match name {
            "Less" => Some(Relation::Less),
            "LessOrEqual" => Some(Relation::LessOrEqual),
            "Greater" => Some(Relation::Greater),
            "GreaterOrEqual" => Some(Relation::GreaterOrEqual),
            _ => None,
        }
    }

    fn operator(self) -> &'static str {
        match self {
            Relation::Less => "<",
            Relation::LessOrEqual => "<=",
            Relation::Greater => ">",
            Relation::GreaterOrEqual => ">=",
        }
    }

    fn phrase(self) -> &'static str {
        match self {
            Relation::Less => "less than",
            Relation::LessOrEqual => "less than or equal to",
            Relation::Greater => "greater than",
            Relation::GreaterOrEqual => "greater than or equal to",
        }
    }
}

/// `Assert.Less(a, b[, msg, …])` →
/// `Assert.IsTrue(a < b, "Expected <a> to be less than <b>." + msg[, …])`.
pub fn relational_assertion(relation: Relation, a: &str, b: &str, extras: &[&str]) -> String {
    let mut message = format!(
        "\"Expected <{}> to be {} <{}>.\"",
        escape_for_literal(a),
        relation.phrase(),
        escape_for_literal(b)
    );
    if let Some(first) = extras.first() {
        message.push_str(" + ");
        message.push_str(first);
    }

    let mut out = format!(
        "Assert.IsTrue({} {} {}, {}",
        a,
        relation.operator(),
        b,
        message
    );
    for extra in extras.iter().skip(1) {
        out.push_str(", ");
        out.push_str(extra);
    }
    out.push(')');
    out
}

/// `Assert.IsInstanceOfType(x, typeof(T)[, extras…])`.
pub fn is_instance_of_type(value: &str, type_expr: &str, extras: &[&str]) -> String {
    let mut out = format!("Assert.IsInstanceOfType({}, {}", value, type_expr);
    for extra in extras {
        out.push_str(", ");
        out.push_str(extra);
    }
    out.push(')');
    out
}

/// Quote the embedded operand text so it survives inside a string literal.
pub(crate) fn escape_for_literal(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::scan_throws_chain;
    use parser::cs_ast::ExprKind;
    use parser::parse_file;

    fn spec_for(chain: &str) -> (MatchSpec, String) {
        let src = format!(
            "public class T {{ void M() {{ Assert.That(() => Dummy(), {}); }} }}",
            chain
        );
        let file = parse_file(&src).expect("parse");
        let parser::cs_ast::Member::Method(method) = &file.classes[0].members[0] else {
            panic!("expected method");
        };
        let parser::cs_ast::Stmt::Expr { expr, .. } = &method.body.as_ref().unwrap().stmts[0]
        else {
            panic!("expected expression statement");
        };
        let ExprKind::Invocation { args, .. } = &expr.kind else {
            panic!("expected invocation");
        };
        (scan_throws_chain(&args[1]), src)
    }

    #[test]
    fn plain_throws() {
        let (spec, src) = spec_for("Throws.ArgumentNullException");
        let out = throws_assertion(&spec, "() => Dummy()", &[], &src).expect("generated");
        assert_eq!(out, "Assert.ThrowsException<ArgumentNullException>(() => Dummy())");
    }

    #[test]
    fn throws_with_extras() {
        let (spec, src) = spec_for("Throws.ArgumentNullException");
        let out =
            throws_assertion(&spec, "Dummy", &["\"message {0}\"", "1"], &src).expect("generated");
        assert_eq!(
            out,
            "Assert.ThrowsException<ArgumentNullException>(Dummy, \"message {0}\", 1)"
        );
    }

    #[test]
    fn message_contains() {
        let (spec, src) =
            spec_for("Throws.TypeOf<InvalidOperationException>().With.Message.Contains(\"the message\")");
        let out = throws_assertion(&spec, "() => Dummy()", &[], &src).expect("generated");
        assert_eq!(
            out,
            "StringAssert.Contains(Assert.ThrowsException<InvalidOperationException>(() => Dummy()).Message, \"the message\")"
        );
    }

    #[test]
    fn message_matches_wraps_regex() {
        let (spec, src) =
            spec_for("Throws.TypeOf<InvalidOperationException>().With.Message.Match(\"pat\")");
        let out = throws_assertion(&spec, "() => Dummy()", &[], &src).expect("generated");
        assert_eq!(
            out,
            "StringAssert.Matches(Assert.ThrowsException<InvalidOperationException>(() => Dummy()).Message, new System.Text.RegularExpressions.Regex(\"pat\"))"
        );
    }

    #[test]
    fn property_equal_to() {
        let (spec, src) =
            spec_for("Throws.TypeOf<ArgumentException>().With.Property(\"ParamName\").EqualTo(\"arg0\")");
        let out = throws_assertion(&spec, "() => Dummy()", &[], &src).expect("generated");
        assert_eq!(
            out,
            "Assert.AreEqual(Assert.ThrowsException<ArgumentException>(() => Dummy()).ParamName, \"arg0\")"
        );
    }

    #[test]
    fn assignable_type_not_generated() {
        let (spec, src) = spec_for("Throws.InstanceOf<OutOfMemoryException>()");
        assert!(throws_assertion(&spec, "() => Dummy()", &[], &src).is_none());
    }

    #[test]
    fn relational_message_embeds_source_text() {
        let out = relational_assertion(Relation::Less, "A()", "B()", &[]);
        assert_eq!(
            out,
            "Assert.IsTrue(A() < B(), \"Expected <A()> to be less than <B()>.\")"
        );
    }

    #[test]
    fn relational_concatenates_first_extra() {
        let out = relational_assertion(Relation::GreaterOrEqual, "x", "y", &["\"ctx\""]);
        assert_eq!(
            out,
            "Assert.IsTrue(x >= y, \"Expected <x> to be greater than or equal to <y>.\" + \"ctx\")"
        );
    }

    #[test]
    fn instance_of_type_swaps_arguments() {
        let out = is_instance_of_type("value", "typeof(Foo)", &[]);
        assert_eq!(out, "Assert.IsInstanceOfType(value, typeof(Foo))");
    }
}
