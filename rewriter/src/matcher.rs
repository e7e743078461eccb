//! Assertion fluent-chain matcher.
//!
//! Scans the constraint argument of `Assert.That(tested, <chain>)` and
//! distills it into a [`MatchSpec`]. The walk runs outside-in: the outermost
//! node of the chain is the trailing qualifier (`.Contains("x")`), and each
//! step descends into the callee's target until the `Throws` root is
//! reached. Anything the vocabulary does not cover makes the spec
//! permanently inconclusive; the matcher never gives partial credit.

use parser::cs_ast::{Expr, ExprKind, Span};

/// Trailing comparison of a match chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOp {
    None,
    Matches,
    EqualTo,
    Contains,
    StartsWith,
    EndsWith,
}

/// What the comparison applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchTarget {
    None,
    Message,
    Property(String),
}

/// Distilled form of one exception-matching chain. Freshly built per
/// candidate call and discarded after one generation attempt.
#[derive(Debug, Clone)]
pub struct MatchSpec {
    pub type_name: Option<String>,
    /// Exact type match (`TypeOf`) as opposed to assignable (`InstanceOf`).
    pub exact_type: bool,
    pub op: MatchOp,
    /// Source span of the comparison's single argument.
    pub op_arg: Option<Span>,
    pub target: MatchTarget,
    inconclusive: bool,
    saw_exception_root: bool,
}

impl MatchSpec {
    fn new() -> Self {
        MatchSpec {
            type_name: None,
            exact_type: true,
            op: MatchOp::None,
            op_arg: None,
            target: MatchTarget::None,
            inconclusive: false,
            saw_exception_root: false,
        }
    }

    /// Monotonic: once set, no later step clears it.
    fn set_inconclusive(&mut self) {
        self.inconclusive = true;
    }

    pub fn is_inconclusive(&self) -> bool {
        self.inconclusive || (self.type_name.is_none() && !self.saw_exception_root)
    }

    /// Final exception type name. Bare `Throws.Exception` chains default to
    /// `Exception` unless a type-selecting call named one.
    pub fn resolved_type_name(&self) -> Option<&str> {
        match &self.type_name {
            Some(name) => Some(name),
            None if self.saw_exception_root => Some("Exception"),
            None => None,
        }
    }
}

/// Scan a `Throws.…` chain into a spec. The caller has already checked that
/// the chain root is `Throws`.
pub fn scan_throws_chain(expr: &Expr) -> MatchSpec {
    let mut spec = MatchSpec::new();
    walk(expr, &mut spec);
    spec
}

fn walk(expr: &Expr, spec: &mut MatchSpec) {
    if spec.inconclusive {
        return;
    }

    match &expr.kind {
        // Chain root.
        ExprKind::Ident(name) if name == "Throws" => {}

        ExprKind::Member {
            target,
            name,
            type_args,
            ..
        } => {
            if !type_args.is_empty() {
                // A generic name is only valid as a called type selector.
                spec.set_inconclusive();
                return;
            }
            bare_member(target, name, spec);
            walk(target, spec);
        }

        ExprKind::Invocation { callee, args, .. } => {
            let ExprKind::Member {
                target,
                name,
                type_args,
                ..
            } = &callee.kind
            else {
                spec.set_inconclusive();
                return;
            };
            called_member(name, type_args, args, spec);
            walk(target, spec);
        }

        _ => spec.set_inconclusive(),
    }
}

/// A member access with no call: connectives, `Message`, the `Exception`
/// root, or the `Throws.XxxException` static helper.
fn bare_member(target: &Expr, name: &str, spec: &mut MatchSpec) {
    match name {
        "With" | "And" => {}
        "Exception" => spec.saw_exception_root = true,
        "Message" => {
            if spec.target == MatchTarget::None {
                spec.target = MatchTarget::Message;
            } else {
                spec.set_inconclusive();
            }
        }
        _ => {
            // `Throws.ArgumentNullException` style helper; the name itself
            // is the exception type, so it must end in `Exception`. That
            // keeps non-type members like `Throws.Nothing` out of the
            // vocabulary. Anything not hanging directly off the root is
            // unrecognized as well.
            let on_root = matches!(&target.kind, ExprKind::Ident(root) if root == "Throws");
            if on_root && name.ends_with("Exception") && spec.type_name.is_none() {
                spec.type_name = Some(name.to_string());
            } else {
                spec.set_inconclusive();
            }
        }
    }
}

fn called_member(
    name: &str,
    type_args: &[parser::cs_ast::TypeRef],
    args: &[Expr],
    spec: &mut MatchSpec,
) {
    match name {
        "TypeOf" | "InstanceOf" => {
            if type_args.len() != 1 || !args.is_empty() || spec.type_name.is_some() {
                spec.set_inconclusive();
                return;
            }
            spec.type_name = Some(type_args[0].text.clone());
            spec.exact_type = name == "TypeOf";
        }
        "Property" => {
            let Some(prop) = args
                .first()
                .filter(|_| args.len() == 1)
                .and_then(property_name)
            else {
                spec.set_inconclusive();
                return;
            };
            if spec.target == MatchTarget::None {
                spec.target = MatchTarget::Property(prop);
            } else {
                spec.set_inconclusive();
            }
        }
        _ => {
            let op = match name {
                "Matches" | "Match" => MatchOp::Matches,
                "EqualTo" => MatchOp::EqualTo,
                "Contains" => MatchOp::Contains,
                "StartsWith" | "StartWith" => MatchOp::StartsWith,
                "EndsWith" | "EndWith" => MatchOp::EndsWith,
                _ => {
                    spec.set_inconclusive();
                    return;
                }
            };
            if args.len() != 1 || spec.op != MatchOp::None {
                spec.set_inconclusive();
                return;
            }
            spec.op = op;
            spec.op_arg = Some(args[0].span);
        }
    }
}

/// Extract a property name from `Property(..)`'s argument. A string literal
/// must itself be a valid identifier; a `nameof(..)` takes the final name
/// segment. Anything else is not statically known.
fn property_name(arg: &Expr) -> Option<String> {
    match &arg.kind {
        ExprKind::Str { value } if is_identifier(value) => Some(value.clone()),
        ExprKind::Invocation { callee, args, .. } => {
            let ExprKind::Ident(name) = &callee.kind else {
                return None;
            };
            if name != "nameof" || args.len() != 1 {
                return None;
            }
            args[0].final_name().map(|s| s.to_string())
        }
        _ => None,
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}
