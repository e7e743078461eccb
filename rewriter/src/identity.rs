//! Symbol identities and the resolution oracle.
//!
//! Every mapping decision in the engine is keyed on a resolved identity,
//! never on raw source text. A file that spells `[Test]` without a
//! `using NUnit.Framework;` in scope must not be rewritten, and a file that
//! defines its own `TestAttribute` must not be either. The `SymbolOracle`
//! trait is the seam where a host can plug in a real compilation context;
//! `FileOracle` implements it over a single file's directives and
//! declarations, which is what the CLI and the tests use.

use std::collections::HashMap;

use parser::cs_ast::{Attribute, ClassDecl, Expr, ExprKind, File, Member};

pub const NUNIT_NAMESPACE: &str = "NUnit.Framework";
pub const MSTEST_NAMESPACE: &str = "Microsoft.VisualStudio.TestTools.UnitTesting";

/// Fully qualified identity of a resolved symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolIdentity {
    /// Qualified type name, e.g. `NUnit.Framework.TestAttribute`.
    pub qualified_name: String,
}

impl SymbolIdentity {
    pub fn new(qualified_name: impl Into<String>) -> Self {
        SymbolIdentity {
            qualified_name: qualified_name.into(),
        }
    }

    pub fn is_nunit(&self) -> bool {
        self.qualified_name.starts_with("NUnit.")
    }
}

/// Resolved type of an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeIdentity {
    pub qualified_name: String,
}

impl TypeIdentity {
    pub fn boolean() -> Self {
        TypeIdentity {
            qualified_name: "System.Boolean".to_string(),
        }
    }

    pub fn is_boolean(&self) -> bool {
        self.qualified_name == "System.Boolean"
    }
}

/// Kind of a type member, for data-source validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Method,
    Property,
    Field,
}

/// Pure queries against one file's compilation context.
pub trait SymbolOracle {
    /// Resolve a (possibly unqualified) dotted name to an identity.
    fn resolve(&self, path: &[String]) -> Option<SymbolIdentity>;

    /// Resolve an attribute to the identity of its attribute type.
    fn resolve_attribute(&self, attr: &Attribute) -> Option<SymbolIdentity>;

    /// Static type of an expression, as far as the context can tell.
    fn type_of(&self, expr: &Expr) -> Option<TypeIdentity>;

    /// Look up a member on a type declared in this context.
    fn lookup_member(&self, type_name: &str, member: &str) -> Option<MemberKind>;
}

/// NUnit attribute short names, without the `Attribute` suffix. Covers the
/// mapped set plus the rest of the framework's common annotations so the
/// default qualification arm recognizes them.
const NUNIT_ATTRIBUTES: &[&str] = &[
    "SetUp",
    "TearDown",
    "OneTimeSetUp",
    "OneTimeTearDown",
    "Property",
    "TestFixture",
    "TestCase",
    "TestCaseSource",
    "Test",
    "Category",
    "Explicit",
    "Ignore",
    "Description",
    "Author",
    "Timeout",
    "Repeat",
    "Retry",
    "Culture",
    "SetCulture",
    "SetUICulture",
    "MaxTime",
    "Order",
    "Platform",
    "Parallelizable",
    "NonParallelizable",
    "Apartment",
    "Values",
    "Range",
    "Random",
    "Combinatorial",
    "Pairwise",
    "Sequential",
    "TestFixtureSource",
    "TestOf",
    "LevelOfParallelism",
    "DatapointSource",
    "Datapoint",
    "Theory",
];

/// MSTest attribute short names. Needed so a second pass over converted
/// output resolves them to MSTest identities and leaves them alone.
const MSTEST_ATTRIBUTES: &[&str] = &[
    "TestClass",
    "TestMethod",
    "DataTestMethod",
    "DataRow",
    "DynamicData",
    "TestInitialize",
    "TestCleanup",
    "ClassInitialize",
    "ClassCleanup",
    "AssemblyInitialize",
    "AssemblyCleanup",
    "TestProperty",
    "TestCategory",
    "Ignore",
    "Description",
    "Owner",
    "Priority",
    "Timeout",
];

/// Non-attribute framework types resolvable by short name.
const NUNIT_TYPES: &[&str] = &["Assert", "Throws", "Is", "TestContext", "StringAssert"];
const MSTEST_TYPES: &[&str] = &["Assert", "StringAssert", "CollectionAssert", "TestContext"];

#[derive(Debug, Clone)]
struct MemberInfo {
    kind: MemberKind,
    type_text: String,
}

/// Single-file implementation of [`SymbolOracle`].
pub struct FileOracle {
    has_nunit_using: bool,
    has_mstest_using: bool,
    /// class name -> member name -> info
    class_members: HashMap<String, HashMap<String, MemberInfo>>,
}

impl FileOracle {
    pub fn new(file: &File) -> Self {
        let has_nunit_using = file.usings.iter().any(|u| u.dotted() == NUNIT_NAMESPACE);
        let has_mstest_using = file.usings.iter().any(|u| u.dotted() == MSTEST_NAMESPACE);

        let mut class_members = HashMap::new();
        for class in &file.classes {
            class_members.insert(class.name.clone(), Self::member_table(class));
        }

        FileOracle {
            has_nunit_using,
            has_mstest_using,
            class_members,
        }
    }

    fn member_table(class: &ClassDecl) -> HashMap<String, MemberInfo> {
        let mut table = HashMap::new();
        for member in &class.members {
            match member {
                Member::Method(m) => {
                    table.insert(
                        m.name.clone(),
                        MemberInfo {
                            kind: MemberKind::Method,
                            type_text: m.return_type.text.clone(),
                        },
                    );
                }
                Member::Property(p) => {
                    table.insert(
                        p.name.clone(),
                        MemberInfo {
                            kind: MemberKind::Property,
                            type_text: p.ty.text.clone(),
                        },
                    );
                }
                Member::Field(f) => {
                    table.insert(
                        f.name.clone(),
                        MemberInfo {
                            kind: MemberKind::Field,
                            type_text: f.ty.text.clone(),
                        },
                    );
                }
                Member::Raw(_) => {}
            }
        }
        table
    }

    fn resolve_short(&self, name: &str) -> Option<SymbolIdentity> {
        // MSTest first: in a converted file both usings cannot coexist, but
        // if they somehow do, the already-converted reading must win so a
        // second pass stays idempotent.
        if self.has_mstest_using {
            if MSTEST_ATTRIBUTES.contains(&name) || MSTEST_TYPES.contains(&name) {
                return Some(SymbolIdentity::new(format!("{}.{}", MSTEST_NAMESPACE, name)));
            }
        }
        if self.has_nunit_using {
            if NUNIT_ATTRIBUTES.contains(&name) || NUNIT_TYPES.contains(&name) {
                return Some(SymbolIdentity::new(format!("{}.{}", NUNIT_NAMESPACE, name)));
            }
        }
        None
    }

    fn member_type(&self, class: &str, member: &str) -> Option<&str> {
        self.class_members
            .get(class)?
            .get(member)
            .map(|info| info.type_text.as_str())
    }

    fn is_bool_type_text(text: &str) -> bool {
        text == "bool" || text == "Boolean" || text == "System.Boolean"
    }
}

impl SymbolOracle for FileOracle {
    fn resolve(&self, path: &[String]) -> Option<SymbolIdentity> {
        match path {
            [single] => self.resolve_short(single),
            _ => {
                let joined = path.join(".");
                if joined.starts_with("NUnit.") || joined.starts_with(&format!("{}.", MSTEST_NAMESPACE))
                {
                    Some(SymbolIdentity::new(joined))
                } else {
                    None
                }
            }
        }
    }

    fn resolve_attribute(&self, attr: &Attribute) -> Option<SymbolIdentity> {
        let identity = self.resolve(&attr.path)?;
        // Attribute types carry the `Attribute` suffix in their identity
        // even when the annotation spells the short form.
        if identity.qualified_name.ends_with("Attribute") {
            Some(identity)
        } else {
            Some(SymbolIdentity::new(format!("{}Attribute", identity.qualified_name)))
        }
    }

    fn type_of(&self, expr: &Expr) -> Option<TypeIdentity> {
        match &expr.kind {
            ExprKind::Bool(_) => Some(TypeIdentity::boolean()),
            ExprKind::Paren(inner) => self.type_of(inner),
            ExprKind::Unary { op, expr, .. } if op == "!" => {
                self.type_of(expr).filter(|t| t.is_boolean())
            }
            ExprKind::Binary { op, .. } => match op.as_str() {
                "==" | "!=" | "<" | ">" | "<=" | ">=" | "&&" | "||" | "is" => {
                    Some(TypeIdentity::boolean())
                }
                _ => None,
            },
            // Same-file call or member access with a boolean declared type.
            // The receiver is not tracked, so this covers `Func()`, `x.Bar()`
            // and bare member reads against any class declared in the file.
            ExprKind::Invocation { callee, .. } => {
                let name = callee.final_name()?;
                self.class_members
                    .values()
                    .find_map(|table| table.get(name))
                    .filter(|info| Self::is_bool_type_text(&info.type_text))
                    .map(|_| TypeIdentity::boolean())
            }
            ExprKind::Ident(name) => self
                .class_members
                .values()
                .find_map(|table| table.get(name.as_str()))
                .filter(|info| Self::is_bool_type_text(&info.type_text))
                .map(|_| TypeIdentity::boolean()),
            _ => None,
        }
    }

    fn lookup_member(&self, type_name: &str, member: &str) -> Option<MemberKind> {
        self.class_members
            .get(type_name)?
            .get(member)
            .map(|info| info.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parser::parse_file;

    fn oracle_for(src: &str) -> (File, bool) {
        let file = parse_file(src).expect("parse");
        let nunit = FileOracle::new(&file).has_nunit_using;
        (file, nunit)
    }

    #[test]
    fn resolves_nunit_attribute_under_using() {
        let src = "using NUnit.Framework;\npublic class T { [Test] public void M() { } }";
        let file = parse_file(src).expect("parse");
        let oracle = FileOracle::new(&file);

        let attr = &file.classes[0].members[0].attr_lists()[0].attrs[0];
        let identity = oracle.resolve_attribute(attr).expect("resolves");
        assert_eq!(identity.qualified_name, "NUnit.Framework.TestAttribute");
        assert!(identity.is_nunit());
    }

    #[test]
    fn unresolved_without_using() {
        let src = "public class T { [Test] public void M() { } }";
        let file = parse_file(src).expect("parse");
        let oracle = FileOracle::new(&file);

        let attr = &file.classes[0].members[0].attr_lists()[0].attrs[0];
        assert!(oracle.resolve_attribute(attr).is_none());
    }

    #[test]
    fn mstest_using_wins_for_second_pass() {
        let src = "using Microsoft.VisualStudio.TestTools.UnitTesting;\n\
                   public class T { [TestMethod] public void M() { } }";
        let file = parse_file(src).expect("parse");
        let oracle = FileOracle::new(&file);

        let attr = &file.classes[0].members[0].attr_lists()[0].attrs[0];
        let identity = oracle.resolve_attribute(attr).expect("resolves");
        assert!(!identity.is_nunit());
    }

    #[test]
    fn test_context_resolves_to_nunit_under_nunit_using() {
        let src = "using NUnit.Framework;\npublic class T { }";
        let file = parse_file(src).expect("parse");
        let oracle = FileOracle::new(&file);

        let identity = oracle.resolve(&["TestContext".to_string()]).expect("resolves");
        assert_eq!(identity.qualified_name, "NUnit.Framework.TestContext");
    }

    #[test]
    fn boolean_typing() {
        let src = r#"
using NUnit.Framework;
public class T
{
    bool Func() { return true; }
    int Count() { return 0; }
    void M()
    {
        Assert.That(Func());
        Assert.That(Count());
        Assert.That(1 < 2);
    }
}
"#;
        let (file, _) = oracle_for(src);
        let oracle = FileOracle::new(&file);

        let Member::Method(method) = &file.classes[0].members[2] else {
            panic!("expected method");
        };
        let exprs: Vec<&Expr> = method
            .body
            .as_ref()
            .unwrap()
            .stmts
            .iter()
            .filter_map(|s| match s {
                parser::cs_ast::Stmt::Expr { expr, .. } => Some(expr),
                _ => None,
            })
            .collect();

        let first_arg = |e: &'static str, expr: &Expr| -> Expr {
            match &expr.kind {
                ExprKind::Invocation { args, .. } => args[0].clone(),
                _ => panic!("{} not an invocation", e),
            }
        };

        assert!(oracle
            .type_of(&first_arg("a", exprs[0]))
            .is_some_and(|t| t.is_boolean()));
        assert!(oracle.type_of(&first_arg("b", exprs[1])).is_none());
        assert!(oracle
            .type_of(&first_arg("c", exprs[2]))
            .is_some_and(|t| t.is_boolean()));
    }

    #[test]
    fn member_lookup() {
        let src = r#"
public class FooTests
{
    IEnumerable<object[]> Method() { return null; }
    IEnumerable<object[]> Property => null;
    IEnumerable<object[]> Field = null;
}
"#;
        let file = parse_file(src).expect("parse");
        let oracle = FileOracle::new(&file);

        assert_eq!(oracle.lookup_member("FooTests", "Method"), Some(MemberKind::Method));
        assert_eq!(
            oracle.lookup_member("FooTests", "Property"),
            Some(MemberKind::Property)
        );
        assert_eq!(oracle.lookup_member("FooTests", "Field"), Some(MemberKind::Field));
        assert_eq!(oracle.lookup_member("FooTests", "Missing"), None);
        assert_eq!(oracle.lookup_member("Nope", "Method"), None);
    }
}
