//! Basic parsing tests for files, usings, classes, and members

use parser::cs_ast::{ExprKind, Member, Stmt};
use parser::parse_file;

#[test]
fn test_empty_file() {
    match parse_file("") {
        Ok(file) => {
            assert!(file.usings.is_empty());
            assert!(file.classes.is_empty());
            assert_eq!(file.span.start, 0);
            assert_eq!(file.span.end, 0);
        }
        Err(e) => panic!("Empty file should parse successfully, got: {}", e),
    }
}

#[test]
fn test_usings_only() {
    let input = "using System;\nusing NUnit.Framework;\n";
    match parse_file(input) {
        Ok(file) => {
            assert_eq!(file.usings.len(), 2);
            assert_eq!(file.usings[0].path, vec!["System"]);
            assert_eq!(file.usings[1].path, vec!["NUnit", "Framework"]);
            assert_eq!(file.usings[1].dotted(), "NUnit.Framework");
            assert_eq!(file.usings[1].name_span.text(input), "NUnit.Framework");
        }
        Err(e) => panic!("Usings-only file should parse, got: {}", e),
    }
}

#[test]
fn test_namespace_block_is_flattened() {
    let input = r#"
using NUnit.Framework;

namespace Some.Test.Project
{
    [TestFixture]
    public class FooTests
    {
    }
}
"#;
    let file = parse_file(input).expect("namespace block should parse");
    assert_eq!(file.usings.len(), 1);
    assert_eq!(file.classes.len(), 1);
    assert_eq!(file.classes[0].name, "FooTests");
    assert_eq!(file.classes[0].attr_lists.len(), 1);
    assert_eq!(file.classes[0].attr_lists[0].attrs[0].short_name(), "TestFixture");
}

#[test]
fn test_file_scoped_namespace() {
    let input = "namespace Some.Tests;\n\npublic class A { }\n";
    let file = parse_file(input).expect("file-scoped namespace should parse");
    assert_eq!(file.classes.len(), 1);
    assert_eq!(file.classes[0].name, "A");
}

#[test]
fn test_method_with_attributes() {
    let input = r#"
public class FooTests
{
    [Test]
    public void DoesThing()
    {
        Helper();
    }
}
"#;
    let file = parse_file(input).expect("should parse");
    let class = &file.classes[0];
    assert_eq!(class.members.len(), 1);

    match &class.members[0] {
        Member::Method(method) => {
            assert_eq!(method.name, "DoesThing");
            assert!(method.is_public());
            assert!(!method.is_static());
            assert!(method.returns_void());
            assert_eq!(method.attr_lists.len(), 1);
            assert_eq!(method.attr_lists[0].attrs[0].short_name(), "Test");
            let body = method.body.as_ref().expect("method has a body");
            assert_eq!(body.stmts.len(), 1);
        }
        other => panic!("expected method, got {:?}", other),
    }
}

#[test]
fn test_attribute_arguments() {
    let input = r#"
public class T
{
    [TestCase(1, 2, TestName = "first case")]
    public void M(int a, int b) { }
}
"#;
    let file = parse_file(input).expect("should parse");
    let Member::Method(method) = &file.classes[0].members[0] else {
        panic!("expected method");
    };

    let attr = &method.attr_lists[0].attrs[0];
    assert_eq!(attr.short_name(), "TestCase");
    assert_eq!(attr.args.len(), 3);
    assert!(attr.positional_arg(0).is_some());
    assert!(attr.positional_arg(2).is_none());

    let named = attr.named_arg("TestName").expect("TestName argument");
    match &named.expr.kind {
        ExprKind::Str { value } => assert_eq!(value, "first case"),
        other => panic!("expected string, got {:?}", other),
    }

    assert_eq!(method.params.len(), 2);
    assert_eq!(method.params[0].ty.text, "int");
    assert_eq!(method.params[1].name, "b");
}

#[test]
fn test_fields_and_properties() {
    let input = r#"
public class T
{
    private int counter = 0;
    public string Name { get; set; }
    public int Doubled => counter * 2;
}
"#;
    let file = parse_file(input).expect("should parse");
    let members = &file.classes[0].members;
    assert_eq!(members.len(), 3);
    assert!(matches!(members[0], Member::Field(_)));
    assert!(matches!(members[1], Member::Property(_)));
    assert!(matches!(members[2], Member::Property(_)));
}

#[test]
fn test_unmodeled_member_becomes_raw() {
    let input = r#"
public class T
{
    public T() { }
    public void M() { }
}
"#;
    let file = parse_file(input).expect("should parse");
    let members = &file.classes[0].members;
    assert_eq!(members.len(), 2);
    assert!(matches!(members[0], Member::Raw(_)));
    assert!(matches!(members[1], Member::Method(_)));
}

#[test]
fn test_statements() {
    let input = r#"
public class T
{
    public void M()
    {
        int x = 1, y = 2;
        if (x < y) { x = y; } else { y = x; }
        for (int i = 0; i < 10; i++) { x += i; }
        return;
    }
}
"#;
    let file = parse_file(input).expect("should parse");
    let Member::Method(method) = &file.classes[0].members[0] else {
        panic!("expected method");
    };
    let stmts = &method.body.as_ref().unwrap().stmts;
    assert_eq!(stmts.len(), 4);

    match &stmts[0] {
        Stmt::Decl { ty, inits, .. } => {
            assert_eq!(ty.text, "int");
            assert_eq!(inits.len(), 2);
            assert_eq!(inits[0].0, "x");
            assert_eq!(inits[1].0, "y");
        }
        other => panic!("expected decl, got {:?}", other),
    }
    assert!(matches!(stmts[1], Stmt::If { .. }));
    assert!(matches!(stmts[2], Stmt::Loop { .. }));
    assert!(matches!(stmts[3], Stmt::Return { .. }));
}

#[test]
fn test_raw_statement_recovery() {
    let input = r#"
public class T
{
    public void M()
    {
        unchecked { overflowy(); }
        Assert.That(true);
    }
}
"#;
    let file = parse_file(input).expect("should parse");
    let Member::Method(method) = &file.classes[0].members[0] else {
        panic!("expected method");
    };
    let stmts = &method.body.as_ref().unwrap().stmts;
    assert!(stmts
        .iter()
        .any(|s| matches!(s, Stmt::Expr { expr, .. }
            if matches!(&expr.kind, ExprKind::Invocation { .. }))));
}

#[test]
fn test_spans_cover_source_text() {
    let input = "public class T { [Test] public void M() { A.B(1); } }";
    let file = parse_file(input).expect("should parse");
    let Member::Method(method) = &file.classes[0].members[0] else {
        panic!("expected method");
    };
    assert_eq!(method.attr_lists[0].span.text(input), "[Test]");
    let stmt = &method.body.as_ref().unwrap().stmts[0];
    assert_eq!(stmt.span().text(input), "A.B(1);");
}
