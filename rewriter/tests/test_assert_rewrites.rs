//! End-to-end assertion conversion, gated behind the asserts flag.

use diagnostics::SourceMap;
use parser::parse_file;
use pretty_assertions::assert_eq;
use rewriter::{rewrite, FileOracle, RewriteResult};

fn convert(src: &str, rewrite_asserts: bool) -> RewriteResult {
    rewriter::logging::init_test();
    let file = parse_file(src).expect("parse failed");
    let oracle = FileOracle::new(&file);
    let mut map = SourceMap::new();
    let id = map.add_file("Test.cs".to_string(), src.to_string());
    rewrite(&file, src, &oracle, &map, id, rewrite_asserts).expect("rewrite failed")
}

fn body(stmts: &str) -> String {
    format!(
        r#"using NUnit.Framework;
public class FooTests
{{
    void Dummy() {{}}

    public void M()
    {{
{}
    }}
}}
"#,
        stmts
    )
}

#[test]
fn test_throws_static_helper() {
    let src = body("        Assert.That(() => Dummy(), Throws.ArgumentNullException);");
    let result = convert(&src, true);
    assert!(result
        .text
        .contains("Assert.ThrowsException<ArgumentNullException>(() => Dummy());"));
    assert_eq!(result.diagnostics.len(), 0);
}

#[test]
fn test_throws_type_of() {
    let src = body("        Assert.That(() => Dummy(), Throws.TypeOf<InvalidOperationException>());");
    let result = convert(&src, true);
    assert!(result
        .text
        .contains("Assert.ThrowsException<InvalidOperationException>(() => Dummy());"));
    assert_eq!(result.diagnostics.len(), 0);
}

#[test]
fn test_throws_instance_of_left_alone() {
    let stmt = "        Assert.That(() => Dummy(), Throws.InstanceOf<ArgumentException>());";
    let src = body(stmt);
    let result = convert(&src, true);
    assert!(result.text.contains(stmt.trim_start()));
    assert_eq!(result.diagnostics.count_code("RW0012"), 1);
}

#[test]
fn test_throws_message_contains() {
    let src = body(
        r#"        Assert.That(() => Dummy(), Throws.ArgumentException.With.Message.Contains("name"));"#,
    );
    let result = convert(&src, true);
    assert!(result.text.contains(
        r#"StringAssert.Contains(Assert.ThrowsException<ArgumentException>(() => Dummy()).Message, "name");"#
    ));
    assert_eq!(result.diagnostics.len(), 0);
}

#[test]
fn test_throws_property_equal_to() {
    let src = body(
        r#"        Assert.That(() => Dummy(), Throws.ArgumentNullException.With.Property("ParamName").EqualTo("value"));"#,
    );
    let result = convert(&src, true);
    assert!(result.text.contains(
        r#"Assert.AreEqual(Assert.ThrowsException<ArgumentNullException>(() => Dummy()).ParamName, "value");"#
    ));
    assert_eq!(result.diagnostics.len(), 0);
}

#[test]
fn test_bare_throws_exception_defaults_type() {
    let src = body("        Assert.That(() => Dummy(), Throws.Exception);");
    let result = convert(&src, true);
    assert!(result
        .text
        .contains("Assert.ThrowsException<Exception>(() => Dummy());"));
}

#[test]
fn test_throws_nothing_is_reported_and_kept() {
    // Asserts the absence of an exception; there is no ThrowsException form
    // for that, and treating `Nothing` as a type would invert the assertion.
    let stmt = "        Assert.That(() => Dummy(), Throws.Nothing);";
    let src = body(stmt);
    let result = convert(&src, true);
    assert!(result.text.contains(stmt.trim_start()));
    assert_eq!(result.diagnostics.count_code("RW0011"), 1);
}

#[test]
fn test_unrecognized_chain_is_reported_and_kept() {
    let stmt = "        Assert.That(() => Dummy(), Throws.ArgumentException.Or.InvalidOperationException);";
    let src = body(stmt);
    let result = convert(&src, true);
    assert!(result.text.contains(stmt.trim_start()));
    assert_eq!(result.diagnostics.count_code("RW0011"), 1);
}

#[test]
fn test_boolean_that_needs_oracle_confirmation() {
    let src = r#"using NUnit.Framework;
public class FooTests
{
    bool Ready() { return true; }
    int Count() { return 0; }

    public void M()
    {
        Assert.That(Ready());
        Assert.That(Count());
        Assert.That(1 < 2);
    }
}
"#;
    let result = convert(src, true);
    assert!(result.text.contains("Assert.IsTrue(Ready());"));
    assert!(result.text.contains("Assert.That(Count());"));
    assert!(result.text.contains("Assert.IsTrue(1 < 2);"));
    assert_eq!(result.diagnostics.len(), 0);
}

#[test]
fn test_boolean_that_keeps_extra_arguments() {
    let src = r#"using NUnit.Framework;
public class FooTests
{
    bool m_ready;

    public void M()
    {
        Assert.That(m_ready, "should be set");
    }
}
"#;
    let result = convert(src, true);
    assert!(result.text.contains(r#"Assert.IsTrue(m_ready, "should be set");"#));
}

#[test]
fn test_is_constraints() {
    let src = r#"using NUnit.Framework;
public class FooTests
{
    string name;
    int total;

    public void M()
    {
        Assert.That(name, Is.Null);
        Assert.That(name, Is.Not.Null);
        Assert.That(total, Is.EqualTo(42));
        Assert.That(total, Is.Not.EqualTo(0), "nonzero");
    }
}
"#;
    let result = convert(src, true);
    assert!(result.text.contains("Assert.IsNull(name);"));
    assert!(result.text.contains("Assert.IsNotNull(name);"));
    assert!(result.text.contains("Assert.AreEqual(42, total);"));
    assert!(result.text.contains(r#"Assert.AreNotEqual(0, total, "nonzero");"#));
    assert_eq!(result.diagnostics.len(), 0);
}

#[test]
fn test_direct_renames() {
    let src = r#"using NUnit.Framework;
public class FooTests
{
    string name;
    bool flag;

    public void M()
    {
        Assert.Null(name);
        Assert.NotNull(name);
        Assert.True(flag);
        Assert.False(flag);
    }
}
"#;
    let result = convert(src, true);
    assert!(result.text.contains("Assert.IsNull(name);"));
    assert!(result.text.contains("Assert.IsNotNull(name);"));
    assert!(result.text.contains("Assert.IsTrue(flag);"));
    assert!(result.text.contains("Assert.IsFalse(flag);"));
}

#[test]
fn test_relational_assertions() {
    let src = r#"using NUnit.Framework;
public class FooTests
{
    int total;
    int limit;

    public void M()
    {
        Assert.Less(total, limit);
        Assert.GreaterOrEqual(total, limit, "msg");
    }
}
"#;
    let result = convert(src, true);
    assert!(result.text.contains(
        r#"Assert.IsTrue(total < limit, "Expected <total> to be less than <limit>.");"#
    ));
    assert!(result.text.contains(
        r#"Assert.IsTrue(total >= limit, "Expected <total> to be greater than or equal to <limit>." + "msg");"#
    ));
}

#[test]
fn test_is_instance_of_rewrites() {
    let src = r#"using NUnit.Framework;
public class FooTests
{
    object error;

    public void M()
    {
        Assert.IsInstanceOf<ArgumentException>(error);
        Assert.IsInstanceOf(typeof(ArgumentException), error);
    }
}
"#;
    let result = convert(src, true);
    let expected = "Assert.IsInstanceOfType(error, typeof(ArgumentException));";
    assert_eq!(result.text.matches(expected).count(), 2);
}

#[test]
fn test_nested_assert_survives_outer_replacement() {
    let src = body(
        "        Assert.That(() => { Assert.Null(Dummy()); }, Throws.Exception);",
    );
    let result = convert(&src, true);
    assert!(result.text.contains(
        "Assert.ThrowsException<Exception>(() => { Assert.IsNull(Dummy()); });"
    ));
}

#[test]
fn test_asserts_untouched_when_flag_off() {
    let stmt = "        Assert.That(() => Dummy(), Throws.ArgumentNullException);";
    let src = body(stmt);
    let result = convert(&src, false);
    assert!(result.text.contains(stmt.trim_start()));
    // The using directive is still rewritten.
    assert!(result
        .text
        .starts_with("using Microsoft.VisualStudio.TestTools.UnitTesting;"));
    assert_eq!(result.diagnostics.len(), 0);
}

#[test]
fn test_second_pass_leaves_converted_asserts_alone() {
    let src = body("        Assert.That(() => Dummy(), Throws.ArgumentNullException);");
    let first = convert(&src, true);
    let second = convert(&first.text, true);
    assert_eq!(second.text, first.text);
    assert!(!second.changed);
    assert_eq!(second.diagnostics.len(), 0);
}
