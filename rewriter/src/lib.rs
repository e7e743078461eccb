//! NUnit to MSTest V2 rewrite engine
//!
//! Decides, per NUnit construct, whether an equivalent MSTest construct
//! exists and rewrites the source accordingly. Every decision is keyed on a
//! resolved symbol identity rather than on spelling, and anything without a
//! faithful equivalent is left untouched and reported through a coded
//! diagnostic. An incorrect silent transformation is the one outcome the
//! engine is built to rule out.
//!
//! The entry point is [`rewrite`], which takes a parsed file, its source
//! text, and a [`SymbolOracle`] and produces a [`RewriteResult`].

pub mod codegen;
pub mod diags;
mod attributes;
mod engine;
pub mod identity;
pub mod logging;
pub mod matcher;

pub use engine::{rewrite, Edit, EngineError, RewriteResult};
pub use identity::{
    FileOracle, MemberKind, SymbolIdentity, SymbolOracle, TypeIdentity, MSTEST_NAMESPACE,
    NUNIT_NAMESPACE,
};
pub use matcher::{MatchOp, MatchSpec, MatchTarget};
