//! The query language subset understood by the store.
//!
//! Statements are tokenized by [`lexer`], parsed into the [`ast`] and then
//! executed by [`crate::store::Store`], which calls into [`eval`] for every
//! filter and value expression.

pub mod ast;
pub mod eval;
pub mod lexer;
pub mod parser;

pub use ast::{BinaryOp, ConflictPolicy, Evict, Expr, Function, Insert, OrderBy, Path, Select, Statement, Update};
pub use eval::{compare_values, evaluate, matches, values_equal};
pub use parser::parse;
