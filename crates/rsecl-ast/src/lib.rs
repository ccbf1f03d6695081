//! # rsecl-ast
//!
//! Syntax tree for the rsecl rule expression language.
//!
//! The grammar itself lives outside this workspace; whatever parser is used
//! hands its output over either as these types directly or as JSON
//! ([`from_json`]). The compiler in `rsecl-eval` consumes these types.
//!
//! ## Building trees in code
//!
//! ```rust
//! use rsecl_ast::{Comparison, Expression, Primary};
//!
//! // process.name == "bash" && process.pid > 1
//! let expr = Expression::and(
//!     Comparison::scalar(Primary::ident("process.name"), "==", Primary::string("bash")),
//!     Comparison::scalar(Primary::ident("process.pid"), ">", Primary::number(1)),
//! );
//! assert_eq!(expr.to_string(), r#"process.name == "bash" && process.pid > 1"#);
//! ```

pub mod ast;
pub mod error;

pub use ast::{
    Array, ArrayComparison, ArrayKind, BitOperation, BooleanExpression, Comparison,
    ComparisonRhs, Expression, Position, Primary, PrimaryKind, ScalarComparison, StringMember,
    Unary, format_duration,
};
pub use error::{AstError, Result};

/// Deserialize a rule syntax tree produced by an external parser.
pub fn from_json(json: &str) -> Result<BooleanExpression> {
    Ok(serde_json::from_str(json)?)
}

/// Serialize a rule syntax tree to JSON.
pub fn to_json(expr: &BooleanExpression) -> Result<String> {
    Ok(serde_json::to_string(expr)?)
}
