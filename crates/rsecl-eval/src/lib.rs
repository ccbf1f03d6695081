//! # rsecl-eval
//!
//! Compiler from rsecl syntax trees to typed evaluators.
//!
//! A rule is compiled once against a [`Model`], the host's description of
//! the event schema, into a tree of typed closures. Sub-expressions built only
//! from literals are folded at compile time. Compiled rules are immutable and
//! `Send + Sync`; each evaluation gets its own [`Context`], so one rule can be
//! evaluated from many threads at once.
//!
//! ## Architecture
//!
//! - **Evaluators**: six kinds (bool, int, string and their arrays), each a
//!   static value or a deferred function of the context, with the fields it
//!   reads and a cost weight.
//! - **Identifiers** resolve to constants, then macros, then model fields.
//!   Fields under an iterator path (`process.ancestors[_].name`) read every
//!   element of the collection.
//! - **Patterns** (`~"/usr/bin/*"`) and **regexps** (`r"^ba?sh$"`) compile to
//!   linear-time regexes when the rule is compiled.
//!
//! ## Quick Start
//!
//! ```rust
//! use rsecl_ast::{Comparison, Expression, Primary};
//! use rsecl_eval::{CompileOptions, Context, JsonModel, compile_rule};
//! use serde_json::json;
//!
//! let model = JsonModel::from_yaml(r#"
//! fields:
//!   process.name: string
//!   process.pid: int
//! "#).unwrap();
//!
//! // process.name =~ "ba*" && process.pid > 1
//! let expr = Expression::and(
//!     Comparison::scalar(Primary::ident("process.name"), "=~", Primary::string("ba*")),
//!     Comparison::scalar(Primary::ident("process.pid"), ">", Primary::number(1)),
//! )
//! .into();
//! let rule = compile_rule("bash", &expr, &CompileOptions::default(), &model).unwrap();
//!
//! let event = json!({"process": {"name": "bash", "pid": 42}});
//! assert!(rule.evaluate(&Context::from_value(&event)));
//! ```

pub mod compiler;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod event;
pub mod json_model;
pub mod macros;
pub mod model;
pub mod operators;
pub mod overrides;
pub mod pattern;
pub mod resolver;
pub mod rule;
pub mod state;

// Re-export the most commonly used types and functions at crate root
pub use compiler::{compile, compile_array, compile_expression};
pub use config::{ConfigError, ConstantValue};
pub use error::{CompileError, Kind, Result};
pub use evaluator::{
    BoolArrayEvaluator, BoolEvaluator, Compute, EvalFn, Evaluator, FieldValue,
    IntArrayEvaluator, IntEvaluator, StringArrayEvaluator, StringEvaluator, ValueType,
};
pub use event::{Context, Event};
pub use json_model::{FieldDecl, FieldKind, JsonModel, ModelSchema};
pub use macros::{Macro, MacroId};
pub use model::{Field, FieldIterator, Model, ModelError, RegisterId};
pub use operators::CmpOp;
pub use overrides::{OpOverrides, OverrideError, StringOpOverride};
pub use pattern::PatternError;
pub use rule::{CompiledRule, compile_rule};
pub use state::{CompileOptions, CompileState, RegisterInfo};
