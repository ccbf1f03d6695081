//! Compilation error types.

use std::fmt;

use rsecl_ast::Position;
use thiserror::Error;

use crate::model::{Field, ModelError, RegisterId};
use crate::overrides::OverrideError;
use crate::pattern::PatternError;

/// Value kind of an evaluator, as named in type errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Bool,
    Int,
    String,
    BoolArray,
    IntArray,
    StringArray,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Kind::Bool => "bool",
            Kind::Int => "int",
            Kind::String => "string",
            Kind::BoolArray => "bool array",
            Kind::IntArray => "int array",
            Kind::StringArray => "string array",
        })
    }
}

/// Errors raised while compiling an expression tree.
///
/// Every variant carries the source position of the offending node.
#[derive(Debug, Error)]
pub enum CompileError {
    /// An operand evaluates to a different kind than the operator accepts.
    #[error("{pos}: type error: expected {expected}, found {found}")]
    TypeMismatch {
        pos: Position,
        expected: Kind,
        found: Kind,
    },

    /// An operator token has no meaning at its place in the tree.
    #[error("{pos}: unknown operator `{op}`")]
    UnknownOperator { pos: Position, op: String },

    /// A named register other than `_`.
    #[error("{pos}: register `{register}` not allowed, only `_` is supported")]
    RegisterNameNotAllowed { pos: Position, register: RegisterId },

    /// One register bound to two different iterators.
    #[error(
        "{pos}: register `{register}` cannot iterate both `{bound}` and `{field}`"
    )]
    RegisterMultipleFields {
        pos: Position,
        register: RegisterId,
        bound: Field,
        field: Field,
    },

    /// A pattern or regexp whose text is only known at evaluation time.
    #[error("{pos}: pattern operand of `{field}` must be static")]
    NonStaticPattern { pos: Position, field: String },

    /// A malformed `[register]` part in a field name.
    #[error("{pos}: wrong register format for `{field}`")]
    RegisterFormat { pos: Position, field: String },

    /// An array literal with no usable element kind.
    #[error("{pos}: unknown array element type")]
    UnknownArrayElement { pos: Position },

    /// A node whose children do not fit together.
    #[error("{pos}: malformed {node}: {reason}")]
    MalformedNode {
        pos: Position,
        node: &'static str,
        reason: &'static str,
    },

    /// A pattern or regexp literal failed to compile.
    #[error("{pos}: {source}")]
    InvalidPattern {
        pos: Position,
        #[source]
        source: PatternError,
    },

    /// The model rejected a field or iterator lookup.
    #[error("{pos}: {source}")]
    Model {
        pos: Position,
        #[source]
        source: ModelError,
    },

    /// A field-provided operator override returned an error.
    #[error("{pos}: `{op}` override failed: {source}")]
    Override {
        pos: Position,
        op: String,
        #[source]
        source: OverrideError,
    },
}

impl CompileError {
    /// Source position of the node that failed to compile.
    pub fn position(&self) -> Position {
        match self {
            CompileError::TypeMismatch { pos, .. }
            | CompileError::UnknownOperator { pos, .. }
            | CompileError::RegisterNameNotAllowed { pos, .. }
            | CompileError::RegisterMultipleFields { pos, .. }
            | CompileError::NonStaticPattern { pos, .. }
            | CompileError::RegisterFormat { pos, .. }
            | CompileError::UnknownArrayElement { pos }
            | CompileError::MalformedNode { pos, .. }
            | CompileError::InvalidPattern { pos, .. }
            | CompileError::Model { pos, .. }
            | CompileError::Override { pos, .. } => *pos,
        }
    }
}

/// Convenience result type for compilation.
pub type Result<T> = std::result::Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_carries_position() {
        let err = CompileError::TypeMismatch {
            pos: Position::new(1, 12),
            expected: Kind::String,
            found: Kind::Int,
        };
        assert_eq!(err.to_string(), "1:12: type error: expected string, found int");
        assert_eq!(err.position(), Position::new(1, 12));
    }

    #[test]
    fn test_model_error_source() {
        use std::error::Error as _;
        let err = CompileError::Model {
            pos: Position::new(2, 1),
            source: ModelError::FieldNotFound("process.nope".into()),
        };
        assert!(err.to_string().contains("process.nope"));
        assert!(err.source().is_some());
    }
}
