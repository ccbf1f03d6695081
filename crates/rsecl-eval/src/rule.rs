//! Rule compilation: a boolean expression plus what it reads.

use std::collections::{BTreeSet, HashMap};

use rsecl_ast::BooleanExpression;

use crate::compiler;
use crate::error::{CompileError, Kind, Result};
use crate::evaluator::{BoolEvaluator, Evaluator};
use crate::event::Context;
use crate::model::{Field, Model, RegisterId};
use crate::state::{CompileOptions, CompileState, RegisterInfo};

/// A compiled rule, ready to evaluate events.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub id: String,
    pub evaluator: BoolEvaluator,
    /// Every field the rule reads, macros included.
    pub fields: BTreeSet<Field>,
    /// Iteration registers bound while compiling.
    pub registers: HashMap<RegisterId, RegisterInfo>,
}

impl CompiledRule {
    pub fn evaluate(&self, ctx: &Context<'_>) -> bool {
        self.evaluator.eval(ctx)
    }

    pub fn weight(&self) -> i64 {
        self.evaluator.weight
    }

    /// Result known without any event, if the rule reads no field.
    pub fn static_result(&self) -> Option<bool> {
        self.evaluator.static_value()
    }
}

/// Compile a rule. The expression must be boolean.
pub fn compile_rule(
    id: impl Into<String>,
    expr: &BooleanExpression,
    opts: &CompileOptions,
    model: &dyn Model,
) -> Result<CompiledRule> {
    let id = id.into();
    let mut state = CompileState::new(model, &opts.macros);
    let evaluator = match compiler::compile(expr, opts, &mut state)? {
        Evaluator::Bool(e) => e,
        other => {
            return Err(CompileError::TypeMismatch {
                pos: expr.pos,
                expected: Kind::Bool,
                found: other.kind(),
            });
        }
    };
    let (fields, registers) = state.into_parts();
    log::debug!(
        "compiled rule `{id}`: {} fields, {} registers, weight {}",
        fields.len(),
        registers.len(),
        evaluator.weight
    );
    Ok(CompiledRule {
        id,
        evaluator,
        fields,
        registers,
    })
}
