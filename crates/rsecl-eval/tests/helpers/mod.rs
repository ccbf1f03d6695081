#![allow(dead_code)]

use rsecl_ast::{BooleanExpression, Comparison, Primary};
use rsecl_eval::{CompileError, CompileOptions, CompiledRule, Context, JsonModel, compile_rule};
use serde_json::Value;

pub const SCHEMA: &str = include_str!("../fixtures/schema.yaml");

/// Evaluation time used by every helper: 2024-01-01T00:00:00Z.
pub const NOW: i64 = 1_704_067_200_000_000_000;

pub fn model() -> JsonModel {
    JsonModel::from_yaml(SCHEMA).unwrap()
}

pub fn try_compile_with(
    expr: impl Into<BooleanExpression>,
    opts: &CompileOptions,
) -> Result<CompiledRule, CompileError> {
    compile_rule("test", &expr.into(), opts, &model())
}

pub fn compile_with(expr: impl Into<BooleanExpression>, opts: &CompileOptions) -> CompiledRule {
    try_compile_with(expr, opts).unwrap()
}

pub fn compile(expr: impl Into<BooleanExpression>) -> CompiledRule {
    compile_with(expr, &CompileOptions::default())
}

pub fn compile_err(expr: impl Into<BooleanExpression>) -> CompileError {
    try_compile_with(expr, &CompileOptions::default()).unwrap_err()
}

pub fn eval(rule: &CompiledRule, event: &Value) -> bool {
    rule.evaluate(&Context::from_value(event).with_now(NOW))
}

/// `lhs op rhs`
pub fn cmp(lhs: Primary, op: &str, rhs: Primary) -> Comparison {
    Comparison::scalar(lhs, op, rhs)
}

pub fn ident(name: &str) -> Primary {
    Primary::ident(name)
}
