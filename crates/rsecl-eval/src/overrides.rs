//! Per-field operator overrides.
//!
//! A model can attach an [`OpOverrides`] table to the string evaluators it
//! returns. When either operand of `==` carries an override for that
//! operator, the override builds the comparison instead of the default string
//! equality. The left operand's table is consulted first.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::evaluator::{BoolEvaluator, StringEvaluator, ValueType};
use crate::operators;
use crate::pattern;
use crate::state::{CompileOptions, CompileState};

/// Operator token overrides are registered under for string equality.
pub const EQUALS_OP: &str = "==";

/// Error type returned by override functions.
pub type OverrideError = Box<dyn std::error::Error + Send + Sync>;

/// Builds a boolean evaluator from the two string operands of an operator.
pub type StringOpOverride = Arc<
    dyn Fn(
            &StringEvaluator,
            &StringEvaluator,
            &CompileOptions,
            &mut CompileState<'_>,
        ) -> Result<BoolEvaluator, OverrideError>
        + Send
        + Sync,
>;

/// Table of operator overrides, keyed by operator token.
#[derive(Clone, Default)]
pub struct OpOverrides {
    table: HashMap<String, StringOpOverride>,
}

impl fmt::Debug for OpOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ops: Vec<&str> = self.table.keys().map(String::as_str).collect();
        ops.sort_unstable();
        f.debug_struct("OpOverrides").field("ops", &ops).finish()
    }
}

impl OpOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `f` for operator `op`, replacing any previous entry.
    pub fn with<F>(mut self, op: impl Into<String>, f: F) -> Self
    where
        F: Fn(
                &StringEvaluator,
                &StringEvaluator,
                &CompileOptions,
                &mut CompileState<'_>,
            ) -> Result<BoolEvaluator, OverrideError>
            + Send
            + Sync
            + 'static,
    {
        self.table.insert(op.into(), Arc::new(f));
        self
    }

    pub fn get(&self, op: &str) -> Option<&StringOpOverride> {
        self.table.get(op)
    }

    /// Overrides making `==` ignore ASCII case.
    pub fn case_insensitive() -> Self {
        OpOverrides::new().with(EQUALS_OP, case_insensitive_string_equals)
    }
}

/// String equality ignoring ASCII case.
///
/// Scalar operands are lowercased; pattern and regexp operands are recompiled
/// case-insensitively.
pub fn case_insensitive_string_equals(
    a: &StringEvaluator,
    b: &StringEvaluator,
    _opts: &CompileOptions,
    _state: &mut CompileState<'_>,
) -> Result<BoolEvaluator, OverrideError> {
    Ok(operators::string_equals(&fold_case(a)?, &fold_case(b)?))
}

fn fold_case(e: &StringEvaluator) -> Result<StringEvaluator, pattern::PatternError> {
    let mut folded = e.clone();
    match (e.value_type, e.compute.static_value()) {
        (ValueType::Scalar, _) => {
            folded.compute = e.compute.map(|s| s.to_ascii_lowercase());
        }
        (value_type, Some(value)) => {
            folded.matcher = pattern::compile(value, value_type, true)?;
        }
        (_, None) => {}
    }
    Ok(folded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::FUNCTION_WEIGHT;
    use crate::event::Context;
    use crate::json_model::JsonModel;
    use serde_json::json;

    fn name_field() -> StringEvaluator {
        StringEvaluator::from_fn("process.name", FUNCTION_WEIGHT, |ctx| {
            ctx.event()
                .get_field("process.name")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        })
    }

    #[test]
    fn test_case_insensitive_scalar() {
        let model = JsonModel::new();
        let opts = CompileOptions::default();
        let mut state = CompileState::new(&model, &opts.macros);
        let eq = OpOverrides::case_insensitive();
        let f = eq.get(EQUALS_OP).unwrap();
        let e = f(&name_field(), &StringEvaluator::from_value("BASH"), &opts, &mut state).unwrap();
        let v = json!({"process": {"name": "Bash"}});
        assert!(e.eval(&Context::from_value(&v)));
    }

    #[test]
    fn test_case_insensitive_pattern() {
        let model = JsonModel::new();
        let opts = CompileOptions::default();
        let mut state = CompileState::new(&model, &opts.macros);
        let pat = StringEvaluator::from_pattern("/USR/*", ValueType::Pattern).unwrap();
        let e = case_insensitive_string_equals(&name_field(), &pat, &opts, &mut state).unwrap();
        let v = json!({"process": {"name": "/usr/bin/ls"}});
        assert!(e.eval(&Context::from_value(&v)));
    }

    #[test]
    fn test_debug_lists_ops() {
        let o = OpOverrides::case_insensitive();
        assert_eq!(format!("{o:?}"), r#"OpOverrides { ops: ["=="] }"#);
    }
}
