//! Named, precompiled sub-expressions and value lists.
//!
//! A macro is compiled once against the model and then referenced by name
//! from rules, either as an operand or as the right side of `in`. Its fields
//! are merged into every rule that references it.

use std::collections::BTreeSet;

use rsecl_ast::{Array, Expression};

use crate::compiler;
use crate::error::Result;
use crate::evaluator::Evaluator;
use crate::model::{Field, Model};
use crate::state::{CompileOptions, CompileState};

/// Macro identifier, as referenced from rules.
pub type MacroId = String;

#[derive(Debug, Clone)]
pub struct Macro {
    pub id: MacroId,
    pub evaluator: Evaluator,
    pub fields: BTreeSet<Field>,
}

impl Macro {
    /// Compile an expression macro. Macros already in `opts` can be
    /// referenced.
    pub fn from_expression(
        id: impl Into<MacroId>,
        expr: &Expression,
        opts: &CompileOptions,
        model: &dyn Model,
    ) -> Result<Self> {
        let id = id.into();
        let mut state = CompileState::new(model, &opts.macros);
        let evaluator = compiler::compile_expression(expr, opts, &mut state)?;
        Ok(Macro::finish(id, evaluator, state))
    }

    /// Compile a value-list macro such as `[ "bash", "zsh" ]`.
    pub fn from_array(
        id: impl Into<MacroId>,
        array: &Array,
        opts: &CompileOptions,
        model: &dyn Model,
    ) -> Result<Self> {
        let id = id.into();
        let mut state = CompileState::new(model, &opts.macros);
        let evaluator = compiler::compile_array(array, opts, &mut state)?;
        Ok(Macro::finish(id, evaluator, state))
    }

    /// Wrap an evaluator built by the host.
    pub fn from_evaluator(id: impl Into<MacroId>, evaluator: impl Into<Evaluator>) -> Self {
        let evaluator = evaluator.into();
        Macro {
            id: id.into(),
            fields: evaluator.fields().clone(),
            evaluator,
        }
    }

    fn finish(id: MacroId, evaluator: Evaluator, state: CompileState<'_>) -> Self {
        let (fields, _) = state.into_parts();
        log::debug!(
            "compiled macro `{id}`: {} ({} fields)",
            evaluator.kind(),
            fields.len()
        );
        Macro {
            id,
            evaluator,
            fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::StringArrayEvaluator;
    use crate::json_model::{FieldDecl, FieldKind, JsonModel};
    use rsecl_ast::{Comparison, Primary, StringMember};

    #[test]
    fn test_expression_macro_fields() {
        let model = JsonModel::new().with_field("process.name", FieldDecl::new(FieldKind::String));
        let expr = Expression::from(Comparison::scalar(
            Primary::ident("process.name"),
            "==",
            Primary::string("bash"),
        ));
        let m = Macro::from_expression("is_bash", &expr, &CompileOptions::default(), &model).unwrap();
        assert_eq!(m.evaluator.kind(), crate::error::Kind::Bool);
        assert!(m.fields.contains("process.name"));
    }

    #[test]
    fn test_array_macro() {
        let model = JsonModel::new();
        let array = Array::strings([
            StringMember::String("bash".into()),
            StringMember::Pattern("*sh".into()),
        ]);
        let m = Macro::from_array("shells", &array, &CompileOptions::default(), &model).unwrap();
        let crate::evaluator::Evaluator::StringArray(arr) = &m.evaluator else {
            panic!("expected string array");
        };
        assert_eq!(arr.field_values.len(), 2);
        assert!(m.fields.is_empty());
    }

    #[test]
    fn test_from_evaluator() {
        let m = Macro::from_evaluator("names", StringArrayEvaluator::from_values(vec!["a".into()]));
        assert_eq!(m.id, "names");
    }
}
