//! Compilation inputs and the mutable state threaded through one compilation.

use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use rsecl_ast::Position;

use crate::error::{CompileError, Result};
use crate::evaluator::Evaluator;
use crate::macros::{Macro, MacroId};
use crate::model::{Field, FieldIterator, Model, RegisterId};

/// Read-only inputs of a compilation.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Deprecated field names and their replacements.
    pub legacy_attributes: HashMap<Field, Field>,
    /// Named static values, resolved before macros and fields.
    pub constants: HashMap<String, Evaluator>,
    /// Precompiled macros, resolved before fields.
    pub macros: HashMap<MacroId, Macro>,
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_constant(mut self, name: impl Into<String>, value: impl Into<Evaluator>) -> Self {
        self.constants.insert(name.into(), value.into());
        self
    }

    pub fn with_legacy_attribute(mut self, old: impl Into<Field>, new: impl Into<Field>) -> Self {
        self.legacy_attributes.insert(old.into(), new.into());
        self
    }

    pub fn with_macro(mut self, m: Macro) -> Self {
        self.add_macro(m);
        self
    }

    /// Register a macro, replacing any macro with the same id.
    pub fn add_macro(&mut self, m: Macro) {
        self.macros.insert(m.id.clone(), m);
    }
}

/// An iteration variable and the collection it ranges over.
#[derive(Debug, Clone)]
pub struct RegisterInfo {
    /// Iterator path the register is bound to.
    pub field: Field,
    pub iterator: Arc<dyn FieldIterator>,
    /// Fields read through this register.
    pub sub_fields: BTreeSet<Field>,
}

/// Mutable state of a single compilation.
///
/// Created per rule or macro and discarded afterwards; the accumulated fields
/// and registers are handed back through [`CompileState::into_parts`].
pub struct CompileState<'a> {
    model: &'a dyn Model,
    macros: &'a HashMap<MacroId, Macro>,
    registers: HashMap<RegisterId, RegisterInfo>,
    fields: BTreeSet<Field>,
    next_register: usize,
}

impl<'a> CompileState<'a> {
    pub fn new(model: &'a dyn Model, macros: &'a HashMap<MacroId, Macro>) -> Self {
        CompileState {
            model,
            macros,
            registers: HashMap::new(),
            fields: BTreeSet::new(),
            next_register: 0,
        }
    }

    pub fn model(&self) -> &'a dyn Model {
        self.model
    }

    pub fn get_macro(&self, id: &str) -> Option<&'a Macro> {
        self.macros.get(id)
    }

    /// A register id not handed out before in this compilation.
    pub fn allocate_register(&mut self) -> RegisterId {
        let id = format!("r{}", self.next_register);
        self.next_register += 1;
        log::trace!("allocated register `{id}`");
        id
    }

    /// Bind register `id` to the iterator at `iterator_field` and record
    /// `field` as read through it.
    ///
    /// A register already bound to a different iterator path is an error.
    pub fn bind_register(
        &mut self,
        pos: Position,
        id: RegisterId,
        iterator_field: Field,
        iterator: Arc<dyn FieldIterator>,
        field: Field,
    ) -> Result<()> {
        match self.registers.entry(id) {
            Entry::Occupied(mut entry) => {
                if entry.get().field != iterator_field {
                    return Err(CompileError::RegisterMultipleFields {
                        pos,
                        register: entry.key().clone(),
                        bound: entry.get().field.clone(),
                        field: iterator_field,
                    });
                }
                entry.get_mut().sub_fields.insert(field);
            }
            Entry::Vacant(entry) => {
                entry.insert(RegisterInfo {
                    field: iterator_field,
                    iterator,
                    sub_fields: BTreeSet::from([field]),
                });
            }
        }
        Ok(())
    }

    pub fn register(&self, id: &str) -> Option<&RegisterInfo> {
        self.registers.get(id)
    }

    /// Record a field read by the expression being compiled.
    pub fn update_fields(&mut self, field: impl Into<Field>) {
        self.fields.insert(field.into());
    }

    pub fn extend_fields(&mut self, fields: impl IntoIterator<Item = Field>) {
        self.fields.extend(fields);
    }

    pub fn fields(&self) -> &BTreeSet<Field> {
        &self.fields
    }

    pub fn into_parts(self) -> (BTreeSet<Field>, HashMap<RegisterId, RegisterInfo>) {
        (self.fields, self.registers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json_model::{FieldDecl, FieldKind, JsonModel};

    fn model() -> JsonModel {
        JsonModel::new()
            .with_iterator("process.ancestors")
            .with_iterator("process.args")
            .with_field("process.ancestors.name", FieldDecl::new(FieldKind::String))
    }

    #[test]
    fn test_allocate_register_unique() {
        let model = model();
        let macros = HashMap::new();
        let mut state = CompileState::new(&model, &macros);
        let a = state.allocate_register();
        let b = state.allocate_register();
        assert_ne!(a, b);
    }

    #[test]
    fn test_bind_register_shares_info() {
        let model = model();
        let macros = HashMap::new();
        let mut state = CompileState::new(&model, &macros);
        let it = model.get_iterator("process.ancestors").unwrap();
        let pos = Position::new(1, 1);
        state
            .bind_register(pos, "r".into(), "process.ancestors".into(), it.clone(), "process.ancestors.name".into())
            .unwrap();
        state
            .bind_register(pos, "r".into(), "process.ancestors".into(), it, "process.ancestors.pid".into())
            .unwrap();
        let info = state.register("r").unwrap();
        assert_eq!(info.field, "process.ancestors");
        assert_eq!(info.sub_fields.len(), 2);
    }

    #[test]
    fn test_bind_register_conflict() {
        let model = model();
        let macros = HashMap::new();
        let mut state = CompileState::new(&model, &macros);
        let pos = Position::new(1, 5);
        let ancestors = model.get_iterator("process.ancestors").unwrap();
        let args = model.get_iterator("process.args").unwrap();
        state
            .bind_register(pos, "r".into(), "process.ancestors".into(), ancestors, "process.ancestors.name".into())
            .unwrap();
        let err = state
            .bind_register(pos, "r".into(), "process.args".into(), args, "process.args.value".into())
            .unwrap_err();
        assert!(matches!(err, CompileError::RegisterMultipleFields { .. }), "got: {err}");
    }

    #[test]
    fn test_options_builders() {
        let opts = CompileOptions::new()
            .with_constant("MAX", crate::evaluator::IntEvaluator::from_value(3))
            .with_legacy_attribute("process.exe", "process.file.path");
        assert!(opts.constants.contains_key("MAX"));
        assert_eq!(opts.legacy_attributes["process.exe"], "process.file.path");
    }
}
