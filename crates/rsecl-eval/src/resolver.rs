//! Identifier resolution: constants, then macros, then model fields.
//!
//! Field identifiers may name an iteration register, as in
//! `process.ancestors[_].name`. Fields below a registered iterator path are
//! iterated implicitly even without the bracket.

use std::sync::Arc;

use rsecl_ast::Position;

use crate::error::{CompileError, Result};
use crate::evaluator::Evaluator;
use crate::model::{Field, FieldIterator, Model, RegisterId};
use crate::state::{CompileOptions, CompileState};

/// Name of the anonymous register, the only one accepted. An empty `[]` is
/// equivalent.
pub const ANONYMOUS_REGISTER: &str = "_";

/// An identifier split into field path and register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef {
    /// Field path with the register removed.
    pub field: Field,
    /// Path before the register, when one is given.
    pub iterator_field: Option<Field>,
    pub register: Option<RegisterId>,
}

/// Split `ident` around its optional `[register]` part.
///
/// `a.b[_].c` yields field `a.b.c`, iterator field `a.b` and register `_`.
/// More than one register, an unterminated bracket, or a register with no
/// preceding path is a format error.
pub fn extract_field(ident: &str, pos: Position) -> Result<FieldRef> {
    let format_error = || CompileError::RegisterFormat {
        pos,
        field: ident.to_string(),
    };
    let Some(open) = ident.find('[') else {
        if ident.contains(']') {
            return Err(format_error());
        }
        return Ok(FieldRef {
            field: ident.to_string(),
            iterator_field: None,
            register: None,
        });
    };
    let close = ident[open..]
        .find(']')
        .map(|i| open + i)
        .ok_or_else(format_error)?;
    let register = &ident[open + 1..close];
    let (prefix, suffix) = (&ident[..open], &ident[close + 1..]);
    if prefix.is_empty() || register.contains('[') || suffix.contains(['[', ']']) {
        return Err(format_error());
    }
    Ok(FieldRef {
        field: format!("{prefix}{suffix}"),
        iterator_field: Some(prefix.to_string()),
        register: Some(register.to_string()),
    })
}

/// Resolve an identifier to an evaluator.
///
/// Constants win over macros, macros over model fields. Resolving a field
/// records it in `state`; resolving a macro records the macro's fields.
pub fn resolve_identifier(
    name: &str,
    pos: Position,
    opts: &CompileOptions,
    state: &mut CompileState<'_>,
) -> Result<Evaluator> {
    if let Some(constant) = opts.constants.get(name) {
        return Ok(constant.clone());
    }
    if let Some(m) = state.get_macro(name) {
        state.extend_fields(m.fields.iter().cloned());
        return Ok(m.evaluator.clone());
    }
    resolve_field(name, pos, opts, state)
}

fn resolve_field(
    name: &str,
    pos: Position,
    opts: &CompileOptions,
    state: &mut CompileState<'_>,
) -> Result<Evaluator> {
    let FieldRef {
        field,
        iterator_field,
        register,
    } = extract_field(name, pos)?;
    let field = remap_legacy(field, opts);
    let iterator_field = iterator_field.map(|f| remap_legacy(f, opts));

    let model = state.model();
    let iterator = match iterator_field {
        Some(it_field) => {
            let iterator = model
                .get_iterator(&it_field)
                .map_err(|source| CompileError::Model { pos, source })?;
            Some((it_field, iterator))
        }
        None => discover_iterator(&field, model),
    };

    let register_id = match iterator {
        Some((it_field, iterator)) => {
            if let Some(register) = register
                && !register.is_empty()
                && register != ANONYMOUS_REGISTER
            {
                return Err(CompileError::RegisterNameNotAllowed { pos, register });
            }
            // every anonymous use iterates independently
            let id = state.allocate_register();
            state.bind_register(pos, id.clone(), it_field, iterator, field.clone())?;
            id
        }
        None => RegisterId::new(),
    };

    let evaluator = model
        .get_evaluator(&field, &register_id)
        .map_err(|source| CompileError::Model { pos, source })?;
    state.update_fields(field);
    Ok(evaluator)
}

fn remap_legacy(field: Field, opts: &CompileOptions) -> Field {
    match opts.legacy_attributes.get(&field) {
        Some(new) => {
            log::warn!("field `{field}` is deprecated, use `{new}` instead");
            new.clone()
        }
        None => field,
    }
}

/// First dotted prefix of `field`, or `field` itself, that the model knows
/// as an iterator.
fn discover_iterator(field: &str, model: &dyn Model) -> Option<(Field, Arc<dyn FieldIterator>)> {
    path_prefixes(field).find_map(|prefix| {
        let iterator = model.get_iterator(prefix).ok()?;
        log::trace!("field `{field}` iterates over `{prefix}`");
        Some((prefix.to_string(), iterator))
    })
}

/// `a`, `a.b`, `a.b.c` for `a.b.c`.
pub(crate) fn path_prefixes(field: &str) -> impl Iterator<Item = &str> {
    field
        .match_indices('.')
        .map(move |(i, _)| &field[..i])
        .chain(std::iter::once(field))
}
