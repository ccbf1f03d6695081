//! The seam between the compiler and the event schema.
//!
//! A [`Model`] resolves field names to typed evaluators and iterator paths to
//! [`FieldIterator`]s. The compiler never inspects events itself.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::evaluator::Evaluator;
use crate::event::Context;

/// Dotted field path, e.g. `process.ancestors.name`.
pub type Field = String;

/// Identifier of an iteration variable bound during compilation.
pub type RegisterId = String;

/// Errors returned by a [`Model`].
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("field `{0}` not found")]
    FieldNotFound(Field),

    #[error("iterator `{0}` not found")]
    IteratorNotFound(Field),
}

/// Iterates the elements of a collection-valued field.
pub trait FieldIterator: fmt::Debug + Send + Sync {
    /// Number of elements for the event in `ctx`.
    fn len(&self, ctx: &Context<'_>) -> usize;

    fn is_empty(&self, ctx: &Context<'_>) -> bool {
        self.len(ctx) == 0
    }
}

/// Field accessor factory supplied by the host.
pub trait Model {
    /// Evaluator reading `field`. `register` is empty unless the field is
    /// read through an iterator, in which case the evaluator reads the
    /// element selected by that register in the context, or every element
    /// when the register is unset.
    fn get_evaluator(&self, field: &str, register: &str) -> Result<Evaluator, ModelError>;

    /// Iterator over the collection at `field`.
    fn get_iterator(&self, field: &str) -> Result<Arc<dyn FieldIterator>, ModelError>;
}
