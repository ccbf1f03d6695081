//! A [`Model`] over JSON events, driven by a declarative schema.
//!
//! The schema declares each field's kind and the paths of collection fields
//! that can be iterated:
//!
//! ```yaml
//! fields:
//!   process.name: string
//!   process.pid: int
//!   process.created_at: { kind: int, duration: true }
//!   process.user: { kind: string, case_insensitive: true }
//!   process.ancestors.name: string
//! iterators:
//!   - process.ancestors
//! ```
//!
//! Fields below an iterator path read every element of the collection, and
//! resolve to the array counterpart of their declared kind. When the context
//! selects an element through the field's register, only that element is
//! read. Missing values read as the kind's zero value.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ConfigError;
use crate::evaluator::{
    BoolArrayEvaluator, BoolEvaluator, Evaluator, FUNCTION_WEIGHT, ITERATOR_WEIGHT,
    IntArrayEvaluator, IntEvaluator, StringArrayEvaluator, StringEvaluator,
};
use crate::event::{Context, lookup};
use crate::model::{Field, FieldIterator, Model, ModelError};
use crate::overrides::OpOverrides;
use crate::resolver::path_prefixes;

// =============================================================================
// Schema
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Bool,
    Int,
    String,
    BoolArray,
    IntArray,
    StringArray,
}

/// Declaration of one field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "FieldDeclRepr")]
pub struct FieldDecl {
    pub kind: FieldKind,
    /// Int field holding a timestamp, compared by elapsed time.
    pub duration: bool,
    /// String field whose `==` ignores ASCII case.
    pub case_insensitive: bool,
    /// Overrides the default accessor weight.
    pub weight: Option<i64>,
}

/// Either a bare kind or a full declaration.
#[derive(Deserialize)]
#[serde(untagged)]
enum FieldDeclRepr {
    Kind(FieldKind),
    Full {
        kind: FieldKind,
        #[serde(default)]
        duration: bool,
        #[serde(default)]
        case_insensitive: bool,
        #[serde(default)]
        weight: Option<i64>,
    },
}

impl From<FieldDeclRepr> for FieldDecl {
    fn from(repr: FieldDeclRepr) -> Self {
        match repr {
            FieldDeclRepr::Kind(kind) => FieldDecl::new(kind),
            FieldDeclRepr::Full {
                kind,
                duration,
                case_insensitive,
                weight,
            } => FieldDecl {
                kind,
                duration,
                case_insensitive,
                weight,
            },
        }
    }
}

impl FieldDecl {
    pub fn new(kind: FieldKind) -> Self {
        FieldDecl {
            kind,
            duration: false,
            case_insensitive: false,
            weight: None,
        }
    }

    pub fn duration(mut self) -> Self {
        self.duration = true;
        self
    }

    pub fn case_insensitive(mut self) -> Self {
        self.case_insensitive = true;
        self
    }

    pub fn weight(mut self, weight: i64) -> Self {
        self.weight = Some(weight);
        self
    }
}

/// Schema file contents.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelSchema {
    #[serde(default)]
    pub fields: BTreeMap<Field, FieldDecl>,
    #[serde(default)]
    pub iterators: Vec<Field>,
}

// =============================================================================
// JsonModel
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct JsonModel {
    fields: BTreeMap<Field, FieldDecl>,
    iterators: BTreeSet<Field>,
}

impl JsonModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_schema(schema: ModelSchema) -> Self {
        JsonModel {
            fields: schema.fields,
            iterators: schema.iterators.into_iter().collect(),
        }
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let schema: ModelSchema = serde_yaml::from_str(yaml)?;
        Ok(JsonModel::from_schema(schema))
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        JsonModel::from_yaml(&content)
    }

    pub fn with_field(mut self, name: impl Into<Field>, decl: FieldDecl) -> Self {
        self.fields.insert(name.into(), decl);
        self
    }

    pub fn with_iterator(mut self, path: impl Into<Field>) -> Self {
        self.iterators.insert(path.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldDecl> {
        self.fields.get(name)
    }

    /// Shortest iterator path that is a dotted prefix of `field`, or `field`
    /// itself.
    fn iterator_of<'f>(&self, field: &'f str) -> Option<&'f str> {
        path_prefixes(field).find(|prefix| self.iterators.contains(*prefix))
    }
}

impl Model for JsonModel {
    fn get_evaluator(&self, field: &str, register: &str) -> Result<Evaluator, ModelError> {
        let decl = self
            .fields
            .get(field)
            .ok_or_else(|| ModelError::FieldNotFound(field.to_string()))?;
        let evaluator = match self.iterator_of(field) {
            Some(prefix) => iterated_evaluator(field, prefix, register, decl),
            None => scalar_evaluator(field, decl),
        };
        Ok(evaluator)
    }

    fn get_iterator(&self, field: &str) -> Result<Arc<dyn FieldIterator>, ModelError> {
        if !self.iterators.contains(field) {
            return Err(ModelError::IteratorNotFound(field.to_string()));
        }
        Ok(Arc::new(JsonIterator {
            path: field.to_string(),
        }))
    }
}

/// Iterator over the elements of a JSON array field. A present non-array
/// value counts as a single element.
#[derive(Debug, Clone)]
pub struct JsonIterator {
    path: Field,
}

impl FieldIterator for JsonIterator {
    fn len(&self, ctx: &Context<'_>) -> usize {
        elements(ctx, &self.path, "").len()
    }
}

// =============================================================================
// Accessors
// =============================================================================

fn scalar_evaluator(field: &str, decl: &FieldDecl) -> Evaluator {
    let weight = decl.weight.unwrap_or(FUNCTION_WEIGHT);
    let path = field.to_string();
    match decl.kind {
        FieldKind::Bool => BoolEvaluator::from_fn(field, weight, move |ctx| {
            ctx.event().get_field(&path).is_some_and(value_to_bool)
        })
        .into(),
        FieldKind::Int => {
            let convert = int_converter(decl);
            IntEvaluator::from_fn(field, weight, move |ctx| {
                ctx.event().get_field(&path).map(convert).unwrap_or_default()
            })
            .with_duration(decl.duration)
            .into()
        }
        FieldKind::String => {
            let evaluator = StringEvaluator::from_fn(field, weight, move |ctx| {
                ctx.event()
                    .get_field(&path)
                    .map(value_to_string)
                    .unwrap_or_default()
            });
            with_case(evaluator, decl).into()
        }
        FieldKind::BoolArray => BoolArrayEvaluator::from_fn(field, weight, move |ctx| {
            collect(ctx.event().get_field(&path), value_to_bool)
        })
        .into(),
        FieldKind::IntArray => {
            let convert = int_converter(decl);
            IntArrayEvaluator::from_fn(field, weight, move |ctx| {
                collect(ctx.event().get_field(&path), convert)
            })
            .into()
        }
        FieldKind::StringArray => StringArrayEvaluator::from_fn(field, weight, move |ctx| {
            collect(ctx.event().get_field(&path), value_to_string)
        })
        .into(),
    }
}

/// Accessor for a field below iterator `prefix`. Scalar kinds become arrays,
/// one value per element.
fn iterated_evaluator(field: &str, prefix: &str, register: &str, decl: &FieldDecl) -> Evaluator {
    let weight = decl.weight.unwrap_or(ITERATOR_WEIGHT);
    let prefix = prefix.to_string();
    // empty when the field is the iterator itself: the element is the value
    let rest = field
        .get(prefix.len() + 1..)
        .unwrap_or_default()
        .to_string();
    let register = register.to_string();
    macro_rules! per_element {
        ($convert:expr) => {
            move |ctx: &Context<'_>| {
                let mut out = Vec::new();
                for element in elements(ctx, &prefix, &register) {
                    collect_into(lookup(element, &rest), $convert, &mut out);
                }
                out
            }
        };
    }
    match decl.kind {
        FieldKind::Bool | FieldKind::BoolArray => {
            BoolArrayEvaluator::from_fn(field, weight, per_element!(value_to_bool)).into()
        }
        FieldKind::Int | FieldKind::IntArray => {
            let convert = int_converter(decl);
            IntArrayEvaluator::from_fn(field, weight, per_element!(convert)).into()
        }
        FieldKind::String | FieldKind::StringArray => {
            StringArrayEvaluator::from_fn(field, weight, per_element!(value_to_string)).into()
        }
    }
}

/// Elements of the collection at `path`, or only the one selected by
/// `register` when the context sets it.
fn elements<'a>(ctx: &Context<'a>, path: &str, register: &str) -> Vec<&'a Value> {
    let items: Vec<&'a Value> = match ctx.event().get_field(path) {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(value) => vec![value],
    };
    match ctx.register(register) {
        Some(index) => items.get(index).copied().into_iter().collect(),
        None => items,
    }
}

fn with_case(evaluator: StringEvaluator, decl: &FieldDecl) -> StringEvaluator {
    if decl.case_insensitive {
        evaluator.with_op_overrides(OpOverrides::case_insensitive())
    } else {
        evaluator
    }
}

fn int_converter(decl: &FieldDecl) -> fn(&Value) -> i64 {
    if decl.duration {
        value_to_timestamp
    } else {
        value_to_int
    }
}

fn collect<T>(value: Option<&Value>, convert: fn(&Value) -> T) -> Vec<T> {
    let mut out = Vec::new();
    collect_into(value, convert, &mut out);
    out
}

/// Push `value` converted, flattening arrays. Nulls and missing values are
/// skipped.
fn collect_into<T>(value: Option<&Value>, convert: fn(&Value) -> T, out: &mut Vec<T>) {
    match value {
        None | Some(Value::Null) => {}
        Some(Value::Array(items)) => {
            for item in items {
                collect_into(Some(item), convert, out);
            }
        }
        Some(v) => out.push(convert(v)),
    }
}

// =============================================================================
// Conversions
// =============================================================================

fn value_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

fn value_to_int(v: &Value) -> i64 {
    match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or_default(),
        Value::String(s) => s.trim().parse().unwrap_or_default(),
        Value::Bool(b) => i64::from(*b),
        _ => 0,
    }
}

fn value_to_bool(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => matches!(s.to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        _ => false,
    }
}

/// Nanoseconds since the Unix epoch, from integer nanoseconds or an RFC 3339
/// string.
fn value_to_timestamp(v: &Value) -> i64 {
    match v {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .and_then(|dt| dt.timestamp_nanos_opt())
            .unwrap_or_else(|| value_to_int(v)),
        _ => value_to_int(v),
    }
}
