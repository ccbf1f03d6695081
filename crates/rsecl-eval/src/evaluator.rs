//! Typed evaluators produced by the compiler.
//!
//! An [`Evaluator`] is one of six value kinds. Each kind wraps a
//! [`Compute`]: either a value known at compile time (literals and everything
//! folded from literals) or a thread-safe closure over the per-event
//! [`Context`]. Evaluators also record the event fields they read and a cost
//! weight used by rule engines to order clauses.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use rsecl_ast::StringMember;

use crate::error::Kind;
use crate::event::Context;
use crate::model::Field;
use crate::overrides::OpOverrides;
use crate::pattern::{self, PatternError};

// =============================================================================
// Weights
// =============================================================================

/// Weight of a plain field accessor.
pub const FUNCTION_WEIGHT: i64 = 5;
/// Weight of a membership test against scalar array members.
pub const IN_ARRAY_WEIGHT: i64 = 10;
/// Weight added by a pattern or regexp match.
pub const REGEXP_WEIGHT: i64 = 100;
/// Weight of a membership test against pattern or regexp array members.
pub const IN_PATTERN_ARRAY_WEIGHT: i64 = 1000;
/// Weight of a field read through an iterator.
pub const ITERATOR_WEIGHT: i64 = 2000;

// =============================================================================
// Compute
// =============================================================================

/// Deferred computation over an event context.
pub type EvalFn<T> = Arc<dyn Fn(&Context<'_>) -> T + Send + Sync>;

/// A value known at compile time, or a function computing it per event.
#[derive(Clone)]
pub enum Compute<T> {
    Static(T),
    Deferred(EvalFn<T>),
}

impl<T: fmt::Debug> fmt::Debug for Compute<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compute::Static(v) => f.debug_tuple("Static").field(v).finish(),
            Compute::Deferred(_) => f.write_str("Deferred"),
        }
    }
}

impl<T> Compute<T> {
    pub fn deferred(f: impl Fn(&Context<'_>) -> T + Send + Sync + 'static) -> Self {
        Compute::Deferred(Arc::new(f))
    }

    pub fn is_static(&self) -> bool {
        matches!(self, Compute::Static(_))
    }

    pub fn static_value(&self) -> Option<&T> {
        match self {
            Compute::Static(v) => Some(v),
            Compute::Deferred(_) => None,
        }
    }
}

impl<T: Clone> Compute<T> {
    pub fn eval(&self, ctx: &Context<'_>) -> T {
        match self {
            Compute::Static(v) => v.clone(),
            Compute::Deferred(f) => f(ctx),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Compute<T> {
    /// Apply `f` to the value, folding it when the value is static.
    pub fn map<R>(&self, f: impl Fn(&T) -> R + Send + Sync + 'static) -> Compute<R> {
        match self {
            Compute::Static(v) => Compute::Static(f(v)),
            Compute::Deferred(g) => {
                let g = Arc::clone(g);
                Compute::deferred(move |ctx| f(&g(ctx)))
            }
        }
    }

    /// Combine two computations, folding when both are static.
    pub fn zip_with<U, R>(
        &self,
        other: &Compute<U>,
        f: impl Fn(&T, &U) -> R + Send + Sync + 'static,
    ) -> Compute<R>
    where
        U: Clone + Send + Sync + 'static,
    {
        match (self, other) {
            (Compute::Static(a), Compute::Static(b)) => Compute::Static(f(a, b)),
            (Compute::Static(a), Compute::Deferred(gb)) => {
                let (a, gb) = (a.clone(), Arc::clone(gb));
                Compute::deferred(move |ctx| f(&a, &gb(ctx)))
            }
            (Compute::Deferred(ga), Compute::Static(b)) => {
                let (ga, b) = (Arc::clone(ga), b.clone());
                Compute::deferred(move |ctx| f(&ga(ctx), &b))
            }
            (Compute::Deferred(ga), Compute::Deferred(gb)) => {
                let (ga, gb) = (Arc::clone(ga), Arc::clone(gb));
                Compute::deferred(move |ctx| f(&ga(ctx), &gb(ctx)))
            }
        }
    }
}

// =============================================================================
// Value types of string operands
// =============================================================================

/// How a string operand is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueType {
    /// Compared for equality.
    #[default]
    Scalar,
    /// Glob-like pattern, `*` matches any run of characters.
    Pattern,
    /// Regular expression, used as written.
    Regexp,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValueType::Scalar => "scalar",
            ValueType::Pattern => "pattern",
            ValueType::Regexp => "regexp",
        })
    }
}

/// A member of a string array literal, with its matcher compiled.
#[derive(Debug, Clone)]
pub struct FieldValue {
    pub value: String,
    pub value_type: ValueType,
    /// Present for pattern and regexp members.
    pub matcher: Option<Regex>,
}

impl FieldValue {
    pub fn from_member(member: &StringMember) -> Result<Self, PatternError> {
        let (value, value_type) = match member {
            StringMember::String(s) => (s, ValueType::Scalar),
            StringMember::Pattern(s) => (s, ValueType::Pattern),
            StringMember::Regexp(s) => (s, ValueType::Regexp),
        };
        Ok(FieldValue {
            value: value.clone(),
            value_type,
            matcher: pattern::compile(value, value_type, false)?,
        })
    }
}

// =============================================================================
// Evaluator kinds
// =============================================================================

/// Boolean evaluator.
#[derive(Debug, Clone)]
pub struct BoolEvaluator {
    pub compute: Compute<bool>,
    pub fields: BTreeSet<Field>,
    pub weight: i64,
}

impl BoolEvaluator {
    pub fn new(compute: Compute<bool>, fields: BTreeSet<Field>, weight: i64) -> Self {
        BoolEvaluator {
            compute,
            fields,
            weight,
        }
    }

    pub fn from_value(value: bool) -> Self {
        BoolEvaluator::new(Compute::Static(value), BTreeSet::new(), 0)
    }

    /// Accessor for a single event field.
    pub fn from_fn(
        field: impl Into<Field>,
        weight: i64,
        f: impl Fn(&Context<'_>) -> bool + Send + Sync + 'static,
    ) -> Self {
        BoolEvaluator::new(Compute::deferred(f), BTreeSet::from([field.into()]), weight)
    }

    pub fn eval(&self, ctx: &Context<'_>) -> bool {
        self.compute.eval(ctx)
    }

    pub fn static_value(&self) -> Option<bool> {
        self.compute.static_value().copied()
    }
}

/// Integer evaluator. Durations are nanoseconds.
#[derive(Debug, Clone)]
pub struct IntEvaluator {
    pub compute: Compute<i64>,
    pub fields: BTreeSet<Field>,
    pub weight: i64,
    /// Duration literal, or a time-valued field compared by elapsed time.
    pub is_duration: bool,
}

impl IntEvaluator {
    pub fn new(compute: Compute<i64>, fields: BTreeSet<Field>, weight: i64) -> Self {
        IntEvaluator {
            compute,
            fields,
            weight,
            is_duration: false,
        }
    }

    pub fn from_value(value: i64) -> Self {
        IntEvaluator::new(Compute::Static(value), BTreeSet::new(), 0)
    }

    pub fn from_duration(nanos: i64) -> Self {
        IntEvaluator::from_value(nanos).with_duration(true)
    }

    pub fn from_fn(
        field: impl Into<Field>,
        weight: i64,
        f: impl Fn(&Context<'_>) -> i64 + Send + Sync + 'static,
    ) -> Self {
        IntEvaluator::new(Compute::deferred(f), BTreeSet::from([field.into()]), weight)
    }

    pub fn with_duration(mut self, is_duration: bool) -> Self {
        self.is_duration = is_duration;
        self
    }

    pub fn eval(&self, ctx: &Context<'_>) -> i64 {
        self.compute.eval(ctx)
    }

    pub fn static_value(&self) -> Option<i64> {
        self.compute.static_value().copied()
    }
}

/// String evaluator.
///
/// Static pattern and regexp operands carry their compiled matcher; equality
/// against such an operand is a match. A model may attach [`OpOverrides`] to
/// replace `==` for its fields.
#[derive(Debug, Clone)]
pub struct StringEvaluator {
    pub compute: Compute<String>,
    pub fields: BTreeSet<Field>,
    pub weight: i64,
    pub value_type: ValueType,
    pub matcher: Option<Regex>,
    pub op_overrides: Option<OpOverrides>,
}

impl StringEvaluator {
    pub fn new(compute: Compute<String>, fields: BTreeSet<Field>, weight: i64) -> Self {
        StringEvaluator {
            compute,
            fields,
            weight,
            value_type: ValueType::Scalar,
            matcher: None,
            op_overrides: None,
        }
    }

    pub fn from_value(value: impl Into<String>) -> Self {
        StringEvaluator::new(Compute::Static(value.into()), BTreeSet::new(), 0)
    }

    /// Static pattern or regexp operand, compiled immediately.
    pub fn from_pattern(
        value: impl Into<String>,
        value_type: ValueType,
    ) -> Result<Self, PatternError> {
        let mut evaluator = StringEvaluator::from_value(value);
        evaluator.value_type = value_type;
        evaluator.compile_pattern()?;
        Ok(evaluator)
    }

    pub fn from_fn(
        field: impl Into<Field>,
        weight: i64,
        f: impl Fn(&Context<'_>) -> String + Send + Sync + 'static,
    ) -> Self {
        StringEvaluator::new(Compute::deferred(f), BTreeSet::from([field.into()]), weight)
    }

    pub fn with_op_overrides(mut self, overrides: OpOverrides) -> Self {
        self.op_overrides = Some(overrides);
        self
    }

    /// Compile the static value as a matcher, unless already compiled.
    ///
    /// A scalar in pattern position is promoted to a pattern. Deferred values
    /// are left untouched.
    pub fn compile_pattern(&mut self) -> Result<(), PatternError> {
        if self.matcher.is_some() {
            return Ok(());
        }
        let Compute::Static(value) = &self.compute else {
            return Ok(());
        };
        if self.value_type == ValueType::Scalar {
            self.value_type = ValueType::Pattern;
        }
        self.matcher = pattern::compile(value, self.value_type, false)?;
        Ok(())
    }

    /// Field names this operand reads, for error messages.
    pub fn field_name(&self) -> String {
        self.fields.iter().cloned().collect::<Vec<_>>().join(", ")
    }

    pub fn eval(&self, ctx: &Context<'_>) -> String {
        self.compute.eval(ctx)
    }

    pub fn static_value(&self) -> Option<&str> {
        self.compute.static_value().map(String::as_str)
    }
}

/// Boolean array evaluator.
#[derive(Debug, Clone)]
pub struct BoolArrayEvaluator {
    pub compute: Compute<Vec<bool>>,
    pub fields: BTreeSet<Field>,
    pub weight: i64,
}

impl BoolArrayEvaluator {
    pub fn new(compute: Compute<Vec<bool>>, fields: BTreeSet<Field>, weight: i64) -> Self {
        BoolArrayEvaluator {
            compute,
            fields,
            weight,
        }
    }

    pub fn from_values(values: Vec<bool>) -> Self {
        BoolArrayEvaluator::new(Compute::Static(values), BTreeSet::new(), 0)
    }

    pub fn from_fn(
        field: impl Into<Field>,
        weight: i64,
        f: impl Fn(&Context<'_>) -> Vec<bool> + Send + Sync + 'static,
    ) -> Self {
        BoolArrayEvaluator::new(Compute::deferred(f), BTreeSet::from([field.into()]), weight)
    }

    pub fn eval(&self, ctx: &Context<'_>) -> Vec<bool> {
        self.compute.eval(ctx)
    }
}

/// Integer array evaluator.
#[derive(Debug, Clone)]
pub struct IntArrayEvaluator {
    pub compute: Compute<Vec<i64>>,
    pub fields: BTreeSet<Field>,
    pub weight: i64,
}

impl IntArrayEvaluator {
    pub fn new(compute: Compute<Vec<i64>>, fields: BTreeSet<Field>, weight: i64) -> Self {
        IntArrayEvaluator {
            compute,
            fields,
            weight,
        }
    }

    pub fn from_values(values: Vec<i64>) -> Self {
        IntArrayEvaluator::new(Compute::Static(values), BTreeSet::new(), 0)
    }

    pub fn from_fn(
        field: impl Into<Field>,
        weight: i64,
        f: impl Fn(&Context<'_>) -> Vec<i64> + Send + Sync + 'static,
    ) -> Self {
        IntArrayEvaluator::new(Compute::deferred(f), BTreeSet::from([field.into()]), weight)
    }

    pub fn eval(&self, ctx: &Context<'_>) -> Vec<i64> {
        self.compute.eval(ctx)
    }
}

/// String array evaluator.
///
/// Literal arrays keep their members as [`FieldValue`]s so pattern and
/// regexp members match instead of comparing for equality.
#[derive(Debug, Clone)]
pub struct StringArrayEvaluator {
    pub compute: Compute<Vec<String>>,
    pub fields: BTreeSet<Field>,
    pub weight: i64,
    pub field_values: Vec<FieldValue>,
}

impl StringArrayEvaluator {
    pub fn new(compute: Compute<Vec<String>>, fields: BTreeSet<Field>, weight: i64) -> Self {
        StringArrayEvaluator {
            compute,
            fields,
            weight,
            field_values: Vec::new(),
        }
    }

    /// Static array of scalar strings.
    pub fn from_values(values: Vec<String>) -> Self {
        let field_values = values
            .iter()
            .map(|v| FieldValue {
                value: v.clone(),
                value_type: ValueType::Scalar,
                matcher: None,
            })
            .collect();
        StringArrayEvaluator {
            field_values,
            ..StringArrayEvaluator::new(Compute::Static(values), BTreeSet::new(), 0)
        }
    }

    /// Static array from literal members. Pattern and regexp members are
    /// compiled here; the first member that fails to compile fails the array.
    pub fn from_members(members: &[StringMember]) -> Result<Self, PatternError> {
        let field_values = members
            .iter()
            .map(FieldValue::from_member)
            .collect::<Result<Vec<_>, _>>()?;
        let values = field_values.iter().map(|fv| fv.value.clone()).collect();
        Ok(StringArrayEvaluator {
            field_values,
            ..StringArrayEvaluator::new(Compute::Static(values), BTreeSet::new(), 0)
        })
    }

    pub fn from_fn(
        field: impl Into<Field>,
        weight: i64,
        f: impl Fn(&Context<'_>) -> Vec<String> + Send + Sync + 'static,
    ) -> Self {
        StringArrayEvaluator::new(Compute::deferred(f), BTreeSet::from([field.into()]), weight)
    }

    pub fn eval(&self, ctx: &Context<'_>) -> Vec<String> {
        self.compute.eval(ctx)
    }
}

// =============================================================================
// Evaluator
// =============================================================================

/// A compiled, typed computation.
#[derive(Debug, Clone)]
pub enum Evaluator {
    Bool(BoolEvaluator),
    Int(IntEvaluator),
    String(StringEvaluator),
    BoolArray(BoolArrayEvaluator),
    IntArray(IntArrayEvaluator),
    StringArray(StringArrayEvaluator),
}

impl Evaluator {
    pub fn kind(&self) -> Kind {
        match self {
            Evaluator::Bool(_) => Kind::Bool,
            Evaluator::Int(_) => Kind::Int,
            Evaluator::String(_) => Kind::String,
            Evaluator::BoolArray(_) => Kind::BoolArray,
            Evaluator::IntArray(_) => Kind::IntArray,
            Evaluator::StringArray(_) => Kind::StringArray,
        }
    }

    pub fn fields(&self) -> &BTreeSet<Field> {
        match self {
            Evaluator::Bool(e) => &e.fields,
            Evaluator::Int(e) => &e.fields,
            Evaluator::String(e) => &e.fields,
            Evaluator::BoolArray(e) => &e.fields,
            Evaluator::IntArray(e) => &e.fields,
            Evaluator::StringArray(e) => &e.fields,
        }
    }

    pub fn weight(&self) -> i64 {
        match self {
            Evaluator::Bool(e) => e.weight,
            Evaluator::Int(e) => e.weight,
            Evaluator::String(e) => e.weight,
            Evaluator::BoolArray(e) => e.weight,
            Evaluator::IntArray(e) => e.weight,
            Evaluator::StringArray(e) => e.weight,
        }
    }

    pub fn is_static(&self) -> bool {
        match self {
            Evaluator::Bool(e) => e.compute.is_static(),
            Evaluator::Int(e) => e.compute.is_static(),
            Evaluator::String(e) => e.compute.is_static(),
            Evaluator::BoolArray(e) => e.compute.is_static(),
            Evaluator::IntArray(e) => e.compute.is_static(),
            Evaluator::StringArray(e) => e.compute.is_static(),
        }
    }
}

impl From<BoolEvaluator> for Evaluator {
    fn from(e: BoolEvaluator) -> Self {
        Evaluator::Bool(e)
    }
}

impl From<IntEvaluator> for Evaluator {
    fn from(e: IntEvaluator) -> Self {
        Evaluator::Int(e)
    }
}

impl From<StringEvaluator> for Evaluator {
    fn from(e: StringEvaluator) -> Self {
        Evaluator::String(e)
    }
}

impl From<BoolArrayEvaluator> for Evaluator {
    fn from(e: BoolArrayEvaluator) -> Self {
        Evaluator::BoolArray(e)
    }
}

impl From<IntArrayEvaluator> for Evaluator {
    fn from(e: IntArrayEvaluator) -> Self {
        Evaluator::IntArray(e)
    }
}

impl From<StringArrayEvaluator> for Evaluator {
    fn from(e: StringArrayEvaluator) -> Self {
        Evaluator::StringArray(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_map_folds_static() {
        let c = Compute::Static(20i64).map(|v| v + 1);
        assert_eq!(c.static_value(), Some(&21));
    }

    #[test]
    fn test_zip_with_deferred() {
        let v = json!({"n": 4});
        let ctx = Context::from_value(&v);
        let field = Compute::deferred(|ctx| {
            ctx.event()
                .get_field("n")
                .and_then(|v| v.as_i64())
                .unwrap_or(0)
        });
        let sum = field.zip_with(&Compute::Static(3i64), |a, b| a + b);
        assert!(!sum.is_static());
        assert_eq!(sum.eval(&ctx), 7);
    }

    #[test]
    fn test_string_array_from_members() {
        let arr = StringArrayEvaluator::from_members(&[
            StringMember::String("bash".into()),
            StringMember::Pattern("/usr/bin/*".into()),
            StringMember::Regexp("^z?sh$".into()),
        ])
        .unwrap();
        assert_eq!(arr.field_values.len(), 3);
        assert!(arr.field_values[0].matcher.is_none());
        assert!(arr.field_values[1].matcher.is_some());
        assert_eq!(arr.field_values[2].value_type, ValueType::Regexp);
        assert_eq!(
            arr.compute.static_value().map(Vec::len),
            Some(3),
            "raw values kept alongside matchers"
        );
    }

    #[test]
    fn test_string_array_member_failure_fails_array() {
        let err = StringArrayEvaluator::from_members(&[
            StringMember::String("ok".into()),
            StringMember::Regexp("(unclosed".into()),
        ])
        .unwrap_err();
        assert!(matches!(err, PatternError::Regex { .. }), "got: {err}");
    }

    #[test]
    fn test_compile_pattern_promotes_scalar() {
        let mut s = StringEvaluator::from_value("abc*");
        s.compile_pattern().unwrap();
        assert_eq!(s.value_type, ValueType::Pattern);
        let re = s.matcher.as_ref().unwrap();
        assert!(re.is_match("abcdef"));
        assert!(!re.is_match("xabc"));
    }

    #[test]
    fn test_compile_pattern_keeps_existing_matcher() {
        let mut s = StringEvaluator::from_pattern("^a.c$", ValueType::Regexp).unwrap();
        s.compile_pattern().unwrap();
        assert_eq!(s.value_type, ValueType::Regexp);
        assert!(s.matcher.as_ref().unwrap().is_match("abc"));
    }

    #[test]
    fn test_evaluator_kind_and_fields() {
        let e: Evaluator = StringEvaluator::from_fn("process.name", FUNCTION_WEIGHT, |_| {
            "bash".to_string()
        })
        .into();
        assert_eq!(e.kind(), Kind::String);
        assert!(e.fields().contains("process.name"));
        assert_eq!(e.weight(), FUNCTION_WEIGHT);
        assert!(!e.is_static());
        assert!(Evaluator::from(IntArrayEvaluator::from_values(vec![1])).is_static());
    }
}
