//! Operator combinators over typed evaluators.
//!
//! Every combinator folds to a static result when all of its operands are
//! static, and otherwise returns a deferred evaluator that reads only its
//! operands. Fields are the union of the operands' fields; weights add up.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::evaluator::{
    BoolArrayEvaluator, BoolEvaluator, Compute, IN_ARRAY_WEIGHT, IntArrayEvaluator,
    IntEvaluator, REGEXP_WEIGHT, StringArrayEvaluator, StringEvaluator,
};
use crate::model::Field;
use crate::pattern::StringMatcherSet;

fn union(a: &BTreeSet<Field>, b: &BTreeSet<Field>) -> BTreeSet<Field> {
    a.union(b).cloned().collect()
}

/// Sum of weights, saturating at `i64::MAX`.
fn add_weights(weights: &[i64]) -> i64 {
    weights.iter().fold(0i64, |acc, w| acc.saturating_add(*w))
}

// =============================================================================
// Boolean
// =============================================================================

pub fn not(a: &BoolEvaluator) -> BoolEvaluator {
    BoolEvaluator::new(a.compute.map(|v| !v), a.fields.clone(), a.weight)
}

/// Logical OR. The right operand is not evaluated when the left is true.
pub fn or(a: &BoolEvaluator, b: &BoolEvaluator) -> BoolEvaluator {
    let compute = match (&a.compute, &b.compute) {
        (Compute::Static(true), _) | (_, Compute::Static(true)) => Compute::Static(true),
        (Compute::Static(false), other) | (other, Compute::Static(false)) => other.clone(),
        (Compute::Deferred(fa), Compute::Deferred(fb)) => {
            let (fa, fb) = (Arc::clone(fa), Arc::clone(fb));
            Compute::deferred(move |ctx| fa(ctx) || fb(ctx))
        }
    };
    let weight = add_weights(&[a.weight, b.weight]);
    BoolEvaluator::new(compute, union(&a.fields, &b.fields), weight)
}

/// Logical AND. The right operand is not evaluated when the left is false.
pub fn and(a: &BoolEvaluator, b: &BoolEvaluator) -> BoolEvaluator {
    let compute = match (&a.compute, &b.compute) {
        (Compute::Static(false), _) | (_, Compute::Static(false)) => Compute::Static(false),
        (Compute::Static(true), other) | (other, Compute::Static(true)) => other.clone(),
        (Compute::Deferred(fa), Compute::Deferred(fb)) => {
            let (fa, fb) = (Arc::clone(fa), Arc::clone(fb));
            Compute::deferred(move |ctx| fa(ctx) && fb(ctx))
        }
    };
    let weight = add_weights(&[a.weight, b.weight]);
    BoolEvaluator::new(compute, union(&a.fields, &b.fields), weight)
}

pub fn bool_equals(a: &BoolEvaluator, b: &BoolEvaluator) -> BoolEvaluator {
    BoolEvaluator::new(
        a.compute.zip_with(&b.compute, |x, y| x == y),
        union(&a.fields, &b.fields),
        add_weights(&[a.weight, b.weight]),
    )
}

// =============================================================================
// Integer
// =============================================================================

fn int_binary(
    a: &IntEvaluator,
    b: &IntEvaluator,
    f: impl Fn(i64, i64) -> i64 + Send + Sync + 'static,
) -> IntEvaluator {
    IntEvaluator::new(
        a.compute.zip_with(&b.compute, move |x, y| f(*x, *y)),
        union(&a.fields, &b.fields),
        add_weights(&[a.weight, b.weight]),
    )
}

pub fn int_and(a: &IntEvaluator, b: &IntEvaluator) -> IntEvaluator {
    int_binary(a, b, |x, y| x & y)
}

pub fn int_or(a: &IntEvaluator, b: &IntEvaluator) -> IntEvaluator {
    int_binary(a, b, |x, y| x | y)
}

pub fn int_xor(a: &IntEvaluator, b: &IntEvaluator) -> IntEvaluator {
    int_binary(a, b, |x, y| x ^ y)
}

/// Arithmetic negation. A negated duration is still a duration.
pub fn minus(a: &IntEvaluator) -> IntEvaluator {
    IntEvaluator::new(a.compute.map(|v| v.wrapping_neg()), a.fields.clone(), a.weight)
        .with_duration(a.is_duration)
}

/// Bitwise complement.
pub fn int_not(a: &IntEvaluator) -> IntEvaluator {
    IntEvaluator::new(a.compute.map(|v| !v), a.fields.clone(), a.weight)
}

pub fn int_equals(a: &IntEvaluator, b: &IntEvaluator) -> BoolEvaluator {
    BoolEvaluator::new(
        a.compute.zip_with(&b.compute, |x, y| x == y),
        union(&a.fields, &b.fields),
        add_weights(&[a.weight, b.weight]),
    )
}

/// Ordering comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn apply(self, a: i64, b: i64) -> bool {
        match self {
            CmpOp::Lt => a < b,
            CmpOp::Le => a <= b,
            CmpOp::Gt => a > b,
            CmpOp::Ge => a >= b,
        }
    }

    /// The operator with its operands swapped: `a < b` is `b > a`.
    pub fn mirror(self) -> Self {
        match self {
            CmpOp::Lt => CmpOp::Gt,
            CmpOp::Le => CmpOp::Ge,
            CmpOp::Gt => CmpOp::Lt,
            CmpOp::Ge => CmpOp::Le,
        }
    }
}

pub fn int_compare(op: CmpOp, a: &IntEvaluator, b: &IntEvaluator) -> BoolEvaluator {
    BoolEvaluator::new(
        a.compute.zip_with(&b.compute, move |x, y| op.apply(*x, *y)),
        union(&a.fields, &b.fields),
        add_weights(&[a.weight, b.weight]),
    )
}

/// Compare against a duration.
///
/// A static left operand is compared as is. A deferred left operand is a
/// timestamp; its elapsed time at evaluation is compared instead.
pub fn duration_compare(op: CmpOp, a: &IntEvaluator, b: &IntEvaluator) -> BoolEvaluator {
    let compute = match &a.compute {
        Compute::Static(_) => a.compute.zip_with(&b.compute, move |x, y| op.apply(*x, *y)),
        Compute::Deferred(fa) => {
            let (fa, b) = (Arc::clone(fa), b.compute.clone());
            Compute::deferred(move |ctx| op.apply(ctx.now().saturating_sub(fa(ctx)), b.eval(ctx)))
        }
    };
    let weight = add_weights(&[a.weight, b.weight]);
    BoolEvaluator::new(compute, union(&a.fields, &b.fields), weight)
}

// =============================================================================
// String
// =============================================================================

/// String equality. A static pattern or regexp on either side turns the
/// comparison into a match, the right side taking precedence.
pub fn string_equals(a: &StringEvaluator, b: &StringEvaluator) -> BoolEvaluator {
    let fields = union(&a.fields, &b.fields);
    let weight = add_weights(&[a.weight, b.weight]);
    if let Some(re) = b.matcher.clone() {
        let compute = a.compute.map(move |s| re.is_match(s));
        return BoolEvaluator::new(compute, fields, add_weights(&[weight, REGEXP_WEIGHT]));
    }
    if let Some(re) = a.matcher.clone() {
        let compute = b.compute.map(move |s| re.is_match(s));
        return BoolEvaluator::new(compute, fields, add_weights(&[weight, REGEXP_WEIGHT]));
    }
    BoolEvaluator::new(a.compute.zip_with(&b.compute, |x, y| x == y), fields, weight)
}

// =============================================================================
// Arrays
// =============================================================================

/// True when `a` equals any element of `b`.
pub fn array_bool_contains(a: &BoolEvaluator, b: &BoolArrayEvaluator) -> BoolEvaluator {
    BoolEvaluator::new(
        a.compute.zip_with(&b.compute, |x, values| values.contains(x)),
        union(&a.fields, &b.fields),
        add_weights(&[a.weight, b.weight, IN_ARRAY_WEIGHT]),
    )
}

/// True when `a` equals, or as a pattern matches, any element of `b`.
pub fn array_string_contains(a: &StringEvaluator, b: &StringArrayEvaluator) -> BoolEvaluator {
    let fields = union(&a.fields, &b.fields);
    if let Some(re) = a.matcher.clone() {
        let compute = b.compute.map(move |values| values.iter().any(|v| re.is_match(v)));
        let weight = add_weights(&[a.weight, b.weight, REGEXP_WEIGHT]);
        return BoolEvaluator::new(compute, fields, weight);
    }
    if let Compute::Static(values) = &b.compute {
        let set = if b.field_values.is_empty() {
            StringMatcherSet::from_values(values.as_slice())
        } else {
            StringMatcherSet::from_field_values(&b.field_values)
        };
        let weight = add_weights(&[a.weight, set.weight()]);
        let compute = a.compute.map(move |s| set.contains(s));
        return BoolEvaluator::new(compute, fields, weight);
    }
    BoolEvaluator::new(
        a.compute
            .zip_with(&b.compute, |s, values| values.iter().any(|v| v == s)),
        fields,
        add_weights(&[a.weight, b.weight, IN_ARRAY_WEIGHT]),
    )
}

/// True when any element of `a` equals, or matches, any element of `b`.
pub fn array_string_matches(a: &StringArrayEvaluator, b: &StringArrayEvaluator) -> BoolEvaluator {
    let fields = union(&a.fields, &b.fields);
    let literal_set = |e: &StringArrayEvaluator| match &e.compute {
        Compute::Static(values) if e.field_values.is_empty() => {
            Some(StringMatcherSet::from_values(values.as_slice()))
        }
        Compute::Static(_) => Some(StringMatcherSet::from_field_values(&e.field_values)),
        Compute::Deferred(_) => None,
    };
    let (set, other) = match (literal_set(b), literal_set(a)) {
        (Some(set), _) => (set, a),
        (None, Some(set)) => (set, b),
        (None, None) => {
            return BoolEvaluator::new(
                a.compute.zip_with(&b.compute, |xs, ys| xs.iter().any(|x| ys.contains(x))),
                fields,
                add_weights(&[a.weight, b.weight, IN_ARRAY_WEIGHT]),
            );
        }
    };
    let weight = add_weights(&[other.weight, set.weight()]);
    let compute = other
        .compute
        .map(move |values| values.iter().any(|v| set.contains(v)));
    BoolEvaluator::new(compute, fields, weight)
}

/// True when `a` equals any element of `b`.
pub fn array_int_equals(a: &IntEvaluator, b: &IntArrayEvaluator) -> BoolEvaluator {
    BoolEvaluator::new(
        a.compute.zip_with(&b.compute, |x, values| values.contains(x)),
        union(&a.fields, &b.fields),
        add_weights(&[a.weight, b.weight, IN_ARRAY_WEIGHT]),
    )
}

/// True when the two arrays share an element.
pub fn array_int_matches(a: &IntArrayEvaluator, b: &IntArrayEvaluator) -> BoolEvaluator {
    BoolEvaluator::new(
        a.compute
            .zip_with(&b.compute, |xs, ys| xs.iter().any(|x| ys.contains(x))),
        union(&a.fields, &b.fields),
        add_weights(&[a.weight, b.weight, IN_ARRAY_WEIGHT]),
    )
}

/// True when `a op v` holds for some element `v` of `b`.
pub fn array_int_compare(op: CmpOp, a: &IntEvaluator, b: &IntArrayEvaluator) -> BoolEvaluator {
    BoolEvaluator::new(
        a.compute
            .zip_with(&b.compute, move |x, values| values.iter().any(|v| op.apply(*x, *v))),
        union(&a.fields, &b.fields),
        add_weights(&[a.weight, b.weight, IN_ARRAY_WEIGHT]),
    )
}

/// Duration counterpart of [`array_int_compare`]; see [`duration_compare`].
pub fn array_duration_compare(
    op: CmpOp,
    a: &IntEvaluator,
    b: &IntArrayEvaluator,
) -> BoolEvaluator {
    let compute = match &a.compute {
        Compute::Static(_) => a
            .compute
            .zip_with(&b.compute, move |x, values| values.iter().any(|v| op.apply(*x, *v))),
        Compute::Deferred(fa) => {
            let (fa, b) = (Arc::clone(fa), b.compute.clone());
            Compute::deferred(move |ctx| {
                let elapsed = ctx.now().saturating_sub(fa(ctx));
                b.eval(ctx).iter().any(|v| op.apply(elapsed, *v))
            })
        }
    };
    BoolEvaluator::new(
        compute,
        union(&a.fields, &b.fields),
        add_weights(&[a.weight, b.weight, IN_ARRAY_WEIGHT]),
    )
}
