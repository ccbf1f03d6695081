//! Compiler: syntax tree → typed [`Evaluator`].
//!
//! Compilation is a single recursive pass. Each node compiles its children,
//! checks their kinds and picks the operator combinator. Every internal step
//! returns the evaluator together with the position errors about it should
//! point at: a node that only wraps another reports its child's position.

use rsecl_ast::{
    Array, ArrayComparison, ArrayKind, BitOperation, BooleanExpression, Comparison,
    ComparisonRhs, Expression, Position, Primary, PrimaryKind, ScalarComparison, Unary,
};

use crate::error::{CompileError, Kind, Result};
use crate::evaluator::{
    BoolEvaluator, Evaluator, IntArrayEvaluator, IntEvaluator, StringArrayEvaluator,
    StringEvaluator, ValueType,
};
use crate::operators::{self, CmpOp};
use crate::overrides::EQUALS_OP;
use crate::resolver;
use crate::state::{CompileOptions, CompileState};

// =============================================================================
// Operator tokens
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "&&" | "and" => Some(LogicalOp::And),
            "||" | "or" => Some(LogicalOp::Or),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BitOp {
    And,
    Or,
    Xor,
}

impl BitOp {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "&" => Some(BitOp::And),
            "|" => Some(BitOp::Or),
            "^" => Some(BitOp::Xor),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnaryOp {
    Not,
    Minus,
    BitNot,
}

impl UnaryOp {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "!" | "not" => Some(UnaryOp::Not),
            "-" => Some(UnaryOp::Minus),
            "^" => Some(UnaryOp::BitNot),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScalarOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Match,
    NotMatch,
}

impl ScalarOp {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "==" => Some(ScalarOp::Eq),
            "!=" => Some(ScalarOp::Ne),
            "<" => Some(ScalarOp::Lt),
            "<=" => Some(ScalarOp::Le),
            ">" => Some(ScalarOp::Gt),
            ">=" => Some(ScalarOp::Ge),
            "=~" => Some(ScalarOp::Match),
            "!~" => Some(ScalarOp::NotMatch),
            _ => None,
        }
    }

    fn ordering(self) -> Option<CmpOp> {
        match self {
            ScalarOp::Lt => Some(CmpOp::Lt),
            ScalarOp::Le => Some(CmpOp::Le),
            ScalarOp::Gt => Some(CmpOp::Gt),
            ScalarOp::Ge => Some(CmpOp::Ge),
            _ => None,
        }
    }

    fn is_negated(self) -> bool {
        matches!(self, ScalarOp::Ne | ScalarOp::NotMatch)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArrayOp {
    In,
    NotIn,
}

impl ArrayOp {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "in" => Some(ArrayOp::In),
            "notin" => Some(ArrayOp::NotIn),
            _ => None,
        }
    }
}

// =============================================================================
// Entry points
// =============================================================================

/// Compile a rule expression.
pub fn compile(
    expr: &BooleanExpression,
    opts: &CompileOptions,
    state: &mut CompileState<'_>,
) -> Result<Evaluator> {
    compile_expression(&expr.expression, opts, state)
}

/// Compile an expression node.
pub fn compile_expression(
    expr: &Expression,
    opts: &CompileOptions,
    state: &mut CompileState<'_>,
) -> Result<Evaluator> {
    expression_to_evaluator(expr, opts, state).map(|(evaluator, _)| evaluator)
}

/// Compile an array node.
pub fn compile_array(
    array: &Array,
    opts: &CompileOptions,
    state: &mut CompileState<'_>,
) -> Result<Evaluator> {
    array_to_evaluator(array, opts, state).map(|(evaluator, _)| evaluator)
}

// =============================================================================
// Kind checks
// =============================================================================

fn type_error(pos: Position, expected: Kind, found: &Evaluator) -> CompileError {
    CompileError::TypeMismatch {
        pos,
        expected,
        found: found.kind(),
    }
}

fn expect_bool(evaluator: Evaluator, pos: Position) -> Result<BoolEvaluator> {
    match evaluator {
        Evaluator::Bool(e) => Ok(e),
        other => Err(type_error(pos, Kind::Bool, &other)),
    }
}

fn expect_int(evaluator: Evaluator, pos: Position) -> Result<IntEvaluator> {
    match evaluator {
        Evaluator::Int(e) => Ok(e),
        other => Err(type_error(pos, Kind::Int, &other)),
    }
}

fn unknown_operator(pos: Position, op: &str) -> CompileError {
    CompileError::UnknownOperator {
        pos,
        op: op.to_string(),
    }
}

fn malformed(pos: Position, node: &'static str) -> CompileError {
    CompileError::MalformedNode {
        pos,
        node,
        reason: "operator and right operand must be given together",
    }
}

// =============================================================================
// Nodes
// =============================================================================

fn expression_to_evaluator(
    obj: &Expression,
    opts: &CompileOptions,
    state: &mut CompileState<'_>,
) -> Result<(Evaluator, Position)> {
    let (cmp, cmp_pos) = comparison_to_evaluator(&obj.comparison, opts, state)?;
    let (op, next) = match (&obj.op, &obj.next) {
        (None, None) => return Ok((cmp, cmp_pos)),
        (Some(op), Some(next)) => (op, next),
        _ => return Err(malformed(obj.pos, "expression")),
    };

    let lhs = expect_bool(cmp, cmp_pos)?;
    let (next, next_pos) = expression_to_evaluator(next, opts, state)?;
    let rhs = expect_bool(next, next_pos)?;

    let result = match LogicalOp::from_token(op) {
        Some(LogicalOp::Or) => operators::or(&lhs, &rhs),
        Some(LogicalOp::And) => operators::and(&lhs, &rhs),
        None => return Err(unknown_operator(obj.pos, op)),
    };
    Ok((result.into(), obj.pos))
}

fn bit_operation_to_evaluator(
    obj: &BitOperation,
    opts: &CompileOptions,
    state: &mut CompileState<'_>,
) -> Result<(Evaluator, Position)> {
    let (unary, unary_pos) = unary_to_evaluator(&obj.unary, opts, state)?;
    let (op, next) = match (&obj.op, &obj.next) {
        (None, None) => return Ok((unary, unary_pos)),
        (Some(op), Some(next)) => (op, next),
        _ => return Err(malformed(obj.pos, "bit operation")),
    };

    let lhs = expect_int(unary, unary_pos)?;
    let (next, next_pos) = bit_operation_to_evaluator(next, opts, state)?;
    let rhs = expect_int(next, next_pos)?;

    let result = match BitOp::from_token(op) {
        Some(BitOp::And) => operators::int_and(&lhs, &rhs),
        Some(BitOp::Or) => operators::int_or(&lhs, &rhs),
        Some(BitOp::Xor) => operators::int_xor(&lhs, &rhs),
        None => return Err(unknown_operator(obj.pos, op)),
    };
    Ok((result.into(), obj.pos))
}

fn comparison_to_evaluator(
    obj: &Comparison,
    opts: &CompileOptions,
    state: &mut CompileState<'_>,
) -> Result<(Evaluator, Position)> {
    let (lhs, lhs_pos) = bit_operation_to_evaluator(&obj.bit_operation, opts, state)?;
    let result = match &obj.rhs {
        None => return Ok((lhs, lhs_pos)),
        Some(ComparisonRhs::Array(cmp)) => {
            let (array, _) = array_to_evaluator(&cmp.array, opts, state)?;
            array_comparison(lhs, array, cmp)?
        }
        Some(ComparisonRhs::Scalar(cmp)) => {
            let (rhs, rhs_pos) = comparison_to_evaluator(&cmp.next, opts, state)?;
            scalar_comparison(lhs, rhs, rhs_pos, cmp, opts, state)?
        }
    };
    Ok((result.into(), obj.pos))
}

fn unary_to_evaluator(
    obj: &Unary,
    opts: &CompileOptions,
    state: &mut CompileState<'_>,
) -> Result<(Evaluator, Position)> {
    let (pos, op, operand) = match obj {
        Unary::Primary(primary) => return primary_to_evaluator(primary, opts, state),
        Unary::Op { pos, op, operand } => (*pos, op, operand),
    };
    let (inner, inner_pos) = unary_to_evaluator(operand, opts, state)?;
    let result: Evaluator = match UnaryOp::from_token(op) {
        Some(UnaryOp::Not) => operators::not(&expect_bool(inner, inner_pos)?).into(),
        Some(UnaryOp::Minus) => operators::minus(&expect_int(inner, inner_pos)?).into(),
        Some(UnaryOp::BitNot) => operators::int_not(&expect_int(inner, inner_pos)?).into(),
        None => return Err(unknown_operator(pos, op)),
    };
    Ok((result, pos))
}

fn primary_to_evaluator(
    obj: &Primary,
    opts: &CompileOptions,
    state: &mut CompileState<'_>,
) -> Result<(Evaluator, Position)> {
    let pos = obj.pos;
    let pattern = |value: &str, value_type| {
        StringEvaluator::from_pattern(value, value_type)
            .map(Evaluator::from)
            .map_err(|source| CompileError::InvalidPattern { pos, source })
    };
    let evaluator = match &obj.kind {
        PrimaryKind::Ident(name) => resolver::resolve_identifier(name, pos, opts, state)?,
        PrimaryKind::Number(n) => IntEvaluator::from_value(*n).into(),
        PrimaryKind::Duration(nanos) => IntEvaluator::from_duration(*nanos).into(),
        PrimaryKind::String(s) => StringEvaluator::from_value(s.as_str()).into(),
        PrimaryKind::Pattern(s) => pattern(s.as_str(), ValueType::Pattern)?,
        PrimaryKind::Regexp(s) => pattern(s.as_str(), ValueType::Regexp)?,
        PrimaryKind::SubExpression(expr) => return expression_to_evaluator(expr, opts, state),
        PrimaryKind::Array(array) => return array_to_evaluator(array, opts, state),
    };
    Ok((evaluator, pos))
}

fn array_to_evaluator(
    obj: &Array,
    opts: &CompileOptions,
    state: &mut CompileState<'_>,
) -> Result<(Evaluator, Position)> {
    let pos = obj.pos;
    let evaluator = match &obj.kind {
        ArrayKind::Numbers(values) if !values.is_empty() => {
            IntArrayEvaluator::from_values(values.clone()).into()
        }
        ArrayKind::Strings(members) if !members.is_empty() => {
            StringArrayEvaluator::from_members(members)
                .map_err(|source| CompileError::InvalidPattern { pos, source })?
                .into()
        }
        ArrayKind::Ident(name) => match state.get_macro(name) {
            Some(m) => {
                state.extend_fields(m.fields.iter().cloned());
                m.evaluator.clone()
            }
            None => resolver::resolve_identifier(name, pos, opts, state)?,
        },
        ArrayKind::Numbers(_) | ArrayKind::Strings(_) => {
            return Err(CompileError::UnknownArrayElement { pos });
        }
    };
    Ok((evaluator, pos))
}

// =============================================================================
// Comparisons
// =============================================================================

/// Array kind accepted on the right of `in` for a left operand of `kind`.
fn membership_kind(kind: Kind) -> Kind {
    match kind {
        Kind::Bool | Kind::BoolArray => Kind::BoolArray,
        Kind::Int | Kind::IntArray => Kind::IntArray,
        Kind::String | Kind::StringArray => Kind::StringArray,
    }
}

fn array_comparison(
    lhs: Evaluator,
    array: Evaluator,
    cmp: &ArrayComparison,
) -> Result<BoolEvaluator> {
    let contains = match (lhs, array) {
        (Evaluator::String(a), Evaluator::StringArray(b)) => operators::array_string_contains(&a, &b),
        (Evaluator::StringArray(a), Evaluator::StringArray(b)) => {
            operators::array_string_matches(&a, &b)
        }
        (Evaluator::Int(a), Evaluator::IntArray(b)) => operators::array_int_equals(&a, &b),
        (Evaluator::IntArray(a), Evaluator::IntArray(b)) => operators::array_int_matches(&a, &b),
        (Evaluator::Bool(a), Evaluator::BoolArray(b)) => operators::array_bool_contains(&a, &b),
        (lhs, array) => {
            return Err(type_error(cmp.pos, membership_kind(lhs.kind()), &array));
        }
    };
    match ArrayOp::from_token(&cmp.op) {
        Some(ArrayOp::In) => Ok(contains),
        Some(ArrayOp::NotIn) => Ok(operators::not(&contains)),
        None => Err(unknown_operator(cmp.pos, &cmp.op)),
    }
}

fn scalar_comparison(
    lhs: Evaluator,
    rhs: Evaluator,
    rhs_pos: Position,
    cmp: &ScalarComparison,
    opts: &CompileOptions,
    state: &mut CompileState<'_>,
) -> Result<BoolEvaluator> {
    let op = ScalarOp::from_token(&cmp.op);
    let unknown = || unknown_operator(cmp.pos, &cmp.op);
    let negate = |e: BoolEvaluator, op: ScalarOp| {
        if op.is_negated() {
            operators::not(&e)
        } else {
            e
        }
    };

    match lhs {
        Evaluator::Bool(a) => {
            let eq = match rhs {
                Evaluator::Bool(b) => operators::bool_equals(&a, &b),
                Evaluator::BoolArray(b) => operators::array_bool_contains(&a, &b),
                other => return Err(type_error(rhs_pos, Kind::Bool, &other)),
            };
            match op {
                Some(op @ (ScalarOp::Eq | ScalarOp::Ne)) => Ok(negate(eq, op)),
                _ => Err(unknown()),
            }
        }

        Evaluator::BoolArray(a) => {
            let eq = match rhs {
                Evaluator::Bool(b) => operators::array_bool_contains(&b, &a),
                other => return Err(type_error(rhs_pos, Kind::Bool, &other)),
            };
            match op {
                Some(op @ (ScalarOp::Eq | ScalarOp::Ne)) => Ok(negate(eq, op)),
                _ => Err(unknown()),
            }
        }

        Evaluator::String(a) => match (rhs, op) {
            (Evaluator::String(b), Some(ScalarOp::Eq)) => {
                string_equality(&a, &b, cmp.pos, opts, state)
            }
            // overrides only apply to `==`
            (Evaluator::String(b), Some(ScalarOp::Ne)) => {
                Ok(operators::not(&operators::string_equals(&a, &b)))
            }
            (Evaluator::String(b), Some(op @ (ScalarOp::Match | ScalarOp::NotMatch))) => {
                let b = static_pattern(b, rhs_pos)?;
                Ok(negate(operators::string_equals(&a, &b), op))
            }
            (Evaluator::StringArray(b), Some(op @ (ScalarOp::Eq | ScalarOp::Ne))) => {
                Ok(negate(operators::array_string_contains(&a, &b), op))
            }
            (Evaluator::String(_) | Evaluator::StringArray(_), _) => Err(unknown()),
            (other, _) => Err(type_error(rhs_pos, Kind::String, &other)),
        },

        Evaluator::StringArray(a) => match (rhs, op) {
            (Evaluator::String(b), Some(op @ (ScalarOp::Eq | ScalarOp::Ne))) => {
                Ok(negate(operators::array_string_contains(&b, &a), op))
            }
            (Evaluator::String(b), Some(op @ (ScalarOp::Match | ScalarOp::NotMatch))) => {
                let b = static_pattern(b, rhs_pos)?;
                Ok(negate(operators::array_string_contains(&b, &a), op))
            }
            (Evaluator::StringArray(b), Some(op @ (ScalarOp::Eq | ScalarOp::Ne))) => {
                Ok(negate(operators::array_string_matches(&a, &b), op))
            }
            (Evaluator::String(_) | Evaluator::StringArray(_), _) => Err(unknown()),
            (other, _) => Err(type_error(rhs_pos, Kind::String, &other)),
        },

        Evaluator::Int(a) => match (rhs, op.and_then(ScalarOp::ordering)) {
            (Evaluator::Int(b), Some(ord)) if a.is_duration => {
                Ok(operators::duration_compare(ord, &a, &b))
            }
            (Evaluator::Int(b), Some(ord)) => Ok(operators::int_compare(ord, &a, &b)),
            (Evaluator::IntArray(b), Some(ord)) if a.is_duration => {
                Ok(operators::array_duration_compare(ord, &a, &b))
            }
            (Evaluator::IntArray(b), Some(ord)) => Ok(operators::array_int_compare(ord, &a, &b)),
            (Evaluator::Int(b), None) => match op {
                Some(op @ (ScalarOp::Eq | ScalarOp::Ne)) => {
                    Ok(negate(operators::int_equals(&a, &b), op))
                }
                _ => Err(unknown()),
            },
            (Evaluator::IntArray(b), None) => match op {
                Some(op @ (ScalarOp::Eq | ScalarOp::Ne)) => {
                    Ok(negate(operators::array_int_equals(&a, &b), op))
                }
                _ => Err(unknown()),
            },
            (other, _) => Err(type_error(rhs_pos, Kind::Int, &other)),
        },

        Evaluator::IntArray(a) => match (rhs, op.and_then(ScalarOp::ordering)) {
            // some element of `a` op `b`, i.e. `b` mirrored op some element of `a`
            (Evaluator::Int(b), Some(ord)) => {
                Ok(operators::array_int_compare(ord.mirror(), &b, &a))
            }
            (Evaluator::Int(b), None) => match op {
                Some(op @ (ScalarOp::Eq | ScalarOp::Ne)) => {
                    Ok(negate(operators::array_int_equals(&b, &a), op))
                }
                _ => Err(unknown()),
            },
            (Evaluator::IntArray(b), None) => match op {
                Some(op @ (ScalarOp::Eq | ScalarOp::Ne)) => {
                    Ok(negate(operators::array_int_matches(&a, &b), op))
                }
                _ => Err(unknown()),
            },
            (Evaluator::IntArray(_), Some(_)) => Err(unknown()),
            (other, _) => Err(type_error(rhs_pos, Kind::Int, &other)),
        },
    }
}

/// `==` between strings, through the operands' overrides when present.
fn string_equality(
    a: &StringEvaluator,
    b: &StringEvaluator,
    pos: Position,
    opts: &CompileOptions,
    state: &mut CompileState<'_>,
) -> Result<BoolEvaluator> {
    let custom = [a, b]
        .iter()
        .find_map(|e| e.op_overrides.as_ref()?.get(EQUALS_OP).cloned());
    match custom {
        Some(f) => f(a, b, opts, state).map_err(|source| CompileError::Override {
            pos,
            op: EQUALS_OP.to_string(),
            source,
        }),
        None => Ok(operators::string_equals(a, b)),
    }
}

/// Right operand of `=~`: must be static, compiled as a pattern unless it
/// already is one.
fn static_pattern(mut operand: StringEvaluator, pos: Position) -> Result<StringEvaluator> {
    if !operand.compute.is_static() {
        return Err(CompileError::NonStaticPattern {
            pos,
            field: operand.field_name(),
        });
    }
    operand
        .compile_pattern()
        .map_err(|source| CompileError::InvalidPattern { pos, source })?;
    Ok(operand)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json_model::{FieldDecl, FieldKind, JsonModel};
    use rsecl_ast::StringMember;

    fn model() -> JsonModel {
        JsonModel::new()
            .with_field("process.name", FieldDecl::new(FieldKind::String))
            .with_field("process.pid", FieldDecl::new(FieldKind::Int))
            .with_field("process.is_root", FieldDecl::new(FieldKind::Bool))
    }

    fn compile_expr(expr: impl Into<BooleanExpression>) -> Result<Evaluator> {
        let model = model();
        let opts = CompileOptions::default();
        let mut state = CompileState::new(&model, &opts.macros);
        compile(&expr.into(), &opts, &mut state)
    }

    #[test]
    fn test_literals_fold() {
        let e = compile_expr(Comparison::scalar(Primary::number(3), ">", Primary::number(2))).unwrap();
        assert!(e.is_static());
        let Evaluator::Bool(b) = e else { panic!("expected bool") };
        assert_eq!(b.static_value(), Some(true));
    }

    #[test]
    fn test_type_error_points_at_literal() {
        let err = compile_expr(Comparison::scalar(
            Primary::string("a").at(Position::new(1, 1)),
            "==",
            Primary::number(3).at(Position::new(1, 8)),
        ))
        .unwrap_err();
        assert!(matches!(
            err,
            CompileError::TypeMismatch { expected: Kind::String, found: Kind::Int, .. }
        ));
        assert_eq!(err.position(), Position::new(1, 8));
    }

    #[test]
    fn test_unknown_scalar_operator() {
        let err = compile_expr(Comparison::scalar(Primary::number(1), "<>", Primary::number(2)))
            .unwrap_err();
        assert!(matches!(err, CompileError::UnknownOperator { ref op, .. } if op == "<>"));
    }

    #[test]
    fn test_ordering_on_strings_is_unknown_operator() {
        let err = compile_expr(Comparison::scalar(
            Primary::ident("process.name"),
            "<",
            Primary::string("b"),
        ))
        .unwrap_err();
        assert!(matches!(err, CompileError::UnknownOperator { .. }), "got: {err}");
    }

    #[test]
    fn test_logical_requires_bool() {
        let err = compile_expr(Expression::and(
            Primary::number(1).at(Position::new(1, 1)),
            Primary::ident("process.is_root"),
        ))
        .unwrap_err();
        assert!(matches!(err, CompileError::TypeMismatch { expected: Kind::Bool, found: Kind::Int, .. }));
        assert_eq!(err.position(), Position::new(1, 1));
    }

    #[test]
    fn test_empty_array_is_unknown_element() {
        let err = compile_expr(Comparison::array(
            Primary::ident("process.pid"),
            "in",
            Array::numbers(Vec::new()),
        ))
        .unwrap_err();
        assert!(matches!(err, CompileError::UnknownArrayElement { .. }));
    }

    #[test]
    fn test_membership_type_mismatch() {
        let err = compile_expr(Comparison::array(
            Primary::ident("process.pid"),
            "in",
            Array::strings([StringMember::String("a".into())]),
        ))
        .unwrap_err();
        assert!(matches!(
            err,
            CompileError::TypeMismatch { expected: Kind::IntArray, found: Kind::StringArray, .. }
        ));
    }

    #[test]
    fn test_match_requires_static_rhs() {
        let err = compile_expr(Comparison::scalar(
            Primary::string("bash"),
            "=~",
            Primary::ident("process.name"),
        ))
        .unwrap_err();
        assert!(matches!(err, CompileError::NonStaticPattern { ref field, .. } if field == "process.name"));
    }

    #[test]
    fn test_malformed_expression() {
        let mut expr = Expression::from(Primary::ident("process.is_root"));
        expr.op = Some("&&".into());
        let err = compile_expr(expr).unwrap_err();
        assert!(matches!(err, CompileError::MalformedNode { node: "expression", .. }));
    }

    #[test]
    fn test_fields_collected() {
        let model = model();
        let opts = CompileOptions::default();
        let mut state = CompileState::new(&model, &opts.macros);
        let expr: BooleanExpression = Expression::and(
            Comparison::scalar(Primary::ident("process.name"), "==", Primary::string("bash")),
            Comparison::scalar(Primary::ident("process.pid"), ">", Primary::number(1)),
        )
        .into();
        compile(&expr, &opts, &mut state).unwrap();
        let fields: Vec<_> = state.fields().iter().map(String::as_str).collect();
        assert_eq!(fields, ["process.name", "process.pid"]);
    }
}
