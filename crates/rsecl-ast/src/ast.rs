//! Syntax tree for rule expressions.
//!
//! One node type per grammar production, from loosest to tightest binding:
//!
//! ```text
//! BooleanExpression → Expression (|| && or and)
//!                   → Comparison (== != < <= > >= =~ !~ | in notin)
//!                   → BitOperation (& | ^)
//!                   → Unary (! not - ^)
//!                   → Primary (ident, literal, (sub-expression), [array])
//! ```
//!
//! Operator tokens are kept as the text the grammar matched, so a token the
//! compiler does not know surfaces as a typed error instead of being lost at
//! parse time. Every node carries the [`Position`] of its first token.

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Positions
// =============================================================================

/// Location of a token in the rule source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Byte offset from the start of the rule text.
    #[serde(default)]
    pub offset: usize,
    /// 1-based line.
    pub line: usize,
    /// 1-based column.
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Position {
            offset: 0,
            line,
            column,
        }
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

// =============================================================================
// Expression levels
// =============================================================================

/// Root of a parsed rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BooleanExpression {
    #[serde(default)]
    pub pos: Position,
    pub expression: Expression,
}

/// Logical level: `comparison (op expression)?`, right-recursive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    #[serde(default)]
    pub pos: Position,
    pub comparison: Comparison,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<Box<Expression>>,
}

/// Comparison level: a bit operation optionally compared to a scalar or an array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    #[serde(default)]
    pub pos: Position,
    pub bit_operation: BitOperation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rhs: Option<ComparisonRhs>,
}

/// Right-hand side of a [`Comparison`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonRhs {
    Scalar(ScalarComparison),
    Array(ArrayComparison),
}

/// `op comparison` with a scalar operator (`==`, `!=`, `<`, `=~`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarComparison {
    #[serde(default)]
    pub pos: Position,
    pub op: String,
    pub next: Box<Comparison>,
}

/// `op array` with a membership operator (`in`, `notin`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayComparison {
    #[serde(default)]
    pub pos: Position,
    pub op: String,
    pub array: Array,
}

/// Bitwise level: `unary (op bit_operation)?`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BitOperation {
    #[serde(default)]
    pub pos: Position,
    pub unary: Unary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<Box<BitOperation>>,
}

/// Prefix operator applied to a unary, or a primary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unary {
    Op {
        #[serde(default)]
        pos: Position,
        op: String,
        operand: Box<Unary>,
    },
    Primary(Primary),
}

/// Tightest-binding operand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Primary {
    #[serde(default)]
    pub pos: Position,
    pub kind: PrimaryKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryKind {
    /// Field, constant, macro or iterator reference, e.g. `process.ancestors[_].name`.
    Ident(String),
    Number(i64),
    /// Duration literal in nanoseconds.
    Duration(i64),
    String(String),
    /// Glob-like pattern literal, `~"/usr/bin/*"`.
    Pattern(String),
    /// Regular expression literal, `r"^ba(sh|tch)$"`.
    Regexp(String),
    SubExpression(Box<Expression>),
    Array(Array),
}

/// Array literal or a reference to an array-valued identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Array {
    #[serde(default)]
    pub pos: Position,
    pub kind: ArrayKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrayKind {
    Numbers(Vec<i64>),
    Strings(Vec<StringMember>),
    Ident(String),
}

/// Member of a string array literal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringMember {
    String(String),
    Pattern(String),
    Regexp(String),
}

impl StringMember {
    pub fn value(&self) -> &str {
        match self {
            StringMember::String(s) | StringMember::Pattern(s) | StringMember::Regexp(s) => s,
        }
    }
}

// =============================================================================
// Constructors
// =============================================================================

impl Primary {
    fn new(kind: PrimaryKind) -> Self {
        Primary {
            pos: Position::default(),
            kind,
        }
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Primary::new(PrimaryKind::Ident(name.into()))
    }

    pub fn number(n: i64) -> Self {
        Primary::new(PrimaryKind::Number(n))
    }

    pub fn duration(nanos: i64) -> Self {
        Primary::new(PrimaryKind::Duration(nanos))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Primary::new(PrimaryKind::String(s.into()))
    }

    pub fn pattern(s: impl Into<String>) -> Self {
        Primary::new(PrimaryKind::Pattern(s.into()))
    }

    pub fn regexp(s: impl Into<String>) -> Self {
        Primary::new(PrimaryKind::Regexp(s.into()))
    }

    pub fn sub_expression(expr: impl Into<Expression>) -> Self {
        let expr = expr.into();
        Primary {
            pos: expr.pos,
            kind: PrimaryKind::SubExpression(Box::new(expr)),
        }
    }

    pub fn array(array: Array) -> Self {
        Primary {
            pos: array.pos,
            kind: PrimaryKind::Array(array),
        }
    }

    pub fn at(mut self, pos: Position) -> Self {
        self.pos = pos;
        self
    }
}

impl Array {
    pub fn numbers(values: impl IntoIterator<Item = i64>) -> Self {
        Array {
            pos: Position::default(),
            kind: ArrayKind::Numbers(values.into_iter().collect()),
        }
    }

    pub fn strings(members: impl IntoIterator<Item = StringMember>) -> Self {
        Array {
            pos: Position::default(),
            kind: ArrayKind::Strings(members.into_iter().collect()),
        }
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Array {
            pos: Position::default(),
            kind: ArrayKind::Ident(name.into()),
        }
    }

    pub fn at(mut self, pos: Position) -> Self {
        self.pos = pos;
        self
    }
}

impl Unary {
    pub fn op(op: impl Into<String>, operand: impl Into<Unary>) -> Self {
        let operand = operand.into();
        Unary::Op {
            pos: operand.pos(),
            op: op.into(),
            operand: Box::new(operand),
        }
    }

    /// `!operand`
    pub fn not(operand: impl Into<Unary>) -> Self {
        Unary::op("!", operand)
    }

    /// `-operand`
    pub fn minus(operand: impl Into<Unary>) -> Self {
        Unary::op("-", operand)
    }

    pub fn pos(&self) -> Position {
        match self {
            Unary::Op { pos, .. } => *pos,
            Unary::Primary(p) => p.pos,
        }
    }
}

impl BitOperation {
    pub fn binary(
        lhs: impl Into<Unary>,
        op: impl Into<String>,
        rhs: impl Into<BitOperation>,
    ) -> Self {
        let unary = lhs.into();
        BitOperation {
            pos: unary.pos(),
            unary,
            op: Some(op.into()),
            next: Some(Box::new(rhs.into())),
        }
    }
}

impl Comparison {
    /// `lhs op rhs` with a scalar operator.
    pub fn scalar(
        lhs: impl Into<BitOperation>,
        op: impl Into<String>,
        rhs: impl Into<Comparison>,
    ) -> Self {
        let bit_operation = lhs.into();
        let next = rhs.into();
        Comparison {
            pos: bit_operation.pos,
            bit_operation,
            rhs: Some(ComparisonRhs::Scalar(ScalarComparison {
                pos: next.pos,
                op: op.into(),
                next: Box::new(next),
            })),
        }
    }

    /// `lhs op array` with a membership operator.
    pub fn array(lhs: impl Into<BitOperation>, op: impl Into<String>, array: Array) -> Self {
        let bit_operation = lhs.into();
        Comparison {
            pos: bit_operation.pos,
            bit_operation,
            rhs: Some(ComparisonRhs::Array(ArrayComparison {
                pos: array.pos,
                op: op.into(),
                array,
            })),
        }
    }
}

impl Expression {
    pub fn binary(
        lhs: impl Into<Comparison>,
        op: impl Into<String>,
        rhs: impl Into<Expression>,
    ) -> Self {
        let comparison = lhs.into();
        Expression {
            pos: comparison.pos,
            comparison,
            op: Some(op.into()),
            next: Some(Box::new(rhs.into())),
        }
    }

    /// `lhs && rhs`
    pub fn and(lhs: impl Into<Comparison>, rhs: impl Into<Expression>) -> Self {
        Expression::binary(lhs, "&&", rhs)
    }

    /// `lhs || rhs`
    pub fn or(lhs: impl Into<Comparison>, rhs: impl Into<Expression>) -> Self {
        Expression::binary(lhs, "||", rhs)
    }
}

// -----------------------------------------------------------------------------
// Lifting a node into the looser levels that wrap it
// -----------------------------------------------------------------------------

impl From<Primary> for Unary {
    fn from(p: Primary) -> Self {
        Unary::Primary(p)
    }
}

impl From<Unary> for BitOperation {
    fn from(unary: Unary) -> Self {
        BitOperation {
            pos: unary.pos(),
            unary,
            op: None,
            next: None,
        }
    }
}

impl From<Primary> for BitOperation {
    fn from(p: Primary) -> Self {
        Unary::from(p).into()
    }
}

impl From<BitOperation> for Comparison {
    fn from(bit_operation: BitOperation) -> Self {
        Comparison {
            pos: bit_operation.pos,
            bit_operation,
            rhs: None,
        }
    }
}

impl From<Unary> for Comparison {
    fn from(u: Unary) -> Self {
        BitOperation::from(u).into()
    }
}

impl From<Primary> for Comparison {
    fn from(p: Primary) -> Self {
        BitOperation::from(p).into()
    }
}

impl From<Comparison> for Expression {
    fn from(comparison: Comparison) -> Self {
        Expression {
            pos: comparison.pos,
            comparison,
            op: None,
            next: None,
        }
    }
}

impl From<BitOperation> for Expression {
    fn from(b: BitOperation) -> Self {
        Comparison::from(b).into()
    }
}

impl From<Unary> for Expression {
    fn from(u: Unary) -> Self {
        Comparison::from(u).into()
    }
}

impl From<Primary> for Expression {
    fn from(p: Primary) -> Self {
        Comparison::from(p).into()
    }
}

impl From<Expression> for BooleanExpression {
    fn from(expression: Expression) -> Self {
        BooleanExpression {
            pos: expression.pos,
            expression,
        }
    }
}

impl From<Comparison> for BooleanExpression {
    fn from(c: Comparison) -> Self {
        Expression::from(c).into()
    }
}

impl From<Primary> for BooleanExpression {
    fn from(p: Primary) -> Self {
        Expression::from(p).into()
    }
}

// =============================================================================
// Display: canonical rule text
// =============================================================================

impl fmt::Display for BooleanExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expression)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.comparison)?;
        if let (Some(op), Some(next)) = (&self.op, &self.next) {
            write!(f, " {op} {next}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bit_operation)?;
        match &self.rhs {
            Some(ComparisonRhs::Scalar(s)) => write!(f, " {} {}", s.op, s.next),
            Some(ComparisonRhs::Array(a)) => write!(f, " {} {}", a.op, a.array),
            None => Ok(()),
        }
    }
}

impl fmt::Display for BitOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.unary)?;
        if let (Some(op), Some(next)) = (&self.op, &self.next) {
            write!(f, " {op} {next}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Unary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unary::Op { op, operand, .. } if op.chars().all(char::is_alphabetic) => {
                write!(f, "{op} {operand}")
            }
            Unary::Op { op, operand, .. } => write!(f, "{op}{operand}"),
            Unary::Primary(p) => write!(f, "{p}"),
        }
    }
}

impl fmt::Display for Primary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            PrimaryKind::Ident(name) => write!(f, "{name}"),
            PrimaryKind::Number(n) => write!(f, "{n}"),
            PrimaryKind::Duration(nanos) => write!(f, "{}", format_duration(*nanos)),
            PrimaryKind::String(s) => write!(f, "{s:?}"),
            PrimaryKind::Pattern(s) => write!(f, "~{s:?}"),
            PrimaryKind::Regexp(s) => write!(f, "r{s:?}"),
            PrimaryKind::SubExpression(expr) => write!(f, "({expr})"),
            PrimaryKind::Array(array) => write!(f, "{array}"),
        }
    }
}

impl fmt::Display for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ArrayKind::Ident(name) => write!(f, "{name}"),
            ArrayKind::Numbers(numbers) => {
                let items: Vec<String> = numbers.iter().map(|n| n.to_string()).collect();
                write!(f, "[{}]", items.join(", "))
            }
            ArrayKind::Strings(members) => {
                let items: Vec<String> = members.iter().map(|m| m.to_string()).collect();
                write!(f, "[{}]", items.join(", "))
            }
        }
    }
}

impl fmt::Display for StringMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StringMember::String(s) => write!(f, "{s:?}"),
            StringMember::Pattern(s) => write!(f, "~{s:?}"),
            StringMember::Regexp(s) => write!(f, "r{s:?}"),
        }
    }
}

/// Duration units from largest to smallest, in nanoseconds.
const DURATION_UNITS: [(&str, i64); 6] = [
    ("h", 3_600_000_000_000),
    ("m", 60_000_000_000),
    ("s", 1_000_000_000),
    ("ms", 1_000_000),
    ("us", 1_000),
    ("ns", 1),
];

/// Render nanoseconds with the largest unit that divides them exactly.
pub fn format_duration(nanos: i64) -> String {
    if nanos == 0 {
        return "0s".to_string();
    }
    for (suffix, unit) in DURATION_UNITS {
        if nanos % unit == 0 {
            return format!("{}{suffix}", nanos / unit);
        }
    }
    format!("{nanos}ns")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_comparison() {
        let expr = Expression::and(
            Comparison::scalar(Primary::ident("process.name"), "==", Primary::string("bash")),
            Comparison::array(
                Primary::ident("process.uid"),
                "in",
                Array::numbers([0, 1000]),
            ),
        );
        assert_eq!(
            expr.to_string(),
            r#"process.name == "bash" && process.uid in [0, 1000]"#
        );
    }

    #[test]
    fn test_display_literals() {
        let arr = Array::strings([
            StringMember::String("a".into()),
            StringMember::Pattern("/tmp/*".into()),
            StringMember::Regexp("^x$".into()),
        ]);
        assert_eq!(arr.to_string(), r#"["a", ~"/tmp/*", r"^x$"]"#);
        assert_eq!(Primary::duration(5_000_000_000).to_string(), "5s");
        assert_eq!(Primary::duration(1_500_000_000).to_string(), "1500ms");
    }

    #[test]
    fn test_display_unary() {
        let not_word = Unary::op("not", Primary::ident("a"));
        assert_eq!(not_word.to_string(), "not a");
        let bang = Unary::not(Primary::sub_expression(Expression::or(
            Primary::ident("a"),
            Primary::ident("b"),
        )));
        assert_eq!(bang.to_string(), "!(a || b)");
        let bits = BitOperation::binary(Unary::op("^", Primary::number(4)), "&", Primary::number(1));
        assert_eq!(bits.to_string(), "^4 & 1");
    }

    #[test]
    fn test_positions_follow_leftmost_operand() {
        let pos = Position::new(1, 5);
        let cmp = Comparison::scalar(
            Primary::ident("a").at(pos),
            "==",
            Primary::number(3).at(Position::new(1, 10)),
        );
        assert_eq!(cmp.pos, pos);
        match &cmp.rhs {
            Some(ComparisonRhs::Scalar(s)) => assert_eq!(s.next.pos, Position::new(1, 10)),
            other => panic!("unexpected rhs: {other:?}"),
        }
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(7_200_000_000_000), "2h");
        assert_eq!(format_duration(90_000_000_000), "90s");
        assert_eq!(format_duration(1_001), "1001ns");
    }

    #[test]
    fn test_position_display() {
        assert_eq!(Position::new(3, 14).with_offset(40).to_string(), "3:14");
    }
}
