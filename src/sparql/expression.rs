//! Filter expressions
//!
//! Expressions evaluate to a [`Term`] against one [`QuerySolution`]; booleans
//! are `xsd:boolean` literals. Comparisons understand numeric, string,
//! boolean, `xsd:date` and `xsd:dateTime` literals. Anything else compares by
//! term identity or raises [`EvaluationError::TypeMismatch`].

use super::binding::QuerySolution;
use crate::rdf::{Literal, Term, Variable};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use regex::{Regex, RegexBuilder};
use std::cmp::Ordering;
use thiserror::Error;

const XSD: &str = "http://www.w3.org/2001/XMLSchema#";
const RDF_LANG_STRING: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";

const INTEGER_TYPES: &[&str] = &[
    "integer",
    "int",
    "long",
    "short",
    "byte",
    "nonNegativeInteger",
    "positiveInteger",
    "nonPositiveInteger",
    "negativeInteger",
    "unsignedLong",
    "unsignedInt",
    "unsignedShort",
    "unsignedByte",
];
const FLOAT_TYPES: &[&str] = &["decimal", "double", "float"];

/// Expression evaluation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvaluationError {
    /// Variable has no binding in the solution
    #[error("Unbound variable: ?{0}")]
    UnboundVariable(String),

    /// Operand types cannot be combined
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// Regular expression failed to compile
    #[error("Invalid regular expression: {0}")]
    InvalidRegex(String),
}

pub type EvaluationResult<T> = Result<T, EvaluationError>;

/// Filter expression tree
#[derive(Debug, Clone)]
pub enum Expression {
    Variable(Variable),
    Constant(Term),
    Equal(Box<Expression>, Box<Expression>),
    NotEqual(Box<Expression>, Box<Expression>),
    Less(Box<Expression>, Box<Expression>),
    LessOrEqual(Box<Expression>, Box<Expression>),
    Greater(Box<Expression>, Box<Expression>),
    GreaterOrEqual(Box<Expression>, Box<Expression>),
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),
    Bound(Variable),
    IsIri(Box<Expression>),
    IsLiteral(Box<Expression>),
    IsBlank(Box<Expression>),
    Str(Box<Expression>),
    Lang(Box<Expression>),
    Contains(Box<Expression>, Box<Expression>),
    StrStarts(Box<Expression>, Box<Expression>),
    /// `REGEX(text, pattern, flags)`; the pattern is compiled once
    Regex {
        text: Box<Expression>,
        pattern: Regex,
    },
}

impl Expression {
    pub fn var(variable: Variable) -> Self {
        Expression::Variable(variable)
    }

    pub fn constant(term: impl Into<Term>) -> Self {
        Expression::Constant(term.into())
    }

    pub fn equal(left: Expression, right: Expression) -> Self {
        Expression::Equal(Box::new(left), Box::new(right))
    }

    pub fn not_equal(left: Expression, right: Expression) -> Self {
        Expression::NotEqual(Box::new(left), Box::new(right))
    }

    pub fn less(left: Expression, right: Expression) -> Self {
        Expression::Less(Box::new(left), Box::new(right))
    }

    pub fn less_or_equal(left: Expression, right: Expression) -> Self {
        Expression::LessOrEqual(Box::new(left), Box::new(right))
    }

    pub fn greater(left: Expression, right: Expression) -> Self {
        Expression::Greater(Box::new(left), Box::new(right))
    }

    pub fn greater_or_equal(left: Expression, right: Expression) -> Self {
        Expression::GreaterOrEqual(Box::new(left), Box::new(right))
    }

    pub fn and(left: Expression, right: Expression) -> Self {
        Expression::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Expression, right: Expression) -> Self {
        Expression::Or(Box::new(left), Box::new(right))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: Expression) -> Self {
        Expression::Not(Box::new(inner))
    }

    pub fn contains(text: Expression, needle: Expression) -> Self {
        Expression::Contains(Box::new(text), Box::new(needle))
    }

    pub fn str_starts(text: Expression, prefix: Expression) -> Self {
        Expression::StrStarts(Box::new(text), Box::new(prefix))
    }

    /// Build a `REGEX` call; supported flags are `i`, `m`, `s` and `x`
    pub fn regex(text: Expression, pattern: &str, flags: &str) -> EvaluationResult<Self> {
        let mut builder = RegexBuilder::new(pattern);
        for flag in flags.chars() {
            match flag {
                'i' => builder.case_insensitive(true),
                'm' => builder.multi_line(true),
                's' => builder.dot_matches_new_line(true),
                'x' => builder.ignore_whitespace(true),
                other => {
                    return Err(EvaluationError::InvalidRegex(format!(
                        "unsupported flag '{}'",
                        other
                    )))
                }
            };
        }
        let pattern = builder
            .build()
            .map_err(|e| EvaluationError::InvalidRegex(e.to_string()))?;
        Ok(Expression::Regex {
            text: Box::new(text),
            pattern,
        })
    }

    /// Evaluate against one solution
    pub fn evaluate(&self, solution: &QuerySolution) -> EvaluationResult<Term> {
        match self {
            Expression::Variable(v) => lookup(v, solution),
            Expression::Constant(Term::Variable(v)) => lookup(v, solution),
            Expression::Constant(term) => Ok(term.clone()),
            Expression::Equal(a, b) => {
                let (a, b) = (a.evaluate(solution)?, b.evaluate(solution)?);
                values_equal(&a, &b).map(boolean)
            }
            Expression::NotEqual(a, b) => {
                let (a, b) = (a.evaluate(solution)?, b.evaluate(solution)?);
                values_equal(&a, &b).map(|eq| boolean(!eq))
            }
            Expression::Less(a, b) => self.ordered(a, b, solution, Ordering::is_lt),
            Expression::LessOrEqual(a, b) => self.ordered(a, b, solution, Ordering::is_le),
            Expression::Greater(a, b) => self.ordered(a, b, solution, Ordering::is_gt),
            Expression::GreaterOrEqual(a, b) => self.ordered(a, b, solution, Ordering::is_ge),
            Expression::And(a, b) => {
                match (a.effective_boolean(solution), b.effective_boolean(solution)) {
                    (Ok(false), _) | (_, Ok(false)) => Ok(boolean(false)),
                    (Ok(true), Ok(true)) => Ok(boolean(true)),
                    (Err(e), _) | (_, Err(e)) => Err(e),
                }
            }
            Expression::Or(a, b) => {
                match (a.effective_boolean(solution), b.effective_boolean(solution)) {
                    (Ok(true), _) | (_, Ok(true)) => Ok(boolean(true)),
                    (Ok(false), Ok(false)) => Ok(boolean(false)),
                    (Err(e), _) | (_, Err(e)) => Err(e),
                }
            }
            Expression::Not(inner) => inner.effective_boolean(solution).map(|b| boolean(!b)),
            Expression::Bound(v) => Ok(boolean(solution.value(v).is_some())),
            Expression::IsIri(inner) => inner.evaluate(solution).map(|t| boolean(t.is_named_node())),
            Expression::IsLiteral(inner) => inner.evaluate(solution).map(|t| boolean(t.is_literal())),
            Expression::IsBlank(inner) => inner.evaluate(solution).map(|t| boolean(t.is_blank_node())),
            Expression::Str(inner) => match inner.evaluate(solution)? {
                Term::NamedNode(n) => Ok(Term::literal(n.as_str())),
                Term::Literal(l) => Ok(Term::literal(l.value())),
                other => Err(EvaluationError::TypeMismatch(format!("STR() of {}", other))),
            },
            Expression::Lang(inner) => match inner.evaluate(solution)? {
                Term::Literal(l) => Ok(Term::literal(l.language().unwrap_or_default())),
                other => Err(EvaluationError::TypeMismatch(format!("LANG() of {}", other))),
            },
            Expression::Contains(text, needle) => {
                let (text, needle) = (text.evaluate(solution)?, needle.evaluate(solution)?);
                Ok(boolean(string_arg(&text)?.contains(string_arg(&needle)?)))
            }
            Expression::StrStarts(text, prefix) => {
                let (text, prefix) = (text.evaluate(solution)?, prefix.evaluate(solution)?);
                Ok(boolean(string_arg(&text)?.starts_with(string_arg(&prefix)?)))
            }
            Expression::Regex { text, pattern } => {
                let text = text.evaluate(solution)?;
                Ok(boolean(pattern.is_match(string_arg(&text)?)))
            }
        }
    }

    /// Evaluate and reduce to an effective boolean value
    pub fn effective_boolean(&self, solution: &QuerySolution) -> EvaluationResult<bool> {
        effective_boolean_value(&self.evaluate(solution)?)
    }

    fn ordered(
        &self,
        a: &Expression,
        b: &Expression,
        solution: &QuerySolution,
        test: fn(Ordering) -> bool,
    ) -> EvaluationResult<Term> {
        let (a, b) = (a.evaluate(solution)?, b.evaluate(solution)?);
        compare(&a, &b).map(|ordering| boolean(test(ordering)))
    }
}

fn lookup(variable: &Variable, solution: &QuerySolution) -> EvaluationResult<Term> {
    solution
        .value(variable)
        .cloned()
        .ok_or_else(|| EvaluationError::UnboundVariable(variable.as_str().to_string()))
}

fn boolean(value: bool) -> Term {
    Term::Literal(Literal::from(oxrdf::Literal::from(value)))
}

/// Literal value interpreted by datatype
#[derive(Debug, Clone, Copy, PartialEq)]
enum Value<'a> {
    Integer(i64),
    Double(f64),
    Text(&'a str, Option<&'a str>),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
    Other,
}

impl Value<'_> {
    fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Integer(i) => Some(i as f64),
            Value::Double(d) => Some(d),
            _ => None,
        }
    }
}

fn typed(term: &Term) -> Value<'_> {
    let Term::Literal(literal) = term else {
        return Value::Other;
    };
    let value = literal.value();
    let datatype = literal.datatype();
    if datatype == RDF_LANG_STRING {
        return Value::Text(value, literal.language());
    }
    let Some(local) = datatype.strip_prefix(XSD) else {
        return Value::Other;
    };
    match local {
        "string" => Value::Text(value, None),
        "boolean" => match value {
            "true" | "1" => Value::Boolean(true),
            "false" | "0" => Value::Boolean(false),
            _ => Value::Other,
        },
        "date" => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(Value::Date)
            .unwrap_or(Value::Other),
        "dateTime" => parse_date_time(value).map_or(Value::Other, Value::DateTime),
        t if INTEGER_TYPES.contains(&t) => value.parse().map_or(Value::Other, Value::Integer),
        t if FLOAT_TYPES.contains(&t) => value.parse().map_or(Value::Other, Value::Double),
        _ => Value::Other,
    }
}

/// RFC 3339, or a local timestamp read as UTC
fn parse_date_time(value: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt);
    }
    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    FixedOffset::east_opt(0).map(|utc| utc.from_utc_datetime(&naive))
}

fn compare(a: &Term, b: &Term) -> EvaluationResult<Ordering> {
    let mismatch = || EvaluationError::TypeMismatch(format!("cannot compare {} with {}", a, b));
    match (typed(a), typed(b)) {
        (Value::Integer(x), Value::Integer(y)) => Ok(x.cmp(&y)),
        (Value::Text(x, None), Value::Text(y, None)) => Ok(x.cmp(y)),
        (Value::Boolean(x), Value::Boolean(y)) => Ok(x.cmp(&y)),
        (Value::Date(x), Value::Date(y)) => Ok(x.cmp(&y)),
        (Value::DateTime(x), Value::DateTime(y)) => Ok(x.cmp(&y)),
        (x, y) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).ok_or_else(mismatch),
            _ => Err(mismatch()),
        },
    }
}

fn values_equal(a: &Term, b: &Term) -> EvaluationResult<bool> {
    if a == b {
        return Ok(true);
    }
    // IRIs and blank nodes only equal themselves
    if !a.is_literal() || !b.is_literal() {
        return Ok(false);
    }
    match (typed(a), typed(b)) {
        (Value::Text(x, lx), Value::Text(y, ly)) => Ok(x == y && lx == ly),
        _ => compare(a, b).map(|ordering| ordering == Ordering::Equal),
    }
}

fn effective_boolean_value(term: &Term) -> EvaluationResult<bool> {
    match typed(term) {
        Value::Boolean(b) => Ok(b),
        Value::Text(s, _) => Ok(!s.is_empty()),
        Value::Integer(i) => Ok(i != 0),
        Value::Double(d) => Ok(d != 0.0 && !d.is_nan()),
        _ => Err(EvaluationError::TypeMismatch(format!(
            "no boolean value for {}",
            term
        ))),
    }
}

fn string_arg(term: &Term) -> EvaluationResult<&str> {
    match typed(term) {
        Value::Text(s, _) => Ok(s),
        _ => Err(EvaluationError::TypeMismatch(format!(
            "expected a string, found {}",
            term
        ))),
    }
}
