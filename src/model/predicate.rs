use std::borrow::Cow;
use std::cmp::Ordering;
use std::ops::{BitAnd, BitOr, Not};

use serde::{Deserialize, Serialize};

use super::record::Record;
use super::value::Value;

// ============================================================================
// Predicates - Tagged Filter Expressions
// ============================================================================
//
// One representation is used everywhere: the in-memory pipeline interprets
// it directly and the SQL store renders it to a parameterised WHERE clause.
//
// Evaluation uses three-valued logic (true / false / unknown) so that
// in-memory filtering gives the same answer a SQL WHERE clause would:
//
// - a comparison involving NULL is unknown
// - AND is false if any side is false, unknown if any side is unknown
// - OR is true if any side is true, unknown if any side is unknown
// - NOT unknown is unknown
// - a record passes a filter only when the result is true
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    Field(String),
    Constant(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        }
    }

    pub fn is_ordering(self) -> bool {
        !matches!(self, CompareOp::Eq | CompareOp::Ne)
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    True,
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    IsNull(Operand),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn compare(left: Operand, op: CompareOp, right: Operand) -> Self {
        Predicate::Compare { left, op, right }
    }

    /// Conjunction of every predicate; an empty input matches everything.
    pub fn all(predicates: impl IntoIterator<Item = Predicate>) -> Self {
        let mut parts: Vec<Predicate> = Vec::new();
        for predicate in predicates {
            match predicate {
                Predicate::True => {}
                Predicate::And(inner) => parts.extend(inner),
                other => parts.push(other),
            }
        }

        match parts.len() {
            0 => Predicate::True,
            1 => parts.remove(0),
            _ => Predicate::And(parts),
        }
    }

    /// Disjunction of every predicate; an empty input matches nothing.
    pub fn any(predicates: impl IntoIterator<Item = Predicate>) -> Self {
        let mut parts: Vec<Predicate> = Vec::new();
        for predicate in predicates {
            match predicate {
                Predicate::Or(inner) => parts.extend(inner),
                other => parts.push(other),
            }
        }

        if parts.len() == 1 {
            parts.remove(0)
        } else {
            Predicate::Or(parts)
        }
    }

    pub fn and(self, other: Predicate) -> Self {
        Predicate::all([self, other])
    }

    pub fn or(self, other: Predicate) -> Self {
        Predicate::any([self, other])
    }

    /// Three-valued evaluation against a record. `None` is "unknown".
    pub fn evaluate<T: Record>(&self, record: &T) -> Option<bool> {
        match self {
            Predicate::True => Some(true),
            Predicate::Compare { left, op, right } => {
                let left = resolve(left, record);
                let right = resolve(right, record);
                left.compare(&right).map(|ordering| op.holds(ordering))
            }
            Predicate::IsNull(operand) => Some(resolve(operand, record).is_null()),
            Predicate::And(parts) => {
                let mut unknown = false;
                for part in parts {
                    match part.evaluate(record) {
                        Some(false) => return Some(false),
                        None => unknown = true,
                        Some(true) => {}
                    }
                }
                if unknown { None } else { Some(true) }
            }
            Predicate::Or(parts) => {
                let mut unknown = false;
                for part in parts {
                    match part.evaluate(record) {
                        Some(true) => return Some(true),
                        None => unknown = true,
                        Some(false) => {}
                    }
                }
                if unknown { None } else { Some(false) }
            }
            Predicate::Not(inner) => inner.evaluate(record).map(|matched| !matched),
        }
    }

    pub fn matches<T: Record>(&self, record: &T) -> bool {
        self.evaluate(record) == Some(true)
    }

    /// Every field name referenced anywhere in the expression.
    pub fn fields(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_fields(&mut names);
        names
    }

    fn collect_fields<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Predicate::True => {}
            Predicate::Compare { left, right, .. } => {
                push_field(left, names);
                push_field(right, names);
            }
            Predicate::IsNull(operand) => push_field(operand, names),
            Predicate::And(parts) | Predicate::Or(parts) => {
                for part in parts {
                    part.collect_fields(names);
                }
            }
            Predicate::Not(inner) => inner.collect_fields(names),
        }
    }
}

fn push_field<'a>(operand: &'a Operand, names: &mut Vec<&'a str>) {
    if let Operand::Field(name) = operand {
        names.push(name.as_str());
    }
}

fn resolve<'a, T: Record>(operand: &'a Operand, record: &T) -> Cow<'a, Value> {
    match operand {
        Operand::Constant(value) => Cow::Borrowed(value),
        Operand::Field(name) => Cow::Owned(record.field(name).unwrap_or(Value::Null)),
    }
}

impl BitAnd for Predicate {
    type Output = Predicate;

    fn bitand(self, rhs: Predicate) -> Predicate {
        self.and(rhs)
    }
}

impl BitOr for Predicate {
    type Output = Predicate;

    fn bitor(self, rhs: Predicate) -> Predicate {
        self.or(rhs)
    }
}

impl Not for Predicate {
    type Output = Predicate;

    fn not(self) -> Predicate {
        Predicate::Not(Box::new(self))
    }
}

// ============================================================================
// Field Builder
// ============================================================================

/// Start a predicate on a named field: `field("country").eq("NL")`.
pub fn field(name: impl Into<String>) -> FieldRef {
    FieldRef(name.into())
}

#[derive(Debug, Clone)]
pub struct FieldRef(String);

impl FieldRef {
    fn compare(self, op: CompareOp, value: impl Into<Value>) -> Predicate {
        Predicate::compare(Operand::Field(self.0), op, Operand::Constant(value.into()))
    }

    pub fn eq(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Eq, value)
    }

    pub fn ne(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Ne, value)
    }

    pub fn lt(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Lt, value)
    }

    pub fn le(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Le, value)
    }

    pub fn gt(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Gt, value)
    }

    pub fn ge(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Ge, value)
    }

    /// Compare against another field of the same record.
    pub fn cmp_field(self, op: CompareOp, other: impl Into<String>) -> Predicate {
        Predicate::compare(Operand::Field(self.0), op, Operand::Field(other.into()))
    }

    pub fn is_null(self) -> Predicate {
        Predicate::IsNull(Operand::Field(self.0))
    }

    pub fn is_not_null(self) -> Predicate {
        !self.is_null()
    }

    pub fn between(self, low: impl Into<Value>, high: impl Into<Value>) -> Predicate {
        let name = self.0;
        field(name.clone()).ge(low) & field(name).le(high)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Supplier;

    fn rated(id: i64, rating: Option<i64>) -> Supplier {
        let mut supplier = Supplier::sample(id);
        supplier.rating = rating;
        supplier
    }

    #[test]
    fn test_simple_comparisons() {
        let supplier = rated(5, Some(4));

        assert!(field("id").eq(5).matches(&supplier));
        assert!(field("rating").gt(3).matches(&supplier));
        assert!(!field("rating").lt(4).matches(&supplier));
        assert!(field("rating").between(1, 4).matches(&supplier));
    }

    #[test]
    fn test_null_comparison_is_unknown_not_false() {
        let supplier = rated(1, None);
        let predicate = field("rating").eq(3);

        assert_eq!(predicate.evaluate(&supplier), None);
        // NOT unknown stays unknown, so neither side matches
        assert!(!predicate.clone().matches(&supplier));
        assert!(!(!predicate).matches(&supplier));
    }

    #[test]
    fn test_is_null_is_always_known() {
        let supplier = rated(1, None);

        assert!(field("rating").is_null().matches(&supplier));
        assert!(!field("rating").is_not_null().matches(&supplier));
    }

    #[test]
    fn test_three_valued_and_or() {
        let supplier = rated(1, None);
        let unknown = field("rating").eq(3);

        assert_eq!((unknown.clone() & field("id").eq(2)).evaluate(&supplier), Some(false));
        assert_eq!((unknown.clone() & field("id").eq(1)).evaluate(&supplier), None);
        assert_eq!((unknown.clone() | field("id").eq(1)).evaluate(&supplier), Some(true));
        assert_eq!((unknown | field("id").eq(2)).evaluate(&supplier), None);
    }

    #[test]
    fn test_all_flattens_and_drops_true() {
        let combined = Predicate::all([
            Predicate::True,
            field("id").gt(1) & field("id").lt(9),
            field("active").eq(true),
        ]);

        match combined {
            Predicate::And(parts) => assert_eq!(parts.len(), 3),
            other => panic!("expected a flat conjunction, got {:?}", other),
        }
        assert_eq!(Predicate::all(Vec::new()), Predicate::True);
    }

    #[test]
    fn test_empty_disjunction_matches_nothing() {
        assert!(!Predicate::any(Vec::new()).matches(&Supplier::sample(1)));
    }

    #[test]
    fn test_field_to_field_comparison() {
        let supplier = rated(4, Some(4));

        assert!(field("id").cmp_field(CompareOp::Eq, "rating").matches(&supplier));
    }

    #[test]
    fn test_referenced_fields() {
        let predicate = (field("name").eq("x") | field("rating").is_null()) & !field("id").gt(2);

        assert_eq!(predicate.fields(), vec!["name", "rating", "id"]);
    }
}
