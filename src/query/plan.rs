use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{Predicate, Record, RepositoryError, RepositoryResult};

// ============================================================================
// Query Plan
// ============================================================================
//
// A declarative description of what to fetch. Building a plan has no side
// effects; it is only executed when a terminal operator hands it to a
// QueryProvider together with the requested ResultShape.
//
// Execution order is fixed:
//   filters (one conjunction) -> stable ordering -> skip -> take
//
// Builder calls compose in the order they were made. A skip that follows
// a take shrinks the take, so `take(25).skip(20)` keeps rows 21..=25 of
// the limited set and never reaches past it.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPlan {
    filters: Vec<Predicate>,
    order: Vec<SortKey>,
    skip: u64,
    take: Option<u64>,
}

impl QueryPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filters(&self) -> &[Predicate] {
        &self.filters
    }

    pub fn order(&self) -> &[SortKey] {
        &self.order
    }

    pub fn skip(&self) -> u64 {
        self.skip
    }

    pub fn take(&self) -> Option<u64> {
        self.take
    }

    /// The single predicate every candidate record is tested against.
    pub fn predicate(&self) -> Predicate {
        Predicate::all(self.filters.iter().cloned())
    }

    pub fn push_filter(&mut self, predicate: Predicate) {
        self.filters.push(predicate);
    }

    /// Replace any previous ordering.
    pub fn order_by(&mut self, field: impl Into<String>, direction: Direction) {
        self.order.clear();
        self.then_by(field, direction);
    }

    /// Add a secondary ordering key.
    pub fn then_by(&mut self, field: impl Into<String>, direction: Direction) {
        self.order.push(SortKey {
            field: field.into(),
            direction,
        });
    }

    /// Skip `count` more rows of whatever the plan currently selects.
    pub fn add_skip(&mut self, count: u64) {
        self.skip = self.skip.saturating_add(count);
        if let Some(take) = self.take.as_mut() {
            *take = take.saturating_sub(count);
        }
    }

    pub fn limit_take(&mut self, count: u64) {
        self.take = Some(self.take.map_or(count, |current| current.min(count)));
    }

    /// Reject plans that reference fields the record does not expose.
    pub fn validate<T: Record>(&self, shape: &ResultShape) -> RepositoryResult<()> {
        let filter_fields = self.filters.iter().flat_map(|p| p.fields());
        let order_fields = self.order.iter().map(|key| key.field.as_str());
        let shape_field = shape.field();

        for name in filter_fields.chain(order_fields).chain(shape_field) {
            if !T::has_field(name) {
                return Err(RepositoryError::validation(format!(
                    "unknown field '{}' (known fields: {})",
                    name,
                    T::FIELDS.join(", ")
                )));
            }
        }

        Ok(())
    }
}

// ============================================================================
// Result Shapes
// ============================================================================

/// What a terminal operator asks a provider for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultShape {
    ToList,
    FirstOrDefault,
    Count,
    Any,
    Single,
    Sum(String),
    Average(String),
}

impl ResultShape {
    pub fn name(&self) -> &'static str {
        match self {
            ResultShape::ToList => "to_list",
            ResultShape::FirstOrDefault => "first_or_default",
            ResultShape::Count => "count",
            ResultShape::Any => "any",
            ResultShape::Single => "single",
            ResultShape::Sum(_) => "sum",
            ResultShape::Average(_) => "average",
        }
    }

    pub fn field(&self) -> Option<&str> {
        match self {
            ResultShape::Sum(field) | ResultShape::Average(field) => Some(field.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for ResultShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.field() {
            Some(field) => write!(f, "{}({})", self.name(), field),
            None => write!(f, "{}", self.name()),
        }
    }
}

/// What a provider answers.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput<T> {
    List(Vec<T>),
    Item(Option<T>),
    Count(u64),
    Bool(bool),
    Number(Option<f64>),
}

impl<T> QueryOutput<T> {
    fn describe(&self) -> &'static str {
        match self {
            QueryOutput::List(_) => "list",
            QueryOutput::Item(_) => "item",
            QueryOutput::Count(_) => "count",
            QueryOutput::Bool(_) => "bool",
            QueryOutput::Number(_) => "number",
        }
    }

    fn mismatch(&self, expected: &str) -> RepositoryError {
        RepositoryError::unsupported(format!(
            "provider answered with {} where {} was expected",
            self.describe(),
            expected
        ))
    }

    pub fn into_list(self) -> RepositoryResult<Vec<T>> {
        match self {
            QueryOutput::List(items) => Ok(items),
            other => Err(other.mismatch("list")),
        }
    }

    pub fn into_item(self) -> RepositoryResult<Option<T>> {
        match self {
            QueryOutput::Item(item) => Ok(item),
            other => Err(other.mismatch("item")),
        }
    }

    pub fn into_count(self) -> RepositoryResult<u64> {
        match self {
            QueryOutput::Count(count) => Ok(count),
            other => Err(other.mismatch("count")),
        }
    }

    pub fn into_bool(self) -> RepositoryResult<bool> {
        match self {
            QueryOutput::Bool(value) => Ok(value),
            other => Err(other.mismatch("bool")),
        }
    }

    pub fn into_number(self) -> RepositoryResult<Option<f64>> {
        match self {
            QueryOutput::Number(value) => Ok(value),
            other => Err(other.mismatch("number")),
        }
    }
}
