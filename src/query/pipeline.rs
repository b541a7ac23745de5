use std::cmp::Ordering;
use std::ops::Range;

use crate::model::{Predicate, Record, RepositoryError, RepositoryResult, Value};

use super::plan::{Direction, QueryPlan, SortKey};

// ============================================================================
// In-Memory Query Pipeline
// ============================================================================
//
// Synchronous execution of a QueryPlan over resident records. Shared by the
// in-memory store and the async query adapter.
//
// Every terminal function evaluates the composed predicate exactly once per
// candidate record, in a single pass over the input.
//
// ============================================================================

fn filtered<'a, T: Record>(items: &'a [T], predicate: &Predicate) -> Vec<&'a T> {
    items.iter().filter(|item| predicate.matches(*item)).collect()
}

/// Stable: records with equal keys keep their input order.
fn sort_stable<T: Record>(rows: &mut [&T], order: &[SortKey]) {
    if order.is_empty() {
        return;
    }

    rows.sort_by(|a, b| {
        for key in order {
            let left = a.field(&key.field).unwrap_or(Value::Null);
            let right = b.field(&key.field).unwrap_or(Value::Null);
            let ordering = match key.direction {
                Direction::Ascending => left.sort_cmp(&right),
                Direction::Descending => right.sort_cmp(&left),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

fn window(len: usize, skip: u64, take: Option<u64>) -> Range<usize> {
    let start = usize::try_from(skip).unwrap_or(usize::MAX).min(len);
    let end = match take {
        Some(take) => start
            .saturating_add(usize::try_from(take).unwrap_or(usize::MAX))
            .min(len),
        None => len,
    };
    start..end
}

/// Filter, order and window; `limit` further caps the window.
fn select<'a, T: Record>(items: &'a [T], plan: &QueryPlan, limit: Option<u64>) -> Vec<&'a T> {
    let mut rows = filtered(items, &plan.predicate());
    sort_stable(&mut rows, plan.order());

    let take = match (plan.take(), limit) {
        (Some(take), Some(limit)) => Some(take.min(limit)),
        (take, limit) => take.or(limit),
    };
    let range = window(rows.len(), plan.skip(), take);
    rows.drain(range).collect()
}

pub fn to_list<T: Record>(items: &[T], plan: &QueryPlan) -> Vec<T> {
    select(items, plan, None).into_iter().cloned().collect()
}

pub fn first_or_default<T: Record>(items: &[T], plan: &QueryPlan) -> Option<T> {
    select(items, plan, Some(1)).into_iter().next().cloned()
}

pub fn count<T: Record>(items: &[T], plan: &QueryPlan) -> u64 {
    // ordering never changes a count, so it is skipped
    let matched = filtered(items, &plan.predicate()).len();
    window(matched, plan.skip(), plan.take()).len() as u64
}

pub fn any<T: Record>(items: &[T], plan: &QueryPlan) -> bool {
    if plan.skip() == 0 && plan.take() != Some(0) {
        let predicate = plan.predicate();
        return items.iter().any(|item| predicate.matches(item));
    }
    count(items, plan) > 0
}

pub fn single<T: Record>(items: &[T], plan: &QueryPlan) -> RepositoryResult<T> {
    let mut rows = select(items, plan, Some(2));
    match rows.len() {
        0 => Err(RepositoryError::NoMatch),
        1 => Ok(rows.remove(0).clone()),
        _ => Err(RepositoryError::MultipleMatches),
    }
}

fn numeric_values<T: Record>(items: &[T], plan: &QueryPlan, field: &str) -> RepositoryResult<Vec<f64>> {
    let mut numbers = Vec::new();
    for row in select(items, plan, None) {
        match row.field(field).unwrap_or(Value::Null) {
            Value::Null => {}
            value => match value.as_f64() {
                Some(number) => numbers.push(number),
                None => {
                    return Err(RepositoryError::validation(format!(
                        "field '{}' holds {} values and cannot be aggregated",
                        field,
                        value.type_name()
                    )))
                }
            },
        }
    }
    Ok(numbers)
}

/// NULLs are ignored; an empty input sums to `None`.
pub fn sum<T: Record>(items: &[T], plan: &QueryPlan, field: &str) -> RepositoryResult<Option<f64>> {
    let numbers = numeric_values(items, plan, field)?;
    if numbers.is_empty() {
        return Ok(None);
    }
    Ok(Some(numbers.iter().sum()))
}

pub fn average<T: Record>(items: &[T], plan: &QueryPlan, field: &str) -> RepositoryResult<Option<f64>> {
    let numbers = numeric_values(items, plan, field)?;
    if numbers.is_empty() {
        return Ok(None);
    }
    Ok(Some(numbers.iter().sum::<f64>() / numbers.len() as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Supplier;
    use crate::model::field;

    fn suppliers(count: i64) -> Vec<Supplier> {
        (1..=count).map(Supplier::sample).collect()
    }

    fn ids(items: &[Supplier]) -> Vec<i64> {
        items.iter().map(|s| s.id).collect()
    }

    #[test]
    fn test_chained_filters_equal_single_conjunction() {
        let data = suppliers(30);

        let mut chained = QueryPlan::new();
        chained.push_filter(field("id").gt(5));
        chained.push_filter(field("active").eq(true));

        let mut combined = QueryPlan::new();
        combined.push_filter(field("id").gt(5) & field("active").eq(true));

        assert_eq!(to_list(&data, &chained), to_list(&data, &combined));
        assert!(!to_list(&data, &chained).is_empty());
    }

    #[test]
    fn test_sort_is_stable_for_equal_keys() {
        let mut data = suppliers(6);
        for supplier in data.iter_mut() {
            supplier.country = if supplier.id % 2 == 0 { "DE".into() } else { "NL".into() };
        }

        let mut plan = QueryPlan::new();
        plan.order_by("country", Direction::Ascending);

        assert_eq!(ids(&to_list(&data, &plan)), vec![2, 4, 6, 1, 3, 5]);
    }

    #[test]
    fn test_descending_sort_puts_nulls_first() {
        let mut data = suppliers(3);
        data[1].rating = None;

        let mut plan = QueryPlan::new();
        plan.order_by("rating", Direction::Descending);
        assert_eq!(to_list(&data, &plan)[0].id, 2);

        plan.order_by("rating", Direction::Ascending);
        assert_eq!(to_list(&data, &plan)[2].id, 2);
    }

    #[test]
    fn test_window_applies_after_ordering() {
        let data = suppliers(10);

        let mut plan = QueryPlan::new();
        plan.order_by("id", Direction::Descending);
        plan.add_skip(2);
        plan.limit_take(3);

        assert_eq!(ids(&to_list(&data, &plan)), vec![8, 7, 6]);
        assert_eq!(count(&data, &plan), 3);
        assert_eq!(first_or_default(&data, &plan).map(|s| s.id), Some(8));
    }

    #[test]
    fn test_take_then_skip_stays_inside_the_take() {
        let data = suppliers(40);

        let mut plan = QueryPlan::new();
        plan.order_by("id", Direction::Ascending);
        plan.limit_take(25);
        plan.add_skip(20);

        assert_eq!(ids(&to_list(&data, &plan)), vec![21, 22, 23, 24, 25]);
        assert_eq!(count(&data, &plan), 5);

        plan.add_skip(5);
        assert!(to_list(&data, &plan).is_empty());
        assert!(!any(&data, &plan));
    }

    #[test]
    fn test_skip_then_take_windows_the_remainder() {
        let data = suppliers(40);

        let mut plan = QueryPlan::new();
        plan.add_skip(20);
        plan.limit_take(25);

        assert_eq!(count(&data, &plan), 20);
        assert_eq!(first_or_default(&data, &plan).map(|s| s.id), Some(21));
    }

    #[test]
    fn test_window_past_end_is_empty() {
        let data = suppliers(4);

        let mut plan = QueryPlan::new();
        plan.add_skip(10);

        assert!(to_list(&data, &plan).is_empty());
        assert_eq!(count(&data, &plan), 0);
        assert!(!any(&data, &plan));
    }

    #[test]
    fn test_any_matches_count() {
        let data = suppliers(12);

        for threshold in [0, 6, 12, 20] {
            let mut plan = QueryPlan::new();
            plan.push_filter(field("id").gt(threshold));
            assert_eq!(any(&data, &plan), count(&data, &plan) > 0);
        }
    }

    #[test]
    fn test_single_cardinality() {
        let data = suppliers(5);

        let mut one = QueryPlan::new();
        one.push_filter(field("id").eq(3));
        assert_eq!(single(&data, &one).unwrap().id, 3);

        let mut none = QueryPlan::new();
        none.push_filter(field("id").eq(99));
        assert!(matches!(single(&data, &none), Err(RepositoryError::NoMatch)));

        let many = QueryPlan::new();
        assert!(matches!(single(&data, &many), Err(RepositoryError::MultipleMatches)));
    }

    #[test]
    fn test_aggregates_ignore_nulls() {
        let mut data = suppliers(3);
        data[0].rating = Some(2);
        data[1].rating = None;
        data[2].rating = Some(4);

        let plan = QueryPlan::new();
        assert_eq!(sum(&data, &plan, "rating").unwrap(), Some(6.0));
        assert_eq!(average(&data, &plan, "rating").unwrap(), Some(3.0));

        let mut empty = QueryPlan::new();
        empty.push_filter(field("id").gt(100));
        assert_eq!(average(&data, &empty, "rating").unwrap(), None);
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Reading {
        id: i64,
        level: f64,
    }

    impl Record for Reading {
        type Id = i64;

        const FIELDS: &'static [&'static str] = &["id", "level"];

        fn id(&self) -> i64 {
            self.id
        }

        fn field(&self, name: &str) -> Option<Value> {
            match name {
                "id" => Some(Value::Int(self.id)),
                "level" => Some(Value::Float(self.level)),
                _ => None,
            }
        }
    }

    #[test]
    fn test_nan_sorts_above_every_number() {
        let data: Vec<Reading> = (0..200)
            .map(|id| Reading {
                id,
                level: if id % 7 == 0 { f64::NAN } else { ((id * 37) % 101) as f64 - 50.0 },
            })
            .collect();

        let mut plan = QueryPlan::new();
        plan.order_by("level", Direction::Ascending);
        let sorted = to_list(&data, &plan);

        let nan_count = data.iter().filter(|r| r.level.is_nan()).count();
        let (numbers, nans) = sorted.split_at(sorted.len() - nan_count);
        assert!(nans.iter().all(|r| r.level.is_nan()));
        assert!(numbers.windows(2).all(|pair| pair[0].level <= pair[1].level));
        // NaN rows tie with each other and keep input order
        assert!(nans.windows(2).all(|pair| pair[0].id < pair[1].id));

        plan.order_by("level", Direction::Descending);
        assert!(to_list(&data, &plan)[..nan_count].iter().all(|r| r.level.is_nan()));
    }

    #[test]
    fn test_aggregate_of_text_is_rejected() {
        let data = suppliers(2);

        assert!(matches!(
            sum(&data, &QueryPlan::new(), "name"),
            Err(RepositoryError::Validation(_))
        ));
    }
}
