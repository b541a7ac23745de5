use std::collections::HashSet;

use crate::model::{Predicate, Record};

// ============================================================================
// Change Set - Staged Mutations of One Unit of Work
// ============================================================================
//
// Mutations are staged in call order and folded per identity:
// - update after insert  -> the insert carries the new state
// - delete after insert  -> both disappear (the record was never persisted)
// - delete after update  -> delete
// - insert after delete  -> update (the identity already exists in the store)
//
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Change<T> {
    Insert(T),
    Update(T),
    Delete(T),
}

impl<T> Change<T> {
    pub fn record(&self) -> &T {
        match self {
            Change::Insert(record) | Change::Update(record) | Change::Delete(record) => record,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Change::Insert(_) => "insert",
            Change::Update(_) => "update",
            Change::Delete(_) => "delete",
        }
    }
}

/// How a staged change affects a single identity.
#[derive(Debug, PartialEq)]
pub enum Staged<'a, T> {
    Present(&'a T),
    Removed,
}

#[derive(Debug, Clone)]
pub struct ChangeSet<T: Record> {
    changes: Vec<Change<T>>,
}

impl<T: Record> Default for ChangeSet<T> {
    fn default() -> Self {
        Self { changes: Vec::new() }
    }
}

impl<T: Record> ChangeSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Change<T>> {
        self.changes.iter()
    }

    pub fn clear(&mut self) {
        self.changes.clear();
    }

    fn position(&self, id: &T::Id) -> Option<usize> {
        self.changes
            .iter()
            .rposition(|change| &change.record().id() == id)
    }

    pub fn insert(&mut self, record: T) {
        match self.position(&record.id()) {
            Some(index) if matches!(self.changes[index], Change::Delete(_)) => {
                self.changes[index] = Change::Update(record);
            }
            // a second insert of a staged identity is left for the store to reject
            _ => self.changes.push(Change::Insert(record)),
        }
    }

    pub fn update(&mut self, record: T) {
        match self.position(&record.id()) {
            Some(index) => match self.changes[index] {
                Change::Insert(_) => self.changes[index] = Change::Insert(record),
                Change::Update(_) => self.changes[index] = Change::Update(record),
                Change::Delete(_) => self.changes.push(Change::Update(record)),
            },
            None => self.changes.push(Change::Update(record)),
        }
    }

    pub fn delete(&mut self, record: T) {
        match self.position(&record.id()) {
            Some(index) => match self.changes[index] {
                Change::Insert(_) => {
                    self.changes.remove(index);
                }
                Change::Update(_) => self.changes[index] = Change::Delete(record),
                Change::Delete(_) => {}
            },
            None => self.changes.push(Change::Delete(record)),
        }
    }

    /// The staged state of an identity, if any change touches it.
    pub fn staged(&self, id: &T::Id) -> Option<Staged<'_, T>> {
        self.position(id).map(|index| match &self.changes[index] {
            Change::Insert(record) | Change::Update(record) => Staged::Present(record),
            Change::Delete(_) => Staged::Removed,
        })
    }

    /// Every identity with a staged change, each listed once. Committed
    /// state of these identities is superseded.
    pub fn staged_ids(&self) -> Vec<T::Id> {
        let mut seen = HashSet::new();
        self.changes
            .iter()
            .map(|change| change.record().id())
            .filter(|id| seen.insert(id.clone()))
            .collect()
    }

    /// Identities whose final staged state is present and matches `predicate`.
    pub fn count_present_matching(&self, predicate: &Predicate) -> u64 {
        self.staged_ids()
            .iter()
            .filter(|id| matches!(self.staged(id), Some(Staged::Present(record)) if predicate.matches(record)))
            .count() as u64
    }

    /// Merge staged changes into committed rows that matched `predicate`.
    ///
    /// Committed rows keep their order; staged rows that now match and were
    /// not among the committed rows are appended in staging order.
    pub fn overlay(&self, committed: Vec<T>, predicate: &Predicate) -> Vec<T> {
        if self.changes.is_empty() {
            return committed;
        }

        let mut seen: HashSet<T::Id> = HashSet::new();
        let mut merged = Vec::with_capacity(committed.len() + self.changes.len());

        for row in committed {
            let id = row.id();
            match self.staged(&id) {
                Some(Staged::Removed) => {}
                Some(Staged::Present(staged)) => {
                    if predicate.matches(staged) {
                        merged.push(staged.clone());
                    }
                }
                None => merged.push(row),
            }
            seen.insert(id);
        }

        for change in &self.changes {
            if let Change::Insert(record) | Change::Update(record) = change {
                let id = record.id();
                if !seen.insert(id.clone()) {
                    continue;
                }
                if let Some(Staged::Present(latest)) = self.staged(&id) {
                    if predicate.matches(latest) {
                        merged.push(latest.clone());
                    }
                }
            }
        }

        merged
    }

    /// Number of staged changes per kind, as (insert, update, delete).
    pub fn counts(&self) -> (usize, usize, usize) {
        self.changes.iter().fold((0, 0, 0), |(i, u, d), change| match change {
            Change::Insert(_) => (i + 1, u, d),
            Change::Update(_) => (i, u + 1, d),
            Change::Delete(_) => (i, u, d + 1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Supplier;
    use crate::model::field;

    fn renamed(id: i64, name: &str) -> Supplier {
        let mut supplier = Supplier::sample(id);
        supplier.name = name.to_string();
        supplier
    }

    #[test]
    fn test_update_after_insert_folds_into_insert() {
        let mut changes = ChangeSet::new();
        changes.insert(Supplier::sample(1));
        changes.update(renamed(1, "Updated"));

        assert_eq!(changes.len(), 1);
        assert!(matches!(changes.iter().next(), Some(Change::Insert(s)) if s.name == "Updated"));
    }

    #[test]
    fn test_delete_after_insert_cancels_out() {
        let mut changes = ChangeSet::new();
        changes.insert(Supplier::sample(1));
        changes.delete(Supplier::sample(1));

        assert!(changes.is_empty());
    }

    #[test]
    fn test_delete_after_update_becomes_delete() {
        let mut changes = ChangeSet::new();
        changes.update(renamed(2, "Updated"));
        changes.delete(Supplier::sample(2));

        assert_eq!(changes.counts(), (0, 0, 1));
        assert_eq!(changes.staged(&2), Some(Staged::Removed));
    }

    #[test]
    fn test_insert_after_delete_becomes_update() {
        let mut changes = ChangeSet::new();
        changes.delete(Supplier::sample(3));
        changes.insert(renamed(3, "Back"));

        assert_eq!(changes.counts(), (0, 1, 0));
    }

    #[test]
    fn test_overlay_replaces_removes_and_appends() {
        let committed: Vec<Supplier> = (1..=4).map(Supplier::sample).collect();

        let mut changes = ChangeSet::new();
        changes.update(renamed(2, "Second"));
        changes.delete(Supplier::sample(3));
        changes.insert(Supplier::sample(9));

        let merged = changes.overlay(committed, &Predicate::True);
        let ids: Vec<i64> = merged.iter().map(|s| s.id).collect();

        assert_eq!(ids, vec![1, 2, 4, 9]);
        assert_eq!(merged[1].name, "Second");
    }

    #[test]
    fn test_overlay_applies_predicate_to_staged_rows() {
        let committed = vec![Supplier::sample(1)];

        let mut changes = ChangeSet::new();
        changes.update(renamed(1, "Other"));
        changes.insert(renamed(5, "Wanted"));
        changes.insert(renamed(6, "Unwanted"));

        let merged = changes.overlay(committed, &field("name").eq("Wanted"));

        assert_eq!(merged.iter().map(|s| s.id).collect::<Vec<_>>(), vec![5]);
    }

    #[test]
    fn test_staged_ids_and_present_matches_use_final_state() {
        let mut changes = ChangeSet::new();
        changes.insert(Supplier::sample(1));
        changes.update(Supplier::sample(2));
        changes.delete(Supplier::sample(3));
        changes.update(renamed(3, "Back"));
        changes.delete(Supplier::sample(2));

        assert_eq!(changes.staged_ids(), vec![1, 2, 3]);
        assert_eq!(changes.count_present_matching(&Predicate::True), 2);
        assert_eq!(changes.count_present_matching(&field("name").eq("Back")), 1);
        assert_eq!(changes.count_present_matching(&field("id").eq(2)), 0);
    }
}
