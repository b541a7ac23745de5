use std::fmt::Debug;
use std::hash::Hash;

use super::value::Value;

// ============================================================================
// Record Capability
// ============================================================================
//
// Every type stored through a Repository implements this trait. It gives
// the generic machinery an identity and a statically written field accessor,
// so predicates and sort keys can be evaluated without runtime reflection.
//
// ============================================================================

/// A record with a stable identity.
///
/// `field` must answer for every name listed in `FIELDS` and return `None`
/// for any other name. Optional fields answer `Some(Value::Null)` when unset.
pub trait Record: Clone + Send + Sync + Unpin + 'static {
    type Id: Clone + Eq + Hash + Debug + Send + Sync + Into<Value>;

    /// Every field name predicates, sort keys and aggregates may reference.
    const FIELDS: &'static [&'static str];

    /// Name of the identity field.
    const ID_FIELD: &'static str = "id";

    fn id(&self) -> Self::Id;

    fn field(&self, name: &str) -> Option<Value>;

    fn same_identity(&self, other: &Self) -> bool {
        self.id() == other.id()
    }

    fn has_field(name: &str) -> bool {
        Self::FIELDS.contains(&name)
    }
}
