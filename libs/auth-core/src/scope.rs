//! Visibility scope: which tenants a principal may observe.

use std::collections::HashSet;

use uuid::Uuid;

/// A principal's record filter.
///
/// A record tagged with a `visible_to` tenant list is observable iff the
/// scope is unrestricted or the lists intersect. An empty tenant set permits
/// nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisibilityScope {
    /// SYSTEM_ADMIN: no filter applied.
    Unrestricted,
    /// Everyone else: the closed set of observable tenant IDs.
    Tenants(HashSet<Uuid>),
}

impl VisibilityScope {
    pub fn tenants(ids: impl IntoIterator<Item = Uuid>) -> Self {
        VisibilityScope::Tenants(ids.into_iter().collect())
    }

    /// True when the scope can never match a record.
    pub fn is_empty(&self) -> bool {
        match self {
            VisibilityScope::Unrestricted => false,
            VisibilityScope::Tenants(set) => set.is_empty(),
        }
    }

    /// Set-intersection predicate over a record's `visible_to` list.
    pub fn permits<'a>(&self, visible_to: impl IntoIterator<Item = &'a Uuid>) -> bool {
        match self {
            VisibilityScope::Unrestricted => true,
            VisibilityScope::Tenants(set) => {
                !set.is_empty() && visible_to.into_iter().any(|id| set.contains(id))
            }
        }
    }

    /// Tenant list for SQL overlap filters; `None` means no filter.
    pub fn as_filter(&self) -> Option<Vec<Uuid>> {
        match self {
            VisibilityScope::Unrestricted => None,
            VisibilityScope::Tenants(set) => Some(set.iter().copied().collect()),
        }
    }
}
