//! Pure closure computations over the tenant forest.
//!
//! The database repository materialises descendants with a recursive query;
//! these functions define the same closure over an in-memory edge list and
//! back the cycle check applied to every parent mutation.

use std::collections::{HashMap, VecDeque};

use uuid::Uuid;

/// `(tenant_id, parent_id)` rows.
pub type TenantEdge = (Uuid, Option<Uuid>);

/// All tenants reachable through the children relation, excluding `root`,
/// in breadth-first order.
pub fn descendants(edges: &[TenantEdge], root: Uuid) -> Vec<Uuid> {
    let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for (id, parent) in edges {
        if let Some(parent) = parent {
            children.entry(*parent).or_default().push(*id);
        }
    }

    let mut found = Vec::new();
    let mut queue: VecDeque<Uuid> = children.get(&root).cloned().unwrap_or_default().into();
    while let Some(id) = queue.pop_front() {
        found.push(id);
        if let Some(grandchildren) = children.get(&id) {
            queue.extend(grandchildren.iter().copied());
        }
    }
    found
}

/// Whether pointing `child.parent_id` at `new_parent` would close a cycle,
/// i.e. the new parent is the child itself or already below it.
pub fn would_create_cycle(edges: &[TenantEdge], child: Uuid, new_parent: Uuid) -> bool {
    child == new_parent || descendants(edges, child).contains(&new_parent)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A (root) -> B -> C, with D as an unrelated root.
    fn forest() -> (Vec<TenantEdge>, Uuid, Uuid, Uuid, Uuid) {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let d = Uuid::new_v4();
        let edges = vec![(a, None), (b, Some(a)), (c, Some(b)), (d, None)];
        (edges, a, b, c, d)
    }

    #[test]
    fn descendants_walk_the_whole_subtree() {
        let (edges, a, b, c, d) = forest();

        assert_eq!(descendants(&edges, a), vec![b, c]);
        assert_eq!(descendants(&edges, b), vec![c]);
        assert!(descendants(&edges, c).is_empty());
        assert!(descendants(&edges, d).is_empty());
    }

    #[test]
    fn parent_child_membership_is_closed() {
        let (edges, a, b, _, _) = forest();
        // parent(B) = A implies B ∈ descendants(A)
        assert!(descendants(&edges, a).contains(&b));
    }

    #[test]
    fn admin_scope_over_the_subtree_filters_records() {
        use auth_core::VisibilityScope;

        let (edges, a, b, c, _) = forest();

        // A TENANT_ADMIN at A sees {A} ∪ descendants(A) = {A, B, C}.
        let mut visible = vec![a];
        visible.extend(descendants(&edges, a));
        assert_eq!(visible, vec![a, b, c]);

        let scope = VisibilityScope::tenants(visible);
        let unrelated = Uuid::new_v4();
        // A customer shared with B is visible, one shared only with an
        // unrelated tenant is not.
        assert!(scope.permits(&[b]));
        assert!(!scope.permits(&[unrelated]));
    }

    #[test]
    fn cycle_detection_rejects_reachable_parents() {
        let (edges, a, b, c, d) = forest();

        // A cannot be re-parented under its own descendants.
        assert!(would_create_cycle(&edges, a, b));
        assert!(would_create_cycle(&edges, a, c));
        // Self-parenting is a cycle.
        assert!(would_create_cycle(&edges, b, b));
        // Moving under an unrelated root is fine.
        assert!(!would_create_cycle(&edges, b, d));
        // C has no children, so anything above it is fine.
        assert!(!would_create_cycle(&edges, c, a));
    }
}
