//! Memory-layout equivalence analysis.
//!
//! Two types are layout-equivalent when their in-memory representations are
//! identical, which permits reinterpretation instead of member-by-member
//! copying. Results are memoized under both key orders; recursion through
//! self-referential composites is broken by a visited set threaded through
//! every call.
//!
//! Known limitation: the visited set answers an optimistic `true` while a
//! type is still being analyzed, which can mask genuine inequivalence for
//! mutually recursive but structurally divergent types. A stricter resolution
//! would need a tri-state fixpoint.

use std::collections::{HashMap, HashSet};

use crate::universe::{TypeKind, TypeName, Universe};

/// Memoized layout-equivalence oracle. Append-only within a run.
#[derive(Debug, Default)]
pub struct LayoutCache {
    cache: HashMap<(TypeName, TypeName), bool>,
}

impl LayoutCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Are `a` and `b` layout-equivalent?
    pub fn equal(&mut self, universe: &Universe, a: &TypeName, b: &TypeName) -> bool {
        let mut visited = HashSet::new();
        self.caching_equal(universe, a, b, &mut visited)
    }

    fn caching_equal(
        &mut self,
        universe: &Universe,
        a: &TypeName,
        b: &TypeName,
        visited: &mut HashSet<TypeName>,
    ) -> bool {
        if a == b {
            return true;
        }
        if let Some(&cached) = self.cache.get(&(a.clone(), b.clone())) {
            return cached;
        }
        if let Some(&cached) = self.cache.get(&(b.clone(), a.clone())) {
            return cached;
        }
        let result = self.structural_equal(universe, a, b, visited);
        self.cache.insert((a.clone(), b.clone()), result);
        self.cache.insert((b.clone(), a.clone()), result);
        result
    }

    fn structural_equal(
        &mut self,
        universe: &Universe,
        a: &TypeName,
        b: &TypeName,
        visited: &mut HashSet<TypeName>,
    ) -> bool {
        let (Some(a_desc), Some(b_desc)) = (universe.get(a), universe.get(b)) else {
            // Dangling references are never equivalent.
            return false;
        };
        let a_desc = universe.unwrap_alias(a_desc);
        let b_desc = universe.unwrap_alias(b_desc);

        if a_desc.name == b_desc.name {
            return true;
        }
        if a_desc.kind != b_desc.kind {
            return false;
        }

        // Break cycles on self-referential composites.
        if visited.contains(&a_desc.name) {
            return true;
        }
        visited.insert(a_desc.name.clone());

        match a_desc.kind {
            TypeKind::Struct => {
                if a_desc.members.len() != b_desc.members.len() {
                    return false;
                }
                a_desc
                    .members
                    .iter()
                    .zip(&b_desc.members)
                    .all(|(am, bm)| {
                        self.caching_equal(universe, &am.type_ref, &bm.type_ref, visited)
                    })
            }
            TypeKind::Pointer | TypeKind::Slice => match (&a_desc.elem, &b_desc.elem) {
                (Some(ae), Some(be)) => self.caching_equal(universe, ae, be, visited),
                _ => false,
            },
            TypeKind::Map => {
                let keys = match (&a_desc.key, &b_desc.key) {
                    (Some(ak), Some(bk)) => self.caching_equal(universe, ak, bk, visited),
                    _ => false,
                };
                keys && match (&a_desc.elem, &b_desc.elem) {
                    (Some(ae), Some(be)) => self.caching_equal(universe, ae, be, visited),
                    _ => false,
                }
            }
            // Identical method sets may still need a run-time conversion.
            TypeKind::Interface => false,
            TypeKind::Primitive => a_desc.name.name == b_desc.name.name,
            // Not modeled as convertible.
            TypeKind::Func | TypeKind::Array | TypeKind::Chan => false,
            // Unreachable after unwrapping, barring a dangling underlying ref.
            TypeKind::Alias => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
