//! Interchange: functional equivalence between parts.
//!
//! Equivalence is symmetric. It is stored as a join table of unordered pairs,
//! each kept exactly once in canonical order (`low < high`) and queried from
//! both sides, so "what is equivalent to B" never needs a mirrored row.
//! Equivalence is *not* closed transitively: A~B and B~C do not imply A~C.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use autotraq_core::{DomainError, DomainResult, PartId};

/// One unordered equivalence pair in canonical order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InterchangePair {
    low: PartId,
    high: PartId,
}

impl InterchangePair {
    pub fn new(a: PartId, b: PartId) -> DomainResult<Self> {
        if a == b {
            return Err(DomainError::validation(format!(
                "part {a} cannot be interchangeable with itself"
            )));
        }
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        Ok(Self { low, high })
    }

    pub fn low(&self) -> PartId {
        self.low
    }

    pub fn high(&self) -> PartId {
        self.high
    }

    pub fn contains(&self, id: PartId) -> bool {
        self.low == id || self.high == id
    }

    /// The opposite side of the pair, if `id` is one of its members.
    pub fn other(&self, id: PartId) -> Option<PartId> {
        if self.low == id {
            Some(self.high)
        } else if self.high == id {
            Some(self.low)
        } else {
            None
        }
    }
}

/// Command: LinkInterchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkInterchange {
    pub part_id: PartId,
    pub equivalent_ids: BTreeSet<PartId>,
}

impl LinkInterchange {
    pub fn new(part_id: PartId, equivalent_ids: impl IntoIterator<Item = PartId>) -> Self {
        Self {
            part_id,
            equivalent_ids: equivalent_ids.into_iter().collect(),
        }
    }

    /// Every id the store must resolve before linking (anchor first).
    pub fn referenced_ids(&self) -> impl Iterator<Item = PartId> + '_ {
        std::iter::once(self.part_id).chain(self.equivalent_ids.iter().copied())
    }

    /// Canonical pairs to insert.
    pub fn pairs(&self) -> DomainResult<Vec<InterchangePair>> {
        if self.equivalent_ids.is_empty() {
            return Err(DomainError::validation("at least one equivalent part is required"));
        }
        self.equivalent_ids
            .iter()
            .map(|&other| InterchangePair::new(self.part_id, other))
            .collect()
    }
}

/// A part together with everything directly equivalent to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interchange {
    part_id: PartId,
    equivalents: BTreeSet<PartId>,
}

impl Interchange {
    /// Collect the anchor's equivalents from pairs it appears in, on either side.
    /// Pairs not involving the anchor are ignored.
    pub fn from_pairs(part_id: PartId, pairs: impl IntoIterator<Item = InterchangePair>) -> Self {
        let equivalents = pairs.into_iter().filter_map(|p| p.other(part_id)).collect();
        Self {
            part_id,
            equivalents,
        }
    }

    pub fn part_id(&self) -> PartId {
        self.part_id
    }

    pub fn equivalents(&self) -> &BTreeSet<PartId> {
        &self.equivalents
    }

    pub fn is_equivalent(&self, other: PartId) -> bool {
        self.equivalents.contains(&other)
    }

    pub fn is_empty(&self) -> bool {
        self.equivalents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn pair_is_order_independent() {
        let a = PartId::new();
        let b = PartId::new();
        assert_eq!(InterchangePair::new(a, b).unwrap(), InterchangePair::new(b, a).unwrap());
    }

    #[test]
    fn self_pair_is_rejected() {
        let a = PartId::new();
        assert!(matches!(InterchangePair::new(a, a), Err(DomainError::Validation(_))));
    }

    #[test]
    fn link_requires_equivalents() {
        let link = LinkInterchange::new(PartId::new(), Vec::new());
        assert!(matches!(link.pairs(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn link_containing_anchor_is_rejected() {
        let anchor = PartId::new();
        let link = LinkInterchange::new(anchor, [PartId::new(), anchor]);
        assert!(link.pairs().is_err());
    }

    #[test]
    fn referenced_ids_lists_anchor_first() {
        let anchor = PartId::new();
        let other = PartId::new();
        let link = LinkInterchange::new(anchor, [other]);
        let ids: Vec<_> = link.referenced_ids().collect();
        assert_eq!(ids, vec![anchor, other]);
    }

    #[test]
    fn interchange_reads_both_sides_and_skips_unrelated_pairs() {
        let a = PartId::new();
        let b = PartId::new();
        let c = PartId::new();
        let d = PartId::new();
        let pairs = vec![
            InterchangePair::new(a, b).unwrap(),
            InterchangePair::new(c, a).unwrap(),
            InterchangePair::new(c, d).unwrap(),
        ];

        let of_a = Interchange::from_pairs(a, pairs.clone());
        assert_eq!(of_a.equivalents().len(), 2);
        assert!(of_a.is_equivalent(b) && of_a.is_equivalent(c));

        // Not transitive: b is only linked to a.
        let of_b = Interchange::from_pairs(b, pairs);
        assert_eq!(of_b.equivalents().iter().copied().collect::<Vec<_>>(), vec![a]);
    }

    fn ids(n: usize) -> Vec<PartId> {
        (0..n).map(|_| PartId::new()).collect()
    }

    proptest! {
        /// Property: whatever pairs are linked, x is equivalent to y exactly
        /// when y is equivalent to x.
        #[test]
        fn equivalence_is_symmetric(edges in prop::collection::vec((0usize..6, 0usize..6), 0..20)) {
            let parts = ids(6);
            let pairs: Vec<InterchangePair> = edges
                .into_iter()
                .filter_map(|(i, j)| InterchangePair::new(parts[i], parts[j]).ok())
                .collect();

            for &x in &parts {
                let of_x = Interchange::from_pairs(x, pairs.iter().copied());
                for &y in of_x.equivalents() {
                    let of_y = Interchange::from_pairs(y, pairs.iter().copied());
                    prop_assert!(of_y.is_equivalent(x));
                }
                prop_assert!(!of_x.is_equivalent(x));
            }
        }
    }
}
