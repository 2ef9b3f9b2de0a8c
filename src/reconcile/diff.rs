//! Set difference between desired and observed CIDRs.

use std::collections::BTreeSet;

use crate::net::Cidr;

/// Operations needed to turn the observed set into the desired one.
///
/// Both lists are sorted and disjoint; entries present on both sides are
/// left out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    pub to_add: Vec<Cidr>,
    pub to_remove: Vec<Cidr>,
}

impl Diff {
    pub fn between(desired: &BTreeSet<Cidr>, observed: &BTreeSet<Cidr>) -> Self {
        Self {
            to_add: desired.difference(observed).copied().collect(),
            to_remove: observed.difference(desired).copied().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    pub fn len(&self) -> usize {
        self.to_add.len() + self.to_remove.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<Cidr> {
        items.iter().map(|s| s.parse().unwrap()).collect()
    }

    #[test]
    fn test_symmetric_difference() {
        let desired = set(&["1.1.1.1/32", "2.2.0.0/16", "8.8.0.0/16"]);
        let observed = set(&["2.2.0.0/16", "3.3.3.0/24"]);

        let diff = Diff::between(&desired, &observed);
        assert_eq!(diff.to_add, set(&["1.1.1.1/32", "8.8.0.0/16"]).into_iter().collect::<Vec<_>>());
        assert_eq!(diff.to_remove, set(&["3.3.3.0/24"]).into_iter().collect::<Vec<_>>());
        assert_eq!(diff.len(), 3);
        assert!(diff.to_add.iter().all(|c| !diff.to_remove.contains(c)));
    }

    #[test]
    fn test_equal_sets_produce_empty_diff() {
        let both = set(&["10.0.0.0/8", "fd00::/8"]);
        assert!(Diff::between(&both, &both).is_empty());
    }

    #[test]
    fn test_empty_desired_removes_everything() {
        let observed = set(&["1.1.1.1/32", "2.2.0.0/16"]);
        let diff = Diff::between(&BTreeSet::new(), &observed);

        assert!(diff.to_add.is_empty());
        assert_eq!(diff.to_remove.len(), 2);
    }
}
