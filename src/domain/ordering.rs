//! Seniority ordering for preferred securities.

use crate::domain::{PreferredSeries, PreferredShareClass, SecurityId, SeniorityRank};
use std::collections::BTreeMap;
use thiserror::Error;

/// Anything paid in seniority order.
pub trait Ranked {
    fn seniority_rank(&self) -> SeniorityRank;
    fn security_id(&self) -> &SecurityId;
}

impl Ranked for PreferredSeries {
    fn seniority_rank(&self) -> SeniorityRank {
        self.seniority_rank
    }

    fn security_id(&self) -> &SecurityId {
        &self.id
    }
}

impl Ranked for PreferredShareClass {
    fn seniority_rank(&self) -> SeniorityRank {
        self.seniority_rank
    }

    fn security_id(&self) -> &SecurityId {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("seniority rank {rank} is shared by {first} and {second}")]
pub struct DuplicateRank {
    pub rank: SeniorityRank,
    pub first: SecurityId,
    pub second: SecurityId,
}

/// Check that no two items share a rank.
pub fn ensure_unique_ranks<T: Ranked>(items: &[T]) -> Result<(), DuplicateRank> {
    let mut seen: BTreeMap<SeniorityRank, &SecurityId> = BTreeMap::new();
    for item in items {
        if let Some(first) = seen.insert(item.seniority_rank(), item.security_id()) {
            return Err(DuplicateRank {
                rank: item.seniority_rank(),
                first: first.clone(),
                second: item.security_id().clone(),
            });
        }
    }
    Ok(())
}

/// Most senior first. Ranks are checked for uniqueness before sorting, so
/// the order is total.
pub fn sort_by_seniority<T: Ranked>(items: &[T]) -> Result<Vec<&T>, DuplicateRank> {
    ensure_unique_ranks(items)?;
    let mut ordered: Vec<&T> = items.iter().collect();
    ordered.sort_by_key(|item| item.seniority_rank());
    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Tranche {
        id: SecurityId,
        rank: SeniorityRank,
    }

    impl Ranked for Tranche {
        fn seniority_rank(&self) -> SeniorityRank {
            self.rank
        }

        fn security_id(&self) -> &SecurityId {
            &self.id
        }
    }

    fn tranche(id: &str, rank: u32) -> Tranche {
        Tranche {
            id: SecurityId::new(id),
            rank: SeniorityRank::new(rank),
        }
    }

    #[test]
    fn test_sort_most_senior_first() {
        let items = vec![tranche("c", 3), tranche("a", 1), tranche("b", 2)];
        let ordered = sort_by_seniority(&items).unwrap();
        let ids: Vec<&str> = ordered.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_duplicate_rank_rejected() {
        let items = vec![tranche("a", 1), tranche("b", 2), tranche("c", 1)];
        let err = sort_by_seniority(&items).unwrap_err();
        assert_eq!(err.rank, SeniorityRank::new(1));
        assert_eq!(err.first, SecurityId::new("a"));
        assert_eq!(err.second, SecurityId::new("c"));
    }

    #[test]
    fn test_empty_is_ordered() {
        let items: Vec<Tranche> = Vec::new();
        assert!(sort_by_seniority(&items).unwrap().is_empty());
    }
}
