use std::collections::BTreeMap;

use serde::Serialize;

use crate::cache::CacheStore;
use crate::filter::sorted_desc;
use crate::model::{EventRecord, Group};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    /// Camera events only.
    pub total_events: usize,
    /// History entries per group (for devices, inventory size).
    pub per_group_counts: BTreeMap<Group, usize>,
}

pub fn dashboard_stats(cache: &CacheStore) -> DashboardStats {
    let mut per_group_counts: BTreeMap<Group, usize> =
        Group::ALL.into_iter().map(|g| (g, 0)).collect();
    for group in Group::ALL {
        let count = cache
            .entities(group)
            .map(|(_, rec)| rec.history.len())
            .sum();
        per_group_counts.insert(group, count);
    }
    DashboardStats {
        total_events: per_group_counts[&Group::Cameras],
        per_group_counts,
    }
}

/// Most recent `n` camera events across every camera, newest first.
pub fn latest_events(cache: &CacheStore, n: usize) -> Vec<&EventRecord> {
    let mut out = sorted_desc(
        cache
            .entities(Group::Cameras)
            .flat_map(|(_, rec)| rec.history.iter()),
    );
    out.truncate(n);
    out
}
