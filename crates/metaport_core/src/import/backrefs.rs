//! Grouping of back-references into metafield writes

use std::collections::{BTreeMap, BTreeSet};

use crate::store::{MetafieldValue, MetafieldWrite};

/// One resolved back-reference, attributed to the report row it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PendingLink {
    pub owner_id: String,
    pub namespace: String,
    pub key: String,
    pub target_id: String,
    pub row: usize,
}

/// A metafield write and the rows whose outcome depends on it
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PlannedWrite {
    pub write: MetafieldWrite,
    pub rows: BTreeSet<usize>,
}

/// Group links by `(owner, namespace, key)`.
///
/// Targets are deduplicated in first-seen order. A group left with one
/// target is written as a single reference, anything more as a list; the
/// metafield definitions for the two shapes differ.
pub(crate) fn plan_writes(links: Vec<PendingLink>) -> Vec<PlannedWrite> {
    let mut groups: BTreeMap<(String, String, String), (Vec<String>, BTreeSet<usize>)> =
        BTreeMap::new();
    for link in links {
        let (targets, rows) = groups
            .entry((link.owner_id, link.namespace, link.key))
            .or_default();
        if !targets.contains(&link.target_id) {
            targets.push(link.target_id);
        }
        rows.insert(link.row);
    }

    groups
        .into_iter()
        .map(|((owner_id, namespace, key), (mut targets, rows))| {
            let value = if targets.len() == 1 {
                MetafieldValue::Single(targets.remove(0))
            } else {
                MetafieldValue::List(targets)
            };
            PlannedWrite {
                write: MetafieldWrite {
                    owner_id,
                    namespace,
                    key,
                    value,
                },
                rows,
            }
        })
        .collect()
}
