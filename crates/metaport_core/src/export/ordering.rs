//! Dependency ordering of exported entries

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use tracing::debug;

use super::types::ExportEntry;
use crate::reference::{ReferenceKind, is_metaobject_id};

/// Order entries so each comes after the metaobject entries it references.
///
/// `source_ids` maps source store ids still present in field values to the
/// position of the entry they belong to. Ties keep the original order. An
/// entry in a cycle, or with a metaobject dependency outside the set, is
/// appended after the ordered entries, as is anything depending on it.
pub fn order_entries(
    entries: Vec<ExportEntry>,
    source_ids: &HashMap<String, usize>,
) -> Vec<ExportEntry> {
    let mut positions = HashMap::new();
    for (index, entry) in entries.iter().enumerate() {
        positions.entry(entry.symbolic_ref()).or_insert(index);
    }

    let count = entries.len();
    let mut in_degree = vec![0usize; count];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];
    let mut blocked = vec![false; count];

    for (index, entry) in entries.iter().enumerate() {
        let mut deps = Vec::new();
        for reference in entry.references() {
            if reference.kind() != ReferenceKind::Metaobject {
                continue;
            }
            match positions.get(&reference) {
                Some(&dep) => deps.push(dep),
                None => blocked[index] = true,
            }
        }
        for id in entry.opaque_ids() {
            if !is_metaobject_id(&id) {
                continue;
            }
            match source_ids.get(&id) {
                Some(&dep) => deps.push(dep),
                None => blocked[index] = true,
            }
        }

        deps.sort_unstable();
        deps.dedup();
        for dep in deps {
            if dep == index {
                blocked[index] = true;
                continue;
            }
            in_degree[index] += 1;
            dependents[dep].push(index);
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = (0..count)
        .filter(|&i| in_degree[i] == 0 && !blocked[i])
        .map(Reverse)
        .collect();
    let mut order = Vec::with_capacity(count);
    let mut placed = vec![false; count];

    while let Some(Reverse(index)) = ready.pop() {
        order.push(index);
        placed[index] = true;
        for &dependent in &dependents[index] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 && !blocked[dependent] {
                ready.push(Reverse(dependent));
            }
        }
    }

    let leftovers: Vec<usize> = (0..count).filter(|&i| !placed[i]).collect();
    if !leftovers.is_empty() {
        debug!(
            "{} entr(ies) left unordered (cycle or external dependency)",
            leftovers.len()
        );
    }
    order.extend(leftovers);

    let mut slots: Vec<Option<ExportEntry>> = entries.into_iter().map(Some).collect();
    order
        .into_iter()
        .filter_map(|index| slots[index].take())
        .collect()
}
