use std::{
    collections::{
        HashMap,
        VecDeque,
    },
    hash::Hash,
};

/// Spreads items that share a key across the order.
///
/// Items with a key are candidates. Candidates are grouped by key (groups ordered by their first
/// appearance) and dealt round-robin back into the slots candidates occupied, so every group
/// keeps its internal order. Items without a key keep their position.
pub fn disperse<T, K, F>(items: Vec<T>, key_of: F) -> Vec<T>
where
    K: Eq + Hash + Clone,
    F: Fn(&T) -> Option<K>,
{
    let mut slots: Vec<usize> = Vec::new();
    let mut group_order: Vec<K> = Vec::new();
    let mut groups: HashMap<K, VecDeque<usize>> = HashMap::new();

    for (index, item) in items.iter().enumerate() {
        let Some(key) = key_of(item) else {
            continue;
        };
        slots.push(index);
        groups
            .entry(key.clone())
            .or_insert_with(|| {
                group_order.push(key);
                VecDeque::new()
            })
            .push_back(index);
    }

    if group_order.len() < 2 {
        return items;
    }

    let mut dealt: Vec<usize> = Vec::with_capacity(slots.len());
    while dealt.len() < slots.len() {
        for key in &group_order {
            if let Some(index) = groups.get_mut(key).and_then(|g| g.pop_front()) {
                dealt.push(index);
            }
        }
    }

    let mut placement: Vec<usize> = (0..items.len()).collect();
    for (slot, source) in slots.into_iter().zip(dealt) {
        placement[slot] = source;
    }

    let mut taken: Vec<Option<T>> = items.into_iter().map(Some).collect();
    placement.into_iter().filter_map(|source| taken[source].take()).collect()
}
