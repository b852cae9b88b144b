//! Helpers for batch functions: re-associate unordered rows with their keys.
//!
//! Storage returns rows for `key IN (...)` in no particular order. These
//! helpers build the index-aligned result vector a batch function must return.

use std::collections::HashMap;
use std::hash::Hash;

/// Groups rows under the key they belong to, producing one group per key in
/// key order. Keys without rows get an empty group.
pub fn group_by_key<K, T, I, F>(keys: &[K], rows: I, key_of: F) -> Vec<Vec<T>>
where
    K: Eq + Hash,
    T: Clone,
    I: IntoIterator<Item = T>,
    F: Fn(&T) -> K,
{
    let mut groups: HashMap<K, Vec<T>> = HashMap::with_capacity(keys.len());
    for row in rows {
        groups.entry(key_of(&row)).or_default().push(row);
    }
    keys.iter()
        .map(|key| groups.get(key).cloned().unwrap_or_default())
        .collect()
}

/// Matches at most one row to each key, producing `None` for absent keys.
pub fn pick_by_key<K, T, I, F>(keys: &[K], rows: I, key_of: F) -> Vec<Option<T>>
where
    K: Eq + Hash,
    T: Clone,
    I: IntoIterator<Item = T>,
    F: Fn(&T) -> K,
{
    let by_key: HashMap<K, T> = rows.into_iter().map(|row| (key_of(&row), row)).collect();
    keys.iter().map(|key| by_key.get(key).cloned()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_by_key_follows_key_order_not_row_order() {
        let rows = vec![(2, "c"), (1, "a"), (3, "d"), (1, "b")];
        let grouped = group_by_key(&[3, 1, 2, 4], rows, |row| row.0);

        assert_eq!(grouped[0], vec![(3, "d")]);
        assert_eq!(grouped[1], vec![(1, "a"), (1, "b")]);
        assert_eq!(grouped[2], vec![(2, "c")]);
        assert!(grouped[3].is_empty(), "key without rows yields an empty group");
    }

    #[test]
    fn test_pick_by_key_marks_missing_keys() {
        let rows = vec![(7, "seven"), (5, "five")];
        let picked = pick_by_key(&[5, 6, 7], rows, |row| row.0);
        assert_eq!(picked, vec![Some((5, "five")), None, Some((7, "seven"))]);
    }
}
