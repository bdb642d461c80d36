use std::collections::HashMap;
use std::hash::Hash;

/// Removes repeated items, keeping the first occurrence of each.
pub fn distinct<T: PartialEq + Copy>(items: &[T]) -> Vec<T> {
    let mut seen: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        if !seen.contains(item) {
            seen.push(*item);
        }
    }
    seen
}

/// Every unordered pair of `items`, in lexicographic index order.
pub fn co_purchase_pairs<T: Copy>(items: &[T]) -> Vec<(T, T)> {
    let mut pairs = Vec::with_capacity(items.len() * items.len().saturating_sub(1) / 2);
    for (index, first) in items.iter().enumerate() {
        for second in &items[index + 1..] {
            pairs.push((*first, *second));
        }
    }
    pairs
}

/// Reorders `items` to follow `ranked_keys`.
///
/// Items whose key is not ranked are dropped. Bulk reads that ignore the
/// caller's ordering can be restored with this.
pub fn order_by_rank<T, K, F>(ranked_keys: &[K], items: Vec<T>, key_of: F) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> &K,
{
    let positions: HashMap<&K, usize> =
        ranked_keys.iter().enumerate().map(|(position, key)| (key, position)).collect();

    let mut ranked: Vec<(usize, T)> = items
        .into_iter()
        .filter_map(|item| positions.get(key_of(&item)).copied().map(|position| (position, item)))
        .collect();
    ranked.sort_by_key(|(position, _)| *position);
    ranked.into_iter().map(|(_, item)| item).collect()
}

/// Converts a store score into an integral co-purchase weight.
pub fn weight_from_score(score: f64) -> u64 {
    if score.is_finite() && score > 0.0 {
        score.round() as u64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::{co_purchase_pairs, distinct, order_by_rank, weight_from_score};

    #[test]
    fn pairs_cover_every_combination_once() {
        assert_eq!(co_purchase_pairs(&[1, 2, 3]), vec![(1, 2), (1, 3), (2, 3)]);
        assert_eq!(co_purchase_pairs(&[1, 2, 3, 4]).len(), 6);
    }

    #[test]
    fn pairs_of_small_inputs_are_empty() {
        assert!(co_purchase_pairs::<i64>(&[]).is_empty());
        assert!(co_purchase_pairs(&[9]).is_empty());
    }

    #[test]
    fn distinct_keeps_first_occurrence_order() {
        assert_eq!(distinct(&[3, 1, 3, 2, 1]), vec![3, 1, 2]);
    }

    #[test]
    fn order_by_rank_restores_caller_order_and_drops_unranked() {
        let fetched = vec![(1, "one"), (5, "five"), (3, "three"), (2, "two")];
        let ordered = order_by_rank(&[3, 9, 1, 2], fetched, |item| &item.0);

        assert_eq!(ordered, vec![(3, "three"), (1, "one"), (2, "two")]);
    }

    #[test]
    fn weights_are_rounded_and_never_negative() {
        assert_eq!(weight_from_score(2.0), 2);
        assert_eq!(weight_from_score(2.9999999), 3);
        assert_eq!(weight_from_score(-1.0), 0);
        assert_eq!(weight_from_score(f64::NAN), 0);
    }
}
