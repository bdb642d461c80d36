use std::cmp::Ordering;
use std::collections::HashMap;

use tokio::sync::RwLock;

use cobuy_core::ports::{RankedStore, ScoreIncrement, ScoredMember, StoreError};

type RankedSet = HashMap<String, f64>;

/// Process-local ranked store with Redis sorted-set semantics.
///
/// Ties in score are broken by member in descending byte order, the order a
/// Redis `ZREVRANGE` returns them in.
#[derive(Default)]
pub struct InMemoryRankedStore {
    sets: RwLock<HashMap<String, RankedSet>>,
}

impl InMemoryRankedStore {
    pub async fn keys(&self) -> Vec<String> {
        let mut keys = self.sets.read().await.keys().cloned().collect::<Vec<_>>();
        keys.sort();
        keys
    }

    pub async fn len(&self) -> usize {
        self.sets.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sets.read().await.is_empty()
    }
}

fn descending(set: &RankedSet) -> Vec<ScoredMember> {
    let mut members = set
        .iter()
        .map(|(member, score)| ScoredMember::new(member.clone(), *score))
        .collect::<Vec<_>>();
    members.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.member.cmp(&a.member))
    });
    members
}

/// Inclusive rank bounds resolved the way Redis resolves `ZRANGE` indices.
fn resolve_bounds(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = isize::try_from(len).ok()?;
    if len == 0 {
        return None;
    }

    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len {
        return None;
    }

    Some((usize::try_from(start).ok()?, usize::try_from(stop).ok()?))
}

#[async_trait::async_trait]
impl RankedStore for InMemoryRankedStore {
    async fn increment(&self, key: &str, member: &str, delta: f64) -> Result<f64, StoreError> {
        let mut sets = self.sets.write().await;
        let score =
            sets.entry(key.to_string()).or_default().entry(member.to_string()).or_insert(0.0);
        *score += delta;
        Ok(*score)
    }

    async fn increment_batch(&self, increments: &[ScoreIncrement]) -> Result<(), StoreError> {
        let mut sets = self.sets.write().await;
        for increment in increments {
            *sets
                .entry(increment.key.clone())
                .or_default()
                .entry(increment.member.clone())
                .or_insert(0.0) += increment.delta;
        }
        Ok(())
    }

    async fn range_by_score_desc(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<ScoredMember>, StoreError> {
        let sets = self.sets.read().await;
        let Some(set) = sets.get(key) else {
            return Ok(Vec::new());
        };

        let ranked = descending(set);
        let Some((start, stop)) = resolve_bounds(ranked.len(), start, stop) else {
            return Ok(Vec::new());
        };
        Ok(ranked.into_iter().skip(start).take(stop - start + 1).collect())
    }

    async fn union_store(&self, dest: &str, sources: &[String]) -> Result<usize, StoreError> {
        let mut sets = self.sets.write().await;

        let mut union = RankedSet::new();
        for source in sources {
            if let Some(set) = sets.get(source) {
                for (member, score) in set {
                    *union.entry(member.clone()).or_insert(0.0) += score;
                }
            }
        }

        let size = union.len();
        if union.is_empty() {
            sets.remove(dest);
        } else {
            sets.insert(dest.to_string(), union);
        }
        Ok(size)
    }

    async fn remove_members(&self, key: &str, members: &[String]) -> Result<usize, StoreError> {
        let mut sets = self.sets.write().await;
        let Some(set) = sets.get_mut(key) else {
            return Ok(0);
        };

        let removed = members.iter().filter(|member| set.remove(member.as_str()).is_some()).count();
        if set.is_empty() {
            sets.remove(key);
        }
        Ok(removed)
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.sets.write().await.remove(key).is_some())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.sets.read().await.contains_key(key))
    }

    async fn score(&self, key: &str, member: &str) -> Result<Option<f64>, StoreError> {
        Ok(self.sets.read().await.get(key).and_then(|set| set.get(member)).copied())
    }
}

#[cfg(test)]
mod tests {
    use cobuy_core::ports::{RankedStore, ScoreIncrement, ScoredMember};

    use super::{resolve_bounds, InMemoryRankedStore};

    async fn seeded() -> InMemoryRankedStore {
        let store = InMemoryRankedStore::default();
        store.increment("a", "x", 3.0).await.expect("x");
        store.increment("a", "y", 1.0).await.expect("y");
        store.increment("a", "z", 2.0).await.expect("z");
        store
    }

    #[test]
    fn bounds_follow_redis_index_rules() {
        assert_eq!(resolve_bounds(3, 0, -1), Some((0, 2)));
        assert_eq!(resolve_bounds(3, 0, 10), Some((0, 2)));
        assert_eq!(resolve_bounds(3, -2, -1), Some((1, 2)));
        assert_eq!(resolve_bounds(3, -10, 0), Some((0, 0)));
        assert_eq!(resolve_bounds(3, 3, 5), None);
        assert_eq!(resolve_bounds(3, 2, 1), None);
        assert_eq!(resolve_bounds(0, 0, -1), None);
    }

    #[tokio::test]
    async fn increment_accumulates_and_returns_new_score() {
        let store = InMemoryRankedStore::default();
        assert_eq!(store.increment("k", "m", 1.0).await.expect("first"), 1.0);
        assert_eq!(store.increment("k", "m", 2.5).await.expect("second"), 3.5);
        assert_eq!(store.score("k", "m").await.expect("score"), Some(3.5));
        assert_eq!(store.score("k", "missing").await.expect("score"), None);
    }

    #[tokio::test]
    async fn range_reads_highest_scores_first() {
        let store = seeded().await;

        let all = store.range_by_score_desc("a", 0, -1).await.expect("range");
        assert_eq!(
            all,
            vec![
                ScoredMember::new("x", 3.0),
                ScoredMember::new("z", 2.0),
                ScoredMember::new("y", 1.0)
            ]
        );

        let top = store.range_by_score_desc("a", 0, 0).await.expect("range");
        assert_eq!(top, vec![ScoredMember::new("x", 3.0)]);
        assert!(store.range_by_score_desc("missing", 0, -1).await.expect("range").is_empty());
    }

    #[tokio::test]
    async fn equal_scores_fall_back_to_descending_member_order() {
        let store = InMemoryRankedStore::default();
        for member in ["10", "2", "3"] {
            store.increment("k", member, 1.0).await.expect("increment");
        }

        let members = store
            .range_by_score_desc("k", 0, -1)
            .await
            .expect("range")
            .into_iter()
            .map(|entry| entry.member)
            .collect::<Vec<_>>();
        assert_eq!(members, vec!["3", "2", "10"]);
    }

    #[tokio::test]
    async fn union_sums_scores_and_replaces_destination() {
        let store = seeded().await;
        store.increment("b", "x", 1.0).await.expect("x");
        store.increment("b", "w", 5.0).await.expect("w");
        store.increment("dest", "stale", 9.0).await.expect("stale");

        let size = store
            .union_store("dest", &["a".to_string(), "b".to_string(), "missing".to_string()])
            .await
            .expect("union");

        assert_eq!(size, 4);
        assert_eq!(store.score("dest", "x").await.expect("score"), Some(4.0));
        assert_eq!(store.score("dest", "w").await.expect("score"), Some(5.0));
        assert_eq!(store.score("dest", "stale").await.expect("score"), None);
    }

    #[tokio::test]
    async fn empty_union_leaves_no_key_behind() {
        let store = InMemoryRankedStore::default();
        store.increment("dest", "stale", 1.0).await.expect("stale");

        let size = store.union_store("dest", &["nothing".to_string()]).await.expect("union");

        assert_eq!(size, 0);
        assert!(!store.exists("dest").await.expect("exists"));
    }

    #[tokio::test]
    async fn removing_last_member_deletes_the_key() {
        let store = seeded().await;

        let removed = store
            .remove_members("a", &["x".to_string(), "y".to_string(), "nope".to_string()])
            .await
            .expect("remove");
        assert_eq!(removed, 2);
        assert!(store.exists("a").await.expect("exists"));

        store.remove_members("a", &["z".to_string()]).await.expect("remove");
        assert!(!store.exists("a").await.expect("exists"));
        assert_eq!(store.remove_members("a", &["z".to_string()]).await.expect("remove"), 0);
    }

    #[tokio::test]
    async fn batch_applies_every_increment() {
        let store = InMemoryRankedStore::default();
        let batch = [
            ScoreIncrement { key: "p:1".to_string(), member: "2".to_string(), delta: 1.0 },
            ScoreIncrement { key: "p:2".to_string(), member: "1".to_string(), delta: 1.0 },
        ];

        store.increment_batch(&batch).await.expect("batch");
        store.increment_batch(&batch).await.expect("batch");

        assert_eq!(store.score("p:1", "2").await.expect("score"), Some(2.0));
        assert_eq!(store.score("p:2", "1").await.expect("score"), Some(2.0));
        assert_eq!(store.keys().await, vec!["p:1".to_string(), "p:2".to_string()]);
    }

    #[tokio::test]
    async fn delete_reports_whether_key_existed() {
        let store = seeded().await;
        assert!(store.delete("a").await.expect("delete"));
        assert!(!store.delete("a").await.expect("delete"));
        assert!(store.is_empty().await);
    }
}
