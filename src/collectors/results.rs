//! Result containers produced by the grouping, partitioning and
//! summarizing collectors.

use std::collections::HashMap;
use std::hash::Hash;

/// A map whose iteration order is the order in which keys were first seen.
#[derive(Debug, Clone)]
pub struct Groups<K, V> {
    index: HashMap<K, usize>,
    entries: Vec<(K, V)>,
}

impl<K, V> Default for Groups<K, V> {
    fn default() -> Self {
        Self {
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }
}

impl<K: Hash + Eq + Clone, V> Groups<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The value for `key`, inserting `init()` at the end if the key is new.
    pub fn get_or_insert_with<F: FnOnce() -> V>(&mut self, key: K, init: F) -> &mut V {
        let slot = match self.index.get(&key) {
            Some(&slot) => slot,
            None => {
                let slot = self.entries.len();
                self.index.insert(key.clone(), slot);
                self.entries.push((key, init()));
                slot
            }
        };
        &mut self.entries[slot].1
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.index.get(key).map(|&slot| &self.entries[slot].1)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Apply `f` to every value, keeping keys and order.
    pub fn map_values<R, F: FnMut(V) -> R>(self, mut f: F) -> Groups<K, R> {
        Groups {
            index: self.index,
            entries: self.entries.into_iter().map(|(k, v)| (k, f(v))).collect(),
        }
    }

    /// Drop the encounter order.
    pub fn into_hash_map(self) -> HashMap<K, V> {
        self.entries.into_iter().collect()
    }
}

impl<K, V> Groups<K, V> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, v)| v)
    }
}

impl<K, V> IntoIterator for Groups<K, V> {
    type Item = (K, V);
    type IntoIter = std::vec::IntoIter<(K, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Equal when both hold the same key/value pairs, regardless of order.
impl<K: Hash + Eq, V: PartialEq> PartialEq for Groups<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self.entries.iter().all(|(k, v)| {
                other
                    .index
                    .get(k)
                    .is_some_and(|&slot| other.entries[slot].1 == *v)
            })
    }
}

impl<K: Hash + Eq, V: Eq> Eq for Groups<K, V> {}

/// The two halves of a partition. Both are always present, even when empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Partitioned<R> {
    /// Elements for which the predicate held
    pub matched: R,
    /// Elements for which the predicate failed
    pub unmatched: R,
}

impl<R> Partitioned<R> {
    /// The partition for `key`
    pub fn get(&self, key: bool) -> &R {
        if key {
            &self.matched
        } else {
            &self.unmatched
        }
    }

    pub fn get_mut(&mut self, key: bool) -> &mut R {
        if key {
            &mut self.matched
        } else {
            &mut self.unmatched
        }
    }

    pub fn map<U, F: FnMut(R) -> U>(self, mut f: F) -> Partitioned<U> {
        Partitioned {
            matched: f(self.matched),
            unmatched: f(self.unmatched),
        }
    }

    /// Both partitions keyed by the predicate outcome.
    pub fn into_map(self) -> HashMap<bool, R> {
        HashMap::from([(true, self.matched), (false, self.unmatched)])
    }
}

/// Count, sum, min, max and average of a numeric extraction.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Statistics {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
}

impl Default for Statistics {
    fn default() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl Statistics {
    pub fn record(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn merge(&mut self, other: &Statistics) {
        self.count += other.count;
        self.sum += other.sum;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// The smallest value, if anything was recorded
    pub fn min(&self) -> Option<f64> {
        (self.count > 0).then_some(self.min)
    }

    /// The largest value, if anything was recorded
    pub fn max(&self) -> Option<f64> {
        (self.count > 0).then_some(self.max)
    }

    /// Arithmetic mean; 0.0 when nothing was recorded
    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}
