//! Collectors that hold a downstream collector: grouping, partitioning and
//! the element adapters `mapping`, `filtering` and `flat_mapping`.

use std::collections::BTreeMap;
use std::hash::Hash;
use std::marker::PhantomData;

use super::results::{Groups, Partitioned};
use super::{to_list, Collector, ToList};
use crate::error::Result;

/// Groups elements by a classifier, reducing every group with a downstream
/// collector. Keys keep the order in which they were first seen.
pub struct GroupingBy<T, K, F, D> {
    classifier: F,
    downstream: D,
    _phantom: PhantomData<fn(T) -> K>,
}

impl<T, K, F, D> Collector<T> for GroupingBy<T, K, F, D>
where
    K: Hash + Eq + Clone,
    F: Fn(&T) -> K,
    D: Collector<T>,
{
    type Container = Groups<K, D::Container>;
    type Output = Groups<K, D::Output>;

    fn create_container(&self) -> Self::Container {
        Groups::new()
    }

    fn accumulate(&self, container: &mut Self::Container, item: T) -> Result<()> {
        let key = (self.classifier)(&item);
        let group = container.get_or_insert_with(key, || self.downstream.create_container());
        self.downstream.accumulate(group, item)
    }

    fn combine(
        &self,
        mut left: Self::Container,
        right: Self::Container,
    ) -> Result<Self::Container> {
        for (key, group) in right {
            let slot = left.get_or_insert_with(key, || self.downstream.create_container());
            let existing = std::mem::replace(slot, self.downstream.create_container());
            *slot = self.downstream.combine(existing, group)?;
        }
        Ok(left)
    }

    fn finish(&self, container: Self::Container) -> Self::Output {
        container.map_values(|group| self.downstream.finish(group))
    }
}

/// Like [`GroupingBy`], with keys in sorted order.
pub struct GroupingByOrdered<T, K, F, D> {
    classifier: F,
    downstream: D,
    _phantom: PhantomData<fn(T) -> K>,
}

impl<T, K, F, D> Collector<T> for GroupingByOrdered<T, K, F, D>
where
    K: Ord,
    F: Fn(&T) -> K,
    D: Collector<T>,
{
    type Container = BTreeMap<K, D::Container>;
    type Output = BTreeMap<K, D::Output>;

    fn create_container(&self) -> Self::Container {
        BTreeMap::new()
    }

    fn accumulate(&self, container: &mut Self::Container, item: T) -> Result<()> {
        let group = container
            .entry((self.classifier)(&item))
            .or_insert_with(|| self.downstream.create_container());
        self.downstream.accumulate(group, item)
    }

    fn combine(
        &self,
        mut left: Self::Container,
        right: Self::Container,
    ) -> Result<Self::Container> {
        for (key, group) in right {
            let merged = match left.remove(&key) {
                Some(existing) => self.downstream.combine(existing, group)?,
                None => group,
            };
            left.insert(key, merged);
        }
        Ok(left)
    }

    fn finish(&self, container: Self::Container) -> Self::Output {
        container
            .into_iter()
            .map(|(key, group)| (key, self.downstream.finish(group)))
            .collect()
    }
}

/// Splits elements by a predicate. Both halves are always present.
pub struct PartitioningBy<T, P, D> {
    predicate: P,
    downstream: D,
    _phantom: PhantomData<fn(T)>,
}

impl<T, P, D> Collector<T> for PartitioningBy<T, P, D>
where
    P: Fn(&T) -> bool,
    D: Collector<T>,
{
    type Container = Partitioned<D::Container>;
    type Output = Partitioned<D::Output>;

    fn create_container(&self) -> Self::Container {
        Partitioned {
            matched: self.downstream.create_container(),
            unmatched: self.downstream.create_container(),
        }
    }

    fn accumulate(&self, container: &mut Self::Container, item: T) -> Result<()> {
        let half = container.get_mut((self.predicate)(&item));
        self.downstream.accumulate(half, item)
    }

    fn combine(&self, left: Self::Container, right: Self::Container) -> Result<Self::Container> {
        Ok(Partitioned {
            matched: self.downstream.combine(left.matched, right.matched)?,
            unmatched: self.downstream.combine(left.unmatched, right.unmatched)?,
        })
    }

    fn finish(&self, container: Self::Container) -> Self::Output {
        container.map(|half| self.downstream.finish(half))
    }
}

/// Transforms each element before handing it to the downstream collector
pub struct Mapping<T, U, F, D> {
    f: F,
    downstream: D,
    _phantom: PhantomData<fn(T) -> U>,
}

impl<T, U, F, D> Collector<T> for Mapping<T, U, F, D>
where
    F: Fn(T) -> U,
    D: Collector<U>,
{
    type Container = D::Container;
    type Output = D::Output;

    fn create_container(&self) -> D::Container {
        self.downstream.create_container()
    }

    fn accumulate(&self, container: &mut D::Container, item: T) -> Result<()> {
        self.downstream.accumulate(container, (self.f)(item))
    }

    fn combine(&self, left: D::Container, right: D::Container) -> Result<D::Container> {
        self.downstream.combine(left, right)
    }

    fn finish(&self, container: D::Container) -> D::Output {
        self.downstream.finish(container)
    }
}

/// Hands only matching elements to the downstream collector
pub struct Filtering<T, P, D> {
    predicate: P,
    downstream: D,
    _phantom: PhantomData<fn(T)>,
}

impl<T, P, D> Collector<T> for Filtering<T, P, D>
where
    P: Fn(&T) -> bool,
    D: Collector<T>,
{
    type Container = D::Container;
    type Output = D::Output;

    fn create_container(&self) -> D::Container {
        self.downstream.create_container()
    }

    fn accumulate(&self, container: &mut D::Container, item: T) -> Result<()> {
        if (self.predicate)(&item) {
            self.downstream.accumulate(container, item)
        } else {
            Ok(())
        }
    }

    fn combine(&self, left: D::Container, right: D::Container) -> Result<D::Container> {
        self.downstream.combine(left, right)
    }

    fn finish(&self, container: D::Container) -> D::Output {
        self.downstream.finish(container)
    }
}

/// Hands every element of `f(item)` to the downstream collector
pub struct FlatMapping<T, I, F, D> {
    f: F,
    downstream: D,
    _phantom: PhantomData<fn(T) -> I>,
}

impl<T, I, F, D> Collector<T> for FlatMapping<T, I, F, D>
where
    I: IntoIterator,
    F: Fn(T) -> I,
    D: Collector<I::Item>,
{
    type Container = D::Container;
    type Output = D::Output;

    fn create_container(&self) -> D::Container {
        self.downstream.create_container()
    }

    fn accumulate(&self, container: &mut D::Container, item: T) -> Result<()> {
        for inner in (self.f)(item) {
            self.downstream.accumulate(container, inner)?;
        }
        Ok(())
    }

    fn combine(&self, left: D::Container, right: D::Container) -> Result<D::Container> {
        self.downstream.combine(left, right)
    }

    fn finish(&self, container: D::Container) -> D::Output {
        self.downstream.finish(container)
    }
}

/// Group into lists by `classifier`.
pub fn grouping_by<T, K, F>(classifier: F) -> GroupingBy<T, K, F, ToList<T>>
where
    K: Hash + Eq + Clone,
    F: Fn(&T) -> K,
{
    grouping_by_with(classifier, to_list())
}

/// Group by `classifier`, reducing each group with `downstream`.
pub fn grouping_by_with<T, K, F, D>(classifier: F, downstream: D) -> GroupingBy<T, K, F, D>
where
    K: Hash + Eq + Clone,
    F: Fn(&T) -> K,
    D: Collector<T>,
{
    GroupingBy {
        classifier,
        downstream,
        _phantom: PhantomData,
    }
}

/// Group by `classifier` into a key-ordered map.
pub fn grouping_by_ordered<T, K, F, D>(
    classifier: F,
    downstream: D,
) -> GroupingByOrdered<T, K, F, D>
where
    K: Ord,
    F: Fn(&T) -> K,
    D: Collector<T>,
{
    GroupingByOrdered {
        classifier,
        downstream,
        _phantom: PhantomData,
    }
}

pub fn partitioning_by<T, P>(predicate: P) -> PartitioningBy<T, P, ToList<T>>
where
    P: Fn(&T) -> bool,
{
    partitioning_by_with(predicate, to_list())
}

pub fn partitioning_by_with<T, P, D>(predicate: P, downstream: D) -> PartitioningBy<T, P, D>
where
    P: Fn(&T) -> bool,
    D: Collector<T>,
{
    PartitioningBy {
        predicate,
        downstream,
        _phantom: PhantomData,
    }
}

pub fn mapping<T, U, F, D>(f: F, downstream: D) -> Mapping<T, U, F, D>
where
    F: Fn(T) -> U,
    D: Collector<U>,
{
    Mapping {
        f,
        downstream,
        _phantom: PhantomData,
    }
}

pub fn filtering<T, P, D>(predicate: P, downstream: D) -> Filtering<T, P, D>
where
    P: Fn(&T) -> bool,
    D: Collector<T>,
{
    Filtering {
        predicate,
        downstream,
        _phantom: PhantomData,
    }
}

pub fn flat_mapping<T, I, F, D>(f: F, downstream: D) -> FlatMapping<T, I, F, D>
where
    I: IntoIterator,
    F: Fn(T) -> I,
    D: Collector<I::Item>,
{
    FlatMapping {
        f,
        downstream,
        _phantom: PhantomData,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::{collect_iter, counting, joining, summing, to_set};

    #[test]
    fn test_grouping_by_length_counts() {
        let collector = grouping_by_with(|s: &&str| s.len(), counting());
        let groups = collect_iter(&collector, vec!["A", "BB", "CCC", "DD"]).unwrap();
        let mut pairs: Vec<_> = groups.into_iter().collect();
        pairs.sort();
        assert_eq!(pairs, vec![(1, 1), (2, 2), (3, 1)]);
    }

    #[test]
    fn test_grouping_by_default_lists() {
        let collector = grouping_by(|n: &i32| n % 3);
        let groups = collect_iter(&collector, 1..=7).unwrap();
        assert_eq!(groups.keys().copied().collect::<Vec<_>>(), vec![1, 2, 0]);
        assert_eq!(groups.get(&1), Some(&vec![1, 4, 7]));
    }

    #[test]
    fn test_grouping_combine_merges_per_key() {
        let collector = grouping_by(|n: &i32| n % 2 == 0);
        let mut left = collector.create_container();
        for n in [1, 2] {
            collector.accumulate(&mut left, n).unwrap();
        }
        let mut right = collector.create_container();
        for n in [3, 4, 6] {
            collector.accumulate(&mut right, n).unwrap();
        }
        let groups = collector.finish(collector.combine(left, right).unwrap());
        assert_eq!(groups.get(&false), Some(&vec![1, 3]));
        assert_eq!(groups.get(&true), Some(&vec![2, 4, 6]));
    }

    #[test]
    fn test_grouping_by_ordered() {
        let collector = grouping_by_ordered(|s: &&str| s.chars().next(), joining("", "", ""));
        let groups = collect_iter(&collector, vec!["b1", "a1", "b2"]).unwrap();
        let flat: Vec<_> = groups.into_iter().collect();
        assert_eq!(
            flat,
            vec![(Some('a'), "a1".to_string()), (Some('b'), "b1b2".to_string())]
        );
    }

    #[test]
    fn test_partitioning_always_has_both_halves() {
        let parts = collect_iter(&partitioning_by(|n: &i32| n % 2 == 0), vec![1, 2, 3]).unwrap();
        assert_eq!(parts.get(true), &vec![2]);
        assert_eq!(parts.get(false), &vec![1, 3]);

        let none = collect_iter(&partitioning_by(|n: &i32| *n > 100), vec![1]).unwrap();
        assert!(none.matched.is_empty());
        assert_eq!(none.into_map().len(), 2);
    }

    #[test]
    fn test_partitioning_with_downstream() {
        let collector = partitioning_by_with(|n: &i64| *n > 0, summing(|n: &i64| *n));
        let mut left = collector.create_container();
        collector.accumulate(&mut left, 5).unwrap();
        let mut right = collector.create_container();
        collector.accumulate(&mut right, -2).unwrap();
        collector.accumulate(&mut right, 3).unwrap();
        let sums = collector.finish(collector.combine(left, right).unwrap());
        assert_eq!(sums.matched, 8);
        assert_eq!(sums.unmatched, -2);
    }

    #[test]
    fn test_mapping_and_filtering() {
        let lengths = mapping(|s: &str| s.len(), to_list());
        assert_eq!(collect_iter(&lengths, vec!["ab", "c"]).unwrap(), vec![2, 1]);

        let long = filtering(|s: &&str| s.len() > 1, counting());
        assert_eq!(collect_iter(&long, vec!["ab", "c", "def"]).unwrap(), 2);

        let nested = grouping_by_with(
            |s: &&str| s.len(),
            mapping(|s: &str| s.to_uppercase(), to_set()),
        );
        let groups = collect_iter(&nested, vec!["ab", "Ab", "c"]).unwrap();
        assert_eq!(groups.get(&2).map(|set| set.len()), Some(1));
    }

    #[test]
    fn test_flat_mapping() {
        let chars = flat_mapping(|s: &str| s.chars().collect::<Vec<_>>(), to_list());
        assert_eq!(collect_iter(&chars, vec!["ab", "", "c"]).unwrap(), vec!['a', 'b', 'c']);
    }
}
