//! The collector framework.
//!
//! A [`Collector`] is a recipe of four operations that a `collect` terminal
//! operation uses to reduce a pipeline into a result:
//!
//! - `create_container` makes a fresh mutable accumulation container
//! - `accumulate` folds one element into a container
//! - `combine` merges two containers (used when chunks are collected in parallel)
//! - `finish` turns the final container into the result
//!
//! `combine` must be associative and `combine(acc, create_container())` must
//! equal `acc`, so that collecting in chunks gives the same result as a
//! sequential pass.
//!
//! Collectors compose: [`grouping_by_with`], [`partitioning_by_with`],
//! [`mapping`], [`filtering`] and friends hold a downstream collector and
//! delegate to it.

mod grouping;
mod results;

pub use grouping::{
    filtering, flat_mapping, grouping_by, grouping_by_ordered, grouping_by_with, mapping,
    partitioning_by, partitioning_by_with, Filtering, FlatMapping, GroupingBy, GroupingByOrdered,
    Mapping, PartitioningBy,
};
pub use results::{Groups, Partitioned, Statistics};

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt::{Debug, Display, Write};
use std::hash::Hash;
use std::marker::PhantomData;
use std::ops::Add;

use crate::error::{Error, Result};
use crate::optional::OptionalResult;

/// A four-operation recipe for reducing elements of type `T`.
///
/// # Examples
///
/// ```rust
/// use streamfuse::collectors::Collector;
/// use streamfuse::error::Result;
///
/// /// Collects the longest string seen.
/// struct Longest;
///
/// impl Collector<String> for Longest {
///     type Container = String;
///     type Output = String;
///
///     fn create_container(&self) -> String {
///         String::new()
///     }
///
///     fn accumulate(&self, container: &mut String, item: String) -> Result<()> {
///         if item.len() > container.len() {
///             *container = item;
///         }
///         Ok(())
///     }
///
///     fn combine(&self, left: String, right: String) -> Result<String> {
///         Ok(if right.len() > left.len() { right } else { left })
///     }
///
///     fn finish(&self, container: String) -> String {
///         container
///     }
/// }
/// ```
pub trait Collector<T> {
    /// The mutable accumulation container
    type Container;
    /// The final result
    type Output;

    fn create_container(&self) -> Self::Container;

    fn accumulate(&self, container: &mut Self::Container, item: T) -> Result<()>;

    fn combine(&self, left: Self::Container, right: Self::Container) -> Result<Self::Container>;

    fn finish(&self, container: Self::Container) -> Self::Output;
}

/// Collects into a `Vec` in encounter order
pub struct ToList<T>(PhantomData<fn(T)>);

impl<T> Collector<T> for ToList<T> {
    type Container = Vec<T>;
    type Output = Vec<T>;

    fn create_container(&self) -> Vec<T> {
        Vec::new()
    }

    fn accumulate(&self, container: &mut Vec<T>, item: T) -> Result<()> {
        container.push(item);
        Ok(())
    }

    fn combine(&self, mut left: Vec<T>, right: Vec<T>) -> Result<Vec<T>> {
        left.extend(right);
        Ok(left)
    }

    fn finish(&self, container: Vec<T>) -> Vec<T> {
        container
    }
}

/// Collects into a `HashSet`
pub struct ToSet<T>(PhantomData<fn(T)>);

impl<T: Hash + Eq> Collector<T> for ToSet<T> {
    type Container = HashSet<T>;
    type Output = HashSet<T>;

    fn create_container(&self) -> HashSet<T> {
        HashSet::new()
    }

    fn accumulate(&self, container: &mut HashSet<T>, item: T) -> Result<()> {
        container.insert(item);
        Ok(())
    }

    fn combine(&self, mut left: HashSet<T>, right: HashSet<T>) -> Result<HashSet<T>> {
        left.extend(right);
        Ok(left)
    }

    fn finish(&self, container: HashSet<T>) -> HashSet<T> {
        container
    }
}

/// Collects into a `BTreeSet`
pub struct ToOrderedSet<T>(PhantomData<fn(T)>);

impl<T: Ord> Collector<T> for ToOrderedSet<T> {
    type Container = BTreeSet<T>;
    type Output = BTreeSet<T>;

    fn create_container(&self) -> BTreeSet<T> {
        BTreeSet::new()
    }

    fn accumulate(&self, container: &mut BTreeSet<T>, item: T) -> Result<()> {
        container.insert(item);
        Ok(())
    }

    fn combine(&self, mut left: BTreeSet<T>, right: BTreeSet<T>) -> Result<BTreeSet<T>> {
        left.extend(right);
        Ok(left)
    }

    fn finish(&self, container: BTreeSet<T>) -> BTreeSet<T> {
        container
    }
}

/// What a map collector does when a key is seen twice.
pub trait DuplicatePolicy<K, V> {
    fn resolve(&self, key: &K, existing: V, incoming: V) -> Result<V>;
}

/// Fail with [`Error::DuplicateKey`] on any collision
pub struct RejectDuplicates;

impl<K: Debug, V> DuplicatePolicy<K, V> for RejectDuplicates {
    fn resolve(&self, key: &K, _existing: V, _incoming: V) -> Result<V> {
        Err(Error::duplicate_key(key))
    }
}

/// Merge colliding values with a function of `(existing, incoming)`
pub struct MergeWith<F>(pub F);

impl<K, V, F> DuplicatePolicy<K, V> for MergeWith<F>
where
    F: Fn(V, V) -> V,
{
    fn resolve(&self, _key: &K, existing: V, incoming: V) -> Result<V> {
        Ok((self.0)(existing, incoming))
    }
}

/// Map types a [`ToMap`] collector can fill.
pub trait MapBackend<K, V>: Default + IntoIterator<Item = (K, V)> {
    fn remove_key(&mut self, key: &K) -> Option<V>;
    fn insert_key(&mut self, key: K, value: V);
}

impl<K: Hash + Eq, V> MapBackend<K, V> for HashMap<K, V> {
    fn remove_key(&mut self, key: &K) -> Option<V> {
        self.remove(key)
    }

    fn insert_key(&mut self, key: K, value: V) {
        self.insert(key, value);
    }
}

impl<K: Ord, V> MapBackend<K, V> for BTreeMap<K, V> {
    fn remove_key(&mut self, key: &K) -> Option<V> {
        self.remove(key)
    }

    fn insert_key(&mut self, key: K, value: V) {
        self.insert(key, value);
    }
}

/// Collects into a map of `key(item) -> value(item)`
pub struct ToMap<T, K, V, KF, VF, P, M> {
    key: KF,
    value: VF,
    policy: P,
    _phantom: PhantomData<fn(T) -> (K, V, M)>,
}

impl<T, K, V, KF, VF, P, M> ToMap<T, K, V, KF, VF, P, M>
where
    P: DuplicatePolicy<K, V>,
    M: MapBackend<K, V>,
{
    fn put(&self, map: &mut M, key: K, value: V) -> Result<()> {
        let value = match map.remove_key(&key) {
            Some(existing) => self.policy.resolve(&key, existing, value)?,
            None => value,
        };
        map.insert_key(key, value);
        Ok(())
    }
}

impl<T, K, V, KF, VF, P, M> Collector<T> for ToMap<T, K, V, KF, VF, P, M>
where
    KF: Fn(&T) -> K,
    VF: Fn(&T) -> V,
    P: DuplicatePolicy<K, V>,
    M: MapBackend<K, V>,
{
    type Container = M;
    type Output = M;

    fn create_container(&self) -> M {
        M::default()
    }

    fn accumulate(&self, container: &mut M, item: T) -> Result<()> {
        let key = (self.key)(&item);
        let value = (self.value)(&item);
        self.put(container, key, value)
    }

    fn combine(&self, mut left: M, right: M) -> Result<M> {
        for (key, value) in right {
            self.put(&mut left, key, value)?;
        }
        Ok(left)
    }

    fn finish(&self, container: M) -> M {
        container
    }
}

/// Joins the display form of every element
pub struct Joining<T> {
    delimiter: String,
    prefix: String,
    suffix: String,
    _phantom: PhantomData<fn(T)>,
}

/// Accumulation state of [`Joining`]
#[derive(Debug, Default)]
pub struct JoinBuffer {
    text: String,
    any: bool,
}

impl<T: Display> Collector<T> for Joining<T> {
    type Container = JoinBuffer;
    type Output = String;

    fn create_container(&self) -> JoinBuffer {
        JoinBuffer::default()
    }

    fn accumulate(&self, container: &mut JoinBuffer, item: T) -> Result<()> {
        if container.any {
            container.text.push_str(&self.delimiter);
        }
        container.any = true;
        write!(container.text, "{}", item).map_err(|e| Error::custom(e.to_string()))
    }

    fn combine(&self, mut left: JoinBuffer, right: JoinBuffer) -> Result<JoinBuffer> {
        if right.any {
            if left.any {
                left.text.push_str(&self.delimiter);
            }
            left.text.push_str(&right.text);
            left.any = true;
        }
        Ok(left)
    }

    fn finish(&self, container: JoinBuffer) -> String {
        let mut out =
            String::with_capacity(self.prefix.len() + container.text.len() + self.suffix.len());
        out.push_str(&self.prefix);
        out.push_str(&container.text);
        out.push_str(&self.suffix);
        out
    }
}

/// Counts elements
pub struct Counting<T>(PhantomData<fn(T)>);

impl<T> Collector<T> for Counting<T> {
    type Container = u64;
    type Output = u64;

    fn create_container(&self) -> u64 {
        0
    }

    fn accumulate(&self, container: &mut u64, _item: T) -> Result<()> {
        *container += 1;
        Ok(())
    }

    fn combine(&self, left: u64, right: u64) -> Result<u64> {
        Ok(left + right)
    }

    fn finish(&self, container: u64) -> u64 {
        container
    }
}

/// Sums a numeric extraction
pub struct Summing<T, N, F> {
    extract: F,
    _phantom: PhantomData<fn(T) -> N>,
}

impl<T, N, F> Collector<T> for Summing<T, N, F>
where
    N: Add<Output = N> + Default + Copy,
    F: Fn(&T) -> N,
{
    type Container = N;
    type Output = N;

    fn create_container(&self) -> N {
        N::default()
    }

    fn accumulate(&self, container: &mut N, item: T) -> Result<()> {
        *container = *container + (self.extract)(&item);
        Ok(())
    }

    fn combine(&self, left: N, right: N) -> Result<N> {
        Ok(left + right)
    }

    fn finish(&self, container: N) -> N {
        container
    }
}

/// Averages a numeric extraction; 0.0 for no elements
pub struct Averaging<T, F> {
    extract: F,
    _phantom: PhantomData<fn(T)>,
}

impl<T, F> Collector<T> for Averaging<T, F>
where
    F: Fn(&T) -> f64,
{
    type Container = (f64, u64);
    type Output = f64;

    fn create_container(&self) -> (f64, u64) {
        (0.0, 0)
    }

    fn accumulate(&self, container: &mut (f64, u64), item: T) -> Result<()> {
        container.0 += (self.extract)(&item);
        container.1 += 1;
        Ok(())
    }

    fn combine(&self, left: (f64, u64), right: (f64, u64)) -> Result<(f64, u64)> {
        Ok((left.0 + right.0, left.1 + right.1))
    }

    fn finish(&self, (sum, count): (f64, u64)) -> f64 {
        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }
}

/// Count/sum/min/max/average of a numeric extraction
pub struct Summarizing<T, F> {
    extract: F,
    _phantom: PhantomData<fn(T)>,
}

impl<T, F> Collector<T> for Summarizing<T, F>
where
    F: Fn(&T) -> f64,
{
    type Container = Statistics;
    type Output = Statistics;

    fn create_container(&self) -> Statistics {
        Statistics::default()
    }

    fn accumulate(&self, container: &mut Statistics, item: T) -> Result<()> {
        container.record((self.extract)(&item));
        Ok(())
    }

    fn combine(&self, mut left: Statistics, right: Statistics) -> Result<Statistics> {
        left.merge(&right);
        Ok(left)
    }

    fn finish(&self, container: Statistics) -> Statistics {
        container
    }
}

/// Keeps the extreme element according to a comparator
pub struct Extreme<T, C> {
    compare: C,
    keep_greater: bool,
    _phantom: PhantomData<fn(T)>,
}

impl<T, C> Extreme<T, C>
where
    C: Fn(&T, &T) -> Ordering,
{
    // Ties keep the element seen first.
    fn pick(&self, current: T, candidate: T) -> T {
        let ordering = (self.compare)(&candidate, &current);
        let replace = if self.keep_greater {
            ordering == Ordering::Greater
        } else {
            ordering == Ordering::Less
        };
        if replace {
            candidate
        } else {
            current
        }
    }
}

impl<T, C> Collector<T> for Extreme<T, C>
where
    C: Fn(&T, &T) -> Ordering,
{
    type Container = Option<T>;
    type Output = OptionalResult<T>;

    fn create_container(&self) -> Option<T> {
        None
    }

    fn accumulate(&self, container: &mut Option<T>, item: T) -> Result<()> {
        let next = match container.take() {
            Some(current) => self.pick(current, item),
            None => item,
        };
        *container = Some(next);
        Ok(())
    }

    fn combine(&self, left: Option<T>, right: Option<T>) -> Result<Option<T>> {
        Ok(match (left, right) {
            (Some(l), Some(r)) => Some(self.pick(l, r)),
            (l, r) => l.or(r),
        })
    }

    fn finish(&self, container: Option<T>) -> OptionalResult<T> {
        container.into()
    }
}

/// Folds elements with an identity and an associative operator
pub struct Reducing<T, F> {
    identity: T,
    op: F,
}

impl<T, F> Collector<T> for Reducing<T, F>
where
    T: Clone,
    F: Fn(T, T) -> T,
{
    type Container = T;
    type Output = T;

    fn create_container(&self) -> T {
        self.identity.clone()
    }

    fn accumulate(&self, container: &mut T, item: T) -> Result<()> {
        let acc = std::mem::replace(container, self.identity.clone());
        *container = (self.op)(acc, item);
        Ok(())
    }

    fn combine(&self, left: T, right: T) -> Result<T> {
        Ok((self.op)(left, right))
    }

    fn finish(&self, container: T) -> T {
        container
    }
}

/// Applies a final transformation to a downstream collector's result
pub struct CollectingAndThen<D, F, R> {
    downstream: D,
    finisher: F,
    _phantom: PhantomData<fn() -> R>,
}

impl<T, D, F, R> Collector<T> for CollectingAndThen<D, F, R>
where
    D: Collector<T>,
    F: Fn(D::Output) -> R,
{
    type Container = D::Container;
    type Output = R;

    fn create_container(&self) -> D::Container {
        self.downstream.create_container()
    }

    fn accumulate(&self, container: &mut D::Container, item: T) -> Result<()> {
        self.downstream.accumulate(container, item)
    }

    fn combine(&self, left: D::Container, right: D::Container) -> Result<D::Container> {
        self.downstream.combine(left, right)
    }

    fn finish(&self, container: D::Container) -> R {
        (self.finisher)(self.downstream.finish(container))
    }
}

pub fn to_list<T>() -> ToList<T> {
    ToList(PhantomData)
}

pub fn to_set<T: Hash + Eq>() -> ToSet<T> {
    ToSet(PhantomData)
}

pub fn to_ordered_set<T: Ord>() -> ToOrderedSet<T> {
    ToOrderedSet(PhantomData)
}

/// Collect into a `HashMap`; a repeated key fails with `DuplicateKey`.
pub fn to_map<T, K, V, KF, VF>(
    key: KF,
    value: VF,
) -> ToMap<T, K, V, KF, VF, RejectDuplicates, HashMap<K, V>>
where
    K: Hash + Eq + Debug,
    KF: Fn(&T) -> K,
    VF: Fn(&T) -> V,
{
    ToMap {
        key,
        value,
        policy: RejectDuplicates,
        _phantom: PhantomData,
    }
}

/// Collect into a `HashMap`, merging values of repeated keys with `merge`.
pub fn to_map_merging<T, K, V, KF, VF, MF>(
    key: KF,
    value: VF,
    merge: MF,
) -> ToMap<T, K, V, KF, VF, MergeWith<MF>, HashMap<K, V>>
where
    K: Hash + Eq,
    KF: Fn(&T) -> K,
    VF: Fn(&T) -> V,
    MF: Fn(V, V) -> V,
{
    ToMap {
        key,
        value,
        policy: MergeWith(merge),
        _phantom: PhantomData,
    }
}

/// Collect into a key-ordered `BTreeMap`; a repeated key fails with `DuplicateKey`.
pub fn to_ordered_map<T, K, V, KF, VF>(
    key: KF,
    value: VF,
) -> ToMap<T, K, V, KF, VF, RejectDuplicates, BTreeMap<K, V>>
where
    K: Ord + Debug,
    KF: Fn(&T) -> K,
    VF: Fn(&T) -> V,
{
    ToMap {
        key,
        value,
        policy: RejectDuplicates,
        _phantom: PhantomData,
    }
}

/// Collect into a key-ordered `BTreeMap`, merging values of repeated keys.
pub fn to_ordered_map_merging<T, K, V, KF, VF, MF>(
    key: KF,
    value: VF,
    merge: MF,
) -> ToMap<T, K, V, KF, VF, MergeWith<MF>, BTreeMap<K, V>>
where
    K: Ord,
    KF: Fn(&T) -> K,
    VF: Fn(&T) -> V,
    MF: Fn(V, V) -> V,
{
    ToMap {
        key,
        value,
        policy: MergeWith(merge),
        _phantom: PhantomData,
    }
}

/// Join elements with `delimiter`, wrapped in `prefix` and `suffix`.
///
/// No elements yields `prefix + suffix`.
pub fn joining<T: Display>(
    delimiter: impl Into<String>,
    prefix: impl Into<String>,
    suffix: impl Into<String>,
) -> Joining<T> {
    Joining {
        delimiter: delimiter.into(),
        prefix: prefix.into(),
        suffix: suffix.into(),
        _phantom: PhantomData,
    }
}

/// Concatenate elements with no delimiter.
pub fn joining_plain<T: Display>() -> Joining<T> {
    joining("", "", "")
}

pub fn counting<T>() -> Counting<T> {
    Counting(PhantomData)
}

pub fn summing<T, N, F>(extract: F) -> Summing<T, N, F>
where
    N: Add<Output = N> + Default + Copy,
    F: Fn(&T) -> N,
{
    Summing {
        extract,
        _phantom: PhantomData,
    }
}

pub fn averaging<T, F: Fn(&T) -> f64>(extract: F) -> Averaging<T, F> {
    Averaging {
        extract,
        _phantom: PhantomData,
    }
}

pub fn summarizing<T, F: Fn(&T) -> f64>(extract: F) -> Summarizing<T, F> {
    Summarizing {
        extract,
        _phantom: PhantomData,
    }
}

/// The smallest element by `compare`; the first one on ties.
pub fn min_by<T, C: Fn(&T, &T) -> Ordering>(compare: C) -> Extreme<T, C> {
    Extreme {
        compare,
        keep_greater: false,
        _phantom: PhantomData,
    }
}

/// The largest element by `compare`; the first one on ties.
pub fn max_by<T, C: Fn(&T, &T) -> Ordering>(compare: C) -> Extreme<T, C> {
    Extreme {
        compare,
        keep_greater: true,
        _phantom: PhantomData,
    }
}

pub fn reducing<T: Clone, F: Fn(T, T) -> T>(identity: T, op: F) -> Reducing<T, F> {
    Reducing { identity, op }
}

pub fn collecting_and_then<T, D, F, R>(downstream: D, finisher: F) -> CollectingAndThen<D, F, R>
where
    D: Collector<T>,
    F: Fn(D::Output) -> R,
{
    CollectingAndThen {
        downstream,
        finisher,
        _phantom: PhantomData,
    }
}

/// Feed `items` through `collector` sequentially. Handy for testing collectors.
pub fn collect_iter<T, C, I>(collector: &C, items: I) -> Result<C::Output>
where
    C: Collector<T>,
    I: IntoIterator<Item = T>,
{
    let mut container = collector.create_container();
    for item in items {
        collector.accumulate(&mut container, item)?;
    }
    Ok(collector.finish(container))
}
