//! Integration tests for lazy pipelines, collectors and the async bridges

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use proptest::prelude::*;
use streamfuse::collectors::{
    averaging, collecting_and_then, counting, filtering, grouping_by, grouping_by_ordered,
    grouping_by_with, joining, mapping, partitioning_by, partitioning_by_with, summarizing,
    to_list, to_map, to_map_merging, to_ordered_set,
};
use streamfuse::prelude::*;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

/// Reads lines from a file; stands in for an external data source.
struct LineProducer {
    lines: Lines<BufReader<File>>,
}

impl LineProducer {
    fn open(path: &std::path::Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
        })
    }
}

impl Producer for LineProducer {
    type Item = String;

    fn produce(&mut self) -> Result<Option<String>> {
        match self.lines.next() {
            Some(line) => Ok(Some(line?)),
            None => Ok(None),
        }
    }
}

fn counted<T: Send + 'static>(pipeline: Pipeline<T>) -> (Pipeline<T>, Arc<AtomicUsize>) {
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    let pipeline = pipeline.peek(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    (pipeline, seen)
}

#[test]
fn test_second_drive_is_consumed() {
    let pipeline = Pipeline::from_producer(range(0..5)).map(|x| x + 1);
    let again = pipeline.clone();
    assert_eq!(pipeline.count().unwrap(), 5);

    let err = again.to_vec().unwrap_err();
    assert!(matches!(err, Error::ConsumedPipeline));
    assert!(err.is_logic_error());
}

#[test]
fn test_count_after_filter() {
    let count = Pipeline::from_producer(range(0..100))
        .filter(|x| x % 7 == 0)
        .count()
        .unwrap();
    assert_eq!(count, 15);
}

#[test]
fn test_round_trip_preserves_order() {
    let first = Pipeline::of(vec![5, 3, 9, 1]).to_vec().unwrap();
    let second = Pipeline::of(first.clone()).to_vec().unwrap();
    assert_eq!(first, second);
    assert_eq!(second, vec![5, 3, 9, 1]);
}

#[test]
fn test_any_match_processes_at_most_four() {
    let (pipeline, seen) = counted(Pipeline::of(vec![1, 3, 5, 2, 7, 9]));
    assert!(pipeline.any_match(|x| x % 2 == 0).unwrap());
    assert!(seen.load(Ordering::SeqCst) <= 4);
}

#[test]
fn test_vacuous_matches_on_empty_source() {
    assert!(Pipeline::<i32>::empty().all_match(|x| x % 2 == 0).unwrap());
    assert!(!Pipeline::<i32>::empty().any_match(|x| x % 2 == 0).unwrap());
    assert!(Pipeline::<i32>::empty().none_match(|x| x % 2 == 0).unwrap());
}

#[test]
fn test_grouping_by_length_counting() {
    let groups = Pipeline::of(vec!["A", "BB", "CCC", "DD"])
        .collect(grouping_by_with(|s: &&str| s.len(), counting()))
        .unwrap();
    let pairs: BTreeMap<usize, u64> = groups.into_iter().collect();
    assert_eq!(pairs, BTreeMap::from([(1, 1), (2, 2), (3, 1)]));
}

#[test]
fn test_partitioning_by_even() {
    let parts = Pipeline::of(vec![1, 2, 3])
        .collect(partitioning_by(|x: &i32| x % 2 == 0))
        .unwrap();
    let map = parts.into_map();
    assert_eq!(map.len(), 2);
    assert_eq!(map[&true], vec![2]);
    assert_eq!(map[&false], vec![1, 3]);
}

#[test]
fn test_joining_empty_source() {
    let joined = Pipeline::<String>::empty()
        .collect(joining(", ", "[", "]"))
        .unwrap();
    assert_eq!(joined, "[]");
}

#[test]
fn test_reduce_identity_and_absent() {
    let sum = Pipeline::of(vec![1, 2, 3, 4, 5])
        .reduce_with(0, |a, b| a + b)
        .unwrap();
    assert_eq!(sum, 15);
    let none = Pipeline::<i32>::of(vec![]).reduce(|a, b| a + b).unwrap();
    assert_eq!(none, Absent);
}

#[test]
fn test_duplicate_key_surfaces() {
    let result = Pipeline::of(vec!["kiwi", "pear", "fig"])
        .collect(to_map(|s: &&str| s.len(), |s: &&str| s.to_string()));
    assert!(matches!(result, Err(Error::DuplicateKey { ref key }) if key == "4"));

    let merged = Pipeline::of(vec!["kiwi", "pear", "fig"])
        .collect(to_map_merging(
            |s: &&str| s.len(),
            |s: &&str| s.to_string(),
            |a, b| format!("{a}+{b}"),
        ))
        .unwrap();
    assert_eq!(merged[&4], "kiwi+pear");
}

#[test]
fn test_sorted_distinct_limit_skip() {
    let out = Pipeline::of(vec![9, 3, 7, 3, 1, 9, 5])
        .distinct()
        .sorted()
        .skip(1)
        .limit(3)
        .to_vec()
        .unwrap();
    assert_eq!(out, vec![3, 5, 7]);
}

#[test]
fn test_limit_bounds_infinite_producer() {
    let pulls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&pulls);
    let out = Pipeline::from_producer(generate(move || counter.fetch_add(1, Ordering::SeqCst)))
        .limit(3)
        .to_vec()
        .unwrap();
    assert_eq!(out, vec![0, 1, 2]);
    assert_eq!(pulls.load(Ordering::SeqCst), 3);

    let zero = Pipeline::from_producer(repeat('x')).limit(0).count().unwrap();
    assert_eq!(zero, 0);
}

#[test]
fn test_iterate_while_and_take_while() {
    let powers = iterate(1u64, |x| x * 2)
        .into_pipeline()
        .take_while(|x| *x < 100)
        .to_vec()
        .unwrap();
    assert_eq!(powers, vec![1, 2, 4, 8, 16, 32, 64]);

    let bounded = Pipeline::from_producer(iterate_while(10, |x| *x > 0, |x| x - 3))
        .to_vec()
        .unwrap();
    assert_eq!(bounded, vec![10, 7, 4, 1]);
}

#[test]
fn test_for_each_side_effects_are_not_rolled_back() {
    let mut seen = Vec::new();
    let token = CancellationToken::new();
    let trigger = token.clone();
    let result = Pipeline::from_producer(range(0..100))
        .cancel_on(token)
        .for_each(|x| {
            seen.push(x);
            if x == 4 {
                trigger.cancel();
            }
        });
    assert!(matches!(result, Err(Error::Cancelled)));
    assert_eq!(seen, vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_file_producer_and_open_errors() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("words.txt");
    let mut file = File::create(&path)?;
    writeln!(file, "pear\nfig\napple\nfig\nplum")?;
    drop(file);

    let groups = Pipeline::from_producer(LineProducer::open(&path)?)
        .distinct()
        .collect(grouping_by_ordered(|w: &String| w.len(), to_list()))?;
    assert_eq!(groups[&3], vec!["fig".to_string()]);
    assert_eq!(groups[&4], vec!["pear".to_string(), "plum".to_string()]);

    let missing = LineProducer::open(&dir.path().join("missing.txt"));
    assert!(matches!(missing, Err(Error::Producer(_))));
    Ok(())
}

/// Yields 1, 2, then fails on the third pull.
fn failing_on_third_pull() -> impl Producer<Item = u32> + Send + 'static {
    let mut pulls = 0;
    from_fn(move || {
        pulls += 1;
        if pulls == 3 {
            Err(Error::custom("sensor offline"))
        } else {
            Ok(Some(pulls))
        }
    })
}

#[test]
fn test_failing_producer_aborts_sequential_drive() {
    let mapped = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&mapped);
    let counted_result = Pipeline::from_producer(failing_on_third_pull())
        .map(move |x| {
            counter.fetch_add(1, Ordering::SeqCst);
            x * 10
        })
        .filter(|x| *x > 0)
        .count();
    assert!(matches!(counted_result, Err(Error::Custom(_))));
    // the two good elements went through, nothing after the failure did
    assert_eq!(mapped.load(Ordering::SeqCst), 2);

    let (pipeline, seen) = counted(Pipeline::from_producer(failing_on_third_pull()));
    let collected = pipeline.collect(to_list());
    assert!(matches!(collected, Err(Error::Custom(_))));
    assert_eq!(seen.load(Ordering::SeqCst), 2);

    let mut received = Vec::new();
    let each = Pipeline::from_producer(failing_on_third_pull()).for_each(|x| received.push(x));
    assert!(matches!(each, Err(Error::Custom(_))));
    assert_eq!(received, vec![1, 2]);
}

#[test]
fn test_nested_collectors() {
    let words = vec!["apple", "avocado", "banana", "blueberry", "cherry"];
    let by_initial = Pipeline::of(words.clone())
        .collect(grouping_by_with(
            |w: &&str| w.chars().next(),
            mapping(|w: &str| w.len(), to_ordered_set()),
        ))
        .unwrap();
    assert_eq!(by_initial.len(), 3);
    assert_eq!(
        by_initial.get(&Some('b')).map(|lens| lens.iter().copied().collect::<Vec<_>>()),
        Some(vec![6, 9])
    );

    let long_counts = Pipeline::of(words.clone())
        .collect(partitioning_by_with(
            |w: &&str| w.starts_with('a'),
            filtering(|w: &&str| w.len() > 5, counting()),
        ))
        .unwrap();
    assert_eq!(long_counts.matched, 1);
    assert_eq!(long_counts.unmatched, 3);

    let stats = Pipeline::of(words.clone())
        .collect(summarizing(|w: &&str| w.len() as f64))
        .unwrap();
    assert_eq!(stats.count(), 5);
    assert_eq!(stats.max(), Some(9.0));

    let avg = Pipeline::<&str>::empty()
        .collect(averaging(|w: &&str| w.len() as f64))
        .unwrap();
    assert_eq!(avg, 0.0);

    let longest = Pipeline::of(words)
        .collect(collecting_and_then(to_list(), |mut v: Vec<&str>| {
            v.sort_by_key(|w| std::cmp::Reverse(w.len()));
            v.first().copied()
        }))
        .unwrap();
    assert_eq!(longest, Some("blueberry"));
}

#[test]
fn test_optional_result_pipeline() {
    let found = Pipeline::of(vec![4, 8, 15])
        .find_first()
        .unwrap()
        .filter(|x| *x > 2)
        .map(|x| x * 10);
    assert_eq!(found, Present(40));
    assert_eq!(found.into_pipeline().count().unwrap(), 1);
    assert!(matches!(Absent::<i32>.into_value(), Err(Error::EmptyResult)));
}

#[test]
fn test_user_defined_stage() {
    use streamfuse::stages::MapStage;

    let doubled = Pipeline::of(vec![1, 2])
        .stage(MapStage::new(|x: i32| x * 2))
        .to_vec()
        .unwrap();
    assert_eq!(doubled, vec![2, 4]);
}

#[tokio::test]
async fn test_parallel_collect_equals_sequential() {
    let sequential = Pipeline::from_producer(range(0..5000))
        .map(|x| x % 17)
        .collect(grouping_by(|x: &i64| *x))
        .unwrap();
    let parallel = Pipeline::from_producer(range(0..5000))
        .map(|x| x % 17)
        .chunk_size(100)
        .max_concurrency(3)
        .collect_parallel(grouping_by(|x: &i64| *x))
        .await
        .unwrap();
    assert_eq!(parallel, sequential);
    assert_eq!(
        parallel.keys().copied().collect::<Vec<_>>(),
        sequential.keys().copied().collect::<Vec<_>>()
    );
}

#[test]
fn test_parallel_collect_on_current_thread_runtime() {
    let count = tokio_test::block_on(
        Pipeline::from_iterator(0..10_000u32)
            .filter(|x| x % 2 == 1)
            .chunk_size(512)
            .collect_parallel(counting()),
    );
    assert_eq!(count.unwrap(), 5000);
}

#[tokio::test]
async fn test_into_stream_matches_to_vec() {
    let expected = Pipeline::from_producer(range(0..50))
        .filter(|x| x % 3 == 0)
        .to_vec()
        .unwrap();
    let streamed: Vec<i64> = Pipeline::from_producer(range(0..50))
        .filter(|x| x % 3 == 0)
        .channel_capacity(4)
        .into_stream()
        .map(|item| item.unwrap())
        .collect()
        .await;
    assert_eq!(streamed, expected);
}

proptest! {
    #[test]
    fn prop_filter_always_true_is_identity(
        input in proptest::collection::vec(any::<i32>(), 0..256),
        repeats in 0usize..4
    ) {
        let mut pipeline = Pipeline::of(input.clone());
        for _ in 0..repeats {
            pipeline = pipeline.filter(|_| true);
        }
        prop_assert_eq!(pipeline.to_vec().unwrap(), input);
    }

    #[test]
    fn prop_count_after_filter(input in proptest::collection::vec(any::<i16>(), 0..256)) {
        let expected = input.iter().filter(|x| **x % 3 == 0).count() as u64;
        let count = Pipeline::of(input).filter(|x| x % 3 == 0).count().unwrap();
        prop_assert_eq!(count, expected);
    }

    #[test]
    fn prop_sorted_matches_stable_sort(input in proptest::collection::vec((0u8..8, any::<u16>()), 0..128)) {
        let mut expected = input.clone();
        expected.sort_by_key(|(k, _)| *k);
        let sorted = Pipeline::of(input).sorted_by_key(|(k, _)| *k).to_vec().unwrap();
        prop_assert_eq!(sorted, expected);
    }

    #[test]
    fn prop_joining_matches_join(input in proptest::collection::vec("[a-z]{0,4}", 0..32)) {
        let expected = format!("<{}>", input.join("|"));
        let joined = Pipeline::of(input).collect(joining("|", "<", ">")).unwrap();
        prop_assert_eq!(joined, expected);
    }
}
