//! Chunked parallel collect on the tokio blocking pool.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{self, JoinSet};

use super::link::DriveContext;
use super::Pipeline;
use crate::collectors::Collector;
use crate::core::{Error, Result};
use crate::terminal::ContainerSink;

impl<T: Send + 'static> Pipeline<T> {
    /// Collect with chunks of the source reduced concurrently.
    ///
    /// The producer is pulled in chunks of [`chunk_size`](Pipeline::chunk_size)
    /// elements. Each chunk runs through the stages on a blocking task into a
    /// container of its own, with at most
    /// [`max_concurrency`](Pipeline::max_concurrency) chunks in flight. The
    /// containers are combined in chunk order, so the result equals that of
    /// [`collect`](Pipeline::collect) for any collector whose `combine` is
    /// associative.
    ///
    /// Pipelines containing a stateful stage are collected sequentially on a
    /// blocking task instead.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use streamfuse::prelude::*;
    /// use streamfuse::collectors::summing;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<()> {
    /// let total = Pipeline::from_iterator(1..=10_000i64)
    ///     .map(|x| x * 2)
    ///     .chunk_size(256)
    ///     .collect_parallel(summing(|x: &i64| *x))
    ///     .await?;
    /// assert_eq!(total, 100_010_000);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn collect_parallel<C>(self, collector: C) -> Result<C::Output>
    where
        C: Collector<T> + Send + Sync + 'static,
        C::Container: Send + 'static,
        C::Output: Send + 'static,
    {
        let collector = Arc::new(collector);

        if !self.link.parallel_safe() {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                stages = ?self.stage_kinds(),
                "pipeline has stateful stages, collecting sequentially"
            );
            return task::spawn_blocking(move || self.collect_with(&*collector)).await?;
        }

        let Pipeline { link, config } = self;
        let permits = Arc::new(Semaphore::new(config.concurrency()));
        let chunk_size = config.chunk_size.max(1);
        let mut tasks: JoinSet<(usize, Result<C::Container>)> = JoinSet::new();
        let mut finished: BTreeMap<usize, C::Container> = BTreeMap::new();

        let dispatch = async {
            let mut ctx = DriveContext::new(config.cancellation.clone());
            let mut source = Arc::clone(&link).chunks()?;
            let mut index = 0;

            loop {
                settle(&mut tasks, &mut finished)?;

                // pulling may block, keep it off the async workers
                let (returned_source, returned_ctx, pulled) = task::spawn_blocking(move || {
                    let pulled = source.next_chunk(chunk_size, &mut ctx);
                    (source, ctx, pulled)
                })
                .await?;
                source = returned_source;
                ctx = returned_ctx;

                let Some(chunk) = pulled? else {
                    break;
                };

                let permit = Arc::clone(&permits)
                    .acquire_owned()
                    .await
                    .map_err(|e| Error::Task(e.to_string()))?;
                settle(&mut tasks, &mut finished)?;

                let collector = Arc::clone(&collector);
                tasks.spawn_blocking(move || {
                    let _permit = permit;
                    let mut sink = ContainerSink::new(&*collector);
                    let container = chunk.run(&mut sink).map(|()| sink.into_container());
                    (index, container)
                });
                index += 1;

                #[cfg(feature = "metrics")]
                crate::metrics::record_parallel_chunk();
            }

            #[cfg(feature = "tracing")]
            tracing::debug!(chunks = index, pulled = ctx.pulled, "combining parallel chunks");

            while let Some(joined) = tasks.join_next().await {
                let (index, container) = joined?;
                finished.insert(index, container?);
            }
            Ok::<u64, Error>(ctx.pulled)
        };

        let pulled = match dispatch.await {
            Ok(pulled) => pulled,
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %e, in_flight = tasks.len(), "parallel collect failed");
                tasks.shutdown().await;
                return Err(e);
            }
        };

        #[cfg(feature = "metrics")]
        crate::metrics::record_drive(pulled, false);
        #[cfg(not(feature = "metrics"))]
        let _ = pulled;

        let mut combined: Option<C::Container> = None;
        for container in finished.into_values() {
            combined = Some(match combined {
                Some(acc) => collector.combine(acc, container)?,
                None => container,
            });
        }
        let container = combined.unwrap_or_else(|| collector.create_container());
        Ok(collector.finish(container))
    }
}

/// Move every chunk that already completed into `finished`, failing on the first error.
fn settle<A: 'static>(
    tasks: &mut JoinSet<(usize, Result<A>)>,
    finished: &mut BTreeMap<usize, A>,
) -> Result<()> {
    while let Some(joined) = tasks.try_join_next() {
        let (index, container) = joined?;
        finished.insert(index, container?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::collectors::{counting, to_list, to_map};
    use crate::core::Error;
    use crate::pipeline::Pipeline;
    use crate::producers::from_fn;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_parallel_matches_sequential_order() {
        let parallel = Pipeline::from_iterator(0..1000)
            .filter(|x| x % 3 != 0)
            .map(|x| x * 2)
            .chunk_size(64)
            .max_concurrency(4)
            .collect_parallel(to_list())
            .await
            .unwrap();
        let sequential = Pipeline::from_iterator(0..1000)
            .filter(|x| x % 3 != 0)
            .map(|x| x * 2)
            .to_vec()
            .unwrap();
        assert_eq!(parallel, sequential);
    }

    #[tokio::test]
    async fn test_stateful_pipeline_falls_back() {
        let out = Pipeline::of(vec![5, 3, 5, 1])
            .distinct()
            .sorted()
            .chunk_size(1)
            .collect_parallel(to_list())
            .await
            .unwrap();
        assert_eq!(out, vec![1, 3, 5]);
    }

    #[tokio::test]
    async fn test_empty_parallel_collect() {
        let count = Pipeline::<u8>::empty()
            .collect_parallel(counting())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_producer_error_propagates() {
        let mut n = 0;
        let result = Pipeline::from_producer(from_fn(move || {
            n += 1;
            if n > 10 {
                Err(Error::custom("source failed"))
            } else {
                Ok(Some(n))
            }
        }))
        .chunk_size(4)
        .collect_parallel(counting())
        .await;
        assert!(matches!(result, Err(Error::Custom(_))));
    }

    #[tokio::test]
    async fn test_cancelled_parallel_collect() {
        let token = CancellationToken::new();
        token.cancel();
        let result = Pipeline::from_iterator(0..)
            .cancel_on(token)
            .collect_parallel(counting())
            .await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn test_consumed_pipeline_in_parallel() {
        let pipeline = Pipeline::of(vec![1, 2]);
        let copy = pipeline.clone();
        pipeline.count().unwrap();
        let result = copy.collect_parallel(to_list()).await;
        assert!(matches!(result, Err(Error::ConsumedPipeline)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failing_chunk_stops_pulling() {
        let pulls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&pulls);
        let result = Pipeline::from_producer(from_fn(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            // keys 0 and 1 both map to 0, so the first chunk holds a duplicate
            Ok((n < 200_000).then_some(n.saturating_sub(1)))
        }))
        .chunk_size(16)
        .max_concurrency(1)
        .collect_parallel(to_map(|n: &usize| *n, |n: &usize| *n))
        .await;

        assert!(matches!(result, Err(Error::DuplicateKey { .. })));
        assert!(pulls.load(Ordering::SeqCst) < 10_000);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_producer_error_does_not_leave_chunks_running() {
        let accepted = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&accepted);
        let mut n = 0;
        let result = Pipeline::from_producer(from_fn(move || {
            n += 1;
            if n > 64 {
                Err(Error::custom("source failed"))
            } else {
                Ok(Some(n))
            }
        }))
        .peek(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        })
        .chunk_size(8)
        .collect_parallel(counting())
        .await;

        assert!(matches!(result, Err(Error::Custom(_))));
        // every chunk has settled or been aborted once the error is returned
        let settled = accepted.load(Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(accepted.load(Ordering::SeqCst), settled);
    }
}
