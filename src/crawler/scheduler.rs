//! Run scheduler - repeats crawl runs and persists their harvest
//!
//! This module handles:
//! - Running the crawl loop once per iteration
//! - Merging each run's records into the dataset
//! - Keeping unpersisted records in memory until a merge succeeds
//! - The pause between iterations and the final flush on shutdown

use crate::crawler::coordinator::{Coordinator, CrawlReport};
use crate::crawler::sleep_unless_cancelled;
use crate::record::Record;
use crate::state::EndReason;
use crate::storage::{merge, MergeSummary, PersistenceError, RecordStore};
use crate::HarvestError;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// What one iteration did
#[derive(Debug, Clone)]
pub struct IterationReport {
    /// 1-based iteration number
    pub iteration: u64,
    pub end_reason: EndReason,
    pub collected: usize,
    pub polls: u64,
    pub merge: MergeSummary,
}

/// Totals across every iteration of [`RunScheduler::run`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerSummary {
    pub iterations: u64,
    pub records_collected: usize,
    pub failed_runs: u64,
    pub failed_flushes: u64,
    /// Dataset size after the last successful merge
    pub dataset_rows: Option<usize>,
}

/// Repeats crawl runs indefinitely (or `max_iterations` times)
pub struct RunScheduler<S: RecordStore> {
    coordinator: Coordinator,
    store: S,
    target: Option<usize>,
    delay: Duration,
    max_iterations: Option<u64>,
    pending: Vec<Record>,
    iterations: u64,
}

impl<S: RecordStore> RunScheduler<S> {
    /// Creates a scheduler using the coordinator's target and pause settings
    pub fn new(coordinator: Coordinator, store: S) -> Self {
        let target = coordinator.crawler_config().target();
        let delay = coordinator.crawler_config().inter_iteration_delay();

        Self {
            coordinator,
            store,
            target,
            delay,
            max_iterations: None,
            pending: Vec::new(),
            iterations: 0,
        }
    }

    /// Stops after `limit` iterations
    pub fn with_max_iterations(mut self, limit: u64) -> Self {
        self.max_iterations = Some(limit);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Records collected but not yet persisted
    pub fn pending(&self) -> &[Record] {
        &self.pending
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Runs once and merges the result
    ///
    /// A failed run is not an error here: its partial records are merged like
    /// any other batch. Only a failed merge is returned as `Err`, and the
    /// batch stays pending for the next flush.
    pub async fn run_iteration(
        &mut self,
        shutdown: &CancellationToken,
    ) -> Result<IterationReport, HarvestError> {
        self.iterations += 1;
        tracing::info!("Starting iteration {}", self.iterations);

        let CrawlReport {
            records,
            outcome,
            polls,
            duplicates,
            weak_identities,
            extraction_failures,
            ..
        } = self.coordinator.run_once(self.target, shutdown).await;

        tracing::debug!(
            "Iteration {}: {} polls, {} duplicates, {} weak identities, {} extraction failures",
            self.iterations,
            polls,
            duplicates,
            weak_identities,
            extraction_failures
        );

        let collected = records.len();
        self.pending.extend(records);
        let merge = self.flush()?;

        Ok(IterationReport {
            iteration: self.iterations,
            end_reason: outcome.end_reason(),
            collected,
            polls,
            merge,
        })
    }

    /// Merges every pending record into the store
    ///
    /// Pending records are only dropped once the merge succeeds.
    pub fn flush(&mut self) -> Result<MergeSummary, PersistenceError> {
        match merge(&mut self.store, &self.pending) {
            Ok(summary) => {
                self.pending.clear();
                Ok(summary)
            }
            Err(e) => {
                tracing::error!(
                    "Failed to persist {} records, keeping them for the next attempt: {}",
                    self.pending.len(),
                    e
                );
                Err(e)
            }
        }
    }

    /// Runs iterations until shutdown or the iteration limit
    ///
    /// # Returns
    ///
    /// * `Ok(SchedulerSummary)` - Every collected record was persisted
    /// * `Err(HarvestError)` - The final flush failed; records were lost
    pub async fn run(
        &mut self,
        shutdown: &CancellationToken,
    ) -> Result<SchedulerSummary, HarvestError> {
        let mut summary = SchedulerSummary::default();

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            match self.run_iteration(shutdown).await {
                Ok(report) => {
                    if report.end_reason == EndReason::Failed {
                        summary.failed_runs += 1;
                    }
                    summary.records_collected += report.collected;
                    summary.dataset_rows = Some(report.merge.total_rows);
                    if report.end_reason.is_success() {
                        tracing::info!(
                            "Iteration {} {}: {} new records, dataset has {} rows",
                            report.iteration,
                            report.end_reason,
                            report.collected,
                            report.merge.total_rows
                        );
                    } else {
                        tracing::warn!(
                            "Iteration {} {} early: kept {} records, dataset has {} rows",
                            report.iteration,
                            report.end_reason,
                            report.collected,
                            report.merge.total_rows
                        );
                    }
                }
                Err(e) => {
                    summary.failed_flushes += 1;
                    tracing::error!("Iteration {} failed: {}", self.iterations, e);
                }
            }
            summary.iterations = self.iterations;

            if self
                .max_iterations
                .is_some_and(|limit| self.iterations >= limit)
            {
                tracing::info!("Reached {} iterations, stopping", self.iterations);
                break;
            }
            if shutdown.is_cancelled() {
                break;
            }

            tracing::info!(
                "Waiting {} seconds before the next run",
                self.delay.as_secs()
            );
            if !sleep_unless_cancelled(self.delay, shutdown).await {
                break;
            }
        }

        if shutdown.is_cancelled() {
            tracing::info!("Shutdown requested, flushing collected records");
        }

        if !self.pending.is_empty() {
            let merged = self.flush()?;
            summary.dataset_rows = Some(merged.total_rows);
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, DelayRange, RateLimitConfig};
    use crate::crawler::pacing::Pacer;
    use crate::crawler::parser::EngagementExtractor;
    use crate::renderer::{Key, RenderError, RenderResult, Renderer, RendererFactory};
    use crate::storage::PersistenceResult;
    use async_trait::async_trait;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Feed whose extent keeps growing, so runs end on target or shutdown
    struct GrowingFeed {
        markup: String,
        height: u64,
    }

    #[async_trait]
    impl Renderer for GrowingFeed {
        async fn navigate(&mut self, _url: &str) -> RenderResult<()> {
            Ok(())
        }

        async fn current_markup(&mut self) -> RenderResult<String> {
            Ok(self.markup.clone())
        }

        async fn script_eval(&mut self, script: &str) -> RenderResult<Value> {
            if script.starts_with("return") {
                self.height += 10;
                return Ok(json!(self.height));
            }
            Ok(Value::Null)
        }

        async fn send_key(&mut self, _key: Key) -> RenderResult<()> {
            Ok(())
        }

        async fn close(&mut self) -> RenderResult<()> {
            Ok(())
        }
    }

    fn two_items(prefix: &str) -> String {
        format!(
            r#"<div class="item"><a href="/v/{p}1">a</a></div><div class="item"><a href="/v/{p}2">b</a></div>"#,
            p = prefix
        )
    }

    /// Every session shows the same two items
    struct StaticItems;

    #[async_trait]
    impl RendererFactory for StaticItems {
        async fn open(&self) -> RenderResult<Box<dyn Renderer>> {
            Ok(Box::new(GrowingFeed {
                markup: two_items("s"),
                height: 0,
            }))
        }
    }

    /// Every session shows two items unique to that session
    struct CountingFactory {
        sessions: AtomicU32,
    }

    #[async_trait]
    impl RendererFactory for CountingFactory {
        async fn open(&self) -> RenderResult<Box<dyn Renderer>> {
            let n = self.sessions.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(GrowingFeed {
                markup: two_items(&n.to_string()),
                height: 0,
            }))
        }
    }

    struct DownFactory;

    #[async_trait]
    impl RendererFactory for DownFactory {
        async fn open(&self) -> RenderResult<Box<dyn Renderer>> {
            Err(RenderError::SessionClosed)
        }
    }

    /// Feed that renders one more item on every markup read
    struct EndlessFeed {
        reads: u32,
        height: u64,
    }

    #[async_trait]
    impl Renderer for EndlessFeed {
        async fn navigate(&mut self, _url: &str) -> RenderResult<()> {
            Ok(())
        }

        async fn current_markup(&mut self) -> RenderResult<String> {
            self.reads += 1;
            Ok((0..self.reads)
                .map(|i| format!(r#"<div class="item"><a href="/v/e{}">x</a></div>"#, i))
                .collect())
        }

        async fn script_eval(&mut self, script: &str) -> RenderResult<Value> {
            if script.starts_with("return") {
                self.height += 10;
                return Ok(json!(self.height));
            }
            Ok(Value::Null)
        }

        async fn send_key(&mut self, _key: Key) -> RenderResult<()> {
            Ok(())
        }

        async fn close(&mut self) -> RenderResult<()> {
            Ok(())
        }
    }

    struct EndlessFactory;

    #[async_trait]
    impl RendererFactory for EndlessFactory {
        async fn open(&self) -> RenderResult<Box<dyn Renderer>> {
            Ok(Box::new(EndlessFeed {
                reads: 0,
                height: 0,
            }))
        }
    }

    #[derive(Default)]
    struct FlakyStore {
        rows: Vec<Record>,
        fail_next: u32,
    }

    impl RecordStore for FlakyStore {
        fn load(&self) -> PersistenceResult<Vec<Record>> {
            Ok(self.rows.clone())
        }

        fn replace(&mut self, records: &[Record]) -> PersistenceResult<()> {
            if self.fail_next > 0 {
                self.fail_next -= 1;
                return Err(PersistenceError::Schema("disk full".to_string()));
            }
            self.rows = records.to_vec();
            Ok(())
        }
    }

    fn coordinator(factory: Arc<dyn RendererFactory>) -> Coordinator {
        coordinator_with_target(factory, 2)
    }

    fn coordinator_with_target(factory: Arc<dyn RendererFactory>, target: usize) -> Coordinator {
        let mut config = Config::default();
        config.feed.fragment_selector = "div.item".to_string();
        config.crawler.target_count = target;
        config.crawler.inter_iteration_delay_secs = 60;
        let pacing = RateLimitConfig {
            request_threshold: 10,
            short_delay: DelayRange::new(1.0, 1.0),
            long_delay: DelayRange::new(1.0, 1.0),
        };

        let extractor = Box::new(EngagementExtractor::new().unwrap());
        Coordinator::new(&config, factory, extractor)
            .unwrap()
            .with_pacer(Pacer::with_rng(pacing, StdRng::seed_from_u64(9)))
    }

    fn counting() -> Arc<dyn RendererFactory> {
        Arc::new(CountingFactory {
            sessions: AtomicU32::new(0),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_iterations_accumulate_in_store() {
        let mut scheduler = RunScheduler::new(coordinator(counting()), FlakyStore::default())
            .with_max_iterations(3);

        let summary = scheduler.run(&CancellationToken::new()).await.unwrap();

        assert_eq!(summary.iterations, 3);
        assert_eq!(summary.failed_runs, 0);
        assert_eq!(summary.records_collected, 6);
        assert_eq!(summary.dataset_rows, Some(6));
        assert!(scheduler.pending().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_runs_do_not_stop_scheduler() {
        let mut scheduler =
            RunScheduler::new(coordinator(Arc::new(DownFactory)), FlakyStore::default())
                .with_max_iterations(2);

        let summary = scheduler.run(&CancellationToken::new()).await.unwrap();

        assert_eq!(summary.iterations, 2);
        assert_eq!(summary.failed_runs, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_flush_keeps_pending_for_retry() {
        let factory: Arc<dyn RendererFactory> = Arc::new(StaticItems);
        let store = FlakyStore {
            rows: Vec::new(),
            fail_next: 1,
        };
        let mut scheduler = RunScheduler::new(coordinator(factory), store);
        let token = CancellationToken::new();

        let err = scheduler.run_iteration(&token).await.unwrap_err();
        assert!(matches!(err, HarvestError::Persistence(_)));
        assert_eq!(scheduler.pending().len(), 2);

        let merged = scheduler.flush().unwrap();
        assert_eq!(merged.total_rows, 2);
        assert!(scheduler.pending().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_pause_stops_loop() {
        let mut scheduler =
            RunScheduler::new(coordinator(Arc::new(StaticItems)), FlakyStore::default())
                .with_delay(Duration::from_secs(3600));
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(600)).await;
            canceller.cancel();
        });

        let summary = scheduler.run(&token).await.unwrap();

        assert_eq!(summary.iterations, 1);
        assert_eq!(scheduler.store().rows.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_run_flushes_partial_batch() {
        let coordinator = coordinator_with_target(Arc::new(EndlessFactory), 100);
        let mut scheduler = RunScheduler::new(coordinator, FlakyStore::default());
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(12)).await;
            canceller.cancel();
        });

        let summary = scheduler.run(&token).await.unwrap();

        assert_eq!(summary.iterations, 1);
        assert!(summary.records_collected > 1);
        assert!(summary.records_collected < 100);
        assert_eq!(scheduler.store().rows.len(), summary.records_collected);
        assert_eq!(summary.dataset_rows, Some(summary.records_collected));
        assert!(scheduler.pending().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_run_keeps_batch_when_flush_fails() {
        let coordinator = coordinator_with_target(Arc::new(EndlessFactory), 100);
        let store = FlakyStore {
            rows: Vec::new(),
            fail_next: 2,
        };
        let mut scheduler = RunScheduler::new(coordinator, store);
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(12)).await;
            canceller.cancel();
        });

        let result = scheduler.run(&token).await;

        assert!(matches!(result, Err(HarvestError::Persistence(_))));
        assert!(!scheduler.pending().is_empty());
        assert!(scheduler.store().rows.is_empty());
    }
}
