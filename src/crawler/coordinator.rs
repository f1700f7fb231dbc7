//! Crawler coordinator - the single-run crawl loop
//!
//! One run opens a renderer session, loads the feed, waits for the first
//! fragment to render, then alternates scrolling, extraction and pacing until
//! the feed stalls, the record target is reached, shutdown is requested, or
//! the renderer fails. Whatever was collected is returned in every case and
//! the session is closed on every path.

use crate::config::{Config, CrawlerConfig};
use crate::crawler::dedup::Deduplicator;
use crate::crawler::pacing::Pacer;
use crate::crawler::pagination::{PaginationDriver, ScrollOutcome};
use crate::crawler::parser::{FragmentSelector, RecordExtractor};
use crate::crawler::{sleep_unless_cancelled, CrawlError};
use crate::record::Record;
use crate::renderer::{Key, Renderer, RendererFactory};
use crate::state::{CrawlPhase, EndReason};
use crate::ConfigError;
use chrono::{DateTime, Utc};
use scraper::Html;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Interval between markup reads while waiting for the feed to render
const PRESENCE_POLL: Duration = Duration::from_millis(500);

/// How a run ended
#[derive(Debug)]
pub enum CrawlOutcome {
    Exhausted,
    TargetReached,
    Interrupted,
    Failed(CrawlError),
}

impl CrawlOutcome {
    pub fn end_reason(&self) -> EndReason {
        match self {
            Self::Exhausted => EndReason::Exhausted,
            Self::TargetReached => EndReason::TargetReached,
            Self::Interrupted => EndReason::Interrupted,
            Self::Failed(_) => EndReason::Failed,
        }
    }

    /// The error that ended a failed run
    pub fn into_error(self) -> Option<CrawlError> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Everything one run produced
#[derive(Debug)]
pub struct CrawlReport {
    /// Records in the order their fragments were first seen
    pub records: Vec<Record>,
    pub outcome: CrawlOutcome,

    /// Scroll-and-read cycles completed
    pub polls: u64,

    /// Paced requests, as counted by the rate limiter
    pub requests: u64,

    /// Fragment sightings rejected as already processed
    pub duplicates: usize,

    /// Accepted fragments identified only by a content digest
    pub weak_identities: usize,

    /// Accepted fragments the extractor could not turn into a record
    pub extraction_failures: usize,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CrawlReport {
    pub fn end_reason(&self) -> EndReason {
        self.outcome.end_reason()
    }
}

/// Mutable state of the run in progress
struct RunProgress {
    phase: CrawlPhase,
    records: Vec<Record>,
    dedup: Deduplicator,
    polls: u64,
    extraction_failures: usize,
}

impl RunProgress {
    fn new() -> Self {
        Self {
            phase: CrawlPhase::Starting,
            records: Vec::new(),
            dedup: Deduplicator::new(),
            polls: 0,
            extraction_failures: 0,
        }
    }

    fn enter(&mut self, next: CrawlPhase) -> Result<(), CrawlError> {
        self.phase = self.phase.transition(next)?;
        tracing::debug!("Crawl phase: {}", self.phase);
        Ok(())
    }

    fn target_reached(&self, target: Option<usize>) -> bool {
        target.is_some_and(|target| self.records.len() >= target)
    }
}

/// Main crawl loop driver
pub struct Coordinator {
    factory: Arc<dyn RendererFactory>,
    extractor: Box<dyn RecordExtractor>,
    selector: FragmentSelector,
    feed_url: String,
    crawler: CrawlerConfig,
    pacer: Pacer,
}

impl Coordinator {
    /// Creates a new coordinator
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    /// * `factory` - Opens one renderer session per run
    /// * `extractor` - Maps accepted fragments to records
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(ConfigError)` - The fragment selector or feed URL does not parse
    pub fn new(
        config: &Config,
        factory: Arc<dyn RendererFactory>,
        extractor: Box<dyn RecordExtractor>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            factory,
            extractor,
            selector: FragmentSelector::new(&config.feed.fragment_selector, &config.feed.url)?,
            feed_url: config.feed.url.clone(),
            crawler: config.crawler.clone(),
            pacer: Pacer::new(config.rate_limit.clone()),
        })
    }

    /// Replaces the rate limiter (for a seeded random source)
    pub fn with_pacer(mut self, pacer: Pacer) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn crawler_config(&self) -> &CrawlerConfig {
        &self.crawler
    }

    /// Executes one run
    ///
    /// Never returns an error: failures end the run with
    /// [`CrawlOutcome::Failed`] and keep the records gathered so far.
    pub async fn run_once(
        &mut self,
        target: Option<usize>,
        shutdown: &CancellationToken,
    ) -> CrawlReport {
        let started_at = Utc::now();
        let mut progress = RunProgress::new();
        self.pacer.reset();

        match target {
            Some(target) => tracing::info!("Starting run for {} records", target),
            None => tracing::info!("Starting unbounded run"),
        }

        let outcome = if shutdown.is_cancelled() {
            CrawlOutcome::Interrupted
        } else {
            match self.factory.open().await {
                Ok(mut session) => {
                    let outcome = match self
                        .drive(session.as_mut(), &mut progress, target, shutdown)
                        .await
                    {
                        Ok(outcome) => outcome,
                        Err(e) => CrawlOutcome::Failed(e),
                    };

                    if let Err(e) = session.close().await {
                        tracing::warn!("Failed to close renderer session: {}", e);
                    }
                    outcome
                }
                Err(e) => CrawlOutcome::Failed(CrawlError::RenderFailure(e)),
            }
        };

        let reason = outcome.end_reason();
        if let Err(e) = progress.enter(CrawlPhase::Finished(reason)) {
            tracing::debug!("{}", e);
        }

        match &outcome {
            CrawlOutcome::Failed(e) => tracing::error!(
                "Run failed after {} records: {}",
                progress.records.len(),
                e
            ),
            _ => tracing::info!(
                "Run {} with {} records",
                reason,
                progress.records.len()
            ),
        }

        CrawlReport {
            records: progress.records,
            outcome,
            polls: progress.polls,
            requests: self.pacer.request_count(),
            duplicates: progress.dedup.rejected(),
            weak_identities: progress.dedup.weak_accepted(),
            extraction_failures: progress.extraction_failures,
            started_at,
            finished_at: Utc::now(),
        }
    }

    async fn drive(
        &mut self,
        renderer: &mut dyn Renderer,
        progress: &mut RunProgress,
        target: Option<usize>,
        shutdown: &CancellationToken,
    ) -> Result<CrawlOutcome, CrawlError> {
        progress.enter(CrawlPhase::Loading)?;
        renderer.navigate(&self.feed_url).await?;
        renderer.send_key(Key::End).await?;

        if !self.wait_for_presence(renderer, shutdown).await? {
            return Ok(CrawlOutcome::Interrupted);
        }

        progress.enter(CrawlPhase::Polling)?;
        let mut pagination = PaginationDriver::from_config(&self.crawler);

        loop {
            if shutdown.is_cancelled() {
                return Ok(CrawlOutcome::Interrupted);
            }

            let step = tokio::select! {
                _ = shutdown.cancelled() => None,
                step = pagination.advance(renderer) => Some(step),
            };
            let Some(step) = step else {
                return Ok(CrawlOutcome::Interrupted);
            };
            if step? == ScrollOutcome::Stalled {
                return Ok(CrawlOutcome::Exhausted);
            }

            let markup = renderer.current_markup().await?;
            self.harvest_markup(&markup, progress);
            progress.polls += 1;
            tracing::info!("Collected data for {} videos so far", progress.records.len());

            if !self.pacer.pace(shutdown).await {
                return Ok(CrawlOutcome::Interrupted);
            }

            if progress.target_reached(target) {
                return Ok(CrawlOutcome::TargetReached);
            }
        }
    }

    /// Polls the markup until at least one fragment is present
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - A fragment rendered
    /// * `Ok(false)` - Shutdown was requested while waiting
    /// * `Err(CrawlError::RenderTimeout)` - Nothing rendered in time
    async fn wait_for_presence(
        &self,
        renderer: &mut dyn Renderer,
        shutdown: &CancellationToken,
    ) -> Result<bool, CrawlError> {
        let timeout = self.crawler.presence_timeout();
        let started = Instant::now();

        loop {
            let markup = renderer.current_markup().await?;
            let found = self.selector.count_in(&markup);
            if found > 0 {
                tracing::debug!("Feed rendered {} fragments", found);
                return Ok(true);
            }

            let waited = started.elapsed();
            if waited >= timeout {
                return Err(CrawlError::RenderTimeout { waited });
            }

            if !sleep_unless_cancelled(PRESENCE_POLL.min(timeout - waited), shutdown).await {
                return Ok(false);
            }
        }
    }

    /// Deduplicates and extracts every fragment in the markup
    fn harvest_markup(&self, markup: &str, progress: &mut RunProgress) {
        let document = Html::parse_document(markup);
        let fragments = self.selector.select(&document);
        let before = progress.records.len();

        for fragment in &fragments {
            let observation = progress.dedup.observe(fragment);
            if !observation.is_accept() {
                continue;
            }

            match self.extractor.extract(fragment) {
                Ok(record) => progress.records.push(record),
                Err(e) => {
                    progress.extraction_failures += 1;
                    tracing::warn!("Skipping fragment {}: {}", observation.identity(), e);
                }
            }
        }

        tracing::debug!(
            "Poll saw {} fragments, {} new records",
            fragments.len(),
            progress.records.len() - before
        );
    }
}
