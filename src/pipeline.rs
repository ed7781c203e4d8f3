//! The fetch → validate → publish loop.
//!
//! One **cycle** is a single search request followed by validation and
//! publication of every returned item, in the order received. Failures are
//! handled at two levels:
//!
//! - **Item level**: a [`Rejection`](crate::error::Rejection) or a
//!   [`PublishError`](crate::error::PublishError) drops that one item. It is
//!   logged, counted, and the cycle moves on.
//! - **Cycle level**: a [`FetchError`](crate::error::FetchError), or a panic
//!   anywhere inside the cycle, aborts the cycle and puts the loop into
//!   [`LoopState::BackingOff`] for one shorter wait.
//!
//! Nothing escapes [`Pipeline::run`]; it only stops when the process does.

use crate::cadence::{CadencePolicy, LoopState, Sleeper};
use crate::error::CycleError;
use crate::fetch::{ArticleSource, SearchQuery};
use crate::publish::{Publisher, StreamSink};
use crate::utils::panic_message;
use crate::validate::validate;
use futures::FutureExt;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

/// Counts for one completed cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub published: usize,
    pub rejected: usize,
    pub publish_failed: usize,
}

/// Running totals since the pipeline was created.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub cycles: u64,
    pub failed_cycles: u64,
    pub published: u64,
    pub rejected: u64,
    pub publish_failed: u64,
}

impl Totals {
    fn record(&mut self, result: &Result<CycleReport, CycleError>) {
        self.cycles += 1;
        match result {
            Ok(report) => {
                self.published += report.published as u64;
                self.rejected += report.rejected as u64;
                self.publish_failed += report.publish_failed as u64;
            }
            Err(_) => self.failed_cycles += 1,
        }
    }
}

/// What one [`Pipeline::step`] did.
#[derive(Debug)]
pub struct StepOutcome {
    pub result: Result<CycleReport, CycleError>,
    /// State the loop is in after the cycle.
    pub state: LoopState,
    /// How long the loop waited afterwards.
    pub delay: Duration,
}

/// Owns the injected clients and drives cycles forever.
#[derive(Debug)]
pub struct Pipeline<F, S, Z> {
    source: F,
    publisher: Publisher<S>,
    query: SearchQuery,
    cadence: CadencePolicy,
    sleeper: Z,
    state: LoopState,
    totals: Totals,
}

impl<F, S, Z> Pipeline<F, S, Z>
where
    F: ArticleSource,
    S: StreamSink,
    Z: Sleeper,
{
    pub fn new(
        source: F,
        publisher: Publisher<S>,
        query: SearchQuery,
        cadence: CadencePolicy,
        sleeper: Z,
    ) -> Self {
        Self {
            source,
            publisher,
            query,
            cadence,
            sleeper,
            state: LoopState::Running,
            totals: Totals::default(),
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn totals(&self) -> Totals {
        self.totals
    }

    /// Run cycles back to back, waiting between them, until the task is dropped.
    pub async fn run(&mut self) {
        info!(
            q = %self.query.q,
            page_size = self.query.page_size,
            poll_interval_secs = self.cadence.poll_interval.as_secs(),
            backoff_interval_secs = self.cadence.backoff_interval.as_secs(),
            "Pipeline loop starting"
        );
        loop {
            self.step().await;
        }
    }

    /// Run one cycle, update the loop state, and wait out the resulting delay.
    pub async fn step(&mut self) -> StepOutcome {
        let t0 = Instant::now();
        let result = self.run_cycle().await;
        let elapsed_ms = t0.elapsed().as_millis() as u64;

        self.totals.record(&result);
        self.state = match result {
            Ok(_) => LoopState::Running,
            Err(_) => LoopState::BackingOff,
        };
        let delay = self.cadence.next_delay(self.state);

        match &result {
            Ok(report) => info!(
                fetched = report.fetched,
                published = report.published,
                rejected = report.rejected,
                publish_failed = report.publish_failed,
                elapsed_ms,
                next_in_secs = delay.as_secs_f64(),
                "Cycle complete"
            ),
            Err(e) => error!(
                error = %e,
                state = %self.state,
                elapsed_ms,
                next_in_secs = delay.as_secs_f64(),
                "Cycle failed; backing off"
            ),
        }

        self.sleeper.sleep(delay).await;

        StepOutcome {
            result,
            state: self.state,
            delay,
        }
    }

    /// One fetch followed by validation and publication of every item.
    ///
    /// Panics raised anywhere in the cycle are caught here and reported as
    /// [`CycleError::Unexpected`].
    #[instrument(level = "info", skip_all, fields(cycle = self.totals.cycles + 1))]
    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        AssertUnwindSafe(self.fetch_and_forward())
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(CycleError::Unexpected(panic_message(payload.as_ref()))))
    }

    async fn fetch_and_forward(&self) -> Result<CycleReport, CycleError> {
        let items = self.source.fetch(&self.query).await?;
        debug!(count = items.len(), "Fetched raw items");
        Ok(self.forward_items(&items).await)
    }

    async fn forward_items(&self, items: &[Value]) -> CycleReport {
        let mut report = CycleReport {
            fetched: items.len(),
            ..CycleReport::default()
        };

        for (index, raw) in items.iter().enumerate() {
            let record = match validate(raw) {
                Ok(record) => record,
                Err(rejection) => {
                    report.rejected += 1;
                    warn!(
                        index,
                        field = rejection.field(),
                        reason = %rejection,
                        "Item rejected"
                    );
                    continue;
                }
            };

            match self.publisher.publish(&record).await {
                Ok(_) => {
                    report.published += 1;
                    debug!(
                        index,
                        id = %record.id(),
                        source = record.source_name(),
                        title = record.title().unwrap_or("-"),
                        published_at = ?record.published_at(),
                        "Record forwarded"
                    );
                }
                Err(e) => {
                    report.publish_failed += 1;
                    warn!(index, id = %record.id(), error = %e, "Record dropped after failed write");
                }
            }
        }

        report
    }
}
