//! Consumer pool turning click facts from the topic into stored analytics.
//!
//! A fixed number of workers share one [`TopicReader`]. For every message a
//! worker decodes the fact, enriches it, persists the record and only then
//! commits the message. Messages that can never succeed (undecodable, no
//! alias) are logged and committed. Messages whose record could not be
//! persisted go to the dead-letter topic before they are committed; if even
//! that fails they stay pending and are redelivered on the next start.
//!
//! Connection errors from the reader are retried with backoff for as long as
//! the pool runs. Any other read error stops the worker.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinSet;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::broker::{BrokerError, Delivery, TopicReader};
use crate::domain::click_event::RawClickFact;
use crate::domain::enrichment::Enricher;
use crate::domain::repositories::AnalyticsSink;
use crate::metrics::Metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerPoolConfig {
    pub workers: usize,
    /// How long to wait for workers after cancellation before aborting them.
    pub shutdown_timeout: Duration,
}

impl Default for ConsumerPoolConfig {
    fn default() -> Self {
        Self {
            workers: 3,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to close topic reader: {0}")]
    Close(#[from] BrokerError),

    #[error("all consumer workers exited before shutdown")]
    WorkersExited,
}

struct Shared {
    reader: Arc<dyn TopicReader>,
    enricher: Arc<dyn Enricher>,
    sink: Arc<dyn AnalyticsSink>,
    metrics: Arc<Metrics>,
}

pub struct ConsumerPool {
    shared: Arc<Shared>,
    config: ConsumerPoolConfig,
}

impl ConsumerPool {
    pub fn new(
        reader: Arc<dyn TopicReader>,
        enricher: Arc<dyn Enricher>,
        sink: Arc<dyn AnalyticsSink>,
        metrics: Arc<Metrics>,
        config: ConsumerPoolConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                reader,
                enricher,
                sink,
                metrics,
            }),
            config,
        }
    }

    /// Runs the workers until `shutdown` is cancelled.
    ///
    /// Returns once every worker has stopped (or was aborted after
    /// `shutdown_timeout`) and the reader has been closed.
    ///
    /// # Errors
    ///
    /// - [`PoolError::WorkersExited`] if every worker stopped on a
    ///   non-transient read error before cancellation
    /// - [`PoolError::Close`] if closing the reader failed
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), PoolError> {
        let workers_count = self.config.workers.max(1);
        let mut workers = JoinSet::new();

        for id in 0..workers_count {
            let shared = self.shared.clone();
            let token = shutdown.child_token();
            workers.spawn(async move { shared.run_worker(id, token).await });
        }
        info!(workers = workers_count, "Consumer pool started");

        let exited_early = tokio::select! {
            _ = shutdown.cancelled() => false,
            _ = join_all(&mut workers) => true,
        };

        if exited_early {
            error!("All consumer workers exited, closing reader");
            if let Err(e) = self.shared.reader.close().await {
                error!(error = %e, "Failed to close topic reader");
            }
            return Err(PoolError::WorkersExited);
        }

        debug!("Shutdown requested, waiting for consumer workers");
        if tokio::time::timeout(self.config.shutdown_timeout, join_all(&mut workers))
            .await
            .is_err()
        {
            warn!(
                remaining = workers.len(),
                timeout_secs = self.config.shutdown_timeout.as_secs_f64(),
                "Consumer workers did not stop in time, aborting"
            );
            workers.abort_all();
            join_all(&mut workers).await;
        }

        self.shared.reader.close().await?;
        info!("Consumer pool stopped");
        Ok(())
    }
}

const MAX_READ_BACKOFF: Duration = Duration::from_secs(10);

/// Delays between reads after connection errors: 100ms doubling up to
/// [`MAX_READ_BACKOFF`].
fn read_backoff() -> impl Iterator<Item = Duration> {
    ExponentialBackoff::from_millis(2)
        .factor(50)
        .max_delay(MAX_READ_BACKOFF)
}

async fn join_all(workers: &mut JoinSet<()>) {
    while let Some(res) = workers.join_next().await {
        if let Err(e) = res
            && e.is_panic()
        {
            error!(error = %e, "Consumer worker panicked");
        }
    }
}

impl Shared {
    async fn run_worker(&self, worker: usize, token: CancellationToken) {
        debug!(worker, "Consumer worker started");

        let mut backoff = read_backoff();

        loop {
            let delivery = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!(worker, "Consumer worker cancelled");
                    break;
                }
                res = self.reader.fetch() => match res {
                    Ok(d) => d,
                    Err(e) if token.is_cancelled() => {
                        debug!(worker, error = %e, "Read interrupted by shutdown");
                        break;
                    }
                    Err(e) if e.is_transient() => {
                        let delay = backoff.next().unwrap_or(MAX_READ_BACKOFF);
                        warn!(
                            worker,
                            error = %e,
                            delay_ms = delay.as_millis() as u64,
                            "Consumer worker read error, backing off"
                        );
                        tokio::select! {
                            _ = token.cancelled() => break,
                            _ = tokio::time::sleep(delay) => continue,
                        }
                    }
                    Err(e) => {
                        error!(worker, error = %e, "Consumer worker read error, exiting");
                        break;
                    }
                },
            };
            backoff = read_backoff();

            // A fetched message is always processed to completion.
            self.process(worker, delivery).await;
        }
    }

    async fn process(&self, worker: usize, delivery: Delivery) {
        let fact = match RawClickFact::from_payload(&delivery.payload) {
            Ok(f) => f,
            Err(e) => {
                error!(
                    worker,
                    key = %delivery.key,
                    id = %delivery.id,
                    error = %e,
                    "Failed to decode click fact, skipping"
                );
                self.failed("decode");
                self.commit(worker, &delivery).await;
                return;
            }
        };

        let record = match self.enricher.enrich(&fact).await {
            Ok(r) => r,
            Err(e) => {
                error!(
                    worker,
                    alias = %fact.alias,
                    id = %delivery.id,
                    error = %e,
                    "Click fact cannot be enriched, skipping"
                );
                self.failed("enrich");
                self.commit(worker, &delivery).await;
                return;
            }
        };

        if let Err(e) = self.sink.save(&record).await {
            error!(
                worker,
                alias = %fact.alias,
                id = %delivery.id,
                error = %e,
                "Failed to save enriched click"
            );
            self.failed("persist");

            match self.reader.dead_letter(&delivery, &e.to_string()).await {
                Ok(()) => {
                    warn!(worker, alias = %fact.alias, id = %delivery.id, "Click fact dead-lettered");
                    self.commit(worker, &delivery).await;
                }
                Err(dl) => {
                    error!(
                        worker,
                        alias = %fact.alias,
                        id = %delivery.id,
                        error = %dl,
                        "Dead-letter write failed, message left pending"
                    );
                }
            }
            return;
        }

        self.commit(worker, &delivery).await;
        self.metrics.events_processed_total.inc();
        info!(worker, alias = %fact.alias, "Enriched click saved");
    }

    async fn commit(&self, worker: usize, delivery: &Delivery) {
        if let Err(e) = self.reader.commit(delivery).await {
            // The message will be redelivered and may be stored twice.
            warn!(worker, id = %delivery.id, error = %e, "Failed to commit message");
        }
    }

    fn failed(&self, stage: &str) {
        self.metrics
            .events_failed_total
            .with_label_values(&[stage])
            .inc();
    }
}
