//! Bounded publish queue between the redirect path and the producer.
//!
//! The redirect handler hands click facts to a [`ClickDispatcher`], which
//! never blocks: when the queue is full the new fact is rejected and counted.
//! A single [`PublishWorker`] drains the queue with a fixed number of
//! publishes in flight.

use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::click_event::RawClickFact;
use crate::domain::click_producer::EventProducer;
use crate::metrics::Metrics;

/// Sending half of the publish queue, cloned into the application state.
#[derive(Clone)]
pub struct ClickDispatcher {
    tx: mpsc::Sender<RawClickFact>,
    metrics: Arc<Metrics>,
}

impl ClickDispatcher {
    /// Creates a queue holding at most `capacity` facts.
    pub fn new(capacity: usize, metrics: Arc<Metrics>) -> (Self, mpsc::Receiver<RawClickFact>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx, metrics }, rx)
    }

    /// Queues a fact for publishing without waiting.
    ///
    /// Returns `false` when the fact was rejected because the queue is full
    /// or the worker has stopped.
    pub fn dispatch(&self, fact: RawClickFact) -> bool {
        match self.tx.try_send(fact) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(fact)) => {
                warn!(alias = %fact.alias, "Publish queue full, dropping click fact");
                self.record_drop("queue_full");
                false
            }
            Err(mpsc::error::TrySendError::Closed(fact)) => {
                warn!(alias = %fact.alias, "Publish worker stopped, dropping click fact");
                self.record_drop("queue_closed");
                false
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Free slots left in the queue.
    pub fn capacity(&self) -> usize {
        self.tx.capacity()
    }

    pub fn max_capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    fn record_drop(&self, reason: &str) {
        self.metrics
            .events_dropped_total
            .with_label_values(&[reason])
            .inc();
    }
}

/// Drains the publish queue into the [`EventProducer`].
pub struct PublishWorker {
    rx: mpsc::Receiver<RawClickFact>,
    producer: Arc<EventProducer>,
    concurrency: usize,
}

impl PublishWorker {
    pub fn new(
        rx: mpsc::Receiver<RawClickFact>,
        producer: Arc<EventProducer>,
        concurrency: usize,
    ) -> Self {
        Self {
            rx,
            producer,
            concurrency: concurrency.max(1),
        }
    }

    /// Runs until `shutdown` is cancelled or every dispatcher is dropped.
    ///
    /// On shutdown the queue is closed, facts already queued are still
    /// published, and in-flight publishes are awaited.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut in_flight = JoinSet::new();

        info!(concurrency = self.concurrency, "Publish worker started");

        loop {
            let fact = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                fact = self.rx.recv() => match fact {
                    Some(f) => f,
                    None => break,
                },
            };
            self.spawn_publish(fact, &permits, &mut in_flight).await;

            // Reap finished publishes so the set does not grow unbounded.
            while in_flight.try_join_next().is_some() {}
        }

        self.rx.close();
        let mut drained = 0usize;
        while let Some(fact) = self.rx.recv().await {
            drained += 1;
            self.spawn_publish(fact, &permits, &mut in_flight).await;
        }
        if drained > 0 {
            debug!(drained, "Published facts left in the queue");
        }

        while in_flight.join_next().await.is_some() {}
        info!("Publish worker stopped");
    }

    async fn spawn_publish(
        &self,
        fact: RawClickFact,
        permits: &Arc<Semaphore>,
        in_flight: &mut JoinSet<()>,
    ) {
        let Ok(permit) = permits.clone().acquire_owned().await else {
            return;
        };
        let producer = self.producer.clone();
        in_flight.spawn(async move {
            // Errors are logged and counted by the producer.
            let _ = producer.publish(&fact).await;
            drop(permit);
        });
    }
}
