//! Publishing of click facts to the click topic.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio_retry::RetryIf;
use tokio_retry::strategy::FixedInterval;
use tracing::{debug, error, warn};

use crate::domain::broker::{DeliveryError, TopicWriter};
use crate::domain::click_event::RawClickFact;
use crate::metrics::Metrics;

/// Bounds on how hard the producer tries before dropping a fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
    /// Deadline for a single write attempt.
    pub write_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(250),
            write_timeout: Duration::from_secs(5),
        }
    }
}

/// Serializes click facts and writes them to the topic keyed by alias.
///
/// Delivery is best-effort: transient failures are retried according to the
/// [`RetryPolicy`], anything else is logged, counted as dropped and returned.
pub struct EventProducer {
    writer: Arc<dyn TopicWriter>,
    policy: RetryPolicy,
    metrics: Arc<Metrics>,
}

impl EventProducer {
    pub fn new(writer: Arc<dyn TopicWriter>, policy: RetryPolicy, metrics: Arc<Metrics>) -> Self {
        Self {
            writer,
            policy,
            metrics,
        }
    }

    /// Publishes one click fact.
    ///
    /// # Errors
    ///
    /// Returns the last [`DeliveryError`] when the fact could not be written.
    /// The drop has already been logged and counted at that point.
    pub async fn publish(&self, fact: &RawClickFact) -> Result<(), DeliveryError> {
        let payload = match fact.to_payload() {
            Ok(p) => p,
            Err(e) => {
                error!(alias = %fact.alias, error = %e, "Failed to encode click fact, dropping");
                self.record_drop();
                return Err(DeliveryError::Encode(e));
            }
        };

        let attempts = AtomicU32::new(0);
        let retries = self.policy.max_attempts.saturating_sub(1) as usize;
        let strategy = FixedInterval::new(self.policy.delay).take(retries);

        let result = RetryIf::spawn(
            strategy,
            || {
                let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
                let payload = payload.as_slice();
                async move {
                    let outcome = match tokio::time::timeout(
                        self.policy.write_timeout,
                        self.writer.write(&fact.alias, payload),
                    )
                    .await
                    {
                        Ok(res) => res,
                        Err(_) => Err(DeliveryError::DeadlineExceeded),
                    };

                    if let Err(e) = &outcome
                        && e.is_transient()
                    {
                        warn!(alias = %fact.alias, attempt, error = %e, "Transient publish failure");
                    }
                    outcome
                }
            },
            DeliveryError::is_transient,
        )
        .await;

        let attempt = attempts.load(Ordering::Relaxed);
        match result {
            Ok(()) => {
                debug!(alias = %fact.alias, attempt, "Click fact published");
                Ok(())
            }
            Err(e) => {
                error!(
                    alias = %fact.alias,
                    attempt,
                    error = %e,
                    "Failed to publish click fact, dropping"
                );
                self.record_drop();
                Err(e)
            }
        }
    }

    fn record_drop(&self) {
        self.metrics
            .events_dropped_total
            .with_label_values(&["delivery_failed"])
            .inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::broker::MockTopicWriter;
    use async_trait::async_trait;
    use mockall::Sequence;
    use mockall::predicate::eq;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_millis(1),
            write_timeout: Duration::from_millis(200),
        }
    }

    fn producer(writer: impl TopicWriter + 'static, metrics: Arc<Metrics>) -> EventProducer {
        EventProducer::new(Arc::new(writer), fast_policy(), metrics)
    }

    fn dropped(metrics: &Metrics) -> f64 {
        metrics
            .events_dropped_total
            .with_label_values(&["delivery_failed"])
            .get()
    }

    #[tokio::test]
    async fn test_publish_succeeds_after_two_transient_failures() {
        let mut writer = MockTopicWriter::new();
        let mut seq = Sequence::new();

        writer
            .expect_write()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(DeliveryError::TopicNotReady("LOADING".into())));
        writer
            .expect_write()
            .with(eq("abc123"), mockall::predicate::always())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let metrics = Arc::new(Metrics::new().unwrap());
        let producer = producer(writer, metrics.clone());
        let fact = RawClickFact::new("abc123", "1.2.3.4", "curl/8.0", "");

        assert!(producer.publish(&fact).await.is_ok());
        assert_eq!(dropped(&metrics), 0.0);
    }

    #[tokio::test]
    async fn test_publish_gives_up_after_max_attempts() {
        let mut writer = MockTopicWriter::new();
        writer
            .expect_write()
            .times(3)
            .returning(|_, _| Err(DeliveryError::DeadlineExceeded));

        let metrics = Arc::new(Metrics::new().unwrap());
        let producer = producer(writer, metrics.clone());
        let fact = RawClickFact::new("abc123", "", "", "");

        let err = producer.publish(&fact).await.unwrap_err();

        assert!(matches!(err, DeliveryError::DeadlineExceeded));
        assert_eq!(dropped(&metrics), 1.0);
    }

    #[tokio::test]
    async fn test_publish_does_not_retry_rejections() {
        let mut writer = MockTopicWriter::new();
        writer
            .expect_write()
            .times(1)
            .returning(|_, _| Err(DeliveryError::Rejected("WRONGTYPE".into())));

        let metrics = Arc::new(Metrics::new().unwrap());
        let producer = producer(writer, metrics.clone());
        let fact = RawClickFact::new("abc123", "", "", "");

        let err = producer.publish(&fact).await.unwrap_err();

        assert!(matches!(err, DeliveryError::Rejected(_)));
        assert_eq!(dropped(&metrics), 1.0);
    }

    #[tokio::test]
    async fn test_payload_is_keyed_by_alias() {
        let mut writer = MockTopicWriter::new();
        writer
            .expect_write()
            .withf(|key, payload| {
                let fact = RawClickFact::from_payload(payload).unwrap();
                key == "xyz" && fact.alias == "xyz" && fact.referer == "https://ref"
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let producer = producer(writer, Arc::new(Metrics::new().unwrap()));
        let fact = RawClickFact::new("xyz", "", "", "https://ref");

        producer.publish(&fact).await.unwrap();
    }

    struct SlowWriter;

    #[async_trait]
    impl TopicWriter for SlowWriter {
        async fn write(&self, _key: &str, _payload: &[u8]) -> Result<(), DeliveryError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_slow_write_hits_deadline() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let producer = EventProducer::new(
            Arc::new(SlowWriter),
            RetryPolicy {
                max_attempts: 2,
                delay: Duration::from_millis(1),
                write_timeout: Duration::from_millis(20),
            },
            metrics.clone(),
        );
        let fact = RawClickFact::new("slow", "", "", "");

        let err = producer.publish(&fact).await.unwrap_err();

        assert!(matches!(err, DeliveryError::DeadlineExceeded));
        assert_eq!(dropped(&metrics), 1.0);
    }
}
