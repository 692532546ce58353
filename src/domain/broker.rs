//! Broker capabilities used by the click pipeline.
//!
//! The producer side only needs to append keyed messages to a topic
//! ([`TopicWriter`]). The consumer side reads through a consumer-group
//! cursor shared by all workers ([`TopicReader`]): each fetched message is
//! owned by exactly one worker until it is committed.
//!
//! Implementations live in [`crate::infrastructure::broker`].

use async_trait::async_trait;
use thiserror::Error;

/// Failure writing a message to a topic.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The topic or its leader is temporarily unavailable.
    #[error("topic not ready: {0}")]
    TopicNotReady(String),

    /// The write did not complete within its deadline.
    #[error("write deadline exceeded")]
    DeadlineExceeded,

    /// The broker refused the write.
    #[error("write rejected: {0}")]
    Rejected(String),

    #[error("failed to encode click fact: {0}")]
    Encode(#[from] serde_json::Error),
}

impl DeliveryError {
    /// Whether a retry of the same write may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DeliveryError::TopicNotReady(_) | DeliveryError::DeadlineExceeded
        )
    }
}

/// Failure on the consuming side of the broker.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("broker connection error: {0}")]
    Connection(String),

    #[error("broker command failed: {0}")]
    Command(String),

    #[error("reader is closed")]
    Closed,
}

impl BrokerError {
    /// Whether the failure may clear up once the connection is restored.
    pub fn is_transient(&self) -> bool {
        matches!(self, BrokerError::Connection(_))
    }
}

/// A message fetched from the topic, not yet committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Broker-assigned message id, used to commit.
    pub id: String,
    /// Partitioning key (the alias).
    pub key: String,
    pub payload: Vec<u8>,
}

/// Appends keyed messages to the click topic.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TopicWriter: Send + Sync {
    async fn write(&self, key: &str, payload: &[u8]) -> Result<(), DeliveryError>;
}

/// Consumer-group reader shared by the pool workers.
#[async_trait]
pub trait TopicReader: Send + Sync {
    /// Waits for the next message owned by this consumer.
    ///
    /// The future may stay pending indefinitely while the topic is idle;
    /// callers race it against their cancellation signal.
    async fn fetch(&self) -> Result<Delivery, BrokerError>;

    /// Marks a message as processed so it is never redelivered.
    async fn commit(&self, delivery: &Delivery) -> Result<(), BrokerError>;

    /// Copies a message to the dead-letter topic together with a reason.
    async fn dead_letter(&self, delivery: &Delivery, reason: &str) -> Result<(), BrokerError>;

    /// Releases the underlying connection. A second call returns
    /// [`BrokerError::Closed`].
    async fn close(&self) -> Result<(), BrokerError>;
}
