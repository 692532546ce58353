//! Click topic over Redis Streams.
//!
//! The topic is a single stream. Entries carry two fields, `key` (the alias)
//! and `payload` (the JSON click fact). Consumers read through a consumer
//! group so each entry is owned by one consumer until it is acknowledged.
//! Failed entries are copied to `<topic>.dead-letter` with the failure
//! reason and the id of the source entry.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use redis::streams::{StreamId, StreamMaxlen, StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, Client, RedisError, aio::ConnectionManager};
use tokio::sync::Mutex;
use tokio_retry::RetryIf;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, info, warn};

use crate::domain::broker::{BrokerError, Delivery, DeliveryError, TopicReader, TopicWriter};

const FIELD_KEY: &str = "key";
const FIELD_PAYLOAD: &str = "payload";
const PENDING_BATCH: usize = 100;
/// Reconnect attempts `fetch` makes before reporting a connection error.
const READ_RETRIES: usize = 5;

/// Server error codes after which a write is worth retrying.
const RETRYABLE_CODES: &[&str] = &["TRYAGAIN", "LOADING", "CLUSTERDOWN", "MASTERDOWN"];

pub fn dead_letter_topic(topic: &str) -> String {
    format!("{topic}.dead-letter")
}

async fn connect(redis_url: &str) -> Result<ConnectionManager, BrokerError> {
    let client = Client::open(redis_url)
        .map_err(|e| BrokerError::Connection(format!("Failed to create Redis client: {e}")))?;

    let manager = ConnectionManager::new(client)
        .await
        .map_err(|e| BrokerError::Connection(format!("Failed to connect to Redis: {e}")))?;

    let mut test_conn = manager.clone();
    test_conn
        .ping::<()>()
        .await
        .map_err(|e| BrokerError::Connection(format!("Redis PING failed: {e}")))?;

    Ok(manager)
}

fn delivery_error(e: RedisError) -> DeliveryError {
    if e.is_timeout() {
        return DeliveryError::DeadlineExceeded;
    }
    if e.is_connection_dropped() || e.is_io_error() {
        return DeliveryError::TopicNotReady(e.to_string());
    }
    match e.code() {
        Some(code) if RETRYABLE_CODES.contains(&code) => DeliveryError::TopicNotReady(e.to_string()),
        _ => DeliveryError::Rejected(e.to_string()),
    }
}

fn command_error(e: RedisError) -> BrokerError {
    if e.is_connection_dropped() || e.is_io_error() {
        BrokerError::Connection(e.to_string())
    } else {
        BrokerError::Command(e.to_string())
    }
}

fn to_delivery(entry: StreamId) -> Delivery {
    let key = entry.get::<String>(FIELD_KEY).unwrap_or_default();
    let payload = entry.get::<Vec<u8>>(FIELD_PAYLOAD).unwrap_or_default();
    Delivery {
        id: entry.id,
        key,
        payload,
    }
}

/// Appends click facts to the topic stream.
pub struct RedisStreamWriter {
    conn: ConnectionManager,
    topic: String,
    maxlen: usize,
}

impl RedisStreamWriter {
    /// Connects and validates the connection with a PING.
    ///
    /// The stream is trimmed to roughly `maxlen` entries on every write.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Connection`] if Redis is unreachable.
    pub async fn connect(redis_url: &str, topic: &str, maxlen: usize) -> Result<Self, BrokerError> {
        let conn = connect(redis_url).await?;
        info!(topic, maxlen, "Click topic writer connected");

        Ok(Self {
            conn,
            topic: topic.to_string(),
            maxlen,
        })
    }
}

#[async_trait]
impl TopicWriter for RedisStreamWriter {
    async fn write(&self, key: &str, payload: &[u8]) -> Result<(), DeliveryError> {
        let mut conn = self.conn.clone();
        let id: String = conn
            .xadd_maxlen(
                &self.topic,
                StreamMaxlen::Approx(self.maxlen),
                "*",
                &[(FIELD_KEY, key.as_bytes()), (FIELD_PAYLOAD, payload)],
            )
            .await
            .map_err(delivery_error)?;

        debug!(topic = %self.topic, key, id = %id, "Entry appended");
        Ok(())
    }
}

/// Consumer-group reader shared by all pool workers.
///
/// Entries left pending by a previous run of the same consumer are
/// redelivered first. After that the reader polls for new entries, sleeping
/// `poll_interval` whenever the stream is idle.
pub struct RedisStreamReader {
    conn: Mutex<Option<ConnectionManager>>,
    backlog: Mutex<VecDeque<Delivery>>,
    topic: String,
    dead_letter_topic: String,
    group: String,
    consumer: String,
    maxlen: usize,
    poll_interval: Duration,
}

impl RedisStreamReader {
    /// Connects, creates the consumer group if needed and loads entries still
    /// pending for `consumer`.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] if Redis is unreachable or the group cannot be
    /// created.
    pub async fn connect(
        redis_url: &str,
        topic: &str,
        group: &str,
        consumer: &str,
        maxlen: usize,
        poll_interval: Duration,
    ) -> Result<Self, BrokerError> {
        let mut conn = connect(redis_url).await?;

        let created: Result<(), RedisError> = conn.xgroup_create_mkstream(topic, group, "0").await;
        match created {
            Ok(()) => info!(topic, group, "Consumer group created"),
            Err(e) if e.code() == Some("BUSYGROUP") => debug!(topic, group, "Consumer group exists"),
            Err(e) => return Err(command_error(e)),
        }

        let reader = Self {
            conn: Mutex::new(Some(conn)),
            backlog: Mutex::new(VecDeque::new()),
            topic: topic.to_string(),
            dead_letter_topic: dead_letter_topic(topic),
            group: group.to_string(),
            consumer: consumer.to_string(),
            maxlen,
            poll_interval,
        };

        let pending = reader.load_pending().await?;
        if pending > 0 {
            warn!(topic, group, consumer, pending, "Redelivering pending entries");
        }
        info!(topic, group, consumer, "Click topic reader connected");

        Ok(reader)
    }

    async fn conn(&self) -> Result<ConnectionManager, BrokerError> {
        self.conn.lock().await.clone().ok_or(BrokerError::Closed)
    }

    async fn read_group(&self, start: &str, count: usize) -> Result<Vec<Delivery>, BrokerError> {
        let mut conn = self.conn().await?;
        let opts = StreamReadOptions::default()
            .group(&self.group, &self.consumer)
            .count(count);

        let reply: Option<StreamReadReply> = conn
            .xread_options(&[&self.topic], &[start], &opts)
            .await
            .map_err(command_error)?;

        Ok(reply
            .map(|r| {
                r.keys
                    .into_iter()
                    .flat_map(|k| k.ids)
                    .map(to_delivery)
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Reads at most one new entry, retrying dropped connections while
    /// the connection manager reconnects.
    async fn read_next(&self) -> Result<Option<Delivery>, BrokerError> {
        let strategy = ExponentialBackoff::from_millis(10)
            .factor(5)
            .max_delay(Duration::from_secs(2))
            .map(jitter)
            .take(READ_RETRIES);

        RetryIf::spawn(
            strategy,
            || async move {
                let next = self.read_group(">", 1).await;
                if let Err(e) = &next
                    && e.is_transient()
                {
                    warn!(topic = %self.topic, error = %e, "Stream read failed, retrying");
                }
                next.map(|batch| batch.into_iter().next())
            },
            BrokerError::is_transient,
        )
        .await
    }

    /// Reads this consumer's pending entries list into the backlog.
    async fn load_pending(&self) -> Result<usize, BrokerError> {
        let mut cursor = "0".to_string();
        let mut total = 0;

        loop {
            let batch = self.read_group(&cursor, PENDING_BATCH).await?;
            let Some(last) = batch.last() else {
                break;
            };
            cursor = last.id.clone();
            total += batch.len();

            let full = batch.len() == PENDING_BATCH;
            self.backlog.lock().await.extend(batch);
            if !full {
                break;
            }
        }

        Ok(total)
    }
}

#[async_trait]
impl TopicReader for RedisStreamReader {
    async fn fetch(&self) -> Result<Delivery, BrokerError> {
        if let Some(delivery) = self.backlog.lock().await.pop_front() {
            return Ok(delivery);
        }

        loop {
            if let Some(delivery) = self.read_next().await? {
                return Ok(delivery);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn commit(&self, delivery: &Delivery) -> Result<(), BrokerError> {
        let mut conn = self.conn().await?;
        let _: i64 = conn
            .xack(&self.topic, &self.group, &[&delivery.id])
            .await
            .map_err(command_error)?;
        Ok(())
    }

    async fn dead_letter(&self, delivery: &Delivery, reason: &str) -> Result<(), BrokerError> {
        let mut conn = self.conn().await?;
        let _: String = conn
            .xadd_maxlen(
                &self.dead_letter_topic,
                StreamMaxlen::Approx(self.maxlen),
                "*",
                &[
                    (FIELD_KEY, delivery.key.as_bytes()),
                    (FIELD_PAYLOAD, delivery.payload.as_slice()),
                    ("reason", reason.as_bytes()),
                    ("source_id", delivery.id.as_bytes()),
                ],
            )
            .await
            .map_err(command_error)?;
        Ok(())
    }

    async fn close(&self) -> Result<(), BrokerError> {
        match self.conn.lock().await.take() {
            Some(_) => {
                info!(topic = %self.topic, consumer = %self.consumer, "Click topic reader closed");
                Ok(())
            }
            None => Err(BrokerError::Closed),
        }
    }
}
