mod common;

use click_shortener::domain::broker::{TopicReader, TopicWriter};
use click_shortener::domain::click_event::RawClickFact;
use click_shortener::domain::click_producer::{EventProducer, RetryPolicy};
use click_shortener::domain::click_worker::{ConsumerPool, ConsumerPoolConfig};
use click_shortener::domain::entities::DeviceClass;
use click_shortener::domain::enrichment::ClickEnricher;
use click_shortener::domain::repositories::AnalyticsSink;
use click_shortener::infrastructure::broker::{RedisStreamReader, RedisStreamWriter};
use click_shortener::metrics::Metrics;
use common::MemoryDatabase;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const GROUP: &str = "test-group";
const POLL: Duration = Duration::from_millis(20);

fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379/0".to_string())
}

fn unique_topic(name: &str) -> String {
    format!("test.{name}.{}", chrono::Utc::now().timestamp_nanos_opt().unwrap())
}

async fn connect_reader(topic: &str) -> RedisStreamReader {
    RedisStreamReader::connect(&redis_url(), topic, GROUP, "consumer-1", 1_000, POLL)
        .await
        .unwrap()
}

#[tokio::test]
#[ignore = "requires a Redis server (REDIS_URL)"]
async fn test_write_fetch_commit() {
    let topic = unique_topic("commit");
    let writer = RedisStreamWriter::connect(&redis_url(), &topic, 1_000)
        .await
        .unwrap();
    let consumer = connect_reader(&topic).await;

    writer.write("abc123", b"{\"alias\":\"abc123\"}").await.unwrap();

    let delivery = tokio::time::timeout(Duration::from_secs(5), consumer.fetch())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(delivery.key, "abc123");
    assert_eq!(delivery.payload, b"{\"alias\":\"abc123\"}");

    consumer.commit(&delivery).await.unwrap();
    consumer.close().await.unwrap();

    // Committed entries are not redelivered to a restarted consumer
    let restarted = connect_reader(&topic).await;
    let next = tokio::time::timeout(Duration::from_millis(300), restarted.fetch()).await;
    assert!(next.is_err());
}

#[tokio::test]
#[ignore = "requires a Redis server (REDIS_URL)"]
async fn test_uncommitted_entry_is_redelivered() {
    let topic = unique_topic("pending");
    let writer = RedisStreamWriter::connect(&redis_url(), &topic, 1_000)
        .await
        .unwrap();
    let first = connect_reader(&topic).await;

    writer.write("xyz", b"payload").await.unwrap();
    let delivery = tokio::time::timeout(Duration::from_secs(5), first.fetch())
        .await
        .unwrap()
        .unwrap();
    first.close().await.unwrap();
    assert!(first.close().await.is_err());

    let second = connect_reader(&topic).await;
    let redelivered = tokio::time::timeout(Duration::from_secs(5), second.fetch())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(redelivered.id, delivery.id);
    assert_eq!(redelivered.payload, b"payload");
}

#[tokio::test]
#[ignore = "requires a Redis server (REDIS_URL)"]
async fn test_pipeline_round_trip() {
    let topic = unique_topic("pipeline");
    let metrics = Arc::new(Metrics::new().unwrap());
    let db = MemoryDatabase::new();
    db.insert_link("roundtrip", "https://example.com");

    let writer = RedisStreamWriter::connect(&redis_url(), &topic, 1_000)
        .await
        .unwrap();
    let producer = EventProducer::new(Arc::new(writer), RetryPolicy::default(), metrics.clone());

    let pool = ConsumerPool::new(
        Arc::new(connect_reader(&topic).await),
        Arc::new(ClickEnricher::new(None, Duration::from_secs(1), metrics.clone())),
        db.clone(),
        metrics.clone(),
        ConsumerPoolConfig {
            workers: 2,
            shutdown_timeout: Duration::from_secs(5),
        },
    );
    let shutdown = CancellationToken::new();
    let running = tokio::spawn(pool.run(shutdown.clone()));

    let fact = RawClickFact::new(
        "roundtrip",
        "",
        "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1",
        "",
    );
    producer.publish(&fact).await.unwrap();

    let stats = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let stats = db.get_stats("roundtrip").await.unwrap().unwrap();
            if stats.total_clicks > 0 {
                return stats;
            }
            tokio::time::sleep(POLL).await;
        }
    })
    .await
    .unwrap();

    assert_eq!(stats.total_clicks, 1);
    assert_eq!(stats.by_country.get("unknown"), Some(&1));
    assert_eq!(stats.by_device.get(DeviceClass::Mobile.as_str()), Some(&1));

    shutdown.cancel();
    running.await.unwrap().unwrap();
    assert_eq!(metrics.events_processed_total.get(), 1.0);
}
