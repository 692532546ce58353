//! HTTP server initialization and runtime setup.
//!
//! Handles database and broker connections, the click pipeline tasks, and
//! the Axum server lifecycle.

use crate::config::Config;
use crate::domain::click_dispatcher::{ClickDispatcher, PublishWorker};
use crate::domain::click_producer::{EventProducer, RetryPolicy};
use crate::domain::click_worker::{ConsumerPool, ConsumerPoolConfig, PoolError};
use crate::domain::enrichment::{ClickEnricher, GeoLocator};
use crate::infrastructure::broker::{RedisStreamReader, RedisStreamWriter};
use crate::infrastructure::geo::IpGeolocationClient;
use crate::infrastructure::persistence::{PgAnalyticsSink, PgLinkStore};
use crate::metrics::Metrics;
use crate::routes::app_service;
use crate::state::AppState;

use anyhow::{Context, Result};
use axum::ServiceExt;
use axum::extract::Request;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Runs the HTTP server and the click pipeline with the given configuration.
///
/// Initializes:
/// - PostgreSQL connection pool and migrations
/// - Redis stream writer and consumer-group reader
/// - Publish worker draining the click dispatcher
/// - Consumer pool enriching and persisting clicks
/// - Axum HTTP server
///
/// Everything stops on SIGINT/SIGTERM; background tasks get
/// `SHUTDOWN_TIMEOUT_SECS` to finish.
///
/// # Errors
///
/// Returns an error if a connection, migration or bind fails, or if a
/// background task ends with an error.
pub async fn run(config: Config) -> Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_connect_timeout))
        .idle_timeout(Duration::from_secs(config.db_idle_timeout))
        .max_lifetime(Duration::from_secs(config.db_max_lifetime))
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    let metrics = Arc::new(Metrics::new().context("Failed to register metrics")?);

    let writer = RedisStreamWriter::connect(
        &config.redis_url,
        &config.click_topic,
        config.click_topic_maxlen,
    )
    .await
    .context("Failed to connect click stream writer")?;

    let reader = RedisStreamReader::connect(
        &config.redis_url,
        &config.click_topic,
        &config.consumer_group,
        &config.consumer_name,
        config.click_topic_maxlen,
        Duration::from_millis(config.consumer_poll_interval_ms),
    )
    .await
    .context("Failed to connect click stream reader")?;
    tracing::info!(topic = %config.click_topic, group = %config.consumer_group, "Connected to click stream");

    let geo: Option<Arc<dyn GeoLocator>> = match &config.geo_api_key {
        Some(key) => {
            let client = IpGeolocationClient::new(
                config.geo_api_url.clone(),
                key.clone(),
                Duration::from_secs(config.geo_timeout_secs),
            )
            .context("Failed to build geolocation client")?;
            tracing::info!("Geolocation enabled");
            let locator: Arc<dyn GeoLocator> = Arc::new(client);
            Some(locator)
        }
        None => {
            tracing::info!("Geolocation disabled (GEO_API_KEY not set)");
            None
        }
    };

    let pool_arc = Arc::new(pool);
    let link_store = Arc::new(PgLinkStore::new(pool_arc.clone()));
    let analytics_sink = Arc::new(PgAnalyticsSink::new(pool_arc));

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    let producer = Arc::new(EventProducer::new(
        Arc::new(writer),
        RetryPolicy {
            max_attempts: config.publish_max_attempts,
            delay: Duration::from_millis(config.publish_retry_delay_ms),
            write_timeout: Duration::from_millis(config.publish_timeout_ms),
        },
        metrics.clone(),
    ));
    let (dispatcher, click_rx) = ClickDispatcher::new(config.publish_queue_capacity, metrics.clone());
    let publish_worker = PublishWorker::new(click_rx, producer, config.publish_concurrency);
    // Stopped only after the HTTP server has drained, so clicks from
    // in-flight redirects are still queued.
    let publish_shutdown = CancellationToken::new();
    let publish_task = tokio::spawn(publish_worker.run(publish_shutdown.clone()));
    tracing::info!("Publish worker started");

    let shutdown_timeout = Duration::from_secs(config.shutdown_timeout_secs);
    let enricher = ClickEnricher::new(
        geo,
        Duration::from_secs(config.geo_timeout_secs),
        metrics.clone(),
    );
    let consumer_pool = ConsumerPool::new(
        Arc::new(reader),
        Arc::new(enricher),
        analytics_sink.clone(),
        metrics.clone(),
        ConsumerPoolConfig {
            workers: config.consumer_workers,
            shutdown_timeout,
        },
    );
    let consumer_task = tokio::spawn(run_consumer_pool(consumer_pool, shutdown.clone()));
    tracing::info!(workers = config.consumer_workers, "Consumer pool started");

    let state = AppState::new(
        link_store,
        analytics_sink,
        dispatcher,
        metrics,
        &config.base_url,
    );
    let app = app_service(state);

    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("Invalid listen address '{}'", config.listen_addr))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Listening on http://{addr}");

    axum::serve(
        listener,
        ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app),
    )
    .with_graceful_shutdown(shutdown.clone().cancelled_owned())
    .await
    .context("HTTP server error")?;

    // A server error ends `serve` without a signal; stop the pipeline too.
    shutdown.cancel();
    publish_shutdown.cancel();
    tracing::info!("HTTP server stopped, draining click pipeline");

    let drained = tokio::time::timeout(shutdown_timeout, publish_task).await;
    match drained {
        Ok(joined) => joined.context("Publish worker panicked")?,
        Err(_) => tracing::warn!("Publish worker did not drain within shutdown timeout"),
    }

    consumer_task
        .await
        .context("Consumer pool panicked")?
        .context("Consumer pool failed")?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Runs the pool and triggers process shutdown if it stops on its own.
async fn run_consumer_pool(
    pool: ConsumerPool,
    shutdown: CancellationToken,
) -> Result<(), PoolError> {
    let result = pool.run(shutdown.clone()).await;
    if let Err(e) = &result
        && !shutdown.is_cancelled()
    {
        tracing::error!(error = %e, "Consumer pool stopped, shutting down");
        shutdown.cancel();
    }
    result
}

/// Cancels `token` on Ctrl+C or SIGTERM.
async fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }

    token.cancel();
}
