#![allow(dead_code)]

use async_trait::async_trait;
use axum::extract::ConnectInfo;
use chrono::{Duration, Utc};
use click_shortener::domain::click_dispatcher::ClickDispatcher;
use click_shortener::domain::click_event::RawClickFact;
use click_shortener::domain::entities::{
    AggregatedStats, ClickDimensions, EnrichedClickRecord, Link, NewLink,
};
use click_shortener::domain::repositories::{AnalyticsSink, LinkStore};
use click_shortener::error::AppError;
use click_shortener::metrics::Metrics;
use click_shortener::state::AppState;
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tower::Layer;

/// In-memory stand-in for PostgreSQL, serving as both link store and
/// analytics sink.
pub struct MemoryDatabase {
    links: Mutex<HashMap<String, Link>>,
    clicks: Mutex<Vec<EnrichedClickRecord>>,
    available: AtomicBool,
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self {
            links: Mutex::new(HashMap::new()),
            clicks: Mutex::new(Vec::new()),
            available: AtomicBool::new(true),
        }
    }
}

impl MemoryDatabase {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert_link(&self, alias: &str, url: &str) {
        self.insert(alias, url, None);
    }

    pub fn insert_expired_link(&self, alias: &str, url: &str) {
        self.insert(alias, url, Some(Utc::now() - Duration::hours(1)));
    }

    fn insert(&self, alias: &str, url: &str, expires_at: Option<chrono::DateTime<Utc>>) {
        let link = Link::new(alias.to_string(), url.to_string(), Utc::now(), expires_at, 0);
        self.links.lock().unwrap().insert(alias.to_string(), link);
    }

    pub fn insert_click(&self, record: EnrichedClickRecord) {
        self.clicks.lock().unwrap().push(record);
    }

    pub fn click_count(&self, alias: &str) -> i64 {
        self.links
            .lock()
            .unwrap()
            .get(alias)
            .map_or(0, |l| l.click_count)
    }

    pub fn link(&self, alias: &str) -> Option<Link> {
        self.links.lock().unwrap().get(alias).cloned()
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

#[async_trait]
impl LinkStore for MemoryDatabase {
    async fn create(&self, new_link: NewLink) -> Result<Link, AppError> {
        let mut links = self.links.lock().unwrap();
        if links.contains_key(&new_link.alias) {
            return Err(AppError::conflict(
                "Alias already in use",
                json!({ "alias": new_link.alias }),
            ));
        }

        let link = Link::new(
            new_link.alias.clone(),
            new_link.original_url,
            Utc::now(),
            new_link.expires_at,
            0,
        );
        links.insert(new_link.alias, link.clone());
        Ok(link)
    }

    async fn find_by_alias(&self, alias: &str) -> Result<Option<Link>, AppError> {
        Ok(self.link(alias))
    }

    async fn increment_clicks(&self, alias: &str) -> Result<(), AppError> {
        if let Some(link) = self.links.lock().unwrap().get_mut(alias) {
            link.click_count += 1;
        }
        Ok(())
    }

    async fn ping(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalyticsSink for MemoryDatabase {
    async fn save(&self, record: &EnrichedClickRecord) -> Result<(), AppError> {
        self.insert_click(record.clone());
        Ok(())
    }

    async fn get_stats(&self, alias: &str) -> Result<Option<AggregatedStats>, AppError> {
        if self.link(alias).is_none() {
            return Ok(None);
        }

        let rows: Vec<ClickDimensions> = self
            .clicks
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.alias == alias)
            .map(|c| ClickDimensions {
                ip: c.ip.clone(),
                country: c.country.clone(),
                device: c.device.as_str().to_string(),
                browser: c.browser.clone(),
            })
            .collect();

        Ok(Some(AggregatedStats::from_rows(alias, rows)))
    }
}

pub const TEST_BASE_URL: &str = "http://s.example.com";

/// Builds application state around `db` with a publish queue of
/// `queue_capacity`; the receiver stands in for the publish worker.
pub fn create_test_state_with_capacity(
    db: Arc<MemoryDatabase>,
    queue_capacity: usize,
) -> (AppState, mpsc::Receiver<RawClickFact>) {
    let metrics = Arc::new(Metrics::new().unwrap());
    let (dispatcher, rx) = ClickDispatcher::new(queue_capacity, metrics.clone());
    let state = AppState::new(db.clone(), db, dispatcher, metrics, TEST_BASE_URL);
    (state, rx)
}

pub fn create_test_state(db: Arc<MemoryDatabase>) -> (AppState, mpsc::Receiver<RawClickFact>) {
    create_test_state_with_capacity(db, 100)
}

/// Inserts a fixed peer address, as `into_make_service_with_connect_info` would.
#[derive(Clone)]
pub struct MockConnectInfoLayer;

impl<S> Layer<S> for MockConnectInfoLayer {
    type Service = MockConnectInfoService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MockConnectInfoService { inner }
    }
}

#[derive(Clone)]
pub struct MockConnectInfoService<S> {
    inner: S,
}

pub const PEER_ADDR: &str = "127.0.0.1:12345";

impl<S, B> tower::Service<axum::http::Request<B>> for MockConnectInfoService<S>
where
    S: tower::Service<axum::http::Request<B>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: axum::http::Request<B>) -> Self::Future {
        let addr: SocketAddr = PEER_ADDR.parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        self.inner.call(req)
    }
}
