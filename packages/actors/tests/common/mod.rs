#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use actors::{
    Analyzer, Capabilities, Engine, EngineConfig, Extractor, Fetcher, FnAnalyzer, Notifier,
    SelectorExtractor,
};
use futures_util::future::BoxFuture;
use tokio::sync::Semaphore;
use watch_core::{Change, FetchError, MonitoringTarget, Snapshot, TargetId, WatchError};

pub const URL: &str = "https://shop.example.com/";

/// A small page with a title and a heading.
pub fn page(title: &str, heading: &str) -> String {
    format!(
        "<html><head><title>{}</title></head><body><h1>{}</h1></body></html>",
        title, heading
    )
}

/// In-memory web: URL -> response.
#[derive(Default)]
pub struct FakeSite {
    pages: Mutex<HashMap<String, Result<String, FetchError>>>,
    fetches: AtomicUsize,
}

impl FakeSite {
    pub fn set_page(&self, url: &str, html: String) {
        self.pages.lock().unwrap().insert(url.to_string(), Ok(html));
    }

    pub fn set_error(&self, url: &str, error: FetchError) {
        self.pages.lock().unwrap().insert(url.to_string(), Err(error));
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

pub struct FakeFetcher(pub Arc<FakeSite>);

impl Fetcher for FakeFetcher {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        _headers: &'a BTreeMap<String, String>,
        _timeout: Duration,
    ) -> BoxFuture<'a, Result<String, FetchError>> {
        Box::pin(async move {
            self.0.fetches.fetch_add(1, Ordering::SeqCst);
            self.0
                .pages
                .lock()
                .unwrap()
                .get(url)
                .cloned()
                .unwrap_or(Err(FetchError::Status(404)))
        })
    }
}

/// Fetcher that holds every request until a permit is released.
pub struct GatedFetcher {
    pub inner: FakeFetcher,
    pub gate: Arc<Semaphore>,
    pub entered: Arc<AtomicUsize>,
}

impl Fetcher for GatedFetcher {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        headers: &'a BTreeMap<String, String>,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<String, FetchError>> {
        Box::pin(async move {
            self.entered.fetch_add(1, Ordering::SeqCst);
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| FetchError::Network(e.to_string()))?;
            permit.forget();
            self.inner.fetch(url, headers, timeout).await
        })
    }
}

/// Extractor that panics on its first call, then behaves normally.
#[derive(Default)]
pub struct CrashOnceExtractor {
    crashed: AtomicBool,
}

impl Extractor for CrashOnceExtractor {
    fn extract(&self, html: &str, selectors: &[String]) -> Result<Snapshot, WatchError> {
        if !self.crashed.swap(true, Ordering::SeqCst) {
            panic!("extractor crashed");
        }
        SelectorExtractor.extract(html, selectors)
    }
}

/// Records every notification it receives.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    pub sent: Arc<Mutex<Vec<(TargetId, Vec<Change>)>>>,
}

impl RecordingNotifier {
    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<(TargetId, Vec<Change>)> {
        self.sent.lock().unwrap().last().cloned()
    }
}

impl Notifier for RecordingNotifier {
    fn notify<'a>(
        &'a self,
        target: &'a MonitoringTarget,
        changes: &'a [Change],
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.sent
                .lock()
                .unwrap()
                .push((target.id, changes.to_vec()));
        })
    }
}

/// Analyzer that blocks until a permit is released, one permit per job.
#[derive(Clone)]
pub struct GatedAnalyzer {
    pub gate: Arc<Semaphore>,
    pub entered: Arc<AtomicUsize>,
}

impl GatedAnalyzer {
    pub fn closed() -> Self {
        Self {
            gate: Arc::new(Semaphore::new(0)),
            entered: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn release(&self, jobs: usize) {
        self.gate.add_permits(jobs);
    }
}

impl Analyzer for GatedAnalyzer {
    fn analyze<'a>(
        &'a self,
        html: &'a str,
        _url: &'a str,
    ) -> BoxFuture<'a, Result<serde_json::Value, String>> {
        Box::pin(async move {
            self.entered.fetch_add(1, Ordering::SeqCst);
            let permit = self.gate.acquire().await.map_err(|e| e.to_string())?;
            permit.forget();
            Ok(serde_json::json!({ "length": html.len() }))
        })
    }
}

pub fn summary_analyzer() -> impl Analyzer {
    FnAnalyzer::new(|html, url| {
        if url.contains("explode") {
            panic!("analyzer exploded on {}", url);
        }
        Ok(serde_json::json!({ "url": url, "length": html.len() }))
    })
}

pub struct Harness {
    pub engine: Engine,
    pub site: Arc<FakeSite>,
    pub notifier: RecordingNotifier,
}

pub async fn start(config: EngineConfig, analyzer: impl Analyzer) -> Result<Harness, WatchError> {
    start_with(config, FakeFetcher, SelectorExtractor, analyzer).await
}

/// Start with a custom fetcher built over the fake site.
pub async fn start_with<F: Fetcher>(
    config: EngineConfig,
    fetcher: impl FnOnce(Arc<FakeSite>) -> F,
    extractor: impl Extractor,
    analyzer: impl Analyzer,
) -> Result<Harness, WatchError> {
    let site = Arc::new(FakeSite::default());
    let notifier = RecordingNotifier::default();
    let capabilities = Capabilities::new(
        fetcher(site.clone()),
        extractor,
        analyzer,
        notifier.clone(),
    );
    let engine = Engine::start(config, capabilities).await?;
    Ok(Harness {
        engine,
        site,
        notifier,
    })
}

/// Poll `check` until it returns true, giving the actors a chance to run.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..500 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
