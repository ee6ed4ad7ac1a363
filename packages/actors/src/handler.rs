//! Capability traits the engine calls out to.
//!
//! Fetching, extraction, analysis and notification are injected so the
//! actors never depend on a concrete HTTP client or HTML parser. Each
//! trait is object safe and used behind an `Arc<dyn _>`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use watch_core::{Change, FetchError, MonitoringTarget, Snapshot, WatchError};

/// Result type for analyzers.
pub type AnalysisResult = Result<serde_json::Value, String>;

/// Fetches a document body.
pub trait Fetcher: Send + Sync + 'static {
    /// Fetch `url` with the given request headers.
    ///
    /// `timeout` is advisory; callers enforce it regardless.
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        headers: &'a BTreeMap<String, String>,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<String, FetchError>>;
}

/// Turns a document into a selector snapshot.
pub trait Extractor: Send + Sync + 'static {
    /// Extract the text for every selector. Selectors with no match map to
    /// an empty string.
    fn extract(&self, html: &str, selectors: &[String]) -> Result<Snapshot, WatchError>;
}

/// Produces an opaque analysis of a fetched document.
pub trait Analyzer: Send + Sync + 'static {
    fn analyze<'a>(&'a self, html: &'a str, url: &'a str) -> BoxFuture<'a, AnalysisResult>;
}

/// Delivers change notifications. Delivery failures are the notifier's
/// problem and never reach the caller.
pub trait Notifier: Send + Sync + 'static {
    fn notify<'a>(
        &'a self,
        target: &'a MonitoringTarget,
        changes: &'a [Change],
    ) -> BoxFuture<'a, ()>;
}

/// The set of capabilities shared by workers and target actors.
#[derive(Clone)]
pub struct Capabilities {
    pub fetcher: Arc<dyn Fetcher>,
    pub extractor: Arc<dyn Extractor>,
    pub analyzer: Arc<dyn Analyzer>,
    pub notifier: Arc<dyn Notifier>,
}

impl Capabilities {
    pub fn new(
        fetcher: impl Fetcher,
        extractor: impl Extractor,
        analyzer: impl Analyzer,
        notifier: impl Notifier,
    ) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            extractor: Arc::new(extractor),
            analyzer: Arc::new(analyzer),
            notifier: Arc::new(notifier),
        }
    }

    /// Fetch with a hard deadline.
    pub async fn fetch(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
        timeout: Duration,
    ) -> Result<String, FetchError> {
        match tokio::time::timeout(timeout, self.fetcher.fetch(url, headers, timeout)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                after_ms: timeout.as_millis() as u64,
            }),
        }
    }

    /// Fetch a page and extract a snapshot from it.
    pub async fn snapshot(
        &self,
        url: &str,
        selectors: &[String],
        timeout: Duration,
    ) -> Result<Snapshot, WatchError> {
        let html = self.fetch(url, &BTreeMap::new(), timeout).await?;
        self.extractor.extract(&html, selectors)
    }
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities").finish_non_exhaustive()
    }
}

/// Notifier that drops every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify<'a>(
        &'a self,
        target: &'a MonitoringTarget,
        changes: &'a [Change],
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            tracing::debug!(
                "Dropping notification for {} ({} changes)",
                target.id,
                changes.len()
            );
        })
    }
}

/// A function-based analyzer.
pub struct FnAnalyzer<F>
where
    F: Fn(&str, &str) -> AnalysisResult + Send + Sync + 'static,
{
    analyze: F,
}

impl<F> FnAnalyzer<F>
where
    F: Fn(&str, &str) -> AnalysisResult + Send + Sync + 'static,
{
    pub fn new(analyze: F) -> Self {
        Self { analyze }
    }
}

impl<F> Analyzer for FnAnalyzer<F>
where
    F: Fn(&str, &str) -> AnalysisResult + Send + Sync + 'static,
{
    fn analyze<'a>(&'a self, html: &'a str, url: &'a str) -> BoxFuture<'a, AnalysisResult> {
        let result = (self.analyze)(html, url);
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowFetcher;

    impl Fetcher for SlowFetcher {
        fn fetch<'a>(
            &'a self,
            _url: &'a str,
            _headers: &'a BTreeMap<String, String>,
            _timeout: Duration,
        ) -> BoxFuture<'a, Result<String, FetchError>> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(String::new())
            })
        }
    }

    struct NullExtractor;

    impl Extractor for NullExtractor {
        fn extract(&self, _html: &str, selectors: &[String]) -> Result<Snapshot, WatchError> {
            Ok(selectors.iter().map(|s| (s.clone(), String::new())).collect())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_is_cut_off_at_the_deadline() {
        let caps = Capabilities::new(
            SlowFetcher,
            NullExtractor,
            FnAnalyzer::new(|_, _| Ok(serde_json::Value::Null)),
            NoopNotifier,
        );

        let result = caps
            .fetch("https://example.com", &BTreeMap::new(), Duration::from_secs(2))
            .await;
        assert_eq!(result, Err(FetchError::Timeout { after_ms: 2000 }));
    }
}
