//! Default fetcher and extractor backed by reqwest and scraper.

use std::collections::BTreeMap;
use std::time::Duration;

use futures_util::future::BoxFuture;
use reqwest::StatusCode;
use scraper::{ElementRef, Html, Selector};
use watch_core::{FetchError, Snapshot, WatchError};

use crate::handler::{Extractor, Fetcher};

/// Plain HTTP GET fetcher. No JavaScript rendering.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        headers: &'a BTreeMap<String, String>,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<String, FetchError>> {
        Box::pin(async move {
            let mut request = self.client.get(url).timeout(timeout);
            for (name, value) in headers {
                request = request.header(name.as_str(), value.as_str());
            }

            let response = request.send().await.map_err(|e| classify(e, timeout))?;

            let status = response.status();
            if is_blocked(status) {
                return Err(FetchError::Blocked(format!("HTTP {} from {}", status, url)));
            }
            if !status.is_success() {
                return Err(FetchError::Status(status.as_u16()));
            }

            response.text().await.map_err(|e| classify(e, timeout))
        })
    }
}

fn is_blocked(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS
    )
}

fn classify(err: reqwest::Error, timeout: Duration) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout {
            after_ms: timeout.as_millis() as u64,
        }
    } else {
        FetchError::Network(err.to_string())
    }
}

/// CSS selector extractor.
///
/// Each selector maps to the trimmed text of every matching element joined
/// by a single space. Elements without text fall back to their `content`
/// attribute so `meta[name=description]` yields the description.
#[derive(Debug, Default, Clone, Copy)]
pub struct SelectorExtractor;

impl Extractor for SelectorExtractor {
    fn extract(&self, html: &str, selectors: &[String]) -> Result<Snapshot, WatchError> {
        let document = Html::parse_document(html);
        let mut snapshot = Snapshot::with_capacity(selectors.len());

        for raw in selectors {
            let selector = Selector::parse(raw)
                .map_err(|e| WatchError::Extraction(format!("invalid selector '{}': {:?}", raw, e)))?;

            let text = document
                .select(&selector)
                .filter_map(element_text)
                .collect::<Vec<_>>()
                .join(" ");

            snapshot.insert(raw.clone(), text);
        }

        Ok(snapshot)
    }
}

fn element_text(element: ElementRef<'_>) -> Option<String> {
    let text = element.text().collect::<String>();
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if !text.is_empty() {
        return Some(text);
    }
    element
        .value()
        .attr("content")
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}
