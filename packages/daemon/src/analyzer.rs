//! Page summary analyzer used by the daemon.

use actors::{AnalysisResult, Analyzer};
use futures_util::future::BoxFuture;
use scraper::{Html, Selector};
use serde::Serialize;
use url::Url;

/// Structural summary of a fetched page.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct PageSummary {
    pub title: Option<String>,
    pub word_count: usize,
    pub headings: usize,
    pub links: usize,
    pub external_links: usize,
    pub images: usize,
}

/// Counts words, headings, links and images.
#[derive(Debug, Default, Clone, Copy)]
pub struct PageSummaryAnalyzer;

impl Analyzer for PageSummaryAnalyzer {
    fn analyze<'a>(&'a self, html: &'a str, url: &'a str) -> BoxFuture<'a, AnalysisResult> {
        // Html is not Send, so the work happens before the future is built.
        let result = summarize(html, url)
            .and_then(|summary| serde_json::to_value(summary).map_err(|e| e.to_string()));
        Box::pin(async move { result })
    }
}

fn selector(css: &str) -> Result<Selector, String> {
    Selector::parse(css).map_err(|e| format!("bad selector {}: {:?}", css, e))
}

pub fn summarize(html: &str, url: &str) -> Result<PageSummary, String> {
    let document = Html::parse_document(html);
    let base = Url::parse(url).ok();

    let title = document
        .select(&selector("title")?)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());

    let word_count = document
        .select(&selector("body")?)
        .flat_map(|body| body.text())
        .map(|text| text.split_whitespace().count())
        .sum();

    let headings = document.select(&selector("h1, h2, h3, h4, h5, h6")?).count();

    let hrefs: Vec<Url> = document
        .select(&selector("a[href]")?)
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| match &base {
            Some(base) => base.join(href).ok(),
            None => Url::parse(href).ok(),
        })
        .collect();
    let external_links = hrefs
        .iter()
        .filter(|link| base.as_ref().is_some_and(|b| link.host_str() != b.host_str()))
        .count();

    let images = document.select(&selector("img")?).count();

    Ok(PageSummary {
        title,
        word_count,
        headings,
        links: hrefs.len(),
        external_links,
        images,
    })
}
