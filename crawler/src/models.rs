use crate::error::PageError;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use url::Url;

/// One unit of dispatchable work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlJob {
    /// Normalized URL to crawl
    pub link: String,

    /// Page the link was found on, empty for the seed
    pub referrer: String,
}

impl CrawlJob {
    pub fn new(link: impl Into<String>, referrer: impl Into<String>) -> Self {
        Self {
            link: link.into(),
            referrer: referrer.into(),
        }
    }

    /// The job for the seed URL, which has no referrer
    pub fn seed(link: impl Into<String>) -> Self {
        Self::new(link, String::new())
    }
}

/// Outcome of fetching and parsing one page
#[derive(Debug)]
pub struct CrawlResult {
    /// The job link this result belongs to
    pub link: String,

    /// Absolute links discovered on the page, in document order
    pub links: Vec<Url>,

    /// Canonical URL declared by the page
    pub canonical: Option<String>,

    /// Set when the page produced no links because something went wrong
    pub error: Option<PageError>,
}

impl CrawlResult {
    pub fn failed(link: impl Into<String>, error: PageError) -> Self {
        Self {
            link: link.into(),
            links: Vec::new(),
            canonical: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Discovered links as a deduplicated set of strings
    pub fn collect_links(&self) -> BTreeSet<String> {
        self.links.iter().map(|url| url.to_string()).collect()
    }
}

/// What the report keeps for every crawled page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    pub links: BTreeSet<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Crawl counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlStats {
    /// Pages whose result was ingested, failed ones included
    pub pages_crawled: usize,

    /// Pages that ended with an error
    pub pages_failed: usize,

    /// URLs admitted by the filter, seed included
    pub links_admitted: usize,

    /// Admitted URLs lost to a full frontier
    pub links_dropped: usize,

    /// Wall-clock duration of the crawl
    pub elapsed_ms: u64,
}

impl fmt::Display for CrawlStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pages crawled ({} failed), {} links admitted, {} dropped in {} ms",
            self.pages_crawled,
            self.pages_failed,
            self.links_admitted,
            self.links_dropped,
            self.elapsed_ms
        )
    }
}

/// Aggregated crawl output, available once the crawl is done
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlReport {
    /// Normalized seed URL
    pub seed: String,

    /// Every crawled page keyed by its normalized URL
    pub pages: BTreeMap<String, PageRecord>,

    pub stats: CrawlStats,
}

impl CrawlReport {
    pub fn new(seed: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            ..Default::default()
        }
    }

    /// Record a page result, errors become a marker on an empty entry
    pub fn record(&mut self, result: &CrawlResult) {
        self.stats.pages_crawled += 1;

        let error = result.error.as_ref().map(|e| {
            warn!("Failed to crawl {}: {}", result.link, e);
            self.stats.pages_failed += 1;
            e.to_string()
        });

        self.pages.insert(
            result.link.clone(),
            PageRecord {
                links: result.collect_links(),
                canonical: result.canonical.clone(),
                error,
            },
        );
    }

    /// Links of one page, `None` when the page was never crawled
    pub fn links_of(&self, link: &str) -> Option<&BTreeSet<String>> {
        self.pages.get(link).map(|page| &page.links)
    }
}
