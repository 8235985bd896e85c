use crate::error::PageError;
use crate::fetcher::{FetchRequest, Fetcher};
use crate::limiter::Limiter;
use crate::models::{CrawlJob, CrawlResult};
use crate::parser::Parser;
use log::debug;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;
use url::Url;

/// What every page task of one crawl shares
pub struct TaskContext {
    pub fetcher: Arc<dyn Fetcher>,
    pub parser: Arc<dyn Parser>,
    pub limiter: Limiter,
    pub user_agent: String,
    pub head_probe: bool,
    pub acceptable_content_types: Vec<String>,
}

/// Fetches one page and extracts its links
#[derive(Debug)]
pub struct PageTask {
    job: CrawlJob,
}

impl PageTask {
    pub fn new(job: CrawlJob) -> Self {
        Self { job }
    }

    /// Run the task under a limiter permit. Never fails: problems end up in the result.
    pub async fn run(self, ctx: &TaskContext) -> CrawlResult {
        let _permit = match ctx.limiter.acquire().await {
            Ok(permit) => permit,
            Err(_) => return CrawlResult::failed(self.job.link, PageError::Aborted),
        };

        let started = Instant::now();
        debug!("Started {}", self.job.link);
        let result = self.process(ctx).await;
        debug!(
            "Finished {} in {:?} ({} links)",
            result.link,
            started.elapsed(),
            result.links.len()
        );
        result
    }

    async fn process(self, ctx: &TaskContext) -> CrawlResult {
        let link = self.job.link;
        match fetch_links(&link, &self.job.referrer, ctx).await {
            Ok((links, canonical)) => CrawlResult {
                link,
                links,
                canonical,
                error: None,
            },
            Err(error) => CrawlResult::failed(link, error),
        }
    }
}

async fn fetch_links(
    link: &str,
    referrer: &str,
    ctx: &TaskContext,
) -> Result<(Vec<Url>, Option<String>), PageError> {
    // The filter only admits absolute URLs, so this is an upstream bug if it fails
    let url = Url::parse(link).map_err(|_| PageError::InvalidLink(link.to_string()))?;

    let request = FetchRequest {
        url: url.clone(),
        referrer: referrer.to_string(),
        user_agent: ctx.user_agent.clone(),
        head_probe: ctx.head_probe,
        acceptable_content_types: ctx.acceptable_content_types.clone(),
    };
    let response = ctx.fetcher.fetch(&request).await?;

    if !response.is_success() {
        return Err(PageError::Status(response.status));
    }
    let content_type = response.content_type();
    if !request.accepts(content_type) {
        return Err(PageError::ContentType(content_type.map(str::to_string)));
    }

    let page = ctx.parser.parse(&response.body)?;

    let base = match page.base_url.as_deref() {
        Some(base) => url.join(base).unwrap_or(url),
        None => url,
    };
    let links = page
        .links
        .iter()
        .filter_map(|raw| base.join(raw).ok())
        .collect();

    Ok((links, page.canonical_url))
}

/// Hands a task's result to the orchestrator exactly once.
///
/// A slot dropped without delivering (the task panicked or was cancelled) reports the
/// page as aborted, so the orchestrator never waits on a result that will not come.
pub struct ResultSlot {
    link: String,
    tx: Option<UnboundedSender<CrawlResult>>,
}

impl ResultSlot {
    pub fn new(link: impl Into<String>, tx: UnboundedSender<CrawlResult>) -> Self {
        Self {
            link: link.into(),
            tx: Some(tx),
        }
    }

    pub fn deliver(mut self, result: CrawlResult) {
        if let Some(tx) = self.tx.take() {
            // A closed channel means the crawl is over and nobody wants the result
            let _ = tx.send(result);
        }
    }
}

impl Drop for ResultSlot {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(CrawlResult::failed(
                std::mem::take(&mut self.link),
                PageError::Aborted,
            ));
        }
    }
}
