use crate::config::{CrawlConfig, CrawlSettings};
use crate::error::ConfigError;
use crate::fetcher::{Fetcher, HTML_CONTENT_TYPES};
use crate::filter::{Admission, UrlFilter};
use crate::frontier::Frontier;
use crate::limiter::Limiter;
use crate::models::{CrawlJob, CrawlReport, CrawlResult};
use crate::parser::Parser;
use crate::robots::{RobotsChecker, RobotsGate};
use crate::task::{PageTask, ResultSlot, TaskContext};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use url::Url;

/// The pluggable parts of a crawl
#[derive(Clone)]
pub struct Capabilities {
    pub fetcher: Arc<dyn Fetcher>,
    pub parser: Arc<dyn Parser>,
    /// Consulted for every link when set and robots.txt is respected
    pub robots: Option<Arc<dyn RobotsChecker>>,
}

impl Capabilities {
    pub fn new(fetcher: Arc<dyn Fetcher>, parser: Arc<dyn Parser>) -> Self {
        Self {
            fetcher,
            parser,
            robots: None,
        }
    }

    pub fn with_robots(mut self, robots: Arc<dyn RobotsChecker>) -> Self {
        self.robots = Some(robots);
        self
    }
}

/// Lifecycle of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlState {
    /// Dispatching queued jobs
    Running,
    /// Page budget reached, waiting for in-flight pages.
    ///
    /// The filter stops admitting links at the budget, so `Crawler::run` normally
    /// goes from `Running` straight to `Done`. Only `next_state` reaches this.
    Draining,
    Done,
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CrawlState::Running => "running",
            CrawlState::Draining => "draining",
            CrawlState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Decide the state after an event.
///
/// `idle` means nothing is in flight. Without a budget cutoff the crawl only ends once
/// nothing is in flight and nothing is queued.
pub fn next_state(
    current: CrawlState,
    pages: usize,
    max_pages: usize,
    idle: bool,
    frontier_empty: bool,
) -> CrawlState {
    match current {
        CrawlState::Done => CrawlState::Done,
        _ if max_pages != 0 && pages >= max_pages => {
            if idle {
                CrawlState::Done
            } else {
                CrawlState::Draining
            }
        }
        CrawlState::Draining if idle => CrawlState::Done,
        CrawlState::Draining => CrawlState::Draining,
        CrawlState::Running if idle && frontier_empty => CrawlState::Done,
        CrawlState::Running => CrawlState::Running,
    }
}

/// Bookkeeping owned by the orchestrator loop
struct RunState {
    state: CrawlState,
    /// Every link ever dispatched
    dispatched: HashSet<String>,
    in_flight: HashSet<String>,
    pages: usize,
    max_pages: usize,
    report: CrawlReport,
}

impl RunState {
    fn new(seed: &str, max_pages: usize) -> Self {
        Self {
            state: CrawlState::Running,
            dispatched: HashSet::new(),
            in_flight: HashSet::new(),
            pages: 0,
            max_pages,
            report: CrawlReport::new(seed),
        }
    }

    /// Mark a job in flight, false if it was dispatched before
    fn begin(&mut self, job: &CrawlJob) -> bool {
        if !self.dispatched.insert(job.link.clone()) {
            debug!("Skipping already dispatched {}", job.link);
            return false;
        }
        self.in_flight.insert(job.link.clone());
        true
    }

    /// Ingest a result, returns the links it discovered
    fn complete(&mut self, result: CrawlResult) -> Vec<Url> {
        if !self.in_flight.remove(&result.link) {
            warn!("Got a result for {} which is not in flight", result.link);
        }
        self.pages += 1;
        self.report.record(&result);
        result.links
    }

    fn settle(&mut self, frontier_empty: bool) {
        let next = next_state(
            self.state,
            self.pages,
            self.max_pages,
            self.in_flight.is_empty(),
            frontier_empty,
        );
        if next != self.state {
            info!(
                "Crawl {} -> {} ({} pages, {} in flight)",
                self.state,
                next,
                self.pages,
                self.in_flight.len()
            );
            self.state = next;
        }
    }
}

/// Crawls one site from a seed URL
pub struct Crawler {
    settings: CrawlSettings,
    capabilities: Capabilities,
}

impl Crawler {
    pub fn new(settings: CrawlSettings, capabilities: Capabilities) -> Self {
        Self {
            settings,
            capabilities,
        }
    }

    fn build_filter(&self) -> UrlFilter {
        let mut filter =
            UrlFilter::new(self.settings.scope.clone()).with_max_pages(self.settings.max_pages);
        if self.settings.respect_robots {
            if let Some(robots) = &self.capabilities.robots {
                filter = filter.with_robots(RobotsGate::new(
                    robots.clone(),
                    self.settings.user_agent.clone(),
                ));
            }
        }
        filter
    }

    /// Crawl until there is nothing left to do or the page budget is used up.
    ///
    /// Page level failures are recorded in the report, they never fail the crawl.
    pub async fn run(&self) -> CrawlReport {
        let started = Instant::now();
        let settings = &self.settings;
        let mut filter = self.build_filter();

        info!("Starting from {}", settings.seed);
        let seed = match filter.filter(settings.seed.as_str()) {
            Admission::Admitted(seed) => seed,
            Admission::Rejected(reason) => {
                warn!("Seed {} rejected: {}", settings.seed, reason);
                let mut report = CrawlReport::new(settings.seed.as_str());
                report.stats.elapsed_ms = started.elapsed().as_millis() as u64;
                return report;
            }
        };

        let limiter = Limiter::new(settings.max_parallel_requests);
        let ctx = Arc::new(TaskContext {
            fetcher: self.capabilities.fetcher.clone(),
            parser: self.capabilities.parser.clone(),
            limiter: limiter.clone(),
            user_agent: settings.user_agent.clone(),
            head_probe: settings.head_probe,
            acceptable_content_types: HTML_CONTENT_TYPES.iter().map(|t| t.to_string()).collect(),
        });

        let mut frontier = Frontier::new(settings.queue_capacity);
        let (result_tx, mut result_rx) = mpsc::unbounded_channel::<CrawlResult>();
        let mut tasks = JoinSet::new();
        let mut run = RunState::new(&seed, settings.max_pages);
        let mut budget_logged = false;

        frontier.push(CrawlJob::seed(seed));

        loop {
            run.settle(frontier.is_empty());
            if run.state == CrawlState::Done {
                break;
            }

            tokio::select! {
                Some(job) = frontier.next(), if run.state == CrawlState::Running => {
                    if run.begin(&job) {
                        let slot = ResultSlot::new(job.link.clone(), result_tx.clone());
                        let ctx = ctx.clone();
                        tasks.spawn(async move {
                            let result = PageTask::new(job).run(&ctx).await;
                            slot.deliver(result);
                        });
                    }
                }
                Some(result) = result_rx.recv() => {
                    let referrer = result.link.clone();
                    let discovered = run.complete(result);
                    if run.state != CrawlState::Running {
                        continue;
                    }
                    for link in discovered {
                        if let Admission::Admitted(link) = filter.filter(link.as_str()) {
                            let job = CrawlJob::new(link.clone(), referrer.clone());
                            if !frontier.push(job) {
                                filter.forget(&link);
                            }
                        }
                    }
                    if filter.budget_exhausted() && !budget_logged {
                        info!(
                            "Page budget of {} reached, no further links will be admitted",
                            settings.max_pages
                        );
                        budget_logged = true;
                    }
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => reap(joined),
                else => break,
            }
        }

        // Wake anything still waiting for a permit, then collect the tasks
        limiter.close();
        let abandoned = frontier.close();
        if abandoned > 0 {
            info!("Abandoned {} queued links", abandoned);
        }
        drop(result_tx);
        while let Some(joined) = tasks.join_next().await {
            reap(joined);
        }

        let mut report = run.report;
        report.stats.links_admitted = filter.seen_count();
        report.stats.links_dropped = frontier.dropped();
        report.stats.elapsed_ms = started.elapsed().as_millis() as u64;
        info!("Crawl finished: {}", report.stats);
        report
    }
}

/// The task's page was already reported through its `ResultSlot`
fn reap(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            warn!("Page task panicked: {}", e);
        }
    }
}

/// Validate `config` and crawl with the given capabilities
pub async fn crawl(
    config: &CrawlConfig,
    capabilities: Capabilities,
) -> Result<CrawlReport, ConfigError> {
    let settings = config.validate()?;
    Ok(Crawler::new(settings, capabilities).run().await)
}
