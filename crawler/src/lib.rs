pub mod config;
pub mod crawler;
pub mod error;
pub mod fetcher;
pub mod filter;
pub mod frontier;
pub mod limiter;
pub mod models;
pub mod normalize;
pub mod parser;
pub mod robots;
pub mod task;

#[cfg(test)]
mod testing;

// Re-export important types
pub use config::{CrawlConfig, CrawlSettings};
pub use crawler::{crawl, Capabilities, CrawlState, Crawler};
pub use error::{ConfigError, FetchError, PageError, ParseError};
pub use fetcher::{FetchRequest, FetchResponse, Fetcher, FetcherOptions, HttpFetcher};
pub use filter::{Admission, Rejection, Scope, UrlFilter};
pub use models::{CrawlJob, CrawlReport, CrawlResult, CrawlStats, PageRecord};
pub use parser::{HtmlParser, ParsedPage, Parser};
pub use robots::{fetch_robots, RobotsChecker, RobotsTxt};
