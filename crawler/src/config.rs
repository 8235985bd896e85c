use crate::error::ConfigError;
use crate::filter::Scope;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::{ParseError, Url};

pub const DEFAULT_USER_AGENT: &str = concat!("SiteCrawl/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Crawl configuration as read from a JSON file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Starting URL
    pub seed_url: String,

    /// Treat example.com and www.example.com as the same site
    pub allow_www_prefix: bool,

    /// Host prefixes to treat as the bare host, only "www" is understood
    pub allow_prefixes: Vec<String>,

    /// Skip robots.txt rules entirely
    pub ignore_robots_txt: bool,

    /// Issue a HEAD request before each GET to skip non-HTML content
    pub do_head_requests: bool,

    /// HTTP user agent, empty for the default one
    pub user_agent: String,

    /// Do not crawl more than this number of pages, 0 for no limit
    pub max_pages: usize,

    /// How many requests may run in parallel, 0 is treated as 1
    pub max_parallel_requests: usize,

    /// Capacity of the queue of admitted links
    pub queue_capacity: usize,

    /// Per request timeout
    pub request_timeout_secs: u64,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            seed_url: String::new(),
            allow_www_prefix: false,
            allow_prefixes: Vec::new(),
            ignore_robots_txt: false,
            do_head_requests: false,
            user_agent: String::new(),
            max_pages: 0,
            max_parallel_requests: 1,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl CrawlConfig {
    /// Config for `seed_url` with everything else defaulted
    pub fn for_seed(seed_url: impl Into<String>) -> Self {
        Self {
            seed_url: seed_url.into(),
            ..Default::default()
        }
    }

    /// Read config from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Check the config and derive the settings a crawl runs with
    pub fn validate(&self) -> Result<CrawlSettings, ConfigError> {
        let raw = self.seed_url.trim();
        if raw.is_empty() {
            return Err(ConfigError::EmptySeed);
        }

        let seed = Url::parse(raw).map_err(|e| match e {
            ParseError::RelativeUrlWithoutBase => ConfigError::MissingScheme(raw.to_string()),
            ParseError::EmptyHost => ConfigError::MissingHost(raw.to_string()),
            other => ConfigError::InvalidSeed {
                url: raw.to_string(),
                reason: other.to_string(),
            },
        })?;
        if !matches!(seed.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme(seed.scheme().to_string()));
        }
        let host = match seed.host_str() {
            Some(host) if !host.is_empty() => host.to_string(),
            _ => return Err(ConfigError::MissingHost(raw.to_string())),
        };

        let allow_www = self.allow_www_prefix
            || self
                .allow_prefixes
                .iter()
                .any(|prefix| prefix.trim_end_matches('.').eq_ignore_ascii_case("www"));

        let user_agent = match self.user_agent.trim() {
            "" => DEFAULT_USER_AGENT.to_string(),
            agent => agent.to_string(),
        };

        Ok(CrawlSettings {
            seed,
            scope: Scope::new(host, allow_www),
            user_agent,
            head_probe: self.do_head_requests,
            respect_robots: !self.ignore_robots_txt,
            max_pages: self.max_pages,
            max_parallel_requests: self.max_parallel_requests.max(1),
            queue_capacity: if self.queue_capacity == 0 {
                DEFAULT_QUEUE_CAPACITY
            } else {
                self.queue_capacity
            },
            request_timeout: Duration::from_secs(self.request_timeout_secs.max(1)),
        })
    }
}

/// Validated, immutable settings of one crawl run
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub seed: Url,
    pub scope: Scope,
    pub user_agent: String,
    pub head_probe: bool,
    pub respect_robots: bool,
    /// 0 for no limit
    pub max_pages: usize,
    pub max_parallel_requests: usize,
    pub queue_capacity: usize,
    pub request_timeout: Duration,
}
