use crate::normalize::normalize;
use crate::robots::RobotsGate;
use log::{debug, info};
use std::collections::HashSet;
use std::fmt;
use url::Url;

/// Which hosts belong to the crawled site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    base_host: String,
    allow_www: bool,
}

impl Scope {
    pub fn new(base_host: impl Into<String>, allow_www: bool) -> Self {
        Self {
            base_host: base_host.into().to_ascii_lowercase(),
            allow_www,
        }
    }

    pub fn base_host(&self) -> &str {
        &self.base_host
    }

    pub fn allows_www(&self) -> bool {
        self.allow_www
    }

    /// Whether `host` is the base host, or its `www.` twin when that is allowed
    pub fn contains(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        if self.allow_www {
            strip_www(&host) == strip_www(&self.base_host)
        } else {
            host == self.base_host
        }
    }

    /// Key used for deduplication. With www-equivalence on, `www.host` and `host`
    /// share a key so the site is not crawled twice.
    fn seen_key(&self, url: &Url) -> String {
        if self.allow_www {
            if let Some(bare) = url.host_str().and_then(|h| h.strip_prefix("www.")) {
                let mut bare_url = url.clone();
                if bare_url.set_host(Some(bare)).is_ok() {
                    return bare_url.into();
                }
            }
        }
        url.to_string()
    }
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// Why a link was not admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Malformed,
    UnsupportedScheme,
    OutOfScope,
    Disallowed,
    AlreadySeen,
    BudgetExhausted,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Rejection::Malformed => "malformed URL",
            Rejection::UnsupportedScheme => "unsupported scheme",
            Rejection::OutOfScope => "out of scope",
            Rejection::Disallowed => "disallowed by robots.txt",
            Rejection::AlreadySeen => "already seen",
            Rejection::BudgetExhausted => "page budget exhausted",
        };
        f.write_str(reason)
    }
}

/// Filter verdict for a single link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// The normalized link, now recorded as seen
    Admitted(String),
    Rejected(Rejection),
}

impl Admission {
    pub fn admitted(&self) -> Option<&str> {
        match self {
            Admission::Admitted(link) => Some(link.as_str()),
            Admission::Rejected(_) => None,
        }
    }
}

/// Normalizing URL filter. Owns the seen set of one crawl run.
#[derive(Debug)]
pub struct UrlFilter {
    scope: Scope,
    robots: Option<RobotsGate>,
    seen: HashSet<String>,
    /// Admission cap, 0 for none
    max_pages: usize,
}

impl UrlFilter {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            robots: None,
            seen: HashSet::new(),
            max_pages: 0,
        }
    }

    pub fn with_robots(mut self, robots: RobotsGate) -> Self {
        self.robots = Some(robots);
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Normalize `raw` and decide whether it should be crawled.
    ///
    /// Admission records the link as seen in the same step, so a link is admitted at most once.
    pub fn filter(&mut self, raw: &str) -> Admission {
        let url = match Url::parse(raw.trim()) {
            Ok(url) => url,
            Err(_) => return Admission::Rejected(Rejection::Malformed),
        };
        if !matches!(url.scheme(), "http" | "https") {
            return Admission::Rejected(Rejection::UnsupportedScheme);
        }

        let url = normalize(&url);
        match url.host_str() {
            Some(host) if self.scope.contains(host) => {}
            _ => return Admission::Rejected(Rejection::OutOfScope),
        }

        if let Some(robots) = &self.robots {
            let target = match url.query() {
                Some(query) => format!("{}?{}", url.path(), query),
                None => url.path().to_string(),
            };
            if !robots.allows(&target) {
                info!("Visiting {} disallowed by robots.txt", url);
                return Admission::Rejected(Rejection::Disallowed);
            }
        }

        let key = self.scope.seen_key(&url);
        if self.seen.contains(&key) {
            return Admission::Rejected(Rejection::AlreadySeen);
        }
        if self.budget_exhausted() {
            return Admission::Rejected(Rejection::BudgetExhausted);
        }

        self.seen.insert(key);
        debug!("Admitted {}", url);
        Admission::Admitted(url.into())
    }

    /// Release an admitted link that was never queued, so it can be admitted again
    /// and no longer counts against the page budget
    pub fn forget(&mut self, link: &str) {
        if let Ok(url) = Url::parse(link) {
            let key = self.scope.seen_key(&url);
            self.seen.remove(&key);
        }
    }

    /// True once as many links were admitted as the page budget allows
    pub fn budget_exhausted(&self) -> bool {
        self.max_pages != 0 && self.seen.len() >= self.max_pages
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}
