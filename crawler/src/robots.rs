use log::{debug, info, warn};
use regex::Regex;
use reqwest::Client;
use std::sync::Arc;
use url::Url;

/// Tells whether a path may be visited by a user agent
#[cfg_attr(test, mockall::automock)]
pub trait RobotsChecker: Send + Sync {
    fn allowed(&self, path: &str, user_agent: &str) -> bool;
}

/// A robots checker bound to the user agent of one crawl
#[derive(Clone)]
pub struct RobotsGate {
    checker: Arc<dyn RobotsChecker>,
    user_agent: String,
}

impl RobotsGate {
    pub fn new(checker: Arc<dyn RobotsChecker>, user_agent: impl Into<String>) -> Self {
        Self {
            checker,
            user_agent: user_agent.into(),
        }
    }

    pub fn allows(&self, path: &str) -> bool {
        self.checker.allowed(path, &self.user_agent)
    }
}

impl std::fmt::Debug for RobotsGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RobotsGate")
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

/// Parsed robots.txt rules
#[derive(Default, Clone, Debug)]
pub struct RobotsTxt {
    groups: Vec<Group>,
}

/// Rules that apply to a set of user agents
#[derive(Clone, Debug)]
struct Group {
    /// Lower-cased agent tokens, `*` for everyone
    agents: Vec<String>,
    rules: Vec<Rule>,
}

#[derive(Clone, Debug)]
struct Rule {
    allow: bool,
    /// Pattern as written, its length decides precedence
    pattern: String,
    regex: Regex,
}

impl Rule {
    fn new(allow: bool, pattern: &str) -> Option<Self> {
        let (body, anchored) = match pattern.strip_suffix('$') {
            Some(body) => (body, true),
            None => (pattern, false),
        };
        let mut source = format!("^{}", regex::escape(body).replace(r"\*", ".*"));
        if anchored {
            source.push('$');
        }
        match Regex::new(&source) {
            Ok(regex) => Some(Self {
                allow,
                pattern: pattern.to_string(),
                regex,
            }),
            Err(e) => {
                debug!("Ignoring robots.txt pattern {:?}: {}", pattern, e);
                None
            }
        }
    }

    fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

impl RobotsTxt {
    /// Parse robots.txt content
    pub fn parse(content: &str) -> Self {
        let mut groups = Vec::new();
        let mut current: Option<Group> = None;
        // A user-agent line after rules starts a new group
        let mut seen_rules = false;

        for line in content.lines() {
            let line = match line.split_once('#') {
                Some((before, _)) => before,
                None => line,
            }
            .trim();
            if line.is_empty() {
                continue;
            }

            let Some((directive, value)) = line.split_once(':') else {
                continue;
            };
            let directive = directive.trim().to_ascii_lowercase();
            let value = value.trim();

            match directive.as_str() {
                "user-agent" => {
                    let agent = value.to_ascii_lowercase();
                    match current.as_mut() {
                        Some(group) if !seen_rules => group.agents.push(agent),
                        _ => {
                            groups.extend(current.take());
                            current = Some(Group {
                                agents: vec![agent],
                                rules: Vec::new(),
                            });
                        }
                    }
                    seen_rules = false;
                }
                "allow" | "disallow" => {
                    // Rules outside of any group are ignored
                    let Some(group) = current.as_mut() else {
                        continue;
                    };
                    seen_rules = true;
                    // Empty disallow means allow all
                    if value.is_empty() {
                        continue;
                    }
                    group.rules.extend(Rule::new(directive == "allow", value));
                }
                // sitemap, crawl-delay, host: not our concern
                _ => {}
            }
        }
        groups.extend(current);

        Self { groups }
    }

    /// Check whether `path` (with query, if any) may be fetched by `user_agent`
    pub fn is_allowed(&self, path: &str, user_agent: &str) -> bool {
        let Some(group) = self.group_for(user_agent) else {
            return true;
        };

        // Longest matching pattern wins, allow wins a tie
        let mut verdict: Option<&Rule> = None;
        for rule in group.rules.iter().filter(|rule| rule.matches(path)) {
            verdict = match verdict {
                Some(best)
                    if best.pattern.len() > rule.pattern.len()
                        || (best.pattern.len() == rule.pattern.len() && best.allow) =>
                {
                    Some(best)
                }
                _ => Some(rule),
            };
        }

        verdict.map_or(true, |rule| rule.allow)
    }

    /// The most specific group naming this agent, else the `*` group
    fn group_for(&self, user_agent: &str) -> Option<&Group> {
        let product = user_agent
            .split('/')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        let mut best: Option<(usize, &Group)> = None;
        if !product.is_empty() {
            for group in &self.groups {
                for agent in group.agents.iter().filter(|a| a.as_str() != "*") {
                    if product.contains(agent.as_str())
                        && best.map_or(true, |(len, _)| agent.len() > len)
                    {
                        best = Some((agent.len(), group));
                    }
                }
            }
        }

        best.map(|(_, group)| group).or_else(|| {
            self.groups
                .iter()
                .find(|group| group.agents.iter().any(|a| a == "*"))
        })
    }
}

impl RobotsChecker for RobotsTxt {
    fn allowed(&self, path: &str, user_agent: &str) -> bool {
        self.is_allowed(path, user_agent)
    }
}

/// Fetch robots.txt for the host of `seed`.
///
/// A missing or unreachable robots.txt is not an error: the crawl simply runs without rules.
pub async fn fetch_robots(client: &Client, seed: &Url) -> Option<RobotsTxt> {
    let mut robots_url = seed.clone();
    robots_url.set_path("/robots.txt");
    robots_url.set_query(None);
    robots_url.set_fragment(None);

    info!("Fetching robots.txt from {}", robots_url);
    match client.get(robots_url.as_str()).send().await {
        Ok(response) if response.status().is_success() => match response.text().await {
            Ok(text) => Some(RobotsTxt::parse(&text)),
            Err(e) => {
                warn!("Failed to read robots.txt from {}: {}", robots_url, e);
                None
            }
        },
        Ok(response) => {
            debug!(
                "No robots.txt at {} (status: {})",
                robots_url,
                response.status()
            );
            None
        }
        Err(e) => {
            warn!("Failed to fetch robots.txt from {}: {}", robots_url, e);
            None
        }
    }
}
