//! Helpers for end-to-end crawler tests against a local HTTP server

use sitecrawl_crawler::{Capabilities, FetcherOptions, HtmlParser, HttpFetcher};
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A fake web site served by wiremock. Paths without a page answer 404.
pub struct MockSite {
    server: MockServer,
}

impl MockSite {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Absolute URL of `route` on this site
    pub fn url(&self, route: &str) -> String {
        format!("{}{}", self.server.uri(), route)
    }

    /// Serve an HTML page on GET
    pub async fn page(&self, route: &str, body: &str) {
        self.respond(
            "GET",
            route,
            ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/html; charset=utf-8"),
        )
        .await;
    }

    /// Serve robots.txt
    pub async fn robots(&self, body: &str) {
        self.respond(
            "GET",
            "/robots.txt",
            ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/plain"),
        )
        .await;
    }

    pub async fn respond(&self, verb: &str, route: &str, response: ResponseTemplate) {
        Mock::given(method(verb))
            .and(path(route))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    /// How many requests with `verb` hit `route`
    pub async fn hits(&self, verb: &str, route: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.method.as_str() == verb && r.url.path() == route)
            .count()
    }
}

/// Real HTTP fetcher and HTML parser
pub fn http_capabilities() -> (HttpFetcher, Capabilities) {
    let fetcher = HttpFetcher::new(FetcherOptions {
        timeout: Duration::from_secs(5),
        user_agent: "SiteCrawlTest/1.0".to_string(),
        ..Default::default()
    })
    .expect("HTTP client");
    let parser = HtmlParser::new().expect("selectors");
    let capabilities = Capabilities::new(Arc::new(fetcher.clone()), Arc::new(parser));
    (fetcher, capabilities)
}

/// Parse a URL that is known to be valid
pub fn url(raw: &str) -> Url {
    Url::parse(raw).expect("valid URL")
}
