use crate::error::FetchError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_TYPE, REFERER, USER_AGENT};
use reqwest::redirect::Policy;
use reqwest::{Client, RequestBuilder};
use std::time::Duration;
use url::Url;

/// Content types a page must have to be parsed for links
pub const HTML_CONTENT_TYPES: [&str; 2] = ["text/html", "application/xhtml+xml"];

pub const DEFAULT_ACCEPT: &str = "text/html,application/xhtml+xml;q=0.9,*/*;q=0.5";

/// Everything needed to fetch one page
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: Url,

    /// Sent as the `Referer` header when not empty
    pub referrer: String,

    /// Overrides the client user agent when not empty
    pub user_agent: String,

    /// Issue a HEAD first and skip the GET when the content type is unacceptable
    pub head_probe: bool,

    /// Substrings of acceptable `Content-Type` values, empty to accept anything
    pub acceptable_content_types: Vec<String>,
}

impl FetchRequest {
    /// A GET for `url` accepting HTML only
    pub fn new(url: Url) -> Self {
        Self {
            url,
            referrer: String::new(),
            user_agent: String::new(),
            head_probe: false,
            acceptable_content_types: HTML_CONTENT_TYPES.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Unknown content types are rejected unless anything goes
    pub fn accepts(&self, content_type: Option<&str>) -> bool {
        if self.acceptable_content_types.is_empty() {
            return true;
        }
        match content_type {
            Some(content_type) if !content_type.is_empty() => {
                let content_type = content_type.to_ascii_lowercase();
                self.acceptable_content_types
                    .iter()
                    .any(|acceptable| content_type.contains(acceptable.as_str()))
            }
            _ => false,
        }
    }
}

/// A fetched page
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// URL the response came from, after redirects
    pub url: Url,
    pub status: u16,
    pub headers: HeaderMap,
    /// Empty unless the status is a success and the content type acceptable
    pub body: String,
}

impl FetchResponse {
    pub fn content_type(&self) -> Option<&str> {
        content_type_of(&self.headers)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

fn content_type_of(headers: &HeaderMap) -> Option<&str> {
    headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
}

/// Retrieves pages. Implemented over HTTP by [`HttpFetcher`], tests plug in their own.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError>;
}

/// Settings of the HTTP client
#[derive(Debug, Clone)]
pub struct FetcherOptions {
    pub timeout: Duration,
    pub user_agent: String,
    pub accept: String,
    pub max_redirects: usize,
}

impl Default for FetcherOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(crate::config::DEFAULT_REQUEST_TIMEOUT_SECS),
            user_agent: crate::config::DEFAULT_USER_AGENT.to_string(),
            accept: DEFAULT_ACCEPT.to_string(),
            max_redirects: 10,
        }
    }
}

/// Fetcher backed by a reqwest client with a cookie store
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    accept: String,
}

impl HttpFetcher {
    pub fn new(options: FetcherOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(options.user_agent.as_str())
            .timeout(options.timeout)
            .connect_timeout(options.timeout)
            .cookie_store(true)
            .gzip(true)
            .redirect(Policy::limited(options.max_redirects))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            accept: options.accept,
        })
    }

    /// The underlying client, shared with robots.txt retrieval
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn prepare(&self, builder: RequestBuilder, request: &FetchRequest) -> RequestBuilder {
        let mut builder = builder.header(ACCEPT, self.accept.as_str());
        if !request.user_agent.is_empty() {
            builder = builder.header(USER_AGENT, request.user_agent.as_str());
        }
        if !request.referrer.is_empty() {
            builder = builder.header(REFERER, request.referrer.as_str());
        }
        builder
    }

    /// Fails when the HEAD shows the page is not worth a GET
    async fn probe(&self, request: &FetchRequest) -> Result<(), FetchError> {
        let head = self.prepare(self.client.head(request.url.as_str()), request);
        match head.send().await {
            Ok(response) if response.status().is_success() => {
                let content_type = content_type_of(response.headers());
                if request.accepts(content_type) {
                    Ok(())
                } else {
                    Err(FetchError::UnacceptableContentType(
                        content_type.map(str::to_string),
                    ))
                }
            }
            Ok(response) => {
                debug!(
                    "HEAD {} returned {}, falling back to GET",
                    request.url,
                    response.status()
                );
                Ok(())
            }
            Err(e) => {
                debug!("HEAD request error for {}: {}", request.url, e);
                Ok(())
            }
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        debug!("Fetching {}", request.url);
        if request.head_probe {
            self.probe(request).await?;
        }

        let response = self
            .prepare(self.client.get(request.url.as_str()), request)
            .send()
            .await?;

        let url = response.url().clone();
        let status = response.status().as_u16();
        let headers = response.headers().clone();

        let wanted =
            response.status().is_success() && request.accepts(content_type_of(&headers));
        let body = if wanted {
            response
                .text()
                .await
                .map_err(|e| FetchError::Body(e.to_string()))?
        } else {
            String::new()
        };

        Ok(FetchResponse {
            url,
            status,
            headers,
            body,
        })
    }
}
