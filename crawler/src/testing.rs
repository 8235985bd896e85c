//! Test doubles shared by the unit tests

use crate::error::FetchError;
use crate::fetcher::{FetchRequest, FetchResponse, Fetcher};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Generator = dyn Fn(&str) -> Option<String> + Send + Sync;

#[derive(Clone)]
enum Reply {
    Page {
        status: u16,
        content_type: String,
        body: String,
    },
    Fail,
}

/// Fetcher answering from a fixed script. Unknown URLs get a 404.
#[derive(Clone, Default)]
pub struct ScriptedFetcher {
    replies: Arc<HashMap<String, Reply>>,
    generator: Option<Arc<Generator>>,
    delay: Duration,
    requests: Arc<Mutex<Vec<FetchRequest>>>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn reply(mut self, url: &str, reply: Reply) -> Self {
        Arc::make_mut(&mut self.replies).insert(url.to_string(), reply);
        self
    }

    /// An HTML page
    pub fn page(self, url: &str, body: &str) -> Self {
        self.raw(url, 200, "text/html; charset=utf-8", body)
    }

    /// An HTML response with the given status
    pub fn status(self, url: &str, status: u16) -> Self {
        self.raw(url, status, "text/html", "")
    }

    pub fn raw(self, url: &str, status: u16, content_type: &str, body: &str) -> Self {
        self.reply(
            url,
            Reply::Page {
                status,
                content_type: content_type.to_string(),
                body: body.to_string(),
            },
        )
    }

    /// A transport failure
    pub fn failing(self, url: &str) -> Self {
        self.reply(url, Reply::Fail)
    }

    /// Bodies for URLs missing from the script, `None` answers 404
    pub fn generator(
        mut self,
        generator: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.generator = Some(Arc::new(generator));
        self
    }

    /// Hold every response for a while so fetches overlap
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn fetched(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .map(|r| r.url.to_string())
            .collect()
    }

    /// Most fetches ever running at once
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn lookup(&self, url: &str) -> Reply {
        if let Some(reply) = self.replies.get(url) {
            return reply.clone();
        }
        match self.generator.as_ref().and_then(|generate| generate(url)) {
            Some(body) => Reply::Page {
                status: 200,
                content_type: "text/html".to_string(),
                body,
            },
            None => Reply::Page {
                status: 404,
                content_type: "text/html".to_string(),
                body: String::new(),
            },
        }
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        self.requests.lock().unwrap().push(request.clone());

        let running = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        } else {
            tokio::task::yield_now().await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        match self.lookup(request.url.as_str()) {
            Reply::Fail => Err(FetchError::Network("connection refused".to_string())),
            Reply::Page {
                status,
                content_type,
                body,
            } => {
                let mut headers = HeaderMap::new();
                if let Ok(value) = HeaderValue::from_str(&content_type) {
                    headers.insert(CONTENT_TYPE, value);
                }
                Ok(FetchResponse {
                    url: request.url.clone(),
                    status,
                    headers,
                    body,
                })
            }
        }
    }
}
