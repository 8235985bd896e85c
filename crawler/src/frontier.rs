use crate::models::CrawlJob;
use log::warn;
use tokio::sync::mpsc::{self, error::TrySendError};

pub use crate::config::DEFAULT_QUEUE_CAPACITY;

/// Bounded queue of admitted jobs waiting for dispatch.
///
/// Only the orchestrator pushes and pops, so pushing never waits: that would deadlock the
/// loop that is supposed to drain the queue. A full queue drops the job with a warning.
#[derive(Debug)]
pub struct Frontier {
    tx: mpsc::Sender<CrawlJob>,
    rx: mpsc::Receiver<CrawlJob>,
    queued: usize,
    dropped: usize,
}

impl Frontier {
    pub fn new(capacity: usize) -> Self {
        let capacity = if capacity == 0 {
            DEFAULT_QUEUE_CAPACITY
        } else {
            capacity
        };
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx,
            queued: 0,
            dropped: 0,
        }
    }

    /// Queue a job, returns false when it had to be dropped
    pub fn push(&mut self, job: CrawlJob) -> bool {
        match self.tx.try_send(job) {
            Ok(()) => {
                self.queued += 1;
                true
            }
            Err(TrySendError::Full(job)) => {
                warn!("Link queue is full, dropping {}", job.link);
                self.dropped += 1;
                false
            }
            Err(TrySendError::Closed(job)) => {
                warn!("Link queue is closed, dropping {}", job.link);
                self.dropped += 1;
                false
            }
        }
    }

    /// Next queued job, `None` once the queue is closed and drained
    pub async fn next(&mut self) -> Option<CrawlJob> {
        let job = self.rx.recv().await;
        if job.is_some() {
            self.queued -= 1;
        }
        job
    }

    pub fn len(&self) -> usize {
        self.queued
    }

    pub fn is_empty(&self) -> bool {
        self.queued == 0
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Stop accepting jobs and discard whatever is still queued, returns how many were discarded
    pub fn close(&mut self) -> usize {
        self.rx.close();
        let mut abandoned = 0;
        while self.rx.try_recv().is_ok() {
            abandoned += 1;
        }
        self.queued = 0;
        abandoned
    }
}
