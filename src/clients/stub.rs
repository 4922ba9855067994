//! Scripted fetcher for pipeline and screen tests
use super::RemoteFetcher;
use crate::errors::{ApiError, ApiResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

pub enum Step {
    Body(String),
    Fail(ApiError),
    /// Never answers; returns `Cancelled` once the token fires
    Hang,
}

#[derive(Default)]
pub struct StubFetcher {
    steps: Mutex<VecDeque<Step>>,
    urls: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_body(self, body: &str) -> Self {
        self.steps.lock().push_back(Step::Body(body.to_string()));
        self
    }

    pub fn then_fail(self, err: ApiError) -> Self {
        self.steps.lock().push_back(Step::Fail(err));
        self
    }

    pub fn then_hang(self) -> Self {
        self.steps.lock().push_back(Step::Hang);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }
}

#[async_trait]
impl RemoteFetcher for StubFetcher {
    async fn fetch(&self, url: &str, cancel: &CancellationToken) -> ApiResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().push(url.to_string());

        let step = self.steps.lock().pop_front();
        match step {
            Some(Step::Body(body)) => Ok(body),
            Some(Step::Fail(err)) => Err(err),
            Some(Step::Hang) => {
                cancel.cancelled().await;
                Err(ApiError::Cancelled)
            }
            None => Err(ApiError::Network("no scripted response".to_string())),
        }
    }
}
