//! Fetch/cache pipeline for a day's APOD record
use crate::cache::DateKeyedCache;
use crate::clients::{ApodEndpoint, RemoteFetcher};
use crate::config::AppConfig;
use crate::domain::{ApodRecord, DateKey, ViewState};
use crate::errors::{ApiError, ApiResult};
use crate::parser::parse_apod;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

type StateCallback = Box<dyn FnMut(ViewState) + Send>;

/// Emission gate shared between a request's caller and its worker.
///
/// Closing it takes the same lock emission holds, so once `close` returns
/// no further state is delivered.
#[derive(Clone)]
struct StateSink {
    callback: Arc<Mutex<Option<StateCallback>>>,
}

impl StateSink {
    fn new<F>(on_state: F) -> Self
    where
        F: FnMut(ViewState) + Send + 'static,
    {
        Self {
            callback: Arc::new(Mutex::new(Some(Box::new(on_state)))),
        }
    }

    fn emit(&self, state: ViewState) {
        self.emit_with(|| state);
    }

    /// Build and deliver a state while holding the gate; `make` is skipped
    /// when the gate is closed.
    fn emit_with(&self, make: impl FnOnce() -> ViewState) {
        let mut guard = self.callback.lock();
        if let Some(callback) = guard.as_mut() {
            callback(make());
        }
    }

    fn close(&self) {
        self.callback.lock().take();
    }
}

/// Handle to one in-flight `request`
pub struct RequestHandle {
    date: DateKey,
    cancel: CancellationToken,
    sink: StateSink,
    task: JoinHandle<()>,
}

impl RequestHandle {
    /// Day this request is loading
    pub fn date(&self) -> DateKey {
        self.date
    }

    /// Abort the fetch; no callback fires after this returns
    pub fn cancel(&self) {
        self.cancel.cancel();
        self.sink.close();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait for the worker to finish (or observe its cancellation)
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            if !e.is_cancelled() {
                warn!(date = %self.date, error = %e, "APOD worker panicked");
            }
        }
    }
}

/// Owns the date-keyed cache and drives fetch, parse and cache updates.
///
/// Every request revalidates against the network; a cached record is only
/// shown while loading and kept on screen if the refresh fails.
pub struct FetchCachePipeline {
    fetcher: Arc<dyn RemoteFetcher>,
    endpoint: ApodEndpoint,
    cache: Arc<Mutex<DateKeyedCache>>,
    default_date: Option<DateKey>,
}

impl FetchCachePipeline {
    pub fn new(
        fetcher: Arc<dyn RemoteFetcher>,
        endpoint: ApodEndpoint,
        cache: DateKeyedCache,
    ) -> Self {
        Self {
            fetcher,
            endpoint,
            cache: Arc::new(Mutex::new(cache)),
            default_date: None,
        }
    }

    pub fn from_config(fetcher: Arc<dyn RemoteFetcher>, config: &AppConfig) -> ApiResult<Self> {
        let endpoint = ApodEndpoint::new(&config.apod_url, config.nasa_api_key.clone())?;
        let cache = DateKeyedCache::new(config.cache_capacity);
        Ok(Self::new(fetcher, endpoint, cache).with_default_date(config.default_date))
    }

    pub fn with_default_date(mut self, date: Option<DateKey>) -> Self {
        self.default_date = date;
        self
    }

    /// Day loaded for `date`: the given one, the configured default, or today
    pub fn resolve_date(&self, date: Option<DateKey>) -> DateKey {
        date.or(self.default_date).unwrap_or_else(DateKey::today)
    }

    /// Cached record for a day, without touching recency
    pub fn cached(&self, date: DateKey) -> Option<ApodRecord> {
        self.cache.lock().peek(&date).cloned()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.lock().len()
    }

    /// Load a day's record.
    ///
    /// `Loading` is delivered before this returns; the fetch then runs on a
    /// tokio task and delivers exactly one of `Ready` or `Error`. Must be
    /// called from within a tokio runtime.
    ///
    /// `on_state` runs with the request's emission lock held, so it must not
    /// call [`RequestHandle::cancel`] on its own request.
    pub fn request<F>(&self, date: Option<DateKey>, on_state: F) -> RequestHandle
    where
        F: FnMut(ViewState) + Send + 'static,
    {
        self.request_with_fallback(date, None, on_state)
    }

    /// Like [`request`](Self::request), but `fallback` (a record already on
    /// screen) is shown instead of the cached one while loading or on error.
    pub fn request_with_fallback<F>(
        &self,
        date: Option<DateKey>,
        fallback: Option<ApodRecord>,
        on_state: F,
    ) -> RequestHandle
    where
        F: FnMut(ViewState) + Send + 'static,
    {
        let load_date = self.resolve_date(date);
        let shown = fallback
            .clone()
            .or_else(|| self.cache.lock().get(&load_date).cloned());

        debug!(date = %load_date, cached = shown.is_some(), "APOD request");

        let sink = StateSink::new(on_state);
        sink.emit(ViewState::Loading { shown });

        let cancel = CancellationToken::new();
        let url = self.endpoint.url_for(load_date);
        let worker = Worker {
            fetcher: Arc::clone(&self.fetcher),
            cache: Arc::clone(&self.cache),
            sink: sink.clone(),
            cancel: cancel.clone(),
            load_date,
            fallback,
        };
        let task = tokio::spawn(worker.run(url));

        RequestHandle {
            date: load_date,
            cancel,
            sink,
            task,
        }
    }
}

struct Worker {
    fetcher: Arc<dyn RemoteFetcher>,
    cache: Arc<Mutex<DateKeyedCache>>,
    sink: StateSink,
    cancel: CancellationToken,
    load_date: DateKey,
    fallback: Option<ApodRecord>,
}

impl Worker {
    async fn run(self, url: String) {
        let outcome = tokio::select! {
            _ = self.cancel.cancelled() => Err(ApiError::Cancelled),
            outcome = self.fetch_record(&url) => outcome,
        };

        match outcome {
            Ok(record) => {
                let cache = &self.cache;
                let load_date = self.load_date;
                self.sink.emit_with(move || {
                    cache.lock().put(load_date, record.clone());
                    ViewState::Ready { data: record }
                });
            }
            Err(ApiError::Cancelled) => {
                debug!(date = %self.load_date, "APOD request cancelled");
            }
            Err(err) => {
                warn!(
                    date = %self.load_date,
                    kind = err.kind().as_str(),
                    error = %err,
                    "APOD refresh failed"
                );
                let cache = &self.cache;
                let load_date = self.load_date;
                let fallback = self.fallback.clone();
                self.sink.emit_with(move || ViewState::Error {
                    message: err.user_message(),
                    shown: fallback.or_else(|| cache.lock().peek(&load_date).cloned()),
                });
            }
        }
    }

    async fn fetch_record(&self, url: &str) -> ApiResult<ApodRecord> {
        let body = self.fetcher.fetch(url, &self.cancel).await?;
        parse_apod(&body)
    }
}
