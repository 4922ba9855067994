//! Screen adapter between the pipeline and a UI
use crate::domain::{DateKey, ViewState};
use crate::services::{FetchCachePipeline, RequestHandle};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub const FUTURE_DATE_NOTICE: &str = "Please select current date or before";

/// What came of a date selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateChoice {
    Cancelled,
    /// A day after today; nothing was requested
    Rejected(DateKey),
    Requested(DateKey),
}

/// Renders view states and short notices
pub trait Presenter: Send {
    fn on_state_changed(&mut self, state: &ViewState);

    fn show_notice(&mut self, message: &str);
}

/// Asks the user for a day.
///
/// Returns `None` if the user backs out or `cancel` fires; anything the
/// chooser opened must be released before returning.
#[async_trait]
pub trait DateChooser: Send + Sync {
    async fn choose_date(
        &self,
        current: Option<DateKey>,
        cancel: &CancellationToken,
    ) -> Option<DateKey>;
}

/// One APOD screen: current date, last rendered state, active request.
///
/// Pipeline callbacks only push into a channel. `render_next` and
/// `render_pending` drain it on whatever context owns the screen, which is
/// the only place the presenter is touched.
///
/// States are tagged with the refresh that produced them; only the latest
/// refresh is rendered.
pub struct Screen<P: Presenter> {
    pipeline: Arc<FetchCachePipeline>,
    presenter: P,
    screen_date: DateKey,
    last_state: Option<ViewState>,
    states_tx: mpsc::UnboundedSender<(u64, ViewState)>,
    states_rx: mpsc::UnboundedReceiver<(u64, ViewState)>,
    active: Option<RequestHandle>,
    current: u64,
    settled: bool,
    today: fn() -> DateKey,
}

impl<P: Presenter> Screen<P> {
    pub fn new(pipeline: Arc<FetchCachePipeline>, presenter: P) -> Self {
        let (states_tx, states_rx) = mpsc::unbounded_channel();
        let screen_date = pipeline.resolve_date(None);
        Self {
            pipeline,
            presenter,
            screen_date,
            last_state: None,
            states_tx,
            states_rx,
            active: None,
            current: 0,
            settled: true,
            today: DateKey::today,
        }
    }

    /// Replace the clock used to reject future dates
    pub fn with_today(mut self, today: fn() -> DateKey) -> Self {
        self.today = today;
        self
    }

    pub fn screen_date(&self) -> DateKey {
        self.screen_date
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    /// Last rendered state, for the caller to persist
    pub fn saved_state(&self) -> Option<&ViewState> {
        self.last_state.as_ref()
    }

    /// Bring back a state saved by an earlier screen instance
    pub fn restore(&mut self, saved: Option<ViewState>) {
        let Some(state) = saved else {
            return;
        };

        if let Some(date) = state.displayed().and_then(|r| r.date) {
            self.screen_date = date;
        }
        self.render(state);
    }

    /// Reload `date`, or the current screen date.
    ///
    /// Without an explicit date, whatever record is on screen is kept as
    /// the fallback while the refresh runs.
    pub fn refresh(&mut self, date: Option<DateKey>) {
        let fallback = match date {
            Some(_) => None,
            None => self.last_state.as_ref().and_then(|s| s.displayed()).cloned(),
        };
        let load_date = date.unwrap_or(self.screen_date);
        self.screen_date = load_date;

        // The previous request keeps running detached and still fills the
        // cache, but its states are no longer rendered.
        self.current += 1;
        self.settled = false;
        let id = self.current;
        let tx = self.states_tx.clone();
        let handle = self
            .pipeline
            .request_with_fallback(Some(load_date), fallback, move |state| {
                let _ = tx.send((id, state));
            });
        self.active = Some(handle);
    }

    /// Let the user pick a day and load it.
    ///
    /// Days after today are refused with a notice and nothing is requested.
    pub async fn choose_date(
        &mut self,
        chooser: &dyn DateChooser,
        cancel: &CancellationToken,
    ) -> DateChoice {
        let Some(date) = chooser.choose_date(Some(self.screen_date), cancel).await else {
            debug!("date selection cancelled");
            return DateChoice::Cancelled;
        };

        if date > (self.today)() {
            info!(date = %date, "rejected future date");
            self.presenter.show_notice(FUTURE_DATE_NOTICE);
            return DateChoice::Rejected(date);
        }

        self.screen_date = date;
        self.refresh(Some(date));
        DateChoice::Requested(date)
    }

    /// Wait for the next state of the active request and render it.
    ///
    /// Returns `None` once nothing more can arrive: the request has
    /// settled, was closed, or none was started.
    pub async fn render_next(&mut self) -> Option<&ViewState> {
        let state = self.next_state().await?;
        self.render(state);
        self.last_state.as_ref()
    }

    /// Render every state already delivered; returns how many
    pub fn render_pending(&mut self) -> usize {
        let mut rendered = 0;
        while let Some(state) = self.try_next_state() {
            self.render(state);
            rendered += 1;
        }
        rendered
    }

    /// Render until the active request reaches `Ready` or `Error`.
    ///
    /// Returns `None` if it never will, e.g. after `close`.
    pub async fn render_until_settled(&mut self) -> Option<&ViewState> {
        loop {
            let state = self.next_state().await?;
            let settled = state.is_terminal();
            self.render(state);
            if settled {
                return self.last_state.as_ref();
            }
        }
    }

    /// Cancel whatever is in flight
    pub fn close(&mut self) {
        if let Some(handle) = self.active.take() {
            handle.cancel();
        }
    }

    fn waiting(&self) -> bool {
        self.active.is_some() && !self.settled
    }

    /// Next delivered state of the current refresh, without waiting
    fn try_next_state(&mut self) -> Option<ViewState> {
        while let Ok((id, state)) = self.states_rx.try_recv() {
            if let Some(state) = self.accept(id, state) {
                return Some(state);
            }
        }
        None
    }

    async fn next_state(&mut self) -> Option<ViewState> {
        loop {
            if let Some(state) = self.try_next_state() {
                return Some(state);
            }
            if !self.waiting() {
                return None;
            }
            let (id, state) = self.states_rx.recv().await?;
            if let Some(state) = self.accept(id, state) {
                return Some(state);
            }
        }
    }

    fn accept(&mut self, id: u64, state: ViewState) -> Option<ViewState> {
        if id != self.current {
            debug!(request = id, current = self.current, "dropping superseded state");
            return None;
        }
        if state.is_terminal() {
            self.settled = true;
        }
        Some(state)
    }

    fn render(&mut self, state: ViewState) {
        self.presenter.on_state_changed(&state);
        self.last_state = Some(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::DateKeyedCache;
    use crate::clients::stub::StubFetcher;
    use crate::clients::ApodEndpoint;
    use crate::domain::ApodRecord;
    use crate::errors::ApiError;
    use parking_lot::Mutex;
    use std::time::Duration;

    const NEBULA: &str = r#"{"date":"2024-03-05","title":"Nebula","explanation":"A nebula."}"#;
    const GALAXY: &str = r#"{"date":"2024-03-04","title":"Galaxy","explanation":"A galaxy."}"#;

    #[derive(Default)]
    struct FakePresenter {
        states: Vec<ViewState>,
        notices: Vec<String>,
    }

    impl Presenter for FakePresenter {
        fn on_state_changed(&mut self, state: &ViewState) {
            self.states.push(state.clone());
        }

        fn show_notice(&mut self, message: &str) {
            self.notices.push(message.to_string());
        }
    }

    struct FixedChooser {
        answer: Option<DateKey>,
        asked_with: Mutex<Vec<Option<DateKey>>>,
    }

    impl FixedChooser {
        fn new(answer: Option<DateKey>) -> Self {
            Self {
                answer,
                asked_with: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl DateChooser for FixedChooser {
        async fn choose_date(
            &self,
            current: Option<DateKey>,
            _cancel: &CancellationToken,
        ) -> Option<DateKey> {
            self.asked_with.lock().push(current);
            self.answer
        }
    }

    fn day(d: u32) -> DateKey {
        DateKey::from_ymd(2024, 3, d).unwrap()
    }

    fn march_fifth() -> DateKey {
        day(5)
    }

    fn screen(fetcher: Arc<StubFetcher>) -> Screen<FakePresenter> {
        let endpoint = ApodEndpoint::nasa("DEMO_KEY").unwrap();
        let pipeline = FetchCachePipeline::new(fetcher, endpoint, DateKeyedCache::default())
            .with_default_date(Some(march_fifth()));
        Screen::new(Arc::new(pipeline), FakePresenter::default()).with_today(march_fifth)
    }

    #[tokio::test]
    async fn test_refresh_renders_loading_then_ready() {
        let fetcher = Arc::new(StubFetcher::new().then_body(NEBULA));
        let mut screen = screen(fetcher);

        screen.refresh(None);
        let settled = screen.render_until_settled().await.cloned();

        assert!(matches!(settled, Some(ViewState::Ready { .. })));
        let states = &screen.presenter().states;
        assert_eq!(states.len(), 2);
        assert_eq!(states[0], ViewState::Loading { shown: None });
        assert_eq!(screen.saved_state(), states.last());
    }

    #[tokio::test]
    async fn test_future_date_rejected() {
        let fetcher = Arc::new(StubFetcher::new());
        let mut screen = screen(Arc::clone(&fetcher));
        let chooser = FixedChooser::new(Some(day(6)));

        let choice = screen.choose_date(&chooser, &CancellationToken::new()).await;

        assert_eq!(choice, DateChoice::Rejected(day(6)));
        assert_eq!(screen.presenter().notices, vec![FUTURE_DATE_NOTICE]);
        assert_eq!(screen.screen_date(), march_fifth());
        assert_eq!(screen.render_pending(), 0);
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_choice_does_nothing() {
        let fetcher = Arc::new(StubFetcher::new());
        let mut screen = screen(Arc::clone(&fetcher));
        let chooser = FixedChooser::new(None);

        let choice = screen.choose_date(&chooser, &CancellationToken::new()).await;

        assert_eq!(choice, DateChoice::Cancelled);
        assert!(screen.presenter().notices.is_empty());
        assert_eq!(screen.render_pending(), 0);
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_valid_choice_loads_day() {
        let fetcher = Arc::new(StubFetcher::new().then_body(GALAXY));
        let mut screen = screen(Arc::clone(&fetcher));
        let chooser = FixedChooser::new(Some(day(4)));

        let choice = screen.choose_date(&chooser, &CancellationToken::new()).await;
        screen.render_until_settled().await;

        assert_eq!(choice, DateChoice::Requested(day(4)));
        assert_eq!(*chooser.asked_with.lock(), vec![Some(march_fifth())]);
        assert_eq!(screen.screen_date(), day(4));
        assert!(fetcher.urls()[0].ends_with("date=2024-03-04"));
        let shown = screen.saved_state().and_then(|s| s.displayed()).cloned();
        assert_eq!(shown.and_then(|r| r.title), Some("Galaxy".to_string()));
    }

    #[tokio::test]
    async fn test_today_is_accepted() {
        let fetcher = Arc::new(StubFetcher::new().then_body(NEBULA));
        let mut screen = screen(Arc::clone(&fetcher));

        screen
            .choose_date(&FixedChooser::new(Some(march_fifth())), &CancellationToken::new())
            .await;
        screen.render_until_settled().await;

        assert_eq!(fetcher.calls(), 1);
        assert!(screen.presenter().notices.is_empty());
    }

    #[tokio::test]
    async fn test_restore_then_failed_refresh_keeps_record() {
        let fetcher = Arc::new(StubFetcher::new().then_fail(ApiError::Network("offline".into())));
        let mut screen = screen(fetcher);
        let saved = ApodRecord {
            date: Some(day(2)),
            title: Some("Saved".into()),
            ..Default::default()
        };

        screen.restore(Some(ViewState::Ready { data: saved.clone() }));
        assert_eq!(screen.screen_date(), day(2));

        screen.refresh(None);
        let settled = screen.render_until_settled().await.cloned();

        match settled {
            Some(ViewState::Error { shown, .. }) => assert_eq!(shown, Some(saved.clone())),
            other => panic!("expected error state, got {other:?}"),
        }
        assert_eq!(
            screen.presenter().states[1],
            ViewState::Loading { shown: Some(saved) }
        );
    }

    #[tokio::test]
    async fn test_close_cancels_active_request() {
        let fetcher = Arc::new(StubFetcher::new().then_hang());
        let mut screen = screen(fetcher);

        screen.refresh(None);
        tokio::task::yield_now().await;
        screen.close();
        tokio::task::yield_now().await;

        assert_eq!(screen.render_pending(), 1);
        assert!(matches!(screen.saved_state(), Some(ViewState::Loading { .. })));
    }

    #[tokio::test]
    async fn test_render_after_close_returns_none() {
        let fetcher = Arc::new(StubFetcher::new().then_hang());
        let mut screen = screen(fetcher);

        screen.refresh(None);
        screen.close();

        let settled = tokio::time::timeout(Duration::from_secs(2), screen.render_until_settled())
            .await
            .expect("render_until_settled waited after close")
            .cloned();
        assert_eq!(settled, None);
        assert_eq!(screen.presenter().states, vec![ViewState::Loading { shown: None }]);

        let next = tokio::time::timeout(Duration::from_secs(2), screen.render_next())
            .await
            .expect("render_next waited after close");
        assert!(next.is_none());
    }

    #[tokio::test]
    async fn test_render_without_request_returns_none() {
        let mut screen = screen(Arc::new(StubFetcher::new()));

        assert!(screen.render_next().await.is_none());
        assert!(screen.render_until_settled().await.is_none());
    }

    #[tokio::test]
    async fn test_render_next_stops_after_settled() {
        let fetcher = Arc::new(StubFetcher::new().then_body(NEBULA));
        let mut screen = screen(fetcher);

        screen.refresh(None);
        assert!(screen.render_until_settled().await.is_some());

        assert!(screen.render_next().await.is_none());
    }

    #[tokio::test]
    async fn test_superseded_refresh_is_not_rendered() {
        let fetcher = Arc::new(StubFetcher::new().then_body(GALAXY).then_body(NEBULA));
        let mut screen = screen(Arc::clone(&fetcher));

        screen.refresh(Some(day(4)));
        while screen.pipeline.cached(day(4)).is_none() {
            tokio::task::yield_now().await;
        }
        screen.refresh(Some(day(5)));
        let settled = screen.render_until_settled().await.cloned();

        let shown = settled.as_ref().and_then(|s| s.displayed());
        assert_eq!(shown.and_then(|r| r.title.as_deref()), Some("Nebula"));
        assert_eq!(screen.presenter().states.len(), 2);
        assert_eq!(screen.presenter().states[0], ViewState::Loading { shown: None });
        assert_eq!(fetcher.calls(), 2);
    }
}
