//! Global loading overlay.
//!
//! One shared overlay that any part of a flow can show, update and hide.
//! While loading, multiple messages rotate on a fixed interval until a
//! ceiling is reached. Marking the work complete hides the overlay after a
//! short delay, except in dev mode where it waits for [`LoadingOverlay::dev_continue`].
//!
//! Every `show_loading` starts a new session. Timer tasks carry the session
//! epoch they were started for and do nothing once it has moved on, so a
//! timer never touches a later session's state. Hiding aborts them outright.
//! Timers are spawned onto the current Tokio runtime.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::debug;

/// Timer settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayTimings {
    /// Time between message rotations.
    pub rotation_interval: Duration,
    /// Rotation stops this long after `show_loading`.
    pub rotation_ceiling: Duration,
    /// Delay between `mark_loading_complete` and the automatic hide.
    pub auto_hide_delay: Duration,
    /// Delay between a dev-mode `show_loading` and the continue affordance.
    pub dev_continue_delay: Duration,
}

impl Default for OverlayTimings {
    fn default() -> Self {
        Self {
            rotation_interval: Duration::from_millis(1500),
            rotation_ceiling: Duration::from_millis(10_000),
            auto_hide_delay: Duration::from_millis(1000),
            dev_continue_delay: Duration::from_millis(2000),
        }
    }
}

/// Coarse phase derived from [`LoadingState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayPhase {
    Idle,
    Loading,
    Complete,
    DevPaused,
}

/// Snapshot of the overlay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadingState {
    pub is_loading: bool,
    pub title: String,
    pub subtitle: String,
    pub messages: Vec<String>,
    pub message_cursor: usize,
    pub can_cancel: bool,
    pub dev_mode: bool,
    pub loading_complete: bool,
    pub show_continue: bool,
}

impl LoadingState {
    pub fn phase(&self) -> OverlayPhase {
        match (self.is_loading, self.loading_complete, self.dev_mode) {
            (false, _, _) => OverlayPhase::Idle,
            (true, false, _) => OverlayPhase::Loading,
            (true, true, false) => OverlayPhase::Complete,
            (true, true, true) => OverlayPhase::DevPaused,
        }
    }

    /// The message under the cursor.
    pub fn current_message(&self) -> Option<&str> {
        self.messages.get(self.message_cursor).map(String::as_str)
    }

    fn rotate(&mut self) {
        if !self.messages.is_empty() {
            self.message_cursor = (self.message_cursor + 1) % self.messages.len();
        }
    }

    fn clamp_cursor(&mut self) {
        if self.messages.is_empty() {
            self.message_cursor = 0;
        } else {
            self.message_cursor = self.message_cursor.min(self.messages.len() - 1);
        }
    }
}

/// Arguments to [`LoadingOverlay::show_loading`].
#[derive(Debug, Clone, Default)]
pub struct LoadingOptions {
    pub title: String,
    pub subtitle: String,
    pub messages: Vec<String>,
    pub can_cancel: bool,
    pub dev_mode: bool,
}

impl LoadingOptions {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = subtitle.into();
        self
    }

    pub fn with_messages<I, S>(mut self, messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.messages = messages.into_iter().map(Into::into).collect();
        self
    }

    pub fn cancellable(mut self, can_cancel: bool) -> Self {
        self.can_cancel = can_cancel;
        self
    }

    pub fn dev_mode(mut self, dev_mode: bool) -> Self {
        self.dev_mode = dev_mode;
        self
    }
}

/// Partial update merged by [`LoadingOverlay::update_loading`].
#[derive(Debug, Clone, Default)]
pub struct LoadingUpdate {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub messages: Option<Vec<String>>,
    pub message_cursor: Option<usize>,
    pub can_cancel: Option<bool>,
}

struct Inner {
    state: LoadingState,
    epoch: u64,
    timers: Vec<JoinHandle<()>>,
}

impl Inner {
    fn abort_timers(&mut self) {
        for timer in self.timers.drain(..) {
            timer.abort();
        }
    }
}

struct Shared {
    inner: Mutex<Inner>,
    tx: watch::Sender<LoadingState>,
    timings: OverlayTimings,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &LoadingState) {
        self.tx.send_replace(state.clone());
    }

    /// Apply `f` if `epoch` is still the live loading session. The check and
    /// the change happen under one lock.
    fn with_session(&self, epoch: u64, f: impl FnOnce(&mut LoadingState)) -> bool {
        let mut inner = self.lock();
        if inner.epoch != epoch || !inner.state.is_loading {
            return false;
        }
        f(&mut inner.state);
        self.publish(&inner.state);
        true
    }

    fn hide(&self) {
        let mut inner = self.lock();
        self.reset(&mut inner);
    }

    /// Hide only if `epoch` is still the live session.
    fn hide_if(&self, epoch: u64) -> bool {
        let mut inner = self.lock();
        if inner.epoch != epoch {
            return false;
        }
        self.reset(&mut inner);
        true
    }

    fn reset(&self, inner: &mut Inner) {
        inner.epoch += 1;
        inner.abort_timers();
        inner.state = LoadingState::default();
        self.publish(&inner.state);
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.inner
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .abort_timers();
    }
}

/// Handle to the shared overlay. Clones refer to the same overlay; pending
/// timers are aborted when the last handle is dropped.
#[derive(Clone)]
pub struct LoadingOverlay {
    shared: Arc<Shared>,
}

impl LoadingOverlay {
    pub fn new() -> Self {
        Self::with_timings(OverlayTimings::default())
    }

    pub fn with_timings(timings: OverlayTimings) -> Self {
        let (tx, _rx) = watch::channel(LoadingState::default());
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: LoadingState::default(),
                    epoch: 0,
                    timers: Vec::new(),
                }),
                tx,
                timings,
            }),
        }
    }

    pub fn timings(&self) -> OverlayTimings {
        self.shared.timings
    }

    /// Current snapshot.
    pub fn state(&self) -> LoadingState {
        self.shared.lock().state.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.shared.lock().state.is_loading
    }

    /// Receive every state change.
    pub fn subscribe(&self) -> watch::Receiver<LoadingState> {
        self.shared.tx.subscribe()
    }

    /// Start a loading session. Returns `false` without changing anything
    /// when a session is already active.
    pub fn show_loading(&self, options: LoadingOptions) -> bool {
        let mut inner = self.shared.lock();
        if inner.state.is_loading {
            debug!(title = %inner.state.title, "Overlay already showing, ignoring show request");
            return false;
        }

        inner.epoch += 1;
        inner.abort_timers();
        inner.state = LoadingState {
            is_loading: true,
            title: options.title,
            subtitle: options.subtitle,
            messages: options.messages,
            message_cursor: 0,
            can_cancel: options.can_cancel,
            dev_mode: options.dev_mode,
            loading_complete: false,
            show_continue: false,
        };

        let timings = self.shared.timings;
        if inner.state.messages.len() > 1 {
            let handle = tokio::spawn(rotate_messages(
                Arc::downgrade(&self.shared),
                inner.epoch,
                timings.rotation_interval,
                timings.rotation_ceiling,
            ));
            inner.timers.push(handle);
        }
        if inner.state.dev_mode {
            let weak = Arc::downgrade(&self.shared);
            let epoch = inner.epoch;
            inner.timers.push(tokio::spawn(async move {
                time::sleep(timings.dev_continue_delay).await;
                if let Some(shared) = weak.upgrade() {
                    shared.with_session(epoch, |state| state.show_continue = true);
                }
            }));
        }

        debug!(title = %inner.state.title, epoch = inner.epoch, "Overlay shown");
        self.shared.publish(&inner.state);
        true
    }

    /// Merge `update` into the current state. Does not show or hide.
    pub fn update_loading(&self, update: LoadingUpdate) {
        let mut inner = self.shared.lock();
        let state = &mut inner.state;
        if let Some(title) = update.title {
            state.title = title;
        }
        if let Some(subtitle) = update.subtitle {
            state.subtitle = subtitle;
        }
        if let Some(messages) = update.messages {
            state.messages = messages;
        }
        if let Some(cursor) = update.message_cursor {
            state.message_cursor = cursor;
        }
        if let Some(can_cancel) = update.can_cancel {
            state.can_cancel = can_cancel;
        }
        state.clamp_cursor();
        self.shared.publish(&inner.state);
    }

    /// Flag the work as done. Outside dev mode the overlay hides itself after
    /// `auto_hide_delay`; in dev mode it stays until [`Self::dev_continue`].
    ///
    /// Ignored when idle or already complete.
    pub fn mark_loading_complete(&self) {
        let mut inner = self.shared.lock();
        if !inner.state.is_loading || inner.state.loading_complete {
            return;
        }
        inner.state.loading_complete = true;

        if !inner.state.dev_mode {
            let weak = Arc::downgrade(&self.shared);
            let epoch = inner.epoch;
            let delay = self.shared.timings.auto_hide_delay;
            inner.timers.push(tokio::spawn(async move {
                time::sleep(delay).await;
                if let Some(shared) = weak.upgrade()
                    && shared.hide_if(epoch)
                {
                    debug!(epoch = epoch, "Auto-hid completed overlay");
                }
            }));
        }
        self.shared.publish(&inner.state);
    }

    /// Cancel all timers and return to idle.
    pub fn hide_loading(&self) {
        self.shared.hide();
    }

    /// Dev-mode continue. Hides a completed dev-mode session and returns
    /// `true`; otherwise does nothing.
    pub fn dev_continue(&self) -> bool {
        let paused = self.state().phase() == OverlayPhase::DevPaused;
        if paused {
            self.hide_loading();
        }
        paused
    }

    /// User cancel. Hides only when the session allows cancelling.
    pub fn cancel(&self) -> bool {
        let allowed = {
            let inner = self.shared.lock();
            inner.state.is_loading && inner.state.can_cancel
        };
        if allowed {
            self.hide_loading();
        }
        allowed
    }
}

impl Default for LoadingOverlay {
    fn default() -> Self {
        Self::new()
    }
}

async fn rotate_messages(shared: Weak<Shared>, epoch: u64, interval: Duration, ceiling: Duration) {
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    let rotation = async {
        loop {
            ticker.tick().await;
            let Some(shared) = shared.upgrade() else {
                return;
            };
            if !shared.with_session(epoch, LoadingState::rotate) {
                return;
            }
        }
    };
    if time::timeout(ceiling, rotation).await.is_err() {
        debug!(epoch = epoch, "Message rotation stopped at ceiling");
    }
}
