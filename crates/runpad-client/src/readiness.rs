//! Detection of widget library availability.
//!
//! Libraries are loaded out-of-band by the host. A loader that can report
//! completion raises a [`LoadSignal`]; hosts that cannot are covered by
//! polling a [`LibraryRegistry`]. [`wait_for_libraries`] consumes both and
//! gives up after an optional deadline.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::error::{ClientError, Result};

/// Availability of the two widget libraries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadState {
    pub editor_lib_ready: bool,
    pub terminal_lib_ready: bool,
}

impl LoadState {
    pub const READY: LoadState = LoadState {
        editor_lib_ready: true,
        terminal_lib_ready: true,
    };

    pub fn is_ready(&self) -> bool {
        self.editor_lib_ready && self.terminal_lib_ready
    }

    /// Combine observations. A library seen ready stays ready.
    pub fn merge(self, other: LoadState) -> LoadState {
        LoadState {
            editor_lib_ready: self.editor_lib_ready || other.editor_lib_ready,
            terminal_lib_ready: self.terminal_lib_ready || other.terminal_lib_ready,
        }
    }
}

/// A shared registry that can be inspected for loaded libraries.
pub trait LibraryRegistry: Send + Sync {
    fn observe(&self) -> LoadState;
}

/// Completion signal raised by whatever loads the widget libraries.
#[derive(Debug, Clone)]
pub struct LoadSignal {
    tx: Arc<watch::Sender<LoadState>>,
}

impl LoadSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(LoadState::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn mark_editor_loaded(&self) {
        self.tx.send_modify(|state| state.editor_lib_ready = true);
    }

    pub fn mark_terminal_loaded(&self) {
        self.tx.send_modify(|state| state.terminal_lib_ready = true);
    }

    pub fn subscribe(&self) -> watch::Receiver<LoadState> {
        self.tx.subscribe()
    }
}

impl Default for LoadSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl LibraryRegistry for LoadSignal {
    fn observe(&self) -> LoadState {
        *self.tx.borrow()
    }
}

enum Wake {
    Tick,
    Signal(Option<LoadState>),
    Deadline,
}

async fn next_signal(signal: &mut Option<watch::Receiver<LoadState>>) -> Option<LoadState> {
    match signal {
        Some(rx) => match rx.changed().await {
            Ok(()) => Some(*rx.borrow_and_update()),
            Err(_) => None,
        },
        None => std::future::pending().await,
    }
}

async fn deadline_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Wait until both libraries are available.
///
/// The registry is polled every `poll_interval` (the first poll is
/// immediate) and the optional signal is consumed as it changes. Polling
/// stops as soon as both libraries have been observed; a library observed
/// once is never considered unloaded again.
pub async fn wait_for_libraries(
    registry: Arc<dyn LibraryRegistry>,
    mut signal: Option<watch::Receiver<LoadState>>,
    poll_interval: Duration,
    timeout: Option<Duration>,
) -> Result<LoadState> {
    let deadline = timeout.map(|t| Instant::now() + t);
    let mut observed = match signal.as_mut() {
        Some(rx) => *rx.borrow_and_update(),
        None => LoadState::default(),
    };

    let mut ticker = time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if observed.is_ready() {
            log::debug!("Widget libraries available");
            return Ok(observed);
        }

        let wake = tokio::select! {
            _ = ticker.tick() => Wake::Tick,
            state = next_signal(&mut signal) => Wake::Signal(state),
            _ = deadline_elapsed(deadline) => Wake::Deadline,
        };

        match wake {
            Wake::Tick => observed = observed.merge(registry.observe()),
            Wake::Signal(Some(state)) => observed = observed.merge(state),
            Wake::Signal(None) => {
                log::debug!("Load signal dropped, continuing with polling only");
                signal = None;
            }
            Wake::Deadline => {
                let waited = timeout.unwrap_or_default();
                log::error!(
                    "Widget libraries not available after {:?}: {:?}",
                    waited,
                    observed
                );
                return Err(ClientError::LibraryLoadTimeout(waited));
            }
        }
    }
}
