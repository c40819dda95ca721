//! Readiness state machine gating the editor, the terminal and the run action.

use std::sync::Arc;

use runpad_types::{ExecuteRequest, ExecutionResult, Language};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use uuid::Uuid;

use crate::backend::ExecutionBackend;
use crate::config::{ClientConfig, OverlapPolicy};
use crate::editor::{EditorSession, SharedBuffer};
use crate::error::{ClientError, Result};
use crate::readiness::{wait_for_libraries, LibraryRegistry, LoadSignal, LoadState};
use crate::terminal::TerminalSession;
use crate::widgets::{EditorFactory, MountPoint, TerminalFactory, WindowEvents};

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;

/// Client-side identity of one execution request.
pub type RequestId = Uuid;

/// Readiness of the editor path. Only ever advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Loading,
    LibsReady,
    EditorInitializing,
    Interactive,
}

/// Readiness of the terminal, tracked separately from [`Phase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalPhase {
    Pending,
    Ready,
    Failed,
}

/// Events produced by the orchestrator's background tasks.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    LibrariesReady(LoadState),
    LibrariesFailed(ClientError),
    EditorSettled,
    ExecutionFinished {
        request_id: RequestId,
        result: ExecutionResult,
    },
}

/// What happened to a run request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The editor is not interactive yet. Nothing was queued.
    Disabled,
    /// Another request is in flight and was kept.
    Busy(RequestId),
    Started(RequestId),
    /// The request in flight was aborted in favour of a new one.
    Replaced {
        previous: RequestId,
        current: RequestId,
    },
}

pub struct OrchestratorProps {
    pub config: ClientConfig,
    pub registry: Arc<dyn LibraryRegistry>,
    pub load_signal: Option<LoadSignal>,
    pub editor_factory: Arc<dyn EditorFactory>,
    pub terminal_factory: Arc<dyn TerminalFactory>,
    pub window: Arc<dyn WindowEvents>,
    pub backend: Arc<dyn ExecutionBackend>,
    pub initial_code: String,
    pub language: Language,
}

struct InFlight {
    id: RequestId,
    task: AbortHandle,
}

/// Owns both widget sessions and every background task it starts.
///
/// Drive it by calling [`Orchestrator::start`], reporting mount points as they
/// appear, and feeding [`Orchestrator::next_event`] into
/// [`Orchestrator::handle_event`]. Dropping it tears everything down.
pub struct Orchestrator {
    config: ClientConfig,
    registry: Arc<dyn LibraryRegistry>,
    load_signal: Option<LoadSignal>,
    editor_factory: Arc<dyn EditorFactory>,
    terminal_factory: Arc<dyn TerminalFactory>,
    window: Arc<dyn WindowEvents>,
    backend: Arc<dyn ExecutionBackend>,
    language: Language,
    buffer: SharedBuffer,

    phase: Phase,
    terminal_phase: TerminalPhase,
    events_tx: mpsc::UnboundedSender<ClientEvent>,
    events_rx: mpsc::UnboundedReceiver<ClientEvent>,

    poll_task: Option<AbortHandle>,
    settle_task: Option<AbortHandle>,
    in_flight: Option<InFlight>,

    editor: Option<EditorSession>,
    terminal: Option<TerminalSession>,
    editor_mount: Option<MountPoint>,
    terminal_mount: Option<MountPoint>,
    editor_attempted: bool,
    terminal_attempted: bool,

    load_error: Option<ClientError>,
    editor_error: Option<ClientError>,
    last_result: Option<ExecutionResult>,
    torn_down: bool,
}

impl Orchestrator {
    pub fn new(props: OrchestratorProps) -> Orchestrator {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Orchestrator {
            config: props.config,
            registry: props.registry,
            load_signal: props.load_signal,
            editor_factory: props.editor_factory,
            terminal_factory: props.terminal_factory,
            window: props.window,
            backend: props.backend,
            language: props.language,
            buffer: SharedBuffer::new(props.initial_code),
            phase: Phase::Loading,
            terminal_phase: TerminalPhase::Pending,
            events_tx,
            events_rx,
            poll_task: None,
            settle_task: None,
            in_flight: None,
            editor: None,
            terminal: None,
            editor_mount: None,
            terminal_mount: None,
            editor_attempted: false,
            terminal_attempted: false,
            load_error: None,
            editor_error: None,
            last_result: None,
            torn_down: false,
        }
    }

    /// Begin watching for the widget libraries. Calling it again is a no-op.
    pub fn start(&mut self) {
        if self.torn_down || self.poll_task.is_some() || self.phase > Phase::Loading {
            return;
        }
        if self.load_error.is_some() {
            return;
        }

        let registry = self.registry.clone();
        let signal = self.load_signal.as_ref().map(LoadSignal::subscribe);
        let poll_interval = self.config.poll_interval;
        let timeout = self.config.load_timeout;
        let tx = self.events_tx.clone();

        let task = tokio::spawn(async move {
            let event = match wait_for_libraries(registry, signal, poll_interval, timeout).await {
                Ok(state) => ClientEvent::LibrariesReady(state),
                Err(e) => ClientEvent::LibrariesFailed(e),
            };
            let _ = tx.send(event);
        });
        self.poll_task = Some(task.abort_handle());
        log::debug!("Waiting for widget libraries");
    }

    /// Report that the editor's mount point exists.
    pub fn mount_editor(&mut self, mount: MountPoint) {
        if self.torn_down || self.editor_mount.is_some() {
            return;
        }
        self.editor_mount = Some(mount);
        self.init_widgets();
    }

    /// Report that the terminal's mount point exists.
    pub fn mount_terminal(&mut self, mount: MountPoint) {
        if self.torn_down || self.terminal_mount.is_some() {
            return;
        }
        self.terminal_mount = Some(mount);
        self.init_widgets();
    }

    /// Wait for the next event from a background task.
    pub async fn next_event(&mut self) -> Option<ClientEvent> {
        self.events_rx.recv().await
    }

    pub fn handle_event(&mut self, event: ClientEvent) {
        if self.torn_down {
            return;
        }

        match event {
            ClientEvent::LibrariesReady(state) => {
                self.poll_task = None;
                if !state.is_ready() || self.phase != Phase::Loading {
                    return;
                }
                log::info!("Widget libraries ready");
                self.advance(Phase::LibsReady);
                self.init_widgets();
            }
            ClientEvent::LibrariesFailed(e) => {
                self.poll_task = None;
                log::error!("{}", e);
                self.load_error = Some(e);
            }
            ClientEvent::EditorSettled => {
                if let Some(task) = self.settle_task.take() {
                    task.abort();
                }
                if self.phase != Phase::EditorInitializing {
                    return;
                }
                if let Some(editor) = self.editor.as_mut() {
                    editor.mark_ready();
                    self.advance(Phase::Interactive);
                    log::info!("Editor interactive, run enabled");
                }
            }
            ClientEvent::ExecutionFinished { request_id, result } => {
                match self.in_flight.as_ref() {
                    Some(current) if current.id == request_id => {
                        self.in_flight = None;
                        self.render(&result);
                        self.last_result = Some(result);
                    }
                    _ => log::debug!("Discarding stale result for request {}", request_id),
                }
            }
        }
    }

    /// Start watching if needed and process events until the editor is
    /// interactive.
    ///
    /// Fails if the libraries never load, the editor cannot be built, or the
    /// libraries are ready but no editor mount point was reported.
    pub async fn wait_until_interactive(&mut self) -> Result<()> {
        self.start();

        loop {
            if self.torn_down {
                return Err(ClientError::TornDown);
            }
            if self.phase == Phase::Interactive {
                return Ok(());
            }
            if let Some(e) = self.load_error.as_ref().or(self.editor_error.as_ref()) {
                return Err(e.clone());
            }
            if self.phase >= Phase::LibsReady && self.editor_mount.is_none() {
                return Err(ClientError::NotInteractive);
            }

            match self.next_event().await {
                Some(event) => self.handle_event(event),
                None => return Err(ClientError::TornDown),
            }
        }
    }

    /// Trigger a run of the current buffer.
    pub fn run(&mut self) -> RunOutcome {
        if !self.run_enabled() {
            log::debug!("Run requested in phase {:?}, ignoring", self.phase);
            return RunOutcome::Disabled;
        }

        let previous = match self.in_flight.take() {
            Some(current) => match self.config.overlap_policy {
                OverlapPolicy::Reject => {
                    let id = current.id;
                    self.in_flight = Some(current);
                    log::debug!("Run rejected, request {} still in flight", id);
                    return RunOutcome::Busy(id);
                }
                OverlapPolicy::Replace => {
                    current.task.abort();
                    log::debug!("Aborted request {}", current.id);
                    Some(current.id)
                }
            },
            None => None,
        };

        let request = ExecuteRequest::new(self.buffer.get(), self.language.provider_code());
        let request_id = Uuid::new_v4();
        let backend = self.backend.clone();
        let tx = self.events_tx.clone();

        log::info!(
            "Running {} ({} bytes) via {} as request {}",
            self.language,
            request.script.len(),
            backend.name(),
            request_id
        );
        if let Some(terminal) = self.terminal.as_ref() {
            terminal.write_line(&format!("Running {}...", self.language));
        }

        let timeout = self.config.request_timeout;
        let task = tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, backend.execute(&request)).await {
                Ok(result) => result,
                Err(_) => {
                    log::warn!("Request {} timed out after {:?}", request_id, timeout);
                    ExecutionResult::internal_error(format!(
                        "Execution timed out after {}s",
                        timeout.as_secs()
                    ))
                }
            };
            let _ = tx.send(ClientEvent::ExecutionFinished { request_id, result });
        });
        self.in_flight = Some(InFlight {
            id: request_id,
            task: task.abort_handle(),
        });

        match previous {
            Some(previous) => RunOutcome::Replaced {
                previous,
                current: request_id,
            },
            None => RunOutcome::Started(request_id),
        }
    }

    /// Run the buffer and process events until its result has been rendered.
    pub async fn run_to_completion(&mut self) -> Result<ExecutionResult> {
        let request_id = match self.run() {
            RunOutcome::Started(id) | RunOutcome::Replaced { current: id, .. } => id,
            RunOutcome::Busy(id) => return Err(ClientError::Busy(id)),
            RunOutcome::Disabled if self.torn_down => return Err(ClientError::TornDown),
            RunOutcome::Disabled => return Err(ClientError::NotInteractive),
        };

        loop {
            let event = self.next_event().await.ok_or(ClientError::TornDown)?;
            let finished = match &event {
                ClientEvent::ExecutionFinished {
                    request_id: id,
                    result,
                } if *id == request_id => Some(result.clone()),
                _ => None,
            };
            self.handle_event(event);
            if let Some(result) = finished {
                return Ok(result);
            }
        }
    }

    pub fn run_enabled(&self) -> bool {
        !self.torn_down && self.phase == Phase::Interactive
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn terminal_phase(&self) -> TerminalPhase {
        self.terminal_phase
    }

    pub fn buffer(&self) -> &SharedBuffer {
        &self.buffer
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Language used for subsequent runs. An editor that is already built
    /// keeps the mode it was constructed with.
    pub fn set_language(&mut self, language: Language) {
        if language != self.language {
            log::debug!("Language changed from {} to {}", self.language, language);
            self.language = language;
        }
    }

    pub fn last_result(&self) -> Option<&ExecutionResult> {
        self.last_result.as_ref()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Release every task, listener and widget created so far.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        if let Some(task) = self.poll_task.take() {
            task.abort();
        }
        if let Some(task) = self.settle_task.take() {
            task.abort();
        }
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.task.abort();
            log::debug!("Aborted request {} on teardown", in_flight.id);
        }
        if let Some(mut terminal) = self.terminal.take() {
            terminal.dispose();
        }
        if let Some(mut editor) = self.editor.take() {
            editor.dispose();
        }

        log::debug!("Orchestrator torn down in phase {:?}", self.phase);
    }

    fn advance(&mut self, next: Phase) {
        if next > self.phase {
            log::debug!("Phase {:?} -> {:?}", self.phase, next);
            self.phase = next;
        }
    }

    fn init_widgets(&mut self) {
        if self.phase < Phase::LibsReady {
            return;
        }
        if self.editor_mount.is_some() && !self.editor_attempted {
            self.init_editor();
        }
        if self.terminal_mount.is_some() && !self.terminal_attempted {
            self.init_terminal();
        }
    }

    fn init_editor(&mut self) {
        self.editor_attempted = true;
        let Some(mount) = self.editor_mount.as_ref() else {
            return;
        };

        let mut session = match EditorSession::create(
            self.editor_factory.as_ref(),
            mount,
            self.buffer.clone(),
            self.language,
        ) {
            Ok(session) => session,
            Err(e) => {
                log::error!("{}", e);
                self.editor_error = Some(e);
                return;
            }
        };

        let tx = self.events_tx.clone();
        let layout_event = session.subscribe_layout(Box::new(move || {
            let _ = tx.send(ClientEvent::EditorSettled);
        }));

        // Whichever of the layout event and this timer fires first settles
        // the editor.
        let delay = if layout_event {
            self.config.layout_timeout
        } else {
            self.config.settle_delay
        };
        let tx = self.events_tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(ClientEvent::EditorSettled);
        });
        self.settle_task = Some(task.abort_handle());

        self.editor = Some(session);
        self.advance(Phase::EditorInitializing);
    }

    fn init_terminal(&mut self) {
        self.terminal_attempted = true;
        let Some(mount) = self.terminal_mount.as_ref() else {
            return;
        };

        match TerminalSession::create(
            self.terminal_factory.as_ref(),
            self.window.clone(),
            mount,
            &self.config.terminal_options,
            &self.config.banner,
        ) {
            Ok(session) => {
                self.terminal = Some(session);
                self.terminal_phase = TerminalPhase::Ready;
            }
            Err(e) => {
                log::error!("{}", e);
                self.terminal_phase = TerminalPhase::Failed;
            }
        }
    }

    fn render(&self, result: &ExecutionResult) {
        let Some(terminal) = self.terminal.as_ref() else {
            log::info!("Result ({:?}) with no terminal: {}", result.status_kind, result.output);
            return;
        };

        if result.simulated {
            terminal.write_line("[simulated] Code was not executed; output is approximated.");
        }

        if result.is_success() {
            terminal.write_line(result.output.trim_end_matches('\n'));
            return;
        }

        terminal.write_line(&format!("Error: {}", result.output));
        if let Some(detail) = result.detail.as_ref() {
            terminal.write_line(detail);
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.teardown();
    }
}
