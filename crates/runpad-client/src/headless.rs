//! In-process widget implementations.
//!
//! Used by the command line client, where there is no page to mount into, and
//! by tests, which inspect them through the factory handles.

use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::WidgetError;
use crate::readiness::{LibraryRegistry, LoadState};
use crate::widgets::{
    ContentChangeCallback, EditorFactory, EditorWidget, LayoutCallback, ListenerId, MountPoint,
    ResizeCallback, TerminalFactory, TerminalOptions, TerminalWidget, WindowEvents,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Registry whose state is set directly. Counts how often it is observed.
#[derive(Debug, Default)]
pub struct StaticRegistry {
    state: Mutex<LoadState>,
    polls: AtomicUsize,
}

impl StaticRegistry {
    pub fn pending() -> Self {
        Self::default()
    }

    pub fn ready() -> Self {
        Self {
            state: Mutex::new(LoadState::READY),
            polls: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, state: LoadState) {
        *lock(&self.state) = state;
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

impl LibraryRegistry for StaticRegistry {
    fn observe(&self) -> LoadState {
        self.polls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.state)
    }
}

/// Window stand-in holding resize listeners in memory.
#[derive(Default)]
pub struct ResizeListeners {
    listeners: Mutex<HashMap<ListenerId, ResizeCallback>>,
    next_id: AtomicU64,
}

impl ResizeListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }

    /// Invoke every registered listener.
    pub fn dispatch_resize(&self) {
        let listeners: Vec<ResizeCallback> = lock(&self.listeners).values().cloned().collect();
        for listener in listeners {
            listener();
        }
    }
}

impl WindowEvents for ResizeListeners {
    fn add_resize_listener(&self, listener: ResizeCallback) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        lock(&self.listeners).insert(id, listener);
        id
    }

    fn remove_resize_listener(&self, id: ListenerId) -> bool {
        lock(&self.listeners).remove(&id).is_some()
    }
}

#[derive(Default)]
struct EditorProbe {
    value: String,
    mode: Option<String>,
    on_change: Option<ContentChangeCallback>,
    on_layout: Option<LayoutCallback>,
    constructed: usize,
    disposed: usize,
}

/// Builds [`MemoryEditor`]s and keeps a handle on the latest one.
#[derive(Clone, Default)]
pub struct MemoryEditorFactory {
    probe: Arc<Mutex<EditorProbe>>,
    fail: bool,
    layout_event: bool,
}

impl MemoryEditorFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory whose construction always fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Editors built by this factory report a layout-complete event, fired
    /// with [`MemoryEditorFactory::complete_layout`].
    pub fn with_layout_event(mut self) -> Self {
        self.layout_event = true;
        self
    }

    /// Replace the contents as if typed by the user.
    pub fn type_text(&self, value: &str) {
        let mut probe = lock(&self.probe);
        probe.value = value.to_string();
        if let Some(callback) = probe.on_change.as_ref() {
            callback(value);
        }
    }

    pub fn complete_layout(&self) {
        let callback = lock(&self.probe).on_layout.take();
        if let Some(callback) = callback {
            callback();
        }
    }

    pub fn value(&self) -> String {
        lock(&self.probe).value.clone()
    }

    pub fn mode(&self) -> Option<String> {
        lock(&self.probe).mode.clone()
    }

    pub fn constructed_count(&self) -> usize {
        lock(&self.probe).constructed
    }

    pub fn disposed_count(&self) -> usize {
        lock(&self.probe).disposed
    }
}

impl EditorFactory for MemoryEditorFactory {
    fn construct(
        &self,
        container: &MountPoint,
        initial_value: &str,
        mode: &str,
    ) -> Result<Box<dyn EditorWidget>, WidgetError> {
        if self.fail {
            return Err(WidgetError::Construct(format!(
                "editor library rejected mount point '{}'",
                container
            )));
        }

        let mut probe = lock(&self.probe);
        probe.value = initial_value.to_string();
        probe.mode = Some(mode.to_string());
        probe.constructed += 1;

        Ok(Box::new(MemoryEditor {
            probe: self.probe.clone(),
            layout_event: self.layout_event,
        }))
    }
}

/// Editor that keeps its contents in memory.
pub struct MemoryEditor {
    probe: Arc<Mutex<EditorProbe>>,
    layout_event: bool,
}

impl EditorWidget for MemoryEditor {
    fn value(&self) -> String {
        lock(&self.probe).value.clone()
    }

    fn on_content_change(&mut self, callback: ContentChangeCallback) {
        lock(&self.probe).on_change = Some(callback);
    }

    fn supports_layout_event(&self) -> bool {
        self.layout_event
    }

    fn on_layout_complete(&mut self, callback: LayoutCallback) {
        lock(&self.probe).on_layout = Some(callback);
    }

    fn dispose(&mut self) {
        let mut probe = lock(&self.probe);
        probe.on_change = None;
        probe.on_layout = None;
        probe.disposed += 1;
    }
}

#[derive(Default)]
struct TerminalProbe {
    output: String,
    opened_on: Option<String>,
    fits: usize,
    constructed: usize,
    disposed: usize,
}

/// Builds [`MemoryTerminal`]s that record everything written to them.
#[derive(Clone, Default)]
pub struct MemoryTerminalFactory {
    probe: Arc<Mutex<TerminalProbe>>,
    fail_construct: bool,
    fail_open: bool,
}

impl MemoryTerminalFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_construct() -> Self {
        Self {
            fail_construct: true,
            ..Self::default()
        }
    }

    /// Terminals from this factory construct fine but cannot be attached.
    pub fn failing_open() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }

    pub fn output(&self) -> String {
        lock(&self.probe).output.clone()
    }

    pub fn opened_on(&self) -> Option<String> {
        lock(&self.probe).opened_on.clone()
    }

    pub fn fit_count(&self) -> usize {
        lock(&self.probe).fits
    }

    pub fn constructed_count(&self) -> usize {
        lock(&self.probe).constructed
    }

    pub fn disposed_count(&self) -> usize {
        lock(&self.probe).disposed
    }
}

impl TerminalFactory for MemoryTerminalFactory {
    fn construct(&self, _options: &TerminalOptions) -> Result<Box<dyn TerminalWidget>, WidgetError> {
        if self.fail_construct {
            return Err(WidgetError::Construct("terminal library unavailable".into()));
        }
        lock(&self.probe).constructed += 1;
        Ok(Box::new(MemoryTerminal {
            probe: self.probe.clone(),
            fail_open: self.fail_open,
        }))
    }
}

/// Terminal that appends writes to an in-memory transcript.
pub struct MemoryTerminal {
    probe: Arc<Mutex<TerminalProbe>>,
    fail_open: bool,
}

impl TerminalWidget for MemoryTerminal {
    fn open(&mut self, container: &MountPoint) -> Result<(), WidgetError> {
        if self.fail_open {
            return Err(WidgetError::Mount {
                mount: container.id().to_string(),
                message: "container has no layout".into(),
            });
        }
        lock(&self.probe).opened_on = Some(container.id().to_string());
        Ok(())
    }

    fn write(&mut self, text: &str) {
        lock(&self.probe).output.push_str(text);
    }

    fn clear(&mut self) {
        lock(&self.probe).output.clear();
    }

    fn fit_to_container(&mut self) {
        lock(&self.probe).fits += 1;
    }

    fn dispose(&mut self) {
        lock(&self.probe).disposed += 1;
    }
}

/// Builds terminals that print to standard output.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutTerminalFactory;

impl TerminalFactory for StdoutTerminalFactory {
    fn construct(&self, _options: &TerminalOptions) -> Result<Box<dyn TerminalWidget>, WidgetError> {
        Ok(Box::new(StdoutTerminal))
    }
}

/// Terminal writing straight to stdout.
pub struct StdoutTerminal;

impl TerminalWidget for StdoutTerminal {
    fn open(&mut self, _container: &MountPoint) -> Result<(), WidgetError> {
        Ok(())
    }

    fn write(&mut self, text: &str) {
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = stdout
            .write_all(text.replace("\r\n", "\n").as_bytes())
            .and_then(|_| stdout.flush())
        {
            log::warn!("Failed to write terminal output: {}", e);
        }
    }

    // Scrollback on a real tty is not ours to clear.
    fn clear(&mut self) {}

    fn fit_to_container(&mut self) {}

    fn dispose(&mut self) {}
}
