//! Terminal session: widget handle plus its resize listener.

use std::sync::{Arc, Mutex};

use crate::error::{ClientError, Result};
use crate::widgets::{
    ListenerId, MountPoint, TerminalFactory, TerminalOptions, TerminalWidget, WindowEvents,
};

type SharedTerminal = Arc<Mutex<Box<dyn TerminalWidget>>>;

/// One live terminal widget. Only the orchestrator writes to it.
pub struct TerminalSession {
    widget: Option<SharedTerminal>,
    listener: Option<ListenerId>,
    window: Arc<dyn WindowEvents>,
}

impl TerminalSession {
    /// Construct, open, fit, register the resize listener and write the
    /// banner, in that order. If any step fails, whatever was already
    /// created is released before the error is returned.
    pub fn create(
        factory: &dyn TerminalFactory,
        window: Arc<dyn WindowEvents>,
        mount: &MountPoint,
        options: &TerminalOptions,
        banner: &str,
    ) -> Result<Self> {
        let widget = factory
            .construct(options)
            .map_err(|e| ClientError::initialization("terminal", e))?;

        let mut session = TerminalSession {
            widget: Some(Arc::new(Mutex::new(widget))),
            listener: None,
            window,
        };

        session
            .with_widget(|w| w.open(mount))
            .unwrap_or(Ok(()))
            .map_err(|e| ClientError::initialization("terminal", e))?;
        session.fit();

        if let Some(widget) = session.widget.as_ref() {
            let weak = Arc::downgrade(widget);
            let id = session.window.add_resize_listener(Arc::new(move || {
                if let Some(widget) = weak.upgrade() {
                    if let Ok(mut widget) = widget.lock() {
                        widget.fit_to_container();
                    }
                }
            }));
            session.listener = Some(id);
        }

        if !banner.is_empty() {
            session.write_line(banner);
        }

        log::debug!("Terminal attached to '{}'", mount);
        Ok(session)
    }

    fn with_widget<T>(&self, f: impl FnOnce(&mut dyn TerminalWidget) -> T) -> Option<T> {
        let widget = self.widget.as_ref()?;
        let mut guard = match widget.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Some(f(&mut **guard))
    }

    pub fn write(&self, text: &str) {
        self.with_widget(|w| w.write(text));
    }

    /// Write `text` followed by a line break, normalising line endings for
    /// the terminal.
    pub fn write_line(&self, text: &str) {
        let mut normalized = to_terminal_newlines(text);
        normalized.push_str("\r\n");
        self.write(&normalized);
    }

    pub fn clear(&self) {
        self.with_widget(|w| w.clear());
    }

    pub fn fit(&self) {
        self.with_widget(|w| w.fit_to_container());
    }

    pub fn is_open(&self) -> bool {
        self.widget.is_some()
    }

    /// Unregister the resize listener and dispose the widget. Each is
    /// released at most once however often this is called.
    pub fn dispose(&mut self) {
        if let Some(id) = self.listener.take() {
            if !self.window.remove_resize_listener(id) {
                log::warn!("Resize listener {:?} was already unregistered", id);
            }
        }
        if self.widget.is_some() {
            self.with_widget(|w| w.dispose());
            self.widget = None;
            log::debug!("Terminal disposed");
        }
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Convert bare `\n` to `\r\n`.
pub fn to_terminal_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\n', "\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{MemoryTerminalFactory, ResizeListeners};

    fn create(
        factory: &MemoryTerminalFactory,
        window: &Arc<ResizeListeners>,
    ) -> Result<TerminalSession> {
        TerminalSession::create(
            factory,
            window.clone(),
            &MountPoint::new("terminal"),
            &TerminalOptions::default(),
            "ready",
        )
    }

    #[test]
    fn test_initialization_sequence() {
        let factory = MemoryTerminalFactory::new();
        let window = Arc::new(ResizeListeners::new());
        let session = create(&factory, &window).unwrap();

        assert!(session.is_open());
        assert_eq!(factory.opened_on().as_deref(), Some("terminal"));
        assert_eq!(factory.fit_count(), 1);
        assert_eq!(window.listener_count(), 1);
        assert_eq!(factory.output(), "ready\r\n");

        window.dispatch_resize();
        assert_eq!(factory.fit_count(), 2);
    }

    #[test]
    fn test_dispose_removes_listener_and_widget() {
        let factory = MemoryTerminalFactory::new();
        let window = Arc::new(ResizeListeners::new());
        let mut session = create(&factory, &window).unwrap();

        session.dispose();
        session.dispose();
        assert_eq!(window.listener_count(), 0);
        assert_eq!(factory.disposed_count(), 1);

        window.dispatch_resize();
        assert_eq!(factory.fit_count(), 1);
        drop(session);
        assert_eq!(factory.disposed_count(), 1);
    }

    #[test]
    fn test_failed_open_releases_widget_and_registers_no_listener() {
        let factory = MemoryTerminalFactory::failing_open();
        let window = Arc::new(ResizeListeners::new());

        let result = create(&factory, &window);

        assert!(matches!(result, Err(ClientError::Initialization { .. })));
        assert_eq!(window.listener_count(), 0);
        assert_eq!(factory.disposed_count(), 1);
    }

    #[test]
    fn test_newline_conversion() {
        assert_eq!(to_terminal_newlines("a\nb\r\nc"), "a\r\nb\r\nc");
    }
}
