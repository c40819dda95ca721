//! Editor session and the code buffer it mirrors into.

use std::sync::{Arc, RwLock};

use runpad_types::Language;

use crate::error::{ClientError, Result};
use crate::widgets::{EditorFactory, EditorWidget, LayoutCallback, MountPoint};

/// The orchestrator-owned copy of the editor contents.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<RwLock<String>>,
}

impl SharedBuffer {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial.into())),
        }
    }

    pub fn get(&self) -> String {
        match self.inner.read() {
            Ok(value) => value.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn set(&self, value: &str) {
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.clear();
        guard.push_str(value);
    }
}

/// One live editor widget plus the buffer it keeps up to date.
pub struct EditorSession {
    widget: Option<Box<dyn EditorWidget>>,
    buffer: SharedBuffer,
    language: Language,
    ready: bool,
}

impl EditorSession {
    /// Construct the widget on `mount` seeded with the buffer contents and
    /// attach the listener that mirrors every change back into the buffer.
    pub fn create(
        factory: &dyn EditorFactory,
        mount: &MountPoint,
        buffer: SharedBuffer,
        language: Language,
    ) -> Result<Self> {
        let mut widget = factory
            .construct(mount, &buffer.get(), language.editor_mode())
            .map_err(|e| ClientError::initialization("editor", e))?;

        let mirror = buffer.clone();
        widget.on_content_change(Box::new(move |value| mirror.set(value)));

        log::debug!("Editor constructed on '{}' in {} mode", mount, language);

        Ok(Self {
            widget: Some(widget),
            buffer,
            language,
            ready: false,
        })
    }

    /// Subscribe to the widget's layout event if it has one. Returns false
    /// when the caller has to fall back to a settle delay.
    pub fn subscribe_layout(&mut self, callback: LayoutCallback) -> bool {
        match self.widget.as_mut() {
            Some(widget) if widget.supports_layout_event() => {
                widget.on_layout_complete(callback);
                true
            }
            _ => false,
        }
    }

    pub fn mark_ready(&mut self) {
        self.ready = true;
    }

    pub fn is_ready(&self) -> bool {
        self.ready && self.widget.is_some()
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn buffer(&self) -> &SharedBuffer {
        &self.buffer
    }

    /// Release the widget. Safe to call more than once.
    pub fn dispose(&mut self) {
        if let Some(mut widget) = self.widget.take() {
            widget.dispose();
            self.ready = false;
            log::debug!("Editor disposed");
        }
    }
}

impl Drop for EditorSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::MemoryEditorFactory;

    #[test]
    fn test_changes_are_mirrored_into_buffer() {
        let factory = MemoryEditorFactory::new();
        let buffer = SharedBuffer::new("print('hi')");
        let session = EditorSession::create(
            &factory,
            &MountPoint::new("editor"),
            buffer.clone(),
            Language::Python,
        )
        .unwrap();

        assert_eq!(factory.value(), "print('hi')");
        assert_eq!(factory.mode().as_deref(), Some("python"));

        factory.type_text("print('bye')");
        assert_eq!(buffer.get(), "print('bye')");
        assert_eq!(session.buffer().get(), "print('bye')");
    }

    #[test]
    fn test_dispose_runs_once() {
        let factory = MemoryEditorFactory::new();
        let mut session = EditorSession::create(
            &factory,
            &MountPoint::new("editor"),
            SharedBuffer::default(),
            Language::Java,
        )
        .unwrap();
        session.mark_ready();
        assert!(session.is_ready());

        session.dispose();
        session.dispose();
        drop(session);

        assert_eq!(factory.disposed_count(), 1);
    }

    #[test]
    fn test_construction_failure_is_initialization_error() {
        let factory = MemoryEditorFactory::failing();
        let result = EditorSession::create(
            &factory,
            &MountPoint::new("editor"),
            SharedBuffer::default(),
            Language::Python,
        );
        assert!(matches!(
            result,
            Err(ClientError::Initialization { ref widget, .. }) if widget == "editor"
        ));
    }
}
