//! Contracts for the external widgets the orchestrator drives.
//!
//! Hosts implement these for their editor and terminal components. The
//! orchestrator only ever talks to widgets through these traits and owns every
//! handle it constructs.

use std::fmt;
use std::sync::Arc;

use crate::error::WidgetError;

/// Called with the full editor contents after every change.
pub type ContentChangeCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Called once when the editor's layout has stabilised.
pub type LayoutCallback = Box<dyn FnOnce() + Send>;

/// Called on every window resize.
pub type ResizeCallback = Arc<dyn Fn() + Send + Sync>;

/// A container a widget is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MountPoint {
    id: String,
}

impl MountPoint {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for MountPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// One live editor instance.
pub trait EditorWidget: Send {
    /// Current contents.
    fn value(&self) -> String;

    /// Register the content-change listener.
    fn on_content_change(&mut self, callback: ContentChangeCallback);

    /// Whether [`EditorWidget::on_layout_complete`] is backed by a real event.
    fn supports_layout_event(&self) -> bool {
        false
    }

    /// Subscribe to layout completion. Only called when
    /// [`EditorWidget::supports_layout_event`] returns true.
    fn on_layout_complete(&mut self, _callback: LayoutCallback) {}

    fn dispose(&mut self);
}

/// Builds editor widgets.
pub trait EditorFactory: Send + Sync {
    fn construct(
        &self,
        container: &MountPoint,
        initial_value: &str,
        mode: &str,
    ) -> std::result::Result<Box<dyn EditorWidget>, WidgetError>;
}

/// Options handed to the terminal widget at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalOptions {
    pub cursor_blink: bool,
    pub font_size: u16,
    pub convert_eol: bool,
}

impl Default for TerminalOptions {
    fn default() -> Self {
        Self {
            cursor_blink: true,
            font_size: 14,
            convert_eol: true,
        }
    }
}

/// One live terminal instance. Written to by the orchestrator only.
pub trait TerminalWidget: Send {
    fn open(&mut self, container: &MountPoint) -> std::result::Result<(), WidgetError>;
    fn write(&mut self, text: &str);
    fn clear(&mut self);
    fn fit_to_container(&mut self);
    fn dispose(&mut self);
}

/// Builds terminal widgets.
pub trait TerminalFactory: Send + Sync {
    fn construct(
        &self,
        options: &TerminalOptions,
    ) -> std::result::Result<Box<dyn TerminalWidget>, WidgetError>;
}

/// Handle for a registered resize listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Window-level resize notifications.
pub trait WindowEvents: Send + Sync {
    fn add_resize_listener(&self, listener: ResizeCallback) -> ListenerId;

    /// Returns false if the listener was not registered.
    fn remove_resize_listener(&self, id: ListenerId) -> bool;
}
