//! Client side of the runpad sandbox.
//!
//! The [`Orchestrator`] gates user interaction on two independently loaded
//! widgets: an editor surface and a terminal surface. It waits for both widget
//! libraries to become available, constructs the widgets once their mount
//! points exist, mirrors the editor contents into an owned buffer, and only
//! then enables the run action. Runs go through an [`ExecutionBackend`],
//! either the HTTP relay or the offline renderer, and their results are
//! written to the terminal.
//!
//! Widgets are host-provided trait objects, so the same state machine drives a
//! browser binding, a native UI or the [`headless`] implementations.

pub mod backend;
pub mod config;
pub mod editor;
pub mod error;
pub mod headless;
pub mod offline;
pub mod orchestrator;
pub mod readiness;
pub mod terminal;
pub mod widgets;

pub use backend::{ExecutionBackend, OfflineBackend, RelayBackend};
pub use config::{ClientConfig, OverlapPolicy};
pub use editor::{EditorSession, SharedBuffer};
pub use error::{ClientError, Result, WidgetError};
pub use offline::{render_offline, EXPRESSION_PLACEHOLDER, NO_OUTPUT_MESSAGE};
pub use orchestrator::{
    ClientEvent, Orchestrator, OrchestratorProps, Phase, RequestId, RunOutcome, TerminalPhase,
};
pub use readiness::{wait_for_libraries, LibraryRegistry, LoadSignal, LoadState};
pub use terminal::TerminalSession;
pub use widgets::{
    EditorFactory, EditorWidget, ListenerId, MountPoint, TerminalFactory, TerminalOptions,
    TerminalWidget, WindowEvents,
};

pub use runpad_types::{ExecuteRequest, ExecutionResult, Language, StatusKind};
