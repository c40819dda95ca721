//! Wire contract shared by the runpad execution relay and its clients.
//!
//! The relay and the client orchestrator evolve independently; everything that
//! crosses the HTTP boundary between them lives here so both sides agree on
//! field names, status classification and language identifiers.
//!
//! ```rust
//! use runpad_types::{ExecuteRequest, Language};
//!
//! let request = ExecuteRequest::new("print(1)", Language::Python.provider_code());
//! assert!(request.validate().is_ok());
//! ```

pub mod error;
pub mod language;
pub mod types;

pub use error::*;
pub use language::*;
pub use types::*;
