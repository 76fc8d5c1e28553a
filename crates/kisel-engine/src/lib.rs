//! Journal-driven runtime for Kisel.
//!
//! The engine reads platform observations and user commands as JSON lines,
//! drives the core services, and writes the platform actions it takes and
//! every command result back out as JSON lines.
//!
//! ```text
//! journal (stdin/file) --> Engine --> core services --> JSON lines (stdout)
//!                            |                              ^
//!                            +---- JournalPlatform ---------+
//! ```
//!
//! # Modules
//!
//! - [`journal`] -- Inbound events and outbound lines
//! - [`platform`] -- Port implementations fed by the journal
//! - [`engine`] -- Event dispatch to the core services
//! - [`error`] -- Engine error types

pub mod engine;
pub mod error;
pub mod journal;
pub mod platform;

pub use engine::Engine;
pub use error::EngineError;
pub use journal::{InboundEvent, OutboundLine};
pub use platform::JournalPlatform;
