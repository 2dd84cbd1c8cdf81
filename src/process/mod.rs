//! Interactive process execution and control.
//!
//! A [`ProcessController`] launches one [`CommandSpec`] at a time, pumps its
//! stdout and stderr through the flush heuristic in [`pump`], relays input
//! lines to its stdin, and stops it through a platform [`Terminator`]. All
//! output and lifecycle changes are published as [`ProcessEvent`]s.

mod config;
mod controller;
mod dispatch;
mod error;
pub mod pump;
pub mod terminate;
mod types;


pub use config::ControllerConfig;
pub use controller::ProcessController;
pub use error::ControlError;
pub use terminate::{ForcedTree, TerminationMode, Terminator};
#[cfg(unix)]
pub use terminate::GroupSignal;
pub use types::{
    CommandSpec, FlushTrigger, Notice, OutputChunk, ProcessEvent, ProcessState, StreamSource,
};
