//! argrun - run an external command and interact with it live
//!
//! This library provides the interactive process core behind the `argrun`
//! binary:
//! - Process control: launch, stop (interrupt then kill), input relay, status
//! - Stream pumping with a low-latency flush heuristic for prompts
//! - Output classification and terminal-escape stripping for display
//! - Profile resolution from argument templates into concrete commands
//!
//! # Example
//!
//! ```no_run
//! use argrun::event::init_process_eventsource;
//! use argrun::process::{CommandSpec, ControllerConfig, ProcessController, ProcessEvent, ProcessState};
//! use argrun::sink::{deliver, ConsoleSink};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (event_tx, mut events) = init_process_eventsource();
//!     let controller = ProcessController::new(ControllerConfig::default(), event_tx)?;
//!
//!     controller.start(CommandSpec::new("echo", ["hello"]))?;
//!
//!     let mut sink = ConsoleSink::stdout(true);
//!     while let Some(event) = events.recv().await {
//!         deliver(&mut sink, &event);
//!         if let ProcessEvent::State(ProcessState::Exited(_)) = event {
//!             break;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod event;
pub mod process;
pub mod profile;
pub mod sink;
pub mod utils;

// Re-export commonly used types
pub use event::{init_control_channel, init_process_eventsource, init_user_input, ControlRequest};
pub use process::{CommandSpec, ControlError, ProcessController, ProcessEvent, ProcessState};
pub use sink::{deliver, OutputSink};
