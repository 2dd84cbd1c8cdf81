//! Main entry point for the argrun binary.
//!
//! Resolves the command, hands it to the process controller, relays typed
//! lines as input and Ctrl+C as stop, and prints the transcript until the
//! process has finished.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

use argrun::cli::Cli;
use argrun::event::{init_control_channel, init_process_eventsource, init_user_input, ControlRequest};
use argrun::process::{ProcessController, ProcessEvent, ProcessState};
use argrun::sink::{deliver, ConsoleSink};
use argrun::utils;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Initialize logging before anything else
    let _log_guard = utils::logger::init_logging();

    let cli = Cli::parse();
    let spec = cli.command_spec().context("Failed to resolve command")?;

    let (event_tx, mut events) = init_process_eventsource();
    let controller = ProcessController::new(cli.controller_config(), event_tx)?;
    let (requests, request_rx) = init_control_channel();
    let server = tokio::spawn(controller.serve(request_rx));

    request(&requests, ControlRequest::Start(spec));

    let mut sink = ConsoleSink::stdout(!cli.no_color);
    let mut user_input = init_user_input();
    let mut input_open = true;
    let mut signals_ok = true;

    let exit_code = loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break 1 };
                deliver(&mut sink, &event);
                match event {
                    ProcessEvent::State(ProcessState::Exited(code)) => break code,
                    ProcessEvent::State(ProcessState::Failed(_)) => break 1,
                    _ => {}
                }
            }
            line = user_input.recv(), if input_open => match line {
                Some(Ok(line)) => request(&requests, ControlRequest::SendInput(line)),
                Some(Err(e)) => warn!("Failed to read terminal input: {}", e),
                None => input_open = false,
            },
            result = tokio::signal::ctrl_c(), if signals_ok => match result {
                Ok(()) => request(&requests, ControlRequest::Stop),
                Err(e) => {
                    warn!("Failed to listen for Ctrl+C: {}", e);
                    signals_ok = false;
                }
            },
        }
    };

    request(&requests, ControlRequest::Shutdown);
    server.await.context("Process controller task failed")?;
    info!("Exiting with code {}", exit_code);

    Ok(ExitCode::from(u8::try_from(exit_code).unwrap_or(1)))
}

fn request(requests: &UnboundedSender<ControlRequest>, request: ControlRequest) {
    if let Err(e) = requests.send(request) {
        warn!("Process controller is gone, request dropped: {:?}", e.0);
    }
}
