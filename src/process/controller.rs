//! The single-slot process controller.
//!
//! At most one child process is live at a time. Its handle and the
//! authoritative [`ProcessState`] sit together behind one mutex; every state
//! transition goes through [`Shared`] while that lock is held, so a `Start`
//! racing another `Start` cannot both pass the "slot is free" check.

use std::io::Write;
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::dispatch;
use super::pump::spawn_pump;
use super::terminate::{self, Terminator};
use super::types::{CommandSpec, Notice, ProcessEvent, ProcessState, StreamSource};
use super::{ControlError, ControllerConfig};
use crate::event::ControlRequest;

/// The live child owned by the slot.
struct Live {
    id: u64,
    pid: u32,
    child: Child,
    stdin: Option<Arc<Mutex<ChildStdin>>>,
    // set once the child has been reaped
    exit: Option<i32>,
    // a signal is being delivered outside the slot lock; the child must not
    // be reaped meanwhile, or its pid could be recycled
    signalling: bool,
}

struct Slot {
    state: ProcessState,
    live: Option<Live>,
    next_id: u64,
}

/// Result of a liveness check on a particular launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Liveness {
    Running,
    Exited(i32),
    Failed(String),
    /// The slot no longer holds this launch.
    Gone,
}

/// State shared between the controller, its dispatch task and stop tasks.
pub(super) struct Shared {
    slot: Mutex<Slot>,
    events: UnboundedSender<ProcessEvent>,
    pub(super) config: ControllerConfig,
    terminator: Arc<dyn Terminator>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn emit(&self, event: ProcessEvent) {
        if let Err(e) = self.events.send(event) {
            debug!("Process event dropped, no receiver: {:?}", e.0);
        }
    }

    fn notice(&self, notice: Notice) {
        self.emit(ProcessEvent::Notice(notice));
    }

    fn set_state(&self, slot: &mut Slot, state: ProcessState) {
        debug!("Process state -> {}", state);
        slot.state = state.clone();
        self.emit(ProcessEvent::State(state));
    }

    /// Checks whether launch `id` is still running, reaping it if it exited.
    pub(super) fn poll_exit(&self, id: u64) -> Liveness {
        let mut slot = self.lock();
        Self::poll_live(&mut slot, id)
    }

    fn poll_live(slot: &mut Slot, id: u64) -> Liveness {
        let Some(live) = slot.live.as_mut().filter(|live| live.id == id) else {
            return Liveness::Gone;
        };
        if let Some(code) = live.exit {
            return Liveness::Exited(code);
        }
        if live.signalling {
            return Liveness::Running;
        }
        match live.child.try_wait() {
            Ok(Some(status)) => {
                let code = exit_code(status);
                info!("Process {} exited with code {}", live.pid, code);
                live.exit = Some(code);
                // closes the child's stdin once no writer holds it
                live.stdin = None;
                Liveness::Exited(code)
            }
            Ok(None) => Liveness::Running,
            Err(e) => {
                error!("Failed to query process {}: {}", live.pid, e);
                Liveness::Failed(format!("failed to query process status: {e}"))
            }
        }
    }

    /// Clears the slot for launch `id` and publishes its final state.
    ///
    /// Only the first call for a given launch has any effect.
    pub(super) fn finish(&self, id: u64, outcome: Liveness) {
        let mut slot = self.lock();
        if slot.live.as_ref().is_none_or(|live| live.id != id) {
            return;
        }
        let state = match outcome {
            Liveness::Exited(code) => ProcessState::Exited(code),
            Liveness::Failed(reason) => ProcessState::Failed(reason),
            Liveness::Running | Liveness::Gone => return,
        };
        slot.live = None;
        self.set_state(&mut slot, state);
    }

    /// Runs `signal` against launch `id` while it is known to be unreaped.
    ///
    /// The signal itself runs without the slot lock (a tree kill may spawn a
    /// helper process). Reaping is suspended until it returns, so the pid
    /// cannot be recycled in between. Returns `None` if the process already
    /// exited.
    fn signal_live<F>(&self, id: u64, signal: F) -> Option<Result<(), ControlError>>
    where
        F: FnOnce(u32) -> Result<(), ControlError>,
    {
        let pid = {
            let mut slot = self.lock();
            if Self::poll_live(&mut slot, id) != Liveness::Running {
                return None;
            }
            let live = slot.live.as_mut()?;
            live.signalling = true;
            live.pid
        };

        let result = signal(pid);

        let mut slot = self.lock();
        if let Some(live) = slot.live.as_mut().filter(|live| live.id == id) {
            live.signalling = false;
        }
        Some(result)
    }

    /// Waits up to `within` for launch `id` to stop running.
    async fn wait_for_exit(&self, id: u64, within: Duration) -> bool {
        let deadline = Instant::now() + within;
        loop {
            if self.poll_exit(id) != Liveness::Running {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            let left = deadline.saturating_duration_since(Instant::now());
            tokio::time::sleep(self.config.poll_interval.min(left)).await;
        }
    }
}

/// Owns the process slot and exposes start/stop/input/status.
///
/// Every operation returns promptly: blocking work (stream reads, the stop
/// grace period, the dispatch loop) runs on worker threads or runtime tasks,
/// and all outcomes are published as [`ProcessEvent`]s.
#[derive(Clone)]
pub struct ProcessController {
    shared: Arc<Shared>,
    runtime: Handle,
}

impl ProcessController {
    /// Creates a controller on the current tokio runtime.
    pub fn new(
        config: ControllerConfig,
        events: UnboundedSender<ProcessEvent>,
    ) -> Result<Self, ControlError> {
        Ok(Self::with_runtime(Handle::try_current()?, config, events))
    }

    pub fn with_runtime(
        runtime: Handle,
        config: ControllerConfig,
        events: UnboundedSender<ProcessEvent>,
    ) -> Self {
        let terminator = terminate::select(config.termination);
        Self::with_terminator(runtime, config, events, terminator)
    }

    /// Creates a controller with an explicit termination strategy.
    pub fn with_terminator(
        runtime: Handle,
        config: ControllerConfig,
        events: UnboundedSender<ProcessEvent>,
        terminator: Arc<dyn Terminator>,
    ) -> Self {
        let shared = Shared {
            slot: Mutex::new(Slot {
                state: ProcessState::Idle,
                live: None,
                next_id: 0,
            }),
            events,
            config,
            terminator,
        };
        Self {
            shared: Arc::new(shared),
            runtime,
        }
    }

    /// Launches `spec` if no process is live.
    pub fn start(&self, spec: CommandSpec) -> Result<(), ControlError> {
        let mut slot = self.shared.lock();

        if let Some(live) = slot.live.as_ref() {
            warn!("Start rejected, process {} is still live", live.pid);
            return Err(ControlError::Busy { pid: live.pid });
        }

        if spec.program().trim().is_empty() {
            let err = ControlError::Configuration;
            warn!("Start rejected: {}", err);
            self.shared.set_state(&mut slot, ProcessState::Failed(err.to_string()));
            return Err(err);
        }

        self.shared.set_state(&mut slot, ProcessState::Starting);
        let command_line = spec.display_line();
        info!("Running command: {}", command_line);
        self.shared.notice(Notice::Launching { command_line });

        let (child, stdin, chunks) = match launch(&spec) {
            Ok(launched) => launched,
            Err(err) => {
                error!("{}", err);
                self.shared.set_state(&mut slot, ProcessState::Failed(err.to_string()));
                return Err(err);
            }
        };

        let id = slot.next_id;
        slot.next_id += 1;
        let pid = child.id();
        slot.live = Some(Live {
            id,
            pid,
            child,
            stdin: stdin.map(|stdin| Arc::new(Mutex::new(stdin))),
            exit: None,
            signalling: false,
        });
        self.shared.set_state(&mut slot, ProcessState::Running(pid));
        drop(slot);

        info!("Process started. PID: {}", pid);
        self.runtime.spawn(dispatch::run(self.shared.clone(), id, chunks));
        Ok(())
    }

    /// Stops the live process, gracefully where the platform allows.
    ///
    /// Returns immediately; the interrupt/grace/kill sequence runs as a task.
    pub fn stop(&self) {
        let mut slot = self.shared.lock();

        let Some(id) = slot.live.as_ref().map(|live| live.id) else {
            self.shared.notice(Notice::NoActiveProcess);
            return;
        };
        if Shared::poll_live(&mut slot, id) != Liveness::Running {
            self.shared.notice(Notice::NoActiveProcess);
            return;
        }
        if slot.state == ProcessState::Stopping {
            debug!("Stop already in progress");
            return;
        }

        self.shared.set_state(&mut slot, ProcessState::Stopping);
        self.shared.notice(Notice::StopRequested);
        drop(slot);

        self.runtime.spawn(stop_sequence(self.shared.clone(), id));
    }

    /// Writes `line` plus a newline to the live process's stdin.
    ///
    /// Blocks while the child's input pipe is full. [`serve`](Self::serve)
    /// relays input from a dedicated thread for that reason.
    pub fn send_input(&self, line: &str) -> Result<(), ControlError> {
        self.shared.notice(Notice::InputEcho {
            line: line.to_string(),
        });

        let result = self.write_input(line);
        match &result {
            Ok(()) => self.shared.notice(Notice::InputSent),
            Err(err) => {
                warn!("Input not delivered: {}", err);
                let reason = match (err, self.exited_code()) {
                    (ControlError::NotRunning { .. }, _) | (_, None) => err.to_string(),
                    (_, Some(code)) => format!("{err}; process has already exited with code: {code}"),
                };
                self.shared.notice(Notice::InputNotDelivered { reason });
            }
        }
        result
    }

    fn write_input(&self, line: &str) -> Result<(), ControlError> {
        let stdin = {
            let mut slot = self.shared.lock();
            let exited_code = match &slot.state {
                ProcessState::Exited(code) => Some(*code),
                _ => None,
            };
            let Some(id) = slot.live.as_ref().map(|live| live.id) else {
                return Err(ControlError::NotRunning { exit_code: exited_code });
            };
            if let Liveness::Exited(code) = Shared::poll_live(&mut slot, id) {
                return Err(ControlError::NotRunning { exit_code: Some(code) });
            }
            slot.live
                .as_ref()
                .and_then(|live| live.stdin.clone())
                .ok_or(ControlError::BrokenPipe)?
        };

        // written outside the slot lock, a full pipe must not stall the controller
        let mut stdin = stdin.lock().unwrap_or_else(PoisonError::into_inner);
        stdin
            .write_all(format!("{line}\n").as_bytes())
            .and_then(|()| stdin.flush())
            .map_err(ControlError::from_write)
    }

    fn exited_code(&self) -> Option<i32> {
        let mut slot = self.shared.lock();
        if let ProcessState::Exited(code) = slot.state {
            return Some(code);
        }
        let id = slot.live.as_ref()?.id;
        match Shared::poll_live(&mut slot, id) {
            Liveness::Exited(code) => Some(code),
            _ => None,
        }
    }

    /// Snapshot of the slot's current state.
    pub fn status(&self) -> ProcessState {
        self.shared.lock().state.clone()
    }

    /// Serves requests from a single controlling caller until the channel
    /// closes or [`ControlRequest::Shutdown`] arrives.
    ///
    /// Input lines are written by a relay thread in arrival order, so a child
    /// that stops reading its stdin never holds up a `Stop`.
    pub async fn serve(self, mut requests: UnboundedReceiver<ControlRequest>) {
        let relay = match self.spawn_input_relay() {
            Ok(relay) => Some(relay),
            Err(e) => {
                error!("Failed to start input relay thread: {}", e);
                None
            }
        };

        while let Some(request) = requests.recv().await {
            debug!("Control request: {:?}", request);
            match request {
                ControlRequest::Start(spec) => {
                    if let Err(e) = self.start(spec) {
                        warn!("Start failed: {}", e);
                    }
                }
                ControlRequest::Stop => self.stop(),
                ControlRequest::SendInput(line) => match &relay {
                    Some(relay) => {
                        if let Err(e) = relay.send(line) {
                            self.reject_input(e.0, "input relay has stopped");
                        }
                    }
                    None => self.reject_input(line, "input relay is unavailable"),
                },
                ControlRequest::Shutdown => {
                    if self.status().is_live() {
                        self.stop();
                    }
                    break;
                }
            }
        }
        debug!("Process controller stopped serving requests");
    }

    /// Starts the thread that performs [`send_input`](Self::send_input) for
    /// [`serve`](Self::serve). It ends once the returned sender is dropped.
    fn spawn_input_relay(&self) -> std::io::Result<UnboundedSender<String>> {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let controller = self.clone();
        thread::Builder::new()
            .name("argrun-stdin".to_string())
            .spawn(move || {
                while let Some(line) = rx.blocking_recv() {
                    if let Err(e) = controller.send_input(&line) {
                        debug!("Input failed: {}", e);
                    }
                }
                debug!("Input relay stopped");
            })?;
        Ok(tx)
    }

    fn reject_input(&self, line: String, reason: &str) {
        warn!("Input not delivered: {}", reason);
        self.shared.notice(Notice::InputEcho { line });
        self.shared.notice(Notice::InputNotDelivered {
            reason: reason.to_string(),
        });
    }
}

/// Spawns the child with all three streams piped and starts both pumps.
fn launch(
    spec: &CommandSpec,
) -> Result<(Child, Option<ChildStdin>, UnboundedReceiver<super::OutputChunk>), ControlError> {
    let mut command = Command::new(spec.program());
    command
        .args(spec.args())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    // own process group, so group-wide signals never reach us
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        command.creation_flags(CREATE_NEW_PROCESS_GROUP | CREATE_NO_WINDOW);
    }

    let spawn_error = |source| ControlError::Spawn {
        program: spec.program().to_string(),
        source,
    };

    let mut child = command.spawn().map_err(spawn_error)?;
    let (tx, rx) = mpsc::unbounded_channel();

    let pumps = [
        child.stdout.take().map(|out| spawn_pump(out, StreamSource::Stdout, tx.clone())),
        child.stderr.take().map(|err| spawn_pump(err, StreamSource::Stderr, tx.clone())),
    ];
    for pump in pumps.into_iter().flatten() {
        if let Err(e) = pump {
            if let Err(kill_err) = child.kill() {
                warn!("Failed to kill process after pump failure: {}", kill_err);
            }
            if let Err(wait_err) = child.wait() {
                warn!("Failed to reap process after pump failure: {}", wait_err);
            }
            return Err(spawn_error(e));
        }
    }

    let stdin = child.stdin.take();
    Ok((child, stdin, rx))
}

#[derive(Debug, Clone, Copy)]
enum Signal {
    Interrupt,
    Kill,
}

/// Delivers `signal` to launch `id` from the blocking pool, since a
/// terminator may wait on a helper process.
async fn deliver_signal(shared: &Arc<Shared>, id: u64, signal: Signal) -> Option<Result<(), ControlError>> {
    let task_shared = shared.clone();
    let delivered = tokio::task::spawn_blocking(move || {
        let terminator = task_shared.terminator.clone();
        task_shared.signal_live(id, |pid| match signal {
            Signal::Interrupt => terminator.interrupt(pid),
            Signal::Kill => terminator.kill(pid),
        })
    })
    .await;

    match delivered {
        Ok(result) => result,
        Err(e) => Some(Err(ControlError::Signal(format!("{signal:?} task failed: {e}")))),
    }
}

/// Interrupt, wait for the grace period, then kill.
///
/// Without a graceful strategy the process tree is killed straight away.
async fn stop_sequence(shared: Arc<Shared>, id: u64) {
    let graceful = shared.terminator.is_graceful();
    let grace = shared.config.grace_period;

    if graceful {
        match deliver_signal(&shared, id, Signal::Interrupt).await {
            Some(Ok(())) => shared.notice(Notice::InterruptSent),
            Some(Err(e)) => {
                error!("Failed to interrupt process: {}", e);
                shared.notice(Notice::SignalFailed { reason: e.to_string() });
            }
            None => {}
        }

        if shared.wait_for_exit(id, grace).await {
            shared.notice(Notice::TerminatedGracefully);
            shared.notice(Notice::StopCompleted);
            return;
        }
        warn!("Process did not respond to interrupt within {:?}", grace);
        shared.notice(Notice::Escalating);
    }

    match deliver_signal(&shared, id, Signal::Kill).await {
        Some(Ok(())) if graceful => shared.notice(Notice::ForceKilled),
        Some(Ok(())) => shared.notice(Notice::TreeKilled),
        Some(Err(e)) => {
            error!("Failed to kill process: {}", e);
            shared.notice(Notice::SignalFailed { reason: e.to_string() });
        }
        None => {}
    }

    if !shared.wait_for_exit(id, grace).await {
        // signal never landed; release the slot rather than stay stuck
        error!("Process could not be terminated, releasing slot");
        shared.finish(id, Liveness::Failed("process could not be terminated".to_string()));
    }
    shared.notice(Notice::StopCompleted);
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|signal| -signal))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}
