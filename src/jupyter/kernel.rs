//! Kernel instance and its cooperative event loop.
//!
//! One kernel = five bound sockets + one execution context + the dispatch
//! state, all owned by a single overwatch thread. The loop services sockets
//! in a fixed order (heartbeat, shell, control, stdin), brackets every
//! dispatched message with IOPub `busy`/`idle`, and exits on cancellation,
//! shutdown, transport failure, or cardiac arrest.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use bytes::Bytes;
use serde_json::Value as JsonValue;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use zeromq::{SocketRecv, SocketSend, ZmqMessage};

use crate::execution::ExecutionContext;
use crate::jupyter::comm::CommRegistry;
use crate::jupyter::connection::{ConnectionInfo, KernelConfig};
use crate::jupyter::dispatch;
use crate::jupyter::errors::{KernelError, WireError};
use crate::jupyter::messages::{MessageHeader, StatusContent};
use crate::jupyter::signature::MessageSigner;
use crate::jupyter::sockets::{Role, SocketSet};
use crate::jupyter::status::ExecutionState;
use crate::jupyter::wire::WireMessage;

/// Commands delivered from the supervisor/REST side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelCommand {
    /// Replace the execution session, keep the sockets.
    Restart,
    /// Ask the executor to stop between statements.
    Interrupt,
    /// Orderly exit of the event loop.
    Shutdown,
}

/// Why the event loop ended; the supervisor logs the cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Shutdown,
    Cancelled,
    CardiacArrest,
    TransportClosed,
}

/// State readable from other threads (REST surface, supervisor).
#[derive(Debug)]
pub struct KernelShared {
    pub connection: Mutex<Option<ConnectionInfo>>,
    pub last_heartbeat: Mutex<Instant>,
    pub execution_state: Mutex<ExecutionState>,
    pub session_id: Mutex<String>,
}

impl KernelShared {
    pub fn new() -> Self {
        Self {
            connection: Mutex::new(None),
            last_heartbeat: Mutex::new(Instant::now()),
            execution_state: Mutex::new(ExecutionState::Starting),
            session_id: Mutex::new(String::new()),
        }
    }

    pub fn connection_info(&self) -> Option<ConnectionInfo> {
        self.connection.lock().ok().and_then(|guard| guard.clone())
    }

    pub fn last_heartbeat(&self) -> Instant {
        self.last_heartbeat
            .lock()
            .map(|guard| *guard)
            .unwrap_or_else(|_| Instant::now())
    }

    fn stamp_heartbeat(&self) {
        if let Ok(mut guard) = self.last_heartbeat.lock() {
            *guard = Instant::now();
        }
    }

    fn set_state(&self, state: ExecutionState) {
        if let Ok(mut guard) = self.execution_state.lock() {
            *guard = state;
        }
    }

    fn set_session_id(&self, id: &str) {
        if let Ok(mut guard) = self.session_id.lock() {
            *guard = id.to_string();
        }
    }
}

impl Default for KernelShared {
    fn default() -> Self {
        Self::new()
    }
}

enum LoopEvent {
    Cancelled,
    Command(Option<KernelCommand>),
    Heartbeat(Result<ZmqMessage, zeromq::ZmqError>),
    Inbound(Role, Result<ZmqMessage, zeromq::ZmqError>),
    Pulse,
}

pub struct KernelContext {
    pub config: KernelConfig,
    pub comms: CommRegistry,
    pub session: Option<ExecutionContext>,
    signer: MessageSigner,
    sockets: Option<SocketSet>,
    state: ExecutionState,
    shared: Arc<KernelShared>,
    interrupt: Arc<AtomicBool>,
    commands: mpsc::UnboundedReceiver<KernelCommand>,
    cancel: CancellationToken,
    shutdown_requested: bool,
    last_heartbeat: Instant,
}

impl KernelContext {
    pub fn new(
        config: KernelConfig,
        shared: Arc<KernelShared>,
        interrupt: Arc<AtomicBool>,
        commands: mpsc::UnboundedReceiver<KernelCommand>,
        cancel: CancellationToken,
    ) -> Result<Self, KernelError> {
        let signer = MessageSigner::new(&config.signature_scheme, config.key.as_bytes())?;
        Ok(Self {
            config,
            comms: CommRegistry::default(),
            session: None,
            signer,
            sockets: None,
            state: ExecutionState::Starting,
            shared,
            interrupt,
            commands,
            cancel,
            shutdown_requested: false,
            last_heartbeat: Instant::now(),
        })
    }

    pub fn kernel_id(&self) -> &str {
        &self.config.kernel_id
    }

    pub fn session_id(&self) -> String {
        self.session
            .as_ref()
            .map(|session| session.id.clone())
            .unwrap_or_default()
    }

    /// Executor interrupt flag; consulted between statements.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        self.interrupt.clone()
    }

    pub fn clear_interrupt(&self) {
        self.interrupt.store(false, Ordering::Relaxed);
    }

    /// Latch an orderly loop exit after the current dispatch completes.
    pub fn request_shutdown(&mut self) {
        self.shutdown_requested = true;
    }

    /// Bind sockets, announce `starting`, create the first execution
    /// session, and reach `idle`. Returns the connection file contents.
    pub async fn launch(&mut self) -> Result<ConnectionInfo, KernelError> {
        let sockets = SocketSet::bind(&self.config).await?;
        let ports = sockets.ports;
        for (role, port) in [
            (Role::Heartbeat, ports.heartbeat),
            (Role::Shell, ports.shell),
            (Role::Control, ports.control),
            (Role::Stdin, ports.stdin),
            (Role::Iopub, ports.iopub),
        ] {
            trace!(kernel_id = %self.config.kernel_id, role = role.as_str(), port, "socket bound");
        }
        self.sockets = Some(sockets);

        let info = ConnectionInfo {
            transport: self.config.transport.clone(),
            ip: self.config.ip.clone(),
            ignition_kernel_id: self.config.kernel_id.clone(),
            signature_scheme: self.config.signature_scheme.clone(),
            key: self.config.key.clone(),
            shell_port: ports.shell,
            iopub_port: ports.iopub,
            stdin_port: ports.stdin,
            control_port: ports.control,
            hb_port: ports.heartbeat,
        };
        if let Ok(mut guard) = self.shared.connection.lock() {
            *guard = Some(info.clone());
        }

        self.declare_starting().await;
        self.new_execution_session().await;
        self.declare_idle(None).await;
        info!(kernel_id = %self.config.kernel_id, "kernel launched");
        Ok(info)
    }

    /// Replace the execution context atomically; sockets stay bound. A
    /// `"restart"` sentinel goes out on the heartbeat socket so a
    /// listening client can observe the restart; a REP socket can only
    /// transmit mid-request, so failures are expected and swallowed.
    pub async fn new_execution_session(&mut self) {
        let session = ExecutionContext::new(self.interrupt.clone());
        self.shared.set_session_id(&session.id);
        self.session = Some(session);
        self.clear_interrupt();
        if let Some(sockets) = self.sockets.as_mut() {
            let sentinel = ZmqMessage::from(Bytes::from_static(b"restart"));
            if let Err(err) = sockets.heartbeat.send(sentinel).await {
                trace!(kernel_id = %self.config.kernel_id, %err, "restart sentinel not sent");
            }
        }
        debug!(kernel_id = %self.config.kernel_id, session_id = %self.session_id(), "execution session ready");
    }

    /// The cooperative poll loop.
    pub async fn run(&mut self) -> ExitReason {
        let mut pulse = tokio::time::interval(self.config.loop_delay);
        pulse.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if self.shutdown_requested {
                return ExitReason::Shutdown;
            }
            let event = {
                let Some(sockets) = self.sockets.as_mut() else {
                    return ExitReason::TransportClosed;
                };
                let cancel = self.cancel.clone();
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => LoopEvent::Cancelled,
                    command = self.commands.recv() => LoopEvent::Command(command),
                    message = sockets.heartbeat.recv() => LoopEvent::Heartbeat(message),
                    message = sockets.shell.recv() => LoopEvent::Inbound(Role::Shell, message),
                    message = sockets.control.recv() => LoopEvent::Inbound(Role::Control, message),
                    message = sockets.stdin.recv() => LoopEvent::Inbound(Role::Stdin, message),
                    _ = pulse.tick() => LoopEvent::Pulse,
                }
            };

            match event {
                LoopEvent::Cancelled => return ExitReason::Cancelled,
                LoopEvent::Command(None) => return ExitReason::Cancelled,
                LoopEvent::Command(Some(command)) => match command {
                    KernelCommand::Restart => self.new_execution_session().await,
                    KernelCommand::Interrupt => {
                        self.interrupt.store(true, Ordering::Relaxed);
                    }
                    KernelCommand::Shutdown => return ExitReason::Shutdown,
                },
                LoopEvent::Heartbeat(Ok(payload)) => self.handle_heartbeat(payload).await,
                LoopEvent::Heartbeat(Err(err)) => {
                    error!(kernel_id = %self.config.kernel_id, %err, "heartbeat receive failed");
                    return ExitReason::TransportClosed;
                }
                LoopEvent::Inbound(role, Ok(message)) => {
                    self.handle_inbound(role, message).await;
                    if self.shutdown_requested {
                        return ExitReason::Shutdown;
                    }
                }
                LoopEvent::Inbound(role, Err(err)) => {
                    error!(kernel_id = %self.config.kernel_id, role = role.as_str(), %err, "socket receive failed");
                    return ExitReason::TransportClosed;
                }
                LoopEvent::Pulse => {
                    if self.in_cardiac_arrest() {
                        return ExitReason::CardiacArrest;
                    }
                }
            }
        }
    }

    fn in_cardiac_arrest(&self) -> bool {
        match self.config.cardiac_arrest_timeout {
            Some(timeout) => self.last_heartbeat.elapsed() > timeout,
            None => false,
        }
    }

    /// Heartbeat payloads bypass the wire codec: echo the bytes verbatim
    /// (empty frame when no session is active) and stamp the pulse.
    async fn handle_heartbeat(&mut self, payload: ZmqMessage) {
        self.last_heartbeat = Instant::now();
        self.shared.stamp_heartbeat();
        let Some(sockets) = self.sockets.as_mut() else {
            return;
        };
        let reply = if self.session.is_some() {
            payload
        } else {
            ZmqMessage::from(Vec::<u8>::new())
        };
        if let Err(err) = sockets.heartbeat.send(reply).await {
            warn!(kernel_id = %self.config.kernel_id, %err, "heartbeat echo failed");
        }
    }

    async fn handle_inbound(&mut self, role: Role, message: ZmqMessage) {
        let parsed = match WireMessage::from_zmq(&message, &self.signer) {
            Ok(parsed) => parsed,
            Err(err) => {
                // protocol errors are local: log and drop, never terminate
                warn!(kernel_id = %self.config.kernel_id, role = role.as_str(), %err, "dropping undecodable message");
                return;
            }
        };
        trace!(
            kernel_id = %self.config.kernel_id,
            role = role.as_str(),
            msg_type = parsed.msg_type(),
            msg_id = %parsed.header.msg_id,
            "dispatching"
        );
        self.declare_busy(Some(&parsed)).await;
        let outcome = match role {
            Role::Shell => dispatch::shell::message_handler(self, &parsed).await,
            Role::Control => dispatch::control::message_handler(self, &parsed).await,
            Role::Stdin => dispatch::stdin::message_handler(self, &parsed).await,
            Role::Heartbeat | Role::Iopub => Ok(()),
        };
        if let Err(err) = outcome {
            error!(
                kernel_id = %self.config.kernel_id,
                role = role.as_str(),
                msg_type = parsed.msg_type(),
                %err,
                "handler failed"
            );
        }
        self.declare_idle(Some(&parsed)).await;
    }

    /// Drop the session and release every socket and port.
    pub async fn tear_down(&mut self) {
        info!(kernel_id = %self.config.kernel_id, "tearing down kernel");
        if let Some(mut session) = self.session.take() {
            session.destroy();
        }
        self.shared.set_session_id("");
        if let Some(sockets) = self.sockets.take() {
            // a wedged peer must not stall teardown; dropping finishes the job
            let closed = tokio::time::timeout(self.config.linger, sockets.close()).await;
            if closed.is_err() {
                warn!(kernel_id = %self.config.kernel_id, "timed out closing sockets");
            }
        }
        if let Ok(mut guard) = self.shared.connection.lock() {
            *guard = None;
        }
        debug!(kernel_id = %self.config.kernel_id, "teardown complete");
    }

    // --- message construction and sending ---

    fn empty_object() -> JsonValue {
        JsonValue::Object(serde_json::Map::new())
    }

    /// A reply addressed back to the origin's routing ids.
    pub fn new_message(&self, msg_type: &str, origin: Option<&WireMessage>) -> WireMessage {
        WireMessage {
            ids: origin.map(|o| o.ids.clone()).unwrap_or_default(),
            header: MessageHeader::new(msg_type, &self.session_id(), &self.config.username),
            parent_header: origin.map(|o| o.header.clone()),
            metadata: Self::empty_object(),
            content: Self::empty_object(),
            buffers: Vec::new(),
        }
    }

    /// A broadcast: the routing ids are replaced by one topic frame.
    pub fn new_broadcast(&self, msg_type: &str, origin: Option<&WireMessage>) -> WireMessage {
        let mut message = self.new_message(msg_type, origin);
        message.ids = vec![Bytes::from(
            format!("kernel.{}.{}", self.config.kernel_id, msg_type).into_bytes(),
        )];
        message
    }

    pub async fn send(&mut self, role: Role, message: &WireMessage) -> Result<(), KernelError> {
        let zmq = message.to_zmq(&self.signer)?;
        self.sockets
            .as_mut()
            .ok_or(KernelError::NotBound)?
            .send(role, zmq)
            .await
    }

    /// Build, fill and send an IOPub broadcast in one step.
    pub async fn iopub_broadcast<C: serde::Serialize>(
        &mut self,
        msg_type: &str,
        origin: Option<&WireMessage>,
        content: &C,
    ) -> Result<(), KernelError> {
        let mut message = self.new_broadcast(msg_type, origin);
        message.content = serde_json::to_value(content)
            .map_err(|err| WireError::Encode(err.to_string()))?;
        self.send(Role::Iopub, &message).await
    }

    /// Build, fill and send a direct reply on the given role socket.
    pub async fn reply<C: serde::Serialize>(
        &mut self,
        role: Role,
        msg_type: &str,
        origin: &WireMessage,
        content: &C,
    ) -> Result<(), KernelError> {
        let mut message = self.new_message(msg_type, Some(origin));
        message.content = serde_json::to_value(content)
            .map_err(|err| WireError::Encode(err.to_string()))?;
        self.send(role, &message).await
    }

    // --- status broadcasts ---

    async fn declare_state(&mut self, state: ExecutionState, origin: Option<&WireMessage>) {
        self.state = state;
        self.shared.set_state(state);
        let content = StatusContent {
            execution_state: state.as_str(),
        };
        if let Err(err) = self.iopub_broadcast("status", origin, &content).await {
            warn!(kernel_id = %self.config.kernel_id, state = state.as_str(), %err, "status broadcast failed");
        }
    }

    pub async fn declare_starting(&mut self) {
        self.declare_state(ExecutionState::Starting, None).await;
    }

    pub async fn declare_busy(&mut self, origin: Option<&WireMessage>) {
        self.declare_state(ExecutionState::Busy, origin).await;
    }

    pub async fn declare_idle(&mut self, origin: Option<&WireMessage>) {
        self.declare_state(ExecutionState::Idle, origin).await;
    }

    pub fn execution_state(&self) -> ExecutionState {
        self.state
    }
}

/// Everything a kernel needs from its holder thread, bundled for spawn.
pub struct KernelParts {
    pub shared: Arc<KernelShared>,
    pub interrupt: Arc<AtomicBool>,
    pub commands: mpsc::UnboundedReceiver<KernelCommand>,
    pub cancel: CancellationToken,
}

/// Construct, launch and run one kernel to completion.
///
/// `ready` resolves once the kernel has reached Idle (with its connection
/// info) or failed to start (with the error text).
pub async fn run_kernel(
    config: KernelConfig,
    parts: KernelParts,
    ready: oneshot::Sender<Result<ConnectionInfo, String>>,
) {
    let mut kernel =
        match KernelContext::new(config, parts.shared, parts.interrupt, parts.commands, parts.cancel)
        {
            Ok(kernel) => kernel,
            Err(err) => {
                let _ = ready.send(Err(err.to_string()));
                return;
            }
        };
    match kernel.launch().await {
        Ok(info) => {
            let _ = ready.send(Ok(info));
        }
        Err(err) => {
            error!(kernel_id = %kernel.config.kernel_id, %err, "kernel failed to launch");
            let _ = ready.send(Err(err.to_string()));
            return;
        }
    }
    let reason = kernel.run().await;
    match reason {
        ExitReason::Shutdown => info!(kernel_id = %kernel.config.kernel_id, "kernel shut down"),
        ExitReason::Cancelled => info!(kernel_id = %kernel.config.kernel_id, "kernel scrammed"),
        ExitReason::CardiacArrest => {
            warn!(kernel_id = %kernel.config.kernel_id, "lost the client heartbeat; exiting")
        }
        ExitReason::TransportClosed => {
            warn!(kernel_id = %kernel.config.kernel_id, "transport closed; exiting")
        }
    }
    kernel.tear_down().await;
}
