//! Fleet supervisor: the process-wide kernel registry.
//!
//! Each kernel runs on its own overwatch thread with a single-threaded
//! runtime; the supervisor holds the cross-thread handles (cancellation
//! token, command channel, shared state) and is the only state shared
//! between the REST surface and the kernels.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::jupyter::connection::{ConnectionInfo, DEFAULT_LINGER, KernelConfig, KernelInit};
use crate::jupyter::kernel::{KernelCommand, KernelParts, KernelShared, run_kernel};

const LAUNCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("kernel {0} not found")]
    NotFound(String),

    #[error("kernel {0} already started")]
    Duplicate(String),

    #[error("kernel failed to launch: {0}")]
    LaunchFailed(String),
}

/// Cross-thread view of one live kernel.
#[derive(Debug)]
pub struct KernelHandle {
    kernel_id: String,
    shared: Arc<KernelShared>,
    cancel: CancellationToken,
    commands: mpsc::UnboundedSender<KernelCommand>,
    interrupt: Arc<AtomicBool>,
    cardiac_arrest_timeout: Option<Duration>,
    thread: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl KernelHandle {
    pub fn kernel_id(&self) -> &str {
        &self.kernel_id
    }

    pub fn connection_info(&self) -> Option<ConnectionInfo> {
        self.shared.connection_info()
    }

    pub fn shared(&self) -> &Arc<KernelShared> {
        &self.shared
    }

    /// Alive means the overwatch thread has not terminated. A handle whose
    /// thread is still being attached counts as alive.
    pub fn is_alive(&self) -> bool {
        match self.thread.lock() {
            Ok(guard) => guard.as_ref().map(|t| !t.is_finished()).unwrap_or(true),
            Err(_) => false,
        }
    }

    /// Replace the execution session without touching the sockets.
    pub fn restart(&self) -> Result<(), SupervisorError> {
        self.commands
            .send(KernelCommand::Restart)
            .map_err(|_| SupervisorError::NotFound(self.kernel_id.clone()))
    }

    /// Ask the executor to stop between statements.
    pub fn interrupt(&self) {
        self.interrupt.store(true, Ordering::Relaxed);
        let _ = self.commands.send(KernelCommand::Interrupt);
    }

    /// True when heartbeat silence has exceeded the configured timeout.
    pub fn is_past_cardiac_arrest(&self) -> bool {
        match self.cardiac_arrest_timeout {
            Some(timeout) => self.shared.last_heartbeat().elapsed() > timeout,
            None => false,
        }
    }
}

#[derive(Default)]
pub struct Supervisor {
    kernels: Mutex<HashMap<String, Arc<KernelHandle>>>,
    linger: Option<Duration>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<String, Arc<KernelHandle>>> {
        self.kernels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn linger(&self) -> Duration {
        self.linger.unwrap_or(DEFAULT_LINGER)
    }

    /// Spawn a kernel and wait until it reaches Idle. Returns once the
    /// connection info is known; duplicate ids are refused while the
    /// existing kernel is alive.
    pub async fn launch(&self, init: KernelInit) -> Result<Arc<KernelHandle>, SupervisorError> {
        let config = KernelConfig::from_init(&init);
        let kernel_id = config.kernel_id.clone();

        let shared = Arc::new(KernelShared::new());
        let interrupt = Arc::new(AtomicBool::new(false));
        let cancel = CancellationToken::new();
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let handle = Arc::new(KernelHandle {
            kernel_id: kernel_id.clone(),
            shared: shared.clone(),
            cancel: cancel.clone(),
            commands: command_tx,
            interrupt: interrupt.clone(),
            cardiac_arrest_timeout: config.cardiac_arrest_timeout,
            thread: Mutex::new(None),
        });

        {
            let mut registry = self.registry();
            if let Some(existing) = registry.get(&kernel_id) {
                if existing.is_alive() {
                    return Err(SupervisorError::Duplicate(kernel_id));
                }
                registry.remove(&kernel_id);
            }
            registry.insert(kernel_id.clone(), handle.clone());
        }

        let (ready_tx, ready_rx) = oneshot::channel();
        let parts = KernelParts {
            shared,
            interrupt,
            commands: command_rx,
            cancel,
        };
        let thread_name = format!("Jupyter-Kernel-{kernel_id}-Overwatch");
        let spawn = std::thread::Builder::new().name(thread_name).spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    error!(%err, "overwatch runtime failed to build");
                    return;
                }
            };
            runtime.block_on(run_kernel(config, parts, ready_tx));
        });

        match spawn {
            Ok(joiner) => {
                if let Ok(mut guard) = handle.thread.lock() {
                    *guard = Some(joiner);
                }
            }
            Err(err) => {
                self.registry().remove(&kernel_id);
                return Err(SupervisorError::LaunchFailed(err.to_string()));
            }
        }

        match tokio::time::timeout(LAUNCH_TIMEOUT, ready_rx).await {
            Ok(Ok(Ok(info))) => {
                info!(kernel_id = %kernel_id, shell_port = info.shell_port, "kernel registered");
                Ok(handle)
            }
            Ok(Ok(Err(message))) => {
                self.registry().remove(&kernel_id);
                Err(SupervisorError::LaunchFailed(message))
            }
            Ok(Err(_)) | Err(_) => {
                self.registry().remove(&kernel_id);
                handle.cancel.cancel();
                Err(SupervisorError::LaunchFailed(
                    "kernel did not reach idle".to_string(),
                ))
            }
        }
    }

    pub fn lookup(&self, kernel_id: &str) -> Option<Arc<KernelHandle>> {
        let mut registry = self.registry();
        match registry.get(kernel_id) {
            Some(handle) if handle.is_alive() => Some(handle.clone()),
            Some(_) => {
                // terminated threads are pruned on sight
                registry.remove(kernel_id);
                None
            }
            None => None,
        }
    }

    /// Live kernel ids; dead entries are pruned.
    pub fn kernel_ids(&self) -> Vec<String> {
        let mut registry = self.registry();
        registry.retain(|_, handle| handle.is_alive());
        let mut ids: Vec<String> = registry.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Live kernel handles; dead entries are pruned.
    pub fn kernels(&self) -> Vec<Arc<KernelHandle>> {
        let mut registry = self.registry();
        registry.retain(|_, handle| handle.is_alive());
        registry.values().cloned().collect()
    }

    /// Force tear-down: cancel the overwatch loop, wait out the linger,
    /// and verify the thread terminated.
    pub async fn scram(&self, kernel_id: &str) -> Result<(), SupervisorError> {
        let handle = self
            .registry()
            .remove(kernel_id)
            .ok_or_else(|| SupervisorError::NotFound(kernel_id.to_string()))?;
        warn!(kernel_id = %kernel_id, ">>> scramming kernel <<<");
        handle.cancel.cancel();
        tokio::time::sleep(self.linger()).await;
        if handle.is_alive() {
            error!(kernel_id = %kernel_id, "kernel did not terminate within the linger interval");
        }
        Ok(())
    }

    /// Scram every kernel, then verify termination. Returns the ids that
    /// were scrammed.
    pub async fn scram_all(&self) -> Vec<String> {
        warn!(">>> scramming ALL kernels <<<");
        let handles: Vec<Arc<KernelHandle>> = {
            let mut registry = self.registry();
            registry.drain().map(|(_, handle)| handle).collect()
        };
        for handle in &handles {
            handle.cancel.cancel();
        }
        tokio::time::sleep(self.linger()).await;
        let mut scrammed = Vec::with_capacity(handles.len());
        for handle in handles {
            if handle.is_alive() {
                error!(kernel_id = %handle.kernel_id, "kernel did not terminate");
            }
            scrammed.push(handle.kernel_id.clone());
        }
        scrammed.sort();
        scrammed
    }

    /// Supervisor-side watchdog check for one kernel.
    pub fn check_pulse(&self, handle: &KernelHandle) -> bool {
        handle.is_past_cardiac_arrest()
    }

    /// One watchdog sweep: scram every kernel whose heartbeat silence has
    /// exceeded its timeout. Kernels normally reap themselves from their
    /// own poll tick; this catches one whose loop is wedged in user code
    /// and cannot self-check. Returns the ids reaped.
    pub async fn reap_arrested(&self) -> Vec<String> {
        let arrested: Vec<Arc<KernelHandle>> = self
            .kernels()
            .into_iter()
            .filter(|handle| self.check_pulse(handle))
            .collect();
        let mut reaped = Vec::with_capacity(arrested.len());
        for handle in arrested {
            let kernel_id = handle.kernel_id().to_string();
            warn!(kernel_id = %kernel_id, "cardiac arrest detected; reclaiming kernel");
            if self.scram(&kernel_id).await.is_ok() {
                reaped.push(kernel_id);
            }
        }
        reaped.sort();
        reaped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_in_range(kernel_id: &str, min: u16, max: u16) -> KernelInit {
        KernelInit {
            kernel_id: Some(kernel_id.to_string()),
            key: Some("test-key".to_string()),
            min_port: Some(min),
            max_port: Some(max),
            ..KernelInit::default()
        }
    }

    #[tokio::test]
    async fn launch_lookup_scram_cycle() {
        let supervisor = Supervisor::new();
        let handle = supervisor
            .launch(init_in_range("aa01", 35000, 35100))
            .await
            .unwrap();
        assert_eq!(handle.kernel_id(), "aa01");
        let info = handle.connection_info().unwrap();
        assert!(info.shell_port >= 35000);
        assert_eq!(info.ignition_kernel_id, "aa01");

        assert!(supervisor.lookup("aa01").is_some());
        assert_eq!(supervisor.kernel_ids(), vec!["aa01".to_string()]);

        supervisor.scram("aa01").await.unwrap();
        assert!(supervisor.lookup("aa01").is_none());
        assert!(supervisor.kernel_ids().is_empty());
    }

    #[tokio::test]
    async fn duplicate_launch_is_refused() {
        let supervisor = Supervisor::new();
        supervisor
            .launch(init_in_range("bb02", 35200, 35300))
            .await
            .unwrap();
        let err = supervisor
            .launch(init_in_range("bb02", 35200, 35300))
            .await
            .unwrap_err();
        assert!(matches!(err, SupervisorError::Duplicate(_)));
        supervisor.scram_all().await;
    }

    #[tokio::test]
    async fn scram_of_unknown_kernel_is_not_found() {
        let supervisor = Supervisor::new();
        assert!(matches!(
            supervisor.scram("nope").await,
            Err(SupervisorError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn scram_all_reports_ids() {
        let supervisor = Supervisor::new();
        supervisor
            .launch(init_in_range("cc03", 35400, 35500))
            .await
            .unwrap();
        supervisor
            .launch(init_in_range("cc04", 35400, 35500))
            .await
            .unwrap();
        let scrammed = supervisor.scram_all().await;
        assert_eq!(scrammed, vec!["cc03".to_string(), "cc04".to_string()]);
        assert!(supervisor.kernel_ids().is_empty());
    }

    #[tokio::test]
    async fn watchdog_sweep_reclaims_silent_kernels() {
        let supervisor = Supervisor::new();
        let mut init = init_in_range("ee06", 35700, 35800);
        init.cardiac_arrest_timeout = Some(1);
        let handle = supervisor.launch(init).await.unwrap();
        assert!(!handle.is_past_cardiac_arrest());
        assert!(supervisor.reap_arrested().await.is_empty());

        // no heartbeats ever arrive; whether the kernel reaps itself first
        // or the sweep catches it, the registry ends up empty
        tokio::time::sleep(Duration::from_millis(1300)).await;
        assert!(handle.is_past_cardiac_arrest());
        supervisor.reap_arrested().await;
        assert!(supervisor.lookup("ee06").is_none());
    }

    #[tokio::test]
    async fn launch_failure_reports_error() {
        let supervisor = Supervisor::new();
        // a one-port range cannot hold five sockets
        let err = supervisor
            .launch(init_in_range("dd05", 35600, 35601))
            .await
            .unwrap_err();
        assert!(matches!(err, SupervisorError::LaunchFailed(_)));
        assert!(supervisor.lookup("dd05").is_none());
    }
}
