//! The five role-typed sockets of one kernel.
//!
//! heartbeat REP, shell/control/stdin ROUTER, iopub PUB. Each binds to a
//! preassigned port or to the first free port in the configured range. All
//! five are owned exclusively by the kernel's overwatch thread.

use zeromq::{PubSocket, RepSocket, RouterSocket, Socket, SocketSend, ZmqMessage};

use crate::jupyter::connection::KernelConfig;
use crate::jupyter::errors::KernelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Heartbeat,
    Shell,
    Control,
    Stdin,
    Iopub,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Heartbeat => "heartbeat",
            Role::Shell => "shell",
            Role::Control => "control",
            Role::Stdin => "stdin",
            Role::Iopub => "iopub",
        }
    }
}

/// Ports actually bound, in the order the poller services them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundPorts {
    pub heartbeat: u16,
    pub shell: u16,
    pub control: u16,
    pub stdin: u16,
    pub iopub: u16,
}

pub struct SocketSet {
    pub heartbeat: RepSocket,
    pub shell: RouterSocket,
    pub control: RouterSocket,
    pub stdin: RouterSocket,
    pub iopub: PubSocket,
    pub ports: BoundPorts,
}

impl SocketSet {
    /// Bind all five sockets per the config. Preassigned ports bind
    /// directly; unset ports scan `[min_port, max_port]`.
    pub async fn bind(config: &KernelConfig) -> Result<Self, KernelError> {
        let mut heartbeat = RepSocket::new();
        let mut shell = RouterSocket::new();
        let mut control = RouterSocket::new();
        let mut stdin = RouterSocket::new();
        let mut iopub = PubSocket::new();

        // reserve each chosen port so the range scan never reuses one
        let mut taken: Vec<u16> = Vec::with_capacity(5);
        let hb_port = bind_one(&mut heartbeat, config, config.heartbeat_port, &taken).await?;
        taken.push(hb_port);
        let shell_port = bind_one(&mut shell, config, config.shell_port, &taken).await?;
        taken.push(shell_port);
        let control_port = bind_one(&mut control, config, config.control_port, &taken).await?;
        taken.push(control_port);
        let stdin_port = bind_one(&mut stdin, config, config.stdin_port, &taken).await?;
        taken.push(stdin_port);
        let iopub_port = bind_one(&mut iopub, config, config.iopub_port, &taken).await?;

        Ok(Self {
            heartbeat,
            shell,
            control,
            stdin,
            iopub,
            ports: BoundPorts {
                heartbeat: hb_port,
                shell: shell_port,
                control: control_port,
                stdin: stdin_port,
                iopub: iopub_port,
            },
        })
    }

    /// Close all five sockets, releasing their ports.
    pub async fn close(self) {
        self.heartbeat.close().await;
        self.shell.close().await;
        self.control.close().await;
        self.stdin.close().await;
        self.iopub.close().await;
    }

    pub async fn send(&mut self, role: Role, message: ZmqMessage) -> Result<(), KernelError> {
        match role {
            Role::Shell => self.shell.send(message).await?,
            Role::Control => self.control.send(message).await?,
            Role::Stdin => self.stdin.send(message).await?,
            Role::Iopub => self.iopub.send(message).await?,
            Role::Heartbeat => self.heartbeat.send(message).await?,
        }
        Ok(())
    }
}

async fn bind_one<S: Socket>(
    socket: &mut S,
    config: &KernelConfig,
    port: Option<u16>,
    taken: &[u16],
) -> Result<u16, KernelError> {
    // zero counts as unassigned, like an absent connection-file entry
    if let Some(port) = port
        && port != 0
    {
        socket.bind(&config.endpoint(port)).await?;
        return Ok(port);
    }
    for candidate in config.min_port..=config.max_port {
        if taken.contains(&candidate) {
            continue;
        }
        if socket.bind(&config.endpoint(candidate)).await.is_ok() {
            return Ok(candidate);
        }
    }
    Err(KernelError::PortsExhausted {
        min: config.min_port,
        max: config.max_port,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jupyter::connection::{KernelConfig, KernelInit};

    fn config(min: u16, max: u16) -> KernelConfig {
        let mut config = KernelConfig::from_init(&KernelInit::default());
        config.min_port = min;
        config.max_port = max;
        config
    }

    #[tokio::test]
    async fn binds_five_distinct_ports_in_range() {
        let config = config(34100, 34200);
        let sockets = SocketSet::bind(&config).await.unwrap();
        let ports = [
            sockets.ports.heartbeat,
            sockets.ports.shell,
            sockets.ports.control,
            sockets.ports.stdin,
            sockets.ports.iopub,
        ];
        for port in ports {
            assert!((34100..=34200).contains(&port));
        }
        let mut unique = ports.to_vec();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 5);
    }

    #[tokio::test]
    async fn preassigned_ports_are_honored() {
        let mut config = config(34300, 34400);
        config.shell_port = Some(34355);
        let sockets = SocketSet::bind(&config).await.unwrap();
        assert_eq!(sockets.ports.shell, 34355);
    }

    #[tokio::test]
    async fn exhausted_range_is_an_error() {
        let first = config(34500, 34504);
        let _held = SocketSet::bind(&first).await.unwrap();
        let second = config(34500, 34504);
        match SocketSet::bind(&second).await {
            Err(KernelError::PortsExhausted { min, max }) => {
                assert_eq!((min, max), (34500, 34504));
            }
            other => panic!("expected exhaustion, got {:?}", other.map(|_| ())),
        }
    }
}
