//! Kernel launch parameters and the provisioner-facing connection file.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_KERNEL_NAME: &str = "ignition_kernel";
pub const DEFAULT_USERNAME: &str = "kernel";
pub const DEFAULT_SIGNATURE_SCHEME: &str = "hmac-sha256";
pub const DEFAULT_TRANSPORT: &str = "tcp";
pub const DEFAULT_IP: &str = "127.0.0.1";
pub const DEFAULT_MIN_PORT: u16 = 30000;
pub const DEFAULT_MAX_PORT: u16 = 32000;
/// Event-loop pacing and the teardown linger.
pub const DEFAULT_LOOP_DELAY: Duration = Duration::from_millis(50);
pub const DEFAULT_LINGER: Duration = Duration::from_millis(350);
/// Kernels reap themselves after this much heartbeat silence.
pub const DEFAULT_CARDIAC_ARREST_TIMEOUT_SECS: u64 = 15 * 60;

/// Short hex id in the style the gateway hands out.
pub fn random_kernel_id() -> String {
    Uuid::new_v4().simple().to_string()[..4].to_string()
}

/// Launch request for one kernel. Accepted over REST (POST body) and from
/// the CLI; the `ignition_kernel_id`/`hb_port` aliases match what clients
/// in the wild send.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KernelInit {
    #[serde(default, alias = "ignition_kernel_id")]
    pub kernel_id: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub signature_scheme: Option<String>,
    #[serde(default)]
    pub transport: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default, alias = "hb_port")]
    pub heartbeat_port: Option<u16>,
    #[serde(default)]
    pub shell_port: Option<u16>,
    #[serde(default)]
    pub iopub_port: Option<u16>,
    #[serde(default)]
    pub stdin_port: Option<u16>,
    #[serde(default)]
    pub control_port: Option<u16>,
    #[serde(default, alias = "min_port_range")]
    pub min_port: Option<u16>,
    #[serde(default, alias = "max_port_range")]
    pub max_port: Option<u16>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub kernel_name: Option<String>,
    /// Seconds of heartbeat silence before the watchdog reaps the kernel;
    /// zero disables the watchdog.
    #[serde(default)]
    pub cardiac_arrest_timeout: Option<u64>,
}

/// Fully-resolved kernel settings.
#[derive(Debug, Clone)]
pub struct KernelConfig {
    pub kernel_id: String,
    pub kernel_name: String,
    pub username: String,
    pub key: String,
    pub signature_scheme: String,
    pub transport: String,
    pub ip: String,
    pub heartbeat_port: Option<u16>,
    pub shell_port: Option<u16>,
    pub iopub_port: Option<u16>,
    pub stdin_port: Option<u16>,
    pub control_port: Option<u16>,
    pub min_port: u16,
    pub max_port: u16,
    pub loop_delay: Duration,
    pub linger: Duration,
    pub cardiac_arrest_timeout: Option<Duration>,
}

impl KernelConfig {
    pub fn from_init(init: &KernelInit) -> Self {
        let cardiac = match init.cardiac_arrest_timeout {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => Some(Duration::from_secs(DEFAULT_CARDIAC_ARREST_TIMEOUT_SECS)),
        };
        Self {
            kernel_id: init.kernel_id.clone().unwrap_or_else(random_kernel_id),
            kernel_name: init
                .kernel_name
                .clone()
                .unwrap_or_else(|| DEFAULT_KERNEL_NAME.to_string()),
            username: init
                .username
                .clone()
                .unwrap_or_else(|| DEFAULT_USERNAME.to_string()),
            key: init
                .key
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            signature_scheme: init
                .signature_scheme
                .clone()
                .unwrap_or_else(|| DEFAULT_SIGNATURE_SCHEME.to_string()),
            transport: init
                .transport
                .clone()
                .unwrap_or_else(|| DEFAULT_TRANSPORT.to_string()),
            ip: init.ip.clone().unwrap_or_else(|| DEFAULT_IP.to_string()),
            heartbeat_port: init.heartbeat_port,
            shell_port: init.shell_port,
            iopub_port: init.iopub_port,
            stdin_port: init.stdin_port,
            control_port: init.control_port,
            min_port: init.min_port.unwrap_or(DEFAULT_MIN_PORT),
            max_port: init.max_port.unwrap_or(DEFAULT_MAX_PORT),
            loop_delay: DEFAULT_LOOP_DELAY,
            linger: DEFAULT_LINGER,
            cardiac_arrest_timeout: cardiac,
        }
    }

    pub fn endpoint(&self, port: u16) -> String {
        format!("{}://{}:{}", self.transport, self.ip, port)
    }
}

impl From<&ConnectionInfo> for KernelInit {
    fn from(info: &ConnectionInfo) -> Self {
        KernelInit {
            kernel_id: Some(info.ignition_kernel_id.clone()),
            key: Some(info.key.clone()),
            signature_scheme: Some(info.signature_scheme.clone()),
            transport: Some(info.transport.clone()),
            ip: Some(info.ip.clone()),
            heartbeat_port: Some(info.hb_port),
            shell_port: Some(info.shell_port),
            iopub_port: Some(info.iopub_port),
            stdin_port: Some(info.stdin_port),
            control_port: Some(info.control_port),
            ..KernelInit::default()
        }
    }
}

/// The JSON object the external provisioner consumes. Field names and
/// their order are a stable surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub transport: String,
    pub ip: String,
    #[serde(alias = "kernel_id")]
    pub ignition_kernel_id: String,
    pub signature_scheme: String,
    pub key: String,
    pub shell_port: u16,
    pub iopub_port: u16,
    pub stdin_port: u16,
    pub control_port: u16,
    #[serde(alias = "heartbeat_port")]
    pub hb_port: u16,
}

impl ConnectionInfo {
    pub fn from_file(path: &Path) -> color_eyre::eyre::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn url_for(&self, port: u16) -> String {
        format!("{}://{}:{}", self.transport, self.ip, port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_accepts_both_id_spellings() {
        let canonical: KernelInit =
            serde_json::from_str(r#"{"kernel_id": "k1"}"#).unwrap();
        assert_eq!(canonical.kernel_id.as_deref(), Some("k1"));
        let aliased: KernelInit =
            serde_json::from_str(r#"{"ignition_kernel_id": "k2"}"#).unwrap();
        assert_eq!(aliased.kernel_id.as_deref(), Some("k2"));
    }

    #[test]
    fn init_accepts_hb_port_alias() {
        let init: KernelInit =
            serde_json::from_str(r#"{"hb_port": 1234, "shell_port": 2345}"#).unwrap();
        assert_eq!(init.heartbeat_port, Some(1234));
        assert_eq!(init.shell_port, Some(2345));
    }

    #[test]
    fn config_fills_defaults() {
        let config = KernelConfig::from_init(&KernelInit::default());
        assert_eq!(config.kernel_id.len(), 4);
        assert_eq!(config.signature_scheme, "hmac-sha256");
        assert_eq!(config.transport, "tcp");
        assert_eq!(config.min_port, 30000);
        assert_eq!(config.max_port, 32000);
        assert!(!config.key.is_empty());
        assert_eq!(
            config.cardiac_arrest_timeout,
            Some(Duration::from_secs(900))
        );
    }

    #[test]
    fn zero_timeout_disables_the_watchdog() {
        let init = KernelInit {
            cardiac_arrest_timeout: Some(0),
            ..KernelInit::default()
        };
        assert!(KernelConfig::from_init(&init).cardiac_arrest_timeout.is_none());
    }

    #[test]
    fn connection_info_emits_canonical_field_names() {
        let info = ConnectionInfo {
            transport: "tcp".into(),
            ip: "127.0.0.1".into(),
            ignition_kernel_id: "abcd".into(),
            signature_scheme: "hmac-sha256".into(),
            key: "secret".into(),
            shell_port: 1,
            iopub_port: 2,
            stdin_port: 3,
            control_port: 4,
            hb_port: 5,
        };
        let value = serde_json::to_value(&info).unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert!(keys.contains(&&"ignition_kernel_id".to_string()));
        assert!(keys.contains(&&"hb_port".to_string()));
        assert!(!keys.contains(&&"kernel_id".to_string()));
        // and the alias is accepted on the way back in
        let round: ConnectionInfo = serde_json::from_str(
            r#"{"transport":"tcp","ip":"0.0.0.0","kernel_id":"k9","signature_scheme":"hmac-sha256",
                "key":"k","shell_port":1,"iopub_port":2,"stdin_port":3,"control_port":4,"heartbeat_port":5}"#,
        )
        .unwrap();
        assert_eq!(round.ignition_kernel_id, "k9");
        assert_eq!(round.hb_port, 5);
    }

    #[test]
    fn connection_file_loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kernel.json");
        std::fs::write(
            &path,
            r#"{"transport":"tcp","ip":"127.0.0.1","ignition_kernel_id":"fa11",
                "signature_scheme":"hmac-sha256","key":"k","shell_port":31733,
                "iopub_port":31859,"stdin_port":31526,"control_port":31924,"hb_port":30428}"#,
        )
        .unwrap();
        let info = ConnectionInfo::from_file(&path).unwrap();
        assert_eq!(info.ignition_kernel_id, "fa11");
        assert_eq!(info.shell_port, 31733);
        assert_eq!(info.url_for(info.hb_port), "tcp://127.0.0.1:30428");
    }

    #[test]
    fn random_ids_are_short_hex() {
        let id = random_kernel_id();
        assert_eq!(id.len(), 4);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
