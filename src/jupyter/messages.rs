//! Typed message headers and per-`msg_type` content structs.
//!
//! Requests deserialize leniently (clients vary); replies serialize through
//! `serde_json::Value` in the codec, which keeps the canonical key order.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

pub const WIRE_PROTOCOL_VERSION: &str = "5.3";

/// UTC ISO-8601 with millisecond precision, e.g. `2023-06-28T05:58:34.523Z`.
pub fn utc_now() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// The canonical six-field header. Field order is alphabetical, matching
/// the sorted-key canonical JSON the codec emits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    #[serde(default)]
    pub date: String,
    pub msg_id: String,
    pub msg_type: String,
    #[serde(default)]
    pub session: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub version: String,
}

impl MessageHeader {
    pub fn new(msg_type: &str, session: &str, username: &str) -> Self {
        Self {
            date: utc_now(),
            msg_id: Uuid::new_v4().to_string(),
            msg_type: msg_type.to_string(),
            session: session.to_string(),
            username: username.to_string(),
            version: WIRE_PROTOCOL_VERSION.to_string(),
        }
    }
}

// --- shell requests ---

#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteRequest {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub silent: bool,
    #[serde(default = "default_true")]
    pub store_history: bool,
    #[serde(default)]
    pub allow_stdin: bool,
    #[serde(default)]
    pub stop_on_error: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompleteRequest {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub cursor_pos: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InspectRequest {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub cursor_pos: usize,
    #[serde(default)]
    pub detail_level: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommOpen {
    pub comm_id: String,
    #[serde(default)]
    pub target_name: String,
    #[serde(default)]
    pub data: JsonValue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommMsg {
    pub comm_id: String,
    #[serde(default)]
    pub data: JsonValue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommClose {
    pub comm_id: String,
    #[serde(default)]
    pub data: JsonValue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommInfoRequest {
    #[serde(default)]
    pub comm_id: Option<String>,
    #[serde(default)]
    pub target_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputReply {
    #[serde(default)]
    pub value: String,
}

// --- control requests ---

#[derive(Debug, Clone, Deserialize)]
pub struct ShutdownRequest {
    #[serde(default)]
    pub restart: bool,
}

// --- replies and broadcasts ---

#[derive(Debug, Clone, Serialize)]
pub struct KernelInfoReply {
    pub status: &'static str,
    pub protocol_version: &'static str,
    pub implementation: String,
    pub implementation_version: &'static str,
    pub language_info: LanguageInfo,
    pub banner: &'static str,
    pub help_links: Vec<HelpLink>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LanguageInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub mimetype: &'static str,
    pub file_extension: &'static str,
    pub pygments_lexer: &'static str,
    pub codemirror_mode: &'static str,
    pub nbconvert_exporter: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct HelpLink {
    pub text: &'static str,
    pub url: String,
}

impl KernelInfoReply {
    pub fn current(implementation: &str, base_url: Option<&str>) -> Self {
        let help_links = base_url
            .map(|url| {
                vec![HelpLink {
                    text: "Gateway Status",
                    url: url.to_string(),
                }]
            })
            .unwrap_or_default();
        Self {
            status: "ok",
            protocol_version: "5.0",
            implementation: implementation.to_string(),
            implementation_version: env!("CARGO_PKG_VERSION"),
            language_info: LanguageInfo {
                name: "jython",
                version: "2.7",
                mimetype: "text/x-python2",
                file_extension: ".py",
                pygments_lexer: "python2",
                codemirror_mode: "Python",
                nbconvert_exporter: "",
            },
            banner: "Ignition kernel - interactive gateway scripting",
            help_links,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusContent {
    pub execution_state: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecuteInput {
    pub execution_count: u32,
    pub code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StreamContent {
    pub name: &'static str,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorContent {
    pub ename: String,
    pub evalue: String,
    pub traceback: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecuteResultContent {
    pub execution_count: u32,
    pub data: JsonValue,
    pub metadata: JsonValue,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecuteReplyOk {
    pub status: &'static str,
    pub execution_count: u32,
    pub user_expressions: JsonValue,
    pub payload: Vec<JsonValue>,
}

impl ExecuteReplyOk {
    pub fn new(execution_count: u32) -> Self {
        Self {
            status: "ok",
            execution_count,
            user_expressions: JsonValue::Object(serde_json::Map::new()),
            payload: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecuteReplyError {
    pub status: &'static str,
    pub execution_count: u32,
    pub ename: String,
    pub evalue: String,
    pub traceback: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompleteReply {
    pub matches: Vec<String>,
    pub cursor_start: usize,
    pub cursor_end: usize,
    pub metadata: JsonValue,
    pub status: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct InspectReply {
    pub status: &'static str,
    pub found: bool,
    pub data: JsonValue,
    pub metadata: JsonValue,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShutdownReply {
    pub status: &'static str,
    pub restart: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct InterruptReply {
    pub status: &'static str,
}
