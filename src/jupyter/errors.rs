//! Protocol and kernel error types.

use thiserror::Error;

/// Errors from the wire codec. These are always local: the kernel logs and
/// drops the offending message, it never tears down or replies with an
/// exception.
#[derive(Error, Debug)]
pub enum WireError {
    #[error("message signature mismatch")]
    BadSignature,

    #[error("bad frame: {0}")]
    BadFrame(String),

    #[error("unsupported signature scheme: {0}")]
    BadScheme(String),

    #[error("encode error: {0}")]
    Encode(String),
}

impl From<serde_json::Error> for WireError {
    fn from(err: serde_json::Error) -> Self {
        WireError::BadFrame(err.to_string())
    }
}

/// Errors from a kernel's sockets and event loop.
#[derive(Error, Debug)]
pub enum KernelError {
    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("zmq error: {0}")]
    Zmq(#[from] zeromq::ZmqError),

    #[error("no free port in range {min}..={max}")]
    PortsExhausted { min: u16, max: u16 },

    #[error("socket set is not bound")]
    NotBound,
}
