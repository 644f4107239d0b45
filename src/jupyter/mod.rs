//! The Jupyter protocol engine: wire codec, sockets, typed messages,
//! dispatch, and the kernel instance itself.

pub mod comm;
pub mod connection;
pub mod dispatch;
pub mod errors;
pub mod kernel;
pub mod messages;
pub mod signature;
pub mod sockets;
pub mod status;
pub mod wire;

pub use connection::{ConnectionInfo, KernelConfig, KernelInit};
pub use kernel::{KernelCommand, KernelContext, KernelShared};
pub use wire::WireMessage;
