//! Comm lifecycle handlers.

use serde_json::json;
use tracing::{debug, trace};

use crate::jupyter::errors::KernelError;
use crate::jupyter::kernel::KernelContext;
use crate::jupyter::messages::{CommClose, CommInfoRequest, CommMsg, CommOpen};
use crate::jupyter::sockets::Role;
use crate::jupyter::wire::WireMessage;

pub async fn comm_open(
    kernel: &mut KernelContext,
    message: &WireMessage,
) -> Result<(), KernelError> {
    let request: CommOpen = message.content_as()?;
    kernel
        .comms
        .open(&request.comm_id, &request.target_name, request.data);
    Ok(())
}

pub async fn comm_msg(
    kernel: &mut KernelContext,
    message: &WireMessage,
) -> Result<(), KernelError> {
    let request: CommMsg = message.content_as()?;
    if !kernel.comms.update(&request.comm_id, request.data) {
        debug!(kernel_id = %kernel.kernel_id(), comm_id = %request.comm_id, "comm_msg for unknown comm");
    }
    Ok(())
}

pub async fn comm_close(
    kernel: &mut KernelContext,
    message: &WireMessage,
) -> Result<(), KernelError> {
    let request: CommClose = message.content_as()?;
    kernel.comms.close(&request.comm_id);
    Ok(())
}

/// Reply with comms filtered by target, or all comms without one. An
/// unknown target closes the requesting comm instead.
pub async fn comm_info_request(
    kernel: &mut KernelContext,
    message: &WireMessage,
) -> Result<(), KernelError> {
    let request: CommInfoRequest = message.content_as()?;
    trace!(kernel_id = %kernel.kernel_id(), target = ?request.target_name, "comm info request");

    if let Some(target_name) = request.target_name.as_deref()
        && !target_name.is_empty()
        && !kernel.comms.has_target(target_name)
    {
        let comm_id = request.comm_id.unwrap_or_default();
        return kernel
            .reply(
                Role::Shell,
                "comm_close",
                message,
                &json!({"comm_id": comm_id}),
            )
            .await;
    }

    let mut comms = serde_json::Map::new();
    match request.target_name.as_deref() {
        Some(target_name) if !target_name.is_empty() => {
            for comm in kernel.comms.by_target(target_name) {
                comms.insert(
                    comm.comm_id.clone(),
                    json!({"target_name": comm.target_name}),
                );
            }
        }
        _ => {
            for comm in kernel.comms.all() {
                comms.insert(
                    comm.comm_id.clone(),
                    json!({"target_name": comm.target_name}),
                );
            }
        }
    }
    kernel
        .reply(
            Role::Shell,
            "comm_info_reply",
            message,
            &json!({"status": "ok", "comms": comms}),
        )
        .await
}
