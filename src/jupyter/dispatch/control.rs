//! Control-role dispatch: shutdown, interrupt, and kernel info.

use std::sync::atomic::Ordering;

use tracing::{error, info};

use crate::jupyter::dispatch::kernel_info;
use crate::jupyter::errors::KernelError;
use crate::jupyter::kernel::KernelContext;
use crate::jupyter::messages::{InterruptReply, ShutdownReply, ShutdownRequest};
use crate::jupyter::sockets::Role;
use crate::jupyter::wire::WireMessage;

pub async fn message_handler(
    kernel: &mut KernelContext,
    message: &WireMessage,
) -> Result<(), KernelError> {
    match message.msg_type() {
        "shutdown_request" => shutdown_request(kernel, message).await,
        "interrupt_request" => interrupt_request(kernel, message).await,
        "kernel_info_request" => {
            kernel_info::kernel_info_request(kernel, message, Role::Control).await
        }
        other => {
            error!(
                kernel_id = %kernel.kernel_id(),
                msg_type = other,
                "unimplemented control message type"
            );
            Ok(())
        }
    }
}

/// `restart: true` replaces the execution session in place; otherwise the
/// kernel exits its loop after the reply is flushed.
async fn shutdown_request(
    kernel: &mut KernelContext,
    message: &WireMessage,
) -> Result<(), KernelError> {
    let request: ShutdownRequest = message.content_as()?;
    if request.restart {
        info!(kernel_id = %kernel.kernel_id(), "restart requested");
        kernel.new_execution_session().await;
    } else {
        info!(kernel_id = %kernel.kernel_id(), "shutdown requested");
        kernel.request_shutdown();
    }
    kernel
        .reply(
            Role::Control,
            "shutdown_reply",
            message,
            &ShutdownReply {
                status: "ok",
                restart: request.restart,
            },
        )
        .await
}

/// Raise the interrupt flag; the executor stops between statements.
async fn interrupt_request(
    kernel: &mut KernelContext,
    message: &WireMessage,
) -> Result<(), KernelError> {
    kernel.interrupt_flag().store(true, Ordering::Relaxed);
    kernel
        .reply(
            Role::Control,
            "interrupt_reply",
            message,
            &InterruptReply { status: "ok" },
        )
        .await
}
