//! Shell-role dispatch table.

use tracing::error;

use crate::jupyter::dispatch::{comms, completion, execution, inspection, kernel_info};
use crate::jupyter::errors::KernelError;
use crate::jupyter::kernel::KernelContext;
use crate::jupyter::sockets::Role;
use crate::jupyter::wire::WireMessage;

pub async fn message_handler(
    kernel: &mut KernelContext,
    message: &WireMessage,
) -> Result<(), KernelError> {
    match message.msg_type() {
        "kernel_info_request" => {
            kernel_info::kernel_info_request(kernel, message, Role::Shell).await
        }
        "execute_request" => execution::execute_request(kernel, message).await,
        "complete_request" => completion::complete_request(kernel, message).await,
        "inspect_request" => inspection::inspect_request(kernel, message).await,
        "comm_open" => comms::comm_open(kernel, message).await,
        "comm_msg" => comms::comm_msg(kernel, message).await,
        "comm_close" => comms::comm_close(kernel, message).await,
        "comm_info_request" => comms::comm_info_request(kernel, message).await,
        other => {
            error!(
                kernel_id = %kernel.kernel_id(),
                msg_type = other,
                "unimplemented shell message type"
            );
            Ok(())
        }
    }
}
