//! `kernel_info_request`, honored on both shell and control.

use crate::jupyter::errors::KernelError;
use crate::jupyter::kernel::KernelContext;
use crate::jupyter::messages::KernelInfoReply;
use crate::jupyter::sockets::Role;
use crate::jupyter::wire::WireMessage;

pub async fn kernel_info_request(
    kernel: &mut KernelContext,
    message: &WireMessage,
    role: Role,
) -> Result<(), KernelError> {
    let reply = KernelInfoReply::current(&kernel.config.kernel_name, None);
    kernel.reply(role, "kernel_info_reply", message, &reply).await
}
