//! Stdin-role dispatch.
//!
//! This kernel never initiates `input_request`, but an `input_reply` that
//! arrives anyway is appended to the executor's stdin buffer so the next
//! run can read it.

use tracing::debug;

use crate::jupyter::errors::KernelError;
use crate::jupyter::kernel::KernelContext;
use crate::jupyter::messages::InputReply;
use crate::jupyter::wire::WireMessage;

pub async fn message_handler(
    kernel: &mut KernelContext,
    message: &WireMessage,
) -> Result<(), KernelError> {
    match message.msg_type() {
        "input_reply" => {
            let reply: InputReply = message.content_as()?;
            if let Some(session) = kernel.session.as_mut() {
                session.push_stdin(&reply.value);
            }
            Ok(())
        }
        other => {
            debug!(
                kernel_id = %kernel.kernel_id(),
                msg_type = other,
                "ignoring stdin message"
            );
            Ok(())
        }
    }
}
