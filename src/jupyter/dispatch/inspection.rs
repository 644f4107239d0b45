//! `inspect_request`: object reference info as a plain-text listing.

use serde_json::json;
use tracing::trace;

use crate::execution::coding::{describe_object, get_identifier_at_cursor, get_object_from_cursor};
use crate::jupyter::errors::KernelError;
use crate::jupyter::kernel::KernelContext;
use crate::jupyter::messages::{InspectReply, InspectRequest};
use crate::jupyter::sockets::Role;
use crate::jupyter::wire::WireMessage;

pub async fn inspect_request(
    kernel: &mut KernelContext,
    message: &WireMessage,
) -> Result<(), KernelError> {
    let request: InspectRequest = message.content_as()?;

    let found = kernel.session.as_ref().and_then(|session| {
        get_object_from_cursor(&request.code, request.cursor_pos, &session.scope(), true).ok()
    });

    let reply = match found {
        Some(object) => InspectReply {
            status: "ok",
            found: true,
            data: json!({"text/plain": describe_object(&object)}),
            metadata: json!({}),
        },
        None => {
            let identifier =
                get_identifier_at_cursor(&request.code, request.cursor_pos, false, false);
            trace!(kernel_id = %kernel.kernel_id(), %identifier, "object not found");
            InspectReply {
                status: "ok",
                found: false,
                data: json!({}),
                metadata: json!({}),
            }
        }
    };

    kernel
        .reply(Role::Shell, "inspect_reply", message, &reply)
        .await
}
