//! `complete_request`: the naive identifier completer.

use serde_json::json;

use crate::execution::coding::{get_identifier_at_cursor, match_references};
use crate::jupyter::errors::KernelError;
use crate::jupyter::kernel::KernelContext;
use crate::jupyter::messages::{CompleteReply, CompleteRequest};
use crate::jupyter::sockets::Role;
use crate::jupyter::wire::WireMessage;

pub async fn complete_request(
    kernel: &mut KernelContext,
    message: &WireMessage,
) -> Result<(), KernelError> {
    let request: CompleteRequest = message.content_as()?;

    let reply = match kernel.session.as_ref() {
        Some(session) => {
            let identifier =
                get_identifier_at_cursor(&request.code, request.cursor_pos, false, true);
            let matches = match_references(&identifier, &session.scope(), true);
            let cursor_start = request.cursor_pos.saturating_sub(identifier.chars().count());
            CompleteReply {
                matches,
                cursor_start,
                cursor_end: request.cursor_pos,
                metadata: json!({}),
                status: "ok",
            }
        }
        None => CompleteReply {
            matches: Vec::new(),
            cursor_start: request.cursor_pos,
            cursor_end: request.cursor_pos,
            metadata: json!({}),
            status: "ok",
        },
    };

    kernel
        .reply(Role::Shell, "complete_reply", message, &reply)
        .await
}
