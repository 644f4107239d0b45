//! `execute_request` handling: input echo, run, output broadcasts, reply.

use serde_json::json;
use tracing::trace;

use crate::jupyter::errors::{KernelError, WireError};
use crate::jupyter::kernel::KernelContext;
use crate::jupyter::messages::{
    ErrorContent, ExecuteInput, ExecuteReplyError, ExecuteReplyOk, ExecuteRequest, StreamContent,
};
use crate::jupyter::sockets::Role;
use crate::jupyter::wire::WireMessage;

pub async fn execute_request(
    kernel: &mut KernelContext,
    message: &WireMessage,
) -> Result<(), KernelError> {
    let request: ExecuteRequest = message.content_as()?;
    let count_before = kernel
        .session
        .as_ref()
        .map(|session| session.execution_count)
        .unwrap_or(0);

    // blank code and silent by convention means the client wants to know
    // the current execution count
    if request.silent && request.code.is_empty() {
        kernel
            .iopub_broadcast(
                "execute_input",
                Some(message),
                &ExecuteInput {
                    execution_count: count_before + 1,
                    code: String::new(),
                },
            )
            .await?;
        return kernel
            .reply(
                Role::Shell,
                "execute_reply",
                message,
                &ExecuteReplyOk::new(count_before),
            )
            .await;
    }

    if request.silent {
        trace!(kernel_id = %kernel.kernel_id(), "silent execution requested");
    } else {
        // announce the upcoming input before running it so clients can
        // mark the cell in progress
        let mut input = kernel.new_broadcast("execute_input", Some(message));
        input.content = serde_json::to_value(ExecuteInput {
            execution_count: count_before + if request.store_history { 1 } else { 0 },
            code: request.code.clone(),
        })
        .map_err(|err| WireError::Encode(err.to_string()))?;
        input.metadata = message.metadata.clone();
        kernel.send(Role::Iopub, &input).await?;
    }

    let Some(session) = kernel.session.as_mut() else {
        return Ok(());
    };
    let result = session.execute(&request.code, request.store_history);
    let count = session.execution_count;
    kernel.clear_interrupt();

    if !request.silent {
        if !result.stdout.is_empty() {
            kernel
                .iopub_broadcast(
                    "stream",
                    Some(message),
                    &StreamContent {
                        name: "stdout",
                        text: result.stdout.clone(),
                    },
                )
                .await?;
        }

        if let Some(error) = &result.error {
            kernel
                .iopub_broadcast(
                    "stream",
                    Some(message),
                    &StreamContent {
                        name: "stderr",
                        text: error.formatted_traceback(),
                    },
                )
                .await?;
            kernel
                .iopub_broadcast(
                    "error",
                    Some(message),
                    &ErrorContent {
                        ename: error.ename.clone(),
                        evalue: error.evalue.clone(),
                        traceback: error.traceback.clone(),
                    },
                )
                .await?;
        }

        if let Some(text) = result.display_text() {
            kernel
                .iopub_broadcast(
                    "execute_result",
                    Some(message),
                    &json!({
                        "execution_count": count,
                        "data": {"text/plain": text},
                        "metadata": {},
                    }),
                )
                .await?;
        }
    }

    match &result.error {
        Some(error) => {
            let status = if error.interrupted { "abort" } else { "error" };
            kernel
                .reply(
                    Role::Shell,
                    "execute_reply",
                    message,
                    &ExecuteReplyError {
                        status,
                        execution_count: count,
                        ename: error.ename.clone(),
                        evalue: error.evalue.clone(),
                        traceback: error.traceback.clone(),
                    },
                )
                .await
        }
        None => {
            kernel
                .reply(
                    Role::Shell,
                    "execute_reply",
                    message,
                    &ExecuteReplyOk::new(count),
                )
                .await
        }
    }
}
