//! Task executor: validates and runs one `RPC_REQUEST`, replying with the
//! result or the failure.
//!
//! A semaphore bounds how many tasks compute at once; the connection's read
//! loop never waits on it, so heartbeats stay prompt regardless of load.

use std::sync::Arc;

use grid_protocol::payload::{split_fields, TaskReply, TaskRequest};
use grid_protocol::{msg_type, Message, Session};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Per-connection task runner.
#[derive(Debug)]
pub struct TaskExecutor {
    sender_id: String,
    token: String,
    pool: Arc<Semaphore>,
}

impl TaskExecutor {
    /// `token` is the runtime token received in `WORKER_ACK`; every request
    /// must echo it back.
    #[must_use]
    pub fn new(sender_id: impl Into<String>, token: impl Into<String>, max_concurrent: usize) -> Self {
        Self {
            sender_id: sender_id.into(),
            token: token.into(),
            pool: Arc::new(Semaphore::new(max_concurrent)),
        }
    }

    /// Handle one request payload end to end, writing the reply on `session`.
    ///
    /// Every failure path answers the master; this function only stays
    /// silent when even the task id cannot be recovered from the payload.
    pub async fn handle_request(&self, session: &Arc<Session>, payload: &str) {
        let request = match TaskRequest::from_payload(payload) {
            Ok(r) => r,
            Err(e) => {
                // Recover the task id if the first field survived, so the
                // master's waiter still gets an answer.
                match recover_task_id(payload) {
                    Some(task_id) => {
                        warn!(task_id = %task_id, error = %e, "malformed task request");
                        self.reply_error(session, &task_id, &e.to_string()).await;
                    }
                    None => {
                        warn!(error = %e, "task request with unrecoverable task id");
                    }
                }
                return;
            }
        };

        if request.token != self.token {
            warn!(task_id = %request.task_id, "token mismatch, refusing task");
            self.reply_error(session, &request.task_id, "Invalid token")
                .await;
            return;
        }

        // Bound concurrent computation; heartbeat handling lives in the read
        // loop and never queues behind this.
        let _permit = match self.pool.acquire().await {
            Ok(p) => p,
            Err(_) => return, // pool closed, worker is going away
        };

        debug!(task_id = %request.task_id, task_type = %request.task_type, "task start");
        match grid_compute::run_task(&request.task_type, &request.data) {
            Ok(result) => {
                debug!(task_id = %request.task_id, "task end");
                let reply = TaskReply::new(&request.task_id, result);
                let msg = Message::new(
                    msg_type::TASK_COMPLETE,
                    &self.sender_id,
                    reply.to_payload(),
                );
                if let Err(e) = session.send(&msg).await {
                    warn!(task_id = %request.task_id, error = %e, "failed to send result");
                }
            }
            Err(e) => {
                self.reply_error(session, &request.task_id, &e.to_string())
                    .await;
            }
        }
    }

    async fn reply_error(&self, session: &Arc<Session>, task_id: &str, message: &str) {
        let reply = TaskReply::new(task_id, message);
        let msg = Message::new(msg_type::TASK_ERROR, &self.sender_id, reply.to_payload());
        if let Err(e) = session.send(&msg).await {
            warn!(task_id, error = %e, "failed to send task error");
        }
    }
}

/// Best-effort first payload field, for error replies to torn requests.
fn recover_task_id(payload: &str) -> Option<String> {
    split_fields(payload)
        .ok()
        .and_then(|fields| fields.into_iter().next())
        .filter(|id| !id.is_empty())
}
