//! Worker runtime: registration handshake, read loop, heartbeat sender.

use std::sync::Arc;

use grid_protocol::{msg_type, Message, Received, Session, SessionError};
use tracing::{debug, info, warn};

use crate::config::WorkerConfig;
use crate::error::WorkerError;
use crate::executor::TaskExecutor;

/// A connected, registered worker.
#[derive(Debug)]
pub struct Worker {
    config: WorkerConfig,
    session: Arc<Session>,
    token: String,
    executor: Arc<TaskExecutor>,
}

impl Worker {
    /// Dial the master and complete the registration handshake.
    ///
    /// Fails with [`WorkerError::Registration`] when the master's first
    /// reply is anything but a valid `WORKER_ACK`.
    pub async fn connect(config: WorkerConfig) -> Result<Self, WorkerError> {
        config.validate().map_err(WorkerError::Config)?;

        let stream =
            tokio::net::TcpStream::connect((config.master_host.as_str(), config.master_port))
                .await?;
        let session = Arc::new(Session::new(stream)?);

        let register = Message::new(
            msg_type::REGISTER_WORKER,
            &config.sender_id,
            &config.worker_id,
        );
        session.send(&register).await?;

        let ack = match session.receive().await? {
            Received::Message(m) => m,
            Received::Closed => {
                return Err(WorkerError::Registration(
                    "master closed the connection during handshake".to_string(),
                ))
            }
        };
        ack.validate()?;
        if !ack.is(msg_type::WORKER_ACK) {
            return Err(WorkerError::Registration(format!(
                "expected WORKER_ACK, got {}",
                ack.message_type
            )));
        }
        let token = ack.payload;
        info!(worker_id = %config.worker_id, "registered with master, token received");

        let executor = Arc::new(TaskExecutor::new(
            config.sender_id.clone(),
            token.clone(),
            config.max_concurrent_tasks,
        ));

        Ok(Self {
            config,
            session,
            token,
            executor,
        })
    }

    /// The runtime token issued at registration.
    #[must_use]
    pub fn runtime_token(&self) -> &str {
        &self.token
    }

    /// Id this worker registered under.
    #[must_use]
    pub fn worker_id(&self) -> &str {
        &self.config.worker_id
    }

    /// Close the master connection; a running [`Worker::run`] loop exits
    /// once it observes the closed session.
    pub async fn disconnect(&self) {
        self.session.close().await;
    }

    /// Drive the worker until the master connection closes.
    ///
    /// Spawns the heartbeat sender, then pumps inbound messages: heartbeat
    /// pings are answered inline, task requests run on the executor's
    /// bounded pool in their own tasks.
    pub async fn run(&self) {
        let heartbeat = tokio::spawn(heartbeat_sender(
            Arc::clone(&self.session),
            self.config.clone(),
        ));

        loop {
            match self.session.receive().await {
                Ok(Received::Message(msg)) => {
                    if let Err(e) = msg.validate() {
                        warn!(worker_id = %self.config.worker_id, error = %e, "dropping invalid message");
                        continue;
                    }
                    self.handle_message(msg).await;
                }
                Ok(Received::Closed) => {
                    info!(worker_id = %self.config.worker_id, "master connection closed");
                    break;
                }
                Err(SessionError::Wire(e)) => {
                    warn!(worker_id = %self.config.worker_id, error = %e, "undecodable line from master");
                }
                Err(e) => {
                    warn!(worker_id = %self.config.worker_id, error = %e, "session failure");
                    break;
                }
            }
        }

        heartbeat.abort();
    }

    async fn handle_message(&self, msg: Message) {
        match msg.message_type.as_str() {
            msg_type::HEARTBEAT => {
                // Any outbound traffic counts as liveness on the master; the
                // explicit ack mirrors its ping.
                let ack = Message::new(msg_type::HEARTBEAT, &self.config.sender_id, "ACK");
                if let Err(e) = self.session.send(&ack).await {
                    debug!(error = %e, "heartbeat ack failed");
                }
            }
            msg_type::RPC_REQUEST => {
                let executor = Arc::clone(&self.executor);
                let session = Arc::clone(&self.session);
                let payload = msg.payload;
                tokio::spawn(async move {
                    executor.handle_request(&session, &payload).await;
                });
            }
            other => {
                debug!(message_type = %other, "unexpected message type from master");
            }
        }
    }
}

/// Emit worker-initiated heartbeats until the session closes.
async fn heartbeat_sender(session: Arc<Session>, config: WorkerConfig) {
    let mut ticker = tokio::time::interval(config.heartbeat_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let beat = Message::new(msg_type::HEARTBEAT, &config.sender_id, "WORKER_ALIVE");
        if session.send(&beat).await.is_err() {
            return;
        }
    }
}
