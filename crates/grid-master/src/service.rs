//! Master service: accept loop, per-connection pumps, and task dispatch.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use grid_protocol::payload::{TaskReply, TaskRequest};
use grid_protocol::{msg_type, Message, Received, Session, SessionError};
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::MasterConfig;
use crate::error::MasterError;
use crate::monitor;
use crate::registry::{WorkerHandle, WorkerRegistry};
use crate::results::{ResultStore, TaskOutcome};

/// Shared state handed to every connection task.
struct MasterShared {
    config: MasterConfig,
    token: String,
    registry: Arc<WorkerRegistry>,
    results: ResultStore,
}

/// The MatrixGrid master.
///
/// External entry points per the launcher contract: [`Master::start`] and
/// [`Master::shutdown`]. Task submission goes through
/// [`Master::execute_task`].
pub struct Master {
    shared: Arc<MasterShared>,
    shutdown_tx: watch::Sender<bool>,
    local_addr: OnceLock<SocketAddr>,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl Master {
    /// Create a master with a fresh run-wide runtime token.
    pub fn new(config: MasterConfig) -> Result<Self, MasterError> {
        config.validate().map_err(MasterError::Config)?;
        let token = format!("grid-{}", Uuid::new_v4().simple());
        let (shutdown_tx, _) = watch::channel(false);
        Ok(Self {
            shared: Arc::new(MasterShared {
                config,
                token,
                registry: Arc::new(WorkerRegistry::new()),
                results: ResultStore::new(),
            }),
            shutdown_tx,
            local_addr: OnceLock::new(),
            background: Mutex::new(Vec::new()),
        })
    }

    /// Bind the listener and spawn the accept loop and heartbeat monitor.
    /// Returns the bound address (useful with port 0 in tests). Starting an
    /// already-started master fails with [`MasterError::AlreadyStarted`].
    pub async fn start(&self) -> Result<SocketAddr, MasterError> {
        let listener = TcpListener::bind(("0.0.0.0", self.shared.config.port)).await?;
        let addr = listener.local_addr()?;
        self.local_addr
            .set(addr)
            .map_err(|_| MasterError::AlreadyStarted)?;
        info!(%addr, "master listening");

        let accept = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&self.shared),
            self.shutdown_tx.subscribe(),
        ));
        let sweep = tokio::spawn(monitor::run(
            Arc::clone(&self.shared.registry),
            self.shared.config.clone(),
            self.shutdown_tx.subscribe(),
        ));
        self.background.lock().extend([accept, sweep]);
        Ok(addr)
    }

    /// Route a task to a worker and wait for its outcome.
    ///
    /// Selection is `hash(task_id) % worker_count` over registration order.
    /// Fails with [`MasterError::NoWorkersAvailable`] on an empty registry,
    /// [`MasterError::TaskTimeout`] when no reply arrives in time, and
    /// [`MasterError::TaskExecution`] for worker-reported failures.
    pub async fn execute_task(
        &self,
        task_id: &str,
        task_type: &str,
        data: &str,
    ) -> Result<String, MasterError> {
        let worker = self
            .shared
            .registry
            .route(task_id)
            .ok_or(MasterError::NoWorkersAvailable)?;

        let rx = self.shared.results.register(task_id)?;

        let request = TaskRequest {
            task_id: task_id.to_string(),
            task_type: task_type.to_string(),
            data: data.to_string(),
            token: self.shared.token.clone(),
        };
        let msg = Message::new(
            msg_type::RPC_REQUEST,
            &self.shared.config.sender_id,
            request.to_payload(),
        );

        debug!(task_id, task_type, worker_id = %worker.worker_id(), "dispatching task");
        if let Err(e) = worker.session().send(&msg).await {
            self.shared.results.discard(task_id);
            return Err(MasterError::Session(e));
        }

        match tokio::time::timeout(self.shared.config.task_timeout, rx).await {
            Ok(Ok(TaskOutcome::Success { result, worker_id })) => {
                debug!(task_id, %worker_id, "task complete");
                Ok(result)
            }
            Ok(Ok(TaskOutcome::Failure { message, worker_id })) => {
                Err(MasterError::TaskExecution { worker_id, message })
            }
            // Waiter abandoned by shutdown.
            Ok(Err(_)) => Err(MasterError::Shutdown),
            Err(_) => {
                self.shared.results.discard(task_id);
                warn!(task_id, "task timed out");
                Err(MasterError::TaskTimeout {
                    task_id: task_id.to_string(),
                })
            }
        }
    }

    /// Number of live registered workers.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.shared.registry.len()
    }

    /// The run-wide runtime token issued to workers at registration.
    #[must_use]
    pub fn runtime_token(&self) -> &str {
        &self.shared.token
    }

    /// Address the listener is bound to, once [`Master::start`] has run.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    /// Tasks currently awaiting a worker reply.
    #[must_use]
    pub fn pending_tasks(&self) -> usize {
        self.shared.results.pending_count()
    }

    /// Stop accepting, close every worker session, abandon pending waits,
    /// and release the background tasks.
    pub async fn shutdown(&self) {
        info!("master shutting down");
        let _ = self.shutdown_tx.send(true);
        for worker in self.shared.registry.drain() {
            worker.session().close().await;
        }
        self.shared.results.abandon_all();
        for handle in self.background.lock().drain(..) {
            handle.abort();
        }
    }
}

/// Accept connections until shutdown. A failed accept never tears the loop
/// down; each connection runs in its own task.
async fn accept_loop(
    listener: TcpListener,
    shared: Arc<MasterShared>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "inbound connection");
                    tokio::spawn(handle_connection(
                        stream,
                        Arc::clone(&shared),
                        shutdown.clone(),
                    ));
                }
                Err(e) => {
                    warn!(error = %e, "accept failed");
                }
            },
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    debug!("accept loop stopping");
                    return;
                }
            }
        }
    }
}

/// One connection: handshake, heartbeat sender, inbound pump.
async fn handle_connection(
    stream: TcpStream,
    shared: Arc<MasterShared>,
    shutdown: watch::Receiver<bool>,
) {
    let session = match Session::new(stream) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            warn!(error = %e, "failed to wrap connection");
            return;
        }
    };

    // The first message must be a valid REGISTER_WORKER; anything else drops
    // the connection before it ever enters the registry.
    let first = match session.receive().await {
        Ok(Received::Message(m)) => m,
        Ok(Received::Closed) => return,
        Err(e) => {
            warn!(peer = %session.peer_addr(), error = %e, "bad greeting, dropping");
            session.close().await;
            return;
        }
    };
    if let Err(e) = first.validate() {
        warn!(peer = %session.peer_addr(), error = %e, "invalid greeting, dropping");
        session.close().await;
        return;
    }
    if !first.is(msg_type::REGISTER_WORKER) || first.payload.is_empty() {
        warn!(
            peer = %session.peer_addr(),
            message_type = %first.message_type,
            "greeting is not a worker registration, dropping"
        );
        session.close().await;
        return;
    }

    let handle = Arc::new(WorkerHandle::new(first.payload.clone(), Arc::clone(&session)));
    shared.registry.insert(Arc::clone(&handle));

    let ack = Message::new(
        msg_type::WORKER_ACK,
        &shared.config.sender_id,
        &shared.token,
    );
    if session.send(&ack).await.is_err() {
        shared.registry.remove(&handle);
        return;
    }

    tokio::spawn(heartbeat_sender(
        Arc::clone(&session),
        Arc::clone(&shared),
        shutdown,
    ));

    pump_messages(handle, shared, session).await;
}

/// Emit HEARTBEAT pings on a fixed interval until the session closes or the
/// master shuts down.
async fn heartbeat_sender(
    session: Arc<Session>,
    shared: Arc<MasterShared>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(shared.config.heartbeat_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let ping = Message::new(msg_type::HEARTBEAT, &shared.config.sender_id, "PING");
                if session.send(&ping).await.is_err() {
                    return;
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
        }
    }
}

/// Read a registered worker's messages until the stream closes. Every
/// inbound message refreshes liveness; task replies feed the result store.
async fn pump_messages(
    handle: Arc<WorkerHandle>,
    shared: Arc<MasterShared>,
    session: Arc<Session>,
) {
    loop {
        match session.receive().await {
            Ok(Received::Message(msg)) => {
                handle.touch();
                if let Err(e) = msg.validate() {
                    warn!(worker_id = %handle.worker_id(), error = %e, "dropping invalid message");
                    continue;
                }
                handle_worker_message(&handle, &shared, &msg);
            }
            Ok(Received::Closed) => {
                if shared.registry.remove(&handle) {
                    info!(worker_id = %handle.worker_id(), "worker disconnected");
                }
                return;
            }
            Err(SessionError::Wire(e)) => {
                // One bad line is not worth the session; the worker is
                // clearly alive enough to be sending bytes.
                warn!(worker_id = %handle.worker_id(), error = %e, "undecodable line from worker");
            }
            Err(e) => {
                warn!(worker_id = %handle.worker_id(), error = %e, "session failure");
                shared.registry.remove(&handle);
                session.close().await;
                return;
            }
        }
    }
}

fn handle_worker_message(handle: &Arc<WorkerHandle>, shared: &MasterShared, msg: &Message) {
    match msg.message_type.as_str() {
        // Liveness was already refreshed above; heartbeat payloads are
        // free-form and otherwise ignored.
        msg_type::HEARTBEAT => {}
        msg_type::TASK_COMPLETE => match TaskReply::from_payload(&msg.payload) {
            Ok(reply) => {
                shared.results.complete(
                    &reply.task_id,
                    TaskOutcome::Success {
                        result: reply.body,
                        worker_id: handle.worker_id().to_string(),
                    },
                );
            }
            Err(e) => {
                warn!(worker_id = %handle.worker_id(), error = %e, "malformed TASK_COMPLETE payload");
            }
        },
        msg_type::TASK_ERROR => match TaskReply::from_payload(&msg.payload) {
            Ok(reply) => {
                shared.results.complete(
                    &reply.task_id,
                    TaskOutcome::Failure {
                        message: reply.body,
                        worker_id: handle.worker_id().to_string(),
                    },
                );
            }
            Err(e) => {
                warn!(worker_id = %handle.worker_id(), error = %e, "malformed TASK_ERROR payload");
            }
        },
        other => {
            debug!(worker_id = %handle.worker_id(), message_type = %other, "unexpected message type");
        }
    }
}
