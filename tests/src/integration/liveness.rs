//! Liveness machinery: heartbeat eviction, task timeouts, clean shutdown.

#[cfg(test)]
mod tests {
    use crate::integration::{spawn_worker, start_master, start_master_with, wait_for_worker_count};
    use grid_master::{MasterConfig, MasterError};
    use grid_protocol::payload::{TaskReply, TaskRequest};
    use grid_protocol::{msg_type, Message, Received, Session};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::net::TcpStream;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    /// Open a raw session to the master and complete the registration
    /// handshake, without any of the worker's heartbeat machinery behind it.
    async fn register_raw(addr: std::net::SocketAddr, worker_id: &str) -> Arc<Session> {
        let stream = TcpStream::connect(addr).await.unwrap();
        let session = Arc::new(Session::new(stream).unwrap());
        session
            .send(&Message::new(msg_type::REGISTER_WORKER, worker_id, worker_id))
            .await
            .unwrap();
        match session.receive().await.unwrap() {
            Received::Message(m) => assert_eq!(m.message_type, msg_type::WORKER_ACK),
            Received::Closed => panic!("master refused registration"),
        }
        session
    }

    // =========================================================================
    // HEARTBEAT EVICTION
    // =========================================================================

    #[tokio::test]
    async fn silent_worker_is_evicted() {
        let (master, addr) = start_master().await;
        let _session = register_raw(addr, "mute-worker").await;
        wait_for_worker_count(&master, 1).await;

        // The session sends nothing after registering, so the monitor must
        // sweep it out once its last-seen age passes the liveness timeout.
        wait_for_worker_count(&master, 0).await;

        let err = master
            .execute_task("task-after", "BLOCK_TRANSPOSE", "1,2")
            .await
            .unwrap_err();
        assert!(matches!(err, MasterError::NoWorkersAvailable));

        master.shutdown().await;
    }

    #[tokio::test]
    async fn heartbeating_worker_stays_registered() {
        let (master, addr) = start_master().await;
        let (_worker, runner) = spawn_worker(addr, "worker-1").await;
        wait_for_worker_count(&master, 1).await;

        // Well past the liveness timeout; the real worker's heartbeats keep
        // its last-seen age fresh.
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(master.worker_count(), 1);

        master.shutdown().await;
        let _ = timeout(Duration::from_secs(1), runner).await;
    }

    // =========================================================================
    // TASK TIMEOUT AND LATE REPLIES
    // =========================================================================

    #[tokio::test]
    async fn unanswered_task_times_out_and_a_late_reply_is_inert() {
        let mut config = MasterConfig::for_testing();
        // Long liveness leash so the silent worker survives the task timeout.
        config.heartbeat_timeout = Duration::from_secs(10);
        config.task_timeout = Duration::from_millis(300);
        let (master, addr) = start_master_with(config).await;

        let session = register_raw(addr, "slow-worker").await;
        wait_for_worker_count(&master, 1).await;

        // Swallow requests, forwarding their ids instead of answering.
        let (task_tx, mut task_rx) = mpsc::unbounded_channel();
        let reader = {
            let session = Arc::clone(&session);
            tokio::spawn(async move {
                while let Ok(Received::Message(m)) = session.receive().await {
                    if m.is(msg_type::RPC_REQUEST) {
                        let request = TaskRequest::from_payload(&m.payload).unwrap();
                        let _ = task_tx.send(request.task_id);
                    }
                }
            })
        };

        let err = master
            .execute_task("task-slow", "BLOCK_TRANSPOSE", "1,2")
            .await
            .unwrap_err();
        assert!(matches!(err, MasterError::TaskTimeout { ref task_id } if task_id == "task-slow"));
        assert_eq!(master.pending_tasks(), 0, "timed-out waiter must be discarded");

        // The reply lands after the waiter is gone; it must be dropped
        // without disturbing anything.
        let task_id = timeout(Duration::from_secs(1), task_rx.recv())
            .await
            .expect("request never reached the worker")
            .unwrap();
        let reply = TaskReply::new(task_id, "too-late");
        session
            .send(&Message::new(
                msg_type::TASK_COMPLETE,
                "slow-worker",
                reply.to_payload(),
            ))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(master.pending_tasks(), 0);
        assert_eq!(master.worker_count(), 1);

        reader.abort();
        master.shutdown().await;
    }

    // =========================================================================
    // REGISTRATION AND SHUTDOWN
    // =========================================================================

    /// Register a raw session that answers every request with a fixed tag,
    /// so tests can observe which worker a task id routes to.
    async fn register_echo_worker(
        addr: std::net::SocketAddr,
        worker_id: &str,
        tag: &str,
    ) -> (Arc<Session>, tokio::task::JoinHandle<()>) {
        let session = register_raw(addr, worker_id).await;
        let responder = {
            let session = Arc::clone(&session);
            let tag = tag.to_string();
            tokio::spawn(async move {
                while let Ok(Received::Message(m)) = session.receive().await {
                    if m.is(msg_type::RPC_REQUEST) {
                        let request = TaskRequest::from_payload(&m.payload).unwrap();
                        let reply = TaskReply::new(request.task_id, tag.clone());
                        let _ = session
                            .send(&Message::new(
                                msg_type::TASK_COMPLETE,
                                &tag,
                                reply.to_payload(),
                            ))
                            .await;
                    }
                }
            })
        };
        (session, responder)
    }

    #[tokio::test]
    async fn duplicate_id_registration_leaves_earlier_routing_undisturbed() {
        let mut config = MasterConfig::for_testing();
        // The echo workers only talk when spoken to; keep them off the
        // eviction radar.
        config.heartbeat_timeout = Duration::from_secs(10);
        let (master, addr) = start_master_with(config).await;

        let (_s1, r1) = register_echo_worker(addr, "worker-1", "first").await;
        let (_s2, r2) = register_echo_worker(addr, "worker-2", "second").await;
        wait_for_worker_count(&master, 2).await;

        // Pin each task id to its target under the two-worker composition.
        let task_ids: Vec<String> = (0..6).map(|i| format!("pin-{i}")).collect();
        let mut targets = Vec::new();
        for id in &task_ids {
            targets.push(master.execute_task(id, "BLOCK_TRANSPOSE", "1").await.unwrap());
        }

        // A reconnecting worker registers under an id that is already taken.
        // It is appended behind the existing entries, then hangs up.
        let (dup_session, r3) = register_echo_worker(addr, "worker-1", "latecomer").await;
        wait_for_worker_count(&master, 3).await;
        dup_session.close().await;
        wait_for_worker_count(&master, 2).await;

        // Back at the original composition, every task id routes exactly
        // where it did before: the earlier workers kept their positions.
        for (id, expected) in task_ids.iter().zip(&targets) {
            let got = master.execute_task(id, "BLOCK_TRANSPOSE", "1").await.unwrap();
            assert_eq!(&got, expected, "routing moved for {id}");
        }

        r1.abort();
        r2.abort();
        r3.abort();
        master.shutdown().await;
    }

    #[tokio::test]
    async fn registration_handshake_requires_a_worker_id() {
        let (master, addr) = start_master().await;

        let stream = TcpStream::connect(addr).await.unwrap();
        let session = Session::new(stream).unwrap();
        session
            .send(&Message::new(msg_type::REGISTER_WORKER, "nameless", ""))
            .await
            .unwrap();

        // No ack; the master hangs up instead.
        let received = timeout(Duration::from_secs(1), session.receive())
            .await
            .expect("master should close promptly")
            .unwrap();
        assert!(matches!(received, Received::Closed));
        assert_eq!(master.worker_count(), 0);

        master.shutdown().await;
    }

    #[tokio::test]
    async fn first_message_must_be_registration() {
        let (master, addr) = start_master().await;

        let stream = TcpStream::connect(addr).await.unwrap();
        let session = Session::new(stream).unwrap();
        session
            .send(&Message::new(msg_type::HEARTBEAT, "eager", "PING"))
            .await
            .unwrap();

        let received = timeout(Duration::from_secs(1), session.receive())
            .await
            .expect("master should close promptly")
            .unwrap();
        assert!(matches!(received, Received::Closed));
        assert_eq!(master.worker_count(), 0);

        master.shutdown().await;
    }

    #[tokio::test]
    async fn several_workers_register_and_disconnects_are_noticed() {
        let (master, addr) = start_master().await;
        let (_w1, r1) = spawn_worker(addr, "worker-1").await;
        let (w2, r2) = spawn_worker(addr, "worker-2").await;
        let (_w3, r3) = spawn_worker(addr, "worker-3").await;
        wait_for_worker_count(&master, 3).await;

        // Close one worker's connection; the pump sees the close and
        // deregisters it.
        w2.disconnect().await;
        let _ = timeout(Duration::from_secs(1), r2).await;
        wait_for_worker_count(&master, 2).await;

        master.shutdown().await;
        for runner in [r1, r3] {
            let _ = timeout(Duration::from_secs(1), runner).await;
        }
    }

    #[tokio::test]
    async fn shutdown_closes_worker_sessions() {
        let (master, addr) = start_master().await;
        let (_worker, runner) = spawn_worker(addr, "worker-1").await;
        wait_for_worker_count(&master, 1).await;

        master.shutdown().await;

        // The worker's run loop ends once its session reads EOF.
        timeout(Duration::from_secs(1), runner)
            .await
            .expect("worker run loop should exit after shutdown")
            .unwrap();
        assert_eq!(master.worker_count(), 0);
    }
}
