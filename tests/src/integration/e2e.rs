//! End-to-end task round trips: real master, real workers, loopback TCP.

#[cfg(test)]
mod tests {
    use crate::integration::{spawn_worker, start_master, wait_for_worker_count};
    use futures::future::join_all;
    use grid_master::MasterError;
    use grid_protocol::payload::{TaskReply, TaskRequest};
    use grid_protocol::{msg_type, Message, Received, Session};
    use grid_worker::{Worker, WorkerConfig};
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    // =========================================================================
    // HAPPY PATH: MATRIX TASKS
    // =========================================================================

    #[tokio::test]
    async fn matrix_multiply_round_trip() {
        let (master, addr) = start_master().await;
        let (_worker, runner) = spawn_worker(addr, "worker-1").await;
        wait_for_worker_count(&master, 1).await;

        // A=[[1,2]], B=[[3],[4]] -> [[11]]
        let result = master
            .execute_task("task-mul", "MATRIX_MULTIPLY", "1,2|3\\4")
            .await
            .unwrap();
        assert_eq!(result, "11");

        master.shutdown().await;
        let _ = timeout(Duration::from_secs(1), runner).await;
    }

    #[tokio::test]
    async fn block_transpose_round_trip() {
        let (master, addr) = start_master().await;
        let (_worker, runner) = spawn_worker(addr, "worker-1").await;
        wait_for_worker_count(&master, 1).await;

        let result = master
            .execute_task("task-tr", "BLOCK_TRANSPOSE", "1,2\\3,4")
            .await
            .unwrap();
        assert_eq!(result, "1,3\\2,4");

        master.shutdown().await;
        let _ = timeout(Duration::from_secs(1), runner).await;
    }

    #[tokio::test]
    async fn concurrent_tasks_across_a_worker_pool() {
        let (master, addr) = start_master().await;
        let mut runners = Vec::new();
        for i in 0..3 {
            let (_w, runner) = spawn_worker(addr, &format!("worker-{i}")).await;
            runners.push(runner);
        }
        wait_for_worker_count(&master, 3).await;

        let tasks = (0..12).map(|i| {
            let master = master.clone();
            async move {
                master
                    .execute_task(&format!("task-{i}"), "BLOCK_TRANSPOSE", "1,2\\3,4")
                    .await
            }
        });
        let results = join_all(tasks).await;
        for result in results {
            assert_eq!(result.unwrap(), "1,3\\2,4");
        }
        assert_eq!(master.pending_tasks(), 0);

        master.shutdown().await;
        for runner in runners {
            let _ = timeout(Duration::from_secs(1), runner).await;
        }
    }

    // =========================================================================
    // FAILURE PROPAGATION
    // =========================================================================

    #[tokio::test]
    async fn worker_reported_failure_reaches_the_caller_verbatim() {
        let (master, addr) = start_master().await;
        let (_worker, runner) = spawn_worker(addr, "worker-1").await;
        wait_for_worker_count(&master, 1).await;

        let err = master
            .execute_task("task-bad", "MATRIX_MULTIPLY", "1,ZZZ|1")
            .await
            .unwrap_err();
        match err {
            MasterError::TaskExecution { message, worker_id } => {
                assert_eq!(worker_id, "worker-1");
                assert!(message.starts_with("Invalid matrix data"), "{message}");
            }
            other => panic!("expected TaskExecution, got {other:?}"),
        }

        master.shutdown().await;
        let _ = timeout(Duration::from_secs(1), runner).await;
    }

    #[tokio::test]
    async fn unknown_task_type_reaches_the_caller() {
        let (master, addr) = start_master().await;
        let (_worker, runner) = spawn_worker(addr, "worker-1").await;
        wait_for_worker_count(&master, 1).await;

        let err = master
            .execute_task("task-fft", "FFT", "1,2")
            .await
            .unwrap_err();
        match err {
            MasterError::TaskExecution { message, .. } => {
                assert_eq!(message, "Unknown task type: FFT");
            }
            other => panic!("expected TaskExecution, got {other:?}"),
        }

        master.shutdown().await;
        let _ = timeout(Duration::from_secs(1), runner).await;
    }

    // =========================================================================
    // TOKEN AUTHENTICITY CHECK
    // =========================================================================

    /// A scripted master: accepts one worker, hands out a token, then sends
    /// a request carrying the wrong one.
    #[tokio::test]
    async fn forged_token_yields_invalid_token_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let scripted_master = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let session = Session::new(stream).unwrap();

            // Handshake: worker registers, master acks with the real token.
            let greeting = match session.receive().await.unwrap() {
                Received::Message(m) => m,
                Received::Closed => panic!("worker hung up"),
            };
            assert_eq!(greeting.message_type, msg_type::REGISTER_WORKER);
            session
                .send(&Message::new(msg_type::WORKER_ACK, "scripted", "real-token"))
                .await
                .unwrap();

            // Forged request.
            let request = TaskRequest {
                task_id: "task-x".to_string(),
                task_type: "MATRIX_MULTIPLY".to_string(),
                data: "1|1".to_string(),
                token: "forged-token".to_string(),
            };
            session
                .send(&Message::new(
                    msg_type::RPC_REQUEST,
                    "scripted",
                    request.to_payload(),
                ))
                .await
                .unwrap();

            // The worker must refuse without computing.
            loop {
                match session.receive().await.unwrap() {
                    Received::Message(m) if m.is(msg_type::HEARTBEAT) => continue,
                    Received::Message(m) => {
                        assert_eq!(m.message_type, msg_type::TASK_ERROR);
                        let reply = TaskReply::from_payload(&m.payload).unwrap();
                        assert_eq!(reply.task_id, "task-x");
                        assert_eq!(reply.body, "Invalid token");
                        return;
                    }
                    Received::Closed => panic!("worker hung up before replying"),
                }
            }
        });

        let config = WorkerConfig::for_testing("worker-1", "127.0.0.1", addr.port());
        let worker = Worker::connect(config).await.unwrap();
        assert_eq!(worker.runtime_token(), "real-token");
        let runner = tokio::spawn(async move { worker.run().await });

        timeout(Duration::from_secs(2), scripted_master)
            .await
            .expect("scripted master timed out")
            .unwrap();
        runner.abort();
    }
}
