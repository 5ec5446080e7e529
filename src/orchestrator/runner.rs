//! Orchestrator worker pool.
//!
//! Each worker is one cooperative task: dequeue a message, process the job
//! to a terminal state, ack. A message whose job did not reach a terminal
//! state is released for redelivery; at-least-once delivery plus the store's
//! state machine make that safe.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::observability::Metrics;
use crate::orchestrator::engine::{Disposition, Engine};
use crate::queue::WorkQueue;
use crate::specialists::{HttpSpecialists, RetryPolicy};
use crate::store::JobStore;
use crate::trace::Tracer;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Entry point for `careerflow worker`.
pub async fn run(workers_override: Option<usize>, data_path: Option<String>) -> Result<(), AnyError> {
    info!("Loading configuration");
    let mut config = Config::load().map_err(|e| format!("Failed to load config: {}", e))?;
    if let Some(path) = data_path {
        config.server.data_path = path.into();
    }

    let workers = workers_override.unwrap_or(config.worker.workers);

    let store_path = config.server.data_path.join("store");
    info!(path = %store_path.display(), "Opening job store");
    let store = Arc::new(
        JobStore::open(&store_path).map_err(|e| format!("Failed to open job store: {}", e))?,
    );

    let queue_path = config.server.data_path.join("queue");
    info!(path = %queue_path.display(), "Opening work queue");
    let queue = Arc::new(
        WorkQueue::open(&queue_path).map_err(|e| format!("Failed to open work queue: {}", e))?,
    );

    let specialists = Arc::new(
        HttpSpecialists::new(&config.specialists, config.worker.call_deadline.as_duration())
            .map_err(|e| format!("Failed to build specialist client: {}", e))?,
    );

    let tracer = Arc::new(Tracer::new(&config.trace));
    let metrics = Arc::new(Metrics::new());

    let engine = Arc::new(Engine::new(
        store.clone(),
        specialists,
        tracer,
        RetryPolicy::from(&config.worker.retry),
        config.worker.job_budget.as_duration(),
        metrics.clone(),
    ));

    let lease = config.worker.lease.as_duration();
    let poll_interval = config.worker.poll_interval.as_duration();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut handles = Vec::with_capacity(workers);
    for worker_id in 0..workers {
        let engine = engine.clone();
        let queue = queue.clone();
        let shutdown = shutdown_rx.clone();
        handles.push(tokio::spawn(async move {
            worker_loop(worker_id, engine, queue, lease, poll_interval, shutdown).await;
        }));
    }

    // Hourly retention sweep; a failed sweep only logs.
    let retention = config.retention.clone();
    let mut prune_shutdown = shutdown_rx.clone();
    handles.push(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(3600));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) =
                        store.prune_expired(retention.job_ttl_days, retention.idempotency_ttl_days)
                    {
                        warn!(error = %e, "Retention sweep failed");
                    }
                }
                _ = prune_shutdown.changed() => break,
            }
        }
    }));

    info!(workers, "Orchestrator worker pool started");

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    for handle in handles {
        let _ = handle.await;
    }

    info!(snapshot = ?metrics.snapshot(), "Orchestrator worker pool stopped");
    Ok(())
}

/// One worker: dequeue, process, ack-or-release, repeat.
pub async fn worker_loop(
    worker_id: usize,
    engine: Arc<Engine>,
    queue: Arc<WorkQueue>,
    lease: Duration,
    poll_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(worker_id, "Worker started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        let delivery = match queue.dequeue(lease) {
            Ok(delivery) => delivery,
            Err(e) => {
                error!(worker_id, error = %e, "Dequeue failed");
                tokio::select! {
                    _ = tokio::time::sleep(poll_interval) => {}
                    _ = shutdown.changed() => {}
                }
                continue;
            }
        };

        let Some(delivery) = delivery else {
            tokio::select! {
                _ = tokio::time::sleep(poll_interval) => {}
                _ = shutdown.changed() => {}
            }
            continue;
        };

        match engine.process(&delivery.message, delivery.attempt).await {
            Disposition::Ack => {
                if let Err(e) = queue.ack(delivery.seq) {
                    error!(worker_id, seq = delivery.seq, error = %e, "Ack failed");
                }
            }
            Disposition::Release => {
                // Make the message available immediately rather than waiting
                // out the lease; either way the next delivery redoes the work
                // from the durable record.
                if let Err(e) = queue.release(delivery.seq) {
                    error!(worker_id, seq = delivery.seq, error = %e, "Release failed");
                }
            }
        }
    }

    info!(worker_id, "Worker stopped");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate())
            .expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
