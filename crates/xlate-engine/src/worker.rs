//! Bounded worker pool that runs synchronous capability calls off the
//! connection's read path (spec §4.3 rule R1, §5 "shared resource
//! policy").
//!
//! Grounded on `gglib-voice`'s `AudioThreadHandle`: a `Send + Sync`
//! handle that proxies calls through a channel to dedicated execution
//! context, so the caller never touches the underlying resource
//! directly. The difference is scale — the teacher confines `!Send`
//! audio devices to exactly one OS thread; this pool runs N async
//! worker tasks over a shared bounded job queue, since ASR/MT/TTS calls
//! here are plain `Send` functions dispatched via `spawn_blocking`
//! rather than `!Send` device handles.

use tokio::sync::{mpsc, oneshot, Mutex};
use xlate_core::error::EngineError;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Depth of the shared job queue before `submit` starts waiting.
const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// A pool of `concurrency` worker tasks draining one shared bounded job
/// queue. Jobs are plain synchronous closures run via
/// `tokio::task::spawn_blocking`, so CPU-bound capability calls never
/// stall the Tokio runtime's async worker threads.
#[derive(Clone)]
pub struct WorkerPool {
    tx: mpsc::Sender<Job>,
}

impl WorkerPool {
    /// Spawn `concurrency` worker tasks sharing one bounded queue.
    #[must_use]
    pub fn new(concurrency: usize) -> Self {
        Self::with_capacity(concurrency, DEFAULT_QUEUE_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(concurrency: usize, queue_capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel::<Job>(queue_capacity);
        let rx = std::sync::Arc::new(Mutex::new(rx));
        for worker_id in 0..concurrency.max(1) {
            let rx = rx.clone();
            tokio::spawn(async move {
                loop {
                    let job = {
                        let mut guard = rx.lock().await;
                        guard.recv().await
                    };
                    let Some(job) = job else {
                        tracing::debug!(worker_id, "worker pool: queue closed, exiting");
                        break;
                    };
                    if tokio::task::spawn_blocking(job).await.is_err() {
                        tracing::warn!(worker_id, "worker pool: job panicked");
                    }
                }
            });
        }
        Self { tx }
    }

    /// Submit a synchronous job and await its result, backpressuring on
    /// the caller if the queue is full.
    pub async fn submit<F, T>(&self, f: F) -> Result<T, EngineError>
    where
        F: FnOnce() -> Result<T, EngineError> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            let _ = reply_tx.send(f());
        });
        self.tx.send(job).await.map_err(|_| EngineError::Backpressure)?;
        reply_rx.await.map_err(|_| EngineError::Backpressure)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn submit_runs_job_and_returns_result() {
        let pool = WorkerPool::new(2);
        let result = pool.submit(|| Ok::<_, EngineError>(40 + 2)).await.unwrap();
        assert_eq!(result, 42);
    }

    #[tokio::test]
    async fn submit_propagates_job_error() {
        let pool = WorkerPool::new(1);
        let result = pool
            .submit(|| Err::<i32, _>(EngineError::Backpressure))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn submit_runs_concurrently_across_workers() {
        let pool = WorkerPool::new(4);
        let mut handles = Vec::new();
        for i in 0..4 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move { pool.submit(move || Ok::<_, EngineError>(i)).await }));
        }
        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap().unwrap());
        }
        results.sort_unstable();
        assert_eq!(results, vec![0, 1, 2, 3]);
    }
}
