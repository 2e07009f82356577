use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::debug;

/// Run `job` over `items` on a fixed pool of `workers` tasks.
///
/// Each worker sleeps `delay` before every job, so the aggregate request
/// rate grows with the pool size. Results are streamed back as
/// `(item, output)` pairs; the channel closes once every worker has drained
/// the shared queue. The caller is the single writer of whatever the results
/// are applied to.
pub(crate) fn spawn_pool<T, F, Fut>(
    items: Vec<String>,
    workers: usize,
    delay: Duration,
    job: F,
) -> (mpsc::UnboundedReceiver<(String, T)>, Vec<JoinHandle<()>>)
where
    T: Send + 'static,
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = T> + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let queue = Arc::new(Mutex::new(VecDeque::from(items)));
    let job = Arc::new(job);

    let mut handles = Vec::new();
    for worker_id in 0..workers.max(1) {
        let queue = queue.clone();
        let job = job.clone();
        let tx = tx.clone();

        handles.push(tokio::spawn(async move {
            debug!("Pool worker {} started", worker_id);
            loop {
                let Some(item) = queue.lock().await.pop_front() else {
                    break;
                };

                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }

                let output = job(item.clone()).await;
                if tx.send((item, output)).is_err() {
                    break;
                }
            }
            debug!("Pool worker {} finished", worker_id);
        }));
    }

    (rx, handles)
}
