//! Bounded fan-out/fan-in shared by the answer and judge stages.
//!
//! Each item runs in its own task behind a semaphore. Finished items are
//! sent over a channel to the calling task, which is the only writer of
//! the result vector and the only caller of the observer. An item that
//! panics, or is still running when the batch deadline passes, is turned
//! into a fallback output by `recover`, so the output always has one entry
//! per input.

use super::progress::ProgressObserver;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};

/// Pool sizing and deadline.
#[derive(Debug, Clone, Copy)]
pub struct PoolOptions {
    pub workers: usize,
    pub deadline: Option<Duration>,
}

/// Reason attached to items cut off by the batch deadline.
pub const DEADLINE_EXCEEDED: &str = "batch deadline exceeded";

/// Run `work` over `items` with at most `options.workers` in flight.
///
/// Returns `(input_index, output)` pairs in completion order.
pub async fn run_bounded<I, O, F, Fut, R>(
    items: Vec<I>,
    options: PoolOptions,
    work: F,
    recover: R,
    observer: &dyn ProgressObserver<O>,
) -> Vec<(usize, O)>
where
    I: Clone + Send + 'static,
    O: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = O> + Send + 'static,
    R: Fn(I, String) -> O + Send + Sync + 'static,
{
    let total = items.len();
    observer.on_batch_start(total);

    if total == 0 {
        observer.on_batch_finish(0);
        return Vec::new();
    }

    let semaphore = Arc::new(Semaphore::new(options.workers.max(1)));
    let (tx, mut rx) = mpsc::channel::<(usize, O)>(total);
    let work = Arc::new(work);
    let recover = Arc::new(recover);

    let mut handles = Vec::with_capacity(total);
    for (index, item) in items.iter().cloned().enumerate() {
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();
        let work = Arc::clone(&work);
        let recover = Arc::clone(&recover);

        handles.push(tokio::spawn(async move {
            let Ok(_permit) = sem.acquire_owned().await else {
                return;
            };

            let retained = item.clone();
            let output = match AssertUnwindSafe(work(item)).catch_unwind().await {
                Ok(output) => output,
                Err(payload) => {
                    let reason = format!("worker panicked: {}", panic_message(payload.as_ref()));
                    tracing::error!(index, %reason, "Batch item failed");
                    recover(retained, reason)
                }
            };

            let _ = tx.send((index, output)).await;
        }));
    }
    drop(tx);

    let deadline = options
        .deadline
        .map(|d| tokio::time::Instant::now() + d);
    let mut results = Vec::with_capacity(total);
    let mut collected = vec![false; total];
    let mut timed_out = false;

    loop {
        let next = match deadline {
            Some(at) => match tokio::time::timeout_at(at, rx.recv()).await {
                Ok(next) => next,
                Err(_) => {
                    timed_out = true;
                    break;
                }
            },
            None => rx.recv().await,
        };

        let Some((index, output)) = next else {
            break;
        };
        collected[index] = true;
        observer.on_item_complete(index, &output);
        results.push((index, output));
    }

    for handle in &handles {
        handle.abort();
    }

    if results.len() < total {
        let reason = if timed_out {
            DEADLINE_EXCEEDED
        } else {
            "worker terminated without a result"
        };
        tracing::warn!(
            missing = total - results.len(),
            total,
            reason,
            "Filling unfinished batch items with fallback results"
        );

        for (index, item) in items.into_iter().enumerate() {
            if !collected[index] {
                let output = recover(item, reason.to_string());
                observer.on_item_complete(index, &output);
                results.push((index, output));
            }
        }
    }

    observer.on_batch_finish(results.len());
    results
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
