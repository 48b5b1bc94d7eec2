//! Thread/execution boundary.
//!
//! Two directions cross the boundary:
//!
//! - Subscriber code must run on the control surface's main context, while
//!   driver callbacks arrive on arbitrary threads. Callbacks post jobs through a
//!   [`MainContextHandle`]; the control surface drains them with
//!   [`MainContext::run`], [`MainContext::next`] or
//!   [`MainContext::run_pending`].
//! - Driver calls may block for a hardware or network round trip, so the
//!   command path runs them through [`run_blocking`] on tokio's blocking pool.

use crate::error::BoundaryError;
use std::any::Any;
use tokio::sync::mpsc;
use tracing::debug;

/// Unit of work posted to the main context.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Create a main-context queue and a handle for posting into it.
pub fn main_context() -> (MainContext, MainContextHandle) {
    let (tx, rx) = mpsc::unbounded_channel();
    (MainContext { rx }, MainContextHandle { tx })
}

/// Posts jobs onto the main context from any thread.
///
/// Posting never blocks.
#[derive(Debug, Clone)]
pub struct MainContextHandle {
    tx: mpsc::UnboundedSender<Job>,
}

impl MainContextHandle {
    /// Queue `job` for execution on the main context.
    ///
    /// # Errors
    /// Returns `BoundaryError::MainContextClosed` if the [`MainContext`] was
    /// dropped.
    pub fn post<F>(&self, job: F) -> Result<(), BoundaryError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.tx
            .send(Box::new(job))
            .map_err(|_| BoundaryError::MainContextClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// The receiving end of the main context.
///
/// Owned by the control surface; jobs run on whichever task drains it.
#[derive(Debug)]
pub struct MainContext {
    rx: mpsc::UnboundedReceiver<Job>,
}

impl MainContext {
    /// Wait for the next job and run it.
    ///
    /// Returns `false` once every handle is gone and the queue is empty.
    pub async fn next(&mut self) -> bool {
        match self.rx.recv().await {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Run jobs until every handle is gone.
    pub async fn run(mut self) {
        while self.next().await {}
        debug!("main context closed");
    }

    /// Run every job already queued without waiting. Returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            ran += 1;
        }
        ran
    }
}

/// Run a blocking closure on the blocking pool and wait for it.
///
/// A panic inside `f` is caught and returned as `BoundaryError::Panicked`
/// instead of unwinding into the caller.
///
/// # Errors
/// `Panicked` with the panic message, or `Cancelled` if the runtime shut down
/// before the job completed.
pub async fn run_blocking<T, F>(f: F) -> Result<T, BoundaryError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|error| {
        if error.is_panic() {
            BoundaryError::Panicked(panic_message(error.into_panic()))
        } else {
            BoundaryError::Cancelled
        }
    })
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => (*message).to_string(),
            Err(_) => "unknown panic".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_run_pending_runs_in_post_order() {
        let (mut context, handle) = main_context();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        for i in 0..3 {
            let order = Arc::clone(&order);
            handle.post(move || order.lock().unwrap().push(i)).unwrap();
        }

        assert_eq!(context.run_pending(), 3);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(context.run_pending(), 0);
    }

    #[test]
    fn test_post_after_context_dropped() {
        let (context, handle) = main_context();
        drop(context);

        assert!(handle.is_closed());
        assert_eq!(handle.post(|| {}), Err(BoundaryError::MainContextClosed));
    }

    #[tokio::test]
    async fn test_post_from_other_thread() {
        let (mut context, handle) = main_context();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        std::thread::spawn(move || {
            handle
                .post(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        })
        .join()
        .unwrap();

        assert!(context.next().await);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        // Handle moved into the thread and dropped
        assert!(!context.next().await);
    }

    #[tokio::test]
    async fn test_run_blocking_returns_value() {
        let value = run_blocking(|| 40 + 2).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_run_blocking_catches_panic() {
        let result: Result<(), _> = run_blocking(|| panic!("reader fell off")).await;
        assert_eq!(
            result,
            Err(BoundaryError::Panicked("reader fell off".to_string()))
        );
    }

    #[tokio::test]
    async fn test_run_blocking_catches_formatted_panic() {
        let code = 7;
        let result: Result<(), _> = run_blocking(move || panic!("code {code}")).await;
        assert_eq!(result, Err(BoundaryError::Panicked("code 7".to_string())));
    }
}
