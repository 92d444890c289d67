//! Serial execution context.
//!
//! A `SerialExecutor` owns one worker thread and a piece of state that only
//! that thread ever touches. Jobs run one at a time, in submission order, and
//! each submission hands back a `Pending` result.

use crate::error::{ClassifierError, Result};
use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::thread::{self, JoinHandle};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

type Job<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

/// Handle to the eventual result of a submitted job.
///
/// Await it from async code, or call [`Pending::wait`] from a plain thread.
#[must_use = "a pending result does nothing unless awaited or waited on"]
#[derive(Debug)]
pub struct Pending<T> {
    receiver: oneshot::Receiver<Result<T>>,
}

impl<T> Pending<T> {
    fn new(receiver: oneshot::Receiver<Result<T>>) -> Self {
        Self { receiver }
    }

    /// A pending result that is already resolved.
    pub(crate) fn ready(value: Result<T>) -> Self {
        let (sender, receiver) = oneshot::channel();
        let _ = sender.send(value);
        Self::new(receiver)
    }

    /// Block the current thread until the job finishes.
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous runtime; `.await` the
    /// handle there instead.
    pub fn wait(self) -> Result<T> {
        self.receiver
            .blocking_recv()
            .unwrap_or(Err(ClassifierError::WorkerTerminated))
    }

    /// Take the result if the job has already finished.
    pub fn try_take(&mut self) -> Option<Result<T>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => {
                Some(Err(ClassifierError::WorkerTerminated))
            }
        }
    }
}

impl<T> Future for Pending<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(ClassifierError::WorkerTerminated)))
    }
}

/// Single worker thread that serializes access to its state.
pub struct SerialExecutor<S> {
    sender: Option<mpsc::UnboundedSender<Job<S>>>,
    worker: Option<JoinHandle<()>>,
}

impl<S: Send + 'static> SerialExecutor<S> {
    /// Start the worker thread, moving `state` onto it.
    pub fn spawn(name: &str, state: S) -> Result<Self> {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job<S>>();
        let worker = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let mut state = state;
                while let Some(job) = receiver.blocking_recv() {
                    job(&mut state);
                }
                debug!("Worker queue closed, exiting");
            })?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    /// Queue `job` behind everything submitted before it.
    ///
    /// A panic inside `job` is caught on the worker and delivered as
    /// `PreconditionViolation`; the worker keeps serving later jobs.
    pub fn submit<T, F>(&self, job: F) -> Pending<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut S) -> Result<T> + Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        let wrapped: Job<S> = Box::new(move |state: &mut S| {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| job(state)))
                .unwrap_or_else(|payload| {
                    let message = panic_message(payload.as_ref());
                    error!("Background job panicked: {}", message);
                    Err(ClassifierError::PreconditionViolation(message))
                });
            let _ = sender.send(outcome);
        });

        // If the worker is gone the job, and its result sender, are dropped
        // here, which resolves the pending handle to `WorkerTerminated`.
        if let Some(queue) = &self.sender {
            let _ = queue.send(wrapped);
        }
        Pending::new(receiver)
    }
}

impl<S> Drop for SerialExecutor<S> {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.thread().id() == thread::current().id() {
                return;
            }
            if worker.join().is_err() {
                error!("Worker thread panicked while shutting down");
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
