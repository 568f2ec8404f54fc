//! Serialized execution context.
//!
//! A [`SerialExecutor`] owns some state `S` on a dedicated thread and runs
//! posted jobs against it one at a time, in submission order. Delayed jobs
//! run once their deadline passes and can be cancelled before that.

use crate::errors::CameraError;
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{JoinHandle, ThreadId};
use std::time::{Duration, Instant};

pub type Job<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

/// Identifies a delayed job so it can be cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

enum Message<S> {
    Run(Job<S>),
    Delayed {
        due: Instant,
        token: TimerToken,
        job: Job<S>,
    },
    Cancel(TimerToken),
    Shutdown,
}

/// Cheap, cloneable way to submit work to a [`SerialExecutor`].
pub struct ExecutorHandle<S> {
    tx: Sender<Message<S>>,
    next_token: Arc<AtomicU64>,
    worker: ThreadId,
}

impl<S> Clone for ExecutorHandle<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            next_token: self.next_token.clone(),
            worker: self.worker,
        }
    }
}

impl<S: 'static> ExecutorHandle<S> {
    /// Queue `job`. Returns false once the executor has shut down, in which
    /// case the job (and anything it captured) is dropped.
    pub fn post(&self, job: impl FnOnce(&mut S) + Send + 'static) -> bool {
        self.tx.send(Message::Run(Box::new(job))).is_ok()
    }

    /// Queue `job` to run no earlier than `delay` from now.
    pub fn post_delayed(
        &self,
        delay: Duration,
        job: impl FnOnce(&mut S) + Send + 'static,
    ) -> TimerToken {
        let token = TimerToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        let _ = self.tx.send(Message::Delayed {
            due: Instant::now() + delay,
            token,
            job: Box::new(job),
        });
        token
    }

    /// Drop a delayed job that has not run yet. Unknown tokens are ignored.
    pub fn cancel(&self, token: TimerToken) {
        let _ = self.tx.send(Message::Cancel(token));
    }

    pub fn is_worker_thread(&self) -> bool {
        std::thread::current().id() == self.worker
    }
}

/// Single worker thread consuming a FIFO of jobs.
pub struct SerialExecutor<S> {
    handle: ExecutorHandle<S>,
    thread: Option<JoinHandle<()>>,
}

impl<S: Send + 'static> SerialExecutor<S> {
    /// Start the worker thread. `init` builds the state on the new thread
    /// from a handle to the executor itself.
    pub fn spawn(
        name: &str,
        init: impl FnOnce(ExecutorHandle<S>) -> S + Send + 'static,
    ) -> Result<Self, CameraError> {
        let (tx, rx) = unbounded();
        let next_token = Arc::new(AtomicU64::new(0));
        let (ready_tx, ready_rx) = bounded(1);

        let worker_tx = tx.clone();
        let worker_tokens = next_token.clone();
        let thread = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let handle = ExecutorHandle {
                    tx: worker_tx,
                    next_token: worker_tokens,
                    worker: std::thread::current().id(),
                };
                let _ = ready_tx.send(handle.worker);
                let state = init(handle);
                run_loop(state, rx);
            })
            .map_err(|e| CameraError::InitializationError(format!("spawn failed: {e}")))?;

        let worker = ready_rx
            .recv()
            .map_err(|_| CameraError::InitializationError("worker exited during startup".into()))?;

        log::debug!("executor '{name}' started");
        Ok(Self {
            handle: ExecutorHandle {
                tx,
                next_token,
                worker,
            },
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> ExecutorHandle<S> {
        self.handle.clone()
    }

    /// Stop after the jobs already queued and join the thread.
    /// Pending delayed jobs are dropped.
    pub fn shutdown(&mut self) {
        let _ = self.handle.tx.send(Message::Shutdown);
        if let Some(thread) = self.thread.take() {
            if self.handle.is_worker_thread() {
                return;
            }
            if thread.join().is_err() {
                log::error!("executor worker panicked");
            }
        }
    }
}

impl<S> Drop for SerialExecutor<S> {
    fn drop(&mut self) {
        let _ = self.handle.tx.send(Message::Shutdown);
        if let Some(thread) = self.thread.take() {
            if std::thread::current().id() != self.handle.worker && thread.join().is_err() {
                log::error!("executor worker panicked");
            }
        }
    }
}

fn run_loop<S>(mut state: S, rx: Receiver<Message<S>>) {
    let mut deadlines: BinaryHeap<Reverse<(Instant, u64)>> = BinaryHeap::new();
    let mut delayed: HashMap<u64, Job<S>> = HashMap::new();

    loop {
        let now = Instant::now();
        while let Some(Reverse((due, id))) = deadlines.peek().copied() {
            if due > now {
                break;
            }
            deadlines.pop();
            if let Some(job) = delayed.remove(&id) {
                job(&mut state);
            }
        }

        let message = match deadlines.peek() {
            Some(Reverse((due, _))) => match rx.recv_deadline(*due) {
                Ok(message) => message,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match rx.recv() {
                Ok(message) => message,
                Err(_) => break,
            },
        };

        match message {
            Message::Run(job) => job(&mut state),
            Message::Delayed { due, token, job } => {
                deadlines.push(Reverse((due, token.0)));
                delayed.insert(token.0, job);
            }
            Message::Cancel(token) => {
                delayed.remove(&token.0);
            }
            Message::Shutdown => break,
        }
    }
}

/// Resolving half of a one-shot completion signal.
///
/// Resolves on [`Completion::complete`] or, failing that, when dropped, so
/// a job that never runs still resolves its signal exactly once.
#[derive(Debug)]
pub struct Completion {
    tx: Option<Sender<()>>,
}

/// Waiting half of a one-shot completion signal.
#[derive(Debug, Clone)]
pub struct CompletionSignal {
    rx: Receiver<()>,
}

impl Completion {
    pub fn new() -> (Completion, CompletionSignal) {
        let (tx, rx) = bounded(1);
        (Completion { tx: Some(tx) }, CompletionSignal { rx })
    }

    pub fn complete(mut self) {
        self.resolve();
    }

    fn resolve(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        self.resolve();
    }
}

impl CompletionSignal {
    /// Block until resolved. Returns false if `timeout` elapsed first.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Ok(()) => true,
            Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => false,
        }
    }

    pub fn wait(&self) {
        let _ = self.rx.recv();
    }

    /// Non-blocking check. Consumes the resolution, which stays observable
    /// because the resolving half is gone afterwards.
    pub fn is_resolved(&self) -> bool {
        !matches!(self.rx.try_recv(), Err(TryRecvError::Empty))
    }
}

/// Run CPU-bound work off the serialized worker.
pub fn spawn_post_processing(
    name: &str,
    work: impl FnOnce() + Send + 'static,
) -> Result<JoinHandle<()>, CameraError> {
    std::thread::Builder::new()
        .name(name.to_string())
        .spawn(work)
        .map_err(|e| CameraError::InitializationError(format!("spawn failed: {e}")))
}
