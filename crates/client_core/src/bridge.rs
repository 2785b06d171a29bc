//! Runs client requests on the tokio runtime and hands their results back
//! to the interactive thread, which applies them with [`Bridge::drain`].

use std::{
    future::Future,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use shared::error::SyncError;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestPolicy {
    pub timeout: Duration,
}

impl Default for RequestPolicy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Awaits `fut` unless `cancel` fires or the policy's timeout elapses first.
pub async fn run_guarded<F, T>(
    policy: RequestPolicy,
    cancel: &CancellationToken,
    fut: F,
) -> Result<T, SyncError>
where
    F: Future<Output = Result<T, SyncError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SyncError::Cancelled),
        outcome = tokio::time::timeout(policy.timeout, fut) => match outcome {
            Ok(result) => result,
            Err(_) => Err(SyncError::TimedOut(
                u64::try_from(policy.timeout.as_millis()).unwrap_or(u64::MAX),
            )),
        },
    }
}

#[derive(Debug, Clone)]
pub struct RequestHandle {
    id: u64,
    label: &'static str,
    cancel: CancellationToken,
}

impl RequestHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

type Completion<S> = Box<dyn FnOnce(&mut S) + Send>;

/// `S` is state owned by the interactive thread. Completions only touch it
/// inside [`Bridge::drain`] or [`Bridge::wait_one`], on the caller's thread.
pub struct Bridge<S: 'static> {
    runtime: Handle,
    policy: RequestPolicy,
    tx: Sender<Completion<S>>,
    rx: Receiver<Completion<S>>,
    next_id: AtomicU64,
}

impl<S: 'static> Bridge<S> {
    pub fn new(runtime: Handle, policy: RequestPolicy) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            runtime,
            policy,
            tx,
            rx,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn policy(&self) -> RequestPolicy {
        self.policy
    }

    /// Spawns `fut` off the interactive thread. `apply` runs later on the
    /// interactive thread with the outcome, including `Cancelled` and
    /// `TimedOut`.
    pub fn submit<F, T, A>(&self, label: &'static str, fut: F, apply: A) -> RequestHandle
    where
        F: Future<Output = Result<T, SyncError>> + Send + 'static,
        T: Send + 'static,
        A: FnOnce(&mut S, Result<T, SyncError>) + Send + 'static,
    {
        let handle = RequestHandle {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            label,
            cancel: CancellationToken::new(),
        };

        let policy = self.policy;
        let cancel = handle.cancel.clone();
        let tx = self.tx.clone();
        let request_id = handle.id;
        self.runtime.spawn(async move {
            let outcome = run_guarded(policy, &cancel, fut).await;
            if let Err(err) = &outcome {
                debug!(request_id, label, "request finished with error: {err}");
            }
            let completion: Completion<S> = Box::new(move |state| apply(state, outcome));
            if tx.send(completion).is_err() {
                warn!(request_id, label, "interactive thread gone; dropping result");
            }
        });

        debug!(request_id = handle.id, label, "request submitted");
        handle
    }

    /// Applies every completion that has arrived. Never blocks.
    pub fn drain(&self, state: &mut S) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.rx.try_recv() {
            completion(state);
            applied += 1;
        }
        applied
    }

    /// Blocks the calling thread until one completion arrives or `timeout`
    /// passes; returns whether one was applied.
    pub fn wait_one(&self, state: &mut S, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Ok(completion) => {
                completion(state);
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }
}

#[cfg(test)]
#[path = "tests/bridge_tests.rs"]
mod tests;
