//! Commit gate
//!
//! A blocking storage task and the async caller waiting on it race to decide
//! the task's fate: the task must `try_commit` immediately before its single
//! mutating step, and the caller `try_abandon`s on timeout or cancellation.
//! Whoever arrives first wins, so a mutation never lands after the caller
//! was told it failed.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    Pending,
    Committed,
    Abandoned,
}

#[derive(Debug)]
pub struct CommitGate {
    state: Mutex<GateState>,
}

impl CommitGate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState::Pending),
        }
    }

    /// Claim the right to mutate. False if the caller already gave up.
    pub fn try_commit(&self) -> bool {
        let mut state = self.state.lock();
        match *state {
            GateState::Pending => {
                *state = GateState::Committed;
                true
            }
            GateState::Committed => true,
            GateState::Abandoned => false,
        }
    }

    /// Give up on the task. False if it already committed and must be awaited.
    pub fn try_abandon(&self) -> bool {
        let mut state = self.state.lock();
        match *state {
            GateState::Pending => {
                *state = GateState::Abandoned;
                true
            }
            GateState::Committed => false,
            GateState::Abandoned => true,
        }
    }

    pub fn is_committed(&self) -> bool {
        *self.state.lock() == GateState::Committed
    }
}

impl Default for CommitGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Abandons the gate when dropped, unless the task already committed.
///
/// Held by the async side; dropping the request future drops this guard.
pub struct AbandonOnDrop(pub Arc<CommitGate>);

impl Drop for AbandonOnDrop {
    fn drop(&mut self) {
        self.0.try_abandon();
    }
}

/// Why a gated blocking task produced no value.
#[derive(Debug)]
pub enum GateError {
    /// The deadline passed before the task committed; it will not commit now.
    TimedOut,
    /// The task panicked or was cancelled by the runtime.
    Failed(JoinError),
}

/// Run `op` on the blocking pool with a deadline.
///
/// If the deadline passes before `op` commits, the gate is abandoned and
/// `TimedOut` is returned. If `op` already committed, its result is awaited
/// and returned regardless of the deadline. Dropping the returned future
/// abandons the gate as well.
pub async fn run_gated<T, F>(timeout: Duration, op: F) -> Result<T, GateError>
where
    T: Send + 'static,
    F: FnOnce(&CommitGate) -> T + Send + 'static,
{
    let gate = Arc::new(CommitGate::new());
    let _abandon = AbandonOnDrop(Arc::clone(&gate));
    let task_gate = Arc::clone(&gate);

    let mut handle = tokio::task::spawn_blocking(move || op(&task_gate));

    match tokio::time::timeout(timeout, &mut handle).await {
        Ok(joined) => joined.map_err(GateError::Failed),
        Err(_) if gate.try_abandon() => Err(GateError::TimedOut),
        Err(_) => handle.await.map_err(GateError::Failed),
    }
}
