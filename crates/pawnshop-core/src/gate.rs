//! Single-use gate between a suspended contract step and a local decision
//!
//! [`PendingActionGate::open`] hands out two halves: a [`PendingAction`] the
//! step handler awaits, and a [`PendingRequest`] the role session keeps until
//! the user acts. The request resolves at most once; the second attempt is a
//! [`PawnError::DoubleResolution`] and leaves the delivered value untouched.
//!
//! The gate is a `tokio::sync::oneshot` underneath, which does not need a
//! tokio runtime: the action can be awaited on any executor or waited on from
//! a plain thread with [`PendingAction::blocking_wait`].

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use pawnshop_types::{PawnError, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use uuid::Uuid;

/// Identifier of one pending request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req_{}", self.0)
    }
}

pub struct PendingActionGate;

impl PendingActionGate {
    /// Open a gate for `step`, carrying `data` for the rendering layer.
    pub fn open<T, D>(step: &'static str, data: D) -> (PendingAction<T>, PendingRequest<T, D>) {
        let (sender, receiver) = oneshot::channel();
        let id = RequestId::new();
        (
            PendingAction {
                id,
                step,
                receiver,
            },
            PendingRequest {
                id,
                step,
                data,
                sender: Some(sender),
                opened_at: Utc::now(),
            },
        )
    }
}

/// The awaiting half, held by the suspended step handler.
///
/// Completes with the resolved value, or with a contract step error when the
/// request is dropped unresolved (the session was torn down).
#[must_use = "a pending action does nothing unless awaited"]
pub struct PendingAction<T> {
    id: RequestId,
    step: &'static str,
    receiver: oneshot::Receiver<T>,
}

impl<T> PendingAction<T> {
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Block the current thread until the request resolves.
    ///
    /// Panics when called from inside an async runtime, like
    /// `oneshot::Receiver::blocking_recv`.
    pub fn blocking_wait(self) -> Result<T> {
        let PendingAction { id, step, receiver } = self;
        receiver.blocking_recv().map_err(|_| abandoned(step, id))
    }
}

impl<T> Future for PendingAction<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let (step, id) = (this.step, this.id);
        Pin::new(&mut this.receiver)
            .poll(cx)
            .map(|res| res.map_err(|_| abandoned(step, id)))
    }
}

impl<T> fmt::Debug for PendingAction<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingAction")
            .field("id", &self.id)
            .field("step", &self.step)
            .finish()
    }
}

/// The resolving half, stored in a role session's state payload.
pub struct PendingRequest<T, D> {
    id: RequestId,
    step: &'static str,
    data: D,
    sender: Option<oneshot::Sender<T>>,
    opened_at: DateTime<Utc>,
}

impl<T, D> PendingRequest<T, D> {
    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn step(&self) -> &'static str {
        self.step
    }

    pub fn data(&self) -> &D {
        &self.data
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    /// Whether a resolution has already been attempted
    pub fn is_settled(&self) -> bool {
        self.sender.is_none()
    }

    /// Contract step error if a resolution was already attempted, so a local
    /// action can refuse instead of resolving twice
    pub fn ensure_open(&self) -> Result<()> {
        if self.is_settled() {
            return Err(PawnError::contract_step(
                self.step,
                format!("request {} is no longer awaiting a decision", self.id),
            ));
        }
        Ok(())
    }

    /// Deliver `value` to the awaiting step handler.
    ///
    /// Fails with `DoubleResolution` if called again, and with a contract
    /// step error if the awaiting side is gone. Either way the request counts
    /// as settled afterwards.
    pub fn resolve(&mut self, value: T) -> Result<()> {
        let sender = self.sender.take().ok_or_else(|| PawnError::DoubleResolution {
            request_id: self.id.to_string(),
            step: self.step.to_string(),
        })?;
        sender.send(value).map_err(|_| abandoned(self.step, self.id))
    }
}

impl<T, D: fmt::Debug> fmt::Debug for PendingRequest<T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingRequest")
            .field("id", &self.id)
            .field("step", &self.step)
            .field("data", &self.data)
            .field("settled", &self.is_settled())
            .finish()
    }
}

fn abandoned(step: &str, id: RequestId) -> PawnError {
    PawnError::contract_step(step, format!("request {} abandoned before resolution", id))
}
