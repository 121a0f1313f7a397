//! Role session: explicit state, declared edges, transition log
//!
//! Each role's state is a closed enum implementing [`RoleState`]. A
//! [`RoleSession`] owns that state and is the only thing allowed to replace
//! it: every replacement must match one of the role's declared
//! `(from, action, to)` edges, and is logged.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use pawnshop_types::{PawnError, Result, Role};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::gate::RequestId;

/// Declared transition: `(from, action, to)`
pub type Edge<T> = (T, &'static str, T);

/// A role's closed state set
pub trait RoleState: Send + 'static {
    type Tag: Copy + Eq + fmt::Debug + fmt::Display + Serialize + Send + 'static;

    const ROLE: Role;

    /// Every edge this role may take. Step names and local action names share
    /// the action column.
    const EDGES: &'static [Edge<Self::Tag>];

    fn tag(&self) -> Self::Tag;

    /// Data the rendering layer shows for this state
    fn payload(&self) -> serde_json::Value;

    /// Local actions callable in this state
    fn actions(&self) -> &'static [&'static str];

    /// The request a step handler is waiting on, if it is still unresolved
    fn pending_request(&self) -> Option<RequestId>;
}

#[derive(Debug, Clone, Serialize)]
pub struct Transition<T> {
    pub timestamp: DateTime<Utc>,
    pub from: T,
    pub action: &'static str,
    pub to: T,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransitionLog<T> {
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub entries: Vec<Transition<T>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_entries: Option<usize>,
}

impl<T: Copy + PartialEq> TransitionLog<T> {
    pub fn new(role: Role, max_entries: Option<usize>) -> Self {
        Self {
            role,
            created_at: Utc::now(),
            entries: Vec::new(),
            max_entries,
        }
    }

    pub fn record(&mut self, from: T, action: &'static str, to: T) {
        self.entries.push(Transition {
            timestamp: Utc::now(),
            from,
            action,
            to,
        });
        if let Some(max) = self.max_entries {
            if self.entries.len() > max {
                let overflow = self.entries.len() - max;
                self.entries.drain(0..overflow);
            }
        }
    }

    /// `(from, action, to)` triples in order
    pub fn edges(&self) -> impl Iterator<Item = Edge<T>> + '_ {
        self.entries.iter().map(|t| (t.from, t.action, t.to))
    }

    /// Whether two logs took the same path, ignoring timestamps
    pub fn is_replayable_with(&self, other: &TransitionLog<T>) -> bool {
        self.entries.len() == other.entries.len() && self.edges().eq(other.edges())
    }
}

/// What a rendering layer needs to draw a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub role: Role,
    pub state: String,
    pub payload: serde_json::Value,
    pub actions: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_request: Option<RequestId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<String>,
}

pub struct RoleSession<S: RoleState> {
    state: S,
    log: TransitionLog<S::Tag>,
    fault: Option<String>,
}

impl<S: RoleState> RoleSession<S> {
    pub fn new(initial: S, max_entries: Option<usize>) -> Self {
        Self {
            state: initial,
            log: TransitionLog::new(S::ROLE, max_entries),
            fault: None,
        }
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    /// Mutable access for resolving a request in place. Replacing the state
    /// goes through [`RoleSession::advance`].
    pub fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    pub fn tag(&self) -> S::Tag {
        self.state.tag()
    }

    pub fn log(&self) -> &TransitionLog<S::Tag> {
        &self.log
    }

    pub fn is_faulted(&self) -> bool {
        self.fault.is_some()
    }

    pub fn ensure_live(&self) -> Result<()> {
        match &self.fault {
            Some(reason) => Err(PawnError::SessionFaulted {
                role: S::ROLE,
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Error for a local action the current state does not offer
    pub fn reject(&self, action: &str) -> PawnError {
        PawnError::invalid_transition(S::ROLE, self.tag().to_string(), action)
    }

    /// Replace the state along a declared edge.
    pub fn advance(&mut self, action: &'static str, next: S) -> Result<()> {
        self.ensure_live()?;
        let (from, to) = (self.state.tag(), next.tag());
        if !S::EDGES.contains(&(from, action, to)) {
            return Err(PawnError::internal(format!(
                "{} has no edge {} --{}--> {}",
                S::ROLE,
                from,
                action,
                to
            )));
        }
        self.state = next;
        self.log.record(from, action, to);
        debug!(role = %S::ROLE, %from, action, %to, "transition");
        Ok(())
    }

    /// Record a declared self-loop without replacing the state.
    pub fn touch(&mut self, action: &'static str) -> Result<()> {
        self.ensure_live()?;
        let tag = self.state.tag();
        if !S::EDGES.contains(&(tag, action, tag)) {
            return Err(PawnError::internal(format!(
                "{} has no edge {} --{}--> {}",
                S::ROLE,
                tag,
                action,
                tag
            )));
        }
        self.log.record(tag, action, tag);
        debug!(role = %S::ROLE, state = %tag, action, "transition");
        Ok(())
    }

    /// Enter a state on behalf of a contract-invoked step.
    ///
    /// Rejects the step with a contract step error when an earlier request is
    /// still unresolved or when the step is out of sequence; the state is left
    /// untouched in both cases.
    pub fn enter_step(&mut self, step: &'static str, next: S) -> Result<()> {
        self.ensure_live()?;
        if let Some(id) = self.state.pending_request() {
            warn!(role = %S::ROLE, step, pending = %id, "step invoked while a request is pending");
            return Err(PawnError::contract_step(
                step,
                format!("request {} is still awaiting resolution", id),
            ));
        }
        let (from, to) = (self.state.tag(), next.tag());
        if !S::EDGES.contains(&(from, step, to)) {
            warn!(role = %S::ROLE, step, state = %from, "step invoked out of sequence");
            return Err(PawnError::contract_step(
                step,
                format!("{} cannot take step {} in state {}", S::ROLE, step, from),
            ));
        }
        self.advance(step, next)
    }

    /// Pass a resolution result through, faulting the session on a double
    /// resolution.
    pub fn settle(&mut self, result: Result<()>) -> Result<()> {
        if let Err(err @ PawnError::DoubleResolution { .. }) = &result {
            error!(role = %S::ROLE, error = %err, "session faulted");
            self.fault = Some(err.to_string());
        }
        result
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            role: S::ROLE,
            state: self.tag().to_string(),
            payload: self.state.payload(),
            actions: if self.is_faulted() {
                Vec::new()
            } else {
                self.state.actions().to_vec()
            },
            pending_request: self.state.pending_request(),
            fault: self.fault.clone(),
        }
    }
}

/// Lock a session shared between a controller and its step handlers.
///
/// A poisoned lock still holds a consistent state: every mutation is a single
/// assignment made after all checks passed.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
