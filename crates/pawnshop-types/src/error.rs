//! Error types for the pawnshop marketplace
//!
//! Input and handoff errors are recoverable: the user is re-prompted and the
//! session stays where it was. A double resolution is a coordination bug and
//! faults the session that hit it.

use std::fmt;

use thiserror::Error;

use crate::Role;

/// Result type for pawnshop operations
pub type Result<T> = std::result::Result<T, PawnError>;

/// Pawnshop error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PawnError {
    // ========================================================================
    // User Errors
    // ========================================================================

    /// Malformed amount or date supplied to a local action
    #[error("Invalid input: {field} - {reason}")]
    InvalidInput { field: String, reason: String },

    /// Malformed contract handle blob supplied to attach
    #[error("Could not decode contract handle: {reason}")]
    HandoffDecode { reason: String },

    /// Local action not available in the current state
    #[error("{session} cannot {action} while in state {state}")]
    InvalidTransition {
        session: String,
        state: String,
        action: String,
    },

    // ========================================================================
    // Contract Errors
    // ========================================================================

    /// Deploy, attach or step submission rejected, or a step arrived out of sequence
    #[error("Contract step {step} failed: {reason}")]
    ContractStep { step: String, reason: String },

    // ========================================================================
    // Coordination Errors
    // ========================================================================

    /// A pending request was resolved a second time
    #[error("Pending request {request_id} for step {step} was already resolved")]
    DoubleResolution { request_id: String, step: String },

    /// The session hit a coordination fault earlier and refuses further work
    #[error("{role} session is faulted: {reason}")]
    SessionFaulted { role: Role, reason: String },

    /// Internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl PawnError {
    /// Create an invalid input error
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a contract step error
    pub fn contract_step(step: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ContractStep {
            step: step.into(),
            reason: reason.into(),
        }
    }

    /// Create a handoff decode error
    pub fn handoff_decode(reason: impl Into<String>) -> Self {
        Self::HandoffDecode {
            reason: reason.into(),
        }
    }

    /// Create an invalid transition error
    pub fn invalid_transition(
        session: impl fmt::Display,
        state: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self::InvalidTransition {
            session: session.to_string(),
            state: state.into(),
            action: action.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Attribute an invalid input error to `field`; other errors pass through
    pub fn for_field(self, field: impl Into<String>) -> Self {
        match self {
            Self::InvalidInput { reason, .. } => Self::invalid_input(field, reason),
            other => other,
        }
    }

    /// Whether the session can carry on after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput { .. }
                | Self::HandoffDecode { .. }
                | Self::InvalidTransition { .. }
                | Self::ContractStep { .. }
        )
    }

    /// Get an error code for display and logs
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "INVALID_INPUT",
            Self::HandoffDecode { .. } => "HANDOFF_DECODE",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::ContractStep { .. } => "CONTRACT_STEP",
            Self::DoubleResolution { .. } => "DOUBLE_RESOLUTION",
            Self::SessionFaulted { .. } => "SESSION_FAULTED",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

impl From<serde_json::Error> for PawnError {
    fn from(e: serde_json::Error) -> Self {
        PawnError::HandoffDecode {
            reason: e.to_string(),
        }
    }
}
