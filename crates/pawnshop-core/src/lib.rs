//! Pawnshop Core - role coordination for the three-role pawn marketplace
//!
//! Each role (creator, buyer, broker) runs a private state machine. Local
//! user actions move it directly; protocol steps arrive from the contract
//! layer as async calls that park a [`PendingRequest`] in the role's state
//! and suspend until the matching local action resolves it exactly once.
//!
//! [`LocalNetwork`] is an in-memory contract and account layer that drives
//! the full protocol for tests and the CLI demo.

pub mod app;
mod attach;
pub mod broker;
pub mod buyer;
pub mod config;
pub mod creator;
pub mod gate;
pub mod local;
pub mod machine;
pub mod session;

pub use app::{AccountSummary, AppSession, AppState};
pub use broker::{Broker, BrokerState, BrokerStateTag, BrokerStepHandler};
pub use buyer::{Buyer, BuyerState, BuyerStateTag, BuyerStepHandler, PawnPrompt};
pub use config::MarketConfig;
pub use creator::{Creator, CreatorState, CreatorStateTag, Deployment};
pub use gate::{PendingAction, PendingActionGate, PendingRequest, RequestId};
pub use local::{EventRecord, LocalNetwork, LocalWallet, ProtocolEvent};
pub use machine::{Edge, RoleSession, RoleState, SessionView, Transition, TransitionLog};
pub use session::{
    Account, AccountSession, BrokerSteps, BuyerSteps, ContractSession, CreatorSteps, StepTable,
};

pub use pawnshop_types as types;
