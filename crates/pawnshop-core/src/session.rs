//! Collaborator interfaces: the contract-execution layer and the account layer
//!
//! The coordination core never talks to a chain directly. It deploys or
//! attaches through a [`ContractSession`], hands the session a role's
//! [`StepTable`], and from then on the contract layer calls back into the
//! role, one step at a time.

use std::fmt;
use std::sync::Arc;

use pawnshop_types::{
    AtomicAmount, ContractHandle, ContractInfo, Listing, PawnOffer, ProgramDescriptor, Result,
    Role,
};
use serde::{Deserialize, Serialize};

/// Account address on the network
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Account(pub String);

impl Account {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Contract-execution layer, scoped to one connected account
#[async_trait::async_trait]
pub trait ContractSession: Send + Sync {
    /// Start deploying a new contract instance
    async fn deploy(&self, program: &ProgramDescriptor) -> Result<ContractHandle>;

    /// Attach to a contract another role deployed
    async fn attach(&self, program: &ProgramDescriptor, info: &ContractInfo) -> Result<ContractHandle>;

    /// Wait for the contract to be confirmed and return its shareable info
    async fn get_info(&self, handle: &ContractHandle) -> Result<ContractInfo>;

    /// Wire a role's step handlers to the contract's protocol steps
    async fn register_steps(&self, handle: &ContractHandle, steps: StepTable) -> Result<()>;
}

/// Wallet and network queries
#[async_trait::async_trait]
pub trait AccountSession: Send + Sync {
    async fn default_account(&self) -> Result<Account>;

    async fn balance_of(&self, account: &Account) -> Result<AtomicAmount>;

    async fn can_fund_from_faucet(&self) -> Result<bool>;

    async fn fund_from_faucet(&self, account: &Account, amount: AtomicAmount) -> Result<()>;

    /// Current network time (round number)
    async fn network_time(&self) -> Result<AtomicAmount>;

    /// Ignore contract events older than `time`
    async fn set_query_lower_bound(&self, time: AtomicAmount) -> Result<()>;
}

/// Steps the contract invokes on the creator
#[async_trait::async_trait]
pub trait CreatorSteps: Send + Sync {
    /// Read the listing once deployment has begun
    async fn listing(&self) -> Result<Listing>;
}

/// Steps the contract invokes on the buyer
#[async_trait::async_trait]
pub trait BuyerSteps: Send + Sync {
    /// Offer the listed asset; resolves when the buyer decides to buy
    async fn buy(&self, id: AtomicAmount, price: AtomicAmount) -> Result<()>;

    /// Ask for pawn terms; resolves with the buyer's offer
    async fn pawn(&self) -> Result<PawnOffer>;

    /// Offer redemption of the pawned asset; resolves when the buyer redeems
    async fn redeem(
        &self,
        id: AtomicAmount,
        redeem_price: AtomicAmount,
        end_date: AtomicAmount,
    ) -> Result<()>;

    /// Placeholder clock. Not a source of chain time; deadlines are enforced
    /// by the contract layer.
    fn current_date(&self) -> AtomicAmount {
        AtomicAmount::ZERO
    }
}

/// Steps the contract invokes on the broker
#[async_trait::async_trait]
pub trait BrokerSteps: Send + Sync {
    /// Present a pawn offer; resolves when the broker accepts
    async fn accept(
        &self,
        id: AtomicAmount,
        pawn_price: AtomicAmount,
        redeem_price: AtomicAmount,
        end_date: AtomicAmount,
    ) -> Result<()>;
}

/// A role's step handlers, as registered with the contract layer
#[derive(Clone)]
pub enum StepTable {
    Creator(Arc<dyn CreatorSteps>),
    Buyer(Arc<dyn BuyerSteps>),
    Broker(Arc<dyn BrokerSteps>),
}

impl StepTable {
    pub fn role(&self) -> Role {
        match self {
            Self::Creator(_) => Role::Creator,
            Self::Buyer(_) => Role::Buyer,
            Self::Broker(_) => Role::Broker,
        }
    }

    /// Names of the protocol steps this table answers
    pub fn step_names(&self) -> &'static [&'static str] {
        match self {
            Self::Creator(_) => &["listing"],
            Self::Buyer(_) => &["buy", "pawn", "redeem"],
            Self::Broker(_) => &["accept"],
        }
    }
}

impl fmt::Debug for StepTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepTable")
            .field("role", &self.role())
            .field("steps", &self.step_names())
            .finish()
    }
}
