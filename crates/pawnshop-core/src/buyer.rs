//! Buyer: attach, then answer the buy, pawn and redeem steps
//!
//! ```text
//! Attach --attach--> Attaching --buy--> BuyNFT --buy_it--> BuyNFT
//!   ^                    |  |              |
//!   +--attach_failed-----+  +--pawn--> Pawn <--pawn--+
//!                                       |
//!                                    pawn_it
//!                                       v
//!                                 WaitingForPawn --redeem--> Redeem --redeem_it--> RedeemSuccess
//! ```
//!
//! `buy`, `pawn` and `redeem` are invoked by the contract layer. Each opens a
//! gate, parks the request in the state and suspends until the matching
//! local action resolves it.

use std::fmt;
use std::sync::{Arc, Mutex};

use pawnshop_types::{
    AtomicAmount, BuyTerms, ContractInfo, Currency, PawnOffer, PawnError, ProgramDescriptor,
    RedeemTerms, Result, Role,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::attach::{attach_role, Attachable};
use crate::config::MarketConfig;
use crate::gate::{PendingActionGate, PendingRequest, RequestId};
use crate::machine::{lock, Edge, RoleSession, RoleState, SessionView, TransitionLog};
use crate::session::{AccountSession, BuyerSteps, ContractSession, StepTable};

/// What the buyer sees while deciding on pawn terms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PawnPrompt {
    /// Network time when the contract asked; the end date must lie after it
    pub chain_time: AtomicAmount,
}

#[derive(Debug)]
pub enum BuyerState {
    Attach,
    Attaching {
        info: ContractInfo,
    },
    BuyNft {
        request: PendingRequest<(), BuyTerms>,
    },
    Pawn {
        request: PendingRequest<PawnOffer, PawnPrompt>,
    },
    WaitingForPawn {
        offer: PawnOffer,
    },
    Redeem {
        offer: PawnOffer,
        request: PendingRequest<(), RedeemTerms>,
    },
    RedeemSuccess {
        id: AtomicAmount,
        offer: PawnOffer,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BuyerStateTag {
    Attach,
    Attaching,
    #[serde(rename = "BuyNFT")]
    BuyNft,
    Pawn,
    WaitingForPawn,
    Redeem,
    RedeemSuccess,
}

impl fmt::Display for BuyerStateTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BuyNft => write!(f, "BuyNFT"),
            other => fmt::Debug::fmt(other, f),
        }
    }
}

impl RoleState for BuyerState {
    type Tag = BuyerStateTag;

    const ROLE: Role = Role::Buyer;

    const EDGES: &'static [Edge<BuyerStateTag>] = &[
        (BuyerStateTag::Attach, "attach", BuyerStateTag::Attaching),
        (BuyerStateTag::Attaching, "attach_failed", BuyerStateTag::Attach),
        (BuyerStateTag::Attaching, "buy", BuyerStateTag::BuyNft),
        (BuyerStateTag::Attaching, "pawn", BuyerStateTag::Pawn),
        (BuyerStateTag::BuyNft, "buy_it", BuyerStateTag::BuyNft),
        (BuyerStateTag::BuyNft, "pawn", BuyerStateTag::Pawn),
        (BuyerStateTag::Pawn, "pawn_it", BuyerStateTag::WaitingForPawn),
        (BuyerStateTag::WaitingForPawn, "redeem", BuyerStateTag::Redeem),
        (BuyerStateTag::Redeem, "redeem_it", BuyerStateTag::RedeemSuccess),
    ];

    fn tag(&self) -> BuyerStateTag {
        match self {
            Self::Attach => BuyerStateTag::Attach,
            Self::Attaching { .. } => BuyerStateTag::Attaching,
            Self::BuyNft { .. } => BuyerStateTag::BuyNft,
            Self::Pawn { .. } => BuyerStateTag::Pawn,
            Self::WaitingForPawn { .. } => BuyerStateTag::WaitingForPawn,
            Self::Redeem { .. } => BuyerStateTag::Redeem,
            Self::RedeemSuccess { .. } => BuyerStateTag::RedeemSuccess,
        }
    }

    fn payload(&self) -> serde_json::Value {
        use serde_json::json;
        match self {
            Self::Attach => serde_json::Value::Null,
            Self::Attaching { info } => json!({ "contract": info }),
            Self::BuyNft { request } => {
                let terms = request.data();
                json!({ "id": terms.id, "price": terms.price, "bought": request.is_settled() })
            }
            Self::Pawn { request } => json!({ "chain_time": request.data().chain_time }),
            Self::WaitingForPawn { offer } => json!(offer),
            Self::Redeem { request, .. } => json!(request.data()),
            Self::RedeemSuccess { id, .. } => json!({ "id": id }),
        }
    }

    fn actions(&self) -> &'static [&'static str] {
        match self {
            Self::Attach => &["attach"],
            Self::BuyNft { request } if !request.is_settled() => &["buy_it"],
            Self::Pawn { request } if !request.is_settled() => &["pawn_it"],
            Self::Redeem { request, .. } if !request.is_settled() => &["redeem_it"],
            _ => &[],
        }
    }

    fn pending_request(&self) -> Option<RequestId> {
        let unresolved = |settled: bool, id: RequestId| (!settled).then_some(id);
        match self {
            Self::BuyNft { request } => unresolved(request.is_settled(), request.id()),
            Self::Pawn { request } => unresolved(request.is_settled(), request.id()),
            Self::Redeem { request, .. } => unresolved(request.is_settled(), request.id()),
            _ => None,
        }
    }
}

impl Attachable for BuyerState {
    fn is_attach(&self) -> bool {
        matches!(self, Self::Attach)
    }

    fn attach() -> Self {
        Self::Attach
    }

    fn attaching(info: ContractInfo) -> Self {
        Self::Attaching { info }
    }
}

/// Buyer role controller
#[derive(Clone)]
pub struct Buyer {
    session: Arc<Mutex<RoleSession<BuyerState>>>,
    contracts: Arc<dyn ContractSession>,
    accounts: Arc<dyn AccountSession>,
    program: ProgramDescriptor,
    currency: Currency,
}

impl Buyer {
    pub fn new(
        contracts: Arc<dyn ContractSession>,
        accounts: Arc<dyn AccountSession>,
        config: &MarketConfig,
    ) -> Self {
        Self {
            session: Arc::new(Mutex::new(RoleSession::new(
                BuyerState::Attach,
                config.trace_max_entries,
            ))),
            contracts,
            accounts,
            program: ProgramDescriptor::pawnshop(),
            currency: config.currency(),
        }
    }

    /// Attach to the creator's contract from a pasted handoff blob
    pub async fn attach(&self, blob: &str) -> Result<ContractInfo> {
        attach_role(
            &self.session,
            self.contracts.as_ref(),
            &self.program,
            blob,
            StepTable::Buyer(Arc::new(self.step_handler())),
        )
        .await
    }

    /// The step table the contract layer drives
    pub fn step_handler(&self) -> BuyerStepHandler {
        BuyerStepHandler {
            session: self.session.clone(),
            accounts: self.accounts.clone(),
        }
    }

    /// Accept the offered purchase
    pub fn buy_it(&self) -> Result<()> {
        let mut session = lock(&self.session);
        session.ensure_live()?;
        let result = match session.state_mut() {
            BuyerState::BuyNft { request } => request.resolve(()),
            _ => return Err(session.reject("buy_it")),
        };
        session.settle(result)?;
        info!("buyer confirmed purchase");
        session.touch("buy_it")
    }

    /// Offer the asset for pawn.
    ///
    /// The redeem price must exceed the pawn price and the end date must be
    /// later than the network time at which the contract asked. Bad input
    /// leaves the session in `Pawn`.
    pub fn pawn_it(&self, pawn_price: &str, redeem_price: &str, end_date: &str) -> Result<()> {
        let mut session = lock(&self.session);
        session.ensure_live()?;
        let (offer, result) = match session.state_mut() {
            BuyerState::Pawn { request } => {
                request.ensure_open()?;
                let offer = PawnOffer::parse(
                    &self.currency,
                    pawn_price,
                    redeem_price,
                    end_date,
                    request.data().chain_time,
                )?;
                (offer, request.resolve(offer))
            }
            _ => return Err(session.reject("pawn_it")),
        };
        session.settle(result)?;
        info!(pawn_price = %offer.pawn_price, redeem_price = %offer.redeem_price, "buyer offered pawn");
        session.advance("pawn_it", BuyerState::WaitingForPawn { offer })
    }

    /// Redeem the pawned asset `id`.
    ///
    /// Refused with a contract step error once the redeem step is gone.
    pub fn redeem_it(&self, id: AtomicAmount) -> Result<()> {
        let mut session = lock(&self.session);
        session.ensure_live()?;
        let (offer, result) = match session.state_mut() {
            BuyerState::Redeem { offer, request } => {
                request.ensure_open()?;
                if request.data().id != id {
                    return Err(PawnError::invalid_input(
                        "id",
                        format!("asset {} is not the one up for redemption", id),
                    ));
                }
                (*offer, request.resolve(()))
            }
            _ => return Err(session.reject("redeem_it")),
        };
        session.settle(result)?;
        info!(%id, "buyer redeemed asset");
        session.advance("redeem_it", BuyerState::RedeemSuccess { id, offer })
    }

    /// The buyer's pawn terms, once offered
    pub fn pawn_offer(&self) -> Option<PawnOffer> {
        match lock(&self.session).state() {
            BuyerState::WaitingForPawn { offer }
            | BuyerState::Redeem { offer, .. }
            | BuyerState::RedeemSuccess { offer, .. } => Some(*offer),
            _ => None,
        }
    }

    pub fn tag(&self) -> BuyerStateTag {
        lock(&self.session).tag()
    }

    pub fn is_faulted(&self) -> bool {
        lock(&self.session).is_faulted()
    }

    pub fn view(&self) -> SessionView {
        lock(&self.session).view()
    }

    pub fn log(&self) -> TransitionLog<BuyerStateTag> {
        lock(&self.session).log().clone()
    }
}

/// What the contract layer holds for the buyer
#[derive(Clone)]
pub struct BuyerStepHandler {
    session: Arc<Mutex<RoleSession<BuyerState>>>,
    accounts: Arc<dyn AccountSession>,
}

#[async_trait::async_trait]
impl BuyerSteps for BuyerStepHandler {
    async fn buy(&self, id: AtomicAmount, price: AtomicAmount) -> Result<()> {
        let (action, request) = PendingActionGate::open("buy", BuyTerms { id, price });
        lock(&self.session).enter_step("buy", BuyerState::BuyNft { request })?;
        action.await
    }

    async fn pawn(&self) -> Result<PawnOffer> {
        let chain_time = self.accounts.network_time().await?;
        let (action, request) = PendingActionGate::open("pawn", PawnPrompt { chain_time });
        lock(&self.session).enter_step("pawn", BuyerState::Pawn { request })?;
        action.await
    }

    async fn redeem(
        &self,
        id: AtomicAmount,
        redeem_price: AtomicAmount,
        end_date: AtomicAmount,
    ) -> Result<()> {
        let terms = RedeemTerms {
            id,
            redeem_price,
            end_date,
        };
        let (action, request) = PendingActionGate::open("redeem", terms);
        {
            let mut session = lock(&self.session);
            let offer = match session.state() {
                BuyerState::WaitingForPawn { offer } => *offer,
                other => {
                    return Err(PawnError::contract_step(
                        "redeem",
                        format!("buyer cannot redeem in state {}", other.tag()),
                    ))
                }
            };
            session.enter_step("redeem", BuyerState::Redeem { offer, request })?;
        }
        action.await
    }
}
