//! Broker: attach, accept a pawn offer, wait for redemption
//!
//! ```text
//! Attach --attach--> Attaching --accept--> acceptPawn --accept_it--> WaitingForRedeem
//!   ^                    |
//!   +--attach_failed-----+
//! ```

use std::fmt;
use std::sync::{Arc, Mutex};

use pawnshop_types::{AcceptTerms, AtomicAmount, ContractInfo, ProgramDescriptor, Result, Role};
use serde::Serialize;
use tracing::info;

use crate::attach::{attach_role, Attachable};
use crate::config::MarketConfig;
use crate::gate::{PendingActionGate, PendingRequest, RequestId};
use crate::machine::{lock, Edge, RoleSession, RoleState, SessionView, TransitionLog};
use crate::session::{BrokerSteps, ContractSession, StepTable};

#[derive(Debug)]
pub enum BrokerState {
    Attach,
    Attaching { info: ContractInfo },
    AcceptPawn { request: PendingRequest<(), AcceptTerms> },
    WaitingForRedeem { terms: AcceptTerms },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BrokerStateTag {
    Attach,
    Attaching,
    #[serde(rename = "acceptPawn")]
    AcceptPawn,
    WaitingForRedeem,
}

impl fmt::Display for BrokerStateTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AcceptPawn => write!(f, "acceptPawn"),
            other => fmt::Debug::fmt(other, f),
        }
    }
}

impl RoleState for BrokerState {
    type Tag = BrokerStateTag;

    const ROLE: Role = Role::Broker;

    const EDGES: &'static [Edge<BrokerStateTag>] = &[
        (BrokerStateTag::Attach, "attach", BrokerStateTag::Attaching),
        (BrokerStateTag::Attaching, "attach_failed", BrokerStateTag::Attach),
        (BrokerStateTag::Attaching, "accept", BrokerStateTag::AcceptPawn),
        (BrokerStateTag::AcceptPawn, "accept_it", BrokerStateTag::WaitingForRedeem),
    ];

    fn tag(&self) -> BrokerStateTag {
        match self {
            Self::Attach => BrokerStateTag::Attach,
            Self::Attaching { .. } => BrokerStateTag::Attaching,
            Self::AcceptPawn { .. } => BrokerStateTag::AcceptPawn,
            Self::WaitingForRedeem { .. } => BrokerStateTag::WaitingForRedeem,
        }
    }

    fn payload(&self) -> serde_json::Value {
        match self {
            Self::Attach => serde_json::Value::Null,
            Self::Attaching { info } => serde_json::json!({ "contract": info }),
            Self::AcceptPawn { request } => serde_json::json!(request.data()),
            Self::WaitingForRedeem { terms } => serde_json::json!(terms),
        }
    }

    fn actions(&self) -> &'static [&'static str] {
        match self {
            Self::Attach => &["attach"],
            Self::AcceptPawn { request } if !request.is_settled() => &["accept_it"],
            _ => &[],
        }
    }

    fn pending_request(&self) -> Option<RequestId> {
        match self {
            Self::AcceptPawn { request } if !request.is_settled() => Some(request.id()),
            _ => None,
        }
    }
}

impl Attachable for BrokerState {
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

/// Broker role controller
#[derive(Clone)]
pub struct Broker {
    session: Arc<Mutex<RoleSession<BrokerState>>>,
    contracts: Arc<dyn ContractSession>,
    program: ProgramDescriptor,
}

impl Broker {
    pub fn new(contracts: Arc<dyn ContractSession>, config: &MarketConfig) -> Self {
        Self {
            session: Arc::new(Mutex::new(RoleSession::new(
                BrokerState::Attach,
                config.trace_max_entries,
            ))),
            contracts,
            program: ProgramDescriptor::pawnshop(),
        }
    }

    pub async fn attach(&self, blob: &str) -> Result<ContractInfo> {
        attach_role(
            &self.session,
            self.contracts.as_ref(),
            &self.program,
            blob,
            StepTable::Broker(Arc::new(self.step_handler())),
        )
        .await
    }

    pub fn step_handler(&self) -> BrokerStepHandler {
        BrokerStepHandler {
            session: self.session.clone(),
        }
    }

    /// Accept the buyer's pawn offer
    pub fn accept_it(&self) -> Result<()> {
        let mut session = lock(&self.session);
        session.ensure_live()?;
        let (terms, result) = match session.state_mut() {
            BrokerState::AcceptPawn { request } => {
                request.ensure_open()?;
                (*request.data(), request.resolve(()))
            }
            _ => return Err(session.reject("accept_it")),
        };
        session.settle(result)?;
        info!(id = %terms.id, pawn_price = %terms.pawn_price, "broker accepted pawn");
        session.advance("accept_it", BrokerState::WaitingForRedeem { terms })
    }

    /// Terms of the pawn under consideration or accepted
    pub fn terms(&self) -> Option<AcceptTerms> {
        match lock(&self.session).state() {
            BrokerState::AcceptPawn { request } => Some(*request.data()),
            BrokerState::WaitingForRedeem { terms } => Some(*terms),
            _ => None,
        }
    }

    pub fn tag(&self) -> BrokerStateTag {
        lock(&self.session).tag()
    }

    pub fn is_faulted(&self) -> bool {
        lock(&self.session).is_faulted()
    }

    pub fn view(&self) -> SessionView {
        lock(&self.session).view()
    }

    pub fn log(&self) -> TransitionLog<BrokerStateTag> {
        lock(&self.session).log().clone()
    }
}

#[derive(Clone)]
pub struct BrokerStepHandler {
    session: Arc<Mutex<RoleSession<BrokerState>>>,
}

#[async_trait::async_trait]
impl BrokerSteps for BrokerStepHandler {
    async fn accept(
        &self,
        id: AtomicAmount,
        pawn_price: AtomicAmount,
        redeem_price: AtomicAmount,
        end_date: AtomicAmount,
    ) -> Result<()> {
        let terms = AcceptTerms {
            id,
            pawn_price,
            redeem_price,
            end_date,
        };
        let (action, request) = PendingActionGate::open("accept", terms);
        lock(&self.session).enter_step("accept", BrokerState::AcceptPawn { request })?;
        action.await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalNetwork;

    fn amount(v: u64) -> AtomicAmount {
        AtomicAmount::new(v)
    }

    fn attached_broker() -> Broker {
        let broker = Broker::new(
            Arc::new(LocalNetwork::new(&MarketConfig::default()).wallet("broker")),
            &MarketConfig::default(),
        );
        let info = ContractInfo {
            network: "TestNet".to_string(),
            app_id: 1,
        };
        lock(&broker.session)
            .advance("attach", BrokerState::Attaching { info })
            .unwrap();
        broker
    }

    #[tokio::test]
    async fn test_accept_suspends_until_accept_it() {
        let broker = attached_broker();
        let handler = broker.step_handler();
        let step = tokio::spawn(async move {
            handler.accept(amount(1), amount(10), amount(12), amount(500)).await
        });

        while broker.tag() != BrokerStateTag::AcceptPawn {
            tokio::task::yield_now().await;
        }
        assert!(!step.is_finished());
        assert_eq!(broker.view().actions, vec!["accept_it"]);
        assert_eq!(broker.view().state, "acceptPawn");

        broker.accept_it().unwrap();
        step.await.unwrap().unwrap();
        assert_eq!(broker.tag(), BrokerStateTag::WaitingForRedeem);
        assert_eq!(broker.terms().map(|t| t.redeem_price), Some(amount(12)));
    }

    #[tokio::test]
    async fn test_second_accept_it_is_rejected() {
        let broker = attached_broker();
        let handler = broker.step_handler();
        let step = tokio::spawn(async move {
            handler.accept(amount(1), amount(10), amount(12), amount(500)).await
        });
        while broker.tag() != BrokerStateTag::AcceptPawn {
            tokio::task::yield_now().await;
        }
        broker.accept_it().unwrap();
        step.await.unwrap().unwrap();

        let err = broker.accept_it().unwrap_err();
        assert_eq!(err.error_code(), "INVALID_TRANSITION");
        assert!(!broker.is_faulted());
        assert_eq!(broker.log().entries.len(), 3);
    }

    #[tokio::test]
    async fn test_accept_it_after_step_abandoned() {
        let broker = attached_broker();
        let handler = broker.step_handler();
        let step = tokio::spawn(async move {
            handler.accept(amount(1), amount(10), amount(12), amount(500)).await
        });
        while broker.tag() != BrokerStateTag::AcceptPawn {
            tokio::task::yield_now().await;
        }
        step.abort();
        let _ = step.await;

        let err = broker.accept_it().unwrap_err();
        assert_eq!(err.error_code(), "CONTRACT_STEP");
        assert!(broker.view().actions.is_empty());
        assert!(broker.view().pending_request.is_none());

        let err = broker.accept_it().unwrap_err();
        assert_eq!(err.error_code(), "CONTRACT_STEP");
        assert!(!broker.is_faulted());
        assert_eq!(broker.tag(), BrokerStateTag::AcceptPawn);
    }

    #[test]
    fn test_accept_it_before_any_offer() {
        let broker = attached_broker();
        let err = broker.accept_it().unwrap_err();
        assert_eq!(err.error_code(), "INVALID_TRANSITION");
        assert_eq!(broker.tag(), BrokerStateTag::Attaching);
    }
}
