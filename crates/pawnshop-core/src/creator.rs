//! Creator: fill in the listing, deploy, hand the contract info out
//!
//! ```text
//! SetInfo --set_info--> Deploy --deploy--> Deploying --deployed--> WaitingForAttacher
//!                          ^                   |
//!                          +---deploy_failed---+
//! ```

use std::fmt;
use std::sync::{Arc, Mutex};

use pawnshop_types::{
    ContractHandle, ContractInfo, Currency, HandoffCodec, Listing, PawnError, ProgramDescriptor, Result, Role,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::MarketConfig;
use crate::gate::RequestId;
use crate::machine::{lock, Edge, RoleSession, RoleState, SessionView, TransitionLog};
use crate::session::{ContractSession, CreatorSteps, StepTable};

/// A contract left behind by an interrupted deploy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub handle: ContractHandle,
    pub steps_registered: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreatorState {
    SetInfo,
    /// Ready to deploy. `contract` is set when a previous attempt got far
    /// enough to create one; the next attempt picks it up.
    Deploy {
        listing: Listing,
        contract: Option<Deployment>,
    },
    Deploying {
        listing: Listing,
    },
    WaitingForAttacher {
        listing: Listing,
        info: ContractInfo,
        handoff: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CreatorStateTag {
    SetInfo,
    Deploy,
    Deploying,
    WaitingForAttacher,
}

impl fmt::Display for CreatorStateTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl CreatorState {
    pub fn listing(&self) -> Option<&Listing> {
        match self {
            Self::SetInfo => None,
            Self::Deploy { listing, .. }
            | Self::Deploying { listing }
            | Self::WaitingForAttacher { listing, .. } => Some(listing),
        }
    }
}

impl RoleState for CreatorState {
    type Tag = CreatorStateTag;

    const ROLE: Role = Role::Creator;

    const EDGES: &'static [Edge<CreatorStateTag>] = &[
        (CreatorStateTag::SetInfo, "set_info", CreatorStateTag::Deploy),
        (CreatorStateTag::Deploy, "deploy", CreatorStateTag::Deploying),
        (CreatorStateTag::Deploying, "deployed", CreatorStateTag::WaitingForAttacher),
        (CreatorStateTag::Deploying, "deploy_failed", CreatorStateTag::Deploy),
    ];

    fn tag(&self) -> CreatorStateTag {
        match self {
            Self::SetInfo => CreatorStateTag::SetInfo,
            Self::Deploy { .. } => CreatorStateTag::Deploy,
            Self::Deploying { .. } => CreatorStateTag::Deploying,
            Self::WaitingForAttacher { .. } => CreatorStateTag::WaitingForAttacher,
        }
    }

    fn payload(&self) -> serde_json::Value {
        match self {
            Self::SetInfo => serde_json::Value::Null,
            Self::Deploy {
                listing,
                contract: Some(contract),
            } => serde_json::json!({ "listing": listing, "contract": contract.handle.info() }),
            Self::Deploy { listing, .. } | Self::Deploying { listing } => {
                serde_json::json!({ "listing": listing })
            }
            Self::WaitingForAttacher {
                listing, handoff, ..
            } => serde_json::json!({ "listing": listing, "ctc_info": handoff }),
        }
    }

    fn actions(&self) -> &'static [&'static str] {
        match self {
            Self::SetInfo => &["set_info"],
            Self::Deploy { .. } => &["deploy"],
            Self::Deploying { .. } | Self::WaitingForAttacher { .. } => &[],
        }
    }

    fn pending_request(&self) -> Option<RequestId> {
        None
    }
}

/// Creator role controller
#[derive(Clone)]
pub struct Creator {
    session: Arc<Mutex<RoleSession<CreatorState>>>,
    contracts: Arc<dyn ContractSession>,
    program: ProgramDescriptor,
    currency: Currency,
}

impl Creator {
    pub fn new(contracts: Arc<dyn ContractSession>, config: &MarketConfig) -> Self {
        Self {
            session: Arc::new(Mutex::new(RoleSession::new(
                CreatorState::SetInfo,
                config.trace_max_entries,
            ))),
            contracts,
            program: ProgramDescriptor::pawnshop(),
            currency: config.currency(),
        }
    }

    /// Store the listing from the creator's form
    pub fn set_info(&self, id: &str, price: &str, tax: &str) -> Result<()> {
        let mut session = lock(&self.session);
        session.ensure_live()?;
        if !matches!(session.state(), CreatorState::SetInfo) {
            return Err(session.reject("set_info"));
        }
        let listing = Listing::parse(&self.currency, id, price, tax)?;
        session.advance(
            "set_info",
            CreatorState::Deploy {
                listing,
                contract: None,
            },
        )
    }

    /// Deploy the contract and return the handoff blob for the other roles.
    ///
    /// On rejection the session returns to `Deploy` for a retry. A contract
    /// created before the failure is kept, so the retry neither deploys nor
    /// registers a second time.
    pub async fn deploy(&self) -> Result<String> {
        let (listing, mut progress) = {
            let mut session = lock(&self.session);
            session.ensure_live()?;
            let (listing, contract) = match session.state() {
                CreatorState::Deploy { listing, contract } => (*listing, contract.clone()),
                _ => return Err(session.reject("deploy")),
            };
            session.advance("deploy", CreatorState::Deploying { listing })?;
            (listing, contract)
        };

        match self.publish(&mut progress).await {
            Ok(info) => {
                let handoff = HandoffCodec::encode(&info)?;
                info!(contract = %info, id = %listing.id, "creator deployed listing");
                lock(&self.session).advance(
                    "deployed",
                    CreatorState::WaitingForAttacher {
                        listing,
                        info,
                        handoff: handoff.clone(),
                    },
                )?;
                Ok(handoff)
            }
            Err(err) => {
                warn!(error = %err, resumable = progress.is_some(), "deploy rejected");
                lock(&self.session).advance(
                    "deploy_failed",
                    CreatorState::Deploy {
                        listing,
                        contract: progress,
                    },
                )?;
                Err(err)
            }
        }
    }

    async fn publish(&self, progress: &mut Option<Deployment>) -> Result<ContractInfo> {
        if progress.is_none() {
            let handle = self.contracts.deploy(&self.program).await?;
            *progress = Some(Deployment {
                handle,
                steps_registered: false,
            });
        }
        let deployment = progress
            .as_mut()
            .ok_or_else(|| PawnError::internal("deployment missing after deploy"))?;

        if !deployment.steps_registered {
            let steps = CreatorStepHandler {
                session: self.session.clone(),
            };
            self.contracts
                .register_steps(&deployment.handle, StepTable::Creator(Arc::new(steps)))
                .await?;
            deployment.steps_registered = true;
        }
        self.contracts.get_info(&deployment.handle).await
    }

    pub fn tag(&self) -> CreatorStateTag {
        lock(&self.session).tag()
    }

    pub fn state(&self) -> CreatorState {
        lock(&self.session).state().clone()
    }

    /// The blob to pass to the buyer and broker, once deployed
    pub fn handoff(&self) -> Option<String> {
        match lock(&self.session).state() {
            CreatorState::WaitingForAttacher { handoff, .. } => Some(handoff.clone()),
            _ => None,
        }
    }

    pub fn view(&self) -> SessionView {
        lock(&self.session).view()
    }

    pub fn log(&self) -> TransitionLog<CreatorStateTag> {
        lock(&self.session).log().clone()
    }
}

/// What the contract layer holds for the creator
struct CreatorStepHandler {
    session: Arc<Mutex<RoleSession<CreatorState>>>,
}

#[async_trait::async_trait]
impl CreatorSteps for CreatorStepHandler {
    async fn listing(&self) -> Result<Listing> {
        let session = lock(&self.session);
        session.ensure_live()?;
        session
            .state()
            .listing()
            .copied()
            .ok_or_else(|| PawnError::contract_step("listing", "no listing has been set"))
    }
}
