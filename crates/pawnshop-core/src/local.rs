//! In-memory network - contract and account layer for tests and the demo
//!
//! Every deploy gets a protocol driver task. The driver waits for each
//! participant to register its step table and then calls the steps strictly
//! in order, moving atomic balances as each step completes:
//!
//! ```text
//! creator.listing → buyer.buy → buyer.pawn → broker.accept → buyer.redeem
//!                   buyer pays    broker pays     buyer pays
//!                   creator       buyer           broker
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use pawnshop_types::{
    AtomicAmount, ContractHandle, ContractInfo, Listing, PawnError, PawnOffer, ProgramDescriptor,
    Result, Role,
};
use serde::Serialize;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};

use crate::config::MarketConfig;
use crate::session::{
    Account, AccountSession, BrokerSteps, BuyerSteps, ContractSession, CreatorSteps, StepTable,
};

/// First network round
const GENESIS_ROUND: u64 = 1;

/// Something the driver observed on a contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProtocolEvent {
    Deployed { creator: Account },
    Registered { role: Role, account: Account },
    Listed { listing: Listing },
    Bought { buyer: Account, price: AtomicAmount },
    PawnOffered { offer: PawnOffer },
    PawnAccepted { broker: Account, pawn_price: AtomicAmount },
    Redeemed { redeem_price: AtomicAmount },
    Aborted { step: String, reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    pub round: AtomicAmount,
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: ProtocolEvent,
}

#[derive(Default, Clone)]
struct Registrations {
    creator: Option<(Account, Arc<dyn CreatorSteps>)>,
    buyer: Option<(Account, Arc<dyn BuyerSteps>)>,
    broker: Option<(Account, Arc<dyn BrokerSteps>)>,
}

struct ContractEntry {
    program: ProgramDescriptor,
    creator: Account,
    registrations: watch::Sender<Registrations>,
    events: Vec<EventRecord>,
    finished: watch::Sender<bool>,
}

/// Shared in-memory network
pub struct LocalNetwork {
    network: String,
    balances: RwLock<HashMap<Account, AtomicAmount>>,
    contracts: RwLock<HashMap<u64, ContractEntry>>,
    next_app_id: AtomicU64,
    round: AtomicU64,
    query_lower_bound: AtomicU64,
    reject_deploys: AtomicBool,
    faucet: AtomicBool,
}

impl LocalNetwork {
    pub fn new(config: &MarketConfig) -> Arc<Self> {
        Arc::new(Self {
            network: config.network.clone(),
            balances: RwLock::new(HashMap::new()),
            contracts: RwLock::new(HashMap::new()),
            next_app_id: AtomicU64::new(1),
            round: AtomicU64::new(GENESIS_ROUND),
            query_lower_bound: AtomicU64::new(0),
            reject_deploys: AtomicBool::new(false),
            faucet: AtomicBool::new(true),
        })
    }

    /// A wallet connected as `address`
    pub fn wallet(self: &Arc<Self>, address: impl Into<String>) -> LocalWallet {
        LocalWallet {
            network: self.clone(),
            account: Account::new(address),
        }
    }

    /// Make every subsequent deploy fail
    pub fn reject_deploys(&self, reject: bool) {
        self.reject_deploys.store(reject, Ordering::SeqCst);
    }

    pub fn set_faucet(&self, available: bool) {
        self.faucet.store(available, Ordering::SeqCst);
    }

    pub fn round(&self) -> AtomicAmount {
        AtomicAmount::new(self.round.load(Ordering::SeqCst))
    }

    pub fn query_lower_bound(&self) -> AtomicAmount {
        AtomicAmount::new(self.query_lower_bound.load(Ordering::SeqCst))
    }

    pub async fn balance(&self, account: &Account) -> AtomicAmount {
        self.balances
            .read()
            .await
            .get(account)
            .copied()
            .unwrap_or(AtomicAmount::ZERO)
    }

    /// Events recorded so far on a contract
    pub async fn events(&self, info: &ContractInfo) -> Result<Vec<EventRecord>> {
        let contracts = self.contracts.read().await;
        let entry = self.entry(&contracts, info)?;
        Ok(entry.events.clone())
    }

    /// Wait until the contract's driver has finished or aborted
    pub async fn settled(&self, info: &ContractInfo) -> Result<Vec<EventRecord>> {
        let mut finished = {
            let contracts = self.contracts.read().await;
            self.entry(&contracts, info)?.finished.subscribe()
        };
        finished
            .wait_for(|done| *done)
            .await
            .map_err(|_| PawnError::internal("contract driver dropped"))?;
        self.events(info).await
    }

    fn entry<'a>(
        &self,
        contracts: &'a HashMap<u64, ContractEntry>,
        info: &ContractInfo,
    ) -> Result<&'a ContractEntry> {
        if info.network != self.network {
            return Err(PawnError::contract_step(
                "attach",
                format!("contract {} is not on {}", info, self.network),
            ));
        }
        contracts
            .get(&info.app_id)
            .ok_or_else(|| PawnError::contract_step("attach", format!("no contract {}", info)))
    }

    fn tick(&self) -> AtomicAmount {
        AtomicAmount::new(self.round.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn record(&self, app_id: u64, event: ProtocolEvent) {
        let round = self.tick();
        debug!(app_id, round = %round, ?event, "protocol event");
        if let Some(entry) = self.contracts.write().await.get_mut(&app_id) {
            entry.events.push(EventRecord {
                round,
                recorded_at: Utc::now(),
                event,
            });
        }
    }

    async fn transfer(
        &self,
        step: &str,
        from: &Account,
        to: &Account,
        amount: AtomicAmount,
    ) -> Result<()> {
        let mut balances = self.balances.write().await;
        let available = balances.get(from).copied().unwrap_or(AtomicAmount::ZERO);
        let remaining = available.checked_sub(amount).ok_or_else(|| {
            PawnError::contract_step(
                step,
                format!("{} holds {} but owes {}", from, available, amount),
            )
        })?;
        balances.insert(from.clone(), remaining);
        let credited = balances.entry(to.clone()).or_insert(AtomicAmount::ZERO);
        *credited = credited
            .checked_add(amount)
            .ok_or_else(|| PawnError::internal(format!("balance overflow for {}", to)))?;
        info!("Transferred {} from {} to {}", amount, from, to);
        Ok(())
    }

    async fn registrations(&self, app_id: u64) -> Result<watch::Receiver<Registrations>> {
        self.contracts
            .read()
            .await
            .get(&app_id)
            .map(|entry| entry.registrations.subscribe())
            .ok_or_else(|| PawnError::internal(format!("contract {} vanished", app_id)))
    }

    async fn finish(&self, app_id: u64) {
        if let Some(entry) = self.contracts.read().await.get(&app_id) {
            entry.registrations.send_replace(Registrations::default());
            entry.finished.send_replace(true);
        }
    }

    /// Run the protocol for one contract to completion
    async fn drive(self: Arc<Self>, app_id: u64) {
        if let Err(err) = self.run_protocol(app_id).await {
            warn!(app_id, error = %err, "protocol aborted");
            let step = match &err {
                PawnError::ContractStep { step, .. } => step.clone(),
                _ => "driver".to_string(),
            };
            self.record(
                app_id,
                ProtocolEvent::Aborted {
                    step,
                    reason: err.to_string(),
                },
            )
            .await;
        } else {
            info!(app_id, "protocol completed");
        }
        self.finish(app_id).await;
    }

    async fn run_protocol(&self, app_id: u64) -> Result<()> {
        let mut registrations = self.registrations(app_id).await?;

        let (creator, creator_steps) = wait_for(&mut registrations, |r| r.creator.clone()).await?;
        let listing = creator_steps.listing().await?;
        self.record(app_id, ProtocolEvent::Listed { listing }).await;

        let (buyer, buyer_steps) = wait_for(&mut registrations, |r| r.buyer.clone()).await?;
        buyer_steps.buy(listing.id, listing.price).await?;
        self.transfer("buy", &buyer, &creator, listing.price).await?;
        self.record(
            app_id,
            ProtocolEvent::Bought {
                buyer: buyer.clone(),
                price: listing.price,
            },
        )
        .await;

        let offer = buyer_steps.pawn().await?;
        self.record(app_id, ProtocolEvent::PawnOffered { offer }).await;

        let (broker, broker_steps) = wait_for(&mut registrations, |r| r.broker.clone()).await?;
        broker_steps
            .accept(listing.id, offer.pawn_price, offer.redeem_price, offer.end_date)
            .await?;
        self.transfer("accept", &broker, &buyer, offer.pawn_price).await?;
        self.record(
            app_id,
            ProtocolEvent::PawnAccepted {
                broker: broker.clone(),
                pawn_price: offer.pawn_price,
            },
        )
        .await;

        buyer_steps
            .redeem(listing.id, offer.redeem_price, offer.end_date)
            .await?;
        self.transfer("redeem", &buyer, &broker, offer.redeem_price).await?;
        self.record(
            app_id,
            ProtocolEvent::Redeemed {
                redeem_price: offer.redeem_price,
            },
        )
        .await;
        Ok(())
    }
}

async fn wait_for<T>(
    registrations: &mut watch::Receiver<Registrations>,
    slot: impl Fn(&Registrations) -> Option<T>,
) -> Result<T> {
    let current = registrations
        .wait_for(|r| slot(r).is_some())
        .await
        .map_err(|_| PawnError::internal("registrations closed"))?;
    slot(&current).ok_or_else(|| PawnError::internal("registration disappeared"))
}

/// One account's connection to a [`LocalNetwork`]
#[derive(Clone)]
pub struct LocalWallet {
    network: Arc<LocalNetwork>,
    account: Account,
}

impl LocalWallet {
    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn network(&self) -> &Arc<LocalNetwork> {
        &self.network
    }
}

#[async_trait::async_trait]
impl ContractSession for LocalWallet {
    async fn deploy(&self, program: &ProgramDescriptor) -> Result<ContractHandle> {
        let network = &self.network;
        if network.reject_deploys.load(Ordering::SeqCst) {
            warn!(account = %self.account, "deploy rejected");
            return Err(PawnError::contract_step("deploy", "deployment rejected by the network"));
        }

        let app_id = network.next_app_id.fetch_add(1, Ordering::SeqCst);
        let info = ContractInfo {
            network: network.network.clone(),
            app_id,
        };
        let (registrations, _) = watch::channel(Registrations::default());
        let (finished, _) = watch::channel(false);
        network.contracts.write().await.insert(
            app_id,
            ContractEntry {
                program: program.clone(),
                creator: self.account.clone(),
                registrations,
                events: Vec::new(),
                finished,
            },
        );
        network
            .record(
                app_id,
                ProtocolEvent::Deployed {
                    creator: self.account.clone(),
                },
            )
            .await;
        tokio::spawn(network.clone().drive(app_id));

        info!(contract = %info, program = %program, "contract deployed");
        Ok(ContractHandle::new(info, program.clone()))
    }

    async fn attach(&self, program: &ProgramDescriptor, info: &ContractInfo) -> Result<ContractHandle> {
        let contracts = self.network.contracts.read().await;
        let entry = self.network.entry(&contracts, info)?;
        if &entry.program != program {
            return Err(PawnError::contract_step(
                "attach",
                format!("contract {} runs {}, not {}", info, entry.program, program),
            ));
        }
        Ok(ContractHandle::new(info.clone(), program.clone()))
    }

    async fn get_info(&self, handle: &ContractHandle) -> Result<ContractInfo> {
        let contracts = self.network.contracts.read().await;
        self.network.entry(&contracts, handle.info())?;
        Ok(handle.info().clone())
    }

    async fn register_steps(&self, handle: &ContractHandle, steps: StepTable) -> Result<()> {
        let app_id = handle.info().app_id;
        let role = steps.role();
        {
            let contracts = self.network.contracts.write().await;
            let entry = self.network.entry(&contracts, handle.info())?;
            if role == Role::Creator && entry.creator != self.account {
                return Err(PawnError::contract_step(
                    "register",
                    format!("{} did not deploy {}", self.account, handle.info()),
                ));
            }

            let current = entry.registrations.borrow().clone();
            let taken = match role {
                Role::Creator => current.creator.is_some(),
                Role::Buyer => current.buyer.is_some(),
                Role::Broker => current.broker.is_some(),
            };
            if taken {
                return Err(PawnError::contract_step(
                    "register",
                    format!("{} already has a {}", handle.info(), role),
                ));
            }

            let account = self.account.clone();
            entry.registrations.send_modify(|r| match steps {
                StepTable::Creator(s) => r.creator = Some((account, s)),
                StepTable::Buyer(s) => r.buyer = Some((account, s)),
                StepTable::Broker(s) => r.broker = Some((account, s)),
            });
        }
        self.network
            .record(
                app_id,
                ProtocolEvent::Registered {
                    role,
                    account: self.account.clone(),
                },
            )
            .await;
        Ok(())
    }
}

#[async_trait::async_trait]
impl AccountSession for LocalWallet {
    async fn default_account(&self) -> Result<Account> {
        Ok(self.account.clone())
    }

    async fn balance_of(&self, account: &Account) -> Result<AtomicAmount> {
        Ok(self.network.balance(account).await)
    }

    async fn can_fund_from_faucet(&self) -> Result<bool> {
        Ok(self.network.faucet.load(Ordering::SeqCst))
    }

    async fn fund_from_faucet(&self, account: &Account, amount: AtomicAmount) -> Result<()> {
        if !self.network.faucet.load(Ordering::SeqCst) {
            return Err(PawnError::contract_step("fund", "no faucet on this network"));
        }
        {
            let mut balances = self.network.balances.write().await;
            let balance = balances.entry(account.clone()).or_insert(AtomicAmount::ZERO);
            *balance = balance
                .checked_add(amount)
                .ok_or_else(|| PawnError::internal(format!("balance overflow for {}", account)))?;
        }
        self.network.tick();
        info!(%account, %amount, "funded from faucet");
        Ok(())
    }

    async fn network_time(&self) -> Result<AtomicAmount> {
        Ok(self.network.round())
    }

    async fn set_query_lower_bound(&self, time: AtomicAmount) -> Result<()> {
        self.network
            .query_lower_bound
            .store(time.value(), Ordering::SeqCst);
        Ok(())
    }
}
