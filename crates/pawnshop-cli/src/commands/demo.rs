//! Demo command - the whole marketplace in one process

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use colored::*;
use pawnshop_core::{
    AccountSession, AppSession, AppState, Broker, BrokerStateTag, Buyer, BuyerStateTag, Creator,
    LocalNetwork, LocalWallet, MarketConfig, ProtocolEvent,
};
use pawnshop_types::{AtomicAmount, HandoffCodec, Role};

use crate::display;

const STEP_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub struct DemoArgs {
    pub id: String,
    pub price: String,
    pub tax: String,
    pub pawn_price: String,
    pub redeem_price: String,
    pub term: u64,
}

pub async fn run_demo(config: &MarketConfig, args: DemoArgs) -> anyhow::Result<()> {
    println!("{}", "Pawnshop demo: list, buy, pawn, redeem".bright_white().bold());
    println!("  network {}", config.network.bright_cyan());

    let network = LocalNetwork::new(config);
    let asset_id = AtomicAmount::parse_integer("id", &args.id)?;

    display::section("Connecting accounts");
    let creator_wallet = connect(&network, config, "creator", Role::Creator).await?;
    let buyer_wallet = connect(&network, config, "buyer", Role::Buyer).await?;
    let broker_wallet = connect(&network, config, "broker", Role::Broker).await?;

    display::section("Creator lists and deploys");
    let creator = Creator::new(Arc::new(creator_wallet.clone()), config);
    display::view(&creator.view());
    creator.set_info(&args.id, &args.price, &args.tax)?;
    display::view(&creator.view());
    let blob = creator.deploy().await?;
    display::view(&creator.view());
    let info = HandoffCodec::decode(&blob)?;
    display::success(&format!("contract {} ready for attachers", info));

    display::section("Buyer attaches and buys");
    let buyer = Buyer::new(
        Arc::new(buyer_wallet.clone()),
        Arc::new(buyer_wallet.clone()),
        config,
    );
    buyer.attach(&blob).await?;
    wait_until("the buy offer", || buyer.tag() == BuyerStateTag::BuyNft).await?;
    display::view(&buyer.view());
    buyer.buy_it()?;
    display::success("buyer bought the asset");

    display::section("Buyer offers the asset for pawn");
    wait_until("the pawn prompt", || buyer.tag() == BuyerStateTag::Pawn).await?;
    display::view(&buyer.view());
    let end_date = buyer_wallet
        .network_time()
        .await?
        .checked_add(AtomicAmount::new(args.term))
        .ok_or_else(|| anyhow!("pawn term {} overflows the network clock", args.term))?;
    buyer.pawn_it(&args.pawn_price, &args.redeem_price, &end_date.to_string())?;
    display::view(&buyer.view());

    display::section("Broker attaches and accepts");
    let broker = Broker::new(Arc::new(broker_wallet.clone()), config);
    broker.attach(&blob).await?;
    wait_until("the pawn offer", || broker.tag() == BrokerStateTag::AcceptPawn).await?;
    display::view(&broker.view());
    broker.accept_it()?;
    display::view(&broker.view());

    display::section("Buyer redeems");
    wait_until("the redeem offer", || buyer.tag() == BuyerStateTag::Redeem).await?;
    display::view(&buyer.view());
    buyer.redeem_it(asset_id)?;
    display::view(&buyer.view());

    let events = network.settled(&info).await?;
    display::section("Protocol events");
    for record in &events {
        display::info(&format!(
            "round {:>4}  {}",
            record.round,
            serde_json::to_string(&record.event)?
        ));
    }
    if let Some(ProtocolEvent::Aborted { step, reason }) = events.last().map(|r| &r.event) {
        bail!("protocol aborted at {}: {}", step, reason);
    }

    display::section("Final balances");
    let currency = config.currency();
    for (name, wallet) in [
        ("creator", &creator_wallet),
        ("buyer", &buyer_wallet),
        ("broker", &broker_wallet),
    ] {
        let balance = network.balance(wallet.account()).await;
        display::kv(
            name,
            &format!(
                "{} {}",
                currency.format_currency(balance, config.display_precision),
                currency.symbol
            ),
        );
    }
    display::success("demo complete");
    Ok(())
}

/// Walk the app session for one account and return its wallet
async fn connect(
    network: &Arc<LocalNetwork>,
    config: &MarketConfig,
    name: &str,
    role: Role,
) -> anyhow::Result<LocalWallet> {
    let wallet = network.wallet(name);
    let mut app = AppSession::new(Arc::new(wallet.clone()), config);

    if app.connect().await? == AppState::FundAccount {
        let amount = app.default_fund_amount().to_string();
        app.fund_account(&amount).await?;
    }
    app.select_role(role)?;

    let summary = app
        .summary()
        .ok_or_else(|| anyhow!("{} has no account summary", name))?;
    display::kv(
        &format!("{} ({})", name, role),
        &format!("{} {}", summary.formatted_balance, config.currency_symbol),
    );
    Ok(wallet)
}

async fn wait_until(what: &str, mut ready: impl FnMut() -> bool) -> anyhow::Result<()> {
    tokio::time::timeout(STEP_TIMEOUT, async {
        while !ready() {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    })
    .await
    .with_context(|| format!("timed out waiting for {}", what))
}
