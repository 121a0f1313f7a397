//! End-to-end flows through the in-memory network

use std::sync::Arc;
use std::time::Duration;

use pawnshop_core::{
    AccountSession, Broker, BrokerStateTag, Buyer, BuyerStateTag, Creator, CreatorStateTag,
    LocalNetwork, LocalWallet, MarketConfig, ProtocolEvent,
};
use pawnshop_types::{AtomicAmount, Currency, HandoffCodec, PawnError};

async fn until(what: &str, mut done: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !done() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {}", what));
}

async fn funded(network: &Arc<LocalNetwork>, name: &str, algos: &str) -> LocalWallet {
    let wallet = network.wallet(name);
    let amount = Currency::algo().parse_currency(algos).unwrap();
    wallet.fund_from_faucet(wallet.account(), amount).await.unwrap();
    wallet
}

fn algos(s: &str) -> AtomicAmount {
    Currency::algo().parse_currency(s).unwrap()
}

#[tokio::test]
async fn test_full_protocol_moves_balances() {
    let config = MarketConfig::default();
    let network = LocalNetwork::new(&config);
    let creator_wallet = network.wallet("creator");
    let buyer_wallet = funded(&network, "buyer", "200").await;
    let broker_wallet = funded(&network, "broker", "50").await;

    let creator = Creator::new(Arc::new(creator_wallet.clone()), &config);
    creator.set_info("1", "100", "5").unwrap();
    let blob = creator.deploy().await.unwrap();
    let info = HandoffCodec::decode(&blob).unwrap();

    let buyer = Buyer::new(
        Arc::new(buyer_wallet.clone()),
        Arc::new(buyer_wallet.clone()),
        &config,
    );
    assert_eq!(buyer.attach(&blob).await.unwrap(), info);

    until("buy step", || buyer.tag() == BuyerStateTag::BuyNft).await;
    let view = buyer.view();
    assert_eq!(view.payload["id"], 1);
    assert_eq!(view.payload["price"], 100_000_000);
    buyer.buy_it().unwrap();

    until("pawn step", || buyer.tag() == BuyerStateTag::Pawn).await;
    buyer.pawn_it("20", "25", "100000").unwrap();

    let broker = Broker::new(Arc::new(broker_wallet.clone()), &config);
    broker.attach(&blob).await.unwrap();
    until("accept step", || broker.tag() == BrokerStateTag::AcceptPawn).await;
    let terms = broker.terms().unwrap();
    assert_eq!(terms.pawn_price, algos("20"));
    assert_eq!(terms.end_date, AtomicAmount::new(100_000));
    broker.accept_it().unwrap();

    until("redeem step", || buyer.tag() == BuyerStateTag::Redeem).await;
    buyer.redeem_it(AtomicAmount::new(1)).unwrap();

    let events = network.settled(&info).await.unwrap();
    let kinds: Vec<_> = events.iter().map(|e| &e.event).collect();
    assert!(matches!(kinds[0], ProtocolEvent::Deployed { .. }));
    assert!(matches!(kinds.last(), Some(ProtocolEvent::Redeemed { .. })));
    assert!(events.windows(2).all(|w| w[0].round < w[1].round));

    assert_eq!(network.balance(creator_wallet.account()).await, algos("100"));
    assert_eq!(network.balance(buyer_wallet.account()).await, algos("95"));
    assert_eq!(network.balance(broker_wallet.account()).await, algos("55"));

    assert_eq!(creator.tag(), CreatorStateTag::WaitingForAttacher);
    assert_eq!(buyer.tag(), BuyerStateTag::RedeemSuccess);
    assert_eq!(broker.tag(), BrokerStateTag::WaitingForRedeem);
    assert!(!buyer.is_faulted() && !broker.is_faulted());
}

#[tokio::test]
async fn test_buyer_without_funds_aborts_protocol() {
    let config = MarketConfig::default();
    let network = LocalNetwork::new(&config);
    let creator = Creator::new(Arc::new(network.wallet("creator")), &config);
    creator.set_info("2", "100", "5").unwrap();
    let blob = creator.deploy().await.unwrap();
    let info = HandoffCodec::decode(&blob).unwrap();

    let wallet = network.wallet("buyer");
    let buyer = Buyer::new(Arc::new(wallet.clone()), Arc::new(wallet), &config);
    buyer.attach(&blob).await.unwrap();
    until("buy step", || buyer.tag() == BuyerStateTag::BuyNft).await;
    buyer.buy_it().unwrap();

    let events = network.settled(&info).await.unwrap();
    match &events.last().unwrap().event {
        ProtocolEvent::Aborted { step, .. } => assert_eq!(step, "buy"),
        other => panic!("expected abort, got {:?}", other),
    }
    assert_eq!(buyer.tag(), BuyerStateTag::BuyNft);
}

#[tokio::test]
async fn test_attach_with_bad_blob_stays_in_attach() {
    let config = MarketConfig::default();
    let network = LocalNetwork::new(&config);
    let broker = Broker::new(Arc::new(network.wallet("broker")), &config);

    for blob in ["", "not json", r#"{"network":"TestNet"}"#] {
        let err = broker.attach(blob).await.unwrap_err();
        assert_eq!(err.error_code(), "HANDOFF_DECODE");
        assert_eq!(broker.tag(), BrokerStateTag::Attach);
    }
    assert!(broker.log().entries.is_empty());
}

#[tokio::test]
async fn test_attach_to_unknown_contract_can_retry() {
    let config = MarketConfig::default();
    let network = LocalNetwork::new(&config);
    let creator = Creator::new(Arc::new(network.wallet("creator")), &config);
    creator.set_info("1", "1", "0").unwrap();
    let blob = creator.deploy().await.unwrap();

    let wallet = network.wallet("buyer");
    let buyer = Buyer::new(Arc::new(wallet.clone()), Arc::new(wallet), &config);
    let missing = blob.replace("\"app_id\": 1", "\"app_id\": 42");
    let err = buyer.attach(&missing).await.unwrap_err();
    assert!(matches!(err, PawnError::ContractStep { ref step, .. } if step == "attach"));
    assert_eq!(buyer.tag(), BuyerStateTag::Attach);

    buyer.attach(&blob).await.unwrap();
    let actions: Vec<_> = buyer.log().edges().map(|(_, action, _)| action).collect();
    assert_eq!(actions[..3], ["attach", "attach_failed", "attach"]);
}

#[tokio::test]
async fn test_second_buyer_cannot_register() {
    let config = MarketConfig::default();
    let network = LocalNetwork::new(&config);
    let creator = Creator::new(Arc::new(network.wallet("creator")), &config);
    creator.set_info("1", "1", "0").unwrap();
    let blob = creator.deploy().await.unwrap();

    let first = network.wallet("first");
    let second = network.wallet("second");
    Buyer::new(Arc::new(first.clone()), Arc::new(first), &config)
        .attach(&blob)
        .await
        .unwrap();

    let late = Buyer::new(Arc::new(second.clone()), Arc::new(second), &config);
    let err = late.attach(&blob).await.unwrap_err();
    assert_eq!(err.error_code(), "CONTRACT_STEP");
    assert_eq!(late.tag(), BuyerStateTag::Attach);
}

#[tokio::test]
async fn test_second_accept_it_never_reaches_the_network() {
    let config = MarketConfig::default();
    let network = LocalNetwork::new(&config);
    let buyer_wallet = funded(&network, "buyer", "10").await;
    let broker_wallet = funded(&network, "broker", "10").await;

    let creator = Creator::new(Arc::new(network.wallet("creator")), &config);
    creator.set_info("1", "1", "0").unwrap();
    let blob = creator.deploy().await.unwrap();
    let info = HandoffCodec::decode(&blob).unwrap();

    let buyer = Buyer::new(Arc::new(buyer_wallet.clone()), Arc::new(buyer_wallet), &config);
    let broker = Broker::new(Arc::new(broker_wallet.clone()), &config);
    buyer.attach(&blob).await.unwrap();
    broker.attach(&blob).await.unwrap();

    until("buy step", || buyer.tag() == BuyerStateTag::BuyNft).await;
    buyer.buy_it().unwrap();
    until("pawn step", || buyer.tag() == BuyerStateTag::Pawn).await;
    buyer.pawn_it("5", "6", "100000").unwrap();
    until("accept step", || broker.tag() == BrokerStateTag::AcceptPawn).await;

    broker.accept_it().unwrap();
    assert_eq!(broker.accept_it().unwrap_err().error_code(), "INVALID_TRANSITION");
    until("redeem step", || buyer.tag() == BuyerStateTag::Redeem).await;

    let accepted = network
        .events(&info)
        .await
        .unwrap()
        .iter()
        .filter(|e| matches!(e.event, ProtocolEvent::PawnAccepted { .. }))
        .count();
    assert_eq!(accepted, 1);
    assert_eq!(network.balance(broker_wallet.account()).await, algos("5"));
}
