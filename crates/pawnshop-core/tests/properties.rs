//! State-graph coverage under random action sequences

use std::sync::Arc;

use pawnshop_core::{
    Broker, BrokerState, BrokerSteps, Buyer, BuyerState, BuyerSteps, ContractSession, LocalNetwork,
    MarketConfig, RoleState, TransitionLog,
};
use pawnshop_types::{AtomicAmount, ContractInfo, HandoffCodec, ProgramDescriptor};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum BuyerOp {
    Attach(bool),
    BuyStep,
    PawnStep,
    RedeemStep,
    BuyIt,
    PawnIt { pawn: u8, redeem: u8, end: u32 },
    RedeemIt(u8),
}

fn buyer_op() -> impl Strategy<Value = BuyerOp> {
    prop_oneof![
        any::<bool>().prop_map(BuyerOp::Attach),
        Just(BuyerOp::BuyStep),
        Just(BuyerOp::PawnStep),
        Just(BuyerOp::RedeemStep),
        Just(BuyerOp::BuyIt),
        (any::<u8>(), any::<u8>(), any::<u32>())
            .prop_map(|(pawn, redeem, end)| BuyerOp::PawnIt { pawn, redeem, end }),
        (0u8..3).prop_map(BuyerOp::RedeemIt),
    ]
}

#[derive(Debug, Clone)]
enum BrokerOp {
    Attach(bool),
    AcceptStep,
    AcceptIt,
}

fn broker_op() -> impl Strategy<Value = BrokerOp> {
    prop_oneof![
        any::<bool>().prop_map(BrokerOp::Attach),
        Just(BrokerOp::AcceptStep),
        Just(BrokerOp::AcceptIt),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

fn assert_declared<S: RoleState>(log: &TransitionLog<S::Tag>) {
    for edge in log.edges() {
        assert!(S::EDGES.contains(&edge), "undeclared edge {:?}", edge);
    }
    for pair in log.entries.windows(2) {
        assert_eq!(pair[0].to, pair[1].from);
    }
}

/// Deploy a contract nobody drives past the listing step
async fn deployed(network: &Arc<LocalNetwork>) -> ContractInfo {
    network
        .wallet("creator")
        .deploy(&ProgramDescriptor::pawnshop())
        .await
        .unwrap()
        .info()
        .clone()
}

fn blob_for(valid: bool, info: &ContractInfo) -> String {
    if valid {
        HandoffCodec::encode(info).unwrap()
    } else {
        "{ not a handle".to_string()
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_buyer_only_takes_declared_edges(ops in prop::collection::vec(buyer_op(), 1..24)) {
        runtime().block_on(async {
            let config = MarketConfig::default();
            let network = LocalNetwork::new(&config);
            let info = deployed(&network).await;

            let wallet = network.wallet("buyer");
            let buyer = Buyer::new(Arc::new(wallet.clone()), Arc::new(wallet), &config);
            let handler = Arc::new(buyer.step_handler());

            for op in ops {
                match op {
                    BuyerOp::Attach(valid) => {
                        let _ = buyer.attach(&blob_for(valid, &info)).await;
                    }
                    BuyerOp::BuyStep => {
                        let handler = handler.clone();
                        tokio::spawn(async move {
                            handler.buy(AtomicAmount::new(1), AtomicAmount::new(100)).await
                        });
                    }
                    BuyerOp::PawnStep => {
                        let handler = handler.clone();
                        tokio::spawn(async move { handler.pawn().await });
                    }
                    BuyerOp::RedeemStep => {
                        let handler = handler.clone();
                        tokio::spawn(async move {
                            handler
                                .redeem(AtomicAmount::new(1), AtomicAmount::new(60), AtomicAmount::new(1000))
                                .await
                        });
                    }
                    BuyerOp::BuyIt => {
                        let _ = buyer.buy_it();
                    }
                    BuyerOp::PawnIt { pawn, redeem, end } => {
                        let _ = buyer.pawn_it(&pawn.to_string(), &redeem.to_string(), &end.to_string());
                    }
                    BuyerOp::RedeemIt(id) => {
                        let _ = buyer.redeem_it(AtomicAmount::new(id as u64));
                    }
                }
                settle().await;

                let log = buyer.log();
                assert_declared::<BuyerState>(&log);
                if let Some(last) = log.entries.last() {
                    assert_eq!(last.to, buyer.tag());
                }
                if buyer.is_faulted() {
                    assert!(buyer.view().actions.is_empty());
                }
            }
        });
    }

    #[test]
    fn prop_broker_only_takes_declared_edges(ops in prop::collection::vec(broker_op(), 1..16)) {
        runtime().block_on(async {
            let config = MarketConfig::default();
            let network = LocalNetwork::new(&config);
            let info = deployed(&network).await;
            let broker = Broker::new(Arc::new(network.wallet("broker")), &config);
            let handler = Arc::new(broker.step_handler());

            for op in ops {
                match op {
                    BrokerOp::Attach(valid) => {
                        let _ = broker.attach(&blob_for(valid, &info)).await;
                    }
                    BrokerOp::AcceptStep => {
                        let handler = handler.clone();
                        tokio::spawn(async move {
                            handler
                                .accept(
                                    AtomicAmount::new(1),
                                    AtomicAmount::new(50),
                                    AtomicAmount::new(60),
                                    AtomicAmount::new(1000),
                                )
                                .await
                        });
                    }
                    BrokerOp::AcceptIt => {
                        let _ = broker.accept_it();
                    }
                }
                settle().await;

                let log = broker.log();
                assert_declared::<BrokerState>(&log);
                if let Some(last) = log.entries.last() {
                    assert_eq!(last.to, broker.tag());
                }
            }
        });
    }
}
