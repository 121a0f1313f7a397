//! Marketplace roles

use serde::{Deserialize, Serialize};
use std::fmt;

/// The three participants of a pawn listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Lists the asset and deploys the contract
    Creator,
    /// Buys, pawns and redeems the asset
    Buyer,
    /// Accepts a pawn offer and releases the asset on redemption
    Broker,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Creator, Role::Buyer, Role::Broker];

    /// Participant label the contract program uses for this role
    pub fn participant(&self) -> &'static str {
        match self {
            Role::Creator => "A",
            Role::Buyer => "B",
            Role::Broker => "C",
        }
    }

    /// Whether this role deploys the contract rather than attaching to it
    pub fn is_deployer(&self) -> bool {
        matches!(self, Role::Creator)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Creator => write!(f, "Creator"),
            Role::Buyer => write!(f, "Buyer"),
            Role::Broker => write!(f, "Broker"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participants_are_distinct() {
        let labels: Vec<_> = Role::ALL.iter().map(Role::participant).collect();
        assert_eq!(labels, vec!["A", "B", "C"]);
        assert!(Role::Creator.is_deployer());
        assert!(!Role::Broker.is_deployer());
    }
}
