//! Listing, pawn offer and step payload records
//!
//! These records cross the contract boundary. They carry atomic amounts only;
//! decimal parsing happens once, in the constructors that take user input.

use serde::{Deserialize, Serialize};

use crate::{AtomicAmount, Currency, PawnError, Result};

/// The asset a creator puts up for sale.
///
/// Fixed once deployment begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Listing {
    /// Token id
    pub id: AtomicAmount,
    /// Sale price in atomic units
    pub price: AtomicAmount,
    /// Creator tax in atomic units
    pub tax: AtomicAmount,
}

impl Listing {
    pub fn new(id: AtomicAmount, price: AtomicAmount, tax: AtomicAmount) -> Self {
        Self { id, price, tax }
    }

    /// Build a listing from the creator's form fields.
    ///
    /// The id is a plain integer; price and tax are decimal amounts in
    /// `currency`.
    pub fn parse(currency: &Currency, id: &str, price: &str, tax: &str) -> Result<Self> {
        let id = AtomicAmount::parse_integer("id", id)?;
        let price = currency
            .parse_currency(price)
            .map_err(|e| e.for_field("price"))?;
        let tax = currency
            .parse_currency(tax)
            .map_err(|e| e.for_field("tax"))?;
        Ok(Self { id, price, tax })
    }
}

/// Terms of a pawn: what the broker lends, what the buyer repays, and until when.
///
/// Fixed after broker acceptance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PawnOffer {
    pub pawn_price: AtomicAmount,
    pub redeem_price: AtomicAmount,
    /// Deadline in network time
    pub end_date: AtomicAmount,
}

impl PawnOffer {
    /// Validate an offer against the current network time.
    ///
    /// The redeem price must exceed the pawn price and the end date must lie
    /// strictly after `now`.
    pub fn new(
        pawn_price: AtomicAmount,
        redeem_price: AtomicAmount,
        end_date: AtomicAmount,
        now: AtomicAmount,
    ) -> Result<Self> {
        if redeem_price <= pawn_price {
            return Err(PawnError::invalid_input(
                "redeem_price",
                format!(
                    "redeem price {} must exceed pawn price {}",
                    redeem_price, pawn_price
                ),
            ));
        }
        if end_date <= now {
            return Err(PawnError::invalid_input(
                "end_date",
                format!("end date {} is not after network time {}", end_date, now),
            ));
        }
        Ok(Self {
            pawn_price,
            redeem_price,
            end_date,
        })
    }

    /// Build an offer from the buyer's form fields.
    pub fn parse(
        currency: &Currency,
        pawn_price: &str,
        redeem_price: &str,
        end_date: &str,
        now: AtomicAmount,
    ) -> Result<Self> {
        let pawn_price = currency
            .parse_currency(pawn_price)
            .map_err(|e| e.for_field("pawn_price"))?;
        let redeem_price = currency
            .parse_currency(redeem_price)
            .map_err(|e| e.for_field("redeem_price"))?;
        let end_date = AtomicAmount::parse_integer("end_date", end_date)?;
        Self::new(pawn_price, redeem_price, end_date, now)
    }
}

/// Payload of the buyer's `buy` step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyTerms {
    pub id: AtomicAmount,
    pub price: AtomicAmount,
}

/// Payload of the buyer's `redeem` step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeemTerms {
    pub id: AtomicAmount,
    pub redeem_price: AtomicAmount,
    pub end_date: AtomicAmount,
}

/// Payload of the broker's `accept` step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptTerms {
    pub id: AtomicAmount,
    pub pawn_price: AtomicAmount,
    pub redeem_price: AtomicAmount,
    pub end_date: AtomicAmount,
}

impl AcceptTerms {
    pub fn offer(&self) -> PawnOffer {
        PawnOffer {
            pawn_price: self.pawn_price,
            redeem_price: self.redeem_price,
            end_date: self.end_date,
        }
    }
}
