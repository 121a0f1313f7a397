//! Pawnshop Types - Domain types for the three-role pawn marketplace
//!
//! This crate has zero dependencies on other pawnshop crates. It defines:
//!
//! - [`AtomicAmount`] and [`Currency`]: fixed-precision on-chain values and
//!   their one-way display conversion
//! - [`Role`]: Creator, Buyer and Broker
//! - [`Listing`], [`PawnOffer`] and the step payload records
//! - [`ContractInfo`], [`ContractHandle`] and the [`HandoffCodec`]
//! - [`PawnError`]: the error taxonomy shared by every layer
//!
//! # Protocol
//!
//! ```text
//! Creator: list → deploy ─┐
//! Buyer:   attach → buy → pawn ─────────────→ redeem
//! Broker:  attach ──────────────→ accept ──┘
//! ```

pub mod amount;
pub mod error;
pub mod handle;
pub mod listing;
pub mod role;

pub use amount::*;
pub use error::*;
pub use handle::*;
pub use listing::*;
pub use role::*;

/// Version of the pawnshop types schema
pub const TYPES_VERSION: &str = "0.1.0";
