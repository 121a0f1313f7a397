//! Contract handles and the out-of-band handoff codec
//!
//! The creator deploys one contract per listing and passes its info to the
//! buyer and broker as pasted text. Every role working on a listing must hold
//! a handle that decodes to the same [`ContractInfo`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{PawnError, Result};

/// Identifies the contract program a session deploys or attaches to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProgramDescriptor {
    pub name: String,
    pub version: String,
}

impl ProgramDescriptor {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// The pawnshop marketplace program
    pub fn pawnshop() -> Self {
        Self::new("pawnshop", "1")
    }
}

impl fmt::Display for ProgramDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// Serializable descriptor of one deployed contract instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContractInfo {
    /// Network the application lives on
    pub network: String,
    /// On-chain application id
    pub app_id: u64,
}

impl fmt::Display for ContractInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.network, self.app_id)
    }
}

/// A live reference to a deployed contract, as returned by a contract session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContractHandle {
    info: ContractInfo,
    program: ProgramDescriptor,
}

impl ContractHandle {
    pub fn new(info: ContractInfo, program: ProgramDescriptor) -> Self {
        Self { info, program }
    }

    /// The shareable descriptor for this contract
    pub fn info(&self) -> &ContractInfo {
        &self.info
    }

    pub fn program(&self) -> &ProgramDescriptor {
        &self.program
    }
}

/// Text codec for handing a contract's info to another role
pub struct HandoffCodec;

impl HandoffCodec {
    /// Encode contract info as pretty-printed JSON, ready to copy and paste.
    pub fn encode(info: &ContractInfo) -> Result<String> {
        serde_json::to_string_pretty(info)
            .map_err(|e| PawnError::internal(format!("contract info encoding failed: {}", e)))
    }

    /// Decode a pasted blob. Surrounding whitespace is ignored.
    pub fn decode(blob: &str) -> Result<ContractInfo> {
        let blob = blob.trim();
        if blob.is_empty() {
            return Err(PawnError::handoff_decode("empty contract handle"));
        }
        Ok(serde_json::from_str(blob)?)
    }
}
