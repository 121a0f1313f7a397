//! Attach flow shared by the buyer and the broker

use std::sync::Mutex;

use pawnshop_types::{ContractInfo, HandoffCodec, ProgramDescriptor, Result};
use tracing::{info, warn};

use crate::machine::{lock, RoleSession, RoleState};
use crate::session::{ContractSession, StepTable};

/// States every attaching role has
pub(crate) trait Attachable: RoleState {
    fn is_attach(&self) -> bool;
    fn attach() -> Self;
    fn attaching(info: ContractInfo) -> Self;
}

/// Decode `blob`, move to `Attaching`, attach and register `steps`.
///
/// A bad blob leaves the session in `Attach`. A rejected attach or
/// registration moves it back to `Attach` so the user can paste again.
pub(crate) async fn attach_role<S: Attachable>(
    session: &Mutex<RoleSession<S>>,
    contracts: &dyn ContractSession,
    program: &ProgramDescriptor,
    blob: &str,
    steps: StepTable,
) -> Result<ContractInfo> {
    let info = {
        let mut session = lock(session);
        session.ensure_live()?;
        if !session.state().is_attach() {
            return Err(session.reject("attach"));
        }
        let info = HandoffCodec::decode(blob)?;
        session.advance("attach", S::attaching(info.clone()))?;
        info
    };

    let attached = async {
        let handle = contracts.attach(program, &info).await?;
        contracts.register_steps(&handle, steps).await
    }
    .await;

    match attached {
        Ok(()) => {
            info!(role = %S::ROLE, contract = %info, "attached");
            Ok(info)
        }
        Err(err) => {
            warn!(role = %S::ROLE, contract = %info, error = %err, "attach rejected");
            lock(session).advance("attach_failed", S::attach())?;
            Err(err)
        }
    }
}
