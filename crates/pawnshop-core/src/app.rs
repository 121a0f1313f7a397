//! App session: connect, optionally fund, pick a role

use std::fmt;
use std::sync::Arc;

use pawnshop_types::{AtomicAmount, Currency, PawnError, Result, Role};
use serde::Serialize;
use tracing::info;

use crate::config::MarketConfig;
use crate::session::{Account, AccountSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "role")]
pub enum AppState {
    ConnectAccount,
    FundAccount,
    DeployerOrAttacher,
    RoleSelected(Role),
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RoleSelected(role) => write!(f, "RoleSelected({})", role),
            other => fmt::Debug::fmt(other, f),
        }
    }
}

/// Account summary for the rendering layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSummary {
    pub account: Account,
    pub balance: AtomicAmount,
    pub formatted_balance: String,
}

pub struct AppSession {
    accounts: Arc<dyn AccountSession>,
    currency: Currency,
    precision: u32,
    query_window: u64,
    default_fund_amount: String,
    state: AppState,
    summary: Option<AccountSummary>,
}

impl AppSession {
    pub fn new(accounts: Arc<dyn AccountSession>, config: &MarketConfig) -> Self {
        Self {
            accounts,
            currency: config.currency(),
            precision: config.display_precision,
            query_window: config.query_window,
            default_fund_amount: config.default_fund_amount.clone(),
            state: AppState::ConnectAccount,
            summary: None,
        }
    }

    pub fn state(&self) -> AppState {
        self.state
    }

    pub fn summary(&self) -> Option<&AccountSummary> {
        self.summary.as_ref()
    }

    pub fn default_fund_amount(&self) -> &str {
        &self.default_fund_amount
    }

    /// Connect the default account and read its balance
    pub async fn connect(&mut self) -> Result<AppState> {
        if self.state != AppState::ConnectAccount {
            return Err(self.reject("connect"));
        }
        let now = self.accounts.network_time().await?;
        let bound = now.saturating_sub(AtomicAmount::new(self.query_window));
        self.accounts.set_query_lower_bound(bound).await?;

        let account = self.accounts.default_account().await?;
        self.refresh(account).await?;

        self.state = if self.accounts.can_fund_from_faucet().await? {
            AppState::FundAccount
        } else {
            AppState::DeployerOrAttacher
        };
        Ok(self.state)
    }

    /// Fund the account from the faucet with a decimal amount
    pub async fn fund_account(&mut self, amount: &str) -> Result<AppState> {
        if self.state != AppState::FundAccount {
            return Err(self.reject("fund_account"));
        }
        let amount = self
            .currency
            .parse_currency(amount)
            .map_err(|e| e.for_field("amount"))?;
        let account = self.connected_account()?;
        self.accounts.fund_from_faucet(&account, amount).await?;
        info!(%account, amount = %self.currency.to_display_string(amount), "account funded");
        self.refresh(account).await?;
        self.state = AppState::DeployerOrAttacher;
        Ok(self.state)
    }

    pub fn skip_fund_account(&mut self) -> Result<AppState> {
        if self.state != AppState::FundAccount {
            return Err(self.reject("skip_fund_account"));
        }
        self.state = AppState::DeployerOrAttacher;
        Ok(self.state)
    }

    pub fn select_role(&mut self, role: Role) -> Result<AppState> {
        if self.state != AppState::DeployerOrAttacher {
            return Err(self.reject("select_role"));
        }
        info!(%role, "role selected");
        self.state = AppState::RoleSelected(role);
        Ok(self.state)
    }

    async fn refresh(&mut self, account: Account) -> Result<()> {
        let balance = self.accounts.balance_of(&account).await?;
        self.summary = Some(AccountSummary {
            formatted_balance: self.currency.format_currency(balance, self.precision),
            account,
            balance,
        });
        Ok(())
    }

    fn connected_account(&self) -> Result<Account> {
        self.summary
            .as_ref()
            .map(|s| s.account.clone())
            .ok_or_else(|| PawnError::internal("no connected account"))
    }

    fn reject(&self, action: &str) -> PawnError {
        PawnError::invalid_transition("App", self.state.to_string(), action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalNetwork;

    fn app(network: &Arc<LocalNetwork>) -> AppSession {
        AppSession::new(Arc::new(network.wallet("alice")), &MarketConfig::default())
    }

    #[tokio::test]
    async fn test_connect_fund_select() {
        let network = LocalNetwork::new(&MarketConfig::default());
        let mut app = app(&network);

        assert_eq!(app.connect().await.unwrap(), AppState::FundAccount);
        assert_eq!(app.summary().unwrap().formatted_balance, "0.0000");
        assert_eq!(network.query_lower_bound(), AtomicAmount::ZERO);

        let fund = app.default_fund_amount().to_string();
        assert_eq!(app.fund_account(&fund).await.unwrap(), AppState::DeployerOrAttacher);
        let summary = app.summary().unwrap();
        assert_eq!(summary.balance, AtomicAmount::new(10_000_000));
        assert_eq!(summary.formatted_balance, "10.0000");

        assert_eq!(
            app.select_role(Role::Buyer).unwrap(),
            AppState::RoleSelected(Role::Buyer)
        );
    }

    #[tokio::test]
    async fn test_bad_fund_amount_keeps_state() {
        let network = LocalNetwork::new(&MarketConfig::default());
        let mut app = app(&network);
        app.connect().await.unwrap();

        let err = app.fund_account("-1").await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_INPUT");
        assert_eq!(app.state(), AppState::FundAccount);

        for bad in ["", "1.2.3", "0.0000001"] {
            let err = app.fund_account(bad).await.unwrap_err();
            assert!(
                matches!(err, PawnError::InvalidInput { ref field, .. } if field == "amount"),
                "{bad:?} gave {err}"
            );
        }

        assert_eq!(app.skip_fund_account().unwrap(), AppState::DeployerOrAttacher);
    }

    #[tokio::test]
    async fn test_no_faucet_goes_straight_to_role_choice() {
        let network = LocalNetwork::new(&MarketConfig::default());
        network.set_faucet(false);
        let mut app = app(&network);

        assert_eq!(app.connect().await.unwrap(), AppState::DeployerOrAttacher);
        let err = app.skip_fund_account().unwrap_err();
        assert!(matches!(err, PawnError::InvalidTransition { ref session, .. } if session == "App"));
    }

    #[test]
    fn test_select_role_before_connect() {
        let network = LocalNetwork::new(&MarketConfig::default());
        let mut app = app(&network);
        let err = app.select_role(Role::Creator).unwrap_err();
        assert_eq!(err.to_string(), "App cannot select_role while in state ConnectAccount");
    }
}
