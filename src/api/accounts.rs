use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::base::Result;

use super::position::Position;
use super::session::TradeItSession;
use super::transaction::option_decimal;
use super::transaction_history::TransactionHistoryResultPresenter;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Clone)]
#[serde(transparent)]
pub struct AccountNumber(pub String);

impl<T: AsRef<str>> From<T> for AccountNumber {
    fn from(value: T) -> Self {
        Self(value.as_ref().to_owned())
    }
}

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Mask account number for logging (shows first 3 and last 2 chars)
pub(crate) fn mask_account(account: &str) -> String {
    if account.len() <= 5 || !account.is_ascii() {
        "***".to_string()
    } else {
        format!("{}***{}", &account[..3], &account[account.len() - 2..])
    }
}

/// Account as listed in an authentication response.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BrokerAccount {
    pub account_number: AccountNumber,
    pub name: String,
    #[serde(default)]
    pub account_index: Option<String>,
    #[serde(default)]
    pub account_base_currency: Option<String>,
    #[serde(default)]
    pub tradable: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AccountOverview {
    #[serde(default, deserialize_with = "option_decimal")]
    pub available_cash: Option<Decimal>,
    #[serde(default, deserialize_with = "option_decimal")]
    pub buying_power: Option<Decimal>,
    #[serde(default, deserialize_with = "option_decimal")]
    pub total_value: Option<Decimal>,
    #[serde(default, deserialize_with = "option_decimal")]
    pub day_absolute_return: Option<Decimal>,
    #[serde(default, deserialize_with = "option_decimal")]
    pub day_percent_return: Option<Decimal>,
    #[serde(default, deserialize_with = "option_decimal")]
    pub total_absolute_return: Option<Decimal>,
    #[serde(default, deserialize_with = "option_decimal")]
    pub total_percent_return: Option<Decimal>,
    pub account_base_currency: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct FxAccountOverview {
    #[serde(default, deserialize_with = "option_decimal")]
    pub total_value_base_currency: Option<Decimal>,
    #[serde(default, rename = "totalValueUSD", deserialize_with = "option_decimal")]
    pub total_value_usd: Option<Decimal>,
    #[serde(default, deserialize_with = "option_decimal")]
    pub buying_power_base_currency: Option<Decimal>,
    #[serde(default, deserialize_with = "option_decimal")]
    pub unrealized_profit_and_loss_base_currency: Option<Decimal>,
    #[serde(default, deserialize_with = "option_decimal")]
    pub realized_profit_and_loss_base_currency: Option<Decimal>,
    #[serde(default, deserialize_with = "option_decimal")]
    pub margin_balance_base_currency: Option<Decimal>,
}

/// Snapshot returned by one overview call.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AccountOverviewResult {
    #[serde(rename = "accountOverview")]
    pub balance: Option<AccountOverview>,
    #[serde(rename = "fxAccountOverview")]
    pub fx_balance: Option<FxAccountOverview>,
    #[serde(default)]
    pub positions: Vec<Position>,
}

/// Request body shared by the per-account calls.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AccountRequest<'a> {
    pub token: &'a str,
    pub account_number: &'a str,
    pub api_key: &'a str,
}

/// One account under a linked broker. Balances stay empty until the owning
/// [`LinkedBroker`](super::linked_broker::LinkedBroker) refreshes them.
#[derive(Clone)]
pub struct LinkedBrokerAccount {
    pub account_number: AccountNumber,
    pub account_name: String,
    pub account_index: Option<String>,
    pub account_base_currency: String,
    pub broker_name: String,
    pub tradable: bool,
    pub is_enabled: bool,
    pub balance: Option<AccountOverview>,
    pub fx_balance: Option<FxAccountOverview>,
    pub positions: Vec<Position>,
    pub balance_last_updated: Option<DateTime<Utc>>,
    session: Arc<dyn TradeItSession>,
}

impl fmt::Debug for LinkedBrokerAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkedBrokerAccount")
            .field("account_number", &mask_account(&self.account_number.0))
            .field("account_name", &self.account_name)
            .field("broker_name", &self.broker_name)
            .field("balance", &self.balance)
            .field("fx_balance", &self.fx_balance)
            .field("positions", &self.positions.len())
            .finish()
    }
}

pub const DEFAULT_BASE_CURRENCY: &str = "USD";

impl LinkedBrokerAccount {
    pub fn new(
        account_number: impl Into<AccountNumber>,
        account_name: impl Into<String>,
        broker_name: impl Into<String>,
        session: Arc<dyn TradeItSession>,
    ) -> Self {
        Self {
            account_number: account_number.into(),
            account_name: account_name.into(),
            account_index: None,
            account_base_currency: DEFAULT_BASE_CURRENCY.to_string(),
            broker_name: broker_name.into(),
            tradable: true,
            is_enabled: true,
            balance: None,
            fx_balance: None,
            positions: Vec::new(),
            balance_last_updated: None,
            session,
        }
    }

    pub(crate) fn from_broker_account(
        account: BrokerAccount,
        broker_name: &str,
        session: Arc<dyn TradeItSession>,
    ) -> Self {
        Self {
            account_index: account.account_index,
            account_base_currency: account
                .account_base_currency
                .unwrap_or_else(|| DEFAULT_BASE_CURRENCY.to_string()),
            tradable: account.tradable,
            ..Self::new(account.account_number, account.name, broker_name, session)
        }
    }

    /// Issue one overview call for this account. The returned future owns
    /// everything it needs, so it can be spawned. The account itself is not
    /// touched; see [`apply_overview`](Self::apply_overview).
    pub fn get_account_overview(&self) -> BoxFuture<'static, Result<AccountOverviewResult>> {
        let session = Arc::clone(&self.session);
        let account_number = self.account_number.clone();
        Box::pin(async move {
            debug!(account = %mask_account(&account_number.0), "requesting account overview");
            session.get_account_overview(&account_number).await
        })
    }

    pub fn apply_overview(&mut self, overview: AccountOverviewResult) {
        self.balance = overview.balance;
        self.fx_balance = overview.fx_balance;
        self.positions = overview.positions;
        self.balance_last_updated = Some(Utc::now());
    }

    /// Fetch the transaction history and wrap it in a presenter using this
    /// account's base currency.
    pub async fn transaction_history(&self) -> Result<TransactionHistoryResultPresenter> {
        let result = self
            .session
            .get_transaction_history(&self.account_number)
            .await?;
        let currency = result
            .account_base_currency
            .clone()
            .unwrap_or_else(|| self.account_base_currency.clone());
        Ok(TransactionHistoryResultPresenter::new(result, currency))
    }

    pub fn to_cache(&self) -> CachedLinkedBrokerAccount {
        CachedLinkedBrokerAccount {
            account_name: self.account_name.clone(),
            account_number: self.account_number.clone(),
            account_index: self.account_index.clone(),
            account_base_currency: self.account_base_currency.clone(),
            balance_last_updated: self.balance_last_updated,
            balance: self.balance.clone(),
            fx_balance: self.fx_balance.clone(),
            is_enabled: self.is_enabled,
        }
    }

    /// Rebuild an account from its cached form. Positions are not cached.
    pub fn from_cache(
        cached: CachedLinkedBrokerAccount,
        broker_name: impl Into<String>,
        session: Arc<dyn TradeItSession>,
    ) -> Self {
        Self {
            account_index: cached.account_index,
            account_base_currency: cached.account_base_currency,
            is_enabled: cached.is_enabled,
            balance: cached.balance,
            fx_balance: cached.fx_balance,
            balance_last_updated: cached.balance_last_updated,
            ..Self::new(cached.account_number, cached.account_name, broker_name, session)
        }
    }
}

/// Serializable snapshot of a linked account, used to show the last known
/// balances before the first refresh.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CachedLinkedBrokerAccount {
    pub account_name: String,
    pub account_number: AccountNumber,
    pub account_index: Option<String>,
    pub account_base_currency: String,
    pub balance_last_updated: Option<DateTime<Utc>>,
    pub balance: Option<AccountOverview>,
    pub fx_balance: Option<FxAccountOverview>,
    #[serde(default = "enabled_by_default")]
    pub is_enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}
