use async_trait::async_trait;

use crate::api::base::Result;

use super::accounts::{AccountNumber, AccountOverviewResult};
use super::login::{AuthenticationResponse, LinkedLogin};
use super::transaction::TransactionHistoryResult;

/// Remote gateway as seen by a linked broker and its accounts.
///
/// Implementations decode responses into these typed results; a gateway
/// error envelope or a transport failure comes back as `Err`.
#[async_trait]
pub trait TradeItSession: Send + Sync {
    async fn authenticate(&self, linked_login: &LinkedLogin) -> Result<AuthenticationResponse>;

    /// Resume a pending authentication with the user's answer.
    async fn answer_security_question(&self, answer: &str) -> Result<AuthenticationResponse>;

    async fn get_account_overview(
        &self,
        account_number: &AccountNumber,
    ) -> Result<AccountOverviewResult>;

    async fn get_transaction_history(
        &self,
        account_number: &AccountNumber,
    ) -> Result<TransactionHistoryResult>;
}
