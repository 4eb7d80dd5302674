use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::Barrier;
use tradeit_rs::api::accounts::{AccountNumber, AccountOverview, AccountOverviewResult, BrokerAccount};
use tradeit_rs::api::login::{AuthenticationResponse, AuthenticationResult, LinkedLogin};
use tradeit_rs::api::transaction::TransactionHistoryResult;
use tradeit_rs::{ErrorResult, Result, TradeItError, TradeItSession};

/// How the fake answers an overview call for one account.
#[allow(dead_code)]
#[derive(Clone)]
pub enum Overview {
    Succeed(AccountOverviewResult),
    Fail(TradeItError),
    /// Never completes.
    Hang,
    /// Waits until every holder of the barrier arrives, then succeeds.
    WaitAt(Arc<Barrier>),
}

/// Scripted session. Authentication answers are consumed in order; overview
/// answers are looked up per account and default to a success.
#[allow(dead_code)]
#[derive(Default)]
pub struct FakeSession {
    auth_responses: Mutex<VecDeque<Result<AuthenticationResponse>>>,
    overviews: Mutex<HashMap<AccountNumber, Overview>>,
    history: Mutex<Option<TransactionHistoryResult>>,
    calls: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl FakeSession {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_auth(&self, response: Result<AuthenticationResponse>) {
        self.auth_responses.lock().unwrap().push_back(response);
    }

    pub fn set_overview(&self, account_number: &str, overview: Overview) {
        self.overviews
            .lock()
            .unwrap()
            .insert(AccountNumber::from(account_number), overview);
    }

    pub fn set_history(&self, history: TransactionHistoryResult) {
        *self.history.lock().unwrap() = Some(history);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, call: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == call).count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn next_auth(&self) -> Result<AuthenticationResponse> {
        self.auth_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TradeItError::Authentication(ErrorResult::new("Fake", "no scripted response"))))
    }
}

#[async_trait]
impl TradeItSession for FakeSession {
    async fn authenticate(&self, linked_login: &LinkedLogin) -> Result<AuthenticationResponse> {
        self.record(format!("authenticate:{}", linked_login.user_id));
        self.next_auth()
    }

    async fn answer_security_question(&self, answer: &str) -> Result<AuthenticationResponse> {
        self.record(format!("answer:{answer}"));
        self.next_auth()
    }

    async fn get_account_overview(
        &self,
        account_number: &AccountNumber,
    ) -> Result<AccountOverviewResult> {
        self.record(format!("overview:{account_number}"));
        let behaviour = self.overviews.lock().unwrap().get(account_number).cloned();
        match behaviour {
            None => Ok(overview_with_total(100)),
            Some(Overview::Succeed(result)) => Ok(result),
            Some(Overview::Fail(error)) => Err(error),
            Some(Overview::Hang) => std::future::pending().await,
            Some(Overview::WaitAt(barrier)) => {
                barrier.wait().await;
                Ok(overview_with_total(1))
            }
        }
    }

    async fn get_transaction_history(
        &self,
        account_number: &AccountNumber,
    ) -> Result<TransactionHistoryResult> {
        self.record(format!("history:{account_number}"));
        Ok(self.history.lock().unwrap().clone().unwrap_or_default())
    }
}

#[allow(dead_code)]
pub fn dummy_login() -> LinkedLogin {
    LinkedLogin::new("My Dummy", "Dummy", "dummy-user", "keychain-1")
}

#[allow(dead_code)]
pub fn success_with_accounts(accounts: &[(&str, &str)]) -> Result<AuthenticationResponse> {
    Ok(AuthenticationResponse::Success(AuthenticationResult {
        token: Some("session-token".to_string()),
        accounts: accounts
            .iter()
            .map(|(number, name)| BrokerAccount {
                account_number: AccountNumber::from(*number),
                name: name.to_string(),
                account_index: None,
                account_base_currency: None,
                tradable: true,
            })
            .collect(),
    }))
}

#[allow(dead_code)]
pub fn overview_with_total(total: i64) -> AccountOverviewResult {
    AccountOverviewResult {
        balance: Some(AccountOverview {
            total_value: Some(Decimal::from(total)),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[allow(dead_code)]
pub fn api_error(title: &str) -> TradeItError {
    TradeItError::Api(ErrorResult::new(title, "scripted failure"))
}

/// Environment variable helpers for live tests
pub mod env {
    use std::env;

    /// `TRADEIT_API_KEY`, `TRADEIT_USER_ID` and `TRADEIT_USER_TOKEN`.
    /// Returns None if not available (tests should be skipped)
    #[allow(dead_code)]
    pub fn sandbox_credentials() -> Option<(String, String, String)> {
        Some((
            env::var("TRADEIT_API_KEY").ok()?,
            env::var("TRADEIT_USER_ID").ok()?,
            env::var("TRADEIT_USER_TOKEN").ok()?,
        ))
    }
}

/// Async test utilities
#[allow(dead_code)]
pub mod async_utils {
    use std::time::Duration;

    pub async fn with_timeout<F, T>(
        duration: Duration,
        future: F,
    ) -> Result<T, tokio::time::error::Elapsed>
    where
        F: std::future::Future<Output = T>,
    {
        tokio::time::timeout(duration, future).await
    }

    /// Bound for calls that are expected to finish promptly.
    pub const SHORT_TIMEOUT: Duration = Duration::from_secs(5);
    /// Used to show that a call has not finished.
    pub const NEVER_TIMEOUT: Duration = Duration::from_millis(200);
    pub const INTEGRATION_TIMEOUT: Duration = Duration::from_secs(30);
}
