use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::api::base::{AccountRefreshFailure, ErrorResult, Result, TradeItError};

use super::accounts::{mask_account, AccountNumber, AccountOverviewResult, LinkedBrokerAccount};
use super::login::{AuthenticationResponse, LinkedLogin, SecurityQuestionResult};
use super::session::TradeItSession;

/// Where a linked broker is in its authentication lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkedBrokerState {
    /// Initial state; nothing has been attempted yet.
    Unauthenticated,
    Authenticating,
    /// Waiting for [`LinkedBroker::answer_security_question`] or
    /// [`LinkedBroker::cancel_security_question`].
    SecurityQuestionPending(SecurityQuestionResult),
    Authenticated,
    /// Last authentication or balance refresh failed.
    Failed(TradeItError),
}

/// Successful outcomes of an authentication attempt. Failures are the `Err`
/// side of the returned `Result`.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthenticationOutcome {
    Authenticated,
    SecurityQuestion(SecurityQuestionResult),
}

/// Configuration for a linked broker
#[derive(Debug, Clone, Default)]
pub struct LinkedBrokerConfig {
    /// Per-account limit for an overview call during a balance refresh.
    /// `None` waits indefinitely, so one hung call holds up the whole refresh.
    pub refresh_timeout: Option<Duration>,
}

/// What happened during one balance refresh.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RefreshSummary {
    pub refreshed: Vec<AccountNumber>,
    pub failures: Vec<AccountRefreshFailure>,
}

impl RefreshSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of accounts that reported.
    pub fn total(&self) -> usize {
        self.refreshed.len() + self.failures.len()
    }
}

/// One authenticated session to a broker and the accounts under it.
pub struct LinkedBroker {
    session: Arc<dyn TradeItSession>,
    linked_login: LinkedLogin,
    accounts: Vec<LinkedBrokerAccount>,
    state: LinkedBrokerState,
    config: LinkedBrokerConfig,
}

impl fmt::Debug for LinkedBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkedBroker")
            .field("linked_login", &self.linked_login)
            .field("accounts", &self.accounts)
            .field("state", &self.state)
            .field("config", &self.config)
            .finish()
    }
}

impl LinkedBroker {
    pub fn new(session: Arc<dyn TradeItSession>, linked_login: LinkedLogin) -> Self {
        Self::with_config(session, linked_login, LinkedBrokerConfig::default())
    }

    pub fn with_config(
        session: Arc<dyn TradeItSession>,
        linked_login: LinkedLogin,
        config: LinkedBrokerConfig,
    ) -> Self {
        Self {
            session,
            linked_login,
            accounts: Vec::new(),
            state: LinkedBrokerState::Unauthenticated,
            config,
        }
    }

    pub fn session(&self) -> &Arc<dyn TradeItSession> {
        &self.session
    }

    pub fn linked_login(&self) -> &LinkedLogin {
        &self.linked_login
    }

    pub fn broker_name(&self) -> &str {
        &self.linked_login.broker
    }

    pub fn state(&self) -> &LinkedBrokerState {
        &self.state
    }

    /// The error to show for this broker, `None` once authenticated and the
    /// last refresh (if any) succeeded. A broker that never completed an
    /// authentication always reports one.
    pub fn error(&self) -> Option<TradeItError> {
        match &self.state {
            LinkedBrokerState::Authenticated => None,
            LinkedBrokerState::Failed(error) => Some(error.clone()),
            LinkedBrokerState::Unauthenticated
            | LinkedBrokerState::Authenticating
            | LinkedBrokerState::SecurityQuestionPending(_) => Some(TradeItError::Authentication(
                ErrorResult::not_authenticated(),
            )),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == LinkedBrokerState::Authenticated
    }

    pub fn accounts(&self) -> &[LinkedBrokerAccount] {
        &self.accounts
    }

    pub fn accounts_mut(&mut self) -> &mut [LinkedBrokerAccount] {
        &mut self.accounts
    }

    pub fn set_accounts(&mut self, accounts: Vec<LinkedBrokerAccount>) {
        self.accounts = accounts;
    }

    pub fn enabled_accounts(&self) -> impl Iterator<Item = &LinkedBrokerAccount> {
        self.accounts.iter().filter(|a| a.is_enabled)
    }

    /// Authenticate against the session. On success the accounts are
    /// replaced, in order, by the ones in the response.
    ///
    /// The broker is `Authenticating` while the call is in flight. Dropping
    /// the returned future before it finishes restores the previous state.
    pub async fn authenticate(&mut self) -> Result<AuthenticationOutcome> {
        info!(broker = %self.linked_login.broker, "authenticating linked broker");
        let pending = RestoreOnDrop::begin(&mut self.state);
        let response = self.session.authenticate(&self.linked_login).await;
        pending.complete();
        self.handle_authentication_response(response)
    }

    /// Resume a pending authentication. Rejected without calling the session
    /// when no security question is pending. Dropping the future mid-call
    /// leaves the question pending.
    pub async fn answer_security_question(&mut self, answer: &str) -> Result<AuthenticationOutcome> {
        if !matches!(self.state, LinkedBrokerState::SecurityQuestionPending(_)) {
            return Err(TradeItError::Authentication(ErrorResult::new(
                "No security question",
                "There is no security question waiting for an answer.",
            )));
        }

        info!(broker = %self.linked_login.broker, "answering security question");
        let pending = RestoreOnDrop::begin(&mut self.state);
        let response = self.session.answer_security_question(answer).await;
        pending.complete();
        self.handle_authentication_response(response)
    }

    /// Give up on a pending security question. Returns the cancellation error
    /// the broker now reports, or `None` if nothing was pending.
    pub fn cancel_security_question(&mut self) -> Option<TradeItError> {
        if !matches!(self.state, LinkedBrokerState::SecurityQuestionPending(_)) {
            return None;
        }
        let error = TradeItError::Authentication(ErrorResult::security_question_cancelled());
        info!(broker = %self.linked_login.broker, "security question cancelled");
        self.state = LinkedBrokerState::Failed(error.clone());
        Some(error)
    }

    fn handle_authentication_response(
        &mut self,
        response: Result<AuthenticationResponse>,
    ) -> Result<AuthenticationOutcome> {
        match response {
            Ok(AuthenticationResponse::Success(result)) => {
                let broker_name = self.linked_login.broker.clone();
                self.accounts = result
                    .accounts
                    .into_iter()
                    .map(|account| {
                        LinkedBrokerAccount::from_broker_account(
                            account,
                            &broker_name,
                            Arc::clone(&self.session),
                        )
                    })
                    .collect();
                self.state = LinkedBrokerState::Authenticated;
                info!(
                    broker = %broker_name,
                    accounts = self.accounts.len(),
                    "linked broker authenticated"
                );
                Ok(AuthenticationOutcome::Authenticated)
            }
            Ok(AuthenticationResponse::SecurityQuestion(question)) => {
                info!(broker = %self.linked_login.broker, "security question required");
                self.state = LinkedBrokerState::SecurityQuestionPending(question.clone());
                Ok(AuthenticationOutcome::SecurityQuestion(question))
            }
            Err(error) => {
                warn!(broker = %self.linked_login.broker, error = %error, "authentication failed");
                self.state = LinkedBrokerState::Failed(error.clone());
                Err(error)
            }
        }
    }

    /// Refresh every account's overview concurrently and return once all of
    /// them have reported. Failed accounts keep their previous balances and
    /// never stop the other accounts from refreshing.
    ///
    /// Only an authenticated broker changes state: any failure moves it to
    /// [`LinkedBrokerState::Failed`] with one entry per failed account, and a
    /// refresh where every account succeeds moves it back to `Authenticated`.
    /// In every other state (not yet authenticated, a pending security
    /// question, a failed authentication) the state is left alone and the
    /// outcome is only reported through the returned summary.
    pub async fn refresh_account_balances(&mut self) -> RefreshSummary {
        let total = self.accounts.len();
        if total == 0 {
            debug!(broker = %self.linked_login.broker, "no accounts to refresh");
            return RefreshSummary::default();
        }

        let (sender, receiver) = flume::unbounded::<(usize, Result<AccountOverviewResult>)>();
        for (index, account) in self.accounts.iter().enumerate() {
            let request = account.get_account_overview();
            let sender = sender.clone();
            let timeout = self.config.refresh_timeout;
            tokio::spawn(async move {
                let result = match timeout {
                    Some(limit) => tokio::time::timeout(limit, request)
                        .await
                        .unwrap_or_else(|_| {
                            Err(TradeItError::Transport(ErrorResult::timed_out(
                                "Account overview",
                            )))
                        }),
                    None => request.await,
                };
                let _ = sender.send_async((index, result)).await;
            });
        }
        // receiver disconnects once every task is done with its sender
        drop(sender);

        let mut reported = vec![false; total];
        let mut completed = 0;
        let mut summary = RefreshSummary::default();
        while completed < total {
            let Ok((index, result)) = receiver.recv_async().await else {
                break;
            };
            if std::mem::replace(&mut reported[index], true) {
                continue;
            }
            completed += 1;

            let account = &mut self.accounts[index];
            match result {
                Ok(overview) => {
                    debug!(account = %mask_account(&account.account_number.0), "account refreshed");
                    account.apply_overview(overview);
                    summary.refreshed.push(account.account_number.clone());
                }
                Err(error) => {
                    warn!(
                        account = %mask_account(&account.account_number.0),
                        error = %error,
                        "account refresh failed"
                    );
                    summary.failures.push(AccountRefreshFailure {
                        account_number: account.account_number.clone(),
                        error,
                    });
                }
            }
        }

        // a task that died without reporting still counts as a failure
        for (index, _) in reported.iter().enumerate().filter(|(_, done)| !**done) {
            summary.failures.push(AccountRefreshFailure {
                account_number: self.accounts[index].account_number.clone(),
                error: TradeItError::Transport(ErrorResult::new(
                    "Refresh aborted",
                    "The account refresh ended without a result.",
                )),
            });
        }

        self.record_refresh(&summary);
        summary
    }

    /// Callback form of [`refresh_account_balances`](Self::refresh_account_balances):
    /// `on_finished` runs exactly once, after every account has reported.
    pub async fn refresh_account_balances_with<F>(&mut self, on_finished: F)
    where
        F: FnOnce(&RefreshSummary),
    {
        let summary = self.refresh_account_balances().await;
        on_finished(&summary);
    }

    fn record_refresh(&mut self, summary: &RefreshSummary) {
        info!(
            broker = %self.linked_login.broker,
            refreshed = summary.refreshed.len(),
            failed = summary.failures.len(),
            "account balances refreshed"
        );

        // only a broker that completed authentication tracks refresh health
        let tracks_refresh = matches!(
            self.state,
            LinkedBrokerState::Authenticated
                | LinkedBrokerState::Failed(TradeItError::AggregateRefresh { .. })
        );
        if !tracks_refresh {
            return;
        }

        self.state = if summary.is_success() {
            LinkedBrokerState::Authenticated
        } else {
            LinkedBrokerState::Failed(TradeItError::AggregateRefresh {
                failures: summary.failures.clone(),
            })
        };
    }
}

/// Puts the broker back in its previous state if a session call is dropped
/// before it answers.
struct RestoreOnDrop<'a> {
    state: &'a mut LinkedBrokerState,
    previous: Option<LinkedBrokerState>,
}

impl<'a> RestoreOnDrop<'a> {
    fn begin(state: &'a mut LinkedBrokerState) -> Self {
        let previous = std::mem::replace(state, LinkedBrokerState::Authenticating);
        Self {
            state,
            previous: Some(previous),
        }
    }

    fn complete(mut self) {
        self.previous = None;
    }
}

impl Drop for RestoreOnDrop<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            debug!("authentication call dropped, restoring previous state");
            *self.state = previous;
        }
    }
}
