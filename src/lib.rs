pub mod api;
pub mod client;

pub use api::accounts;
pub use api::accounts::{AccountNumber, CachedLinkedBrokerAccount, LinkedBrokerAccount};
pub use api::base::{AccountRefreshFailure, ErrorResult, Result, TradeItError};
pub use api::filter::{TransactionFilterType, TransactionPresenter};
pub use api::linked_broker::{
    AuthenticationOutcome, LinkedBroker, LinkedBrokerConfig, LinkedBrokerState, RefreshSummary,
};
pub use api::login::{AuthenticationResponse, LinkedLogin, SecurityQuestionResult};
pub use api::session::TradeItSession;
pub use api::transaction::{Transaction, TransactionHistoryResult, TransactionType};
pub use api::transaction_history::{TransactionHistoryHeader, TransactionHistoryResultPresenter};
pub use client::{TradeItConnector, TradeItEnvironment};
