pub mod accounts;
pub mod base;
pub mod filter;
pub mod linked_broker;
pub mod login;
pub mod position;
pub mod session;
pub mod symbol;
pub mod transaction;
pub mod transaction_history;
