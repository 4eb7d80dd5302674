use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::transaction::{Transaction, TransactionType};

const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionFilterType {
    #[default]
    AllTransactions,
    Trades,
    Buys,
    Sells,
    DividendsAndInterest,
    Transfers,
    Fees,
    Other,
}

impl TransactionFilterType {
    pub const ALL: [TransactionFilterType; 8] = [
        TransactionFilterType::AllTransactions,
        TransactionFilterType::Trades,
        TransactionFilterType::Buys,
        TransactionFilterType::Sells,
        TransactionFilterType::DividendsAndInterest,
        TransactionFilterType::Transfers,
        TransactionFilterType::Fees,
        TransactionFilterType::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TransactionFilterType::AllTransactions => "All Transactions",
            TransactionFilterType::Trades => "Trades",
            TransactionFilterType::Buys => "Buys",
            TransactionFilterType::Sells => "Sells",
            TransactionFilterType::DividendsAndInterest => "Dividends and Interest",
            TransactionFilterType::Transfers => "Transfers",
            TransactionFilterType::Fees => "Fees",
            TransactionFilterType::Other => "Other",
        }
    }

    fn accepts(&self, transaction_type: TransactionType) -> bool {
        match self {
            TransactionFilterType::AllTransactions => true,
            TransactionFilterType::Trades => matches!(
                transaction_type,
                TransactionType::Buy | TransactionType::Sell
            ),
            TransactionFilterType::Buys => transaction_type == TransactionType::Buy,
            TransactionFilterType::Sells => transaction_type == TransactionType::Sell,
            TransactionFilterType::DividendsAndInterest => {
                transaction_type == TransactionType::Dividend
            }
            TransactionFilterType::Transfers => transaction_type == TransactionType::Transfer,
            TransactionFilterType::Fees => transaction_type == TransactionType::Fee,
            TransactionFilterType::Other => transaction_type == TransactionType::Other,
        }
    }
}

impl fmt::Display for TransactionFilterType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Whether `transaction` is shown under `filter`. Pure and total.
///
/// The account currency is part of the signature so that broker specific
/// rules can take it into account; the built-in rules only look at the
/// transaction type.
pub fn belongs_to_filter(
    transaction: &Transaction,
    _account_currency: &str,
    filter: TransactionFilterType,
) -> bool {
    filter.accepts(transaction.transaction_type())
}

/// Display model for one transaction row.
#[derive(Debug, Clone, Copy)]
pub struct TransactionPresenter<'a> {
    transaction: &'a Transaction,
    account_currency: &'a str,
}

impl<'a> TransactionPresenter<'a> {
    pub fn new(transaction: &'a Transaction, account_currency: &'a str) -> Self {
        Self {
            transaction,
            account_currency,
        }
    }

    pub fn transaction(&self) -> &'a Transaction {
        self.transaction
    }

    pub fn belongs_to_filter(&self, filter: TransactionFilterType) -> bool {
        belongs_to_filter(self.transaction, self.account_currency, filter)
    }

    /// Transaction currency, falling back to the account base currency.
    pub fn effective_currency(&self) -> &'a str {
        self.transaction.currency().unwrap_or(self.account_currency)
    }

    pub fn amount_label(&self) -> String {
        match self.transaction.amount() {
            Some(amount) => format!("{:.2} {}", amount, self.effective_currency()),
            None => NOT_AVAILABLE.to_string(),
        }
    }

    pub fn quantity_label(&self) -> String {
        self.transaction
            .quantity()
            .map(|q| q.normalize().to_string())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    }

    pub fn date_label(&self) -> &'a str {
        self.transaction.raw_date().unwrap_or(NOT_AVAILABLE)
    }

    pub fn description_label(&self) -> &'a str {
        self.transaction.description().unwrap_or("")
    }

    pub fn symbol_label(&self) -> &'a str {
        self.transaction
            .symbol()
            .map(|s| s.0.as_str())
            .unwrap_or(NOT_AVAILABLE)
    }

    pub fn type_label(&self) -> &'a str {
        self.transaction.transaction_type().as_str()
    }

    pub fn is_debit(&self) -> bool {
        self.transaction
            .amount()
            .map(|a| a < Decimal::ZERO)
            .unwrap_or(false)
    }
}
