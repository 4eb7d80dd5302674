use serde::Serialize;
use tracing::debug;

use super::filter::{belongs_to_filter, TransactionFilterType, TransactionPresenter};
use super::transaction::{Transaction, TransactionHistoryResult};

/// Data for the header above the transaction list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionHistoryHeader {
    pub number_of_days: i64,
    pub filter_type: TransactionFilterType,
}

/// Holds one transaction history result: the full list sorted newest first,
/// and the subset matching the active filter.
///
/// Sorting is done once, on the parsed date of each transaction. Transactions
/// without a usable date carry [`MISSING_DATE`](super::transaction::MISSING_DATE)
/// and therefore sort last. Equal dates keep the order the broker sent.
/// The broker's raw date strings are never compared with each other, so lists
/// mixing date formats still order chronologically.
///
/// Missing or malformed data never produces an error: an absent list is an
/// empty history and an absent day count is zero.
#[derive(Debug, Clone)]
pub struct TransactionHistoryResultPresenter {
    transactions: Vec<Transaction>,
    transactions_filtered: Vec<Transaction>,
    number_of_days: i64,
    account_base_currency: String,
    filter_type: TransactionFilterType,
}

impl TransactionHistoryResultPresenter {
    pub fn new(result: TransactionHistoryResult, account_base_currency: impl Into<String>) -> Self {
        let mut transactions = result.transaction_history_details_list.unwrap_or_default();
        // stable: equal dates keep input order
        transactions.sort_by(|a, b| b.date().cmp(&a.date()));

        debug!(
            count = transactions.len(),
            days = result.number_of_days_history.unwrap_or(0),
            "loaded transaction history"
        );

        Self {
            transactions_filtered: transactions.clone(),
            transactions,
            number_of_days: result.number_of_days_history.unwrap_or(0),
            account_base_currency: account_base_currency.into(),
            filter_type: TransactionFilterType::AllTransactions,
        }
    }

    pub fn number_of_rows(&self) -> usize {
        self.transactions_filtered.len()
    }

    /// One section while anything matches the active filter, none otherwise.
    pub fn number_of_sections(&self) -> usize {
        if self.transactions_filtered.is_empty() {
            0
        } else {
            1
        }
    }

    /// Whether the history holds any transaction at all, regardless of filter.
    pub fn has_results(&self) -> bool {
        !self.transactions.is_empty()
    }

    /// Make `filter_type` the active filter and recompute the visible rows.
    pub fn filter_transactions(&mut self, filter_type: TransactionFilterType) {
        self.filter_type = filter_type;
        self.transactions_filtered = self.transactions_for(filter_type).cloned().collect();
        debug!(
            filter = %filter_type,
            rows = self.transactions_filtered.len(),
            "filtered transaction history"
        );
    }

    /// How many rows `filter_type` would show, without switching to it.
    pub fn number_of_transactions(&self, filter_type: TransactionFilterType) -> usize {
        self.transactions_for(filter_type).count()
    }

    /// Transaction at `row` of the filtered list.
    pub fn transaction(&self, row: usize) -> Option<&Transaction> {
        self.transactions_filtered.get(row)
    }

    /// Display model for `row` of the filtered list.
    pub fn row(&self, row: usize) -> Option<TransactionPresenter<'_>> {
        self.transaction(row)
            .map(|t| TransactionPresenter::new(t, &self.account_base_currency))
    }

    pub fn header(&self) -> TransactionHistoryHeader {
        TransactionHistoryHeader {
            number_of_days: self.number_of_days,
            filter_type: self.filter_type,
        }
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn transactions_filtered(&self) -> &[Transaction] {
        &self.transactions_filtered
    }

    pub fn filter_type(&self) -> TransactionFilterType {
        self.filter_type
    }

    pub fn number_of_days(&self) -> i64 {
        self.number_of_days
    }

    pub fn account_base_currency(&self) -> &str {
        &self.account_base_currency
    }

    fn transactions_for(
        &self,
        filter_type: TransactionFilterType,
    ) -> impl Iterator<Item = &Transaction> + '_ {
        self.transactions
            .iter()
            .filter(move |t| belongs_to_filter(t, &self.account_base_currency, filter_type))
    }
}
