use chrono::NaiveDate;
use derive_builder::Builder;
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use serde::de::{Error as DeError, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{serde_as, VecSkipError};

use super::symbol::Symbol;

/// Date assigned to transactions whose date is missing or unparseable.
pub static MISSING_DATE: Lazy<NaiveDate> =
    Lazy::new(|| NaiveDate::from_ymd_opt(1970, 1, 1).expect("1970-01-01 is a valid date"));

const DATE_FORMATS: [&str; 3] = ["%m/%d/%Y", "%Y-%m-%d", "%Y%m%d"];

/// Parse a broker date. Accepts `MM/dd/yyyy`, ISO dates and RFC 3339
/// timestamps; anything else maps to [`MISSING_DATE`].
pub fn parse_transaction_date(raw: Option<&str>) -> NaiveDate {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return *MISSING_DATE;
    };
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            chrono::DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.date_naive())
        })
        .unwrap_or(*MISSING_DATE)
}

// Helper for deserializing Option<Decimal> from numbers or strings
pub(crate) fn option_decimal<'de, D>(deserializer: D) -> std::result::Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .to_string()
            .parse::<Decimal>()
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .map(Some)
            .map_err(DeError::custom),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Ok(None)
            } else {
                trimmed
                    .parse::<Decimal>()
                    .map(Some)
                    .map_err(DeError::custom)
            }
        }
        Some(other) => Err(DeError::custom(format!(
            "Invalid type for decimal: {:?}",
            other
        ))),
    }
}

// ============================================================================
// Transaction Type
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransactionType {
    Buy,
    Sell,
    Dividend,
    Transfer,
    Fee,
    #[default]
    #[serde(other)]
    Other,
}

impl TransactionType {
    /// Map the broker's `type` and `action` strings onto a transaction type.
    /// The action wins for trades since brokers report both buys and sells as
    /// `TRADE`.
    pub fn classify(raw_type: Option<&str>, action: Option<&str>) -> Self {
        let action = action.map(str::to_ascii_uppercase);
        match action.as_deref() {
            Some(a) if a.starts_with("BUY") => return TransactionType::Buy,
            Some(a) if a.starts_with("SELL") => return TransactionType::Sell,
            _ => {}
        }

        let raw_type = raw_type.map(str::to_ascii_uppercase);
        match raw_type.as_deref() {
            Some(t) if t.starts_with("BUY") => TransactionType::Buy,
            Some(t) if t.starts_with("SELL") => TransactionType::Sell,
            Some("DIVIDEND" | "INTEREST" | "REINVESTMENT") => TransactionType::Dividend,
            Some("TRANSFER" | "DEPOSIT" | "WITHDRAWAL" | "JOURNAL") => TransactionType::Transfer,
            Some("FEE" | "COMMISSION" | "TAX") => TransactionType::Fee,
            _ => TransactionType::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Buy => "Buy",
            TransactionType::Sell => "Sell",
            TransactionType::Dividend => "Dividend",
            TransactionType::Transfer => "Transfer",
            TransactionType::Fee => "Fee",
            TransactionType::Other => "Other",
        }
    }
}

// ============================================================================
// Transaction
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTransaction {
    id: Option<String>,
    date: Option<String>,
    symbol: Option<Symbol>,
    #[serde(rename = "type")]
    raw_type: Option<String>,
    action: Option<String>,
    description: Option<String>,
    #[serde(default, deserialize_with = "option_decimal")]
    quantity: Option<Decimal>,
    #[serde(default, deserialize_with = "option_decimal")]
    price: Option<Decimal>,
    #[serde(default, deserialize_with = "option_decimal")]
    commission: Option<Decimal>,
    #[serde(default, deserialize_with = "option_decimal")]
    amount: Option<Decimal>,
    currency: Option<String>,
}

impl From<RawTransaction> for Transaction {
    fn from(raw: RawTransaction) -> Self {
        Self {
            id: raw.id,
            date: parse_transaction_date(raw.date.as_deref()),
            raw_date: raw.date,
            symbol: raw.symbol,
            transaction_type: TransactionType::classify(raw.raw_type.as_deref(), raw.action.as_deref()),
            raw_type: raw.raw_type,
            action: raw.action,
            description: raw.description,
            quantity: raw.quantity,
            price: raw.price,
            commission: raw.commission,
            amount: raw.amount,
            currency: raw.currency,
        }
    }
}

/// One trade or cash movement from an account's history. Immutable once
/// built; use [`TransactionBuilder`] to construct one by hand.
#[derive(Debug, Clone, PartialEq, Deserialize, Builder)]
#[serde(from = "RawTransaction")]
#[builder(
    setter(into, strip_option),
    build_fn(private, name = "build_fields")
)]
pub struct Transaction {
    #[builder(default)]
    id: Option<String>,
    #[builder(setter(skip), default = "*MISSING_DATE")]
    date: NaiveDate,
    #[builder(default)]
    raw_date: Option<String>,
    #[builder(default)]
    symbol: Option<Symbol>,
    #[builder(default)]
    transaction_type: TransactionType,
    #[builder(default)]
    raw_type: Option<String>,
    #[builder(default)]
    action: Option<String>,
    #[builder(default)]
    description: Option<String>,
    #[builder(default)]
    quantity: Option<Decimal>,
    #[builder(default)]
    price: Option<Decimal>,
    #[builder(default)]
    commission: Option<Decimal>,
    #[builder(default)]
    amount: Option<Decimal>,
    #[builder(default)]
    currency: Option<String>,
}

impl TransactionBuilder {
    pub fn build(&self) -> Result<Transaction, TransactionBuilderError> {
        let mut transaction = self.build_fields()?;
        transaction.date = parse_transaction_date(transaction.raw_date.as_deref());
        Ok(transaction)
    }
}

impl Transaction {
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Parsed date, [`MISSING_DATE`] when the broker sent none.
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Date exactly as the broker sent it.
    pub fn raw_date(&self) -> Option<&str> {
        self.raw_date.as_deref()
    }

    pub fn symbol(&self) -> Option<&Symbol> {
        self.symbol.as_ref()
    }

    pub fn transaction_type(&self) -> TransactionType {
        self.transaction_type
    }

    pub fn raw_type(&self) -> Option<&str> {
        self.raw_type.as_deref()
    }

    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn quantity(&self) -> Option<Decimal> {
        self.quantity
    }

    pub fn price(&self) -> Option<Decimal> {
        self.price
    }

    pub fn commission(&self) -> Option<Decimal> {
        self.commission
    }

    pub fn amount(&self) -> Option<Decimal> {
        self.amount
    }

    pub fn currency(&self) -> Option<&str> {
        self.currency.as_deref()
    }
}

// ============================================================================
// Transaction History Result
// ============================================================================

// Whole-number counts sent as integers, floats or strings. Anything else
// reads as absent so a bad count never drops the whole payload.
pub(crate) fn option_i64<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let whole = |f: f64| (f.is_finite() && f.fract() == 0.0).then_some(f as i64);
    Ok(match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().and_then(whole)),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().and_then(whole))
        }
        _ => None,
    })
}

/// Payload of a transaction history request. Entries that fail to parse are
/// dropped rather than failing the whole result.
#[serde_as]
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TransactionHistoryResult {
    #[serde_as(as = "Option<VecSkipError<_>>")]
    pub transaction_history_details_list: Option<Vec<Transaction>>,
    #[serde(default, deserialize_with = "option_i64")]
    pub number_of_days_history: Option<i64>,
    #[serde(default)]
    pub account_base_currency: Option<String>,
}

impl TransactionHistoryResult {
    pub fn new(transactions: Vec<Transaction>, number_of_days_history: i64) -> Self {
        Self {
            transaction_history_details_list: Some(transactions),
            number_of_days_history: Some(number_of_days_history),
            account_base_currency: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn test_parse_transaction_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2020, 3, 1).unwrap();
        assert_eq!(parse_transaction_date(Some("03/01/2020")), expected);
        assert_eq!(parse_transaction_date(Some("2020-03-01")), expected);
        assert_eq!(parse_transaction_date(Some("20200301")), expected);
        assert_eq!(
            parse_transaction_date(Some("2020-03-01T10:15:00-05:00")),
            expected
        );
    }

    #[test]
    fn test_parse_transaction_date_fallback() {
        assert_eq!(parse_transaction_date(None), *MISSING_DATE);
        assert_eq!(parse_transaction_date(Some("")), *MISSING_DATE);
        assert_eq!(parse_transaction_date(Some("  ")), *MISSING_DATE);
        assert_eq!(parse_transaction_date(Some("yesterday")), *MISSING_DATE);
        assert_eq!(*MISSING_DATE, NaiveDate::from_ymd_opt(1970, 1, 1).unwrap());
    }

    #[test]
    fn test_classify_by_action() {
        assert_eq!(
            TransactionType::classify(Some("TRADE"), Some("BUY")),
            TransactionType::Buy
        );
        assert_eq!(
            TransactionType::classify(Some("TRADE"), Some("buy_to_cover")),
            TransactionType::Buy
        );
        assert_eq!(
            TransactionType::classify(Some("TRADE"), Some("SELL_SHORT")),
            TransactionType::Sell
        );
        assert_eq!(
            TransactionType::classify(Some("TRADE"), None),
            TransactionType::Other
        );
    }

    #[test]
    fn test_classify_by_type() {
        assert_eq!(
            TransactionType::classify(Some("DIVIDEND"), None),
            TransactionType::Dividend
        );
        assert_eq!(
            TransactionType::classify(Some("interest"), Some("")),
            TransactionType::Dividend
        );
        assert_eq!(
            TransactionType::classify(Some("DEPOSIT"), None),
            TransactionType::Transfer
        );
        assert_eq!(
            TransactionType::classify(Some("FEE"), None),
            TransactionType::Fee
        );
        assert_eq!(
            TransactionType::classify(Some("REORG"), None),
            TransactionType::Other
        );
        assert_eq!(TransactionType::classify(None, None), TransactionType::Other);
    }

    #[test]
    fn test_transaction_full_deserialization() {
        let json = json!({
            "id": "T-1",
            "date": "03/01/2020",
            "symbol": "AAPL",
            "type": "TRADE",
            "action": "BUY",
            "description": "Bought 10 AAPL",
            "quantity": 10,
            "price": 250.5,
            "commission": "4.95",
            "amount": -2509.95,
            "currency": "USD"
        });

        let tx: Transaction = serde_json::from_value(json).unwrap();
        assert_eq!(tx.id(), Some("T-1"));
        assert_eq!(tx.date(), NaiveDate::from_ymd_opt(2020, 3, 1).unwrap());
        assert_eq!(tx.raw_date(), Some("03/01/2020"));
        assert_eq!(tx.symbol().unwrap().0, "AAPL");
        assert_eq!(tx.transaction_type(), TransactionType::Buy);
        assert_eq!(tx.raw_type(), Some("TRADE"));
        assert_eq!(tx.action(), Some("BUY"));
        assert_eq!(tx.quantity(), Some(Decimal::from(10)));
        assert_eq!(tx.price(), Some(Decimal::from_str("250.5").unwrap()));
        assert_eq!(tx.commission(), Some(Decimal::from_str("4.95").unwrap()));
        assert_eq!(tx.amount(), Some(Decimal::from_str("-2509.95").unwrap()));
        assert_eq!(tx.currency(), Some("USD"));
    }

    #[test]
    fn test_transaction_minimal_deserialization() {
        let tx: Transaction = serde_json::from_value(json!({})).unwrap();
        assert_eq!(tx.date(), *MISSING_DATE);
        assert!(tx.raw_date().is_none());
        assert!(tx.symbol().is_none());
        assert!(tx.amount().is_none());
        assert_eq!(tx.transaction_type(), TransactionType::Other);
    }

    #[test]
    fn test_transaction_builder_parses_date() {
        let tx = TransactionBuilder::default()
            .raw_date("02/01/2020")
            .transaction_type(TransactionType::Dividend)
            .amount(Decimal::from(12))
            .build()
            .unwrap();
        assert_eq!(tx.date(), NaiveDate::from_ymd_opt(2020, 2, 1).unwrap());
        assert_eq!(tx.transaction_type(), TransactionType::Dividend);
        assert_eq!(tx.amount(), Some(Decimal::from(12)));

        let undated = TransactionBuilder::default().build().unwrap();
        assert_eq!(undated.date(), *MISSING_DATE);
        assert_eq!(undated.transaction_type(), TransactionType::Other);
    }

    #[test]
    fn test_history_result_skips_malformed_entries() {
        let json = json!({
            "status": "SUCCESS",
            "numberOfDaysHistory": 60,
            "transactionHistoryDetailsList": [
                { "date": "01/01/2020", "type": "FEE", "amount": -1 },
                { "date": "01/02/2020", "amount": true },
                { "date": "01/03/2020", "type": "DIVIDEND", "amount": "3.2" }
            ]
        });

        let result: TransactionHistoryResult = serde_json::from_value(json).unwrap();
        assert_eq!(result.number_of_days_history, Some(60));
        let list = result.transaction_history_details_list.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].transaction_type(), TransactionType::Fee);
        assert_eq!(list[1].transaction_type(), TransactionType::Dividend);
    }

    #[test]
    fn test_history_days_accepts_strings_and_floats() {
        let days = |raw: Value| {
            serde_json::from_value::<TransactionHistoryResult>(json!({ "numberOfDaysHistory": raw }))
                .unwrap()
                .number_of_days_history
        };
        assert_eq!(days(json!("60")), Some(60));
        assert_eq!(days(json!(" 30 ")), Some(30));
        assert_eq!(days(json!(60.0)), Some(60));
        assert_eq!(days(json!("90.0")), Some(90));
        assert_eq!(days(json!(7.5)), None);
        assert_eq!(days(json!("sixty")), None);
        assert_eq!(days(json!(true)), None);
        assert_eq!(days(json!(null)), None);
    }

    #[test]
    fn test_history_result_absent_list() {
        let result: TransactionHistoryResult =
            serde_json::from_value(json!({ "numberOfDaysHistory": null })).unwrap();
        assert!(result.transaction_history_details_list.is_none());
        assert!(result.number_of_days_history.is_none());
    }
}
