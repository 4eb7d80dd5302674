use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::base::{ErrorResult, Result, TradeItApiResponse, TradeItError};
use crate::client::TradeItConnector;

use super::accounts::{AccountNumber, AccountRequest};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct Symbol(pub String);

impl<T: AsRef<str>> From<T> for Symbol {
    fn from(value: T) -> Self {
        Self(value.as_ref().to_owned())
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SymbolLookupItem {
    pub symbol: Symbol,
    pub company_name: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct SymbolLookupResult {
    pub results: Option<Vec<SymbolLookupItem>>,
}

#[derive(Debug, Deserialize, Default)]
pub struct CryptoSymbolsResult {
    pub pairs: Option<Vec<String>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SymbolLookupRequest<'a> {
    query: &'a str,
    api_key: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FxSymbolsRequest<'a> {
    broker: &'a str,
    api_key: &'a str,
}

fn symbol_lookup_failure(message: &str) -> TradeItError {
    TradeItError::Api(ErrorResult::new("Symbol lookup failure", message))
}

fn parse_symbol_lookup(text: &str) -> Result<Vec<SymbolLookupItem>> {
    match serde_json::from_str::<TradeItApiResponse<SymbolLookupResult>>(text) {
        Ok(TradeItApiResponse::Success(SymbolLookupResult {
            results: Some(results),
        })) => Ok(results),
        Ok(TradeItApiResponse::Error(error)) => Err(TradeItError::Api(error)),
        _ => Err(symbol_lookup_failure(
            "Could not search for symbol. Please try again.",
        )),
    }
}

fn parse_crypto_symbols(text: &str) -> Result<Vec<String>> {
    match serde_json::from_str::<TradeItApiResponse<CryptoSymbolsResult>>(text) {
        Ok(TradeItApiResponse::Success(result)) => Ok(result.pairs.unwrap_or_default()),
        Ok(TradeItApiResponse::Error(error)) => Err(TradeItError::Api(error)),
        _ => Err(symbol_lookup_failure(
            "Could not fetch supported crypto symbols. Please try again.",
        )),
    }
}

/// The FX endpoint answers with a bare JSON array instead of an envelope.
fn parse_fx_symbols(text: &str) -> Result<Vec<String>> {
    if let Ok(symbols) = serde_json::from_str::<Vec<String>>(text) {
        return Ok(symbols);
    }
    match serde_json::from_str::<ErrorResult>(text) {
        Ok(error) => Err(TradeItError::Api(error)),
        Err(_) => Err(TradeItError::Transport(ErrorResult::new(
            "Error",
            "Failed to fetch FX symbols",
        ))),
    }
}

impl TradeItConnector {
    /// Search symbols by ticker or company name.
    ///
    /// # Example
    /// ```ignore
    /// for item in connector.symbol_lookup("app").await? {
    ///     println!("{} {}", item.symbol, item.company_name.unwrap_or_default());
    /// }
    /// ```
    pub async fn symbol_lookup(&self, query: &str) -> Result<Vec<SymbolLookupItem>> {
        let text = self
            .post_raw(
                "marketdata/symbolLookup",
                &SymbolLookupRequest {
                    query,
                    api_key: self.api_key(),
                },
            )
            .await?;
        parse_symbol_lookup(&text).map_err(|e| {
            warn!(query, error = %e, "symbol lookup failed");
            e
        })
    }

    /// Crypto pairs tradable in an account. An absent list is empty.
    pub async fn crypto_symbols(&self, account_number: &AccountNumber) -> Result<Vec<String>> {
        let token = self.session_token().await.unwrap_or_default();
        let text = self
            .post_raw(
                "brokermarketdata/getCryptoCurrencyPairs",
                &AccountRequest {
                    token: &token,
                    account_number: &account_number.0,
                    api_key: self.api_key(),
                },
            )
            .await?;
        parse_crypto_symbols(&text)
    }

    /// FX pairs supported by a broker.
    pub async fn fx_symbols(&self, broker: &str) -> Result<Vec<String>> {
        let text = self
            .post_raw(
                "brokermarketdata/getFxCurrencyPairs",
                &FxSymbolsRequest {
                    broker,
                    api_key: self.api_key(),
                },
            )
            .await?;
        parse_fx_symbols(&text)
    }
}
