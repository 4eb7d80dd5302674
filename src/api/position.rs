use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::symbol::Symbol;
use super::transaction::option_decimal;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum HoldingType {
    Long,
    Short,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub symbol: Symbol,
    pub symbol_class: Option<String>,
    pub holding_type: Option<HoldingType>,
    #[serde(default, deserialize_with = "option_decimal")]
    pub quantity: Option<Decimal>,
    #[serde(default, rename = "costbasis", deserialize_with = "option_decimal")]
    pub cost_basis: Option<Decimal>,
    #[serde(default, deserialize_with = "option_decimal")]
    pub last_price: Option<Decimal>,
    #[serde(default, deserialize_with = "option_decimal")]
    pub today_gain_loss_dollar: Option<Decimal>,
    #[serde(default, deserialize_with = "option_decimal")]
    pub total_gain_loss_dollar: Option<Decimal>,
    pub currency: Option<String>,
}

impl Position {
    /// Quantity times last price, when both are known.
    pub fn market_value(&self) -> Option<Decimal> {
        Some(self.quantity? * self.last_price?)
    }
}
