use std::fmt::Display;

use serde::de::{DeserializeOwned, Deserializer, Error as DeError};
use serde::Deserialize;
use serde_json::Value;

use super::accounts::AccountNumber;
use super::login::SecurityQuestionResult;

/// Envelope every gateway response is wrapped in, keyed on `status`.
#[derive(Debug)]
pub enum TradeItApiResponse<T> {
    Success(T),
    InformationNeeded(SecurityQuestionResult),
    Error(ErrorResult),
}

const STATUSES: &[&str] = &["SUCCESS", "INFORMATION_NEEDED", "ERROR"];

// Decoded through `Value` so numbers keep their type under arbitrary precision.
impl<'de, T: DeserializeOwned> Deserialize<'de> for TradeItApiResponse<T> {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let status = value
            .get("status")
            .and_then(Value::as_str)
            .ok_or_else(|| D::Error::missing_field("status"))?
            .to_owned();
        match status.as_str() {
            "SUCCESS" => serde_json::from_value(value)
                .map(TradeItApiResponse::Success)
                .map_err(DeError::custom),
            "INFORMATION_NEEDED" => serde_json::from_value(value)
                .map(TradeItApiResponse::InformationNeeded)
                .map_err(DeError::custom),
            "ERROR" => serde_json::from_value(value)
                .map(TradeItApiResponse::Error)
                .map_err(DeError::custom),
            other => Err(DeError::unknown_variant(other, STATUSES)),
        }
    }
}

impl<T> TradeItApiResponse<T> {
    /// Collapse the envelope for calls where a security question is not a
    /// legal answer.
    pub fn into_result(self) -> Result<T> {
        match self {
            TradeItApiResponse::Success(data) => Ok(data),
            TradeItApiResponse::Error(error) => Err(TradeItError::Api(error)),
            TradeItApiResponse::InformationNeeded(_) => Err(TradeItError::Api(ErrorResult::new(
                "Unexpected response",
                "The gateway asked for more information on a call that does not support it.",
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawErrorResult {
    code: Option<i64>,
    short_message: Option<String>,
    #[serde(default)]
    long_messages: Option<Vec<String>>,
}

/// Structured error as shown to a user: a short title and a longer message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawErrorResult")]
pub struct ErrorResult {
    pub code: Option<i64>,
    pub title: String,
    pub message: String,
}

impl From<RawErrorResult> for ErrorResult {
    fn from(raw: RawErrorResult) -> Self {
        Self {
            code: raw.code,
            title: raw.short_message.unwrap_or_else(|| "Error".to_string()),
            message: raw.long_messages.unwrap_or_default().join(" "),
        }
    }
}

impl ErrorResult {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: None,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn not_authenticated() -> Self {
        Self::new(
            "Not authenticated",
            "This broker has not been authenticated yet.",
        )
    }

    pub fn security_question_cancelled() -> Self {
        Self::new(
            "Authentication cancelled",
            "The security question was cancelled.",
        )
    }

    pub fn timed_out(what: &str) -> Self {
        Self::new("Request timed out", format!("{what} did not complete in time."))
    }
}

impl Display for ErrorResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.title, self.message)
    }
}

/// One failed account inside an aggregate balance refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountRefreshFailure {
    pub account_number: AccountNumber,
    pub error: TradeItError,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TradeItError {
    #[error("Authentication error: {0}")]
    Authentication(ErrorResult),
    #[error("Transport error: {0}")]
    Transport(ErrorResult),
    #[error("TradeIt API error: {0}")]
    Api(ErrorResult),
    #[error("{} account refresh(es) failed", failures.len())]
    AggregateRefresh { failures: Vec<AccountRefreshFailure> },
}

impl TradeItError {
    /// The user-facing error, if this is not an aggregate.
    pub fn error_result(&self) -> Option<&ErrorResult> {
        match self {
            TradeItError::Authentication(e) | TradeItError::Transport(e) | TradeItError::Api(e) => {
                Some(e)
            }
            TradeItError::AggregateRefresh { .. } => None,
        }
    }

    pub fn is_authentication(&self) -> bool {
        matches!(self, TradeItError::Authentication(_))
    }
}

impl From<reqwest::Error> for TradeItError {
    fn from(error: reqwest::Error) -> Self {
        TradeItError::Transport(ErrorResult::new("Network error", error.to_string()))
    }
}

impl From<serde_json::Error> for TradeItError {
    fn from(error: serde_json::Error) -> Self {
        TradeItError::Transport(ErrorResult::new(
            "Could not parse response",
            error.to_string(),
        ))
    }
}

pub type Result<T> = std::result::Result<T, TradeItError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Payload {
        value: String,
    }

    #[test]
    fn test_success_deserialization() {
        let json = json!({
            "status": "SUCCESS",
            "value": "ok",
            "token": "abc"
        });

        let response: TradeItApiResponse<Payload> = serde_json::from_value(json).unwrap();
        match response {
            TradeItApiResponse::Success(p) => assert_eq!(p.value, "ok"),
            other => panic!("Expected Success variant, got {:?}", other),
        }
    }

    #[test]
    fn test_error_deserialization() {
        let json = json!({
            "status": "ERROR",
            "code": 300,
            "shortMessage": "Could Not Login",
            "longMessages": ["Check your username and password.", "Then try again."]
        });

        let response: TradeItApiResponse<Payload> = serde_json::from_value(json).unwrap();
        match response {
            TradeItApiResponse::Error(error) => {
                assert_eq!(error.code, Some(300));
                assert_eq!(error.title, "Could Not Login");
                assert_eq!(error.message, "Check your username and password. Then try again.");
            }
            other => panic!("Expected Error variant, got {:?}", other),
        }
    }

    #[test]
    fn test_error_deserialization_minimal() {
        let json = json!({ "status": "ERROR" });

        let response: TradeItApiResponse<Payload> = serde_json::from_value(json).unwrap();
        let err = response.into_result().unwrap_err();
        let result = err.error_result().unwrap();
        assert_eq!(result.code, None);
        assert_eq!(result.title, "Error");
        assert_eq!(result.message, "");
    }

    #[test]
    fn test_information_needed_is_rejected_by_into_result() {
        let json = json!({
            "status": "INFORMATION_NEEDED",
            "securityQuestion": "What is your pet's name?"
        });

        let response: TradeItApiResponse<Payload> = serde_json::from_value(json).unwrap();
        assert!(matches!(
            response.into_result(),
            Err(TradeItError::Api(_))
        ));
    }

    #[test]
    fn test_unknown_status_fails_to_parse() {
        let json = json!({ "status": "WHATEVER" });
        assert!(serde_json::from_value::<TradeItApiResponse<Payload>>(json).is_err());
    }

    #[test]
    fn test_error_result_display() {
        let error = ErrorResult::new("Title", "msg");
        assert_eq!(format!("{}", error), "Title: msg");
        assert_eq!(
            format!("{}", TradeItError::Transport(error)),
            "Transport error: Title: msg"
        );
    }

    #[test]
    fn test_aggregate_display_and_error_result() {
        let err = TradeItError::AggregateRefresh {
            failures: vec![AccountRefreshFailure {
                account_number: AccountNumber::from("123"),
                error: TradeItError::Api(ErrorResult::new("a", "b")),
            }],
        };
        assert_eq!(format!("{}", err), "1 account refresh(es) failed");
        assert!(err.error_result().is_none());
        assert!(!err.is_authentication());
    }

    #[test]
    fn test_json_error_maps_to_transport() {
        let parse_err = serde_json::from_str::<Payload>("not json").unwrap_err();
        let err: TradeItError = parse_err.into();
        assert!(matches!(err, TradeItError::Transport(_)));
    }
}
