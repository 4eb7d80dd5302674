use serde::{Deserialize, Serialize};

use super::accounts::BrokerAccount;

/// Identity of a linked broker login. The core never interprets these
/// fields; they are handed to the session untouched.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LinkedLogin {
    pub label: String,
    pub broker: String,
    pub user_id: String,
    pub keychain_id: String,
}

impl LinkedLogin {
    pub fn new(
        label: impl Into<String>,
        broker: impl Into<String>,
        user_id: impl Into<String>,
        keychain_id: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            broker: broker.into(),
            user_id: user_id.into(),
            keychain_id: keychain_id.into(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AuthenticationRequest<'a> {
    pub user_token: &'a str,
    pub user_id: &'a str,
    pub api_key: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SecurityAnswerRequest<'a> {
    pub token: &'a str,
    pub security_answer: &'a str,
    pub api_key: &'a str,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationResult {
    pub token: Option<String>,
    #[serde(default)]
    pub accounts: Vec<BrokerAccount>,
}

/// Challenge returned instead of a definitive authentication answer.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SecurityQuestionResult {
    pub token: Option<String>,
    pub security_question: Option<String>,
    #[serde(default)]
    pub security_question_options: Vec<String>,
    pub challenge_image: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthenticationResponse {
    Success(AuthenticationResult),
    SecurityQuestion(SecurityQuestionResult),
}
