use async_trait::async_trait;
use reqwest::header;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use reqwest::ClientBuilder;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;
use url::Url;

use crate::api::accounts::{mask_account, AccountNumber, AccountOverviewResult, AccountRequest};
use crate::api::base::{ErrorResult, Result, TradeItApiResponse, TradeItError};
use crate::api::login::{
    AuthenticationRequest, AuthenticationResponse, AuthenticationResult, LinkedLogin,
    SecurityAnswerRequest,
};
use crate::api::session::TradeItSession;
use crate::api::transaction::TransactionHistoryResult;

pub const BASE_URL: &str = "https://ems.tradingticket.com";
pub const BASE_SANDBOX_URL: &str = "https://ems.qa.tradingticket.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TradeItEnvironment {
    #[default]
    Production,
    Sandbox,
}

impl TradeItEnvironment {
    pub fn base_url(&self) -> &'static str {
        match self {
            TradeItEnvironment::Production => BASE_URL,
            TradeItEnvironment::Sandbox => BASE_SANDBOX_URL,
        }
    }
}

/// HTTP connection to the TradeIt gateway for one linked login.
///
/// Every call is a JSON `POST` to `{base}/api/v2/{ems_action}`. The session
/// token handed out by a successful authentication (or a security question)
/// is kept here and sent with the calls that need it.
pub struct TradeItConnector {
    pub(crate) client: reqwest::Client,
    api_key: String,
    user_token: String,
    base_url: Url,
    environment: TradeItEnvironment,
    session_token: RwLock<Option<String>>,
}

impl std::fmt::Debug for TradeItConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradeItConnector")
            .field("base_url", &self.base_url.as_str())
            .field("environment", &self.environment)
            .finish()
    }
}

impl TradeItConnector {
    pub fn new(
        api_key: impl Into<String>,
        user_token: impl Into<String>,
        environment: TradeItEnvironment,
    ) -> Result<Self> {
        let base_url = Url::parse(environment.base_url()).map_err(|e| {
            TradeItError::Transport(ErrorResult::new("Invalid base URL", e.to_string()))
        })?;
        Self::build(api_key.into(), user_token.into(), base_url, environment)
    }

    /// Point the connector at another host, e.g. a local mock gateway.
    pub fn with_base_url(
        api_key: impl Into<String>,
        user_token: impl Into<String>,
        base_url: &str,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            TradeItError::Transport(ErrorResult::new("Invalid base URL", e.to_string()))
        })?;
        Self::build(
            api_key.into(),
            user_token.into(),
            base_url,
            TradeItEnvironment::Sandbox,
        )
    }

    fn build(
        api_key: String,
        user_token: String,
        base_url: Url,
        environment: TradeItEnvironment,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(header::USER_AGENT, HeaderValue::from_static("tradeit-rs"));
        let client = ClientBuilder::new().default_headers(headers).build()?;

        Ok(Self {
            client,
            api_key,
            user_token,
            base_url,
            environment,
            session_token: RwLock::new(None),
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn environment(&self) -> TradeItEnvironment {
        self.environment
    }

    pub async fn session_token(&self) -> Option<String> {
        self.session_token.read().await.clone()
    }

    async fn set_session_token(&self, token: Option<String>) {
        if token.is_some() {
            *self.session_token.write().await = token;
        }
    }

    async fn require_token(&self) -> Result<String> {
        self.session_token()
            .await
            .ok_or_else(|| TradeItError::Authentication(ErrorResult::not_authenticated()))
    }

    fn endpoint(&self, ems_action: &str) -> Result<Url> {
        self.base_url
            .join(&format!("api/v2/{ems_action}"))
            .map_err(|e| TradeItError::Transport(ErrorResult::new("Invalid URL", e.to_string())))
    }

    /// Send a request and return the raw body, for endpoints that do not use
    /// the status envelope.
    pub(crate) async fn post_raw<P: Serialize>(&self, ems_action: &str, payload: &P) -> Result<String> {
        let url = self.endpoint(ems_action)?;
        let response = self.client.post(url.clone()).json(payload).send().await?;
        let status = response.status();
        let text = response.text().await?;

        tracing::debug!(
            "tradeit POST {} status={} bytes={}",
            url,
            status.as_u16(),
            text.len()
        );
        if !status.is_success() {
            tracing::warn!(
                status = %status,
                url = %url,
                body = %text,
                "received non-success HTTP status from tradeit"
            );
        }
        Ok(text)
    }

    pub(crate) async fn post<T, P>(&self, ems_action: &str, payload: &P) -> Result<TradeItApiResponse<T>>
    where
        T: DeserializeOwned,
        P: Serialize,
    {
        let text = self.post_raw(ems_action, payload).await?;

        let result: TradeItApiResponse<T> = match serde_json::from_str(&text) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::error!(
                    error = %err,
                    "failed to parse response for {}: {}",
                    ems_action,
                    text
                );
                return Err(err.into());
            }
        };

        if let TradeItApiResponse::Error(error) = &result {
            tracing::error!(
                code = ?error.code,
                title = %error.title,
                message = %error.message,
                "tradeit API returned error for {}",
                ems_action
            );
        }
        Ok(result)
    }

    async fn handle_authentication(
        &self,
        response: TradeItApiResponse<AuthenticationResult>,
    ) -> Result<AuthenticationResponse> {
        match response {
            TradeItApiResponse::Success(result) => {
                self.set_session_token(result.token.clone()).await;
                Ok(AuthenticationResponse::Success(result))
            }
            TradeItApiResponse::InformationNeeded(question) => {
                self.set_session_token(question.token.clone()).await;
                Ok(AuthenticationResponse::SecurityQuestion(question))
            }
            TradeItApiResponse::Error(error) => Err(TradeItError::Authentication(error)),
        }
    }
}

#[async_trait]
impl TradeItSession for TradeItConnector {
    async fn authenticate(&self, linked_login: &LinkedLogin) -> Result<AuthenticationResponse> {
        tracing::info!(broker = %linked_login.broker, "tradeit authenticate");
        let response = self
            .post(
                "user/authenticate",
                &AuthenticationRequest {
                    user_token: &self.user_token,
                    user_id: &linked_login.user_id,
                    api_key: &self.api_key,
                },
            )
            .await?;
        self.handle_authentication(response).await
    }

    async fn answer_security_question(&self, answer: &str) -> Result<AuthenticationResponse> {
        let token = self.require_token().await?;
        let response = self
            .post(
                "user/answerSecurityQuestion",
                &SecurityAnswerRequest {
                    token: &token,
                    security_answer: answer,
                    api_key: &self.api_key,
                },
            )
            .await?;
        self.handle_authentication(response).await
    }

    async fn get_account_overview(
        &self,
        account_number: &AccountNumber,
    ) -> Result<AccountOverviewResult> {
        let token = self.require_token().await?;
        tracing::debug!(account = %mask_account(&account_number.0), "tradeit account overview");
        self.post(
            "balance/getAccountOverview",
            &AccountRequest {
                token: &token,
                account_number: &account_number.0,
                api_key: &self.api_key,
            },
        )
        .await?
        .into_result()
    }

    async fn get_transaction_history(
        &self,
        account_number: &AccountNumber,
    ) -> Result<TransactionHistoryResult> {
        let token = self.require_token().await?;
        self.post(
            "account/getAllTransactionsHistory",
            &AccountRequest {
                token: &token,
                account_number: &account_number.0,
                api_key: &self.api_key,
            },
        )
        .await?
        .into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_base_urls() {
        assert_eq!(TradeItEnvironment::default(), TradeItEnvironment::Production);
        assert_eq!(TradeItEnvironment::Production.base_url(), BASE_URL);
        assert_eq!(TradeItEnvironment::Sandbox.base_url(), BASE_SANDBOX_URL);
    }

    #[test]
    fn test_endpoint() {
        let connector = TradeItConnector::new("key", "user-token", TradeItEnvironment::Sandbox).unwrap();
        assert_eq!(
            connector.endpoint("user/authenticate").unwrap().as_str(),
            "https://ems.qa.tradingticket.com/api/v2/user/authenticate"
        );
        assert_eq!(connector.api_key(), "key");
    }

    #[test]
    fn test_invalid_base_url() {
        let err = TradeItConnector::with_base_url("key", "token", "not a url").unwrap_err();
        assert!(matches!(err, TradeItError::Transport(_)));
    }

    #[tokio::test]
    async fn test_security_question_stores_token() {
        let connector = TradeItConnector::new("key", "user-token", TradeItEnvironment::Sandbox).unwrap();
        assert!(connector.session_token().await.is_none());

        let response: TradeItApiResponse<AuthenticationResult> = serde_json::from_value(serde_json::json!({
            "status": "INFORMATION_NEEDED",
            "token": "pending-token",
            "securityQuestion": "Pet?"
        }))
        .unwrap();
        let result = connector.handle_authentication(response).await.unwrap();
        assert!(matches!(result, AuthenticationResponse::SecurityQuestion(_)));
        assert_eq!(connector.session_token().await.as_deref(), Some("pending-token"));
    }

    #[tokio::test]
    async fn test_error_response_is_authentication_error() {
        let connector = TradeItConnector::new("key", "user-token", TradeItEnvironment::Sandbox).unwrap();
        let response: TradeItApiResponse<AuthenticationResult> = serde_json::from_value(serde_json::json!({
            "status": "ERROR",
            "shortMessage": "Could Not Login"
        }))
        .unwrap();
        let err = connector.handle_authentication(response).await.unwrap_err();
        assert!(err.is_authentication());
        assert!(connector.session_token().await.is_none());
    }

    #[tokio::test]
    async fn test_calls_require_token() {
        let connector = TradeItConnector::new("key", "user-token", TradeItEnvironment::Sandbox).unwrap();
        let err = connector
            .get_account_overview(&AccountNumber::from("123456"))
            .await
            .unwrap_err();
        assert_eq!(err, TradeItError::Authentication(ErrorResult::not_authenticated()));
    }
}
