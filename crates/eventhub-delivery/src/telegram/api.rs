//! Minimal Telegram Bot HTTP API client.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use eventhub_core::config::delivery::TelegramConfig;
use eventhub_core::error::{AppError, ErrorKind};
use eventhub_core::result::AppResult;

/// Anything that can push a text message into a Telegram chat.
#[async_trait]
pub trait ChatSender: Send + Sync + fmt::Debug + 'static {
    /// Send `text` to `chat_id`.
    async fn send_message(&self, chat_id: i64, text: &str) -> AppResult<()>;
}

/// Bot API client over `reqwest`.
#[derive(Clone)]
pub struct BotApi {
    client: reqwest::Client,
    base_url: String,
    token: String,
    request_timeout: Duration,
}

impl BotApi {
    /// Build a client from configuration.
    pub fn new(config: &TelegramConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| AppError::with_source(ErrorKind::Channel, "Failed to build HTTP client", e))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: config.bot_token.clone(),
            request_timeout: Duration::from_secs(config.request_timeout_seconds),
        })
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    /// Long-poll for new updates starting at `offset`.
    pub async fn get_updates(&self, offset: i64, timeout_seconds: u64) -> AppResult<Vec<TelegramUpdate>> {
        let url = format!(
            "{}?offset={offset}&timeout={timeout_seconds}",
            self.api_url("getUpdates")
        );
        let response = self
            .client
            .get(url)
            .timeout(Duration::from_secs(timeout_seconds) + self.request_timeout)
            .send()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Channel, "Telegram getUpdates failed", e))?;

        let body: TelegramApiResponse<Vec<TelegramUpdate>> = response
            .json()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Channel, "Invalid Telegram response", e))?;

        body.into_result("getUpdates").map(Option::unwrap_or_default)
    }

    /// Fetch the bot's own account, used as a startup connectivity check.
    pub async fn get_me(&self) -> AppResult<TelegramUser> {
        let response = self
            .client
            .get(self.api_url("getMe"))
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Channel, "Telegram getMe failed", e))?;

        let body: TelegramApiResponse<TelegramUser> = response
            .json()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Channel, "Invalid getMe response", e))?;

        body.into_result("getMe")?
            .ok_or_else(|| AppError::channel("Telegram getMe returned no bot info"))
    }
}

#[async_trait]
impl ChatSender for BotApi {
    async fn send_message(&self, chat_id: i64, text: &str) -> AppResult<()> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });

        let response = self
            .client
            .post(self.api_url("sendMessage"))
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Channel, "Telegram sendMessage failed", e))?;

        let result: TelegramApiResponse<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Channel, "Invalid sendMessage response", e))?;

        result.into_result("sendMessage").map(|_| ())
    }
}

impl fmt::Debug for BotApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotApi")
            .field("base_url", &self.base_url)
            .field("token", &"****")
            .finish()
    }
}

// --- Telegram API Types ---

/// Envelope of every Bot API response.
#[derive(Debug, Deserialize)]
pub struct TelegramApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

impl<T> TelegramApiResponse<T> {
    fn into_result(self, method: &str) -> AppResult<Option<T>> {
        if self.ok {
            Ok(self.result)
        } else {
            Err(AppError::channel(format!(
                "Telegram {method} error: {}",
                self.description.unwrap_or_default()
            )))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub from: Option<TelegramUser>,
    pub chat: TelegramChat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn api_for(server: &MockServer) -> BotApi {
        BotApi::new(&TelegramConfig {
            enabled: true,
            bot_token: "123:abc".to_string(),
            api_base_url: server.uri(),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_send_message_posts_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .and(body_partial_json(serde_json::json!({"chat_id": 42, "text": "hello"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"ok": true, "result": {"message_id": 1}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        api_for(&server).send_message(42, "hello").await.unwrap();
    }

    #[tokio::test]
    async fn test_send_message_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "ok": false,
                "description": "Forbidden: bot was blocked by the user"
            })))
            .mount(&server)
            .await;

        let err = api_for(&server).send_message(42, "hello").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Channel);
        assert!(err.message.contains("blocked"));
    }

    #[tokio::test]
    async fn test_get_updates_parses_messages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bot123:abc/getUpdates"))
            .and(query_param("offset", "7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": [{
                    "update_id": 7,
                    "message": {
                        "message_id": 3,
                        "from": {"id": 9, "is_bot": false, "first_name": "Ann", "username": "ann"},
                        "chat": {"id": 900, "type": "private"},
                        "date": 0,
                        "text": "subscribe"
                    }
                }]
            })))
            .mount(&server)
            .await;

        let updates = api_for(&server).get_updates(7, 0).await.unwrap();
        assert_eq!(updates.len(), 1);
        let message = updates[0].message.as_ref().unwrap();
        assert_eq!(message.chat.id, 900);
        assert_eq!(message.text.as_deref(), Some("subscribe"));
    }

    #[test]
    fn test_debug_hides_token() {
        let api = BotApi::new(&TelegramConfig {
            bot_token: "secret-token".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert!(!format!("{api:?}").contains("secret-token"));
    }
}
