//! Chat transport
//!
//! The bot core only knows this trait; the Telegram Bot API implementation
//! is the single place HTTP happens. Failures are logged and surfaced as
//! [`TransportError`], never as chat text.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("chat api rejected the call: {0}")]
    Api(String),
}

/// Outbound side of the bot.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TransportError>;
    async fn send_photo(
        &self,
        chat_id: i64,
        data: Vec<u8>,
        caption: &str,
    ) -> Result<(), TransportError>;
    /// Fetch the bytes of a file a user attached to a message.
    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, TransportError>;
}

/// Telegram Bot API over HTTPS.
pub struct TelegramTransport {
    client: reqwest::Client,
    token: String,
}

#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

#[derive(Deserialize)]
struct FileInfo {
    file_path: String,
}

impl TelegramTransport {
    pub fn new(token: String) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()?;
        Ok(Self { client, token })
    }

    fn method_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{}", self.token, method)
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T, TransportError> {
        let response: ApiResponse<T> = self
            .client
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await?
            .json()
            .await?;
        if !response.ok {
            return Err(TransportError::Api(
                response
                    .description
                    .unwrap_or_else(|| format!("{method} failed")),
            ));
        }
        response
            .result
            .ok_or_else(|| TransportError::Api(format!("{method} returned no result")))
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TransportError> {
        self.call::<serde_json::Value>(
            "sendMessage",
            serde_json::json!({ "chat_id": chat_id, "text": text }),
        )
        .await?;
        Ok(())
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        data: Vec<u8>,
        caption: &str,
    ) -> Result<(), TransportError> {
        let form = reqwest::multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .part(
                "photo",
                reqwest::multipart::Part::bytes(data).file_name("photo.jpg"),
            );
        let response: ApiResponse<serde_json::Value> = self
            .client
            .post(self.method_url("sendPhoto"))
            .multipart(form)
            .send()
            .await?
            .json()
            .await?;
        if !response.ok {
            return Err(TransportError::Api(
                response
                    .description
                    .unwrap_or_else(|| "sendPhoto failed".to_string()),
            ));
        }
        Ok(())
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, TransportError> {
        let info: FileInfo = self
            .call("getFile", serde_json::json!({ "file_id": file_id }))
            .await?;
        let url = format!(
            "https://api.telegram.org/file/bot{}/{}",
            self.token, info.file_path
        );
        let bytes = self.client.get(url).send().await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}
