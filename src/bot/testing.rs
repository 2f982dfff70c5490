//! Test doubles for the bot layer

use super::transport::{ChatTransport, TransportError};
use async_trait::async_trait;
use std::sync::Mutex;

/// What a [`RecordingTransport`] saw go out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Message { chat_id: i64, text: String },
    Photo { chat_id: i64, caption: String },
}

/// Captures outbound traffic and serves canned file downloads.
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<Sent>>,
    /// Bytes returned for any `download_file` call.
    pub file_bytes: Vec<u8>,
    /// When set, every send fails. Used to exercise best-effort paths.
    pub fail_sends: bool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            file_bytes: b"photo".to_vec(),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    /// Texts of all messages sent to one chat, in order.
    pub fn texts_to(&self, chat_id: i64) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Message { chat_id: c, text } if c == chat_id => Some(text),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TransportError> {
        if self.fail_sends {
            return Err(TransportError::Api("send disabled".to_string()));
        }
        self.sent.lock().unwrap().push(Sent::Message {
            chat_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        _data: Vec<u8>,
        caption: &str,
    ) -> Result<(), TransportError> {
        if self.fail_sends {
            return Err(TransportError::Api("send disabled".to_string()));
        }
        self.sent.lock().unwrap().push(Sent::Photo {
            chat_id,
            caption: caption.to_string(),
        });
        Ok(())
    }

    async fn download_file(&self, _file_id: &str) -> Result<Vec<u8>, TransportError> {
        Ok(self.file_bytes.clone())
    }
}
