use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::blocks::{MessageTemplate, ModalView};

pub const SLACK_API_BASE: &str = "https://slack.com/api";

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Identity of a posted message: the pair `chat.update` needs to find it again.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct MessageRef {
    pub channel: String,
    pub ts: String,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("{method} request failed: {message}")]
    Transport { method: &'static str, message: String },
    #[error("{method} returned http {status}")]
    Status { method: &'static str, status: u16 },
    #[error("{method} rejected by slack: {error}")]
    Slack { method: &'static str, error: String },
    #[error("{method} response could not be decoded: {message}")]
    Decode { method: &'static str, message: String },
}

/// The Web API calls the poll bot makes.
#[async_trait]
pub trait SlackApi: Send + Sync {
    async fn post_message(
        &self,
        channel: &str,
        message: &MessageTemplate,
    ) -> Result<MessageRef, ApiError>;

    async fn update_message(
        &self,
        channel: &str,
        ts: &str,
        message: &MessageTemplate,
    ) -> Result<MessageRef, ApiError>;

    async fn open_view(&self, trigger_id: &str, view: &ModalView) -> Result<(), ApiError>;
}

pub struct WebApiClient {
    http: reqwest::Client,
    bot_token: SecretString,
    base_url: String,
}

impl WebApiClient {
    pub fn new(bot_token: SecretString) -> Result<Self, ApiError> {
        Self::with_base_url(bot_token, SLACK_API_BASE)
    }

    pub fn with_base_url(
        bot_token: SecretString,
        base_url: impl Into<String>,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|error| ApiError::Transport {
                method: "client.build",
                message: error.to_string(),
            })?;
        Ok(Self { http, bot_token, base_url: base_url.into().trim_end_matches('/').to_owned() })
    }

    async fn call(&self, method: &'static str, body: Value) -> Result<Value, ApiError> {
        debug!(event_name = "egress.slack.api_call", method, "calling slack web api");

        let response = self
            .http
            .post(format!("{}/{method}", self.base_url))
            .bearer_auth(self.bot_token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|error| ApiError::Transport { method, message: error.to_string() })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status { method, status: status.as_u16() });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|error| ApiError::Decode { method, message: error.to_string() })?;
        check_ok(method, payload)
    }
}

#[async_trait]
impl SlackApi for WebApiClient {
    async fn post_message(
        &self,
        channel: &str,
        message: &MessageTemplate,
    ) -> Result<MessageRef, ApiError> {
        let response = self.call("chat.postMessage", post_message_body(channel, message)).await?;
        message_ref("chat.postMessage", response)
    }

    async fn update_message(
        &self,
        channel: &str,
        ts: &str,
        message: &MessageTemplate,
    ) -> Result<MessageRef, ApiError> {
        let response = self.call("chat.update", update_message_body(channel, ts, message)).await?;
        message_ref("chat.update", response)
    }

    async fn open_view(&self, trigger_id: &str, view: &ModalView) -> Result<(), ApiError> {
        self.call("views.open", json!({ "trigger_id": trigger_id, "view": view })).await?;
        Ok(())
    }
}

pub(crate) fn post_message_body(channel: &str, message: &MessageTemplate) -> Value {
    json!({
        "channel": channel,
        "text": message.fallback_text,
        "blocks": message.blocks,
    })
}

pub(crate) fn update_message_body(channel: &str, ts: &str, message: &MessageTemplate) -> Value {
    json!({
        "channel": channel,
        "ts": ts,
        "text": message.fallback_text,
        "blocks": message.blocks,
    })
}

/// Slack answers most failures with http 200 and `"ok": false`.
pub(crate) fn check_ok(method: &'static str, payload: Value) -> Result<Value, ApiError> {
    if payload.get("ok").and_then(Value::as_bool) == Some(true) {
        return Ok(payload);
    }
    let error = payload.get("error").and_then(Value::as_str).unwrap_or("unknown_error");
    Err(ApiError::Slack { method, error: error.to_owned() })
}

fn message_ref(method: &'static str, payload: Value) -> Result<MessageRef, ApiError> {
    serde_json::from_value(payload)
        .map_err(|error| ApiError::Decode { method, message: error.to_string() })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        check_ok, message_ref, post_message_body, update_message_body, ApiError, MessageRef,
    };
    use crate::blocks::MessageBuilder;

    #[test]
    fn post_body_carries_fallback_text_and_blocks() {
        let message = MessageBuilder::new("Lunch?")
            .section("poll.header.v1", |section| {
                section.plain("Lunch?");
            })
            .build();

        let body = post_message_body("C1", &message);

        assert_eq!(body["channel"], "C1");
        assert_eq!(body["text"], "Lunch?");
        assert_eq!(body["blocks"][0]["block_id"], "poll.header.v1");
        assert!(body.get("ts").is_none());
    }

    #[test]
    fn update_body_targets_existing_message() {
        let message = MessageBuilder::new("Lunch?").build();
        let body = update_message_body("C1", "1730000000.0001", &message);

        assert_eq!(body["ts"], "1730000000.0001");
        assert_eq!(body["blocks"], json!([]));
    }

    #[test]
    fn not_ok_response_is_an_error() {
        let result = check_ok("chat.update", json!({ "ok": false, "error": "message_not_found" }));
        assert_eq!(
            result,
            Err(ApiError::Slack { method: "chat.update", error: "message_not_found".to_owned() })
        );

        let result = check_ok("views.open", json!({ "warning": "odd" }));
        assert!(matches!(result, Err(ApiError::Slack { ref error, .. }) if error == "unknown_error"));
    }

    #[test]
    fn ok_response_yields_message_ref() {
        let payload = check_ok(
            "chat.postMessage",
            json!({ "ok": true, "channel": "C1", "ts": "1730000000.0002", "message": {} }),
        )
        .expect("ok");

        let reference = message_ref("chat.postMessage", payload).expect("decode");
        assert_eq!(
            reference,
            MessageRef { channel: "C1".to_owned(), ts: "1730000000.0002".to_owned() }
        );
    }
}
