//! Decoding of inbound Slack payloads into [`SlackEvent`]s.
//!
//! Both transports deliver the same two shapes: slash commands (form fields
//! over HTTP, a JSON object over Socket Mode) and interaction callbacks (a
//! JSON document in the `payload` form field, or inline in the envelope).

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::{
    blocks::Block,
    commands::SlashCommandPayload,
    events::{BlockActionEvent, SlackEnvelope, SlackEvent, ViewSubmissionEvent},
};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("form body is missing `{0}`")]
    MissingFormField(&'static str),
    #[error("{kind} payload is missing `{field}`")]
    MissingField { kind: &'static str, field: &'static str },
    #[error("payload is not valid json: {0}")]
    Json(String),
    #[error("{kind} payload has unexpected shape: {message}")]
    Shape { kind: &'static str, message: String },
}

/// Submitted view state: block id, then action id, then the element value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ViewStateValues(HashMap<String, HashMap<String, ViewStateValue>>);

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ViewStateValue {
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub selected_conversation: Option<String>,
}

impl ViewStateValues {
    pub fn get(&self, block_id: &str, action_id: &str) -> Option<&ViewStateValue> {
        self.0.get(block_id).and_then(|actions| actions.get(action_id))
    }

    pub fn text(&self, block_id: &str, action_id: &str) -> Option<&str> {
        self.get(block_id, action_id).and_then(|state| state.value.as_deref())
    }

    pub fn conversation(&self, block_id: &str, action_id: &str) -> Option<&str> {
        self.get(block_id, action_id).and_then(|state| state.selected_conversation.as_deref())
    }
}

impl<B, A> FromIterator<(B, A, ViewStateValue)> for ViewStateValues
where
    B: Into<String>,
    A: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (B, A, ViewStateValue)>>(iter: I) -> Self {
        let mut values: HashMap<String, HashMap<String, ViewStateValue>> = HashMap::new();
        for (block_id, action_id, value) in iter {
            values.entry(block_id.into()).or_default().insert(action_id.into(), value);
        }
        Self(values)
    }
}

/// A decoded Socket Mode websocket frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SocketFrame {
    Hello,
    Disconnect { reason: String },
    Envelope(SlackEnvelope),
}

/// Parses an `application/x-www-form-urlencoded` slash command body.
pub fn parse_slash_command_form(body: &[u8]) -> Result<SlashCommandPayload, PayloadError> {
    let fields: HashMap<String, String> = form_urlencoded::parse(body).into_owned().collect();
    for required in ["command", "user_id", "trigger_id"] {
        if !fields.contains_key(required) {
            return Err(PayloadError::MissingFormField(required));
        }
    }
    slash_command_from_value(Value::Object(
        fields.into_iter().map(|(key, value)| (key, Value::String(value))).collect(),
    ))
}

/// Parses an interaction callback delivered as the `payload` form field.
pub fn parse_interaction_form(body: &[u8]) -> Result<SlackEvent, PayloadError> {
    let payload = form_urlencoded::parse(body)
        .find(|(key, _)| key == "payload")
        .map(|(_, value)| value.into_owned())
        .ok_or(PayloadError::MissingFormField("payload"))?;
    let value: Value =
        serde_json::from_str(&payload).map_err(|error| PayloadError::Json(error.to_string()))?;
    parse_interaction(value)
}

/// Routes an interaction document on its `type` discriminant. Kinds the poll
/// does not use come back as [`SlackEvent::Unsupported`].
pub fn parse_interaction(payload: Value) -> Result<SlackEvent, PayloadError> {
    let kind = payload
        .get("type")
        .and_then(Value::as_str)
        .ok_or(PayloadError::MissingField { kind: "interaction", field: "type" })?
        .to_owned();

    match kind.as_str() {
        "block_actions" => block_action(payload).map(SlackEvent::BlockAction),
        "view_submission" => view_submission(payload).map(SlackEvent::ViewSubmission),
        other => Ok(SlackEvent::Unsupported { event_type: other.to_owned() }),
    }
}

pub fn parse_socket_frame(text: &str) -> Result<SocketFrame, PayloadError> {
    let frame: RawFrame =
        serde_json::from_str(text).map_err(|error| PayloadError::Json(error.to_string()))?;

    match frame.kind.as_str() {
        "hello" => Ok(SocketFrame::Hello),
        "disconnect" => Ok(SocketFrame::Disconnect {
            reason: frame.reason.unwrap_or_else(|| "unspecified".to_owned()),
        }),
        kind => {
            let envelope_id = frame
                .envelope_id
                .ok_or(PayloadError::MissingField { kind: "envelope", field: "envelope_id" })?;
            let event = match kind {
                "slash_commands" => {
                    SlackEvent::SlashCommand(slash_command_from_value(frame.payload)?)
                }
                "interactive" => parse_interaction(frame.payload)?,
                other => SlackEvent::Unsupported { event_type: other.to_owned() },
            };
            Ok(SocketFrame::Envelope(SlackEnvelope { envelope_id, event }))
        }
    }
}

fn slash_command_from_value(value: Value) -> Result<SlashCommandPayload, PayloadError> {
    serde_json::from_value(value)
        .map_err(|error| PayloadError::Shape { kind: "slash_command", message: error.to_string() })
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    envelope_id: Option<String>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    payload: Value,
}

#[derive(Deserialize)]
struct IdRef {
    id: String,
}

#[derive(Deserialize)]
struct BlockActionsPayload {
    user: IdRef,
    #[serde(default)]
    channel: Option<IdRef>,
    #[serde(default)]
    message: Option<ActionMessage>,
    #[serde(default)]
    actions: Vec<ActionPayload>,
}

#[derive(Deserialize)]
struct ActionMessage {
    ts: String,
    #[serde(default)]
    blocks: Vec<Block>,
}

#[derive(Deserialize)]
struct ActionPayload {
    action_id: String,
    #[serde(default)]
    value: Option<String>,
}

#[derive(Deserialize)]
struct ViewSubmissionPayload {
    user: IdRef,
    view: ViewPayload,
}

#[derive(Deserialize)]
struct ViewPayload {
    #[serde(default)]
    callback_id: String,
    state: ViewState,
}

#[derive(Deserialize)]
struct ViewState {
    values: ViewStateValues,
}

fn block_action(payload: Value) -> Result<BlockActionEvent, PayloadError> {
    const KIND: &str = "block_actions";

    let payload: BlockActionsPayload = serde_json::from_value(payload)
        .map_err(|error| PayloadError::Shape { kind: KIND, message: error.to_string() })?;
    let channel =
        payload.channel.ok_or(PayloadError::MissingField { kind: KIND, field: "channel" })?;
    let message =
        payload.message.ok_or(PayloadError::MissingField { kind: KIND, field: "message" })?;
    let action = payload
        .actions
        .into_iter()
        .next()
        .ok_or(PayloadError::MissingField { kind: KIND, field: "actions" })?;

    Ok(BlockActionEvent {
        channel_id: channel.id,
        message_ts: message.ts,
        user_id: payload.user.id,
        action_id: action.action_id,
        value: action.value,
        message_blocks: message.blocks,
    })
}

fn view_submission(payload: Value) -> Result<ViewSubmissionEvent, PayloadError> {
    let payload: ViewSubmissionPayload = serde_json::from_value(payload).map_err(|error| {
        PayloadError::Shape { kind: "view_submission", message: error.to_string() }
    })?;

    Ok(ViewSubmissionEvent {
        user_id: payload.user.id,
        callback_id: payload.view.callback_id,
        values: payload.view.state.values,
    })
}
