use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::{net::TcpStream, sync::Mutex};
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::{
    api::{check_ok, SLACK_API_BASE},
    events::{EventContext, EventDispatcher, SlackEnvelope, SlackEvent},
    payload::{parse_socket_frame, SocketFrame},
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

#[async_trait]
pub trait SocketTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError>;
    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

pub struct SocketModeRunner {
    transport: Arc<dyn SocketTransport>,
    dispatcher: Arc<EventDispatcher>,
    reconnect_policy: ReconnectPolicy,
    in_flight: TaskTracker,
}

impl SocketModeRunner {
    pub fn new(
        transport: Arc<dyn SocketTransport>,
        dispatcher: Arc<EventDispatcher>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, reconnect_policy, in_flight: TaskTracker::new() }
    }

    /// Runs until the transport closes cleanly or reconnects are exhausted.
    /// A session that got as far as connecting resets the retry budget.
    pub async fn start(&self) -> Result<()> {
        let mut attempt = 0;
        loop {
            let mut connected = false;
            let Err(transport_error) = self.connect_and_pump(attempt, &mut connected).await else {
                return Ok(());
            };

            warn!(
                attempt,
                max_retries = self.reconnect_policy.max_retries,
                error = %transport_error,
                "socket mode transport failed"
            );

            if connected {
                attempt = 0;
            } else if attempt >= self.reconnect_policy.max_retries {
                warn!(
                    max_retries = self.reconnect_policy.max_retries,
                    "socket mode retries exhausted; continuing process without crash"
                );
                return Ok(());
            }

            let delay = self.reconnect_policy.backoff(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if !connected {
                attempt += 1;
            }
        }
    }

    /// Disconnects, then waits for handlers still running from acked envelopes.
    pub async fn shutdown(&self) -> Result<(), TransportError> {
        let disconnected = self.transport.disconnect().await;
        self.in_flight.close();
        self.in_flight.wait().await;
        disconnected
    }

    async fn connect_and_pump(
        &self,
        attempt: u32,
        connected: &mut bool,
    ) -> Result<(), TransportError> {
        info!(attempt, "opening socket mode transport connection");
        self.transport.connect().await?;
        *connected = true;
        info!(attempt, "socket mode transport connected");

        loop {
            let Some(envelope) = self.transport.next_envelope().await? else {
                info!(attempt, "socket mode transport stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };
            let (channel_id, message_ts) = correlation_fields(&envelope);

            info!(
                event_name = "ingress.slack.envelope_received",
                envelope_id = %envelope.envelope_id,
                event_type = ?envelope.event.event_type(),
                correlation_id = %envelope.envelope_id,
                channel_id = channel_id.unwrap_or("unknown"),
                message_ts = message_ts.unwrap_or("unknown"),
                "received slack envelope"
            );

            if let Err(error) = self.transport.acknowledge(&envelope.envelope_id).await {
                warn!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    error = %error,
                    "failed to acknowledge slack envelope"
                );
            } else {
                debug!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    "acknowledged slack envelope"
                );
            }

            self.spawn_dispatch(envelope);
        }
    }

    fn spawn_dispatch(&self, envelope: SlackEnvelope) {
        let dispatcher = self.dispatcher.clone();
        self.in_flight.spawn(async move {
            let context = EventContext { correlation_id: envelope.envelope_id.clone() };
            if let Err(error) = dispatcher.dispatch(&envelope, &context).await {
                let (channel_id, message_ts) = correlation_fields(&envelope);
                warn!(
                    event_name = "ingress.slack.dispatch_failed",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    channel_id = channel_id.unwrap_or("unknown"),
                    message_ts = message_ts.unwrap_or("unknown"),
                    error = %error,
                    "event dispatch failed"
                );
            }
        });
    }
}

fn correlation_fields(envelope: &SlackEnvelope) -> (Option<&str>, Option<&str>) {
    match &envelope.event {
        SlackEvent::BlockAction(event) => {
            (Some(event.channel_id.as_str()), Some(event.message_ts.as_str()))
        }
        SlackEvent::SlashCommand(payload) => (Some(payload.channel_id.as_str()), None),
        SlackEvent::ViewSubmission(_) | SlackEvent::Unsupported { .. } => (None, None),
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Socket Mode over a real websocket: `apps.connections.open` with the
/// app-level token, then one websocket per session.
pub struct WebSocketTransport {
    http: reqwest::Client,
    app_token: SecretString,
    sink: Mutex<Option<SplitSink<WsStream, Message>>>,
    stream: Mutex<Option<SplitStream<WsStream>>>,
}

impl WebSocketTransport {
    pub fn new(app_token: SecretString) -> Self {
        Self {
            http: reqwest::Client::new(),
            app_token,
            sink: Mutex::new(None),
            stream: Mutex::new(None),
        }
    }

    async fn open_connection_url(&self) -> Result<String, TransportError> {
        let response = self
            .http
            .post(format!("{SLACK_API_BASE}/apps.connections.open"))
            .bearer_auth(self.app_token.expose_secret())
            .send()
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        if !response.status().is_success() {
            return Err(TransportError::Connect(format!(
                "apps.connections.open returned http {}",
                response.status()
            )));
        }

        let payload: Value =
            response.json().await.map_err(|error| TransportError::Connect(error.to_string()))?;
        let payload = check_ok("apps.connections.open", payload)
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        payload
            .get("url")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| TransportError::Connect("apps.connections.open returned no url".to_owned()))
    }

    async fn send(&self, message: Message) -> Result<(), String> {
        let mut sink = self.sink.lock().await;
        let Some(sink) = sink.as_mut() else {
            return Err("socket is not connected".to_owned());
        };
        sink.send(message).await.map_err(|error| error.to_string())
    }
}

#[async_trait]
impl SocketTransport for WebSocketTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let url = self.open_connection_url().await?;
        let (socket, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        let (sink, stream) = socket.split();

        *self.sink.lock().await = Some(sink);
        *self.stream.lock().await = Some(stream);
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
        let mut guard = self.stream.lock().await;
        let Some(stream) = guard.as_mut() else {
            return Err(TransportError::Receive("socket is not connected".to_owned()));
        };

        while let Some(message) = stream.next().await {
            let message = message.map_err(|error| TransportError::Receive(error.to_string()))?;
            match message {
                Message::Text(text) => match parse_socket_frame(text.as_str()) {
                    Ok(SocketFrame::Hello) => info!("socket mode hello received"),
                    // slack rotates connections; surface as an error so the runner reconnects
                    Ok(SocketFrame::Disconnect { reason }) => {
                        return Err(TransportError::Receive(format!(
                            "slack requested disconnect: {reason}"
                        )));
                    }
                    Ok(SocketFrame::Envelope(envelope)) => return Ok(Some(envelope)),
                    Err(error) => {
                        warn!(error = %error, "dropping undecodable socket mode frame");
                    }
                },
                Message::Ping(data) => {
                    if let Err(error) = self.send(Message::Pong(data)).await {
                        debug!(error = %error, "failed to answer websocket ping");
                    }
                }
                Message::Close(frame) => {
                    return Err(TransportError::Receive(format!(
                        "websocket closed by server: {frame:?}"
                    )));
                }
                _ => {}
            }
        }

        Ok(None)
    }

    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError> {
        let ack = json!({ "envelope_id": envelope_id }).to_string();
        self.send(Message::Text(ack.into())).await.map_err(TransportError::Acknowledge)
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.stream.lock().await.take();
        let Some(mut sink) = self.sink.lock().await.take() else {
            return Ok(());
        };
        sink.close().await.map_err(|error| TransportError::Disconnect(error.to_string()))
    }
}
