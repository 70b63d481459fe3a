//! HTTP ingress for Slack when the app is configured with request URLs
//! instead of Socket Mode.
//!
//! Every request is verified against the signing secret before its body is
//! decoded. Slack gets its 200 as soon as the payload parses; the poll
//! handlers run afterwards on a tracked task so shutdown can wait for them.

use std::{future::Future, sync::Arc};

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use slotpoll_core::ApplicationError;
use slotpoll_slack::{
    commands::is_poll_command,
    events::{DispatchError, EventContext, EventDispatcher, SlackEnvelope, SlackEvent},
    payload::{parse_interaction_form, parse_slash_command_form},
    signature::{SignatureVerifier, SIGNATURE_HEADER, TIMESTAMP_HEADER},
};
use tokio_util::task::TaskTracker;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct WebhookState {
    verifier: Arc<SignatureVerifier>,
    dispatcher: Arc<EventDispatcher>,
    in_flight: TaskTracker,
}

impl WebhookState {
    pub fn new(verifier: Arc<SignatureVerifier>, dispatcher: Arc<EventDispatcher>) -> Self {
        Self { verifier, dispatcher, in_flight: TaskTracker::new() }
    }

    /// Waits for every dispatch handed off so far.
    pub async fn drain(&self) {
        self.in_flight.close();
        self.in_flight.wait().await;
    }

    fn authenticate(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), ApplicationError> {
        let header = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());
        self.verifier
            .verify(header(TIMESTAMP_HEADER), header(SIGNATURE_HEADER), body)
            .map_err(|error| ApplicationError::Authentication(error.to_string()))
    }

    fn spawn_dispatch(&self, event: SlackEvent, correlation_id: String) {
        let dispatcher = self.dispatcher.clone();
        self.in_flight.spawn(async move {
            let envelope = SlackEnvelope { envelope_id: correlation_id.clone(), event };
            let ctx = EventContext { correlation_id };

            match dispatcher.dispatch(&envelope, &ctx).await {
                Ok(result) => debug!(
                    event_name = "ingress.webhook.dispatched",
                    correlation_id = %ctx.correlation_id,
                    result = ?result,
                    "webhook event handled"
                ),
                Err(DispatchError::Handler(error)) => {
                    let error = ApplicationError::from(error);
                    warn!(
                        event_name = "ingress.webhook.dispatch_failed",
                        correlation_id = %ctx.correlation_id,
                        error = %error,
                        "webhook event handler failed"
                    );
                }
            }
        });
    }
}

pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/slash", post(slash_command))
        .route("/modal", post(interaction))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve<F>(
    bind_address: &str,
    port: u16,
    state: WebhookState,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.webhook.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "slack webhook endpoint listening"
    );

    axum::serve(listener, router(state)).with_graceful_shutdown(shutdown).await
}

async fn slash_command(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let correlation_id = Uuid::new_v4().to_string();
    if let Err(error) = state.authenticate(&headers, &body) {
        return reject(error, &correlation_id);
    }

    let payload = match parse_slash_command_form(&body) {
        Ok(payload) => payload,
        Err(error) => {
            return reject(ApplicationError::MalformedPayload(error.to_string()), &correlation_id)
        }
    };
    if !is_poll_command(&payload.command) {
        return reject(ApplicationError::UnsupportedCommand(payload.command), &correlation_id);
    }

    state.spawn_dispatch(SlackEvent::SlashCommand(payload), correlation_id);
    StatusCode::OK.into_response()
}

async fn interaction(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let correlation_id = Uuid::new_v4().to_string();
    if let Err(error) = state.authenticate(&headers, &body) {
        return reject(error, &correlation_id);
    }

    match parse_interaction_form(&body) {
        Ok(event) => {
            state.spawn_dispatch(event, correlation_id);
            StatusCode::OK.into_response()
        }
        Err(error) => reject(ApplicationError::MalformedPayload(error.to_string()), &correlation_id),
    }
}

fn reject(error: ApplicationError, correlation_id: &str) -> Response {
    warn!(
        event_name = "ingress.webhook.rejected",
        correlation_id = %correlation_id,
        error = %error,
        "webhook request rejected"
    );

    let interface = error.into_interface(correlation_id);
    let status =
        StatusCode::from_u16(interface.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, interface.user_message()).into_response()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use secrecy::SecretString;
    use serde_json::json;
    use slotpoll_core::{PollDefinition, SlotGroups};
    use slotpoll_slack::{
        api::{ApiError, MessageRef, SlackApi},
        blocks::{MessageTemplate, ModalView},
        events::poll_dispatcher,
        poll::{RenderedPoll, POLL_MODAL_CALLBACK_ID},
        signature::{SignatureVerifier, SIGNATURE_HEADER, TIMESTAMP_HEADER},
    };
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    use super::{router, WebhookState};

    const SECRET: &str = "8f742231b10e8888abcd99yyyzzz85a5";

    #[derive(Clone, Debug, PartialEq, Eq)]
    enum Call {
        OpenView { trigger_id: String },
        Post { channel: String },
        Update { channel: String, ts: String, groups: SlotGroups },
    }

    #[derive(Default)]
    struct RecordingSlackApi {
        calls: Mutex<Vec<Call>>,
    }

    impl RecordingSlackApi {
        async fn calls(&self) -> Vec<Call> {
            self.calls.lock().await.clone()
        }
    }

    #[async_trait]
    impl SlackApi for RecordingSlackApi {
        async fn post_message(
            &self,
            channel: &str,
            _message: &MessageTemplate,
        ) -> Result<MessageRef, ApiError> {
            self.calls.lock().await.push(Call::Post { channel: channel.to_owned() });
            Ok(MessageRef { channel: channel.to_owned(), ts: "1730000000.0100".to_owned() })
        }

        async fn update_message(
            &self,
            channel: &str,
            ts: &str,
            message: &MessageTemplate,
        ) -> Result<MessageRef, ApiError> {
            let groups = RenderedPoll::from_blocks(message.blocks.clone())
                .expect("updated message keeps the poll layout")
                .slot_groups();
            self.calls.lock().await.push(Call::Update {
                channel: channel.to_owned(),
                ts: ts.to_owned(),
                groups,
            });
            Ok(MessageRef { channel: channel.to_owned(), ts: ts.to_owned() })
        }

        async fn open_view(&self, trigger_id: &str, _view: &ModalView) -> Result<(), ApiError> {
            self.calls.lock().await.push(Call::OpenView { trigger_id: trigger_id.to_owned() });
            Ok(())
        }
    }

    fn state(api: Arc<RecordingSlackApi>) -> WebhookState {
        WebhookState::new(
            Arc::new(SignatureVerifier::new(SecretString::from(SECRET))),
            Arc::new(poll_dispatcher(api, None)),
        )
    }

    fn form(pairs: &[(&str, &str)]) -> String {
        form_urlencoded::Serializer::new(String::new()).extend_pairs(pairs).finish()
    }

    fn interaction_body(payload: serde_json::Value) -> String {
        let payload = payload.to_string();
        form(&[("payload", payload.as_str())])
    }

    fn signed_request(uri: &str, body: String) -> Request<Body> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = SignatureVerifier::new(SecretString::from(SECRET))
            .sign(&timestamp, body.as_bytes())
            .expect("sign");

        Request::post(uri)
            .header("content-type", "application/x-www-form-urlencoded")
            .header(TIMESTAMP_HEADER, timestamp)
            .header(SIGNATURE_HEADER, signature)
            .body(Body::from(body))
            .expect("request")
    }

    fn slash_body(command: &str) -> String {
        form(&[
            ("command", command),
            ("text", ""),
            ("channel_id", "C1"),
            ("user_id", "U1"),
            ("trigger_id", "trigger-1"),
        ])
    }

    #[tokio::test]
    async fn signed_poll_command_is_acknowledged_and_opens_the_form() {
        let api = Arc::new(RecordingSlackApi::default());
        let state = state(api.clone());
        let response = router(state.clone())
            .oneshot(signed_request("/slash", slash_body("/poll")))
            .await
            .expect("response");
        state.drain().await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(api.calls().await, vec![Call::OpenView { trigger_id: "trigger-1".to_owned() }]);
    }

    #[tokio::test]
    async fn unsigned_request_is_rejected_without_processing() {
        let api = Arc::new(RecordingSlackApi::default());
        let state = state(api.clone());
        let request = Request::post("/slash")
            .header(TIMESTAMP_HEADER, chrono::Utc::now().timestamp().to_string())
            .header(SIGNATURE_HEADER, "v0=deadbeef")
            .body(Body::from(slash_body("/poll")))
            .expect("request");

        let response = router(state.clone()).oneshot(request).await.expect("response");
        state.drain().await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(api.calls().await.is_empty());
    }

    #[tokio::test]
    async fn tampered_body_is_rejected() {
        let api = Arc::new(RecordingSlackApi::default());
        let mut request = signed_request("/slash", slash_body("/poll"));
        *request.body_mut() = Body::from(slash_body("/other"));

        let response = router(state(api)).oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_command_is_an_internal_error() {
        let api = Arc::new(RecordingSlackApi::default());
        let response = router(state(api))
            .oneshot(signed_request("/slash", slash_body("/weather")))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn slash_named_command_is_not_the_poll_command() {
        let api = Arc::new(RecordingSlackApi::default());
        let state = state(api.clone());
        let response = router(state.clone())
            .oneshot(signed_request("/slash", slash_body("/slash")))
            .await
            .expect("response");
        state.drain().await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(api.calls().await.is_empty());
    }

    #[tokio::test]
    async fn unparseable_slash_form_is_unauthorized() {
        let api = Arc::new(RecordingSlackApi::default());
        let response = router(state(api))
            .oneshot(signed_request("/slash", form(&[("text", "hello")])))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn submitted_form_posts_the_poll_to_the_chosen_channel() {
        let api = Arc::new(RecordingSlackApi::default());
        let state = state(api.clone());
        let body = interaction_body(json!({
            "type": "view_submission",
            "user": { "id": "U1" },
            "view": {
                "callback_id": POLL_MODAL_CALLBACK_ID,
                "state": { "values": {
                    "question": { "question": { "type": "plain_text_input", "value": "Lunch?" } },
                    "choice1": { "choice1": { "value": "Mon" } },
                    "choice2": { "choice2": { "value": "Tue" } },
                    "choice3": { "choice3": { "value": "Wed" } },
                    "choice4": { "choice4": { "value": "Thu" } },
                    "channel": { "channelActionID": { "selected_conversation": "C9" } }
                } }
            }
        }));

        let response =
            router(state.clone()).oneshot(signed_request("/modal", body)).await.expect("response");
        state.drain().await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(api.calls().await, vec![Call::Post { channel: "C9".to_owned() }]);
    }

    #[tokio::test]
    async fn button_click_updates_the_clicked_poll_message() {
        let api = Arc::new(RecordingSlackApi::default());
        let state = state(api.clone());
        let poll =
            PollDefinition::new("Lunch?", ["Mon", "Tue", "Wed", "Thu"].map(str::to_owned), None);
        let blocks = serde_json::to_value(RenderedPoll::new(&poll).blocks()).expect("blocks");
        let body = interaction_body(json!({
            "type": "block_actions",
            "user": { "id": "U2", "username": "bo" },
            "channel": { "id": "C1", "name": "lunch" },
            "container": { "type": "message", "message_ts": "1730000000.0100" },
            "message": { "type": "message", "ts": "1730000000.0100", "blocks": blocks },
            "actions": [{
                "type": "button",
                "block_id": "poll.choices.v1",
                "action_id": "actionID3",
                "value": "3",
                "action_ts": "1730000001.0000"
            }]
        }));

        let response =
            router(state.clone()).oneshot(signed_request("/modal", body)).await.expect("response");
        state.drain().await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            api.calls().await,
            vec![Call::Update {
                channel: "C1".to_owned(),
                ts: "1730000000.0100".to_owned(),
                groups: SlotGroups::from_display([":", ":", "<@U2>", ":"].map(str::to_owned)),
            }]
        );
    }

    #[tokio::test]
    async fn drain_waits_for_accepted_dispatches() {
        let api = Arc::new(RecordingSlackApi::default());
        let state = state(api.clone());
        let app = router(state.clone());

        for _ in 0..3 {
            let response = app
                .clone()
                .oneshot(signed_request("/slash", slash_body("/poll")))
                .await
                .expect("response");
            assert_eq!(response.status(), StatusCode::OK);
        }
        state.drain().await;

        assert_eq!(api.calls().await.len(), 3);
    }

    #[tokio::test]
    async fn interaction_without_payload_field_is_unauthorized() {
        let api = Arc::new(RecordingSlackApi::default());
        let response = router(state(api))
            .oneshot(signed_request("/modal", form(&[("type", "block_actions")])))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
