use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use slotpoll_core::config::TransportMode;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    transport: TransportMode,
    handlers: usize,
}

impl HealthState {
    pub fn new(transport: TransportMode, handlers: usize) -> Self {
        Self { transport, handlers }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub dispatcher: HealthCheck,
    pub transport: &'static str,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn spawn(bind_address: &str, port: u16, state: HealthState) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(state)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let dispatcher = if state.handlers > 0 {
        HealthCheck { status: "ready", detail: format!("{} poll handlers registered", state.handlers) }
    } else {
        HealthCheck { status: "degraded", detail: "no poll handlers registered".to_string() }
    };
    let ready = dispatcher.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "slotpoll-server runtime initialized".to_string(),
        },
        dispatcher,
        transport: state.transport.as_str(),
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        extract::State,
        http::{Request, StatusCode},
        Json,
    };
    use slotpoll_core::config::TransportMode;
    use tower::ServiceExt;

    use crate::health::{health, router, HealthState};

    #[tokio::test]
    async fn health_reports_ready_with_registered_handlers() {
        let (status, Json(payload)) = health(State(HealthState::new(TransportMode::Socket, 3))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.dispatcher.status, "ready");
        assert_eq!(payload.transport, "socket");
    }

    #[tokio::test]
    async fn health_degrades_without_handlers() {
        let (status, Json(payload)) =
            health(State(HealthState::new(TransportMode::Webhook, 0))).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.service.status, "ready");
        assert_eq!(payload.transport, "webhook");
    }

    #[tokio::test]
    async fn health_route_is_mounted() {
        let response = router(HealthState::new(TransportMode::Webhook, 3))
            .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
    }
}
