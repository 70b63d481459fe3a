use std::sync::Arc;

use slotpoll_core::config::{AppConfig, TransportMode};
use slotpoll_slack::{
    api::{ApiError, WebApiClient},
    events::{poll_dispatcher, EventDispatcher},
    signature::SignatureVerifier,
    socket::{ReconnectPolicy, SocketModeRunner, WebSocketTransport},
};
use thiserror::Error;
use tracing::info;

use crate::webhook::WebhookState;

pub struct Application {
    pub config: AppConfig,
    pub transport: TransportMode,
    pub dispatcher: Arc<EventDispatcher>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("slack web api client could not be built: {0}")]
    SlackClient(#[from] ApiError),
    #[error("{transport} transport requires {credential}")]
    MissingCredential { transport: &'static str, credential: &'static str },
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let api = WebApiClient::new(config.slack.bot_token.clone())?;
    let dispatcher =
        Arc::new(poll_dispatcher(Arc::new(api), config.slack.initial_channel.clone()));
    let transport = config.slack.transport_mode();

    info!(
        event_name = "system.bootstrap.dispatcher_ready",
        correlation_id = "bootstrap",
        handlers = dispatcher.handler_count(),
        transport_mode = transport.as_str(),
        "poll handlers registered"
    );

    Ok(Application { config, transport, dispatcher })
}

impl Application {
    pub fn webhook_state(&self) -> Result<WebhookState, BootstrapError> {
        let secret = self.config.slack.signing_secret.clone().ok_or(
            BootstrapError::MissingCredential {
                transport: TransportMode::Webhook.as_str(),
                credential: "slack.signing_secret",
            },
        )?;
        Ok(WebhookState::new(Arc::new(SignatureVerifier::new(secret)), self.dispatcher.clone()))
    }

    pub fn socket_runner(&self) -> Result<SocketModeRunner, BootstrapError> {
        let app_token =
            self.config.slack.app_token.clone().ok_or(BootstrapError::MissingCredential {
                transport: TransportMode::Socket.as_str(),
                credential: "slack.app_token",
            })?;
        Ok(SocketModeRunner::new(
            Arc::new(WebSocketTransport::new(app_token)),
            self.dispatcher.clone(),
            ReconnectPolicy::default(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use slotpoll_core::config::{AppConfig, ConfigOverrides, LoadOptions, TransportMode};

    use super::{bootstrap_with_config, BootstrapError};

    fn load(overrides: ConfigOverrides) -> AppConfig {
        AppConfig::load(LoadOptions { overrides, ..LoadOptions::default() })
            .expect("config should load")
    }

    #[test]
    fn config_rejects_app_token_with_wrong_prefix() {
        let result = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                slack_app_token: Some("invalid-token".to_string()),
                slack_bot_token: Some("xoxb-valid".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });

        assert!(result.is_err());
        let message = result.err().expect("error").to_string();
        assert!(message.contains("slack.app_token"));
    }

    #[test]
    fn signing_secret_selects_webhook_transport() {
        let app = bootstrap_with_config(load(ConfigOverrides {
            slack_bot_token: Some("xoxb-test".to_string()),
            slack_signing_secret: Some("8f742231b10e8888abcd99yyyzzz85a5".to_string()),
            ..ConfigOverrides::default()
        }))
        .expect("bootstrap");

        assert_eq!(app.transport, TransportMode::Webhook);
        assert_eq!(app.dispatcher.handler_count(), 3);
        assert!(app.webhook_state().is_ok());
        assert!(matches!(
            app.socket_runner(),
            Err(BootstrapError::MissingCredential { credential: "slack.app_token", .. })
        ));
    }

    #[test]
    fn app_token_selects_socket_transport() {
        let app = bootstrap_with_config(load(ConfigOverrides {
            slack_bot_token: Some("xoxb-test".to_string()),
            slack_app_token: Some("xapp-test".to_string()),
            slack_initial_channel: Some("C0123".to_string()),
            ..ConfigOverrides::default()
        }))
        .expect("bootstrap");

        assert_eq!(app.transport, TransportMode::Socket);
        assert_eq!(app.config.slack.initial_channel.as_deref(), Some("C0123"));
        assert!(app.socket_runner().is_ok());
        assert!(matches!(
            app.webhook_state(),
            Err(BootstrapError::MissingCredential { credential: "slack.signing_secret", .. })
        ));
    }
}
