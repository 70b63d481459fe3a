use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use slotpoll_core::{reconcile, ApplicationError, ClaimEvent, DomainError, SlotIndex};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    api::{ApiError, MessageRef, SlackApi},
    blocks::Block,
    commands::{normalize_poll_command, CommandParseError, SlashCommandPayload},
    payload::ViewStateValues,
    poll::{
        definition_from_submission, is_choice_action, poll_modal, LayoutError, RenderedPoll,
        POLL_MODAL_CALLBACK_ID,
    },
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    SlashCommand(SlashCommandPayload),
    ViewSubmission(ViewSubmissionEvent),
    BlockAction(BlockActionEvent),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::SlashCommand(_) => SlackEventType::SlashCommand,
            Self::ViewSubmission(_) => SlackEventType::ViewSubmission,
            Self::BlockAction(_) => SlackEventType::BlockAction,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    SlashCommand,
    ViewSubmission,
    BlockAction,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewSubmissionEvent {
    pub user_id: String,
    pub callback_id: String,
    pub values: ViewStateValues,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockActionEvent {
    pub channel_id: String,
    pub message_ts: String,
    pub user_id: String,
    pub action_id: String,
    pub value: Option<String>,
    pub message_blocks: Vec<Block>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    ViewOpened,
    Posted(MessageRef),
    Updated(MessageRef),
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Parse(#[from] CommandParseError),
    #[error(transparent)]
    Slot(#[from] DomainError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error("button click carried no value")]
    MissingActionValue,
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl From<EventHandlerError> for ApplicationError {
    fn from(value: EventHandlerError) -> Self {
        match value {
            EventHandlerError::Parse(CommandParseError::UnsupportedCommand(command)) => {
                Self::UnsupportedCommand(command)
            }
            EventHandlerError::Slot(error) => Self::Domain(error),
            EventHandlerError::Api(error) => Self::Integration(error.to_string()),
            other => Self::MalformedPayload(other.to_string()),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            debug!(
                event_name = "ingress.slack.event_ignored",
                correlation_id = %ctx.correlation_id,
                event_type = ?envelope.event.event_type(),
                "no handler registered for slack event"
            );
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Dispatcher wired with the three poll handlers sharing one API client.
pub fn poll_dispatcher(api: Arc<dyn SlackApi>, initial_channel: Option<String>) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(SlashCommandHandler::new(api.clone(), initial_channel));
    dispatcher.register(ViewSubmissionHandler::new(api.clone()));
    dispatcher.register(BlockActionHandler::new(api));
    dispatcher
}

/// Opens the poll form for `/poll`.
pub struct SlashCommandHandler {
    api: Arc<dyn SlackApi>,
    initial_channel: Option<String>,
}

impl SlashCommandHandler {
    pub fn new(api: Arc<dyn SlackApi>, initial_channel: Option<String>) -> Self {
        Self { api, initial_channel }
    }
}

#[async_trait]
impl EventHandler for SlashCommandHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::SlashCommand
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::SlashCommand(payload) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let command = normalize_poll_command(payload.clone())?;
        let modal = poll_modal(self.initial_channel.as_deref());
        self.api.open_view(&command.trigger_id, &modal).await?;

        info!(
            event_name = "poll.modal_opened",
            correlation_id = %ctx.correlation_id,
            user_id = %command.user_id,
            channel_id = %command.channel_id,
            "opened poll modal"
        );
        Ok(HandlerResult::ViewOpened)
    }
}

/// Posts a fresh poll when the form is submitted.
pub struct ViewSubmissionHandler {
    api: Arc<dyn SlackApi>,
}

impl ViewSubmissionHandler {
    pub fn new(api: Arc<dyn SlackApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl EventHandler for ViewSubmissionHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::ViewSubmission
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::ViewSubmission(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if event.callback_id != POLL_MODAL_CALLBACK_ID {
            debug!(
                event_name = "poll.submission_ignored",
                correlation_id = %ctx.correlation_id,
                callback_id = %event.callback_id,
                "view submission is not the poll form"
            );
            return Ok(HandlerResult::Ignored);
        }

        let definition = definition_from_submission(&event.values)?;
        let channel = definition.delivery_channel(&event.user_id).to_owned();
        let message = RenderedPoll::new(&definition).into_template();
        let reference = self.api.post_message(&channel, &message).await?;

        info!(
            event_name = "poll.posted",
            correlation_id = %ctx.correlation_id,
            channel_id = %reference.channel,
            message_ts = %reference.ts,
            direct_message = definition.channel.is_none(),
            "posted poll"
        );
        Ok(HandlerResult::Posted(reference))
    }
}

/// Applies a slot claim to the poll the button belongs to.
pub struct BlockActionHandler {
    api: Arc<dyn SlackApi>,
}

impl BlockActionHandler {
    pub fn new(api: Arc<dyn SlackApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl EventHandler for BlockActionHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::BlockAction
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::BlockAction(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if !is_choice_action(&event.action_id) {
            debug!(
                correlation_id = %ctx.correlation_id,
                action_id = %event.action_id,
                "ignoring block action outside the poll buttons"
            );
            return Ok(HandlerResult::Ignored);
        }

        let value = event.value.as_deref().ok_or(EventHandlerError::MissingActionValue)?;
        let target = SlotIndex::from_button_value(value)?;
        let mut poll = RenderedPoll::from_blocks(event.message_blocks.clone())?;

        let claim = ClaimEvent::for_user(&event.user_id, target);
        let next = reconcile(&poll.slot_groups(), &claim);
        poll.set_slot_groups(&next);

        // no version check on the remote message: concurrent claims are last-write-wins
        let reference = self
            .api
            .update_message(&event.channel_id, &event.message_ts, &poll.into_template())
            .await?;

        info!(
            event_name = "poll.slot_claimed",
            correlation_id = %ctx.correlation_id,
            channel_id = %event.channel_id,
            message_ts = %event.message_ts,
            user_id = %event.user_id,
            slot = %target,
            "updated poll slot groups"
        );
        Ok(HandlerResult::Updated(reference))
    }
}
