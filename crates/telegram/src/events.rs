use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use slotbook_core::domain::UserId;
use slotbook_core::errors::ApplicationError;

use crate::commands::{CallbackAction, ChatCommand};
use crate::outbox::Outbound;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatEnvelope {
    pub update_id: i64,
    pub event: ChatEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatEvent {
    TextMessage(TextMessageEvent),
    ButtonClick(ButtonClickEvent),
    Unsupported { kind: String },
}

impl ChatEvent {
    pub fn event_type(&self) -> ChatEventType {
        match self {
            Self::TextMessage(_) => ChatEventType::TextMessage,
            Self::ButtonClick(_) => ChatEventType::ButtonClick,
            Self::Unsupported { .. } => ChatEventType::Unsupported,
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Self::TextMessage(event) => Some(event.user_id),
            Self::ButtonClick(event) => Some(event.user_id),
            Self::Unsupported { .. } => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChatEventType {
    TextMessage,
    ButtonClick,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextMessageEvent {
    pub chat_id: i64,
    pub message_id: i64,
    pub user_id: UserId,
    pub text: String,
}

/// A message the bot can edit or delete.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ButtonClickEvent {
    pub callback_id: String,
    pub user_id: UserId,
    /// Absent when the originating message is too old for the platform to report.
    pub message: Option<MessageRef>,
    pub payload: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl EventContext {
    pub fn for_update(update_id: i64) -> Self {
        Self { correlation_id: format!("tg-update-{update_id}") }
    }
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(Vec<Outbound>),
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Application(#[from] ApplicationError),
    #[error("message handler failure: {0}")]
    Message(String),
    #[error("callback handler failure: {0}")]
    Callback(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> ChatEventType;
    async fn handle(
        &self,
        envelope: &ChatEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<ChatEventType, Arc<dyn EventHandler>>,
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
        envelope: &ChatEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Routes text messages and button clicks to one service implementing both seams.
pub fn dispatcher_for<S>(service: Arc<S>) -> EventDispatcher
where
    S: MessageService + CallbackService + 'static,
{
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(TextMessageHandler::new(Arc::clone(&service)));
    dispatcher.register(ButtonClickHandler::new(service));
    dispatcher
}

#[async_trait]
pub trait MessageService: Send + Sync {
    async fn handle_message(
        &self,
        command: ChatCommand,
        event: &TextMessageEvent,
        ctx: &EventContext,
    ) -> Result<Vec<Outbound>, EventHandlerError>;
}

/// What a callback produced: an optional alert for the callback answer plus follow-up actions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallbackReply {
    pub alert: Option<String>,
    pub actions: Vec<Outbound>,
}

impl CallbackReply {
    pub fn new(actions: Vec<Outbound>) -> Self {
        Self { alert: None, actions }
    }

    pub fn with_alert(mut self, text: impl Into<String>) -> Self {
        self.alert = Some(text.into());
        self
    }
}

#[async_trait]
pub trait CallbackService: Send + Sync {
    async fn handle_callback(
        &self,
        action: CallbackAction,
        click: &ButtonClickEvent,
        target: MessageRef,
        ctx: &EventContext,
    ) -> Result<CallbackReply, EventHandlerError>;
}

pub struct TextMessageHandler<S> {
    service: Arc<S>,
}

impl<S> TextMessageHandler<S>
where
    S: MessageService,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for TextMessageHandler<S>
where
    S: MessageService + 'static,
{
    fn event_type(&self) -> ChatEventType {
        ChatEventType::TextMessage
    }

    async fn handle(
        &self,
        envelope: &ChatEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let ChatEvent::TextMessage(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let command = ChatCommand::parse(&event.text);
        let outbound = self.service.handle_message(command, event, ctx).await?;
        Ok(if outbound.is_empty() {
            HandlerResult::Processed
        } else {
            HandlerResult::Responded(outbound)
        })
    }
}

/// Telegram drops callback answers that arrive more than about 15 seconds after the click.
pub const DEFAULT_ANSWER_WITHIN: Duration = Duration::from_secs(10);

/// Answers every click exactly once, first, whatever the service does with it.
///
/// The answer can carry an alert chosen by the service, so it is only sent once the service
/// returns. The user's spinner keeps turning for those store round trips. A service that has
/// not returned within `answer_within` is abandoned and the click is acknowledged bare.
pub struct ButtonClickHandler<S> {
    service: Arc<S>,
    answer_within: Duration,
}

impl<S> ButtonClickHandler<S>
where
    S: CallbackService,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service, answer_within: DEFAULT_ANSWER_WITHIN }
    }

    pub fn with_answer_within(mut self, answer_within: Duration) -> Self {
        self.answer_within = answer_within;
        self
    }
}

#[async_trait]
impl<S> EventHandler for ButtonClickHandler<S>
where
    S: CallbackService + 'static,
{
    fn event_type(&self) -> ChatEventType {
        ChatEventType::ButtonClick
    }

    async fn handle(
        &self,
        envelope: &ChatEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let ChatEvent::ButtonClick(click) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        let acknowledge_only =
            || Ok(HandlerResult::Responded(vec![Outbound::acknowledge(&click.callback_id)]));

        let action = match CallbackAction::parse(&click.payload) {
            Ok(action) => action,
            Err(error) => {
                warn!(
                    event_name = "ingress.telegram.payload_rejected",
                    correlation_id = %ctx.correlation_id,
                    user_id = %click.user_id,
                    payload = %click.payload,
                    error = %error,
                    "ignoring button click with unreadable payload"
                );
                return acknowledge_only();
            }
        };

        let Some(target) = click.message else {
            warn!(
                event_name = "ingress.telegram.click_without_message",
                correlation_id = %ctx.correlation_id,
                user_id = %click.user_id,
                payload = %click.payload,
                "button click carries no message reference"
            );
            return acknowledge_only();
        };

        let handled = tokio::time::timeout(
            self.answer_within,
            self.service.handle_callback(action, click, target, ctx),
        )
        .await;

        let reply = match handled {
            Ok(Ok(reply)) => reply,
            Err(_) => {
                warn!(
                    event_name = "ingress.telegram.callback_timed_out",
                    correlation_id = %ctx.correlation_id,
                    user_id = %click.user_id,
                    payload = %click.payload,
                    answer_within_ms = self.answer_within.as_millis() as u64,
                    "callback service too slow; answering the click without it"
                );
                CallbackReply::default()
            }
            Ok(Err(error)) => {
                warn!(
                    event_name = "ingress.telegram.callback_failed",
                    correlation_id = %ctx.correlation_id,
                    user_id = %click.user_id,
                    payload = %click.payload,
                    error = %error,
                    "callback service failed; answering the click anyway"
                );
                CallbackReply::default()
            }
        };

        let answer = match reply.alert {
            Some(text) => Outbound::alert(&click.callback_id, text),
            None => Outbound::acknowledge(&click.callback_id),
        };
        let mut outbound = Vec::with_capacity(reply.actions.len() + 1);
        outbound.push(answer);
        outbound.extend(reply.actions);
        Ok(HandlerResult::Responded(outbound))
    }
}
