use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use slotbook_core::errors::ApplicationError;
use slotbook_core::flows::RegistrationFlow;
use slotbook_core::session::SessionStore;
use slotbook_sheets::{BookingGrid, StoreError, TabularStore, UserRegistry};
use slotbook_telegram::{
    ButtonClickEvent, CallbackAction, CallbackReply, CallbackService, ChatCommand, EventContext,
    EventHandlerError, MessageRef, MessageService, Outbound, TextMessageEvent,
};

/// The conversational booking assistant: registration over text messages, booking and
/// cancellation over inline buttons.
pub struct BookingAssistant {
    pub(crate) sessions: Arc<dyn SessionStore>,
    pub(crate) registry: UserRegistry,
    pub(crate) grid: BookingGrid,
    pub(crate) flow: RegistrationFlow,
}

impl BookingAssistant {
    pub fn new(sessions: Arc<dyn SessionStore>, registry: UserRegistry, grid: BookingGrid) -> Self {
        Self { sessions, registry, grid, flow: RegistrationFlow }
    }

    /// Wires both repositories onto one store.
    pub fn over_store(
        store: Arc<dyn TabularStore>,
        sessions: Arc<dyn SessionStore>,
        users_sheet: &str,
        booking_sheet: &str,
    ) -> Self {
        Self::new(
            sessions,
            UserRegistry::new(Arc::clone(&store), users_sheet),
            BookingGrid::new(store, booking_sheet),
        )
    }
}

/// The user-safe text for a failed store call.
pub(crate) fn failure_text(error: StoreError, ctx: &EventContext) -> &'static str {
    ApplicationError::from(error).into_interface(ctx.correlation_id.as_str()).user_message()
}

#[async_trait]
impl MessageService for BookingAssistant {
    async fn handle_message(
        &self,
        command: ChatCommand,
        event: &TextMessageEvent,
        ctx: &EventContext,
    ) -> Result<Vec<Outbound>, EventHandlerError> {
        info!(
            event_name = "assistant.message_received",
            correlation_id = %ctx.correlation_id,
            user_id = %event.user_id,
            "handling text message"
        );

        let outbound = match command {
            ChatCommand::Start => self.start(event.user_id, event.chat_id, ctx).await,
            ChatCommand::MySlots => self.my_slots(event.user_id, event.chat_id, ctx).await,
            ChatCommand::FreeText(text) => {
                self.free_text(event.user_id, event.chat_id, text, ctx).await
            }
        };
        Ok(outbound)
    }
}

#[async_trait]
impl CallbackService for BookingAssistant {
    async fn handle_callback(
        &self,
        action: CallbackAction,
        click: &ButtonClickEvent,
        target: MessageRef,
        ctx: &EventContext,
    ) -> Result<CallbackReply, EventHandlerError> {
        info!(
            event_name = "assistant.callback_received",
            correlation_id = %ctx.correlation_id,
            user_id = %click.user_id,
            action = %action,
            "handling button click"
        );

        let profile = match self.authenticate(click.user_id, target.chat_id, ctx).await {
            Ok(profile) => profile,
            Err(refusal) => return Ok(CallbackReply::new(vec![refusal])),
        };

        Ok(match action {
            CallbackAction::SelectDay { column } => self.select_day(column, target, ctx).await,
            CallbackAction::Book { slot } => self.book(slot, &profile, target, ctx).await,
            CallbackAction::Cancel { cell } => self.cancel(cell, &profile, target, ctx).await,
            CallbackAction::AddSlot | CallbackAction::BackToDays => {
                self.restart_day_selection(target, ctx).await
            }
        })
    }
}
