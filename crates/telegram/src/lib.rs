//! Telegram Integration - long-polling bot interface
//!
//! This crate provides the chat surface for slotbook:
//! - **Polling** (`polling`) - update loop with reconnect/backoff (no public URL needed)
//! - **Bot API** (`api`) - `getUpdates` long polling and the outbound calls
//! - **Commands** (`commands`) - `/start`, `/my` and inline-button payloads
//! - **Events** (`events`) - text messages and button clicks routed to services
//! - **Keyboards** (`keyboard`, `views`) - inline keyboards and rendered messages
//!
//! # Architecture
//!
//! ```text
//! getUpdates → PollingRunner → EventDispatcher → Handlers → MessageService / CallbackService
//!                   ↓
//!              ChatOutbox ← Vec<Outbound>
//! ```
//!
//! # Key Types
//!
//! - `PollingRunner` - update loop; dispatch and delivery failures never stop it
//! - `EventDispatcher` - routes events to the registered handler
//! - `MessageBuilder` - constructs HTML messages with inline keyboards
//! - `CallbackService` - seam the booking assistant implements for button clicks

pub mod api;
pub mod commands;
pub mod events;
pub mod keyboard;
pub mod outbox;
pub mod polling;
pub mod views;

pub use api::TelegramBotApi;
pub use commands::{CallbackAction, ChatCommand, PayloadError};
pub use events::{
    dispatcher_for, ButtonClickEvent, CallbackReply, CallbackService, ChatEnvelope, ChatEvent,
    EventContext, EventDispatcher, EventHandlerError, HandlerResult, MessageRef, MessageService,
    TextMessageEvent,
};
pub use keyboard::{InlineButton, InlineKeyboard, MessageBuilder, MessageTemplate};
pub use outbox::{ChatOutbox, Outbound, RecordingOutbox};
pub use polling::{PollingRunner, ReconnectPolicy, TransportError, UpdateSource};
