//! Bot API client: long polling for updates and the four outbound calls.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

use slotbook_core::config::TelegramConfig;
use slotbook_core::domain::UserId;

use crate::events::{ButtonClickEvent, ChatEnvelope, ChatEvent, MessageRef, TextMessageEvent};
use crate::keyboard::InlineKeyboard;
use crate::outbox::{ChatOutbox, Outbound};
use crate::polling::{TransportError, UpdateSource};

const PARSE_MODE: &str = "HTML";
const ALLOWED_UPDATES: [&str; 2] = ["message", "callback_query"];
/// Headroom over the long-poll timeout before the HTTP client gives up.
const REQUEST_GRACE: Duration = Duration::from_secs(10);

#[derive(Default)]
struct PollState {
    offset: i64,
    pending: VecDeque<ChatEnvelope>,
}

pub struct TelegramBotApi {
    client: Client,
    api_base_url: String,
    token: SecretString,
    poll_timeout_secs: u64,
    state: Mutex<PollState>,
}

impl TelegramBotApi {
    pub fn new(config: &TelegramConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs) + REQUEST_GRACE)
            .build()
            .map_err(|error| {
                TransportError::Connect(format!("could not build http client: {error}"))
            })?;

        Ok(Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_owned(),
            token: config.bot_token.clone(),
            poll_timeout_secs: config.poll_timeout_secs,
            state: Mutex::new(PollState::default()),
        })
    }

    /// Contains the token; never log it.
    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base_url, self.token.expose_secret())
    }

    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T, TransportError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned + Send,
    {
        let response = self
            .client
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(|error| TransportError::Receive(error.without_url().to_string()))?;

        let reply: ApiReply<T> = response
            .json()
            .await
            .map_err(|error| TransportError::Receive(error.without_url().to_string()))?;
        reply.into_result(method)
    }

    async fn fetch_updates(&self, offset: i64) -> Result<Vec<Update>, TransportError> {
        self.call(
            "getUpdates",
            &GetUpdates {
                offset,
                timeout: self.poll_timeout_secs,
                allowed_updates: &ALLOWED_UPDATES,
            },
        )
        .await
    }
}

#[async_trait]
impl UpdateSource for TelegramBotApi {
    async fn connect(&self) -> Result<(), TransportError> {
        let me: User = self
            .call("getMe", &serde_json::json!({}))
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        info!(
            event_name = "transport.telegram.authorized",
            bot_id = me.id,
            bot_username = me.username.as_deref().unwrap_or("unknown"),
            "bot token accepted"
        );
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<ChatEnvelope>, TransportError> {
        let mut state = self.state.lock().await;
        loop {
            if let Some(envelope) = state.pending.pop_front() {
                return Ok(Some(envelope));
            }

            let updates = self.fetch_updates(state.offset).await?;
            debug!(
                event_name = "transport.telegram.polled",
                offset = state.offset,
                updates = updates.len(),
                "long poll returned"
            );
            for update in updates {
                state.offset = state.offset.max(update.update_id + 1);
                state.pending.push_back(convert_update(update));
            }
        }
    }
}

#[async_trait]
impl ChatOutbox for TelegramBotApi {
    async fn deliver(&self, action: &Outbound) -> Result<(), TransportError> {
        let delivered: Result<Value, TransportError> = match action {
            Outbound::Send { chat_id, message } => {
                self.call(
                    "sendMessage",
                    &SendMessage {
                        chat_id: *chat_id,
                        text: &message.text,
                        parse_mode: PARSE_MODE,
                        reply_markup: message.keyboard.as_ref(),
                    },
                )
                .await
            }
            Outbound::Edit { target, message } => {
                self.call(
                    "editMessageText",
                    &EditMessageText {
                        chat_id: target.chat_id,
                        message_id: target.message_id,
                        text: &message.text,
                        parse_mode: PARSE_MODE,
                        reply_markup: message.keyboard.as_ref(),
                    },
                )
                .await
            }
            Outbound::Delete { target } => {
                self.call(
                    "deleteMessage",
                    &DeleteMessage { chat_id: target.chat_id, message_id: target.message_id },
                )
                .await
            }
            Outbound::AnswerCallback { callback_id, text, show_alert } => {
                self.call(
                    "answerCallbackQuery",
                    &AnswerCallbackQuery {
                        callback_query_id: callback_id,
                        text: text.as_deref(),
                        show_alert: *show_alert,
                    },
                )
                .await
            }
        };

        delivered.map(|_| ()).map_err(|error| match error {
            TransportError::Receive(message) => TransportError::Deliver(message),
            other => other,
        })
    }
}

#[derive(Deserialize)]
struct ApiReply<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

impl<T> ApiReply<T> {
    fn into_result(self, method: &str) -> Result<T, TransportError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            (true, None) => Err(TransportError::Api {
                method: method.to_owned(),
                description: "response carried no result".to_owned(),
            }),
            (false, _) => Err(TransportError::Api {
                method: method.to_owned(),
                description: self.description.unwrap_or_else(|| "unknown error".to_owned()),
            }),
        }
    }
}

#[derive(Serialize)]
struct GetUpdates<'a> {
    offset: i64,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a InlineKeyboard>,
}

/// Omitting `reply_markup` removes any buttons from the edited message.
#[derive(Serialize)]
struct EditMessageText<'a> {
    chat_id: i64,
    message_id: i64,
    text: &'a str,
    parse_mode: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a InlineKeyboard>,
}

#[derive(Serialize)]
struct DeleteMessage {
    chat_id: i64,
    message_id: i64,
}

#[derive(Serialize)]
struct AnswerCallbackQuery<'a> {
    callback_query_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    show_alert: bool,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
    callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct Message {
    message_id: i64,
    chat: Chat,
    from: Option<User>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct User {
    id: i64,
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    id: String,
    from: User,
    message: Option<Message>,
    data: Option<String>,
}

fn convert_update(update: Update) -> ChatEnvelope {
    let update_id = update.update_id;
    let event = match (update.message, update.callback_query) {
        (Some(Message { message_id, chat, from: Some(from), text: Some(text) }), _) => {
            ChatEvent::TextMessage(TextMessageEvent {
                chat_id: chat.id,
                message_id,
                user_id: UserId(from.id),
                text,
            })
        }
        (Some(_), _) => ChatEvent::Unsupported { kind: "message_without_text".to_owned() },
        (None, Some(CallbackQuery { id, from, message, data: Some(payload) })) => {
            ChatEvent::ButtonClick(ButtonClickEvent {
                callback_id: id,
                user_id: UserId(from.id),
                message: message.map(|message| MessageRef {
                    chat_id: message.chat.id,
                    message_id: message.message_id,
                }),
                payload,
            })
        }
        (None, Some(_)) => ChatEvent::Unsupported { kind: "callback_without_data".to_owned() },
        (None, None) => ChatEvent::Unsupported { kind: "other".to_owned() },
    };
    ChatEnvelope { update_id, event }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use slotbook_core::domain::UserId;

    use super::{convert_update, ApiReply, EditMessageText, SendMessage, Update, PARSE_MODE};
    use crate::events::{ButtonClickEvent, ChatEvent, MessageRef, TextMessageEvent};
    use crate::keyboard::{InlineButton, MessageBuilder, MessageTemplate};
    use crate::polling::TransportError;

    fn send_message_body(chat_id: i64, message: &MessageTemplate) -> serde_json::Value {
        serde_json::to_value(SendMessage {
            chat_id,
            text: &message.text,
            parse_mode: PARSE_MODE,
            reply_markup: message.keyboard.as_ref(),
        })
        .expect("serializes")
    }

    fn update(value: serde_json::Value) -> Update {
        serde_json::from_value(value).expect("update decodes")
    }

    #[test]
    fn text_messages_convert_with_sender_identity() {
        let envelope = convert_update(update(json!({
            "update_id": 501,
            "message": {
                "message_id": 12,
                "chat": { "id": 777, "type": "private" },
                "from": { "id": 777, "is_bot": false, "first_name": "Alice" },
                "text": "/start"
            }
        })));

        assert_eq!(envelope.update_id, 501);
        assert_eq!(
            envelope.event,
            ChatEvent::TextMessage(TextMessageEvent {
                chat_id: 777,
                message_id: 12,
                user_id: UserId(777),
                text: "/start".to_owned(),
            })
        );
    }

    #[test]
    fn callback_queries_convert_with_message_reference() {
        let envelope = convert_update(update(json!({
            "update_id": 502,
            "callback_query": {
                "id": "4382",
                "from": { "id": 777, "is_bot": false, "first_name": "Alice" },
                "message": { "message_id": 13, "chat": { "id": 777 }, "text": "📅 Choose a day:" },
                "chat_instance": "-1",
                "data": "day_3"
            }
        })));

        assert_eq!(
            envelope.event,
            ChatEvent::ButtonClick(ButtonClickEvent {
                callback_id: "4382".to_owned(),
                user_id: UserId(777),
                message: Some(MessageRef { chat_id: 777, message_id: 13 }),
                payload: "day_3".to_owned(),
            })
        );
    }

    #[test]
    fn other_updates_are_unsupported() {
        let sticker = convert_update(update(json!({
            "update_id": 503,
            "message": { "message_id": 14, "chat": { "id": 1 }, "from": { "id": 1 } }
        })));
        let unknown = convert_update(update(json!({ "update_id": 504, "poll": {} })));

        assert!(matches!(sticker.event, ChatEvent::Unsupported { .. }));
        assert!(matches!(unknown.event, ChatEvent::Unsupported { .. }));
    }

    #[test]
    fn api_errors_surface_the_description() {
        let reply: ApiReply<serde_json::Value> = serde_json::from_value(json!({
            "ok": false,
            "error_code": 400,
            "description": "Bad Request: message is not modified"
        }))
        .expect("reply decodes");

        assert_eq!(
            reply.into_result("editMessageText"),
            Err(TransportError::Api {
                method: "editMessageText".to_owned(),
                description: "Bad Request: message is not modified".to_owned(),
            })
        );
    }

    #[test]
    fn outbound_bodies_use_html_and_optional_markup() {
        let plain = send_message_body(5, &MessageTemplate::text("✅ Registration successful!"));
        assert_eq!(
            plain,
            json!({ "chat_id": 5, "text": "✅ Registration successful!", "parse_mode": "HTML" })
        );

        let message = MessageBuilder::new("x").row(InlineButton::new("🔙 Back", "back_days")).build();
        let with_buttons = send_message_body(5, &message);
        assert_eq!(
            with_buttons["reply_markup"],
            json!({ "inline_keyboard": [[{ "text": "🔙 Back", "callback_data": "back_days" }]] })
        );

        let edit = serde_json::to_value(EditMessageText {
            chat_id: 5,
            message_id: 6,
            text: "🗑 Slot deleted!",
            parse_mode: PARSE_MODE,
            reply_markup: None,
        })
        .expect("serializes");
        assert!(edit.get("reply_markup").is_none());
    }
}
