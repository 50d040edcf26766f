use std::sync::Mutex;

use async_trait::async_trait;

use crate::events::MessageRef;
use crate::keyboard::MessageTemplate;
use crate::polling::TransportError;

/// One outbound chat operation. Handlers return these in delivery order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    Send { chat_id: i64, message: MessageTemplate },
    /// Replaces text and keyboard; a template without a keyboard removes the buttons.
    Edit { target: MessageRef, message: MessageTemplate },
    Delete { target: MessageRef },
    AnswerCallback { callback_id: String, text: Option<String>, show_alert: bool },
}

impl Outbound {
    pub fn send(chat_id: i64, message: MessageTemplate) -> Self {
        Self::Send { chat_id, message }
    }

    pub fn edit(target: MessageRef, message: MessageTemplate) -> Self {
        Self::Edit { target, message }
    }

    pub fn delete(target: MessageRef) -> Self {
        Self::Delete { target }
    }

    /// Stops the client-side spinner without showing anything.
    pub fn acknowledge(callback_id: impl Into<String>) -> Self {
        Self::AnswerCallback { callback_id: callback_id.into(), text: None, show_alert: false }
    }

    pub fn alert(callback_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::AnswerCallback {
            callback_id: callback_id.into(),
            text: Some(text.into()),
            show_alert: true,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Send { .. } => "send_message",
            Self::Edit { .. } => "edit_message",
            Self::Delete { .. } => "delete_message",
            Self::AnswerCallback { .. } => "answer_callback",
        }
    }
}

#[async_trait]
pub trait ChatOutbox: Send + Sync {
    async fn deliver(&self, action: &Outbound) -> Result<(), TransportError>;
}

/// Keeps every delivered action in memory.
#[derive(Debug, Default)]
pub struct RecordingOutbox {
    delivered: Mutex<Vec<Outbound>>,
}

impl RecordingOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<Outbound> {
        match self.delivered.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn take(&self) -> Vec<Outbound> {
        let mut guard = match self.delivered.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::take(&mut *guard)
    }
}

#[async_trait]
impl ChatOutbox for RecordingOutbox {
    async fn deliver(&self, action: &Outbound) -> Result<(), TransportError> {
        let mut guard = match self.delivered.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.push(action.clone());
        Ok(())
    }
}
