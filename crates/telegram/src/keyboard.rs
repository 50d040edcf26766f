use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineButton {
    pub fn new(text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self { text: text.into(), callback_data: callback_data.into() }
    }
}

/// Serializes as Telegram's `InlineKeyboardMarkup`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct InlineKeyboard {
    pub inline_keyboard: Vec<Vec<InlineButton>>,
}

impl InlineKeyboard {
    pub fn rows(&self) -> &[Vec<InlineButton>] {
        &self.inline_keyboard
    }

    pub fn buttons(&self) -> impl Iterator<Item = &InlineButton> {
        self.inline_keyboard.iter().flatten()
    }

    pub fn is_empty(&self) -> bool {
        self.inline_keyboard.iter().all(Vec::is_empty)
    }
}

/// Message body in Telegram HTML plus an optional inline keyboard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyboard: Option<InlineKeyboard>,
}

impl MessageTemplate {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), keyboard: None }
    }

    pub fn callback_payloads(&self) -> Vec<&str> {
        self.keyboard
            .iter()
            .flat_map(InlineKeyboard::buttons)
            .map(|button| button.callback_data.as_str())
            .collect()
    }
}

pub struct MessageBuilder {
    text: String,
    rows: Vec<Vec<InlineButton>>,
}

impl MessageBuilder {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), rows: Vec::new() }
    }

    /// Appends `text` on a new line.
    pub fn line(mut self, text: impl AsRef<str>) -> Self {
        self.text.push('\n');
        self.text.push_str(text.as_ref());
        self
    }

    /// Lays the buttons added by `build` out `per_row` to a keyboard row.
    pub fn grid<F>(mut self, per_row: usize, build: F) -> Self
    where
        F: FnOnce(&mut ButtonsBuilder),
    {
        let mut builder = ButtonsBuilder::default();
        build(&mut builder);
        let per_row = per_row.max(1);
        for chunk in builder.buttons.chunks(per_row) {
            self.rows.push(chunk.to_vec());
        }
        self
    }

    /// A single button occupying its own keyboard row.
    pub fn row(mut self, button: InlineButton) -> Self {
        self.rows.push(vec![button]);
        self
    }

    pub fn build(self) -> MessageTemplate {
        let keyboard =
            (!self.rows.is_empty()).then_some(InlineKeyboard { inline_keyboard: self.rows });
        MessageTemplate { text: self.text, keyboard }
    }
}

#[derive(Default)]
pub struct ButtonsBuilder {
    buttons: Vec<InlineButton>,
}

impl ButtonsBuilder {
    pub fn button(
        &mut self,
        text: impl Into<String>,
        callback_data: impl Into<String>,
    ) -> &mut Self {
        self.buttons.push(InlineButton::new(text, callback_data));
        self
    }
}

/// Escapes text for Telegram's HTML parse mode.
pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for character in raw.chars() {
        match character {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            other => escaped.push(other),
        }
    }
    escaped
}

pub fn bold(raw: &str) -> String {
    format!("<b>{}</b>", escape_html(raw))
}
