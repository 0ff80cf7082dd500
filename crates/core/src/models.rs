use serde::{Deserialize, Serialize};

use crate::util::truncate_chars;

/// Chat platform message identifier.
pub type MessageId = String;

/// Maximum characters in a single plain text chat message.
pub const MESSAGE_LIMIT: usize = 2000;

// Discord embed limits
const TITLE_LIMIT: usize = 256;
const DESCRIPTION_LIMIT: usize = 4096;
const FIELD_NAME_LIMIT: usize = 256;
const FIELD_VALUE_LIMIT: usize = 1024;
const FIELD_COUNT_LIMIT: usize = 25;
const EMBED_TOTAL_LIMIT: usize = 6000;

/// A chat command such as `!projects foo bar`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// The command word, including its prefix character.
    pub verb: String,
    pub args: Vec<String>,
    /// Channel the command was read from; replies go back there.
    pub channel: Option<String>,
}

/// Structured chat message, serialized in the Discord embed shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedMessage {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub color: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<Provider>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<Footer>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub icon_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into(), inline: false }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Footer {
    pub text: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub icon_url: String,
}

impl RenderedMessage {
    pub fn field(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.fields.push(Field::new(name, value));
        self
    }

    /// Characters counted against the platform's total embed limit.
    pub fn text_len(&self) -> usize {
        let author = self.author.as_ref().map_or(0, |a| a.name.chars().count());
        let footer = self.footer.as_ref().map_or(0, |f| f.text.chars().count());
        let fields: usize =
            self.fields.iter().map(|f| f.name.chars().count() + f.value.chars().count()).sum();
        self.title.chars().count() + self.description.chars().count() + author + footer + fields
    }

    /// Clamp every part to the platform limits. Fields that would push the
    /// message over the total limit are dropped from the end.
    pub fn fit_to_limits(mut self) -> Self {
        clamp(&mut self.title, TITLE_LIMIT);
        clamp(&mut self.description, DESCRIPTION_LIMIT);
        if let Some(author) = &mut self.author {
            clamp(&mut author.name, TITLE_LIMIT);
        }
        self.fields.truncate(FIELD_COUNT_LIMIT);
        for field in &mut self.fields {
            clamp(&mut field.name, FIELD_NAME_LIMIT);
            clamp(&mut field.value, FIELD_VALUE_LIMIT);
            // Empty names or values are rejected by the platform
            if field.name.is_empty() {
                field.name.push('\u{200b}');
            }
            if field.value.is_empty() {
                field.value.push('\u{200b}');
            }
        }
        while self.text_len() > EMBED_TOTAL_LIMIT && self.fields.pop().is_some() {}
        self
    }
}

fn clamp(text: &mut String, max: usize) {
    let len = truncate_chars(text, max).len();
    text.truncate(len);
}
