use std::{fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which conversation a message arrived in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatType {
    #[default]
    Main,
    Leadership,
    Private,
}

impl ChatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Leadership => "leadership",
            Self::Private => "private",
        }
    }
}

impl fmt::Display for ChatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChatType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "main" | "main_chat" => Ok(Self::Main),
            "leadership" | "leadership_chat" => Ok(Self::Leadership),
            "private" => Ok(Self::Private),
            other => Err(format!("unsupported chat type `{other}` (expected main|leadership|private)")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactPayload {
    pub phone_number: String,
    pub user_id: Option<i64>,
    pub first_name: Option<String>,
}

/// A member who joined a chat, as reported by the platform.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMember {
    pub user_id: i64,
    pub username: Option<String>,
    pub display_name: String,
    pub is_bot: bool,
}

/// A single inbound chat event, already reduced to the fields the router needs.
///
/// Built once by the transport layer and consumed once by the router.
#[derive(Clone, Debug)]
pub struct InboundMessage {
    pub sender_id: String,
    pub chat_id: String,
    pub chat_type: ChatType,
    pub text: String,
    pub username: Option<String>,
    pub contact: Option<ContactPayload>,
    pub new_members: Option<Vec<NewMember>>,
    pub raw_event: Option<Arc<Value>>,
}

impl InboundMessage {
    pub fn text(
        sender_id: impl Into<String>,
        chat_id: impl Into<String>,
        chat_type: ChatType,
        text: impl Into<String>,
    ) -> Self {
        Self {
            sender_id: sender_id.into(),
            chat_id: chat_id.into(),
            chat_type,
            text: text.into(),
            username: None,
            contact: None,
            new_members: None,
            raw_event: None,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_contact(mut self, contact: ContactPayload) -> Self {
        self.contact = Some(contact);
        self
    }

    pub fn with_new_members(mut self, members: Vec<NewMember>) -> Self {
        self.new_members = Some(members);
        self
    }

    pub fn with_raw_event(mut self, raw_event: Arc<Value>) -> Self {
        self.raw_event = Some(raw_event);
        self
    }

    pub fn kind(&self) -> MessageKind {
        if self.contact.is_some() {
            MessageKind::ContactShare
        } else if self.new_members.as_ref().is_some_and(|members| !members.is_empty()) {
            MessageKind::MembersJoined
        } else {
            MessageKind::Text
        }
    }

    /// Sender id coerced to a positive integer, when it is one.
    pub fn numeric_sender_id(&self) -> Option<i64> {
        parse_sender_id(&self.sender_id)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    ContactShare,
    MembersJoined,
}

pub fn parse_sender_id(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|id| *id > 0)
}
