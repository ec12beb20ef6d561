use std::sync::Arc;

use huddle_core::{
    config::ChatConfig,
    domain::message::{ChatType, ContactPayload, InboundMessage},
    invite,
};
use serde_json::Value;
use thiserror::Error;

/// Configured leadership chat id. Every other group chat is the main chat.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChatRouting {
    pub leadership_chat_id: Option<String>,
}

impl ChatRouting {
    pub fn new(leadership_chat_id: Option<String>) -> Self {
        Self { leadership_chat_id }
    }

    /// Private chats are always private; the leadership id must match exactly;
    /// anything else is the main chat.
    pub fn classify(&self, chat_id: &str, platform_chat_type: Option<&str>) -> ChatType {
        if platform_chat_type == Some("private") {
            return ChatType::Private;
        }
        match self.leadership_chat_id.as_deref().map(str::trim) {
            Some(leadership) if !leadership.is_empty() && leadership == chat_id => {
                ChatType::Leadership
            }
            _ => ChatType::Main,
        }
    }
}

impl From<&ChatConfig> for ChatRouting {
    fn from(config: &ChatConfig) -> Self {
        Self::new(config.leadership_chat_id.clone())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum IngressError {
    #[error("update carries no message")]
    NoMessage,
    #[error("message has no sender")]
    MissingSender,
    #[error("message has no chat")]
    MissingChat,
    #[error("join event contained only bot accounts")]
    OnlyBotsJoined,
}

/// Converts a raw platform update into an [`InboundMessage`].
pub fn inbound_from_update(update: &Value, routing: &ChatRouting) -> Result<InboundMessage, IngressError> {
    let container = ["message", "edited_message", "chat_member"]
        .iter()
        .find_map(|key| update.get(*key).filter(|value| value.is_object()))
        .ok_or(IngressError::NoMessage)?;

    let sender = container.get("from").ok_or(IngressError::MissingSender)?;
    let sender_id = scalar_id(sender).ok_or(IngressError::MissingSender)?;
    let chat = container.get("chat").ok_or(IngressError::MissingChat)?;
    let chat_id = scalar_id(chat).ok_or(IngressError::MissingChat)?;
    let chat_type = routing.classify(&chat_id, chat.get("type").and_then(Value::as_str));

    let text = container
        .get("text")
        .or_else(|| container.get("caption"))
        .and_then(Value::as_str)
        .unwrap_or_default();

    let mut message = InboundMessage::text(sender_id, chat_id, chat_type, text)
        .with_raw_event(Arc::new(update.clone()));
    if let Some(username) = sender.get("username").and_then(Value::as_str) {
        message = message.with_username(username);
    }

    if let Some(contact) = container.get("contact").and_then(contact_payload) {
        return Ok(message.with_contact(contact));
    }

    if invite::is_new_members_event(update) {
        let members = invite::extract_new_members(update);
        if members.is_empty() {
            return Err(IngressError::OnlyBotsJoined);
        }
        return Ok(message.with_new_members(members));
    }

    Ok(message)
}

fn contact_payload(contact: &Value) -> Option<ContactPayload> {
    let phone_number = contact.get("phone_number").and_then(Value::as_str)?;
    Some(ContactPayload {
        phone_number: phone_number.to_string(),
        user_id: contact.get("user_id").and_then(Value::as_i64),
        first_name: contact.get("first_name").and_then(Value::as_str).map(str::to_string),
    })
}

fn scalar_id(value: &Value) -> Option<String> {
    match value.get("id")? {
        Value::Number(number) => Some(number.to_string()),
        Value::String(raw) if !raw.trim().is_empty() => Some(raw.trim().to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use huddle_core::domain::message::{ChatType, MessageKind};
    use serde_json::json;

    use super::{inbound_from_update, ChatRouting, IngressError};

    fn routing() -> ChatRouting {
        ChatRouting::new(Some("-100999".to_string()))
    }

    #[test]
    fn text_message_in_leadership_chat() {
        let update = json!({
            "update_id": 1,
            "message": {
                "from": { "id": 42, "username": "alex" },
                "chat": { "id": -100999, "type": "supergroup" },
                "text": "/addplayer Jo"
            }
        });

        let message = inbound_from_update(&update, &routing()).expect("message");
        assert_eq!(message.sender_id, "42");
        assert_eq!(message.chat_id, "-100999");
        assert_eq!(message.chat_type, ChatType::Leadership);
        assert_eq!(message.text, "/addplayer Jo");
        assert_eq!(message.username.as_deref(), Some("alex"));
        assert!(message.raw_event.is_some());
    }

    #[test]
    fn chat_type_defaults_to_main() {
        let update = json!({
            "message": { "from": { "id": 1 }, "chat": { "id": -100555 }, "text": "hi" }
        });
        let unconfigured = inbound_from_update(&update, &ChatRouting::default()).expect("message");
        assert_eq!(unconfigured.chat_type, ChatType::Main);

        let private = json!({
            "message": { "from": { "id": 1 }, "chat": { "id": 1, "type": "private" }, "text": "hi" }
        });
        let message = inbound_from_update(&private, &routing()).expect("message");
        assert_eq!(message.chat_type, ChatType::Private);
    }

    #[test]
    fn contact_share_is_recognised() {
        let update = json!({
            "message": {
                "from": { "id": 42 },
                "chat": { "id": 42, "type": "private" },
                "contact": { "phone_number": "+12025550123", "user_id": 42, "first_name": "Alex" }
            }
        });

        let message = inbound_from_update(&update, &routing()).expect("message");
        assert_eq!(message.kind(), MessageKind::ContactShare);
        assert_eq!(message.contact.map(|contact| contact.phone_number), Some("+12025550123".to_string()));
    }

    #[test]
    fn join_of_only_bots_is_skipped() {
        let update = json!({
            "message": {
                "from": { "id": 7 },
                "chat": { "id": -100111 },
                "new_chat_members": [ { "id": 9, "is_bot": true, "first_name": "bot" } ]
            }
        });
        assert_eq!(inbound_from_update(&update, &routing()).err(), Some(IngressError::OnlyBotsJoined));
    }

    #[test]
    fn malformed_updates_are_rejected() {
        assert_eq!(inbound_from_update(&json!({}), &routing()).err(), Some(IngressError::NoMessage));
        assert_eq!(
            inbound_from_update(&json!({ "message": { "chat": { "id": 1 } } }), &routing()).err(),
            Some(IngressError::MissingSender)
        );
        assert_eq!(
            inbound_from_update(&json!({ "message": { "from": { "id": 1 } } }), &routing()).err(),
            Some(IngressError::MissingChat)
        );
    }
}
