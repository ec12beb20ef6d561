//! Membership and invite-link extraction from raw platform updates.
//!
//! Every accessor checks for presence at each nesting level. Malformed or missing
//! data produces an empty list or `None`; nothing here returns an error to the
//! message path.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::message::NewMember;

pub const INVITE_LINK_PREFIXES: [&str; 2] = ["https://t.me/joinchat/", "https://t.me/+"];
pub const MIN_INVITE_LINK_LEN: usize = 30;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteContext {
    pub chat_id: String,
    pub chat_type: Option<String>,
    pub chat_title: Option<String>,
    pub inviter_id: Option<i64>,
    pub inviter_username: Option<String>,
    pub invite_link: Option<String>,
    pub new_members: Vec<NewMember>,
}

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum InviteLinkRejection {
    #[error("invite link is empty")]
    Empty,
    #[error("invite link does not use a recognised invite prefix")]
    UnknownPrefix,
    #[error("invite link is shorter than {MIN_INVITE_LINK_LEN} characters")]
    TooShort,
    #[error("invite code contains characters outside [A-Za-z0-9_-]")]
    InvalidCode,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedInvite {
    pub context: InviteContext,
    pub link_rejection: Option<InviteLinkRejection>,
}

impl ProcessedInvite {
    pub fn has_valid_link(&self) -> bool {
        self.context.invite_link.is_some() && self.link_rejection.is_none()
    }
}

/// The object describing the membership change: a `message` (or `edited_message`)
/// carrying `new_chat_members`, or a `chat_member` update.
fn membership_container(update: &Value) -> Option<&Value> {
    for key in ["message", "edited_message"] {
        if let Some(message) = update.get(key).filter(|message| message.is_object()) {
            if message.get("new_chat_members").is_some_and(Value::is_array) {
                return Some(message);
            }
        }
    }
    update.get("chat_member").filter(|member| {
        member.get("new_chat_member").and_then(|new| new.get("user")).is_some_and(Value::is_object)
    })
}

pub fn is_new_members_event(update: &Value) -> bool {
    membership_container(update).is_some()
}

/// Human members who joined, with bot accounts filtered out.
pub fn extract_new_members(update: &Value) -> Vec<NewMember> {
    let Some(container) = membership_container(update) else {
        return Vec::new();
    };

    let users: Vec<&Value> = match container.get("new_chat_members").and_then(Value::as_array) {
        Some(members) => members.iter().collect(),
        None => container
            .get("new_chat_member")
            .and_then(|new| new.get("user"))
            .into_iter()
            .collect(),
    };

    users.into_iter().filter_map(member_from_user).filter(|member| !member.is_bot).collect()
}

pub fn extract_invite_context(update: &Value) -> Option<InviteContext> {
    let container = membership_container(update)?;
    let chat = container.get("chat")?;
    let chat_id = id_field(chat)?;

    let inviter = container.get("from");
    let invite_link = container.get("invite_link").and_then(|link| match link {
        Value::String(link) => Some(link.clone()),
        Value::Object(_) => link.get("invite_link").and_then(Value::as_str).map(str::to_owned),
        _ => None,
    });

    Some(InviteContext {
        chat_id: chat_id.to_string(),
        chat_type: string_field(chat, "type"),
        chat_title: string_field(chat, "title"),
        inviter_id: inviter.and_then(id_field),
        inviter_username: inviter.and_then(|user| string_field(user, "username")),
        invite_link,
        new_members: extract_new_members(update),
    })
}

pub fn validate_invite_link(link: &str) -> Result<(), InviteLinkRejection> {
    let link = link.trim();
    if link.is_empty() {
        return Err(InviteLinkRejection::Empty);
    }
    let code = INVITE_LINK_PREFIXES
        .iter()
        .find_map(|prefix| link.strip_prefix(prefix))
        .ok_or(InviteLinkRejection::UnknownPrefix)?;
    if link.len() < MIN_INVITE_LINK_LEN {
        return Err(InviteLinkRejection::TooShort);
    }
    let code_ok = !code.is_empty()
        && code.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
    if !code_ok {
        return Err(InviteLinkRejection::InvalidCode);
    }
    Ok(())
}

pub fn process_invite_event(update: &Value) -> Option<ProcessedInvite> {
    let context = extract_invite_context(update)?;
    let link_rejection = context.invite_link.as_deref().and_then(|link| validate_invite_link(link).err());
    Some(ProcessedInvite { context, link_rejection })
}

fn member_from_user(user: &Value) -> Option<NewMember> {
    let user_id = id_field(user)?;
    let username = string_field(user, "username");
    let first = string_field(user, "first_name");
    let last = string_field(user, "last_name");
    let display_name = match (first, last) {
        (Some(first), Some(last)) => format!("{first} {last}"),
        (Some(first), None) => first,
        (None, Some(last)) => last,
        (None, None) => username.clone().unwrap_or_else(|| format!("user {user_id}")),
    };

    Some(NewMember {
        user_id,
        username,
        display_name,
        is_bot: user.get("is_bot").and_then(Value::as_bool).unwrap_or(false),
    })
}

fn id_field(value: &Value) -> Option<i64> {
    match value.get("id")? {
        Value::Number(number) => number.as_i64(),
        Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_owned)
}
