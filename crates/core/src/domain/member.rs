use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub player_id: String,
    pub sender_id: i64,
    pub team_id: String,
    pub name: String,
    pub phone_number: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub member_id: String,
    pub sender_id: i64,
    pub team_id: String,
    pub name: String,
    pub role: String,
}

/// Which conversation path a sender takes. Derived per message and never cached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserFlowType {
    Registered,
    Unregistered,
}

impl UserFlowType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::Unregistered => "unregistered",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationStatus {
    pub is_player: bool,
    pub is_team_member: bool,
}

impl RegistrationStatus {
    pub const UNREGISTERED: Self = Self { is_player: false, is_team_member: false };

    pub fn new(is_player: bool, is_team_member: bool) -> Self {
        Self { is_player, is_team_member }
    }

    pub fn is_registered(&self) -> bool {
        self.is_player || self.is_team_member
    }

    pub fn flow_type(&self) -> UserFlowType {
        if self.is_registered() {
            UserFlowType::Registered
        } else {
            UserFlowType::Unregistered
        }
    }
}
