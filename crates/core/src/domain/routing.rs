use serde::{Deserialize, Serialize};

use crate::{
    domain::{
        member::{RegistrationStatus, UserFlowType},
        message::ChatType,
    },
    errors::RoutingError,
    invite::InviteContext,
};

/// Terminal outcome for one inbound message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingResult {
    pub success: bool,
    pub message: String,
    pub error: Option<String>,
    pub error_class: Option<String>,
    pub flow_type: Option<UserFlowType>,
}

impl RoutingResult {
    pub fn success(message: impl Into<String>, flow_type: UserFlowType) -> Self {
        Self {
            success: true,
            message: message.into(),
            error: None,
            error_class: None,
            flow_type: Some(flow_type),
        }
    }

    pub fn failure(error: &RoutingError) -> Self {
        Self {
            success: false,
            message: error.user_message(),
            error: Some(error.to_string()),
            error_class: Some(error.error_class().to_owned()),
            flow_type: None,
        }
    }

    pub fn failure_for(error: &RoutingError, flow_type: UserFlowType) -> Self {
        Self { flow_type: Some(flow_type), ..Self::failure(error) }
    }

    pub fn is_error_class(&self, class: &str) -> bool {
        self.error_class.as_deref() == Some(class)
    }
}

/// Normalized context handed to the task executor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub sender_id: i64,
    pub team_id: String,
    pub chat_id: String,
    pub chat_type: ChatType,
    pub text: String,
    pub username: Option<String>,
    pub is_player: bool,
    pub is_team_member: bool,
    pub is_registered: bool,
    pub flow_type: UserFlowType,
    pub requires_enhancement: bool,
    pub phone_number: Option<String>,
    pub invite: Option<InviteContext>,
}

impl ExecutionContext {
    pub fn apply_registration(&mut self, status: RegistrationStatus) {
        self.is_player = status.is_player;
        self.is_team_member = status.is_team_member;
        self.is_registered = status.is_registered();
        self.flow_type = status.flow_type();
    }
}
