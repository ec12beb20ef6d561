use serde::{Deserialize, Serialize};

use crate::domain::message::ChatType;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandCategory {
    System,
    Utility,
    Player,
    TeamAdmin,
    Match,
    Communication,
}

impl CommandCategory {
    /// System and utility commands never need interpretation.
    pub fn is_deterministic(&self) -> bool {
        matches!(self, Self::System | Self::Utility)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandParameter {
    pub name: String,
    pub required: bool,
}

impl CommandParameter {
    pub fn required(name: impl Into<String>) -> Self {
        Self { name: name.into(), required: true }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self { name: name.into(), required: false }
    }
}

/// Registry entry describing one chat command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandMetadata {
    pub name: String,
    pub category: CommandCategory,
    pub parameters: Vec<CommandParameter>,
    pub requires_enhancement: bool,
    pub chat_types: Vec<ChatType>,
}

impl CommandMetadata {
    pub fn new(name: impl Into<String>, category: CommandCategory) -> Self {
        Self {
            name: name.into(),
            category,
            parameters: Vec::new(),
            requires_enhancement: false,
            chat_types: vec![ChatType::Main, ChatType::Leadership, ChatType::Private],
        }
    }

    pub fn with_parameter(mut self, parameter: CommandParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn enhanced(mut self) -> Self {
        self.requires_enhancement = true;
        self
    }

    pub fn only_in(mut self, chat_types: &[ChatType]) -> Self {
        self.chat_types = chat_types.to_vec();
        self
    }

    pub fn has_required_parameters(&self) -> bool {
        self.parameters.iter().any(|parameter| parameter.required)
    }

    pub fn available_in(&self, chat_type: ChatType) -> bool {
        self.chat_types.contains(&chat_type)
    }
}
