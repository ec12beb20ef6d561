//! Collaborator seams used by the message pipeline.
//!
//! The record store, command registry and task executor all live outside this
//! workspace; each is reached through one of the traits below.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{
    command::CommandMetadata,
    member::{Player, TeamMember},
    message::ChatType,
    routing::ExecutionContext,
};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("directory unavailable: {0}")]
    Unavailable(String),
    #[error("directory query failed: {0}")]
    Query(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("command registry unavailable: {0}")]
    Unavailable(String),
    #[error("command registry lookup failed: {0}")]
    Lookup(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("executor transport failure: {0}")]
    Transport(String),
    #[error("executor rejected task with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("executor returned an unreadable response: {0}")]
    InvalidResponse(String),
}

/// What the task executor produced for one message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub success: bool,
    pub reply: String,
}

impl TaskOutcome {
    pub fn reply(reply: impl Into<String>) -> Self {
        Self { success: true, reply: reply.into() }
    }

    pub fn declined(reply: impl Into<String>) -> Self {
        Self { success: false, reply: reply.into() }
    }
}

#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(
        &self,
        team_id: &str,
        task: &str,
        context: &ExecutionContext,
    ) -> Result<TaskOutcome, ExecutorError>;
}

#[async_trait]
pub trait DirectoryService: Send + Sync {
    async fn get_player_by_sender_id(
        &self,
        sender_id: i64,
        team_id: &str,
    ) -> Result<Option<Player>, DirectoryError>;

    async fn get_team_member_by_sender_id(
        &self,
        sender_id: i64,
        team_id: &str,
    ) -> Result<Option<TeamMember>, DirectoryError>;
}

/// Hands out a directory handle; acquisition may fail transiently.
#[async_trait]
pub trait DirectoryProvider: Send + Sync {
    async fn acquire(&self) -> Result<Arc<dyn DirectoryService>, DirectoryError>;
}

#[async_trait]
pub trait CommandRegistry: Send + Sync {
    async fn get_command(&self, name: &str) -> Result<Option<CommandMetadata>, RegistryError>;

    async fn get_command_for_chat(
        &self,
        name: &str,
        chat_type: ChatType,
    ) -> Result<Option<CommandMetadata>, RegistryError>;
}

/// Provider that always returns the same handle.
#[derive(Clone)]
pub struct StaticDirectoryProvider {
    directory: Arc<dyn DirectoryService>,
}

impl StaticDirectoryProvider {
    pub fn new(directory: Arc<dyn DirectoryService>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl DirectoryProvider for StaticDirectoryProvider {
    async fn acquire(&self) -> Result<Arc<dyn DirectoryService>, DirectoryError> {
        Ok(self.directory.clone())
    }
}

#[derive(Default)]
pub struct InMemoryDirectory {
    players: RwLock<HashMap<(String, i64), Player>>,
    team_members: RwLock<HashMap<(String, i64), TeamMember>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_player(self, player: Player) -> Self {
        self.insert_player(player);
        self
    }

    pub fn with_team_member(self, member: TeamMember) -> Self {
        self.insert_team_member(member);
        self
    }

    pub fn insert_player(&self, player: Player) {
        if let Ok(mut players) = self.players.write() {
            players.insert((player.team_id.clone(), player.sender_id), player);
        }
    }

    pub fn insert_team_member(&self, member: TeamMember) {
        if let Ok(mut members) = self.team_members.write() {
            members.insert((member.team_id.clone(), member.sender_id), member);
        }
    }
}

#[async_trait]
impl DirectoryService for InMemoryDirectory {
    async fn get_player_by_sender_id(
        &self,
        sender_id: i64,
        team_id: &str,
    ) -> Result<Option<Player>, DirectoryError> {
        let players = self
            .players
            .read()
            .map_err(|_| DirectoryError::Query("player index lock poisoned".to_string()))?;
        Ok(players.get(&(team_id.to_string(), sender_id)).cloned())
    }

    async fn get_team_member_by_sender_id(
        &self,
        sender_id: i64,
        team_id: &str,
    ) -> Result<Option<TeamMember>, DirectoryError> {
        let members = self
            .team_members
            .read()
            .map_err(|_| DirectoryError::Query("team member index lock poisoned".to_string()))?;
        Ok(members.get(&(team_id.to_string(), sender_id)).cloned())
    }
}
