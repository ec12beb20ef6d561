use std::collections::BTreeMap;

use async_trait::async_trait;
use huddle_core::{
    domain::{
        command::{CommandCategory, CommandMetadata, CommandParameter},
        message::ChatType,
    },
    services::{CommandRegistry, RegistryError},
};

/// In-memory command registry keyed by lowercased command name.
#[derive(Clone, Debug, Default)]
pub struct CommandCatalog {
    commands: BTreeMap<String, CommandMetadata>,
}

impl CommandCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard team-management command set.
    pub fn with_defaults() -> Self {
        use CommandCategory::{Communication, Match, Player, System, TeamAdmin, Utility};
        use CommandParameter as P;

        let leadership = [ChatType::Leadership, ChatType::Private];

        Self::new()
            .with_command(CommandMetadata::new("/help", System))
            .with_command(CommandMetadata::new("/ping", System))
            .with_command(CommandMetadata::new("/version", System))
            .with_command(CommandMetadata::new("/myinfo", Utility))
            .with_command(CommandMetadata::new("/list", Utility).with_parameter(P::optional("filter")))
            .with_command(
                CommandMetadata::new("/status", Player)
                    .with_parameter(P::required("player"))
                    .enhanced(),
            )
            .with_command(
                CommandMetadata::new("/register", Player)
                    .with_parameter(P::required("details"))
                    .enhanced(),
            )
            .with_command(
                CommandMetadata::new("/update", Player)
                    .with_parameter(P::required("field"))
                    .with_parameter(P::required("value"))
                    .enhanced(),
            )
            .with_command(
                CommandMetadata::new("/addplayer", TeamAdmin)
                    .with_parameter(P::required("name"))
                    .with_parameter(P::required("phone"))
                    .with_parameter(P::optional("position"))
                    .enhanced()
                    .only_in(&leadership),
            )
            .with_command(
                CommandMetadata::new("/addmember", TeamAdmin)
                    .with_parameter(P::required("name"))
                    .with_parameter(P::required("phone"))
                    .enhanced()
                    .only_in(&leadership),
            )
            .with_command(
                CommandMetadata::new("/approve", TeamAdmin)
                    .with_parameter(P::required("player"))
                    .enhanced()
                    .only_in(&leadership),
            )
            .with_command(
                CommandMetadata::new("/reject", TeamAdmin)
                    .with_parameter(P::required("player"))
                    .with_parameter(P::optional("reason"))
                    .enhanced()
                    .only_in(&leadership),
            )
            .with_command(
                CommandMetadata::new("/announce", Communication)
                    .with_parameter(P::required("message"))
                    .enhanced()
                    .only_in(&leadership),
            )
            .with_command(CommandMetadata::new("/matches", Match))
            .with_command(
                CommandMetadata::new("/availability", Match)
                    .with_parameter(P::required("match"))
                    .enhanced(),
            )
    }

    pub fn with_command(mut self, command: CommandMetadata) -> Self {
        self.register(command);
        self
    }

    pub fn register(&mut self, command: CommandMetadata) {
        self.commands.insert(command.name.trim().to_lowercase(), command);
    }

    pub fn commands(&self) -> impl Iterator<Item = &CommandMetadata> {
        self.commands.values()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    fn lookup(&self, name: &str) -> Option<&CommandMetadata> {
        self.commands.get(&name.trim().to_lowercase())
    }
}

#[async_trait]
impl CommandRegistry for CommandCatalog {
    async fn get_command(&self, name: &str) -> Result<Option<CommandMetadata>, RegistryError> {
        Ok(self.lookup(name).cloned())
    }

    async fn get_command_for_chat(
        &self,
        name: &str,
        chat_type: ChatType,
    ) -> Result<Option<CommandMetadata>, RegistryError> {
        Ok(self.lookup(name).filter(|command| command.available_in(chat_type)).cloned())
    }
}
