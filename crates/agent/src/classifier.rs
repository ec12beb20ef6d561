//! Clarity classification: decides whether a message is a registry-confirmed,
//! unambiguous command or needs enhanced (LLM-assisted) interpretation.
//!
//! The default answer is "needs enhancement". Only a command that resolves in the
//! registry and passes one of the clarity rules skips it. Registry failures never
//! make a message look clear.

use std::{collections::BTreeSet, sync::Arc};

use huddle_core::{
    domain::{command::CommandMetadata, message::ChatType},
    services::{CommandRegistry, RegistryError},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const DEFAULT_COMMAND_PREFIX: &str = "/";

/// Bare status-style commands that only ever refer to the sender.
const SELF_REFERENTIAL_COMMANDS: [&str; 6] = ["myinfo", "status", "info", "ping", "version", "list"];

const FOLLOW_UP_WORDS: [&str; 16] = [
    "and", "also", "ok", "okay", "yes", "yeah", "yep", "no", "nope", "sure", "thanks", "thx",
    "then", "more", "again", "same",
];

const FOLLOW_UP_PHRASES: [&str; 8] = [
    "what about",
    "how about",
    "and then",
    "what else",
    "the other",
    "same for",
    "as well",
    "do it",
];

const REFERENCE_WORDS: [&str; 18] = [
    "it", "that", "this", "those", "these", "them", "they", "he", "she", "him", "her", "there",
    "yesterday", "today", "tomorrow", "last", "previous", "earlier",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationReason {
    DeterministicCategory,
    NoEnhancementFlag,
    NoRequiredParameters,
    SelfReferential,
    AllowListed,
    EnhancedCommand,
    ConversationalFollowUp,
    AmbiguousReference,
    UnknownCommand,
    NaturalLanguage,
    RegistryUnavailable,
    EmptyInput,
}

impl ClassificationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DeterministicCategory => "deterministic_category",
            Self::NoEnhancementFlag => "no_enhancement_flag",
            Self::NoRequiredParameters => "no_required_parameters",
            Self::SelfReferential => "self_referential",
            Self::AllowListed => "allow_listed",
            Self::EnhancedCommand => "enhanced_command",
            Self::ConversationalFollowUp => "conversational_follow_up",
            Self::AmbiguousReference => "ambiguous_reference",
            Self::UnknownCommand => "unknown_command",
            Self::NaturalLanguage => "natural_language",
            Self::RegistryUnavailable => "registry_unavailable",
            Self::EmptyInput => "empty_input",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub requires_enhancement: bool,
    pub reason: ClassificationReason,
    pub command: Option<String>,
}

impl Classification {
    fn clear(reason: ClassificationReason, command: &CommandMetadata) -> Self {
        Self { requires_enhancement: false, reason, command: Some(command.name.clone()) }
    }

    fn enhance(reason: ClassificationReason, command: Option<String>) -> Self {
        Self { requires_enhancement: true, reason, command }
    }
}

/// Leading command token and whether it carried the prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
struct CommandToken {
    name: String,
    prefixed: bool,
    has_arguments: bool,
}

pub struct CommandClassifier {
    registry: Arc<dyn CommandRegistry>,
    prefix: String,
    always_clear: BTreeSet<String>,
}

impl CommandClassifier {
    pub fn new(registry: Arc<dyn CommandRegistry>) -> Self {
        Self { registry, prefix: DEFAULT_COMMAND_PREFIX.to_string(), always_clear: BTreeSet::new() }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        if !prefix.trim().is_empty() {
            self.prefix = prefix.trim().to_string();
        }
        self
    }

    /// Allow-listed names are compared without the prefix and case-insensitively.
    pub fn with_always_clear<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.always_clear = commands
            .into_iter()
            .map(|command| self.bare_name(&command.as_ref().trim().to_lowercase()).to_string())
            .filter(|command| !command.is_empty())
            .collect();
        self
    }

    pub async fn requires_enhanced_processing(&self, text: &str, chat_type: ChatType) -> bool {
        self.classify(text, chat_type).await.requires_enhancement
    }

    pub async fn classify(&self, text: &str, chat_type: ChatType) -> Classification {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Classification::enhance(ClassificationReason::EmptyInput, None);
        }

        let normalized = trimmed.to_lowercase();
        let Some(token) = self.extract_token(&normalized) else {
            return Classification::enhance(language_reason(&normalized), None);
        };

        match self.resolve(&token.name, chat_type).await {
            Ok(Some(command)) => {
                let classification = match self.clear_reason(&command, &token) {
                    Some(reason) => Classification::clear(reason, &command),
                    None => Classification::enhance(
                        ClassificationReason::EnhancedCommand,
                        Some(command.name.clone()),
                    ),
                };
                debug!(
                    event_name = "classifier.command.resolved",
                    command = %command.name,
                    chat_type = chat_type.as_str(),
                    requires_enhancement = classification.requires_enhancement,
                    reason = classification.reason.as_str(),
                    "command resolved in registry"
                );
                classification
            }
            Ok(None) => {
                let reason = match language_reason(&normalized) {
                    ClassificationReason::NaturalLanguage if token.prefixed => {
                        ClassificationReason::UnknownCommand
                    }
                    other => other,
                };
                Classification::enhance(reason, None)
            }
            Err(error) => {
                warn!(
                    event_name = "classifier.registry.failed",
                    command = %token.name,
                    error = %error,
                    "command registry lookup failed; routing for enhancement"
                );
                Classification::enhance(ClassificationReason::RegistryUnavailable, None)
            }
        }
    }

    fn extract_token(&self, normalized: &str) -> Option<CommandToken> {
        let mut words = normalized.split_whitespace();
        let first = words.next()?;
        let has_arguments = words.next().is_some();

        if first.starts_with(self.prefix.as_str()) {
            if first.len() == self.prefix.len() {
                return None;
            }
            return Some(CommandToken { name: first.to_string(), prefixed: true, has_arguments });
        }

        // A lone word is still tried against the registry.
        (!has_arguments).then(|| CommandToken {
            name: first.to_string(),
            prefixed: false,
            has_arguments: false,
        })
    }

    fn candidates(&self, name: &str) -> Vec<String> {
        let mut candidates = vec![name.to_string()];
        let with_prefix = format!("{}{}", self.prefix, self.bare_name(name));
        let stripped = self.bare_name(name).to_string();
        for candidate in [with_prefix, stripped] {
            if !candidate.is_empty() && !candidates.contains(&candidate) {
                candidates.push(candidate);
            }
        }
        candidates
    }

    async fn resolve(
        &self,
        name: &str,
        chat_type: ChatType,
    ) -> Result<Option<CommandMetadata>, RegistryError> {
        for candidate in self.candidates(name) {
            if let Some(command) = self.registry.get_command_for_chat(&candidate, chat_type).await? {
                return Ok(Some(command));
            }
            if let Some(command) = self.registry.get_command(&candidate).await? {
                return Ok(Some(command));
            }
        }
        Ok(None)
    }

    fn clear_reason(
        &self,
        command: &CommandMetadata,
        token: &CommandToken,
    ) -> Option<ClassificationReason> {
        let bare = self.bare_name(&command.name.to_lowercase()).to_string();

        if command.category.is_deterministic() {
            Some(ClassificationReason::DeterministicCategory)
        } else if !command.requires_enhancement {
            Some(ClassificationReason::NoEnhancementFlag)
        } else if !command.has_required_parameters() {
            Some(ClassificationReason::NoRequiredParameters)
        } else if !token.has_arguments && SELF_REFERENTIAL_COMMANDS.contains(&bare.as_str()) {
            Some(ClassificationReason::SelfReferential)
        } else if self.always_clear.contains(&bare) {
            Some(ClassificationReason::AllowListed)
        } else {
            None
        }
    }

    fn bare_name<'a>(&self, name: &'a str) -> &'a str {
        name.strip_prefix(self.prefix.as_str()).unwrap_or(name)
    }
}

fn language_reason(normalized: &str) -> ClassificationReason {
    let words: Vec<&str> = normalized
        .split(|ch: char| !ch.is_alphanumeric() && ch != '\'')
        .filter(|word| !word.is_empty())
        .collect();

    let follow_up = FOLLOW_UP_PHRASES.iter().any(|phrase| normalized.contains(phrase))
        || words.first().is_some_and(|first| FOLLOW_UP_WORDS.contains(first));
    if follow_up {
        return ClassificationReason::ConversationalFollowUp;
    }

    if words.iter().any(|word| REFERENCE_WORDS.contains(word)) {
        return ClassificationReason::AmbiguousReference;
    }

    ClassificationReason::NaturalLanguage
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use async_trait::async_trait;
    use huddle_core::{
        domain::{
            command::{CommandCategory, CommandMetadata, CommandParameter},
            message::ChatType,
        },
        services::{CommandRegistry, RegistryError},
    };

    use super::{ClassificationReason, CommandClassifier};
    use crate::catalog::CommandCatalog;

    struct FailingRegistry {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CommandRegistry for FailingRegistry {
        async fn get_command(&self, _name: &str) -> Result<Option<CommandMetadata>, RegistryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(RegistryError::Unavailable("store offline".to_string()))
        }

        async fn get_command_for_chat(
            &self,
            _name: &str,
            _chat_type: ChatType,
        ) -> Result<Option<CommandMetadata>, RegistryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(RegistryError::Unavailable("store offline".to_string()))
        }
    }

    fn classifier() -> CommandClassifier {
        let catalog = CommandCatalog::new()
            .with_command(CommandMetadata::new("/ping", CommandCategory::System))
            .with_command(
                CommandMetadata::new("/addplayer", CommandCategory::Player)
                    .with_parameter(CommandParameter::required("name"))
                    .with_parameter(CommandParameter::required("phone"))
                    .enhanced(),
            )
            .with_command(
                CommandMetadata::new("/status", CommandCategory::Player)
                    .with_parameter(CommandParameter::required("player"))
                    .enhanced(),
            )
            .with_command(
                CommandMetadata::new("/register", CommandCategory::Player)
                    .with_parameter(CommandParameter::required("details"))
                    .enhanced(),
            )
            .with_command(
                CommandMetadata::new("/approve", CommandCategory::TeamAdmin)
                    .only_in(&[ChatType::Leadership]),
            );
        CommandClassifier::new(Arc::new(catalog))
    }

    #[tokio::test]
    async fn registered_system_command_is_clear() {
        let classification = classifier().classify("/ping", ChatType::Main).await;
        assert!(!classification.requires_enhancement);
        assert_eq!(classification.reason, ClassificationReason::DeterministicCategory);
        assert_eq!(classification.command.as_deref(), Some("/ping"));
    }

    #[tokio::test]
    async fn follow_up_with_reference_needs_enhancement() {
        let classification = classifier().classify("what about yesterday", ChatType::Main).await;
        assert!(classification.requires_enhancement);
        assert_eq!(classification.reason, ClassificationReason::ConversationalFollowUp);
    }

    #[tokio::test]
    async fn pronoun_reference_needs_enhancement() {
        let classification =
            classifier().classify("can you move it to saturday", ChatType::Main).await;
        assert!(classification.requires_enhancement);
        assert_eq!(classification.reason, ClassificationReason::AmbiguousReference);
    }

    #[tokio::test]
    async fn bare_word_and_case_resolve_through_candidates() {
        let classifier = classifier();
        assert!(!classifier.requires_enhanced_processing("PING", ChatType::Private).await);
        assert!(!classifier.requires_enhanced_processing("  /Ping  ", ChatType::Main).await);
    }

    #[tokio::test]
    async fn command_with_required_parameters_needs_enhancement() {
        let classification =
            classifier().classify("/addplayer Jo 07700900123", ChatType::Leadership).await;
        assert!(classification.requires_enhancement);
        assert_eq!(classification.reason, ClassificationReason::EnhancedCommand);
    }

    #[tokio::test]
    async fn bare_self_referential_command_is_clear_only_without_arguments() {
        let classifier = classifier();
        let bare = classifier.classify("/status", ChatType::Main).await;
        assert!(!bare.requires_enhancement);
        assert_eq!(bare.reason, ClassificationReason::SelfReferential);

        let with_args = classifier.classify("/status for jo", ChatType::Main).await;
        assert!(with_args.requires_enhancement);
    }

    #[tokio::test]
    async fn allow_list_marks_command_clear() {
        let classifier = classifier().with_always_clear(["/register"]);
        let classification = classifier.classify("/register jo", ChatType::Main).await;
        assert!(!classification.requires_enhancement);
        assert_eq!(classification.reason, ClassificationReason::AllowListed);
    }

    #[tokio::test]
    async fn unknown_prefixed_command_needs_enhancement() {
        let classification = classifier().classify("/teleport now", ChatType::Main).await;
        assert!(classification.requires_enhancement);
        assert_eq!(classification.reason, ClassificationReason::UnknownCommand);
    }

    #[tokio::test]
    async fn chat_restricted_command_still_resolves_globally() {
        // get_command_for_chat misses in the main chat, get_command still finds it.
        let classification = classifier().classify("/approve", ChatType::Main).await;
        assert!(!classification.requires_enhancement);
        assert_eq!(classification.command.as_deref(), Some("/approve"));
    }

    #[tokio::test]
    async fn registry_failure_fails_safe() {
        let registry = Arc::new(FailingRegistry { calls: AtomicUsize::new(0) });
        let classifier = CommandClassifier::new(registry.clone());

        let classification = classifier.classify("/ping", ChatType::Main).await;
        assert!(classification.requires_enhancement);
        assert_eq!(classification.reason, ClassificationReason::RegistryUnavailable);
        assert_eq!(registry.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn classification_is_deterministic() {
        let classifier = classifier();
        for text in ["/ping", "what about yesterday", "/addplayer jo", "hello", ""] {
            let first = classifier.classify(text, ChatType::Main).await;
            for _ in 0..5 {
                assert_eq!(classifier.classify(text, ChatType::Main).await, first, "text {text:?}");
            }
        }
    }

    #[tokio::test]
    async fn custom_prefix_is_honoured() {
        let catalog = CommandCatalog::new()
            .with_command(CommandMetadata::new("!ping", CommandCategory::Utility));
        let classifier = CommandClassifier::new(Arc::new(catalog)).with_prefix("!");

        assert!(!classifier.requires_enhanced_processing("!ping", ChatType::Main).await);
        assert!(!classifier.requires_enhanced_processing("ping", ChatType::Main).await);
    }
}
