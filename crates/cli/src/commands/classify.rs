use std::sync::Arc;

use anyhow::Context;
use huddle_agent::{catalog::CommandCatalog, classifier::{Classification, CommandClassifier}};
use huddle_core::{
    config::{AppConfig, LoadOptions},
    domain::message::ChatType,
};
use serde::Serialize;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct ClassifyReport {
    chat_type: ChatType,
    #[serde(flatten)]
    classification: Classification,
}

pub fn run(text: &str, chat: &str) -> CommandResult {
    let chat_type = match chat.parse::<ChatType>() {
        Ok(chat_type) => chat_type,
        Err(error) => return CommandResult::failure("classify", "invalid_input", error, 2),
    };

    match classify(text, chat_type) {
        Ok(classification) => {
            let message = if classification.requires_enhancement {
                format!("needs enhanced processing ({})", classification.reason.as_str())
            } else {
                format!("direct command ({})", classification.reason.as_str())
            };
            CommandResult::success_with_data(
                "classify",
                message,
                ClassifyReport { chat_type, classification },
            )
        }
        Err(error) => CommandResult::failure("classify", "runtime", format!("{error:#}"), 1),
    }
}

fn classify(text: &str, chat_type: ChatType) -> anyhow::Result<Classification> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to initialize async runtime")?;

    let mut classifier = CommandClassifier::new(Arc::new(CommandCatalog::with_defaults()));
    // Without a loadable config the built-in prefix and an empty allow-list apply.
    if let Ok(config) = AppConfig::load(LoadOptions::default()) {
        classifier = classifier
            .with_prefix(config.chat.command_prefix.as_str())
            .with_always_clear(&config.classifier.always_clear_commands);
    }

    Ok(runtime.block_on(classifier.classify(text, chat_type)))
}
