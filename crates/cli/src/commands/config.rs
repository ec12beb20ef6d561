use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use huddle_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

struct ConfigSources {
    doc: Option<Value>,
    path: Option<PathBuf>,
}

impl ConfigSources {
    fn detect() -> Self {
        let path = detect_config_path();
        let doc = load_config_file_doc(path.as_deref());
        Self { doc, path }
    }

    fn line(&self, key_path: &str, value: &str, env_keys: &[&str]) -> String {
        render_line(key_path, value, self.field_source(key_path, env_keys))
    }

    fn field_source(&self, key_path: &str, env_keys: &[&str]) -> String {
        if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
            return format!("env ({env_key})");
        }

        if let Some(doc) = self.doc.as_ref() {
            if contains_path(doc, key_path) {
                let file_path = self
                    .path
                    .as_deref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "config file".to_string());
                return format!("file ({file_path})");
            }
        }

        "default".to_string()
    }
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let sources = ConfigSources::detect();
    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    let chat = &config.chat;
    lines.push(sources.line(
        "chat.bot_token",
        &redact_token(chat.bot_token.expose_secret()),
        &["HUDDLE_CHAT_BOT_TOKEN"],
    ));
    lines.push(sources.line("chat.team_id", &chat.team_id, &["HUDDLE_CHAT_TEAM_ID"]));
    lines.push(sources.line(
        "chat.main_chat_id",
        chat.main_chat_id.as_deref().unwrap_or("<unset>"),
        &["HUDDLE_CHAT_MAIN_CHAT_ID"],
    ));
    lines.push(sources.line(
        "chat.leadership_chat_id",
        chat.leadership_chat_id.as_deref().unwrap_or("<unset>"),
        &["HUDDLE_CHAT_LEADERSHIP_CHAT_ID"],
    ));
    lines.push(sources.line(
        "chat.command_prefix",
        &chat.command_prefix,
        &["HUDDLE_CHAT_COMMAND_PREFIX"],
    ));

    let admission = &config.admission;
    lines.push(sources.line(
        "admission.max_concurrent_requests",
        &admission.max_concurrent_requests.to_string(),
        &["HUDDLE_ADMISSION_MAX_CONCURRENT_REQUESTS"],
    ));
    lines.push(sources.line(
        "admission.max_requests_per_minute",
        &admission.max_requests_per_minute.to_string(),
        &["HUDDLE_ADMISSION_MAX_REQUESTS_PER_MINUTE"],
    ));
    lines.push(sources.line(
        "admission.cleanup_interval_secs",
        &admission.cleanup_interval_secs.to_string(),
        &["HUDDLE_ADMISSION_CLEANUP_INTERVAL_SECS"],
    ));
    lines.push(sources.line(
        "admission.slot_timeout_ms",
        &admission.slot_timeout_ms.to_string(),
        &["HUDDLE_ADMISSION_SLOT_TIMEOUT_MS"],
    ));

    lines.push(sources.line(
        "directory.lookup_timeout_ms",
        &config.directory.lookup_timeout_ms.to_string(),
        &["HUDDLE_DIRECTORY_LOOKUP_TIMEOUT_MS"],
    ));
    lines.push(sources.line(
        "directory.retry_attempts",
        &config.directory.retry_attempts.to_string(),
        &["HUDDLE_DIRECTORY_RETRY_ATTEMPTS"],
    ));

    let always_clear = if config.classifier.always_clear_commands.is_empty() {
        "<none>".to_string()
    } else {
        config.classifier.always_clear_commands.join(",")
    };
    lines.push(sources.line(
        "classifier.always_clear_commands",
        &always_clear,
        &["HUDDLE_CLASSIFIER_ALWAYS_CLEAR_COMMANDS"],
    ));
    lines.push(sources.line(
        "phone.default_region",
        &config.phone.default_region,
        &["HUDDLE_PHONE_DEFAULT_REGION"],
    ));

    lines.push(sources.line(
        "executor.base_url",
        config.executor.base_url.as_deref().unwrap_or("<unset: local echo executor>"),
        &["HUDDLE_EXECUTOR_BASE_URL"],
    ));
    lines.push(sources.line(
        "executor.timeout_secs",
        &config.executor.timeout_secs.to_string(),
        &["HUDDLE_EXECUTOR_TIMEOUT_SECS"],
    ));

    lines.push(sources.line(
        "server.bind_address",
        &config.server.bind_address,
        &["HUDDLE_SERVER_BIND_ADDRESS"],
    ));
    lines.push(sources.line(
        "server.health_check_port",
        &config.server.health_check_port.to_string(),
        &["HUDDLE_SERVER_HEALTH_CHECK_PORT"],
    ));

    lines.push(sources.line(
        "logging.level",
        &config.logging.level,
        &["HUDDLE_LOGGING_LEVEL", "HUDDLE_LOG_LEVEL"],
    ));
    lines.push(sources.line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        &["HUDDLE_LOGGING_FORMAT", "HUDDLE_LOG_FORMAT"],
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    ["huddle.toml", "config/huddle.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps the numeric bot id and hides the secret half.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((bot_id, _)) = trimmed.split_once(':') {
        return format!("{bot_id}:***");
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use super::redact_token;

    #[test]
    fn redaction_keeps_only_the_bot_id() {
        assert_eq!(redact_token("123456:AAE-secret"), "123456:***");
        assert_eq!(redact_token("  "), "<empty>");
        assert_eq!(redact_token("opaque"), "<redacted>");
    }
}
