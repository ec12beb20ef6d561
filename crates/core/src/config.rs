use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{phone, retry::RetryPolicy};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub chat: ChatConfig,
    pub admission: AdmissionConfig,
    pub directory: DirectoryConfig,
    pub classifier: ClassifierConfig,
    pub phone: PhoneConfig,
    pub executor: ExecutorConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ChatConfig {
    pub bot_token: SecretString,
    pub team_id: String,
    pub main_chat_id: Option<String>,
    pub leadership_chat_id: Option<String>,
    pub command_prefix: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdmissionConfig {
    pub max_concurrent_requests: usize,
    pub max_requests_per_minute: usize,
    pub cleanup_interval_secs: u64,
    pub slot_timeout_ms: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryConfig {
    pub lookup_timeout_ms: u64,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_backoff_factor: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClassifierConfig {
    pub always_clear_commands: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhoneConfig {
    pub default_region: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutorConfig {
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub bot_token: Option<String>,
    pub team_id: Option<String>,
    pub leadership_chat_id: Option<String>,
    pub log_level: Option<String>,
    pub executor_base_url: Option<String>,
    pub max_concurrent_requests: Option<usize>,
    pub max_requests_per_minute: Option<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            chat: ChatConfig {
                bot_token: String::new().into(),
                team_id: String::new(),
                main_chat_id: None,
                leadership_chat_id: None,
                command_prefix: "/".to_string(),
            },
            admission: AdmissionConfig {
                max_concurrent_requests: 10,
                max_requests_per_minute: 60,
                cleanup_interval_secs: 300,
                slot_timeout_ms: 1_000,
            },
            directory: DirectoryConfig {
                lookup_timeout_ms: 10_000,
                retry_attempts: 3,
                retry_base_delay_ms: 100,
                retry_backoff_factor: 2,
            },
            classifier: ClassifierConfig::default(),
            phone: PhoneConfig { default_region: phone::DEFAULT_REGION.to_string() },
            executor: ExecutorConfig { base_url: None, timeout_secs: 30 },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl AdmissionConfig {
    pub fn slot_timeout(&self) -> Duration {
        Duration::from_millis(self.slot_timeout_ms)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

impl DirectoryConfig {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_attempts, self.retry_base_delay_ms, self.retry_backoff_factor)
    }
}

impl ExecutorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("huddle.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(chat) = patch.chat {
            if let Some(bot_token_value) = chat.bot_token {
                self.chat.bot_token = secret_value(bot_token_value);
            }
            if let Some(team_id) = chat.team_id {
                self.chat.team_id = team_id;
            }
            if let Some(main_chat_id) = chat.main_chat_id {
                self.chat.main_chat_id = Some(main_chat_id);
            }
            if let Some(leadership_chat_id) = chat.leadership_chat_id {
                self.chat.leadership_chat_id = Some(leadership_chat_id);
            }
            if let Some(command_prefix) = chat.command_prefix {
                self.chat.command_prefix = command_prefix;
            }
        }

        if let Some(admission) = patch.admission {
            if let Some(max_concurrent_requests) = admission.max_concurrent_requests {
                self.admission.max_concurrent_requests = max_concurrent_requests;
            }
            if let Some(max_requests_per_minute) = admission.max_requests_per_minute {
                self.admission.max_requests_per_minute = max_requests_per_minute;
            }
            if let Some(cleanup_interval_secs) = admission.cleanup_interval_secs {
                self.admission.cleanup_interval_secs = cleanup_interval_secs;
            }
            if let Some(slot_timeout_ms) = admission.slot_timeout_ms {
                self.admission.slot_timeout_ms = slot_timeout_ms;
            }
        }

        if let Some(directory) = patch.directory {
            if let Some(lookup_timeout_ms) = directory.lookup_timeout_ms {
                self.directory.lookup_timeout_ms = lookup_timeout_ms;
            }
            if let Some(retry_attempts) = directory.retry_attempts {
                self.directory.retry_attempts = retry_attempts;
            }
            if let Some(retry_base_delay_ms) = directory.retry_base_delay_ms {
                self.directory.retry_base_delay_ms = retry_base_delay_ms;
            }
            if let Some(retry_backoff_factor) = directory.retry_backoff_factor {
                self.directory.retry_backoff_factor = retry_backoff_factor;
            }
        }

        if let Some(classifier) = patch.classifier {
            if let Some(always_clear_commands) = classifier.always_clear_commands {
                self.classifier.always_clear_commands = always_clear_commands;
            }
        }

        if let Some(phone) = patch.phone {
            if let Some(default_region) = phone.default_region {
                self.phone.default_region = default_region;
            }
        }

        if let Some(executor) = patch.executor {
            if let Some(base_url) = executor.base_url {
                self.executor.base_url = Some(base_url);
            }
            if let Some(timeout_secs) = executor.timeout_secs {
                self.executor.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("HUDDLE_CHAT_BOT_TOKEN") {
            self.chat.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("HUDDLE_CHAT_TEAM_ID") {
            self.chat.team_id = value;
        }
        if let Some(value) = read_env("HUDDLE_CHAT_MAIN_CHAT_ID") {
            self.chat.main_chat_id = Some(value);
        }
        if let Some(value) = read_env("HUDDLE_CHAT_LEADERSHIP_CHAT_ID") {
            self.chat.leadership_chat_id = Some(value);
        }
        if let Some(value) = read_env("HUDDLE_CHAT_COMMAND_PREFIX") {
            self.chat.command_prefix = value;
        }

        if let Some(value) = read_env("HUDDLE_ADMISSION_MAX_CONCURRENT_REQUESTS") {
            self.admission.max_concurrent_requests =
                parse_usize("HUDDLE_ADMISSION_MAX_CONCURRENT_REQUESTS", &value)?;
        }
        if let Some(value) = read_env("HUDDLE_ADMISSION_MAX_REQUESTS_PER_MINUTE") {
            self.admission.max_requests_per_minute =
                parse_usize("HUDDLE_ADMISSION_MAX_REQUESTS_PER_MINUTE", &value)?;
        }
        if let Some(value) = read_env("HUDDLE_ADMISSION_CLEANUP_INTERVAL_SECS") {
            self.admission.cleanup_interval_secs =
                parse_u64("HUDDLE_ADMISSION_CLEANUP_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = read_env("HUDDLE_ADMISSION_SLOT_TIMEOUT_MS") {
            self.admission.slot_timeout_ms = parse_u64("HUDDLE_ADMISSION_SLOT_TIMEOUT_MS", &value)?;
        }

        if let Some(value) = read_env("HUDDLE_DIRECTORY_LOOKUP_TIMEOUT_MS") {
            self.directory.lookup_timeout_ms =
                parse_u64("HUDDLE_DIRECTORY_LOOKUP_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = read_env("HUDDLE_DIRECTORY_RETRY_ATTEMPTS") {
            self.directory.retry_attempts = parse_u32("HUDDLE_DIRECTORY_RETRY_ATTEMPTS", &value)?;
        }
        if let Some(value) = read_env("HUDDLE_DIRECTORY_RETRY_BASE_DELAY_MS") {
            self.directory.retry_base_delay_ms =
                parse_u64("HUDDLE_DIRECTORY_RETRY_BASE_DELAY_MS", &value)?;
        }

        if let Some(value) = read_env("HUDDLE_CLASSIFIER_ALWAYS_CLEAR_COMMANDS") {
            self.classifier.always_clear_commands = value
                .split(',')
                .map(str::trim)
                .filter(|command| !command.is_empty())
                .map(str::to_string)
                .collect();
        }

        if let Some(value) = read_env("HUDDLE_PHONE_DEFAULT_REGION") {
            self.phone.default_region = value;
        }

        if let Some(value) = read_env("HUDDLE_EXECUTOR_BASE_URL") {
            self.executor.base_url = Some(value);
        }
        if let Some(value) = read_env("HUDDLE_EXECUTOR_TIMEOUT_SECS") {
            self.executor.timeout_secs = parse_u64("HUDDLE_EXECUTOR_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("HUDDLE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("HUDDLE_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port = parse_u16("HUDDLE_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("HUDDLE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("HUDDLE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("HUDDLE_LOGGING_LEVEL").or_else(|| read_env("HUDDLE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("HUDDLE_LOGGING_FORMAT").or_else(|| read_env("HUDDLE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(bot_token) = overrides.bot_token {
            self.chat.bot_token = secret_value(bot_token);
        }
        if let Some(team_id) = overrides.team_id {
            self.chat.team_id = team_id;
        }
        if let Some(leadership_chat_id) = overrides.leadership_chat_id {
            self.chat.leadership_chat_id = Some(leadership_chat_id);
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(base_url) = overrides.executor_base_url {
            self.executor.base_url = Some(base_url);
        }
        if let Some(max_concurrent_requests) = overrides.max_concurrent_requests {
            self.admission.max_concurrent_requests = max_concurrent_requests;
        }
        if let Some(max_requests_per_minute) = overrides.max_requests_per_minute {
            self.admission.max_requests_per_minute = max_requests_per_minute;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_chat(&self.chat)?;
        validate_admission(&self.admission)?;
        validate_directory(&self.directory)?;
        validate_phone(&self.phone)?;
        validate_executor(&self.executor)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("huddle.toml"), PathBuf::from("config/huddle.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_chat(chat: &ChatConfig) -> Result<(), ConfigError> {
    let bot_token = chat.bot_token.expose_secret();
    if bot_token.trim().is_empty() {
        return Err(ConfigError::Validation(
            "chat.bot_token is required. Create a bot with @BotFather and copy the token it issues"
                .to_string(),
        ));
    }
    let well_formed = bot_token
        .split_once(':')
        .is_some_and(|(id, secret)| !id.is_empty() && id.chars().all(|ch| ch.is_ascii_digit()) && !secret.is_empty());
    if !well_formed {
        return Err(ConfigError::Validation(
            "chat.bot_token must look like `<bot id>:<secret>`".to_string(),
        ));
    }

    if chat.team_id.trim().is_empty() {
        return Err(ConfigError::Validation("chat.team_id is required".to_string()));
    }

    let prefix = chat.command_prefix.trim();
    if prefix.chars().count() != 1 || prefix.chars().any(|ch| ch.is_alphanumeric()) {
        return Err(ConfigError::Validation(
            "chat.command_prefix must be a single non-alphanumeric character".to_string(),
        ));
    }

    if let (Some(main), Some(leadership)) = (&chat.main_chat_id, &chat.leadership_chat_id) {
        if main.trim() == leadership.trim() {
            return Err(ConfigError::Validation(
                "chat.main_chat_id and chat.leadership_chat_id must differ".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_admission(admission: &AdmissionConfig) -> Result<(), ConfigError> {
    if admission.max_concurrent_requests == 0 {
        return Err(ConfigError::Validation(
            "admission.max_concurrent_requests must be greater than zero".to_string(),
        ));
    }
    if admission.max_requests_per_minute == 0 {
        return Err(ConfigError::Validation(
            "admission.max_requests_per_minute must be greater than zero".to_string(),
        ));
    }
    if admission.cleanup_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "admission.cleanup_interval_secs must be greater than zero".to_string(),
        ));
    }
    if admission.slot_timeout_ms == 0 || admission.slot_timeout_ms > 60_000 {
        return Err(ConfigError::Validation(
            "admission.slot_timeout_ms must be in range 1..=60000".to_string(),
        ));
    }
    Ok(())
}

fn validate_directory(directory: &DirectoryConfig) -> Result<(), ConfigError> {
    if directory.lookup_timeout_ms == 0 || directory.lookup_timeout_ms > 300_000 {
        return Err(ConfigError::Validation(
            "directory.lookup_timeout_ms must be in range 1..=300000".to_string(),
        ));
    }
    if directory.retry_attempts == 0 {
        return Err(ConfigError::Validation(
            "directory.retry_attempts must be greater than zero".to_string(),
        ));
    }
    if directory.retry_backoff_factor == 0 {
        return Err(ConfigError::Validation(
            "directory.retry_backoff_factor must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_phone(phone_config: &PhoneConfig) -> Result<(), ConfigError> {
    if !phone::is_supported_region(&phone_config.default_region) {
        return Err(ConfigError::Validation(format!(
            "phone.default_region `{}` is not a supported region code",
            phone_config.default_region
        )));
    }
    Ok(())
}

fn validate_executor(executor: &ExecutorConfig) -> Result<(), ConfigError> {
    if executor.timeout_secs == 0 || executor.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "executor.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if let Some(base_url) = &executor.base_url {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "executor.base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    chat: Option<ChatPatch>,
    admission: Option<AdmissionPatch>,
    directory: Option<DirectoryPatch>,
    classifier: Option<ClassifierPatch>,
    phone: Option<PhonePatch>,
    executor: Option<ExecutorPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatPatch {
    bot_token: Option<String>,
    team_id: Option<String>,
    main_chat_id: Option<String>,
    leadership_chat_id: Option<String>,
    command_prefix: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AdmissionPatch {
    max_concurrent_requests: Option<usize>,
    max_requests_per_minute: Option<usize>,
    cleanup_interval_secs: Option<u64>,
    slot_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct DirectoryPatch {
    lookup_timeout_ms: Option<u64>,
    retry_attempts: Option<u32>,
    retry_base_delay_ms: Option<u64>,
    retry_backoff_factor: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ClassifierPatch {
    always_clear_commands: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct PhonePatch {
    default_region: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ExecutorPatch {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const TOKEN_VARS: [&str; 2] = ["HUDDLE_CHAT_BOT_TOKEN", "HUDDLE_CHAT_TEAM_ID"];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn set_required_vars() {
        env::set_var("HUDDLE_CHAT_BOT_TOKEN", "123456:test-secret");
        env::set_var("HUDDLE_CHAT_TEAM_ID", "team-env");
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_match_documented_limits() {
        let config = AppConfig::default();
        assert_eq!(config.admission.max_concurrent_requests, 10);
        assert_eq!(config.admission.max_requests_per_minute, 60);
        assert_eq!(config.admission.cleanup_interval_secs, 300);
        assert_eq!(config.admission.slot_timeout_ms, 1_000);
        assert_eq!(config.directory.lookup_timeout_ms, 10_000);
        assert_eq!(config.directory.retry_policy().attempts, 3);
        assert_eq!(config.executor.timeout_secs, 30);
        assert_eq!(config.phone.default_region, "US");
        assert_eq!(config.chat.command_prefix, "/");
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_HUDDLE_BOT_TOKEN", "987:from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("huddle.toml");
            fs::write(
                &path,
                r#"
[chat]
bot_token = "${TEST_HUDDLE_BOT_TOKEN}"
team_id = "falcons"
leadership_chat_id = "-100777"

[classifier]
always_clear_commands = ["/register"]
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.chat.bot_token.expose_secret() == "987:from-env",
                "bot token should be interpolated from environment",
            )?;
            ensure(config.chat.team_id == "falcons", "team id should come from file")?;
            ensure(
                config.classifier.always_clear_commands == vec!["/register".to_string()],
                "allow-list should come from file",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_HUDDLE_BOT_TOKEN"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("HUDDLE_LOG_LEVEL", "warn");
        env::set_var("HUDDLE_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Json),
                "json logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&TOKEN_VARS);
        clear_vars(&["HUDDLE_LOG_LEVEL", "HUDDLE_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("HUDDLE_ADMISSION_MAX_REQUESTS_PER_MINUTE", "30");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("huddle.toml");
            fs::write(
                &path,
                r#"
[chat]
bot_token = "111:from-file"
team_id = "team-file"

[admission]
max_requests_per_minute = 90
max_concurrent_requests = 4

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    team_id: Some("team-override".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.chat.team_id == "team-override", "override team id should win")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.chat.bot_token.expose_secret() == "123456:test-secret",
                "env bot token should win over file and defaults",
            )?;
            ensure(
                config.admission.max_requests_per_minute == 30,
                "env rate limit should win over file",
            )?;
            ensure(
                config.admission.max_concurrent_requests == 4,
                "file concurrency should win over defaults",
            )?;
            Ok(())
        })();

        clear_vars(&TOKEN_VARS);
        clear_vars(&["HUDDLE_ADMISSION_MAX_REQUESTS_PER_MINUTE"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("HUDDLE_CHAT_BOT_TOKEN", "not-a-token");
        env::set_var("HUDDLE_CHAT_TEAM_ID", "team");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };

            match error {
                ConfigError::Validation(message) => ensure(
                    message.contains("chat.bot_token"),
                    "validation message should mention chat.bot_token",
                ),
                other => Err(format!("unexpected error variant: {other}")),
            }
        })();

        clear_vars(&TOKEN_VARS);
        result
    }

    #[test]
    fn invalid_numeric_env_override_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("HUDDLE_ADMISSION_SLOT_TIMEOUT_MS", "soon");

        let result = match AppConfig::load(LoadOptions::default()) {
            Err(ConfigError::InvalidEnvOverride { key, .. }) => ensure(
                key == "HUDDLE_ADMISSION_SLOT_TIMEOUT_MS",
                "override error should name the variable",
            ),
            Ok(_) => Err("expected invalid override error".to_string()),
            Err(other) => Err(format!("unexpected error variant: {other}")),
        };

        clear_vars(&TOKEN_VARS);
        clear_vars(&["HUDDLE_ADMISSION_SLOT_TIMEOUT_MS"]);
        result
    }

    #[test]
    fn unsupported_phone_region_is_rejected() {
        let mut config = AppConfig::default();
        config.chat.bot_token = "1:abc".to_string().into();
        config.chat.team_id = "team".to_string();
        config.phone.default_region = "ZZ".to_string();

        let error = config.validate().expect_err("ZZ is not a known region");
        assert!(error.to_string().contains("phone.default_region"));
    }

    #[test]
    fn required_file_missing_is_reported() {
        let error = AppConfig::load(LoadOptions {
            config_path: Some("/definitely/missing/huddle.toml".into()),
            require_file: true,
            ..LoadOptions::default()
        })
        .expect_err("missing file");
        assert!(matches!(error, ConfigError::MissingConfigFile(_)));
    }
}
