use std::sync::Arc;

use huddle_agent::{
    catalog::CommandCatalog,
    classifier::CommandClassifier,
    executor::{EchoTaskExecutor, HttpTaskExecutor},
};
use huddle_chat::{
    admission::{AdmissionGovernor, AdmissionSettings},
    ingress::ChatRouting,
    registration::RegistrationResolver,
    router::{MessageRouter, RouterSettings},
    runner::{NoopUpdateTransport, UpdateRunner, UpdateTransport},
};
use huddle_core::{
    config::{AppConfig, ConfigError, LoadOptions},
    errors::ApplicationError,
    phone::PhoneNormalizer,
    retry::RetryPolicy,
    services::{
        DirectoryProvider, ExecutorError, InMemoryDirectory, StaticDirectoryProvider, TaskExecutor,
    },
};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub router: Arc<MessageRouter>,
    pub runner: UpdateRunner,
}

/// External collaborators the pipeline is wired to.
pub struct Collaborators {
    pub directory: Arc<dyn DirectoryProvider>,
    pub transport: Arc<dyn UpdateTransport>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            directory: Arc::new(StaticDirectoryProvider::new(Arc::new(InMemoryDirectory::new()))),
            transport: Arc::new(NoopUpdateTransport),
        }
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("player directory check failed: {0}")]
    Directory(#[source] ApplicationError),
    #[error("task executor setup failed: {0}")]
    Executor(#[source] ExecutorError),
    #[error("no phone metadata for region `{0}`")]
    PhoneRegion(String),
}

pub async fn bootstrap(
    options: LoadOptions,
    collaborators: Collaborators,
) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config, collaborators).await
}

pub async fn bootstrap_with_config(
    config: AppConfig,
    collaborators: Collaborators,
) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        team_id = %config.chat.team_id,
        "starting application bootstrap"
    );

    let resolver = RegistrationResolver::from_config(collaborators.directory, &config.directory);
    resolver.verify().await.map_err(BootstrapError::Directory)?;
    info!(
        event_name = "system.bootstrap.directory_verified",
        correlation_id = "bootstrap",
        "player directory reachable"
    );

    let executor = build_executor(&config)?;
    let phone = PhoneNormalizer::for_region(&config.phone.default_region)
        .ok_or_else(|| BootstrapError::PhoneRegion(config.phone.default_region.clone()))?;
    let classifier = CommandClassifier::new(Arc::new(CommandCatalog::with_defaults()))
        .with_prefix(config.chat.command_prefix.as_str())
        .with_always_clear(&config.classifier.always_clear_commands);
    let governor = AdmissionGovernor::new(AdmissionSettings::from(&config.admission));

    let router = Arc::new(
        MessageRouter::new(
            RouterSettings::from_config(&config),
            Arc::new(governor),
            Arc::new(resolver),
            Arc::new(classifier),
            executor,
        )
        .with_phone_normalizer(phone),
    );

    let runner = UpdateRunner::new(
        collaborators.transport,
        router.clone(),
        ChatRouting::from(&config.chat),
        RetryPolicy { attempts: 5, base_delay_ms: 500, backoff_factor: 2, max_delay_ms: 30_000 },
    );

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        max_concurrent_requests = config.admission.max_concurrent_requests,
        max_requests_per_minute = config.admission.max_requests_per_minute,
        "message pipeline assembled"
    );

    Ok(Application { config, router, runner })
}

fn build_executor(config: &AppConfig) -> Result<Arc<dyn TaskExecutor>, BootstrapError> {
    match config.executor.base_url.as_deref() {
        Some(base_url) => {
            let executor = HttpTaskExecutor::new(base_url, config.executor.timeout())
                .map_err(BootstrapError::Executor)?;
            info!(
                event_name = "system.bootstrap.executor",
                correlation_id = "bootstrap",
                executor = "http",
                tasks_url = %executor.tasks_url(),
                "remote task executor configured"
            );
            Ok(Arc::new(executor))
        }
        None => {
            info!(
                event_name = "system.bootstrap.executor",
                correlation_id = "bootstrap",
                executor = "echo",
                "no executor base_url configured; using local echo executor"
            );
            Ok(Arc::new(EchoTaskExecutor))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use huddle_core::{
        config::{ConfigOverrides, LoadOptions},
        domain::message::{ChatType, InboundMessage},
        services::{DirectoryError, DirectoryProvider, DirectoryService},
    };

    use super::{bootstrap, BootstrapError, Collaborators};

    struct DownDirectory;

    #[async_trait]
    impl DirectoryProvider for DownDirectory {
        async fn acquire(&self) -> Result<Arc<dyn DirectoryService>, DirectoryError> {
            Err(DirectoryError::Unavailable("connection refused".to_string()))
        }
    }

    fn valid_options() -> LoadOptions {
        LoadOptions {
            config_path: Some("/definitely/missing/huddle.toml".into()),
            require_file: false,
            overrides: ConfigOverrides {
                bot_token: Some("123456:bootstrap-secret".to_string()),
                team_id: Some("falcons".to_string()),
                ..ConfigOverrides::default()
            },
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_with_malformed_token() {
        let mut options = valid_options();
        options.overrides.bot_token = Some("not-a-token".to_string());

        let result = bootstrap(options, Collaborators::default()).await;

        let error = result.err().expect("bootstrap should fail");
        assert!(matches!(error, BootstrapError::Config(_)));
        assert!(error.to_string().contains("chat.bot_token"));
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_when_directory_is_unreachable() {
        let collaborators = Collaborators { directory: Arc::new(DownDirectory), ..Collaborators::default() };

        let result = bootstrap(valid_options(), collaborators).await;

        assert!(matches!(result.err(), Some(BootstrapError::Directory(_))));
    }

    #[tokio::test]
    async fn assembled_pipeline_routes_with_echo_executor() {
        let app = bootstrap(valid_options(), Collaborators::default())
            .await
            .expect("bootstrap should succeed with valid overrides");

        let result = app.router.route(InboundMessage::text("42", "-100200", ChatType::Main, "/help")).await;

        assert!(result.success, "{result:?}");
        assert_eq!(result.message, "received (command, unregistered): /help");
        assert_eq!(app.router.metrics().routed_total, 1);
        assert_eq!(app.router.metrics().admission.max_slots, 10);
    }
}
