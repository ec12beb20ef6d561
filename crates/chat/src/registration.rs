use std::{sync::Arc, time::Duration};

use huddle_core::{
    config::DirectoryConfig,
    domain::{
        member::{RegistrationStatus, UserFlowType},
        message::parse_sender_id,
    },
    errors::{ApplicationError, RoutingError},
    retry::RetryPolicy,
    services::{DirectoryError, DirectoryProvider, DirectoryService},
};
use tracing::{debug, warn};

/// Resolves whether a sender is a known player or team member.
///
/// Per-message failures degrade to [`RegistrationStatus::UNREGISTERED`]; only
/// [`RegistrationResolver::verify`] reports a missing directory.
pub struct RegistrationResolver {
    provider: Arc<dyn DirectoryProvider>,
    retry: RetryPolicy,
    lookup_timeout: Duration,
}

impl RegistrationResolver {
    pub fn new(provider: Arc<dyn DirectoryProvider>) -> Self {
        Self { provider, retry: RetryPolicy::default(), lookup_timeout: Duration::from_secs(10) }
    }

    pub fn from_config(provider: Arc<dyn DirectoryProvider>, config: &DirectoryConfig) -> Self {
        Self { provider, retry: config.retry_policy(), lookup_timeout: config.lookup_timeout() }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_lookup_timeout(mut self, lookup_timeout: Duration) -> Self {
        self.lookup_timeout = lookup_timeout;
        self
    }

    /// Startup check that the directory can be reached at all.
    pub async fn verify(&self) -> Result<(), ApplicationError> {
        match tokio::time::timeout(self.lookup_timeout, self.acquire()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(error)) => {
                Err(ApplicationError::ServiceUnavailable(format!("player directory: {error}")))
            }
            Err(_elapsed) => Err(ApplicationError::ServiceUnavailable(format!(
                "player directory: no handle within {}ms",
                self.lookup_timeout.as_millis()
            ))),
        }
    }

    pub async fn resolve(&self, sender_id: &str, team_id: &str) -> UserFlowType {
        self.resolve_detailed(sender_id, team_id).await.flow_type()
    }

    pub async fn resolve_detailed(&self, sender_id: &str, team_id: &str) -> RegistrationStatus {
        match self.lookup(sender_id, team_id).await {
            Ok(status) => {
                debug!(
                    event_name = "registration.resolved",
                    sender_id,
                    team_id,
                    is_player = status.is_player,
                    is_team_member = status.is_team_member,
                    flow_type = status.flow_type().as_str(),
                    "registration status resolved"
                );
                status
            }
            Err(error) => {
                warn!(
                    event_name = "registration.degraded",
                    sender_id,
                    team_id,
                    error_class = error.error_class(),
                    error = %error,
                    "registration lookup failed; treating sender as unregistered"
                );
                RegistrationStatus::UNREGISTERED
            }
        }
    }

    async fn lookup(&self, sender_id: &str, team_id: &str) -> Result<RegistrationStatus, RoutingError> {
        let sender = parse_sender_id(sender_id).ok_or_else(|| {
            RoutingError::InvalidInput(format!("sender id `{sender_id}` is not a positive integer"))
        })?;

        // One deadline covers handle acquisition, its retries and both lookups.
        tokio::time::timeout(self.lookup_timeout, self.query(sender, team_id))
            .await
            .map_err(|_| RoutingError::LookupTimeout {
                timeout_ms: self.lookup_timeout.as_millis() as u64,
            })?
    }

    async fn query(&self, sender: i64, team_id: &str) -> Result<RegistrationStatus, RoutingError> {
        let directory = self
            .acquire()
            .await
            .map_err(|error| RoutingError::LookupFailure(error.to_string()))?;

        let (player, member) = tokio::join!(
            directory.get_player_by_sender_id(sender, team_id),
            directory.get_team_member_by_sender_id(sender, team_id),
        );

        let is_player = found("player", sender, player);
        let is_team_member = found("team_member", sender, member);
        Ok(RegistrationStatus::new(is_player, is_team_member))
    }

    async fn acquire(&self) -> Result<Arc<dyn DirectoryService>, DirectoryError> {
        self.retry.run("directory.acquire", |_| self.provider.acquire()).await
    }
}

// A failing lookup on its own counts as "not found".
fn found<T>(lookup: &'static str, sender: i64, result: Result<Option<T>, DirectoryError>) -> bool {
    match result {
        Ok(record) => record.is_some(),
        Err(error) => {
            warn!(
                event_name = "registration.lookup_failed",
                lookup,
                sender_id = sender,
                error = %error,
                "directory lookup failed; counting as not found"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicU32, Ordering},
            Arc,
        },
        time::Duration,
    };

    use async_trait::async_trait;
    use huddle_core::{
        domain::member::{Player, TeamMember, UserFlowType},
        errors::ApplicationError,
        retry::RetryPolicy,
        services::{
            DirectoryError, DirectoryProvider, DirectoryService, InMemoryDirectory,
            StaticDirectoryProvider,
        },
    };

    use super::RegistrationResolver;

    fn player(sender_id: i64) -> Player {
        Player {
            player_id: format!("p-{sender_id}"),
            sender_id,
            team_id: "falcons".to_string(),
            name: "Alex Reed".to_string(),
            phone_number: Some("+447700900123".to_string()),
        }
    }

    fn member(sender_id: i64) -> TeamMember {
        TeamMember {
            member_id: format!("m-{sender_id}"),
            sender_id,
            team_id: "falcons".to_string(),
            name: "Coach Kim".to_string(),
            role: "coach".to_string(),
        }
    }

    fn resolver_for(directory: InMemoryDirectory) -> RegistrationResolver {
        RegistrationResolver::new(Arc::new(StaticDirectoryProvider::new(Arc::new(directory))))
    }

    enum Behaviour {
        Fail,
        Hang,
        PlayerFailsMemberFound,
    }

    struct ScriptedDirectory {
        behaviour: Behaviour,
    }

    #[async_trait]
    impl DirectoryService for ScriptedDirectory {
        async fn get_player_by_sender_id(
            &self,
            _sender_id: i64,
            _team_id: &str,
        ) -> Result<Option<Player>, DirectoryError> {
            match self.behaviour {
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(3_600)).await;
                    Ok(None)
                }
                Behaviour::Fail | Behaviour::PlayerFailsMemberFound => {
                    Err(DirectoryError::Query("players table locked".to_string()))
                }
            }
        }

        async fn get_team_member_by_sender_id(
            &self,
            sender_id: i64,
            _team_id: &str,
        ) -> Result<Option<TeamMember>, DirectoryError> {
            match self.behaviour {
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(3_600)).await;
                    Ok(None)
                }
                Behaviour::Fail => Err(DirectoryError::Query("members table locked".to_string())),
                Behaviour::PlayerFailsMemberFound => Ok(Some(member(sender_id))),
            }
        }
    }

    fn scripted(behaviour: Behaviour) -> RegistrationResolver {
        let directory: Arc<dyn DirectoryService> = Arc::new(ScriptedDirectory { behaviour });
        RegistrationResolver::new(Arc::new(StaticDirectoryProvider::new(directory)))
    }

    struct FlakyProvider {
        failures_before_success: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl DirectoryProvider for FlakyProvider {
        async fn acquire(&self) -> Result<Arc<dyn DirectoryService>, DirectoryError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                Err(DirectoryError::Unavailable("pool warming up".to_string()))
            } else {
                Ok(Arc::new(InMemoryDirectory::new().with_player(player(42))))
            }
        }
    }

    #[tokio::test]
    async fn player_or_member_is_registered() {
        let resolver = resolver_for(
            InMemoryDirectory::new().with_player(player(42)).with_team_member(member(7)),
        );

        assert_eq!(resolver.resolve("42", "falcons").await, UserFlowType::Registered);
        assert_eq!(resolver.resolve("7", "falcons").await, UserFlowType::Registered);
        assert_eq!(resolver.resolve("99", "falcons").await, UserFlowType::Unregistered);

        let detailed = resolver.resolve_detailed("42", "falcons").await;
        assert!(detailed.is_player);
        assert!(!detailed.is_team_member);
    }

    #[tokio::test]
    async fn invalid_sender_id_is_unregistered() {
        let resolver = resolver_for(InMemoryDirectory::new().with_player(player(42)));
        for sender in ["", "abc", "-42", "0", "42.5"] {
            assert_eq!(resolver.resolve(sender, "falcons").await, UserFlowType::Unregistered);
        }
    }

    #[tokio::test]
    async fn both_lookups_failing_resolves_unregistered() {
        let status = scripted(Behaviour::Fail).resolve_detailed("42", "falcons").await;
        assert!(!status.is_registered());
    }

    #[tokio::test]
    async fn one_failing_lookup_does_not_hide_the_other() {
        let status =
            scripted(Behaviour::PlayerFailsMemberFound).resolve_detailed("42", "falcons").await;
        assert!(!status.is_player);
        assert!(status.is_team_member);
        assert_eq!(status.flow_type(), UserFlowType::Registered);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_lookups_resolve_within_timeout() {
        let resolver = scripted(Behaviour::Hang).with_lookup_timeout(Duration::from_secs(10));
        let started = tokio::time::Instant::now();

        let flow = resolver.resolve("42", "falcons").await;

        assert_eq!(flow, UserFlowType::Unregistered);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(10));
        assert!(elapsed < Duration::from_millis(10_050));
    }

    struct HangingProvider;

    #[async_trait]
    impl DirectoryProvider for HangingProvider {
        async fn acquire(&self) -> Result<Arc<dyn DirectoryService>, DirectoryError> {
            tokio::time::sleep(Duration::from_secs(3_600)).await;
            Ok(Arc::new(InMemoryDirectory::new().with_player(player(42))))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_handle_acquisition_is_bounded_by_lookup_timeout() {
        let resolver = RegistrationResolver::new(Arc::new(HangingProvider))
            .with_lookup_timeout(Duration::from_secs(10));
        let started = tokio::time::Instant::now();

        let flow = resolver.resolve("42", "falcons").await;

        assert_eq!(flow, UserFlowType::Unregistered);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(10));
        assert!(elapsed <= Duration::from_secs(11), "resolve took {elapsed:?}");

        let error = resolver.verify().await.expect_err("no handle within the deadline");
        assert!(matches!(error, ApplicationError::ServiceUnavailable(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn provider_acquisition_is_retried_with_backoff() {
        let provider =
            Arc::new(FlakyProvider { failures_before_success: 2, calls: AtomicU32::new(0) });
        let resolver = RegistrationResolver::new(provider.clone()).with_retry(RetryPolicy::new(3, 100, 2));

        assert_eq!(resolver.resolve("42", "falcons").await, UserFlowType::Registered);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn verify_reports_missing_directory() {
        let provider =
            Arc::new(FlakyProvider { failures_before_success: u32::MAX, calls: AtomicU32::new(0) });
        let resolver = RegistrationResolver::new(provider.clone());

        let error = resolver.verify().await.expect_err("directory is down");
        assert!(matches!(error, ApplicationError::ServiceUnavailable(_)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);

        // Per-message resolution still degrades instead of failing.
        assert_eq!(resolver.resolve("42", "falcons").await, UserFlowType::Unregistered);
    }
}
