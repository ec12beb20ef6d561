//! The message router: admission, context building, registration, classification
//! and delegation for every inbound message.
//!
//! Each [`InboundMessage`] yields exactly one [`RoutingResult`]. The request token
//! and processing slot are RAII guards, so both are released on every return path,
//! including early errors.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use huddle_agent::classifier::CommandClassifier;
use huddle_core::{
    config::AppConfig,
    domain::{
        member::{RegistrationStatus, UserFlowType},
        message::{InboundMessage, MessageKind},
        routing::{ExecutionContext, RoutingResult},
    },
    errors::RoutingError,
    invite::{self, InviteContext},
    phone::PhoneNormalizer,
    services::TaskExecutor,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    admission::{AdmissionGovernor, AdmissionMetrics},
    registration::RegistrationResolver,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouterSettings {
    pub team_id: String,
    pub slot_timeout: Duration,
    pub executor_timeout: Duration,
}

impl RouterSettings {
    pub fn new(team_id: impl Into<String>) -> Self {
        Self {
            team_id: team_id.into(),
            slot_timeout: Duration::from_secs(1),
            executor_timeout: Duration::from_secs(30),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            team_id: config.chat.team_id.clone(),
            slot_timeout: config.admission.slot_timeout(),
            executor_timeout: config.executor.timeout(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterMetrics {
    pub active_requests: usize,
    pub routed_total: u64,
    pub succeeded_total: u64,
    pub failed_total: u64,
    pub admission: AdmissionMetrics,
}

#[derive(Debug, Default)]
struct RouterCounters {
    routed: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

/// A routing failure and the flow type, when it was already known.
struct Failure {
    error: RoutingError,
    flow_type: Option<UserFlowType>,
}

impl From<RoutingError> for Failure {
    fn from(error: RoutingError) -> Self {
        Self { error, flow_type: None }
    }
}

/// What the executor is asked to do, derived from the message payload.
struct PreparedTask {
    task: String,
    phone_number: Option<String>,
    invite: Option<InviteContext>,
}

pub struct MessageRouter {
    settings: RouterSettings,
    governor: Arc<AdmissionGovernor>,
    resolver: Arc<RegistrationResolver>,
    classifier: Arc<CommandClassifier>,
    executor: Arc<dyn TaskExecutor>,
    phone: PhoneNormalizer,
    counters: RouterCounters,
}

impl MessageRouter {
    pub fn new(
        settings: RouterSettings,
        governor: Arc<AdmissionGovernor>,
        resolver: Arc<RegistrationResolver>,
        classifier: Arc<CommandClassifier>,
        executor: Arc<dyn TaskExecutor>,
    ) -> Self {
        Self {
            settings,
            governor,
            resolver,
            classifier,
            executor,
            phone: PhoneNormalizer::default(),
            counters: RouterCounters::default(),
        }
    }

    pub fn with_phone_normalizer(mut self, phone: PhoneNormalizer) -> Self {
        self.phone = phone;
        self
    }

    pub fn governor(&self) -> &Arc<AdmissionGovernor> {
        &self.governor
    }

    /// Dispatches on the message payload.
    pub async fn route(&self, message: InboundMessage) -> RoutingResult {
        match message.kind() {
            MessageKind::ContactShare => self.route_contact_share(&message).await,
            MessageKind::MembersJoined => self.route_member_join(&message).await,
            MessageKind::Text => self.route_text(&message).await,
        }
    }

    pub async fn route_text(&self, message: &InboundMessage) -> RoutingResult {
        self.process(message, MessageKind::Text).await
    }

    pub async fn route_contact_share(&self, message: &InboundMessage) -> RoutingResult {
        self.process(message, MessageKind::ContactShare).await
    }

    pub async fn route_member_join(&self, message: &InboundMessage) -> RoutingResult {
        self.process(message, MessageKind::MembersJoined).await
    }

    pub fn metrics(&self) -> RouterMetrics {
        let admission = self.governor.metrics();
        RouterMetrics {
            active_requests: admission.active_requests,
            routed_total: self.counters.routed.load(Ordering::Relaxed),
            succeeded_total: self.counters.succeeded.load(Ordering::Relaxed),
            failed_total: self.counters.failed.load(Ordering::Relaxed),
            admission,
        }
    }

    async fn process(&self, message: &InboundMessage, kind: MessageKind) -> RoutingResult {
        self.counters.routed.fetch_add(1, Ordering::Relaxed);
        debug!(
            event_name = "router.message.received",
            sender_id = %message.sender_id,
            chat_id = %message.chat_id,
            chat_type = message.chat_type.as_str(),
            kind = ?kind,
            "routing inbound message"
        );

        let result = match self.admit_and_run(message, kind).await {
            Ok(result) => result,
            Err(Failure { error, flow_type }) => {
                warn!(
                    event_name = "router.message.failed",
                    sender_id = %message.sender_id,
                    chat_id = %message.chat_id,
                    error_class = error.error_class(),
                    error = %error,
                    "message routing failed"
                );
                match flow_type {
                    Some(flow_type) => RoutingResult::failure_for(&error, flow_type),
                    None => RoutingResult::failure(&error),
                }
            }
        };

        let counter =
            if result.success { &self.counters.succeeded } else { &self.counters.failed };
        counter.fetch_add(1, Ordering::Relaxed);
        result
    }

    async fn admit_and_run(
        &self,
        message: &InboundMessage,
        kind: MessageKind,
    ) -> Result<RoutingResult, Failure> {
        let sender_id = validate_shape(message, kind)?;
        // Canonical form, so " 42" and "042" share the window of "42".
        let sender_key = sender_id.to_string();

        if self.governor.check_rate_limit(&sender_key) {
            info!(
                event_name = "router.admission.denied",
                reason = "rate_limited",
                sender_id = %sender_key,
                "request rejected by rate limit"
            );
            return Err(RoutingError::RateLimited {
                sender_id: sender_key,
                limit: self.governor.settings().max_requests_per_minute,
            }
            .into());
        }

        let token = self.governor.add_request(&sender_key);
        let correlation_id = token.id().to_string();

        let Some(slot) = self.governor.acquire_slot(self.settings.slot_timeout).await else {
            info!(
                event_name = "router.admission.denied",
                reason = "system_busy",
                sender_id = %message.sender_id,
                correlation_id = %correlation_id,
                "no processing slot available"
            );
            return Err(RoutingError::SystemBusy {
                timeout_ms: self.settings.slot_timeout.as_millis() as u64,
            }
            .into());
        };
        debug!(
            event_name = "router.admission.granted",
            sender_id = %message.sender_id,
            correlation_id = %correlation_id,
            "request admitted"
        );

        let prepared = self.prepare(message, kind)?;
        let mut context = ExecutionContext {
            sender_id,
            team_id: self.settings.team_id.clone(),
            chat_id: message.chat_id.clone(),
            chat_type: message.chat_type,
            text: message.text.clone(),
            username: message.username.clone(),
            is_player: false,
            is_team_member: false,
            is_registered: false,
            flow_type: UserFlowType::Unregistered,
            requires_enhancement: false,
            phone_number: prepared.phone_number,
            invite: prepared.invite,
        };

        let status: RegistrationStatus =
            self.resolver.resolve_detailed(&sender_key, &self.settings.team_id).await;
        context.apply_registration(status);
        info!(
            event_name = "router.registration.resolved",
            sender_id = %message.sender_id,
            correlation_id = %correlation_id,
            flow_type = context.flow_type.as_str(),
            is_player = context.is_player,
            is_team_member = context.is_team_member,
            "registration status resolved"
        );

        if kind == MessageKind::Text {
            let classification = self.classifier.classify(&message.text, message.chat_type).await;
            context.requires_enhancement = classification.requires_enhancement;
            debug!(
                event_name = "router.classification",
                correlation_id = %correlation_id,
                requires_enhancement = classification.requires_enhancement,
                reason = classification.reason.as_str(),
                "message classified"
            );
        }

        let flow_type = context.flow_type;
        let executor = self.executor.clone();
        let team_id = self.settings.team_id.clone();
        let task = prepared.task;
        // Own task: a panicking executor becomes an internal failure here.
        let mut execution =
            tokio::spawn(async move { executor.execute(&team_id, &task, &context).await });
        let outcome = tokio::time::timeout(self.settings.executor_timeout, &mut execution).await;

        let outcome = match outcome {
            Ok(Ok(Ok(outcome))) => outcome,
            Ok(Ok(Err(error))) => {
                return Err(Failure {
                    error: RoutingError::Execution(error.to_string()),
                    flow_type: Some(flow_type),
                })
            }
            Ok(Err(join_error)) => {
                warn!(
                    event_name = "router.executor.panicked",
                    correlation_id = %correlation_id,
                    error = %join_error,
                    "task executor aborted"
                );
                return Err(Failure {
                    error: RoutingError::Internal(join_error.to_string()),
                    flow_type: Some(flow_type),
                });
            }
            Err(_elapsed) => {
                execution.abort();
                return Err(Failure {
                    error: RoutingError::Execution(format!(
                        "executor did not respond within {}s",
                        self.settings.executor_timeout.as_secs()
                    )),
                    flow_type: Some(flow_type),
                })
            }
        };

        info!(
            event_name = "router.delegation.completed",
            correlation_id = %correlation_id,
            flow_type = flow_type.as_str(),
            executor_success = outcome.success,
            "task executor finished"
        );

        drop(slot);
        self.governor.remove_request(token);

        if outcome.success {
            Ok(RoutingResult::success(outcome.reply, flow_type))
        } else {
            Ok(RoutingResult {
                success: false,
                message: outcome.reply,
                error: Some("executor declined the task".to_string()),
                error_class: Some("execution_declined".to_string()),
                flow_type: Some(flow_type),
            })
        }
    }

    fn prepare(&self, message: &InboundMessage, kind: MessageKind) -> Result<PreparedTask, Failure> {
        match kind {
            MessageKind::Text => Ok(PreparedTask {
                task: message.text.trim().to_string(),
                phone_number: None,
                invite: None,
            }),
            MessageKind::ContactShare => {
                let raw = message
                    .contact
                    .as_ref()
                    .map(|contact| contact.phone_number.as_str())
                    .unwrap_or_default();
                let phone_number =
                    self.phone.validate_for_linking(raw).map_err(RoutingError::InvalidContact)?;
                debug!(
                    event_name = "router.contact.validated",
                    sender_id = %message.sender_id,
                    "shared contact normalized"
                );
                Ok(PreparedTask {
                    task: format!("link contact {phone_number}"),
                    phone_number: Some(phone_number),
                    invite: None,
                })
            }
            MessageKind::MembersJoined => {
                let invite = self.invite_context(message);
                let names = invite
                    .new_members
                    .iter()
                    .map(|member| member.display_name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                Ok(PreparedTask {
                    task: format!("welcome new members: {names}"),
                    phone_number: None,
                    invite: Some(invite),
                })
            }
        }
    }

    fn invite_context(&self, message: &InboundMessage) -> InviteContext {
        let processed =
            message.raw_event.as_deref().and_then(invite::process_invite_event);

        let Some(processed) = processed else {
            return InviteContext {
                chat_id: message.chat_id.clone(),
                chat_type: None,
                chat_title: None,
                inviter_id: message.numeric_sender_id(),
                inviter_username: message.username.clone(),
                invite_link: None,
                new_members: message.new_members.clone().unwrap_or_default(),
            };
        };

        let mut context = processed.context;
        if let Some(rejection) = processed.link_rejection {
            warn!(
                event_name = "router.invite.link_rejected",
                chat_id = %context.chat_id,
                reason = %rejection,
                "ignoring invite link that failed validation"
            );
            context.invite_link = None;
        }
        if context.new_members.is_empty() {
            context.new_members = message.new_members.clone().unwrap_or_default();
        }
        context
    }
}

fn validate_shape(message: &InboundMessage, kind: MessageKind) -> Result<i64, Failure> {
    let sender_id = message.numeric_sender_id().ok_or_else(|| {
        RoutingError::InvalidInput(format!("sender id `{}` is not a positive integer", message.sender_id))
    })?;

    if message.chat_id.trim().is_empty() {
        return Err(RoutingError::InvalidInput("chat id is empty".to_string()).into());
    }

    match kind {
        MessageKind::Text if message.text.trim().is_empty() => {
            Err(RoutingError::InvalidInput("message text is empty".to_string()).into())
        }
        MessageKind::ContactShare if message.contact.is_none() => {
            Err(RoutingError::InvalidInput("contact payload is missing".to_string()).into())
        }
        MessageKind::MembersJoined
            if message.new_members.as_ref().map_or(true, |members| members.is_empty()) =>
        {
            Err(RoutingError::InvalidInput("no joined members in payload".to_string()).into())
        }
        _ => Ok(sender_id),
    }
}
