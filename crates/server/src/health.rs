use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use huddle_chat::router::{MessageRouter, RouterMetrics};
use serde::Serialize;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    router: Arc<MessageRouter>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub admission: HealthCheck,
    pub metrics: RouterMetrics,
    pub checked_at: String,
}

pub fn router(message_router: Arc<MessageRouter>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { router: message_router })
}

pub async fn spawn(
    bind_address: &str,
    port: u16,
    message_router: Arc<MessageRouter>,
) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(message_router)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let metrics = state.router.metrics();
    let admission = admission_check(&metrics);
    let ready = admission.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "huddle-server message pipeline initialized".to_string(),
        },
        admission,
        metrics,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

// Saturated means every processing slot is taken right now.
fn admission_check(metrics: &RouterMetrics) -> HealthCheck {
    let admission = &metrics.admission;
    if admission.max_slots > 0 && admission.active_slots >= admission.max_slots {
        HealthCheck {
            status: "degraded",
            detail: format!("all {} processing slots in use", admission.max_slots),
        }
    } else {
        HealthCheck {
            status: "ready",
            detail: format!(
                "{} of {} processing slots in use",
                admission.active_slots, admission.max_slots
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use axum::{
        body::Body,
        extract::State,
        http::{Request, StatusCode},
        Json,
    };
    use huddle_agent::{catalog::CommandCatalog, classifier::CommandClassifier, executor::EchoTaskExecutor};
    use huddle_chat::{
        admission::{AdmissionGovernor, AdmissionSettings},
        registration::RegistrationResolver,
        router::{MessageRouter, RouterSettings},
    };
    use huddle_core::services::{InMemoryDirectory, StaticDirectoryProvider};
    use tower::ServiceExt;

    use crate::health::{health, router, HealthState};

    fn message_router(max_concurrent_requests: usize) -> Arc<MessageRouter> {
        let settings = AdmissionSettings { max_concurrent_requests, ..AdmissionSettings::default() };
        let resolver = RegistrationResolver::new(Arc::new(StaticDirectoryProvider::new(Arc::new(
            InMemoryDirectory::new(),
        ))));
        Arc::new(MessageRouter::new(
            RouterSettings::new("falcons"),
            Arc::new(AdmissionGovernor::new(settings)),
            Arc::new(resolver),
            Arc::new(CommandClassifier::new(Arc::new(CommandCatalog::with_defaults()))),
            Arc::new(EchoTaskExecutor),
        ))
    }

    #[tokio::test]
    async fn health_returns_ready_with_free_slots() {
        let (status, Json(payload)) =
            health(State(HealthState { router: message_router(10) })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.service.status, "ready");
        assert_eq!(payload.metrics.admission.max_slots, 10);
        assert_eq!(payload.metrics.routed_total, 0);
    }

    #[tokio::test]
    async fn health_is_degraded_while_every_slot_is_held() {
        let message_router = message_router(1);
        let permit = message_router
            .governor()
            .acquire_slot(Duration::from_millis(10))
            .await
            .expect("one slot should be free");

        let (status, Json(payload)) =
            health(State(HealthState { router: message_router.clone() })).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.admission.status, "degraded");

        drop(permit);
        let (status, _) = health(State(HealthState { router: message_router })).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn health_route_serves_json() {
        let response = router(message_router(10))
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(content_type.starts_with("application/json"));

        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024).await.expect("body");
        let payload: serde_json::Value = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(payload["status"], "ready");
        assert_eq!(payload["metrics"]["admission"]["max_slots"], 10);
        assert!(payload["checked_at"].as_str().is_some());
    }
}
