//! HTTP server assembly using Axum.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use careloop_channels::{CalendarClient, Mailer, WhatsAppGateway};
use careloop_core::TemplateRegistry;
use careloop_scheduler::SchedulerEngine;
use careloop_store::PatientStore;

/// Shared state for the gateway: every collaborator client, constructed
/// once at startup and injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: PatientStore,
    pub whatsapp: Arc<WhatsAppGateway>,
    pub templates: Arc<TemplateRegistry>,
    pub scheduler: Arc<Mutex<SchedulerEngine>>,
    pub mailer: Arc<Mailer>,
    pub calendar: Arc<CalendarClient>,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health_check", get(super::routes::health_check))
        .route("/api/fetch_all_records", get(super::routes::fetch_all_records))
        .route(
            "/api/fetch_patient_details",
            get(super::routes::fetch_patient_details),
        )
        .route(
            "/api/send_plan_via_whatsapp",
            post(super::routes::send_plan_via_whatsapp),
        )
        .route(
            "/api/send_patient_summary",
            post(super::routes::send_patient_summary),
        )
        .route(
            "/api/send_summary_template",
            post(super::routes::send_summary_template),
        )
        .route("/api/schedule_meeting", post(super::routes::schedule_meeting))
        .route("/api/test_email", get(super::routes::test_email))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the process exits.
pub async fn start(host: &str, port: u16, state: AppState) -> anyhow::Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Gateway listening on http://{addr}");
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use careloop_core::AppConfig;
    use tower::ServiceExt;

    async fn test_state() -> AppState {
        let config = AppConfig::from_lookup(|_| None);
        AppState {
            store: PatientStore::new(&config.store).await.unwrap(),
            whatsapp: Arc::new(WhatsAppGateway::new(config.messaging.clone())),
            templates: Arc::new(TemplateRegistry::new()),
            scheduler: Arc::new(Mutex::new(SchedulerEngine::new())),
            mailer: Arc::new(Mailer::new(config.mail.clone())),
            calendar: Arc::new(CalendarClient::new(config.calendar.clone())),
        }
    }

    #[tokio::test]
    async fn test_health_check_route() {
        let app = build_router(test_state().await);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/health_check")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_params_rejected() {
        let app = build_router(test_state().await);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/send_plan_via_whatsapp")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
