//! Route table and middleware stack

use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn,
    routing::{get, post, put},
    Extension, Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::database::entity::ENTITIES;
use crate::handlers::{elevated, protected, public, Integrations};
use crate::middleware::{audit_middleware, jwt_auth_middleware, practice_scope_middleware, PRACTICE_HEADER};

pub fn app(config: &AppConfig, integrations: Integrations) -> Router {
    Router::new()
        .merge(public_routes())
        .merge(protected_routes())
        .layer(RequestBodyLimitLayer::new(config.api.max_request_size_bytes))
        .layer(cors_layer(config))
        .layer(TraceLayer::new_for_http())
        .with_state(integrations)
}

fn public_routes() -> Router<Integrations> {
    Router::new()
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .route("/auth/login", post(public::login))
        .route("/auth/logout", post(public::logout))
        .route("/auth/register", post(public::register))
        .route("/functions/scheduled-reminders", post(public::scheduled_reminders))
        .route("/functions/dispatch-emails", post(public::dispatch_emails))
}

/// Everything under `/api`. Layers run outermost first:
/// session, then practice scope, then audit.
fn protected_routes() -> Router<Integrations> {
    Router::new()
        .merge(entity_routes())
        .merge(feature_routes())
        .merge(elevated_routes())
        .layer(from_fn(audit_middleware))
        .layer(from_fn(practice_scope_middleware))
        .layer(from_fn(jwt_auth_middleware))
}

/// Generic CRUD for each registered entity
fn entity_routes() -> Router<Integrations> {
    use protected::entity;

    ENTITIES.iter().fold(Router::new(), |router, &def| {
        let base = format!("/api/{}", def.path);
        router.merge(
            Router::new()
                .route(&base, get(entity::list).post(entity::create))
                .route(&format!("{}/find", base), post(entity::find))
                .route(
                    &format!("{}/:id", base),
                    get(entity::get).put(entity::update).patch(entity::update).delete(entity::delete),
                )
                .layer(Extension(protected::EntityRoute(def))),
        )
    })
}

fn feature_routes() -> Router<Integrations> {
    use protected::{ai, auth, compliance, dashboard, fridges, notifications, practice, reports, tasks, users};

    Router::new()
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/password", put(auth::change_password))
        .route("/api/tasks/:id/complete", post(tasks::complete))
        .route("/api/fridges/statuses", get(fridges::statuses))
        .route("/api/fridges/:id/logs", get(fridges::logs).post(fridges::record_reading))
        .route("/api/reports/medical-requests", get(reports::medical_requests))
        .route("/api/notifications", get(notifications::list))
        .route("/api/notifications/read-all", post(notifications::mark_all_read))
        .route("/api/notifications/:id/read", post(notifications::mark_read))
        .route("/api/compliance/scores", get(compliance::scores))
        .route("/api/compliance/compare", get(compliance::compare))
        .route(
            "/api/compliance/baselines",
            get(compliance::list_baselines).post(compliance::create_baseline),
        )
        .route("/api/compliance/baselines/:id", get(compliance::get_baseline))
        .route("/api/dashboard", get(dashboard::summary))
        .route("/api/users", get(users::list).post(users::create))
        .route("/api/users/:id", axum::routing::patch(users::update).delete(users::deactivate))
        .route("/api/practice", get(practice::get).patch(practice::update))
        .route("/api/ai/task-assist", post(ai::task_assist))
        .route("/api/ai/improvement-suggestions", post(ai::improvement_suggestions))
}

fn elevated_routes() -> Router<Integrations> {
    Router::new()
        .route("/api/admin/practices", get(elevated::practices::list).post(elevated::practices::create))
        .route("/api/admin/practices/:id", axum::routing::patch(elevated::practices::update))
}

/// Credentialed CORS for the configured origins; permissive in development
/// when none are set
fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::HeaderName::from_static(PRACTICE_HEADER),
        ])
        .expose_headers([header::HeaderName::from_static(protected::entity::TOTAL_COUNT_HEADER)])
        .allow_credentials(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::jobs::mailer::LogMailer;

    fn test_app() -> Router {
        let config = AppConfig::development();
        app(&config, Integrations { mailer: Arc::new(LogMailer), ai: None })
    }

    #[tokio::test]
    async fn root_lists_endpoints() {
        let response = test_app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["success"], serde_json::json!(true));
    }

    #[tokio::test]
    async fn api_requires_a_session() {
        for uri in ["/api/tasks", "/api/dashboard", "/api/admin/practices"] {
            let response = test_app()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
        }
    }

    #[tokio::test]
    async fn cron_triggers_require_the_secret() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/functions/scheduled-reminders")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), expected_cron_rejection());

        let response = test_app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/functions/dispatch-emails")
                    .header("x-cron-secret", "not-the-secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), expected_cron_rejection());
    }

    /// Triggers are disabled outright when no secret is configured
    fn expected_cron_rejection() -> StatusCode {
        if crate::config::config().security.cron_secret.is_empty() {
            StatusCode::FORBIDDEN
        } else {
            StatusCode::UNAUTHORIZED
        }
    }
}
