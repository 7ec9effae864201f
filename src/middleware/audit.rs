use axum::{
    body::{to_bytes, Body, HttpBody},
    extract::{ConnectInfo, Request},
    http::{HeaderMap, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use uuid::Uuid;

use crate::config;
use crate::database::{DatabaseManager, EntityDef};
use crate::error::ApiError;

use super::practice::PracticeScope;

/// Routes outside the entity registry, longest prefix first
const CUSTOM_ROUTES: &[(&str, &str)] = &[
    ("compliance/baselines", "compliance_baseline"),
    ("admin/practices", "practice"),
    ("notifications", "notification"),
    ("practice", "practice"),
    ("users", "user"),
];

/// Not recorded: sign-in traffic and AI conversations
const SKIPPED_PREFIXES: &[&str] = &["auth/", "ai/"];

#[derive(Debug, Clone, PartialEq)]
pub struct AuditTarget {
    pub entity_type: &'static str,
    pub entity_id: Option<Uuid>,
    pub action: String,
}

fn base_action(method: &Method) -> Option<&'static str> {
    match *method {
        Method::POST => Some("create"),
        Method::PUT | Method::PATCH => Some("update"),
        Method::DELETE => Some("delete"),
        _ => None,
    }
}

/// Work out what a mutating `/api/...` request touched from its path:
/// `/api/<path>[/<id>[/<action>]]`
pub fn audit_target(method: &Method, path: &str) -> Option<AuditTarget> {
    let action = base_action(method)?;
    let rest = path.strip_prefix("/api/")?.trim_end_matches('/');
    if SKIPPED_PREFIXES.iter().any(|p| rest.starts_with(p) || rest == p.trim_end_matches('/')) {
        return None;
    }

    let (entity_type, remainder) = match CUSTOM_ROUTES
        .iter()
        .find(|(prefix, _)| rest == *prefix || rest.starts_with(&format!("{}/", prefix)))
    {
        Some((prefix, entity_type)) => (*entity_type, rest[prefix.len()..].trim_start_matches('/')),
        None => {
            let (first, remainder) = rest.split_once('/').unwrap_or((rest, ""));
            (EntityDef::by_path(first)?.entity_type, remainder)
        }
    };

    let mut segments = remainder.split('/').filter(|s| !s.is_empty());
    let mut entity_id = None;
    let mut sub_action = None;
    if let Some(first) = segments.next() {
        match Uuid::parse_str(first) {
            Ok(id) => {
                entity_id = Some(id);
                sub_action = segments.next();
            }
            Err(_) => sub_action = Some(first),
        }
    }

    // POST /api/<entity>/find is a read
    if sub_action == Some("find") {
        return None;
    }

    Some(AuditTarget {
        entity_type,
        entity_id,
        action: sub_action.map(|a| a.replace('-', "_")).unwrap_or_else(|| action.to_string()),
    })
}

/// Proxy headers are only honoured when the deployment sits behind a trusted proxy
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> Option<String> {
    if !trust_proxy {
        return peer.map(|p| p.ip().to_string());
    }
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()).map(str::to_string))
        .or_else(|| peer.map(|p| p.ip().to_string()))
}

/// Records successful writes in `audit_logs`. The response is passed
/// through unchanged and audit failures never fail the request.
pub async fn audit_middleware(request: Request, next: Next) -> Response {
    let security = &config::config().security;
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let target = match audit_target(&method, &path) {
        Some(target) if security.enable_audit_logging => target,
        _ => return next.run(request).await,
    };
    let Some(scope) = request.extensions().get::<PracticeScope>().cloned() else {
        return next.run(request).await;
    };
    let peer = request.extensions().get::<ConnectInfo<SocketAddr>>().map(|c| c.0);
    let ip = client_ip(request.headers(), peer, security.trust_proxy_headers);

    let response = next.run(request).await;
    let status = response.status();
    if !status.is_success() {
        return response;
    }

    let (parts, body) = response.into_parts();
    let limit = config::config().api.max_request_size_bytes.max(1024 * 1024);
    let fits = body.size_hint().upper().is_some_and(|len| len <= limit as u64);
    let (response, data_id) = if fits {
        match to_bytes(body, limit).await {
            Ok(bytes) => {
                let data_id = response_data_id(&bytes);
                (Response::from_parts(parts, Body::from(bytes)), data_id)
            }
            Err(e) => {
                tracing::error!("Audit skipped, response body for {} {} failed: {}", method, path, e);
                return ApiError::internal_server_error("Failed to read response body").into_response();
            }
        }
    } else {
        tracing::debug!("Auditing {} {} without reading the streamed response", method, path);
        (Response::from_parts(parts, body), None)
    };
    let entity_id = target.entity_id.or(data_id);

    let details = json!({ "action": target.action, "entity_type": target.entity_type });
    let insert = async {
        let pool = DatabaseManager::pool()?;
        sqlx::query(
            "INSERT INTO audit_logs (practice_id, user_id, action, entity_type, entity_id, method, path, status_code, details, ip_address)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(scope.practice_id)
        .bind(scope.user_id)
        .bind(&target.action)
        .bind(target.entity_type)
        .bind(entity_id)
        .bind(method.as_str())
        .bind(&path)
        .bind(i32::from(status.as_u16()))
        .bind(&details)
        .bind(&ip)
        .execute(&pool)
        .await?;
        Ok::<_, crate::database::DatabaseError>(())
    };
    if let Err(e) = insert.await {
        tracing::error!("Failed to write audit log for {} {}: {}", method, path, e);
    }

    response
}

/// `data.id` of an enveloped JSON response
fn response_data_id(bytes: &[u8]) -> Option<Uuid> {
    let body: Value = serde_json::from_slice(bytes).ok()?;
    body.get("data")?.get("id")?.as_str().and_then(|s| Uuid::parse_str(s).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "0f8fad5b-d9cb-469f-a165-70867728950e";

    #[test]
    fn registry_entities_are_resolved() {
        let t = audit_target(&Method::POST, "/api/tasks").unwrap();
        assert_eq!(t, AuditTarget { entity_type: "task", entity_id: None, action: "create".into() });

        let t = audit_target(&Method::PATCH, &format!("/api/training-records/{}", ID)).unwrap();
        assert_eq!(t.entity_type, "training_record");
        assert_eq!(t.entity_id.unwrap().to_string(), ID);
        assert_eq!(t.action, "update");
    }

    #[test]
    fn sub_actions_become_the_action() {
        let t = audit_target(&Method::POST, &format!("/api/tasks/{}/complete", ID)).unwrap();
        assert_eq!(t.action, "complete");
        let t = audit_target(&Method::POST, "/api/notifications/read-all").unwrap();
        assert_eq!(t.entity_type, "notification");
        assert_eq!(t.action, "read_all");
    }

    #[test]
    fn custom_routes_use_the_fixed_table() {
        assert_eq!(audit_target(&Method::POST, "/api/compliance/baselines").unwrap().entity_type, "compliance_baseline");
        assert_eq!(audit_target(&Method::PATCH, "/api/practice").unwrap().entity_type, "practice");
        assert_eq!(audit_target(&Method::DELETE, &format!("/api/users/{}", ID)).unwrap().action, "delete");
    }

    #[test]
    fn reads_and_excluded_paths_are_skipped() {
        assert!(audit_target(&Method::GET, "/api/tasks").is_none());
        assert!(audit_target(&Method::POST, "/api/tasks/find").is_none());
        assert!(audit_target(&Method::PUT, "/api/auth/password").is_none());
        assert!(audit_target(&Method::POST, "/api/ai/task-assist").is_none());
        assert!(audit_target(&Method::POST, "/api/unknown-things").is_none());
        assert!(audit_target(&Method::POST, "/functions/scheduled-reminders").is_none());
    }

    #[test]
    fn forwarded_ip_needs_a_trusted_proxy() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        let peer: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        assert_eq!(client_ip(&headers, Some(peer), true).as_deref(), Some("203.0.113.7"));
        assert_eq!(client_ip(&headers, Some(peer), false).as_deref(), Some("127.0.0.1"));
        assert_eq!(client_ip(&headers, None, false), None);
    }

    #[test]
    fn created_ids_come_from_the_envelope() {
        let body = format!(r#"{{"success":true,"data":{{"id":"{}"}}}}"#, ID);
        assert_eq!(response_data_id(body.as_bytes()).unwrap().to_string(), ID);
        assert_eq!(response_data_id(br#"{"success":true,"data":[]}"#), None);
        assert_eq!(response_data_id(b"not json"), None);
    }

    #[tokio::test]
    async fn requests_outside_a_practice_pass_through() {
        use axum::{routing::post, Router};
        use tower::ServiceExt;

        let app = Router::new()
            .route("/api/tasks", post(|| async { "created" }))
            .layer(axum::middleware::from_fn(audit_middleware));
        let response = app
            .oneshot(Request::builder().method("POST").uri("/api/tasks").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"created");
    }
}
