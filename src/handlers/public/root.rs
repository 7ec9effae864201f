use axum::{http::StatusCode, response::Json};
use serde_json::{json, Value};

use crate::database::DatabaseManager;

/// GET / - service banner
pub async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "GP Compliance API",
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": {
                "public": ["/health", "/auth/login", "/auth/logout", "/auth/register"],
                "functions": ["/functions/scheduled-reminders", "/functions/dispatch-emails"],
                "protected": ["/api/auth/me", "/api/dashboard", "/api/compliance/scores", "/api/:entity"],
                "elevated": ["/api/admin/practices"]
            }
        }
    }))
}

/// GET /health - 200 when the database answers, 503 otherwise
pub async fn health() -> (StatusCode, Json<Value>) {
    match DatabaseManager::health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "success": true, "data": { "status": "ok", "database": "ok" } })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "Database unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": { "status": "degraded", "database": "unavailable" }
                })),
            )
        }
    }
}
