mod common;

use anyhow::Result;
use chrono::Utc;
use reqwest::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

#[tokio::test]
async fn created_records_are_audited_with_their_id() -> Result<()> {
    let Some(pool) = common::database().await else { return Ok(()) };
    let server = common::ensure_server().await?;
    let seeded = common::seed_practice(&pool).await;
    let client = reqwest::Client::new();

    let res = client
        .post(server.url("/auth/login"))
        .json(&json!({ "email": seeded.admin.email, "password": "integration-password" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let token = res.json::<Value>().await?["data"]["token"].as_str().unwrap_or_default().to_string();

    let res = client
        .post(server.url("/api/tasks"))
        .bearer_auth(&token)
        .json(&json!({ "title": "Check defibrillator pads", "due_date": Utc::now().date_naive().to_string() }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body = res.json::<Value>().await?;
    let created = Uuid::parse_str(body["data"]["id"].as_str().unwrap_or_default())?;

    let (entity_id, ip): (Option<Uuid>, Option<String>) = sqlx::query_as(
        "SELECT entity_id, ip_address FROM audit_logs
         WHERE practice_id = $1 AND entity_type = 'task' AND action = 'create'",
    )
    .bind(seeded.practice.id)
    .fetch_one(&pool)
    .await?;
    assert_eq!(entity_id, Some(created));
    assert_eq!(ip.as_deref(), Some("127.0.0.1"));
    Ok(())
}
