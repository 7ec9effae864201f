mod common;

use anyhow::Result;
use reqwest::StatusCode;

#[tokio::test]
async fn scheduled_functions_require_the_cron_secret() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    for path in ["/functions/scheduled-reminders", "/functions/dispatch-emails"] {
        let res = client.post(server.url(path)).send().await?;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{} without secret", path);

        let res = client.post(server.url(path)).header("x-cron-secret", "wrong").send().await?;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{} with wrong secret", path);
    }
    Ok(())
}

#[tokio::test]
async fn correct_secret_passes_the_guard() -> Result<()> {
    // migrate first so the server finds its tables
    let database = common::database().await;
    let server = common::ensure_server().await?;
    let res = reqwest::Client::new()
        .post(server.url("/functions/scheduled-reminders"))
        .header("x-cron-secret", common::CRON_SECRET)
        .send()
        .await?;

    if database.is_some() {
        assert_eq!(res.status(), StatusCode::OK);
        let body: serde_json::Value = res.json().await?;
        assert_eq!(body["success"], serde_json::json!(true));
        assert!(body["data"]["practices"].is_u64());
    } else {
        assert!(res.status().is_server_error(), "unexpected status: {}", res.status());
    }
    Ok(())
}
