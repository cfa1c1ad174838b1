//! Ollama readiness probe.

use std::time::Duration;

/// Lightweight readiness check against the Ollama HTTP API.
///
/// Hits `/api/tags` with a short timeout and requires a valid JSON 200
/// response. Never errors; any failure reads as "not ready".
pub async fn is_ready(url: &str, timeout: Duration) -> bool {
    let client = match reqwest::Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(_) => return false,
    };

    let response = match client
        .get(format!("{}/api/tags", url.trim_end_matches('/')))
        .send()
        .await
    {
        Ok(response) => response,
        Err(_) => return false,
    };

    if !response.status().is_success() {
        return false;
    }

    response.json::<serde_json::Value>().await.is_ok()
}
