use axum::extract::State;
use axum::Json;

use crate::api::AppState;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Ready once configuration is loaded; echoes the calculation conventions in force.
pub async fn ready(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ready",
        "policy": state.policy,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn test_health_returns_ok() {
        let Json(body) = health().await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_ready_reports_policy() {
        let Json(body) = ready(State(AppState::new(&Config::default()))).await;
        assert_eq!(body["status"], "ready");
        assert_eq!(body["policy"]["narrowBase"], "common_and_preferred");
        assert_eq!(body["policy"]["dayCount"], "actual_365");
    }
}
