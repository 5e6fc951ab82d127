// Health and metrics endpoints

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};

use crate::{app::AppState, cache::render_metrics, db::check_diesel_health};

/// GET /health - component status for Postgres and Redis
pub async fn health_check(State(state): State<AppState>) -> Response {
    let mut overall_healthy = true;
    let timestamp = chrono::Utc::now().to_rfc3339();

    let postgres_health = match check_diesel_health(&state.diesel_pool).await {
        Ok(_) => serde_json::json!({ "status": "healthy", "error": null }),
        Err(e) => {
            overall_healthy = false;
            serde_json::json!({
                "status": "unhealthy",
                "error": format!("Database connection failed: {}", e)
            })
        },
    };

    let redis_health = state.redis_pool.health_check().await;
    if !redis_health.is_healthy {
        overall_healthy = false;
    }

    let body = serde_json::json!({
        "status": if overall_healthy { "healthy" } else { "degraded" },
        "service": "dashtam-backend",
        "timestamp": timestamp,
        "components": {
            "postgresql": postgres_health,
            "redis": {
                "status": if redis_health.is_healthy { "healthy" } else { "unhealthy" },
                "latency_ms": redis_health.latency_ms,
                "error": redis_health.error,
            }
        }
    });

    if overall_healthy {
        (StatusCode::OK, Json(body)).into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
    }
}

/// GET /metrics - Prometheus text format
pub async fn metrics() -> Response {
    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        render_metrics(),
    )
        .into_response()
}
