use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use paperquote_core::reference::ReferenceSource;
use serde::Serialize;
use tracing::warn;

#[derive(Clone)]
pub struct HealthState {
    source: Arc<dyn ReferenceSource>,
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
    pub reference_data: HealthCheck,
    pub checked_at: String,
}

pub fn router(source: Arc<dyn ReferenceSource>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { source })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let reference_data = reference_check(state.source.as_ref());
    let ready = reference_data.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "paperquote-server accepting requests".to_string(),
        },
        reference_data,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn reference_check(source: &dyn ReferenceSource) -> HealthCheck {
    match source.load() {
        Ok(data) => {
            let summary = data.summary();
            HealthCheck {
                status: "ready",
                detail: format!(
                    "{} exchange rates, {} products, {} active formulas",
                    summary.exchange_rates, summary.products, summary.active_price_formulas
                ),
            }
        }
        Err(error) => {
            warn!(
                event_name = "server.health.reference_unavailable",
                correlation_id = "health",
                error = %error,
                "reference data failed to load"
            );
            HealthCheck { status: "degraded", detail: error.to_string() }
        }
    }
}
