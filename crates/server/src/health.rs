use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};

use slotbook_sheets::BookingGrid;

#[derive(Clone)]
pub struct HealthState {
    grid: Arc<BookingGrid>,
}

impl HealthState {
    pub fn new(grid: Arc<BookingGrid>) -> Self {
        Self { grid }
    }
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
    pub store: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn spawn(bind_address: &str, port: u16, state: HealthState) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(state)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let store = store_check(&state.grid).await;
    let ready = store.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "slotbook-server polling runner initialized".to_string(),
        },
        store,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

/// Reads the day header: the same range every conversation starts from.
async fn store_check(grid: &BookingGrid) -> HealthCheck {
    match grid.day_labels().await {
        Ok(days) if days.is_empty() => HealthCheck {
            status: "degraded",
            detail: format!("sheet `{}` has no day headers", grid.sheet()),
        },
        Ok(days) => HealthCheck {
            status: "ready",
            detail: format!("sheet `{}` lists {} days", grid.sheet(), days.len()),
        },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("store read failed: {error}") }
        }
    }
}
