/**
 * API HTTP AGRODASH - Dashboard + endpoints JSON
 *
 * RÔLE :
 * Expose la page du dashboard et les trois endpoints qu'elle interroge
 * toutes les 5 secondes.
 *
 * FONCTIONNEMENT :
 * - /dashboard/sensor-data   : cycle broker frais → snapshot JSON
 * - /dashboard/system-status : cycle broker frais → évaluation des seuils
 * - /dashboard/historical-data?topic=... : série simulée 24h, jamais en cache
 * - /, /dashboard et toute route inconnue : page HTML
 *
 * Aucun état partagé entre requêtes : pas de cache du dernier snapshot.
 * Un échec de connexion au broker donne un HTTP 500 `{success:false, error}`.
 */

use crate::broker::transport::Connector;
use crate::broker::{BrokerClient, BrokerError};
use crate::clock::Clock;
use crate::history::generate_mock;
use crate::status::evaluate;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use tower_http::trace::TraceLayer;

const DASHBOARD_HTML: &str = include_str!("../assets/dashboard.html");

pub struct AppState<C> {
    pub broker: Arc<BrokerClient<C>>,
    pub clock: Arc<dyn Clock>,
}

impl<C> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            broker: self.broker.clone(),
            clock: self.clock.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Failed to connect to broker: {0}")]
    BrokerUnavailable(BrokerError),
    #[error(transparent)]
    Broker(#[from] BrokerError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "dashboard request failed");
        let body = json!({ "success": false, "error": self.to_string() });
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    topic: Option<String>,
}

pub fn build_router<C>(app_state: AppState<C>) -> Router
where
    C: Connector + 'static,
{
    Router::new()
        .route("/", get(index))
        .route("/dashboard", get(index))
        .route("/health", get(|| async { "ok" }))
        .route("/dashboard/sensor-data", get(get_sensor_data::<C>))
        .route("/dashboard/historical-data", get(get_historical_data::<C>))
        .route("/dashboard/system-status", get(get_system_status::<C>))
        .fallback(index)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
}

async fn index() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

// GET /dashboard/sensor-data
async fn get_sensor_data<C: Connector>(
    State(app): State<AppState<C>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let snapshot = app
        .broker
        .fetch_current_readings()
        .await
        .map_err(ApiError::BrokerUnavailable)?;

    Ok(Json(json!({
        "success": true,
        "data": snapshot,
        "timestamp": app.clock.now().format(&Rfc3339).unwrap_or_default(),
    })))
}

// GET /dashboard/historical-data?topic=humidity
async fn get_historical_data<C: Connector>(
    State(app): State<AppState<C>>,
    Query(params): Query<HistoryParams>,
) -> Response {
    let topic = params
        .topic
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "humidity".to_string());
    let data = generate_mock(&topic, app.clock.now(), &mut rand::rng());

    (
        [
            (
                header::CACHE_CONTROL,
                "no-store, no-cache, must-revalidate, private, max-age=0",
            ),
            (header::PRAGMA, "no-cache"),
            (header::EXPIRES, "Sat, 01 Jan 2000 00:00:00 GMT"),
        ],
        Json(json!({ "success": true, "data": data, "topic": topic })),
    )
        .into_response()
}

// GET /dashboard/system-status (toujours un cycle broker frais)
async fn get_system_status<C: Connector>(
    State(app): State<AppState<C>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let snapshot = app.broker.fetch_current_readings().await?;
    let status = evaluate(&snapshot, app.clock.now());
    Ok(Json(json!({ "success": true, "status": status })))
}
