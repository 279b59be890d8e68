//! Read-only HTTP access to the current snapshots.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::metrics::PrometheusMetrics;
use crate::records::{Departure, Feed};
use crate::store::SnapshotStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SnapshotStore>,
    pub metrics: Option<Arc<PrometheusMetrics>>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/departures", get(departures))
        .route("/parkings", get(parkings))
        .route("/equipments", get(equipments))
        .route("/metrics", get(metrics))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct FeedStatus {
    feed: Feed,
    records: usize,
    loaded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    feeds: Vec<FeedStatus>,
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let departures = state.store.departures().get();
    let parkings = state.store.parkings().get();
    let equipments = state.store.equipments().get();
    Json(StatusResponse {
        feeds: vec![
            FeedStatus {
                feed: departures.feed,
                records: departures.len(),
                loaded_at: departures.loaded_at,
            },
            FeedStatus {
                feed: parkings.feed,
                records: parkings.len(),
                loaded_at: parkings.loaded_at,
            },
            FeedStatus {
                feed: equipments.feed,
                records: equipments.len(),
                loaded_at: equipments.loaded_at,
            },
        ],
    })
}

#[derive(Debug, Deserialize)]
struct DepartureQuery {
    /// Station code or stop point code.
    stop: Option<String>,
}

#[derive(Serialize)]
struct DepartureList<'a> {
    feed: Feed,
    loaded_at: Option<DateTime<Utc>>,
    records: Vec<&'a Departure>,
}

async fn departures(
    State(state): State<AppState>,
    Query(query): Query<DepartureQuery>,
) -> Response {
    let snapshot = state.store.departures().get();
    let records = snapshot
        .records
        .iter()
        .filter(|d| match &query.stop {
            Some(stop) => &d.station == stop || &d.stop_point == stop,
            None => true,
        })
        .collect();
    Json(DepartureList {
        feed: snapshot.feed,
        loaded_at: snapshot.loaded_at,
        records,
    })
    .into_response()
}

async fn parkings(State(state): State<AppState>) -> Response {
    Json(state.store.parkings().get()).into_response()
}

async fn equipments(State(state): State<AppState>) -> Response {
    Json(state.store.equipments().get()).into_response()
}

async fn metrics(State(state): State<AppState>) -> Response {
    let Some(metrics) = state.metrics else {
        return StatusCode::NOT_FOUND.into_response();
    };
    match metrics.render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
