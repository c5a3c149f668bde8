use std::convert::Infallible;

use anyhow::{Context, Result};
use bytes::Bytes;
use chrono::Utc;
use http_body_util::combinators::BoxBody;
use hyper::body::Incoming as IncomingBody;
use hyper::{Request, Response, StatusCode};
use serde::Serialize;
use tracing::info;

use crate::AppState;
use crate::database::attendance as db_attendance;
use crate::database::members as db_members;
use crate::database::utils::local_day_bounds;
use crate::handlers::http::utils::deliver_success_json;

/// Point-in-time counters for the admin dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub total_members: i64,
    pub active_members: i64,
    pub today_check_ins: i64,
    /// Admin sessions currently subscribed to the realtime stream.
    pub connected_clients: usize,
    pub uptime_secs: i64,
}

/// Serve aggregate dashboard counters
pub async fn handle_dashboard(
    _req: Request<IncomingBody>,
    state: AppState,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    info!("Serving dashboard stats");

    let (day_start, day_end) = local_day_bounds(Utc::now());

    let snapshot = DashboardSnapshot {
        total_members: db_members::count_members(&state.db)
            .await
            .context("Failed to count members")?,
        active_members: db_members::count_active_members(&state.db)
            .await
            .context("Failed to count active members")?,
        today_check_ins: db_attendance::count_checkins_between(&state.db, &day_start, &day_end)
            .await
            .context("Failed to count today's check-ins")?,
        connected_clients: state.registry.len(),
        uptime_secs: Utc::now().timestamp() - state.started_at,
    };

    deliver_success_json(&snapshot, StatusCode::OK)
}
