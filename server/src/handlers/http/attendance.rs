use std::collections::HashMap;
use std::convert::Infallible;

use anyhow::Result;
use bytes::Bytes;
use chrono::Utc;
use http_body_util::combinators::BoxBody;
use hyper::body::Incoming as IncomingBody;
use hyper::{Request, Response, StatusCode};
use shared::types::attendance::{
    AttendanceError, CheckinRequest, CheckoutRequest, DEFAULT_ATTENDANCE_STATUS,
    DEFAULT_MEMBERSHIP_TYPE,
};
use shared::types::event::{Checkin, DashboardStats, RealtimeEvent};
use tracing::{error, info, warn};

use crate::AppState;
use crate::database::attendance::{self as db_attendance, NewCheckin};
use crate::database::members as db_members;
use crate::database::utils::{local_day_bounds, now_db_time, parse_client_time};
use crate::handlers::http::utils::{deliver_error_json, deliver_success_json, read_json_body};
use crate::handlers::sse::broadcast;

fn attendance_error(err: AttendanceError) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let status = match err {
        AttendanceError::MissingMemberId
        | AttendanceError::MissingAttendanceId
        | AttendanceError::InvalidTimestamp(_)
        | AttendanceError::AlreadyCheckedIn => StatusCode::BAD_REQUEST,
        AttendanceError::MemberNotFound | AttendanceError::RecordNotFound => StatusCode::NOT_FOUND,
        AttendanceError::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
    };
    deliver_error_json(err.to_code(), &err.to_message(), status)
}

fn db_failure(context: &str, e: sqlx::Error) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    error!("{}: {}", context, e);
    attendance_error(AttendanceError::DatabaseError)
}

/// Resolve an optional client timestamp, defaulting to now.
fn time_or_now(
    raw: Option<&str>,
    field: &'static str,
) -> std::result::Result<String, AttendanceError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => parse_client_time(raw).ok_or(AttendanceError::InvalidTimestamp(field)),
        None => Ok(now_db_time()),
    }
}

/// Record a check-in and push it to every connected dashboard.
///
/// After the row is written two events go out, in order:
/// `attendance_checkin` with the member's display fields, then
/// `dashboard_update` carrying today's check-in count.
pub async fn handle_checkin(
    req: Request<IncomingBody>,
    state: AppState,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let data: CheckinRequest = match read_json_body(req).await? {
        Ok(data) => data,
        Err(e) => {
            return deliver_error_json("BAD_REQUEST", &format!("Invalid JSON: {}", e), StatusCode::BAD_REQUEST);
        }
    };

    if data.member_id.trim().is_empty() {
        return attendance_error(AttendanceError::MissingMemberId);
    }

    let check_in_time = match time_or_now(data.check_in_time.as_deref(), "checkInTime") {
        Ok(t) => t,
        Err(err) => return attendance_error(err),
    };

    let member = match db_members::find_member(&state.db, &data.member_id).await {
        Ok(Some(member)) => member,
        Ok(None) => return attendance_error(AttendanceError::MemberNotFound),
        Err(e) => return db_failure("Member lookup failed", e),
    };

    let (day_start, day_end) = local_day_bounds(Utc::now());
    match db_attendance::has_open_checkin(&state.db, member.id, &day_start, &day_end).await {
        Ok(true) => {
            warn!("Rejected duplicate check-in for {}", member.member_id);
            return attendance_error(AttendanceError::AlreadyCheckedIn);
        }
        Ok(false) => {}
        Err(e) => return db_failure("Open check-in lookup failed", e),
    }

    let status = data
        .status
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_ATTENDANCE_STATUS);

    let record = match db_attendance::insert_checkin(
        &state.db,
        NewCheckin {
            member_ref: member.id,
            check_in_time: &check_in_time,
            status,
            notes: data.notes.as_deref(),
        },
    )
    .await
    {
        Ok(record) => record,
        Err(e) => return db_failure("Check-in insert failed", e),
    };
    info!("Check-in recorded: {} at {}", member.member_id, record.check_in_time);

    let membership_type = if member.membership_type.trim().is_empty() {
        DEFAULT_MEMBERSHIP_TYPE.to_string()
    } else {
        member.membership_type.clone()
    };

    broadcast(
        &state.registry,
        &RealtimeEvent::attendance_checkin(Checkin {
            member_name: member.name.clone(),
            member_id: member.member_id.clone(),
            membership_type,
            timestamp: record.check_in_time.clone(),
        }),
    );

    match db_attendance::count_checkins_between(&state.db, &day_start, &day_end).await {
        Ok(today) => broadcast(
            &state.registry,
            &RealtimeEvent::dashboard_update(DashboardStats {
                today_check_ins: Some(today),
                ..Default::default()
            }),
        ),
        Err(e) => error!("Check-in count for dashboard update failed: {}", e),
    }

    deliver_success_json(&record, StatusCode::CREATED)
}

/// Stamp a check-out time on an existing record.
pub async fn handle_checkout(
    req: Request<IncomingBody>,
    state: AppState,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let data: CheckoutRequest = match read_json_body(req).await? {
        Ok(data) => data,
        Err(e) => {
            return deliver_error_json("BAD_REQUEST", &format!("Invalid JSON: {}", e), StatusCode::BAD_REQUEST);
        }
    };

    let Some(id) = data.id else {
        return attendance_error(AttendanceError::MissingAttendanceId);
    };

    let check_out_time = match time_or_now(data.check_out_time.as_deref(), "checkOutTime") {
        Ok(t) => t,
        Err(err) => return attendance_error(err),
    };

    match db_attendance::checkout(&state.db, id, &check_out_time, data.notes.as_deref()).await {
        Ok(Some(record)) => {
            info!("Check-out recorded: attendance {}", id);
            deliver_success_json(&record, StatusCode::OK)
        }
        Ok(None) => attendance_error(AttendanceError::RecordNotFound),
        Err(e) => db_failure("Check-out update failed", e),
    }
}

/// List attendance, newest first. `?memberId=` narrows to one member.
pub async fn handle_list_attendance(
    req: Request<IncomingBody>,
    state: AppState,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let params: HashMap<String, String> =
        form_urlencoded::parse(req.uri().query().unwrap_or("").as_bytes())
            .into_owned()
            .collect();
    let member_id = params
        .get("memberId")
        .map(|s| s.trim())
        .filter(|s| !s.is_empty());

    match db_attendance::list_attendance(&state.db, member_id).await {
        Ok(records) => deliver_success_json(&records, StatusCode::OK),
        Err(e) => db_failure("List attendance failed", e),
    }
}
