use std::convert::Infallible;

use anyhow::{Context, Result};
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::body::Incoming as IncomingBody;
use hyper::{Request, Response, StatusCode};
use shared::types::event::{DashboardStats, RealtimeEvent};
use shared::types::member::{MemberError, NewMemberData, UpdateMemberData};
use tracing::{error, info};

use crate::AppState;
use crate::database::members as db_members;
use crate::database::utils::parse_client_date;
use crate::handlers::http::utils::{deliver_error_json, deliver_success_json, read_json_body};
use crate::handlers::sse::broadcast;

fn member_error(err: MemberError) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let status = match err {
        MemberError::MissingField(_) | MemberError::InvalidTimestamp(_) => StatusCode::BAD_REQUEST,
        MemberError::DuplicateMemberId => StatusCode::CONFLICT,
        MemberError::NotFound => StatusCode::NOT_FOUND,
        MemberError::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
    };
    deliver_error_json(err.to_code(), &err.to_message(), status)
}

/// Canonical `endDate`; blank means none. Anything unparseable is rejected
/// rather than silently dropped.
fn normalize_end_date(raw: Option<String>) -> Result<Option<String>, MemberError> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_client_date(value)
            .map(Some)
            .ok_or(MemberError::InvalidTimestamp("endDate")),
    }
}

/// Create a member, then tell connected dashboards about it.
pub async fn handle_create_member(
    req: Request<IncomingBody>,
    state: AppState,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let mut data: NewMemberData = match read_json_body(req).await? {
        Ok(data) => data,
        Err(e) => {
            return deliver_error_json("BAD_REQUEST", &format!("Invalid JSON: {}", e), StatusCode::BAD_REQUEST);
        }
    };

    if let Err(err) = data.validate() {
        return member_error(err);
    }
    data.end_date = match normalize_end_date(data.end_date.take()) {
        Ok(end_date) => end_date,
        Err(err) => return member_error(err),
    };

    let member = match db_members::insert_member(&state.db, &data).await {
        Ok(member) => member,
        Err(e) if db_members::is_unique_violation(&e) => {
            return member_error(MemberError::DuplicateMemberId);
        }
        Err(e) => {
            error!("Create member failed: {}", e);
            return member_error(MemberError::DatabaseError);
        }
    };
    info!("Member created: {} ({})", member.member_id, member.name);

    let member_json = serde_json::to_value(&member).context("Failed to serialize member")?;
    broadcast(&state.registry, &RealtimeEvent::member_update(member_json));

    match db_members::count_members(&state.db).await {
        Ok(total) => broadcast(
            &state.registry,
            &RealtimeEvent::dashboard_update(DashboardStats {
                total_members: Some(total),
                ..Default::default()
            }),
        ),
        Err(e) => error!("Member count for dashboard update failed: {}", e),
    }

    deliver_success_json(&member, StatusCode::CREATED)
}

/// Update a member by card number, then push the new row and the active
/// member count to connected dashboards.
pub async fn handle_update_member(
    req: Request<IncomingBody>,
    state: AppState,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let mut data: UpdateMemberData = match read_json_body(req).await? {
        Ok(data) => data,
        Err(e) => {
            return deliver_error_json("BAD_REQUEST", &format!("Invalid JSON: {}", e), StatusCode::BAD_REQUEST);
        }
    };

    if let Err(err) = data.validate() {
        return member_error(err);
    }
    data.end_date = match normalize_end_date(data.end_date.take()) {
        Ok(end_date) => end_date,
        Err(err) => return member_error(err),
    };

    let member = match db_members::update_member(&state.db, &data).await {
        Ok(Some(member)) => member,
        Ok(None) => return member_error(MemberError::NotFound),
        Err(e) => {
            error!("Update member failed: {}", e);
            return member_error(MemberError::DatabaseError);
        }
    };
    info!("Member updated: {} ({})", member.member_id, member.status);

    let member_json = serde_json::to_value(&member).context("Failed to serialize member")?;
    broadcast(&state.registry, &RealtimeEvent::member_update(member_json));

    match db_members::count_active_members(&state.db).await {
        Ok(active) => broadcast(
            &state.registry,
            &RealtimeEvent::dashboard_update(DashboardStats {
                active_members: Some(active),
                ..Default::default()
            }),
        ),
        Err(e) => error!("Active member count for dashboard update failed: {}", e),
    }

    deliver_success_json(&member, StatusCode::OK)
}

/// List all members.
pub async fn handle_list_members(
    _req: Request<IncomingBody>,
    state: AppState,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    match db_members::list_members(&state.db).await {
        Ok(members) => deliver_success_json(&members, StatusCode::OK),
        Err(e) => {
            error!("List members failed: {}", e);
            member_error(MemberError::DatabaseError)
        }
    }
}
