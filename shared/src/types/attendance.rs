use serde::{Deserialize, Serialize};

/// Check-in request data. Only `memberId` is required.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckinRequest {
    #[serde(default)]
    pub member_id: String,
    /// RFC 3339; defaults to now.
    pub check_in_time: Option<String>,
    pub status: Option<String>,
    pub notes: Option<String>,
}

/// Check-out request data.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub id: Option<i64>,
    /// RFC 3339; defaults to now.
    pub check_out_time: Option<String>,
    pub notes: Option<String>,
}

/// Attendance row joined with the member's display fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendance {
    pub id: i64,
    pub member_id: String,
    pub member_name: String,
    pub membership_type: String,
    pub check_in_time: String,
    pub check_out_time: Option<String>,
    pub status: String,
    pub notes: Option<String>,
}

/// Attendance error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttendanceError {
    MissingMemberId,
    MissingAttendanceId,
    InvalidTimestamp(&'static str),
    MemberNotFound,
    AlreadyCheckedIn,
    RecordNotFound,
    DatabaseError,
}

impl AttendanceError {
    pub fn to_code(&self) -> &'static str {
        match self {
            Self::MissingMemberId | Self::MissingAttendanceId => "MISSING_FIELD",
            Self::InvalidTimestamp(_) => "INVALID_TIMESTAMP",
            Self::MemberNotFound | Self::RecordNotFound => "NOT_FOUND",
            Self::AlreadyCheckedIn => "ALREADY_CHECKED_IN",
            Self::DatabaseError => "DATABASE_ERROR",
        }
    }

    pub fn to_message(&self) -> String {
        match self {
            Self::MissingMemberId => "Member ID is required".to_string(),
            Self::MissingAttendanceId => "Attendance ID is required".to_string(),
            Self::InvalidTimestamp(field) => format!("Invalid timestamp in field: {}", field),
            Self::MemberNotFound => "Member not found".to_string(),
            Self::AlreadyCheckedIn => "Member is already checked in today".to_string(),
            Self::RecordNotFound => "Attendance record not found".to_string(),
            Self::DatabaseError => "Database error occurred".to_string(),
        }
    }
}

/// Fallback tier when a member row carries no membership type.
pub const DEFAULT_MEMBERSHIP_TYPE: &str = "Standard";

/// Status recorded when the request does not name one.
pub const DEFAULT_ATTENDANCE_STATUS: &str = "Present";
