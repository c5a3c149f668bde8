use serde::{Deserialize, Serialize};

/// Create member request data
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMemberData {
    #[serde(default)]
    pub member_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub membership_type: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// RFC 3339 or `YYYY-MM-DD`; membership counts as active until then.
    pub end_date: Option<String>,
}

/// Update member request data. Only `memberId` is required; absent fields
/// keep their stored value.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMemberData {
    #[serde(default)]
    pub member_id: String,
    pub name: Option<String>,
    pub membership_type: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: Option<String>,
    pub end_date: Option<String>,
}

/// A member row as returned to dashboards and embedded in `member_update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: i64,
    pub member_id: String,
    pub name: String,
    pub membership_type: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: String,
    pub end_date: Option<String>,
    pub created_at: String,
}

/// Member error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberError {
    MissingField(&'static str),
    DuplicateMemberId,
    InvalidTimestamp(&'static str),
    NotFound,
    DatabaseError,
}

impl MemberError {
    pub fn to_code(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "MISSING_FIELD",
            Self::DuplicateMemberId => "DUPLICATE_MEMBER_ID",
            Self::InvalidTimestamp(_) => "INVALID_TIMESTAMP",
            Self::NotFound => "NOT_FOUND",
            Self::DatabaseError => "DATABASE_ERROR",
        }
    }

    pub fn to_message(&self) -> String {
        match self {
            Self::MissingField(field) => format!("Missing required field: {}", field),
            Self::DuplicateMemberId => "A member with this ID already exists".to_string(),
            Self::InvalidTimestamp(field) => format!("Invalid date in field: {}", field),
            Self::NotFound => "Member not found".to_string(),
            Self::DatabaseError => "Database error occurred".to_string(),
        }
    }
}

impl NewMemberData {
    /// Required: `memberId`, `name`, `membershipType`.
    pub fn validate(&self) -> Result<(), MemberError> {
        if self.member_id.trim().is_empty() {
            return Err(MemberError::MissingField("memberId"));
        }
        if self.name.trim().is_empty() {
            return Err(MemberError::MissingField("name"));
        }
        if self.membership_type.trim().is_empty() {
            return Err(MemberError::MissingField("membershipType"));
        }
        Ok(())
    }
}

impl UpdateMemberData {
    /// Required: `memberId`. Fields that are present must not be blank.
    pub fn validate(&self) -> Result<(), MemberError> {
        if self.member_id.trim().is_empty() {
            return Err(MemberError::MissingField("memberId"));
        }
        let present_but_blank =
            |field: &Option<String>| field.as_deref().is_some_and(|v| v.trim().is_empty());
        if present_but_blank(&self.name) {
            return Err(MemberError::MissingField("name"));
        }
        if present_but_blank(&self.membership_type) {
            return Err(MemberError::MissingField("membershipType"));
        }
        if present_but_blank(&self.status) {
            return Err(MemberError::MissingField("status"));
        }
        Ok(())
    }
}
