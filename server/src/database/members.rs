use shared::types::member::{Member, NewMemberData, UpdateMemberData};
use sqlx::SqlitePool;

use super::utils::now_db_time;

#[derive(Debug, sqlx::FromRow)]
struct MemberRow {
    id: i64,
    member_id: String,
    name: String,
    membership_type: String,
    email: Option<String>,
    phone: Option<String>,
    status: String,
    end_date: Option<String>,
    created_at: String,
}

impl From<MemberRow> for Member {
    fn from(row: MemberRow) -> Self {
        Self {
            id: row.id,
            member_id: row.member_id,
            name: row.name,
            membership_type: row.membership_type,
            email: row.email,
            phone: row.phone,
            status: row.status,
            end_date: row.end_date,
            created_at: row.created_at,
        }
    }
}

const MEMBER_COLUMNS: &str =
    "id, member_id, name, membership_type, email, phone, status, end_date, created_at";

/// Insert a member. `end_date` must already be in canonical form. A
/// duplicate `member_id` surfaces as a unique-violation database error; see
/// [`is_unique_violation`].
pub async fn insert_member(pool: &SqlitePool, data: &NewMemberData) -> sqlx::Result<Member> {
    let created_at = now_db_time();

    let id = sqlx::query(
        "INSERT INTO members (member_id, name, membership_type, email, phone, end_date, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )
    .bind(data.member_id.trim())
    .bind(data.name.trim())
    .bind(data.membership_type.trim())
    .bind(&data.email)
    .bind(&data.phone)
    .bind(&data.end_date)
    .bind(&created_at)
    .execute(pool)
    .await?
    .last_insert_rowid();

    Ok(Member {
        id,
        member_id: data.member_id.trim().to_string(),
        name: data.name.trim().to_string(),
        membership_type: data.membership_type.trim().to_string(),
        email: data.email.clone(),
        phone: data.phone.clone(),
        status: "Active".to_string(),
        end_date: data.end_date.clone(),
        created_at,
    })
}

/// Overwrite the fields present in `data`. `Ok(None)` when no member has
/// that card number.
pub async fn update_member(
    pool: &SqlitePool,
    data: &UpdateMemberData,
) -> sqlx::Result<Option<Member>> {
    let trimmed = |field: &Option<String>| field.as_deref().map(str::trim).map(str::to_string);

    let affected = sqlx::query(
        "UPDATE members SET
             name = COALESCE(?2, name),
             membership_type = COALESCE(?3, membership_type),
             email = COALESCE(?4, email),
             phone = COALESCE(?5, phone),
             status = COALESCE(?6, status),
             end_date = COALESCE(?7, end_date)
         WHERE member_id = ?1",
    )
    .bind(data.member_id.trim())
    .bind(trimmed(&data.name))
    .bind(trimmed(&data.membership_type))
    .bind(&data.email)
    .bind(&data.phone)
    .bind(trimmed(&data.status))
    .bind(&data.end_date)
    .execute(pool)
    .await?
    .rows_affected();

    if affected == 0 {
        return Ok(None);
    }
    find_member(pool, &data.member_id).await
}

/// Look a member up by card number.
pub async fn find_member(pool: &SqlitePool, member_id: &str) -> sqlx::Result<Option<Member>> {
    let row: Option<MemberRow> = sqlx::query_as(&format!(
        "SELECT {} FROM members WHERE member_id = ?1",
        MEMBER_COLUMNS
    ))
    .bind(member_id.trim())
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Member::from))
}

/// All members, newest first.
pub async fn list_members(pool: &SqlitePool) -> sqlx::Result<Vec<Member>> {
    let rows: Vec<MemberRow> = sqlx::query_as(&format!(
        "SELECT {} FROM members ORDER BY id DESC",
        MEMBER_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Member::from).collect())
}

pub async fn count_members(pool: &SqlitePool) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM members")
        .fetch_one(pool)
        .await
}

/// Members with status `Active` whose membership has not ended.
pub async fn count_active_members(pool: &SqlitePool) -> sqlx::Result<i64> {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM members
         WHERE status = 'Active' AND (end_date IS NULL OR end_date >= ?1)",
    )
    .bind(now_db_time())
    .fetch_one(pool)
    .await
}

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}
