use shared::types::attendance::Attendance;
use sqlx::SqlitePool;

#[derive(Debug, sqlx::FromRow)]
struct AttendanceRow {
    id: i64,
    member_id: String,
    member_name: String,
    membership_type: String,
    check_in_time: String,
    check_out_time: Option<String>,
    status: String,
    notes: Option<String>,
}

impl From<AttendanceRow> for Attendance {
    fn from(row: AttendanceRow) -> Self {
        Self {
            id: row.id,
            member_id: row.member_id,
            member_name: row.member_name,
            membership_type: row.membership_type,
            check_in_time: row.check_in_time,
            check_out_time: row.check_out_time,
            status: row.status,
            notes: row.notes,
        }
    }
}

const ATTENDANCE_SELECT: &str = "SELECT a.id, m.member_id, m.name AS member_name, m.membership_type,
        a.check_in_time, a.check_out_time, a.status, a.notes
     FROM attendance a
     JOIN members m ON m.id = a.member_ref";

/// Data required to INSERT a check-in row.
#[derive(Debug, Clone)]
pub struct NewCheckin<'a> {
    pub member_ref: i64,
    pub check_in_time: &'a str,
    pub status: &'a str,
    pub notes: Option<&'a str>,
}

/// Whether the member has a check-in in `[start, end)` with no check-out yet.
pub async fn has_open_checkin(
    pool: &SqlitePool,
    member_ref: i64,
    start: &str,
    end: &str,
) -> sqlx::Result<bool> {
    let open: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM attendance
         WHERE member_ref = ?1
           AND check_in_time >= ?2 AND check_in_time < ?3
           AND check_out_time IS NULL",
    )
    .bind(member_ref)
    .bind(start)
    .bind(end)
    .fetch_one(pool)
    .await?;

    Ok(open > 0)
}

pub async fn insert_checkin(pool: &SqlitePool, checkin: NewCheckin<'_>) -> sqlx::Result<Attendance> {
    let id = sqlx::query(
        "INSERT INTO attendance (member_ref, check_in_time, status, notes)
         VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(checkin.member_ref)
    .bind(checkin.check_in_time)
    .bind(checkin.status)
    .bind(checkin.notes)
    .execute(pool)
    .await?
    .last_insert_rowid();

    get_attendance(pool, id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)
}

pub async fn get_attendance(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<Attendance>> {
    let row: Option<AttendanceRow> = sqlx::query_as(&format!("{} WHERE a.id = ?1", ATTENDANCE_SELECT))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(Attendance::from))
}

/// Stamp a check-out. Returns the updated record, or `None` if `id` is unknown.
pub async fn checkout(
    pool: &SqlitePool,
    id: i64,
    check_out_time: &str,
    notes: Option<&str>,
) -> sqlx::Result<Option<Attendance>> {
    let updated = sqlx::query(
        "UPDATE attendance
         SET check_out_time = ?1, notes = COALESCE(?2, notes)
         WHERE id = ?3",
    )
    .bind(check_out_time)
    .bind(notes)
    .bind(id)
    .execute(pool)
    .await?
    .rows_affected();

    if updated == 0 {
        return Ok(None);
    }
    get_attendance(pool, id).await
}

/// Attendance records, newest check-in first, optionally for one member.
pub async fn list_attendance(
    pool: &SqlitePool,
    member_id: Option<&str>,
) -> sqlx::Result<Vec<Attendance>> {
    let rows: Vec<AttendanceRow> = match member_id {
        Some(member_id) => {
            sqlx::query_as(&format!(
                "{} WHERE m.member_id = ?1 ORDER BY a.check_in_time DESC, a.id DESC",
                ATTENDANCE_SELECT
            ))
            .bind(member_id)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as(&format!(
                "{} ORDER BY a.check_in_time DESC, a.id DESC",
                ATTENDANCE_SELECT
            ))
            .fetch_all(pool)
            .await?
        }
    };

    Ok(rows.into_iter().map(Attendance::from).collect())
}

/// Check-ins with `check_in_time` in `[start, end)`.
pub async fn count_checkins_between(pool: &SqlitePool, start: &str, end: &str) -> sqlx::Result<i64> {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM attendance WHERE check_in_time >= ?1 AND check_in_time < ?2",
    )
    .bind(start)
    .bind(end)
    .fetch_one(pool)
    .await
}
