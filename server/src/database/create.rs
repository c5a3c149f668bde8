use sqlx::SqlitePool;
use tracing::info;

/// Create the tables the realtime actions read and write. Idempotent.
pub async fn create_tables(pool: &SqlitePool) -> sqlx::Result<()> {
    // Members. `member_id` is the human-facing card number ("M-0042"),
    // `id` the row key attendance points at.
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS members (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            member_id       TEXT    NOT NULL UNIQUE,
            name            TEXT    NOT NULL,
            membership_type TEXT    NOT NULL DEFAULT '',
            email           TEXT,
            phone           TEXT,
            status          TEXT    NOT NULL DEFAULT 'Active',
            end_date        TEXT,
            created_at      TEXT    NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    // Attendance. Timestamps are canonical RFC 3339 UTC strings, so range
    // filters compare lexicographically.
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS attendance (
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            member_ref     INTEGER NOT NULL,
            check_in_time  TEXT    NOT NULL,
            check_out_time TEXT,
            status         TEXT    NOT NULL DEFAULT 'Present',
            notes          TEXT,
            FOREIGN KEY (member_ref) REFERENCES members(id) ON DELETE CASCADE
        )",
    )
    .execute(pool)
    .await?;

    // --- Indexes --------------------------------------------------------
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_attendance_member_time
         ON attendance(member_ref, check_in_time)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_attendance_time ON attendance(check_in_time)")
        .execute(pool)
        .await?;

    info!("Database schema ready");
    Ok(())
}
