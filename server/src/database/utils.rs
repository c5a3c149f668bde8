use chrono::{DateTime, Days, Local, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};

/// Canonical stored form: RFC 3339, UTC, millisecond precision, `Z` suffix.
/// Every stored timestamp uses this shape so string comparison orders them.
pub fn to_db_time(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn now_db_time() -> String {
    to_db_time(Utc::now())
}

/// Parse a client-supplied RFC 3339 timestamp (any offset) into canonical form.
pub fn parse_client_time(raw: &str) -> Option<String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| to_db_time(dt.with_timezone(&Utc)))
}

/// Like [`parse_client_time`], but a bare `YYYY-MM-DD` is also accepted and
/// means the last millisecond of that day in UTC.
pub fn parse_client_date(raw: &str) -> Option<String> {
    if let Some(canonical) = parse_client_time(raw) {
        return Some(canonical);
    }
    let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()?;
    let last_ms = NaiveTime::from_hms_milli_opt(23, 59, 59, 999)?;
    Some(to_db_time(Utc.from_utc_datetime(&date.and_time(last_ms))))
}

/// `[start, end)` of the server's local calendar day containing `now`,
/// in canonical stored form.
pub fn local_day_bounds(now: DateTime<Utc>) -> (String, String) {
    let local_date = now.with_timezone(&Local).date_naive();
    let start = local_date.and_time(NaiveTime::MIN);
    let end = local_date
        .checked_add_days(Days::new(1))
        .unwrap_or(local_date)
        .and_time(NaiveTime::MIN);

    let to_utc = |naive: chrono::NaiveDateTime| {
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
    };

    (to_db_time(to_utc(start)), to_db_time(to_utc(end)))
}
