use chrono::{DateTime, Utc};

/// Timestamp for a successful refresh. Never earlier than `previous`, so a
/// wall clock stepping backwards cannot make refresh dates go back in time.
pub fn next_refresh_date(previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    previous.map_or(now, |previous| previous.max(now))
}
