use crate::review::record::ReviewableRecord;
use chrono::{DateTime, Duration, Utc};

pub const DEFAULT_LOOKAHEAD_DAYS: i64 = 30;

/// Keep records expiring in `[now, now + lookahead_days]`, both ends inclusive
///
/// Already expired records are left out: they belong to remediation, not notification.
pub fn filter_window(
    records: Vec<ReviewableRecord>,
    lookahead_days: i64,
    now: DateTime<Utc>,
) -> Vec<ReviewableRecord> {
    let horizon = now + Duration::days(lookahead_days);

    records
        .into_iter()
        .filter(|record| record.expiration >= now && record.expiration <= horizon)
        .collect()
}
