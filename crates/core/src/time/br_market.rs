use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};

// Brasília time, UTC-3 (no daylight saving since 2019).
const BRT_OFFSET_SECS: i32 = -3 * 3600;

/// Date stamped on snapshots: the explicit `YYYY-MM-DD` argument, else today's Brasília date.
pub fn resolve_as_of_date(
    as_of_date_arg: Option<&str>,
    now_utc: DateTime<Utc>,
) -> anyhow::Result<NaiveDate> {
    if let Some(s) = as_of_date_arg {
        return NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .with_context(|| format!("invalid as-of date {s:?}, expected YYYY-MM-DD"));
    }

    let brt = chrono::FixedOffset::east_opt(BRT_OFFSET_SECS).context("invalid BRT offset")?;
    Ok(now_utc.with_timezone(&brt).date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn uses_brasilia_calendar_day() {
        // 02:00 UTC is still the previous evening in Brasília.
        let now = Utc.with_ymd_and_hms(2026, 3, 3, 2, 0, 0).unwrap();
        let d = resolve_as_of_date(None, now).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());

        let now = Utc.with_ymd_and_hms(2026, 3, 3, 12, 0, 0).unwrap();
        let d = resolve_as_of_date(None, now).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2026, 3, 3).unwrap());
    }

    #[test]
    fn explicit_date_wins() {
        let now = Utc.with_ymd_and_hms(2026, 3, 3, 12, 0, 0).unwrap();
        let d = resolve_as_of_date(Some("2025-12-30"), now).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2025, 12, 30).unwrap());
        assert!(resolve_as_of_date(Some("30/12/2025"), now).is_err());
    }
}
