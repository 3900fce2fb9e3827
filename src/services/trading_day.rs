use crate::constants::OPERATIONAL_TIMEZONE;
use crate::models::TrackedIndex;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

/// Result of resolving the previous session for one index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradingDay {
    /// The market was open; the snapshot's previous close belongs to this date
    Open(NaiveDate),
    /// Weekend or exchange holiday; nothing is recorded for this date
    Closed(NaiveDate),
}

/// "Yesterday" as a civil date in the operational timezone
pub fn previous_civil_day(now: DateTime<Utc>) -> NaiveDate {
    let today = now.with_timezone(&OPERATIONAL_TIMEZONE).date_naive();
    today - Duration::days(1)
}

/// Previous civil day, checked against the index's market calendar
pub fn resolve_previous_trading_day(now: DateTime<Utc>, index: &TrackedIndex) -> TradingDay {
    let date = previous_civil_day(now);
    if index.is_closed_on(date) {
        TradingDay::Closed(date)
    } else {
        TradingDay::Open(date)
    }
}

/// Next instant strictly after `now` at which the local wall clock reads `run_time`
pub fn next_daily_run(now: DateTime<Utc>, run_time: NaiveTime) -> DateTime<Utc> {
    let mut date = now.with_timezone(&OPERATIONAL_TIMEZONE).date_naive();

    // Three days covers any DST gap that swallows the run time on one day
    for _ in 0..3 {
        if let Some(candidate) = OPERATIONAL_TIMEZONE
            .from_local_datetime(&date.and_time(run_time))
            .earliest()
        {
            let candidate = candidate.with_timezone(&Utc);
            if candidate > now {
                return candidate;
            }
        }
        date += Duration::days(1);
    }

    now + Duration::days(1)
}

/// How long the daily worker sleeps before the next run
pub fn until_next_run(now: DateTime<Utc>, run_time: NaiveTime) -> std::time::Duration {
    (next_daily_run(now, run_time) - now)
        .to_std()
        .unwrap_or(std::time::Duration::from_secs(60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MarketCalendar;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_previous_day_follows_operational_timezone() {
        // 20:00 UTC on 13 Mar is already 14 Mar 01:30 in Kolkata
        assert_eq!(previous_civil_day(utc("2025-03-13T20:00:00Z")), date(2025, 3, 13));
        // 10:00 UTC on 13 Mar is still 13 Mar in Kolkata
        assert_eq!(previous_civil_day(utc("2025-03-13T10:00:00Z")), date(2025, 3, 12));
    }

    #[test]
    fn test_same_day_resolves_identically_across_runs() {
        let morning = previous_civil_day(utc("2025-03-13T19:00:00Z"));
        let evening = previous_civil_day(utc("2025-03-14T18:00:00Z"));
        assert_eq!(morning, evening);
    }

    #[test]
    fn test_holiday_is_per_index() {
        let dow = TrackedIndex::new("dow", "Dow", MarketCalendar::Us);
        let ftse = TrackedIndex::new("ftse", "FTSE 100", MarketCalendar::Uk);
        // Kolkata morning of 5 July 2025; yesterday was US Independence Day
        let now = utc("2025-07-05T03:00:00Z");

        assert_eq!(resolve_previous_trading_day(now, &dow), TradingDay::Closed(date(2025, 7, 4)));
        assert_eq!(resolve_previous_trading_day(now, &ftse), TradingDay::Open(date(2025, 7, 4)));
    }

    #[test]
    fn test_weekend_is_closed() {
        let dax = TrackedIndex::new("dax", "DAX", MarketCalendar::Germany);
        // Monday morning in Kolkata: yesterday was Sunday
        let now = utc("2025-06-09T02:00:00Z");
        assert_eq!(resolve_previous_trading_day(now, &dax), TradingDay::Closed(date(2025, 6, 8)));
    }

    #[test]
    fn test_next_daily_run() {
        let six = NaiveTime::from_hms_opt(6, 0, 0).unwrap();
        // 06:00 IST is 00:30 UTC
        assert_eq!(next_daily_run(utc("2025-03-13T00:00:00Z"), six), utc("2025-03-13T00:30:00Z"));
        assert_eq!(next_daily_run(utc("2025-03-13T00:30:00Z"), six), utc("2025-03-14T00:30:00Z"));
        assert_eq!(next_daily_run(utc("2025-03-13T12:00:00Z"), six), utc("2025-03-14T00:30:00Z"));
    }

    #[test]
    fn test_until_next_run() {
        let six = NaiveTime::from_hms_opt(6, 0, 0).unwrap();
        let wait = until_next_run(utc("2025-03-13T00:00:00Z"), six);
        assert_eq!(wait, std::time::Duration::from_secs(30 * 60));
    }
}
