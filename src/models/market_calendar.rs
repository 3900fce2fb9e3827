//! Market holiday calendars
//!
//! Pure date logic, no IO and no wall clock. Each calendar knows which civil
//! dates its exchange is closed on. Saturdays and Sundays are closed everywhere.
//!
//! Holidays are rule-based (fixed dates, nth-weekday rules, Easter offsets,
//! equinox approximations) so they do not need a yearly table. One-off
//! closures (state funerals, lunar holidays in Hong Kong, moved bank holidays)
//! are not covered and go into a tracked index's `extra_holidays`.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Exchange holiday calendar a tracked index trades on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketCalendar {
    /// NYSE / Nasdaq
    #[serde(alias = "nyse")]
    Us,
    /// London Stock Exchange
    #[serde(alias = "lse")]
    Uk,
    /// Xetra / Frankfurt
    #[serde(alias = "de", alias = "xetra")]
    Germany,
    /// Euronext Paris
    #[serde(alias = "fr", alias = "euronext")]
    France,
    /// Japan Exchange Group
    #[serde(alias = "jp", alias = "jpx")]
    Japan,
    /// HKEX (fixed-date holidays only)
    #[serde(alias = "hk", alias = "hkex")]
    HongKong,
    /// Closed on weekends only
    #[serde(alias = "none")]
    WeekendsOnly,
}

impl MarketCalendar {
    pub fn name(&self) -> &'static str {
        match self {
            MarketCalendar::Us => "us",
            MarketCalendar::Uk => "uk",
            MarketCalendar::Germany => "germany",
            MarketCalendar::France => "france",
            MarketCalendar::Japan => "japan",
            MarketCalendar::HongKong => "hong_kong",
            MarketCalendar::WeekendsOnly => "weekends_only",
        }
    }

    /// True when the exchange holds a regular session on `date`
    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        !is_weekend(date) && !self.is_holiday(date)
    }

    /// True when `date` is an exchange holiday (weekends are not reported here)
    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays(date.year()).contains(&date)
    }

    /// All holidays of the calendar in `year`, sorted
    pub fn holidays(&self, year: i32) -> BTreeSet<NaiveDate> {
        match self {
            MarketCalendar::Us => us_holidays(year),
            MarketCalendar::Uk => uk_holidays(year),
            MarketCalendar::Germany => germany_holidays(year),
            MarketCalendar::France => france_holidays(year),
            MarketCalendar::Japan => japan_holidays(year),
            MarketCalendar::HongKong => hong_kong_holidays(year),
            MarketCalendar::WeekendsOnly => BTreeSet::new(),
        }
    }
}

impl fmt::Display for MarketCalendar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

// ---------------------------------------------------------------------------
// Per-market rules
// ---------------------------------------------------------------------------

fn us_holidays(year: i32) -> BTreeSet<NaiveDate> {
    let easter = easter_sunday(year);

    // NYSE does not observe New Year's Day when it falls on a Saturday
    let new_year = ymd(year, 1, 1).and_then(|d| match d.weekday() {
        Weekday::Sat => None,
        Weekday::Sun => Some(d + Duration::days(1)),
        _ => Some(d),
    });

    let juneteenth = if year >= 2022 {
        ymd(year, 6, 19).map(observed_nearest_weekday)
    } else {
        None
    };

    [
        new_year,
        NaiveDate::from_weekday_of_month_opt(year, 1, Weekday::Mon, 3), // MLK Day
        NaiveDate::from_weekday_of_month_opt(year, 2, Weekday::Mon, 3), // Presidents' Day
        easter.map(|e| e - Duration::days(2)),                          // Good Friday
        last_weekday_of_month(year, 5, Weekday::Mon),                   // Memorial Day
        juneteenth,
        ymd(year, 7, 4).map(observed_nearest_weekday),
        NaiveDate::from_weekday_of_month_opt(year, 9, Weekday::Mon, 1), // Labor Day
        NaiveDate::from_weekday_of_month_opt(year, 11, Weekday::Thu, 4), // Thanksgiving
        ymd(year, 12, 25).map(observed_nearest_weekday),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn uk_holidays(year: i32) -> BTreeSet<NaiveDate> {
    let easter = easter_sunday(year);

    let mut days: BTreeSet<NaiveDate> = [
        ymd(year, 1, 1).map(observed_next_weekday),
        easter.map(|e| e - Duration::days(2)),
        easter.map(|e| e + Duration::days(1)),
        NaiveDate::from_weekday_of_month_opt(year, 5, Weekday::Mon, 1),
        last_weekday_of_month(year, 5, Weekday::Mon),
        last_weekday_of_month(year, 8, Weekday::Mon),
    ]
    .into_iter()
    .flatten()
    .collect();

    days.extend(christmas_and_boxing_day(year));
    days
}

fn germany_holidays(year: i32) -> BTreeSet<NaiveDate> {
    let easter = easter_sunday(year);
    [
        ymd(year, 1, 1),
        easter.map(|e| e - Duration::days(2)),
        easter.map(|e| e + Duration::days(1)),
        ymd(year, 5, 1),
        ymd(year, 12, 24),
        ymd(year, 12, 25),
        ymd(year, 12, 26),
        ymd(year, 12, 31),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn france_holidays(year: i32) -> BTreeSet<NaiveDate> {
    let easter = easter_sunday(year);
    [
        ymd(year, 1, 1),
        easter.map(|e| e - Duration::days(2)),
        easter.map(|e| e + Duration::days(1)),
        ymd(year, 5, 1),
        ymd(year, 12, 25),
        ymd(year, 12, 26),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn japan_holidays(year: i32) -> BTreeSet<NaiveDate> {
    let emperors_birthday = if year >= 2020 { ymd(year, 2, 23) } else { ymd(year, 12, 23) };
    let mountain_day = if year >= 2016 { ymd(year, 8, 11) } else { None };

    let mut national: BTreeSet<NaiveDate> = [
        ymd(year, 1, 1),
        NaiveDate::from_weekday_of_month_opt(year, 1, Weekday::Mon, 2), // Coming of Age Day
        ymd(year, 2, 11),
        emperors_birthday,
        vernal_equinox(year),
        ymd(year, 4, 29),
        ymd(year, 5, 3),
        ymd(year, 5, 4),
        ymd(year, 5, 5),
        NaiveDate::from_weekday_of_month_opt(year, 7, Weekday::Mon, 3), // Marine Day
        mountain_day,
        NaiveDate::from_weekday_of_month_opt(year, 9, Weekday::Mon, 3), // Respect for the Aged
        autumnal_equinox(year),
        NaiveDate::from_weekday_of_month_opt(year, 10, Weekday::Mon, 2), // Sports Day
        ymd(year, 11, 3),
        ymd(year, 11, 23),
    ]
    .into_iter()
    .flatten()
    .collect();

    // A weekday sandwiched between two national holidays is itself a holiday
    let sandwiched: Vec<NaiveDate> = national
        .iter()
        .map(|d| *d + Duration::days(1))
        .filter(|next| {
            next.weekday() != Weekday::Sun
                && !national.contains(next)
                && national.contains(&(*next + Duration::days(1)))
        })
        .collect();
    national.extend(sandwiched);

    // Substitute holiday: a Sunday holiday moves to the next non-holiday day
    let substitutes: Vec<NaiveDate> = national
        .iter()
        .filter(|d| d.weekday() == Weekday::Sun)
        .map(|d| {
            let mut next = *d + Duration::days(1);
            while national.contains(&next) {
                next += Duration::days(1);
            }
            next
        })
        .collect();
    national.extend(substitutes);

    // Exchange closures on top of the national calendar
    national.extend([ymd(year, 1, 2), ymd(year, 1, 3), ymd(year, 12, 31)].into_iter().flatten());
    national
}

fn hong_kong_holidays(year: i32) -> BTreeSet<NaiveDate> {
    let easter = easter_sunday(year);
    let fixed = [
        ymd(year, 1, 1),
        ymd(year, 5, 1),
        ymd(year, 7, 1),
        ymd(year, 10, 1),
        ymd(year, 12, 25),
    ];

    let mut days: BTreeSet<NaiveDate> = fixed
        .into_iter()
        .flatten()
        .map(|d| if d.weekday() == Weekday::Sun { d + Duration::days(1) } else { d })
        .collect();

    days.extend(
        [easter.map(|e| e - Duration::days(2)), easter.map(|e| e + Duration::days(1))]
            .into_iter()
            .flatten(),
    );

    // Boxing day shifts past a Christmas that was itself moved to Monday
    if let Some(boxing) = ymd(year, 12, 26) {
        let mut day = if boxing.weekday() == Weekday::Sun { boxing + Duration::days(1) } else { boxing };
        while days.contains(&day) {
            day += Duration::days(1);
        }
        days.insert(day);
    }
    days
}

// ---------------------------------------------------------------------------
// Date helpers
// ---------------------------------------------------------------------------

fn ymd(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

fn last_weekday_of_month(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    let first_of_next = if month == 12 { ymd(year + 1, 1, 1) } else { ymd(year, month + 1, 1) }?;
    let mut day = first_of_next - Duration::days(1);
    while day.weekday() != weekday {
        day -= Duration::days(1);
    }
    Some(day)
}

/// US rule: Saturday holidays are observed Friday, Sunday holidays Monday
fn observed_nearest_weekday(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date - Duration::days(1),
        Weekday::Sun => date + Duration::days(1),
        _ => date,
    }
}

/// UK rule: weekend holidays move to the following Monday
fn observed_next_weekday(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date + Duration::days(2),
        Weekday::Sun => date + Duration::days(1),
        _ => date,
    }
}

/// UK Christmas and Boxing Day with substitute days
fn christmas_and_boxing_day(year: i32) -> Vec<NaiveDate> {
    let Some(christmas) = ymd(year, 12, 25) else {
        return Vec::new();
    };
    let offsets: [i64; 2] = match christmas.weekday() {
        Weekday::Fri => [0, 3],
        Weekday::Sat => [2, 3],
        Weekday::Sun => [1, 2],
        _ => [0, 1],
    };
    offsets.iter().map(|o| christmas + Duration::days(*o)).collect()
}

/// Gregorian Easter Sunday (anonymous Gregorian algorithm)
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    ymd(year, month as u32, day as u32)
}

// Equinox approximations hold for 1980-2099
fn vernal_equinox(year: i32) -> Option<NaiveDate> {
    let n = (year - 1980) as f64;
    let day = (20.8431 + 0.242194 * n).floor() as i32 - (year - 1980).div_euclid(4);
    ymd(year, 3, day as u32)
}

fn autumnal_equinox(year: i32) -> Option<NaiveDate> {
    let n = (year - 1980) as f64;
    let day = (23.2488 + 0.242194 * n).floor() as i32 - (year - 1980).div_euclid(4);
    ymd(year, 9, day as u32)
}
