use crate::utils::trading_day_key;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Previous-session close of one index on one trading day
///
/// `(index_key, trading_date)` is the natural key: the store holds at most one
/// record per pair. `trading_date` is always the civil date at 00:00 UTC, so the
/// same day encodes to the same instant no matter when a run executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloseRecord {
    #[serde(rename = "index")]
    pub index_key: String,

    #[serde(rename = "date")]
    pub trading_date: DateTime<Utc>,

    #[serde(rename = "close", with = "rust_decimal::serde::float")]
    pub close_value: Decimal,
}

impl CloseRecord {
    pub fn new(index_key: &str, trading_day: NaiveDate, close_value: Decimal) -> Self {
        Self {
            index_key: index_key.to_string(),
            trading_date: trading_day_key(trading_day),
            close_value,
        }
    }

    /// Civil trading day of the record
    pub fn trading_day(&self) -> NaiveDate {
        self.trading_date.date_naive()
    }
}

/// A record a preview run would have written, with a synthetic identifier
#[derive(Debug, Clone, Serialize)]
pub struct PreviewRecord {
    pub id: Uuid,
    #[serde(flatten)]
    pub record: CloseRecord,
}

impl PreviewRecord {
    pub fn new(record: CloseRecord) -> Self {
        Self {
            id: Uuid::new_v4(),
            record,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_record_json_shape() {
        let record = CloseRecord::new(
            "dow",
            NaiveDate::from_ymd_opt(2025, 3, 13).unwrap(),
            Decimal::from_str("41985.63").unwrap(),
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["index"], "dow");
        assert_eq!(json["date"], "2025-03-13T00:00:00Z");
        assert_eq!(json["close"].as_f64(), Some(41985.63));
    }

    #[test]
    fn test_preview_record_flattens() {
        let record = CloseRecord::new("dax", NaiveDate::from_ymd_opt(2025, 3, 13).unwrap(), Decimal::new(1825050, 2));
        let preview = PreviewRecord::new(record);
        let json = serde_json::to_value(&preview).unwrap();
        assert!(json["id"].is_string());
        assert_eq!(json["index"], "dax");
        assert_eq!(preview.record.trading_day(), NaiveDate::from_ymd_opt(2025, 3, 13).unwrap());
    }
}
