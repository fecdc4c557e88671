use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const DAY_MINUTES: f64 = 1440.0;
pub const EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct DayKey(NaiveDate);

impl DayKey {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
            .map(Self)
            .map_err(|_| format!("day key '{value}' must be YYYY-MM-DD"))
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for DayKey {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Block {
    pub id: String,
    pub start: f64,
    pub dur: f64,
    #[serde(rename = "categoryId")]
    pub category_id: String,
}

impl Block {
    pub fn end(&self) -> f64 {
        self.start + self.dur
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "block.id")?;
        validate_non_empty(&self.category_id, "block.category_id")?;
        if !self.start.is_finite() || !self.dur.is_finite() {
            return Err("block.start and block.dur must be finite".to_string());
        }
        if self.dur <= 0.0 {
            return Err("block.dur must be > 0".to_string());
        }
        if self.start < -EPSILON {
            return Err("block.start must be >= 0".to_string());
        }
        if self.end() > DAY_MINUTES + EPSILON {
            return Err(format!("block.start + block.dur must be <= {DAY_MINUTES}"));
        }
        Ok(())
    }
}

/// A block that has not been placed yet; it receives an id when applied.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBlock {
    pub start: f64,
    pub dur: f64,
    pub category_id: String,
}

impl NewBlock {
    pub fn new(start: f64, dur: f64, category_id: impl Into<String>) -> Self {
        Self {
            start,
            dur,
            category_id: category_id.into(),
        }
    }

    pub fn end(&self) -> f64 {
        self.start + self.dur
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: String,
    pub label: String,
    pub color: String,
}

impl Category {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "category.id")?;
        validate_non_empty(&self.label, "category.label")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayRecord {
    pub day_key: DayKey,
    pub blocks: Vec<Block>,
    pub notes_by_category: BTreeMap<String, String>,
    pub notes_by_block: BTreeMap<String, String>,
    pub category_snapshot: Vec<Category>,
    pub seconds_by_category: BTreeMap<String, f64>,
}

impl DayRecord {
    pub fn empty(day_key: DayKey) -> Self {
        Self {
            day_key,
            blocks: Vec::new(),
            notes_by_category: BTreeMap::new(),
            notes_by_block: BTreeMap::new(),
            category_snapshot: Vec::new(),
            seconds_by_category: BTreeMap::new(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_block_list(&self.blocks)?;
        for category in &self.category_snapshot {
            category.validate()?;
        }
        Ok(())
    }

    /// Seconds per category: live blocks plus time already folded out of them.
    pub fn tracked_seconds_by_category(&self) -> BTreeMap<String, f64> {
        let mut totals = self.seconds_by_category.clone();
        for block in &self.blocks {
            *totals.entry(block.category_id.clone()).or_insert(0.0) += block.dur * 60.0;
        }
        totals
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimerSession {
    pub category_id: String,
    pub day_key: DayKey,
    pub started_at: DateTime<Utc>,
}

impl TimerSession {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.category_id, "timer.category_id")
    }
}

/// Checks every block and that the list is sorted and free of overlaps.
pub fn validate_block_list(blocks: &[Block]) -> Result<(), String> {
    for block in blocks {
        block.validate()?;
    }
    for pair in blocks.windows(2) {
        let (left, right) = (&pair[0], &pair[1]);
        if right.start + EPSILON < left.start {
            return Err(format!(
                "blocks must be sorted by start: {} comes after {}",
                right.id, left.id
            ));
        }
        if left.end() > right.start + EPSILON {
            return Err(format!("blocks {} and {} overlap", left.id, right.id));
        }
    }
    Ok(())
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn sample_block(id: &str, start: f64, dur: f64, category_id: &str) -> Block {
        Block {
            id: id.to_string(),
            start,
            dur,
            category_id: category_id.to_string(),
        }
    }

    #[test]
    fn block_validate_accepts_valid_block() {
        assert!(sample_block("blk-1", 0.0, 60.0, "study").validate().is_ok());
        assert!(sample_block("blk-2", 1380.0, 60.0, "sleep").validate().is_ok());
    }

    #[test]
    fn block_validate_rejects_out_of_day_range() {
        assert!(sample_block("blk-1", 1400.0, 60.0, "study").validate().is_err());
        assert!(sample_block("blk-1", -5.0, 10.0, "study").validate().is_err());
        assert!(sample_block("blk-1", 10.0, 0.0, "study").validate().is_err());
        assert!(sample_block("blk-1", 10.0, f64::NAN, "study").validate().is_err());
    }

    #[test]
    fn block_list_rejects_overlap_and_disorder() {
        let overlapping = vec![
            sample_block("a", 0.0, 30.0, "study"),
            sample_block("b", 20.0, 30.0, "rest"),
        ];
        assert!(validate_block_list(&overlapping).is_err());

        let unsorted = vec![
            sample_block("a", 60.0, 30.0, "study"),
            sample_block("b", 0.0, 30.0, "rest"),
        ];
        assert!(validate_block_list(&unsorted).is_err());

        let touching = vec![
            sample_block("a", 0.0, 30.0, "study"),
            sample_block("b", 30.0, 30.0, "rest"),
        ];
        assert!(validate_block_list(&touching).is_ok());
    }

    #[test]
    fn day_key_parses_and_displays() {
        let day_key = DayKey::parse("2026-03-09").expect("parse day key");
        assert_eq!(day_key.to_string(), "2026-03-09");
        assert!(DayKey::parse("2026/03/09").is_err());
        assert_eq!("2026-03-09".parse::<DayKey>(), Ok(day_key));
    }

    #[test]
    fn tracked_seconds_include_folded_accumulator() {
        let mut record = DayRecord::empty(DayKey::parse("2026-03-09").expect("day key"));
        record.blocks = vec![
            sample_block("a", 0.0, 30.0, "study"),
            sample_block("b", 60.0, 0.5, "rest"),
        ];
        record.seconds_by_category.insert("study".to_string(), 120.0);

        let totals = record.tracked_seconds_by_category();
        assert_eq!(totals.get("study"), Some(&1920.0));
        assert_eq!(totals.get("rest"), Some(&30.0));
    }

    proptest! {
        #[test]
        fn day_key_display_parse_roundtrip(days in 0i64..20_000i64) {
            let date = NaiveDate::from_ymd_opt(1990, 1, 1).expect("base date")
                + chrono::Duration::days(days);
            let day_key = DayKey::new(date);
            prop_assert_eq!(DayKey::parse(&day_key.to_string()), Ok(day_key));
        }
    }

    #[test]
    fn domain_models_support_serde_roundtrip() {
        let block = sample_block("blk-1", 100.0, 0.2, "study");
        let session = TimerSession {
            category_id: "study".to_string(),
            day_key: DayKey::parse("2026-03-09").expect("day key"),
            started_at: fixed_time("2026-03-09T04:40:00Z"),
        };

        let block_json = serde_json::to_value(&block).expect("serialize block");
        assert_eq!(block_json["categoryId"], "study");
        let block_roundtrip: Block = serde_json::from_value(block_json).expect("deserialize block");
        let session_roundtrip: TimerSession =
            serde_json::from_str(&serde_json::to_string(&session).expect("serialize session"))
                .expect("deserialize session");

        assert_eq!(block_roundtrip, block);
        assert_eq!(session_roundtrip, session);
    }
}
