use crate::domain::interval::apply_block;
use crate::domain::models::{Block, Category, DayKey, DayRecord, NewBlock, validate_block_list};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Wire shape of one day as exchanged with the remote store and kept in the
/// offline queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DayPayload {
    pub day: DayKey,
    #[serde(default)]
    pub blocks: Vec<Block>,
    #[serde(default, deserialize_with = "lenient")]
    pub notes: NotesPayload,
    #[serde(default, deserialize_with = "lenient")]
    pub categories: CategoriesPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct NotesPayload {
    #[serde(rename = "byCategory", default)]
    pub by_category: BTreeMap<String, String>,
    #[serde(rename = "byBlock", default)]
    pub by_block: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CategoriesPayload {
    #[serde(default)]
    pub list: Vec<Category>,
    #[serde(rename = "secondsByCategory", default)]
    pub seconds_by_category: BTreeMap<String, f64>,
}

/// Older records stored these sections in other shapes; anything that does
/// not parse is read as empty.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}

pub fn encode_day_record(record: &DayRecord) -> DayPayload {
    DayPayload {
        day: record.day_key,
        blocks: record.blocks.clone(),
        notes: NotesPayload {
            by_category: record.notes_by_category.clone(),
            by_block: record.notes_by_block.clone(),
        },
        categories: CategoriesPayload {
            list: record.category_snapshot.clone(),
            seconds_by_category: record.seconds_by_category.clone(),
        },
    }
}

pub fn decode_day_payload(payload: DayPayload) -> DayRecord {
    DayRecord {
        day_key: payload.day,
        blocks: normalize_blocks(payload.blocks),
        notes_by_category: payload.notes.by_category,
        notes_by_block: payload.notes.by_block,
        category_snapshot: payload
            .categories
            .list
            .into_iter()
            .filter(|category| category.validate().is_ok())
            .collect(),
        seconds_by_category: payload
            .categories
            .seconds_by_category
            .into_iter()
            .filter(|(_, seconds)| seconds.is_finite() && *seconds >= 0.0)
            .collect(),
    }
}

/// Drops invalid blocks and repairs ordering. Overlaps are resolved by
/// replaying the blocks in stored order, so later entries win.
fn normalize_blocks(blocks: Vec<Block>) -> Vec<Block> {
    let mut valid: Vec<Block> = blocks
        .into_iter()
        .filter(|block| block.validate().is_ok())
        .collect();
    let stored_order = valid.clone();
    valid.sort_by(|left, right| left.start.total_cmp(&right.start));
    if validate_block_list(&valid).is_ok() {
        return valid;
    }

    tracing::warn!(count = stored_order.len(), "stored blocks overlap; replaying in stored order");
    stored_order.iter().fold(Vec::new(), |acc, block| {
        apply_block(&acc, &NewBlock::new(block.start, block.dur, block.category_id.clone()))
    })
}
