// 🛒 Channel dimension - trade channels from the channel extract

use super::{
    distinct_keys, DimensionRecord, TRADE_CHANNEL_COLUMN, TRADE_GROUP_COLUMN, TRADE_TYPE_COLUMN,
};
use crate::diagnostics::{Diagnostics, WarningKind};
use crate::keys::surrogate_key;
use crate::sanitize::UNKNOWN;
use crate::table::Table;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub channel_id: String,
    pub trade_channel: String,
    pub trade_group: String,
    pub trade_type: String,
}

impl DimensionRecord for ChannelRecord {
    const DIMENSION: &'static str = "dim_channel";

    fn natural_key(&self) -> &str {
        &self.trade_channel
    }

    fn surrogate_key(&self) -> &str {
        &self.channel_id
    }
}

/// Build from the sanitized channel table. Group and type pass through as-is.
pub fn build_channel_dimension(
    channels: &Table,
    diagnostics: &mut Diagnostics,
) -> Vec<ChannelRecord> {
    let Some(key_idx) = channels.column_index(TRADE_CHANNEL_COLUMN) else {
        diagnostics.record(
            WarningKind::DegradedInput,
            ChannelRecord::DIMENSION,
            TRADE_CHANNEL_COLUMN,
            "column absent from channel extract; channel dimension is empty",
            1,
        );
        return Vec::new();
    };

    let mut passthrough = |column: &str| {
        let idx = channels.column_index(column);
        if idx.is_none() {
            diagnostics.record(
                WarningKind::DegradedInput,
                ChannelRecord::DIMENSION,
                column,
                "column absent; set to UNKNOWN",
                1,
            );
        }
        idx
    };
    let group_idx = passthrough(TRADE_GROUP_COLUMN);
    let type_idx = passthrough(TRADE_TYPE_COLUMN);

    let attribute = |row: usize, idx: Option<usize>| match idx {
        Some(idx) => channels.rows[row][idx].key_text(),
        None => UNKNOWN.to_string(),
    };

    let records: Vec<ChannelRecord> = distinct_keys(channels, key_idx)
        .into_iter()
        .map(|(key, row)| ChannelRecord {
            channel_id: surrogate_key(&key),
            trade_group: attribute(row, group_idx),
            trade_type: attribute(row, type_idx),
            trade_channel: key,
        })
        .collect();

    info!(rows = records.len(), "dim_channel built");
    records
}
