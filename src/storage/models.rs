use chrono::{NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::types::{
    BidExpiry, LowestBid, Price, PriceRecord, BID_END_FORMAT, FETCH_TIME_FORMAT,
};

/// One snapshot file row. Field order is the column order on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRow {
    pub fetch_time: String,
    pub player_id: u64,
    pub player_name: String,
    /// Coin amount or `EXTINCT`.
    pub current_price: String,
    pub last_bin: Option<String>,
    pub average_bin: Option<u64>,
    pub lowest_bid: Option<u64>,
    pub lowest_bid_expires_in: Option<String>,
    pub lowest_bid_end_time: Option<String>,
    pub seconds_remaining: Option<f64>,
    pub price_updated_at: Option<String>,
}

impl From<&PriceRecord> for SnapshotRow {
    fn from(r: &PriceRecord) -> Self {
        let expiry = r.bid_expiry();
        Self {
            fetch_time: r.fetch_time(),
            player_id: r.item_id,
            player_name: r.name.clone(),
            current_price: r.current_price.to_string(),
            last_bin: r.last_bin.map(|p| p.to_string()),
            average_bin: r.average_bin,
            lowest_bid: r.lowest_bid.as_ref().map(|b| b.amount),
            lowest_bid_expires_in: expiry.map(BidExpiry::countdown),
            lowest_bid_end_time: expiry.map(|e| e.ends_at.format(BID_END_FORMAT).to_string()),
            seconds_remaining: expiry.map(|e| e.seconds_remaining),
            price_updated_at: r.price_updated_at.clone(),
        }
    }
}

impl TryFrom<SnapshotRow> for PriceRecord {
    type Error = AppError;

    fn try_from(row: SnapshotRow) -> Result<Self, Self::Error> {
        let id = row.player_id;
        let bad = |what: &str, value: &str| {
            AppError::Payload(format!("snapshot row for {id}: invalid {what} '{value}'"))
        };

        let fetched_at = NaiveDateTime::parse_from_str(&row.fetch_time, FETCH_TIME_FORMAT)
            .map_err(|_| bad("fetch_time", &row.fetch_time))?;
        let current_price = Price::parse(&row.current_price)
            .ok_or_else(|| bad("current_price", &row.current_price))?;
        let last_bin = match row.last_bin.as_deref() {
            Some(raw) => Some(Price::parse(raw).ok_or_else(|| bad("last_bin", raw))?),
            None => None,
        };

        let expiry = match (row.lowest_bid_end_time.as_deref(), row.seconds_remaining) {
            (Some(raw), Some(seconds_remaining)) => {
                let naive = NaiveDateTime::parse_from_str(raw, BID_END_FORMAT)
                    .map_err(|_| bad("lowest_bid_end_time", raw))?;
                Some(BidExpiry {
                    ends_at: Utc.from_utc_datetime(&naive),
                    seconds_remaining,
                })
            }
            _ => None,
        };
        let lowest_bid = row.lowest_bid.map(|amount| LowestBid { amount, expiry });

        Ok(PriceRecord {
            item_id: row.player_id,
            name: row.player_name,
            current_price,
            last_bin,
            average_bin: row.average_bin,
            lowest_bid,
            price_updated_at: row.price_updated_at,
            fetched_at,
        })
    }
}
