use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, REFERER};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::{Config, ItemGroup, TrackedItem, ACCEPT_HEADER, REFERER_HEADER};
use crate::error::{AppError, Result};
use crate::types::{format_coins, format_opt_coins, BidExpiry, LowestBid, Price, PriceRecord};

// ---------------------------------------------------------------------------
// Raw payload shape
// ---------------------------------------------------------------------------

/// Raw deserializable shape of the player-prices response.
/// Everything is optional; required fields are checked in `parse_price_payload`.
#[derive(Debug, Deserialize)]
struct RawPriceResponse {
    data: Option<RawPriceData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPriceData {
    current_price: Option<RawCurrentPrice>,
    overview: Option<RawOverview>,
    momentum: Option<RawMomentum>,
    #[serde(default)]
    live_auctions: Option<Vec<RawAuction>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCurrentPrice {
    price: Option<serde_json::Number>,
    #[serde(default)]
    is_extinct: Option<bool>,
    price_updated_at: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOverview {
    average_bin: Option<serde_json::Number>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMomentum {
    last_updates: Option<Vec<RawMomentumUpdate>>,
}

#[derive(Debug, Deserialize)]
struct RawMomentumUpdate {
    bin: Option<serde_json::Number>,
}

/// One open auction from `liveAuctions`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAuction {
    pub starting_bid: Option<serde_json::Number>,
    pub end_date: Option<String>,
}

/// Coin amounts usually arrive as integers, occasionally as floats.
fn coins(n: &serde_json::Number) -> Option<u64> {
    n.as_u64()
        .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f.round() as u64))
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse a player-prices response body into a record.
///
/// `now` is used for the bid countdown, `fetched_at` is stamped on the record.
/// Extinct items carry the sentinel in both price columns and no bid data.
pub fn parse_price_payload(
    body: &str,
    item_id: u64,
    name: &str,
    now: DateTime<Utc>,
    fetched_at: NaiveDateTime,
) -> Result<PriceRecord> {
    let raw: RawPriceResponse = serde_json::from_str(body)?;
    let data = raw
        .data
        .ok_or_else(|| AppError::Payload("missing `data` object".to_string()))?;
    let current = data
        .current_price
        .ok_or_else(|| AppError::Payload("missing `data.currentPrice`".to_string()))?;

    let average_bin = data
        .overview
        .as_ref()
        .and_then(|o| o.average_bin.as_ref())
        .and_then(coins);

    if current.is_extinct.unwrap_or(false) {
        return Ok(PriceRecord {
            item_id,
            name: name.to_string(),
            current_price: Price::Extinct,
            last_bin: Some(Price::Extinct),
            average_bin,
            lowest_bid: None,
            price_updated_at: current.price_updated_at,
            fetched_at,
        });
    }

    let current_price = current
        .price
        .as_ref()
        .and_then(coins)
        .ok_or_else(|| AppError::Payload("missing `data.currentPrice.price`".to_string()))?;

    let last_bin = data
        .momentum
        .as_ref()
        .and_then(|m| m.last_updates.as_ref())
        .and_then(|u| u.first())
        .and_then(|u| u.bin.as_ref())
        .and_then(coins)
        .map(Price::Coins);

    let lowest_bid = extract_lowest_bid(data.live_auctions.as_deref().unwrap_or_default(), now);

    Ok(PriceRecord {
        item_id,
        name: name.to_string(),
        current_price: Price::Coins(current_price),
        last_bin,
        average_bin,
        lowest_bid,
        price_updated_at: current.price_updated_at,
        fetched_at,
    })
}

/// Pick the auction with the smallest starting bid.
/// Auctions without a bid amount never win; ties keep the first one listed.
pub fn extract_lowest_bid(auctions: &[RawAuction], now: DateTime<Utc>) -> Option<LowestBid> {
    let (amount, auction) = auctions
        .iter()
        .filter_map(|a| a.starting_bid.as_ref().and_then(coins).map(|b| (b, a)))
        .min_by_key(|(b, _)| *b)?;

    let expiry = match auction.end_date.as_deref() {
        None => None,
        Some(raw) => match parse_end_date(raw) {
            Some(ends_at) => Some(BidExpiry::at(ends_at, now)),
            None => {
                warn!("Unparsable auction end date '{raw}', dropping bid expiry");
                None
            }
        },
    };

    Some(LowestBid { amount, expiry })
}

/// RFC 3339, or a naive ISO timestamp taken as UTC.
pub fn parse_end_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

pub struct PriceFetcher {
    client: reqwest::Client,
    base_url: String,
    game_version: u32,
}

impl PriceFetcher {
    pub fn new(base_url: &str, game_version: u32, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HEADER));
        headers.insert(REFERER, HeaderValue::from_static(REFERER_HEADER));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            game_version,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(&cfg.price_api_url, cfg.game_version, cfg.request_timeout)
    }

    pub fn price_url(&self, item_id: u64) -> String {
        format!("{}/{}/{}/", self.base_url, self.game_version, item_id)
    }

    /// Fetch and normalize the current market state of one item.
    pub async fn fetch_record(&self, item_id: u64, name: &str) -> Result<PriceRecord> {
        let url = self.price_url(item_id);
        debug!("GET {url}");

        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::Status { status: status.as_u16(), url });
        }

        let body = resp.text().await?;
        parse_price_payload(&body, item_id, name, Utc::now(), Local::now().naive_local())
    }

    /// Poll every item of a group one after another.
    /// Failed lookups are logged and left out of the result.
    pub async fn fetch_group(&self, group: &ItemGroup, delay: Duration) -> Vec<PriceRecord> {
        info!(
            group = %group.name,
            "Fetching prices for {} items in group '{}'",
            group.items.len(),
            group.name,
        );

        poll_sequentially(&group.items, delay, |item| async move {
            match self.fetch_record(item.id, &item.name).await {
                Ok(record) => {
                    log_record(&record);
                    Some(record)
                }
                Err(e) => {
                    warn!(item_id = item.id, "Price lookup failed for {}: {e}", item.name);
                    None
                }
            }
        })
        .await
    }
}

/// Run `lookup` on each item in order, sleeping `delay` between two lookups
/// (not after the last one). `None` results are dropped.
async fn poll_sequentially<'a, T, F, Fut>(
    items: &'a [TrackedItem],
    delay: Duration,
    mut lookup: F,
) -> Vec<T>
where
    F: FnMut(&'a TrackedItem) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        if let Some(value) = lookup(item).await {
            out.push(value);
        }
        if !delay.is_zero() && i + 1 < items.len() {
            tokio::time::sleep(delay).await;
        }
    }
    out
}

fn log_record(r: &PriceRecord) {
    match r.current_price {
        Price::Extinct => warn!(
            item_id = r.item_id,
            "{}: EXTINCT, no market listings available",
            r.name
        ),
        Price::Coins(price) => {
            let last_bin = r.last_bin.and_then(Price::coins);
            let bid = r.lowest_bid.as_ref().map(|b| b.amount);
            let expires = r
                .bid_expiry()
                .map_or_else(|| "N/A".to_string(), BidExpiry::countdown);
            info!(
                item_id = r.item_id,
                price,
                "{}: {} coins | last BIN {} | avg BIN {} | lowest bid {} (expires in {})",
                r.name,
                format_coins(price),
                format_opt_coins(last_bin),
                format_opt_coins(r.average_bin),
                format_opt_coins(bid),
                expires,
            );
        }
    }
}
