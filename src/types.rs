use chrono::{DateTime, NaiveDateTime, Utc};

/// Timestamp format used for `fetch_time` in snapshots and alert messages.
pub const FETCH_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Timestamp format used for the absolute bid end time in snapshots.
pub const BID_END_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Rendered in place of a number when the item has no market listings.
pub const EXTINCT_LABEL: &str = "EXTINCT";

pub const EXPIRED_LABEL: &str = "expired";

// ---------------------------------------------------------------------------
// Price
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Price {
    Coins(u64),
    /// Upstream reports no listings at all for the item.
    Extinct,
}

impl Price {
    pub fn coins(self) -> Option<u64> {
        match self {
            Price::Coins(c) => Some(c),
            Price::Extinct => None,
        }
    }

    pub fn is_extinct(self) -> bool {
        matches!(self, Price::Extinct)
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case(EXTINCT_LABEL) {
            return Some(Price::Extinct);
        }
        s.parse().ok().map(Price::Coins)
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Price::Coins(c) => write!(f, "{c}"),
            Price::Extinct => write!(f, "{EXTINCT_LABEL}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Lowest live bid
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct BidExpiry {
    pub ends_at: DateTime<Utc>,
    /// Clamped to 0.0 once the auction is over.
    pub seconds_remaining: f64,
}

impl BidExpiry {
    pub fn at(ends_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let remaining = (ends_at - now).num_milliseconds() as f64 / 1000.0;
        Self {
            ends_at,
            seconds_remaining: remaining.max(0.0),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.seconds_remaining <= 0.0
    }

    /// Human-readable countdown: `1h 5m`, `4m 10s`, `42s` or `expired`.
    pub fn countdown(&self) -> String {
        format_countdown(self.seconds_remaining)
    }
}

pub fn format_countdown(seconds_remaining: f64) -> String {
    if seconds_remaining <= 0.0 {
        return EXPIRED_LABEL.to_string();
    }
    let total = seconds_remaining as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LowestBid {
    pub amount: u64,
    /// None when the auction carries no usable end date.
    pub expiry: Option<BidExpiry>,
}

// ---------------------------------------------------------------------------
// PriceRecord
// ---------------------------------------------------------------------------

/// One observation of one tracked item. Built once per poll, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceRecord {
    pub item_id: u64,
    pub name: String,
    pub current_price: Price,
    pub last_bin: Option<Price>,
    pub average_bin: Option<u64>,
    pub lowest_bid: Option<LowestBid>,
    /// Upstream's own timestamp string, kept verbatim.
    pub price_updated_at: Option<String>,
    /// Local wall-clock time of the fetch.
    pub fetched_at: NaiveDateTime,
}

impl PriceRecord {
    pub fn is_extinct(&self) -> bool {
        self.current_price.is_extinct()
    }

    pub fn bid_expiry(&self) -> Option<&BidExpiry> {
        self.lowest_bid.as_ref().and_then(|b| b.expiry.as_ref())
    }

    pub fn fetch_time(&self) -> String {
        self.fetched_at.format(FETCH_TIME_FORMAT).to_string()
    }
}

/// Render a coin amount with thousands separators: `1250000` → `1,250,000`.
pub fn format_coins(amount: u64) -> String {
    let digits = amount.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn format_opt_coins(amount: Option<u64>) -> String {
    amount.map_or_else(|| "N/A".to_string(), format_coins)
}
