use crate::config::alert_thresholds::{BID_MAX_SECONDS_REMAINING, BID_RATIO, PRICE_CRASH_RATIO};
use crate::types::{Price, PriceRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    /// Current BIN has fallen well below the average BIN.
    PriceCrash,
    /// A cheap bid is about to close.
    BidOpportunity,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertKind::PriceCrash => write!(f, "price_crash"),
            AlertKind::BidOpportunity => write!(f, "bid_opportunity"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Alert {
    pub kind: AlertKind,
    /// Percentage below the reference price (average BIN for crashes, BIN for bids).
    pub discount_pct: f64,
}

/// Fires when the current BIN is at or below 75% of the average BIN.
pub fn check_price_crash(r: &PriceRecord) -> Option<Alert> {
    let Price::Coins(price) = r.current_price else {
        return None;
    };
    let average = r.average_bin.filter(|a| *a > 0)?;

    let (price, average) = (price as f64, average as f64);
    if price > average * PRICE_CRASH_RATIO {
        return None;
    }
    Some(Alert {
        kind: AlertKind::PriceCrash,
        discount_pct: (average - price) / average * 100.0,
    })
}

/// Fires when the lowest bid is at most half the BIN, closes within two minutes,
/// and has not closed yet. Bids without an end date never qualify.
pub fn check_bid_opportunity(r: &PriceRecord) -> Option<Alert> {
    let Price::Coins(price) = r.current_price else {
        return None;
    };
    if price == 0 {
        return None;
    }
    let bid = r.lowest_bid.as_ref()?;
    let expiry = bid.expiry.as_ref()?;

    let (price, amount) = (price as f64, bid.amount as f64);
    let cheap = amount <= price * BID_RATIO;
    let closing = expiry.seconds_remaining < BID_MAX_SECONDS_REMAINING;
    if !(cheap && closing && !expiry.is_expired()) {
        return None;
    }
    Some(Alert {
        kind: AlertKind::BidOpportunity,
        discount_pct: (price - amount) / price * 100.0,
    })
}

/// Run both checks independently; either, both or none may fire.
pub fn evaluate(r: &PriceRecord) -> Vec<Alert> {
    [check_price_crash(r), check_bid_opportunity(r)]
        .into_iter()
        .flatten()
        .collect()
}
