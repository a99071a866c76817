use std::path::PathBuf;

use fut_price_tracker::alerts::{check_bid_opportunity, check_price_crash};
use fut_price_tracker::config::{Config, Watchlist};
use fut_price_tracker::storage::read_snapshot;
use fut_price_tracker::types::{format_coins, BidExpiry, Price, PriceRecord};

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum LoadStatus {
    Loaded,
    Error(String),
    NotLoaded,
}

/// One watchlist group and the records last read from its snapshot file.
#[derive(Debug, Clone)]
pub struct GroupView {
    pub name: String,
    pub path: PathBuf,
    pub status: LoadStatus,
    pub records: Vec<PriceRecord>,
}

/// Display flags for one recorded row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowFlags {
    pub crash: bool,
    pub bid: bool,
}

pub fn row_flags(r: &PriceRecord) -> RowFlags {
    RowFlags {
        crash: check_price_crash(r).is_some(),
        bid: check_bid_opportunity(r).is_some(),
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub groups: Vec<GroupView>,
    pub selected: usize,
    pub last_refresh: std::time::Instant,
}

impl AppState {
    pub fn new(cfg: &Config, watchlist: &Watchlist) -> Self {
        let groups = watchlist
            .groups
            .iter()
            .map(|g| GroupView {
                name: g.name.clone(),
                path: cfg.output_path(g),
                status: LoadStatus::NotLoaded,
                records: Vec::new(),
            })
            .collect();
        Self {
            groups,
            selected: 0,
            last_refresh: std::time::Instant::now(),
        }
    }

    /// Re-read every snapshot file. A failing file keeps its previous rows.
    pub fn refresh(&mut self) {
        for group in &mut self.groups {
            match read_snapshot(&group.path) {
                Ok(records) => {
                    group.records = records;
                    group.status = LoadStatus::Loaded;
                }
                Err(e) => group.status = LoadStatus::Error(e.to_string()),
            }
        }
        self.last_refresh = std::time::Instant::now();
    }

    pub fn current(&self) -> Option<&GroupView> {
        self.groups.get(self.selected)
    }

    pub fn next_group(&mut self) {
        if !self.groups.is_empty() {
            self.selected = (self.selected + 1) % self.groups.len();
        }
    }

    pub fn prev_group(&mut self) {
        if !self.groups.is_empty() {
            self.selected = (self.selected + self.groups.len() - 1) % self.groups.len();
        }
    }

    pub fn flagged_count(&self) -> usize {
        self.groups
            .iter()
            .flat_map(|g| g.records.iter())
            .filter(|r| {
                let f = row_flags(r);
                f.crash || f.bid
            })
            .count()
    }
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

pub fn format_price(p: Option<Price>) -> String {
    match p {
        Some(Price::Coins(c)) => format_coins(c),
        Some(Price::Extinct) => "EXTINCT".to_string(),
        None => "—".to_string(),
    }
}

pub fn format_amount(c: Option<u64>) -> String {
    c.map_or_else(|| "—".to_string(), format_coins)
}

pub fn format_expiry(r: &PriceRecord) -> String {
    r.bid_expiry().map_or_else(|| "—".to_string(), BidExpiry::countdown)
}

pub fn format_flags(f: RowFlags) -> &'static str {
    match (f.crash, f.bid) {
        (true, true) => "CRASH+BID",
        (true, false) => "CRASH",
        (false, true) => "BID",
        (false, false) => "",
    }
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}…")
    }
}
