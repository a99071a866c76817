use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{AppError, Result};

pub const PRICE_API_URL: &str = "https://www.fut.gg/api/fut/player-prices";
pub const GAME_VERSION: u32 = 26;

/// Sent with every price lookup; the upstream rejects requests without a matching referer.
pub const ACCEPT_HEADER: &str = "application/json, text/plain, */*";
pub const REFERER_HEADER: &str = "https://www.fut.gg/";

/// Pause between two full passes over the watchlist (seconds).
pub const POLL_INTERVAL_SECS: u64 = 100;

/// Pause between two item lookups inside a pass (seconds).
pub const REQUEST_DELAY_SECS: u64 = 1;

pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Alert trigger levels. Ratios are relative to the reference price of each check.
pub mod alert_thresholds {
    /// Current BIN at or below this share of the average BIN is a crash (25%+ off).
    pub const PRICE_CRASH_RATIO: f64 = 0.75;
    /// Lowest bid at or below this share of the current BIN is a bid opportunity.
    pub const BID_RATIO: f64 = 0.5;
    /// Bid opportunities are only reported in the last moments of an auction.
    pub const BID_MAX_SECONDS_REMAINING: f64 = 120.0;
}

/// How snapshot files are opened at the end of each group pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Overwrite,
    Append,
}

impl WriteMode {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "overwrite" | "w" => Ok(WriteMode::Overwrite),
            "append" | "a" => Ok(WriteMode::Append),
            other => Err(AppError::Config(format!(
                "CSV_MODE must be 'overwrite' or 'append', got '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for WriteMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteMode::Overwrite => write!(f, "overwrite"),
            WriteMode::Append => write!(f, "append"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub price_api_url: String,
    pub game_version: u32,
    /// Discord-compatible webhook. Alerts are only logged when unset (WEBHOOK_URL).
    pub webhook_url: Option<String>,
    pub log_level: String,
    pub poll_interval: Duration,
    pub request_delay: Duration,
    pub request_timeout: Duration,
    pub write_mode: WriteMode,
    /// Directory the per-group CSV files are written to (OUTPUT_DIR).
    pub output_dir: PathBuf,
    /// Optional TOML watchlist replacing the built-in groups (WATCHLIST_PATH).
    pub watchlist_path: Option<PathBuf>,
    /// Exit after a single pass instead of looping (RUN_ONCE).
    pub run_once: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key/value source; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let webhook_url = lookup("WEBHOOK_URL")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(Self {
            price_api_url: lookup("PRICE_API_URL")
                .unwrap_or_else(|| PRICE_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            game_version: parse_var(&lookup, "GAME_VERSION", GAME_VERSION)?,
            webhook_url,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            poll_interval: Duration::from_secs(parse_var(
                &lookup,
                "POLL_INTERVAL_SECS",
                POLL_INTERVAL_SECS,
            )?),
            request_delay: Duration::from_secs(parse_var(
                &lookup,
                "REQUEST_DELAY_SECS",
                REQUEST_DELAY_SECS,
            )?),
            request_timeout: Duration::from_secs(parse_var(
                &lookup,
                "REQUEST_TIMEOUT_SECS",
                REQUEST_TIMEOUT_SECS,
            )?),
            write_mode: match lookup("CSV_MODE") {
                Some(s) => WriteMode::parse(&s)?,
                None => WriteMode::Overwrite,
            },
            output_dir: lookup("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            watchlist_path: lookup("WATCHLIST_PATH")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            run_once: lookup("RUN_ONCE").is_some_and(|s| is_truthy(&s)),
        })
    }

    /// Load the configured watchlist file, or the built-in groups when none is set.
    pub fn watchlist(&self) -> Result<Watchlist> {
        match &self.watchlist_path {
            Some(path) => Watchlist::load(path),
            None => Ok(Watchlist::builtin()),
        }
    }

    pub fn output_path(&self, group: &ItemGroup) -> PathBuf {
        self.output_dir.join(&group.output)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("{key} must be a valid number, got '{raw}'"))),
        None => Ok(default),
    }
}

fn is_truthy(s: &str) -> bool {
    matches!(s.trim().to_lowercase().as_str(), "1" | "true" | "yes")
}

// ---------------------------------------------------------------------------
// Watchlist
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TrackedItem {
    pub name: String,
    pub id: u64,
}

/// A named subset of the watchlist, persisted to its own snapshot file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ItemGroup {
    pub name: String,
    /// File name relative to OUTPUT_DIR.
    pub output: String,
    pub items: Vec<TrackedItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Watchlist {
    pub groups: Vec<ItemGroup>,
}

impl Watchlist {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let watchlist: Self = toml::from_str(contents)?;
        watchlist.validate()?;
        Ok(watchlist)
    }

    fn validate(&self) -> Result<()> {
        if self.groups.is_empty() {
            return Err(AppError::Config("watchlist has no groups".to_string()));
        }
        for group in &self.groups {
            if group.items.is_empty() {
                return Err(AppError::Config(format!(
                    "watchlist group '{}' has no items",
                    group.name
                )));
            }
            if group.output.trim().is_empty() {
                return Err(AppError::Config(format!(
                    "watchlist group '{}' has no output file",
                    group.name
                )));
            }
        }
        Ok(())
    }

    pub fn item_count(&self) -> usize {
        self.groups.iter().map(|g| g.items.len()).sum()
    }

    pub fn builtin() -> Self {
        Self {
            groups: vec![
                group(
                    "gold",
                    "gold_spieler_preise.csv",
                    &[
                        ("Kylian Mbappe", 231747),
                        ("Ousmane Dembele", 231443),
                        ("Graham Hansen", 227102),
                        ("Erling Haaland", 239085),
                        ("Alexia Putellas", 227203),
                        ("Jamal Musiala", 256790),
                        ("Mohammed Salah", 209331),
                        ("Aitana Bonmati", 241667),
                        ("Jude Bellingham", 252371),
                        ("Virgil van Dijk", 203376),
                        ("Lamine Yamal", 277643),
                        ("Achraf Hakimi", 235212),
                        ("Micky Van De Ven", 264453),
                        ("Tijjani Reijnders", 240638),
                        ("Viktor Gyoekeres", 241651),
                        ("Alexander Isak", 50565379),
                    ],
                ),
                group(
                    "icons",
                    "icons_preise.csv",
                    &[
                        ("R9", 37576),
                        ("Eusebio", 242519),
                        ("Pele", 237067),
                        ("Garrincha", 247553),
                        ("Ronaldinho", 28130),
                        ("Patrick Vieira", 238427),
                        ("Paolo Maldini", 238439),
                        ("Sir Bobby Charlton", 230025),
                        ("Zinedine Zidane", 1397),
                        ("Mia Hamm", 275243),
                        ("Johann Cruyff", 190045),
                        ("Thierry Henry", 1625),
                        ("Marcel Desailly", 1116),
                        ("Kenny Dalglish", 247699),
                        ("Ruud Gullit", 214100),
                        ("Oliver Kahn", 488),
                    ],
                ),
                group(
                    "heroes",
                    "heroes_preise.csv",
                    &[
                        ("David Ginola", 191972),
                        ("Yaya Toure", 20289),
                        ("Lucio", 266690),
                        ("Ramires", 184943),
                        ("Eden Hazard", 183277),
                        ("Jaap Stam", 5740),
                        ("Rudi Voeller", 166676),
                        ("Abedi Pele", 167425),
                        ("David Capdevila", 25924),
                        ("Harry Kewell", 266801),
                        ("Wesley Sneijder", 274750),
                        ("Ivan Cordoba", 16619),
                    ],
                ),
            ],
        }
    }
}

fn group(name: &str, output: &str, items: &[(&str, u64)]) -> ItemGroup {
    ItemGroup {
        name: name.to_string(),
        output: output.to_string(),
        items: items
            .iter()
            .map(|(name, id)| TrackedItem { name: name.to_string(), id: *id })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = Config::from_lookup(vars(&[])).unwrap();
        assert_eq!(cfg.price_api_url, PRICE_API_URL);
        assert_eq!(cfg.game_version, GAME_VERSION);
        assert_eq!(cfg.webhook_url, None);
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.poll_interval, Duration::from_secs(POLL_INTERVAL_SECS));
        assert_eq!(cfg.request_delay, Duration::from_secs(REQUEST_DELAY_SECS));
        assert_eq!(cfg.request_timeout, Duration::from_secs(REQUEST_TIMEOUT_SECS));
        assert_eq!(cfg.write_mode, WriteMode::Overwrite);
        assert_eq!(cfg.output_dir, PathBuf::from("."));
        assert!(cfg.watchlist_path.is_none());
        assert!(!cfg.run_once);
    }

    #[test]
    fn values_are_read_from_lookup() {
        let cfg = Config::from_lookup(vars(&[
            ("PRICE_API_URL", "http://localhost:9000/prices/"),
            ("GAME_VERSION", " 25 "),
            ("WEBHOOK_URL", "  "),
            ("POLL_INTERVAL_SECS", "30"),
            ("REQUEST_DELAY_SECS", "0"),
            ("CSV_MODE", "append"),
            ("OUTPUT_DIR", "/tmp/fut"),
            ("WATCHLIST_PATH", "watchlist.toml"),
        ]))
        .unwrap();
        assert_eq!(cfg.price_api_url, "http://localhost:9000/prices");
        assert_eq!(cfg.game_version, 25);
        assert_eq!(cfg.webhook_url, None);
        assert_eq!(cfg.poll_interval, Duration::from_secs(30));
        assert_eq!(cfg.request_delay, Duration::ZERO);
        assert_eq!(cfg.write_mode, WriteMode::Append);
        assert_eq!(cfg.output_dir, PathBuf::from("/tmp/fut"));
        assert_eq!(cfg.watchlist_path, Some(PathBuf::from("watchlist.toml")));
    }

    #[test]
    fn non_numeric_values_are_config_errors() {
        let keys = [
            "GAME_VERSION",
            "POLL_INTERVAL_SECS",
            "REQUEST_DELAY_SECS",
            "REQUEST_TIMEOUT_SECS",
        ];
        for key in keys {
            match Config::from_lookup(vars(&[(key, "soon")])) {
                Err(AppError::Config(msg)) => assert!(msg.contains(key), "msg={msg}"),
                other => panic!("{key}: expected config error, got {other:?}"),
            }
        }
        assert!(matches!(
            Config::from_lookup(vars(&[("POLL_INTERVAL_SECS", "-5")])),
            Err(AppError::Config(_))
        ));
        assert!(matches!(
            Config::from_lookup(vars(&[("CSV_MODE", "bogus")])),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn parse_var_falls_back_to_default() {
        let lookup = vars(&[("SET", "7")]);
        assert_eq!(parse_var(&lookup, "UNSET", 42u64).unwrap(), 42);
        assert_eq!(parse_var(&lookup, "SET", 42u64).unwrap(), 7);
    }

    #[test]
    fn run_once_truthy_values() {
        for raw in ["1", "true", "TRUE", " yes "] {
            let cfg = Config::from_lookup(vars(&[("RUN_ONCE", raw)])).unwrap();
            assert!(cfg.run_once, "RUN_ONCE={raw:?}");
        }
        for raw in ["0", "false", "no", ""] {
            let cfg = Config::from_lookup(vars(&[("RUN_ONCE", raw)])).unwrap();
            assert!(!cfg.run_once, "RUN_ONCE={raw:?}");
        }
    }

    #[test]
    fn builtin_watchlist_has_three_groups() {
        let wl = Watchlist::builtin();
        let names: Vec<_> = wl.groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, ["gold", "icons", "heroes"]);
        assert_eq!(wl.item_count(), 44);
        assert!(wl.validate().is_ok());
    }

    #[test]
    fn parses_watchlist_toml_preserving_order() {
        let raw = r#"
            [[groups]]
            name = "mine"
            output = "mine.csv"
            items = [
                { name = "Zinedine Zidane", id = 1397 },
                { name = "Oliver Kahn", id = 488 },
            ]
        "#;
        let wl = Watchlist::from_toml(raw).unwrap();
        assert_eq!(wl.groups.len(), 1);
        assert_eq!(wl.groups[0].items[0].name, "Zinedine Zidane");
        assert_eq!(wl.groups[0].items[1].id, 488);
    }

    #[test]
    fn empty_group_is_rejected() {
        let raw = r#"
            [[groups]]
            name = "empty"
            output = "empty.csv"
            items = []
        "#;
        match Watchlist::from_toml(raw) {
            Err(AppError::Config(msg)) => assert!(msg.contains("empty"), "msg={msg}"),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn watchlist_without_groups_is_rejected() {
        assert!(matches!(
            Watchlist::from_toml("groups = []"),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn write_mode_parsing() {
        assert_eq!(WriteMode::parse("append").unwrap(), WriteMode::Append);
        assert_eq!(WriteMode::parse(" Overwrite ").unwrap(), WriteMode::Overwrite);
        assert_eq!(WriteMode::parse("a").unwrap(), WriteMode::Append);
        assert!(WriteMode::parse("truncate").is_err());
    }
}
