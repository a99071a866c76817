use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use fut_price_tracker::config::Config;
use fut_price_tracker::error::Result;
use fut_price_tracker::tracker::PriceTracker;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();

    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    let watchlist = cfg.watchlist()?;
    info!(
        "Tracking {} items in {} groups (api={}, version={}, mode={}, interval={}s)",
        watchlist.item_count(),
        watchlist.groups.len(),
        cfg.price_api_url,
        cfg.game_version,
        cfg.write_mode,
        cfg.poll_interval.as_secs(),
    );

    if cfg.webhook_url.is_none() {
        warn!("WEBHOOK_URL not set, alerts will only be logged");
    }

    let tracker = PriceTracker::new(cfg, watchlist)?;
    tracker.run().await;
    Ok(())
}
