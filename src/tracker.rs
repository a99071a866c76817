use chrono::Local;
use tracing::{error, info};

use crate::alerts::{evaluate, WebhookNotifier};
use crate::config::{Config, ItemGroup, Watchlist};
use crate::error::Result;
use crate::fetcher::PriceFetcher;
use crate::storage::SnapshotWriter;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleStats {
    pub fetched: usize,
    pub failed: usize,
    pub alerts: usize,
    pub files_written: usize,
}

impl CycleStats {
    fn absorb(&mut self, other: CycleStats) {
        self.fetched += other.fetched;
        self.failed += other.failed;
        self.alerts += other.alerts;
        self.files_written += other.files_written;
    }
}

/// Drives the poll loop: fetch each group, persist it, evaluate every record.
pub struct PriceTracker {
    cfg: Config,
    watchlist: Watchlist,
    fetcher: PriceFetcher,
    writer: SnapshotWriter,
    notifier: WebhookNotifier,
}

impl PriceTracker {
    pub fn new(cfg: Config, watchlist: Watchlist) -> Result<Self> {
        let fetcher = PriceFetcher::from_config(&cfg)?;
        let writer = SnapshotWriter::new(cfg.write_mode);
        let notifier = WebhookNotifier::new(cfg.webhook_url.clone(), cfg.request_timeout)?;
        Ok(Self { cfg, watchlist, fetcher, writer, notifier })
    }

    pub async fn run(self) {
        loop {
            let stats = self.run_cycle().await;
            info!(
                event = "CYCLE_DONE",
                fetched = stats.fetched,
                failed = stats.failed,
                alerts = stats.alerts,
                "Pass complete: {} fetched, {} failed, {} alerts",
                stats.fetched,
                stats.failed,
                stats.alerts,
            );

            if self.cfg.run_once {
                break;
            }

            let wait = chrono::Duration::from_std(self.cfg.poll_interval)
                .unwrap_or(chrono::Duration::zero());
            let next_run = Local::now() + wait;
            info!("Next pass at {}", next_run.format("%H:%M:%S"));
            tokio::time::sleep(self.cfg.poll_interval).await;
        }
    }

    /// One full pass over the watchlist.
    pub async fn run_cycle(&self) -> CycleStats {
        let mut stats = CycleStats::default();
        for group in &self.watchlist.groups {
            stats.absorb(self.process_group(group).await);
        }
        stats
    }

    async fn process_group(&self, group: &ItemGroup) -> CycleStats {
        let records = self.fetcher.fetch_group(group, self.cfg.request_delay).await;
        let mut stats = CycleStats {
            fetched: records.len(),
            failed: group.items.len() - records.len(),
            ..CycleStats::default()
        };

        let path = self.cfg.output_path(group);
        match self.writer.write(&records, &path) {
            Ok(Some(_)) => stats.files_written += 1,
            Ok(None) => {}
            Err(e) => error!(group = %group.name, "Failed to write {}: {e}", path.display()),
        }

        for record in &records {
            for alert in evaluate(record) {
                info!(
                    event = "ALERT",
                    kind = %alert.kind,
                    item_id = record.item_id,
                    discount_pct = alert.discount_pct,
                    "{} alert for {} ({:.1}% below reference)",
                    alert.kind,
                    record.name,
                    alert.discount_pct,
                );
                self.notifier.notify(&alert, record).await;
                stats.alerts += 1;
            }
        }

        stats
    }
}
