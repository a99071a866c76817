use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use tracing::{info, warn};

use crate::config::WriteMode;
use crate::error::{AppError, Result};
use crate::storage::models::SnapshotRow;
use crate::types::PriceRecord;

/// Writes one group's records to its snapshot file at the end of a pass.
pub struct SnapshotWriter {
    mode: WriteMode,
}

impl SnapshotWriter {
    pub fn new(mode: WriteMode) -> Self {
        Self { mode }
    }

    /// Write `records` to `path`, falling back to a timestamped sibling file
    /// when `path` is not writable. Returns the file actually written, or
    /// None when there was nothing to write.
    pub fn write(&self, records: &[PriceRecord], path: &Path) -> Result<Option<PathBuf>> {
        self.write_or_fallback(records, path, Local::now().naive_local(), |p| {
            self.write_file(records, p)
        })
    }

    fn write_or_fallback<F>(
        &self,
        records: &[PriceRecord],
        path: &Path,
        now: NaiveDateTime,
        mut write_file: F,
    ) -> Result<Option<PathBuf>>
    where
        F: FnMut(&Path) -> Result<()>,
    {
        if records.is_empty() {
            warn!("No records to write to {}", path.display());
            return Ok(None);
        }

        match write_file(path) {
            Ok(()) => {
                self.log_written(records.len(), path);
                Ok(Some(path.to_path_buf()))
            }
            Err(AppError::Io(e)) if e.kind() == io::ErrorKind::PermissionDenied => {
                let alt = fallback_path(path, now);
                warn!(
                    "Permission denied writing {} (open elsewhere or read-only?), trying {}",
                    path.display(),
                    alt.display(),
                );
                write_file(&alt)?;
                self.log_written(records.len(), &alt);
                Ok(Some(alt))
            }
            Err(e) => Err(e),
        }
    }

    fn write_file(&self, records: &[PriceRecord], path: &Path) -> Result<()> {
        let needs_header = match self.mode {
            WriteMode::Overwrite => true,
            WriteMode::Append => std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true),
        };

        let mut opts = OpenOptions::new();
        opts.create(true);
        match self.mode {
            WriteMode::Overwrite => opts.write(true).truncate(true),
            WriteMode::Append => opts.append(true),
        };
        let file = opts.open(path)?;

        write_rows(file, records, needs_header)
    }

    fn log_written(&self, count: usize, path: &Path) {
        info!(
            event = "SNAPSHOT_WRITTEN",
            mode = %self.mode,
            "Wrote {count} records to {}",
            path.display(),
        );
    }
}

/// Serialize records as CSV rows, optionally preceded by the header line.
pub fn write_rows<W: Write>(out: W, records: &[PriceRecord], include_header: bool) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(include_header)
        .from_writer(out);
    for record in records {
        wtr.serialize(SnapshotRow::from(record))?;
    }
    wtr.flush()?;
    Ok(())
}

/// `dir/fut_prices_20251001_140000.csv` next to the requested path.
pub fn fallback_path(path: &Path, now: NaiveDateTime) -> PathBuf {
    let name = format!("fut_prices_{}.csv", now.format("%Y%m%d_%H%M%S"));
    match path.parent() {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::read_snapshot;
    use crate::types::{BidExpiry, LowestBid, Price};
    use chrono::{TimeZone, Utc};

    const HEADER: &str = "fetch_time,player_id,player_name,current_price,last_bin,average_bin,\
                          lowest_bid,lowest_bid_expires_in,lowest_bid_end_time,seconds_remaining,\
                          price_updated_at";

    fn fetched_at() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2025-10-01 14:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn live() -> PriceRecord {
        PriceRecord {
            item_id: 231747,
            name: "Kylian Mbappe".to_string(),
            current_price: Price::Coins(1_250_000),
            last_bin: Some(Price::Coins(1_240_000)),
            average_bin: Some(1_400_000),
            lowest_bid: Some(LowestBid {
                amount: 500_000,
                expiry: Some(BidExpiry {
                    ends_at: Utc.with_ymd_and_hms(2025, 10, 1, 12, 1, 30).unwrap(),
                    seconds_remaining: 90.0,
                }),
            }),
            price_updated_at: Some("2025-10-01T11:58:00Z".to_string()),
            fetched_at: fetched_at(),
        }
    }

    fn extinct() -> PriceRecord {
        PriceRecord {
            item_id: 1397,
            name: "Zinedine Zidane".to_string(),
            current_price: Price::Extinct,
            last_bin: Some(Price::Extinct),
            average_bin: None,
            lowest_bid: None,
            price_updated_at: None,
            fetched_at: fetched_at(),
        }
    }

    #[test]
    fn rows_follow_fixed_column_order() {
        let mut buf = Vec::new();
        write_rows(&mut buf, &[live(), extinct()], true).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], HEADER);
        assert_eq!(
            lines[1],
            "2025-10-01 14:00:00,231747,Kylian Mbappe,1250000,1240000,1400000,500000,1m 30s,\
             2025-10-01 12:01:30 UTC,90.0,2025-10-01T11:58:00Z"
        );
        assert_eq!(lines[2], "2025-10-01 14:00:00,1397,Zinedine Zidane,EXTINCT,EXTINCT,,,,,,");
    }

    #[test]
    fn header_can_be_omitted() {
        let mut buf = Vec::new();
        write_rows(&mut buf, &[extinct()], false).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with("2025-10-01 14:00:00,1397"));
    }

    #[test]
    fn overwrite_replaces_previous_pass() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gold.csv");
        let writer = SnapshotWriter::new(WriteMode::Overwrite);

        writer.write(&[live(), extinct()], &path).unwrap();
        let written = writer.write(&[extinct()], &path).unwrap();
        assert_eq!(written.as_deref(), Some(path.as_path()));

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert_eq!(text.lines().next().unwrap(), HEADER);
    }

    #[test]
    fn append_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("icons.csv");
        let writer = SnapshotWriter::new(WriteMode::Append);

        writer.write(&[live()], &path).unwrap();
        writer.write(&[extinct()], &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let headers = text.lines().filter(|l| *l == HEADER).count();
        assert_eq!(headers, 1);
        assert_eq!(text.lines().count(), 3);

        let records = read_snapshot(&path).unwrap();
        assert_eq!(records, vec![live(), extinct()]);
    }

    #[test]
    fn empty_pass_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("heroes.csv");
        let writer = SnapshotWriter::new(WriteMode::Overwrite);
        assert!(writer.write(&[], &path).unwrap().is_none());
        assert!(!path.exists());
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope").join("gold.csv");
        let writer = SnapshotWriter::new(WriteMode::Overwrite);
        assert!(matches!(writer.write(&[live()], &path), Err(AppError::Io(_))));
    }

    #[test]
    fn fallback_is_timestamped_sibling() {
        let alt = fallback_path(Path::new("out/gold.csv"), fetched_at());
        assert_eq!(alt, PathBuf::from("out/fut_prices_20251001_140000.csv"));
        let alt = fallback_path(Path::new("gold.csv"), fetched_at());
        assert_eq!(alt, PathBuf::from("fut_prices_20251001_140000.csv"));
    }

    fn denied() -> AppError {
        AppError::Io(io::Error::from(io::ErrorKind::PermissionDenied))
    }

    #[test]
    fn permission_denied_falls_back_to_sibling() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("gold.csv");
        let writer = SnapshotWriter::new(WriteMode::Append);
        let records = [live(), extinct()];

        let mut attempts = Vec::new();
        let written = writer
            .write_or_fallback(&records, &target, fetched_at(), |p| {
                attempts.push(p.to_path_buf());
                if p == target {
                    return Err(denied());
                }
                writer.write_file(&records, p)
            })
            .unwrap();

        let alt = dir.path().join("fut_prices_20251001_140000.csv");
        assert_eq!(written, Some(alt.clone()));
        assert_eq!(attempts, vec![target.clone(), alt.clone()]);
        assert!(!target.exists());

        let text = std::fs::read_to_string(&alt).unwrap();
        assert_eq!(text.lines().next().unwrap(), HEADER);
        assert_eq!(read_snapshot(&alt).unwrap(), records.to_vec());
    }

    #[test]
    fn failed_fallback_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("icons.csv");
        let writer = SnapshotWriter::new(WriteMode::Overwrite);

        let mut attempts = 0;
        let result = writer.write_or_fallback(&[live()], &target, fetched_at(), |_| {
            attempts += 1;
            Err(denied())
        });

        assert!(matches!(
            result,
            Err(AppError::Io(e)) if e.kind() == io::ErrorKind::PermissionDenied
        ));
        assert_eq!(attempts, 2);
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn other_io_errors_skip_the_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("heroes.csv");
        let writer = SnapshotWriter::new(WriteMode::Overwrite);

        let mut attempts = 0;
        let result = writer.write_or_fallback(&[live()], &target, fetched_at(), |_| {
            attempts += 1;
            Err(AppError::Io(io::Error::from(io::ErrorKind::NotFound)))
        });

        assert!(matches!(result, Err(AppError::Io(_))));
        assert_eq!(attempts, 1);
    }
}
