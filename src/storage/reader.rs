use std::path::Path;

use crate::error::Result;
use crate::storage::models::SnapshotRow;
use crate::types::PriceRecord;

/// Load every record of a snapshot file, in file order.
pub fn read_snapshot(path: &Path) -> Result<Vec<PriceRecord>> {
    let mut rdr = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for row in rdr.deserialize::<SnapshotRow>() {
        records.push(PriceRecord::try_from(row?)?);
    }
    Ok(records)
}
