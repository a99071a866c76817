pub mod models;
pub mod reader;
pub mod writer;

pub use models::SnapshotRow;
pub use reader::read_snapshot;
pub use writer::SnapshotWriter;
