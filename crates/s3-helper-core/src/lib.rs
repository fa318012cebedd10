pub mod bucket;
pub mod bundle;
pub mod config;
pub mod error;
pub mod output;
pub mod region;
pub mod s3;
pub mod storage;
pub mod utils;

pub use bucket::{EnsureOutcome, Outcome};
pub use config::Config;
pub use error::{Error, Result};
pub use output::{BufferSink, ConsoleSink, Gated, Sink};
pub use region::RegionId;
pub use storage::{ClientFactory, StorageBackend};

#[cfg(any(test, feature = "test-export-mocks"))]
pub use storage::MockStorageBackend;
