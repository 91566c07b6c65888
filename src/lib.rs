//! Library crate for lan-server-scan: subnet enumeration, bounded-concurrency
//! TCP probing, and the coordinator that drives a scan.
pub mod config;
pub mod error;
pub mod netdetect;
pub mod pool;
pub mod probe;
pub mod progress;
pub mod range;
pub mod results;
pub mod scanner;
pub mod server;
pub mod types;
pub mod updates;

pub use error::ScanError;
pub use scanner::{ScanCoordinator, StartOutcome};
