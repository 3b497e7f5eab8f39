//! Data models and structures for the probe harness

pub mod config;
pub mod metrics;

// Re-export main model types
pub use config::HarnessConfig;
pub use metrics::{LatencyReport, LatencyStats, MemoryReport, Sample};
