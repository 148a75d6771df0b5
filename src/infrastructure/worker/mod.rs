//! Worker Layer - Background Task Processing
//!
//! 实现 SoundIndexBuilder（分页重建目录）与 RebuildWorker（定期重建）

mod index_builder;
mod rebuild_worker;

pub use index_builder::{IndexBuilderConfig, RebuildSummary, SoundIndexBuilder};
pub use rebuild_worker::RebuildWorker;
