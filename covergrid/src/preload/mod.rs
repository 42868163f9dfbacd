//! Preload system: speculative, priority-ordered background computation of
//! coverage grids before they are requested.

mod queue;
mod seeds;
mod task;
mod worker;

pub use queue::PreloadQueue;
pub use seeds::{seed_combinations, SeedCombination};
pub use task::{score_priority, PreloadTask};
pub use worker::{PreloadWorker, WorkerConfig};
