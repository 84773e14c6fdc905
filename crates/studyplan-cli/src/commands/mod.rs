pub mod config;
pub mod plan;
pub mod recur;
pub mod sync;
pub mod task;
