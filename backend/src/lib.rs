pub mod config;
pub mod counter;
pub mod db;
pub mod metrics;
pub mod scheduler;
pub mod task;

pub mod error;
pub mod logger;
