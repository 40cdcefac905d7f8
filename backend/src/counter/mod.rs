pub mod engine;
pub mod progress;
pub mod tick;

pub use engine::CounterEngine;
