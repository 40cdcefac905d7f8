pub mod pool;
pub mod registry;
