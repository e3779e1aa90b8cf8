pub mod core;
pub mod utils;

// Re-export everything from core for ergonomic library use
// Users can write `vhosts::pipeline` instead of `vhosts::core::pipeline`
pub use core::*;
pub use utils::*;
