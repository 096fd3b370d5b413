pub mod config;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod sheets;
