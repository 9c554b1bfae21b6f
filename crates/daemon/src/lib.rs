// Re-export modules for library use
pub mod bridge;
pub mod config;
pub mod monitor;
