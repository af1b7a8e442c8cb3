pub mod config;
pub mod observability;
pub mod types;
