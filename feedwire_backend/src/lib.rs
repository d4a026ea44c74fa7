pub mod api;
pub mod bootstrap;
pub mod config;
pub mod database;
pub mod error;
pub mod feed;
pub mod node;
pub mod telemetry;
pub mod utils;
