pub mod adapter;
pub mod aggregate;
pub mod cache;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod filter;
pub mod loader;
pub mod log_sanitize;
pub mod logging;
pub mod model;
pub mod render;
pub mod scheduler;
pub mod surface;
pub mod transport;
pub mod ui;
pub mod view;

pub use error::{Error, Result};
