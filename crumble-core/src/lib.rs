pub mod cache;
pub mod config;
pub mod deep_links;
pub mod error;
pub mod logging;
pub mod progress;
pub mod resilience;
pub mod service;
pub mod source;
pub mod subtitles;

pub use config::Config;
pub use error::{Error, Result};
