pub mod config;
pub mod types;

pub use config::PackConfig;
pub use types::*;
