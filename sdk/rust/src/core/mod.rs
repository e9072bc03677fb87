pub mod config;
pub mod constants;
pub mod error;
pub mod logging;

pub use config::{AdvancedOptions, ExportSettings};
pub use error::ConfigError;
pub use logging::init_logging;
