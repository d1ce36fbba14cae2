pub mod config;
pub mod init;

pub use config::{LogFormat, LoggingConfig};
pub use init::{build_filter, init_logging, LoggingError};
