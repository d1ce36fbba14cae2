pub mod global;
pub mod loader;

pub use global::{DatabaseConfig, SystemConfig, YardcamConfig};
pub use loader::ConfigLoader;
