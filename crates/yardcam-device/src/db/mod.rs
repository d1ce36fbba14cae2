pub mod converter;
pub mod entity;
pub mod schema;
pub mod store;

pub use entity::{command, device, incident};
pub use schema::setup_schema;
pub use store::SeaOrmStore;
