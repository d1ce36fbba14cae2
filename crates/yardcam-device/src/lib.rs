pub mod db;
pub mod delivery;
pub mod error;
pub mod incident;
pub mod key;
pub mod memory;
pub mod model;
pub mod queue;
pub mod registry;
pub mod retry;
pub mod store;

pub use db::{command, device, incident as incident_entity, SeaOrmStore};
pub use delivery::{ClearReport, CommandDelivery};
pub use error::{DeviceError, Result};
pub use incident::IncidentLog;
pub use key::{GroupDefaults, GroupKey, GroupKind};
pub use memory::MemoryStore;
pub use model::{
    Command, CommandId, CommandParams, CommandRequest, CommandStatus, Device, DeviceId, Incident,
};
pub use queue::CommandQueue;
pub use registry::DeviceRegistry;
pub use retry::{RetryPolicy, RetryingStore};
pub use store::{CommandStore, DeviceStore, IncidentStore};
