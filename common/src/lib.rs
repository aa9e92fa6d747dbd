pub mod config;
pub mod dispenser;
pub mod identity;
pub mod plan;
pub mod topics;

pub use config::{DispenserConfig, NetworkConfig, RuntimeConfig};
pub use dispenser::{DispenserEngine, EngineAction};
pub use identity::client_id_from_mac;
pub use plan::{DispensePlan, PlanError, PlanItem};
pub use topics::*;
