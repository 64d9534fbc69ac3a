pub mod amount;
pub mod discount;
pub mod engine;
pub mod http;
pub mod mask;
pub mod model;
pub mod registry;
pub mod signature;
pub mod timestamp;
pub mod validate;

pub use amount::Amount;
pub use engine::{Engine, EngineConfig, IntakeError};
pub use model::{ItemLine, PartnerRecord, TransactionOutcome, TransactionRequest};
pub use registry::{PartnerRegistry, StaticRegistry};
