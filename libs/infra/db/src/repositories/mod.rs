// [libs/infra/db/src/repositories/mod.rs]
/**
 * =================================================================
 * APARATO: REPOSITORY REGISTRY
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: EXPOSICIÓN NOMINAL DE REPOSITORIOS DEL LEDGER
 * =================================================================
 */

pub mod metrics;
pub mod queue;
pub mod readings;
pub mod routing;

pub use metrics::{MetricsRepository, QueueCounters};
pub use queue::QueueRepository;
pub use readings::ReadingRepository;
pub use routing::{DispatchContext, RoutingRepository};
