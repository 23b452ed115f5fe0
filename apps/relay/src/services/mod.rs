// [apps/relay/src/services/mod.rs]
/**
 * =================================================================
 * APARATO: SERVICE ORCHESTRATION HUB
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: EXPOSICIÓN NOMINAL DE DAEMONS DEL RELÉ
 * =================================================================
 */

pub mod fsutil;
pub mod janitor;
pub mod mirror;
pub mod pipeline;
pub mod processor;
pub mod sender;
pub mod transit;

// --- RE-EXPORTACIONES SOBERANAS (NOMINAL ACCESS) ---

pub use janitor::{DeadLetterJanitor, DirectoryJanitor};
pub use mirror::MirrorService;
pub use processor::FileProcessorService;
pub use sender::SenderService;
pub use transit::TransitIngestService;
