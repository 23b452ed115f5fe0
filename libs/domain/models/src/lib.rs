// [libs/domain/models/src/lib.rs]
/*!
 * =================================================================
 * APARATO: DOMAIN MODELS ROOT
 * CLASIFICACIÓN: DOMAIN LAYER (ESTRATO L2)
 * RESPONSABILIDAD: AUTORIDAD ÚNICA DE TIPOS DEL RELÉ DE MATRÍCULAS
 *
 * Define las entidades que comparten la ingesta, el ledger y el
 * sender: flota (municipio / endpoint / certificado / cámara),
 * lectura canónica y cola de mensajes. Ninguna otra crate declara
 * estos tipos; el intercambio entre estratos ocurre por aquí.
 * =================================================================
 */

/// Entidades de flota y resolución de enrutado hacia Mossos.
pub mod fleet;
/// Máquina de estados de la cola de envío.
pub mod queue;
/// Lectura ALPR canónica y su forma normalizada pre-persistencia.
pub mod reading;

pub use fleet::{Camera, Certificate, Endpoint, Municipality, RoutingProfile};
pub use queue::{MessageStatus, QueueMessage};
pub use reading::{AlprReading, NormalizedReading};
