// [libs/infra/db/src/lib.rs]
/*!
 * =================================================================
 * APARATO: LEDGER INFRASTRUCTURE ROOT (C2)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: PERSISTENCIA TRANSACCIONAL DE LECTURAS Y COLA
 *
 * Única autoridad mutadora del estado durable. Cada tarea del relé
 * abre su propia conexión efímera a través de `LedgerClient`; las
 * secuencias multi-fila (ingesta, purga de éxito) viajan dentro de
 * transacciones.
 * =================================================================
 */

pub mod client;
pub mod errors;
pub mod repositories;
pub mod rowmap;
pub mod schema;

pub use client::LedgerClient;
pub use errors::DbError;
