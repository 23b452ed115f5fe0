// [apps/relay/src/lib.rs]
/*!
 * =================================================================
 * APARATO: RELAY LIBRARY ROOT
 * CLASIFICACIÓN: CRATE ROOT (ESTRATO L1-APP)
 * RESPONSABILIDAD: DEFINICIÓN DEL ÁRBOL DE MÓDULOS DEL RELÉ
 *
 * Declarar los módulos aquí permite que la matriz de certificación
 * (tests/mirror) ejercite kernel, servicios y handlers con el mismo
 * grafo de visibilidad que el binario.
 * =================================================================
 */

// --- ESTRATO DE CONFIGURACIÓN Y ESTADO ---
/// Hidratación de ajustes desde el entorno.
pub mod config;
/// Contenedor de estado compartido entre tareas.
pub mod state;

// --- ESTRATO DE TRANSPORTE Y ACCIÓN ---
/// Adaptadores de entrada para ráfagas HTTP.
pub mod handlers;
/// Núcleo de mando: ignición y apagado cooperativo de servicios.
pub mod kernel;
/// Topología de rutas del API de borde.
pub mod routes;

// --- ESTRATO DE SERVICIOS DE FONDO ---
/// Daemons perpetuos: espejo, procesador, ingesta TCP, sender y janitors.
pub mod services;

pub mod prelude {
    pub use crate::config::Settings;
    pub use crate::kernel::RelayKernel;
    pub use crate::state::AppState;
}
