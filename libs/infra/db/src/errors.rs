// [libs/infra/db/src/errors.rs]
/*!
 * =================================================================
 * APARATO: LEDGER ERROR CATALOG
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: CATALOGACIÓN SEMÁNTICA DE FALLOS DE PERSISTENCIA
 * =================================================================
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    /// Error de enlace físico con el motor libSQL.
    #[error("[L3_DB_NET_FAULT]: DATABASE_UPLINK_SEVERED -> {0}")]
    ConnectionError(String),

    /// Fallo en la configuración del entorno (variables vacías o malformadas).
    #[error("[L3_DB_CONFIG_FAULT]: STRATEGIC_ENV_VOID -> {0}")]
    ConfigurationError(String),

    /// Error de sintaxis o ejecución devuelto por el motor libSQL.
    #[error("[L3_DB_QUERY_FAULT]: SQL_QUERY_REJECTED -> {0}")]
    QueryError(#[from] libsql::Error),

    /// Fallo en la transformación de tipos entre SQLite y el dominio Rust.
    #[error("[L3_DB_MAPPING_FAULT]: DATA_MAPPING_VIOLATION -> {0}")]
    MappingError(String),

    // --- ESTRATO DE INGESTA ---

    /// El device_sn de la lectura no corresponde a ninguna cámara
    /// registrada. La ingesta descarta el payload sin persistir nada.
    #[error("[L3_INGEST_FAULT]: UNKNOWN_CAMERA -> {0}")]
    UnknownCamera(String),

    // --- ESTRATO DE COLA ---

    /// El mensaje referenciado ya no existe en la cola.
    #[error("[L3_QUEUE_FAULT]: QUEUE_ROW_NOT_FOUND -> {0}")]
    QueueRowNotFound(i64),
}
