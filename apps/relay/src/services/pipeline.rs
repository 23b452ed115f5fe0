// [apps/relay/src/services/pipeline.rs]
/*!
 * =================================================================
 * APARATO: INGEST PIPELINE
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: XML TATTILE -> LEDGER, RUTA ÚNICA DE PERSISTENCIA
 *
 * Tanto la ingesta TCP (C6) como la segunda etapa del procesador (C5)
 * convergen aquí: parseo del XML, lectura normalizada y persistencia
 * transaccional con encolado PENDING. El rollback del repositorio
 * garantiza que un fallo no deje estado parcial.
 * =================================================================
 */

use centinela_domain_normalizer::{parse_tattile_xml, NormalizeError};
use centinela_infra_db::DbError;
use thiserror::Error;
use tracing::{error, warn};

use crate::state::AppState;

#[derive(Error, Debug)]
pub enum PipelineFault {
    /// XML malformado o campos obligatorios ausentes: payload descartado.
    #[error("PARSE: {0}")]
    Parse(#[from] NormalizeError),

    /// device_sn sin cámara registrada: descarte sin persistencia.
    #[error("UNKNOWN_CAMERA: {0}")]
    UnknownCamera(String),

    /// Fallo de persistencia genuino: el payload se pierde con rastro.
    #[error("LEDGER: {0}")]
    Ledger(DbError),
}

/// Parsea y persiste una lectura Tattile. Devuelve (reading_id, queue_id).
pub async fn persist_tattile_xml(
    application_state: &AppState,
    xml_str: &str,
) -> Result<(i64, i64), PipelineFault> {
    let normalized = parse_tattile_xml(xml_str)?;

    match application_state.readings().save_reading(&normalized).await {
        Ok(identifiers) => Ok(identifiers),
        Err(DbError::UnknownCamera(device_sn)) => {
            warn!("⚠️ [INGEST]: Lectura descartada por cámara desconocida: {}", device_sn);
            Err(PipelineFault::UnknownCamera(device_sn))
        }
        Err(database_fault) => {
            error!("❌ [INGEST]: Error guardando lectura: {}", database_fault);
            Err(PipelineFault::Ledger(database_fault))
        }
    }
}
