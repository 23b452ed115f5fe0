// [libs/domain/normalizer/src/errors.rs]
//! Catálogo semántico de fallos de normalización. Un payload que no
//! supere esta capa se descarta y se registra: nunca se reintenta.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NormalizeError {
    /// El documento no es XML/JSON bien formado.
    #[error("[L2_NORM_FAULT]: PAYLOAD_UNPARSEABLE -> {0}")]
    Parse(String),

    /// Falta un campo obligatorio del contrato de cable.
    #[error("[L2_NORM_FAULT]: REQUIRED_FIELD_VOID -> {0}")]
    MissingField(&'static str),

    /// Fecha u hora presentes pero fuera del formato del fabricante.
    #[error("[L2_NORM_FAULT]: TIMESTAMP_MALFORMED -> {0}")]
    Timestamp(String),
}
