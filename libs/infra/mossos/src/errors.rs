// [libs/infra/mossos/src/errors.rs]
//! Fallos del canal hacia Mossos. El sender decide transiciones de la
//! cola a partir de `SendOutcome`; estos errores alimentan su campo
//! de razón, nunca gobiernan el estado directamente.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MossosError {
    /// Material PEM ausente, ilegible o sin pareja clave/certificado.
    #[error("[L3_MOSSOS_FAULT]: CERTIFICATE_MATERIAL_REJECTED -> {0}")]
    Certificate(String),

    /// Fallo construyendo o firmando el envelope SOAP.
    #[error("[L3_MOSSOS_FAULT]: ENVELOPE_ASSEMBLY_FAULT -> {0}")]
    Envelope(String),

    /// Fallo de transporte previo a obtener una respuesta HTTP.
    #[error("[L3_MOSSOS_FAULT]: TRANSPORT_FAULT -> {0}")]
    Transport(String),
}

impl From<openssl::error::ErrorStack> for MossosError {
    fn from(crypto_fault: openssl::error::ErrorStack) -> Self {
        MossosError::Certificate(crypto_fault.to_string())
    }
}
