// [libs/infra/mossos/src/lib.rs]
/*!
 * =================================================================
 * APARATO: MOSSOS INTEGRATION ROOT (C8/C9)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: CONTRATO EXTERNO NO NEGOCIABLE CON EL BACKEND
 *
 * WS-Security es el único contrato externo inamovible: exc-c14n,
 * rsa-sha1 y digest sha1 vienen impuestos por el servicio remoto;
 * sustituirlos rompe la verificación en el lado de Mossos y por eso
 * se tratan como constantes fijas. La verificación de respuestas está
 * deshabilitada: el servicio no firma sus respuestas.
 * =================================================================
 */

pub mod client;
pub mod envelope;
pub mod errors;
pub mod response;
pub mod wsse;

pub use client::{MossosClient, SendOutcome};
pub use envelope::MatriculaRequest;
pub use errors::MossosError;
pub use response::{classify_reply, parse_soap_reply, SoapReply};
pub use wsse::{SignedEnvelope, SigningMaterial};
