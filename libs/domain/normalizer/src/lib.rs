// [libs/domain/normalizer/src/lib.rs]
/*!
 * =================================================================
 * APARATO: NORMALIZER ROOT (C7)
 * CLASIFICACIÓN: DOMAIN LAYER (ESTRATO L2)
 * RESPONSABILIDAD: CONVERGENCIA DE FORMATOS DE CABLE A LECTURA CANÓNICA
 *
 * Dos formatos de entrada convergen en `NormalizedReading`:
 * 1. XML Tattile (TCP crudo) -> lectura canónica, directo.
 * 2. JSON Lector Vision (HTTP) -> XML Tattile -> lectura canónica.
 * La segunda ruta pasa por el XML intermedio a propósito: así ambos
 * fabricantes atraviesan exactamente el mismo parser y las mismas
 * validaciones de campos obligatorios.
 * =================================================================
 */

pub mod errors;
pub mod lectorvision;
pub mod tattile;
pub mod xmlutil;

pub use errors::NormalizeError;
pub use lectorvision::{build_tattile_xml_from_lectorvision, parse_lectorvision_timestamp, LectorVisionMeta};
pub use tattile::parse_tattile_xml;
