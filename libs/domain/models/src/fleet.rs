// [libs/domain/models/src/fleet.rs]
/*!
 * =================================================================
 * APARATO: FLEET ENTITIES
 * CLASIFICACIÓN: DOMAIN LAYER (ESTRATO L2)
 * RESPONSABILIDAD: MUNICIPIOS, ENDPOINTS, CERTIFICADOS Y CÁMARAS
 *
 * Modela la cadena de tenencia Municipio -> Certificado/Endpoint y la
 * sobre-escritura a nivel de cámara. La relación cíclica
 * Certificado <-> Municipio se modela con propiedad en una dirección
 * (municipality.certificate_id) más el índice inverso
 * (certificate.municipality_id) para consultas.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Valores por defecto del contrato de reintentos cuando el endpoint
/// no los define. Sincronizados con el sender.
pub const DEFAULT_RETRY_MAX: i64 = 3;
pub const DEFAULT_RETRY_BACKOFF_MS: i64 = 1000;
pub const DEFAULT_TIMEOUT_MS: i64 = 5000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Municipality {
    pub id: i64,
    pub name: String,
    pub code: Option<String>,
    pub endpoint_id: Option<i64>,
    pub certificate_id: Option<i64>,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub timeout_ms: i64,
    pub retry_max: i64,
    pub retry_backoff_ms: i64,
}

/// Material criptográfico PEM ya extraído del PFX de aprovisionamiento.
/// `client_cert_path` contiene el certificado cliente seguido opcionalmente
/// de la cadena CA; `key_path` la clave privada sin cifrar cuyo módulo debe
/// coincidir con el primer certificado (invariante de aprovisionamiento).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    pub id: i64,
    pub municipality_id: Option<i64>,
    pub alias: String,
    pub client_cert_path: Option<String>,
    pub key_path: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Camera {
    pub id: i64,
    /// Número de serie físico del dispositivo (único en el ledger).
    pub serial_number: String,
    /// Identificador opaco de la cámara de cara al servicio de Mossos.
    pub codigo_lector: String,
    pub municipality_id: i64,
    pub endpoint_id: Option<i64>,
    pub certificate_id: Option<i64>,
    /// UTM31N-ETRS89 con exactamente dos decimales, preservadas como texto.
    pub coord_x: Option<String>,
    pub coord_y: Option<String>,
    pub active: bool,
    pub last_sent_at: Option<DateTime<Utc>>,
}

/// Producto de la resolución de enrutado para un mensaje concreto:
/// la sobre-escritura de cámara gana siempre a la del municipio.
#[derive(Debug, Clone)]
pub struct RoutingProfile {
    pub camera: Camera,
    pub municipality: Municipality,
    pub endpoint: Option<Endpoint>,
    pub certificate: Option<Certificate>,
}

impl RoutingProfile {
    /// Contrato de reintentos efectivo del perfil: valores del endpoint
    /// o los defaults del dominio cuando no hay endpoint resuelto.
    pub fn retry_contract(&self) -> (i64, i64) {
        match &self.endpoint {
            Some(endpoint) => (
                if endpoint.retry_max > 0 { endpoint.retry_max } else { DEFAULT_RETRY_MAX },
                if endpoint.retry_backoff_ms > 0 {
                    endpoint.retry_backoff_ms
                } else {
                    DEFAULT_RETRY_BACKOFF_MS
                },
            ),
            None => (DEFAULT_RETRY_MAX, DEFAULT_RETRY_BACKOFF_MS),
        }
    }

    pub fn timeout_ms(&self) -> i64 {
        self.endpoint
            .as_ref()
            .map(|endpoint| endpoint.timeout_ms)
            .filter(|timeout| *timeout > 0)
            .unwrap_or(DEFAULT_TIMEOUT_MS)
    }
}

/// Valida una coordenada UTM31N-ETRS89 en su forma textual canónica:
/// signo opcional, 1 a 8 enteros y exactamente dos decimales.
pub fn is_valid_utm_coordinate(raw_coordinate: &str) -> bool {
    let unsigned = raw_coordinate.strip_prefix('-').unwrap_or(raw_coordinate);

    let Some((integer_part, decimal_part)) = unsigned.split_once('.') else {
        return false;
    };

    (1..=8).contains(&integer_part.len())
        && integer_part.chars().all(|c| c.is_ascii_digit())
        && decimal_part.len() == 2
        && decimal_part.chars().all(|c| c.is_ascii_digit())
}
