// [libs/domain/models/src/reading.rs]
/*!
 * =================================================================
 * APARATO: ALPR READING ENTITIES
 * CLASIFICACIÓN: DOMAIN LAYER (ESTRATO L2)
 * RESPONSABILIDAD: LECTURA CANÓNICA Y SU FORMA NORMALIZADA
 *
 * `NormalizedReading` es el producto del Normalizador (C7): todavía
 * transporta las imágenes como base64 en memoria. `AlprReading` es la
 * fila persistida: las imágenes ya viven en disco y aquí solo quedan
 * rutas relativas al almacén.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Producto del Normalizador, previo a la persistencia.
/// Las imágenes viajan como texto base64 tal y como llegaron del cable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedReading {
    pub plate: String,
    pub device_sn: String,
    /// UTC siempre. Si el cable no traía DATE/TIME se rellena con now().
    pub timestamp_utc: DateTime<Utc>,
    pub direction: Option<String>,
    pub lane_id: Option<i64>,
    pub lane_descr: Option<String>,
    pub ocr_score: Option<i64>,
    pub country_code: Option<String>,
    pub country: Option<String>,
    pub bbox_min_x: Option<i64>,
    pub bbox_min_y: Option<i64>,
    pub bbox_max_x: Option<i64>,
    pub bbox_max_y: Option<i64>,
    pub char_height: Option<i64>,
    pub has_image_ocr: bool,
    pub has_image_ctx: bool,
    pub image_ocr_b64: Option<String>,
    pub image_ctx_b64: Option<String>,
    pub raw_xml: Option<String>,
}

/// Fila de la tabla de trabajo `alpr_readings`. Nunca se muta tras la
/// creación; solo se elimina (purga de éxito o janitor de DEAD).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlprReading {
    pub id: i64,
    pub camera_id: i64,
    pub device_sn: String,
    pub plate: String,
    pub timestamp_utc: DateTime<Utc>,
    pub direction: Option<String>,
    pub lane_id: Option<i64>,
    pub lane_descr: Option<String>,
    pub ocr_score: Option<i64>,
    pub country_code: Option<String>,
    pub country: Option<String>,
    pub bbox_min_x: Option<i64>,
    pub bbox_min_y: Option<i64>,
    pub bbox_max_x: Option<i64>,
    pub bbox_max_y: Option<i64>,
    pub char_height: Option<i64>,
    pub has_image_ocr: bool,
    pub has_image_ctx: bool,
    /// Rutas relativas a la raíz del almacén de imágenes.
    pub image_ocr_path: Option<String>,
    pub image_ctx_path: Option<String>,
    pub raw_xml: Option<String>,
    pub created_at: DateTime<Utc>,
}
