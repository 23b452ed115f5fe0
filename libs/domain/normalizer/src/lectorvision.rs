// [libs/domain/normalizer/src/lectorvision.rs]
/*!
 * =================================================================
 * APARATO: LECTOR VISION BRIDGE
 * CLASIFICACIÓN: DOMAIN LAYER (ESTRATO L2)
 * RESPONSABILIDAD: JSON LECTOR VISION -> XML TATTILE COMPATIBLE
 *
 * El payload JSON del proceso de captura se traduce al XML Tattile
 * intermedio para que la ruta de persistencia sea única. Las familias
 * de claves admitidas (imágenes, altura de carácter) son tablas
 * estáticas: el primer alias con contenido gana.
 * =================================================================
 */

use chrono::NaiveDateTime;
use serde_json::Value;

use crate::errors::NormalizeError;
use crate::xmlutil::FlatXmlBuilder;

/// Alias admitidos para la imagen OCR en payloads Lector Vision.
const IMAGE_OCR_KEYS: &[&str] = &[
    "ImageOcr",
    "ImageOCR",
    "ImageOcrBase64",
    "ImageOCRBase64",
    "ImageOcrB64",
];

/// Alias admitidos para la imagen de contexto.
const IMAGE_CTX_KEYS: &[&str] = &[
    "ImageCtx",
    "ImageCTX",
    "ImageCtxBase64",
    "ImageCTXBase64",
    "ImageCtxB64",
];

/// Alias admitidos para la altura de carácter.
const CHAR_HEIGHT_KEYS: &[&str] = &["CharHeight", "PlateCharHeight", "PlateCharheight"];

/// Etiquetas Tattile del bounding box, en el orden de `PlateCoord`.
const PLATE_COORD_TAGS: &[&str] = &[
    "ORIG_PLATE_MIN_X",
    "ORIG_PLATE_MIN_Y",
    "ORIG_PLATE_MAX_X",
    "ORIG_PLATE_MAX_Y",
];

/// Metadatos mínimos del payload para logging y enrutado temprano.
#[derive(Debug, Clone)]
pub struct LectorVisionMeta {
    pub plate: String,
    pub device_sn: String,
    pub timestamp: String,
}

/// Convierte el timestamp de Lector Vision (`YYYY/MM/DD HH:MM:SS.mmm`)
/// a la pareja DATE / TIME de Tattile.
pub fn parse_lectorvision_timestamp(timestamp_str: &str) -> Result<(String, String), NormalizeError> {
    let parsed = NaiveDateTime::parse_from_str(timestamp_str, "%Y/%m/%d %H:%M:%S%.f")
        .map_err(|_| {
            NormalizeError::Timestamp(format!(
                "TimeStamp '{timestamp_str}' inválido. Formato esperado: YYYY/MM/DD HH:MM:SS.mmm"
            ))
        })?;

    let date_str = parsed.format("%Y-%m-%d").to_string();
    let millis = parsed.and_utc().timestamp_subsec_millis();
    let time_str = format!("{}-{millis:03}", parsed.format("%H-%M-%S"));
    Ok((date_str, time_str))
}

/// Genera el XML Tattile compatible a partir de un payload Lector Vision.
pub fn build_tattile_xml_from_lectorvision(
    payload: &Value,
) -> Result<(String, LectorVisionMeta), NormalizeError> {
    let plate = require_string(payload, "Plate")?;
    let device_sn = string_value(payload, "SerialNumber")
        .or_else(|| string_value(payload, "IdDevice"))
        .ok_or(NormalizeError::MissingField("SerialNumber/IdDevice"))?;

    let timestamp_raw = require_string(payload, "TimeStamp")?;
    let (date_str, time_str) = parse_lectorvision_timestamp(&timestamp_raw)?;

    let mut builder = FlatXmlBuilder::new("root");
    builder
        .leaf("PLATE_STRING", &plate)
        .leaf("DEVICE_SN", &device_sn)
        .leaf("DATE", &date_str)
        .leaf("TIME", &time_str);

    // Las etiquetas de imagen se emiten siempre, aunque vacías: el
    // parser de vuelta deriva has_image_* del contenido, no de la etiqueta.
    builder.leaf("IMAGE_OCR", &first_non_empty(payload, IMAGE_OCR_KEYS).unwrap_or_default());
    builder.leaf("IMAGE_CTX", &first_non_empty(payload, IMAGE_CTX_KEYS).unwrap_or_default());

    if let Some(ocr_score) = int_value(payload, "Fiability") {
        builder.leaf("OCRSCORE", &format!("{ocr_score:03}"));
    }

    builder.leaf_opt("DIRECTION", string_value(payload, "Direction").as_deref());

    if let Some(lane_id) = int_value(payload, "LaneNumber") {
        builder.leaf("LANE_ID", &lane_id.to_string());
    }
    builder.leaf_opt("LANE_DESCR", string_value(payload, "LaneName").as_deref());

    if let Some(Value::Array(coordinates)) = payload.get("PlateCoord") {
        if coordinates.len() >= 4 {
            for (tag, coordinate) in PLATE_COORD_TAGS.iter().zip(coordinates.iter()) {
                if let Some(value) = coordinate.as_i64() {
                    builder.leaf(tag, &value.to_string());
                }
            }
        }
    }

    if let Some(country_code) = string_value(payload, "Country") {
        builder.leaf("PLATE_COUNTRY_CODE", &country_code);
        // 724 es el código numérico ISO de España en el contrato Lector Vision.
        let country_label = if country_code.parse::<i64>() == Ok(724) { "ES" } else { "" };
        builder.leaf("PLATE_COUNTRY", country_label);
    }

    if let Some(char_height) = CHAR_HEIGHT_KEYS.iter().find_map(|key| int_value(payload, key)) {
        builder.leaf("CHAR_HEIGHT", &char_height.to_string());
    }

    let meta = LectorVisionMeta {
        plate,
        device_sn,
        timestamp: timestamp_raw,
    };
    Ok((builder.finish(), meta))
}

/// Valor textual recortado; los números se aceptan y se formatean.
fn string_value(payload: &Value, key: &str) -> Option<String> {
    match payload.get(key)? {
        Value::String(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn require_string(payload: &Value, key: &'static str) -> Result<String, NormalizeError> {
    string_value(payload, key).ok_or(NormalizeError::MissingField(key))
}

/// Entero opcional: admite número JSON o texto numérico.
fn int_value(payload: &Value, key: &str) -> Option<i64> {
    match payload.get(key)? {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn first_non_empty(payload: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| string_value(payload, key))
}
