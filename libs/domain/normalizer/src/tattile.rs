// [libs/domain/normalizer/src/tattile.rs]
/*!
 * =================================================================
 * APARATO: TATTILE XML PARSER
 * CLASIFICACIÓN: DOMAIN LAYER (ESTRATO L2)
 * RESPONSABILIDAD: XML DE CÁMARA TATTILE -> LECTURA CANÓNICA
 *
 * Contrato de cable:
 * - Obligatorios: PLATE_STRING, DEVICE_SN.
 * - DATE=YYYY-MM-DD y TIME=HH-MM-SS-mmm se combinan en UTC; si falta
 *   cualquiera de los dos, el timestamp es now(UTC) y la lectura se
 *   acepta igualmente (la cámara entrega el tiempo ya en UTC).
 * - has_image_* se deriva de texto base64 no vacío, nunca de la
 *   presencia de la etiqueta.
 * =================================================================
 */

use std::collections::HashMap;

use centinela_domain_models::NormalizedReading;
use chrono::{NaiveDate, Utc};
use xml::reader::{EventReader, XmlEvent};

use crate::errors::NormalizeError;

/// Parsea el XML crudo de Tattile y devuelve la lectura normalizada.
pub fn parse_tattile_xml(xml_str: &str) -> Result<NormalizedReading, NormalizeError> {
    let fields = collect_root_children(xml_str)?;

    let plate = require_field(&fields, "PLATE_STRING")?;
    let device_sn = require_field(&fields, "DEVICE_SN")?;

    let timestamp_utc = match (field(&fields, "DATE"), field(&fields, "TIME")) {
        (Some(date_text), Some(time_text)) => combine_date_time(date_text, time_text)?,
        // Sin fecha u hora en el cable: sellamos con el reloj del relé.
        _ => Utc::now(),
    };

    let image_ocr_b64 = field(&fields, "IMAGE_OCR").map(str::to_string);
    let image_ctx_b64 = field(&fields, "IMAGE_CTX").map(str::to_string);

    Ok(NormalizedReading {
        plate: plate.to_string(),
        device_sn: device_sn.to_string(),
        timestamp_utc,
        direction: field(&fields, "DIRECTION").map(str::to_string),
        lane_id: int_field(&fields, "LANE_ID"),
        lane_descr: field(&fields, "LANE_DESCR").map(str::to_string),
        ocr_score: int_field(&fields, "OCRSCORE"),
        country_code: field(&fields, "PLATE_COUNTRY_CODE").map(str::to_string),
        country: field(&fields, "PLATE_COUNTRY").map(str::to_string),
        bbox_min_x: int_field(&fields, "ORIG_PLATE_MIN_X"),
        bbox_min_y: int_field(&fields, "ORIG_PLATE_MIN_Y"),
        bbox_max_x: int_field(&fields, "ORIG_PLATE_MAX_X"),
        bbox_max_y: int_field(&fields, "ORIG_PLATE_MAX_Y"),
        char_height: int_field(&fields, "CHAR_HEIGHT").or_else(|| int_field(&fields, "PLATE_CHAR_HEIGHT")),
        has_image_ocr: image_ocr_b64.is_some(),
        has_image_ctx: image_ctx_b64.is_some(),
        image_ocr_b64,
        image_ctx_b64,
        raw_xml: Some(xml_str.to_string()),
    })
}

/// Recolecta el texto de los hijos directos del elemento raíz.
/// El XML Tattile es plano: profundidad uno, sin atributos relevantes.
fn collect_root_children(xml_str: &str) -> Result<HashMap<String, String>, NormalizeError> {
    let mut fields = HashMap::new();
    let mut depth: u32 = 0;
    let mut current_tag: Option<String> = None;
    let mut current_text = String::new();

    for event in EventReader::new(xml_str.as_bytes()) {
        match event.map_err(|parse_fault| NormalizeError::Parse(parse_fault.to_string()))? {
            XmlEvent::StartElement { name, .. } => {
                depth += 1;
                if depth == 2 {
                    current_tag = Some(name.local_name);
                    current_text.clear();
                }
            }
            XmlEvent::Characters(data) | XmlEvent::CData(data) => {
                if depth == 2 {
                    current_text.push_str(&data);
                }
            }
            XmlEvent::EndElement { .. } => {
                if depth == 2 {
                    if let Some(tag) = current_tag.take() {
                        fields.insert(tag, current_text.trim().to_string());
                    }
                }
                depth = depth.saturating_sub(1);
            }
            _ => {}
        }
    }

    Ok(fields)
}

/// Campo presente y no vacío.
fn field<'a>(fields: &'a HashMap<String, String>, tag: &str) -> Option<&'a str> {
    fields.get(tag).map(String::as_str).filter(|text| !text.is_empty())
}

fn require_field<'a>(
    fields: &'a HashMap<String, String>,
    tag: &'static str,
) -> Result<&'a str, NormalizeError> {
    field(fields, tag).ok_or(NormalizeError::MissingField(tag))
}

/// Entero opcional: texto ilegible se trata como ausente.
fn int_field(fields: &HashMap<String, String>, tag: &str) -> Option<i64> {
    field(fields, tag).and_then(|text| text.parse::<i64>().ok())
}

/// Combina DATE + TIME de Tattile en un instante UTC.
/// TIME transporta milisegundos; el dominio trabaja en microsegundos.
fn combine_date_time(
    date_text: &str,
    time_text: &str,
) -> Result<chrono::DateTime<Utc>, NormalizeError> {
    let date = NaiveDate::parse_from_str(date_text, "%Y-%m-%d")
        .map_err(|fault| NormalizeError::Timestamp(format!("DATE '{date_text}': {fault}")))?;

    let time_parts: Vec<&str> = time_text.split('-').collect();
    if time_parts.len() != 4 {
        return Err(NormalizeError::Timestamp(format!("TIME '{time_text}': formato inesperado")));
    }

    let mut numeric_parts = [0u32; 4];
    for (slot, raw_part) in numeric_parts.iter_mut().zip(&time_parts) {
        *slot = raw_part
            .parse::<u32>()
            .map_err(|fault| NormalizeError::Timestamp(format!("TIME '{time_text}': {fault}")))?;
    }

    let [hours, minutes, seconds, millis] = numeric_parts;
    date.and_hms_milli_opt(hours, minutes, seconds, millis)
        .map(|naive| naive.and_utc())
        .ok_or_else(|| NormalizeError::Timestamp(format!("TIME '{time_text}': fuera de rango")))
}
