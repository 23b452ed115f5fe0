// [apps/relay/src/handlers/ingest.rs]
/*!
 * =================================================================
 * APARATO: HTTP INGEST HANDLER (C4)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: STAGING CRUDO DE PAYLOADS LECTOR VISION
 *
 * El handler no interpreta el payload más allá de extraer IdTransit y
 * Plate para el nombre de fichero: los bytes crudos se escriben de
 * forma atómica en INGEST_JSON_DIR y el procesador hace el resto.
 * El contrato de respuesta es 200-siempre: el proceso de captura no
 * sabe reaccionar a errores HTTP, así que los fallos viajan en el
 * cuerpo como {ok:false}.
 * =================================================================
 */

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};
use tokio::fs;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::MAX_INGEST_BODY_BYTES;
use crate::state::AppState;

pub async fn handle_raw_ingest(
    State(application_state): State<AppState>,
    body: Bytes,
) -> Json<Value> {
    if body.is_empty() {
        warn!("⚠️ [INGEST_API]: Payload vacío descartado");
        return Json(json!({ "ok": false, "error": "EMPTY_BODY" }));
    }
    if body.len() > MAX_INGEST_BODY_BYTES {
        warn!("⚠️ [INGEST_API]: Payload de {} bytes excede el límite", body.len());
        return Json(json!({ "ok": false, "error": "BODY_TOO_LARGE" }));
    }

    let (transit_identifier, plate_label) = extract_filename_hints(&body);
    let timestamp_label = Utc::now().format("%Y%m%d_%H%M%S_%6f");
    let base_filename = format!("{transit_identifier}_{plate_label}_{timestamp_label}.json");

    match stage_raw_payload(&application_state, &base_filename, &body).await {
        Ok(saved_path) => {
            info!("📥 [INGEST_API]: Payload almacenado en {}", saved_path);
            Json(json!({ "ok": true, "saved": saved_path }))
        }
        Err(io_fault) => {
            error!("❌ [INGEST_API]: Error escribiendo payload: {}", io_fault);
            Json(json!({ "ok": false, "error": io_fault.to_string() }))
        }
    }
}

/// Escritura atómica tmp+rename con sufijo único ante colisión.
async fn stage_raw_payload(
    application_state: &AppState,
    base_filename: &str,
    body: &[u8],
) -> std::io::Result<String> {
    let ingest_directory = &application_state.settings.ingest_json_dir;
    fs::create_dir_all(ingest_directory).await?;

    let mut target_path = ingest_directory.join(base_filename);
    if target_path.exists() {
        let unique_suffix = Uuid::new_v4().simple().to_string();
        let collision_free = format!(
            "{}_{unique_suffix}.json",
            base_filename.trim_end_matches(".json")
        );
        target_path = ingest_directory.join(collision_free);
    }

    let temporary_path = target_path.with_extension("json.tmp");
    fs::write(&temporary_path, body).await?;
    fs::rename(&temporary_path, &target_path).await?;

    Ok(target_path.to_string_lossy().into_owned())
}

/// Extracción opcional de IdTransit y Plate para el nombre. Un payload
/// que no parsee o sea una lista usa los marcadores por defecto.
fn extract_filename_hints(body: &[u8]) -> (String, String) {
    let parsed: Option<Value> = serde_json::from_slice(body).ok();

    let object = match parsed {
        Some(Value::Object(object)) => Some(object),
        _ => None,
    };

    let transit_identifier = object
        .as_ref()
        .and_then(|object| scalar_label(object.get("IdTransit")))
        .unwrap_or_else(|| "transit".to_string());

    let plate_label = object
        .as_ref()
        .and_then(|object| scalar_label(object.get("Plate")))
        .unwrap_or_else(|| "unknown".to_string());

    (sanitize_for_filename(&transit_identifier), sanitize_for_filename(&plate_label))
}

fn scalar_label(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Solo [A-Za-z0-9-] sobrevive en el nombre de fichero.
fn sanitize_for_filename(raw_label: &str) -> String {
    let cleaned: String = raw_label
        .chars()
        .filter(|character| character.is_ascii_alphanumeric() || *character == '-')
        .collect();
    if cleaned.is_empty() {
        "x".to_string()
    } else {
        cleaned
    }
}
