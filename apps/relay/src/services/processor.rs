// [apps/relay/src/services/processor.rs]
/*!
 * =================================================================
 * APARATO: FILE PROCESSOR (C5)
 * CLASIFICACIÓN: BACKGROUND INFRASTRUCTURE SERVICE (ESTRATO L4)
 * RESPONSABILIDAD: JSON CRUDO -> PAYLOAD RESUELTO -> LEDGER
 *
 * Dos etapas por ciclo, FIFO por mtime:
 * 1. INGEST_JSON_DIR -> SENDER_JSON_DIR. Resuelve referencias de ruta
 *    de imagen a base64 (familias de claves estáticas), primero por
 *    nombre contra el espejo (recursivo si hace falta) y después por
 *    ruta absoluta. Las imágenes tomadas del espejo se borran tras el
 *    éxito. Escritura atómica tmp+rename; el origen se elimina.
 * 2. SENDER_JSON_DIR -> ledger. El payload (objeto o lista) cruza el
 *    puente Lector Vision -> XML Tattile -> persistencia. Durante la
 *    persistencia el fichero reside en SENDER_PENDING_DIR; el fallo
 *    lo deposita en SENDER_FAILED_DIR para autopsia.
 * =================================================================
 */

use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use centinela_domain_normalizer::build_tattile_xml_from_lectorvision;
use serde_json::{Map, Value};
use tokio::fs;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::services::fsutil::{find_by_basename, oldest_file_with_extension, wait_stable};
use crate::services::pipeline::persist_tattile_xml;
use crate::state::AppState;

/// Cadencia de sondeo de ambas etapas.
const PROCESSOR_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Estabilidad exigida a los JSON entrantes antes de tocarlos.
const INGEST_STABILITY_WINDOW: Duration = Duration::from_millis(600);

/// Familia de claves: referencia de ruta y sus claves de contenido.
/// La primera clave de contenido es la que recibe el base64 inyectado.
struct PathKeyFamily {
    path_key: &'static str,
    content_keys: &'static [&'static str],
}

const PATH_KEY_FAMILIES: &[PathKeyFamily] = &[
    PathKeyFamily {
        path_key: "OCRImagePath",
        content_keys: &["ImageOCR", "IMAGE_OCR"],
    },
    PathKeyFamily {
        path_key: "CROPImagePath",
        content_keys: &["ImageCrop", "IMAGE_CROP"],
    },
    PathKeyFamily {
        path_key: "ColorImagePath",
        content_keys: &["ImageCTX", "IMAGE_CTX"],
    },
];

pub struct FileProcessorService {
    application_state: AppState,
}

impl FileProcessorService {
    pub fn new(application_state: AppState) -> Self {
        Self { application_state }
    }

    pub async fn run(self, mut shutdown_signal: watch::Receiver<bool>) {
        info!("⚙️  [PROC]: Procesador de ficheros activo (sondeo 500 ms).");

        loop {
            tokio::select! {
                _ = shutdown_signal.changed() => {
                    info!("🛑 [PROC]: Señal de apagado recibida.");
                    break;
                }
                _ = sleep(PROCESSOR_POLL_INTERVAL) => {
                    self.process_ingest_stage().await;
                    self.process_sender_stage().await;
                }
            }
        }
    }

    /// Etapa 1: resolver referencias de imagen e hidratar el payload.
    pub async fn process_ingest_stage(&self) {
        let settings = &self.application_state.settings;
        let Some(source_path) = oldest_file_with_extension(&settings.ingest_json_dir, "json") else {
            return;
        };

        if !wait_stable(&source_path, INGEST_STABILITY_WINDOW).await {
            // Aún en escritura o desvanecido: el siguiente ciclo decide.
            return;
        }

        let raw_bytes = match fs::read(&source_path).await {
            Ok(bytes) => bytes,
            Err(read_fault) => {
                warn!("⚠️ [PROC]: No se pudo leer {:?}: {}", source_path, read_fault);
                return;
            }
        };

        let mut payload: Value = match serde_json::from_slice(&raw_bytes) {
            Ok(payload) => payload,
            Err(parse_fault) => {
                error!("❌ [PROC]: JSON inválido en {:?}: {}. Fichero descartado.", source_path, parse_fault);
                let _ = fs::remove_file(&source_path).await;
                return;
            }
        };

        let mut consumed_mirror_files: Vec<PathBuf> = Vec::new();
        match &mut payload {
            Value::Object(object) => {
                self.inline_image_references(object, &mut consumed_mirror_files).await;
            }
            Value::Array(elements) => {
                for element in elements.iter_mut() {
                    if let Value::Object(object) = element {
                        self.inline_image_references(object, &mut consumed_mirror_files).await;
                    }
                }
            }
            _ => {}
        }

        let Some(filename) = source_path.file_name() else {
            return;
        };
        let staged_path = settings.sender_json_dir.join(filename);
        let temporary_path = PathBuf::from(format!("{}.tmp", staged_path.display()));

        let serialized = match serde_json::to_vec(&payload) {
            Ok(serialized) => serialized,
            Err(serialize_fault) => {
                error!("❌ [PROC]: No se pudo serializar {:?}: {}. Fichero descartado.", source_path, serialize_fault);
                let _ = fs::remove_file(&source_path).await;
                return;
            }
        };

        let write_result = async {
            fs::create_dir_all(&settings.sender_json_dir).await?;
            fs::write(&temporary_path, &serialized).await?;
            fs::rename(&temporary_path, &staged_path).await
        }
        .await;

        if let Err(write_fault) = write_result {
            error!("❌ [PROC]: Error escribiendo {:?}: {}. Fichero descartado.", staged_path, write_fault);
            let _ = fs::remove_file(&source_path).await;
            return;
        }

        let _ = fs::remove_file(&source_path).await;
        for mirror_file in consumed_mirror_files {
            if fs::remove_file(&mirror_file).await.is_ok() {
                debug!("🧹 [PROC]: Imagen del espejo consumida: {:?}", mirror_file);
            }
        }

        info!("⚙️  [PROC]: Payload procesado hacia {:?}", staged_path);
    }

    /// Inyección de base64 por familias de claves. Una familia con
    /// contenido previo no se toca; la resolución es por nombre contra
    /// el espejo y por ruta absoluta como último recurso.
    async fn inline_image_references(
        &self,
        object: &mut Map<String, Value>,
        consumed_mirror_files: &mut Vec<PathBuf>,
    ) {
        let cloned_directory = self.application_state.settings.cloned_dir.clone();

        for family in PATH_KEY_FAMILIES {
            let already_inlined = family
                .content_keys
                .iter()
                .any(|content_key| non_empty_string(object.get(*content_key)).is_some());
            if already_inlined {
                continue;
            }

            let Some(referenced_path) = non_empty_string(object.get(family.path_key)) else {
                continue;
            };

            // El proceso de captura emite rutas Windows: el basename se
            // extrae sobre ambos separadores, no sobre el de la plataforma.
            let Some(basename) = cross_platform_basename(&referenced_path) else {
                continue;
            };

            let resolved = find_by_basename(&cloned_directory, &basename).or_else(|| {
                let absolute_candidate = PathBuf::from(&referenced_path);
                absolute_candidate.is_file().then_some(absolute_candidate)
            });

            let Some(resolved_path) = resolved else {
                warn!(
                    "⚠️ [PROC]: Referencia {} sin fichero resoluble: {}",
                    family.path_key, referenced_path
                );
                continue;
            };

            match fs::read(&resolved_path).await {
                Ok(image_bytes) => {
                    object.insert(
                        family.content_keys[0].to_string(),
                        Value::String(BASE64_STANDARD.encode(image_bytes)),
                    );
                    if resolved_path.starts_with(&cloned_directory) {
                        consumed_mirror_files.push(resolved_path);
                    }
                }
                Err(read_fault) => {
                    warn!("⚠️ [PROC]: No se pudo leer {:?}: {}", resolved_path, read_fault);
                }
            }
        }
    }

    /// Etapa 2: persistir payloads resueltos a través del puente
    /// Lector Vision. El fichero transita por el área pendiente.
    pub async fn process_sender_stage(&self) {
        let settings = &self.application_state.settings;
        let Some(staged_path) = oldest_file_with_extension(&settings.sender_json_dir, "json") else {
            return;
        };
        let Some(filename) = staged_path.file_name().map(|name| name.to_os_string()) else {
            return;
        };

        if fs::create_dir_all(&settings.sender_pending_dir).await.is_err() {
            return;
        }
        let pending_path = settings.sender_pending_dir.join(&filename);
        if let Err(rename_fault) = fs::rename(&staged_path, &pending_path).await {
            warn!("⚠️ [PROC]: No se pudo mover {:?} a pendientes: {}", staged_path, rename_fault);
            return;
        }

        let persistence_result = self.persist_staged_payload(&pending_path).await;

        match persistence_result {
            Ok(persisted_count) => {
                let _ = fs::remove_file(&pending_path).await;
                debug!("✅ [PROC]: {} lecturas persistidas desde {:?}", persisted_count, filename);
            }
            Err(failure_reason) => {
                error!("❌ [PROC]: Payload {:?} rechazado: {}", filename, failure_reason);
                if fs::create_dir_all(&settings.sender_failed_dir).await.is_ok() {
                    let failed_path = settings.sender_failed_dir.join(&filename);
                    let _ = fs::rename(&pending_path, &failed_path).await;
                }
            }
        }
    }

    async fn persist_staged_payload(&self, pending_path: &Path) -> Result<usize, String> {
        let raw_bytes = fs::read(pending_path)
            .await
            .map_err(|read_fault| format!("lectura: {read_fault}"))?;

        let payload: Value = serde_json::from_slice(&raw_bytes)
            .map_err(|parse_fault| format!("json: {parse_fault}"))?;

        let elements: Vec<Value> = match payload {
            Value::Array(elements) => elements,
            single_object => vec![single_object],
        };

        let mut persisted_count = 0usize;
        for element in &elements {
            let (tattile_xml, meta) = build_tattile_xml_from_lectorvision(element)
                .map_err(|bridge_fault| format!("normalización: {bridge_fault}"))?;

            persist_tattile_xml(&self.application_state, &tattile_xml)
                .await
                .map_err(|pipeline_fault| {
                    format!("persistencia de {} ({}): {pipeline_fault}", meta.plate, meta.device_sn)
                })?;

            persisted_count += 1;
        }

        Ok(persisted_count)
    }
}

fn non_empty_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        _ => None,
    }
}

/// Último segmento de una ruta, separadores '/' y '\' por igual.
fn cross_platform_basename(raw_path: &str) -> Option<String> {
    let basename = raw_path
        .rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .filter(|segment| !segment.is_empty())?;
    Some(basename.to_string())
}
