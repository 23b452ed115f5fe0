// [libs/infra/imagestore/src/lib.rs]
/*!
 * =================================================================
 * APARATO: IMAGE STORE (C1)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: DISPOSICIÓN DETERMINISTA DE IMÁGENES ALPR EN DISCO
 *
 * Disposición: <root>/<device_sn>/YYYY/MM/DD/<YYYYMMDDhhmmss>_plate-<PLATE>_{ocr|ctx}.jpg
 * La misma tupla (matrícula, device_sn, timestamp, tipo) produce
 * siempre la misma ruta relativa. El fallo de escritura se traduce en
 * "imagen ausente" para el llamador; el borrado es idempotente y de
 * mejor esfuerzo: las carreras de filesystem se absorben en silencio.
 * =================================================================
 */

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, error, info, warn};

/// Prefijo heredado de despliegues antiguos: algunas filas del ledger
/// guardaron la ruta con el raíz de datos incluido.
const LEGACY_PATH_PREFIX: &str = "data/images/";

#[derive(Error, Debug)]
pub enum ImageStoreError {
    #[error("[L3_IMG_FAULT]: BASE64_DECODE_REJECTED -> {0}")]
    Decode(String),

    #[error("[L3_IMG_FAULT]: DISK_IO_FAULT -> {0}")]
    Io(#[from] std::io::Error),
}

/// Tipo de imagen de una lectura: recorte OCR o escena de contexto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Ocr,
    Ctx,
}

impl ImageKind {
    pub fn suffix(&self) -> &'static str {
        match self {
            ImageKind::Ocr => "ocr",
            ImageKind::Ctx => "ctx",
        }
    }
}

/// Almacén de imágenes sobre un directorio raíz. Sin estado mutable:
/// cada operación es autosuficiente y recrea directorios intermedios.
#[derive(Debug, Clone)]
pub struct ImageStore {
    root_directory: PathBuf,
}

impl ImageStore {
    pub fn new(root_directory: impl Into<PathBuf>) -> Self {
        Self {
            root_directory: root_directory.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_directory
    }

    /// Normaliza la matrícula para nombres de fichero: mayúsculas y
    /// solo [A-Z0-9]. Vacía tras la limpieza -> "unknown".
    pub fn normalize_plate(plate: &str) -> String {
        let cleaned: String = plate
            .to_uppercase()
            .chars()
            .filter(|character| character.is_ascii_alphanumeric())
            .collect();

        if cleaned.is_empty() {
            "unknown".to_string()
        } else {
            cleaned
        }
    }

    /// Ruta relativa estable para la tupla (matrícula, cámara, instante, tipo).
    pub fn relative_path(
        &self,
        device_sn: &str,
        timestamp_utc: DateTime<Utc>,
        plate: &str,
        kind: ImageKind,
    ) -> String {
        format!(
            "{}/{}/{}_plate-{}_{}.jpg",
            device_sn,
            timestamp_utc.format("%Y/%m/%d"),
            timestamp_utc.format("%Y%m%d%H%M%S"),
            Self::normalize_plate(plate),
            kind.suffix()
        )
    }

    /// Resuelve cualquier forma histórica de ruta a una ruta física:
    /// absoluta tal cual, prefijo heredado recortado, relativa bajo el raíz.
    pub fn resolve(&self, stored_path: &str) -> PathBuf {
        let candidate = Path::new(stored_path);
        if candidate.is_absolute() {
            return candidate.to_path_buf();
        }
        let relative = stored_path.strip_prefix(LEGACY_PATH_PREFIX).unwrap_or(stored_path);
        self.root_directory.join(relative)
    }

    /// Decodifica y persiste una imagen. Devuelve la ruta relativa o
    /// `None` ante cualquier fallo: el llamador debe degradar a
    /// has_image_*=false, nunca abortar la lectura.
    pub async fn save_base64(
        &self,
        plate: &str,
        device_sn: &str,
        timestamp_utc: DateTime<Utc>,
        kind: ImageKind,
        base64_data: &str,
    ) -> Option<String> {
        if base64_data.is_empty() {
            return None;
        }

        let image_bytes = match BASE64_STANDARD.decode(base64_data.trim()) {
            Ok(bytes) => bytes,
            Err(decode_fault) => {
                error!(
                    "❌ [IMAGEN]: Error decodificando imagen {} de cámara {} matrícula={}: {}",
                    kind.suffix(),
                    device_sn,
                    Self::normalize_plate(plate),
                    decode_fault
                );
                return None;
            }
        };

        let relative = self.relative_path(device_sn, timestamp_utc, plate, kind);
        let full_path = self.root_directory.join(&relative);

        if let Some(parent_directory) = full_path.parent() {
            if let Err(io_fault) = fs::create_dir_all(parent_directory).await {
                error!("❌ [IMAGEN]: No se pudo crear el directorio {:?}: {}", parent_directory, io_fault);
                return None;
            }
        }

        if let Err(io_fault) = fs::write(&full_path, &image_bytes).await {
            error!("❌ [IMAGEN]: Error guardando imagen {} en {:?}: {}", kind.suffix(), full_path, io_fault);
            return None;
        }

        info!("🖼️  [IMAGEN]: Imagen {} almacenada en {}", kind.suffix().to_uppercase(), relative);
        Some(relative)
    }

    /// Lee los bytes de una imagen por ruta almacenada (relativa o legada).
    pub async fn read_bytes(&self, stored_path: &str) -> Result<Vec<u8>, ImageStoreError> {
        Ok(fs::read(self.resolve(stored_path)).await?)
    }

    /// Existencia física del fichero referenciado.
    pub fn exists(&self, stored_path: &str) -> bool {
        self.resolve(stored_path).is_file()
    }

    /// Borrado idempotente. Devuelve true solo si el fichero existía y
    /// fue eliminado en esta llamada.
    pub async fn delete(&self, stored_path: &str) -> bool {
        let full_path = self.resolve(stored_path);
        match fs::remove_file(&full_path).await {
            Ok(()) => {
                debug!("🧹 [IMAGEN]: Eliminada {:?}", full_path);
                true
            }
            Err(io_fault) if io_fault.kind() == std::io::ErrorKind::NotFound => {
                debug!("🧹 [IMAGEN]: Imagen no encontrada (ya borrada): {:?}", full_path);
                false
            }
            Err(io_fault) => {
                warn!("⚠️ [IMAGEN]: Error al borrar imagen {:?}: {}", full_path, io_fault);
                false
            }
        }
    }
}
