// [apps/relay/src/config.rs]
/*!
 * =================================================================
 * APARATO: RELAY SETTINGS
 * CLASIFICACIÓN: APPLICATION STATE (ESTRATO L1-APP)
 * RESPONSABILIDAD: HIDRATACIÓN DE AJUSTES DESDE EL ENTORNO
 *
 * Toda variable tiene un valor por defecto operable en desarrollo;
 * en producción se inyectan por entorno o fichero .env. El objeto se
 * construye una vez en el arranque y se comparte inmutable con cada
 * tarea: no hay singletons de configuración.
 * =================================================================
 */

use std::path::PathBuf;
use std::str::FromStr;

/// Límite duro del cuerpo de ingesta HTTP (20 MiB).
pub const MAX_INGEST_BODY_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Settings {
    // --- LEDGER ---
    pub database_url: String,
    pub database_auth_token: Option<String>,

    // --- RED DE BORDE ---
    pub http_port: u16,
    pub transit_port: u16,

    // --- RAÍCES DE FILESYSTEM ---
    pub images_dir: PathBuf,
    pub certs_dir: PathBuf,
    pub log_dir: PathBuf,
    pub ingest_json_dir: PathBuf,
    pub sender_json_dir: PathBuf,
    pub sender_pending_dir: PathBuf,
    pub sender_failed_dir: PathBuf,
    pub mirror_src_dir: PathBuf,
    pub cloned_dir: PathBuf,

    // --- ESPEJO ---
    pub mirror_stability_ms: u64,
    pub mirror_debounce_ms: u64,
    pub mirror_copy_retry_max: u32,
    pub mirror_scan_interval_ms: u64,

    // --- SENDER ---
    pub sender_enabled: bool,
    pub sender_poll_interval_seconds: u64,
    pub sender_max_batch_size: i64,
    pub sender_default_retry_max: i64,
    pub sender_default_backoff_ms: i64,
    pub sender_backoff_on_fail_sec: u64,

    // --- RETENCIONES (JANITORS) ---
    pub retention_cloned_minutes: u64,
    pub retention_log_hours: u64,
    pub retention_failed_hours: u64,
    pub retention_pending_hours: u64,
    pub retention_ingest_hours: u64,
    pub retention_images_hours: u64,
    pub dead_retention_hours: u64,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            database_url: env_or("DATABASE_URL", "file:centinela.db"),
            database_auth_token: std::env::var("DATABASE_AUTH_TOKEN").ok(),

            http_port: env_parse("HTTP_PORT", 8080),
            transit_port: env_parse("TRANSIT_PORT", 33334),

            images_dir: env_path("IMAGES_DIR", "data/images"),
            certs_dir: env_path("CERTS_DIR", "/etc/centinela/certs"),
            log_dir: env_path("LOG_DIR", "data/logs"),
            ingest_json_dir: env_path("INGEST_JSON_DIR", "data/ingest_json"),
            sender_json_dir: env_path("SENDER_JSON_DIR", "data/sender_json"),
            sender_pending_dir: env_path("SENDER_PENDING_DIR", "data/sender_pending"),
            sender_failed_dir: env_path("SENDER_FAILED_DIR", "data/sender_failed"),
            mirror_src_dir: env_path("MIRROR_SRC_DIR", "data/camera_out"),
            cloned_dir: env_path("CLONED_DIR", "data/cloned"),

            mirror_stability_ms: env_parse("MIRROR_STABILITY_MS", 250),
            mirror_debounce_ms: env_parse("MIRROR_DEBOUNCE_MS", 250),
            mirror_copy_retry_max: env_parse("MIRROR_COPY_RETRY_MAX", 25),
            mirror_scan_interval_ms: env_parse("MIRROR_SCAN_INTERVAL_MS", 500),

            sender_enabled: env_parse("SENDER_ENABLED", true),
            sender_poll_interval_seconds: env_parse("SENDER_POLL_INTERVAL_SECONDS", 5),
            sender_max_batch_size: env_parse("SENDER_MAX_BATCH_SIZE", 50),
            sender_default_retry_max: env_parse("SENDER_DEFAULT_RETRY_MAX", 3),
            sender_default_backoff_ms: env_parse("SENDER_DEFAULT_BACKOFF_MS", 1000),
            sender_backoff_on_fail_sec: env_parse("SENDER_BACKOFF_ON_FAIL_SEC", 3),

            retention_cloned_minutes: env_parse("RETENTION_CLONED_MINUTES", 45),
            retention_log_hours: env_parse("RETENTION_LOG_HOURS", 4),
            retention_failed_hours: env_parse("RETENTION_FAILED_HOURS", 1),
            retention_pending_hours: env_parse("RETENTION_PENDING_HOURS", 1),
            retention_ingest_hours: env_parse("RETENTION_INGEST_HOURS", 1),
            retention_images_hours: env_parse("RETENTION_IMAGES_HOURS", 48),
            dead_retention_hours: env_parse("DEAD_RETENTION_HOURS", 72),
        }
    }

    /// Crea las raíces de trabajo. Idempotente: se invoca en cada ignición.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        for directory in [
            &self.images_dir,
            &self.log_dir,
            &self.ingest_json_dir,
            &self.sender_json_dir,
            &self.sender_pending_dir,
            &self.sender_failed_dir,
            &self.mirror_src_dir,
            &self.cloned_dir,
        ] {
            std::fs::create_dir_all(directory)?;
        }
        Ok(())
    }
}

fn env_or(key: &str, default_value: &str) -> String {
    std::env::var(key).ok().filter(|value| !value.is_empty()).unwrap_or_else(|| default_value.to_string())
}

fn env_path(key: &str, default_value: &str) -> PathBuf {
    PathBuf::from(env_or(key, default_value))
}

/// Parseo tolerante: un valor ilegible vuelve al default en lugar de
/// tumbar el arranque del sitio.
fn env_parse<T: FromStr + Copy>(key: &str, default_value: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<T>().ok())
        .unwrap_or(default_value)
}
