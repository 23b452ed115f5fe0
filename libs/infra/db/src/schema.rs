// [libs/infra/db/src/schema.rs]
/**
 * =================================================================
 * APARATO: LEDGER SCHEMA ENGINE
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: GOBERNANZA ESTRUCTURAL E IDEMPOTENCIA TOTAL
 *
 * Tres estratos aplicados en orden en cada arranque:
 * 1. SOLIDIFICACIÓN: génesis de tablas (CREATE IF NOT EXISTS).
 * 2. EVOLUCIÓN: mutaciones de columna para ledgers antiguos; la
 *    colisión "duplicate column" se interpreta como paridad.
 * 3. ENDURECIMIENTO: índices de aceleración del despacho.
 * =================================================================
 */

use anyhow::{Context, Result};
use libsql::Connection;
use tracing::{debug, info, warn};

/// ESTRATO 1: SOLIDIFICACIÓN (Génesis de Tablas)
const LEDGER_TABLES: &[(&str, &str)] = &[
    ("TABLE_MUNICIPALITIES", r#"
        CREATE TABLE IF NOT EXISTS municipalities (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            code TEXT,
            endpoint_id INTEGER,
            certificate_id INTEGER,
            active INTEGER NOT NULL DEFAULT 1
        );
    "#),
    ("TABLE_ENDPOINTS", r#"
        CREATE TABLE IF NOT EXISTS endpoints (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            url TEXT NOT NULL,
            timeout_ms INTEGER NOT NULL DEFAULT 5000,
            retry_max INTEGER NOT NULL DEFAULT 3,
            retry_backoff_ms INTEGER NOT NULL DEFAULT 1000
        );
    "#),
    ("TABLE_CERTIFICATES", r#"
        CREATE TABLE IF NOT EXISTS certificates (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            municipality_id INTEGER,
            alias TEXT NOT NULL,
            client_cert_path TEXT,
            key_path TEXT,
            active INTEGER NOT NULL DEFAULT 1
        );
    "#),
    ("TABLE_CAMERAS", r#"
        CREATE TABLE IF NOT EXISTS cameras (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            serial_number TEXT NOT NULL UNIQUE,
            codigo_lector TEXT NOT NULL,
            municipality_id INTEGER NOT NULL,
            endpoint_id INTEGER,
            certificate_id INTEGER,
            coord_x TEXT,
            coord_y TEXT,
            active INTEGER NOT NULL DEFAULT 1,
            last_sent_at TEXT
        );
    "#),
    ("TABLE_ALPR_READINGS", r#"
        CREATE TABLE IF NOT EXISTS alpr_readings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            camera_id INTEGER NOT NULL,
            device_sn TEXT NOT NULL,
            plate TEXT NOT NULL,
            timestamp_utc TEXT NOT NULL,
            direction TEXT,
            lane_id INTEGER,
            lane_descr TEXT,
            ocr_score INTEGER,
            country_code TEXT,
            country TEXT,
            bbox_min_x INTEGER,
            bbox_min_y INTEGER,
            bbox_max_x INTEGER,
            bbox_max_y INTEGER,
            char_height INTEGER,
            has_image_ocr INTEGER NOT NULL DEFAULT 0,
            has_image_ctx INTEGER NOT NULL DEFAULT 0,
            image_ocr_path TEXT,
            image_ctx_path TEXT,
            raw_xml TEXT,
            created_at TEXT NOT NULL
        );
    "#),
    ("TABLE_MESSAGES_QUEUE", r#"
        CREATE TABLE IF NOT EXISTS messages_queue (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            reading_id INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'PENDING',
            attempts INTEGER NOT NULL DEFAULT 0,
            last_error TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            sent_at TEXT,
            last_sent_at TEXT,
            next_retry_at TEXT
        );
    "#),
];

/// ESTRATO 2: EVOLUCIÓN (Mutaciones de Columna)
/// Reproduce la cadena de migraciones de despliegues en campo: los
/// ledgers creados antes de la fase 2 del sender y de las coordenadas
/// UTM carecen de estas columnas.
const EVOLUTIONARY_STRATA: &[(&str, &str)] = &[
    // --- FASE 2 DEL SENDER (reintentos y ventanas) ---
    ("QUEUE_UPDATED_AT", "ALTER TABLE messages_queue ADD COLUMN updated_at TEXT"),
    ("QUEUE_LAST_SENT_AT", "ALTER TABLE messages_queue ADD COLUMN last_sent_at TEXT"),
    ("QUEUE_NEXT_RETRY_AT", "ALTER TABLE messages_queue ADD COLUMN next_retry_at TEXT"),

    // --- COORDENADAS UTM Y MATERIAL PEM ---
    ("CAMERA_COORD_X", "ALTER TABLE cameras ADD COLUMN coord_x TEXT"),
    ("CAMERA_COORD_Y", "ALTER TABLE cameras ADD COLUMN coord_y TEXT"),
    ("CERT_KEY_PATH", "ALTER TABLE certificates ADD COLUMN key_path TEXT"),
    ("CERT_CLIENT_CERT_PATH", "ALTER TABLE certificates ADD COLUMN client_cert_path TEXT"),

    // --- ÚLTIMO ENVÍO POR CÁMARA ---
    ("CAMERA_LAST_SENT_AT", "ALTER TABLE cameras ADD COLUMN last_sent_at TEXT"),
];

/// ESTRATO 3: ENDURECIMIENTO (Índices de Aceleración)
const ACCELERATION_INDEXES: &[(&str, &str)] = &[
    ("IDX_QUEUE_CLAIM", "CREATE INDEX IF NOT EXISTS idx_queue_status_retry ON messages_queue(status, next_retry_at);"),
    ("IDX_QUEUE_FIFO", "CREATE INDEX IF NOT EXISTS idx_queue_created ON messages_queue(created_at);"),
    ("IDX_QUEUE_READING", "CREATE INDEX IF NOT EXISTS idx_queue_reading ON messages_queue(reading_id);"),
    ("IDX_READINGS_CAMERA", "CREATE INDEX IF NOT EXISTS idx_readings_camera ON alpr_readings(camera_id);"),
    ("IDX_CERTS_MUNICIPALITY", "CREATE INDEX IF NOT EXISTS idx_certificates_municipality ON certificates(municipality_id);"),
];

/// Ejecuta la secuencia maestra de sincronización del esquema.
///
/// # Errors:
/// Retorna error si alguna tabla base falla en solidificarse, lo que
/// indica un colapso del enlace con el motor.
pub async fn apply_full_ledger_schema(database_connection: &Connection) -> Result<()> {
    info!("🏗️ [SCHEMA_ENGINE]: Iniciando sincronización estructural del ledger...");

    solidify_base_strata(database_connection).await?;
    execute_evolutionary_repair(database_connection).await?;
    harden_access_layer(database_connection).await?;

    info!("✅ [SCHEMA_ENGINE]: Ledger nivelado y certificado.");
    Ok(())
}

async fn solidify_base_strata(db: &Connection) -> Result<()> {
    for (identifier, sql) in LEDGER_TABLES {
        debug!("  ↳ Solidifying: {}", identifier);
        db.execute(*sql, ())
            .await
            .with_context(|| format!("CRITICAL_SOLIDIFICATION_FAULT: {identifier}"))?;
    }
    Ok(())
}

async fn execute_evolutionary_repair(db: &Connection) -> Result<()> {
    for (identifier, sql) in EVOLUTIONARY_STRATA {
        match db.execute(*sql, ()).await {
            Ok(_) => info!("  🟢 [REPAIR_OK]: Applied evolutionary stratum {}", identifier),
            Err(alter_fault) => {
                let message = alter_fault.to_string();
                if message.contains("duplicate column name") {
                    debug!("  ⚪ [REPAIR_SKIP]: {} already level.", identifier);
                } else {
                    warn!("  ⚠️ [REPAIR_BYPASS]: {} check incomplete: {}", identifier, message);
                }
            }
        }
    }
    Ok(())
}

async fn harden_access_layer(db: &Connection) -> Result<()> {
    for (identifier, sql) in ACCELERATION_INDEXES {
        debug!("  ↳ Hardening: {}", identifier);
        db.execute(*sql, ())
            .await
            .with_context(|| format!("CRITICAL_HARDENING_FAULT: {identifier}"))?;
    }
    Ok(())
}
