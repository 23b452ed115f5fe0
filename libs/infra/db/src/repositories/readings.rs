// [libs/infra/db/src/repositories/readings.rs]
/*!
 * =================================================================
 * APARATO: READING REPOSITORY
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: INGESTA TRANSACCIONAL DE LECTURAS ALPR
 *
 * `save_reading` es la única puerta de entrada de lecturas al ledger:
 * valida la cámara, materializa las imágenes a través del almacén y
 * crea la fila de lectura junto a su mensaje PENDING en una sola
 * transacción. Una cámara desconocida rechaza el payload sin
 * persistir nada.
 * =================================================================
 */

use centinela_domain_models::{AlprReading, NormalizedReading};
use centinela_infra_imagestore::{ImageKind, ImageStore};
use libsql::params;
use tracing::{info, warn};

use crate::errors::DbError;
use crate::rowmap::{
    bool_at, datetime_at, fmt_ts, int_at, opt_int_at, opt_text_at, text_at,
};
use crate::LedgerClient;

const READING_COLUMNS: &str = "id, camera_id, device_sn, plate, timestamp_utc, direction, \
    lane_id, lane_descr, ocr_score, country_code, country, bbox_min_x, bbox_min_y, \
    bbox_max_x, bbox_max_y, char_height, has_image_ocr, has_image_ctx, image_ocr_path, \
    image_ctx_path, raw_xml, created_at";

pub struct ReadingRepository {
    database_client: LedgerClient,
    image_store: ImageStore,
}

impl ReadingRepository {
    pub fn new(database_client: LedgerClient, image_store: ImageStore) -> Self {
        Self {
            database_client,
            image_store,
        }
    }

    /// Persiste una lectura normalizada y encola su mensaje PENDING.
    ///
    /// Las imágenes se escriben antes de abrir la transacción: un
    /// fallo de escritura degrada a has_image_*=false y anula la ruta,
    /// nunca aborta la lectura. Los huérfanos de un rollback posterior
    /// quedan acotados por el janitor del almacén de imágenes.
    ///
    /// # Errors:
    /// - `DbError::UnknownCamera` si el device_sn no está registrado.
    pub async fn save_reading(&self, normalized: &NormalizedReading) -> Result<(i64, i64), DbError> {
        let connection = self.database_client.get_connection()?;

        let mut camera_rows = connection
            .query(
                "SELECT id FROM cameras WHERE serial_number = ?1",
                params![normalized.device_sn.clone()],
            )
            .await?;

        let camera_id = match camera_rows.next().await? {
            Some(row) => int_at(&row, 0)?,
            None => {
                warn!(
                    "⚠️ [INGEST]: Cámara no registrada: device_sn={}. Lectura descartada.",
                    normalized.device_sn
                );
                return Err(DbError::UnknownCamera(normalized.device_sn.clone()));
            }
        };

        let image_ocr_path = match normalized.image_ocr_b64.as_deref() {
            Some(base64_data) => {
                self.image_store
                    .save_base64(
                        &normalized.plate,
                        &normalized.device_sn,
                        normalized.timestamp_utc,
                        ImageKind::Ocr,
                        base64_data,
                    )
                    .await
            }
            None => None,
        };
        let image_ctx_path = match normalized.image_ctx_b64.as_deref() {
            Some(base64_data) => {
                self.image_store
                    .save_base64(
                        &normalized.plate,
                        &normalized.device_sn,
                        normalized.timestamp_utc,
                        ImageKind::Ctx,
                        base64_data,
                    )
                    .await
            }
            None => None,
        };

        let has_image_ocr = image_ocr_path.is_some();
        let has_image_ctx = image_ctx_path.is_some();
        let now_text = fmt_ts(chrono::Utc::now());

        let ingest_transaction = connection.transaction().await?;

        ingest_transaction
            .execute(
                r#"
                INSERT INTO alpr_readings (
                    camera_id, device_sn, plate, timestamp_utc, direction,
                    lane_id, lane_descr, ocr_score, country_code, country,
                    bbox_min_x, bbox_min_y, bbox_max_x, bbox_max_y, char_height,
                    has_image_ocr, has_image_ctx, image_ocr_path, image_ctx_path,
                    raw_xml, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                          ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)
                "#,
                params![
                    camera_id,
                    normalized.device_sn.clone(),
                    normalized.plate.clone(),
                    fmt_ts(normalized.timestamp_utc),
                    normalized.direction.clone(),
                    normalized.lane_id,
                    normalized.lane_descr.clone(),
                    normalized.ocr_score,
                    normalized.country_code.clone(),
                    normalized.country.clone(),
                    normalized.bbox_min_x,
                    normalized.bbox_min_y,
                    normalized.bbox_max_x,
                    normalized.bbox_max_y,
                    normalized.char_height,
                    has_image_ocr as i64,
                    has_image_ctx as i64,
                    image_ocr_path.clone(),
                    image_ctx_path.clone(),
                    normalized.raw_xml.clone(),
                    now_text.clone()
                ],
            )
            .await?;

        let reading_id = last_insert_rowid(&ingest_transaction).await?;

        ingest_transaction
            .execute(
                r#"
                INSERT INTO messages_queue (reading_id, status, attempts, created_at, updated_at)
                VALUES (?1, 'PENDING', 0, ?2, ?3)
                "#,
                params![reading_id, now_text.clone(), now_text],
            )
            .await?;

        let queue_id = last_insert_rowid(&ingest_transaction).await?;

        ingest_transaction.commit().await?;

        info!(
            "📥 [INGEST]: Lectura recibida {} de {} (reading_id={}, msg_id={})",
            normalized.plate, normalized.device_sn, reading_id, queue_id
        );

        Ok((reading_id, queue_id))
    }

    pub async fn fetch_reading(&self, reading_id: i64) -> Result<Option<AlprReading>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                &format!("SELECT {READING_COLUMNS} FROM alpr_readings WHERE id = ?1"),
                params![reading_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(map_reading_row(&row)?)),
            None => Ok(None),
        }
    }
}

/// Mapeo de una fila `alpr_readings` completa en orden de columnas.
pub(crate) fn map_reading_row(row: &libsql::Row) -> Result<AlprReading, DbError> {
    Ok(AlprReading {
        id: int_at(row, 0)?,
        camera_id: int_at(row, 1)?,
        device_sn: text_at(row, 2)?,
        plate: text_at(row, 3)?,
        timestamp_utc: datetime_at(row, 4)?,
        direction: opt_text_at(row, 5)?,
        lane_id: opt_int_at(row, 6)?,
        lane_descr: opt_text_at(row, 7)?,
        ocr_score: opt_int_at(row, 8)?,
        country_code: opt_text_at(row, 9)?,
        country: opt_text_at(row, 10)?,
        bbox_min_x: opt_int_at(row, 11)?,
        bbox_min_y: opt_int_at(row, 12)?,
        bbox_max_x: opt_int_at(row, 13)?,
        bbox_max_y: opt_int_at(row, 14)?,
        char_height: opt_int_at(row, 15)?,
        has_image_ocr: bool_at(row, 16)?,
        has_image_ctx: bool_at(row, 17)?,
        image_ocr_path: opt_text_at(row, 18)?,
        image_ctx_path: opt_text_at(row, 19)?,
        raw_xml: opt_text_at(row, 20)?,
        created_at: datetime_at(row, 21)?,
    })
}

/// Recupera el rowid de la última inserción dentro de la transacción.
pub(crate) async fn last_insert_rowid(
    transaction: &libsql::Transaction,
) -> Result<i64, DbError> {
    let mut rows = transaction.query("SELECT last_insert_rowid()", ()).await?;
    let row = rows
        .next()
        .await?
        .ok_or_else(|| DbError::MappingError("last_insert_rowid sin fila".into()))?;
    int_at(&row, 0)
}
