// [libs/infra/db/src/repositories/queue.rs]
/*!
 * =================================================================
 * APARATO: MESSAGE QUEUE REPOSITORY
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: TRANSICIONES DE ESTADO DE LA COLA DE ENVÍO
 *
 * La selección de candidatos es consultiva; el reclamo real es el CAS
 * de `mark_sending`: solo una pasada del sender puede mover una fila
 * de {PENDING, FAILED} a SENDING, lo que garantiza como máximo un
 * envío en vuelo por mensaje. La purga de éxito borra fila de cola,
 * lectura y último-envío de cámara en una transacción; las imágenes
 * se desenlazan tras el commit (el filesystem no participa en la
 * transacción) y los huérfanos quedan acotados por el janitor.
 * =================================================================
 */

use centinela_domain_models::{MessageStatus, QueueMessage};
use centinela_infra_imagestore::ImageStore;
use chrono::{DateTime, Utc};
use libsql::params;
use tracing::{error, info, warn};

use crate::errors::DbError;
use crate::rowmap::{datetime_at, fmt_ts, int_at, opt_datetime_at, opt_text_at, text_at};
use crate::LedgerClient;

const QUEUE_COLUMNS: &str = "id, reading_id, status, attempts, last_error, created_at, \
    updated_at, sent_at, last_sent_at, next_retry_at";

pub struct QueueRepository {
    database_client: LedgerClient,
    image_store: ImageStore,
}

impl QueueRepository {
    pub fn new(database_client: LedgerClient, image_store: ImageStore) -> Self {
        Self {
            database_client,
            image_store,
        }
    }

    /// Selección FIFO de mensajes vencidos en {PENDING, FAILED}.
    pub async fn claim_pending(&self, limit: i64) -> Result<Vec<QueueMessage>, DbError> {
        let connection = self.database_client.get_connection()?;
        let now_text = fmt_ts(Utc::now());

        let mut rows = connection
            .query(
                &format!(
                    "SELECT {QUEUE_COLUMNS} FROM messages_queue \
                     WHERE status IN ('PENDING', 'FAILED') \
                       AND (next_retry_at IS NULL OR next_retry_at <= ?1) \
                     ORDER BY created_at ASC \
                     LIMIT ?2"
                ),
                params![now_text, limit],
            )
            .await?;

        let mut candidates = Vec::new();
        while let Some(row) = rows.next().await? {
            candidates.push(map_queue_row(&row)?);
        }
        Ok(candidates)
    }

    /// CAS a SENDING. Devuelve false si otra pasada ganó la fila o el
    /// mensaje ya no está en un estado reclamable.
    pub async fn mark_sending(&self, queue_id: i64) -> Result<bool, DbError> {
        let connection = self.database_client.get_connection()?;
        let affected_rows = connection
            .execute(
                "UPDATE messages_queue SET status = 'SENDING', updated_at = ?2 \
                 WHERE id = ?1 AND status IN ('PENDING', 'FAILED')",
                params![queue_id, fmt_ts(Utc::now())],
            )
            .await?;

        if affected_rows > 0 {
            info!("📤 [SENDER]: Mensaje {} marcado como SENDING", queue_id);
        }
        Ok(affected_rows > 0)
    }

    /// Fallo transitorio: consume un intento y programa la ventana de backoff.
    pub async fn mark_failed(
        &self,
        queue_id: i64,
        error_message: &str,
        next_retry_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let affected_rows = connection
            .execute(
                "UPDATE messages_queue SET status = 'FAILED', attempts = attempts + 1, \
                 last_error = ?2, next_retry_at = ?3, updated_at = ?4 WHERE id = ?1",
                params![queue_id, error_message, fmt_ts(next_retry_at), fmt_ts(Utc::now())],
            )
            .await?;

        if affected_rows == 0 {
            return Err(DbError::QueueRowNotFound(queue_id));
        }

        warn!(
            "⚠️ [SENDER]: Mensaje {} marcado FAILED ({}). Reintento a partir de {}",
            queue_id,
            error_message,
            fmt_ts(next_retry_at)
        );
        Ok(())
    }

    /// Fallo terminal: la fila queda retenida para autopsia hasta que
    /// el janitor de DEAD aplique su retención.
    pub async fn mark_dead(&self, queue_id: i64, error_message: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let affected_rows = connection
            .execute(
                "UPDATE messages_queue SET status = 'DEAD', attempts = attempts + 1, \
                 last_error = ?2, updated_at = ?3 WHERE id = ?1",
                params![queue_id, error_message, fmt_ts(Utc::now())],
            )
            .await?;

        if affected_rows == 0 {
            return Err(DbError::QueueRowNotFound(queue_id));
        }

        error!("💀 [SENDER]: Mensaje {} marcado como DEAD: {}", queue_id, error_message);
        Ok(())
    }

    /// Purga de éxito: SUCCESS es transitorio. En una transacción se
    /// sella el éxito, se actualiza `cameras.last_sent_at` y se borran
    /// fila de cola y lectura; después se desenlazan las imágenes.
    pub async fn mark_success_and_purge(&self, queue_id: i64) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let now_text = fmt_ts(Utc::now());

        let mut context_rows = connection
            .query(
                "SELECT q.reading_id, r.camera_id, r.image_ocr_path, r.image_ctx_path \
                 FROM messages_queue q JOIN alpr_readings r ON r.id = q.reading_id \
                 WHERE q.id = ?1",
                params![queue_id],
            )
            .await?;

        let Some(context_row) = context_rows.next().await? else {
            return Err(DbError::QueueRowNotFound(queue_id));
        };

        let reading_id = int_at(&context_row, 0)?;
        let camera_id = int_at(&context_row, 1)?;
        let image_ocr_path = opt_text_at(&context_row, 2)?;
        let image_ctx_path = opt_text_at(&context_row, 3)?;

        let purge_transaction = connection.transaction().await?;

        purge_transaction
            .execute(
                "UPDATE messages_queue SET status = 'SUCCESS', sent_at = ?2, \
                 last_sent_at = ?2, last_error = NULL, updated_at = ?2 WHERE id = ?1",
                params![queue_id, now_text.clone()],
            )
            .await?;

        purge_transaction
            .execute(
                "UPDATE cameras SET last_sent_at = ?2 WHERE id = ?1",
                params![camera_id, now_text.clone()],
            )
            .await?;

        purge_transaction
            .execute("DELETE FROM messages_queue WHERE id = ?1", params![queue_id])
            .await?;

        purge_transaction
            .execute("DELETE FROM alpr_readings WHERE id = ?1", params![reading_id])
            .await?;

        purge_transaction.commit().await?;

        for stored_path in [image_ocr_path, image_ctx_path].into_iter().flatten() {
            self.image_store.delete(&stored_path).await;
        }

        info!(
            "✅ [SENDER]: Envío correcto purgado (msg_id={}, reading_id={})",
            queue_id, reading_id
        );
        Ok(())
    }

    pub async fn fetch_message(&self, queue_id: i64) -> Result<Option<QueueMessage>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                &format!("SELECT {QUEUE_COLUMNS} FROM messages_queue WHERE id = ?1"),
                params![queue_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(map_queue_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Janitor de DEAD: elimina filas terminales más antiguas que el
    /// umbral junto a su lectura e imágenes. Devuelve cuántas purgó.
    pub async fn purge_dead_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, DbError> {
        let connection = self.database_client.get_connection()?;

        let mut expired_rows = connection
            .query(
                "SELECT q.id, q.reading_id, r.image_ocr_path, r.image_ctx_path \
                 FROM messages_queue q LEFT JOIN alpr_readings r ON r.id = q.reading_id \
                 WHERE q.status = 'DEAD' AND q.updated_at <= ?1",
                params![fmt_ts(cutoff)],
            )
            .await?;

        let mut expired = Vec::new();
        while let Some(row) = expired_rows.next().await? {
            expired.push((
                int_at(&row, 0)?,
                int_at(&row, 1)?,
                opt_text_at(&row, 2)?,
                opt_text_at(&row, 3)?,
            ));
        }

        if expired.is_empty() {
            return Ok(0);
        }

        let purge_transaction = connection.transaction().await?;
        for (queue_id, reading_id, _, _) in &expired {
            purge_transaction
                .execute("DELETE FROM messages_queue WHERE id = ?1", params![*queue_id])
                .await?;
            purge_transaction
                .execute("DELETE FROM alpr_readings WHERE id = ?1", params![*reading_id])
                .await?;
        }
        purge_transaction.commit().await?;

        for (_, _, image_ocr_path, image_ctx_path) in &expired {
            for stored_path in [image_ocr_path, image_ctx_path].iter().filter_map(|p| p.as_deref()) {
                self.image_store.delete(stored_path).await;
            }
        }

        Ok(expired.len())
    }
}

fn map_queue_row(row: &libsql::Row) -> Result<QueueMessage, DbError> {
    let status_text = text_at(row, 2)?;
    let status = MessageStatus::parse(&status_text)
        .ok_or_else(|| DbError::MappingError(format!("estado de cola desconocido '{status_text}'")))?;

    Ok(QueueMessage {
        id: int_at(row, 0)?,
        reading_id: int_at(row, 1)?,
        status,
        attempts: int_at(row, 3)?,
        last_error: opt_text_at(row, 4)?,
        created_at: datetime_at(row, 5)?,
        updated_at: datetime_at(row, 6)?,
        sent_at: opt_datetime_at(row, 7)?,
        last_sent_at: opt_datetime_at(row, 8)?,
        next_retry_at: opt_datetime_at(row, 9)?,
    })
}
