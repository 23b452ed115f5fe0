// [libs/infra/db/src/repositories/metrics.rs]
//! Conteos mínimos de cola y lecturas para la superficie `/health`.

use serde::Serialize;

use crate::errors::DbError;
use crate::rowmap::int_at;
use crate::LedgerClient;

#[derive(Debug, Clone, Serialize)]
pub struct QueueCounters {
    pub pending_messages: i64,
    pub failed_messages: i64,
    pub dead_messages: i64,
    pub total_readings: i64,
}

pub struct MetricsRepository {
    database_client: LedgerClient,
}

impl MetricsRepository {
    pub fn new(database_client: LedgerClient) -> Self {
        Self { database_client }
    }

    pub async fn queue_counters(&self) -> Result<QueueCounters, DbError> {
        let connection = self.database_client.get_connection()?;

        let mut rows = connection
            .query(
                "SELECT \
                    (SELECT COUNT(*) FROM messages_queue WHERE status = 'PENDING'), \
                    (SELECT COUNT(*) FROM messages_queue WHERE status = 'FAILED'), \
                    (SELECT COUNT(*) FROM messages_queue WHERE status = 'DEAD'), \
                    (SELECT COUNT(*) FROM alpr_readings)",
                (),
            )
            .await?;

        let row = rows
            .next()
            .await?
            .ok_or_else(|| DbError::MappingError("conteo de cola sin fila".into()))?;

        Ok(QueueCounters {
            pending_messages: int_at(&row, 0)?,
            failed_messages: int_at(&row, 1)?,
            dead_messages: int_at(&row, 2)?,
            total_readings: int_at(&row, 3)?,
        })
    }
}
