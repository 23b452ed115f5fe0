// [libs/domain/models/src/queue.rs]
/*!
 * =================================================================
 * APARATO: MESSAGE QUEUE STATE MACHINE
 * CLASIFICACIÓN: DOMAIN LAYER (ESTRATO L2)
 * RESPONSABILIDAD: ESTADOS Y TRANSICIONES DE LA COLA DE ENVÍO
 *
 * Topología legal del ciclo de vida:
 *   PENDING -> SENDING -> { SUCCESS | FAILED | DEAD }
 *   FAILED  -> SENDING (reintento) | DEAD (presupuesto agotado)
 * SENDING nunca regresa a PENDING y SUCCESS es transitorio: la fila
 * se purga en el mismo paso que la marca.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageStatus {
    Pending,
    Sending,
    Success,
    Failed,
    Dead,
}

impl MessageStatus {
    /// Forma textual exacta persistida en el ledger.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Pending => "PENDING",
            MessageStatus::Sending => "SENDING",
            MessageStatus::Success => "SUCCESS",
            MessageStatus::Failed => "FAILED",
            MessageStatus::Dead => "DEAD",
        }
    }

    pub fn parse(raw_status: &str) -> Option<Self> {
        match raw_status {
            "PENDING" => Some(MessageStatus::Pending),
            "SENDING" => Some(MessageStatus::Sending),
            "SUCCESS" => Some(MessageStatus::Success),
            "FAILED" => Some(MessageStatus::Failed),
            "DEAD" => Some(MessageStatus::Dead),
            _ => None,
        }
    }

    /// Estados desde los que el sender puede reclamar un mensaje.
    pub fn is_claimable(&self) -> bool {
        matches!(self, MessageStatus::Pending | MessageStatus::Failed)
    }

    /// Predicado de transición legal de la máquina de estados.
    pub fn can_transition_to(&self, target: MessageStatus) -> bool {
        use MessageStatus::*;
        matches!(
            (self, target),
            (Pending, Sending)
                | (Failed, Sending)
                | (Sending, Success)
                | (Sending, Failed)
                | (Sending, Dead)
                | (Pending, Dead)
                | (Failed, Dead)
        )
    }
}

/// Fila de `messages_queue`. Uno a uno con `alpr_readings`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueMessage {
    pub id: i64,
    pub reading_id: i64,
    pub status: MessageStatus,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub last_sent_at: Option<DateTime<Utc>>,
    pub next_retry_at: Option<DateTime<Utc>>,
}

impl QueueMessage {
    /// Un mensaje está "vencido" cuando no tiene ventana de backoff
    /// activa. La selección es consultiva: el reclamo real es el CAS
    /// a SENDING en el ledger.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.next_retry_at {
            Some(next_retry_at) => next_retry_at <= now,
            None => true,
        }
    }
}
