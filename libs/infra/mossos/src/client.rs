// [libs/infra/mossos/src/client.rs]
/*!
 * =================================================================
 * APARATO: MOSSOS UPLINK CLIENT
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: TRANSPORTE HTTPS mTLS DEL ENVELOPE FIRMADO
 *
 * La identidad cliente (clave + cadena PEM) alimenta tanto el
 * handshake mTLS como la firma WS-Security: misma pareja, dos capas.
 * El cliente no verifica firmas de respuesta; el servicio no las
 * emite y la verificación queda cortocircuitada a aceptar el sobre.
 * =================================================================
 */

use std::time::Duration;

use reqwest::{Client, Identity};
use tracing::{error, info};

use crate::errors::MossosError;
use crate::response::classify_reply;

/// Veredicto etiquetado de un intento de envío. El sender decide la
/// transición de la cola exclusivamente a partir de esta etiqueta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Success { code: String },
    Transient { reason: String },
    Permanent { reason: String },
}

pub struct MossosClient {
    endpoint_url: String,
    network_uplink_client: Client,
}

impl MossosClient {
    /// Construye el cliente con la identidad mTLS del tenant y el
    /// timeout del endpoint resuelto.
    pub fn new(
        endpoint_url: String,
        identity_pem: &[u8],
        timeout: Duration,
    ) -> Result<Self, MossosError> {
        let client_identity = Identity::from_pem(identity_pem)
            .map_err(|identity_fault| MossosError::Certificate(identity_fault.to_string()))?;

        let network_uplink_client = Client::builder()
            .use_rustls_tls()
            .identity(client_identity)
            .timeout(timeout)
            .build()
            .map_err(|builder_fault| MossosError::Transport(builder_fault.to_string()))?;

        info!("🛰️  [MOSSOS]: Usando endpoint: {}", endpoint_url);

        Ok(Self {
            endpoint_url,
            network_uplink_client,
        })
    }

    /// POST del envelope firmado y clasificación de la respuesta.
    /// Todo fallo previo a una respuesta HTTP es transitorio.
    pub async fn send_signed_envelope(&self, envelope_xml: &str) -> SendOutcome {
        let network_response = self
            .network_uplink_client
            .post(&self.endpoint_url)
            .header("Content-Type", "text/xml; charset=utf-8")
            .header("SOAPAction", "matricula")
            .body(envelope_xml.to_string())
            .send()
            .await;

        let response = match network_response {
            Ok(response) => response,
            Err(transport_fault) => {
                error!("❌ [MOSSOS]: Error HTTP/SSL de transporte: {}", transport_fault);
                return SendOutcome::Transient {
                    reason: format!("TRANSPORT: {transport_fault}"),
                };
            }
        };

        let http_status = response.status().as_u16();
        let response_body = response.text().await.unwrap_or_default();

        info!(
            "📡 [MOSSOS]: Request completada status={} bytes={}",
            http_status,
            response_body.len()
        );
        info!("📄 [MOSSOS][RESP_BODY] {}", snippet(&response_body, 2000));

        classify_reply(http_status, &response_body)
    }
}

fn snippet(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_offset, _)) => &text[..byte_offset],
        None => text,
    }
}
