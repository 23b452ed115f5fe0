// [apps/relay/src/services/transit.rs]
/*!
 * =================================================================
 * APARATO: TRANSIT TCP INGEST (C6)
 * CLASIFICACIÓN: BACKGROUND INFRASTRUCTURE SERVICE (ESTRATO L4)
 * RESPONSABILIDAD: ESCUCHA TCP DE CÁMARAS TATTILE
 *
 * Modelo conexión-por-lectura: cada cámara abre, vuelca un documento
 * XML, cierra. Se lee hasta EOF, se decodifica UTF-8 con reemplazo y
 * se entrega a la ruta única de persistencia. Una conexión nunca
 * bloquea el accept: cada una corre en su propia tarea.
 * =================================================================
 */

use std::net::SocketAddr;

use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::services::pipeline::{persist_tattile_xml, PipelineFault};
use crate::state::AppState;

pub struct TransitIngestService {
    application_state: AppState,
}

impl TransitIngestService {
    pub fn new(application_state: AppState) -> Self {
        Self { application_state }
    }

    pub async fn run(self, mut shutdown_signal: watch::Receiver<bool>) {
        let listen_port = self.application_state.settings.transit_port;
        let bind_address = SocketAddr::from(([0, 0, 0, 0], listen_port));

        let tcp_listener = match TcpListener::bind(bind_address).await {
            Ok(listener) => listener,
            Err(bind_fault) => {
                error!("💀 [INGEST]: No se pudo abrir el puerto {}: {}", listen_port, bind_fault);
                return;
            }
        };

        info!("📡 [INGEST]: Servicio de ingesta Tattile escuchando en {}", bind_address);

        loop {
            tokio::select! {
                _ = shutdown_signal.changed() => {
                    info!("🛑 [INGEST]: Señal de apagado recibida. Cerrando accept loop.");
                    break;
                }
                accept_result = tcp_listener.accept() => {
                    match accept_result {
                        Ok((connection, peer_address)) => {
                            debug!("📶 [INGEST]: Conexión entrante desde {}", peer_address);
                            let state_ref = self.application_state.clone();
                            tokio::spawn(async move {
                                serve_connection(state_ref, connection, peer_address).await;
                            });
                        }
                        Err(accept_fault) => {
                            error!("⚠️ [INGEST]: Fallo en accept: {}", accept_fault);
                        }
                    }
                }
            }
        }
    }
}

/// Lee la conexión hasta EOF y persiste la lectura. La conexión se
/// cierra al salir del scope; los fallos de parseo no dejan estado.
async fn serve_connection(
    application_state: AppState,
    mut connection: TcpStream,
    peer_address: SocketAddr,
) {
    let mut wire_buffer = Vec::new();
    if let Err(read_fault) = connection.read_to_end(&mut wire_buffer).await {
        error!("⚠️ [INGEST]: Error leyendo de {}: {}", peer_address, read_fault);
        return;
    }

    if wire_buffer.is_empty() {
        debug!("📶 [INGEST]: Conexión {} cerrada sin datos", peer_address);
        return;
    }

    let xml_str = String::from_utf8_lossy(&wire_buffer).into_owned();
    info!("📥 [INGEST]: XML recibido desde {} ({} bytes)", peer_address, wire_buffer.len());

    match persist_tattile_xml(&application_state, &xml_str).await {
        Ok((reading_id, queue_id)) => {
            debug!(
                "✅ [INGEST]: Lectura {} encolada (msg_id={}) desde {}",
                reading_id, queue_id, peer_address
            );
        }
        Err(PipelineFault::Parse(parse_fault)) => {
            error!("❌ [INGEST]: XML no parseable desde {}: {}", peer_address, parse_fault);
        }
        // UnknownCamera y fallos de ledger ya dejaron su rastro en el pipeline.
        Err(_) => {}
    }
}
