// [apps/relay/src/kernel.rs]
/**
 * =================================================================
 * APARATO: RELAY KERNEL
 * CLASIFICACIÓN: COMPOSITION ROOT (ESTRATO L1-APP)
 * RESPONSABILIDAD: IGNICIÓN DE DAEMONS Y APAGADO COOPERATIVO
 *
 * Actúa como la placa base donde se conectan todos los servicios:
 * espejo, procesador, ingesta TCP, sender, flota de janitors y el
 * transporte HTTP. Una única señal de apagado (SIGINT/SIGTERM)
 * recorre un canal watch; cada bucle termina su unidad en curso y
 * sale. El kernel une todas las tareas con un tope de 5 segundos:
 * la que lo exceda queda abandonada con la salida del proceso.
 * =================================================================
 */

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use centinela_infra_db::LedgerClient;

use crate::config::Settings;
use crate::routes::create_relay_router;
use crate::services::{
    DeadLetterJanitor, DirectoryJanitor, FileProcessorService, MirrorService, SenderService,
    TransitIngestService,
};
use crate::state::AppState;

/// Margen de unión de tareas tras la señal de apagado.
const SHUTDOWN_JOIN_BUDGET: Duration = Duration::from_secs(5);

pub struct RelayKernel {
    pub application_state: AppState,
}

impl RelayKernel {
    /// Establece la conexión al ledger y prepara las raíces de trabajo
    /// antes de levantar cualquier servicio.
    pub async fn ignite(settings: Settings) -> anyhow::Result<Self> {
        settings.ensure_directories()?;

        let ledger_client = LedgerClient::connect(
            &settings.database_url,
            settings.database_auth_token.clone(),
        )
        .await?;

        Ok(Self {
            application_state: AppState::new(ledger_client, settings),
        })
    }

    /// Lanza todas las operaciones autónomas del relé y bloquea hasta
    /// el apagado cooperativo.
    pub async fn launch_operations(self) -> anyhow::Result<()> {
        let shared_state = self.application_state.clone();
        let (shutdown_sender, shutdown_receiver) = watch::channel(false);

        let mut service_handles: Vec<(&'static str, JoinHandle<()>)> = Vec::new();

        // --- 1. ESPEJO DE CAPTURAS (C3) ---
        let mirror = MirrorService::new(shared_state.clone());
        service_handles.push(("mirror", tokio::spawn(mirror.run(shutdown_receiver.clone()))));

        // --- 2. PROCESADOR DE FICHEROS (C5) ---
        let processor = FileProcessorService::new(shared_state.clone());
        service_handles.push(("processor", tokio::spawn(processor.run(shutdown_receiver.clone()))));

        // --- 3. INGESTA TCP TATTILE (C6) ---
        let transit = TransitIngestService::new(shared_state.clone());
        service_handles.push(("transit", tokio::spawn(transit.run(shutdown_receiver.clone()))));

        // --- 4. SENDER HACIA MOSSOS (C8) ---
        let sender = SenderService::new(shared_state.clone());
        service_handles.push(("sender", tokio::spawn(sender.run(shutdown_receiver.clone()))));

        // --- 5. FLOTA DE JANITORS (C10) ---
        for directory_janitor in DirectoryJanitor::build_fleet(&shared_state) {
            let label = directory_janitor.label;
            service_handles.push((label, tokio::spawn(directory_janitor.run(shutdown_receiver.clone()))));
        }
        let dead_letter_janitor = DeadLetterJanitor::new(shared_state.clone());
        service_handles.push((
            "dead-letter",
            tokio::spawn(dead_letter_janitor.run(shutdown_receiver.clone())),
        ));

        // --- 6. ESCUCHA DE SEÑALES DEL SISTEMA ---
        spawn_signal_listener(shutdown_sender.clone());

        // --- 7. TRANSPORTE HTTP (AXUM) ---
        let bind_address = SocketAddr::new(
            "0.0.0.0".parse::<IpAddr>().expect("literal IPv4"),
            shared_state.settings.http_port,
        );
        let relay_router = create_relay_router(shared_state);

        info!("🚀 [KERNEL_ONLINE]: Relé ALPR escuchando en {}", bind_address);

        let tcp_listener = tokio::net::TcpListener::bind(bind_address).await?;
        let mut http_shutdown_receiver = shutdown_receiver.clone();

        let serve_result = axum::serve(tcp_listener, relay_router)
            .with_graceful_shutdown(async move {
                let _ = http_shutdown_receiver.changed().await;
            })
            .await;

        if let Err(server_fault) = serve_result {
            error!("💀 [KERNEL_COLLAPSE]: Fallo del transporte HTTP: {}", server_fault);
        }

        // --- 8. APAGADO COOPERATIVO CON TOPE DE UNIÓN ---
        let _ = shutdown_sender.send(true);
        info!("🛑 [KERNEL]: Apagado en curso. Uniendo tareas (tope {:?})...", SHUTDOWN_JOIN_BUDGET);

        let join_all = async {
            for (label, handle) in service_handles {
                if let Err(join_fault) = handle.await {
                    warn!("⚠️ [KERNEL]: La tarea '{}' terminó con fallo: {}", label, join_fault);
                }
            }
        };

        if tokio::time::timeout(SHUTDOWN_JOIN_BUDGET, join_all).await.is_err() {
            warn!("⚠️ [KERNEL]: Tareas rezagadas abandonadas tras el tope de unión.");
        }

        info!("👋 [KERNEL]: Relé detenido.");
        Ok(())
    }
}

/// SIGINT o SIGTERM disparan la señal única de apagado.
fn spawn_signal_listener(shutdown_sender: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(stream) => stream,
                Err(signal_fault) => {
                    error!("⚠️ [KERNEL]: SIGTERM no instalable: {}", signal_fault);
                    let _ = ctrl_c.await;
                    let _ = shutdown_sender.send(true);
                    return;
                }
            };

            tokio::select! {
                _ = ctrl_c => info!("🛑 [KERNEL]: SIGINT recibido."),
                _ = sigterm.recv() => info!("🛑 [KERNEL]: SIGTERM recibido."),
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("🛑 [KERNEL]: Señal de interrupción recibida.");
        }

        let _ = shutdown_sender.send(true);
    });
}
