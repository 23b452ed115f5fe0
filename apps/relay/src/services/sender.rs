// [apps/relay/src/services/sender.rs]
/*!
 * =================================================================
 * APARATO: MOSSOS SENDER WORKER (C8)
 * CLASIFICACIÓN: BACKGROUND INFRASTRUCTURE SERVICE (ESTRATO L4)
 * RESPONSABILIDAD: DESPACHO FIABLE DE LA COLA HACIA MOSSOS
 *
 * Bucle: reclamar lote FIFO vencido, procesar secuencialmente (el
 * manejo de certificados y el backend no toleran ráfagas paralelas),
 * dormir si el lote llegó vacío. Cada fila atraviesa el algoritmo de
 * 12 pasos: resolución de enrutado, material PEM, contrato de
 * reintentos, validación de imágenes, CAS a SENDING, firma, POST
 * mTLS y transición según el veredicto etiquetado. Cada intento firma
 * un envelope fresco: ids y Timestamp nunca se reutilizan.
 * =================================================================
 */

use std::path::PathBuf;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use centinela_domain_models::{Certificate, QueueMessage, RoutingProfile};
use centinela_infra_db::repositories::DispatchContext;
use centinela_infra_mossos::{MatriculaRequest, MossosClient, SendOutcome, SigningMaterial};
use chrono::{Duration as ChronoDuration, Utc};
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::state::AppState;

pub struct SenderService {
    application_state: AppState,
}

impl SenderService {
    pub fn new(application_state: AppState) -> Self {
        Self { application_state }
    }

    pub async fn run(self, mut shutdown_signal: watch::Receiver<bool>) {
        let settings = self.application_state.settings.clone();

        if !settings.sender_enabled {
            warn!("⚠️ [SENDER]: Sender deshabilitado por variable de entorno");
            return;
        }

        info!(
            "🚚 [SENDER]: Worker de envío iniciado. Sondeo={}s lote={}",
            settings.sender_poll_interval_seconds, settings.sender_max_batch_size
        );

        loop {
            if *shutdown_signal.borrow() {
                break;
            }

            let processed_count = match self.run_iteration().await {
                Ok(processed_count) => processed_count,
                Err(iteration_fault) => {
                    // El bucle sobrevive a cualquier fallo inesperado.
                    error!("❌ [SENDER]: Error inesperado en el bucle principal: {iteration_fault}");
                    tokio::select! {
                        _ = shutdown_signal.changed() => break,
                        _ = sleep(Duration::from_secs(settings.sender_backoff_on_fail_sec)) => {}
                    }
                    continue;
                }
            };

            if processed_count == 0 {
                tokio::select! {
                    _ = shutdown_signal.changed() => break,
                    _ = sleep(Duration::from_secs(settings.sender_poll_interval_seconds)) => {}
                }
            }
        }

        info!("🛑 [SENDER]: Worker de envío detenido.");
    }

    /// Procesa un lote de mensajes vencidos. Devuelve cuántos intentó.
    pub async fn run_iteration(&self) -> Result<usize, anyhow::Error> {
        let batch_limit = self.application_state.settings.sender_max_batch_size;
        let queue_repository = self.application_state.queue();

        let candidates = queue_repository.claim_pending(batch_limit).await?;
        if candidates.is_empty() {
            return Ok(0);
        }

        info!("🚚 [SENDER]: {} mensajes pendientes cargados para envío", candidates.len());

        let mut processed_count = 0usize;
        for message in candidates {
            let now = Utc::now();
            if !message.is_due(now) {
                info!(
                    "⏲️  [SENDER]: Mensaje {} pospuesto por ventana de reintento",
                    message.id
                );
                continue;
            }

            self.process_message(&message).await?;
            processed_count += 1;
        }

        Ok(processed_count)
    }

    /// Algoritmo por fila. Las transiciones de estado se deciden solo
    /// a partir del veredicto etiquetado del canal.
    pub async fn process_message(&self, message: &QueueMessage) -> Result<(), anyhow::Error> {
        let queue_repository = self.application_state.queue();
        let routing_repository = self.application_state.routing();

        // 1. LECTURA + CÁMARA + MUNICIPIO
        let Some(dispatch_context) = routing_repository
            .resolve_dispatch_context(message.reading_id)
            .await?
        else {
            error!(
                "💀 [SENDER]: Mensaje {} sin lectura o cámara en el ledger",
                message.id
            );
            queue_repository
                .mark_dead(message.id, "LECTURA_O_CAMARA_NO_ENCONTRADA")
                .await?;
            return Ok(());
        };

        let DispatchContext { reading, profile } = dispatch_context;

        info!(
            "🚚 [SENDER]: Enviando lectura {} (msg_id={}) a Mossos: matrícula={}, cámara={}, municipio={}",
            reading.id, message.id, reading.plate, profile.camera.serial_number, profile.municipality.name
        );

        // 2. CERTIFICADO (cámara > municipio)
        let Some(certificate) = profile.certificate.clone() else {
            error!(
                "💀 [CERT]: No hay certificado configurado para mensaje {} (municipio={})",
                message.id, profile.municipality.name
            );
            queue_repository
                .mark_dead(message.id, "CERTIFICADO_NO_CONFIGURADO")
                .await?;
            return Ok(());
        };

        let Some((client_cert_path, key_path)) = self.resolve_certificate_paths(&certificate) else {
            error!(
                "💀 [CERT]: Rutas PEM incompletas para mensaje {} (cert={})",
                message.id, certificate.alias
            );
            queue_repository.mark_dead(message.id, "CERTIFICADO_SIN_RUTA").await?;
            return Ok(());
        };

        if !client_cert_path.is_file() {
            error!("💀 [CERT]: Certificado no encontrado en {:?}", client_cert_path);
            queue_repository
                .mark_dead(
                    message.id,
                    &format!("Certificate file not found: {}", client_cert_path.display()),
                )
                .await?;
            return Ok(());
        }
        if !key_path.is_file() {
            error!("💀 [CERT]: Clave privada no encontrada en {:?}", key_path);
            queue_repository
                .mark_dead(message.id, &format!("Key file not found: {}", key_path.display()))
                .await?;
            return Ok(());
        }

        // 3. ENDPOINT (cámara > municipio)
        let Some(endpoint) = profile.endpoint.clone() else {
            error!(
                "💀 [SENDER]: No hay endpoint configurado para mensaje {} (municipio={})",
                message.id, profile.municipality.name
            );
            queue_repository.mark_dead(message.id, "ENDPOINT_NO_CONFIGURADO").await?;
            return Ok(());
        };
        if endpoint.url.trim().is_empty() {
            queue_repository
                .mark_dead(message.id, "ENDPOINT_URL_NO_CONFIGURADA")
                .await?;
            return Ok(());
        }

        // 4. CONTRATO DE REINTENTOS
        let (retry_max, backoff_ms) = self.resolve_retry_config(&profile);
        info!(
            "🔁 [SENDER]: Intento {}/{} para mensaje {} (backoff {}ms)",
            message.attempts + 1,
            retry_max,
            message.id,
            backoff_ms
        );
        if message.attempts >= retry_max {
            queue_repository.mark_dead(message.id, "MAX_REINTENTOS_AGOTADOS").await?;
            return Ok(());
        }

        // 5. VENTANA DE BACKOFF (revalidada sobre la fila reclamada)
        if !message.is_due(Utc::now()) {
            return Ok(());
        }

        // 6. VALIDACIÓN DE IMÁGENES EN DISCO
        if let Some(image_fault) = self.validate_images(&reading) {
            queue_repository.mark_dead(message.id, &image_fault).await?;
            return Ok(());
        }

        // 7. RECLAMO REAL: CAS A SENDING
        if !queue_repository.mark_sending(message.id).await? {
            warn!("⚠️ [SENDER]: Mensaje {} reclamado por otra pasada", message.id);
            return Ok(());
        }

        // 8. CARGA DE IMÁGENES (el fichero pudo desvanecerse tras la validación)
        let image_store = &self.application_state.image_store;
        let img_matricula_b64 = match reading.image_ocr_path.as_deref() {
            Some(stored_path) => match image_store.read_bytes(stored_path).await {
                Ok(bytes) => BASE64_STANDARD.encode(bytes),
                Err(read_fault) => {
                    queue_repository
                        .mark_dead(message.id, &format!("NO_IMAGE_FILE_RUNTIME: {read_fault}"))
                        .await?;
                    return Ok(());
                }
            },
            None => {
                queue_repository.mark_dead(message.id, "NO_IMAGE_AVAILABLE_OCR").await?;
                return Ok(());
            }
        };

        let img_context_b64 = match (reading.has_image_ctx, reading.image_ctx_path.as_deref()) {
            (true, Some(stored_path)) => match image_store.read_bytes(stored_path).await {
                Ok(bytes) => BASE64_STANDARD.encode(bytes),
                Err(read_fault) => {
                    queue_repository
                        .mark_dead(message.id, &format!("NO_IMAGE_FILE_RUNTIME: {read_fault}"))
                        .await?;
                    return Ok(());
                }
            },
            // El contrato exige el elemento imgContext aunque viaje vacío.
            _ => String::new(),
        };

        // 9. FIRMA WS-SECURITY (envelope fresco por intento)
        let signing_material = match SigningMaterial::from_pem_files(
            &client_cert_path.to_string_lossy(),
            &key_path.to_string_lossy(),
        ) {
            Ok(material) => material,
            Err(certificate_fault) => {
                queue_repository
                    .mark_dead(message.id, &format!("CERTIFICADO_ILEGIBLE: {certificate_fault}"))
                    .await?;
                return Ok(());
            }
        };

        let matricula_request =
            MatriculaRequest::from_reading(&reading, &profile.camera, img_matricula_b64, img_context_b64);

        let signed_envelope = match signing_material.sign_envelope(&matricula_request, Utc::now()) {
            Ok(envelope) => envelope,
            Err(signing_fault) => {
                queue_repository
                    .mark_dead(message.id, &format!("FIRMA_FALLIDA: {signing_fault}"))
                    .await?;
                return Ok(());
            }
        };

        // 10. TRANSPORTE mTLS
        let timeout = Duration::from_millis(profile.timeout_ms().max(1000) as u64);
        let mossos_client = match MossosClient::new(
            endpoint.url.clone(),
            signing_material.identity_pem(),
            timeout,
        ) {
            Ok(client) => client,
            Err(client_fault) => {
                queue_repository
                    .mark_dead(message.id, &format!("IDENTIDAD_MTLS_INVALIDA: {client_fault}"))
                    .await?;
                return Ok(());
            }
        };

        let send_started = std::time::Instant::now();
        let outcome = mossos_client.send_signed_envelope(&signed_envelope.xml).await;
        let duration_ms = send_started.elapsed().as_millis();

        info!(
            "🚚 [SENDER]: Resultado envío lectura {} (msg_id={}): {} duración={}ms",
            reading.id, message.id, outcome_label(&outcome), duration_ms
        );

        // 11-12. TRANSICIÓN SEGÚN VEREDICTO
        match outcome {
            SendOutcome::Success { code } => {
                info!(
                    "✅ [SENDER]: Envío correcto de lectura {} (msg_id={}). codiRetorn={}",
                    reading.id, message.id, code
                );
                queue_repository.mark_success_and_purge(message.id).await?;
            }
            SendOutcome::Transient { reason } => {
                if message.attempts + 1 < retry_max {
                    let next_retry_at = Utc::now() + ChronoDuration::milliseconds(backoff_ms);
                    queue_repository.mark_failed(message.id, &reason, next_retry_at).await?;
                } else {
                    queue_repository
                        .mark_dead(message.id, &format!("MAX_REINTENTOS_AGOTADOS: {reason}"))
                        .await?;
                }
            }
            SendOutcome::Permanent { reason } => {
                queue_repository.mark_dead(message.id, &reason).await?;
            }
        }

        Ok(())
    }

    /// Rutas PEM efectivas del certificado: relativas se anclan a CERTS_DIR.
    fn resolve_certificate_paths(&self, certificate: &Certificate) -> Option<(PathBuf, PathBuf)> {
        let client_cert = certificate.client_cert_path.as_deref().filter(|path| !path.is_empty())?;
        let key = certificate.key_path.as_deref().filter(|path| !path.is_empty())?;
        Some((self.anchor_to_certs_dir(client_cert), self.anchor_to_certs_dir(key)))
    }

    fn anchor_to_certs_dir(&self, raw_path: &str) -> PathBuf {
        let candidate = PathBuf::from(raw_path);
        if candidate.is_absolute() {
            candidate
        } else {
            self.application_state.settings.certs_dir.join(candidate)
        }
    }

    /// Contrato de reintentos: endpoint si define valores, defaults de
    /// configuración en caso contrario.
    fn resolve_retry_config(&self, profile: &RoutingProfile) -> (i64, i64) {
        let settings = &self.application_state.settings;
        match &profile.endpoint {
            Some(endpoint) => (
                if endpoint.retry_max > 0 {
                    endpoint.retry_max
                } else {
                    settings.sender_default_retry_max
                },
                if endpoint.retry_backoff_ms > 0 {
                    endpoint.retry_backoff_ms
                } else {
                    settings.sender_default_backoff_ms
                },
            ),
            None => (settings.sender_default_retry_max, settings.sender_default_backoff_ms),
        }
    }

    /// La imagen OCR es obligatoria y debe existir físicamente; la de
    /// contexto solo cuando la lectura declara tenerla. Una imagen
    /// ausente no puede reaparecer: el veredicto es DEAD.
    fn validate_images(&self, reading: &centinela_domain_models::AlprReading) -> Option<String> {
        let image_store = &self.application_state.image_store;

        let Some(ocr_path) = reading.image_ocr_path.as_deref().filter(|_| reading.has_image_ocr)
        else {
            return Some("NO_IMAGE_AVAILABLE_OCR".to_string());
        };
        if !image_store.exists(ocr_path) {
            return Some(format!(
                "NO_IMAGE_FILE_OCR:{}",
                image_store.resolve(ocr_path).display()
            ));
        }

        if reading.has_image_ctx {
            let Some(ctx_path) = reading.image_ctx_path.as_deref() else {
                return Some("NO_IMAGE_AVAILABLE_CTX".to_string());
            };
            if !image_store.exists(ctx_path) {
                return Some(format!(
                    "NO_IMAGE_FILE_CTX:{}",
                    image_store.resolve(ctx_path).display()
                ));
            }
        }

        None
    }
}

fn outcome_label(outcome: &SendOutcome) -> &'static str {
    match outcome {
        SendOutcome::Success { .. } => "SUCCESS",
        SendOutcome::Transient { .. } => "TRANSIENT",
        SendOutcome::Permanent { .. } => "PERMANENT",
    }
}
