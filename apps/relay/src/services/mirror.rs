// [apps/relay/src/services/mirror.rs]
/*!
 * =================================================================
 * APARATO: CAPTURE MIRROR (C3)
 * CLASIFICACIÓN: BACKGROUND INFRASTRUCTURE SERVICE (ESTRATO L4)
 * RESPONSABILIDAD: COPIA ESTABLE DEL VOLCADO DE CAPTURAS AL ÁREA
 *                  CONSUMIBLE, AISLADA DEL ESCRITOR CONCURRENTE
 *
 * Reglas del espejo:
 * - Solo eventos de creación y movimiento programan copia. El proceso
 *   de captura emite ráfagas de modificación durante el render y esas
 *   ráfagas duplicaban trabajo.
 * - Antirrebote de 250 ms por nombre de fichero, con coalescencia al
 *   último evento, y un guard de en-vuelo: nunca dos copias
 *   concurrentes del mismo nombre.
 * - Cada copia espera estabilidad de tamaño, escribe a <dst>.tmp y
 *   renombra atómico. EACCES es permanente; el resto reintenta.
 * - Un escaneo de reconciliación cada 500 ms recoge lo que los
 *   eventos perdieron (destino ausente o tamaño desigual).
 * =================================================================
 */

use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use notify::event::ModifyKind;
use notify::{EventKind, RecursiveMode, Watcher};
use tokio::fs;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, sleep};
use tracing::{debug, error, info, warn};

use crate::services::fsutil::wait_stable;
use crate::state::AppState;

/// Cadencia del resumen operativo del espejo.
const SUMMARY_INTERVAL: Duration = Duration::from_secs(60);

/// Pausa entre reintentos de copia ante fallos de I/O no permanentes.
const COPY_RETRY_DELAY: Duration = Duration::from_millis(40);

#[derive(Default)]
struct MirrorCounters {
    copied: AtomicU64,
    skipped: AtomicU64,
    permanent_failures: AtomicU64,
    other_failures: AtomicU64,
}

impl MirrorCounters {
    fn log_summary(&self) {
        info!(
            "🪞 [MIRROR][RESUMEN] copiados={} omitidos={} fallos_perm={} fallos_otros={}",
            self.copied.load(Ordering::Relaxed),
            self.skipped.load(Ordering::Relaxed),
            self.permanent_failures.load(Ordering::Relaxed),
            self.other_failures.load(Ordering::Relaxed)
        );
    }
}

pub struct MirrorService {
    application_state: AppState,
}

impl MirrorService {
    pub fn new(application_state: AppState) -> Self {
        Self { application_state }
    }

    pub async fn run(self, mut shutdown_signal: watch::Receiver<bool>) {
        let settings = self.application_state.settings.clone();
        let source_directory = settings.mirror_src_dir.clone();
        let destination_directory = settings.cloned_dir.clone();

        for directory in [&source_directory, &destination_directory] {
            if let Err(io_fault) = fs::create_dir_all(directory).await {
                error!("💀 [MIRROR]: No se pudo crear {:?}: {}", directory, io_fault);
                return;
            }
        }

        let (event_sender, mut event_receiver) = mpsc::unbounded_channel::<PathBuf>();

        // El watcher notifica desde un hilo propio; el canal sin límite
        // traslada las rutas al reactor sin bloquear al emisor.
        let mut filesystem_watcher = match notify::recommended_watcher(
            move |watch_result: Result<notify::Event, notify::Error>| {
                let Ok(event) = watch_result else { return };
                let schedules_copy = matches!(
                    event.kind,
                    EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(_))
                );
                if schedules_copy {
                    for event_path in event.paths {
                        let _ = event_sender.send(event_path);
                    }
                }
            },
        ) {
            Ok(watcher) => Some(watcher),
            Err(watcher_fault) => {
                warn!(
                    "⚠️ [MIRROR]: Watcher no disponible ({}). Modo solo-escaneo.",
                    watcher_fault
                );
                None
            }
        };

        if let Some(watcher) = filesystem_watcher.as_mut() {
            if let Err(watch_fault) = watcher.watch(&source_directory, RecursiveMode::NonRecursive) {
                warn!(
                    "⚠️ [MIRROR]: No se pudo vigilar {:?} ({}). Modo solo-escaneo.",
                    source_directory, watch_fault
                );
                filesystem_watcher = None;
            }
        }
        // El watcher debe sobrevivir al loop: su drop detiene los eventos.
        let _watcher_anchor = filesystem_watcher;

        let counters = Arc::new(MirrorCounters::default());
        let in_flight_copies: Arc<Mutex<HashSet<OsString>>> = Arc::new(Mutex::new(HashSet::new()));
        let mut debounce_registry: HashMap<OsString, Instant> = HashMap::new();

        let mut scan_ticker = interval(Duration::from_millis(settings.mirror_scan_interval_ms));
        let mut summary_ticker = interval(SUMMARY_INTERVAL);

        info!(
            "🪞 [MIRROR]: Espejo activo {:?} -> {:?} (estabilidad={}ms, antirrebote={}ms)",
            source_directory, destination_directory, settings.mirror_stability_ms, settings.mirror_debounce_ms
        );

        loop {
            tokio::select! {
                _ = shutdown_signal.changed() => {
                    info!("🛑 [MIRROR]: Señal de apagado recibida.");
                    break;
                }
                received_path = event_receiver.recv() => {
                    if let Some(source_path) = received_path {
                        self.schedule_copy(source_path, &mut debounce_registry, &in_flight_copies, &counters);
                    }
                }
                _ = scan_ticker.tick() => {
                    self.reconciliation_scan(&mut debounce_registry, &in_flight_copies, &counters);
                }
                _ = summary_ticker.tick() => {
                    counters.log_summary();
                }
            }
        }
    }

    /// Programa una copia respetando antirrebote y guard de en-vuelo.
    fn schedule_copy(
        &self,
        source_path: PathBuf,
        debounce_registry: &mut HashMap<OsString, Instant>,
        in_flight_copies: &Arc<Mutex<HashSet<OsString>>>,
        counters: &Arc<MirrorCounters>,
    ) {
        let Some(filename) = source_path.file_name().map(OsString::from) else {
            return;
        };
        // Nunca copiamos temporales: ni los nuestros ni los del escritor.
        if filename.to_string_lossy().ends_with(".tmp") {
            return;
        }

        let debounce_window = Duration::from_millis(self.application_state.settings.mirror_debounce_ms);
        if let Some(last_scheduled_at) = debounce_registry.get(&filename) {
            if last_scheduled_at.elapsed() < debounce_window {
                // Ráfaga coalescida: el trabajo ya programado cubrirá este evento.
                return;
            }
        }
        debounce_registry.insert(filename.clone(), Instant::now());
        debounce_registry.retain(|_, scheduled_at| scheduled_at.elapsed() < Duration::from_secs(300));

        {
            let mut in_flight_guard = in_flight_copies.lock().expect("mirror in-flight lock");
            if !in_flight_guard.insert(filename.clone()) {
                return;
            }
        }

        let destination_directory = self.application_state.settings.cloned_dir.clone();
        let stability_window = Duration::from_millis(self.application_state.settings.mirror_stability_ms);
        let retry_budget = self.application_state.settings.mirror_copy_retry_max;
        let counters_ref = counters.clone();
        let in_flight_ref = in_flight_copies.clone();

        tokio::spawn(async move {
            copy_exact_name(
                &source_path,
                &destination_directory,
                stability_window,
                retry_budget,
                &counters_ref,
            )
            .await;

            in_flight_ref
                .lock()
                .expect("mirror in-flight lock")
                .remove(&filename);
        });
    }

    /// Red de seguridad: encola cualquier origen cuyo destino falte o
    /// difiera en tamaño, con el mismo antirrebote y guard.
    fn reconciliation_scan(
        &self,
        debounce_registry: &mut HashMap<OsString, Instant>,
        in_flight_copies: &Arc<Mutex<HashSet<OsString>>>,
        counters: &Arc<MirrorCounters>,
    ) {
        let source_directory = &self.application_state.settings.mirror_src_dir;
        let destination_directory = &self.application_state.settings.cloned_dir;

        let Ok(directory_entries) = std::fs::read_dir(source_directory) else {
            return;
        };

        for entry in directory_entries.flatten() {
            let source_path = entry.path();
            if !source_path.is_file() {
                continue;
            }
            let Some(filename) = source_path.file_name() else {
                continue;
            };
            if filename.to_string_lossy().ends_with(".tmp") {
                continue;
            }

            let destination_path = destination_directory.join(filename);
            let needs_copy = match (entry.metadata(), std::fs::metadata(&destination_path)) {
                (Ok(source_meta), Ok(destination_meta)) => source_meta.len() != destination_meta.len(),
                (Ok(_), Err(_)) => true,
                // Origen desvanecido entre el listado y el stat.
                (Err(_), _) => false,
            };

            if needs_copy {
                self.schedule_copy(source_path, debounce_registry, in_flight_copies, counters);
            }
        }
    }
}

/// Copia un fichero conservando su nombre exacto, con puerta de
/// estabilidad, omisión por tamaño idéntico y renombrado atómico.
async fn copy_exact_name(
    source_path: &Path,
    destination_directory: &Path,
    stability_window: Duration,
    retry_budget: u32,
    counters: &MirrorCounters,
) {
    if !wait_stable(source_path, stability_window).await {
        debug!("🪞 [MIRROR]: Origen inestable o desvanecido: {:?}", source_path);
        counters.other_failures.fetch_add(1, Ordering::Relaxed);
        return;
    }

    let Some(filename) = source_path.file_name() else {
        return;
    };
    let destination_path = destination_directory.join(filename);

    let source_size = match fs::metadata(source_path).await {
        Ok(metadata) => metadata.len(),
        Err(_) => {
            counters.other_failures.fetch_add(1, Ordering::Relaxed);
            return;
        }
    };

    if let Ok(destination_meta) = fs::metadata(&destination_path).await {
        if destination_meta.len() == source_size {
            debug!("🪞 [MIRROR]: skip_same {:?}", filename);
            counters.skipped.fetch_add(1, Ordering::Relaxed);
            return;
        }
    }

    let temporary_path = PathBuf::from(format!("{}.tmp", destination_path.display()));

    let mut attempt_index: u32 = 0;
    loop {
        match attempt_copy(source_path, &temporary_path, &destination_path).await {
            Ok(()) => {
                debug!("🪞 [MIRROR]: Copiado {:?}", filename);
                counters.copied.fetch_add(1, Ordering::Relaxed);
                return;
            }
            Err(copy_fault) if copy_fault.kind() == std::io::ErrorKind::PermissionDenied => {
                warn!("🚫 [MIRROR]: EACCES permanente sobre {:?}: {}", filename, copy_fault);
                counters.permanent_failures.fetch_add(1, Ordering::Relaxed);
                return;
            }
            Err(copy_fault) => {
                if attempt_index >= retry_budget {
                    warn!(
                        "⚠️ [MIRROR]: Copia de {:?} agotó {} reintentos: {}",
                        filename, retry_budget, copy_fault
                    );
                    counters.other_failures.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                attempt_index += 1;
                sleep(COPY_RETRY_DELAY).await;
            }
        }
    }
}

async fn attempt_copy(
    source_path: &Path,
    temporary_path: &Path,
    destination_path: &Path,
) -> std::io::Result<()> {
    fs::copy(source_path, temporary_path).await?;
    fs::rename(temporary_path, destination_path).await?;
    Ok(())
}
