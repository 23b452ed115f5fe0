// [apps/relay/src/services/janitor.rs]
/*!
 * =================================================================
 * APARATO: JANITOR FLEET (C10)
 * CLASIFICACIÓN: BACKGROUND INFRASTRUCTURE SERVICE (ESTRATO L4)
 * RESPONSABILIDAD: RETENCIÓN TEMPORAL DE FICHEROS Y FILAS DEAD
 *
 * Cada barredor es una tarea independiente con su intervalo y su
 * retención: lista ficheros, consulta mtime y desenlaza lo vencido,
 * tolerando desapariciones concurrentes. Solo emite resumen cuando
 * borró algo. El barredor de DEAD opera sobre el ledger: filas
 * terminales vencidas se purgan junto a su lectura e imágenes.
 * =================================================================
 */

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// Barredor de un directorio con retención por mtime.
pub struct DirectoryJanitor {
    pub label: &'static str,
    pub target_directory: PathBuf,
    pub retention: Duration,
    pub sweep_interval: Duration,
    pub recursive: bool,
}

impl DirectoryJanitor {
    /// Flota completa de barredores de directorio según la matriz de
    /// retenciones de configuración.
    pub fn build_fleet(application_state: &AppState) -> Vec<DirectoryJanitor> {
        let settings = &application_state.settings;
        vec![
            DirectoryJanitor {
                label: "espejo",
                target_directory: settings.cloned_dir.clone(),
                retention: Duration::from_secs(settings.retention_cloned_minutes * 60),
                sweep_interval: Duration::from_secs(600),
                recursive: false,
            },
            DirectoryJanitor {
                label: "logs",
                target_directory: settings.log_dir.clone(),
                retention: Duration::from_secs(settings.retention_log_hours * 3600),
                sweep_interval: Duration::from_secs(300),
                recursive: true,
            },
            DirectoryJanitor {
                label: "sender-failed",
                target_directory: settings.sender_failed_dir.clone(),
                retention: Duration::from_secs(settings.retention_failed_hours * 3600),
                sweep_interval: Duration::from_secs(3600),
                recursive: false,
            },
            DirectoryJanitor {
                label: "sender-pending",
                target_directory: settings.sender_pending_dir.clone(),
                retention: Duration::from_secs(settings.retention_pending_hours * 3600),
                sweep_interval: Duration::from_secs(3600),
                recursive: false,
            },
            DirectoryJanitor {
                label: "ingest",
                target_directory: settings.ingest_json_dir.clone(),
                retention: Duration::from_secs(settings.retention_ingest_hours * 3600),
                sweep_interval: Duration::from_secs(3600),
                recursive: false,
            },
            DirectoryJanitor {
                label: "imagenes",
                target_directory: settings.images_dir.clone(),
                retention: Duration::from_secs(settings.retention_images_hours * 3600),
                sweep_interval: Duration::from_secs(3600),
                recursive: true,
            },
        ]
    }

    pub async fn run(self, mut shutdown_signal: watch::Receiver<bool>) {
        let mut sweep_ticker = interval(self.sweep_interval);
        debug!(
            "🧹 [CLEANUP][{}]: Barredor activo sobre {:?} (retención {:?})",
            self.label, self.target_directory, self.retention
        );

        loop {
            tokio::select! {
                _ = shutdown_signal.changed() => break,
                _ = sweep_ticker.tick() => {
                    let deleted_count = sweep_directory(&self.target_directory, self.retention, self.recursive);
                    if deleted_count > 0 {
                        info!(
                            "🧹 [CLEANUP][{}]: {} ficheros purgados de {:?}",
                            self.label, deleted_count, self.target_directory
                        );
                    }
                }
            }
        }
    }
}

/// Barrido por mtime. Las carreras (fichero desvanecido entre listado
/// y unlink) se absorben en silencio.
pub fn sweep_directory(target_directory: &Path, retention: Duration, recursive: bool) -> usize {
    let mut deleted_count = 0usize;
    let mut pending_directories = vec![target_directory.to_path_buf()];

    while let Some(current_directory) = pending_directories.pop() {
        let Ok(directory_entries) = std::fs::read_dir(&current_directory) else {
            continue;
        };

        for entry in directory_entries.flatten() {
            let entry_path = entry.path();

            if entry_path.is_dir() {
                if recursive {
                    pending_directories.push(entry_path);
                }
                continue;
            }

            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            let Ok(modified_at) = metadata.modified() else {
                continue;
            };

            let expired = SystemTime::now()
                .duration_since(modified_at)
                .map(|age| age >= retention)
                .unwrap_or(false);

            if expired {
                match std::fs::remove_file(&entry_path) {
                    Ok(()) => deleted_count += 1,
                    Err(unlink_fault) if unlink_fault.kind() == std::io::ErrorKind::NotFound => {}
                    Err(unlink_fault) => {
                        warn!("⚠️ [CLEANUP]: No se pudo borrar {:?}: {}", entry_path, unlink_fault);
                    }
                }
            }
        }
    }

    deleted_count
}

/// Barredor del ledger: purga filas DEAD vencidas con su lectura y
/// sus imágenes.
pub struct DeadLetterJanitor {
    application_state: AppState,
}

impl DeadLetterJanitor {
    pub fn new(application_state: AppState) -> Self {
        Self { application_state }
    }

    pub async fn run(self, mut shutdown_signal: watch::Receiver<bool>) {
        let retention_hours = self.application_state.settings.dead_retention_hours;
        let mut sweep_ticker = interval(Duration::from_secs(3600));

        loop {
            tokio::select! {
                _ = shutdown_signal.changed() => break,
                _ = sweep_ticker.tick() => {
                    let cutoff = Utc::now() - chrono::Duration::hours(retention_hours as i64);
                    match self.application_state.queue().purge_dead_older_than(cutoff).await {
                        Ok(purged_count) if purged_count > 0 => {
                            info!("🧹 [CLEANUP][dead]: {} mensajes DEAD purgados del ledger", purged_count);
                        }
                        Ok(_) => {}
                        Err(database_fault) => {
                            warn!("⚠️ [CLEANUP][dead]: Barrido fallido: {}", database_fault);
                        }
                    }
                }
            }
        }
    }
}
