// [apps/relay/src/services/fsutil.rs]
/*!
 * =================================================================
 * APARATO: FILESYSTEM GATES
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: ESTABILIDAD DE ESCRITURA Y SELECCIÓN FIFO
 *
 * Primitivas compartidas por el espejo y el procesador. El escritor
 * concurrente (proceso de captura del fabricante) no señala el cierre
 * de fichero, así que la única verdad disponible es que el tamaño
 * deje de moverse durante la ventana exigida.
 * =================================================================
 */

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use tokio::time::sleep;

/// Periodo de sondeo del tamaño durante la espera de estabilidad.
const STABILITY_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Tope absoluto de espera: un fichero que no se estabiliza en este
/// margen se considera perdido en esta pasada (la reconciliación o el
/// siguiente ciclo lo recogerán).
const STABILITY_HARD_CAP: Duration = Duration::from_secs(30);

/// Espera a que el tamaño del fichero permanezca inmóvil durante
/// `stability_window`. Devuelve false si el fichero desaparece o el
/// tope absoluto se agota.
pub async fn wait_stable(path: &Path, stability_window: Duration) -> bool {
    let wait_started = Instant::now();
    let mut last_observed_size: Option<u64> = None;
    let mut stable_since = Instant::now();

    loop {
        let current_size = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata.len(),
            // Desaparecido a mitad de escritura: el origen lo retiró.
            Err(_) => return false,
        };

        match last_observed_size {
            Some(previous_size) if previous_size == current_size => {
                if stable_since.elapsed() >= stability_window {
                    return true;
                }
            }
            _ => {
                last_observed_size = Some(current_size);
                stable_since = Instant::now();
            }
        }

        if wait_started.elapsed() >= STABILITY_HARD_CAP {
            return false;
        }

        sleep(STABILITY_POLL_INTERVAL).await;
    }
}

/// Fichero regular más antiguo por mtime con la extensión dada.
pub fn oldest_file_with_extension(directory: &Path, extension: &str) -> Option<PathBuf> {
    let entries = std::fs::read_dir(directory).ok()?;

    let mut oldest: Option<(SystemTime, PathBuf)> = None;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|ext| ext.to_str()) != Some(extension) {
            continue;
        }
        let modified_at = match entry.metadata().and_then(|metadata| metadata.modified()) {
            Ok(modified_at) => modified_at,
            Err(_) => continue,
        };

        match &oldest {
            Some((current_oldest, _)) if *current_oldest <= modified_at => {}
            _ => oldest = Some((modified_at, path)),
        }
    }

    oldest.map(|(_, path)| path)
}

/// Búsqueda recursiva de un nombre de fichero exacto bajo una raíz.
pub fn find_by_basename(root: &Path, basename: &str) -> Option<PathBuf> {
    let direct_candidate = root.join(basename);
    if direct_candidate.is_file() {
        return Some(direct_candidate);
    }

    let mut pending_directories = vec![root.to_path_buf()];
    while let Some(directory) = pending_directories.pop() {
        let Ok(entries) = std::fs::read_dir(&directory) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                pending_directories.push(path);
            } else if path.file_name().and_then(|name| name.to_str()) == Some(basename) {
                return Some(path);
            }
        }
    }
    None
}
