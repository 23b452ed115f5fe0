// [libs/shared/atalaya/src/bucketed.rs]
/*!
 * =================================================================
 * APARATO: BUCKETED LOG WRITER
 * CLASIFICACIÓN: SHARED UTILITY (ESTRATO L4)
 * RESPONSABILIDAD: ENRUTADO DE EVENTOS A FICHEROS POR CATEGORÍA Y CUBO
 *
 * Cada evento se enruta por su 'target' a una categoría operativa
 * (ingest | mirror | proc | send | cleanup | api | service) y se
 * escribe en un fichero de cubo de 30 minutos. El fichero se abre en
 * modo append por escritura: el janitor puede borrar cubos antiguos
 * sin invalidar descriptores vivos.
 * =================================================================
 */

use std::fs::{self, OpenOptions};
use std::io;
use std::path::PathBuf;

use chrono::{DateTime, Timelike, Utc};
use tracing::Metadata;
use tracing_subscriber::fmt::writer::MakeWriter;

/// Tabla estática de enrutado target -> categoría operativa.
/// El orden importa: la primera aguja que aparezca en el target gana.
const CATEGORY_ROUTING_TABLE: &[(&str, &str)] = &[
    ("sender", "send"),
    ("mossos", "send"),
    ("mirror", "mirror"),
    ("processor", "proc"),
    ("janitor", "cleanup"),
    ("transit", "ingest"),
    ("normalizer", "ingest"),
    ("ingest", "ingest"),
    ("handlers", "api"),
    ("routes", "api"),
];

const FALLBACK_CATEGORY: &str = "service";

/// Fábrica de escritores por evento para la capa de fichero de tracing.
#[derive(Clone)]
pub struct BucketedLogWriter {
    log_root_directory: PathBuf,
}

impl BucketedLogWriter {
    pub fn new(log_root_directory: impl Into<PathBuf>) -> Self {
        Self {
            log_root_directory: log_root_directory.into(),
        }
    }

    fn writer_for_category(&self, category: &str) -> BucketFileWriter {
        BucketFileWriter {
            target_file_path: self
                .log_root_directory
                .join(category)
                .join(bucket_filename(Utc::now())),
        }
    }
}

impl<'writer> MakeWriter<'writer> for BucketedLogWriter {
    type Writer = BucketFileWriter;

    fn make_writer(&'writer self) -> Self::Writer {
        self.writer_for_category(FALLBACK_CATEGORY)
    }

    fn make_writer_for(&'writer self, metadata: &Metadata<'_>) -> Self::Writer {
        self.writer_for_category(category_for_target(metadata.target()))
    }
}

/// Escritor de un solo cubo. Reabre el fichero en cada ráfaga.
pub struct BucketFileWriter {
    target_file_path: PathBuf,
}

impl io::Write for BucketFileWriter {
    fn write(&mut self, buffer: &[u8]) -> io::Result<usize> {
        if let Some(parent_directory) = self.target_file_path.parent() {
            fs::create_dir_all(parent_directory)?;
        }
        let mut bucket_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.target_file_path)?;
        io::Write::write(&mut bucket_file, buffer)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Resuelve la categoría operativa a partir del target del evento.
pub fn category_for_target(event_target: &str) -> &'static str {
    for (needle, category) in CATEGORY_ROUTING_TABLE {
        if event_target.contains(needle) {
            return category;
        }
    }
    FALLBACK_CATEGORY
}

/// Nombre de fichero del cubo de 30 minutos: `YYYYMMDD_HHMM.log`.
/// El minuto se trunca a la media hora inferior.
pub fn bucket_filename(instant: DateTime<Utc>) -> String {
    let truncated_minute = (instant.minute() / 30) * 30;
    format!(
        "{}_{:02}{:02}.log",
        instant.format("%Y%m%d"),
        instant.hour(),
        truncated_minute
    )
}
