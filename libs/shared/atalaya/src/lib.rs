// [libs/shared/atalaya/src/lib.rs]
/*!
 * =================================================================
 * APARATO: ATALAYA OBSERVER
 * CLASIFICACIÓN: SHARED UTILITY (ESTRATO L4)
 * RESPONSABILIDAD: GESTIÓN DE TRAZAS, LOGS EN DISCO Y CAPTURA DE PÁNICOS
 *
 * La arquitectura de registro garantiza que el rastro de ejecución se
 * preserve ante una terminación abrupta del host de infraestructura:
 * el hook de pánico vuelca ubicación y payload antes de la defunción
 * del proceso, y la capa de fichero escribe en cubos de 30 minutos
 * para que el janitor de logs pueda aplicar retención por mtime.
 * =================================================================
 */

pub mod bucketed;

use std::panic;
use std::path::PathBuf;

use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as formatting_layer, EnvFilter};

pub use bucketed::BucketedLogWriter;

/// Inicializa el sistema de trazas del relé con blindaje de pánicos.
///
/// # Comportamiento:
/// - Desarrollo: logs compactos en consola.
/// - Producción: estructura JSON plana para ingesta externa.
/// - Con `file_log_root`: capa adicional en disco, un fichero por
///   categoría y cubo de 30 minutos (`LOG_DIR/<categoria>/YYYYMMDD_HHMM.log`).
///
/// # Errors:
/// Provoca pánico si otro suscriptor global ya fue inicializado.
pub fn init_tracing(service_nominal_identifier: &str, file_log_root: Option<PathBuf>) {
    // Priorizamos los logs del dominio y silenciamos ruido de infraestructura.
    let environmental_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "{}={level},tower_http=warn,hyper=warn,libsql=error",
            service_nominal_identifier,
            level = if cfg!(debug_assertions) { "debug" } else { "info" }
        )
        .into()
    });

    let is_production_strata = !cfg!(debug_assertions);

    if is_production_strata {
        let disk_layer = file_log_root.map(|log_root_directory| {
            formatting_layer::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(BucketedLogWriter::new(log_root_directory))
        });

        tracing_subscriber::registry()
            .with(environmental_filter)
            .with(formatting_layer::layer().json().flatten_event(true))
            .with(disk_layer)
            .init();
    } else {
        let disk_layer = file_log_root.map(|log_root_directory| {
            formatting_layer::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(BucketedLogWriter::new(log_root_directory))
        });

        tracing_subscriber::registry()
            .with(environmental_filter)
            .with(formatting_layer::layer().compact().with_target(false))
            .with(disk_layer)
            .init();
    }

    install_panic_shield(service_nominal_identifier);

    info!(
        "👁️  [ATALAYA_ONLINE]: Observability strata levelized for [{}].",
        service_nominal_identifier
    );
}

/// Hook global de pánico: captura colapsos en hilos secundarios
/// (mirror, sender, janitors) y deja rastro forense antes de morir.
fn install_panic_shield(service_nominal_identifier: &str) {
    let service_id_snapshot = service_nominal_identifier.to_string();

    panic::set_hook(Box::new(move |panic_metadata| {
        let panic_location = panic_metadata
            .location()
            .map(|location| format!("{}:{}:{}", location.file(), location.line(), location.column()))
            .unwrap_or_else(|| "UNKNOWN_STRATA_COORDINATES".to_string());

        let panic_payload_message = panic_metadata
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| {
                panic_metadata
                    .payload()
                    .downcast_ref::<String>()
                    .map(|message| message.as_str())
            })
            .unwrap_or("UNDEFINED_KERNEL_COLLAPSE_PAYLOAD");

        error!(
            target: "panic_monitor",
            service = %service_id_snapshot,
            estrato = %panic_location,
            "🔥 [CRITICAL_PANIC]: Thread terminated abruptly. Analysis: {}",
            panic_payload_message
        );
    }));
}
