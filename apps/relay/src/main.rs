// [apps/relay/src/main.rs]
/*!
 * =================================================================
 * APARATO: RELAY MAIN ENTRY POINT
 * CLASIFICACIÓN: APPLICATION SHELL (ESTRATO L3)
 * RESPONSABILIDAD: BOOTSTRAP DE INFRAESTRUCTURA E IGNICIÓN SEGURA
 *
 * La ignición del ledger ocurre antes de levantar cualquier servicio:
 * ningún worker puede reclamar mensajes de una cola aún no
 * solidificada.
 * =================================================================
 */

use centinela_relay::prelude::*;
use centinela_shared_atalaya::init_tracing;
use dotenvy::dotenv;
use tracing::{error, info};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. CARGA DE ENTORNO
    dotenv().ok();

    // 2. ADQUISICIÓN DE CONFIGURACIÓN
    let settings = Settings::from_env();

    // 3. OBSERVABILIDAD (consola + cubos de 30 minutos en disco)
    init_tracing("centinela_relay", Some(settings.log_dir.clone()));

    // 4. RUNTIME ASÍNCRONO
    let relay_runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    relay_runtime.block_on(async {
        info!("🛰️  [RELAY]: Secuencia de ignición global iniciada...");

        let kernel_instance = match RelayKernel::ignite(settings).await {
            Ok(kernel) => kernel,
            Err(ignition_fault) => {
                error!("💀 [RELAY]: Colapso en la ignición: {ignition_fault}");
                std::process::exit(1);
            }
        };

        if let Err(runtime_fault) = kernel_instance.launch_operations().await {
            error!("💀 [RELAY]: Fallo en operaciones: {runtime_fault}");
            std::process::exit(1);
        }

        Ok(())
    })
}
