// [tests/mirror/apps/relay/services/mirror_storm.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL ESPEJO DE CAPTURAS
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L4-MIRROR
 * RESPONSABILIDAD: TORMENTA DE EVENTOS, ESTABILIDAD Y RECONCILIACIÓN
 *
 * La tormenta reproduce al proceso de captura: crear, re-escribir en
 * ráfaga y mover. El estado estacionario exigido: el destino contiene
 * exactamente el fichero con los bytes finales del origen, sin
 * temporales residuales.
 * =================================================================
 */

use std::path::Path;
use std::time::Duration;

use centinela_infra_db::LedgerClient;
use centinela_relay::config::Settings;
use centinela_relay::services::MirrorService;
use centinela_relay::state::AppState;
use tokio::sync::watch;
use tokio::time::sleep;

fn test_settings(workspace: &Path, anchor_url: &str) -> Settings {
    Settings {
        database_url: anchor_url.to_string(),
        database_auth_token: None,
        http_port: 0,
        transit_port: 0,
        images_dir: workspace.join("images"),
        certs_dir: workspace.join("certs"),
        log_dir: workspace.join("logs"),
        ingest_json_dir: workspace.join("ingest_json"),
        sender_json_dir: workspace.join("sender_json"),
        sender_pending_dir: workspace.join("sender_pending"),
        sender_failed_dir: workspace.join("sender_failed"),
        mirror_src_dir: workspace.join("camera_out"),
        cloned_dir: workspace.join("cloned"),
        mirror_stability_ms: 150,
        mirror_debounce_ms: 150,
        mirror_copy_retry_max: 5,
        mirror_scan_interval_ms: 200,
        sender_enabled: false,
        sender_poll_interval_seconds: 1,
        sender_max_batch_size: 50,
        sender_default_retry_max: 3,
        sender_default_backoff_ms: 100,
        sender_backoff_on_fail_sec: 1,
        retention_cloned_minutes: 45,
        retention_log_hours: 4,
        retention_failed_hours: 1,
        retention_pending_hours: 1,
        retention_ingest_hours: 1,
        retention_images_hours: 48,
        dead_retention_hours: 72,
    }
}

async fn launch_mirror(workspace: &Path, anchor_url: &str) -> (AppState, watch::Sender<bool>) {
    let settings = test_settings(workspace, anchor_url);
    settings.ensure_directories().unwrap();

    let ledger_client = LedgerClient::connect(anchor_url, None).await.unwrap();
    let state = AppState::new(ledger_client, settings);

    let (shutdown_sender, shutdown_receiver) = watch::channel(false);
    let mirror = MirrorService::new(state.clone());
    tokio::spawn(mirror.run(shutdown_receiver));

    // Margen para que el watcher quede armado.
    sleep(Duration::from_millis(200)).await;
    (state, shutdown_sender)
}

#[tokio::test]
async fn certify_storm_converges_to_exact_copy() {
    println!("\n🪞 [INICIO]: Tormenta de eventos sobre frame.jpg...");

    let workspace = tempfile::tempdir().unwrap();
    let (state, shutdown_sender) = launch_mirror(
        workspace.path(),
        "file:mem_mirror_storm?mode=memory&cache=shared",
    )
    .await;

    let source_directory = state.settings.mirror_src_dir.clone();
    let destination_directory = state.settings.cloned_dir.clone();

    // Creación más ráfaga de re-escrituras dentro de la misma ventana.
    let frame_path = source_directory.join("frame.jpg");
    std::fs::write(&frame_path, b"primera").unwrap();
    for burst_index in 0..20u8 {
        std::fs::write(&frame_path, format!("rafaga-{burst_index:02}")).unwrap();
        sleep(Duration::from_millis(10)).await;
    }
    let final_bytes = b"contenido-final-estable".to_vec();
    std::fs::write(&frame_path, &final_bytes).unwrap();

    // Estado estacionario: estabilidad + copia + reconciliación.
    sleep(Duration::from_millis(1500)).await;

    let mirrored_path = destination_directory.join("frame.jpg");
    let mirrored_bytes = std::fs::read(&mirrored_path).expect("el destino debe existir");
    assert_eq!(mirrored_bytes, final_bytes, "el destino replica los bytes finales");

    // Sin temporales residuales en el destino.
    let leftover_temporaries = std::fs::read_dir(&destination_directory)
        .unwrap()
        .flatten()
        .filter(|entry| entry.path().to_string_lossy().ends_with(".tmp"))
        .count();
    assert_eq!(leftover_temporaries, 0);

    let _ = shutdown_sender.send(true);
    println!("🏁 [INFORME]: Convergencia del espejo certificada.");
}

#[tokio::test]
async fn certify_moved_in_files_are_mirrored() {
    let workspace = tempfile::tempdir().unwrap();
    let (state, shutdown_sender) = launch_mirror(
        workspace.path(),
        "file:mem_mirror_move?mode=memory&cache=shared",
    )
    .await;

    // Render fuera del directorio vigilado y movimiento atómico dentro.
    let staging_path = workspace.path().join("render-externo.jpg");
    std::fs::write(&staging_path, b"jpeg-renderizado").unwrap();
    let moved_path = state.settings.mirror_src_dir.join("render-externo.jpg");
    std::fs::rename(&staging_path, &moved_path).unwrap();

    sleep(Duration::from_millis(1200)).await;

    let mirrored = std::fs::read(state.settings.cloned_dir.join("render-externo.jpg"))
        .expect("el fichero movido debe espejarse");
    assert_eq!(mirrored, b"jpeg-renderizado");

    let _ = shutdown_sender.send(true);
}

#[tokio::test]
async fn certify_reconciliation_repairs_size_mismatch() {
    let workspace = tempfile::tempdir().unwrap();
    let (state, shutdown_sender) = launch_mirror(
        workspace.path(),
        "file:mem_mirror_heal?mode=memory&cache=shared",
    )
    .await;

    // Destino corrupto pre-existente con tamaño distinto al origen.
    let source_path = state.settings.mirror_src_dir.join("dañado.jpg");
    let destination_path = state.settings.cloned_dir.join("dañado.jpg");
    std::fs::write(&destination_path, b"truncado").unwrap();
    std::fs::write(&source_path, b"contenido-completo-del-origen").unwrap();

    sleep(Duration::from_millis(1200)).await;

    let repaired = std::fs::read(&destination_path).unwrap();
    assert_eq!(repaired, b"contenido-completo-del-origen");

    let _ = shutdown_sender.send(true);
}
