// [tests/mirror/libs/infra/db/queue_lifecycle.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL CICLO DE VIDA DE LA COLA
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DE TRANSICIONES ACID
 *                  [PENDING -> SENDING -> {PURGA | FAILED | DEAD}]
 *
 * El ledger actúa como semáforo atómico: el CAS a SENDING garantiza
 * como máximo un envío en vuelo por mensaje, y la purga de éxito no
 * deja rastro de lectura, cola ni imágenes.
 * =================================================================
 */

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use centinela_domain_models::{MessageStatus, NormalizedReading};
use centinela_infra_db::repositories::{MetricsRepository, QueueRepository, ReadingRepository};
use centinela_infra_db::LedgerClient;
use centinela_infra_imagestore::ImageStore;
use chrono::{Duration, TimeZone, Utc};

async fn seed_fixture(
    anchor_url: &str,
    image_root: &std::path::Path,
) -> (LedgerClient, ImageStore, i64, i64) {
    let client = LedgerClient::connect(anchor_url, None).await.expect("ancla en memoria");
    let image_store = ImageStore::new(image_root);

    let connection = client.get_connection().unwrap();
    connection
        .execute("INSERT INTO municipalities (name) VALUES ('Granollers')", ())
        .await
        .unwrap();
    connection
        .execute(
            "INSERT INTO cameras (serial_number, codigo_lector, municipality_id) VALUES ('DEV-001', 'L001', 1)",
            (),
        )
        .await
        .unwrap();

    let normalized = NormalizedReading {
        plate: "1234ABC".into(),
        device_sn: "DEV-001".into(),
        timestamp_utc: Utc.with_ymd_and_hms(2024, 4, 30, 12, 34, 56).unwrap(),
        direction: None,
        lane_id: None,
        lane_descr: None,
        ocr_score: None,
        country_code: None,
        country: None,
        bbox_min_x: None,
        bbox_min_y: None,
        bbox_max_x: None,
        bbox_max_y: None,
        char_height: None,
        has_image_ocr: true,
        has_image_ctx: true,
        image_ocr_b64: Some(BASE64_STANDARD.encode(b"ocr")),
        image_ctx_b64: Some(BASE64_STANDARD.encode(b"ctx")),
        raw_xml: None,
    };

    let readings = ReadingRepository::new(client.clone(), image_store.clone());
    let (reading_id, queue_id) = readings.save_reading(&normalized).await.unwrap();

    (client, image_store, reading_id, queue_id)
}

#[tokio::test]
async fn certify_sending_cas_grants_single_claim() {
    println!("\n🗄️  [INICIO]: Auditoría del CAS a SENDING...");

    let workspace = tempfile::tempdir().unwrap();
    let (client, image_store, _, queue_id) =
        seed_fixture("file:mem_queue_cas?mode=memory&cache=shared", workspace.path()).await;
    let queue = QueueRepository::new(client, image_store);

    let candidates = queue.claim_pending(50).await.unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].id, queue_id);
    assert_eq!(candidates[0].status, MessageStatus::Pending);

    // Primer reclamo gana; el segundo debe perder.
    assert!(queue.mark_sending(queue_id).await.unwrap());
    assert!(!queue.mark_sending(queue_id).await.unwrap());

    // Una fila SENDING nunca vuelve a ser candidata.
    assert!(queue.claim_pending(50).await.unwrap().is_empty());

    println!("🏁 [INFORME]: Exclusividad de reclamo certificada.");
}

#[tokio::test]
async fn certify_backoff_window_gates_retries_and_attempts_grow() {
    let workspace = tempfile::tempdir().unwrap();
    let (client, image_store, _, queue_id) =
        seed_fixture("file:mem_queue_backoff?mode=memory&cache=shared", workspace.path()).await;
    let queue = QueueRepository::new(client, image_store);

    assert!(queue.mark_sending(queue_id).await.unwrap());

    // Fallo transitorio con ventana futura: fuera del alcance del claim.
    queue
        .mark_failed(queue_id, "HTTP 503", Utc::now() + Duration::seconds(30))
        .await
        .unwrap();

    let gated = queue.claim_pending(50).await.unwrap();
    assert!(gated.is_empty(), "la ventana futura debe posponer el mensaje");

    let message = queue.fetch_message(queue_id).await.unwrap().unwrap();
    assert_eq!(message.status, MessageStatus::Failed);
    assert_eq!(message.attempts, 1);
    assert_eq!(message.last_error.as_deref(), Some("HTTP 503"));

    // Ventana vencida: vuelve a ser candidato y el CAS funciona desde FAILED.
    queue
        .mark_failed(queue_id, "HTTP 503", Utc::now() - Duration::seconds(1))
        .await
        .unwrap();
    let due = queue.claim_pending(50).await.unwrap();
    assert_eq!(due.len(), 1);
    assert!(queue.mark_sending(queue_id).await.unwrap());

    // Veredicto terminal: intentos estrictamente monótonos.
    queue.mark_dead(queue_id, "CODI_RETORN_2").await.unwrap();
    let dead = queue.fetch_message(queue_id).await.unwrap().unwrap();
    assert_eq!(dead.status, MessageStatus::Dead);
    assert_eq!(dead.attempts, 3);
    assert_eq!(dead.last_error.as_deref(), Some("CODI_RETORN_2"));
}

#[tokio::test]
async fn certify_success_purge_leaves_no_trace() {
    let workspace = tempfile::tempdir().unwrap();
    let (client, image_store, reading_id, queue_id) =
        seed_fixture("file:mem_queue_purge?mode=memory&cache=shared", workspace.path()).await;

    let readings = ReadingRepository::new(client.clone(), image_store.clone());
    let stored = readings.fetch_reading(reading_id).await.unwrap().unwrap();
    let ocr_path = stored.image_ocr_path.clone().unwrap();
    let ctx_path = stored.image_ctx_path.clone().unwrap();
    assert!(image_store.exists(&ocr_path) && image_store.exists(&ctx_path));

    let queue = QueueRepository::new(client.clone(), image_store.clone());
    assert!(queue.mark_sending(queue_id).await.unwrap());
    queue.mark_success_and_purge(queue_id).await.unwrap();

    // Sin fila de cola, sin lectura, sin imágenes.
    assert!(queue.fetch_message(queue_id).await.unwrap().is_none());
    assert!(readings.fetch_reading(reading_id).await.unwrap().is_none());
    assert!(!image_store.exists(&ocr_path));
    assert!(!image_store.exists(&ctx_path));

    // El sello de último envío queda en la cámara.
    let connection = client.get_connection().unwrap();
    let mut rows = connection
        .query("SELECT last_sent_at FROM cameras WHERE serial_number = 'DEV-001'", ())
        .await
        .unwrap();
    let row = rows.next().await.unwrap().unwrap();
    let last_sent_at = row.get::<String>(0).expect("last_sent_at sellado");
    assert!(!last_sent_at.is_empty());

    let counters = MetricsRepository::new(client).queue_counters().await.unwrap();
    assert_eq!(counters.total_readings, 0);
    assert_eq!(counters.pending_messages, 0);
}

#[tokio::test]
async fn certify_dead_letter_retention_purge() {
    let workspace = tempfile::tempdir().unwrap();
    let (client, image_store, reading_id, queue_id) =
        seed_fixture("file:mem_queue_dead?mode=memory&cache=shared", workspace.path()).await;

    let readings = ReadingRepository::new(client.clone(), image_store.clone());
    let stored = readings.fetch_reading(reading_id).await.unwrap().unwrap();
    let ocr_path = stored.image_ocr_path.clone().unwrap();

    let queue = QueueRepository::new(client.clone(), image_store.clone());
    queue.mark_dead(queue_id, "ENDPOINT_NO_CONFIGURADO").await.unwrap();

    // Dentro de retención: la autopsia se conserva.
    let kept = queue
        .purge_dead_older_than(Utc::now() - Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(kept, 0);
    assert!(queue.fetch_message(queue_id).await.unwrap().is_some());

    // Vencida la retención: fila, lectura e imágenes desaparecen.
    let purged = queue
        .purge_dead_older_than(Utc::now() + Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(purged, 1);
    assert!(queue.fetch_message(queue_id).await.unwrap().is_none());
    assert!(readings.fetch_reading(reading_id).await.unwrap().is_none());
    assert!(!image_store.exists(&ocr_path));
}
