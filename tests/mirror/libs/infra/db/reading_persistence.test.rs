// [tests/mirror/libs/infra/db/reading_persistence.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE INGESTA TRANSACCIONAL
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DE save_reading (LECTURA + IMÁGENES +
 *                  COLA PENDING EN UN SOLO PASO, O NADA)
 * =================================================================
 */

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use centinela_domain_models::{MessageStatus, NormalizedReading};
use centinela_infra_db::repositories::{MetricsRepository, QueueRepository, ReadingRepository};
use centinela_infra_db::{DbError, LedgerClient};
use centinela_infra_imagestore::ImageStore;
use chrono::{TimeZone, Utc};

fn sample_reading(device_sn: &str, with_images: bool) -> NormalizedReading {
    NormalizedReading {
        plate: "1234ABC".into(),
        device_sn: device_sn.into(),
        timestamp_utc: Utc.with_ymd_and_hms(2024, 4, 30, 12, 34, 56).unwrap(),
        direction: Some("IN".into()),
        lane_id: Some(2),
        lane_descr: Some("Carril 2".into()),
        ocr_score: Some(93),
        country_code: Some("ESP".into()),
        country: Some("Spain".into()),
        bbox_min_x: Some(10),
        bbox_min_y: Some(20),
        bbox_max_x: Some(110),
        bbox_max_y: Some(220),
        char_height: Some(30),
        has_image_ocr: with_images,
        has_image_ctx: with_images,
        image_ocr_b64: with_images.then(|| BASE64_STANDARD.encode(b"ocr-bytes")),
        image_ctx_b64: with_images.then(|| BASE64_STANDARD.encode(b"ctx-bytes")),
        raw_xml: Some("<MESSAGE/>".into()),
    }
}

#[tokio::test]
async fn certify_nominal_ingest_creates_reading_queue_and_images() {
    println!("\n🗄️  [INICIO]: Auditoría de ingesta transaccional...");

    let workspace = tempfile::tempdir().unwrap();
    let client = LedgerClient::connect("file:mem_ingest_nominal?mode=memory&cache=shared", None)
        .await
        .expect("ancla de ledger en memoria");
    let image_store = ImageStore::new(workspace.path());

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

    let readings = ReadingRepository::new(client.clone(), image_store.clone());
    let (reading_id, queue_id) = readings
        .save_reading(&sample_reading("DEV-001", true))
        .await
        .expect("ingesta nominal");

    // Fila de lectura completa con rutas de imagen pobladas.
    let stored = readings.fetch_reading(reading_id).await.unwrap().expect("lectura persistida");
    assert_eq!(stored.plate, "1234ABC");
    assert_eq!(stored.ocr_score, Some(93));
    assert!(stored.has_image_ocr && stored.has_image_ctx);

    let ocr_path = stored.image_ocr_path.clone().expect("ruta OCR");
    let ctx_path = stored.image_ctx_path.clone().expect("ruta CTX");
    assert!(image_store.exists(&ocr_path));
    assert!(image_store.exists(&ctx_path));
    assert_eq!(image_store.read_bytes(&ocr_path).await.unwrap(), b"ocr-bytes");

    // Mensaje PENDING con cero intentos, uno a uno con la lectura.
    let queue = QueueRepository::new(client.clone(), image_store.clone());
    let message = queue.fetch_message(queue_id).await.unwrap().expect("mensaje encolado");
    assert_eq!(message.reading_id, reading_id);
    assert_eq!(message.status, MessageStatus::Pending);
    assert_eq!(message.attempts, 0);
    assert!(message.next_retry_at.is_none());

    let counters = MetricsRepository::new(client).queue_counters().await.unwrap();
    assert_eq!(counters.pending_messages, 1);
    assert_eq!(counters.total_readings, 1);
    assert_eq!(counters.failed_messages, 0);
    assert_eq!(counters.dead_messages, 0);

    println!("🏁 [INFORME]: Ingesta nominal certificada.");
}

#[tokio::test]
async fn certify_unknown_camera_persists_nothing() {
    let workspace = tempfile::tempdir().unwrap();
    let client = LedgerClient::connect("file:mem_ingest_unknown?mode=memory&cache=shared", None)
        .await
        .unwrap();
    let image_store = ImageStore::new(workspace.path());

    let readings = ReadingRepository::new(client.clone(), image_store.clone());
    let verdict = readings.save_reading(&sample_reading("LV-404", true)).await;

    assert!(matches!(verdict, Err(DbError::UnknownCamera(device_sn)) if device_sn == "LV-404"));

    let counters = MetricsRepository::new(client).queue_counters().await.unwrap();
    assert_eq!(counters.total_readings, 0);
    assert_eq!(counters.pending_messages, 0);

    // El rechazo es previo a la materialización: el almacén queda virgen.
    let leftover_files = std::fs::read_dir(workspace.path()).unwrap().count();
    assert_eq!(leftover_files, 0);
}

#[tokio::test]
async fn certify_image_write_failure_degrades_to_absent() {
    let client = LedgerClient::connect("file:mem_ingest_degraded?mode=memory&cache=shared", None)
        .await
        .unwrap();
    // Raíz de imágenes imposible: toda escritura de imagen fracasa.
    let image_store = ImageStore::new("/proc/centinela-sin-permiso");

    let connection = client.get_connection().unwrap();
    connection
        .execute("INSERT INTO municipalities (name) VALUES ('Mollet')", ())
        .await
        .unwrap();
    connection
        .execute(
            "INSERT INTO cameras (serial_number, codigo_lector, municipality_id) VALUES ('DEV-002', 'L002', 1)",
            (),
        )
        .await
        .unwrap();

    let readings = ReadingRepository::new(client.clone(), image_store);
    let (reading_id, _) = readings
        .save_reading(&sample_reading("DEV-002", true))
        .await
        .expect("la lectura se acepta aunque la imagen no se materialice");

    let stored = readings.fetch_reading(reading_id).await.unwrap().unwrap();
    assert!(!stored.has_image_ocr);
    assert!(!stored.has_image_ctx);
    assert!(stored.image_ocr_path.is_none());
    assert!(stored.image_ctx_path.is_none());
}
