// [tests/mirror/libs/infra/imagestore/image_layout.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL ALMACÉN DE IMÁGENES
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: LEY save(b64(x)) => read(path) == x Y BORRADO
 *                  IDEMPOTENTE SOBRE DISPOSICIÓN DETERMINISTA
 * =================================================================
 */

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use centinela_infra_imagestore::{ImageKind, ImageStore};
use chrono::{TimeZone, Utc};

#[tokio::test]
async fn certify_save_read_roundtrip_law() {
    let workspace = tempfile::tempdir().unwrap();
    let store = ImageStore::new(workspace.path());
    let instant = Utc.with_ymd_and_hms(2025, 12, 1, 17, 54, 30).unwrap();

    let original_bytes: Vec<u8> = (0u8..=255).collect();
    let encoded = BASE64_STANDARD.encode(&original_bytes);

    let relative = store
        .save_base64("4225 LTV", "2001008851", instant, ImageKind::Ocr, &encoded)
        .await
        .expect("la escritura nominal devuelve ruta relativa");

    assert_eq!(relative, "2001008851/2025/12/01/20251201175430_plate-4225LTV_ocr.jpg");
    assert!(store.exists(&relative));

    let read_back = store.read_bytes(&relative).await.expect("lectura de vuelta");
    assert_eq!(read_back, original_bytes);

    // La misma tupla produce la misma ruta: idempotencia de disposición.
    let again = store
        .save_base64("4225 LTV", "2001008851", instant, ImageKind::Ocr, &encoded)
        .await
        .unwrap();
    assert_eq!(again, relative);
}

#[tokio::test]
async fn certify_decode_failure_degrades_to_absent() {
    let workspace = tempfile::tempdir().unwrap();
    let store = ImageStore::new(workspace.path());
    let instant = Utc.with_ymd_and_hms(2025, 12, 1, 8, 0, 0).unwrap();

    let saved = store
        .save_base64("1111AAA", "DEV-9", instant, ImageKind::Ctx, "esto no es base64 !!!")
        .await;
    assert!(saved.is_none());

    let empty = store.save_base64("1111AAA", "DEV-9", instant, ImageKind::Ctx, "").await;
    assert!(empty.is_none());
}

#[tokio::test]
async fn certify_delete_is_best_effort_idempotent() {
    let workspace = tempfile::tempdir().unwrap();
    let store = ImageStore::new(workspace.path());
    let instant = Utc.with_ymd_and_hms(2025, 12, 2, 10, 30, 0).unwrap();

    let relative = store
        .save_base64("2222BBB", "DEV-7", instant, ImageKind::Ocr, &BASE64_STANDARD.encode(b"jpeg"))
        .await
        .unwrap();

    assert!(store.delete(&relative).await);
    assert!(!store.exists(&relative));
    // Segunda pasada sobre fichero ausente: silencio, sin error.
    assert!(!store.delete(&relative).await);
}

#[tokio::test]
async fn certify_legacy_prefix_resolution() {
    let workspace = tempfile::tempdir().unwrap();
    let store = ImageStore::new(workspace.path());
    let instant = Utc.with_ymd_and_hms(2025, 12, 3, 9, 15, 0).unwrap();

    let relative = store
        .save_base64("3333CCC", "DEV-5", instant, ImageKind::Ocr, &BASE64_STANDARD.encode(b"x"))
        .await
        .unwrap();

    // Filas antiguas del ledger guardaron el prefijo del raíz de datos.
    let legacy_form = format!("data/images/{relative}");
    assert!(store.exists(&legacy_form));
    assert_eq!(store.read_bytes(&legacy_form).await.unwrap(), b"x");
}
