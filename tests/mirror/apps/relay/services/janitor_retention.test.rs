// [tests/mirror/apps/relay/services/janitor_retention.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE LA FLOTA DE JANITORS
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L4-MIRROR
 * RESPONSABILIDAD: BARRIDO POR MTIME, MODO RECURSIVO Y TOLERANCIA A
 *                  CARRERAS DE FILESYSTEM
 * =================================================================
 */

use std::time::{Duration, SystemTime};

use centinela_relay::services::janitor::sweep_directory;

fn age_file(path: &std::path::Path, age: Duration) {
    let past = SystemTime::now() - age;
    let file = std::fs::File::options().write(true).open(path).unwrap();
    file.set_modified(past).unwrap();
}

#[test]
fn certify_flat_sweep_honours_retention() {
    let workspace = tempfile::tempdir().unwrap();

    let expired = workspace.path().join("vencido.json");
    let fresh = workspace.path().join("reciente.json");
    std::fs::write(&expired, b"a").unwrap();
    std::fs::write(&fresh, b"b").unwrap();
    age_file(&expired, Duration::from_secs(2 * 3600));

    let deleted_count = sweep_directory(workspace.path(), Duration::from_secs(3600), false);

    assert_eq!(deleted_count, 1);
    assert!(!expired.exists(), "el fichero vencido se desenlaza");
    assert!(fresh.exists(), "el fichero dentro de retención sobrevive");
}

#[test]
fn certify_flat_sweep_ignores_subdirectories() {
    let workspace = tempfile::tempdir().unwrap();
    let nested_directory = workspace.path().join("sub");
    std::fs::create_dir_all(&nested_directory).unwrap();

    let nested_expired = nested_directory.join("anidado.log");
    std::fs::write(&nested_expired, b"x").unwrap();
    age_file(&nested_expired, Duration::from_secs(10 * 3600));

    let deleted_count = sweep_directory(workspace.path(), Duration::from_secs(3600), false);

    assert_eq!(deleted_count, 0);
    assert!(nested_expired.exists(), "el modo plano no desciende");
}

#[test]
fn certify_recursive_sweep_descends_like_the_image_janitor() {
    let workspace = tempfile::tempdir().unwrap();

    // Disposición del almacén de imágenes: <sn>/YYYY/MM/DD/fichero.
    let image_day = workspace.path().join("DEV-001").join("2025").join("12").join("01");
    std::fs::create_dir_all(&image_day).unwrap();

    let orphan = image_day.join("20251201175430_plate-OLD_ocr.jpg");
    let recent = image_day.join("20251201175430_plate-NEW_ocr.jpg");
    std::fs::write(&orphan, b"old").unwrap();
    std::fs::write(&recent, b"new").unwrap();
    age_file(&orphan, Duration::from_secs(72 * 3600));

    let deleted_count = sweep_directory(workspace.path(), Duration::from_secs(48 * 3600), true);

    assert_eq!(deleted_count, 1);
    assert!(!orphan.exists());
    assert!(recent.exists());
}

#[test]
fn certify_sweep_tolerates_missing_directories() {
    let ghost_directory = std::path::Path::new("/tmp/centinela-janitor-inexistente-xyz");
    assert_eq!(sweep_directory(ghost_directory, Duration::from_secs(60), true), 0);
}
