// [tests/mirror/libs/shared/atalaya/bucketed_log.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL ESCRITOR DE LOGS EN CUBOS
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L4-MIRROR
 * RESPONSABILIDAD: ENRUTADO A CATEGORÍA Y NOMBRADO DE CUBOS
 * =================================================================
 */

use std::io::Write as _;

use centinela_shared_atalaya::bucketed::{bucket_filename, category_for_target};
use centinela_shared_atalaya::BucketedLogWriter;
use chrono::Utc;
use tracing_subscriber::fmt::writer::MakeWriter;

#[test]
fn certify_fallback_writer_lands_in_service_bucket() {
    let workspace = tempfile::tempdir().unwrap();
    let writer_factory = BucketedLogWriter::new(workspace.path());

    let mut writer = writer_factory.make_writer();
    writer.write_all(b"arranque nominal\n").unwrap();

    let expected_bucket = workspace
        .path()
        .join("service")
        .join(bucket_filename(Utc::now()));

    let written = std::fs::read_to_string(&expected_bucket).expect("el cubo debe existir");
    assert!(written.contains("arranque nominal"));
}

#[test]
fn certify_appends_preserve_previous_lines() {
    let workspace = tempfile::tempdir().unwrap();
    let writer_factory = BucketedLogWriter::new(workspace.path());

    writer_factory.make_writer().write_all(b"linea-1\n").unwrap();
    writer_factory.make_writer().write_all(b"linea-2\n").unwrap();

    let bucket_path = workspace
        .path()
        .join("service")
        .join(bucket_filename(Utc::now()));
    let written = std::fs::read_to_string(bucket_path).unwrap();

    assert!(written.contains("linea-1"));
    assert!(written.contains("linea-2"));
}

#[test]
fn certify_operational_category_table() {
    // Las categorías del §operador: ingest, mirror, proc, send, cleanup, api, service.
    assert_eq!(category_for_target("centinela_relay::services::sender"), "send");
    assert_eq!(category_for_target("centinela_relay::services::mirror"), "mirror");
    assert_eq!(category_for_target("centinela_relay::services::processor"), "proc");
    assert_eq!(category_for_target("centinela_relay::services::janitor"), "cleanup");
    assert_eq!(category_for_target("centinela_relay::services::transit"), "ingest");
    assert_eq!(category_for_target("centinela_relay::handlers::ingest"), "ingest");
    assert_eq!(category_for_target("centinela_relay::routes"), "api");
    assert_eq!(category_for_target("centinela_relay::kernel"), "service");
}
