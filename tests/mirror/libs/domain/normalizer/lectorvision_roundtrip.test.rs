// [tests/mirror/libs/domain/normalizer/lectorvision_roundtrip.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL PUENTE LECTOR VISION
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L2-MIRROR
 * RESPONSABILIDAD: LEY DE IDA Y VUELTA JSON -> XML -> LECTURA
 *
 * El payload JSON debe sobrevivir el puente hacia el XML Tattile y el
 * parser de vuelta sin deriva: Fiability=87 llega como ocr_score=87,
 * Country=724 como country="ES" con country_code="724" y PlateCoord
 * como bounding box completo.
 * =================================================================
 */

use centinela_domain_normalizer::{
    build_tattile_xml_from_lectorvision, parse_lectorvision_timestamp, parse_tattile_xml,
    NormalizeError,
};
use serde_json::json;

#[test]
fn certify_timestamp_bridge_format() {
    let (date_str, time_str) = parse_lectorvision_timestamp("2026/01/23 09:25:57.000")
        .expect("timestamp nominal");

    assert_eq!(date_str, "2026-01-23");
    assert_eq!(time_str, "09-25-57-000");

    let (_, millis_time) = parse_lectorvision_timestamp("2026/01/23 09:25:57.482").unwrap();
    assert_eq!(millis_time, "09-25-57-482");

    assert!(matches!(
        parse_lectorvision_timestamp("23/01/2026 09:25:57"),
        Err(NormalizeError::Timestamp(_))
    ));
}

#[test]
fn certify_full_roundtrip_preserves_semantics() {
    let payload = json!({
        "Plate": "1234ABC",
        "TimeStamp": "2026/01/23 09:25:57.000",
        "SerialNumber": "LV-01",
        "Fiability": 87,
        "Direction": "IN",
        "LaneNumber": 2,
        "LaneName": "Carril 2",
        "PlateCoord": [10, 20, 110, 220],
        "Country": 724,
        "ImageOCR": "T0NSX0JZVEVT",
        "ImageCTX": "Q1RYX0JZVEVT"
    });

    let (xml_str, meta) = build_tattile_xml_from_lectorvision(&payload).expect("puente nominal");

    assert_eq!(meta.plate, "1234ABC");
    assert_eq!(meta.device_sn, "LV-01");
    assert_eq!(meta.timestamp, "2026/01/23 09:25:57.000");

    let reading = parse_tattile_xml(&xml_str).expect("el XML del puente debe parsear");

    assert_eq!(reading.plate, "1234ABC");
    assert_eq!(reading.device_sn, "LV-01");
    assert_eq!(reading.ocr_score, Some(87));
    assert_eq!(reading.direction.as_deref(), Some("IN"));
    assert_eq!(reading.lane_id, Some(2));
    assert_eq!(reading.lane_descr.as_deref(), Some("Carril 2"));
    assert_eq!(reading.bbox_min_x, Some(10));
    assert_eq!(reading.bbox_min_y, Some(20));
    assert_eq!(reading.bbox_max_x, Some(110));
    assert_eq!(reading.bbox_max_y, Some(220));
    assert_eq!(reading.country_code.as_deref(), Some("724"));
    assert_eq!(reading.country.as_deref(), Some("ES"));
    assert!(reading.has_image_ocr);
    assert!(reading.has_image_ctx);

    let expected_timestamp = chrono::NaiveDate::from_ymd_opt(2026, 1, 23)
        .unwrap()
        .and_hms_opt(9, 25, 57)
        .unwrap()
        .and_utc();
    assert_eq!(reading.timestamp_utc, expected_timestamp);
}

#[test]
fn certify_foreign_country_codes_travel_without_label() {
    let payload = json!({
        "Plate": "AB123CD",
        "TimeStamp": "2026/01/23 09:25:57.000",
        "IdDevice": "LV-02",
        "Country": 380
    });

    let (xml_str, meta) = build_tattile_xml_from_lectorvision(&payload).unwrap();
    assert_eq!(meta.device_sn, "LV-02");

    let reading = parse_tattile_xml(&xml_str).unwrap();
    assert_eq!(reading.country_code.as_deref(), Some("380"));
    // Etiqueta vacía en el XML: el parser la trata como ausente.
    assert!(reading.country.is_none());
}

#[test]
fn certify_image_key_aliases_first_hit_wins() {
    let payload = json!({
        "Plate": "7777GGG",
        "TimeStamp": "2026/01/23 10:00:00.000",
        "SerialNumber": "LV-03",
        "ImageOcrB64": "QUxJQVNfT0NS",
        "ImageCtxBase64": "QUxJQVNfQ1RY"
    });

    let (xml_str, _) = build_tattile_xml_from_lectorvision(&payload).unwrap();
    let reading = parse_tattile_xml(&xml_str).unwrap();

    assert_eq!(reading.image_ocr_b64.as_deref(), Some("QUxJQVNfT0NS"));
    assert_eq!(reading.image_ctx_b64.as_deref(), Some("QUxJQVNfQ1RY"));
}

#[test]
fn certify_required_fields_of_the_bridge() {
    let missing_plate = json!({ "TimeStamp": "2026/01/23 09:25:57.000", "SerialNumber": "LV-01" });
    let missing_device = json!({ "Plate": "1234ABC", "TimeStamp": "2026/01/23 09:25:57.000" });
    let missing_timestamp = json!({ "Plate": "1234ABC", "SerialNumber": "LV-01" });

    for payload in [missing_plate, missing_device, missing_timestamp] {
        assert!(matches!(
            build_tattile_xml_from_lectorvision(&payload),
            Err(NormalizeError::MissingField(_))
        ));
    }
}

#[test]
fn certify_char_height_alias_family() {
    for alias in ["CharHeight", "PlateCharHeight", "PlateCharheight"] {
        let payload = json!({
            "Plate": "5555EEE",
            "TimeStamp": "2026/01/23 09:25:57.000",
            "SerialNumber": "LV-04",
            alias: 31
        });

        let (xml_str, _) = build_tattile_xml_from_lectorvision(&payload).unwrap();
        let reading = parse_tattile_xml(&xml_str).unwrap();
        assert_eq!(reading.char_height, Some(31), "alias {alias} debe mapear a CHAR_HEIGHT");
    }
}
