// [tests/mirror/libs/infra/mossos/wsse_signature.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR CRIPTOGRÁFICO DEL ENVELOPE WS-SECURITY
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: VERIFICACIÓN REAL DE DIGESTS SHA-1 Y FIRMA
 *                  RSA-SHA1 SOBRE LOS BYTES QUE VIAJAN POR EL CABLE
 *
 * La prueba reconstruye el trabajo del verificador remoto: extrae los
 * subárboles firmados tal y como viajan, recalcula sus digests,
 * localiza los DigestValue declarados y verifica SignatureValue con
 * la clave pública del BinarySecurityToken.
 * =================================================================
 */

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use centinela_infra_mossos::wsse::sha1_digest_b64;
use centinela_infra_mossos::{MatriculaRequest, SigningMaterial};
use chrono::Utc;
use openssl::asn1::Asn1Time;
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::sign::Verifier;
use openssl::x509::{X509NameBuilder, X509};

/// Pareja autofirmada de laboratorio, equivalente al material PEM que
/// el aprovisionamiento extrae del PFX del municipio.
fn forge_test_material() -> (Vec<u8>, Vec<u8>, PKey<Private>) {
    let rsa_key = Rsa::generate(2048).unwrap();
    let private_key = PKey::from_rsa(rsa_key).unwrap();

    let mut subject_builder = X509NameBuilder::new().unwrap();
    subject_builder.append_entry_by_text("CN", "centinela-test").unwrap();
    let subject = subject_builder.build();

    let mut certificate_builder = X509::builder().unwrap();
    certificate_builder.set_version(2).unwrap();
    certificate_builder.set_subject_name(&subject).unwrap();
    certificate_builder.set_issuer_name(&subject).unwrap();
    certificate_builder.set_pubkey(&private_key).unwrap();
    certificate_builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    certificate_builder
        .set_not_after(&Asn1Time::days_from_now(1).unwrap())
        .unwrap();
    certificate_builder.sign(&private_key, MessageDigest::sha256()).unwrap();
    let certificate = certificate_builder.build();

    (
        certificate.to_pem().unwrap(),
        private_key.private_key_to_pem_pkcs8().unwrap(),
        private_key,
    )
}

fn sample_request() -> MatriculaRequest {
    MatriculaRequest {
        codi_lector: "CAM01".into(),
        matricula: "1234ABC".into(),
        data_lectura: "2024-04-30".into(),
        hora_lectura: "12:34:56".into(),
        img_matricula_b64: BASE64_STANDARD.encode(b"ocr-bytes"),
        img_context_b64: BASE64_STANDARD.encode(b"ctx-bytes"),
        coordenada_x: Some("430123.45".into()),
        coordenada_y: Some("4581000.10".into()),
    }
}

/// Extrae el primer subárbol delimitado por las marcas dadas.
fn extract_subtree<'a>(envelope: &'a str, open_mark: &str, close_mark: &str) -> &'a str {
    let start = envelope.find(open_mark).expect("marca de apertura presente");
    let end = envelope.find(close_mark).expect("marca de cierre presente") + close_mark.len();
    &envelope[start..end]
}

fn extract_digest_values(envelope: &str) -> Vec<String> {
    let mut digests = Vec::new();
    let mut cursor = envelope;
    while let Some(start) = cursor.find("<ds:DigestValue>") {
        let tail = &cursor[start + "<ds:DigestValue>".len()..];
        let end = tail.find("</ds:DigestValue>").expect("cierre de DigestValue");
        digests.push(tail[..end].to_string());
        cursor = &tail[end..];
    }
    digests
}

#[test]
fn certify_digests_match_wire_bytes_and_signature_verifies() {
    println!("\n🔏 [INICIO]: Certificación criptográfica del envelope...");

    let (certificate_pem, key_pem, private_key) = forge_test_material();
    let material = SigningMaterial::from_pem_bytes(&certificate_pem, &key_pem)
        .expect("material PEM de laboratorio");

    let signed = material
        .sign_envelope(&sample_request(), Utc::now())
        .expect("firma nominal");

    // --- FASE 1: DIGESTS SOBRE LOS BYTES DEL CABLE ---
    let wire_timestamp = extract_subtree(&signed.xml, "<wsu:Timestamp", "</wsu:Timestamp>");
    let wire_body = extract_subtree(&signed.xml, "<soapenv:Body", "</soapenv:Body>");

    let recomputed_timestamp_digest = sha1_digest_b64(wire_timestamp.as_bytes()).unwrap();
    let recomputed_body_digest = sha1_digest_b64(wire_body.as_bytes()).unwrap();

    let declared_digests = extract_digest_values(&signed.xml);
    assert_eq!(declared_digests.len(), 2, "dos referencias firmadas");
    assert_eq!(declared_digests[0], recomputed_timestamp_digest, "digest del Timestamp");
    assert_eq!(declared_digests[1], recomputed_body_digest, "digest del Body");

    // --- FASE 2: FIRMA RSA-SHA1 SOBRE SignedInfo ---
    let wire_signed_info = extract_subtree(&signed.xml, "<ds:SignedInfo", "</ds:SignedInfo>");
    let signature_value_b64 =
        extract_subtree(&signed.xml, "<ds:SignatureValue>", "</ds:SignatureValue>")
            .trim_start_matches("<ds:SignatureValue>")
            .trim_end_matches("</ds:SignatureValue>");
    let signature_bytes = BASE64_STANDARD.decode(signature_value_b64).unwrap();

    let mut verifier = Verifier::new(MessageDigest::sha1(), &private_key).unwrap();
    verifier.update(wire_signed_info.as_bytes()).unwrap();
    assert!(
        verifier.verify(&signature_bytes).unwrap(),
        "SignatureValue debe verificar con la clave pública del token"
    );

    // --- FASE 3: EL TOKEN TRANSPORTA EL CERTIFICADO FIRMANTE ---
    let token_b64 = extract_subtree(
        &signed.xml,
        "wsu:Id=\"X509-",
        "</wsse:BinarySecurityToken>",
    );
    let der_start = token_b64.find('>').unwrap() + 1;
    let der_b64 = &token_b64[der_start..token_b64.find("</wsse:BinarySecurityToken>").unwrap()];
    let token_certificate = X509::from_der(&BASE64_STANDARD.decode(der_b64).unwrap()).unwrap();
    assert!(token_certificate.public_key().unwrap().public_eq(&private_key));

    println!("🏁 [INFORME]: Firma y digests certificados contra los bytes del cable.");
}

#[test]
fn certify_envelope_structure_and_fixed_algorithms() {
    let (certificate_pem, key_pem, _) = forge_test_material();
    let material = SigningMaterial::from_pem_bytes(&certificate_pem, &key_pem).unwrap();

    let signed = material.sign_envelope(&sample_request(), Utc::now()).unwrap();

    // Identificadores declarados y referenciados.
    assert!(signed.token_id.starts_with("X509-"));
    assert!(signed.timestamp_id.starts_with("TS-"));
    assert!(signed.body_id.starts_with("Body-"));
    assert!(signed.xml.contains(&format!("URI=\"#{}\"", signed.timestamp_id)));
    assert!(signed.xml.contains(&format!("URI=\"#{}\"", signed.body_id)));
    assert!(signed.xml.contains(&format!("URI=\"#{}\"", signed.token_id)));

    // Algoritmos inamovibles del contrato remoto.
    assert!(signed.xml.contains("http://www.w3.org/2001/10/xml-exc-c14n#"));
    assert!(signed.xml.contains("http://www.w3.org/2000/09/xmldsig#rsa-sha1"));
    assert!(signed.xml.contains("http://www.w3.org/2000/09/xmldsig#sha1"));
    assert!(signed.xml.contains("soapenv:mustUnderstand=\"1\""));

    // Timestamp con precisión de segundos y expiración a +300 s.
    let created = extract_subtree(&signed.xml, "<wsu:Created>", "</wsu:Created>");
    assert!(created.ends_with("Z</wsu:Created>"));
    assert!(!created.contains('.'));

    // Cuerpo de negocio visible dentro del Body firmado.
    assert!(signed.xml.contains("<mat:codiLector>CAM01</mat:codiLector>"));
    assert!(signed.xml.contains("<mat:matricula>1234ABC</mat:matricula>"));
}

#[test]
fn certify_each_attempt_signs_a_fresh_envelope() {
    let (certificate_pem, key_pem, _) = forge_test_material();
    let material = SigningMaterial::from_pem_bytes(&certificate_pem, &key_pem).unwrap();
    let request = sample_request();

    let first = material.sign_envelope(&request, Utc::now()).unwrap();
    let second = material.sign_envelope(&request, Utc::now()).unwrap();

    // Ids nunca reutilizados entre intentos.
    assert_ne!(first.token_id, second.token_id);
    assert_ne!(first.timestamp_id, second.timestamp_id);
    assert_ne!(first.body_id, second.body_id);
    assert_ne!(first.xml, second.xml);
}

#[test]
fn certify_identity_pem_carries_key_and_chain() {
    let (certificate_pem, key_pem, _) = forge_test_material();
    let material = SigningMaterial::from_pem_bytes(&certificate_pem, &key_pem).unwrap();

    let identity_text = String::from_utf8(material.identity_pem().to_vec()).unwrap();
    assert!(identity_text.contains("PRIVATE KEY"));
    assert!(identity_text.contains("BEGIN CERTIFICATE"));

    // La clave precede a la cadena, como espera la identidad mTLS.
    let key_position = identity_text.find("PRIVATE KEY").unwrap();
    let cert_position = identity_text.find("BEGIN CERTIFICATE").unwrap();
    assert!(key_position < cert_position);
}
