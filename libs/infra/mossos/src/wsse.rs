// [libs/infra/mossos/src/wsse.rs]
/*!
 * =================================================================
 * APARATO: WS-SECURITY SIGNER (C9)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: FIRMA XML-DSIG DEL ENVELOPE (exc-c14n + rsa-sha1)
 *
 * Contrato impuesto por el backend de Mossos, fijado como constantes:
 * - CanonicalizationMethod: exc-c14n.
 * - SignatureMethod: rsa-sha1. DigestMethod: sha1.
 * - Dos referencias firmadas: wsu:Timestamp y soapenv:Body.
 * - BinarySecurityToken X509v3 en base64 DER, referenciado por KeyInfo.
 *
 * Los subárboles firmados (Timestamp y Body) se emiten ya en su forma
 * exclusiva-canónica y se incrustan sin re-serializar: el digest se
 * calcula sobre los mismos bytes que viajan por el cable. Cada
 * invocación produce ids y Timestamp frescos; el firmante no guarda
 * estado entre envíos.
 * =================================================================
 */

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use openssl::hash::{hash, MessageDigest};
use openssl::pkey::{PKey, Private};
use openssl::sign::Signer;
use openssl::x509::X509;
use uuid::Uuid;

use crate::envelope::{escape_xml, ns, MatriculaRequest};
use crate::errors::MossosError;

/// Vida del Timestamp firmado exigida por el servicio.
const TIMESTAMP_TTL_SECONDS: i64 = 300;

/// Material criptográfico de un tenant, cargado desde la pareja PEM
/// extraída en aprovisionamiento: clave privada sin cifrar y
/// certificado cliente seguido opcionalmente de su cadena.
pub struct SigningMaterial {
    private_key: PKey<Private>,
    client_certificate: X509,
    /// Concatenación clave + certificados para la identidad mTLS.
    identity_pem: Vec<u8>,
}

/// Envelope firmado listo para el POST, con los ids generados.
#[derive(Debug, Clone)]
pub struct SignedEnvelope {
    pub xml: String,
    pub token_id: String,
    pub timestamp_id: String,
    pub body_id: String,
}

impl SigningMaterial {
    /// Carga la pareja PEM desde disco. El primer certificado del
    /// fichero de certificado es el firmante; el resto es cadena.
    pub fn from_pem_files(client_cert_path: &str, key_path: &str) -> Result<Self, MossosError> {
        let certificate_pem = std::fs::read(client_cert_path).map_err(|io_fault| {
            MossosError::Certificate(format!("certificado ilegible en {client_cert_path}: {io_fault}"))
        })?;
        let key_pem = std::fs::read(key_path).map_err(|io_fault| {
            MossosError::Certificate(format!("clave privada ilegible en {key_path}: {io_fault}"))
        })?;

        Self::from_pem_bytes(&certificate_pem, &key_pem)
    }

    pub fn from_pem_bytes(certificate_pem: &[u8], key_pem: &[u8]) -> Result<Self, MossosError> {
        let client_certificate = X509::from_pem(certificate_pem)?;
        let private_key = PKey::private_key_from_pem(key_pem)?;

        let mut identity_pem = Vec::with_capacity(key_pem.len() + certificate_pem.len() + 1);
        identity_pem.extend_from_slice(key_pem);
        if !key_pem.ends_with(b"\n") {
            identity_pem.push(b'\n');
        }
        identity_pem.extend_from_slice(certificate_pem);

        Ok(Self {
            private_key,
            client_certificate,
            identity_pem,
        })
    }

    /// PEM combinado (clave + cadena) para `reqwest::Identity`.
    pub fn identity_pem(&self) -> &[u8] {
        &self.identity_pem
    }

    /// Certificado público del firmante, para verificación en tests.
    pub fn certificate(&self) -> &X509 {
        &self.client_certificate
    }

    /// Firma un `matriculaRequest` produciendo el envelope completo.
    /// Ids y Timestamp son frescos en cada llamada: un reintento nunca
    /// reutiliza una firma anterior.
    pub fn sign_envelope(
        &self,
        request: &MatriculaRequest,
        now: DateTime<Utc>,
    ) -> Result<SignedEnvelope, MossosError> {
        let token_id = format!("X509-{}", Uuid::new_v4());
        let timestamp_id = format!("TS-{}", Uuid::new_v4());
        let body_id = format!("Body-{}", Uuid::new_v4());

        let canonical_timestamp = canonical_timestamp(&timestamp_id, now);
        let canonical_body = request.canonical_body(&body_id);

        let timestamp_digest = sha1_digest_b64(canonical_timestamp.as_bytes())?;
        let body_digest = sha1_digest_b64(canonical_body.as_bytes())?;

        let signed_info =
            canonical_signed_info(&timestamp_id, &timestamp_digest, &body_id, &body_digest);

        let mut rsa_signer = Signer::new(MessageDigest::sha1(), &self.private_key)?;
        rsa_signer.update(signed_info.as_bytes())?;
        let signature_value = BASE64_STANDARD.encode(rsa_signer.sign_to_vec()?);

        let certificate_der_b64 = BASE64_STANDARD.encode(self.client_certificate.to_der()?);

        let mut xml = String::with_capacity(4096 + canonical_body.len());
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
        xml.push_str(&format!("<soapenv:Envelope xmlns:soapenv=\"{}\">", ns::SOAP_ENV));
        xml.push_str("<soapenv:Header>");
        xml.push_str(&format!(
            "<wsse:Security xmlns:wsse=\"{}\" soapenv:mustUnderstand=\"1\">",
            ns::WSSE
        ));

        // BinarySecurityToken: DER del certificado firmante en base64.
        xml.push_str(&format!(
            "<wsse:BinarySecurityToken EncodingType=\"{}\" ValueType=\"{}\" xmlns:wsu=\"{}\" wsu:Id=\"{}\">{}</wsse:BinarySecurityToken>",
            ns::BST_ENCODING_BASE64,
            ns::BST_VALUE_X509V3,
            ns::WSU,
            escape_xml(&token_id),
            certificate_der_b64
        ));

        xml.push_str(&canonical_timestamp);

        xml.push_str(&format!("<ds:Signature xmlns:ds=\"{}\">", ns::DSIG));
        xml.push_str(&signed_info);
        xml.push_str(&format!("<ds:SignatureValue>{signature_value}</ds:SignatureValue>"));
        xml.push_str("<ds:KeyInfo><wsse:SecurityTokenReference>");
        xml.push_str(&format!(
            "<wsse:Reference URI=\"#{}\" ValueType=\"{}\"></wsse:Reference>",
            escape_xml(&token_id),
            ns::BST_VALUE_X509V3
        ));
        xml.push_str("</wsse:SecurityTokenReference></ds:KeyInfo>");
        xml.push_str("</ds:Signature>");
        xml.push_str("</wsse:Security>");
        xml.push_str("</soapenv:Header>");
        xml.push_str(&canonical_body);
        xml.push_str("</soapenv:Envelope>");

        Ok(SignedEnvelope {
            xml,
            token_id,
            timestamp_id,
            body_id,
        })
    }
}

/// `wsu:Timestamp` en forma exclusiva-canónica. Precisión de segundos
/// sin fracción, como exige el servicio.
pub fn canonical_timestamp(timestamp_id: &str, now: DateTime<Utc>) -> String {
    let created = now.format("%Y-%m-%dT%H:%M:%SZ");
    let expires = (now + Duration::seconds(TIMESTAMP_TTL_SECONDS)).format("%Y-%m-%dT%H:%M:%SZ");

    format!(
        "<wsu:Timestamp xmlns:wsu=\"{}\" wsu:Id=\"{}\"><wsu:Created>{created}</wsu:Created><wsu:Expires>{expires}</wsu:Expires></wsu:Timestamp>",
        ns::WSU,
        escape_xml(timestamp_id)
    )
}

/// `ds:SignedInfo` en forma exclusiva-canónica: sin etiquetas
/// auto-cerradas y con los algoritmos fijos del contrato.
pub fn canonical_signed_info(
    timestamp_id: &str,
    timestamp_digest_b64: &str,
    body_id: &str,
    body_digest_b64: &str,
) -> String {
    let mut signed_info = String::with_capacity(1024);
    signed_info.push_str(&format!("<ds:SignedInfo xmlns:ds=\"{}\">", ns::DSIG));
    signed_info.push_str(&format!(
        "<ds:CanonicalizationMethod Algorithm=\"{}\"></ds:CanonicalizationMethod>",
        ns::EXC_C14N
    ));
    signed_info.push_str(&format!(
        "<ds:SignatureMethod Algorithm=\"{}\"></ds:SignatureMethod>",
        ns::RSA_SHA1
    ));
    signed_info.push_str(&canonical_reference(timestamp_id, timestamp_digest_b64));
    signed_info.push_str(&canonical_reference(body_id, body_digest_b64));
    signed_info.push_str("</ds:SignedInfo>");
    signed_info
}

fn canonical_reference(target_id: &str, digest_b64: &str) -> String {
    format!(
        "<ds:Reference URI=\"#{}\"><ds:Transforms><ds:Transform Algorithm=\"{}\"></ds:Transform></ds:Transforms><ds:DigestMethod Algorithm=\"{}\"></ds:DigestMethod><ds:DigestValue>{digest_b64}</ds:DigestValue></ds:Reference>",
        escape_xml(target_id),
        ns::EXC_C14N,
        ns::SHA1
    )
}

/// SHA-1 en base64 sobre los bytes canónicos. Algoritmo impuesto por
/// el servicio remoto.
pub fn sha1_digest_b64(canonical_bytes: &[u8]) -> Result<String, MossosError> {
    let digest = hash(MessageDigest::sha1(), canonical_bytes)
        .map_err(|crypto_fault| MossosError::Envelope(crypto_fault.to_string()))?;
    Ok(BASE64_STANDARD.encode(&*digest))
}
