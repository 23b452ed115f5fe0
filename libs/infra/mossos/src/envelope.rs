// [libs/infra/mossos/src/envelope.rs]
/*!
 * =================================================================
 * APARATO: MATRICULA REQUEST ENVELOPE
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CUERPO SOAP matriculaRequest EN FORMA CANÓNICA
 *
 * El subárbol del Body se emite directamente en su serialización
 * exclusiva-canónica (exc-c14n): declaraciones de namespace antes que
 * atributos y ordenadas por prefijo, sin etiquetas auto-cerradas y
 * sin blancos entre elementos. El firmante calcula el digest sobre
 * estos mismos bytes, de modo que lo que viaja por el cable es
 * byte-a-byte lo que se firmó.
 * =================================================================
 */

use centinela_domain_models::{AlprReading, Camera};
use chrono::{DateTime, Utc};

/// Namespaces del contrato. Fijados por el servicio remoto.
pub mod ns {
    pub const SOAP_ENV: &str = "http://schemas.xmlsoap.org/soap/envelope/";
    pub const MATRICULA: &str = "http://dgp.gencat.cat/matricules";
    pub const WSSE: &str =
        "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";
    pub const WSU: &str =
        "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd";
    pub const DSIG: &str = "http://www.w3.org/2000/09/xmldsig#";
    pub const EXC_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
    pub const RSA_SHA1: &str = "http://www.w3.org/2000/09/xmldsig#rsa-sha1";
    pub const SHA1: &str = "http://www.w3.org/2000/09/xmldsig#sha1";
    pub const BST_ENCODING_BASE64: &str =
        "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-soap-message-security-1.0#Base64Binary";
    pub const BST_VALUE_X509V3: &str =
        "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-x509-token-profile-1.0#X509v3";
}

/// Longitud máxima de matrícula admitida por el esquema remoto.
const MATRICULA_MAX_LEN: usize = 10;

/// Datos de negocio del envío, ya en la forma textual del contrato.
#[derive(Debug, Clone)]
pub struct MatriculaRequest {
    pub codi_lector: String,
    pub matricula: String,
    /// "YYYY-MM-DD" en UTC.
    pub data_lectura: String,
    /// "HH:MM:SS" en UTC.
    pub hora_lectura: String,
    pub img_matricula_b64: String,
    /// Vacía cuando la lectura no trae contexto: el elemento viaja igual.
    pub img_context_b64: String,
    pub coordenada_x: Option<String>,
    pub coordenada_y: Option<String>,
}

impl MatriculaRequest {
    /// Ensambla la petición desde la lectura persistida y su cámara.
    /// Las imágenes llegan ya leídas de disco por el sender.
    pub fn from_reading(
        reading: &AlprReading,
        camera: &Camera,
        img_matricula_b64: String,
        img_context_b64: String,
    ) -> Self {
        let (data_lectura, hora_lectura) = split_utc_timestamp(reading.timestamp_utc);

        // Coordenadas solo cuando el par completo está definido: el
        // esquema remoto no admite una coordenada suelta.
        let (coordenada_x, coordenada_y) = match (&camera.coord_x, &camera.coord_y) {
            (Some(x), Some(y)) => (Some(x.clone()), Some(y.clone())),
            _ => (None, None),
        };

        Self {
            codi_lector: camera.codigo_lector.clone(),
            matricula: normalize_matricula(&reading.plate),
            data_lectura,
            hora_lectura,
            img_matricula_b64,
            img_context_b64,
            coordenada_x,
            coordenada_y,
        }
    }

    /// Subárbol `soapenv:Body` en serialización exclusiva-canónica,
    /// con el `wsu:Id` referenciado por la firma.
    pub fn canonical_body(&self, body_id: &str) -> String {
        let mut body = String::with_capacity(
            2048 + self.img_matricula_b64.len() + self.img_context_b64.len(),
        );

        body.push_str(&format!(
            "<soapenv:Body xmlns:soapenv=\"{}\" xmlns:wsu=\"{}\" wsu:Id=\"{}\">",
            ns::SOAP_ENV,
            ns::WSU,
            escape_xml(body_id)
        ));
        body.push_str(&format!("<mat:matriculaRequest xmlns:mat=\"{}\">", ns::MATRICULA));

        push_leaf(&mut body, "codiLector", &self.codi_lector);
        push_leaf(&mut body, "matricula", &self.matricula);
        push_leaf(&mut body, "dataLectura", &self.data_lectura);
        push_leaf(&mut body, "horaLectura", &self.hora_lectura);
        push_leaf(&mut body, "imgMatricula", &self.img_matricula_b64);
        push_leaf(&mut body, "imgContext", &self.img_context_b64);

        if let (Some(coordenada_x), Some(coordenada_y)) = (&self.coordenada_x, &self.coordenada_y) {
            push_leaf(&mut body, "coordenadaX", coordenada_x);
            push_leaf(&mut body, "coordenadaY", coordenada_y);
        }

        body.push_str("</mat:matriculaRequest></soapenv:Body>");
        body
    }
}

/// Matrícula de cable a matrícula de contrato: mayúsculas, sin
/// espacios y truncada a la longitud del esquema.
pub fn normalize_matricula(plate: &str) -> String {
    let cleaned: String = plate
        .to_uppercase()
        .chars()
        .filter(|character| !character.is_whitespace())
        .collect();
    cleaned.chars().take(MATRICULA_MAX_LEN).collect()
}

/// Divide un instante UTC en la pareja dataLectura / horaLectura.
pub fn split_utc_timestamp(timestamp_utc: DateTime<Utc>) -> (String, String) {
    (
        timestamp_utc.format("%Y-%m-%d").to_string(),
        timestamp_utc.format("%H:%M:%S").to_string(),
    )
}

fn push_leaf(buffer: &mut String, local_name: &str, text: &str) {
    buffer.push_str("<mat:");
    buffer.push_str(local_name);
    buffer.push('>');
    buffer.push_str(&escape_xml(text));
    buffer.push_str("</mat:");
    buffer.push_str(local_name);
    buffer.push('>');
}

/// Escapado de texto y atributos, compatible con la forma canónica.
pub(crate) fn escape_xml(raw_text: &str) -> String {
    let mut escaped = String::with_capacity(raw_text.len());
    for character in raw_text.chars() {
        match character {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}
