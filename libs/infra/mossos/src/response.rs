// [libs/infra/mossos/src/response.rs]
/*!
 * =================================================================
 * APARATO: SOAP RESPONSE CLASSIFIER
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: VEREDICTO DE NEGOCIO SOBRE LA RESPUESTA DE MOSSOS
 *
 * Reglas de clasificación:
 * - Fault SOAP parseable: permanente, sin importar intentos restantes.
 * - matriculaResponse con codiRetorn de éxito y HTTP 2xx: éxito.
 * - Cualquier otro codiRetorn: rechazo de contenido, permanente.
 * - 2xx parseable sin matriculaResponse: permanente.
 * - Cuerpo no parseable o HTTP no-2xx sin SOAP: transitorio.
 * =================================================================
 */

use tracing::{error, info, warn};
use xml::reader::{EventReader, XmlEvent};

use crate::client::SendOutcome;

/// Tokens de codiRetorn que el servicio considera aceptación.
pub const SUCCESS_TOKENS: &[&str] = &["1", "0000", "OK", "1.0"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultInfo {
    pub faultcode: Option<String>,
    pub faultstring: Option<String>,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatriculaReturn {
    pub codi_retorn: Option<String>,
    pub descripcio: Option<String>,
}

/// Contenido reconocido de una respuesta SOAP parseable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoapReply {
    Fault(FaultInfo),
    Matricula(MatriculaReturn),
    /// XML bien formado pero sin Fault ni matriculaResponse.
    Unrecognized,
}

/// Parsea la respuesta por nombre local, ignorando prefijos: distintos
/// contenedores SOAP del lado Mossos emiten prefijos distintos.
pub fn parse_soap_reply(xml_text: &str) -> Result<SoapReply, String> {
    let mut element_stack: Vec<String> = Vec::new();
    let mut current_text = String::new();

    let mut fault: Option<FaultInfo> = None;
    let mut matricula: Option<MatriculaReturn> = None;

    for event in EventReader::new(xml_text.as_bytes()) {
        match event.map_err(|parse_fault| parse_fault.to_string())? {
            XmlEvent::StartElement { name, .. } => {
                let local_name = name.local_name;
                if local_name == "Fault" && fault.is_none() {
                    fault = Some(FaultInfo::default());
                }
                if local_name == "matriculaResponse" && matricula.is_none() {
                    matricula = Some(MatriculaReturn::default());
                }
                element_stack.push(local_name);
                current_text.clear();
            }
            XmlEvent::Characters(data) | XmlEvent::CData(data) => {
                current_text.push_str(&data);
            }
            XmlEvent::EndElement { .. } => {
                let closed_element = element_stack.pop().unwrap_or_default();
                let text = current_text.trim().to_string();

                let inside_fault = element_stack.iter().any(|tag| tag == "Fault");
                let inside_matricula = element_stack.iter().any(|tag| tag == "matriculaResponse");

                if inside_fault && !text.is_empty() {
                    if let Some(fault_info) = fault.as_mut() {
                        match closed_element.as_str() {
                            "faultcode" => fault_info.faultcode = Some(text),
                            "faultstring" => fault_info.faultstring = Some(text),
                            "detail" => fault_info.detail = Some(text),
                            _ => {}
                        }
                    }
                } else if inside_matricula && !text.is_empty() {
                    if let Some(matricula_return) = matricula.as_mut() {
                        match closed_element.as_str() {
                            "codiRetorn" => matricula_return.codi_retorn = Some(text),
                            "descripcioRetorn" | "descripcio" => {
                                if matricula_return.descripcio.is_none() {
                                    matricula_return.descripcio = Some(text);
                                }
                            }
                            _ => {}
                        }
                    }
                }
                current_text.clear();
            }
            _ => {}
        }
    }

    if let Some(fault_info) = fault {
        return Ok(SoapReply::Fault(fault_info));
    }
    if let Some(matricula_return) = matricula {
        return Ok(SoapReply::Matricula(matricula_return));
    }
    Ok(SoapReply::Unrecognized)
}

/// Traduce (status HTTP, cuerpo) al veredicto del sender.
pub fn classify_reply(http_status: u16, response_body: &str) -> SendOutcome {
    let is_http_success = (200..300).contains(&http_status);

    match parse_soap_reply(response_body) {
        Ok(SoapReply::Fault(fault_info)) => {
            error!(
                "❌ [MOSSOS][FAULT] faultcode={:?} faultstring={:?} detail={:?}",
                fault_info.faultcode, fault_info.faultstring, fault_info.detail
            );
            SendOutcome::Permanent {
                reason: format!(
                    "SOAP_FAULT:{}",
                    fault_info.faultstring.or(fault_info.faultcode).unwrap_or_default()
                ),
            }
        }
        Ok(SoapReply::Matricula(matricula_return)) => {
            let codi_retorn = matricula_return.codi_retorn.unwrap_or_default();
            info!(
                "📨 [MOSSOS][CODI_RETORN] codiRetorn={} descr={:?}",
                codi_retorn, matricula_return.descripcio
            );

            if is_http_success && SUCCESS_TOKENS.contains(&codi_retorn.as_str()) {
                SendOutcome::Success { code: codi_retorn }
            } else {
                // El servicio entendió la petición y la rechazó por
                // contenido: reintentar no cambia el veredicto.
                SendOutcome::Permanent {
                    reason: format!("CODI_RETORN_{codi_retorn}"),
                }
            }
        }
        Ok(SoapReply::Unrecognized) if is_http_success => {
            warn!("⚠️ [MOSSOS]: Respuesta 2xx sin matriculaResponse identificable");
            SendOutcome::Permanent {
                reason: "RESPUESTA_SIN_MATRICULARESPONSE".into(),
            }
        }
        Ok(SoapReply::Unrecognized) => SendOutcome::Transient {
            reason: format!("HTTP {http_status}"),
        },
        Err(parse_fault) if is_http_success => {
            warn!("⚠️ [MOSSOS]: Respuesta 2xx no parseable como XML: {}", parse_fault);
            SendOutcome::Transient {
                reason: format!("HTTP {http_status} NO_XML"),
            }
        }
        Err(_) => SendOutcome::Transient {
            reason: format!("HTTP {http_status}"),
        },
    }
}
