// [tests/mirror/libs/infra/mossos/response_classification.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE CLASIFICACIÓN DE RESPUESTAS
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: TABLA DE VEREDICTOS codiRetorn / Fault / TRANSPORTE
 * =================================================================
 */

use centinela_infra_mossos::response::{FaultInfo, MatriculaReturn};
use centinela_infra_mossos::{classify_reply, parse_soap_reply, SendOutcome, SoapReply};

fn matricula_response(codi_retorn: &str) -> String {
    format!(
        r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/">
            <soapenv:Body>
                <mat:matriculaResponse xmlns:mat="http://dgp.gencat.cat/matricules">
                    <mat:codiRetorn>{codi_retorn}</mat:codiRetorn>
                    <mat:descripcioRetorn>resultat</mat:descripcioRetorn>
                </mat:matriculaResponse>
            </soapenv:Body>
        </soapenv:Envelope>"#
    )
}

const SOAP_FAULT: &str = r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/">
    <soapenv:Body>
        <soapenv:Fault>
            <faultcode>soapenv:Client</faultcode>
            <faultstring>KEY_VALUES_MISMATCH</faultstring>
            <detail>firma rechazada</detail>
        </soapenv:Fault>
    </soapenv:Body>
</soapenv:Envelope>"#;

#[test]
fn certify_parser_recognizes_business_reply() {
    let reply = parse_soap_reply(&matricula_response("1")).unwrap();
    assert_eq!(
        reply,
        SoapReply::Matricula(MatriculaReturn {
            codi_retorn: Some("1".into()),
            descripcio: Some("resultat".into()),
        })
    );
}

#[test]
fn certify_parser_recognizes_fault() {
    let reply = parse_soap_reply(SOAP_FAULT).unwrap();
    assert_eq!(
        reply,
        SoapReply::Fault(FaultInfo {
            faultcode: Some("soapenv:Client".into()),
            faultstring: Some("KEY_VALUES_MISMATCH".into()),
            detail: Some("firma rechazada".into()),
        })
    );
}

#[test]
fn certify_success_tokens_of_the_contract() {
    for token in ["1", "0000", "OK", "1.0"] {
        match classify_reply(200, &matricula_response(token)) {
            SendOutcome::Success { code } => assert_eq!(code, token),
            other => panic!("codiRetorn={token} debía ser éxito, llegó {other:?}"),
        }
    }
}

#[test]
fn certify_business_rejection_is_permanent() {
    // codiRetorn=2: el servicio entendió y rechazó. Reintentar no ayuda.
    match classify_reply(200, &matricula_response("2")) {
        SendOutcome::Permanent { reason } => assert_eq!(reason, "CODI_RETORN_2"),
        other => panic!("se esperaba Permanent, llegó {other:?}"),
    }
}

#[test]
fn certify_fault_is_permanent_even_on_http_500() {
    for status in [200u16, 500] {
        match classify_reply(status, SOAP_FAULT) {
            SendOutcome::Permanent { reason } => {
                assert!(reason.contains("KEY_VALUES_MISMATCH"), "razón: {reason}");
            }
            other => panic!("Fault con HTTP {status} debía ser Permanent, llegó {other:?}"),
        }
    }
}

#[test]
fn certify_transport_shapes_are_transient() {
    // 5xx sin SOAP parseable: transitorio.
    assert!(matches!(
        classify_reply(503, "Service Unavailable"),
        SendOutcome::Transient { .. }
    ));
    // 5xx con XML ajeno al contrato: transitorio.
    assert!(matches!(
        classify_reply(502, "<html><body>Bad Gateway</body></html>"),
        SendOutcome::Transient { .. }
    ));
}

#[test]
fn certify_parseable_200_without_matricula_response_is_permanent() {
    let alien_xml = r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/">
        <soapenv:Body><otroServicio/></soapenv:Body>
    </soapenv:Envelope>"#;

    match classify_reply(200, alien_xml) {
        SendOutcome::Permanent { reason } => assert_eq!(reason, "RESPUESTA_SIN_MATRICULARESPONSE"),
        other => panic!("se esperaba Permanent, llegó {other:?}"),
    }
}

#[test]
fn certify_success_token_requires_http_success() {
    // Un 500 con cuerpo de éxito es incoherente: veredicto permanente,
    // nunca éxito silencioso.
    assert!(matches!(
        classify_reply(500, &matricula_response("1")),
        SendOutcome::Permanent { .. }
    ));
}
