// [libs/infra/db/src/repositories/routing.rs]
/*!
 * =================================================================
 * APARATO: ROUTING REPOSITORY
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: RESOLUCIÓN CÁMARA -> MUNICIPIO -> ENDPOINT/CERT
 *
 * Regla de resolución: la sobre-escritura a nivel de cámara gana
 * siempre a la configuración del municipio, tanto para endpoint como
 * para certificado. La relación Certificado <-> Municipio se navega
 * por la dirección propietaria (municipality.certificate_id).
 * =================================================================
 */

use centinela_domain_models::{AlprReading, Camera, Certificate, Endpoint, Municipality, RoutingProfile};
use libsql::params;

use crate::errors::DbError;
use crate::repositories::readings::map_reading_row;
use crate::rowmap::{bool_at, int_at, opt_datetime_at, opt_int_at, opt_text_at, text_at};
use crate::LedgerClient;

/// Contexto completo de despacho de un mensaje: la lectura y el perfil
/// de enrutado ya resuelto.
#[derive(Debug, Clone)]
pub struct DispatchContext {
    pub reading: AlprReading,
    pub profile: RoutingProfile,
}

pub struct RoutingRepository {
    database_client: LedgerClient,
}

impl RoutingRepository {
    pub fn new(database_client: LedgerClient) -> Self {
        Self { database_client }
    }

    /// Resuelve lectura, cámara, municipio y las referencias efectivas
    /// de endpoint y certificado para un `reading_id`. Devuelve `None`
    /// cuando falta lectura, cámara o municipio: el sender lo traduce
    /// a DEAD("LECTURA_O_CAMARA_NO_ENCONTRADA").
    pub async fn resolve_dispatch_context(
        &self,
        reading_id: i64,
    ) -> Result<Option<DispatchContext>, DbError> {
        let connection = self.database_client.get_connection()?;

        let mut reading_rows = connection
            .query(
                "SELECT id, camera_id, device_sn, plate, timestamp_utc, direction, \
                        lane_id, lane_descr, ocr_score, country_code, country, \
                        bbox_min_x, bbox_min_y, bbox_max_x, bbox_max_y, char_height, \
                        has_image_ocr, has_image_ctx, image_ocr_path, image_ctx_path, \
                        raw_xml, created_at \
                 FROM alpr_readings WHERE id = ?1",
                params![reading_id],
            )
            .await?;

        let Some(reading_row) = reading_rows.next().await? else {
            return Ok(None);
        };
        let reading = map_reading_row(&reading_row)?;

        let Some(camera) = self.fetch_camera(&connection, reading.camera_id).await? else {
            return Ok(None);
        };
        let Some(municipality) = self.fetch_municipality(&connection, camera.municipality_id).await?
        else {
            return Ok(None);
        };

        // Sobre-escritura de cámara sobre municipio, en ambas referencias.
        let effective_endpoint_id = camera.endpoint_id.or(municipality.endpoint_id);
        let effective_certificate_id = camera.certificate_id.or(municipality.certificate_id);

        let endpoint = match effective_endpoint_id {
            Some(endpoint_id) => self.fetch_endpoint(&connection, endpoint_id).await?,
            None => None,
        };
        let certificate = match effective_certificate_id {
            Some(certificate_id) => self.fetch_certificate(&connection, certificate_id).await?,
            None => None,
        };

        Ok(Some(DispatchContext {
            reading,
            profile: RoutingProfile {
                camera,
                municipality,
                endpoint,
                certificate,
            },
        }))
    }

    async fn fetch_camera(
        &self,
        connection: &libsql::Connection,
        camera_id: i64,
    ) -> Result<Option<Camera>, DbError> {
        let mut rows = connection
            .query(
                "SELECT id, serial_number, codigo_lector, municipality_id, endpoint_id, \
                        certificate_id, coord_x, coord_y, active, last_sent_at \
                 FROM cameras WHERE id = ?1",
                params![camera_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Camera {
                id: int_at(&row, 0)?,
                serial_number: text_at(&row, 1)?,
                codigo_lector: text_at(&row, 2)?,
                municipality_id: int_at(&row, 3)?,
                endpoint_id: opt_int_at(&row, 4)?,
                certificate_id: opt_int_at(&row, 5)?,
                coord_x: opt_text_at(&row, 6)?,
                coord_y: opt_text_at(&row, 7)?,
                active: bool_at(&row, 8)?,
                last_sent_at: opt_datetime_at(&row, 9)?,
            })),
            None => Ok(None),
        }
    }

    async fn fetch_municipality(
        &self,
        connection: &libsql::Connection,
        municipality_id: i64,
    ) -> Result<Option<Municipality>, DbError> {
        let mut rows = connection
            .query(
                "SELECT id, name, code, endpoint_id, certificate_id, active \
                 FROM municipalities WHERE id = ?1",
                params![municipality_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Municipality {
                id: int_at(&row, 0)?,
                name: text_at(&row, 1)?,
                code: opt_text_at(&row, 2)?,
                endpoint_id: opt_int_at(&row, 3)?,
                certificate_id: opt_int_at(&row, 4)?,
                active: bool_at(&row, 5)?,
            })),
            None => Ok(None),
        }
    }

    async fn fetch_endpoint(
        &self,
        connection: &libsql::Connection,
        endpoint_id: i64,
    ) -> Result<Option<Endpoint>, DbError> {
        let mut rows = connection
            .query(
                "SELECT id, name, url, timeout_ms, retry_max, retry_backoff_ms \
                 FROM endpoints WHERE id = ?1",
                params![endpoint_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Endpoint {
                id: int_at(&row, 0)?,
                name: text_at(&row, 1)?,
                url: text_at(&row, 2)?,
                timeout_ms: int_at(&row, 3)?,
                retry_max: int_at(&row, 4)?,
                retry_backoff_ms: int_at(&row, 5)?,
            })),
            None => Ok(None),
        }
    }

    async fn fetch_certificate(
        &self,
        connection: &libsql::Connection,
        certificate_id: i64,
    ) -> Result<Option<Certificate>, DbError> {
        let mut rows = connection
            .query(
                "SELECT id, municipality_id, alias, client_cert_path, key_path, active \
                 FROM certificates WHERE id = ?1",
                params![certificate_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Certificate {
                id: int_at(&row, 0)?,
                municipality_id: opt_int_at(&row, 1)?,
                alias: text_at(&row, 2)?,
                client_cert_path: opt_text_at(&row, 3)?,
                key_path: opt_text_at(&row, 4)?,
                active: bool_at(&row, 5)?,
            })),
            None => Ok(None),
        }
    }
}
