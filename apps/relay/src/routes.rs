// [apps/relay/src/routes.rs]
/*!
 * =================================================================
 * APARATO: RELAY ROUTING MATRIX
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: TOPOLOGÍA HTTP DEL BORDE
 *
 * El productor Lector Vision publica en cualquier ruta bajo /ingest
 * (y en la raíz): todas convergen en el mismo handler de staging.
 * =================================================================
 */

use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

use crate::config::MAX_INGEST_BODY_BYTES;
use crate::handlers::{health, ingest};
use crate::state::AppState;

pub fn create_relay_router(application_shared_state: AppState) -> Router {
    // Escudo de red para herramientas de operación del sitio.
    let network_security_shield = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    Router::new()
        // ESTRATO DE INGESTA (staging crudo, contrato 200-siempre)
        .route("/", post(ingest::handle_raw_ingest))
        .route("/ingest", post(ingest::handle_raw_ingest))
        .route("/ingest/*rest", post(ingest::handle_raw_ingest))
        // ESTRATO DE SALUD (conteos de cola por estado). Algunas sondas
        // de campo consultan por POST: ambos verbos responden igual.
        .route("/health", get(health::handle_health).post(health::handle_health))
        // El límite real de 20 MiB se aplica en el handler para poder
        // responder {ok:false} con 200; este es el tope físico.
        .layer(DefaultBodyLimit::max(MAX_INGEST_BODY_BYTES + 1024 * 1024))
        .layer(network_security_shield)
        .with_state(application_shared_state)
}
