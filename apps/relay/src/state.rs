// [apps/relay/src/state.rs]
/*!
 * =================================================================
 * APARATO: RELAY APPLICATION STATE
 * CLASIFICACIÓN: APPLICATION STATE (ESTRATO L1-APP)
 * RESPONSABILIDAD: PLACA BASE DE DEPENDENCIAS COMPARTIDAS
 *
 * Las tareas del relé no comparten colas en memoria: se comunican a
 * través del ledger y del filesystem. Este contenedor solo transporta
 * el cliente del ledger, el almacén de imágenes y los ajustes, y
 * fabrica repositorios efímeros por operación.
 * =================================================================
 */

use std::sync::Arc;

use centinela_infra_db::repositories::{
    MetricsRepository, QueueRepository, ReadingRepository, RoutingRepository,
};
use centinela_infra_db::LedgerClient;
use centinela_infra_imagestore::ImageStore;

use crate::config::Settings;

#[derive(Clone)]
pub struct AppState {
    pub ledger_client: LedgerClient,
    pub image_store: ImageStore,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(ledger_client: LedgerClient, settings: Settings) -> Self {
        let image_store = ImageStore::new(settings.images_dir.clone());
        Self {
            ledger_client,
            image_store,
            settings: Arc::new(settings),
        }
    }

    pub fn readings(&self) -> ReadingRepository {
        ReadingRepository::new(self.ledger_client.clone(), self.image_store.clone())
    }

    pub fn queue(&self) -> QueueRepository {
        QueueRepository::new(self.ledger_client.clone(), self.image_store.clone())
    }

    pub fn routing(&self) -> RoutingRepository {
        RoutingRepository::new(self.ledger_client.clone())
    }

    pub fn metrics(&self) -> MetricsRepository {
        MetricsRepository::new(self.ledger_client.clone())
    }
}
