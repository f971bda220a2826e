mod catalog;
mod error;
mod identity;
mod intake;

pub use catalog::*;
pub use error::*;
pub use identity::*;
pub use intake::*;

use std::sync::Arc;

use crate::config::AuthConfig;
use crate::store::Stores;

/// Services shared by all request handlers
#[derive(Clone)]
pub struct Services {
    pub identity: Arc<IdentityService>,
    pub catalog: Arc<CatalogService>,
    pub intake: Arc<IntakeService>,
}

impl Services {
    pub fn new(stores: Stores, auth: &AuthConfig) -> Self {
        Self {
            identity: Arc::new(IdentityService::new(stores.users, auth)),
            catalog: Arc::new(CatalogService::new(stores.pvz.clone())),
            intake: Arc::new(IntakeService::new(
                stores.pvz,
                stores.receptions,
                stores.products,
            )),
        }
    }
}
