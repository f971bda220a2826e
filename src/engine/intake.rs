//! Reception and product workflow for a pickup point.
//!
//! Each mutation is delegated to a single conditional store operation, so
//! the "is a reception open?" decision and the write never drift apart.
//! Store not-found signals are translated here into the business error
//! that fits the operation.

use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::error::{ServiceError, ServiceResult};
use crate::api::metrics::{record_product_added, record_reception_created};
use crate::db::{Product, ProductType, Reception};
use crate::store::{Entity, ProductStore, PvzStore, ReceptionStore, StoreError};

pub struct IntakeService {
    pvz: Arc<dyn PvzStore>,
    receptions: Arc<dyn ReceptionStore>,
    products: Arc<dyn ProductStore>,
}

impl IntakeService {
    pub fn new(
        pvz: Arc<dyn PvzStore>,
        receptions: Arc<dyn ReceptionStore>,
        products: Arc<dyn ProductStore>,
    ) -> Self {
        Self {
            pvz,
            receptions,
            products,
        }
    }

    /// Pickup points are never deleted, so this check cannot go stale
    async fn ensure_pvz(&self, pvz_id: Uuid) -> ServiceResult<()> {
        let exists = self
            .pvz
            .exists(pvz_id)
            .await
            .map_err(|e| ServiceError::internal("failed to check pvz", e))?;
        if exists {
            Ok(())
        } else {
            warn!(pvz_id = %pvz_id, "Unknown pickup point");
            Err(ServiceError::InvalidPickupPoint(pvz_id))
        }
    }

    pub async fn open_reception(&self, pvz_id: Uuid) -> ServiceResult<Reception> {
        self.ensure_pvz(pvz_id).await?;

        let reception = self.receptions.open(pvz_id).await.map_err(|e| match e {
            StoreError::Duplicate(Entity::OpenReception) => {
                warn!(pvz_id = %pvz_id, "Open reception already exists");
                ServiceError::OpenReceptionAlreadyExists
            }
            StoreError::NotFound(Entity::PickupPoint) => ServiceError::InvalidPickupPoint(pvz_id),
            other => ServiceError::internal("failed to open reception", other),
        })?;

        record_reception_created();
        info!(pvz_id = %pvz_id, reception_id = %reception.id, "Reception opened");
        Ok(reception)
    }

    pub async fn close_last_reception(&self, pvz_id: Uuid) -> ServiceResult<Reception> {
        self.ensure_pvz(pvz_id).await?;

        let reception = self
            .receptions
            .close_open(pvz_id)
            .await
            .map_err(|e| match e {
                StoreError::NotFound(Entity::OpenReception) => {
                    warn!(pvz_id = %pvz_id, "No open reception to close");
                    ServiceError::NoOpenReception
                }
                other => ServiceError::internal("failed to close reception", other),
            })?;

        info!(pvz_id = %pvz_id, reception_id = %reception.id, "Reception closed");
        Ok(reception)
    }

    pub async fn add_product(&self, pvz_id: Uuid, product_type: &str) -> ServiceResult<Product> {
        let product_type: ProductType = product_type.parse().map_err(|_| {
            warn!(product_type = %product_type, "Invalid product type");
            ServiceError::InvalidProductType
        })?;
        self.ensure_pvz(pvz_id).await?;

        let product = self
            .products
            .append(pvz_id, product_type)
            .await
            .map_err(|e| match e {
                StoreError::NotFound(Entity::OpenReception) => {
                    warn!(pvz_id = %pvz_id, "No open reception for product");
                    ServiceError::NoOpenReception
                }
                other => ServiceError::internal("failed to add product", other),
            })?;

        record_product_added();
        info!(
            pvz_id = %pvz_id,
            reception_id = %product.reception_id,
            product_id = %product.id,
            "Product added"
        );
        Ok(product)
    }

    pub async fn delete_last_product(&self, pvz_id: Uuid) -> ServiceResult<Product> {
        self.ensure_pvz(pvz_id).await?;

        let product = self
            .products
            .delete_last(pvz_id)
            .await
            .map_err(|e| match e {
                StoreError::NotFound(Entity::OpenReception) => {
                    warn!(pvz_id = %pvz_id, "No open reception to delete from");
                    ServiceError::NoOpenReception
                }
                StoreError::NotFound(Entity::Product) => {
                    warn!(pvz_id = %pvz_id, "Open reception has no products");
                    ServiceError::NoProducts
                }
                other => ServiceError::internal("failed to delete product", other),
            })?;

        info!(pvz_id = %pvz_id, product_id = %product.id, "Last product deleted");
        Ok(product)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{City, ReceptionStatus};
    use crate::store::Stores;

    async fn setup() -> (IntakeService, Stores, Uuid) {
        let stores = Stores::memory();
        let pvz = stores.pvz.create(City::Moscow).await.unwrap();
        let intake = IntakeService::new(
            stores.pvz.clone(),
            stores.receptions.clone(),
            stores.products.clone(),
        );
        (intake, stores, pvz.id)
    }

    #[tokio::test]
    async fn test_unknown_pvz_is_rejected_everywhere() {
        let (intake, _, _) = setup().await;
        let unknown = Uuid::new_v4();

        assert!(matches!(
            intake.open_reception(unknown).await,
            Err(ServiceError::InvalidPickupPoint(id)) if id == unknown
        ));
        assert!(matches!(
            intake.close_last_reception(unknown).await,
            Err(ServiceError::InvalidPickupPoint(_))
        ));
        assert!(matches!(
            intake.add_product(unknown, "обувь").await,
            Err(ServiceError::InvalidPickupPoint(_))
        ));
        assert!(matches!(
            intake.delete_last_product(unknown).await,
            Err(ServiceError::InvalidPickupPoint(_))
        ));
    }

    #[tokio::test]
    async fn test_only_one_open_reception() {
        let (intake, _, pvz_id) = setup().await;

        let reception = intake.open_reception(pvz_id).await.unwrap();
        assert_eq!(reception.status, ReceptionStatus::InProgress);
        assert!(matches!(
            intake.open_reception(pvz_id).await,
            Err(ServiceError::OpenReceptionAlreadyExists)
        ));

        let closed = intake.close_last_reception(pvz_id).await.unwrap();
        assert_eq!(closed.id, reception.id);
        assert!(matches!(
            intake.close_last_reception(pvz_id).await,
            Err(ServiceError::NoOpenReception)
        ));

        intake.open_reception(pvz_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_reception_rejects_products() {
        let (intake, _, pvz_id) = setup().await;

        assert!(matches!(
            intake.add_product(pvz_id, "обувь").await,
            Err(ServiceError::NoOpenReception)
        ));

        intake.open_reception(pvz_id).await.unwrap();
        intake.add_product(pvz_id, "обувь").await.unwrap();
        intake.close_last_reception(pvz_id).await.unwrap();

        assert!(matches!(
            intake.add_product(pvz_id, "одежда").await,
            Err(ServiceError::NoOpenReception)
        ));
        assert!(matches!(
            intake.delete_last_product(pvz_id).await,
            Err(ServiceError::NoOpenReception)
        ));
    }

    #[tokio::test]
    async fn test_invalid_product_type() {
        let (intake, _, pvz_id) = setup().await;
        intake.open_reception(pvz_id).await.unwrap();
        assert!(matches!(
            intake.add_product(pvz_id, "мебель").await,
            Err(ServiceError::InvalidProductType)
        ));
    }

    #[tokio::test]
    async fn test_delete_last_is_lifo() {
        let (intake, _stores, pvz_id) = setup().await;
        let reception = intake.open_reception(pvz_id).await.unwrap();

        let first = intake.add_product(pvz_id, "электроника").await.unwrap();
        let second = intake.add_product(pvz_id, "одежда").await.unwrap();
        assert_eq!(first.reception_id, reception.id);

        let deleted = intake.delete_last_product(pvz_id).await.unwrap();
        assert_eq!(deleted.id, second.id);
        let deleted = intake.delete_last_product(pvz_id).await.unwrap();
        assert_eq!(deleted.id, first.id);

        assert!(matches!(
            intake.delete_last_product(pvz_id).await,
            Err(ServiceError::NoProducts)
        ));
        // Reception is still open after emptying it
        assert!(matches!(
            intake.open_reception(pvz_id).await,
            Err(ServiceError::OpenReceptionAlreadyExists)
        ));
    }

    #[tokio::test]
    async fn test_concurrent_opens_yield_one_reception() {
        let (intake, stores, pvz_id) = setup().await;
        let intake = Arc::new(intake);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let intake = intake.clone();
                tokio::spawn(async move { intake.open_reception(pvz_id).await })
            })
            .collect();

        let mut opened = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => opened += 1,
                Err(ServiceError::OpenReceptionAlreadyExists) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(opened, 1);
        assert!(stores.receptions.close_open(pvz_id).await.is_ok());
    }
}
