//! Pickup point registration and the detailed listing.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::error::{ServiceError, ServiceResult};
use crate::api::metrics::record_pvz_created;
use crate::db::{City, ListQuery, PickupPoint, PickupPointDetails};
use crate::store::PvzStore;

pub const DEFAULT_PAGE: u32 = 1;
pub const MAX_LIMIT: u32 = 30;

/// Clamp raw paging input: `page < 1` becomes 1, `limit` outside `1..=30` becomes 30
pub fn normalize_paging(page: Option<i64>, limit: Option<i64>) -> (u32, u32) {
    let page = match page {
        Some(p) if p >= 1 => u32::try_from(p).unwrap_or(u32::MAX),
        _ => DEFAULT_PAGE,
    };
    let limit = match limit {
        Some(l) if (1..=i64::from(MAX_LIMIT)).contains(&l) => l as u32,
        _ => MAX_LIMIT,
    };
    (page, limit)
}

pub struct CatalogService {
    pvz: Arc<dyn PvzStore>,
}

impl CatalogService {
    pub fn new(pvz: Arc<dyn PvzStore>) -> Self {
        Self { pvz }
    }

    pub async fn create_pvz(&self, city: &str) -> ServiceResult<PickupPoint> {
        let city: City = city.parse().map_err(|_| {
            warn!(city = %city, "Invalid city provided");
            ServiceError::InvalidCity
        })?;

        let pvz = self
            .pvz
            .create(city)
            .await
            .map_err(|e| ServiceError::internal("failed to create pvz", e))?;

        record_pvz_created();
        info!(pvz_id = %pvz.id, city = %city, "Pickup point created");
        Ok(pvz)
    }

    pub async fn list_with_details(
        &self,
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> ServiceResult<Vec<PickupPointDetails>> {
        let (page, limit) = normalize_paging(page, limit);
        let query = ListQuery {
            start_date,
            end_date,
            page,
            limit,
        };

        let pvzs = self
            .pvz
            .list_with_details(&query)
            .await
            .map_err(|e| ServiceError::internal("failed to list pvz", e))?;

        debug!(page, limit, count = pvzs.len(), "Pickup points listed");
        Ok(pvzs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Stores;

    #[test]
    fn test_normalize_paging() {
        assert_eq!(normalize_paging(None, None), (1, 30));
        assert_eq!(normalize_paging(Some(0), Some(0)), (1, 30));
        assert_eq!(normalize_paging(Some(-3), Some(31)), (1, 30));
        assert_eq!(normalize_paging(Some(4), Some(10)), (4, 10));
        assert_eq!(normalize_paging(Some(2), Some(30)), (2, 30));
        assert_eq!(normalize_paging(Some(1), Some(1)), (1, 1));
    }

    #[tokio::test]
    async fn test_create_pvz_validates_city() {
        let catalog = CatalogService::new(Stores::memory().pvz);

        let pvz = catalog.create_pvz("Казань").await.unwrap();
        assert_eq!(pvz.city, City::Kazan);

        assert!(matches!(
            catalog.create_pvz("Новосибирск").await,
            Err(ServiceError::InvalidCity)
        ));
    }

    #[tokio::test]
    async fn test_list_coerces_limit() {
        let catalog = CatalogService::new(Stores::memory().pvz);
        for _ in 0..3 {
            catalog.create_pvz("Москва").await.unwrap();
        }

        let all = catalog
            .list_with_details(None, None, Some(0), Some(100))
            .await
            .unwrap();
        assert_eq!(all.len(), 3);

        let second_page = catalog
            .list_with_details(None, None, Some(2), Some(2))
            .await
            .unwrap();
        assert_eq!(second_page.len(), 1);
    }
}
