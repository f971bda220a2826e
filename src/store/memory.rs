//! In-process store backing the engine tests.
//!
//! All four stores share one lock; each operation takes it once, so the
//! check and the write of a conditional mutation can never interleave.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use super::{
    Entity, ProductStore, PvzStore, ReceptionStore, StoreError, StoreResult, UserStore,
};
use crate::db::{
    City, ListQuery, NewUser, PickupPoint, PickupPointDetails, Product, ProductType, Reception,
    ReceptionDetails, ReceptionStatus, User,
};

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    // Insertion order doubles as the tie-breaker for equal timestamps
    pvz: Vec<PickupPoint>,
    receptions: Vec<Reception>,
    products: Vec<Product>,
}

impl Inner {
    fn open_reception(&self, pvz_id: Uuid) -> Option<&Reception> {
        self.receptions
            .iter()
            .find(|r| r.pvz_id == pvz_id && r.is_open())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create(&self, user: NewUser) -> StoreResult<User> {
        let mut inner = self.inner.lock();
        if inner.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate(Entity::User));
        }
        let user = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            created_at: Utc::now(),
        };
        inner.users.push(user.clone());
        Ok(user)
    }

    async fn get_by_email(&self, email: &str) -> StoreResult<User> {
        self.inner
            .lock()
            .users
            .iter()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(StoreError::NotFound(Entity::User))
    }
}

#[async_trait]
impl PvzStore for MemoryStore {
    async fn create(&self, city: City) -> StoreResult<PickupPoint> {
        let pvz = PickupPoint {
            id: Uuid::new_v4(),
            registration_date: Utc::now(),
            city,
        };
        self.inner.lock().pvz.push(pvz.clone());
        Ok(pvz)
    }

    async fn exists(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.inner.lock().pvz.iter().any(|p| p.id == id))
    }

    async fn list_with_details(&self, query: &ListQuery) -> StoreResult<Vec<PickupPointDetails>> {
        let inner = self.inner.lock();

        let mut points: Vec<&PickupPoint> = inner.pvz.iter().collect();
        points.sort_by_key(|p| p.registration_date);

        let page = points
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit as usize)
            .map(|pvz| {
                // Newest reception first; later insertions win ties
                let mut receptions: Vec<&Reception> = inner
                    .receptions
                    .iter()
                    .rev()
                    .filter(|r| r.pvz_id == pvz.id && query.includes(&r.date_time))
                    .collect();
                receptions.sort_by(|a, b| b.date_time.cmp(&a.date_time));

                let receptions = receptions
                    .into_iter()
                    .map(|reception| {
                        let mut products: Vec<Product> = inner
                            .products
                            .iter()
                            .filter(|p| p.reception_id == reception.id)
                            .cloned()
                            .collect();
                        products.sort_by(|a, b| b.seq.cmp(&a.seq));
                        ReceptionDetails {
                            reception: reception.clone(),
                            products,
                        }
                    })
                    .collect();

                PickupPointDetails {
                    pvz: pvz.clone(),
                    receptions,
                }
            })
            .collect();

        Ok(page)
    }
}

#[async_trait]
impl ReceptionStore for MemoryStore {
    async fn open(&self, pvz_id: Uuid) -> StoreResult<Reception> {
        let mut inner = self.inner.lock();
        if !inner.pvz.iter().any(|p| p.id == pvz_id) {
            return Err(StoreError::NotFound(Entity::PickupPoint));
        }
        if inner.open_reception(pvz_id).is_some() {
            return Err(StoreError::Duplicate(Entity::OpenReception));
        }
        let reception = Reception {
            id: Uuid::new_v4(),
            date_time: Utc::now(),
            pvz_id,
            status: ReceptionStatus::InProgress,
        };
        inner.receptions.push(reception.clone());
        Ok(reception)
    }

    async fn close_open(&self, pvz_id: Uuid) -> StoreResult<Reception> {
        let mut inner = self.inner.lock();
        let reception = inner
            .receptions
            .iter_mut()
            .find(|r| r.pvz_id == pvz_id && r.is_open())
            .ok_or(StoreError::NotFound(Entity::OpenReception))?;
        reception.status = ReceptionStatus::Closed;
        Ok(reception.clone())
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn append(&self, pvz_id: Uuid, product_type: ProductType) -> StoreResult<Product> {
        let mut inner = self.inner.lock();
        let reception_id = inner
            .open_reception(pvz_id)
            .map(|r| r.id)
            .ok_or(StoreError::NotFound(Entity::OpenReception))?;
        let seq = inner
            .products
            .iter()
            .filter(|p| p.reception_id == reception_id)
            .map(|p| p.seq)
            .max()
            .unwrap_or(0)
            + 1;
        let product = Product {
            id: Uuid::new_v4(),
            date_time: Utc::now(),
            product_type,
            reception_id,
            seq,
        };
        inner.products.push(product.clone());
        Ok(product)
    }

    async fn delete_last(&self, pvz_id: Uuid) -> StoreResult<Product> {
        let mut inner = self.inner.lock();
        let reception_id = inner
            .open_reception(pvz_id)
            .map(|r| r.id)
            .ok_or(StoreError::NotFound(Entity::OpenReception))?;
        let index = inner
            .products
            .iter()
            .enumerate()
            .filter(|(_, p)| p.reception_id == reception_id)
            .max_by_key(|(_, p)| p.seq)
            .map(|(i, _)| i)
            .ok_or(StoreError::NotFound(Entity::Product))?;
        Ok(inner.products.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Role;
    use crate::store::Stores;

    fn list_all() -> ListQuery {
        ListQuery {
            start_date: None,
            end_date: None,
            page: 1,
            limit: 30,
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let stores = Stores::memory();
        let new_user = || NewUser {
            email: "a@b.com".to_string(),
            password_hash: "h".to_string(),
            role: Role::Employee,
        };
        stores.users.create(new_user()).await.unwrap();
        let err = stores.users.create(new_user()).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(Entity::User)));
    }

    #[tokio::test]
    async fn test_reception_lifecycle() {
        let stores = Stores::memory();
        let pvz = stores.pvz.create(City::Moscow).await.unwrap();

        let open = stores.receptions.open(pvz.id).await.unwrap();
        assert!(matches!(
            stores.receptions.open(pvz.id).await,
            Err(StoreError::Duplicate(Entity::OpenReception))
        ));

        let closed = stores.receptions.close_open(pvz.id).await.unwrap();
        assert_eq!(closed.id, open.id);
        assert_eq!(closed.status, ReceptionStatus::Closed);
        assert!(stores
            .receptions
            .close_open(pvz.id)
            .await
            .unwrap_err()
            .is_not_found(Entity::OpenReception));
        assert!(stores.receptions.open(pvz.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_open_unknown_pvz() {
        let stores = Stores::memory();
        let err = stores.receptions.open(Uuid::new_v4()).await.unwrap_err();
        assert!(err.is_not_found(Entity::PickupPoint));
    }

    #[tokio::test]
    async fn test_products_are_a_stack() {
        let stores = Stores::memory();
        let pvz = stores.pvz.create(City::Kazan).await.unwrap();
        stores.receptions.open(pvz.id).await.unwrap();

        let a = stores.products.append(pvz.id, ProductType::Shoes).await.unwrap();
        let b = stores.products.append(pvz.id, ProductType::Clothes).await.unwrap();
        assert_eq!((a.seq, b.seq), (1, 2));

        assert_eq!(stores.products.delete_last(pvz.id).await.unwrap().id, b.id);
        let c = stores.products.append(pvz.id, ProductType::Electronics).await.unwrap();
        assert_eq!(c.seq, 2);
        assert_eq!(stores.products.delete_last(pvz.id).await.unwrap().id, c.id);
        assert_eq!(stores.products.delete_last(pvz.id).await.unwrap().id, a.id);

        let err = stores.products.delete_last(pvz.id).await.unwrap_err();
        assert!(err.is_not_found(Entity::Product));
    }

    #[tokio::test]
    async fn test_listing_orders_newest_first() {
        let stores = Stores::memory();
        let first = stores.pvz.create(City::Moscow).await.unwrap();
        let second = stores.pvz.create(City::Kazan).await.unwrap();

        let old = stores.receptions.open(first.id).await.unwrap();
        stores.receptions.close_open(first.id).await.unwrap();
        let new = stores.receptions.open(first.id).await.unwrap();
        let a = stores.products.append(first.id, ProductType::Shoes).await.unwrap();
        let b = stores.products.append(first.id, ProductType::Shoes).await.unwrap();

        let page = stores.pvz.list_with_details(&list_all()).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].pvz.id, first.id);
        assert_eq!(page[1].pvz.id, second.id);
        assert!(page[1].receptions.is_empty());

        let ids: Vec<Uuid> = page[0].receptions.iter().map(|r| r.reception.id).collect();
        assert_eq!(ids, vec![new.id, old.id]);
        let products: Vec<Uuid> = page[0].receptions[0].products.iter().map(|p| p.id).collect();
        assert_eq!(products, vec![b.id, a.id]);
    }

    #[tokio::test]
    async fn test_listing_filters_receptions_by_date() {
        let stores = Stores::memory();
        let pvz = stores.pvz.create(City::Moscow).await.unwrap();
        stores.receptions.open(pvz.id).await.unwrap();

        let query = ListQuery {
            start_date: Some(Utc::now() + chrono::Duration::hours(1)),
            ..list_all()
        };
        let page = stores.pvz.list_with_details(&query).await.unwrap();
        assert_eq!(page.len(), 1);
        assert!(page[0].receptions.is_empty());
    }

    #[tokio::test]
    async fn test_listing_pages() {
        let stores = Stores::memory();
        for _ in 0..5 {
            stores.pvz.create(City::SaintPetersburg).await.unwrap();
        }
        let query = |page| ListQuery {
            page,
            limit: 2,
            ..list_all()
        };
        assert_eq!(stores.pvz.list_with_details(&query(1)).await.unwrap().len(), 2);
        assert_eq!(stores.pvz.list_with_details(&query(3)).await.unwrap().len(), 1);
        assert!(stores.pvz.list_with_details(&query(4)).await.unwrap().is_empty());
    }
}
