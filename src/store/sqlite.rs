//! SQLite implementation of the store traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    Entity, ProductStore, PvzStore, ReceptionStore, StoreError, StoreResult, UserStore,
};
use crate::db::{
    format_timestamp, now_timestamp, parse_timestamp, City, ListQuery, NewUser, PickupPoint,
    PickupPointDetails, Product, ProductType, Reception, ReceptionDetails, User,
};
use crate::DbPool;

const RECEPTION_COLUMNS: &str = "id, date_time, pvz_id, status";
const PRODUCT_COLUMNS: &str = "id, date_time, type, reception_id, seq";

#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: String,
    email: String,
    password_hash: String,
    role: String,
    created_at: String,
}

#[derive(Debug, FromRow)]
struct PvzRow {
    id: String,
    registration_date: String,
    city: String,
}

#[derive(Debug, FromRow)]
struct ReceptionRow {
    id: String,
    date_time: String,
    pvz_id: String,
    status: String,
}

#[derive(Debug, FromRow)]
struct ProductRow {
    id: String,
    date_time: String,
    #[sqlx(rename = "type")]
    product_type: String,
    reception_id: String,
    seq: i64,
}

fn parse_uuid(value: &str) -> StoreResult<Uuid> {
    Uuid::parse_str(value).map_err(|e| StoreError::Corrupt(format!("uuid {:?}: {}", value, e)))
}

fn parse_ts(value: &str) -> StoreResult<DateTime<Utc>> {
    parse_timestamp(value).map_err(|e| StoreError::Corrupt(format!("timestamp {:?}: {}", value, e)))
}

fn parse_enum<T: FromStr<Err = String>>(value: &str) -> StoreResult<T> {
    value.parse().map_err(StoreError::Corrupt)
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> StoreResult<Self> {
        Ok(Self {
            id: parse_uuid(&row.id)?,
            email: row.email,
            password_hash: row.password_hash,
            role: parse_enum(&row.role)?,
            created_at: parse_ts(&row.created_at)?,
        })
    }
}

impl TryFrom<PvzRow> for PickupPoint {
    type Error = StoreError;

    fn try_from(row: PvzRow) -> StoreResult<Self> {
        Ok(Self {
            id: parse_uuid(&row.id)?,
            registration_date: parse_ts(&row.registration_date)?,
            city: parse_enum(&row.city)?,
        })
    }
}

impl TryFrom<ReceptionRow> for Reception {
    type Error = StoreError;

    fn try_from(row: ReceptionRow) -> StoreResult<Self> {
        Ok(Self {
            id: parse_uuid(&row.id)?,
            date_time: parse_ts(&row.date_time)?,
            pvz_id: parse_uuid(&row.pvz_id)?,
            status: parse_enum(&row.status)?,
        })
    }
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;

    fn try_from(row: ProductRow) -> StoreResult<Self> {
        Ok(Self {
            id: parse_uuid(&row.id)?,
            date_time: parse_ts(&row.date_time)?,
            product_type: parse_enum(&row.product_type)?,
            reception_id: parse_uuid(&row.reception_id)?,
            seq: row.seq,
        })
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map_or(false, |db_err| db_err.is_unique_violation())
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map_or(false, |db_err| db_err.is_foreign_key_violation())
}

/// Append the reception date-range predicate for `query`
fn push_date_filter(qb: &mut QueryBuilder<'_, Sqlite>, column: &str, query: &ListQuery) {
    if let Some(start) = query.start_date {
        qb.push(format!(" AND {} >= ", column))
            .push_bind(format_timestamp(start));
    }
    if let Some(end) = query.end_date {
        qb.push(format!(" AND {} <= ", column))
            .push_bind(format_timestamp(end));
    }
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn create(&self, user: NewUser) -> StoreResult<User> {
        let id = Uuid::new_v4().to_string();
        let now = now_timestamp();

        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (id, email, password_hash, role, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, email, password_hash, role, created_at
            "#,
        )
        .bind(&id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(&now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                warn!("Duplicate entry for user");
                StoreError::Duplicate(Entity::User)
            } else {
                StoreError::Database(e)
            }
        })?;
        tx.commit().await?;

        debug!(user_id = %id, "User row inserted");
        User::try_from(row)
    }

    async fn get_by_email(&self, email: &str) -> StoreResult<User> {
        sqlx::query_as::<_, UserRow>(
            "SELECT id, email, password_hash, role, created_at FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound(Entity::User))
        .and_then(User::try_from)
    }
}

#[async_trait]
impl PvzStore for SqliteStore {
    async fn create(&self, city: City) -> StoreResult<PickupPoint> {
        let row = sqlx::query_as::<_, PvzRow>(
            r#"
            INSERT INTO pvz (id, registration_date, city)
            VALUES (?, ?, ?)
            RETURNING id, registration_date, city
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(now_timestamp())
        .bind(city.as_str())
        .fetch_one(&self.pool)
        .await?;

        PickupPoint::try_from(row)
    }

    async fn exists(&self, id: Uuid) -> StoreResult<bool> {
        let found: i64 = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pvz WHERE id = ?)")
            .bind(id.to_string())
            .fetch_one(&self.pool)
            .await?;
        Ok(found != 0)
    }

    async fn list_with_details(&self, query: &ListQuery) -> StoreResult<Vec<PickupPointDetails>> {
        // One read transaction so the three queries see the same snapshot
        let mut tx = self.pool.begin().await?;

        let pvz_rows = sqlx::query_as::<_, PvzRow>(
            r#"
            SELECT id, registration_date, city
            FROM pvz
            ORDER BY registration_date, rowid
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(i64::from(query.limit))
        .bind(query.offset() as i64)
        .fetch_all(&mut *tx)
        .await?;

        if pvz_rows.is_empty() {
            tx.commit().await?;
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM receptions WHERE pvz_id IN (",
            RECEPTION_COLUMNS
        ));
        let mut ids = qb.separated(", ");
        for row in &pvz_rows {
            ids.push_bind(row.id.clone());
        }
        ids.push_unseparated(")");
        push_date_filter(&mut qb, "date_time", query);
        qb.push(" ORDER BY date_time DESC, rowid DESC");
        let reception_rows: Vec<ReceptionRow> = qb.build_query_as().fetch_all(&mut *tx).await?;

        let mut qb = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT p.id, p.date_time, p.type, p.reception_id, p.seq
            FROM products p
            JOIN receptions r ON r.id = p.reception_id
            WHERE r.pvz_id IN (
            "#,
        );
        let mut ids = qb.separated(", ");
        for row in &pvz_rows {
            ids.push_bind(row.id.clone());
        }
        ids.push_unseparated(")");
        push_date_filter(&mut qb, "r.date_time", query);
        qb.push(" ORDER BY p.reception_id, p.seq DESC");
        let product_rows: Vec<ProductRow> = qb.build_query_as().fetch_all(&mut *tx).await?;

        tx.commit().await?;

        let mut products: HashMap<Uuid, Vec<Product>> = HashMap::new();
        for row in product_rows {
            let product = Product::try_from(row)?;
            products.entry(product.reception_id).or_default().push(product);
        }

        let mut receptions: HashMap<Uuid, Vec<ReceptionDetails>> = HashMap::new();
        for row in reception_rows {
            let reception = Reception::try_from(row)?;
            let items = products.remove(&reception.id).unwrap_or_default();
            receptions
                .entry(reception.pvz_id)
                .or_default()
                .push(ReceptionDetails {
                    reception,
                    products: items,
                });
        }

        pvz_rows
            .into_iter()
            .map(|row| {
                let pvz = PickupPoint::try_from(row)?;
                let receptions = receptions.remove(&pvz.id).unwrap_or_default();
                Ok(PickupPointDetails { pvz, receptions })
            })
            .collect()
    }
}

#[async_trait]
impl ReceptionStore for SqliteStore {
    async fn open(&self, pvz_id: Uuid) -> StoreResult<Reception> {
        let id = Uuid::new_v4().to_string();
        let pvz = pvz_id.to_string();

        let mut tx = self.pool.begin().await?;
        // The insert only happens when no reception is open; the partial
        // unique index catches the same race at commit level.
        let row = sqlx::query_as::<_, ReceptionRow>(&format!(
            r#"
            INSERT INTO receptions (id, date_time, pvz_id, status)
            SELECT ?, ?, ?, 'in_progress'
            WHERE NOT EXISTS (
                SELECT 1 FROM receptions WHERE pvz_id = ? AND status = 'in_progress'
            )
            RETURNING {}
            "#,
            RECEPTION_COLUMNS
        ))
        .bind(&id)
        .bind(now_timestamp())
        .bind(&pvz)
        .bind(&pvz)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Duplicate(Entity::OpenReception)
            } else if is_foreign_key_violation(&e) {
                StoreError::NotFound(Entity::PickupPoint)
            } else {
                StoreError::Database(e)
            }
        })?
        .ok_or(StoreError::Duplicate(Entity::OpenReception))?;
        tx.commit().await?;

        info!(pvz_id = %pvz, reception_id = %id, "Reception row inserted");
        Reception::try_from(row)
    }

    async fn close_open(&self, pvz_id: Uuid) -> StoreResult<Reception> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, ReceptionRow>(&format!(
            r#"
            UPDATE receptions
            SET status = 'close'
            WHERE pvz_id = ? AND status = 'in_progress'
            RETURNING {}
            "#,
            RECEPTION_COLUMNS
        ))
        .bind(pvz_id.to_string())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound(Entity::OpenReception))?;
        tx.commit().await?;

        Reception::try_from(row)
    }
}

#[async_trait]
impl ProductStore for SqliteStore {
    async fn append(&self, pvz_id: Uuid, product_type: ProductType) -> StoreResult<Product> {
        let mut tx = self.pool.begin().await?;
        // Reception lookup and next sequence number are part of the insert
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            INSERT INTO products (id, date_time, type, reception_id, seq)
            SELECT ?, ?, ?, r.id,
                   COALESCE((SELECT MAX(p.seq) FROM products p WHERE p.reception_id = r.id), 0) + 1
            FROM receptions r
            WHERE r.pvz_id = ? AND r.status = 'in_progress'
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(Uuid::new_v4().to_string())
        .bind(now_timestamp())
        .bind(product_type.as_str())
        .bind(pvz_id.to_string())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound(Entity::OpenReception))?;
        tx.commit().await?;

        Product::try_from(row)
    }

    async fn delete_last(&self, pvz_id: Uuid) -> StoreResult<Product> {
        let pvz = pvz_id.to_string();

        let mut tx = self.pool.begin().await?;
        let deleted = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            DELETE FROM products
            WHERE id = (
                SELECT p.id
                FROM products p
                JOIN receptions r ON r.id = p.reception_id
                WHERE r.pvz_id = ? AND r.status = 'in_progress'
                ORDER BY p.seq DESC
                LIMIT 1
            )
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(&pvz)
        .fetch_optional(&mut *tx)
        .await?;

        let row = match deleted {
            Some(row) => row,
            None => {
                let open: i64 = sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM receptions WHERE pvz_id = ? AND status = 'in_progress')",
                )
                .bind(&pvz)
                .fetch_one(&mut *tx)
                .await?;
                return Err(if open != 0 {
                    StoreError::NotFound(Entity::Product)
                } else {
                    StoreError::NotFound(Entity::OpenReception)
                });
            }
        };
        tx.commit().await?;

        Product::try_from(row)
    }
}
