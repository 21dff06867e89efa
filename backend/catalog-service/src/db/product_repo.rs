use super::{ProductStore, StoreError, StoreResult};
use crate::models::{ImageStatus, NewProduct, Product, ProductFilter};
use async_trait::async_trait;
use resilience::timeout::{with_timeout_result, TimeoutError};
use sqlx::PgPool;
use std::future::Future;
use std::time::Duration;

const PRODUCT_COLUMNS: &str = "id, user_id, name, description, source_image_urls, price, \
     processed_image_urls, image_status, created_at";

/// PostgreSQL-backed product store
#[derive(Clone)]
pub struct PgProductStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgProductStore {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    async fn bounded<T, F>(&self, fut: F) -> StoreResult<T>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        with_timeout_result(self.timeout, fut)
            .await
            .map_err(|err| match err {
                TimeoutError::Elapsed(d) => StoreError::Timeout(d),
                TimeoutError::Failed(e) => StoreError::from(e),
            })
    }
}

#[async_trait]
impl ProductStore for PgProductStore {
    async fn insert(&self, product: NewProduct) -> StoreResult<Product> {
        let sql = format!(
            r#"
            INSERT INTO products (user_id, name, description, source_image_urls, price, image_status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PRODUCT_COLUMNS}
            "#
        );

        self.bounded(
            sqlx::query_as::<_, Product>(&sql)
                .bind(product.user_id)
                .bind(&product.name)
                .bind(&product.description)
                .bind(&product.source_image_urls)
                .bind(product.price)
                .bind(product.image_status.as_str())
                .fetch_one(&self.pool),
        )
        .await
    }

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");

        self.bounded(
            sqlx::query_as::<_, Product>(&sql)
                .bind(id)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn list(&self, filter: &ProductFilter) -> StoreResult<Vec<Product>> {
        let sql = format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE ($1::BIGINT IS NULL OR user_id = $1)
              AND ($2::FLOAT8 IS NULL OR price >= $2)
              AND ($3::FLOAT8 IS NULL OR price <= $3)
            ORDER BY id
            LIMIT $4
            "#
        );

        self.bounded(
            sqlx::query_as::<_, Product>(&sql)
                .bind(filter.user_id)
                .bind(filter.min_price)
                .bind(filter.max_price)
                .bind(filter.limit)
                .fetch_all(&self.pool),
        )
        .await
    }

    async fn set_image_status(&self, id: i64, status: ImageStatus) -> StoreResult<()> {
        let result = self
            .bounded(
                sqlx::query(
                    "UPDATE products SET image_status = $2, updated_at = NOW() WHERE id = $1",
                )
                .bind(id)
                .bind(status.as_str())
                .execute(&self.pool),
            )
            .await?;

        if result.rows_affected() == 0 {
            tracing::debug!(product_id = id, "image status update matched no product");
        }
        Ok(())
    }

    async fn append_processed_image(&self, id: i64, location: &str) -> StoreResult<bool> {
        let result = self
            .bounded(
                sqlx::query(
                    r#"
                    UPDATE products
                    SET processed_image_urls = array_append(processed_image_urls, $2),
                        updated_at = NOW()
                    WHERE id = $1 AND NOT ($2 = ANY(processed_image_urls))
                    "#,
                )
                .bind(id)
                .bind(location)
                .execute(&self.pool),
            )
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_by_image_status(
        &self,
        status: ImageStatus,
        limit: i64,
    ) -> StoreResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE image_status = $1 ORDER BY id LIMIT $2"
        );

        self.bounded(
            sqlx::query_as::<_, Product>(&sql)
                .bind(status.as_str())
                .bind(limit)
                .fetch_all(&self.pool),
        )
        .await
    }
}
