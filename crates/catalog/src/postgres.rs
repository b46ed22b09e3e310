use async_trait::async_trait;
use common::{ComponentId, ProductId};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    CatalogError, NewComponent, NewProduct, Product, ProductComponent, ProductFilter,
    ProductKind, ProductPatch, Result,
    store::{CatalogStore, validate_component, validate_stock},
};

const PRODUCT_COLUMNS: &str =
    "id, barcode, sku, name, kind, cost_cents, stock_quantity, created_at, updated_at";

const COMPONENT_COLUMNS: &str = "id, parent_product_id, child_product_id, quantity";

/// PostgreSQL-backed catalog store.
#[derive(Clone)]
pub struct PostgresCatalogStore {
    pool: PgPool,
}

impl PostgresCatalogStore {
    /// Creates a new PostgreSQL catalog store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool against `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        tracing::info!(max_connections, "connected to catalog database");
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("catalog migrations applied");
        Ok(())
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        let kind: String = row.try_get("kind")?;
        let kind: ProductKind = kind
            .parse()
            .map_err(|e: String| CatalogError::Database(sqlx::Error::Decode(e.into())))?;

        Ok(Product {
            id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
            barcode: row.try_get("barcode")?,
            sku: row.try_get("sku")?,
            name: row.try_get("name")?,
            kind,
            cost_cents: row.try_get("cost_cents")?,
            stock_quantity: row.try_get("stock_quantity")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_component(row: PgRow) -> Result<ProductComponent> {
        let quantity: i32 = row.try_get("quantity")?;
        let quantity = u32::try_from(quantity).map_err(|e| {
            CatalogError::Database(sqlx::Error::Decode(Box::new(e)))
        })?;

        Ok(ProductComponent {
            id: ComponentId::from_uuid(row.try_get::<Uuid, _>("id")?),
            parent_product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("parent_product_id")?),
            child_product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("child_product_id")?),
            quantity,
        })
    }

    /// Translates unique-constraint violations into catalog errors.
    fn map_write_error(e: sqlx::Error, barcode: &str, sku: Option<&str>) -> CatalogError {
        if let sqlx::Error::Database(ref db_err) = e {
            match db_err.constraint() {
                Some("unique_product_barcode") => {
                    return CatalogError::DuplicateBarcode(barcode.to_string());
                }
                Some("unique_product_sku") => {
                    return CatalogError::DuplicateSku(sku.unwrap_or_default().to_string());
                }
                _ => {}
            }
        }
        CatalogError::Database(e)
    }

    fn uuids(ids: &[ProductId]) -> Vec<Uuid> {
        ids.iter().map(ProductId::as_uuid).collect()
    }
}

#[async_trait]
impl CatalogStore for PostgresCatalogStore {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn get_product_by_barcode(&self, barcode: &str) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE barcode = $1"
        ))
        .bind(barcode)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)"
        ))
        .bind(Self::uuids(ids))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_product).collect()
    }

    async fn get_products_by_barcodes(&self, barcodes: &[String]) -> Result<Vec<Product>> {
        if barcodes.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE barcode = ANY($1)"
        ))
        .bind(barcodes)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_product).collect()
    }

    async fn list_products(&self, filter: ProductFilter) -> Result<Vec<Product>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE ($1::text IS NULL OR kind = $1)
              AND ($2::text IS NULL OR name ILIKE $2 OR barcode ILIKE $2 OR sku ILIKE $2)
            ORDER BY name ASC, barcode ASC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(filter.kind.map(|k| k.as_str()))
        .bind(filter.search_pattern())
        .bind(filter.limit.map(|l| l as i64))
        .bind(filter.offset.unwrap_or(0) as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_product).collect()
    }

    async fn create_product(&self, new: NewProduct) -> Result<Product> {
        let id = ProductId::new();
        validate_stock(id, new.stock_quantity)?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO products (id, barcode, sku, name, kind, cost_cents, stock_quantity)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(&new.barcode)
        .bind(&new.sku)
        .bind(&new.name)
        .bind(new.kind.as_str())
        .bind(new.cost_cents)
        .bind(new.stock_quantity)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Self::map_write_error(e, &new.barcode, new.sku.as_deref()))?;

        Self::row_to_product(row)
    }

    async fn update_product(&self, id: ProductId, patch: ProductPatch) -> Result<Product> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(CatalogError::ProductNotFound(id))?;

        let mut product = Self::row_to_product(row)?;
        patch.apply_to(&mut product);
        validate_stock(id, product.stock_quantity)?;

        let row = sqlx::query(&format!(
            r#"
            UPDATE products
            SET barcode = $2, sku = $3, name = $4, cost_cents = $5, stock_quantity = $6,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(&product.barcode)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.cost_cents)
        .bind(product.stock_quantity)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| Self::map_write_error(e, &product.barcode, product.sku.as_deref()))?;

        tx.commit().await?;
        Self::row_to_product(row)
    }

    async fn delete_product(&self, id: ProductId) -> Result<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::ProductNotFound(id));
        }
        Ok(())
    }

    async fn list_components(&self, parent_id: ProductId) -> Result<Vec<ProductComponent>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {COMPONENT_COLUMNS}
            FROM product_components
            WHERE parent_product_id = $1
            ORDER BY created_at ASC, id ASC
            "#
        ))
        .bind(parent_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_component).collect()
    }

    async fn list_components_for(
        &self,
        parent_ids: &[ProductId],
    ) -> Result<Vec<ProductComponent>> {
        if parent_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(&format!(
            r#"
            SELECT {COMPONENT_COLUMNS}
            FROM product_components
            WHERE parent_product_id = ANY($1)
            ORDER BY created_at ASC, id ASC
            "#
        ))
        .bind(Self::uuids(parent_ids))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_component).collect()
    }

    async fn create_component(&self, new: NewComponent) -> Result<ProductComponent> {
        let products = self
            .get_products(&[new.parent_product_id, new.child_product_id])
            .await?;
        let find = |id: ProductId| {
            products
                .iter()
                .find(|p| p.id == id)
                .ok_or(CatalogError::ProductNotFound(id))
        };
        let parent = find(new.parent_product_id)?;
        let child = find(new.child_product_id)?;
        validate_component(&new, parent, child)?;

        let quantity = i32::try_from(new.quantity).map_err(|_| {
            CatalogError::InvalidComponent(format!("quantity {} is too large", new.quantity))
        })?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO product_components (id, parent_product_id, child_product_id, quantity)
            VALUES ($1, $2, $3, $4)
            RETURNING {COMPONENT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(new.parent_product_id.as_uuid())
        .bind(new.child_product_id.as_uuid())
        .bind(quantity)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_component(row)
    }

    async fn delete_component(&self, id: ComponentId) -> Result<()> {
        let result = sqlx::query("DELETE FROM product_components WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::ComponentNotFound(id));
        }
        Ok(())
    }

    async fn set_stock(&self, id: ProductId, quantity: i64) -> Result<Product> {
        validate_stock(id, quantity)?;

        let row = sqlx::query(&format!(
            r#"
            UPDATE products
            SET stock_quantity = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(quantity)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(CatalogError::ProductNotFound(id))?;

        tracing::debug!(product = %id, quantity, "stock counter set");
        Self::row_to_product(row)
    }
}
