use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use ssvpl_catalog::{
    GstRate, Product, ProductCategory, ProductPricing, StockAdjustment, StockTransaction, StockTransactionKind,
};
use ssvpl_core::{ProductPage, ProductQuery, ProductRepository, RepositoryError, RepositoryResult};
use uuid::Uuid;

use crate::database::map_sqlx_error;

pub struct StoreProductRepository {
    pool: PgPool,
}

impl StoreProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal struct for type-safe querying
#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    product_name: String,
    description: String,
    category: String,
    hsn_code: String,
    sku: String,
    price: i64,
    mrp: i64,
    gst_rate_bps: i32,
    gst_amount: i64,
    cgst_amount: i64,
    sgst_amount: i64,
    final_price_inc_gst: i64,
    stock_quantity: i64,
    reorder_level: i64,
    is_active: bool,
    created_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let category = ProductCategory::parse(&row.category)
            .ok_or_else(|| RepositoryError::Internal(format!("unknown category '{}'", row.category)))?;
        let gst_rate = GstRate::from_basis_points(i64::from(row.gst_rate_bps))
            .map_err(|e| RepositoryError::Internal(e.to_string()))?;

        Ok(Product {
            id: row.id,
            product_name: row.product_name,
            description: row.description,
            category,
            hsn_code: row.hsn_code,
            sku: row.sku,
            pricing: ProductPricing {
                price: row.price,
                mrp: row.mrp,
                gst_rate,
                gst_amount: row.gst_amount,
                cgst_amount: row.cgst_amount,
                sgst_amount: row.sgst_amount,
                igst_amount: row.gst_amount,
                final_price_inc_gst: row.final_price_inc_gst,
            },
            stock_quantity: row.stock_quantity,
            reorder_level: row.reorder_level,
            is_active: row.is_active,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct StockTransactionRow {
    id: Uuid,
    product_id: Uuid,
    transaction_type: String,
    quantity: i64,
    previous_stock: i64,
    new_stock: i64,
    reason: String,
    performed_by: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<StockTransactionRow> for StockTransaction {
    type Error = RepositoryError;

    fn try_from(row: StockTransactionRow) -> Result<Self, Self::Error> {
        let transaction_type = StockTransactionKind::parse(&row.transaction_type).ok_or_else(|| {
            RepositoryError::Internal(format!("unknown stock transaction type '{}'", row.transaction_type))
        })?;

        Ok(StockTransaction {
            id: row.id,
            product_id: row.product_id,
            transaction_type,
            quantity: row.quantity,
            previous_stock: row.previous_stock,
            new_stock: row.new_stock,
            reason: row.reason,
            performed_by: row.performed_by,
            created_at: row.created_at,
        })
    }
}

const PRODUCT_COLUMNS: &str = "id, product_name, description, category, hsn_code, sku, price, mrp, \
    gst_rate_bps, gst_amount, cgst_amount, sgst_amount, final_price_inc_gst, stock_quantity, \
    reorder_level, is_active, created_by, created_at, updated_at, deleted_at";

async fn insert_stock_transaction(
    tx: &mut Transaction<'_, Postgres>,
    entry: &StockTransaction,
) -> RepositoryResult<()> {
    sqlx::query(
        r#"
        INSERT INTO stock_transactions (id, product_id, transaction_type, quantity, previous_stock, new_stock, reason, performed_by, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(entry.id)
    .bind(entry.product_id)
    .bind(entry.transaction_type.as_str())
    .bind(entry.quantity)
    .bind(entry.previous_stock)
    .bind(entry.new_stock)
    .bind(&entry.reason)
    .bind(entry.performed_by)
    .bind(entry.created_at)
    .execute(&mut **tx)
    .await
    .map_err(map_sqlx_error)?;

    Ok(())
}

fn name_conflict(err: RepositoryError, name: &str) -> RepositoryError {
    match err {
        RepositoryError::Conflict(_) => {
            RepositoryError::Conflict(format!("Product with name '{}' already exists", name))
        }
        other => other,
    }
}

#[async_trait]
impl ProductRepository for StoreProductRepository {
    async fn insert_product(
        &self,
        product: &Product,
        initial_stock: Option<&StockTransaction>,
    ) -> RepositoryResult<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        let p = &product.pricing;

        sqlx::query(
            r#"
            INSERT INTO products (id, product_name, description, category, hsn_code, sku, price, mrp,
                gst_rate_bps, gst_amount, cgst_amount, sgst_amount, final_price_inc_gst, stock_quantity,
                reorder_level, is_active, created_by, created_at, updated_at, deleted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
            "#,
        )
        .bind(product.id)
        .bind(&product.product_name)
        .bind(&product.description)
        .bind(product.category.as_str())
        .bind(&product.hsn_code)
        .bind(&product.sku)
        .bind(p.price)
        .bind(p.mrp)
        .bind(p.gst_rate.basis_points() as i32)
        .bind(p.gst_amount)
        .bind(p.cgst_amount)
        .bind(p.sgst_amount)
        .bind(p.final_price_inc_gst)
        .bind(product.stock_quantity)
        .bind(product.reorder_level)
        .bind(product.is_active)
        .bind(product.created_by)
        .bind(product.created_at)
        .bind(product.updated_at)
        .bind(product.deleted_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| name_conflict(map_sqlx_error(e), &product.product_name))?;

        if let Some(entry) = initial_stock {
            insert_stock_transaction(&mut tx, entry).await?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn get_product(&self, id: Uuid) -> RepositoryResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products WHERE id = $1 AND deleted_at IS NULL",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(Product::try_from).transpose()
    }

    async fn list_products(&self, query: &ProductQuery) -> RepositoryResult<ProductPage> {
        let category = query.category.map(|c| c.as_str());

        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            SELECT {} FROM products
            WHERE deleted_at IS NULL AND ($1::text IS NULL OR category = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(category)
        .bind(i64::from(query.limit))
        .bind(query.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products WHERE deleted_at IS NULL AND ($1::text IS NULL OR category = $1)",
        )
        .bind(category)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(ProductPage {
            products: rows.into_iter().map(Product::try_from).collect::<Result<_, _>>()?,
            total,
            page: query.page,
            limit: query.limit,
        })
    }

    async fn update_product(&self, product: &Product) -> RepositoryResult<Product> {
        let p = &product.pricing;

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            UPDATE products SET
                product_name = $2, description = $3, category = $4, hsn_code = $5, price = $6, mrp = $7,
                gst_rate_bps = $8, gst_amount = $9, cgst_amount = $10, sgst_amount = $11,
                final_price_inc_gst = $12, reorder_level = $13, is_active = $14, updated_at = $15,
                deleted_at = $16
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(product.id)
        .bind(&product.product_name)
        .bind(&product.description)
        .bind(product.category.as_str())
        .bind(&product.hsn_code)
        .bind(p.price)
        .bind(p.mrp)
        .bind(p.gst_rate.basis_points() as i32)
        .bind(p.gst_amount)
        .bind(p.cgst_amount)
        .bind(p.sgst_amount)
        .bind(p.final_price_inc_gst)
        .bind(product.reorder_level)
        .bind(product.is_active)
        .bind(product.updated_at)
        .bind(product.deleted_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| name_conflict(map_sqlx_error(e), &product.product_name))?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    async fn adjust_stock(
        &self,
        product_id: Uuid,
        adjustment: &StockAdjustment,
        performed_by: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> RepositoryResult<(Product, StockTransaction)> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
            PRODUCT_COLUMNS
        ))
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepositoryError::NotFound)?;

        let mut product = Product::try_from(row)?;
        let entry = adjustment.apply(product.id, product.stock_quantity, performed_by, now)?;

        sqlx::query("UPDATE products SET stock_quantity = $2, updated_at = $3 WHERE id = $1")
            .bind(product.id)
            .bind(entry.new_stock)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        insert_stock_transaction(&mut tx, &entry).await?;

        tx.commit().await.map_err(map_sqlx_error)?;

        product.stock_quantity = entry.new_stock;
        product.updated_at = now;
        Ok((product, entry))
    }

    async fn stock_history(&self, product_id: Uuid) -> RepositoryResult<Vec<StockTransaction>> {
        let rows = sqlx::query_as::<_, StockTransactionRow>(
            r#"
            SELECT id, product_id, transaction_type, quantity, previous_stock, new_stock, reason, performed_by, created_at
            FROM stock_transactions
            WHERE product_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(StockTransaction::try_from).collect()
    }

    async fn low_stock(&self) -> RepositoryResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            SELECT {} FROM products
            WHERE deleted_at IS NULL AND is_active AND stock_quantity <= reorder_level
            ORDER BY stock_quantity ASC
            "#,
            PRODUCT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(Product::try_from).collect()
    }

    async fn count_products(&self) -> RepositoryResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE deleted_at IS NULL")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }
}
