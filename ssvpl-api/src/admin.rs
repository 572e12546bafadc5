use axum::{
    extract::{Path, Query, State},
    routing::{get, patch, post, put},
    Extension, Json, Router,
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use ssvpl_catalog::{NewProduct, Product, ProductCategory, ProductUpdate, StockAdjustment, StockTransaction};
use ssvpl_core::{AdminPrincipal, ProductPage, ProductQuery};
use uuid::Uuid;

use crate::{error::AppError, response::ApiResponse, state::AppState};

const MAX_PAGE_SIZE: u32 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub product_name: String,
    pub price: i64,
    pub mrp: i64,
    pub gst_rate: Option<f64>,
    pub stock_quantity: Option<i64>,
    pub description: Option<String>,
    pub category: Option<ProductCategory>,
    pub hsn_code: Option<String>,
    pub reorder_level: Option<i64>,
}

impl From<CreateProductRequest> for NewProduct {
    fn from(req: CreateProductRequest) -> Self {
        NewProduct {
            product_name: req.product_name,
            description: req.description,
            category: req.category,
            hsn_code: req.hsn_code,
            price: req.price,
            mrp: req.mrp,
            gst_rate: req.gst_rate,
            stock_quantity: req.stock_quantity.unwrap_or(0),
            reorder_level: req.reorder_level,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    pub product_name: Option<String>,
    pub description: Option<String>,
    pub category: Option<ProductCategory>,
    pub hsn_code: Option<String>,
    pub price: Option<i64>,
    pub mrp: Option<i64>,
    pub gst_rate: Option<f64>,
    pub reorder_level: Option<i64>,
}

impl From<UpdateProductRequest> for ProductUpdate {
    fn from(req: UpdateProductRequest) -> Self {
        ProductUpdate {
            product_name: req.product_name,
            description: req.description,
            category: req.category,
            hsn_code: req.hsn_code,
            price: req.price,
            mrp: req.mrp,
            gst_rate: req.gst_rate,
            reorder_level: req.reorder_level,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListProductsQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub category: Option<ProductCategory>,
}

impl From<ListProductsQuery> for ProductQuery {
    fn from(query: ListProductsQuery) -> Self {
        let defaults = ProductQuery::default();
        ProductQuery {
            page: query.page.unwrap_or(defaults.page).max(1),
            limit: query.limit.unwrap_or(defaults.limit).clamp(1, MAX_PAGE_SIZE),
            category: query.category,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddStockRequest {
    pub quantity_to_add: i64,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveStockRequest {
    pub quantity_to_remove: i64,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockAdjustmentResponse {
    pub product: Product,
    pub transaction: StockTransaction,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockHistoryResponse {
    pub product_id: Uuid,
    pub product_name: String,
    pub current_stock: i64,
    pub transactions: Vec<StockTransaction>,
}

// ============================================================================
// Routes
// ============================================================================

/// Product and stock administration; mounted behind `require_admin`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/product/create", post(create_product))
        .route("/admin/product/list", get(list_products))
        .route("/admin/product/update/{id}", put(update_product))
        .route("/admin/product/toggle-status/{id}", patch(toggle_product_status))
        .route("/admin/product/stock/add/{id}", patch(add_stock))
        .route("/admin/product/stock/remove/{id}", patch(remove_stock))
        .route("/admin/product/stock/history/{id}", get(stock_history))
        .route("/admin/product/alerts/low-stock", get(low_stock_alerts))
        .route("/admin/product/{id}", get(get_product).delete(delete_product))
}

// ============================================================================
// Product Management Handlers
// ============================================================================

async fn load_product(state: &AppState, id: Uuid) -> Result<Product, AppError> {
    state
        .timed("get product", state.products.get_product(id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Product {} not found", id)))
}

/// POST /admin/product/create
async fn create_product(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminPrincipal>,
    WithRejection(Json(req), _): WithRejection<Json<CreateProductRequest>, AppError>,
) -> Result<ApiResponse<Product>, AppError> {
    let now = state.clock.now();
    let product = NewProduct::from(req).build(&state.pricing, Some(admin.id), now)?;

    let initial_stock = if product.stock_quantity > 0 {
        Some(StockAdjustment::initial(product.stock_quantity).apply(product.id, 0, Some(admin.id), now)?)
    } else {
        None
    };

    state
        .timed("insert product", state.products.insert_product(&product, initial_stock.as_ref()))
        .await?;

    tracing::info!(
        "Product {} ({}) created by {}: price {} + GST {} = {}",
        product.sku,
        product.id,
        admin.email,
        product.pricing.price,
        product.pricing.gst_amount,
        product.pricing.final_price_inc_gst
    );

    Ok(ApiResponse::created(product, "Product created successfully"))
}

/// GET /admin/product/list
async fn list_products(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<ListProductsQuery>, AppError>,
) -> Result<ApiResponse<ProductPage>, AppError> {
    let query = ProductQuery::from(query);
    let page = state.timed("list products", state.products.list_products(&query)).await?;

    Ok(ApiResponse::ok(page, "Products retrieved successfully"))
}

/// GET /admin/product/{id}
async fn get_product(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<ApiResponse<Product>, AppError> {
    let product = load_product(&state, id).await?;
    Ok(ApiResponse::ok(product, "Product retrieved successfully"))
}

/// PUT /admin/product/update/{id}
async fn update_product(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminPrincipal>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(req), _): WithRejection<Json<UpdateProductRequest>, AppError>,
) -> Result<ApiResponse<Product>, AppError> {
    let current = load_product(&state, id).await?;
    let update = ProductUpdate::from(req);
    let repriced = update.touches_pricing();

    let updated = update.apply(&current, &state.pricing, state.clock.now())?;
    let product = state.timed("update product", state.products.update_product(&updated)).await?;

    if repriced {
        tracing::info!(
            "Product {} repriced by {}: final price {} -> {}",
            product.id,
            admin.email,
            current.pricing.final_price_inc_gst,
            product.pricing.final_price_inc_gst
        );
    }

    Ok(ApiResponse::ok(product, "Product updated successfully"))
}

/// PATCH /admin/product/toggle-status/{id}
async fn toggle_product_status(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<ApiResponse<Product>, AppError> {
    let mut toggled = load_product(&state, id).await?;
    toggled.toggle_active(state.clock.now());
    let product = state.timed("update product", state.products.update_product(&toggled)).await?;

    let message = if product.is_active { "Product activated" } else { "Product deactivated" };
    Ok(ApiResponse::ok(product, message))
}

/// DELETE /admin/product/{id}
async fn delete_product(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminPrincipal>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<ApiResponse<Product>, AppError> {
    let mut deleted = load_product(&state, id).await?;
    deleted.mark_deleted(state.clock.now());
    let product = state.timed("delete product", state.products.update_product(&deleted)).await?;

    tracing::info!("Product {} deleted by {}", product.id, admin.email);
    Ok(ApiResponse::ok(product, "Product deleted successfully"))
}

// ============================================================================
// Stock Handlers
// ============================================================================

async fn apply_adjustment(
    state: &AppState,
    admin: &AdminPrincipal,
    id: Uuid,
    adjustment: StockAdjustment,
) -> Result<StockAdjustmentResponse, AppError> {
    let (product, transaction) = state
        .timed(
            "adjust stock",
            state.products.adjust_stock(id, &adjustment, Some(admin.id), state.clock.now()),
        )
        .await
        .map_err(|e| match e {
            ssvpl_core::RepositoryError::NotFound => AppError::NotFound(format!("Product {} not found", id)),
            other => other.into(),
        })?;

    tracing::info!(
        "Stock {} {} for product {}: {} -> {}",
        transaction.transaction_type.as_str(),
        transaction.quantity,
        product.id,
        transaction.previous_stock,
        transaction.new_stock
    );

    Ok(StockAdjustmentResponse { product, transaction })
}

/// PATCH /admin/product/stock/add/{id}
async fn add_stock(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminPrincipal>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(req), _): WithRejection<Json<AddStockRequest>, AppError>,
) -> Result<ApiResponse<StockAdjustmentResponse>, AppError> {
    let adjustment = StockAdjustment::add(req.quantity_to_add, req.reason);
    let result = apply_adjustment(&state, &admin, id, adjustment).await?;
    Ok(ApiResponse::ok(result, "Stock added successfully"))
}

/// PATCH /admin/product/stock/remove/{id}
async fn remove_stock(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminPrincipal>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(req), _): WithRejection<Json<RemoveStockRequest>, AppError>,
) -> Result<ApiResponse<StockAdjustmentResponse>, AppError> {
    let adjustment = StockAdjustment::remove(req.quantity_to_remove, req.reason);
    let result = apply_adjustment(&state, &admin, id, adjustment).await?;
    Ok(ApiResponse::ok(result, "Stock removed successfully"))
}

/// GET /admin/product/stock/history/{id}
async fn stock_history(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<ApiResponse<StockHistoryResponse>, AppError> {
    let product = load_product(&state, id).await?;
    let transactions = state.timed("stock history", state.products.stock_history(id)).await?;

    Ok(ApiResponse::ok(
        StockHistoryResponse {
            product_id: product.id,
            product_name: product.product_name,
            current_stock: product.stock_quantity,
            transactions,
        },
        "Stock history retrieved successfully",
    ))
}

/// GET /admin/product/alerts/low-stock
async fn low_stock_alerts(State(state): State<AppState>) -> Result<ApiResponse<Vec<Product>>, AppError> {
    let products = state.timed("low stock", state.products.low_stock()).await?;
    let message = format!("{} products at or below reorder level", products.len());
    Ok(ApiResponse::ok(products, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_defaults_and_bounds() {
        let query = ProductQuery::from(ListProductsQuery { page: None, limit: None, category: None });
        assert_eq!((query.page, query.limit), (1, 20));

        let query = ProductQuery::from(ListProductsQuery { page: Some(0), limit: Some(500), category: None });
        assert_eq!((query.page, query.limit), (1, MAX_PAGE_SIZE));

        let query = ProductQuery::from(ListProductsQuery { page: Some(3), limit: Some(0), category: None });
        assert_eq!((query.page, query.limit), (3, 1));
    }

    #[test]
    fn test_create_request_uses_camel_case() {
        let req: CreateProductRequest = serde_json::from_str(
            r#"{"productName":"Shrimp Feed","price":5000,"mrp":5900,"gstRate":18,"category":"aquaculture"}"#,
        )
        .unwrap();
        let draft = NewProduct::from(req);
        assert_eq!(draft.product_name, "Shrimp Feed");
        assert_eq!(draft.gst_rate, Some(18.0));
        assert_eq!(draft.stock_quantity, 0);
        assert_eq!(draft.category, Some(ProductCategory::Aquaculture));
    }
}
