use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pricing::{PricingEngine, PricingError, ProductPricing};

/// Product categories in the catalog
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum ProductCategory {
    #[default]
    #[serde(rename = "aquaculture")]
    Aquaculture,
    #[serde(rename = "agriculture")]
    Agriculture,
    #[serde(rename = "personal care")]
    PersonalCare,
    #[serde(rename = "health care")]
    HealthCare,
    #[serde(rename = "home care")]
    HomeCare,
    #[serde(rename = "luxury goods")]
    LuxuryGoods,
}

impl ProductCategory {
    pub const ALL: [ProductCategory; 6] = [
        ProductCategory::Aquaculture,
        ProductCategory::Agriculture,
        ProductCategory::PersonalCare,
        ProductCategory::HealthCare,
        ProductCategory::HomeCare,
        ProductCategory::LuxuryGoods,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProductCategory::Aquaculture => "aquaculture",
            ProductCategory::Agriculture => "agriculture",
            ProductCategory::PersonalCare => "personal care",
            ProductCategory::HealthCare => "health care",
            ProductCategory::HomeCare => "home care",
            ProductCategory::LuxuryGoods => "luxury goods",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == value)
    }

    /// Three-letter code used in generated SKUs.
    fn sku_code(&self) -> &'static str {
        match self {
            ProductCategory::Aquaculture => "AQU",
            ProductCategory::Agriculture => "AGR",
            ProductCategory::PersonalCare => "PER",
            ProductCategory::HealthCare => "HEA",
            ProductCategory::HomeCare => "HOM",
            ProductCategory::LuxuryGoods => "LUX",
        }
    }
}

pub const DEFAULT_HSN_CODE: &str = "000000";
pub const DEFAULT_REORDER_LEVEL: i64 = 10;

const NAME_MIN_CHARS: usize = 3;
const NAME_MAX_CHARS: usize = 100;
const DESCRIPTION_MAX_CHARS: usize = 2000;

/// Core product structure
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub product_name: String,
    pub description: String,
    pub category: ProductCategory,
    pub hsn_code: String,
    pub sku: String,
    #[serde(flatten)]
    pub pricing: ProductPricing,
    pub stock_quantity: i64,
    pub reorder_level: i64,
    pub is_active: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Product {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_low_stock(&self) -> bool {
        self.stock_quantity <= self.reorder_level
    }

    /// Soft delete: the row stays, but the product leaves every listing.
    pub fn mark_deleted(&mut self, now: DateTime<Utc>) {
        self.deleted_at = Some(now);
        self.is_active = false;
        self.updated_at = now;
    }

    pub fn toggle_active(&mut self, now: DateTime<Utc>) {
        self.is_active = !self.is_active;
        self.updated_at = now;
    }
}

/// Validated input for a new catalog entry.
#[derive(Debug, Clone, Default)]
pub struct NewProduct {
    pub product_name: String,
    pub description: Option<String>,
    pub category: Option<ProductCategory>,
    pub hsn_code: Option<String>,
    pub price: i64,
    pub mrp: i64,
    pub gst_rate: Option<f64>,
    pub stock_quantity: i64,
    pub reorder_level: Option<i64>,
}

impl NewProduct {
    /// Prices and validates the draft. The product starts active.
    pub fn build(
        self,
        engine: &PricingEngine,
        created_by: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<Product, ProductError> {
        let pricing = engine.price(self.price, self.mrp, self.gst_rate)?;

        let product_name = validate_name(&self.product_name)?;
        let description = match self.description {
            Some(d) => validate_description(&d)?,
            None => format!("Description for {}", product_name),
        };
        let hsn_code = match self.hsn_code {
            Some(code) => validate_hsn_code(&code)?,
            None => DEFAULT_HSN_CODE.to_string(),
        };
        if self.stock_quantity < 0 {
            return Err(ProductError::InvalidField {
                field: "stockQuantity",
                reason: "cannot be negative".into(),
            });
        }
        let reorder_level = validate_reorder_level(self.reorder_level.unwrap_or(DEFAULT_REORDER_LEVEL))?;
        let category = self.category.unwrap_or_default();

        Ok(Product {
            id: Uuid::new_v4(),
            product_name,
            description,
            category,
            hsn_code,
            sku: generate_sku(category),
            pricing,
            stock_quantity: self.stock_quantity,
            reorder_level,
            is_active: true,
            created_by,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }
}

/// Partial update. Stock levels only change through the stock ledger.
#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
    pub product_name: Option<String>,
    pub description: Option<String>,
    pub category: Option<ProductCategory>,
    pub hsn_code: Option<String>,
    pub price: Option<i64>,
    pub mrp: Option<i64>,
    pub gst_rate: Option<f64>,
    pub reorder_level: Option<i64>,
}

impl ProductUpdate {
    pub fn touches_pricing(&self) -> bool {
        self.price.is_some() || self.mrp.is_some() || self.gst_rate.is_some()
    }

    /// Applies the update on a copy of `product`. When price, MRP or rate change,
    /// pricing is recomputed from the merged values.
    pub fn apply(self, product: &Product, engine: &PricingEngine, now: DateTime<Utc>) -> Result<Product, ProductError> {
        let mut updated = product.clone();

        if self.touches_pricing() {
            let current = &product.pricing;
            let gst_percent = self.gst_rate.unwrap_or_else(|| current.gst_rate.as_percent());
            updated.pricing = engine.price(
                self.price.unwrap_or(current.price),
                self.mrp.unwrap_or(current.mrp),
                Some(gst_percent),
            )?;
        }
        if let Some(name) = self.product_name {
            updated.product_name = validate_name(&name)?;
        }
        if let Some(description) = self.description {
            updated.description = validate_description(&description)?;
        }
        if let Some(category) = self.category {
            updated.category = category;
        }
        if let Some(code) = self.hsn_code {
            updated.hsn_code = validate_hsn_code(&code)?;
        }
        if let Some(level) = self.reorder_level {
            updated.reorder_level = validate_reorder_level(level)?;
        }

        updated.updated_at = now;
        Ok(updated)
    }
}

/// Product-related errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProductError {
    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

fn validate_name(name: &str) -> Result<String, ProductError> {
    let trimmed = name.trim();
    let len = trimmed.chars().count();
    if !(NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&len) {
        return Err(ProductError::InvalidField {
            field: "productName",
            reason: format!("must be {} to {} characters", NAME_MIN_CHARS, NAME_MAX_CHARS),
        });
    }
    Ok(trimmed.to_string())
}

fn validate_description(description: &str) -> Result<String, ProductError> {
    let trimmed = description.trim();
    if trimmed.chars().count() > DESCRIPTION_MAX_CHARS {
        return Err(ProductError::InvalidField {
            field: "description",
            reason: format!("cannot exceed {} characters", DESCRIPTION_MAX_CHARS),
        });
    }
    Ok(trimmed.to_string())
}

fn validate_hsn_code(code: &str) -> Result<String, ProductError> {
    let trimmed = code.trim();
    if !(6..=8).contains(&trimmed.len()) || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ProductError::InvalidField {
            field: "hsnCode",
            reason: "must be 6 to 8 digits".into(),
        });
    }
    Ok(trimmed.to_string())
}

fn validate_reorder_level(level: i64) -> Result<i64, ProductError> {
    if level < 0 {
        return Err(ProductError::InvalidField {
            field: "reorderLevel",
            reason: "cannot be negative".into(),
        });
    }
    Ok(level)
}

// SSVPL-<CAT>-<5 hex chars>
fn generate_sku(category: ProductCategory) -> String {
    let suffix = Uuid::new_v4().simple().to_string()[..5].to_uppercase();
    format!("SSVPL-{}-{}", category.sku_code(), suffix)
}
