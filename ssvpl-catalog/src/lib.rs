pub mod product;
pub mod pricing;
pub mod inventory;

pub use product::{NewProduct, Product, ProductCategory, ProductError, ProductUpdate};
pub use pricing::{compute_pricing, GstRate, PricingConfig, PricingEngine, PricingError, ProductPricing};
pub use inventory::{StockAdjustment, StockError, StockTransaction, StockTransactionKind};
