use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StockTransactionKind {
    Add,
    Remove,
}

impl StockTransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockTransactionKind::Add => "add",
            StockTransactionKind::Remove => "remove",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "add" => Some(StockTransactionKind::Add),
            "remove" => Some(StockTransactionKind::Remove),
            _ => None,
        }
    }
}

/// One entry in a product's stock history
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StockTransaction {
    pub id: Uuid,
    pub product_id: Uuid,
    pub transaction_type: StockTransactionKind,
    pub quantity: i64,
    pub previous_stock: i64,
    pub new_stock: i64,
    pub reason: String,
    pub performed_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// A requested change to a product's stock level
#[derive(Debug, Clone)]
pub struct StockAdjustment {
    pub kind: StockTransactionKind,
    pub quantity: i64,
    pub reason: Option<String>,
}

impl StockAdjustment {
    pub fn add(quantity: i64, reason: Option<String>) -> Self {
        Self { kind: StockTransactionKind::Add, quantity, reason }
    }

    pub fn remove(quantity: i64, reason: Option<String>) -> Self {
        Self { kind: StockTransactionKind::Remove, quantity, reason }
    }

    /// Entry logged when a product is created with stock on hand.
    pub fn initial(quantity: i64) -> Self {
        Self::add(quantity, Some("Initial Stock".to_string()))
    }

    /// Checks the adjustment against the current level and produces the ledger entry.
    pub fn apply(
        &self,
        product_id: Uuid,
        current_stock: i64,
        performed_by: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<StockTransaction, StockError> {
        if self.quantity <= 0 {
            return Err(StockError::InvalidQuantity(self.quantity));
        }

        let new_stock = match self.kind {
            StockTransactionKind::Add => current_stock
                .checked_add(self.quantity)
                .ok_or(StockError::InvalidQuantity(self.quantity))?,
            StockTransactionKind::Remove => {
                if current_stock < self.quantity {
                    return Err(StockError::InsufficientStock {
                        requested: self.quantity,
                        available: current_stock,
                    });
                }
                current_stock - self.quantity
            }
        };

        let reason = self
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| match self.kind {
                StockTransactionKind::Add => "Manual Addition".to_string(),
                StockTransactionKind::Remove => "Manual Removal".to_string(),
            });

        Ok(StockTransaction {
            id: Uuid::new_v4(),
            product_id,
            transaction_type: self.kind,
            quantity: self.quantity,
            previous_stock: current_stock,
            new_stock,
            reason,
            performed_by,
            created_at: now,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StockError {
    #[error("Quantity must be a positive number, got {0}")]
    InvalidQuantity(i64),

    #[error("Insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },
}
