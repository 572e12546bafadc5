use serde::{Serialize, Serializer};
use std::fmt;

/// 100% expressed in basis points.
pub const MAX_GST_BASIS_POINTS: u32 = 10_000;

const BASIS_POINTS_PER_PERCENT: u32 = 100;

/// Largest accepted price. Keeps `price + gst_amount` inside `i64`.
pub const MAX_PRICE: i64 = i64::MAX / 2;

/// GST rate as a percentage in [0, 100] with at most two decimal places.
///
/// Stored as basis points so that tax arithmetic never touches floating point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GstRate {
    basis_points: u32,
}

impl GstRate {
    pub const ZERO: GstRate = GstRate { basis_points: 0 };

    pub fn from_basis_points(basis_points: i64) -> Result<Self, PricingError> {
        if !(0..=i64::from(MAX_GST_BASIS_POINTS)).contains(&basis_points) {
            return Err(PricingError::InvalidGstRate(format!("{} bps", basis_points)));
        }
        Ok(Self { basis_points: basis_points as u32 })
    }

    /// Whole-number percentage, e.g. `18` for 18%.
    pub fn from_percent(percent: i64) -> Result<Self, PricingError> {
        percent
            .checked_mul(i64::from(BASIS_POINTS_PER_PERCENT))
            .ok_or_else(|| PricingError::InvalidGstRate(percent.to_string()))
            .and_then(Self::from_basis_points)
            .map_err(|_| PricingError::InvalidGstRate(percent.to_string()))
    }

    /// Percentage as it arrives in JSON bodies (`18`, `0.25`, `12.5`).
    ///
    /// Rejects anything outside [0, 100] or with more than two decimals.
    /// Out-of-range values are reported, never clamped.
    pub fn parse_percent(percent: f64) -> Result<Self, PricingError> {
        let invalid = || PricingError::InvalidGstRate(percent.to_string());

        if !percent.is_finite() {
            return Err(invalid());
        }
        let scaled = percent * f64::from(BASIS_POINTS_PER_PERCENT);
        let basis_points = scaled.round();
        if (scaled - basis_points).abs() > 1e-6 {
            return Err(invalid());
        }
        if basis_points < 0.0 || basis_points > f64::from(MAX_GST_BASIS_POINTS) {
            return Err(invalid());
        }
        Ok(Self { basis_points: basis_points as u32 })
    }

    pub fn basis_points(&self) -> u32 {
        self.basis_points
    }

    pub fn as_percent(&self) -> f64 {
        f64::from(self.basis_points) / f64::from(BASIS_POINTS_PER_PERCENT)
    }
}

impl fmt::Display for GstRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.basis_points / BASIS_POINTS_PER_PERCENT;
        let fraction = self.basis_points % BASIS_POINTS_PER_PERCENT;
        if fraction == 0 {
            write!(f, "{}%", whole)
        } else {
            write!(f, "{}.{:02}%", whole, fraction)
        }
    }
}

// Whole rates serialize as integers (`18`), fractional ones as decimals (`0.25`).
impl Serialize for GstRate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if self.basis_points % BASIS_POINTS_PER_PERCENT == 0 {
            serializer.serialize_u32(self.basis_points / BASIS_POINTS_PER_PERCENT)
        } else {
            serializer.serialize_f64(self.as_percent())
        }
    }
}

/// Tax-inclusive pricing for a single product. All amounts are minor currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPricing {
    pub price: i64,
    pub mrp: i64,
    pub gst_rate: GstRate,
    pub gst_amount: i64,
    pub cgst_amount: i64,
    pub sgst_amount: i64,
    /// Inter-state levy, equal to the full GST amount.
    pub igst_amount: i64,
    #[serde(rename = "finalPriceIncGST")]
    pub final_price_inc_gst: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PricingError {
    #[error("Price must be a positive amount in minor units, got {0}")]
    InvalidPrice(i64),

    #[error("MRP {mrp} cannot be less than the selling price {price}")]
    InvalidMrp { price: i64, mrp: i64 },

    #[error("GST rate must be between 0 and 100 with at most two decimals, got {0}")]
    InvalidGstRate(String),
}

impl PricingError {
    pub fn code(&self) -> &'static str {
        match self {
            PricingError::InvalidPrice(_) => "InvalidPrice",
            PricingError::InvalidMrp { .. } => "InvalidMRP",
            PricingError::InvalidGstRate(_) => "InvalidGSTRate",
        }
    }
}

/// Computes GST and the tax-inclusive final price.
///
/// `gst_amount = round_half_up(price * rate / 100)`, `final = price + gst_amount`.
/// Validation order is price, then MRP, then rate.
pub fn compute_pricing(price: i64, mrp: i64, gst_rate: GstRate) -> Result<ProductPricing, PricingError> {
    validate_amounts(price, mrp)?;
    Ok(apply_rate(price, mrp, gst_rate))
}

fn validate_amounts(price: i64, mrp: i64) -> Result<(), PricingError> {
    if price <= 0 || price > MAX_PRICE {
        return Err(PricingError::InvalidPrice(price));
    }
    if mrp < price {
        return Err(PricingError::InvalidMrp { price, mrp });
    }
    Ok(())
}

fn apply_rate(price: i64, mrp: i64, gst_rate: GstRate) -> ProductPricing {
    let scale = i128::from(MAX_GST_BASIS_POINTS);
    let gst_amount = ((i128::from(price) * i128::from(gst_rate.basis_points()) + scale / 2) / scale) as i64;

    let cgst_amount = gst_amount / 2;
    ProductPricing {
        price,
        mrp,
        gst_rate,
        gst_amount,
        cgst_amount,
        sgst_amount: gst_amount - cgst_amount,
        igst_amount: gst_amount,
        final_price_inc_gst: price + gst_amount,
    }
}

#[derive(Debug, Clone)]
pub struct PricingConfig {
    /// Rate applied when a request does not carry one.
    pub default_gst_rate: GstRate,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            default_gst_rate: GstRate { basis_points: 18 * BASIS_POINTS_PER_PERCENT },
        }
    }
}

/// Pricing engine used by the catalog handlers. Stateless apart from its config.
#[derive(Debug, Clone, Default)]
pub struct PricingEngine {
    config: PricingConfig,
}

impl PricingEngine {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    pub fn default_gst_rate(&self) -> GstRate {
        self.config.default_gst_rate
    }

    /// Prices raw request input, where the rate is an optional JSON percentage.
    pub fn price(&self, price: i64, mrp: i64, gst_percent: Option<f64>) -> Result<ProductPricing, PricingError> {
        validate_amounts(price, mrp)?;
        let rate = match gst_percent {
            Some(percent) => GstRate::parse_percent(percent)?,
            None => self.config.default_gst_rate,
        };
        Ok(apply_rate(price, mrp, rate))
    }
}
