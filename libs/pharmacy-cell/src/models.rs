use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::error::AppError;

// ==============================================================================
// INVENTORY MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medicine {
    pub id: Uuid,
    pub name: String,
    pub stock: u32,
    /// Whole cents; decimal on the wire.
    #[serde(rename = "price", with = "money")]
    pub price_cents: u64,
    pub expiry: NaiveDate,
}

impl Medicine {
    /// Names are unique per pharmacy, ignoring case.
    pub fn name_key(&self) -> String {
        normalize_name(&self.name)
    }

    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiry < today
    }

    pub fn expires_within(&self, today: NaiveDate, days: i64) -> bool {
        !self.is_expired(today) && (self.expiry - today).num_days() <= days
    }

    pub fn stock_value_cents(&self) -> u64 {
        self.price_cents.saturating_mul(u64::from(self.stock))
    }
}

pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Serializes cent amounts as decimal currency values.
pub mod money {
    use serde::{Deserialize, Deserializer, Serializer};

    /// Highest accepted unit price: 1,000,000.00.
    pub const MAX_PRICE_CENTS: u64 = 100_000_000;

    pub fn serialize<S>(cents: &u64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(*cents as f64 / 100.0)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        cents_from_decimal(value).map_err(serde::de::Error::custom)
    }

    pub fn cents_from_decimal(value: f64) -> Result<u64, String> {
        if !value.is_finite() || value < 0.0 {
            return Err("Price must be a non-negative number".to_string());
        }
        let scaled = value * 100.0;
        let cents = scaled.round();
        if (scaled - cents).abs() > 1e-6 {
            return Err("Price can have at most two decimal places".to_string());
        }
        if cents > MAX_PRICE_CENTS as f64 {
            return Err(format!(
                "Price cannot exceed {}.{:02}",
                MAX_PRICE_CENTS / 100,
                MAX_PRICE_CENTS % 100
            ));
        }
        Ok(cents as u64)
    }
}

// ==============================================================================
// CSV IMPORT MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    /// 1-based line in the uploaded file.
    pub line: u64,
    pub message: String,
}

/// Result of parsing an upload. Every data row lands in exactly one of
/// `items` or `errors`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CsvPreview {
    pub items: Vec<Medicine>,
    pub errors: Vec<RowError>,
    pub total_rows: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    #[default]
    Merge,
    Replace,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImportQuery {
    #[serde(default)]
    pub mode: ImportMode,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    pub inventory_size: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub mode: ImportMode,
    #[serde(flatten)]
    pub outcome: ImportOutcome,
    #[serde(flatten)]
    pub preview: CsvPreview,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

/// Item form payload. Raw values are validated with the same rules as CSV
/// rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicineInput {
    pub name: String,
    pub stock: i64,
    pub price: f64,
    pub expiry: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateMedicineRequest {
    pub name: Option<String>,
    pub stock: Option<i64>,
    pub price: Option<f64>,
    pub expiry: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InventoryQuery {
    /// Case-insensitive substring of the name.
    pub search: Option<String>,
    pub low_stock: Option<bool>,
    pub expiring_within_days: Option<i64>,
    pub expired: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub name: String,
    pub stock: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryBucket {
    /// `YYYY-MM`
    pub month: String,
    pub items: usize,
    pub units: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventorySummary {
    pub item_count: usize,
    pub total_units: u64,
    #[serde(rename = "stock_value", with = "money")]
    pub stock_value_cents: u64,
    pub low_stock_count: usize,
    pub expired_count: usize,
    pub expiring_soon_count: usize,
    pub low_stock_threshold: u32,
    pub expiry_warning_days: i64,
    /// Chart series: items by stock, lowest first.
    pub stock_levels: Vec<StockLevel>,
    /// Chart series: unexpired stock grouped by expiry month.
    pub expiry_by_month: Vec<ExpiryBucket>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum InventoryError {
    #[error("CSV file is empty")]
    EmptyFile,

    #[error("Expected header 'name,stock,price,expiry', found '{0}'")]
    HeaderMismatch(String),

    #[error("Malformed CSV: {0}")]
    Malformed(String),

    #[error("Medicine not found")]
    NotFound,

    #[error("A medicine named '{0}' already exists")]
    DuplicateName(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Failed to export inventory: {0}")]
    Export(String),
}

impl From<InventoryError> for AppError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::EmptyFile
            | InventoryError::HeaderMismatch(_)
            | InventoryError::Malformed(_) => AppError::BadRequest(err.to_string()),
            InventoryError::NotFound => AppError::NotFound(err.to_string()),
            InventoryError::DuplicateName(_) => AppError::Conflict(err.to_string()),
            InventoryError::ValidationError(msg) => AppError::ValidationError(msg),
            InventoryError::Export(_) => AppError::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn price_is_a_decimal_on_the_wire() {
        let medicine = Medicine {
            id: Uuid::nil(),
            name: "Ibuprofen".to_string(),
            stock: 3,
            price_cents: 1250,
            expiry: NaiveDate::from_ymd_opt(2030, 1, 31).unwrap(),
        };
        let json = serde_json::to_value(&medicine).unwrap();
        assert_eq!(json["price"], 12.5);
        assert_eq!(json["expiry"], "2030-01-31");
        assert_eq!(medicine.stock_value_cents(), 3750);
    }

    #[test]
    fn cents_from_decimal_rejects_sub_cent_values() {
        assert_eq!(money::cents_from_decimal(0.1).unwrap(), 10);
        assert_eq!(money::cents_from_decimal(19.99).unwrap(), 1999);
        assert_matches!(money::cents_from_decimal(1.005), Err(_));
        assert_matches!(money::cents_from_decimal(-1.0), Err(_));
    }

    #[test]
    fn expiry_windows() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let medicine = Medicine {
            id: Uuid::nil(),
            name: "Cetirizine".to_string(),
            stock: 1,
            price_cents: 100,
            expiry: today,
        };
        assert!(!medicine.is_expired(today));
        assert!(medicine.expires_within(today, 0));
        assert!(medicine.is_expired(today.succ_opt().unwrap()));
    }

    #[test]
    fn import_mode_defaults_to_merge() {
        let query: ImportQuery = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(query.mode, ImportMode::Merge);
    }
}
