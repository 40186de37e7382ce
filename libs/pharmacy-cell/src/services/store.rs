use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{
    money, normalize_name, ImportMode, ImportOutcome, InventoryError, Medicine,
    UpdateMedicineRequest,
};
use crate::services::fields::{parse_expiry, parse_name, stock_from_int};

/// Per-pharmacy medicine inventory held in process memory.
#[derive(Clone, Default)]
pub struct InventoryStore {
    inventories: Arc<RwLock<HashMap<Uuid, Vec<Medicine>>>>,
}

impl InventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot sorted by name.
    pub async fn list(&self, pharmacy_id: Uuid) -> Vec<Medicine> {
        let inventories = self.inventories.read().await;
        let mut items = inventories.get(&pharmacy_id).cloned().unwrap_or_default();
        sort_by_name(&mut items);
        items
    }

    /// Commits parsed rows. `Merge` upserts by name, keeping the existing id;
    /// `Replace` drops everything first.
    pub async fn import(
        &self,
        pharmacy_id: Uuid,
        rows: Vec<Medicine>,
        mode: ImportMode,
    ) -> ImportOutcome {
        let mut inventories = self.inventories.write().await;
        let items = inventories.entry(pharmacy_id).or_default();

        let mut outcome = ImportOutcome::default();
        if mode == ImportMode::Replace {
            outcome.removed = items.len();
            items.clear();
        }

        for row in rows {
            match items.iter_mut().find(|item| item.name_key() == row.name_key()) {
                Some(existing) => {
                    existing.name = row.name;
                    existing.stock = row.stock;
                    existing.price_cents = row.price_cents;
                    existing.expiry = row.expiry;
                    outcome.updated += 1;
                }
                None => {
                    items.push(row);
                    outcome.added += 1;
                }
            }
        }

        outcome.inventory_size = items.len();
        info!(
            "Inventory import for pharmacy {} ({:?}): {} added, {} updated, {} removed",
            pharmacy_id, mode, outcome.added, outcome.updated, outcome.removed
        );
        outcome
    }

    pub async fn add(&self, pharmacy_id: Uuid, medicine: Medicine) -> Result<Medicine, InventoryError> {
        let mut inventories = self.inventories.write().await;
        let items = inventories.entry(pharmacy_id).or_default();

        if items.iter().any(|item| item.name_key() == medicine.name_key()) {
            return Err(InventoryError::DuplicateName(medicine.name));
        }

        debug!("Adding {} to pharmacy {}", medicine.name, pharmacy_id);
        items.push(medicine.clone());
        Ok(medicine)
    }

    pub async fn update(
        &self,
        pharmacy_id: Uuid,
        item_id: Uuid,
        changes: UpdateMedicineRequest,
    ) -> Result<Medicine, InventoryError> {
        let mut inventories = self.inventories.write().await;
        let items = inventories
            .get_mut(&pharmacy_id)
            .ok_or(InventoryError::NotFound)?;

        let name = changes
            .name
            .as_deref()
            .map(parse_name)
            .transpose()
            .map_err(InventoryError::ValidationError)?;
        let stock = changes
            .stock
            .map(stock_from_int)
            .transpose()
            .map_err(InventoryError::ValidationError)?;
        let price_cents = changes
            .price
            .map(money::cents_from_decimal)
            .transpose()
            .map_err(InventoryError::ValidationError)?;
        let expiry = changes
            .expiry
            .as_deref()
            .map(parse_expiry)
            .transpose()
            .map_err(InventoryError::ValidationError)?;

        if let Some(name) = &name {
            let key = normalize_name(name);
            if items
                .iter()
                .any(|item| item.id != item_id && item.name_key() == key)
            {
                return Err(InventoryError::DuplicateName(name.clone()));
            }
        }

        let item = items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or(InventoryError::NotFound)?;

        if let Some(name) = name {
            item.name = name;
        }
        if let Some(stock) = stock {
            item.stock = stock;
        }
        if let Some(price_cents) = price_cents {
            item.price_cents = price_cents;
        }
        if let Some(expiry) = expiry {
            item.expiry = expiry;
        }

        debug!("Updated medicine {} in pharmacy {}", item_id, pharmacy_id);
        Ok(item.clone())
    }

    pub async fn remove(&self, pharmacy_id: Uuid, item_id: Uuid) -> Result<Medicine, InventoryError> {
        let mut inventories = self.inventories.write().await;
        let items = inventories
            .get_mut(&pharmacy_id)
            .ok_or(InventoryError::NotFound)?;

        let index = items
            .iter()
            .position(|item| item.id == item_id)
            .ok_or(InventoryError::NotFound)?;

        let removed = items.remove(index);
        info!("Removed {} from pharmacy {}", removed.name, pharmacy_id);
        Ok(removed)
    }
}

pub fn sort_by_name(items: &mut [Medicine]) {
    items.sort_by_key(|item| item.name_key());
}
